//! Text post submission to the user's own Reddit profile

use std::sync::Arc;

use tracing::{debug, error, info};

use crate::config::RedditConfig;
use crate::error::PublishError;
use crate::http::{HttpClient, HttpRequest, HttpResponse};
use crate::types::AccessToken;

const FOOTER_LEAD: &str = "Liked the story? Stay tuned and follow";

/// Body text followed by the profile promotion footer.
pub fn with_footer(text: &str, profile_link: &str) -> String {
    format!("{}\n\n{} {}", text, FOOTER_LEAD, profile_link)
}

pub struct Publisher {
    http: Arc<dyn HttpClient>,
    submit_url: String,
    user_agent: String,
    profile_name: String,
    profile_link: String,
}

impl Publisher {
    pub fn new(http: Arc<dyn HttpClient>, config: &RedditConfig) -> Self {
        Self {
            http,
            submit_url: config.submit_url.clone(),
            user_agent: config.user_agent.clone(),
            profile_name: config.credentials.profile_name(),
            profile_link: config.credentials.profile_link(),
        }
    }

    /// `u_<username>`, the subreddit of the user's profile
    pub fn profile_name(&self) -> &str {
        &self.profile_name
    }

    /// Submit one self post, single attempt.
    ///
    /// The footer is always appended to `text`. The response body is
    /// returned untouched.
    pub async fn try_publish(
        &self,
        token: &AccessToken,
        title: &str,
        text: &str,
    ) -> Result<HttpResponse, PublishError> {
        let post_text = with_footer(text, &self.profile_link);

        let request = HttpRequest::form(
            &self.submit_url,
            &[
                ("sr", self.profile_name.as_str()),
                ("title", title),
                ("kind", "self"),
                ("text", post_text.as_str()),
            ],
        )
        .bearer(token.as_str())
        .header("User-Agent", &self.user_agent);

        debug!("Submitting {} characters to {}", post_text.len(), self.profile_name);
        let response = self.http.execute(request).await?;

        if !response.is_success() {
            return Err(PublishError::Rejected {
                status: response.status,
                body: response.body,
            });
        }
        Ok(response)
    }

    /// Submit one self post; failures are logged and become `None`.
    pub async fn publish(&self, token: &AccessToken, title: &str, text: &str) -> Option<HttpResponse> {
        match self.try_publish(token, title, text).await {
            Ok(response) => {
                info!("Reddit response: {}", response.body);
                Some(response)
            }
            Err(e) => {
                error!("Request failed: {}", e);
                None
            }
        }
    }
}
