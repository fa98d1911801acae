//! End-to-end tests for the posting loop
//!
//! These drive `Scheduler::run` against scripted HTTP responses:
//! - First start with an empty token cache
//! - Generation failures and back-off
//! - Fatal startup authentication failure
//! - Token rejection and renewal
//! - The real token file between runs

use anyhow::Result;
use libtalecast::config::{Config, FileConfig};
use libtalecast::credentials::{Credentials, FileTokenStore, TokenStore};
use libtalecast::http::HttpResponse;
use libtalecast::mock::{completion_body, MemoryTokenStore, RecordingSleeper, ScriptedHttpClient};
use libtalecast::types::AccessToken;
use libtalecast::{Scheduler, TalecastError};
use secrecy::SecretString;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

const HOUR: Duration = Duration::from_secs(3600);
const PROFILE_LINK: &str = "https://www.reddit.com/user/spooky_teller/";

fn test_config() -> Config {
    Config::from_parts(
        FileConfig::default(),
        Credentials::new("client", "secret", "spooky_teller", "hunter2"),
        (SecretString::from("mistral-key".to_string()), "ag:horror".to_string()),
    )
}

fn story(content: &str) -> HttpResponse {
    HttpResponse::new(200, completion_body(content))
}

/// Run the loop until the sleeper has been asked for `sleeps` waits.
async fn run_until(
    http: &ScriptedHttpClient,
    store: Arc<dyn TokenStore>,
    sleeps: usize,
) -> (libtalecast::Result<()>, RecordingSleeper) {
    let shutdown = Arc::new(AtomicBool::new(false));
    let sleeper = RecordingSleeper::stop_after(sleeps, shutdown.clone());
    let mut scheduler = Scheduler::new(
        &test_config(),
        Arc::new(http.clone()),
        store,
        Arc::new(sleeper.clone()),
    );
    let result = scheduler.run(shutdown).await;
    (result, sleeper)
}

#[tokio::test]
async fn test_first_start_authenticates_once_and_posts_every_interval() -> Result<()> {
    let http = ScriptedHttpClient::new();
    http.respond(
        "access_token",
        HttpResponse::new(200, r#"{"access_token":"tok-1","expires_in":86400}"#),
    );
    http.respond("agents/completions", story("**Title: The Well**\nStory: It was deep."));
    http.respond("agents/completions", story("### The Attic\nSomething moved."));
    http.always("api/submit", HttpResponse::new(200, r#"{"success":true}"#));

    let store = MemoryTokenStore::new();
    let (result, sleeper) = run_until(&http, Arc::new(store.clone()), 2).await;
    result?;

    // Auth once, token cached, no re-auth on the second cycle
    assert_eq!(http.request_count("access_token"), 1);
    assert_eq!(store.current(), Some(AccessToken::new("tok-1")));
    assert_eq!(sleeper.sleeps(), vec![HOUR, HOUR]);

    let submissions: Vec<_> = http
        .requests()
        .into_iter()
        .filter(|r| r.url.contains("api/submit"))
        .collect();
    assert_eq!(submissions.len(), 2);

    assert_eq!(submissions[0].form_value("title"), Some("The Well"));
    assert_eq!(submissions[1].form_value("title"), Some("The Attic"));
    for submission in &submissions {
        assert_eq!(submission.form_value("sr"), Some("u_spooky_teller"));
        assert_eq!(submission.header_value("Authorization"), Some("bearer tok-1"));
        assert!(submission.form_value("text").unwrap().ends_with(PROFILE_LINK));
    }
    assert!(submissions[0]
        .form_value("text")
        .unwrap()
        .starts_with("It was deep.\n\n"));

    Ok(())
}

#[tokio::test]
async fn test_generation_failure_waits_and_retries() -> Result<()> {
    let http = ScriptedHttpClient::new();
    http.respond("agents/completions", HttpResponse::new(503, "overloaded"));
    http.respond("agents/completions", story("Late\nBut here."));
    http.always("api/submit", HttpResponse::new(200, "{}"));

    let store = MemoryTokenStore::with_token("cached");
    let (result, sleeper) = run_until(&http, Arc::new(store), 2).await;
    result?;

    assert_eq!(sleeper.sleeps(), vec![HOUR, HOUR]);
    assert_eq!(http.request_count("agents/completions"), 2);
    assert_eq!(http.request_count("api/submit"), 1);
    assert_eq!(http.request_count("access_token"), 0);

    Ok(())
}

#[tokio::test]
async fn test_startup_auth_failure_stops_the_loop() {
    let http = ScriptedHttpClient::new();
    http.respond("access_token", HttpResponse::new(401, "bad client"));

    let store = MemoryTokenStore::new();
    let (result, sleeper) = run_until(&http, Arc::new(store.clone()), 5).await;

    let error = result.unwrap_err();
    assert!(matches!(error, TalecastError::Auth(_)));
    assert_eq!(error.exit_code(), 2);
    assert!(sleeper.sleeps().is_empty());
    assert_eq!(store.save_count(), 0);
    assert_eq!(http.request_count("agents/completions"), 0);
}

#[tokio::test]
async fn test_rejected_token_is_renewed() -> Result<()> {
    let http = ScriptedHttpClient::new();
    http.respond("api/submit", HttpResponse::new(401, "Unauthorized"));
    http.respond("api/submit", HttpResponse::new(200, "{}"));
    http.always("agents/completions", story("Again\nAnd again."));
    http.respond("access_token", HttpResponse::new(200, r#"{"access_token":"tok-2"}"#));

    let store = MemoryTokenStore::with_token("expired");
    let (result, _sleeper) = run_until(&http, Arc::new(store.clone()), 2).await;
    result?;

    assert_eq!(store.clear_count(), 1);
    assert_eq!(http.request_count("access_token"), 1);
    assert_eq!(store.current(), Some(AccessToken::new("tok-2")));

    let submissions: Vec<_> = http
        .requests()
        .into_iter()
        .filter(|r| r.url.contains("api/submit"))
        .collect();
    assert_eq!(submissions[0].header_value("Authorization"), Some("bearer expired"));
    assert_eq!(submissions[1].header_value("Authorization"), Some("bearer tok-2"));

    Ok(())
}

#[tokio::test]
async fn test_token_file_survives_restart() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let token_path = temp_dir.path().join("nested").join("token.txt");

    let http = ScriptedHttpClient::new();
    http.respond("access_token", HttpResponse::new(200, r#"{"access_token":"disk-token"}"#));
    http.always("agents/completions", story("T\nB"));
    http.always("api/submit", HttpResponse::new(200, "{}"));

    let (first, _) = run_until(&http, Arc::new(FileTokenStore::new(token_path.clone())), 1).await;
    first?;
    assert_eq!(std::fs::read_to_string(&token_path)?, "disk-token");

    // Second process start reuses the file
    let (second, _) = run_until(&http, Arc::new(FileTokenStore::new(token_path.clone())), 1).await;
    second?;
    assert_eq!(http.request_count("access_token"), 1);

    Ok(())
}
