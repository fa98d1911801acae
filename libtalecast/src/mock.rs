//! Test doubles for the HTTP client, token store and sleeper
//!
//! Available in all builds so integration tests in `tests/` can drive the
//! scheduler without network access or real waits.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use crate::credentials::TokenStore;
use crate::error::{PersistenceError, TransportError};
use crate::http::{HttpClient, HttpRequest, HttpResponse};
use crate::scheduler::Sleeper;
use crate::types::AccessToken;

/// JSON body of a completion response with one choice.
pub fn completion_body(content: &str) -> String {
    serde_json::json!({
        "id": "cmpl-test",
        "object": "chat.completion",
        "choices": [
            {
                "index": 0,
                "message": { "role": "assistant", "content": content },
                "finish_reason": "stop"
            }
        ]
    })
    .to_string()
}

type Scripted = Result<HttpResponse, TransportError>;

struct Route {
    fragment: String,
    queue: VecDeque<Scripted>,
    fallback: Option<Scripted>,
}

#[derive(Default)]
struct ScriptState {
    routes: Vec<Route>,
    requests: Vec<HttpRequest>,
}

/// HTTP client that replays scripted responses.
///
/// Responses are matched by URL substring. Queued responses are used once,
/// in order; after the queue is empty the `always` response (if any) is
/// repeated. An unmatched request fails with a connect error.
#[derive(Clone, Default)]
pub struct ScriptedHttpClient {
    state: Arc<Mutex<ScriptState>>,
}

impl ScriptedHttpClient {
    pub fn new() -> Self {
        Self::default()
    }

    fn push(&self, fragment: &str, scripted: Scripted) {
        let mut state = self.state.lock().unwrap();
        match state.routes.iter_mut().find(|r| r.fragment == fragment) {
            Some(route) => route.queue.push_back(scripted),
            None => state.routes.push(Route {
                fragment: fragment.to_string(),
                queue: VecDeque::from([scripted]),
                fallback: None,
            }),
        }
    }

    /// Queue one response for URLs containing `fragment`.
    pub fn respond(&self, fragment: &str, response: HttpResponse) {
        self.push(fragment, Ok(response));
    }

    /// Queue one transport failure for URLs containing `fragment`.
    pub fn fail(&self, fragment: &str, error: TransportError) {
        self.push(fragment, Err(error));
    }

    /// Response used whenever the queue for `fragment` is empty.
    pub fn always(&self, fragment: &str, response: HttpResponse) {
        let mut state = self.state.lock().unwrap();
        match state.routes.iter_mut().find(|r| r.fragment == fragment) {
            Some(route) => route.fallback = Some(Ok(response)),
            None => state.routes.push(Route {
                fragment: fragment.to_string(),
                queue: VecDeque::new(),
                fallback: Some(Ok(response)),
            }),
        }
    }

    /// Every request received so far, oldest first.
    pub fn requests(&self) -> Vec<HttpRequest> {
        self.state.lock().unwrap().requests.clone()
    }

    /// Number of requests whose URL contains `fragment`.
    pub fn request_count(&self, fragment: &str) -> usize {
        self.state
            .lock()
            .unwrap()
            .requests
            .iter()
            .filter(|r| r.url.contains(fragment))
            .count()
    }
}

#[async_trait]
impl HttpClient for ScriptedHttpClient {
    async fn execute(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        let mut state = self.state.lock().unwrap();
        let url = request.url.clone();
        state.requests.push(request);

        for route in state.routes.iter_mut() {
            if !url.contains(&route.fragment) {
                continue;
            }
            if let Some(scripted) = route.queue.pop_front() {
                return scripted;
            }
            if let Some(fallback) = &route.fallback {
                return fallback.clone();
            }
        }

        Err(TransportError::Connect(format!(
            "no scripted response for {}",
            url
        )))
    }
}

/// In-memory token store with call counters.
#[derive(Clone, Default)]
pub struct MemoryTokenStore {
    token: Arc<Mutex<Option<AccessToken>>>,
    save_count: Arc<Mutex<usize>>,
    clear_count: Arc<Mutex<usize>>,
    fail_saves: Arc<AtomicBool>,
}

impl MemoryTokenStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_token(token: &str) -> Self {
        let store = Self::default();
        *store.token.lock().unwrap() = Some(AccessToken::new(token));
        store
    }

    /// Make every subsequent `save` fail with a write error.
    pub fn fail_saves(&self) {
        self.fail_saves.store(true, Ordering::SeqCst);
    }

    pub fn current(&self) -> Option<AccessToken> {
        self.token.lock().unwrap().clone()
    }

    pub fn save_count(&self) -> usize {
        *self.save_count.lock().unwrap()
    }

    pub fn clear_count(&self) -> usize {
        *self.clear_count.lock().unwrap()
    }
}

impl TokenStore for MemoryTokenStore {
    fn load(&self) -> Option<AccessToken> {
        self.token
            .lock()
            .unwrap()
            .clone()
            .filter(|token| !token.is_empty())
    }

    fn save(&self, token: &AccessToken) -> Result<(), PersistenceError> {
        *self.save_count.lock().unwrap() += 1;
        if self.fail_saves.load(Ordering::SeqCst) {
            return Err(PersistenceError::Write {
                path: "memory".into(),
                source: std::io::Error::new(std::io::ErrorKind::PermissionDenied, "read-only"),
            });
        }
        *self.token.lock().unwrap() = Some(token.clone());
        Ok(())
    }

    fn clear(&self) -> Result<(), PersistenceError> {
        *self.clear_count.lock().unwrap() += 1;
        *self.token.lock().unwrap() = None;
        Ok(())
    }

    fn backend_name(&self) -> &str {
        "memory"
    }
}

/// Sleeper that returns immediately and remembers what it was asked for.
///
/// With [`RecordingSleeper::stop_after`] it raises a shutdown flag once the
/// given number of sleeps has been requested, which ends a scheduler run.
#[derive(Clone, Default)]
pub struct RecordingSleeper {
    sleeps: Arc<Mutex<Vec<Duration>>>,
    stop: Option<(usize, Arc<AtomicBool>)>,
}

impl RecordingSleeper {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stop_after(sleeps: usize, shutdown: Arc<AtomicBool>) -> Self {
        Self {
            sleeps: Arc::default(),
            stop: Some((sleeps, shutdown)),
        }
    }

    pub fn sleeps(&self) -> Vec<Duration> {
        self.sleeps.lock().unwrap().clone()
    }
}

#[async_trait]
impl Sleeper for RecordingSleeper {
    async fn sleep(&self, duration: Duration) {
        let count = {
            let mut sleeps = self.sleeps.lock().unwrap();
            sleeps.push(duration);
            sleeps.len()
        };
        if let Some((limit, shutdown)) = &self.stop {
            if count >= *limit {
                shutdown.store(true, Ordering::SeqCst);
            }
        }
    }
}
