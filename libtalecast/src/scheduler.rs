//! The posting loop
//!
//! A two-state machine: `AcquireToken` runs once at startup (and again after
//! the submission endpoint rejects the token), `Cycle` repeats forever:
//! generate, publish, wait. Waiting goes through a [`Sleeper`] so tests can
//! run the loop without real delays.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, error, info, warn};

use crate::auth::AuthClient;
use crate::config::{Config, ScheduleConfig};
use crate::credentials::{Credentials, FileTokenStore, TokenStore};
use crate::error::Result;
use crate::generator::StoryGenerator;
use crate::http::{HttpClient, ReqwestClient};
use crate::normalize::strip_story_prefix;
use crate::publisher::Publisher;
use crate::types::{AccessToken, PostResult};

const SLEEP_SLICE: Duration = Duration::from_secs(1);

#[async_trait]
pub trait Sleeper: Send + Sync {
    async fn sleep(&self, duration: Duration);
}

/// Tokio sleeper that wakes at least once per second to check a shutdown flag.
pub struct ShutdownAwareSleeper {
    shutdown: Arc<AtomicBool>,
}

impl ShutdownAwareSleeper {
    pub fn new(shutdown: Arc<AtomicBool>) -> Self {
        Self { shutdown }
    }
}

#[async_trait]
impl Sleeper for ShutdownAwareSleeper {
    async fn sleep(&self, duration: Duration) {
        let mut remaining = duration;
        while !remaining.is_zero() {
            if self.shutdown.load(Ordering::Relaxed) {
                debug!("Sleep interrupted by shutdown");
                return;
            }
            let slice = remaining.min(SLEEP_SLICE);
            tokio::time::sleep(slice).await;
            remaining -= slice;
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    AcquireToken,
    Cycle,
}

/// What the loop does after a step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// Go straight to the next step
    Continue,
    /// Something failed; try the same step again after the delay
    Retry(Duration),
    /// A post attempt finished; start the next cycle after the delay
    Wait(Duration),
}

impl Transition {
    pub fn delay(&self) -> Option<Duration> {
        match self {
            Transition::Continue => None,
            Transition::Retry(delay) | Transition::Wait(delay) => Some(*delay),
        }
    }
}

pub struct Scheduler {
    store: Arc<dyn TokenStore>,
    auth: AuthClient,
    generator: StoryGenerator,
    publisher: Publisher,
    credentials: Credentials,
    sleeper: Arc<dyn Sleeper>,
    schedule: ScheduleConfig,
    token: Option<AccessToken>,
    state: State,
    started: bool,
    last_post: Option<PostResult>,
}

impl Scheduler {
    pub fn new(
        config: &Config,
        http: Arc<dyn HttpClient>,
        store: Arc<dyn TokenStore>,
        sleeper: Arc<dyn Sleeper>,
    ) -> Self {
        Self {
            store,
            auth: AuthClient::new(http.clone(), &config.reddit),
            generator: StoryGenerator::new(http.clone(), &config.mistral),
            publisher: Publisher::new(http, &config.reddit),
            credentials: config.reddit.credentials.clone(),
            sleeper,
            schedule: config.schedule,
            token: None,
            state: State::AcquireToken,
            started: false,
            last_post: None,
        }
    }

    /// Production wiring: reqwest transport, token file, shutdown-aware sleeps.
    pub fn from_config(config: &Config, shutdown: Arc<AtomicBool>) -> Result<Self> {
        let http = ReqwestClient::new(&config.reddit.user_agent, config.http.timeout())?;
        let store = FileTokenStore::new(config.storage.expand_token_path());
        debug!("Token file: {:?}", store.path());

        Ok(Self::new(
            config,
            Arc::new(http),
            Arc::new(store),
            Arc::new(ShutdownAwareSleeper::new(shutdown)),
        ))
    }

    pub fn state(&self) -> State {
        self.state
    }

    /// Outcome of the most recent submission attempt, if any.
    pub fn last_post(&self) -> Option<&PostResult> {
        self.last_post.as_ref()
    }

    /// Run one state of the machine.
    ///
    /// The only error is a failed token acquisition before the first cycle.
    pub async fn step(&mut self) -> Result<Transition> {
        match self.state {
            State::AcquireToken => self.acquire_token().await,
            State::Cycle => Ok(self.cycle().await),
        }
    }

    async fn acquire_token(&mut self) -> Result<Transition> {
        if let Some(token) = self.store.load() {
            info!("Using cached access token ({})", self.store.backend_name());
            return Ok(self.enter_cycle(token));
        }

        match self.auth.try_authenticate(&self.credentials).await {
            Ok(token) => {
                info!("Obtained a new access token for {}", self.credentials.username);
                if let Err(e) = self.store.save(&token) {
                    warn!("Could not cache access token, using it for this run only: {}", e);
                }
                Ok(self.enter_cycle(token))
            }
            Err(e) if !self.started => {
                error!("Token generation failed: {}", e);
                Err(e.into())
            }
            Err(e) => {
                error!("Token generation failed: {}", e);
                let delay = self.schedule.retry_delay();
                warn!("Retrying token acquisition in {}s", delay.as_secs());
                Ok(Transition::Retry(delay))
            }
        }
    }

    fn enter_cycle(&mut self, token: AccessToken) -> Transition {
        self.token = Some(token);
        self.state = State::Cycle;
        self.started = true;
        Transition::Continue
    }

    async fn cycle(&mut self) -> Transition {
        let Some(token) = self.token.clone() else {
            self.state = State::AcquireToken;
            return Transition::Continue;
        };

        let story = match self.generator.generate().await {
            Some(story) if story.is_publishable() => story,
            Some(_) => {
                let delay = self.schedule.retry_delay();
                warn!(
                    "Generated story has an empty title or body, retrying in {}s",
                    delay.as_secs()
                );
                return Transition::Retry(delay);
            }
            None => {
                let delay = self.schedule.retry_delay();
                warn!("Failed to generate story, retrying in {}s", delay.as_secs());
                return Transition::Retry(delay);
            }
        };

        let body = strip_story_prefix(&story.body).trim();
        info!("Publishing \"{}\" to {}", story.title, self.publisher.profile_name());

        let outcome = self.publisher.try_publish(&token, &story.title, body).await;
        let result = match outcome {
            Ok(response) => {
                info!("Reddit response: {}", response.body);
                PostResult::succeeded(response)
            }
            Err(e) => {
                error!("Request failed: {}", e);
                if e.is_unauthorized() {
                    self.invalidate_token();
                }
                PostResult::failed(e.to_string())
            }
        };
        self.last_post = Some(result);

        let interval = self.schedule.interval();
        info!("Next story in {}s", interval.as_secs());
        Transition::Wait(interval)
    }

    fn invalidate_token(&mut self) {
        warn!("Access token rejected, discarding cached token");
        self.token = None;
        if let Err(e) = self.store.clear() {
            warn!("Could not remove cached token: {}", e);
        }
        self.state = State::AcquireToken;
    }

    /// Loop until `shutdown` is raised.
    pub async fn run(&mut self, shutdown: Arc<AtomicBool>) -> Result<()> {
        info!(
            "Scheduler starting (interval {}s, retry delay {}s)",
            self.schedule.interval_secs, self.schedule.retry_delay_secs
        );

        while !shutdown.load(Ordering::Relaxed) {
            let transition = self.step().await?;
            if let Some(delay) = transition.delay() {
                if shutdown.load(Ordering::Relaxed) {
                    break;
                }
                self.sleeper.sleep(delay).await;
            }
        }

        info!("Shutdown requested, scheduler stopped");
        Ok(())
    }

    /// Acquire a token if needed and run a single cycle without the trailing wait.
    pub async fn run_once(&mut self) -> Result<Option<PostResult>> {
        if self.state == State::AcquireToken {
            self.step().await?;
        }
        if self.state == State::Cycle {
            self.step().await?;
        }
        Ok(self.last_post.clone())
    }
}
