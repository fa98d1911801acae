//! tale-send - Background daemon that posts a generated story every hour
//!
//! Obtains (or reuses) a Reddit access token, then loops: generate a story,
//! post it to the user's profile, wait.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use libtalecast::error::ConfigError;
use libtalecast::{Config, Scheduler, TalecastError};
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(name = "tale-send")]
#[command(version)]
#[command(about = "Background daemon that posts a generated story every hour")]
#[command(long_about = "\
tale-send - Background daemon that posts a generated story every hour

DESCRIPTION:
    tale-send asks a Mistral agent for a short horror story, cleans up the
    markup, and submits it as a text post to your own Reddit profile. It
    then waits and does it again, forever.

    The Reddit access token is cached in a file and reused across restarts.
    If Reddit rejects the cached token it is discarded and a new one is
    requested.

USAGE:
    # Run in foreground (logs to stderr)
    tale-send

    # Post every 30 minutes, retry failed generations after 5 minutes
    tale-send --interval 30m --retry-delay 5m

    # Enable verbose logging
    tale-send --verbose

ENVIRONMENT:
    REDDIT_CLIENT_ID, REDDIT_CLIENT_SECRET   Reddit script app credentials
    REDDIT_USERNAME, REDDIT_PASSWORD         Account that owns the profile
    MISTRAL_API_KEY, MISTRAL_AGENT_ID        Story generation agent
    TALECAST_CONFIG                          Config file path (optional)
    TALECAST_LOG_FORMAT                      text, json or pretty
    TALECAST_LOG_LEVEL                       error, warn, info, debug, trace

SIGNALS:
    SIGTERM, SIGINT - Graceful shutdown (finishes the current request)

CONFIGURATION:
    Configuration file: ~/.config/talecast/config.toml
    Token cache:        ~/.local/share/talecast/token.txt

    [schedule]
    interval_secs = 3600     # wait after every post attempt
    retry_delay_secs = 3600  # wait after a failed generation

EXIT CODES:
    0 - Clean shutdown
    1 - Runtime error
    2 - Authentication failed at startup
    3 - Configuration error
")]
struct Cli {
    /// Time between posts (overrides config)
    #[arg(long, value_name = "DURATION", value_parser = humantime::parse_duration)]
    #[arg(help = "Time between posts, e.g. 1h or 45m (default: 1h)")]
    interval: Option<Duration>,

    /// Back-off after a failed generation (overrides config)
    #[arg(long, value_name = "DURATION", value_parser = humantime::parse_duration)]
    #[arg(help = "Wait after a failed generation, e.g. 10m (default: 1h)")]
    retry_delay: Option<Duration>,

    /// Token cache location (overrides config)
    #[arg(long, value_name = "PATH")]
    token_path: Option<PathBuf>,

    /// Enable verbose logging to stderr
    #[arg(short, long)]
    #[arg(help = "Enable verbose logging (useful for debugging)")]
    verbose: bool,

    /// Run once and exit (for testing)
    #[arg(long, hide = true)]
    #[arg(help = "Acquire a token, run a single cycle and exit (for testing)")]
    once: bool,
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let cli = Cli::parse();

    libtalecast::logging::config_from_env(cli.verbose).init();

    if let Err(e) = run(cli).await {
        eprintln!("Error: {:#}", e);
        let code = e
            .downcast_ref::<TalecastError>()
            .map(TalecastError::exit_code)
            .unwrap_or(1);
        std::process::exit(code);
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let mut config = Config::load()?;
    apply_overrides(&mut config, &cli)?;

    info!("tale-send daemon starting as u/{}", config.reddit.credentials.username);

    let shutdown = Arc::new(AtomicBool::new(false));
    setup_signal_handlers(shutdown.clone()).context("Signal setup failed")?;

    let mut scheduler = Scheduler::from_config(&config, shutdown.clone())?;

    if cli.once {
        match scheduler.run_once().await? {
            Some(post) if post.success => info!("tale-send: posted once, exiting"),
            Some(post) => warn!(
                "tale-send: post failed ({}), exiting",
                post.error.as_deref().unwrap_or("unknown error")
            ),
            None => warn!("tale-send: nothing was posted, exiting"),
        }
    } else {
        scheduler.run(shutdown).await?;
    }

    info!("tale-send daemon stopped");
    Ok(())
}

fn apply_overrides(config: &mut Config, cli: &Cli) -> libtalecast::Result<()> {
    if let Some(interval) = cli.interval {
        config.schedule.interval_secs = whole_seconds("--interval", interval)?;
    }
    if let Some(retry_delay) = cli.retry_delay {
        config.schedule.retry_delay_secs = whole_seconds("--retry-delay", retry_delay)?;
    }
    if let Some(path) = &cli.token_path {
        config.storage.token_path = path.to_string_lossy().into_owned();
    }
    Ok(())
}

fn whole_seconds(flag: &str, duration: Duration) -> libtalecast::Result<u64> {
    match duration.as_secs() {
        0 => Err(ConfigError::InvalidValue {
            field: flag.to_string(),
            reason: "must be at least one second".to_string(),
        }
        .into()),
        secs => Ok(secs),
    }
}

/// Set up signal handlers for graceful shutdown
#[cfg(unix)]
fn setup_signal_handlers(shutdown: Arc<AtomicBool>) -> std::io::Result<()> {
    use signal_hook::consts::{SIGINT, SIGTERM};
    use signal_hook::iterator::Signals;

    let mut signals = Signals::new([SIGINT, SIGTERM])?;

    std::thread::spawn(move || {
        if let Some(signal) = signals.forever().next() {
            info!("Received signal {}, stopping gracefully...", signal);
            shutdown.store(true, Ordering::Relaxed);
        }
    });

    Ok(())
}

#[cfg(not(unix))]
fn setup_signal_handlers(_shutdown: Arc<AtomicBool>) -> std::io::Result<()> {
    warn!("Graceful shutdown signals are not supported on this platform");
    Ok(())
}
