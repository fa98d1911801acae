//! Configuration management for Talecast
//!
//! Non-secret settings (endpoints, cadence, token location) come from an
//! optional TOML file. Credentials and API keys come only from the
//! environment.
//!
//! ```toml
//! [reddit]
//! user_agent = "talecast/0.1 by u_spooky_teller"
//!
//! [schedule]
//! interval_secs = 3600
//! retry_delay_secs = 3600
//!
//! [storage]
//! token_path = "~/.local/share/talecast/token.txt"
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use secrecy::SecretString;
use serde::{Deserialize, Serialize};

use crate::credentials::Credentials;
use crate::error::{ConfigError, Result};

pub const ENV_CONFIG_PATH: &str = "TALECAST_CONFIG";
pub const ENV_MISTRAL_API_KEY: &str = "MISTRAL_API_KEY";
pub const ENV_MISTRAL_AGENT_ID: &str = "MISTRAL_AGENT_ID";

pub const DEFAULT_AUTH_URL: &str = "https://www.reddit.com/api/v1/access_token";
pub const DEFAULT_SUBMIT_URL: &str = "https://oauth.reddit.com/api/submit";
pub const DEFAULT_GENERATION_URL: &str = "https://api.mistral.ai/v1/agents/completions";
pub const DEFAULT_PROMPT: &str = "Generate a short horror story with a title.";
pub const DEFAULT_MAX_TOKENS: u32 = 500;
pub const DEFAULT_INTERVAL_SECS: u64 = 3600;
pub const DEFAULT_USER_AGENT: &str = concat!("talecast/", env!("CARGO_PKG_VERSION"));

/// Fully resolved runtime configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub reddit: RedditConfig,
    pub mistral: MistralConfig,
    pub schedule: ScheduleConfig,
    pub storage: StorageConfig,
    pub http: HttpConfig,
}

#[derive(Debug, Clone)]
pub struct RedditConfig {
    pub credentials: Credentials,
    pub user_agent: String,
    pub auth_url: String,
    pub submit_url: String,
}

#[derive(Debug, Clone)]
pub struct MistralConfig {
    pub api_key: SecretString,
    pub agent_id: String,
    pub endpoint: String,
    pub max_tokens: u32,
    pub prompt: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScheduleConfig {
    /// Wait after every publish attempt
    pub interval_secs: u64,
    /// Wait after a failed generation or token re-acquisition
    pub retry_delay_secs: u64,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            interval_secs: DEFAULT_INTERVAL_SECS,
            retry_delay_secs: DEFAULT_INTERVAL_SECS,
        }
    }
}

impl ScheduleConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_secs(self.retry_delay_secs)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub token_path: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            token_path: "~/.local/share/talecast/token.txt".to_string(),
        }
    }
}

impl StorageConfig {
    /// Token path with `~` expanded.
    pub fn expand_token_path(&self) -> PathBuf {
        PathBuf::from(shellexpand::tilde(&self.token_path).to_string())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    pub timeout_secs: u64,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self { timeout_secs: 30 }
    }
}

impl HttpConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// On-disk layout of `config.toml`. Holds no secrets.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FileConfig {
    pub reddit: RedditFileConfig,
    pub mistral: MistralFileConfig,
    pub schedule: ScheduleConfig,
    pub storage: StorageConfig,
    pub http: HttpConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RedditFileConfig {
    pub user_agent: String,
    pub auth_url: String,
    pub submit_url: String,
}

impl Default for RedditFileConfig {
    fn default() -> Self {
        Self {
            user_agent: DEFAULT_USER_AGENT.to_string(),
            auth_url: DEFAULT_AUTH_URL.to_string(),
            submit_url: DEFAULT_SUBMIT_URL.to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MistralFileConfig {
    pub endpoint: String,
    pub max_tokens: u32,
    pub prompt: String,
}

impl Default for MistralFileConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_GENERATION_URL.to_string(),
            max_tokens: DEFAULT_MAX_TOKENS,
            prompt: DEFAULT_PROMPT.to_string(),
        }
    }
}

impl FileConfig {
    pub fn load_from_path(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(ConfigError::ReadError)?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> Result<Self> {
        let config: FileConfig = toml::from_str(content).map_err(ConfigError::ParseError)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        let required = [
            ("reddit.auth_url", &self.reddit.auth_url),
            ("reddit.submit_url", &self.reddit.submit_url),
            ("reddit.user_agent", &self.reddit.user_agent),
            ("mistral.endpoint", &self.mistral.endpoint),
            ("storage.token_path", &self.storage.token_path),
        ];
        for (field, value) in required {
            if value.trim().is_empty() {
                return Err(ConfigError::MissingField(field.to_string()).into());
            }
        }

        if self.mistral.max_tokens == 0 {
            return Err(ConfigError::InvalidValue {
                field: "mistral.max_tokens".to_string(),
                reason: "must be greater than zero".to_string(),
            }
            .into());
        }
        if self.schedule.interval_secs == 0 || self.schedule.retry_delay_secs == 0 {
            return Err(ConfigError::InvalidValue {
                field: "schedule".to_string(),
                reason: "interval_secs and retry_delay_secs must be greater than zero".to_string(),
            }
            .into());
        }
        if self.http.timeout_secs == 0 {
            return Err(ConfigError::InvalidValue {
                field: "http.timeout_secs".to_string(),
                reason: "must be greater than zero".to_string(),
            }
            .into());
        }
        Ok(())
    }
}

impl Config {
    /// Load the file settings (if any) and the secrets from the environment.
    pub fn load() -> Result<Self> {
        let file = match std::env::var(ENV_CONFIG_PATH) {
            // An explicitly named file must exist
            Ok(path) => FileConfig::load_from_path(&expand(&path))?,
            Err(_) => {
                let default_path = default_config_path()?;
                if default_path.exists() {
                    FileConfig::load_from_path(&default_path)?
                } else {
                    tracing::debug!("No config file at {:?}, using defaults", default_path);
                    FileConfig::default()
                }
            }
        };
        Ok(Self::from_parts(file, Credentials::from_env(), mistral_secrets_from_env()))
    }

    /// Combine file settings with credentials and the Mistral key/agent.
    pub fn from_parts(
        file: FileConfig,
        credentials: Credentials,
        (api_key, agent_id): (SecretString, String),
    ) -> Self {
        Self {
            reddit: RedditConfig {
                credentials,
                user_agent: file.reddit.user_agent,
                auth_url: file.reddit.auth_url,
                submit_url: file.reddit.submit_url,
            },
            mistral: MistralConfig {
                api_key,
                agent_id,
                endpoint: file.mistral.endpoint,
                max_tokens: file.mistral.max_tokens,
                prompt: file.mistral.prompt,
            },
            schedule: file.schedule,
            storage: file.storage,
            http: file.http,
        }
    }
}

/// `MISTRAL_API_KEY` and `MISTRAL_AGENT_ID`; unset variables are blank.
pub fn mistral_secrets_from_env() -> (SecretString, String) {
    let api_key = std::env::var(ENV_MISTRAL_API_KEY).unwrap_or_default();
    let agent_id = std::env::var(ENV_MISTRAL_AGENT_ID).unwrap_or_default();
    (SecretString::from(api_key), agent_id)
}

fn expand(path: &str) -> PathBuf {
    PathBuf::from(shellexpand::tilde(path).to_string())
}

/// `<config_dir>/talecast/config.toml` (XDG layout on Linux)
pub fn default_config_path() -> Result<PathBuf> {
    let config_dir = dirs::config_dir()
        .ok_or_else(|| ConfigError::MissingField("config directory".to_string()))?;

    Ok(config_dir.join("talecast").join("config.toml"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TalecastError;
    use secrecy::ExposeSecret;
    use serial_test::serial;
    use tempfile::TempDir;

    #[test]
    fn test_empty_file_gives_defaults() {
        let config = FileConfig::parse("").unwrap();
        assert_eq!(config.reddit.auth_url, DEFAULT_AUTH_URL);
        assert_eq!(config.reddit.submit_url, DEFAULT_SUBMIT_URL);
        assert_eq!(config.mistral.endpoint, DEFAULT_GENERATION_URL);
        assert_eq!(config.mistral.max_tokens, 500);
        assert_eq!(config.mistral.prompt, DEFAULT_PROMPT);
        assert_eq!(config.schedule.interval(), Duration::from_secs(3600));
        assert_eq!(config.schedule.retry_delay(), Duration::from_secs(3600));
        assert_eq!(config.http.timeout(), Duration::from_secs(30));
    }

    #[test]
    fn test_partial_sections_keep_other_defaults() {
        let config = FileConfig::parse(
            r#"
[schedule]
interval_secs = 60

[reddit]
user_agent = "talecast-test"
"#,
        )
        .unwrap();

        assert_eq!(config.schedule.interval_secs, 60);
        assert_eq!(config.schedule.retry_delay_secs, 3600);
        assert_eq!(config.reddit.user_agent, "talecast-test");
        assert_eq!(config.reddit.auth_url, DEFAULT_AUTH_URL);
    }

    #[test]
    fn test_invalid_toml_is_parse_error() {
        let result = FileConfig::parse("invalid toml content [[[");
        assert!(matches!(
            result,
            Err(TalecastError::Config(ConfigError::ParseError(_)))
        ));
    }

    #[test]
    fn test_secrets_are_not_accepted_in_file() {
        let result = FileConfig::parse(
            r#"
[reddit]
password = "hunter2"
"#,
        );
        assert!(matches!(
            result,
            Err(TalecastError::Config(ConfigError::ParseError(_)))
        ));
    }

    #[test]
    fn test_blank_endpoint_is_rejected() {
        let result = FileConfig::parse(
            r#"
[mistral]
endpoint = ""
"#,
        );
        match result {
            Err(TalecastError::Config(ConfigError::MissingField(field))) => {
                assert_eq!(field, "mistral.endpoint")
            }
            other => panic!("Expected MissingField, got {:?}", other),
        }
    }

    #[test]
    fn test_zero_max_tokens_is_rejected() {
        let result = FileConfig::parse("[mistral]\nmax_tokens = 0\n");
        assert!(matches!(
            result,
            Err(TalecastError::Config(ConfigError::InvalidValue { .. }))
        ));
    }

    #[test]
    fn test_zero_interval_is_rejected() {
        let result = FileConfig::parse("[schedule]\ninterval_secs = 0\n");
        assert!(matches!(
            result,
            Err(TalecastError::Config(ConfigError::InvalidValue { .. }))
        ));
    }

    #[test]
    fn test_token_path_tilde_expansion() {
        let storage = StorageConfig {
            token_path: "~/talecast/token.txt".to_string(),
        };
        let expanded = storage.expand_token_path();
        assert!(!expanded.to_string_lossy().starts_with('~'));
        assert!(expanded.ends_with("talecast/token.txt"));
    }

    #[test]
    #[serial]
    fn test_load_from_explicit_path() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config.toml");
        let token_path = temp_dir.path().join("token.txt");
        std::fs::write(
            &config_path,
            format!(
                "[storage]\ntoken_path = \"{}\"\n",
                token_path.display().to_string().replace('\\', "/")
            ),
        )
        .unwrap();

        std::env::set_var(ENV_CONFIG_PATH, &config_path);
        std::env::set_var(ENV_MISTRAL_API_KEY, "mistral-key");
        std::env::set_var(ENV_MISTRAL_AGENT_ID, "ag:1234");

        let config = Config::load().unwrap();
        assert_eq!(config.storage.expand_token_path(), token_path);
        assert_eq!(config.mistral.api_key.expose_secret(), "mistral-key");
        assert_eq!(config.mistral.agent_id, "ag:1234");

        std::env::remove_var(ENV_CONFIG_PATH);
        std::env::remove_var(ENV_MISTRAL_API_KEY);
        std::env::remove_var(ENV_MISTRAL_AGENT_ID);
    }

    #[test]
    #[serial]
    fn test_explicit_missing_file_is_read_error() {
        let temp_dir = TempDir::new().unwrap();
        std::env::set_var(ENV_CONFIG_PATH, temp_dir.path().join("nope.toml"));

        let result = Config::load();
        assert!(matches!(
            result,
            Err(TalecastError::Config(ConfigError::ReadError(_)))
        ));

        std::env::remove_var(ENV_CONFIG_PATH);
    }

    #[test]
    #[serial]
    fn test_missing_secrets_do_not_fail_loading() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config.toml");
        std::fs::write(&config_path, "").unwrap();
        std::env::set_var(ENV_CONFIG_PATH, &config_path);
        std::env::remove_var(ENV_MISTRAL_API_KEY);
        std::env::remove_var(ENV_MISTRAL_AGENT_ID);

        let config = Config::load().unwrap();
        assert!(config.mistral.api_key.expose_secret().is_empty());
        assert!(config.mistral.agent_id.is_empty());

        std::env::remove_var(ENV_CONFIG_PATH);
    }
}
