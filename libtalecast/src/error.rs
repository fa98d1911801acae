//! Error types for Talecast
//!
//! Each component owns one error enum. Everything except the initial token
//! acquisition is converted into an absence result at the component boundary,
//! so these types mostly travel as far as a log line.

use std::path::PathBuf;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, TalecastError>;

#[derive(Error, Debug)]
pub enum TalecastError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Authentication error: {0}")]
    Auth(#[from] AuthError),

    #[error("Generation error: {0}")]
    Generation(#[from] GenerationError),

    #[error("Publish error: {0}")]
    Publish(#[from] PublishError),

    #[error("Token storage error: {0}")]
    Persistence(#[from] PersistenceError),

    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl TalecastError {
    /// Returns the appropriate exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            TalecastError::Auth(_) => 2,
            TalecastError::Config(_) => 3,
            _ => 1,
        }
    }
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Missing required field: {0}")]
    MissingField(String),

    #[error("Invalid value for {field}: {reason}")]
    InvalidValue { field: String, reason: String },
}

/// Network-level failure: the request never produced an HTTP status.
#[derive(Error, Debug, Clone)]
pub enum TransportError {
    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Connection failed: {0}")]
    Connect(String),

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("Network error: {0}")]
    Network(String),
}

#[derive(Error, Debug, Clone)]
pub enum AuthError {
    #[error("Missing credential: {0}")]
    MissingCredential(&'static str),

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("Token endpoint returned HTTP {status}: {body}")]
    Rejected { status: u16, body: String },

    #[error("Token request denied: {0}")]
    Denied(String),

    #[error("Malformed token response: {0}")]
    MalformedResponse(String),
}

#[derive(Error, Debug, Clone)]
pub enum GenerationError {
    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("Generation endpoint returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Malformed completion response: {0}")]
    MalformedResponse(String),

    #[error("Completion response contained no choices")]
    NoChoices,
}

#[derive(Error, Debug, Clone)]
pub enum PublishError {
    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("Submission endpoint returned HTTP {status}: {body}")]
    Rejected { status: u16, body: String },
}

impl PublishError {
    /// Whether the platform refused the access token itself.
    ///
    /// A cached token is trusted until this returns true for a submission.
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, PublishError::Rejected { status: 401 | 403, .. })
    }
}

#[derive(Error, Debug)]
pub enum PersistenceError {
    #[error("Failed to read token file '{}': {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write token file '{}': {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Refusing to store an empty token")]
    EmptyToken,
}
