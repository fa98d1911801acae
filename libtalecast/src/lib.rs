//! Talecast - generated horror stories posted to a Reddit profile
//!
//! This library provides the pieces of the posting bot: token acquisition
//! and caching, story generation, text cleanup, submission, and the loop
//! that ties them together on a fixed schedule.

pub mod auth;
pub mod config;
pub mod credentials;
pub mod error;
pub mod generator;
pub mod http;
pub mod logging;
pub mod mock;
pub mod normalize;
pub mod publisher;
pub mod scheduler;
pub mod types;

// Re-export commonly used types
pub use config::Config;
pub use credentials::{Credentials, FileTokenStore, TokenStore};
pub use error::{Result, TalecastError};
pub use scheduler::{Scheduler, Sleeper};
pub use types::{AccessToken, GeneratedStory, PostResult};
