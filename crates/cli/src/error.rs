//! CLI error types.

use crate::config::ConfigError;
use thiserror::Error;

/// CLI errors.
///
/// This enum is marked `#[non_exhaustive]` to allow adding new variants
/// in future versions without breaking downstream code.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// Configuration is unreadable or invalid.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The session with the server failed.
    #[error(transparent)]
    Mcp(#[from] mcp::Error),

    /// An I/O error occurred (terminal input, mostly).
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
