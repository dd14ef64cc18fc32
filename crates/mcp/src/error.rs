//! MCP client error types.

use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("failed to spawn server `{command}`: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("server I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("server not started")]
    NotStarted,

    #[error("server already started")]
    AlreadyStarted,

    #[error("session already terminated")]
    Terminated,

    #[error("server exited unexpectedly")]
    ServerExited,

    #[error("no response to initialize within {0:?}")]
    InitializeTimeout(Duration),

    #[error("server did not exit within {0:?}")]
    ExitTimeout(Duration),

    #[error("failed to serialize request: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("serialized request spans multiple lines")]
    EmbeddedNewline,
}

pub type Result<T> = std::result::Result<T, Error>;
