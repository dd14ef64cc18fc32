//! Hooks for watching the traffic of a [`Client`](crate::Client).

use std::time::Duration;

use crate::protocol::{JsonRpcRequest, Reply};

/// Receives every message a client sends and every line it hands back.
///
/// All methods default to doing nothing.
pub trait Observer: Send + Sync {
    fn on_send(&self, _request: &JsonRpcRequest) {}

    fn on_reply(&self, _reply: &Reply) {}

    /// `receive` gave up after waiting `_waited`.
    fn on_timeout(&self, _waited: Duration) {}
}

/// Observer that ignores everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct Silent;

impl Observer for Silent {}
