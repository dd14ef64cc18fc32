//! MCP (Model Context Protocol) stdio test client.
//!
//! This crate drives an MCP server process over its standard input/output:
//! one JSON-RPC message per line out, one line per reply back.
//!
//! # Example
//!
//! ```no_run
//! use mcp::{Client, ServerConfig, methods};
//!
//! # async fn example() -> mcp::Result<()> {
//! let mut client = Client::new(ServerConfig::command("python-mcp-server"));
//! client.start().await?;
//! client.initialize().await?;
//!
//! client.request(methods::TOOLS_LIST, Some(serde_json::json!({}))).await?;
//! match client.receive_default().await? {
//!     Some(reply) => println!("{reply}"),
//!     None => println!("no response"),
//! }
//!
//! client.shutdown().await?;
//! # Ok(())
//! # }
//! ```

mod client;
mod error;
mod observer;
mod protocol;

pub use client::{Client, DEFAULT_TIMEOUT, ServerConfig, SessionState, Timings};
pub use error::{Error, Result};
pub use observer::{Observer, Silent};
pub use protocol::{
    CallToolParams, CallToolResult, ClientInfo, InitializeParams, JSONRPC_VERSION, JsonRpcError,
    JsonRpcRequest, JsonRpcResponse, PROTOCOL_VERSION, Reply, RequestId, ToolContent, methods,
};
