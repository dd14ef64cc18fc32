//! Console transcript of the traffic with the server.

use std::time::Duration;

use mcp::{JsonRpcRequest, Observer, Reply};
use serde::Serialize;

/// How transcript entries are laid out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Layout {
    /// Entries indented under the current test heading.
    Indented,
    /// Entries separated by blank lines.
    Spaced,
}

impl Layout {
    /// Prefix of an entry line and indent of pretty-printed bodies.
    fn margins(self) -> (&'static str, &'static str) {
        match self {
            Layout::Indented => ("  ", "    "),
            Layout::Spaced => ("\n", "  "),
        }
    }
}

/// Prints `→` for every request and `←` for every reply.
#[derive(Debug, Clone, Copy)]
pub struct Transcript {
    pretty: bool,
    layout: Layout,
}

impl Transcript {
    pub fn new(pretty: bool, layout: Layout) -> Self {
        Self { pretty, layout }
    }

    pub fn request_text(&self, request: &JsonRpcRequest) -> String {
        let (lead, indent) = self.layout.margins();
        if self.pretty {
            format!("{lead}→ Request:\n{}", indented(request, indent))
        } else {
            // Same serialization the client writes to the server.
            let line = serde_json::to_string(request).unwrap_or_default();
            format!("{lead}→ {line}")
        }
    }

    pub fn reply_text(&self, reply: &Reply) -> String {
        let (lead, indent) = self.layout.margins();
        match reply {
            Reply::Message(value) if self.pretty => {
                format!("{lead}← Response:\n{}", indented(value, indent))
            }
            _ => format!("{lead}← {reply}"),
        }
    }

    pub fn timeout_text(&self, waited: Duration) -> String {
        let (lead, _) = self.layout.margins();
        format!("{lead}← (no response within {}s)", waited.as_secs_f64())
    }
}

fn indented(value: &impl Serialize, indent: &str) -> String {
    let pretty = serde_json::to_string_pretty(value).unwrap_or_default();
    let body = pretty.replace('\n', &format!("\n{indent}"));
    format!("{indent}{body}")
}

impl Observer for Transcript {
    fn on_send(&self, request: &JsonRpcRequest) {
        println!("{}", self.request_text(request));
    }

    fn on_reply(&self, reply: &Reply) {
        println!("{}", self.reply_text(reply));
    }

    fn on_timeout(&self, waited: Duration) {
        println!("{}", self.timeout_text(waited));
    }
}
