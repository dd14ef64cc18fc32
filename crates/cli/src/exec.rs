//! Remote Python execution through the server's `execute-python` tool.

use std::time::Duration;

use mcp::{CallToolParams, CallToolResult, Client, Reply, SessionState, methods};
use serde_json::{Map, Value};
use tokio::io::{AsyncBufReadExt, BufReader};

use crate::error::Result;
use crate::snippets::SNIPPETS;

/// Name of the code execution tool.
pub const EXECUTE_TOOL: &str = "execute-python";

/// Per-run settings for the exec harness.
#[derive(Debug, Clone, Copy)]
pub struct ExecOptions {
    pub call_timeout: Duration,
    pub example_pause: Duration,
    /// Pause after printing a result so trailing server output lands first.
    pub result_pause: Duration,
}

/// Text produced by one execution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Execution {
    pub text: String,
    pub is_error: bool,
}

/// `tools/call` params for running `code`, installing `modules` first.
///
/// `modules` is a comma-separated list passed through unchanged; a blank
/// list is left out.
pub fn tool_call(code: &str, modules: Option<&str>) -> CallToolParams {
    let mut arguments = Map::new();
    arguments.insert("code".to_string(), Value::from(code));
    if let Some(modules) = modules.map(str::trim).filter(|m| !m.is_empty()) {
        arguments.insert("modules".to_string(), Value::from(modules));
    }
    CallToolParams {
        name: EXECUTE_TOOL.to_string(),
        arguments: Some(Value::Object(arguments)),
    }
}

/// Pull the first text block out of a `tools/call` response.
pub fn execution_output(reply: &Reply) -> Option<Execution> {
    let result = reply.as_response()?.into_result().ok()?;
    let result: CallToolResult = serde_json::from_value(result).ok()?;
    let text = result.first_text()?.to_string();
    Some(Execution {
        text,
        is_error: result.is_error,
    })
}

/// Initialize if needed. Returns false when the server never answered.
async fn ensure_ready(client: &mut Client) -> Result<bool> {
    if client.state() == SessionState::Ready {
        return Ok(true);
    }
    println!("\n=== Initializing MCP Server ===");
    // A startup banner must not pass for the initialize response.
    client.drain_pending();
    match client.initialize().await {
        Ok(()) => Ok(true),
        Err(mcp::Error::InitializeTimeout(_)) => {
            println!("Failed to initialize server");
            Ok(false)
        }
        Err(e) => Err(e.into()),
    }
}

/// Run one piece of code and print its output.
pub async fn execute(
    client: &mut Client,
    code: &str,
    modules: Option<&str>,
    opts: &ExecOptions,
) -> Result<Option<Execution>> {
    if !ensure_ready(client).await? {
        return Ok(None);
    }

    println!("\n=== Executing Python Code ===");
    if let Some(modules) = modules {
        println!("Modules to install: {modules}");
    }
    println!("Code:\n{code}\n");

    let reply = client
        .call(methods::TOOLS_CALL, Some(tool_call(code, modules)), opts.call_timeout)
        .await?;

    let output = reply.as_ref().and_then(execution_output);
    if let Some(output) = &output {
        if output.is_error {
            println!("\n=== Execution Result (tool error) ===");
        } else {
            println!("\n=== Execution Result ===");
        }
        println!("{}", output.text);
        tokio::time::sleep(opts.result_pause).await;
    }
    Ok(output)
}

/// Start the server and run the bundled snippets.
pub async fn run_examples(client: &mut Client, opts: &ExecOptions) -> Result<()> {
    println!("Starting {}...", client.server_name());
    client.start().await?;

    if !ensure_ready(client).await? {
        return Ok(());
    }

    for (n, snippet) in SNIPPETS.iter().enumerate() {
        if n > 0 {
            tokio::time::sleep(opts.example_pause).await;
        }
        println!("\n{}", "=".repeat(60));
        println!("Example {}: {}", n + 1, snippet.title);
        println!("{}", "=".repeat(60));
        execute(client, snippet.code, snippet.modules, opts).await?;
    }
    Ok(())
}

/// Start the server and run a single piece of code.
pub async fn run_once(
    client: &mut Client,
    code: &str,
    modules: Option<&str>,
    opts: &ExecOptions,
) -> Result<()> {
    println!("Starting {}...", client.server_name());
    client.start().await?;
    execute(client, code, modules, opts).await?;
    Ok(())
}

/// One line typed in interactive mode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputLine {
    /// `EXIT`: leave interactive mode.
    Exit,
    /// `EOF`: run what was entered so far.
    Run,
    /// `MODULES: a,b`: modules for the next run.
    Modules(String),
    Code(String),
}

impl InputLine {
    pub fn classify(line: &str) -> Self {
        match line {
            "EXIT" => Self::Exit,
            "EOF" => Self::Run,
            _ => match line.strip_prefix("MODULES:") {
                Some(modules) => Self::Modules(modules.trim().to_string()),
                None => Self::Code(line.to_string()),
            },
        }
    }
}

/// Code collected between two runs.
#[derive(Debug, Default)]
pub struct Entry {
    lines: Vec<String>,
    modules: Option<String>,
}

impl Entry {
    pub fn push(&mut self, line: InputLine) {
        match line {
            InputLine::Modules(modules) => self.modules = Some(modules),
            InputLine::Code(code) => self.lines.push(code),
            InputLine::Exit | InputLine::Run => {}
        }
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn code(&self) -> String {
        self.lines.join("\n")
    }

    pub fn modules(&self) -> Option<&str> {
        self.modules.as_deref().filter(|m| !m.is_empty())
    }
}

/// Start the server and execute code typed on stdin.
pub async fn run_interactive(client: &mut Client, opts: &ExecOptions) -> Result<()> {
    println!("Starting {}...", client.server_name());
    client.start().await?;

    if !ensure_ready(client).await? {
        return Ok(());
    }

    println!("\n=== Interactive Python Execution Mode ===");
    println!("Enter Python code (use 'EOF' on a single line to execute)");
    println!("Use 'MODULES: module1,module2' to specify modules to install");
    println!("Type 'EXIT' to quit\n");

    let mut input = BufReader::new(tokio::io::stdin()).lines();
    loop {
        println!("\n>>> Enter code (EOF to execute, EXIT to quit):");

        let mut entry = Entry::default();
        let mut exhausted = false;
        loop {
            let Some(line) = input.next_line().await? else {
                exhausted = true;
                break;
            };
            match InputLine::classify(&line) {
                InputLine::Exit => return Ok(()),
                InputLine::Run => break,
                other => entry.push(other),
            }
        }

        if !entry.is_empty() {
            execute(client, &entry.code(), entry.modules(), opts).await?;
        }
        if exhausted {
            return Ok(());
        }
    }
}
