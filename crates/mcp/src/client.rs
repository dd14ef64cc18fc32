//! Stdio session with an MCP server (spawn, exchange lines, lifecycle).

use std::collections::HashMap;
use std::process::Stdio;
use std::time::Duration;

use serde::Serialize;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStderr, ChildStdin, ChildStdout, Command};
use tokio::sync::mpsc;
use tokio::time::{sleep, timeout};

use crate::error::{Error, Result};
use crate::observer::{Observer, Silent};
use crate::protocol::{
    ClientInfo, InitializeParams, JsonRpcRequest, Reply, RequestId, methods,
};

/// Default time to wait for a response line.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Configuration for an MCP server.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub name: String,
    pub command: String,
    pub args: Vec<String>,
    pub env: HashMap<String, String>,
}

impl ServerConfig {
    /// A server launched as `command` with no arguments.
    pub fn command(command: impl Into<String>) -> Self {
        let command = command.into();
        Self {
            name: command.clone(),
            command,
            args: Vec::new(),
            env: HashMap::new(),
        }
    }

    pub fn with_args(mut self, args: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }
}

/// Settle delays and timeouts applied by [`Client`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timings {
    /// Pause after spawning so the server can finish its own startup.
    pub start_settle: Duration,
    /// Pause after the `initialized` notification.
    pub notify_settle: Duration,
    /// Pause between the `shutdown` request and killing the process.
    pub shutdown_settle: Duration,
    /// Upper bound on waiting for the process to exit once killed.
    pub kill_timeout: Duration,
    /// Timeout used by [`Client::receive_default`] and the handshake.
    pub response_timeout: Duration,
}

impl Default for Timings {
    fn default() -> Self {
        Self {
            start_settle: Duration::from_millis(500),
            notify_settle: Duration::from_millis(500),
            shutdown_settle: Duration::from_millis(500),
            kill_timeout: Duration::from_secs(2),
            response_timeout: DEFAULT_TIMEOUT,
        }
    }
}

/// Lifecycle of a [`Client`]. There is no way back from `Terminated`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Uninitialized,
    Started,
    Ready,
    Terminated,
}

struct Running {
    child: Child,
    stdin: ChildStdin,
    pending: mpsc::UnboundedReceiver<String>,
}

/// One session with one server process.
///
/// Responses are matched to requests by arrival order only: `receive`
/// returns the next line the server produced, whatever its `id`.
pub struct Client {
    config: ServerConfig,
    timings: Timings,
    handshake: InitializeParams,
    observer: Box<dyn Observer>,
    state: SessionState,
    next_id: i64,
    running: Option<Running>,
}

impl Client {
    pub fn new(config: ServerConfig) -> Self {
        Self {
            config,
            timings: Timings::default(),
            handshake: InitializeParams::default(),
            observer: Box::new(Silent),
            state: SessionState::Uninitialized,
            next_id: 1,
            running: None,
        }
    }

    pub fn with_timings(mut self, timings: Timings) -> Self {
        self.timings = timings;
        self
    }

    pub fn with_client_info(mut self, client_info: ClientInfo) -> Self {
        self.handshake.client_info = client_info;
        self
    }

    pub fn with_protocol_version(mut self, version: impl Into<String>) -> Self {
        self.handshake.protocol_version = version.into();
        self
    }

    pub fn with_observer(mut self, observer: impl Observer + 'static) -> Self {
        self.observer = Box::new(observer);
        self
    }

    /// Get the server name.
    pub fn server_name(&self) -> &str {
        &self.config.name
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn timings(&self) -> &Timings {
        &self.timings
    }

    /// OS process id of the server, while it is running.
    pub fn pid(&self) -> Option<u32> {
        self.running.as_ref().and_then(|r| r.child.id())
    }

    /// Spawn the server and start collecting its output.
    ///
    /// stdout and stderr are merged into one stream of lines. An early exit
    /// of the server is not reported here; it shows up on the next
    /// `send` or `receive`.
    pub async fn start(&mut self) -> Result<()> {
        match self.state {
            SessionState::Uninitialized => {}
            SessionState::Terminated => return Err(Error::Terminated),
            SessionState::Started | SessionState::Ready => return Err(Error::AlreadyStarted),
        }

        let mut cmd = Command::new(&self.config.command);
        cmd.args(&self.config.args)
            .envs(&self.config.env)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let mut child = cmd.spawn().map_err(|source| Error::Spawn {
            command: self.config.command.clone(),
            source,
        })?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| std::io::Error::other("failed to capture stdin"))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| std::io::Error::other("failed to capture stdout"))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| std::io::Error::other("failed to capture stderr"))?;

        let (tx, pending) = mpsc::unbounded_channel();
        tokio::spawn(pump_output(stdout, stderr, tx));

        tracing::info!(
            server = %self.config.name,
            pid = ?child.id(),
            "server started"
        );

        self.running = Some(Running {
            child,
            stdin,
            pending,
        });
        self.state = SessionState::Started;

        sleep(self.timings.start_settle).await;
        Ok(())
    }

    /// Write one request as a single line.
    pub async fn send(&mut self, request: &JsonRpcRequest) -> Result<()> {
        live(self.state, &mut self.running)?;

        let line = serde_json::to_string(request)?;
        if line.contains('\n') {
            return Err(Error::EmbeddedNewline);
        }

        self.observer.on_send(request);
        tracing::debug!(method = %request.method, "-> {line}");

        let running = live(self.state, &mut self.running)?;
        running.stdin.write_all(line.as_bytes()).await?;
        running.stdin.write_all(b"\n").await?;
        running.stdin.flush().await?;
        Ok(())
    }

    /// Send a request with the next id and return that id.
    pub async fn request<P>(&mut self, method: &str, params: Option<P>) -> Result<RequestId>
    where
        P: Serialize,
    {
        let id = self.next_request_id();
        let mut request = JsonRpcRequest::new(id.clone(), method);
        if let Some(p) = params {
            request = request.with_params(p);
        }
        self.send(&request).await?;
        Ok(id)
    }

    /// Send a notification (no id, no response expected).
    pub async fn notify<P>(&mut self, method: &str, params: Option<P>) -> Result<()>
    where
        P: Serialize,
    {
        let mut notification = JsonRpcRequest::notification(method);
        if let Some(p) = params {
            notification = notification.with_params(p);
        }
        self.send(&notification).await
    }

    /// Wait up to `wait` for the next line from the server.
    ///
    /// Returns `Ok(None)` on timeout and [`Error::ServerExited`] once the
    /// server's output has ended and every queued line was consumed.
    pub async fn receive(&mut self, wait: Duration) -> Result<Option<Reply>> {
        let running = live(self.state, &mut self.running)?;

        match timeout(wait, running.pending.recv()).await {
            Ok(Some(line)) => {
                let reply = Reply::parse(line);
                self.observer.on_reply(&reply);
                Ok(Some(reply))
            }
            Ok(None) => Err(Error::ServerExited),
            Err(_) => {
                tracing::debug!(server = %self.config.name, "no response within {wait:?}");
                self.observer.on_timeout(wait);
                Ok(None)
            }
        }
    }

    /// [`Client::receive`] with the configured response timeout.
    pub async fn receive_default(&mut self) -> Result<Option<Reply>> {
        self.receive(self.timings.response_timeout).await
    }

    /// Drop every line queued so far without waiting. Returns how many.
    pub fn drain_pending(&mut self) -> usize {
        let Some(running) = self.running.as_mut() else {
            return 0;
        };
        let mut dropped = 0;
        while running.pending.try_recv().is_ok() {
            dropped += 1;
        }
        if dropped > 0 {
            tracing::debug!(dropped, "discarded stale output");
        }
        dropped
    }

    /// Drain stale output, send a request and wait for the next line.
    pub async fn call<P>(
        &mut self,
        method: &str,
        params: Option<P>,
        wait: Duration,
    ) -> Result<Option<Reply>>
    where
        P: Serialize,
    {
        self.drain_pending();
        self.request(method, params).await?;
        self.receive(wait).await
    }

    /// Perform the `initialize` / `initialized` handshake.
    ///
    /// Does nothing once the session is ready.
    pub async fn initialize(&mut self) -> Result<()> {
        match self.state {
            SessionState::Ready => return Ok(()),
            SessionState::Uninitialized => return Err(Error::NotStarted),
            SessionState::Terminated => return Err(Error::Terminated),
            SessionState::Started => {}
        }

        let params = self.handshake.clone();
        self.request(methods::INITIALIZE, Some(params)).await?;

        let wait = self.timings.response_timeout;
        if self.receive(wait).await?.is_none() {
            return Err(Error::InitializeTimeout(wait));
        }

        self.notify(methods::INITIALIZED, None::<()>).await?;
        sleep(self.timings.notify_settle).await;

        self.state = SessionState::Ready;
        tracing::info!(server = %self.config.name, "session ready");
        Ok(())
    }

    /// Check if the server process is still running.
    pub fn is_running(&mut self) -> bool {
        match self.running.as_mut() {
            Some(running) => matches!(running.child.try_wait(), Ok(None)),
            None => false,
        }
    }

    /// Ask the server to shut down, then terminate it.
    pub async fn shutdown(&mut self) -> Result<()> {
        if self.state == SessionState::Terminated {
            return Ok(());
        }

        if self.is_running() {
            // Best effort: the process is killed regardless.
            if let Err(e) = self.request(methods::SHUTDOWN, Some(serde_json::json!({}))).await {
                tracing::warn!(server = %self.config.name, "shutdown request failed: {e}");
            }
            sleep(self.timings.shutdown_settle).await;
        }

        self.terminate().await
    }

    /// Kill the server without a `shutdown` request and wait for it to exit.
    pub async fn terminate(&mut self) -> Result<()> {
        self.state = SessionState::Terminated;
        let Some(Running {
            mut child, stdin, ..
        }) = self.running.take()
        else {
            return Ok(());
        };
        drop(stdin);

        if let Err(e) = child.start_kill() {
            tracing::debug!(server = %self.config.name, "kill failed: {e}");
        }

        let limit = self.timings.kill_timeout;
        let status = timeout(limit, child.wait())
            .await
            .map_err(|_| Error::ExitTimeout(limit))??;

        tracing::info!(server = %self.config.name, %status, "server terminated");
        Ok(())
    }

    // --- Internal methods ---

    fn next_request_id(&mut self) -> RequestId {
        let id = self.next_id;
        self.next_id += 1;
        RequestId::Number(id)
    }
}

fn live(state: SessionState, running: &mut Option<Running>) -> Result<&mut Running> {
    match (state, running.as_mut()) {
        (SessionState::Terminated, _) => Err(Error::Terminated),
        (_, Some(running)) => Ok(running),
        (_, None) => Err(Error::NotStarted),
    }
}

/// Forward lines from both output streams until both end or the
/// receiving side goes away.
async fn pump_output(
    stdout: ChildStdout,
    stderr: ChildStderr,
    tx: mpsc::UnboundedSender<String>,
) {
    let mut stdout = BufReader::new(stdout).lines();
    let mut stderr = BufReader::new(stderr).lines();
    let mut stdout_open = true;
    let mut stderr_open = true;

    while (stdout_open || stderr_open) && !tx.is_closed() {
        tokio::select! {
            line = stdout.next_line(), if stdout_open => {
                stdout_open = forward("stdout", line, &tx);
            }
            line = stderr.next_line(), if stderr_open => {
                stderr_open = forward("stderr", line, &tx);
            }
        }
    }

    tracing::debug!("server output closed");
}

/// Queue one line. Returns whether the stream is still open.
fn forward(
    stream: &'static str,
    line: std::io::Result<Option<String>>,
    tx: &mpsc::UnboundedSender<String>,
) -> bool {
    match line {
        Ok(Some(line)) => {
            let line = line.trim();
            if !line.is_empty() {
                tracing::debug!(stream, "<- {line}");
                let _ = tx.send(line.to_string());
            }
            true
        }
        Ok(None) => false,
        Err(e) => {
            tracing::warn!(stream, "failed to read server output: {e}");
            false
        }
    }
}
