//! Session tests against small POSIX stand-ins for a server.
#![cfg(unix)]

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use mcp::{
    Client, Error, JsonRpcRequest, Observer, Reply, RequestId, ServerConfig, SessionState,
    Timings, methods,
};
use serde_json::json;

fn fast_timings() -> Timings {
    Timings {
        start_settle: Duration::from_millis(50),
        notify_settle: Duration::from_millis(100),
        shutdown_settle: Duration::from_millis(50),
        kill_timeout: Duration::from_secs(2),
        response_timeout: Duration::from_secs(2),
    }
}

/// Echoes every line back unchanged.
fn echo_server() -> Client {
    Client::new(ServerConfig::command("cat")).with_timings(fast_timings())
}

/// Never writes anything.
fn silent_server() -> Client {
    Client::new(ServerConfig::command("sleep").with_args(["30"])).with_timings(fast_timings())
}

fn shell_server(script: &str) -> Client {
    Client::new(ServerConfig::command("sh").with_args(["-c", script])).with_timings(fast_timings())
}

#[derive(Clone, Default)]
struct Recorder {
    sent: Arc<Mutex<Vec<String>>>,
    timeouts: Arc<Mutex<u32>>,
}

impl Recorder {
    fn methods(&self) -> Vec<String> {
        self.sent.lock().unwrap().clone()
    }
}

impl Observer for Recorder {
    fn on_send(&self, request: &JsonRpcRequest) {
        self.sent.lock().unwrap().push(request.method.clone());
    }

    fn on_timeout(&self, _waited: Duration) {
        *self.timeouts.lock().unwrap() += 1;
    }
}

#[tokio::test]
async fn echo_returns_exact_message() {
    let mut client = echo_server();
    client.start().await.unwrap();
    assert_eq!(client.state(), SessionState::Started);

    let ping = JsonRpcRequest::new(1i64, "ping").with_params(json!({}));
    client.send(&ping).await.unwrap();

    let reply = client.receive_default().await.unwrap().unwrap();
    assert_eq!(
        reply,
        Reply::Message(json!({"jsonrpc": "2.0", "id": 1, "method": "ping", "params": {}}))
    );

    client.shutdown().await.unwrap();
}

#[tokio::test]
async fn replies_arrive_in_request_order() {
    let mut client = echo_server();
    client.start().await.unwrap();

    let mut issued = Vec::new();
    for method in [
        methods::TOOLS_LIST,
        methods::PROMPTS_LIST,
        methods::RESOURCES_LIST,
    ] {
        issued.push(client.request(method, Some(json!({}))).await.unwrap());
    }

    for id in issued {
        let reply = client.receive_default().await.unwrap().unwrap();
        assert_eq!(reply.id(), Some(id));
    }

    client.shutdown().await.unwrap();
}

#[tokio::test]
async fn silent_server_times_out_after_the_bound() {
    let recorder = Recorder::default();
    let mut client = silent_server().with_observer(recorder.clone());
    client.start().await.unwrap();

    let started = Instant::now();
    let reply = client.receive(Duration::from_secs(1)).await.unwrap();
    let waited = started.elapsed();

    assert!(reply.is_none());
    assert!(waited >= Duration::from_secs(1), "returned early: {waited:?}");
    assert!(waited < Duration::from_millis(1500), "returned late: {waited:?}");
    assert_eq!(*recorder.timeouts.lock().unwrap(), 1);

    client.shutdown().await.unwrap();
}

#[tokio::test]
async fn shutdown_stops_the_process() {
    let mut client = echo_server();
    client.start().await.unwrap();
    let pid = client.pid().unwrap();
    assert!(client.is_running());

    client.shutdown().await.unwrap();

    assert_eq!(client.state(), SessionState::Terminated);
    assert!(!client.is_running());
    let check = std::process::Command::new("kill")
        .args(["-0", &pid.to_string()])
        .stderr(std::process::Stdio::null())
        .status()
        .unwrap();
    assert!(!check.success(), "process {pid} still alive");
}

#[tokio::test]
async fn shutdown_is_idempotent() {
    let mut client = echo_server();
    client.start().await.unwrap();
    client.shutdown().await.unwrap();
    client.shutdown().await.unwrap();
    assert!(matches!(client.start().await, Err(Error::Terminated)));
    assert!(matches!(client.initialize().await, Err(Error::Terminated)));
    assert!(matches!(
        client.receive(Duration::from_millis(10)).await,
        Err(Error::Terminated)
    ));
}

#[tokio::test]
async fn initialize_handshakes_once() {
    let recorder = Recorder::default();
    let mut client = echo_server().with_observer(recorder.clone());
    client.start().await.unwrap();

    client.initialize().await.unwrap();
    assert_eq!(client.state(), SessionState::Ready);
    client.initialize().await.unwrap();

    assert_eq!(
        recorder.methods(),
        vec![methods::INITIALIZE.to_string(), methods::INITIALIZED.to_string()]
    );
    // Only the echoed notification is left over.
    assert_eq!(client.drain_pending(), 1);

    client.shutdown().await.unwrap();
    assert_eq!(recorder.methods().last().map(String::as_str), Some(methods::SHUTDOWN));
}

#[tokio::test]
async fn initialize_without_response_fails() {
    let recorder = Recorder::default();
    let mut client = silent_server()
        .with_timings(Timings {
            response_timeout: Duration::from_millis(300),
            ..fast_timings()
        })
        .with_observer(recorder.clone());
    client.start().await.unwrap();

    let err = client.initialize().await.unwrap_err();
    assert!(matches!(err, Error::InitializeTimeout(_)));
    assert_eq!(client.state(), SessionState::Started);
    assert_eq!(recorder.methods(), vec![methods::INITIALIZE.to_string()]);

    client.shutdown().await.unwrap();
}

#[tokio::test]
async fn drain_discards_stale_lines() {
    let mut client = echo_server();
    client.start().await.unwrap();

    for _ in 0..3 {
        client.request(methods::TOOLS_LIST, None::<()>).await.unwrap();
    }
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(client.drain_pending(), 3);

    let reply = client
        .call(methods::PROMPTS_LIST, Some(json!({})), Duration::from_secs(2))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(reply.id(), Some(RequestId::Number(4)));

    client.shutdown().await.unwrap();
}

#[tokio::test]
async fn embedded_newlines_stay_on_one_line() {
    let mut client = echo_server();
    client.start().await.unwrap();

    let code = "print('a')\nprint('b')\n";
    client
        .request(
            methods::TOOLS_CALL,
            Some(json!({"name": "execute-python", "arguments": {"code": code}})),
        )
        .await
        .unwrap();

    let reply = client.receive_default().await.unwrap().unwrap();
    let value = reply.as_value().unwrap();
    assert_eq!(value["params"]["arguments"]["code"], code);

    let extra = client.receive(Duration::from_millis(300)).await.unwrap();
    assert!(extra.is_none(), "message was split: {extra:?}");

    client.shutdown().await.unwrap();
}

#[tokio::test]
async fn stderr_shares_the_stream() {
    let mut client = shell_server("echo 'server booting' >&2; exec cat");
    client.start().await.unwrap();

    let banner = client.receive_default().await.unwrap().unwrap();
    assert_eq!(banner, Reply::Raw("server booting".to_string()));

    client
        .send(&JsonRpcRequest::new(1i64, "ping"))
        .await
        .unwrap();
    let reply = client.receive_default().await.unwrap().unwrap();
    assert_eq!(reply.id(), Some(RequestId::Number(1)));

    client.shutdown().await.unwrap();
}

#[tokio::test]
async fn malformed_lines_come_back_raw() {
    let mut client = shell_server("echo '{\"jsonrpc\": \"2.0\", broken'; exec cat");
    client.start().await.unwrap();

    let reply = client.receive_default().await.unwrap().unwrap();
    assert_eq!(
        reply,
        Reply::Raw("{\"jsonrpc\": \"2.0\", broken".to_string())
    );
    assert!(reply.as_response().is_none());

    client.shutdown().await.unwrap();
}

#[tokio::test]
async fn exited_server_surfaces_errors() {
    let mut client = shell_server("exit 0");
    client.start().await.unwrap();
    tokio::time::sleep(Duration::from_millis(200)).await;

    assert!(!client.is_running());
    assert!(matches!(
        client.receive(Duration::from_secs(1)).await,
        Err(Error::ServerExited)
    ));
    let err = client
        .send(&JsonRpcRequest::new(1i64, "ping"))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Io(_)));

    client.shutdown().await.unwrap();
    assert_eq!(client.state(), SessionState::Terminated);
}

#[tokio::test]
async fn start_twice_is_rejected() {
    let mut client = echo_server();
    client.start().await.unwrap();
    assert!(matches!(client.start().await, Err(Error::AlreadyStarted)));
    client.terminate().await.unwrap();
}
