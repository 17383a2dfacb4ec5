//! In-process fake of the build server, for tests
//!
//! Serves the pipe, build, event and abort routes on an ephemeral port and
//! records every request so tests can assert on what the client sent.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use axum::{
    Json, Router,
    body::Bytes,
    extract::{
        Path, State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    http::{HeaderMap, StatusCode, header},
    response::{AppendHeaders, IntoResponse, Response},
    routing::{post, put},
};
use skiff_core::domain::build::BuildStatus;
use skiff_core::domain::event::{BuildEvent, FinishEvent, LogEvent, Origin, StatusEvent};
use tokio::sync::Notify;

/// Build id the fake server hands out
pub const BUILD_ID: u64 = 42;

/// Peer address reported for every pipe
///
/// Deliberately not the address the server listens on, so tests can tell a
/// rewritten pipe URL from the gateway URL.
pub const PIPE_PEER_ADDR: &str = "pipe-node.test:7777";

/// What the event endpoint does once a client connects
#[derive(Debug, Clone, Copy)]
pub enum EventScript {
    /// Send a log line, wait for the expected uploads, then finish with
    /// `status` and close
    Complete {
        status: BuildStatus,
        exit_status: i32,
    },
    /// Send a log line and keep the connection open until the client leaves
    Hang,
    /// Accept the connection but never answer the upgrade request
    Stall,
}

#[derive(Debug, Clone)]
struct Behavior {
    pipe_status: StatusCode,
    build_status: StatusCode,
    upload_status: StatusCode,
    expected_uploads: usize,
    script: EventScript,
}

/// A recorded build creation request
#[derive(Debug, Clone)]
pub struct BuildRequest {
    pub content_type: Option<String>,
    pub spec: serde_json::Value,
}

#[derive(Debug, Default)]
struct Recorded {
    pipes_created: usize,
    uploads: HashMap<String, Vec<u8>>,
    builds: Vec<BuildRequest>,
    event_cookies: Vec<Option<String>>,
    aborts: Vec<u64>,
}

/// Shared view of everything the fake server has seen
#[derive(Clone)]
pub struct ServerState {
    behavior: Arc<Behavior>,
    recorded: Arc<Mutex<Recorded>>,
    uploads_changed: Arc<Notify>,
}

impl ServerState {
    fn recorded(&self) -> std::sync::MutexGuard<'_, Recorded> {
        self.recorded.lock().expect("fake server state poisoned")
    }

    pub fn pipes_created(&self) -> usize {
        self.recorded().pipes_created
    }

    /// Bytes written to a pipe, if it was written at all
    pub fn uploaded(&self, pipe_id: &str) -> Option<Vec<u8>> {
        self.recorded().uploads.get(pipe_id).cloned()
    }

    pub fn upload_count(&self) -> usize {
        self.recorded().uploads.len()
    }

    pub fn build_requests(&self) -> Vec<BuildRequest> {
        self.recorded().builds.clone()
    }

    /// `Cookie` header of each event stream connection, in order
    pub fn event_cookies(&self) -> Vec<Option<String>> {
        self.recorded().event_cookies.clone()
    }

    pub fn aborts(&self) -> Vec<u64> {
        self.recorded().aborts.clone()
    }

    async fn wait_for_uploads(&self, expected: usize) {
        loop {
            let changed = self.uploads_changed.notified();
            if self.upload_count() >= expected {
                return;
            }
            changed.await;
        }
    }
}

/// Configures a [`FakeServer`] before it starts
pub struct FakeServerBuilder {
    behavior: Behavior,
}

impl FakeServerBuilder {
    pub fn pipe_status(mut self, status: u16) -> Self {
        self.behavior.pipe_status = status_code(status);
        self
    }

    pub fn build_status(mut self, status: u16) -> Self {
        self.behavior.build_status = status_code(status);
        self
    }

    pub fn upload_status(mut self, status: u16) -> Self {
        self.behavior.upload_status = status_code(status);
        self
    }

    /// Hold back the terminal events until this many pipes were written
    pub fn expected_uploads(mut self, count: usize) -> Self {
        self.behavior.expected_uploads = count;
        self
    }

    pub fn script(mut self, script: EventScript) -> Self {
        self.behavior.script = script;
        self
    }

    pub async fn start(self) -> FakeServer {
        let state = ServerState {
            behavior: Arc::new(self.behavior),
            recorded: Arc::new(Mutex::new(Recorded::default())),
            uploads_changed: Arc::new(Notify::new()),
        };

        let app = Router::new()
            .route("/api/v1/pipes", post(create_pipe))
            .route("/api/v1/pipes/{id}", put(write_pipe))
            .route("/api/v1/builds", post(create_build))
            .route("/api/v1/builds/{id}/events", axum::routing::get(build_events))
            .route("/api/v1/builds/{id}/abort", post(abort_build))
            .with_state(state.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind fake server");
        let addr = listener.local_addr().expect("fake server address");

        tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, app).await {
                tracing::error!("fake server stopped: {}", e);
            }
        });

        FakeServer { addr, state }
    }
}

/// A running fake build server
pub struct FakeServer {
    addr: SocketAddr,
    state: ServerState,
}

impl FakeServer {
    /// Start a server that accepts everything and completes builds successfully
    pub async fn start() -> Self {
        Self::builder().start().await
    }

    pub fn builder() -> FakeServerBuilder {
        FakeServerBuilder {
            behavior: Behavior {
                pipe_status: StatusCode::CREATED,
                build_status: StatusCode::CREATED,
                upload_status: StatusCode::OK,
                expected_uploads: 0,
                script: EventScript::Complete {
                    status: BuildStatus::Succeeded,
                    exit_status: 0,
                },
            },
        }
    }

    /// Base URL to point a client at
    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn peer_addr(&self) -> &'static str {
        PIPE_PEER_ADDR
    }

    pub fn state(&self) -> &ServerState {
        &self.state
    }
}

fn status_code(status: u16) -> StatusCode {
    StatusCode::from_u16(status).expect("valid status code")
}

async fn create_pipe(State(state): State<ServerState>) -> Response {
    let id = {
        let mut recorded = state.recorded();
        recorded.pipes_created += 1;
        format!("pipe-{}", recorded.pipes_created)
    };

    let body = serde_json::json!({ "id": id, "peer_addr": PIPE_PEER_ADDR });
    (state.behavior.pipe_status, Json(body)).into_response()
}

async fn write_pipe(
    State(state): State<ServerState>,
    Path(id): Path<String>,
    body: Bytes,
) -> Response {
    if state.behavior.upload_status != StatusCode::OK {
        return (state.behavior.upload_status, "pipe write refused").into_response();
    }

    state.recorded().uploads.insert(id, body.to_vec());
    state.uploads_changed.notify_waiters();
    StatusCode::OK.into_response()
}

async fn create_build(State(state): State<ServerState>, headers: HeaderMap, body: Bytes) -> Response {
    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    let spec = serde_json::from_slice(&body).unwrap_or(serde_json::Value::Null);
    state.recorded().builds.push(BuildRequest { content_type, spec });

    if state.behavior.build_status != StatusCode::CREATED {
        return (state.behavior.build_status, "build rejected").into_response();
    }

    (
        StatusCode::CREATED,
        AppendHeaders([
            (header::SET_COOKIE, "node=worker-3; Path=/"),
            (header::SET_COOKIE, "sid=s3cr3t; Path=/; HttpOnly"),
        ]),
        Json(serde_json::json!({ "id": BUILD_ID, "status": "pending" })),
    )
        .into_response()
}

async fn build_events(
    State(state): State<ServerState>,
    Path(id): Path<u64>,
    headers: HeaderMap,
    ws: WebSocketUpgrade,
) -> Response {
    if id != BUILD_ID {
        return (StatusCode::NOT_FOUND, "no such build").into_response();
    }

    let cookie = headers
        .get(header::COOKIE)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    state.recorded().event_cookies.push(cookie);

    if let EventScript::Stall = state.behavior.script {
        std::future::pending::<()>().await;
    }

    ws.on_upgrade(move |socket| run_script(socket, state))
}

async fn abort_build(State(state): State<ServerState>, Path(id): Path<u64>) -> StatusCode {
    state.recorded().aborts.push(id);
    StatusCode::OK
}

async fn send(socket: &mut WebSocket, event: BuildEvent) -> bool {
    let Ok(envelope) = event.to_envelope() else {
        return false;
    };
    let Ok(text) = serde_json::to_string(&envelope) else {
        return false;
    };
    socket.send(Message::Text(text.into())).await.is_ok()
}

async fn run_script(mut socket: WebSocket, state: ServerState) {
    let log = BuildEvent::Log(LogEvent {
        origin: Some(Origin {
            name: "stdout".to_string(),
            origin_type: "run".to_string(),
        }),
        payload: "compiling...\n".to_string(),
    });
    if !send(&mut socket, log).await {
        return;
    }

    match state.behavior.script {
        EventScript::Complete {
            status,
            exit_status,
        } => {
            state.wait_for_uploads(state.behavior.expected_uploads).await;

            let finish = BuildEvent::Finish(FinishEvent {
                exit_status,
                time: 0,
            });
            let status = BuildEvent::Status(StatusEvent { status, time: 0 });
            if send(&mut socket, finish).await && send(&mut socket, status).await {
                let _ = socket.send(Message::Close(None)).await;
            }
        }
        EventScript::Hang => while let Some(Ok(_)) = socket.recv().await {},
        EventScript::Stall => {}
    }
}
