//! Canned-response HTTP server for collaborator client tests.

use std::{
    collections::HashMap,
    io,
    net::SocketAddr,
    sync::{Arc, Mutex, PoisonError},
};

pub use axum::http::Method;
use axum::{
    Router,
    extract::State,
    http::{StatusCode, Uri, header},
    response::IntoResponse,
};
use serde::Serialize;
use tokio::{net::TcpListener, task::JoinHandle};

/// Wrap `source` in the collaborator response envelope
/// `{"payload":{"_source": ...}}`.
///
/// # Panics
///
/// Panics if `source` cannot be serialized to JSON.
pub fn envelope<T: Serialize>(source: &T) -> String {
    serde_json::json!({ "payload": { "_source": source } }).to_string()
}

/// A request received by the stub.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RecordedRequest {
    pub method: Method,
    pub path: String,
    pub body: String,
}

#[derive(Default)]
struct Inner {
    responses: HashMap<(Method, String), (StatusCode, String)>,
    requests: Vec<RecordedRequest>,
}

/// Responses keyed by method and path. Unregistered paths answer `404`.
#[derive(Clone, Default)]
pub struct HttpStub {
    inner: Arc<Mutex<Inner>>,
}

impl HttpStub {
    #[must_use]
    pub fn new() -> Self { Self::default() }

    /// Answer `method path` with `status` and a JSON `body`.
    ///
    /// # Panics
    ///
    /// Panics if `status` is not a valid HTTP status code.
    #[must_use]
    pub fn respond(self, method: Method, path: &str, status: u16, body: impl Into<String>) -> Self {
        let status = StatusCode::from_u16(status).expect("valid status code");
        self.lock()
            .responses
            .insert((method, path.to_owned()), (status, body.into()));
        self
    }

    /// Bind to a free localhost port and serve until the returned handle drops.
    ///
    /// # Errors
    ///
    /// Returns any IO error raised while binding.
    pub async fn start(self) -> io::Result<StubServer> {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        let app = Router::new().fallback(answer).with_state(self.clone());
        let task = tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });
        Ok(StubServer {
            addr,
            stub: self,
            task,
        })
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

async fn answer(
    State(stub): State<HttpStub>,
    method: Method,
    uri: Uri,
    body: String,
) -> impl IntoResponse {
    let path = uri.path().to_owned();
    let mut inner = stub.lock();
    inner.requests.push(RecordedRequest {
        method: method.clone(),
        path: path.clone(),
        body,
    });
    let (status, body) = inner
        .responses
        .get(&(method, path))
        .cloned()
        .unwrap_or((StatusCode::NOT_FOUND, String::new()));
    (status, [(header::CONTENT_TYPE, "application/json")], body)
}

/// A running [`HttpStub`]. Dropping it stops the server.
pub struct StubServer {
    addr: SocketAddr,
    stub: HttpStub,
    task: JoinHandle<()>,
}

impl StubServer {
    /// Base URL, e.g. `http://127.0.0.1:41234`.
    #[must_use]
    pub fn url(&self) -> String { format!("http://{}", self.addr) }

    /// Requests received so far, in arrival order.
    #[must_use]
    pub fn requests(&self) -> Vec<RecordedRequest> { self.stub.lock().requests.clone() }
}

impl Drop for StubServer {
    fn drop(&mut self) { self.task.abort(); }
}
