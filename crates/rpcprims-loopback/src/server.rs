//! Server side of the loopback channel: handlers, routing and responders.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use bytes::Bytes;
use futures_core::Stream;
use futures_util::future::BoxFuture;
use rpcprims_call::{Metadata, Status};
use tokio::sync::{mpsc, Semaphore};
use tokio_util::sync::CancellationToken;

/// Delivery surface a [`Responder`] writes into.
pub(crate) trait ResponseSink: Send + Sync {
    fn send_headers(&self, headers: Metadata) -> Result<(), Status>;

    /// Decode and deliver one message. Demand has already been taken.
    fn deliver(&self, message: Bytes) -> Result<(), Status>;

    /// Close the call. Returns false if it was already closed.
    fn close(&self, status: Status, trailers: Metadata) -> bool;

    /// Outstanding client demand, one permit per message.
    fn demand(&self) -> &Semaphore;

    /// Tripped once the call is closed for any reason.
    fn done(&self) -> &CancellationToken;

    /// The status a closed call reports to late server operations.
    fn closed_status(&self) -> Status;
}

/// Handle a server uses to answer one call.
///
/// Cloning is cheap; all clones write to the same call.
#[derive(Clone)]
pub struct Responder {
    sink: Arc<dyn ResponseSink>,
}

impl Responder {
    pub(crate) fn new(sink: Arc<dyn ResponseSink>) -> Self {
        Self { sink }
    }

    /// Send response headers. Only valid before the first message.
    pub fn send_headers(&self, headers: Metadata) -> Result<(), Status> {
        self.sink.send_headers(headers)
    }

    /// Send one encoded response message.
    ///
    /// Waits until the client has requested at least one more message. Fails
    /// once the call is closed.
    pub async fn send(&self, message: Bytes) -> Result<(), Status> {
        match self.sink.demand().acquire().await {
            Ok(permit) => permit.forget(),
            Err(_) => return Err(self.sink.closed_status()),
        }
        self.sink.deliver(message)
    }

    /// Close the call with `status` and trailing metadata.
    ///
    /// Returns false if the call was already closed.
    pub fn close(&self, status: Status, trailers: Metadata) -> bool {
        self.sink.close(status, trailers)
    }

    /// Resolves once the call is closed: by the client cancelling, by the
    /// deadline, or by this side.
    pub async fn cancelled(&self) {
        self.sink.done().cancelled().await
    }

    pub fn is_cancelled(&self) -> bool {
        self.sink.done().is_cancelled()
    }
}

/// Inbound request messages. Ends when the client half-closes or the call
/// closes.
pub struct RequestStream {
    rx: mpsc::UnboundedReceiver<Bytes>,
}

impl RequestStream {
    pub(crate) fn new(rx: mpsc::UnboundedReceiver<Bytes>) -> Self {
        Self { rx }
    }
}

impl Stream for RequestStream {
    type Item = Bytes;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Bytes>> {
        self.rx.poll_recv(cx)
    }
}

/// Everything a handler receives for one call.
pub struct ServerCall {
    pub method: String,
    pub headers: Metadata,
    pub requests: RequestStream,
    pub responder: Responder,
}

/// Serves one method.
///
/// Returning `Ok` closes the call with an OK status if the handler has not
/// closed it already; returning `Err(status)` closes it with that status and
/// its metadata as trailers.
pub trait Handler: Send + Sync + 'static {
    fn call(&self, call: ServerCall) -> BoxFuture<'static, Result<(), Status>>;
}

impl<F, Fut> Handler for F
where
    F: Fn(ServerCall) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), Status>> + Send + 'static,
{
    fn call(&self, call: ServerCall) -> BoxFuture<'static, Result<(), Status>> {
        Box::pin(self(call))
    }
}

/// Maps full method names to handlers.
#[derive(Clone, Default)]
pub struct Router {
    routes: HashMap<String, Arc<dyn Handler>>,
}

impl Router {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `handler` for `method` (`package.Service/Method`).
    pub fn route(mut self, method: impl Into<String>, handler: impl Handler) -> Self {
        self.routes.insert(method.into(), Arc::new(handler));
        self
    }

    pub fn get(&self, method: &str) -> Option<Arc<dyn Handler>> {
        self.routes.get(method).cloned()
    }

    /// Registered method names, sorted.
    pub fn methods(&self) -> Vec<&str> {
        let mut methods: Vec<_> = self.routes.keys().map(String::as_str).collect();
        methods.sort_unstable();
        methods
    }
}

impl std::fmt::Debug for Router {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Router")
            .field("methods", &self.methods())
            .finish()
    }
}
