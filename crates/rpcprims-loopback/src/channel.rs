//! The in-memory [`Channel`] and its calls.

use std::future::{self, Future};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use bytes::Bytes;
use rpcprims_call::{
    BoxListener, CallError, CallOptions, Channel, ClientCall, Code, Marshaller, Metadata,
    MethodDescriptor, SharedCall, Status,
};
use tokio::runtime::Handle;
use tokio::sync::{mpsc, Semaphore};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

use crate::config::{Faults, LoopbackConfig};
use crate::journal::{CallEvent, Journal};
use crate::server::{Handler, RequestStream, Responder, ResponseSink, Router, ServerCall};

/// A [`Channel`] that serves calls from in-process handlers.
///
/// Every call is recorded in the channel's [`Journal`]. Handlers run as tokio
/// tasks, so calls must be started from within a tokio runtime.
#[derive(Clone)]
pub struct LoopbackChannel {
    router: Arc<Router>,
    config: LoopbackConfig,
    faults: Faults,
    journal: Journal,
    next_call_id: Arc<AtomicU64>,
}

impl LoopbackChannel {
    pub fn new(router: Router) -> Self {
        Self {
            router: Arc::new(router),
            config: LoopbackConfig::default(),
            faults: Faults::default(),
            journal: Journal::new(),
            next_call_id: Arc::new(AtomicU64::new(1)),
        }
    }

    pub fn with_config(mut self, config: LoopbackConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_faults(mut self, faults: Faults) -> Self {
        self.faults = faults;
        self
    }

    /// Record into an existing journal instead of a fresh one.
    pub fn with_journal(mut self, journal: Journal) -> Self {
        self.journal = journal;
        self
    }

    pub fn journal(&self) -> &Journal {
        &self.journal
    }

    pub fn config(&self) -> &LoopbackConfig {
        &self.config
    }

    pub fn router(&self) -> &Router {
        &self.router
    }

    fn create_call<Req, Res>(
        &self,
        method: &MethodDescriptor<Req, Res>,
        options: &CallOptions,
    ) -> SharedCall<Req, Res>
    where
        Req: Send + 'static,
        Res: Send + 'static,
    {
        let id = self.next_call_id.fetch_add(1, Ordering::Relaxed);
        self.journal.open(id, method.full_name());

        let deadline = options
            .timeout
            .or(self.config.default_timeout)
            .map(|timeout| Instant::now() + timeout);

        let shared = Arc::new(CallShared {
            id,
            method: method.full_name().to_string(),
            state: Mutex::new(CallState::default()),
            response: Arc::clone(method.response_marshaller()),
            max_response_size: self.config.limit(options.max_inbound_message_size),
            demand: Semaphore::new(0),
            done: CancellationToken::new(),
        });

        Arc::new(LoopbackCall {
            shared,
            handler: self.router.get(method.full_name()),
            request: Arc::clone(method.request_marshaller()),
            max_request_size: self.config.limit(options.max_outbound_message_size),
            deadline,
            faults: self.faults,
            journal: self.journal.clone(),
            sent: AtomicUsize::new(0),
        })
    }
}

impl Channel for LoopbackChannel {
    fn new_call<Req, Res>(
        &self,
        method: &MethodDescriptor<Req, Res>,
        options: &CallOptions,
    ) -> impl Future<Output = Result<SharedCall<Req, Res>, Status>> + Send
    where
        Req: Send + 'static,
        Res: Send + 'static,
    {
        future::ready(Ok(self.create_call(method, options)))
    }
}

struct CallState<Res> {
    listener: Option<BoxListener<Res>>,
    requests: Option<mpsc::UnboundedSender<Bytes>>,
    started: bool,
    half_closed: bool,
    headers_sent: bool,
    messages_sent: bool,
    cancelled: Option<String>,
    closed: Option<Code>,
}

impl<Res> Default for CallState<Res> {
    fn default() -> Self {
        Self {
            listener: None,
            requests: None,
            started: false,
            half_closed: false,
            headers_sent: false,
            messages_sent: false,
            cancelled: None,
            closed: None,
        }
    }
}

/// State shared between the client handle and the server responder.
struct CallShared<Res> {
    id: u64,
    method: String,
    state: Mutex<CallState<Res>>,
    response: Arc<dyn Marshaller<Res>>,
    max_response_size: usize,
    demand: Semaphore,
    done: CancellationToken,
}

impl<Res> CallShared<Res> {
    fn lock(&self) -> MutexGuard<'_, CallState<Res>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<Res: Send + 'static> ResponseSink for CallShared<Res> {
    fn send_headers(&self, headers: Metadata) -> Result<(), Status> {
        let mut state = self.lock();
        if state.closed.is_some() {
            return Err(self.closed_status());
        }
        if state.headers_sent || state.messages_sent {
            return Err(Status::internal("response headers already sent"));
        }
        state.headers_sent = true;
        if let Some(listener) = state.listener.as_mut() {
            listener.on_headers(headers);
        }
        Ok(())
    }

    fn deliver(&self, message: Bytes) -> Result<(), Status> {
        if message.len() > self.max_response_size {
            let status = Status::resource_exhausted(format!(
                "response message too large ({} bytes, max {})",
                message.len(),
                self.max_response_size
            ));
            self.close(status.clone(), Metadata::new());
            return Err(status);
        }
        let value = match self.response.decode(message) {
            Ok(value) => value,
            Err(status) => {
                self.close(status.clone(), Metadata::new());
                return Err(status);
            }
        };

        let mut state = self.lock();
        if state.closed.is_some() {
            return Err(self.closed_status_locked(&state));
        }
        state.messages_sent = true;
        if let Some(listener) = state.listener.as_mut() {
            trace!(call_id = self.id, "delivering response message");
            listener.on_message(value);
        }
        Ok(())
    }

    fn close(&self, status: Status, trailers: Metadata) -> bool {
        let mut state = self.lock();
        if state.closed.is_some() {
            return false;
        }
        state.closed = Some(status.code());
        state.requests = None;
        debug!(call_id = self.id, method = %self.method, code = %status.code(), "call closed");
        if let Some(mut listener) = state.listener.take() {
            listener.on_close(status, trailers);
        }
        drop(state);

        self.demand.close();
        self.done.cancel();
        true
    }

    fn demand(&self) -> &Semaphore {
        &self.demand
    }

    fn done(&self) -> &CancellationToken {
        &self.done
    }

    fn closed_status(&self) -> Status {
        let state = self.lock();
        self.closed_status_locked(&state)
    }
}

impl<Res> CallShared<Res> {
    fn closed_status_locked(&self, state: &CallState<Res>) -> Status {
        match (&state.cancelled, state.closed) {
            (Some(reason), _) => Status::cancelled(format!("call cancelled by client: {reason}")),
            (None, Some(code)) => Status::new(code, "call already closed"),
            (None, None) => Status::internal("call is not closed"),
        }
    }
}

/// Client handle for one loopback call.
struct LoopbackCall<Req, Res> {
    shared: Arc<CallShared<Res>>,
    handler: Option<Arc<dyn Handler>>,
    request: Arc<dyn Marshaller<Req>>,
    max_request_size: usize,
    deadline: Option<Instant>,
    faults: Faults,
    journal: Journal,
    sent: AtomicUsize,
}

impl<Req, Res: Send + 'static> LoopbackCall<Req, Res> {
    fn record(&self, event: CallEvent) {
        self.journal.push(self.shared.id, event);
    }

    fn spawn_handler(
        &self,
        runtime: &Handle,
        handler: Arc<dyn Handler>,
        headers: Metadata,
        requests: mpsc::UnboundedReceiver<Bytes>,
    ) {
        let sink: Arc<dyn ResponseSink> = self.shared.clone();
        let server_call = ServerCall {
            method: self.shared.method.clone(),
            headers,
            requests: RequestStream::new(requests),
            responder: Responder::new(Arc::clone(&sink)),
        };
        let call_id = self.shared.id;

        let task = runtime.spawn(handler.call(server_call));
        runtime.spawn(async move {
            let (status, trailers) = match task.await {
                Ok(Ok(())) => (Status::ok(), Metadata::new()),
                Ok(Err(status)) => {
                    let trailers = status.metadata().clone();
                    (status, trailers)
                }
                Err(err) => {
                    warn!(call_id, error = %err, "handler task failed");
                    (Status::internal("handler failed").with_cause(err), Metadata::new())
                }
            };
            sink.close(status, trailers);
        });
    }

    fn spawn_deadline(&self, runtime: &Handle, deadline: Instant) {
        let shared = Arc::clone(&self.shared);
        runtime.spawn(async move {
            tokio::select! {
                _ = tokio::time::sleep_until(deadline) => {
                    if shared.close(Status::deadline_exceeded("deadline exceeded"), Metadata::new()) {
                        debug!(call_id = shared.id, "call deadline exceeded");
                    }
                }
                _ = shared.done.cancelled() => {}
            }
        });
    }
}

impl<Req, Res> ClientCall<Req, Res> for LoopbackCall<Req, Res>
where
    Req: Send + 'static,
    Res: Send + 'static,
{
    fn start(&self, listener: BoxListener<Res>, headers: Metadata) -> Result<(), CallError> {
        self.record(CallEvent::Start);
        if self.faults.fail_start {
            return Err(CallError::Transport("injected start failure".to_string()));
        }
        let runtime = Handle::try_current()
            .map_err(|err| CallError::Transport(format!("no tokio runtime: {err}")))?;

        let (tx, rx) = mpsc::unbounded_channel();
        {
            let mut state = self.shared.lock();
            if state.started {
                return Err(CallError::AlreadyStarted);
            }
            state.started = true;
            if let Some(reason) = &state.cancelled {
                return Err(CallError::Cancelled(reason.clone()));
            }
            state.listener = Some(listener);
            state.requests = Some(tx);
            if let Some(listener) = state.listener.as_mut() {
                listener.on_ready();
            }
        }
        debug!(call_id = self.shared.id, method = %self.shared.method, "call started");

        let Some(handler) = self.handler.clone() else {
            let status = Status::unimplemented(format!("unknown method {}", self.shared.method));
            self.shared.close(status, Metadata::new());
            return Ok(());
        };
        if let Some(deadline) = self.deadline {
            self.spawn_deadline(&runtime, deadline);
        }
        self.spawn_handler(&runtime, handler, headers, rx);
        Ok(())
    }

    fn request(&self, n: usize) -> Result<(), CallError> {
        self.record(CallEvent::Request(n));
        let state = self.shared.lock();
        if !state.started {
            return Err(CallError::NotStarted);
        }
        if state.closed.is_none() {
            trace!(call_id = self.shared.id, n, "client demand");
            self.shared.demand.add_permits(n);
        }
        Ok(())
    }

    fn send_message(&self, message: Req) -> Result<(), CallError> {
        self.record(CallEvent::SendMessage);
        if let Some(limit) = self.faults.fail_send_after {
            if self.sent.load(Ordering::SeqCst) >= limit {
                return Err(CallError::Transport("injected send failure".to_string()));
            }
        }

        let bytes = self.request.encode(&message).map_err(CallError::Rejected)?;
        if bytes.len() > self.max_request_size {
            return Err(CallError::MessageTooLarge {
                size: bytes.len(),
                max: self.max_request_size,
            });
        }

        let state = self.shared.lock();
        if !state.started {
            return Err(CallError::NotStarted);
        }
        if state.half_closed {
            return Err(CallError::HalfClosed);
        }
        if let Some(reason) = &state.cancelled {
            return Err(CallError::Cancelled(reason.clone()));
        }
        self.sent.fetch_add(1, Ordering::SeqCst);
        // After a server-side close the message has nowhere to go.
        if let Some(requests) = &state.requests {
            let _ = requests.send(bytes);
        }
        Ok(())
    }

    fn half_close(&self) -> Result<(), CallError> {
        self.record(CallEvent::HalfClose);
        if self.faults.fail_half_close {
            return Err(CallError::Transport("injected half-close failure".to_string()));
        }

        let mut state = self.shared.lock();
        if !state.started {
            return Err(CallError::NotStarted);
        }
        if state.half_closed {
            return Err(CallError::HalfClosed);
        }
        if let Some(reason) = &state.cancelled {
            return Err(CallError::Cancelled(reason.clone()));
        }
        state.half_closed = true;
        state.requests = None;
        debug!(call_id = self.shared.id, "client half-closed");
        Ok(())
    }

    fn cancel(&self, reason: &str, cause: Option<Status>) -> Result<(), CallError> {
        self.record(CallEvent::Cancel(reason.to_string()));
        {
            let mut state = self.shared.lock();
            if state.cancelled.is_none() && state.closed.is_none() {
                state.cancelled = Some(reason.to_string());
            }
        }
        debug!(call_id = self.shared.id, reason, "client cancelled call");

        let mut status = Status::cancelled(reason.to_string());
        if let Some(cause) = cause {
            status = status.with_cause(cause);
        }
        self.shared.close(status, Metadata::new());

        if self.faults.fail_cancel {
            return Err(CallError::Transport("injected cancel failure".to_string()));
        }
        Ok(())
    }
}
