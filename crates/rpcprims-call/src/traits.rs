use std::future::Future;
use std::sync::Arc;

use crate::error::{CallError, Status};
use crate::metadata::Metadata;
use crate::method::MethodDescriptor;
use crate::options::CallOptions;

/// Delivery target the transport pushes inbound events into.
///
/// A listener receives, in order: at most one `on_headers`, zero or more
/// `on_message`, then exactly one `on_close`. The transport owns the
/// listener after `start` and drops it once the call is closed.
pub trait CallListener<Res>: Send {
    fn on_headers(&mut self, headers: Metadata);

    fn on_message(&mut self, message: Res);

    fn on_close(&mut self, status: Status, trailers: Metadata);

    /// The call can accept more outbound messages without buffering.
    fn on_ready(&mut self) {}
}

pub type BoxListener<Res> = Box<dyn CallListener<Res>>;

/// One in-flight RPC invocation, as provided by the transport.
///
/// None of these operations block or suspend. Implementations must accept
/// `cancel` at any point, any number of times.
pub trait ClientCall<Req, Res>: Send + Sync {
    /// Begin the call and register `listener` for inbound delivery.
    ///
    /// Fails with [`CallError::AlreadyStarted`] if called more than once.
    fn start(&self, listener: BoxListener<Res>, headers: Metadata) -> Result<(), CallError>;

    /// Signal readiness to receive `n` more inbound messages.
    fn request(&self, n: usize) -> Result<(), CallError>;

    /// Enqueue one outbound message. Only valid between `start` and `half_close`.
    fn send_message(&self, message: Req) -> Result<(), CallError>;

    /// Signal that no more outbound messages will be sent.
    fn half_close(&self) -> Result<(), CallError>;

    /// Abruptly terminate the call.
    fn cancel(&self, reason: &str, cause: Option<Status>) -> Result<(), CallError>;
}

/// Shared handle to a call; the drivers keep one clone per concurrent branch.
pub type SharedCall<Req, Res> = Arc<dyn ClientCall<Req, Res>>;

/// Creates calls. Implemented by the transport.
pub trait Channel: Send + Sync {
    fn new_call<Req, Res>(
        &self,
        method: &MethodDescriptor<Req, Res>,
        options: &CallOptions,
    ) -> impl Future<Output = Result<SharedCall<Req, Res>, Status>> + Send
    where
        Req: Send + 'static,
        Res: Send + 'static;
}

impl<C: Channel> Channel for Arc<C> {
    fn new_call<Req, Res>(
        &self,
        method: &MethodDescriptor<Req, Res>,
        options: &CallOptions,
    ) -> impl Future<Output = Result<SharedCall<Req, Res>, Status>> + Send
    where
        Req: Send + 'static,
        Res: Send + 'static,
    {
        (**self).new_call(method, options)
    }
}
