//! Listeners that bridge transport callbacks into futures and streams.

use std::pin::Pin;
use std::task::{ready, Context, Poll};

use futures_core::Stream;
use rpcprims_call::{CallListener, Metadata, SharedCall, Status};
use rpcprims_frame::{FrameOrder, ResponseContext, ResponseFrame};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, trace, warn};

type UnaryResult<Res> = Result<ResponseContext<Res>, Status>;

/// Create a single-value listener and the handle that awaits its result.
pub fn unary_listener<Res>() -> (UnaryListener<Res>, UnaryResponse<Res>) {
    let (tx, rx) = oneshot::channel();
    let listener = UnaryListener {
        headers: Metadata::new(),
        value: None,
        tx: Some(tx),
    };
    (listener, UnaryResponse { rx })
}

/// Transport-facing half of a unary response.
pub struct UnaryListener<Res> {
    headers: Metadata,
    value: Option<Res>,
    tx: Option<oneshot::Sender<UnaryResult<Res>>>,
}

impl<Res> UnaryListener<Res> {
    fn resolve(&mut self, result: UnaryResult<Res>) {
        if let Some(tx) = self.tx.take() {
            // The receiver is gone when the caller stopped waiting.
            let _ = tx.send(result);
        }
    }
}

impl<Res: Send> CallListener<Res> for UnaryListener<Res> {
    fn on_headers(&mut self, headers: Metadata) {
        self.headers = headers;
    }

    fn on_message(&mut self, message: Res) {
        if self.tx.is_none() {
            trace!("ignoring message for resolved unary call");
            return;
        }
        if self.value.is_some() {
            self.value = None;
            self.resolve(Err(Status::internal(
                "more than one value received for unary call",
            )));
            return;
        }
        self.value = Some(message);
    }

    fn on_close(&mut self, status: Status, trailers: Metadata) {
        let result = if !status.is_ok() {
            Err(status.with_metadata(trailers))
        } else {
            match self.value.take() {
                Some(value) => Ok(ResponseContext::new(
                    std::mem::take(&mut self.headers),
                    value,
                    trailers,
                )),
                None => Err(Status::internal("no value received for unary call")),
            }
        };
        self.resolve(result);
    }
}

/// Caller-facing half of a unary response.
pub struct UnaryResponse<Res> {
    rx: oneshot::Receiver<UnaryResult<Res>>,
}

impl<Res> UnaryResponse<Res> {
    /// Wait for the single response.
    ///
    /// Resolves with `Cancelled` if the transport drops the listener without
    /// closing it.
    pub async fn get(self) -> Result<ResponseContext<Res>, Status> {
        match self.rx.await {
            Ok(result) => result,
            Err(_) => Err(Status::cancelled("call closed without a status")),
        }
    }
}

type FrameResult<Res> = Result<ResponseFrame<Res>, Status>;

/// Create a streaming listener bound to `call` and the stream it feeds.
pub fn streaming_listener<Req, Res>(
    call: SharedCall<Req, Res>,
) -> (StreamingListener<Res>, ResponseFrames<Req, Res>) {
    let (tx, rx) = mpsc::unbounded_channel();
    let listener = StreamingListener {
        tx,
        order: FrameOrder::new(),
    };
    let frames = ResponseFrames {
        rx,
        call,
        done: false,
    };
    (listener, frames)
}

/// Transport-facing half of a streaming response.
///
/// Frames that break the `Headers? Message* Trailers` order are dropped.
pub struct StreamingListener<Res> {
    tx: mpsc::UnboundedSender<FrameResult<Res>>,
    order: FrameOrder,
}

impl<Res> StreamingListener<Res> {
    fn accept(&mut self, frame: &ResponseFrame<Res>) -> bool {
        match self.order.observe(frame) {
            Ok(()) => true,
            Err(violation) => {
                warn!(%violation, "dropping out-of-order response frame");
                false
            }
        }
    }

    fn push(&mut self, item: FrameResult<Res>) {
        if self.tx.send(item).is_err() {
            trace!("response stream dropped, discarding frame");
        }
    }
}

impl<Res: Send> CallListener<Res> for StreamingListener<Res> {
    fn on_headers(&mut self, headers: Metadata) {
        let frame = ResponseFrame::Headers(headers);
        if self.accept(&frame) {
            self.push(Ok(frame));
        }
    }

    fn on_message(&mut self, message: Res) {
        let frame = ResponseFrame::Message(message);
        if self.accept(&frame) {
            self.push(Ok(frame));
        }
    }

    fn on_close(&mut self, status: Status, trailers: Metadata) {
        let frame = ResponseFrame::Trailers(status, trailers);
        if !self.accept(&frame) {
            return;
        }
        match frame {
            ResponseFrame::Trailers(status, trailers) if !status.is_ok() => {
                self.push(Err(status.with_metadata(trailers)));
            }
            frame => self.push(Ok(frame)),
        }
    }
}

/// Lazy, finite stream of everything the transport delivers for one call.
///
/// Ends after the `Trailers` frame or the first failure. Each message handed
/// to the consumer asks the call for one more with `request(1)`, so delivery
/// is paced by consumption.
pub struct ResponseFrames<Req, Res> {
    rx: mpsc::UnboundedReceiver<FrameResult<Res>>,
    call: SharedCall<Req, Res>,
    done: bool,
}

impl<Req, Res> Stream for ResponseFrames<Req, Res> {
    type Item = FrameResult<Res>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        if this.done {
            return Poll::Ready(None);
        }

        let item = match ready!(this.rx.poll_recv(cx)) {
            Some(item) => item,
            None => Err(Status::cancelled("response stream closed without trailers")),
        };
        match &item {
            Ok(ResponseFrame::Message(_)) => {
                trace!("replenishing inbound demand");
                if let Err(err) = this.call.request(1) {
                    debug!(error = %err, "failed to request next message");
                }
            }
            Ok(ResponseFrame::Headers(_)) => {}
            Ok(ResponseFrame::Trailers(..)) | Err(_) => this.done = true,
        }
        Poll::Ready(Some(item))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use futures_util::StreamExt;
    use rpcprims_call::{BoxListener, CallError, ClientCall, Code};

    use super::*;

    #[derive(Default)]
    struct DemandCounter {
        requested: AtomicUsize,
    }

    impl ClientCall<(), &'static str> for DemandCounter {
        fn start(
            &self,
            _listener: BoxListener<&'static str>,
            _headers: Metadata,
        ) -> Result<(), CallError> {
            Ok(())
        }

        fn request(&self, n: usize) -> Result<(), CallError> {
            self.requested.fetch_add(n, Ordering::SeqCst);
            Ok(())
        }

        fn send_message(&self, _message: ()) -> Result<(), CallError> {
            Ok(())
        }

        fn half_close(&self) -> Result<(), CallError> {
            Ok(())
        }

        fn cancel(&self, _reason: &str, _cause: Option<Status>) -> Result<(), CallError> {
            Ok(())
        }
    }

    fn bound() -> (
        Arc<DemandCounter>,
        StreamingListener<&'static str>,
        ResponseFrames<(), &'static str>,
    ) {
        let counter = Arc::new(DemandCounter::default());
        let call: SharedCall<(), &'static str> = counter.clone();
        let (listener, frames) = streaming_listener(call);
        (counter, listener, frames)
    }

    #[tokio::test]
    async fn unary_resolves_with_context() {
        let (mut listener, response) = unary_listener();
        listener.on_headers([("x-served-by", "a")].into_iter().collect());
        listener.on_message("pong");
        listener.on_close(Status::ok(), Metadata::new());

        let ctx = response.get().await.unwrap();
        assert_eq!(ctx.value, "pong");
        assert_eq!(ctx.headers.get("x-served-by"), Some("a"));
        assert!(ctx.trailers.is_empty());
    }

    #[tokio::test]
    async fn unary_rejects_second_value() {
        let (mut listener, response) = unary_listener();
        listener.on_message(1);
        listener.on_message(2);
        listener.on_close(Status::ok(), Metadata::new());

        let err = response.get().await.unwrap_err();
        assert_eq!(err.code(), Code::Internal);
        assert_eq!(
            err.message(),
            Some("more than one value received for unary call")
        );
    }

    #[tokio::test]
    async fn unary_requires_a_value() {
        let (mut listener, response) = unary_listener::<u8>();
        listener.on_close(Status::ok(), Metadata::new());

        let err = response.get().await.unwrap_err();
        assert_eq!(err.message(), Some("no value received for unary call"));
    }

    #[tokio::test]
    async fn unary_failure_carries_trailers() {
        let (mut listener, response) = unary_listener::<u8>();
        let trailers: Metadata = [("x-retry-after", "5")].into_iter().collect();
        listener.on_close(Status::unavailable("draining"), trailers);

        let err = response.get().await.unwrap_err();
        assert_eq!(err.code(), Code::Unavailable);
        assert_eq!(err.metadata().get("x-retry-after"), Some("5"));
    }

    #[tokio::test]
    async fn unary_dropped_listener_is_cancelled() {
        let (listener, response) = unary_listener::<u8>();
        drop(listener);
        assert_eq!(response.get().await.unwrap_err().code(), Code::Cancelled);
    }

    #[tokio::test]
    async fn streaming_delivers_in_order_and_replenishes_demand() {
        let (counter, mut listener, frames) = bound();
        listener.on_headers(Metadata::new());
        listener.on_message("a");
        listener.on_message("b");
        listener.on_close(Status::ok(), Metadata::new());

        let kinds: Vec<_> = frames.map(|f| f.unwrap().kind()).collect().await;
        assert_eq!(kinds, ["headers", "message", "message", "trailers"]);
        assert_eq!(counter.requested.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn streaming_failure_replaces_trailers() {
        let (_counter, mut listener, mut frames) = bound();
        listener.on_message("a");
        listener.on_close(Status::deadline_exceeded("late"), Metadata::new());

        assert!(frames.next().await.unwrap().is_ok());
        let err = frames.next().await.unwrap().unwrap_err();
        assert_eq!(err.code(), Code::DeadlineExceeded);
        assert!(frames.next().await.is_none());
    }

    #[tokio::test]
    async fn streaming_drops_out_of_order_frames() {
        let (_counter, mut listener, frames) = bound();
        listener.on_message("a");
        listener.on_headers(Metadata::new());
        listener.on_close(Status::ok(), Metadata::new());
        listener.on_message("late");

        let kinds: Vec<_> = frames.map(|f| f.unwrap().kind()).collect().await;
        assert_eq!(kinds, ["message", "trailers"]);
    }

    #[tokio::test]
    async fn streaming_listener_dropped_without_close() {
        let (_counter, mut listener, mut frames) = bound();
        listener.on_message("a");
        drop(listener);

        assert!(frames.next().await.unwrap().is_ok());
        let err = frames.next().await.unwrap().unwrap_err();
        assert_eq!(err.code(), Code::Cancelled);
        assert!(frames.next().await.is_none());
    }
}
