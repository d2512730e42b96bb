//! Exit-outcome driven cleanup for one call.

use std::pin::Pin;
use std::task::{ready, Context, Poll};

use futures_core::Stream;
use futures_util::stream::BoxStream;
use futures_util::StreamExt;
use rpcprims_call::{SharedCall, Status};
use rpcprims_frame::ResponseFrame;
use tracing::debug;

/// Reason passed to `cancel` whenever a scope ends abnormally.
pub const CANCEL_REASON: &str = "call aborted by client";

/// How a call scope ended.
#[derive(Debug, Clone)]
pub enum ExitOutcome {
    Success,
    Failure(Status),
    /// The scope was dropped before it reached a result.
    Interrupted,
}

impl ExitOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success)
    }

    fn label(&self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Failure(_) => "failure",
            Self::Interrupted => "interrupted",
        }
    }
}

/// Guard that owns a call for the lifetime of one driver invocation.
///
/// Releasing with anything other than [`ExitOutcome::Success`] cancels the
/// call once. Errors from `cancel` are logged and discarded so they never
/// replace the outcome being reported. Dropping an unreleased scope counts as
/// [`ExitOutcome::Interrupted`].
pub struct CallScope<Req, Res> {
    call: SharedCall<Req, Res>,
    method: String,
    released: bool,
}

impl<Req, Res> CallScope<Req, Res> {
    pub fn new(call: SharedCall<Req, Res>, method: &str) -> Self {
        Self {
            call,
            method: method.to_string(),
            released: false,
        }
    }

    pub fn call(&self) -> &SharedCall<Req, Res> {
        &self.call
    }

    pub fn release(mut self, outcome: ExitOutcome) {
        self.finish(outcome);
    }

    /// Release according to `result` and hand it back unchanged.
    pub fn complete<T>(self, result: Result<T, Status>) -> Result<T, Status> {
        match &result {
            Ok(_) => self.release(ExitOutcome::Success),
            Err(status) => self.release(ExitOutcome::Failure(status.clone())),
        }
        result
    }

    /// Release with a failure and return the status for propagation.
    pub fn fail(self, status: Status) -> Status {
        self.release(ExitOutcome::Failure(status.clone()));
        status
    }

    fn finish(&mut self, outcome: ExitOutcome) {
        if self.released {
            return;
        }
        self.released = true;
        debug!(method = %self.method, outcome = outcome.label(), "releasing call scope");

        let cause = match outcome {
            ExitOutcome::Success => return,
            ExitOutcome::Failure(status) => Some(status),
            ExitOutcome::Interrupted => None,
        };
        if let Err(err) = self.call.cancel(CANCEL_REASON, cause) {
            debug!(method = %self.method, error = %err, "ignoring cancel failure");
        }
    }
}

impl<Req, Res> Drop for CallScope<Req, Res> {
    fn drop(&mut self) {
        self.finish(ExitOutcome::Interrupted);
    }
}

/// A response frame stream that releases its call scope when it ends.
///
/// A `Trailers` frame or the end of the stream releases with success. A failure
/// item releases with that failure and ends the stream after it is delivered.
/// Dropping the stream early releases as interrupted.
pub struct ScopedFrames<Req, Res> {
    inner: Option<BoxStream<'static, Result<ResponseFrame<Res>, Status>>>,
    scope: Option<CallScope<Req, Res>>,
}

impl<Req, Res> ScopedFrames<Req, Res> {
    pub fn new(
        inner: BoxStream<'static, Result<ResponseFrame<Res>, Status>>,
        scope: CallScope<Req, Res>,
    ) -> Self {
        Self {
            inner: Some(inner),
            scope: Some(scope),
        }
    }

    fn release(&mut self, outcome: ExitOutcome) {
        if let Some(scope) = self.scope.take() {
            scope.release(outcome);
        }
    }
}

impl<Req, Res> Stream for ScopedFrames<Req, Res> {
    type Item = Result<ResponseFrame<Res>, Status>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        let Some(inner) = this.inner.as_mut() else {
            return Poll::Ready(None);
        };

        let item = ready!(inner.poll_next_unpin(cx));
        match &item {
            Some(Ok(ResponseFrame::Trailers(..))) => this.release(ExitOutcome::Success),
            Some(Ok(ResponseFrame::Headers(_) | ResponseFrame::Message(_))) => {}
            Some(Err(status)) => {
                this.release(ExitOutcome::Failure(status.clone()));
                this.inner = None;
            }
            None => {
                this.release(ExitOutcome::Success);
                this.inner = None;
            }
        }
        Poll::Ready(item)
    }
}
