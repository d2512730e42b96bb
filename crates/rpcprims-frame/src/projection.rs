//! Metadata projection for the "plain" call APIs.

use std::future;

use futures_util::{Stream, TryStreamExt};
use rpcprims_call::Status;

use crate::frame::ResponseFrame;

/// Keep only the `Message` frames of a response stream.
///
/// `Headers` and `Trailers` frames are dropped silently; failures pass through
/// unchanged.
pub fn messages<S, Res>(frames: S) -> impl Stream<Item = Result<Res, Status>>
where
    S: Stream<Item = Result<ResponseFrame<Res>, Status>>,
{
    frames.try_filter_map(|frame| future::ready(Ok(frame.into_message())))
}
