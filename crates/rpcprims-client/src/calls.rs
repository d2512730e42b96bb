//! The eight call entry points.
//!
//! Each shape has a `_with_metadata` variant that surfaces headers and
//! trailers, and a plain variant that projects them away. Unary and
//! client-streaming calls are `async fn`s resolving to one response.
//! Server-streaming and bidi calls return a lazy stream: nothing happens,
//! not even `new_call`, until it is first polled.

use std::future::{self, Future};
use std::pin::pin;
use std::sync::Arc;

use futures_core::Stream;
use futures_util::stream::{self, BoxStream};
use futures_util::{StreamExt, TryStreamExt};
use rpcprims_call::{
    BoxListener, CallOptions, Channel, Metadata, MethodDescriptor, SharedCall, Status,
};
use rpcprims_frame::{messages, ResponseContext, ResponseFrame};
use tracing::{debug, trace};

use crate::listener::{streaming_listener, unary_listener};
use crate::merge::{merge, HaltStrategy};
use crate::scope::{CallScope, ScopedFrames};

/// Stream of response frames for a server-streaming or bidi call.
pub type FrameStream<Res> = BoxStream<'static, Result<ResponseFrame<Res>, Status>>;

/// Stream of bare response messages.
pub type MessageStream<Res> = BoxStream<'static, Result<Res, Status>>;

/// Send one request and receive one response, with metadata.
pub async fn unary_call_with_metadata<C, Req, Res>(
    channel: &C,
    method: &MethodDescriptor<Req, Res>,
    options: &CallOptions,
    headers: Metadata,
    request: Req,
) -> Result<ResponseContext<Res>, Status>
where
    C: Channel,
    Req: Send + 'static,
    Res: Send + 'static,
{
    let call = channel.new_call(method, options).await?;
    let scope = CallScope::new(Arc::clone(&call), method.full_name());
    let (listener, response) = unary_listener();

    let result = match send_single(&call, Box::new(listener), headers, request) {
        Ok(()) => response.get().await,
        Err(status) => Err(status),
    };
    scope.complete(result)
}

/// Send one request and receive one response.
pub async fn unary_call<C, Req, Res>(
    channel: &C,
    method: &MethodDescriptor<Req, Res>,
    options: &CallOptions,
    headers: Metadata,
    request: Req,
) -> Result<Res, Status>
where
    C: Channel,
    Req: Send + 'static,
    Res: Send + 'static,
{
    unary_call_with_metadata(channel, method, options, headers, request)
        .await
        .map(ResponseContext::into_value)
}

/// Send one request and stream back every response frame.
///
/// The request is sent and the call half-closed before the first frame is
/// yielded.
pub fn server_streaming_call_with_metadata<C, Req, Res>(
    channel: &C,
    method: &MethodDescriptor<Req, Res>,
    options: &CallOptions,
    headers: Metadata,
    request: Req,
) -> FrameStream<Res>
where
    C: Channel + Clone + 'static,
    Req: Send + 'static,
    Res: Send + 'static,
{
    let channel = channel.clone();
    let method = method.clone();
    let options = options.clone();

    stream::once(async move {
        let call = channel.new_call(&method, &options).await?;
        let scope = CallScope::new(Arc::clone(&call), method.full_name());
        let (listener, frames) = streaming_listener(Arc::clone(&call));

        if let Err(status) = send_single(&call, Box::new(listener), headers, request) {
            return Err(scope.fail(status));
        }
        Ok(ScopedFrames::new(frames.boxed(), scope))
    })
    .try_flatten()
    .boxed()
}

/// Send one request and stream back the response messages.
pub fn server_streaming_call<C, Req, Res>(
    channel: &C,
    method: &MethodDescriptor<Req, Res>,
    options: &CallOptions,
    headers: Metadata,
    request: Req,
) -> MessageStream<Res>
where
    C: Channel + Clone + 'static,
    Req: Send + 'static,
    Res: Send + 'static,
{
    messages(server_streaming_call_with_metadata(
        channel, method, options, headers, request,
    ))
    .boxed()
}

/// Stream requests and receive one response, with metadata.
///
/// Sending and waiting for the response run concurrently. A failure on either
/// side ends the call with that failure.
pub async fn client_streaming_call_with_metadata<C, Req, Res, S>(
    channel: &C,
    method: &MethodDescriptor<Req, Res>,
    options: &CallOptions,
    headers: Metadata,
    requests: S,
) -> Result<ResponseContext<Res>, Status>
where
    C: Channel,
    Req: Send + 'static,
    Res: Send + 'static,
    S: Stream<Item = Result<Req, Status>> + Send + 'static,
{
    let call = channel.new_call(method, options).await?;
    let scope = CallScope::new(Arc::clone(&call), method.full_name());
    let (listener, response) = unary_listener();

    if let Err(status) = open(&call, Box::new(listener), headers) {
        return Err(scope.fail(status));
    }

    let outbound = drain(send_all(Arc::clone(&call), requests));
    let inbound = stream::once(response.get());
    let result = last_element(merge(outbound, inbound, HaltStrategy::Both)).await;
    scope.complete(result)
}

/// Stream requests and receive one response.
pub async fn client_streaming_call<C, Req, Res, S>(
    channel: &C,
    method: &MethodDescriptor<Req, Res>,
    options: &CallOptions,
    headers: Metadata,
    requests: S,
) -> Result<Res, Status>
where
    C: Channel,
    Req: Send + 'static,
    Res: Send + 'static,
    S: Stream<Item = Result<Req, Status>> + Send + 'static,
{
    client_streaming_call_with_metadata(channel, method, options, headers, requests)
        .await
        .map(ResponseContext::into_value)
}

/// Stream requests and stream back every response frame.
///
/// The returned stream ends as soon as the server side ends, even if requests
/// are still waiting to be sent; those are abandoned. Running out of requests
/// only half-closes the call.
pub fn bidi_streaming_call_with_metadata<C, Req, Res, S>(
    channel: &C,
    method: &MethodDescriptor<Req, Res>,
    options: &CallOptions,
    headers: Metadata,
    requests: S,
) -> FrameStream<Res>
where
    C: Channel + Clone + 'static,
    Req: Send + 'static,
    Res: Send + 'static,
    S: Stream<Item = Result<Req, Status>> + Send + 'static,
{
    let channel = channel.clone();
    let method = method.clone();
    let options = options.clone();

    stream::once(async move {
        let call = channel.new_call(&method, &options).await?;
        let scope = CallScope::new(Arc::clone(&call), method.full_name());
        let (listener, frames) = streaming_listener(Arc::clone(&call));

        let outbound = drain(async move {
            open(&call, Box::new(listener), headers)?;
            send_all(call, requests).await
        });
        let merged = merge(outbound, frames, HaltStrategy::Right);
        Ok::<_, Status>(ScopedFrames::new(merged.boxed(), scope))
    })
    .try_flatten()
    .boxed()
}

/// Stream requests and stream back the response messages.
pub fn bidi_streaming_call<C, Req, Res, S>(
    channel: &C,
    method: &MethodDescriptor<Req, Res>,
    options: &CallOptions,
    headers: Metadata,
    requests: S,
) -> MessageStream<Res>
where
    C: Channel + Clone + 'static,
    Req: Send + 'static,
    Res: Send + 'static,
    S: Stream<Item = Result<Req, Status>> + Send + 'static,
{
    messages(bidi_streaming_call_with_metadata(
        channel, method, options, headers, requests,
    ))
    .boxed()
}

fn open<Req, Res>(
    call: &SharedCall<Req, Res>,
    listener: BoxListener<Res>,
    headers: Metadata,
) -> Result<(), Status> {
    call.start(listener, headers)?;
    debug!("call started");
    call.request(1)?;
    Ok(())
}

fn send_single<Req, Res>(
    call: &SharedCall<Req, Res>,
    listener: BoxListener<Res>,
    headers: Metadata,
    request: Req,
) -> Result<(), Status> {
    open(call, listener, headers)?;
    call.send_message(request)?;
    call.half_close()?;
    debug!("request sent and half-closed");
    Ok(())
}

async fn send_all<Req, Res, S>(call: SharedCall<Req, Res>, requests: S) -> Result<(), Status>
where
    S: Stream<Item = Result<Req, Status>>,
{
    let mut requests = pin!(requests);
    let mut sent = 0usize;
    while let Some(request) = requests.next().await {
        call.send_message(request?)?;
        sent += 1;
        trace!(sent, "request sent");
    }
    call.half_close()?;
    debug!(sent, "request stream exhausted, half-closed");
    Ok(())
}

/// Run `work` as a stream that emits nothing but its failure, if any.
fn drain<T, F>(work: F) -> impl Stream<Item = Result<T, Status>> + Send + 'static
where
    T: Send + 'static,
    F: Future<Output = Result<(), Status>> + Send + 'static,
{
    stream::once(work).filter_map(|result| future::ready(result.err().map(Err)))
}

async fn last_element<T, S>(merged: S) -> Result<T, Status>
where
    S: Stream<Item = Result<T, Status>>,
{
    let mut merged = pin!(merged);
    let mut last = None;
    while let Some(item) = merged.next().await {
        last = Some(item?);
    }
    last.ok_or_else(|| Status::internal("client streaming call completed without a response"))
}
