//! Built-in demo service used by the CLI and the tests.
//!
//! All four methods exchange UTF-8 text and answer with an `x-handler`
//! response header and an `x-count` trailer.

use bytes::Bytes;
use futures_util::StreamExt;
use rpcprims_call::{Metadata, MethodDescriptor, MethodType, Status, Utf8Marshaller};

use crate::server::{Router, ServerCall};

pub const ECHO: &str = "rpcprims.demo.Demo/Echo";
pub const REPEAT: &str = "rpcprims.demo.Demo/Repeat";
pub const CONCAT: &str = "rpcprims.demo.Demo/Concat";
pub const ECHO_STREAM: &str = "rpcprims.demo.Demo/EchoStream";

/// Request header read by [`repeat`] for the number of responses.
pub const REPEAT_HEADER: &str = "x-repeat";
pub const DEFAULT_REPEAT: usize = 3;

/// Router with all four demo methods registered.
pub fn demo_router() -> Router {
    Router::new()
        .route(ECHO, echo)
        .route(REPEAT, repeat)
        .route(CONCAT, concat)
        .route(ECHO_STREAM, echo_stream)
}

pub fn echo_method() -> MethodDescriptor<String, String> {
    MethodDescriptor::new(ECHO, MethodType::Unary, Utf8Marshaller, Utf8Marshaller)
}

pub fn repeat_method() -> MethodDescriptor<String, String> {
    MethodDescriptor::new(
        REPEAT,
        MethodType::ServerStreaming,
        Utf8Marshaller,
        Utf8Marshaller,
    )
}

pub fn concat_method() -> MethodDescriptor<String, String> {
    MethodDescriptor::new(
        CONCAT,
        MethodType::ClientStreaming,
        Utf8Marshaller,
        Utf8Marshaller,
    )
}

pub fn echo_stream_method() -> MethodDescriptor<String, String> {
    MethodDescriptor::new(
        ECHO_STREAM,
        MethodType::BidiStreaming,
        Utf8Marshaller,
        Utf8Marshaller,
    )
}

fn handler_headers(name: &str) -> Metadata {
    [("x-handler", name)].into_iter().collect()
}

fn finish(call: &ServerCall, count: usize) {
    let trailers: Metadata = [("x-count", count.to_string())].into_iter().collect();
    call.responder.close(Status::ok(), trailers);
}

/// Unary: answers with the request.
pub async fn echo(mut call: ServerCall) -> Result<(), Status> {
    call.responder.send_headers(handler_headers("echo"))?;
    let request = call
        .requests
        .next()
        .await
        .ok_or_else(|| Status::invalid_argument("missing request message"))?;
    call.responder.send(request).await?;
    finish(&call, 1);
    Ok(())
}

/// Server streaming: answers with `x-repeat` numbered copies of the request.
pub async fn repeat(mut call: ServerCall) -> Result<(), Status> {
    let count = match call.headers.get(REPEAT_HEADER) {
        Some(value) => value.parse::<usize>().map_err(|err| {
            Status::invalid_argument(format!("invalid {REPEAT_HEADER} header: {value}"))
                .with_cause(err)
        })?,
        None => DEFAULT_REPEAT,
    };
    call.responder.send_headers(handler_headers("repeat"))?;

    let request = call
        .requests
        .next()
        .await
        .ok_or_else(|| Status::invalid_argument("missing request message"))?;
    let text = String::from_utf8_lossy(&request).into_owned();
    for seq in 1..=count {
        call.responder.send(Bytes::from(format!("{text} #{seq}"))).await?;
    }
    finish(&call, count);
    Ok(())
}

/// Client streaming: answers with every request joined by a space.
pub async fn concat(mut call: ServerCall) -> Result<(), Status> {
    call.responder.send_headers(handler_headers("concat"))?;

    let mut parts = Vec::new();
    while let Some(request) = call.requests.next().await {
        parts.push(request);
    }
    let joined = parts.join(&b' ');
    call.responder.send(Bytes::from(joined)).await?;
    finish(&call, parts.len());
    Ok(())
}

/// Bidi streaming: answers each request as it arrives.
pub async fn echo_stream(mut call: ServerCall) -> Result<(), Status> {
    call.responder.send_headers(handler_headers("echo_stream"))?;

    let mut count = 0;
    while let Some(request) = call.requests.next().await {
        call.responder.send(request).await?;
        count += 1;
    }
    finish(&call, count);
    Ok(())
}
