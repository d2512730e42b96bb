use std::time::Duration;

use bytes::Bytes;
use futures_util::{stream, Stream, StreamExt};
use rpcprims_call::{
    CallOptions, Code, Metadata, MethodDescriptor, MethodType, Status, Utf8Marshaller,
};
use rpcprims_client::calls::{
    bidi_streaming_call, bidi_streaming_call_with_metadata, client_streaming_call,
    client_streaming_call_with_metadata, server_streaming_call,
    server_streaming_call_with_metadata, unary_call, unary_call_with_metadata,
};
use rpcprims_client::CANCEL_REASON;
use rpcprims_frame::ResponseFrame;
use rpcprims_loopback::handlers::{self, demo_router};
use rpcprims_loopback::{CallEvent, CallRecord, Faults, LoopbackChannel, Router, ServerCall};

const PONG: &str = "demo.Ping/Pong";
const PAIR: &str = "demo.Ping/Pair";
const FIXED: &str = "demo.Ping/Fixed";
const TWO_THEN_DONE: &str = "demo.Ping/TwoThenDone";
const REJECT: &str = "demo.Ping/Reject";
const HANG: &str = "demo.Ping/Hang";

fn method(name: &str, method_type: MethodType) -> MethodDescriptor<String, String> {
    MethodDescriptor::new(name, method_type, Utf8Marshaller, Utf8Marshaller)
}

/// Answers "pong" without headers or trailers.
async fn pong(mut call: ServerCall) -> Result<(), Status> {
    call.requests.next().await;
    call.responder.send(Bytes::from_static(b"pong")).await
}

/// Headers, "a", "b", trailers.
async fn pair(call: ServerCall) -> Result<(), Status> {
    call.responder.send_headers(Metadata::new())?;
    call.responder.send(Bytes::from_static(b"a")).await?;
    call.responder.send(Bytes::from_static(b"b")).await
}

/// Drains every request, then answers "R".
async fn fixed(mut call: ServerCall) -> Result<(), Status> {
    while call.requests.next().await.is_some() {}
    call.responder.send(Bytes::from_static(b"R")).await
}

/// Answers the first two requests, then closes regardless of what remains.
async fn two_then_done(mut call: ServerCall) -> Result<(), Status> {
    for _ in 0..2 {
        if let Some(request) = call.requests.next().await {
            call.responder.send(request).await?;
        }
    }
    Ok(())
}

async fn reject(_call: ServerCall) -> Result<(), Status> {
    Err(Status::invalid_argument("rejected by handler"))
}

async fn hang(call: ServerCall) -> Result<(), Status> {
    call.responder.cancelled().await;
    Ok(())
}

fn router() -> Router {
    Router::new()
        .route(PONG, pong)
        .route(PAIR, pair)
        .route(FIXED, fixed)
        .route(TWO_THEN_DONE, two_then_done)
        .route(REJECT, reject)
        .route(HANG, hang)
}

fn channel() -> LoopbackChannel {
    LoopbackChannel::new(router())
}

fn text(values: &[&str]) -> Vec<Result<String, Status>> {
    values.iter().map(|v| Ok(v.to_string())).collect()
}

/// `values`, each sent after `delay`.
fn delayed(
    values: &[&str],
    delay: Duration,
) -> impl Stream<Item = Result<String, Status>> + Send + 'static {
    stream::iter(text(values)).then(move |item| async move {
        tokio::time::sleep(delay).await;
        item
    })
}

fn source_failure() -> Status {
    Status::failed_precondition("request source failed")
}

fn last(channel: &LoopbackChannel) -> CallRecord {
    channel.journal().last().expect("a recorded call")
}

// Unary

#[tokio::test]
async fn unary_plain_returns_bare_value() {
    let channel = channel();
    let reply = unary_call(
        &channel,
        &method(PONG, MethodType::Unary),
        &CallOptions::default(),
        Metadata::new(),
        "ping".to_string(),
    )
    .await
    .unwrap();

    assert_eq!(reply, "pong");
    let record = last(&channel);
    assert!(record.is_well_ordered());
    assert_eq!(record.cancel_count(), 0);
}

#[tokio::test]
async fn unary_with_metadata_returns_context() {
    let channel = channel();
    let ctx = unary_call_with_metadata(
        &channel,
        &method(PONG, MethodType::Unary),
        &CallOptions::default(),
        Metadata::new(),
        "ping".to_string(),
    )
    .await
    .unwrap();

    assert_eq!(ctx.value, "pong");
    assert!(ctx.headers.is_empty());
    assert!(ctx.trailers.is_empty());
}

#[tokio::test]
async fn unary_follows_operation_order() {
    let channel = channel();
    unary_call(
        &channel,
        &method(PONG, MethodType::Unary),
        &CallOptions::default(),
        Metadata::new(),
        "ping".to_string(),
    )
    .await
    .unwrap();

    assert_eq!(
        last(&channel).events,
        [
            CallEvent::Start,
            CallEvent::Request(1),
            CallEvent::SendMessage,
            CallEvent::HalfClose
        ]
    );
}

#[tokio::test]
async fn unary_demo_echo_surfaces_metadata() {
    let channel = LoopbackChannel::new(demo_router());
    let ctx = unary_call_with_metadata(
        &channel,
        &handlers::echo_method(),
        &CallOptions::default(),
        Metadata::new(),
        "hello".to_string(),
    )
    .await
    .unwrap();

    assert_eq!(ctx.value, "hello");
    assert_eq!(ctx.headers.get("x-handler"), Some("echo"));
    assert_eq!(ctx.trailers.get("x-count"), Some("1"));
}

#[tokio::test]
async fn unary_failure_cancels_once() {
    let channel = channel();
    let err = unary_call(
        &channel,
        &method(REJECT, MethodType::Unary),
        &CallOptions::default(),
        Metadata::new(),
        "ping".to_string(),
    )
    .await
    .unwrap_err();

    assert_eq!(err.code(), Code::InvalidArgument);
    let record = last(&channel);
    assert!(record.is_well_ordered());
    assert_eq!(record.cancel_count(), 1);
    assert!(record
        .events
        .contains(&CallEvent::Cancel(CANCEL_REASON.to_string())));
}

#[tokio::test]
async fn unary_unknown_method_is_unimplemented() {
    let channel = channel();
    let err = unary_call(
        &channel,
        &method("demo.Ping/Missing", MethodType::Unary),
        &CallOptions::default(),
        Metadata::new(),
        "ping".to_string(),
    )
    .await
    .unwrap_err();

    assert_eq!(err.code(), Code::Unimplemented);
    assert!(last(&channel).is_well_ordered());
}

#[tokio::test(start_paused = true)]
async fn unary_interrupted_cancels_once() {
    let channel = channel();
    let hang = method(HANG, MethodType::Unary);
    let options = CallOptions::default();
    let call = unary_call(&channel, &hang, &options, Metadata::new(), "ping".to_string());
    let result = tokio::time::timeout(Duration::from_millis(10), call).await;

    assert!(result.is_err());
    let record = last(&channel);
    assert!(record.is_well_ordered());
    assert_eq!(record.cancel_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn unary_deadline_is_enforced_by_transport() {
    let channel = channel();
    let err = unary_call(
        &channel,
        &method(HANG, MethodType::Unary),
        &CallOptions::new().with_timeout(Duration::from_millis(100)),
        Metadata::new(),
        "ping".to_string(),
    )
    .await
    .unwrap_err();

    assert_eq!(err.code(), Code::DeadlineExceeded);
    assert_eq!(last(&channel).cancel_count(), 1);
}

#[tokio::test]
async fn start_failure_surfaces_and_cancels() {
    let channel = channel().with_faults(Faults::none().with_fail_start());
    let err = unary_call(
        &channel,
        &method(PONG, MethodType::Unary),
        &CallOptions::default(),
        Metadata::new(),
        "ping".to_string(),
    )
    .await
    .unwrap_err();

    assert_eq!(err.code(), Code::Unavailable);
    let record = last(&channel);
    assert_eq!(record.events[0], CallEvent::Start);
    assert_eq!(record.send_count(), 0);
    assert_eq!(record.cancel_count(), 1);
}

#[tokio::test]
async fn cancel_failure_does_not_mask_outcome() {
    let channel = channel().with_faults(Faults::none().with_fail_cancel());
    let err = unary_call(
        &channel,
        &method(REJECT, MethodType::Unary),
        &CallOptions::default(),
        Metadata::new(),
        "ping".to_string(),
    )
    .await
    .unwrap_err();

    assert_eq!(err.code(), Code::InvalidArgument);
    assert_eq!(err.message(), Some("rejected by handler"));
    assert_eq!(last(&channel).cancel_count(), 1);
}

// Server streaming

#[tokio::test]
async fn server_streaming_plain_strips_metadata_frames() {
    let channel = channel();
    let values: Vec<_> = server_streaming_call(
        &channel,
        &method(PAIR, MethodType::ServerStreaming),
        &CallOptions::default(),
        Metadata::new(),
        "go".to_string(),
    )
    .map(Result::unwrap)
    .collect()
    .await;

    assert_eq!(values, ["a", "b"]);
    let record = last(&channel);
    assert!(record.is_well_ordered());
    assert_eq!(record.cancel_count(), 0);
}

#[tokio::test]
async fn server_streaming_with_metadata_yields_every_frame() {
    let channel = channel();
    let frames: Vec<_> = server_streaming_call_with_metadata(
        &channel,
        &method(PAIR, MethodType::ServerStreaming),
        &CallOptions::default(),
        Metadata::new(),
        "go".to_string(),
    )
    .map(Result::unwrap)
    .collect()
    .await;

    let kinds: Vec<_> = frames.iter().map(ResponseFrame::kind).collect();
    assert_eq!(kinds, ["headers", "message", "message", "trailers"]);
    assert!(matches!(&frames[3], ResponseFrame::Trailers(status, _) if status.is_ok()));
}

#[tokio::test]
async fn server_streaming_is_lazy() {
    let channel = channel();
    let frames = server_streaming_call(
        &channel,
        &method(PAIR, MethodType::ServerStreaming),
        &CallOptions::default(),
        Metadata::new(),
        "go".to_string(),
    );
    assert!(channel.journal().is_empty());
    drop(frames);
    assert!(channel.journal().is_empty());
}

#[tokio::test]
async fn server_streaming_half_closes_before_first_frame() {
    let channel = LoopbackChannel::new(demo_router());
    let mut headers = Metadata::new();
    headers.insert(handlers::REPEAT_HEADER, "2");
    let mut frames = server_streaming_call(
        &channel,
        &handlers::repeat_method(),
        &CallOptions::default(),
        headers,
        "tick".to_string(),
    );

    assert_eq!(frames.next().await.unwrap().unwrap(), "tick #1");
    assert!(last(&channel).half_closed());
    assert_eq!(frames.next().await.unwrap().unwrap(), "tick #2");
    assert!(frames.next().await.is_none());
}

#[tokio::test]
async fn server_streaming_dropped_early_cancels_once() {
    let channel = LoopbackChannel::new(demo_router());
    let mut headers = Metadata::new();
    headers.insert(handlers::REPEAT_HEADER, "100");
    let mut frames = server_streaming_call(
        &channel,
        &handlers::repeat_method(),
        &CallOptions::default(),
        headers,
        "tick".to_string(),
    );

    frames.next().await.unwrap().unwrap();
    drop(frames);

    let record = last(&channel);
    assert!(record.is_well_ordered());
    assert_eq!(record.cancel_count(), 1);
}

#[tokio::test]
async fn server_streaming_failure_ends_stream_and_cancels() {
    let channel = channel();
    let items: Vec<_> = server_streaming_call_with_metadata(
        &channel,
        &method(REJECT, MethodType::ServerStreaming),
        &CallOptions::default(),
        Metadata::new(),
        "go".to_string(),
    )
    .collect()
    .await;

    assert_eq!(items.len(), 1);
    assert_eq!(items[0].as_ref().unwrap_err().code(), Code::InvalidArgument);
    assert_eq!(last(&channel).cancel_count(), 1);
}

// Client streaming

#[tokio::test(start_paused = true)]
async fn client_streaming_result_is_independent_of_timing() {
    for count in [0usize, 1, 5] {
        for delay in [Duration::ZERO, Duration::from_millis(7), Duration::from_millis(50)] {
            let channel = channel();
            let requests: Vec<_> = (0..count).map(|_| "x").collect();
            let reply = client_streaming_call(
                &channel,
                &method(FIXED, MethodType::ClientStreaming),
                &CallOptions::default(),
                Metadata::new(),
                delayed(&requests, delay),
            )
            .await
            .unwrap();

            assert_eq!(reply, "R", "count={count} delay={delay:?}");
            let record = last(&channel);
            assert!(record.is_well_ordered());
            assert_eq!(record.send_count(), count);
            assert!(record.half_closed());
            assert_eq!(record.cancel_count(), 0);
        }
    }
}

#[tokio::test]
async fn client_streaming_demo_concat() {
    let channel = LoopbackChannel::new(demo_router());
    let ctx = client_streaming_call_with_metadata(
        &channel,
        &handlers::concat_method(),
        &CallOptions::default(),
        Metadata::new(),
        stream::iter(text(&["a", "b", "c"])),
    )
    .await
    .unwrap();

    assert_eq!(ctx.value, "a b c");
    assert_eq!(ctx.headers.get("x-handler"), Some("concat"));
    assert_eq!(ctx.trailers.get("x-count"), Some("3"));
}

#[tokio::test]
async fn client_streaming_request_error_short_circuits() {
    let channel = channel();
    let requests = stream::iter(vec![Ok("a".to_string()), Err(source_failure())]);
    let err = client_streaming_call(
        &channel,
        &method(FIXED, MethodType::ClientStreaming),
        &CallOptions::default(),
        Metadata::new(),
        requests,
    )
    .await
    .unwrap_err();

    assert_eq!(err.code(), Code::FailedPrecondition);
    let record = last(&channel);
    assert!(record.is_well_ordered());
    assert_eq!(record.send_count(), 1);
    assert!(!record.half_closed());
    assert_eq!(record.cancel_count(), 1);
}

#[tokio::test]
async fn client_streaming_send_failure_propagates() {
    let channel = channel().with_faults(Faults::none().with_fail_send_after(2));
    let err = client_streaming_call(
        &channel,
        &method(FIXED, MethodType::ClientStreaming),
        &CallOptions::default(),
        Metadata::new(),
        stream::iter(text(&["a", "b", "c", "d"])),
    )
    .await
    .unwrap_err();

    assert_eq!(err.code(), Code::Unavailable);
    let record = last(&channel);
    assert_eq!(record.send_count(), 3);
    assert!(!record.half_closed());
    assert_eq!(record.cancel_count(), 1);
}

#[tokio::test]
async fn client_streaming_inbound_failure_short_circuits() {
    let channel = channel();
    let err = client_streaming_call(
        &channel,
        &method(REJECT, MethodType::ClientStreaming),
        &CallOptions::default(),
        Metadata::new(),
        stream::pending(),
    )
    .await
    .unwrap_err();

    assert_eq!(err.code(), Code::InvalidArgument);
    assert_eq!(last(&channel).cancel_count(), 1);
}

// Bidi streaming

#[tokio::test(start_paused = true)]
async fn bidi_halts_when_inbound_ends() {
    let channel = channel();
    let requests =
        stream::iter(text(&["1", "2"])).chain(delayed(&["3", "4", "5"], Duration::from_millis(50)));
    let frames: Vec<_> = bidi_streaming_call_with_metadata(
        &channel,
        &method(TWO_THEN_DONE, MethodType::BidiStreaming),
        &CallOptions::default(),
        Metadata::new(),
        requests,
    )
    .map(Result::unwrap)
    .collect()
    .await;

    let kinds: Vec<_> = frames.iter().map(ResponseFrame::kind).collect();
    assert_eq!(kinds, ["message", "message", "trailers"]);

    tokio::time::sleep(Duration::from_secs(1)).await;
    let record = last(&channel);
    assert!(record.is_well_ordered());
    assert_eq!(record.send_count(), 2);
    assert!(!record.half_closed());
    assert_eq!(record.cancel_count(), 0);
}

#[tokio::test]
async fn bidi_keeps_receiving_after_outbound_ends() {
    let channel = LoopbackChannel::new(demo_router());
    let values: Vec<_> = bidi_streaming_call(
        &channel,
        &handlers::echo_stream_method(),
        &CallOptions::default(),
        Metadata::new(),
        stream::iter(text(&["a", "b", "c"])),
    )
    .map(Result::unwrap)
    .collect()
    .await;

    assert_eq!(values, ["a", "b", "c"]);
    let record = last(&channel);
    assert!(record.is_well_ordered());
    assert!(record.half_closed());
    assert_eq!(record.cancel_count(), 0);
}

#[tokio::test]
async fn bidi_outbound_failure_ends_stream() {
    let channel = LoopbackChannel::new(demo_router());
    let requests = stream::iter(vec![Ok("a".to_string()), Err(source_failure())]);
    let items: Vec<_> = bidi_streaming_call(
        &channel,
        &handlers::echo_stream_method(),
        &CallOptions::default(),
        Metadata::new(),
        requests,
    )
    .collect()
    .await;

    let err = items.last().unwrap().as_ref().unwrap_err();
    assert_eq!(err.code(), Code::FailedPrecondition);
    let record = last(&channel);
    assert!(record.is_well_ordered());
    assert!(!record.half_closed());
    assert_eq!(record.cancel_count(), 1);
}

#[tokio::test]
async fn bidi_is_lazy_and_starts_on_first_poll() {
    let channel = LoopbackChannel::new(demo_router());
    let mut frames = bidi_streaming_call_with_metadata(
        &channel,
        &handlers::echo_stream_method(),
        &CallOptions::default(),
        Metadata::new(),
        stream::iter(text(&["a"])),
    );
    assert!(channel.journal().is_empty());

    let first = frames.next().await.unwrap().unwrap();
    assert!(first.is_headers());
    assert_eq!(last(&channel).events[0], CallEvent::Start);
}
