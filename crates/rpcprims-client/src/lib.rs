//! Call drivers for unary, server-streaming, client-streaming and
//! bidirectional-streaming RPCs.
//!
//! The drivers sit on top of a listener/callback call primitive
//! ([`ClientCall`](rpcprims_call::ClientCall)) and turn it into futures and
//! streams with a fixed operation order (`start`, `request`, `send_message`*,
//! `half_close`) and a single rule for cleanup: any call whose scope ends in
//! failure or is dropped early is cancelled exactly once.
//!
//! ```no_run
//! # async fn demo(channel: rpcprims_loopback::LoopbackChannel) -> rpcprims_call::Result<()> {
//! use rpcprims_call::{CallOptions, Metadata, MethodDescriptor, MethodType, Utf8Marshaller};
//! use rpcprims_client::calls::unary_call;
//!
//! let method = MethodDescriptor::new(
//!     "demo.Echo/Unary",
//!     MethodType::Unary,
//!     Utf8Marshaller,
//!     Utf8Marshaller,
//! );
//! let reply = unary_call(
//!     &channel,
//!     &method,
//!     &CallOptions::default(),
//!     Metadata::new(),
//!     "ping".to_string(),
//! )
//! .await?;
//! # Ok(())
//! # }
//! ```

pub mod calls;
pub mod listener;
pub mod merge;
pub mod scope;

pub use calls::{
    bidi_streaming_call, bidi_streaming_call_with_metadata, client_streaming_call,
    client_streaming_call_with_metadata, server_streaming_call,
    server_streaming_call_with_metadata, unary_call, unary_call_with_metadata, FrameStream,
    MessageStream,
};
pub use listener::{
    streaming_listener, unary_listener, ResponseFrames, StreamingListener, UnaryListener,
    UnaryResponse,
};
pub use merge::{merge, HaltStrategy, Merge};
pub use scope::{CallScope, ExitOutcome, ScopedFrames, CANCEL_REASON};
