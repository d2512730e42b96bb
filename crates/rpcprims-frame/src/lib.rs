//! Response data model for rpcprims calls.
//!
//! Every streaming call surfaces its inbound side as a sequence of
//! [`ResponseFrame`]s:
//! - at most one `Headers` frame, first
//! - zero or more `Message` frames
//! - exactly one terminal `Trailers` frame, unless the stream fails first
//!
//! Single-response calls surface a [`ResponseContext`] instead. The
//! [`projection`] module strips metadata for callers that only want values.

pub mod context;
pub mod frame;
pub mod order;
pub mod projection;

pub use context::ResponseContext;
pub use frame::ResponseFrame;
pub use order::{FrameOrder, OrderViolation};
pub use projection::messages;
