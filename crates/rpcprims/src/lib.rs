//! Composable future and stream APIs for unary and streaming RPC calls.
//!
//! rpcprims adapts a listener/callback call primitive into four call shapes
//! (unary, server streaming, client streaming, bidi streaming) with fixed
//! operation ordering, demand-paced delivery and cancellation whenever a call
//! ends abnormally.
//!
//! # Crate Structure
//!
//! - [`call`]: the transport contract (`Channel`, `ClientCall`, `CallListener`),
//!   `Status`, metadata, options and marshallers
//! - [`frame`]: response frames, response contexts and metadata projection
//! - [`client`]: the call drivers (behind `client` feature, on by default)
//! - [`loopback`]: in-memory channel for tests and demos (behind `loopback` feature)

/// Re-export call contract types.
pub mod call {
    pub use rpcprims_call::*;
}

/// Re-export response frame types.
pub mod frame {
    pub use rpcprims_frame::*;
}

/// Re-export the call drivers (requires `client` feature).
#[cfg(feature = "client")]
pub mod client {
    pub use rpcprims_client::*;
}

/// Re-export the loopback channel (requires `loopback` feature).
#[cfg(feature = "loopback")]
pub mod loopback {
    pub use rpcprims_loopback::*;
}

pub use rpcprims_call::{CallOptions, Code, Metadata, MethodDescriptor, MethodType, Status};
pub use rpcprims_frame::{ResponseContext, ResponseFrame};
