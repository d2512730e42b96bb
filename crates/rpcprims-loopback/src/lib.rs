//! In-memory loopback transport for rpcprims.
//!
//! [`LoopbackChannel`] implements [`Channel`](rpcprims_call::Channel) by
//! routing each call to an async handler running on the current tokio
//! runtime. It honours the call contract the drivers rely on: demand-paced
//! delivery through `request(n)`, deadlines from
//! [`CallOptions`](rpcprims_call::CallOptions), message size limits and
//! client cancellation. Every client-side operation is recorded in a
//! [`Journal`], and [`Faults`] can make individual operations fail.

pub mod channel;
pub mod config;
pub mod handlers;
pub mod journal;
pub mod server;

pub use channel::LoopbackChannel;
pub use config::{Faults, LoopbackConfig, DEFAULT_MAX_MESSAGE_SIZE};
pub use handlers::demo_router;
pub use journal::{CallEvent, CallRecord, Journal};
pub use server::{Handler, RequestStream, Responder, Router, ServerCall};
