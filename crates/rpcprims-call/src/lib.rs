//! Client call contracts for rpcprims.
//!
//! This is the lowest layer of rpcprims. It describes the asynchronous call
//! primitive every call shape is built on:
//! - [`Channel`] creates one [`ClientCall`] per invocation
//! - [`ClientCall`] is driven through start, request, send, half-close, cancel
//! - [`CallListener`] is the callback surface the transport pushes into
//!
//! Everything the transport needs to carry but the adapter never inspects
//! ([`Metadata`], [`CallOptions`], the [`Marshaller`]s inside a
//! [`MethodDescriptor`]) also lives here, together with [`Status`], the single
//! failure type surfaced to callers.

pub mod error;
pub mod metadata;
pub mod method;
pub mod options;
pub mod traits;

pub use error::{CallError, Code, Result, Status};
pub use metadata::{Metadata, MetadataValue};
pub use method::{
    BytesMarshaller, JsonMarshaller, Marshaller, MethodDescriptor, MethodType, Utf8Marshaller,
};
pub use options::CallOptions;
pub use traits::{BoxListener, CallListener, Channel, ClientCall, SharedCall};
