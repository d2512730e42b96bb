use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use bytes::Bytes;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::Status;

/// The four call shapes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MethodType {
    Unary,
    ClientStreaming,
    ServerStreaming,
    BidiStreaming,
}

impl MethodType {
    /// True if the client sends exactly one request message.
    pub fn client_sends_one(self) -> bool {
        matches!(self, Self::Unary | Self::ServerStreaming)
    }

    /// True if the server sends exactly one response message.
    pub fn server_sends_one(self) -> bool {
        matches!(self, Self::Unary | Self::ClientStreaming)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Unary => "unary",
            Self::ClientStreaming => "client_streaming",
            Self::ServerStreaming => "server_streaming",
            Self::BidiStreaming => "bidi_streaming",
        }
    }
}

impl fmt::Display for MethodType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Converts messages to and from their serialized form.
pub trait Marshaller<T>: Send + Sync {
    fn encode(&self, value: &T) -> Result<Bytes, Status>;
    fn decode(&self, bytes: Bytes) -> Result<T, Status>;
}

/// JSON marshaller backed by `serde_json`.
pub struct JsonMarshaller<T>(PhantomData<fn() -> T>);

impl<T> JsonMarshaller<T> {
    pub fn new() -> Self {
        Self(PhantomData)
    }
}

impl<T> Default for JsonMarshaller<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Serialize + DeserializeOwned> Marshaller<T> for JsonMarshaller<T> {
    fn encode(&self, value: &T) -> Result<Bytes, Status> {
        serde_json::to_vec(value).map(Bytes::from).map_err(|err| {
            Status::internal(format!("failed to encode json message: {err}")).with_cause(err)
        })
    }

    fn decode(&self, bytes: Bytes) -> Result<T, Status> {
        serde_json::from_slice(&bytes).map_err(|err| {
            Status::internal(format!("failed to decode json message: {err}")).with_cause(err)
        })
    }
}

/// UTF-8 text marshaller for `String` messages.
#[derive(Debug, Clone, Copy, Default)]
pub struct Utf8Marshaller;

impl Marshaller<String> for Utf8Marshaller {
    fn encode(&self, value: &String) -> Result<Bytes, Status> {
        Ok(Bytes::copy_from_slice(value.as_bytes()))
    }

    fn decode(&self, bytes: Bytes) -> Result<String, Status> {
        String::from_utf8(bytes.to_vec())
            .map_err(|err| Status::internal("message is not valid utf-8").with_cause(err))
    }
}

/// Pass-through marshaller for raw byte messages.
#[derive(Debug, Clone, Copy, Default)]
pub struct BytesMarshaller;

impl Marshaller<Bytes> for BytesMarshaller {
    fn encode(&self, value: &Bytes) -> Result<Bytes, Status> {
        Ok(value.clone())
    }

    fn decode(&self, bytes: Bytes) -> Result<Bytes, Status> {
        Ok(bytes)
    }
}

/// Describes one remote method: its name, shape and message marshallers.
///
/// Cloning is cheap; the marshallers are shared.
pub struct MethodDescriptor<Req, Res> {
    full_name: Arc<str>,
    method_type: MethodType,
    request: Arc<dyn Marshaller<Req>>,
    response: Arc<dyn Marshaller<Res>>,
}

impl<Req, Res> MethodDescriptor<Req, Res> {
    /// Create a descriptor for `full_name` (`package.Service/Method`).
    pub fn new(
        full_name: impl Into<Arc<str>>,
        method_type: MethodType,
        request: impl Marshaller<Req> + 'static,
        response: impl Marshaller<Res> + 'static,
    ) -> Self {
        Self {
            full_name: full_name.into(),
            method_type,
            request: Arc::new(request),
            response: Arc::new(response),
        }
    }

    pub fn full_name(&self) -> &str {
        &self.full_name
    }

    /// The part of the full name before the last `/`, or empty if there is none.
    pub fn service_name(&self) -> &str {
        self.full_name
            .rsplit_once('/')
            .map(|(service, _)| service)
            .unwrap_or("")
    }

    /// The part of the full name after the last `/`.
    pub fn method_name(&self) -> &str {
        self.full_name
            .rsplit_once('/')
            .map(|(_, method)| method)
            .unwrap_or(&*self.full_name)
    }

    pub fn method_type(&self) -> MethodType {
        self.method_type
    }

    pub fn request_marshaller(&self) -> &Arc<dyn Marshaller<Req>> {
        &self.request
    }

    pub fn response_marshaller(&self) -> &Arc<dyn Marshaller<Res>> {
        &self.response
    }
}

impl<Req, Res> Clone for MethodDescriptor<Req, Res> {
    fn clone(&self) -> Self {
        Self {
            full_name: Arc::clone(&self.full_name),
            method_type: self.method_type,
            request: Arc::clone(&self.request),
            response: Arc::clone(&self.response),
        }
    }
}

impl<Req, Res> fmt::Debug for MethodDescriptor<Req, Res> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MethodDescriptor")
            .field("full_name", &self.full_name)
            .field("method_type", &self.method_type)
            .finish()
    }
}
