use rpcprims_call::Metadata;

/// A single response value together with the metadata it arrived with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponseContext<Res> {
    pub headers: Metadata,
    pub value: Res,
    pub trailers: Metadata,
}

impl<Res> ResponseContext<Res> {
    pub fn new(headers: Metadata, value: Res, trailers: Metadata) -> Self {
        Self {
            headers,
            value,
            trailers,
        }
    }

    /// Drop the metadata and keep the bare value.
    pub fn into_value(self) -> Res {
        self.value
    }

    pub fn map<T>(self, f: impl FnOnce(Res) -> T) -> ResponseContext<T> {
        ResponseContext {
            headers: self.headers,
            value: f(self.value),
            trailers: self.trailers,
        }
    }
}
