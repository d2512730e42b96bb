use rpcprims_call::{Metadata, Status};

/// One inbound event of a call.
#[derive(Debug, Clone)]
pub enum ResponseFrame<Res> {
    /// Response headers, sent by the server before any message.
    Headers(Metadata),
    /// One response message.
    Message(Res),
    /// Terminal status and trailing metadata.
    Trailers(Status, Metadata),
}

impl<Res> ResponseFrame<Res> {
    pub fn is_headers(&self) -> bool {
        matches!(self, Self::Headers(_))
    }

    pub fn is_message(&self) -> bool {
        matches!(self, Self::Message(_))
    }

    pub fn is_trailers(&self) -> bool {
        matches!(self, Self::Trailers(..))
    }

    /// The message value, dropping metadata-only frames.
    pub fn into_message(self) -> Option<Res> {
        match self {
            Self::Message(message) => Some(message),
            Self::Headers(_) | Self::Trailers(..) => None,
        }
    }

    /// Borrow the message value, if this is a `Message` frame.
    pub fn message(&self) -> Option<&Res> {
        match self {
            Self::Message(message) => Some(message),
            Self::Headers(_) | Self::Trailers(..) => None,
        }
    }

    /// Transform the message value, leaving metadata frames untouched.
    pub fn map<T>(self, f: impl FnOnce(Res) -> T) -> ResponseFrame<T> {
        match self {
            Self::Headers(headers) => ResponseFrame::Headers(headers),
            Self::Message(message) => ResponseFrame::Message(f(message)),
            Self::Trailers(status, trailers) => ResponseFrame::Trailers(status, trailers),
        }
    }

    /// Short name of the variant, for logs and diagnostics.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Headers(_) => "headers",
            Self::Message(_) => "message",
            Self::Trailers(..) => "trailers",
        }
    }
}

#[cfg(test)]
mod tests {
    use rpcprims_call::Code;

    use super::*;

    #[test]
    fn into_message_keeps_only_messages() {
        assert_eq!(ResponseFrame::Message(3).into_message(), Some(3));
        assert_eq!(
            ResponseFrame::<u8>::Headers(Metadata::new()).into_message(),
            None
        );
        assert_eq!(
            ResponseFrame::<u8>::Trailers(Status::ok(), Metadata::new()).into_message(),
            None
        );
    }

    #[test]
    fn map_preserves_metadata_frames() {
        let frame = ResponseFrame::<u8>::Trailers(Status::ok(), Metadata::new()).map(u32::from);
        match frame {
            ResponseFrame::Trailers(status, _) => assert_eq!(status.code(), Code::Ok),
            other => panic!("expected trailers, got {}", other.kind()),
        }

        let frame = ResponseFrame::Message(2u8).map(|v| v * 10);
        assert_eq!(frame.message(), Some(&20));
    }

    #[test]
    fn predicates_and_kind() {
        let headers = ResponseFrame::<()>::Headers(Metadata::new());
        assert!(headers.is_headers());
        assert_eq!(headers.kind(), "headers");

        let message = ResponseFrame::Message(());
        assert!(message.is_message());
        assert_eq!(message.kind(), "message");

        let trailers = ResponseFrame::<()>::Trailers(Status::ok(), Metadata::new());
        assert!(trailers.is_trailers());
        assert_eq!(trailers.kind(), "trailers");
    }
}
