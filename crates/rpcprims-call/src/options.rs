use std::time::Duration;

/// Per-call configuration handed to the channel when a call is created.
///
/// The call drivers never read these fields; they are passed through to the
/// transport unchanged. Deadlines in particular are enforced by the transport,
/// not by the adapter.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CallOptions {
    /// Overall time budget for the call.
    pub timeout: Option<Duration>,
    /// Override for the `:authority` the call is addressed to.
    pub authority: Option<String>,
    /// Name of the compressor to apply to outbound messages.
    pub compression: Option<String>,
    /// Queue the call until the channel is ready instead of failing fast.
    pub wait_for_ready: bool,
    /// Largest inbound message the caller is willing to accept, in bytes.
    pub max_inbound_message_size: Option<usize>,
    /// Largest outbound message the caller is willing to send, in bytes.
    pub max_outbound_message_size: Option<usize>,
}

impl CallOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_authority(mut self, authority: impl Into<String>) -> Self {
        self.authority = Some(authority.into());
        self
    }

    pub fn with_compression(mut self, compressor: impl Into<String>) -> Self {
        self.compression = Some(compressor.into());
        self
    }

    pub fn with_wait_for_ready(mut self, wait_for_ready: bool) -> Self {
        self.wait_for_ready = wait_for_ready;
        self
    }

    pub fn with_max_inbound_message_size(mut self, max: usize) -> Self {
        self.max_inbound_message_size = Some(max);
        self
    }

    pub fn with_max_outbound_message_size(mut self, max: usize) -> Self {
        self.max_outbound_message_size = Some(max);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_sets_fields() {
        let options = CallOptions::new()
            .with_timeout(Duration::from_millis(250))
            .with_authority("api.internal")
            .with_compression("gzip")
            .with_wait_for_ready(true)
            .with_max_inbound_message_size(1024)
            .with_max_outbound_message_size(512);

        assert_eq!(options.timeout, Some(Duration::from_millis(250)));
        assert_eq!(options.authority.as_deref(), Some("api.internal"));
        assert_eq!(options.compression.as_deref(), Some("gzip"));
        assert!(options.wait_for_ready);
        assert_eq!(options.max_inbound_message_size, Some(1024));
        assert_eq!(options.max_outbound_message_size, Some(512));
    }

    #[test]
    fn default_is_unbounded() {
        let options = CallOptions::default();
        assert!(options.timeout.is_none());
        assert!(!options.wait_for_ready);
    }
}
