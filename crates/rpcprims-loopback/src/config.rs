use std::time::Duration;

/// Default per-message size limit. Default: 4 MiB.
pub const DEFAULT_MAX_MESSAGE_SIZE: usize = 4 * 1024 * 1024;

/// Channel-wide limits applied to every call.
///
/// Per-call [`CallOptions`](rpcprims_call::CallOptions) may tighten these but
/// never loosen them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoopbackConfig {
    /// Largest encoded message accepted in either direction.
    pub max_message_size: usize,
    /// Deadline applied when the call options carry no timeout.
    pub default_timeout: Option<Duration>,
}

impl Default for LoopbackConfig {
    fn default() -> Self {
        Self {
            max_message_size: DEFAULT_MAX_MESSAGE_SIZE,
            default_timeout: None,
        }
    }
}

impl LoopbackConfig {
    pub fn with_max_message_size(mut self, max: usize) -> Self {
        self.max_message_size = max;
        self
    }

    pub fn with_default_timeout(mut self, timeout: Duration) -> Self {
        self.default_timeout = Some(timeout);
        self
    }

    pub(crate) fn limit(&self, requested: Option<usize>) -> usize {
        requested.map_or(self.max_message_size, |max| max.min(self.max_message_size))
    }
}

/// Failures to inject into client-side call operations.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Faults {
    /// `start` fails with a transport error.
    pub fail_start: bool,
    /// `send_message` fails once this many messages have been sent.
    pub fail_send_after: Option<usize>,
    /// `half_close` fails with a transport error.
    pub fail_half_close: bool,
    /// `cancel` takes effect but reports a transport error.
    pub fail_cancel: bool,
}

impl Faults {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn with_fail_start(mut self) -> Self {
        self.fail_start = true;
        self
    }

    pub fn with_fail_send_after(mut self, sent: usize) -> Self {
        self.fail_send_after = Some(sent);
        self
    }

    pub fn with_fail_half_close(mut self) -> Self {
        self.fail_half_close = true;
        self
    }

    pub fn with_fail_cancel(mut self) -> Self {
        self.fail_cancel = true;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn options_only_tighten_limits() {
        let config = LoopbackConfig::default().with_max_message_size(1024);
        assert_eq!(config.limit(None), 1024);
        assert_eq!(config.limit(Some(16)), 16);
        assert_eq!(config.limit(Some(1 << 20)), 1024);
    }

    #[test]
    fn faults_builder() {
        let faults = Faults::none().with_fail_send_after(2).with_fail_cancel();
        assert_eq!(faults.fail_send_after, Some(2));
        assert!(faults.fail_cancel);
        assert!(!faults.fail_start);
        assert!(!faults.fail_half_close);
    }
}
