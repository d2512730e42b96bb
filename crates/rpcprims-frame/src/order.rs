use crate::frame::ResponseFrame;

/// A frame that breaks the `Headers? Message* Trailers` ordering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum OrderViolation {
    /// A second headers frame, or headers after the first message.
    #[error("headers frame received after {0}")]
    LateHeaders(&'static str),

    /// Any frame after the terminal trailers frame.
    #[error("{0} frame received after trailers")]
    AfterTrailers(&'static str),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
enum Phase {
    #[default]
    Initial,
    Headers,
    Messages,
    Closed,
}

/// Tracks the ordering invariant of a response frame sequence.
#[derive(Debug, Clone, Default)]
pub struct FrameOrder {
    phase: Phase,
}

impl FrameOrder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Check `frame` against the frames observed so far and advance.
    ///
    /// A rejected frame leaves the tracker unchanged.
    pub fn observe<Res>(&mut self, frame: &ResponseFrame<Res>) -> Result<(), OrderViolation> {
        let next = match (self.phase, frame) {
            (Phase::Closed, frame) => return Err(OrderViolation::AfterTrailers(frame.kind())),
            (Phase::Initial, ResponseFrame::Headers(_)) => Phase::Headers,
            (Phase::Headers, ResponseFrame::Headers(_)) => {
                return Err(OrderViolation::LateHeaders("headers"))
            }
            (Phase::Messages, ResponseFrame::Headers(_)) => {
                return Err(OrderViolation::LateHeaders("message"))
            }
            (_, ResponseFrame::Message(_)) => Phase::Messages,
            (_, ResponseFrame::Trailers(..)) => Phase::Closed,
        };
        self.phase = next;
        Ok(())
    }

    /// True once the terminal trailers frame has been observed.
    pub fn is_closed(&self) -> bool {
        self.phase == Phase::Closed
    }
}
