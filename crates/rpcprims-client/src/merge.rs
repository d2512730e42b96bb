//! Merging two streams under an explicit halt strategy.

use std::pin::Pin;
use std::task::{Context, Poll};

use futures_core::Stream;
use futures_util::stream::BoxStream;
use futures_util::StreamExt;

/// Which side's completion ends a [`Merge`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HaltStrategy {
    /// End as soon as the left stream ends.
    Left,
    /// End as soon as the right stream ends.
    Right,
    /// End once both streams have ended.
    Both,
    /// End as soon as either stream ends.
    Either,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Side {
    Left,
    Right,
}

/// Two streams polled concurrently within one task.
///
/// With `Left` or `Right` the halting side is always polled first, so once it
/// has ended the other side is never polled again. `Both` and `Either`
/// alternate which side goes first. When the merge ends, any remaining stream
/// is dropped.
pub struct Merge<T> {
    left: Option<BoxStream<'static, T>>,
    right: Option<BoxStream<'static, T>>,
    strategy: HaltStrategy,
    right_first: bool,
}

/// Merge `left` and `right` under `strategy`.
pub fn merge<T, L, R>(left: L, right: R, strategy: HaltStrategy) -> Merge<T>
where
    L: Stream<Item = T> + Send + 'static,
    R: Stream<Item = T> + Send + 'static,
{
    Merge::new(left.boxed(), right.boxed(), strategy)
}

impl<T> Merge<T> {
    pub fn new(
        left: BoxStream<'static, T>,
        right: BoxStream<'static, T>,
        strategy: HaltStrategy,
    ) -> Self {
        Self {
            left: Some(left),
            right: Some(right),
            strategy,
            right_first: false,
        }
    }

    pub fn strategy(&self) -> HaltStrategy {
        self.strategy
    }

    fn poll_order(&mut self) -> [Side; 2] {
        match self.strategy {
            HaltStrategy::Left => [Side::Left, Side::Right],
            HaltStrategy::Right => [Side::Right, Side::Left],
            HaltStrategy::Both | HaltStrategy::Either => {
                self.right_first = !self.right_first;
                if self.right_first {
                    [Side::Right, Side::Left]
                } else {
                    [Side::Left, Side::Right]
                }
            }
        }
    }

    fn halts_on(&self, side: Side) -> bool {
        match self.strategy {
            HaltStrategy::Left => side == Side::Left,
            HaltStrategy::Right => side == Side::Right,
            HaltStrategy::Either => true,
            HaltStrategy::Both => false,
        }
    }
}

impl<T> Stream for Merge<T> {
    type Item = T;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<T>> {
        let this = self.get_mut();

        for side in this.poll_order() {
            let slot = match side {
                Side::Left => &mut this.left,
                Side::Right => &mut this.right,
            };
            let Some(stream) = slot else {
                continue;
            };
            match stream.poll_next_unpin(cx) {
                Poll::Ready(Some(item)) => return Poll::Ready(Some(item)),
                Poll::Ready(None) => {
                    *slot = None;
                    if this.halts_on(side) {
                        this.left = None;
                        this.right = None;
                        return Poll::Ready(None);
                    }
                }
                Poll::Pending => {}
            }
        }

        if this.left.is_none() && this.right.is_none() {
            Poll::Ready(None)
        } else {
            Poll::Pending
        }
    }
}
