// SPDX-FileCopyrightText: OpenTalk GmbH <mail@opentalk.eu>
//
// SPDX-License-Identifier: EUPL-1.2

//! Destination sinks for composed frames.

use std::fmt;
use std::sync::{Arc, Weak};

use crate::VideoFrame;

/// Trait of an output destination.
///
/// `on_frame` is invoked from a generator's timer thread, once per delivered
/// frame, and must not block for long.
pub trait FrameDestination: Send + Sync {
    fn on_frame(&self, frame: &VideoFrame);
}

/// Non-owning registration handle for a [`FrameDestination`].
///
/// The destination's lifetime stays with the caller; the compositor only
/// keeps this handle. A destination dropped by its owner is skipped at
/// dispatch time.
#[derive(Clone)]
pub struct FrameSink {
    dest: Weak<dyn FrameDestination>,
}

impl FrameSink {
    /// Wrap a destination held by the caller.
    #[must_use]
    pub fn of<D: FrameDestination + 'static>(dest: &Arc<D>) -> Self {
        let dest: Arc<dyn FrameDestination> = Arc::clone(dest) as _;
        Self {
            dest: Arc::downgrade(&dest),
        }
    }

    /// `true` if both handles point at the same destination.
    #[must_use]
    pub fn same_destination(&self, other: &Self) -> bool {
        std::ptr::eq(
            self.dest.as_ptr() as *const (),
            other.dest.as_ptr() as *const (),
        )
    }

    /// Deliver a frame; reports whether the destination was still alive.
    pub(crate) fn deliver(&self, frame: &VideoFrame) -> bool {
        match self.dest.upgrade() {
            Some(dest) => {
                dest.on_frame(frame);
                true
            }
            None => false,
        }
    }
}

impl fmt::Debug for FrameSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FrameSink({:p})", self.dest.as_ptr() as *const ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{I420Buffer, PooledBuffer};
    use parking_lot::Mutex;

    struct Counter(Mutex<usize>);

    impl FrameDestination for Counter {
        fn on_frame(&self, _frame: &VideoFrame) {
            *self.0.lock() += 1;
        }
    }

    fn frame() -> VideoFrame {
        VideoFrame::new(PooledBuffer::detached(I420Buffer::new(4, 4)), 0, 0)
    }

    #[test]
    fn delivers_while_destination_lives() {
        let dest = Arc::new(Counter(Mutex::new(0)));
        let sink = FrameSink::of(&dest);

        assert!(sink.deliver(&frame()));
        assert_eq!(*dest.0.lock(), 1);
    }

    #[test]
    fn dropped_destination_is_skipped() {
        let dest = Arc::new(Counter(Mutex::new(0)));
        let sink = FrameSink::of(&dest);
        drop(dest);

        assert!(!sink.deliver(&frame()));
    }

    #[test]
    fn identity_follows_the_destination() {
        let a = Arc::new(Counter(Mutex::new(0)));
        let b = Arc::new(Counter(Mutex::new(0)));

        assert!(FrameSink::of(&a).same_destination(&FrameSink::of(&a)));
        assert!(!FrameSink::of(&a).same_destination(&FrameSink::of(&b)));
    }
}
