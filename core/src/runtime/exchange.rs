//! Latest-frame hand-off between the pump thread and the presentation side.
//!
//! Two buffers take part in the exchange: the *pending* buffer, held by
//! [`FrameExchange`] and written by the pump, and the *presenting* buffer,
//! held by a [`Presenter`] and read by the video backend. A hand-off swaps
//! the two under the exchange mutex, so neither side can ever see a buffer
//! the other is touching.
//!
//! Backpressure is frame dropping: while a hand-off is in flight (published
//! but not yet consumed), further frames overwrite the pending buffer. The
//! consumer always gets the most recent frame, never a queue.

use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tracing::warn;

use crate::core::frame::{FRAME_BYTES, Frame};
use crate::core::machine::FrameSink;

/// Invoked (outside the lock) each time a new hand-off is scheduled, with
/// the sequence number of the frame that became available.
pub type FrameListener = Arc<dyn Fn(u64) + Send + Sync>;

struct Slots {
    pending: Frame,
    in_flight: bool,
    published: u64,
    dropped: u64,
    listener: Option<FrameListener>,
}

/// Producer side of the frame hand-off. Shared between threads via `Arc`.
pub struct FrameExchange {
    slots: Mutex<Slots>,
    ready: Condvar,
}

impl FrameExchange {
    pub fn new() -> Self {
        Self {
            slots: Mutex::new(Slots {
                pending: Frame::new(),
                in_flight: false,
                published: 0,
                dropped: 0,
                listener: None,
            }),
            ready: Condvar::new(),
        }
    }

    /// Register a push callback fired whenever a new hand-off starts.
    pub fn set_listener(&self, listener: Option<FrameListener>) {
        self.lock().listener = listener;
    }

    /// Copy a completed frame into the pending buffer.
    ///
    /// Never waits for the consumer. Returns the sequence number assigned to
    /// the frame.
    pub fn publish(&self, pixels: &[u8]) -> u64 {
        if pixels.len() != FRAME_BYTES {
            warn!(len = pixels.len(), expected = FRAME_BYTES, "frame has wrong size");
        }
        let (sequence, listener) = {
            let mut slots = self.lock();
            slots.published += 1;
            let sequence = slots.published;
            slots.pending.copy_from(pixels);
            slots.pending.set_sequence(sequence);

            if slots.in_flight {
                // Consumer hasn't taken the previous frame; it is overwritten.
                slots.dropped += 1;
                return sequence;
            }
            slots.in_flight = true;
            (sequence, slots.listener.clone())
        };

        self.ready.notify_all();
        if let Some(listener) = listener {
            listener(sequence);
        }
        sequence
    }

    /// Swap the pending frame into `presenting` if a hand-off is in flight.
    ///
    /// The buffer previously in `presenting` becomes the new pending buffer.
    /// Returns `false` (leaving `presenting` untouched) when no new frame
    /// has been published since the last swap.
    pub fn swap_latest(&self, presenting: &mut Frame) -> bool {
        let mut slots = self.lock();
        Self::take(&mut slots, presenting)
    }

    /// Like [`swap_latest`](Self::swap_latest), but blocks up to `timeout`
    /// for a frame to become available.
    pub fn wait_latest(&self, presenting: &mut Frame, timeout: Duration) -> bool {
        let slots = self.lock();
        let (mut slots, _) = self
            .ready
            .wait_timeout_while(slots, timeout, |s| !s.in_flight)
            .unwrap_or_else(PoisonError::into_inner);
        Self::take(&mut slots, presenting)
    }

    /// Total frames published since creation.
    pub fn frames_published(&self) -> u64 {
        self.lock().published
    }

    /// Frames overwritten before the consumer took them.
    pub fn frames_dropped(&self) -> u64 {
        self.lock().dropped
    }

    /// Whether a published frame is waiting for the consumer.
    pub fn has_pending(&self) -> bool {
        self.lock().in_flight
    }

    fn take(slots: &mut Slots, presenting: &mut Frame) -> bool {
        if !slots.in_flight {
            return false;
        }
        std::mem::swap(&mut slots.pending, presenting);
        slots.in_flight = false;
        true
    }

    fn lock(&self) -> MutexGuard<'_, Slots> {
        self.slots.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for FrameExchange {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameSink for &FrameExchange {
    fn frame_ready(&mut self, pixels: &[u8]) {
        self.publish(pixels);
    }
}

/// Consumer side of the hand-off: owns the buffer currently on screen.
pub struct Presenter {
    exchange: Arc<FrameExchange>,
    presenting: Frame,
}

impl Presenter {
    pub fn new(exchange: Arc<FrameExchange>) -> Self {
        Self {
            exchange,
            presenting: Frame::new(),
        }
    }

    /// Take the most recent frame if a new one arrived since the last call.
    pub fn consume_latest(&mut self) -> Option<&Frame> {
        if self.exchange.swap_latest(&mut self.presenting) {
            Some(&self.presenting)
        } else {
            None
        }
    }

    /// Block up to `timeout` for a new frame.
    pub fn wait_latest(&mut self, timeout: Duration) -> Option<&Frame> {
        if self.exchange.wait_latest(&mut self.presenting, timeout) {
            Some(&self.presenting)
        } else {
            None
        }
    }

    /// The frame currently on screen (black before the first hand-off).
    pub fn current(&self) -> &Frame {
        &self.presenting
    }
}
