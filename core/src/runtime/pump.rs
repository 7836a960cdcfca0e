//! The worker thread that steps the simulation core in real time.
//!
//! The core is moved into the thread for as long as the pump runs and comes
//! back to the owner when the thread is joined, so it is only ever touched
//! by one thread at a time.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use tracing::debug;

use crate::core::frame::Frame;
use crate::core::input::{InputState, PadState};
use crate::core::machine::{FrameSink, SimulationCore};

use super::exchange::FrameExchange;

/// Recommended sleeps at or below this are skipped.
const MIN_SLEEP_SECONDS: f64 = 0.001;

/// Upper bound on a single pacing sleep; keeps shutdown latency bounded if
/// a core misreports its slack.
const MAX_SLEEP: Duration = Duration::from_secs(1);

/// Convert a core's recommended sleep into the duration the pump waits.
pub(crate) fn pacing_sleep(seconds: f64) -> Option<Duration> {
    if seconds > MIN_SLEEP_SECONDS {
        let millis = (seconds * 1000.0).floor() as u64;
        Some(Duration::from_millis(millis).min(MAX_SLEEP))
    } else {
        None
    }
}

/// Everything the pump thread owns while running.
pub(crate) struct Worker {
    pub(crate) core: Box<dyn SimulationCore>,
    exchange: Arc<FrameExchange>,
    input: Arc<InputState>,
    /// Masks last forwarded to the core.
    applied: PadState,
    /// Copy of the most recent frame, used as the save-state preview.
    pub(crate) last_frame: Frame,
    pub(crate) steps: u64,
}

impl Worker {
    pub(crate) fn new(
        core: Box<dyn SimulationCore>,
        exchange: Arc<FrameExchange>,
        input: Arc<InputState>,
    ) -> Self {
        Self {
            core,
            exchange,
            input,
            applied: PadState::default(),
            last_frame: Frame::new(),
            steps: 0,
        }
    }

    /// Forward whichever masks changed since the last call.
    pub(crate) fn apply_input(&mut self) {
        let pad = self.input.snapshot();
        if pad.direction != self.applied.direction {
            self.core.set_direction_mask(pad.direction);
        }
        if pad.buttons != self.applied.buttons {
            self.core.set_button_mask(pad.buttons);
        }
        self.applied = pad;
    }

    /// Run one step and return the recommended sleep in seconds.
    pub(crate) fn step(&mut self) -> f64 {
        let mut sink = PumpSink {
            exchange: &self.exchange,
            last_frame: &mut self.last_frame,
        };
        let sleep = self.core.step(&mut sink);
        self.steps += 1;
        sleep
    }

    fn run(mut self: Box<Self>, stop: &AtomicBool) -> Box<Self> {
        debug!(steps = self.steps, "pump thread started");
        while !stop.load(Ordering::Acquire) {
            self.apply_input();
            let seconds = self.step();
            if let Some(pause) = pacing_sleep(seconds) {
                thread::sleep(pause);
            }
        }
        debug!(steps = self.steps, "pump thread exiting");
        self
    }
}

struct PumpSink<'a> {
    exchange: &'a FrameExchange,
    last_frame: &'a mut Frame,
}

impl FrameSink for PumpSink<'_> {
    fn frame_ready(&mut self, pixels: &[u8]) {
        self.last_frame.copy_from(pixels);
        let sequence = self.exchange.publish(pixels);
        self.last_frame.set_sequence(sequence);
    }
}

/// The worker thread panicked; the core it owned is gone.
#[derive(Debug)]
pub(crate) struct WorkerPanicked;

/// A running pump thread.
pub(crate) struct PumpThread {
    stop: Arc<AtomicBool>,
    handle: JoinHandle<Box<Worker>>,
}

impl PumpThread {
    /// Spawn the pump loop. On failure the worker (and its core) is lost.
    pub(crate) fn spawn(worker: Box<Worker>) -> std::io::Result<Self> {
        let stop = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&stop);
        let handle = thread::Builder::new()
            .name("gbhost-pump".into())
            .spawn(move || worker.run(&flag))?;
        Ok(Self { stop, handle })
    }

    /// Signal the loop to exit and wait for it. Blocks for at most one
    /// in-flight step plus one pacing sleep.
    pub(crate) fn join(self) -> Result<Box<Worker>, WorkerPanicked> {
        self.stop.store(true, Ordering::Release);
        self.handle.join().map_err(|_| WorkerPanicked)
    }

    pub(crate) fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tiny_sleeps_are_skipped() {
        assert_eq!(pacing_sleep(0.0), None);
        assert_eq!(pacing_sleep(-0.5), None);
        assert_eq!(pacing_sleep(0.001), None);
        assert_eq!(pacing_sleep(f64::NAN), None);
    }

    #[test]
    fn sleeps_are_floored_to_milliseconds() {
        assert_eq!(pacing_sleep(0.0167), Some(Duration::from_millis(16)));
        assert_eq!(pacing_sleep(0.0019), Some(Duration::from_millis(1)));
    }

    #[test]
    fn runaway_sleep_is_capped() {
        assert_eq!(pacing_sleep(120.0), Some(MAX_SLEEP));
        assert_eq!(pacing_sleep(f64::INFINITY), Some(MAX_SLEEP));
    }
}
