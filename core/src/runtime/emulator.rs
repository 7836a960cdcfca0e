//! Lifecycle controller: owns the simulation core and the pump thread.
//!
//! ```text
//! Stopped --start--> Running --pause--> Paused --resume--> Running
//!    {Running, Paused} --stop--> Stopped (terminal)
//! ```
//!
//! The pump thread exists only while Running. Pausing joins it, which hands
//! the core back to the controller; save, load and limiter changes run on
//! the owner thread against that joined core.

use std::sync::Arc;

use tracing::{info, warn};

use crate::core::error::{BootError, RestoreError, SnapshotError};
use crate::core::frame::Frame;
use crate::core::input::InputState;
use crate::core::machine::{BootMode, SimulationCore};

use super::exchange::{FrameExchange, Presenter};
use super::pump::{PumpThread, Worker};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RunState {
    Stopped,
    Running,
    Paused,
}

impl std::fmt::Display for RunState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Stopped => "stopped",
            Self::Running => "running",
            Self::Paused => "paused",
        };
        f.write_str(name)
    }
}

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// A lifecycle operation could not be carried out.
#[derive(Debug)]
pub enum LifecycleError {
    /// Operation is not legal from the current state.
    InvalidTransition { op: &'static str, state: RunState },

    /// The core was released by `stop()` (or lost with a failed thread).
    Released,

    /// The pump thread could not be spawned.
    Spawn(std::io::Error),

    /// The pump thread panicked; the core is lost and the controller is
    /// now Stopped.
    WorkerPanicked,
}

impl std::fmt::Display for LifecycleError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidTransition { op, state } => {
                write!(f, "cannot {op} while {state}")
            }
            Self::Released => write!(f, "emulator has been stopped"),
            Self::Spawn(e) => write!(f, "failed to spawn pump thread: {e}"),
            Self::WorkerPanicked => write!(f, "pump thread panicked"),
        }
    }
}

impl std::error::Error for LifecycleError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Spawn(e) => Some(e),
            _ => None,
        }
    }
}

/// Failure of [`Emulator::start`].
#[derive(Debug)]
pub enum StartError {
    Lifecycle(LifecycleError),
    Boot(BootError),
}

/// Failure of [`Emulator::save_state`].
#[derive(Debug)]
pub enum SaveError {
    Lifecycle(LifecycleError),
    Snapshot(SnapshotError),
}

/// Failure of [`Emulator::load_state`].
#[derive(Debug)]
pub enum LoadError {
    Lifecycle(LifecycleError),
    Restore(RestoreError),
}

macro_rules! lifecycle_wrapper {
    ($name:ident, $variant:ident, $inner:ty) => {
        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                match self {
                    Self::Lifecycle(e) => std::fmt::Display::fmt(e, f),
                    Self::$variant(e) => std::fmt::Display::fmt(e, f),
                }
            }
        }

        impl std::error::Error for $name {
            fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
                match self {
                    Self::Lifecycle(e) => Some(e),
                    Self::$variant(e) => Some(e),
                }
            }
        }

        impl From<LifecycleError> for $name {
            fn from(e: LifecycleError) -> Self {
                Self::Lifecycle(e)
            }
        }

        impl From<$inner> for $name {
            fn from(e: $inner) -> Self {
                Self::$variant(e)
            }
        }
    };
}

lifecycle_wrapper!(StartError, Boot, BootError);
lifecycle_wrapper!(SaveError, Snapshot, SnapshotError);
lifecycle_wrapper!(LoadError, Restore, RestoreError);

// ---------------------------------------------------------------------------
// Emulator
// ---------------------------------------------------------------------------

/// State captured by [`Emulator::save_state`].
#[derive(Clone, Debug)]
pub struct CapturedState {
    /// Opaque core snapshot.
    pub snapshot: Vec<u8>,
    /// Last frame produced before the snapshot.
    pub preview: Frame,
}

enum Pump {
    /// Core available on the owner thread (Stopped before start, or Paused).
    Idle(Box<Worker>),
    Running(PumpThread),
    Released,
}

/// Drives a [`SimulationCore`] on a dedicated thread.
pub struct Emulator {
    state: RunState,
    pump: Pump,
    exchange: Arc<FrameExchange>,
    input: Arc<InputState>,
    frame_limiter: bool,
}

impl Emulator {
    pub fn new(core: Box<dyn SimulationCore>) -> Self {
        let exchange = Arc::new(FrameExchange::new());
        let input = Arc::new(InputState::new());
        let worker = Worker::new(core, Arc::clone(&exchange), Arc::clone(&input));
        Self {
            state: RunState::Stopped,
            pump: Pump::Idle(Box::new(worker)),
            exchange,
            input,
            frame_limiter: true,
        }
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    pub fn is_running(&self) -> bool {
        self.state == RunState::Running
    }

    /// Whether a pump thread currently exists and has not exited.
    pub fn pump_alive(&self) -> bool {
        matches!(&self.pump, Pump::Running(thread) if !thread.is_finished())
    }

    /// Load `image` (if any), boot, and start the pump thread.
    ///
    /// Without an image the core boots in the default mode.
    pub fn start(&mut self, image: Option<&[u8]>) -> Result<(), StartError> {
        if self.state != RunState::Stopped {
            return Err(self.invalid("start").into());
        }
        let frame_limiter = self.frame_limiter;
        let worker = self.idle_worker("start")?;

        let mode = match image {
            Some(image) => {
                let mode = worker.core.load_image(image)?;
                info!(%mode, bytes = image.len(), "program image loaded");
                mode
            }
            None => BootMode::default(),
        };
        worker.core.boot(mode)?;
        worker.core.set_frame_limiter(frame_limiter);
        info!(%mode, "system booted");

        self.spawn_pump()?;
        Ok(())
    }

    /// Stop the pump thread and mark the core paused. Only legal while
    /// Running; blocks until the thread has exited.
    pub fn pause(&mut self) -> Result<(), LifecycleError> {
        if self.state != RunState::Running {
            return Err(self.invalid("pause"));
        }
        let thread = match std::mem::replace(&mut self.pump, Pump::Released) {
            Pump::Running(thread) => thread,
            other => {
                self.pump = other;
                return Err(LifecycleError::Released);
            }
        };
        match thread.join() {
            Ok(mut worker) => {
                worker.core.set_paused(true);
                self.pump = Pump::Idle(worker);
                self.state = RunState::Paused;
                info!("execution paused");
                Ok(())
            }
            Err(_) => {
                self.state = RunState::Stopped;
                Err(LifecycleError::WorkerPanicked)
            }
        }
    }

    /// Unpause the core and respawn the pump thread. Only legal while Paused.
    pub fn resume(&mut self) -> Result<(), LifecycleError> {
        if self.state != RunState::Paused {
            return Err(self.invalid("resume"));
        }
        self.idle_worker("resume")?.core.set_paused(false);
        self.spawn_pump()?;
        info!("execution resumed");
        Ok(())
    }

    /// Tear down the pump thread (if any) and release the core. Terminal:
    /// the emulator cannot be started again.
    pub fn stop(&mut self) {
        match std::mem::replace(&mut self.pump, Pump::Released) {
            Pump::Running(thread) => {
                if thread.join().is_err() {
                    warn!("pump thread panicked during shutdown");
                }
                info!("emulator stopped");
            }
            Pump::Idle(_) => info!("emulator stopped"),
            Pump::Released => {}
        }
        self.state = RunState::Stopped;
    }

    /// Press or release direction bits.
    pub fn set_pad_direction(&self, bits: u8, down: bool) {
        self.input.set_direction(bits, down);
    }

    /// Press or release button bits.
    pub fn set_pad_button(&self, bits: u8, down: bool) {
        self.input.set_button(bits, down);
    }

    /// Replace both pad masks at once.
    pub fn set_input(&self, direction: u8, buttons: u8) {
        self.input.set_masks(direction, buttons);
    }

    pub fn input(&self) -> &Arc<InputState> {
        &self.input
    }

    pub fn exchange(&self) -> &Arc<FrameExchange> {
        &self.exchange
    }

    /// A new consumer handle for the frame hand-off.
    pub fn presenter(&self) -> Presenter {
        Presenter::new(Arc::clone(&self.exchange))
    }

    /// Capture a snapshot plus the last frame as preview.
    ///
    /// Pauses around the snapshot and restores the previous state on
    /// success. On failure the emulator stays Paused; call `resume()`.
    pub fn save_state(&mut self) -> Result<CapturedState, SaveError> {
        self.with_paused("save state", |worker| {
            let snapshot = worker.core.snapshot()?;
            info!(bytes = snapshot.len(), "state captured");
            Ok(CapturedState {
                snapshot,
                preview: worker.last_frame.clone(),
            })
        })
    }

    /// Restore a snapshot. Same pause semantics as [`save_state`](Self::save_state).
    pub fn load_state(&mut self, snapshot: &[u8]) -> Result<(), LoadError> {
        self.with_paused("load state", |worker| {
            worker.core.restore(snapshot)?;
            info!(bytes = snapshot.len(), "state restored");
            Ok(())
        })
    }

    /// Turn real-time pacing on or off. Before `start` the setting is only
    /// recorded and forwarded at boot.
    pub fn set_frame_limiter(&mut self, enabled: bool) -> Result<(), LifecycleError> {
        self.frame_limiter = enabled;
        if self.state == RunState::Stopped {
            return match self.pump {
                Pump::Released => Err(LifecycleError::Released),
                _ => Ok(()),
            };
        }
        self.with_paused("set frame limiter", |worker| {
            worker.core.set_frame_limiter(enabled);
            Ok(())
        })
    }

    pub fn frame_limiter(&self) -> bool {
        self.frame_limiter
    }

    /// Run `f` against the joined core, pausing first if Running and
    /// resuming afterwards only if `f` succeeded.
    fn with_paused<T, E>(
        &mut self,
        op: &'static str,
        f: impl FnOnce(&mut Worker) -> Result<T, E>,
    ) -> Result<T, E>
    where
        E: From<LifecycleError>,
    {
        let resume_after = match self.state {
            RunState::Running => {
                self.pause()?;
                true
            }
            RunState::Paused => false,
            RunState::Stopped => return Err(self.invalid(op).into()),
        };

        let value = f(self.idle_worker(op)?)?;
        if resume_after {
            self.resume()?;
        }
        Ok(value)
    }

    fn idle_worker(&mut self, op: &'static str) -> Result<&mut Worker, LifecycleError> {
        let state = self.state;
        match &mut self.pump {
            Pump::Idle(worker) => Ok(worker),
            Pump::Released => Err(LifecycleError::Released),
            Pump::Running(_) => Err(LifecycleError::InvalidTransition { op, state }),
        }
    }

    fn spawn_pump(&mut self) -> Result<(), LifecycleError> {
        let worker = match std::mem::replace(&mut self.pump, Pump::Released) {
            Pump::Idle(worker) => worker,
            other => {
                self.pump = other;
                return Err(LifecycleError::Released);
            }
        };
        match PumpThread::spawn(worker) {
            Ok(thread) => {
                self.pump = Pump::Running(thread);
                self.state = RunState::Running;
                Ok(())
            }
            Err(e) => {
                self.state = RunState::Stopped;
                Err(LifecycleError::Spawn(e))
            }
        }
    }

    fn invalid(&self, op: &'static str) -> LifecycleError {
        LifecycleError::InvalidTransition {
            op,
            state: self.state,
        }
    }
}

impl Drop for Emulator {
    fn drop(&mut self) {
        self.stop();
    }
}

impl std::fmt::Debug for Emulator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Emulator")
            .field("state", &self.state)
            .field("frame_limiter", &self.frame_limiter)
            .finish_non_exhaustive()
    }
}
