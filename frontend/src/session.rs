//! Headless run loop: boots a program, resumes it from the auto slot,
//! consumes frames until told to stop and persists the final state.

use std::time::Duration;

use gbhost_core::core::SimulationCore;
use gbhost_core::runtime::{Emulator, LifecycleError, LoadError, RunState, SaveError, StartError};
use gbhost_core::savestate::{PersistError, SaveStateStore};
use tracing::{info, warn};

use crate::config::HostConfig;

/// How long to wait for the next frame before checking that the pump is
/// still alive.
const FRAME_WAIT: Duration = Duration::from_millis(500);

#[derive(Debug)]
pub enum SessionError {
    Start(StartError),
    Lifecycle(LifecycleError),
    Save(SaveError),
    Persist(PersistError),
}

impl std::fmt::Display for SessionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Start(e) => write!(f, "failed to start: {e}"),
            Self::Lifecycle(e) => write!(f, "{e}"),
            Self::Save(e) => write!(f, "failed to capture state: {e}"),
            Self::Persist(e) => write!(f, "{e}"),
        }
    }
}

impl std::error::Error for SessionError {}

impl From<StartError> for SessionError {
    fn from(e: StartError) -> Self {
        Self::Start(e)
    }
}

impl From<LifecycleError> for SessionError {
    fn from(e: LifecycleError) -> Self {
        Self::Lifecycle(e)
    }
}

impl From<SaveError> for SessionError {
    fn from(e: SaveError) -> Self {
        Self::Save(e)
    }
}

impl From<PersistError> for SessionError {
    fn from(e: PersistError) -> Self {
        Self::Persist(e)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct RunOptions {
    /// Frames to present before shutting down.
    pub frames: u64,
    pub frame_limiter: bool,
    pub auto_resume: bool,
    /// Also write a manual slot on exit.
    pub manual_save: bool,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RunSummary {
    pub presented: u64,
    pub published: u64,
    pub dropped: u64,
    pub resumed: bool,
}

/// Drive `core` with `image` for `options.frames` frames.
pub fn run(
    core: Box<dyn SimulationCore>,
    image: &[u8],
    store: &mut SaveStateStore,
    config: &HostConfig,
    options: &RunOptions,
) -> Result<RunSummary, SessionError> {
    let mut emulator = Emulator::new(core);
    emulator.set_frame_limiter(options.frame_limiter)?;
    emulator.start(Some(image))?;

    let mut summary = RunSummary {
        resumed: options.auto_resume && resume_from_auto(&mut emulator, store)?,
        ..RunSummary::default()
    };

    let mut presenter = emulator.presenter();
    while summary.presented < options.frames {
        if presenter.wait_latest(FRAME_WAIT).is_some() {
            summary.presented += 1;
        } else if !emulator.pump_alive() {
            warn!("pump thread exited early");
            break;
        }
    }

    let captured = emulator.save_state()?;
    emulator.stop();

    store.save_auto(&captured.snapshot, &captured.preview)?;
    if options.manual_save {
        let path = store.save_manual(
            &captured.snapshot,
            &captured.preview,
            config.retention_limit,
        )?;
        info!(path = %path.display(), "manual save written on exit");
    }

    summary.published = emulator.exchange().frames_published();
    summary.dropped = emulator.exchange().frames_dropped();
    info!(
        presented = summary.presented,
        published = summary.published,
        dropped = summary.dropped,
        "session finished"
    );
    Ok(summary)
}

/// Load the auto slot into a running emulator. A slot the core rejects is
/// skipped and execution continues from boot.
fn resume_from_auto(
    emulator: &mut Emulator,
    store: &SaveStateStore,
) -> Result<bool, LifecycleError> {
    let Some(state) = store.load_auto() else {
        return Ok(false);
    };
    match emulator.load_state(&state.snapshot) {
        Ok(()) => {
            info!("resumed from auto save");
            Ok(true)
        }
        Err(LoadError::Restore(e)) => {
            warn!(error = %e, "auto save rejected by core");
            if emulator.state() == RunState::Paused {
                emulator.resume()?;
            }
            Ok(false)
        }
        Err(LoadError::Lifecycle(e)) => Err(e),
    }
}
