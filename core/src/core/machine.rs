use super::error::{BootError, RestoreError, SnapshotError};

/// Hardware mode the simulation core boots into.
#[derive(Default, Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum BootMode {
    /// Original monochrome handheld.
    #[default]
    Dmg,
    /// Super Game Boy enhanced.
    Sgb,
    /// Color handheld.
    Cgb,
}

impl BootMode {
    pub fn as_u8(self) -> u8 {
        match self {
            Self::Dmg => 0,
            Self::Sgb => 1,
            Self::Cgb => 2,
        }
    }

    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::Dmg),
            1 => Some(Self::Sgb),
            2 => Some(Self::Cgb),
            _ => None,
        }
    }
}

impl std::fmt::Display for BootMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Dmg => "DMG",
            Self::Sgb => "SGB",
            Self::Cgb => "CGB",
        };
        f.write_str(name)
    }
}

/// Receives completed frames from [`SimulationCore::step`].
pub trait FrameSink {
    /// Called once per completed frame with raw RGB24 pixels
    /// (`FRAME_WIDTH * FRAME_HEIGHT * 3` bytes).
    fn frame_ready(&mut self, pixels: &[u8]);
}

/// The stepping engine driven by the host runtime.
///
/// The host treats the core as a black box: it knows how to load a program
/// image, boot, advance by one step, and serialize its whole state. All
/// calls happen on one thread at a time; the runtime guarantees `step` is
/// never running while `snapshot`/`restore` are called.
pub trait SimulationCore: Send {
    /// Parse a program image and report the boot mode it requires.
    fn load_image(&mut self, image: &[u8]) -> Result<BootMode, BootError>;

    /// Power on in the given mode.
    fn boot(&mut self, mode: BootMode) -> Result<(), BootError>;

    /// Advance by one step (typically one video frame).
    ///
    /// Completed frames are delivered through `sink`. Returns the number of
    /// wall-clock seconds the host should sleep before the next step to
    /// stay in real time; zero or negative means "run immediately".
    fn step(&mut self, sink: &mut dyn FrameSink) -> f64;

    /// Inform the core that execution is suspended or resumed, so it can
    /// reset its pacing clock instead of trying to catch up.
    fn set_paused(&mut self, paused: bool);

    /// Latch the full direction mask (see [`crate::core::input::direction`]).
    fn set_direction_mask(&mut self, mask: u8);

    /// Latch the full button mask (see [`crate::core::input::button`]).
    fn set_button_mask(&mut self, mask: u8);

    /// Serialize the entire machine state.
    fn snapshot(&mut self) -> Result<Vec<u8>, SnapshotError>;

    /// Replace the entire machine state with a previous snapshot.
    fn restore(&mut self, data: &[u8]) -> Result<(), RestoreError>;

    /// Enable or disable real-time pacing. With the limiter off the core
    /// should recommend no sleep. Default: ignored.
    fn set_frame_limiter(&mut self, _enabled: bool) {}
}
