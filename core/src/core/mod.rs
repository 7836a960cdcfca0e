pub mod error;
pub mod frame;
pub mod input;
pub mod machine;

pub use error::{BootError, RestoreError, SnapshotError};
pub use frame::{BYTES_PER_PIXEL, FRAME_BYTES, FRAME_HEIGHT, FRAME_WIDTH, Frame};
pub use input::{InputState, PadState};
pub use machine::{BootMode, FrameSink, SimulationCore};
