//! Built-in simulation cores.

pub mod pattern;

pub use pattern::{FRAME_RATE, PatternCore, PatternState};
