pub mod cartridge;
pub mod core;
pub mod machine;
pub mod runtime;
pub mod savestate;

pub mod prelude {
    pub use crate::cartridge::{CartridgeError, CartridgeInfo};
    pub use crate::core::input::{button, direction};
    pub use crate::core::{BootMode, Frame, FrameSink, PadState, SimulationCore};
    pub use crate::runtime::{Emulator, FrameExchange, Presenter, RunState};
    pub use crate::savestate::{SaveStateRecord, SaveStateStore, SlotKind};
}
