pub mod emulator;
pub mod exchange;
mod pump;

pub use emulator::{
    CapturedState, Emulator, LifecycleError, LoadError, RunState, SaveError, StartError,
};
pub use exchange::{FrameExchange, FrameListener, Presenter};
