//! Save-state persistence: the binary file codec, PNG previews, and the
//! per-program catalog with auto and manual slots.

pub mod codec;
pub mod preview;
pub mod store;

pub use codec::{CorruptStateError, DecodedState, PersistError};
pub use store::{SaveStateRecord, SaveStateStore, SlotKind, base_title};
