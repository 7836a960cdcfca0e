use super::machine::BootMode;

/// A program image could not be loaded or the machine could not boot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BootError {
    /// The image is truncated or its header is invalid.
    MalformedImage(String),

    /// The core cannot run the mode the image asks for.
    UnsupportedMode(BootMode),
}

impl std::fmt::Display for BootError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MalformedImage(reason) => write!(f, "malformed program image: {reason}"),
            Self::UnsupportedMode(mode) => write!(f, "unsupported boot mode: {mode}"),
        }
    }
}

impl std::error::Error for BootError {}

/// The core failed to serialize its state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotError {
    reason: String,
}

impl SnapshotError {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

impl std::fmt::Display for SnapshotError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "snapshot failed: {}", self.reason)
    }
}

impl std::error::Error for SnapshotError {}

/// The core rejected a snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RestoreError {
    /// Snapshot is shorter than the fixed state layout.
    Truncated { expected: usize, actual: usize },

    /// Snapshot was produced by a different core or format revision.
    Incompatible(String),
}

impl std::fmt::Display for RestoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Truncated { expected, actual } => {
                write!(f, "snapshot truncated: expected {expected} bytes, got {actual}")
            }
            Self::Incompatible(reason) => write!(f, "incompatible snapshot: {reason}"),
        }
    }
}

impl std::error::Error for RestoreError {}
