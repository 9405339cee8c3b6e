pub mod format;
pub mod store;

pub use format::{LevelFile, MarkerData, MovingTo, ObjectData, ObjectKind, Padding, Position};
pub use store::{LevelStore, SaveOutcome};

/// Pixels per meter. Level files are written in pixels, the world runs in meters.
pub const PPM: f32 = 64.0;

#[derive(Debug, thiserror::Error)]
pub enum LevelError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Parse error: {0}")]
    Parse(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, LevelError>;
