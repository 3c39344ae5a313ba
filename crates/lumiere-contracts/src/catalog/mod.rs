mod poses;
mod styles;

pub use poses::{pose_at, POSES, POSE_COUNT};
pub use styles::{StylePreset, UnknownStyle};
