pub mod frame_source;

pub use frame_source::{DirectoryFrameSource, FrameSource};
