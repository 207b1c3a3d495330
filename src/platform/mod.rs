// Integration with the outside world: frame acquisition and drawing surfaces

pub mod frame_source;
pub mod surface;

pub use frame_source::{DirectoryFrameSource, FrameSource, StaticFrameSource};
pub use surface::{DrawCommand, RasterSurface, RecordingSurface};
