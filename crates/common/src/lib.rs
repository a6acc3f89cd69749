pub mod frame_extractor;
pub mod frames;
pub mod mjpeg;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
