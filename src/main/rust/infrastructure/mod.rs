pub mod bus;
pub mod clock;
pub mod ffmpeg;
pub mod metrics;
