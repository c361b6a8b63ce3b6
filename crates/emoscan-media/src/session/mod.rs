//! Periodic emotion analysis sessions.

pub mod config;
pub mod logger;
pub mod runner;
pub mod source;

pub use config::{SessionConfig, DEFAULT_INFERENCE_TIMEOUT, DEFAULT_TICK_INTERVAL};
pub use logger::SessionLogger;
pub use runner::{EmotionSession, SessionHandle, SessionOutcome};
pub use source::{
    BlankFrameSource, ChannelFrameSource, DirectoryFrameSource, FrameSource, FRAME_EXTENSIONS,
};
