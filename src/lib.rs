pub mod config;
pub mod encoder;
pub mod export;
pub mod images;
pub mod matcher;
pub mod preview;
pub mod scanner;
pub mod separator;
pub mod session;
pub mod storage;

// Re-export vision types for convenience
pub use facefilter_vision::{
    distance, DetectOptions, FaceEncoding, Pipeline, ENCODING_LEN, SFACE_L2_THRESHOLD,
};
pub use encoder::FaceEncoder;
pub use scanner::{MatchEvent, MatchResult, Probe};
pub use storage::KnownSet;
