pub mod face;
pub mod model;
pub mod pipeline;
pub mod yunet;

// Re-export commonly used types
pub use face::{
    distance, l2_from_cosine, Detection, FaceEncoding, ENCODING_LEN, SFACE_L2_THRESHOLD,
};
pub use pipeline::{DetectOptions, Pipeline};
