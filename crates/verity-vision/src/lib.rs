//! verity-vision — Classical face detection.
//!
//! Evaluates OpenCV Haar cascades over a multi-scale image pyramid, groups
//! overlapping hits into detections and draws them onto the input image.

pub mod annotate;
pub mod cascade;
pub mod detector;
pub mod raster;
pub mod types;

pub use annotate::{detect_and_annotate, write_replace, AnnotateError, Annotated};
pub use cascade::{Cascade, CascadeError};
pub use detector::{DetectError, DetectParams, FaceDetector};
pub use types::FaceBox;
