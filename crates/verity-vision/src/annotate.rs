//! Decode → detect → draw → encode, plus the single-slot output writer.

use crate::detector::{DetectError, FaceDetector};
use crate::raster::{self, BOX_COLOR, BOX_THICKNESS};
use crate::types::FaceBox;
use image::{ImageFormat, RgbImage};
use std::io::{Cursor, Write};
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AnnotateError {
    #[error("could not decode image: {0}")]
    Decode(image::ImageError),
    #[error("could not encode image: {0}")]
    Encode(image::ImageError),
    #[error(transparent)]
    Detect(#[from] DetectError),
    #[error("failed to write {path}: {source}")]
    Write {
        path: String,
        source: std::io::Error,
    },
}

/// Faces found in an image, and the image with their boxes drawn on it.
pub struct Annotated {
    pub boxes: Vec<FaceBox>,
    pub image: RgbImage,
}

impl Annotated {
    pub fn face_count(&self) -> usize {
        self.boxes.len()
    }

    /// Encode the annotated image as JPEG.
    pub fn to_jpeg(&self) -> Result<Vec<u8>, AnnotateError> {
        let mut buf = Vec::new();
        self.image
            .write_to(&mut Cursor::new(&mut buf), ImageFormat::Jpeg)
            .map_err(AnnotateError::Encode)?;
        Ok(buf)
    }
}

/// Decode any format the `image` crate understands into RGB.
pub fn decode_rgb(bytes: &[u8]) -> Result<RgbImage, AnnotateError> {
    image::load_from_memory(bytes)
        .map(|img| img.to_rgb8())
        .map_err(AnnotateError::Decode)
}

/// Run detection on encoded image bytes and draw every box.
pub fn detect_and_annotate(detector: &FaceDetector, bytes: &[u8]) -> Result<Annotated, AnnotateError> {
    let mut image = decode_rgb(bytes)?;
    let gray = raster::to_grayscale(&image);
    let boxes = detector.detect(&gray, image.width(), image.height())?;
    for b in &boxes {
        raster::draw_box(&mut image, b, BOX_COLOR, BOX_THICKNESS);
    }
    Ok(Annotated { boxes, image })
}

/// Replace `path` with `bytes`. The data goes to a temporary file in the same
/// directory first and is renamed over the target, so readers see either the
/// old or the new file in full.
pub fn write_replace(path: &Path, bytes: &[u8]) -> Result<(), AnnotateError> {
    let write_err = |source| AnnotateError::Write {
        path: path.display().to_string(),
        source,
    };
    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };

    let mut tmp = tempfile::NamedTempFile::new_in(dir).map_err(write_err)?;
    tmp.write_all(bytes).map_err(write_err)?;
    tmp.as_file().sync_all().map_err(write_err)?;
    tmp.persist(path).map_err(|e| write_err(e.error))?;
    Ok(())
}
