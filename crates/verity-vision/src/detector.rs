//! Multi-scale sliding-window face detection with rectangle grouping.
//!
//! The frame is repeatedly downscaled by `scale_factor` and the cascade's
//! fixed window is slid over each level. Raw hits are clustered and every
//! cluster with more than `min_neighbors` members becomes one detection.

use crate::cascade::{Cascade, CascadeError};
use crate::raster::{self, IntegralImage};
use crate::types::{FaceBox, Rect};
use std::path::Path;
use thiserror::Error;

// --- Named constants (no magic numbers) ---
const DEFAULT_SCALE_FACTOR: f64 = 1.1;
const DEFAULT_MIN_NEIGHBORS: usize = 5;
const DEFAULT_MIN_SIZE: (u32, u32) = (30, 30);
/// Relative tolerance for two hits to belong to the same cluster.
const GROUP_EPS: f64 = 0.2;
/// Scale at or above which the window moves one pixel at a time.
const FINE_STEP_SCALE: f64 = 2.0;

#[derive(Error, Debug)]
pub enum DetectError {
    #[error("cascade error: {0}")]
    Cascade(#[from] CascadeError),
    #[error("invalid detection parameters: {0}")]
    InvalidParams(String),
    #[error("frame buffer holds {actual} bytes, expected {expected}")]
    InvalidFrame { expected: usize, actual: usize },
}

/// Detection parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DetectParams {
    /// Ratio between successive search window sizes.
    pub scale_factor: f64,
    /// A cluster needs more than this many raw hits to be reported.
    pub min_neighbors: usize,
    /// Smallest reported face (width, height).
    pub min_size: (u32, u32),
    /// Largest reported face, unbounded when `None`.
    pub max_size: Option<(u32, u32)>,
}

impl Default for DetectParams {
    fn default() -> Self {
        Self {
            scale_factor: DEFAULT_SCALE_FACTOR,
            min_neighbors: DEFAULT_MIN_NEIGHBORS,
            min_size: DEFAULT_MIN_SIZE,
            max_size: None,
        }
    }
}

/// Haar cascade face detector. Immutable once built; safe to share across threads.
#[derive(Debug, Clone)]
pub struct FaceDetector {
    cascade: Cascade,
    params: DetectParams,
}

impl FaceDetector {
    /// Load a cascade XML file with default parameters.
    pub fn load(cascade_path: &Path) -> Result<Self, DetectError> {
        Self::new(Cascade::load(cascade_path)?, DetectParams::default())
    }

    pub fn new(cascade: Cascade, params: DetectParams) -> Result<Self, DetectError> {
        if !(params.scale_factor > 1.0 && params.scale_factor.is_finite()) {
            return Err(DetectError::InvalidParams(format!(
                "scale factor must be > 1, got {}",
                params.scale_factor
            )));
        }
        Ok(Self { cascade, params })
    }

    pub fn params(&self) -> &DetectParams {
        &self.params
    }

    /// Detect faces in a row-major grayscale buffer of `width * height` bytes.
    pub fn detect(&self, gray: &[u8], width: u32, height: u32) -> Result<Vec<FaceBox>, DetectError> {
        let expected = width as usize * height as usize;
        if gray.len() != expected {
            return Err(DetectError::InvalidFrame {
                expected,
                actual: gray.len(),
            });
        }

        let hits = self.raw_hits(gray, width as usize, height as usize);
        let faces: Vec<FaceBox> = group_rectangles(&hits, self.params.min_neighbors, GROUP_EPS)
            .into_iter()
            .map(FaceBox::from)
            .collect();

        tracing::debug!(width, height, raw = hits.len(), faces = faces.len(), "cascade detection");
        Ok(faces)
    }

    /// Every window position accepted by the cascade, across all scales.
    fn raw_hits(&self, gray: &[u8], width: usize, height: usize) -> Vec<Rect> {
        let (win_w, win_h) = self.cascade.window();
        let (min_w, min_h) = self.params.min_size;
        let mut hits = Vec::new();

        let mut factor = 1.0f64;
        loop {
            let window_w = (win_w as f64 * factor).round() as usize;
            let window_h = (win_h as f64 * factor).round() as usize;
            let scaled_w = (width as f64 / factor).round() as usize;
            let scaled_h = (height as f64 / factor).round() as usize;

            if scaled_w < win_w || scaled_h < win_h {
                break;
            }
            if let Some((max_w, max_h)) = self.params.max_size {
                if window_w > max_w as usize || window_h > max_h as usize {
                    break;
                }
            }

            if window_w >= min_w as usize && window_h >= min_h as usize {
                let scaled;
                let level: &[u8] = if scaled_w == width && scaled_h == height {
                    gray
                } else {
                    scaled = raster::resize_bilinear(gray, width, height, scaled_w, scaled_h);
                    &scaled
                };
                let ii = IntegralImage::new(level, scaled_w, scaled_h);
                let step = if factor >= FINE_STEP_SCALE { 1 } else { 2 };

                // Last valid origin is `scaled - win`, inclusive.
                for y in (0..=scaled_h - win_h).step_by(step) {
                    for x in (0..=scaled_w - win_w).step_by(step) {
                        if self.cascade.passes(&ii, x, y) {
                            hits.push(Rect {
                                x: (x as f64 * factor).round() as i32,
                                y: (y as f64 * factor).round() as i32,
                                w: window_w as i32,
                                h: window_h as i32,
                            });
                        }
                    }
                }
            }

            factor *= self.params.scale_factor;
        }

        hits
    }
}

/// Two hits are neighbours when every edge differs by at most
/// `eps * (mean of the smaller width and height)`.
fn similar(a: &Rect, b: &Rect, eps: f64) -> bool {
    let delta = eps * (a.w.min(b.w) + a.h.min(b.h)) as f64 * 0.5;
    ((a.x - b.x).abs() as f64) <= delta
        && ((a.y - b.y).abs() as f64) <= delta
        && ((a.x + a.w - b.x - b.w).abs() as f64) <= delta
        && ((a.y + a.h - b.y - b.h).abs() as f64) <= delta
}

/// Label equivalence classes of the `similar` relation (transitive closure).
/// Class numbers follow the order of each class's first member.
fn partition(rects: &[Rect], eps: f64) -> (Vec<usize>, usize) {
    let n = rects.len();
    let mut parent: Vec<usize> = (0..n).collect();

    fn find(parent: &mut [usize], mut i: usize) -> usize {
        while parent[i] != i {
            parent[i] = parent[parent[i]];
            i = parent[i];
        }
        i
    }

    for i in 0..n {
        for j in (i + 1)..n {
            if similar(&rects[i], &rects[j], eps) {
                let (ri, rj) = (find(&mut parent, i), find(&mut parent, j));
                if ri != rj {
                    parent[rj] = ri;
                }
            }
        }
    }

    let mut class_of_root = vec![usize::MAX; n];
    let mut labels = Vec::with_capacity(n);
    let mut classes = 0;
    for i in 0..n {
        let root = find(&mut parent, i);
        if class_of_root[root] == usize::MAX {
            class_of_root[root] = classes;
            classes += 1;
        }
        labels.push(class_of_root[root]);
    }
    (labels, classes)
}

/// Cluster raw hits and average each cluster.
///
/// Clusters with `min_neighbors` or fewer members are dropped, as are
/// clusters lying inside a better-supported one.
fn group_rectangles(rects: &[Rect], min_neighbors: usize, eps: f64) -> Vec<Rect> {
    if min_neighbors == 0 || rects.is_empty() {
        return rects.to_vec();
    }

    let (labels, classes) = partition(rects, eps);
    let mut sums = vec![[0i64; 4]; classes];
    let mut counts = vec![0usize; classes];
    for (r, &label) in rects.iter().zip(&labels) {
        let s = &mut sums[label];
        s[0] += r.x as i64;
        s[1] += r.y as i64;
        s[2] += r.w as i64;
        s[3] += r.h as i64;
        counts[label] += 1;
    }

    let averaged: Vec<Rect> = sums
        .iter()
        .zip(&counts)
        .map(|(s, &n)| {
            let avg = |v: i64| (v as f64 / n as f64).round() as i32;
            Rect {
                x: avg(s[0]),
                y: avg(s[1]),
                w: avg(s[2]),
                h: avg(s[3]),
            }
        })
        .collect();

    let mut grouped = Vec::new();
    for (i, r1) in averaged.iter().enumerate() {
        let n1 = counts[i];
        if n1 <= min_neighbors {
            continue;
        }

        let nested = averaged.iter().enumerate().any(|(j, r2)| {
            let n2 = counts[j];
            if j == i || n2 <= min_neighbors {
                return false;
            }
            let dx = (r2.w as f64 * eps).round() as i32;
            let dy = (r2.h as f64 * eps).round() as i32;
            r1.x >= r2.x - dx
                && r1.y >= r2.y - dy
                && r1.x + r1.w <= r2.x + r2.w + dx
                && r1.y + r1.h <= r2.y + r2.h + dy
                && (n2 > n1.max(3) || n1 < 3)
        });

        if !nested {
            grouped.push(*r1);
        }
    }
    grouped
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cascade::tests::{edge_frame, EDGE_CASCADE};

    fn rect(x: i32, y: i32, w: i32, h: i32) -> Rect {
        Rect { x, y, w, h }
    }

    fn edge_detector(params: DetectParams) -> FaceDetector {
        FaceDetector::new(Cascade::from_xml(EDGE_CASCADE).unwrap(), params).unwrap()
    }

    #[test]
    fn test_similar_within_tolerance() {
        // delta = 0.2 * (40 + 40) / 2 = 8
        assert!(similar(&rect(0, 0, 40, 40), &rect(8, 8, 40, 40), 0.2));
        assert!(!similar(&rect(0, 0, 40, 40), &rect(9, 0, 40, 40), 0.2));
    }

    #[test]
    fn test_partition_is_transitive() {
        // a~b, b~c, but a and c are too far apart on their own
        let rects = [rect(0, 0, 40, 40), rect(6, 0, 40, 40), rect(12, 0, 40, 40), rect(200, 0, 40, 40)];
        let (labels, classes) = partition(&rects, 0.2);
        assert_eq!(classes, 2);
        assert_eq!(labels, vec![0, 0, 0, 1]);
    }

    #[test]
    fn test_group_requires_more_than_min_neighbors() {
        let five: Vec<Rect> = (0..5).map(|i| rect(100 + i, 100, 40, 40)).collect();
        assert!(group_rectangles(&five, 5, 0.2).is_empty());

        let six: Vec<Rect> = (0..6).map(|i| rect(100 + i, 100, 40, 40)).collect();
        assert_eq!(group_rectangles(&six, 5, 0.2), vec![rect(103, 100, 40, 40)]);
    }

    #[test]
    fn test_group_keeps_separate_clusters_in_order() {
        let mut rects: Vec<Rect> = (0..6).map(|i| rect(10 + i, 10, 30, 30)).collect();
        rects.extend((0..7).map(|i| rect(300, 300 + i, 50, 50)));
        let grouped = group_rectangles(&rects, 5, 0.2);
        assert_eq!(grouped, vec![rect(13, 10, 30, 30), rect(300, 303, 50, 50)]);
    }

    #[test]
    fn test_group_drops_cluster_nested_in_stronger_one() {
        let mut rects: Vec<Rect> = (0..6).map(|_| rect(110, 110, 30, 30)).collect();
        rects.extend((0..12).map(|_| rect(100, 100, 60, 60)));
        assert_eq!(group_rectangles(&rects, 5, 0.2), vec![rect(100, 100, 60, 60)]);
    }

    #[test]
    fn test_group_with_zero_threshold_returns_raw_hits() {
        let rects = [rect(1, 2, 3, 4), rect(1, 2, 3, 4)];
        assert_eq!(group_rectangles(&rects, 0, 0.2), rects.to_vec());
    }

    #[test]
    fn test_rejects_bad_scale_factor() {
        let cascade = Cascade::from_xml(EDGE_CASCADE).unwrap();
        let params = DetectParams { scale_factor: 1.0, ..DetectParams::default() };
        assert!(matches!(FaceDetector::new(cascade, params), Err(DetectError::InvalidParams(_))));
    }

    #[test]
    fn test_rejects_short_frame() {
        let det = edge_detector(DetectParams::default());
        assert!(matches!(
            det.detect(&[0u8; 10], 100, 100),
            Err(DetectError::InvalidFrame { expected: 10000, actual: 10 })
        ));
    }

    #[test]
    fn test_uniform_frame_has_no_faces() {
        let det = edge_detector(DetectParams::default());
        let frame = vec![128u8; 120 * 100];
        assert!(det.detect(&frame, 120, 100).unwrap().is_empty());
    }

    #[test]
    fn test_frame_smaller_than_window() {
        let det = edge_detector(DetectParams::default());
        let frame = edge_frame(20, 20, 10);
        assert!(det.detect(&frame, 20, 20).unwrap().is_empty());
    }

    fn raw_params() -> DetectParams {
        DetectParams { min_neighbors: 0, min_size: (0, 0), ..DetectParams::default() }
    }

    #[test]
    fn test_window_that_exactly_fits_frame_is_scanned() {
        let det = edge_detector(raw_params());
        let frame = edge_frame(24, 24, 12);
        let faces = det.detect(&frame, 24, 24).unwrap();
        assert_eq!(faces, vec![FaceBox { x: 0, y: 0, w: 24, h: 24 }]);
    }

    #[test]
    fn test_last_column_position_is_scanned() {
        let det = edge_detector(raw_params());
        // Only origins x = 0 and x = 2 fit; the edge sits mid-window at x = 2.
        let frame = edge_frame(26, 24, 14);
        let faces = det.detect(&frame, 26, 24).unwrap();
        assert!(faces.contains(&FaceBox { x: 2, y: 0, w: 24, h: 24 }), "{faces:?}");
    }

    #[test]
    fn test_edge_frame_yields_grouped_detections() {
        let det = edge_detector(DetectParams::default());
        let frame = edge_frame(100, 100, 50);
        let faces = det.detect(&frame, 100, 100).unwrap();
        assert!(!faces.is_empty());
        for f in &faces {
            assert!(f.w >= 30 && f.h >= 30, "{f:?} below min size");
            assert!(f.x < 50 && f.x + f.w > 50, "{f:?} does not straddle the edge");
        }
    }

    #[test]
    fn test_min_size_filters_small_scales() {
        let params = DetectParams { min_size: (200, 200), ..DetectParams::default() };
        let det = edge_detector(params);
        let frame = edge_frame(100, 100, 50);
        assert!(det.detect(&frame, 100, 100).unwrap().is_empty());
    }

    #[test]
    fn test_max_size_stops_scan() {
        let params = DetectParams { max_size: Some((20, 20)), ..DetectParams::default() };
        let det = edge_detector(params);
        let frame = edge_frame(100, 100, 50);
        assert!(det.detect(&frame, 100, 100).unwrap().is_empty());
    }
}
