use serde::{Deserialize, Serialize};

/// Bounding box of a detected face in input-image pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FaceBox {
    pub x: u32,
    pub y: u32,
    pub w: u32,
    pub h: u32,
}

/// Integer rectangle used while grouping raw cascade hits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Rect {
    pub x: i32,
    pub y: i32,
    pub w: i32,
    pub h: i32,
}

impl From<Rect> for FaceBox {
    fn from(r: Rect) -> Self {
        FaceBox {
            x: r.x.max(0) as u32,
            y: r.y.max(0) as u32,
            w: r.w.max(0) as u32,
            h: r.h.max(0) as u32,
        }
    }
}
