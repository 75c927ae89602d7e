//! Raster helpers: grayscale conversion, bilinear resize, integral images, box overlay.

use crate::types::FaceBox;
use image::{Rgb, RgbImage};

/// Overlay colour for detected faces.
pub const BOX_COLOR: Rgb<u8> = Rgb([0, 255, 0]);
/// Overlay stroke width in pixels.
pub const BOX_THICKNESS: u32 = 2;

/// Grayscale with ITU-R BT.601 luma weights (`0.299 R + 0.587 G + 0.114 B`).
pub fn to_grayscale(img: &RgbImage) -> Vec<u8> {
    img.pixels()
        .map(|p| {
            let [r, g, b] = p.0;
            let y = 0.299 * r as f32 + 0.587 * g as f32 + 0.114 * b as f32;
            y.round().clamp(0.0, 255.0) as u8
        })
        .collect()
}

/// Resize a grayscale frame using bilinear interpolation on pixel centres.
pub fn resize_bilinear(frame: &[u8], width: usize, height: usize, new_w: usize, new_h: usize) -> Vec<u8> {
    let scale_x = width as f32 / new_w as f32;
    let scale_y = height as f32 / new_h as f32;
    let mut resized = vec![0u8; new_w * new_h];

    for y in 0..new_h {
        let src_y = (y as f32 + 0.5) * scale_y - 0.5;
        let y0 = (src_y.floor() as i32).clamp(0, height as i32 - 1) as usize;
        let y1 = (y0 + 1).min(height - 1);
        let fy = (src_y - src_y.floor()).clamp(0.0, 1.0);

        for x in 0..new_w {
            let src_x = (x as f32 + 0.5) * scale_x - 0.5;
            let x0 = (src_x.floor() as i32).clamp(0, width as i32 - 1) as usize;
            let x1 = (x0 + 1).min(width - 1);
            let fx = (src_x - src_x.floor()).clamp(0.0, 1.0);

            let tl = frame[y0 * width + x0] as f32;
            let tr = frame[y0 * width + x1] as f32;
            let bl = frame[y1 * width + x0] as f32;
            let br = frame[y1 * width + x1] as f32;

            let val = tl * (1.0 - fx) * (1.0 - fy)
                + tr * fx * (1.0 - fy)
                + bl * (1.0 - fx) * fy
                + br * fx * fy;

            resized[y * new_w + x] = val.round().clamp(0.0, 255.0) as u8;
        }
    }

    resized
}

/// Summed-area tables of pixel values and squared pixel values.
pub struct IntegralImage {
    stride: usize,
    sum: Vec<i64>,
    sqsum: Vec<i64>,
}

impl IntegralImage {
    pub fn new(frame: &[u8], width: usize, height: usize) -> Self {
        let stride = width + 1;
        let mut sum = vec![0i64; stride * (height + 1)];
        let mut sqsum = vec![0i64; stride * (height + 1)];

        for y in 0..height {
            let mut row = 0i64;
            let mut row_sq = 0i64;
            for x in 0..width {
                let p = frame[y * width + x] as i64;
                row += p;
                row_sq += p * p;
                let at = (y + 1) * stride + x + 1;
                sum[at] = sum[at - stride] + row;
                sqsum[at] = sqsum[at - stride] + row_sq;
            }
        }

        Self { stride, sum, sqsum }
    }

    fn area(table: &[i64], stride: usize, x: usize, y: usize, w: usize, h: usize) -> i64 {
        let (x2, y2) = (x + w, y + h);
        table[y2 * stride + x2] - table[y * stride + x2] - table[y2 * stride + x] + table[y * stride + x]
    }

    /// Sum of pixels in `[x, x+w) × [y, y+h)`.
    pub fn rect_sum(&self, x: usize, y: usize, w: usize, h: usize) -> i64 {
        Self::area(&self.sum, self.stride, x, y, w, h)
    }

    /// Sum of squared pixels in `[x, x+w) × [y, y+h)`.
    pub fn rect_sqsum(&self, x: usize, y: usize, w: usize, h: usize) -> i64 {
        Self::area(&self.sqsum, self.stride, x, y, w, h)
    }

    /// Inverse of the window's standard-deviation scale, measured over the
    /// window shrunk by one pixel on every side. Flat windows yield 1.0.
    pub fn inv_variance_norm(&self, x: usize, y: usize, w: usize, h: usize) -> f64 {
        let (nw, nh) = (w - 2, h - 2);
        let area = (nw * nh) as f64;
        let s = self.rect_sum(x + 1, y + 1, nw, nh) as f64;
        let sq = self.rect_sqsum(x + 1, y + 1, nw, nh) as f64;
        let nf = area * sq - s * s;
        let nf = if nf > 0.0 { nf.sqrt() } else { 1.0 };
        1.0 / nf
    }
}

/// Draw a hollow rectangle, clipped to the image.
pub fn draw_box(img: &mut RgbImage, b: &FaceBox, color: Rgb<u8>, thickness: u32) {
    let (width, height) = img.dimensions();
    if width == 0 || height == 0 {
        return;
    }
    let right = b.x.saturating_add(b.w);
    let bottom = b.y.saturating_add(b.h);

    for t in 0..thickness {
        let (x0, y0) = (b.x.saturating_add(t), b.y.saturating_add(t));
        let (Some(x1), Some(y1)) = (right.checked_sub(t), bottom.checked_sub(t)) else {
            break;
        };
        if x0 > x1 || y0 > y1 {
            break;
        }

        for x in x0..=x1.min(width - 1) {
            for y in [y0, y1] {
                if y < height {
                    img.put_pixel(x, y, color);
                }
            }
        }
        for y in y0..=y1.min(height - 1) {
            for x in [x0, x1] {
                if x < width {
                    img.put_pixel(x, y, color);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_grayscale_bt601() {
        let mut img = RgbImage::new(3, 1);
        img.put_pixel(0, 0, Rgb([255, 0, 0]));
        img.put_pixel(1, 0, Rgb([0, 255, 0]));
        img.put_pixel(2, 0, Rgb([255, 255, 255]));
        assert_eq!(to_grayscale(&img), vec![76, 150, 255]);
    }

    #[test]
    fn test_bilinear_resize_uniform() {
        let frame = vec![128u8; 100 * 100];
        let up = resize_bilinear(&frame, 100, 100, 200, 200);
        assert!(up.iter().all(|&p| p == 128), "uniform resize should stay uniform");
        let down = resize_bilinear(&frame, 100, 100, 37, 41);
        assert_eq!(down.len(), 37 * 41);
        assert!(down.iter().all(|&p| p == 128));
    }

    #[test]
    fn test_bilinear_downscale_by_two_averages_pairs() {
        // 4x1 -> 2x1: each output centre lies between two inputs
        let frame = [0u8, 100, 200, 255];
        assert_eq!(resize_bilinear(&frame, 4, 1, 2, 1), vec![50, 228]);
    }

    #[test]
    fn test_integral_sums() {
        #[rustfmt::skip]
        let frame = [
            1u8, 2, 3,
            4,   5, 6,
            7,   8, 9,
        ];
        let ii = IntegralImage::new(&frame, 3, 3);
        assert_eq!(ii.rect_sum(0, 0, 3, 3), 45);
        assert_eq!(ii.rect_sum(1, 1, 2, 2), 5 + 6 + 8 + 9);
        assert_eq!(ii.rect_sum(2, 0, 1, 3), 3 + 6 + 9);
        assert_eq!(ii.rect_sqsum(0, 0, 2, 1), 1 + 4);
    }

    #[test]
    fn test_flat_window_has_unit_norm() {
        let frame = vec![90u8; 24 * 24];
        let ii = IntegralImage::new(&frame, 24, 24);
        assert_eq!(ii.inv_variance_norm(0, 0, 24, 24), 1.0);
    }

    #[test]
    fn test_draw_box_outline() {
        let mut img = RgbImage::new(20, 20);
        let b = FaceBox { x: 2, y: 3, w: 10, h: 8 };
        draw_box(&mut img, &b, BOX_COLOR, 2);
        assert_eq!(*img.get_pixel(2, 3), BOX_COLOR);
        assert_eq!(*img.get_pixel(3, 4), BOX_COLOR);
        assert_eq!(*img.get_pixel(12, 11), BOX_COLOR);
        assert_eq!(*img.get_pixel(7, 7), Rgb([0, 0, 0]));
        assert_eq!(*img.get_pixel(0, 0), Rgb([0, 0, 0]));
    }

    #[test]
    fn test_draw_box_clips_to_image() {
        let mut img = RgbImage::new(10, 10);
        let b = FaceBox { x: 5, y: 5, w: 30, h: 30 };
        draw_box(&mut img, &b, BOX_COLOR, 2);
        assert_eq!(*img.get_pixel(9, 5), BOX_COLOR);
        assert_eq!(*img.get_pixel(5, 9), BOX_COLOR);
    }
}
