//! Pure-math helpers for planar I420 pictures.
//!
//! Everything works on plain `&[u8]` planes addressed by stride, so the
//! compositor can run the same code over Y, U and V.

use crate::models::layout::Rgb;

/// Integer pixel rectangle on a plane.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PixelRect {
    pub x: usize,
    pub y: usize,
    pub width: usize,
    pub height: usize,
}

impl PixelRect {
    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// The matching rectangle on a half-resolution chroma plane.
    pub fn to_chroma(self) -> Self {
        let x = self.x / 2;
        let y = self.y / 2;
        Self {
            x,
            y,
            width: (self.x + self.width).div_ceil(2) - x,
            height: (self.y + self.height).div_ceil(2) - y,
        }
    }
}

/// Sub-pixel window into a source plane.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SourceWindow {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl SourceWindow {
    pub fn to_chroma(self) -> Self {
        Self {
            x: self.x / 2.0,
            y: self.y / 2.0,
            width: self.width / 2.0,
            height: self.height / 2.0,
        }
    }
}

/// Borrowed source plane.
#[derive(Debug, Clone, Copy)]
pub struct Plane<'a> {
    pub data: &'a [u8],
    pub stride: usize,
    pub width: usize,
    pub height: usize,
}

/// Borrowed destination plane.
#[derive(Debug)]
pub struct PlaneMut<'a> {
    pub data: &'a mut [u8],
    pub stride: usize,
    pub width: usize,
    pub height: usize,
}

impl PlaneMut<'_> {
    pub fn fill(&mut self, value: u8) {
        if self.stride == 0 {
            return;
        }
        for row in self.data.chunks_mut(self.stride).take(self.height) {
            let end = self.width.min(row.len());
            row[..end].fill(value);
        }
    }
}

/// BT.601 studio-swing Y, Cb, Cr for an RGB colour, unrounded.
pub fn yuv_components(color: Rgb) -> (f64, f64, f64) {
    let (r, g, b) = (color.r as f64, color.g as f64, color.b as f64);
    let y = 16.0 + (65.481 * r + 128.553 * g + 24.966 * b) / 255.0;
    let u = 128.0 + (-37.797 * r - 74.203 * g + 112.0 * b) / 255.0;
    let v = 128.0 + (112.0 * r - 93.786 * g - 18.214 * b) / 255.0;
    (y, u, v)
}

pub fn rgb_to_yuv(color: Rgb) -> [u8; 3] {
    let (y, u, v) = yuv_components(color);
    [to_u8(y), to_u8(u), to_u8(v)]
}

/// `alpha * src + (1 - alpha) * dst`, rounded.
pub fn blend(src: u8, dst: u8, alpha: f64) -> u8 {
    if alpha >= 1.0 {
        return src;
    }
    if alpha <= 0.0 {
        return dst;
    }
    to_u8(src as f64 * alpha + dst as f64 * (1.0 - alpha))
}

fn to_u8(value: f64) -> u8 {
    value.round().clamp(0.0, 255.0) as u8
}

/// Nearest-neighbour scale `window` of `src` into `dst_rect` of `dst`,
/// alpha-blending over what is already there. Clips to `dst`.
pub fn blend_scaled(dst: &mut PlaneMut<'_>, dst_rect: PixelRect, src: &Plane<'_>, window: SourceWindow, alpha: f64) {
    if dst_rect.is_empty() || src.width == 0 || src.height == 0 {
        return;
    }
    let x_end = (dst_rect.x + dst_rect.width).min(dst.width);
    let y_end = (dst_rect.y + dst_rect.height).min(dst.height);
    let x_step = window.width / dst_rect.width as f64;
    let y_step = window.height / dst_rect.height as f64;

    for dy in dst_rect.y..y_end {
        let sy = source_index(window.y, y_step, dy - dst_rect.y, src.height);
        let src_row = sy * src.stride;
        let dst_row = dy * dst.stride;
        for dx in dst_rect.x..x_end {
            let sx = source_index(window.x, x_step, dx - dst_rect.x, src.width);
            let (Some(&s), Some(d)) = (src.data.get(src_row + sx), dst.data.get_mut(dst_row + dx)) else {
                continue;
            };
            *d = blend(s, *d, alpha);
        }
    }
}

fn source_index(origin: f64, step: f64, offset: usize, limit: usize) -> usize {
    let position = origin + (offset as f64 + 0.5) * step;
    (position.max(0.0) as usize).min(limit - 1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn black_and_white_hit_studio_range() {
        assert_eq!(rgb_to_yuv(Rgb { r: 0, g: 0, b: 0 }), [16, 128, 128]);
        assert_eq!(rgb_to_yuv(Rgb { r: 255, g: 255, b: 255 }), [235, 128, 128]);
    }

    #[test]
    fn pure_red_components() {
        let (y, u, v) = yuv_components(Rgb { r: 255, g: 0, b: 0 });
        assert_abs_diff_eq!(y, 81.481, epsilon = 1e-3);
        assert_abs_diff_eq!(u, 90.203, epsilon = 1e-3);
        assert_abs_diff_eq!(v, 240.0, epsilon = 1e-3);
    }

    #[test]
    fn blend_weights() {
        assert_eq!(blend(200, 100, 1.0), 200);
        assert_eq!(blend(200, 100, 0.0), 100);
        assert_eq!(blend(200, 100, 0.5), 150);
        assert_eq!(blend(200, 100, 0.25), 125);
    }

    #[test]
    fn chroma_rect_covers_odd_edges() {
        let rect = PixelRect { x: 3, y: 1, width: 4, height: 3 };
        assert_eq!(rect.to_chroma(), PixelRect { x: 1, y: 0, width: 3, height: 2 });
    }

    #[test]
    fn fill_respects_stride() {
        let mut data = vec![0u8; 8];
        let mut plane = PlaneMut {
            data: &mut data,
            stride: 4,
            width: 3,
            height: 2,
        };
        plane.fill(9);
        assert_eq!(data, vec![9, 9, 9, 0, 9, 9, 9, 0]);
    }

    #[test]
    fn upscale_2x_duplicates_pixels() {
        let src_data = [10u8, 20, 30, 40];
        let src = Plane {
            data: &src_data,
            stride: 2,
            width: 2,
            height: 2,
        };
        let mut dst_data = vec![0u8; 16];
        let mut dst = PlaneMut {
            data: &mut dst_data,
            stride: 4,
            width: 4,
            height: 4,
        };
        let window = SourceWindow { x: 0.0, y: 0.0, width: 2.0, height: 2.0 };
        blend_scaled(&mut dst, PixelRect { x: 0, y: 0, width: 4, height: 4 }, &src, window, 1.0);
        assert_eq!(
            dst_data,
            vec![10, 10, 20, 20, 10, 10, 20, 20, 30, 30, 40, 40, 30, 30, 40, 40]
        );
    }

    #[test]
    fn blit_is_clipped_to_destination() {
        let src_data = [50u8; 4];
        let src = Plane {
            data: &src_data,
            stride: 2,
            width: 2,
            height: 2,
        };
        let mut dst_data = vec![0u8; 4];
        let mut dst = PlaneMut {
            data: &mut dst_data,
            stride: 2,
            width: 2,
            height: 2,
        };
        let window = SourceWindow { x: 0.0, y: 0.0, width: 2.0, height: 2.0 };
        blend_scaled(&mut dst, PixelRect { x: 1, y: 1, width: 4, height: 4 }, &src, window, 1.0);
        assert_eq!(dst_data, vec![0, 0, 0, 50]);
    }
}
