//! Addressable RGBA raster with resize, fill and stamp compositing.
//!
//! Pixels are stored row-major, 4 bytes each, non-premultiplied. The
//! invariant `data.len() == width * height * 4` holds after every
//! operation; both dimensions are always at least 1.

use crate::color::Color;
use crate::error::EngineError;
use kurbo::Point;
use std::fmt;

/// Alpha-blending rule used when stamping a source onto a destination.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CompositeMode {
    /// "source-over": the source is painted on top of the destination.
    #[default]
    Normal,
    /// "destination-out": source alpha is removed from the destination.
    Erase,
}

#[derive(Clone, PartialEq, Eq)]
pub struct PixelBuffer {
    width: u32,
    height: u32,
    data: Vec<u8>,
}

impl fmt::Debug for PixelBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PixelBuffer")
            .field("width", &self.width)
            .field("height", &self.height)
            .finish_non_exhaustive()
    }
}

/// Largest width or height a buffer may have. Keeps the byte length
/// addressable on 32-bit targets.
pub const MAX_DIMENSION: u32 = 16384;

/// RGBA byte length of a `width × height` buffer, `None` on overflow.
fn byte_len(width: u32, height: u32) -> Option<usize> {
    (width as usize)
        .checked_mul(height as usize)?
        .checked_mul(4)
}

impl PixelBuffer {
    /// Fully transparent buffer. Dimensions are clamped to
    /// `1..=MAX_DIMENSION`.
    pub fn new(width: u32, height: u32) -> Self {
        let clamp = |d: u32| d.clamp(1, MAX_DIMENSION);
        let (width, height) = (clamp(width), clamp(height));
        Self {
            width,
            height,
            data: vec![0; width as usize * height as usize * 4],
        }
    }

    /// Buffer filled with one color.
    pub fn solid(width: u32, height: u32, color: Color) -> Self {
        let mut buffer = Self::new(width, height);
        buffer.fill(Some(color));
        buffer
    }

    /// Adopt decoded RGBA bytes, checking them against the dimensions.
    pub fn from_rgba(width: u32, height: u32, data: Vec<u8>) -> Result<Self, EngineError> {
        let in_range = |d: u32| (1..=MAX_DIMENSION).contains(&d);
        if !in_range(width) || !in_range(height) || byte_len(width, height) != Some(data.len()) {
            return Err(EngineError::InvalidBuffer {
                width,
                height,
                len: data.len(),
            });
        }
        Ok(Self {
            width,
            height,
            data,
        })
    }

    #[inline]
    pub fn width(&self) -> u32 {
        self.width
    }

    #[inline]
    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    #[inline]
    pub fn contains(&self, x: i64, y: i64) -> bool {
        x >= 0 && y >= 0 && x < self.width as i64 && y < self.height as i64
    }

    /// Whether a fractional local point lies on a pixel of this buffer.
    pub fn contains_point(&self, p: Point) -> bool {
        p.x >= 0.0 && p.y >= 0.0 && p.x < self.width as f64 && p.y < self.height as f64
    }

    #[inline]
    fn offset(&self, x: u32, y: u32) -> usize {
        (y as usize * self.width as usize + x as usize) * 4
    }

    pub fn pixel(&self, x: i64, y: i64) -> Option<Color> {
        if !self.contains(x, y) {
            return None;
        }
        let i = self.offset(x as u32, y as u32);
        Some(Color::from_array([
            self.data[i],
            self.data[i + 1],
            self.data[i + 2],
            self.data[i + 3],
        ]))
    }

    /// Overwrite one pixel. Returns `false` when out of bounds.
    pub fn set_pixel(&mut self, x: i64, y: i64, color: Color) -> bool {
        if !self.contains(x, y) {
            return false;
        }
        let i = self.offset(x as u32, y as u32);
        self.data[i..i + 4].copy_from_slice(&color.to_array());
        true
    }

    /// Whether every pixel has zero alpha.
    pub fn is_transparent(&self) -> bool {
        self.data.chunks_exact(4).all(|px| px[3] == 0)
    }

    /// Fill with a color, or clear to transparent black with `None`.
    pub fn fill(&mut self, color: Option<Color>) {
        let px = color.unwrap_or(Color::TRANSPARENT).to_array();
        for chunk in self.data.chunks_exact_mut(4) {
            chunk.copy_from_slice(&px);
        }
    }

    /// Reallocate to a new size, keeping the top-left overlap and filling
    /// the new area with transparent black. Returns the size actually used.
    pub fn resize(&mut self, width: u32, height: u32) -> (u32, u32) {
        let mut resized = Self::new(width, height);
        let copy_w = self.width.min(resized.width) as usize * 4;
        for y in 0..self.height.min(resized.height) {
            let src = self.offset(0, y);
            let dst = resized.offset(0, y);
            resized.data[dst..dst + copy_w].copy_from_slice(&self.data[src..src + copy_w]);
        }
        log::trace!(
            "resize {}x{} -> {}x{}",
            self.width,
            self.height,
            resized.width,
            resized.height
        );
        *self = resized;
        self.size()
    }

    /// Composite `source` with its top-left corner at `(x, y)`.
    ///
    /// Regions outside this buffer are clipped. Returns the number of
    /// destination pixels covered (0 for a fully clipped stamp).
    pub fn composite_stamp(
        &mut self,
        source: &PixelBuffer,
        x: i64,
        y: i64,
        mode: CompositeMode,
    ) -> usize {
        let x0 = x.max(0);
        let y0 = y.max(0);
        let x1 = x.saturating_add(source.width as i64).min(self.width as i64);
        let y1 = y.saturating_add(source.height as i64).min(self.height as i64);
        if x0 >= x1 || y0 >= y1 {
            return 0;
        }

        for dy in y0..y1 {
            for dx in x0..x1 {
                let s = source.offset((dx - x) as u32, (dy - y) as u32);
                let d = self.offset(dx as u32, dy as u32);
                let src: [u8; 4] = [
                    source.data[s],
                    source.data[s + 1],
                    source.data[s + 2],
                    source.data[s + 3],
                ];
                let dst = &mut self.data[d..d + 4];
                match mode {
                    CompositeMode::Normal => source_over(src, dst),
                    CompositeMode::Erase => destination_out(src[3], dst),
                }
            }
        }
        ((x1 - x0) * (y1 - y0)) as usize
    }

    /// Stamp `brush` centered on a fractional local point.
    ///
    /// Placement is `target − floor(brush_size / 2)`, rounded to the
    /// nearest pixel.
    pub fn stamp_centered(&mut self, brush: &PixelBuffer, target: Point, mode: CompositeMode) -> usize {
        let ox = (brush.width / 2) as f64;
        let oy = (brush.height / 2) as f64;
        let x = (target.x - ox).round() as i64;
        let y = (target.y - oy).round() as i64;
        self.composite_stamp(brush, x, y, mode)
    }
}

/// Standard non-premultiplied source-over in integer arithmetic.
fn source_over(src: [u8; 4], dst: &mut [u8]) {
    let sa = src[3] as u32;
    if sa == 0 {
        return;
    }
    if sa == 255 {
        dst.copy_from_slice(&src);
        return;
    }
    let da = dst[3] as u32;
    // Alpha scaled by 255²
    let out_a = sa * 255 + da * (255 - sa);
    if out_a == 0 {
        dst.copy_from_slice(&[0, 0, 0, 0]);
        return;
    }
    for c in 0..3 {
        let blended = src[c] as u32 * sa * 255 + dst[c] as u32 * da * (255 - sa);
        dst[c] = ((blended + out_a / 2) / out_a) as u8;
    }
    dst[3] = ((out_a + 127) / 255) as u8;
}

/// Destination-out: keep `dst_alpha × (1 − src_alpha)`.
fn destination_out(sa: u8, dst: &mut [u8]) {
    if sa == 0 {
        return;
    }
    let remaining = (dst[3] as u32 * (255 - sa as u32) + 127) / 255;
    if remaining == 0 {
        dst.copy_from_slice(&[0, 0, 0, 0]);
    } else {
        dst[3] = remaining as u8;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const RED: Color = Color::rgb(255, 0, 0);
    const BLUE: Color = Color::rgb(0, 0, 255);

    #[test]
    fn new_buffer_is_transparent_and_sized() {
        let b = PixelBuffer::new(3, 2);
        assert_eq!(b.as_bytes().len(), 3 * 2 * 4);
        assert!(b.is_transparent());
    }

    #[test]
    fn zero_dimensions_clamp_to_one() {
        assert_eq!(PixelBuffer::new(0, 0).size(), (1, 1));
        let mut b = PixelBuffer::new(4, 4);
        assert_eq!(b.resize(0, 7), (1, 7));
        assert_eq!(b.as_bytes().len(), 7 * 4);
    }

    #[test]
    fn from_rgba_rejects_wrong_length() {
        let err = PixelBuffer::from_rgba(2, 2, vec![0; 15]).unwrap_err();
        assert_eq!(
            err,
            EngineError::InvalidBuffer {
                width: 2,
                height: 2,
                len: 15
            }
        );
        assert!(PixelBuffer::from_rgba(2, 2, vec![0; 16]).is_ok());
    }

    #[test]
    fn oversized_rgba_is_rejected_not_wrapped() {
        let err = PixelBuffer::from_rgba(1 << 31, 1 << 31, Vec::new()).unwrap_err();
        assert_eq!(
            err,
            EngineError::InvalidBuffer {
                width: 1 << 31,
                height: 1 << 31,
                len: 0
            }
        );
        // Product wraps to 0 bytes with 32-bit arithmetic.
        assert!(PixelBuffer::from_rgba(65536, 16384, Vec::new()).is_err());
        let wide = vec![0; (MAX_DIMENSION as usize + 1) * 4];
        assert!(PixelBuffer::from_rgba(MAX_DIMENSION + 1, 1, wide).is_err());
    }

    #[test]
    fn huge_sizes_clamp_to_max_dimension() {
        assert_eq!(PixelBuffer::new(u32::MAX, 2).size(), (MAX_DIMENSION, 2));
        let mut b = PixelBuffer::new(2, 2);
        assert_eq!(b.resize(3, u32::MAX), (3, MAX_DIMENSION));
        assert_eq!(b.as_bytes().len(), 3 * MAX_DIMENSION as usize * 4);
    }

    #[test]
    fn resize_widen_preserves_top_left() {
        let mut b = PixelBuffer::new(4, 4);
        for y in 0..4 {
            for x in 0..4 {
                b.set_pixel(x, y, Color::rgba(x as u8 * 10, y as u8 * 10, 7, 255));
            }
        }
        let before = b.clone();
        assert_eq!(b.resize(8, 4), (8, 4));
        for y in 0..4 {
            for x in 0..4 {
                assert_eq!(b.pixel(x, y), before.pixel(x, y));
            }
            for x in 4..8 {
                assert_eq!(b.pixel(x, y), Some(Color::TRANSPARENT));
            }
        }
    }

    #[test]
    fn resize_shrink_crops() {
        let mut b = PixelBuffer::solid(4, 4, RED);
        b.resize(2, 3);
        assert_eq!(b, PixelBuffer::solid(2, 3, RED));
    }

    #[test]
    fn clone_does_not_alias() {
        let a = PixelBuffer::solid(2, 2, RED);
        let mut b = a.clone();
        b.fill(None);
        assert_eq!(a.pixel(0, 0), Some(RED));
        assert!(b.is_transparent());
    }

    #[test]
    fn normal_stamp_paints_over() {
        let mut dst = PixelBuffer::solid(3, 3, BLUE);
        let src = PixelBuffer::solid(1, 1, RED);
        assert_eq!(dst.composite_stamp(&src, 1, 1, CompositeMode::Normal), 1);
        assert_eq!(dst.pixel(1, 1), Some(RED));
        assert_eq!(dst.pixel(0, 0), Some(BLUE));
    }

    #[test]
    fn transparent_source_pixels_leave_destination() {
        let mut dst = PixelBuffer::solid(2, 2, BLUE);
        let src = PixelBuffer::new(2, 2);
        dst.composite_stamp(&src, 0, 0, CompositeMode::Normal);
        assert_eq!(dst, PixelBuffer::solid(2, 2, BLUE));
    }

    #[test]
    fn half_alpha_over_transparent_keeps_color() {
        let mut dst = PixelBuffer::new(1, 1);
        let src = PixelBuffer::solid(1, 1, Color::rgba(200, 100, 50, 128));
        dst.composite_stamp(&src, 0, 0, CompositeMode::Normal);
        assert_eq!(dst.pixel(0, 0), Some(Color::rgba(200, 100, 50, 128)));
    }

    #[test]
    fn half_alpha_over_opaque_blends() {
        let mut dst = PixelBuffer::solid(1, 1, Color::rgb(0, 0, 0));
        let src = PixelBuffer::solid(1, 1, Color::rgba(255, 255, 255, 128));
        dst.composite_stamp(&src, 0, 0, CompositeMode::Normal);
        assert_eq!(dst.pixel(0, 0), Some(Color::rgb(128, 128, 128)));
    }

    #[test]
    fn erase_opaque_stamp_clears_alpha() {
        let mut dst = PixelBuffer::solid(4, 4, BLUE);
        let src = PixelBuffer::solid(2, 2, RED);
        dst.composite_stamp(&src, 1, 1, CompositeMode::Erase);
        for (x, y) in [(1, 1), (2, 1), (1, 2), (2, 2)] {
            assert_eq!(dst.pixel(x, y), Some(Color::TRANSPARENT));
        }
        assert_eq!(dst.pixel(0, 0), Some(BLUE));
        assert_eq!(dst.pixel(3, 3), Some(BLUE));
    }

    #[test]
    fn erase_partial_alpha_keeps_color() {
        let mut dst = PixelBuffer::solid(1, 1, BLUE);
        let src = PixelBuffer::solid(1, 1, Color::rgba(0, 0, 0, 51));
        dst.composite_stamp(&src, 0, 0, CompositeMode::Erase);
        assert_eq!(dst.pixel(0, 0), Some(Color::rgba(0, 0, 255, 204)));
    }

    #[test]
    fn stamp_outside_is_a_noop() {
        let mut dst = PixelBuffer::solid(4, 4, BLUE);
        let before = dst.clone();
        let src = PixelBuffer::solid(2, 2, RED);
        for (x, y) in [(-2, 0), (4, 0), (0, -2), (0, 4), (-100, 100)] {
            assert_eq!(dst.composite_stamp(&src, x, y, CompositeMode::Normal), 0);
        }
        assert_eq!(
            dst.stamp_centered(&src, Point::new(1e300, -1e300), CompositeMode::Normal),
            0
        );
        assert_eq!(dst, before);
    }

    #[test]
    fn stamp_partially_outside_is_clipped() {
        let mut dst = PixelBuffer::new(3, 3);
        let src = PixelBuffer::solid(2, 2, RED);
        assert_eq!(dst.composite_stamp(&src, -1, -1, CompositeMode::Normal), 1);
        assert_eq!(dst.pixel(0, 0), Some(RED));
        assert_eq!(dst.pixel(1, 0), Some(Color::TRANSPARENT));
    }

    #[test]
    fn centered_stamp_offsets_by_half_size() {
        let mut dst = PixelBuffer::new(8, 8);
        let brush = PixelBuffer::solid(3, 3, RED);
        dst.stamp_centered(&brush, Point::new(4.0, 4.0), CompositeMode::Normal);
        // floor(3 / 2) = 1, so the brush covers 3..=5
        assert_eq!(dst.pixel(2, 2), Some(Color::TRANSPARENT));
        assert_eq!(dst.pixel(3, 3), Some(RED));
        assert_eq!(dst.pixel(5, 5), Some(RED));
        assert_eq!(dst.pixel(6, 6), Some(Color::TRANSPARENT));
    }

    #[test]
    fn centered_stamp_rounds_to_nearest_pixel() {
        let mut dst = PixelBuffer::new(4, 4);
        let dot = PixelBuffer::solid(1, 1, RED);
        dst.stamp_centered(&dot, Point::new(1.6, 2.4), CompositeMode::Normal);
        assert_eq!(dst.pixel(2, 2), Some(RED));
    }
}
