//! Brushes: stamp sources and the palette-text brush compiler.
//!
//! Three kinds of brush share one contract (a `PixelBuffer` stamp plus a
//! `BrushId` selection key):
//!
//! - a drawing used as a stamp,
//! - the synthetic active-color brush (1×1 of the picker's color),
//! - a character grid compiled through the palette.

use crate::color::Color;
use crate::id::{BrushKey, DrawingId};
use crate::palette::Palette;
use crate::raster::PixelBuffer;

/// Stable selection key of a brush.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum BrushId {
    /// 1×1 brush of the current picker color.
    #[default]
    ActiveColor,
    /// Stamp with a drawing's pixels.
    Drawing(DrawingId),
    /// Grid text from the project's brush table, compiled via the palette.
    Compiled(BrushKey),
}

/// Supplier of the picker's current color.
pub trait ColorSource {
    fn current_color(&self) -> Color;
}

/// A color source that always answers the same color.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixedColor(pub Color);

impl ColorSource for FixedColor {
    fn current_color(&self) -> Color {
        self.0
    }
}

/// The synthetic active-color brush.
pub fn active_color_brush(source: &(impl ColorSource + ?Sized)) -> PixelBuffer {
    PixelBuffer::solid(1, 1, source.current_color())
}

/// Compile a character grid into a stamp.
///
/// The result is `max_row_len × rows` (at least 1×1). Each character is
/// looked up in the palette: mapped characters become that color, while
/// unmapped ones and `default` aliases stay transparent, as does the
/// padding to the right of short rows. Pure and deterministic.
pub fn compile_brush(text: &str, palette: &Palette) -> PixelBuffer {
    let rows: Vec<Vec<char>> = text
        .split('\n')
        .map(|row| row.strip_suffix('\r').unwrap_or(row).chars().collect())
        .collect();
    let width = rows.iter().map(Vec::len).max().unwrap_or(0);

    let mut buffer = PixelBuffer::new(width as u32, rows.len() as u32);
    let mut painted = 0usize;
    for (y, row) in rows.iter().enumerate() {
        for (x, &key) in row.iter().enumerate() {
            if let Some(color) = palette.color(key) {
                buffer.set_pixel(x as i64, y as i64, color);
                painted += 1;
            }
        }
    }
    log::trace!(
        "compiled brush {}x{} ({painted} painted pixels)",
        buffer.width(),
        buffer.height()
    );
    buffer
}
