//! Exquisite core: the raster drawing engine's data model.
//!
//! Everything here is pure and single-threaded: pixel buffers and their
//! composite rules, the palette text contract, the text→bitmap brush
//! compiler, affine placement of drawing surfaces, and the left-to-right
//! scene layout. Interactive state (strokes, drags, the session) lives in
//! `exq-editor`.

pub mod affine;
pub mod brush;
pub mod codec;
pub mod color;
pub mod error;
pub mod id;
pub mod layout;
pub mod palette;
pub mod project;
pub mod raster;
pub mod surface;

pub use affine::AffineTransform;
pub use brush::{BrushId, ColorSource, FixedColor, active_color_brush, compile_brush};
pub use color::Color;
pub use error::EngineError;
pub use id::{BrushKey, DrawingId};
pub use layout::{LayoutConfig, LayoutItem, SceneLayout, ZoomLimits};
pub use palette::{Palette, Swatch};
pub use project::{Drawing, Project};
pub use raster::{CompositeMode, PixelBuffer};
pub use surface::{DrawingSurface, SurfaceCapability};

// Re-export kurbo's point type so downstream crates share one geometry vocabulary
pub use kurbo::{Point, Vec2};
