//! Error taxonomy for the drawing engine.
//!
//! Nothing here is fatal: callers degrade every variant to a no-op or a
//! locally visible partial result. Malformed palette lines and
//! out-of-bounds stamps are not errors at all and never reach this type.

use crate::id::DrawingId;
use std::fmt;

#[derive(Debug, Clone, PartialEq)]
pub enum EngineError {
    /// A placement or view transform has (near) zero determinant.
    /// Hit-tests against it must be treated as misses.
    DegenerateTransform,
    /// An encoded image could not be decoded into a pixel buffer.
    Decode(String),
    /// A pixel buffer could not be encoded for export.
    Encode(String),
    /// Raw RGBA bytes whose length does not match `width × height × 4`.
    InvalidBuffer { width: u32, height: u32, len: usize },
    /// The drawing does not exist, or has no decoded buffer yet.
    UnknownDrawing(DrawingId),
    /// No palette brush is stored under this key.
    UnknownBrush(String),
    /// The project document could not be read or written.
    Project(String),
}

impl fmt::Display for EngineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DegenerateTransform => write!(f, "transform is not invertible"),
            Self::Decode(msg) => write!(f, "image decode failed: {msg}"),
            Self::Encode(msg) => write!(f, "image encode failed: {msg}"),
            Self::InvalidBuffer { width, height, len } => write!(
                f,
                "{len} bytes do not describe a {width}x{height} RGBA buffer"
            ),
            Self::UnknownDrawing(id) => write!(f, "drawing {id} is unavailable"),
            Self::UnknownBrush(key) => write!(f, "no brush named {key:?}"),
            Self::Project(msg) => write!(f, "project document error: {msg}"),
        }
    }
}

impl std::error::Error for EngineError {}

impl From<serde_json::Error> for EngineError {
    fn from(err: serde_json::Error) -> Self {
        Self::Project(err.to_string())
    }
}
