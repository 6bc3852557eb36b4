//! Drawing-panel commands.
//!
//! Every non-stroke change to the drawing set goes through one of these,
//! applied by `Session::apply`. There is no undo stack; a command takes
//! effect immediately.

use exq_core::DrawingId;

#[derive(Debug, Clone, PartialEq)]
pub enum DrawingCommand {
    Rename { id: DrawingId, name: String },
    /// Resize keeping the top-left content.
    Resize { id: DrawingId, width: u32, height: u32 },
    /// Duplicate pixels and name into a new drawing appended at the end.
    Clone { id: DrawingId },
    /// Clear to transparent.
    Clear { id: DrawingId },
    Delete { id: DrawingId },
    /// Forget a dragged position and return to the layout slot.
    Unpin { id: DrawingId },
}

impl DrawingCommand {
    /// The drawing the command targets.
    pub fn target(&self) -> DrawingId {
        match self {
            Self::Rename { id, .. }
            | Self::Resize { id, .. }
            | Self::Clone { id }
            | Self::Clear { id }
            | Self::Delete { id }
            | Self::Unpin { id } => *id,
        }
    }

    /// Short human-readable label, for logs.
    pub fn describe(&self) -> String {
        match self {
            Self::Rename { name, .. } => format!("Rename to {name:?}"),
            Self::Resize { width, height, .. } => format!("Resize to {width}x{height}"),
            Self::Clone { .. } => "Clone".into(),
            Self::Clear { .. } => "Clear".into(),
            Self::Delete { .. } => "Delete".into(),
            Self::Unpin { .. } => "Unpin".into(),
        }
    }
}
