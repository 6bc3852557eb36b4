//! The project document: drawings, palette text, brush sources, metadata.
//!
//! This is the state that gets serialized wholesale on export. Decoded
//! pixels are not part of it; each drawing keeps its encoded `image`
//! source (a data URL in the browser) and the session holds the decoded
//! buffers separately.

use crate::error::EngineError;
use crate::id::DrawingId;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Drawing {
    #[serde(default = "DrawingId::fresh")]
    pub id: DrawingId,
    #[serde(default)]
    pub name: String,
    /// Encoded image source, opaque to the engine.
    #[serde(default)]
    pub image: String,
    /// Pinned scene position set by dragging; `None` means "use the
    /// layout slot".
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<(f64, f64)>,
}

impl Drawing {
    pub fn new(name: impl Into<String>, image: impl Into<String>) -> Self {
        Self {
            id: DrawingId::fresh(),
            name: name.into(),
            image: image.into(),
            position: None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Project {
    /// Display (and z) order.
    #[serde(default)]
    pub drawings: Vec<Drawing>,
    /// Palette text, `<char> <hex>` per line.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub palette: String,
    /// Palette-brush grid text keyed by brush id.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub brushes: BTreeMap<String, String>,
    /// Any other top-level keys, carried through untouched.
    #[serde(flatten)]
    pub metadata: serde_json::Map<String, serde_json::Value>,
}

impl Project {
    pub fn from_json(json: &str) -> Result<Self, EngineError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn to_json(&self) -> Result<String, EngineError> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn index_of(&self, id: DrawingId) -> Option<usize> {
        self.drawings.iter().position(|d| d.id == id)
    }

    pub fn drawing(&self, id: DrawingId) -> Option<&Drawing> {
        self.drawings.iter().find(|d| d.id == id)
    }

    pub fn drawing_mut(&mut self, id: DrawingId) -> Option<&mut Drawing> {
        self.drawings.iter_mut().find(|d| d.id == id)
    }

    /// Append the drawings of another project whose image source is not
    /// already present. Returns the ids that were added.
    pub fn merge_drawings(&mut self, other: Project) -> Vec<DrawingId> {
        let existing: HashSet<String> = self.drawings.iter().map(|d| d.image.clone()).collect();
        let mut added = Vec::new();
        for mut drawing in other.drawings {
            if existing.contains(&drawing.image) {
                continue;
            }
            if self.index_of(drawing.id).is_some() {
                drawing.id = DrawingId::fresh();
            }
            added.push(drawing.id);
            self.drawings.push(drawing);
        }
        added
    }
}
