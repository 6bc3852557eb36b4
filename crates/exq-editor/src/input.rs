//! Input abstraction layer.
//!
//! Normalizes mouse, touch, and pen events from whatever windowing layer
//! hosts the editor into one `InputEvent` enum. Coordinates are screen
//! (scene container) pixels.

#[derive(Debug, Clone, PartialEq)]
pub enum InputEvent {
    /// Pointer pressed on the scene.
    PointerDown { x: f64, y: f64 },

    /// Pointer moved anywhere in the window, pressed or not.
    PointerMove { x: f64, y: f64 },

    /// Pointer released anywhere in the window.
    PointerUp { x: f64, y: f64 },

    /// Pointer left the window or the gesture was cancelled. Treated as up.
    PointerCancel,

    /// Scroll / pinch over the scene.
    Scroll {
        x: f64,
        y: f64,
        dx: f64,
        dy: f64,
        /// Zoom factor (1.0 = no change; >1 = zoom in).
        zoom: f64,
    },
}

impl InputEvent {
    pub fn from_pointer_down(x: f64, y: f64) -> Self {
        Self::PointerDown { x, y }
    }

    pub fn from_pointer_move(x: f64, y: f64) -> Self {
        Self::PointerMove { x, y }
    }

    pub fn from_pointer_up(x: f64, y: f64) -> Self {
        Self::PointerUp { x, y }
    }
}
