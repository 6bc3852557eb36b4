//! Left-to-right scene layout with a shared zoom/pan view.
//!
//! Each surface is placed at `view × translate(slot_x, 0)`, where `slot_x`
//! accumulates the widths of the drawings before it plus a fixed gap. A
//! drawing that was dragged carries a pinned position that replaces its
//! slot. Layout is a pure function of its inputs, so arranging twice
//! without an intervening mutation yields identical placements.

use crate::affine::AffineTransform;
use crate::error::EngineError;
use crate::surface::DrawingSurface;
use kurbo::{Point, Vec2};

/// Layout tunables.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LayoutConfig {
    /// Horizontal gap between consecutive drawings, in scene units.
    pub gap: f64,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self { gap: 16.0 }
    }
}

/// Bounds on the view's uniform zoom factor. Keeping the zoom strictly
/// positive keeps the view invertible.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ZoomLimits {
    pub min: f64,
    pub max: f64,
}

impl Default for ZoomLimits {
    fn default() -> Self {
        Self {
            min: 0.125,
            max: 64.0,
        }
    }
}

/// Per-surface input to a layout pass.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LayoutItem {
    pub width: u32,
    /// Position (before the view transform) overriding the slot.
    pub pinned: Option<(f64, f64)>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SceneLayout {
    config: LayoutConfig,
    limits: ZoomLimits,
    view: AffineTransform,
    zoom: f64,
}

impl Default for SceneLayout {
    fn default() -> Self {
        Self::new(LayoutConfig::default(), ZoomLimits::default())
    }
}

impl SceneLayout {
    pub fn new(config: LayoutConfig, limits: ZoomLimits) -> Self {
        Self {
            config,
            limits,
            view: AffineTransform::identity(),
            zoom: 1.0,
        }
    }

    pub fn config(&self) -> LayoutConfig {
        self.config
    }

    /// The shared scene view (zoom/pan), applied after each slot offset.
    pub fn view(&self) -> AffineTransform {
        self.view
    }

    pub fn zoom(&self) -> f64 {
        self.zoom
    }

    /// Replace the view. Degenerate views are rejected.
    pub fn set_view(&mut self, view: AffineTransform) -> Result<(), EngineError> {
        view.invert()?;
        self.view = view;
        self.zoom = view.determinant().abs().sqrt();
        Ok(())
    }

    /// Multiply the zoom by `factor`, keeping the screen point `anchor` fixed.
    /// Returns the factor actually applied after clamping.
    pub fn zoom_at(&mut self, factor: f64, anchor: Point) -> f64 {
        if !factor.is_finite() || factor <= 0.0 {
            return 1.0;
        }
        let target = (self.zoom * factor).clamp(self.limits.min, self.limits.max);
        let applied = target / self.zoom;
        self.view = AffineTransform::translation(anchor.x, anchor.y)
            .scale(applied, applied)
            .translate(-anchor.x, -anchor.y)
            .multiply(self.view);
        self.zoom = target;
        log::debug!("scene zoom {target:.3} at ({:.1}, {:.1})", anchor.x, anchor.y);
        applied
    }

    /// Shift the whole scene in screen space.
    pub fn pan(&mut self, delta: Vec2) {
        self.view = AffineTransform::translation(delta.x, delta.y).multiply(self.view);
    }

    /// Compute placements for drawings in display order.
    pub fn place(&self, items: &[LayoutItem]) -> Vec<AffineTransform> {
        let mut slot_x = 0.0;
        items
            .iter()
            .map(|item| {
                let (x, y) = item.pinned.unwrap_or((slot_x, 0.0));
                slot_x += item.width as f64 + self.config.gap;
                self.view.translate(x, y)
            })
            .collect()
    }

    /// Recompute every surface's placement. `items[i]` describes
    /// `surfaces[i]`.
    pub fn arrange(&self, surfaces: &mut [DrawingSurface], items: &[LayoutItem]) {
        debug_assert_eq!(surfaces.len(), items.len());
        for (surface, placement) in surfaces.iter_mut().zip(self.place(items)) {
            surface.set_placement(placement);
        }
        log::debug!("arranged {} surfaces", surfaces.len());
    }

    /// The pre-view position that reproduces `placement`. Used to pin a
    /// dragged surface so later layout passes keep it where it was dropped.
    pub fn pin_for(&self, placement: AffineTransform) -> Option<(f64, f64)> {
        let local = self.view.invert().ok()?.multiply(placement).offset();
        Some((local.x, local.y))
    }
}
