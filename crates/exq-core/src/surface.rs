//! Drawing surfaces: a drawing paired with its placement in scene space.
//!
//! The inverse placement is cached and refreshed together with the
//! placement, so the stroke hot path never inverts a matrix. A degenerate
//! placement caches `None`, which every hit-test reads as a miss.

use crate::affine::AffineTransform;
use crate::id::DrawingId;
use kurbo::Point;

/// What the interactive engine may do with a surface's placement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SurfaceCapability {
    /// Placement is owned by the layout only; the surface can't be dragged.
    Fixed,
    /// Full affine placement, draggable in move mode.
    #[default]
    Transformable,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DrawingSurface {
    drawing: DrawingId,
    placement: AffineTransform,
    inverse: Option<AffineTransform>,
    capability: SurfaceCapability,
}

impl DrawingSurface {
    pub fn new(drawing: DrawingId, placement: AffineTransform, capability: SurfaceCapability) -> Self {
        Self {
            drawing,
            placement,
            inverse: placement.invert().ok(),
            capability,
        }
    }

    pub fn drawing(&self) -> DrawingId {
        self.drawing
    }

    pub fn placement(&self) -> AffineTransform {
        self.placement
    }

    /// Cached inverse, `None` while the placement is degenerate.
    pub fn inverse(&self) -> Option<AffineTransform> {
        self.inverse
    }

    pub fn capability(&self) -> SurfaceCapability {
        self.capability
    }

    pub fn is_transformable(&self) -> bool {
        self.capability == SurfaceCapability::Transformable
    }

    /// Replace placement and cached inverse together.
    pub fn set_placement(&mut self, placement: AffineTransform) {
        self.placement = placement;
        self.inverse = placement.invert().ok();
        if self.inverse.is_none() {
            log::debug!("surface {} has a degenerate placement", self.drawing);
        }
    }

    /// Map a scene point into local pixel space. `None` means "no hit".
    pub fn scene_to_local(&self, scene: Point) -> Option<Point> {
        self.inverse.map(|inv| inv.transform_point(scene))
    }

    pub fn local_to_scene(&self, local: Point) -> Point {
        self.placement.transform_point(local)
    }

    /// Local point under `scene` when it falls inside a `width × height`
    /// drawing.
    pub fn hit(&self, scene: Point, width: u32, height: u32) -> Option<Point> {
        let local = self.scene_to_local(scene)?;
        let inside =
            local.x >= 0.0 && local.y >= 0.0 && local.x < width as f64 && local.y < height as f64;
        inside.then_some(local)
    }
}
