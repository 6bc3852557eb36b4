//! Stroke engine: pointer samples → brush stamps or surface drags.
//!
//! One state machine per active surface:
//!
//! ```text
//!   draw mode:  Idle ──down──▶ Stroking ──up──▶ Idle
//!   move mode:  Idle ──down──▶ Dragging ──up──▶ Idle
//! ```
//!
//! Pointer positions arrive in screen space and are mapped into the
//! surface's pixel space through its cached inverse placement (which
//! already includes the scene view). Consecutive samples of a stroke are
//! joined by stepping along the dominant axis, so no gap wider than one
//! pixel appears at any pointer speed. Samples must be fed in the order
//! they were received.

use exq_core::raster::MAX_DIMENSION;
use exq_core::{AffineTransform, CompositeMode, DrawingSurface, PixelBuffer, Point};
use smallvec::{SmallVec, smallvec};

/// Mutually exclusive interaction modes, chosen by the UI.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ToolMode {
    #[default]
    Draw,
    Move,
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum StrokeState {
    #[default]
    Idle,
    /// Drawing; `last` is the previous sample in local pixel space.
    Stroking { last: Point },
    /// Moving the surface; `grab` is `pointer⁻¹ × placement` at grab time.
    Dragging { grab: AffineTransform },
}

/// Everything a pointer event may touch, borrowed from the session.
#[derive(Debug)]
pub struct StrokeTarget<'a> {
    pub surface: &'a mut DrawingSurface,
    pub buffer: &'a mut PixelBuffer,
    pub brush: &'a PixelBuffer,
}

/// What a pointer event changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StrokeEffect {
    /// Stamps that landed on at least one pixel of the drawing.
    pub stamps: usize,
    /// The surface placement changed.
    pub moved: bool,
    /// The cursor preview was redrawn.
    pub preview: bool,
}

impl StrokeEffect {
    pub fn changed(&self) -> bool {
        self.stamps > 0 || self.moved || self.preview
    }
}

/// Upper bound on interpolation steps for one segment.
pub const MAX_LINE_STEPS: usize = 4 * MAX_DIMENSION as usize;

/// Interpolated points from `from` to `to`, both ends included, one step
/// per pixel along the dominant axis. Segments longer than
/// `MAX_LINE_STEPS` are sampled more sparsely.
pub fn line_points(from: Point, to: Point) -> SmallVec<[Point; 32]> {
    let delta = to - from;
    let span = delta.x.abs().max(delta.y.abs()).ceil();
    if !span.is_finite() || span < 1.0 {
        return if from == to { smallvec![from] } else { smallvec![from, to] };
    }
    let steps = (span as usize).min(MAX_LINE_STEPS);
    (0..=steps)
        .map(|i| from + delta * (i as f64 / steps as f64))
        .collect()
}

/// The part of a segment inside the box `min..=max` (Liang-Barsky), or
/// `None` when it misses the box or an endpoint is not finite. Endpoints
/// already inside are returned unchanged.
fn clip_segment(from: Point, to: Point, min: Point, max: Point) -> Option<(Point, Point)> {
    if !(from.is_finite() && to.is_finite()) {
        return None;
    }
    let d = to - from;
    let (mut t0, mut t1) = (0.0_f64, 1.0_f64);
    let edges = [
        (-d.x, from.x - min.x),
        (d.x, max.x - from.x),
        (-d.y, from.y - min.y),
        (d.y, max.y - from.y),
    ];
    for (p, q) in edges {
        if p == 0.0 {
            if q < 0.0 {
                return None;
            }
        } else {
            let r = q / p;
            if p < 0.0 {
                if r > t1 {
                    return None;
                }
                t0 = t0.max(r);
            } else {
                if r < t0 {
                    return None;
                }
                t1 = t1.min(r);
            }
        }
    }
    let start = if t0 > 0.0 { from + d * t0 } else { from };
    let end = if t1 < 1.0 { from + d * t1 } else { to };
    Some((start, end))
}

#[derive(Debug, Clone)]
pub struct StrokeEngine {
    mode: ToolMode,
    erase: bool,
    state: StrokeState,
    /// Brush footprint under the hovered point, sized like the drawing.
    preview: PixelBuffer,
}

impl Default for StrokeEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl StrokeEngine {
    pub fn new() -> Self {
        Self {
            mode: ToolMode::Draw,
            erase: false,
            state: StrokeState::Idle,
            preview: PixelBuffer::new(1, 1),
        }
    }

    pub fn mode(&self) -> ToolMode {
        self.mode
    }

    /// Switch modes. Any gesture in progress ends first.
    pub fn set_mode(&mut self, mode: ToolMode) {
        if mode != self.mode {
            self.pointer_up();
            self.preview.fill(None);
            self.mode = mode;
        }
    }

    pub fn erase(&self) -> bool {
        self.erase
    }

    pub fn set_erase(&mut self, erase: bool) {
        self.erase = erase;
    }

    pub fn state(&self) -> StrokeState {
        self.state
    }

    pub fn is_active(&self) -> bool {
        self.state != StrokeState::Idle
    }

    /// Mode used for stamps into the real drawing buffer.
    pub fn composite_mode(&self) -> CompositeMode {
        if self.erase {
            CompositeMode::Erase
        } else {
            CompositeMode::Normal
        }
    }

    pub fn preview(&self) -> &PixelBuffer {
        &self.preview
    }

    /// Resize (and clear) the cursor preview to match the active drawing.
    pub fn fit_preview(&mut self, width: u32, height: u32) {
        if self.preview.size() != (width.max(1), height.max(1)) {
            self.preview = PixelBuffer::new(width, height);
        } else {
            self.preview.fill(None);
        }
    }

    pub fn clear_preview(&mut self) {
        self.preview.fill(None);
    }

    // ─── Transitions ─────────────────────────────────────────────────────

    /// Press at a screen point. Misses (outside the drawing, or a
    /// degenerate placement) leave the engine idle.
    pub fn pointer_down(&mut self, screen: Point, target: StrokeTarget<'_>) -> StrokeEffect {
        // A lost pointer-up must not leak into the next gesture.
        self.pointer_up();

        let (width, height) = target.buffer.size();
        let Some(local) = target.surface.hit(screen, width, height) else {
            return StrokeEffect::default();
        };

        match self.mode {
            ToolMode::Draw => {
                let mut effect = StrokeEffect::default();
                if target
                    .buffer
                    .stamp_centered(target.brush, local, self.composite_mode())
                    > 0
                {
                    effect.stamps = 1;
                }
                self.state = StrokeState::Stroking { last: local };
                log::debug!(
                    "stroke begin on {} at ({:.1}, {:.1})",
                    target.surface.drawing(),
                    local.x,
                    local.y
                );
                effect
            }
            ToolMode::Move => {
                if target.surface.is_transformable() {
                    let grab = AffineTransform::translation(-screen.x, -screen.y)
                        .multiply(target.surface.placement());
                    self.state = StrokeState::Dragging { grab };
                    log::debug!("drag begin on {}", target.surface.drawing());
                }
                StrokeEffect::default()
            }
        }
    }

    /// Pointer moved (pressed or hovering).
    pub fn pointer_move(&mut self, screen: Point, target: StrokeTarget<'_>) -> StrokeEffect {
        let mut effect = StrokeEffect::default();

        match self.state {
            StrokeState::Idle => {}
            StrokeState::Stroking { last } => {
                if let Some(local) = target.surface.scene_to_local(screen) {
                    let mode = self.composite_mode();
                    // Stamps can only land within one brush size of the buffer.
                    let margin = Point::new(
                        target.brush.width() as f64,
                        target.brush.height() as f64,
                    );
                    let min = Point::ZERO - margin.to_vec2();
                    let max = Point::new(
                        target.buffer.width() as f64 + margin.x,
                        target.buffer.height() as f64 + margin.y,
                    );
                    if let Some((from, to)) = clip_segment(last, local, min, max) {
                        // The first point was stamped by the previous sample.
                        for p in line_points(from, to).into_iter().skip(1) {
                            if target.buffer.stamp_centered(target.brush, p, mode) > 0 {
                                effect.stamps += 1;
                            }
                        }
                    }
                    self.state = StrokeState::Stroking { last: local };
                    log::trace!("stroke segment: {} stamps", effect.stamps);
                }
            }
            StrokeState::Dragging { grab } => {
                let placement = AffineTransform::translation(screen.x, screen.y).multiply(grab);
                target.surface.set_placement(placement);
                effect.moved = true;
            }
        }

        if self.mode == ToolMode::Draw {
            let local = target.surface.scene_to_local(screen);
            self.refresh_preview(local, target.buffer, target.brush);
            effect.preview = true;
        }
        effect
    }

    /// Release. Returns whether a gesture ended.
    pub fn pointer_up(&mut self) -> bool {
        let ended = self.is_active();
        if ended {
            log::debug!("{:?} end", self.state);
        }
        self.state = StrokeState::Idle;
        ended
    }

    /// Pointer left the window: treated as a release, and the preview goes.
    pub fn cancel(&mut self) -> bool {
        self.clear_preview();
        self.pointer_up()
    }

    /// Preview is always a normal-mode overlay, so the footprint stays
    /// visible while erasing.
    fn refresh_preview(&mut self, local: Option<Point>, buffer: &PixelBuffer, brush: &PixelBuffer) {
        if self.preview.size() != buffer.size() {
            self.preview = PixelBuffer::new(buffer.width(), buffer.height());
        } else {
            self.preview.fill(None);
        }
        let stroking = matches!(self.state, StrokeState::Stroking { .. });
        if let Some(p) = local
            && (stroking || buffer.contains_point(p))
        {
            self.preview.stamp_centered(brush, p, CompositeMode::Normal);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use exq_core::{Color, DrawingId, SurfaceCapability};
    use pretty_assertions::assert_eq;

    const INK: Color = Color::rgb(20, 30, 40);

    struct Fixture {
        surface: DrawingSurface,
        buffer: PixelBuffer,
        brush: PixelBuffer,
    }

    impl Fixture {
        fn new(width: u32, height: u32, placement: AffineTransform) -> Self {
            Self {
                surface: DrawingSurface::new(
                    DrawingId::intern("stroke_test"),
                    placement,
                    SurfaceCapability::Transformable,
                ),
                buffer: PixelBuffer::new(width, height),
                brush: PixelBuffer::solid(1, 1, INK),
            }
        }

        fn target(&mut self) -> StrokeTarget<'_> {
            StrokeTarget {
                surface: &mut self.surface,
                buffer: &mut self.buffer,
                brush: &self.brush,
            }
        }

        fn painted(&self) -> Vec<(i64, i64)> {
            let mut out = Vec::new();
            for y in 0..self.buffer.height() as i64 {
                for x in 0..self.buffer.width() as i64 {
                    if self.buffer.pixel(x, y).is_some_and(|c| c.a > 0) {
                        out.push((x, y));
                    }
                }
            }
            out
        }
    }

    // ─── Interpolation ───────────────────────────────────────────────────

    #[test]
    fn horizontal_line_hits_every_integer() {
        let xs: Vec<i64> = line_points(Point::ZERO, Point::new(10.0, 0.0))
            .iter()
            .map(|p| p.x.round() as i64)
            .collect();
        assert_eq!(xs, (0..=10).collect::<Vec<_>>());
    }

    #[test]
    fn steep_line_has_no_gaps() {
        let points = line_points(Point::new(2.0, 1.0), Point::new(5.0, 40.0));
        for pair in points.windows(2) {
            let (a, b) = (pair[0], pair[1]);
            assert!((b.x.round() - a.x.round()).abs() <= 1.0);
            assert!((b.y.round() - a.y.round()).abs() <= 1.0);
        }
        assert_eq!(points.first(), Some(&Point::new(2.0, 1.0)));
        assert_eq!(points.last(), Some(&Point::new(5.0, 40.0)));
    }

    #[test]
    fn zero_length_line_is_one_point() {
        let p = Point::new(3.0, 3.0);
        assert_eq!(line_points(p, p).as_slice(), &[p]);
    }

    #[test]
    fn huge_segments_are_bounded() {
        let points = line_points(Point::ZERO, Point::new(1e300, 0.0));
        assert_eq!(points.len(), MAX_LINE_STEPS + 1);
    }

    #[test]
    fn clipping_keeps_inside_segments_intact() {
        let (min, max) = (Point::new(-1.0, -1.0), Point::new(9.0, 9.0));
        let (a, b) = (Point::new(1.5, 2.0), Point::new(7.0, 3.25));
        assert_eq!(clip_segment(a, b, min, max), Some((a, b)));
        let (start, end) =
            clip_segment(Point::new(4.0, 4.0), Point::new(1e300, 4.0), min, max).unwrap();
        assert_eq!(start, Point::new(4.0, 4.0));
        assert!((end.x - 9.0).abs() < 1e-9 && end.y == 4.0, "{end:?}");
        assert_eq!(
            clip_segment(Point::new(20.0, 0.0), Point::new(30.0, 0.0), min, max),
            None
        );
        assert_eq!(
            clip_segment(Point::ZERO, Point::new(f64::INFINITY, 0.0), min, max),
            None
        );
    }

    // ─── Draw mode ───────────────────────────────────────────────────────

    #[test]
    fn fast_stroke_leaves_no_gaps() {
        let mut f = Fixture::new(16, 4, AffineTransform::identity());
        let mut engine = StrokeEngine::new();
        engine.pointer_down(Point::new(0.0, 0.0), f.target());
        let effect = engine.pointer_move(Point::new(10.0, 0.0), f.target());
        engine.pointer_up();

        assert_eq!(effect.stamps, 10);
        assert_eq!(f.painted(), (0..=10).map(|x| (x, 0)).collect::<Vec<_>>());
    }

    #[test]
    fn far_away_sample_stamps_only_the_visible_run() {
        let mut f = Fixture::new(8, 2, AffineTransform::identity());
        let mut engine = StrokeEngine::new();
        engine.pointer_down(Point::new(2.0, 0.0), f.target());
        let effect = engine.pointer_move(Point::new(1e300, 0.0), f.target());
        engine.pointer_up();

        assert!(effect.stamps >= 5);
        assert_eq!(f.painted(), (2..8).map(|x| (x, 0)).collect::<Vec<_>>());
    }

    #[test]
    fn stroke_maps_through_placement() {
        // Drawing shown at 4× zoom, 100px to the right.
        let placement = AffineTransform::translation(100.0, 0.0).scale(4.0, 4.0);
        let mut f = Fixture::new(8, 8, placement);
        let mut engine = StrokeEngine::new();
        engine.pointer_down(Point::new(104.0, 8.0), f.target());
        engine.pointer_move(Point::new(104.0, 20.0), f.target());
        assert_eq!(f.painted(), vec![(1, 2), (1, 3), (1, 4), (1, 5)]);
    }

    #[test]
    fn hovering_never_paints() {
        let mut f = Fixture::new(8, 8, AffineTransform::identity());
        let mut engine = StrokeEngine::new();
        let effect = engine.pointer_move(Point::new(3.0, 3.0), f.target());
        assert_eq!(effect.stamps, 0);
        assert!(f.buffer.is_transparent());
        assert_eq!(engine.preview().pixel(3, 3), Some(INK));
    }

    #[test]
    fn down_outside_drawing_stays_idle() {
        let mut f = Fixture::new(8, 8, AffineTransform::identity());
        let mut engine = StrokeEngine::new();
        engine.pointer_down(Point::new(-5.0, 3.0), f.target());
        assert_eq!(engine.state(), StrokeState::Idle);
        engine.pointer_move(Point::new(3.0, 3.0), f.target());
        assert!(f.buffer.is_transparent());
    }

    #[test]
    fn stroke_may_leave_and_reenter_the_drawing() {
        let mut f = Fixture::new(8, 1, AffineTransform::identity());
        let mut engine = StrokeEngine::new();
        engine.pointer_down(Point::new(6.0, 0.0), f.target());
        engine.pointer_move(Point::new(20.0, 0.0), f.target());
        engine.pointer_move(Point::new(0.0, 0.0), f.target());
        assert_eq!(f.painted().len(), 8);
    }

    #[test]
    fn degenerate_surface_is_never_stamped() {
        let mut f = Fixture::new(8, 8, AffineTransform::scaling(0.0, 1.0));
        let mut engine = StrokeEngine::new();
        let effect = engine.pointer_down(Point::new(1.0, 1.0), f.target());
        assert_eq!(effect, StrokeEffect::default());
        assert!(f.buffer.is_transparent());
    }

    #[test]
    fn erase_mode_only_touches_the_real_buffer() {
        let mut f = Fixture::new(4, 4, AffineTransform::identity());
        f.buffer.fill(Some(Color::WHITE));
        let mut engine = StrokeEngine::new();
        engine.set_erase(true);
        engine.pointer_down(Point::new(1.0, 1.0), f.target());
        engine.pointer_move(Point::new(2.0, 1.0), f.target());

        assert_eq!(f.buffer.pixel(1, 1), Some(Color::TRANSPARENT));
        assert_eq!(f.buffer.pixel(2, 1), Some(Color::TRANSPARENT));
        assert_eq!(f.buffer.pixel(3, 1), Some(Color::WHITE));
        // The preview still shows the brush footprint.
        assert_eq!(engine.preview().pixel(2, 1), Some(INK));
    }

    #[test]
    fn pointer_up_ends_the_stroke() {
        let mut f = Fixture::new(8, 8, AffineTransform::identity());
        let mut engine = StrokeEngine::new();
        engine.pointer_down(Point::new(1.0, 1.0), f.target());
        assert!(engine.pointer_up());
        assert!(!engine.pointer_up());
        engine.pointer_move(Point::new(6.0, 6.0), f.target());
        assert_eq!(f.painted(), vec![(1, 1)]);
    }

    #[test]
    fn cancel_acts_as_release_and_clears_preview() {
        let mut f = Fixture::new(8, 8, AffineTransform::identity());
        let mut engine = StrokeEngine::new();
        engine.pointer_down(Point::new(1.0, 1.0), f.target());
        engine.pointer_move(Point::new(2.0, 1.0), f.target());
        assert!(engine.cancel());
        assert_eq!(engine.state(), StrokeState::Idle);
        assert!(engine.preview().is_transparent());
    }

    // ─── Move mode ───────────────────────────────────────────────────────

    #[test]
    fn drag_is_anchored_to_the_grab_point() {
        let mut f = Fixture::new(10, 10, AffineTransform::translation(50.0, 50.0).scale(2.0, 2.0));
        let mut engine = StrokeEngine::new();
        engine.set_mode(ToolMode::Move);

        // Grab 6px into the drawing, which is local (3, 3).
        engine.pointer_down(Point::new(56.0, 56.0), f.target());
        let effect = engine.pointer_move(Point::new(80.0, 70.0), f.target());
        assert!(effect.moved);
        assert!(!effect.preview);

        // The grabbed local point stays under the pointer.
        let under = f.surface.scene_to_local(Point::new(80.0, 70.0)).unwrap();
        assert!((under - Point::new(3.0, 3.0)).hypot() < 1e-9);
        assert_eq!(f.surface.placement().offset().x, 74.0);
        assert_eq!(f.surface.placement().offset().y, 64.0);
        assert!(f.buffer.is_transparent());
    }

    #[test]
    fn fixed_surfaces_do_not_drag() {
        let mut f = Fixture::new(10, 10, AffineTransform::identity());
        f.surface = DrawingSurface::new(
            f.surface.drawing(),
            AffineTransform::identity(),
            SurfaceCapability::Fixed,
        );
        let mut engine = StrokeEngine::new();
        engine.set_mode(ToolMode::Move);
        engine.pointer_down(Point::new(5.0, 5.0), f.target());
        let effect = engine.pointer_move(Point::new(9.0, 9.0), f.target());
        assert!(!effect.moved);
        assert_eq!(f.surface.placement(), AffineTransform::identity());
    }

    #[test]
    fn switching_mode_ends_the_gesture() {
        let mut f = Fixture::new(10, 10, AffineTransform::identity());
        let mut engine = StrokeEngine::new();
        engine.pointer_down(Point::new(5.0, 5.0), f.target());
        engine.set_mode(ToolMode::Move);
        assert_eq!(engine.state(), StrokeState::Idle);
    }
}
