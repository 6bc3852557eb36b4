//! The editing session: one explicit context for everything the tool is
//! currently working on.
//!
//! A `Session` owns the open project, the decoded pixel buffers, the
//! surfaces laid out in the scene, the stroke engine, and the active
//! drawing/brush selection. It is created empty, populated by `open`, and
//! torn down by `close` (or by opening another project).
//!
//! Image decoding happens outside the engine. `open` and `begin_reload`
//! hand out a `LoadTicket`; each decoded buffer comes back through
//! `finish_load` tagged with the ticket's generation, and completions from
//! an older generation are dropped. A drawing without a decoded buffer has
//! no surface and cannot be drawn on or used as a brush.

use crate::commands::DrawingCommand;
use crate::input::InputEvent;
use crate::stroke::{StrokeEffect, StrokeEngine, StrokeState, StrokeTarget, ToolMode};
use exq_core::codec::{encode_data_url, encode_png};
use exq_core::{
    AffineTransform, BrushId, BrushKey, Color, ColorSource, Drawing, DrawingId, DrawingSurface,
    EngineError, FixedColor, LayoutConfig, LayoutItem, Palette, PixelBuffer, Point, Project,
    SceneLayout, SurfaceCapability, Vec2, ZoomLimits, active_color_brush, compile_brush,
};
use std::collections::HashMap;

/// Session tunables.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct SessionConfig {
    pub layout: LayoutConfig,
    pub zoom: ZoomLimits,
    /// Whether surfaces may be dragged in move mode.
    pub capability: SurfaceCapability,
}

/// Image decodes the host must perform for one load generation.
#[derive(Debug, Clone, PartialEq)]
pub struct LoadTicket {
    pub generation: u64,
    /// Drawing id and its encoded image source, in display order.
    pub pending: Vec<(DrawingId, String)>,
}

#[derive(Debug)]
pub struct Session {
    config: SessionConfig,
    project: Project,
    palette: Palette,
    buffers: HashMap<DrawingId, PixelBuffer>,
    /// One per drawing with a decoded buffer, in project order.
    surfaces: Vec<DrawingSurface>,
    layout: SceneLayout,
    engine: StrokeEngine,
    active_drawing: Option<DrawingId>,
    active_brush: BrushId,
    /// Snapshot of the active brush's pixels.
    stamp: PixelBuffer,
    color: Color,
    generation: u64,
}

impl Default for Session {
    fn default() -> Self {
        Self::new(SessionConfig::default())
    }
}

impl Session {
    pub fn new(config: SessionConfig) -> Self {
        Self {
            config,
            project: Project::default(),
            palette: Palette::new(),
            buffers: HashMap::new(),
            surfaces: Vec::new(),
            layout: SceneLayout::new(config.layout, config.zoom),
            engine: StrokeEngine::new(),
            active_drawing: None,
            active_brush: BrushId::ActiveColor,
            stamp: active_color_brush(&FixedColor(Color::BLACK)),
            color: Color::BLACK,
            generation: 0,
        }
    }

    // ─── Lifecycle ───────────────────────────────────────────────────────

    /// Replace the current project. Every drawing starts unavailable until
    /// its decoded buffer arrives through `finish_load`.
    pub fn open(&mut self, project: Project) -> LoadTicket {
        self.close();
        self.palette = Palette::parse(&project.palette);
        self.project = project;
        self.project.palette = self.palette.to_text();
        log::debug!(
            "opened project with {} drawings, {} palette entries",
            self.project.drawings.len(),
            self.palette.len()
        );
        self.ticket_for_all()
    }

    /// Drop the project and everything derived from it. Loads still in
    /// flight are invalidated.
    pub fn close(&mut self) {
        self.engine.pointer_up();
        self.engine.fit_preview(1, 1);
        self.project = Project::default();
        self.palette = Palette::new();
        self.buffers.clear();
        self.surfaces.clear();
        self.active_drawing = None;
        self.active_brush = BrushId::ActiveColor;
        self.refresh_stamp();
        self.generation += 1;
    }

    /// Forget all decoded buffers and request every drawing again.
    pub fn begin_reload(&mut self) -> LoadTicket {
        self.engine.pointer_up();
        self.buffers.clear();
        self.surfaces.clear();
        self.active_drawing = None;
        self.refresh_stamp();
        self.ticket_for_all()
    }

    fn ticket_for_all(&mut self) -> LoadTicket {
        self.generation += 1;
        LoadTicket {
            generation: self.generation,
            pending: self
                .project
                .drawings
                .iter()
                .map(|d| (d.id, d.image.clone()))
                .collect(),
        }
    }

    /// Current load generation.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Deliver one decode result. Returns `true` when the drawing became
    /// available; stale, unknown and failed loads are dropped.
    pub fn finish_load(
        &mut self,
        generation: u64,
        id: DrawingId,
        decoded: Result<PixelBuffer, EngineError>,
    ) -> bool {
        if generation != self.generation {
            log::warn!(
                "dropping stale load of {id} (generation {generation}, current {})",
                self.generation
            );
            return false;
        }
        if self.project.drawing(id).is_none() {
            log::warn!("dropping load of removed drawing {id}");
            return false;
        }
        let buffer = match decoded {
            Ok(buffer) => buffer,
            Err(err) => {
                log::warn!("drawing {id} unavailable: {err}");
                return false;
            }
        };

        self.buffers.insert(id, buffer);
        self.rebuild_surfaces();
        if self.active_drawing.is_none()
            && let Some(first) = self.first_available()
        {
            self.activate(first);
        }
        if self.active_brush == BrushId::Drawing(id) {
            self.refresh_stamp();
        }
        true
    }

    /// Add an already decoded drawing at the end and make it active.
    pub fn import_drawing(
        &mut self,
        name: impl Into<String>,
        image: impl Into<String>,
        buffer: PixelBuffer,
    ) -> DrawingId {
        let drawing = Drawing::new(name, image);
        let id = drawing.id;
        self.project.drawings.push(drawing);
        self.buffers.insert(id, buffer);
        self.rebuild_surfaces();
        self.activate(id);
        id
    }

    /// Append the drawings of another exported project that are not
    /// already here. The returned ticket covers only the new drawings.
    pub fn merge_project(&mut self, other: Project) -> LoadTicket {
        let added = self.project.merge_drawings(other);
        LoadTicket {
            generation: self.generation,
            pending: added
                .into_iter()
                .filter_map(|id| self.project.drawing(id).map(|d| (id, d.image.clone())))
                .collect(),
        }
    }

    // ─── Queries ─────────────────────────────────────────────────────────

    pub fn project(&self) -> &Project {
        &self.project
    }

    /// Serialize the project document. Every available drawing's `image`
    /// is re-encoded from its current pixels, so edits are part of the
    /// export; unavailable drawings keep their original source.
    pub fn to_json(&self) -> Result<String, EngineError> {
        let mut project = self.project.clone();
        for drawing in &mut project.drawings {
            if let Some(buffer) = self.buffers.get(&drawing.id) {
                drawing.image = encode_data_url(buffer)?;
            }
        }
        project.to_json()
    }

    pub fn surfaces(&self) -> &[DrawingSurface] {
        &self.surfaces
    }

    pub fn surface(&self, id: DrawingId) -> Option<&DrawingSurface> {
        self.surfaces.iter().find(|s| s.drawing() == id)
    }

    pub fn is_available(&self, id: DrawingId) -> bool {
        self.buffers.contains_key(&id)
    }

    pub fn drawing_buffer(&self, id: DrawingId) -> Option<&PixelBuffer> {
        self.buffers.get(&id)
    }

    /// The drawing's current pixels as PNG bytes.
    pub fn export_png(&self, id: DrawingId) -> Result<Vec<u8>, EngineError> {
        let buffer = self
            .buffers
            .get(&id)
            .ok_or(EngineError::UnknownDrawing(id))?;
        encode_png(buffer)
    }

    /// Record a new encoded source for a drawing (e.g. before export).
    pub fn set_drawing_image(&mut self, id: DrawingId, image: String) -> Result<(), EngineError> {
        let drawing = self
            .project
            .drawing_mut(id)
            .ok_or(EngineError::UnknownDrawing(id))?;
        drawing.image = image;
        Ok(())
    }

    pub fn layout(&self) -> &SceneLayout {
        &self.layout
    }

    pub fn preview(&self) -> &PixelBuffer {
        self.engine.preview()
    }

    pub fn stroke_state(&self) -> StrokeState {
        self.engine.state()
    }

    pub fn active_drawing(&self) -> Option<DrawingId> {
        self.active_drawing
    }

    fn first_available(&self) -> Option<DrawingId> {
        self.surfaces.first().map(DrawingSurface::drawing)
    }

    // ─── Active drawing ──────────────────────────────────────────────────

    /// Make a drawing the target of strokes and drags.
    pub fn set_active_drawing(&mut self, id: DrawingId) -> Result<(), EngineError> {
        if !self.buffers.contains_key(&id) {
            return Err(EngineError::UnknownDrawing(id));
        }
        self.activate(id);
        Ok(())
    }

    fn activate(&mut self, id: DrawingId) {
        self.engine.pointer_up();
        self.active_drawing = Some(id);
        if let Some(buffer) = self.buffers.get(&id) {
            self.engine.fit_preview(buffer.width(), buffer.height());
        }
        log::debug!("active drawing {id}");
    }

    // ─── Brushes ─────────────────────────────────────────────────────────

    pub fn active_brush(&self) -> BrushId {
        self.active_brush
    }

    /// The pixels the next stamp will use.
    pub fn brush_stamp(&self) -> &PixelBuffer {
        &self.stamp
    }

    /// Every selectable brush: the color brush, available drawings in
    /// display order, then palette brushes by key.
    pub fn brushes(&self) -> Vec<BrushId> {
        std::iter::once(BrushId::ActiveColor)
            .chain(self.surfaces.iter().map(|s| BrushId::Drawing(s.drawing())))
            .chain(
                self.project
                    .brushes
                    .keys()
                    .map(|key| BrushId::Compiled(BrushKey::intern(key))),
            )
            .collect()
    }

    /// Pixels of any brush, e.g. for a toggle thumbnail.
    pub fn brush_buffer(&self, brush: BrushId) -> Option<PixelBuffer> {
        match brush {
            BrushId::ActiveColor => Some(active_color_brush(&FixedColor(self.color))),
            BrushId::Drawing(id) => self.buffers.get(&id).cloned(),
            BrushId::Compiled(key) => self
                .project
                .brushes
                .get(key.as_str())
                .map(|text| compile_brush(text, &self.palette)),
        }
    }

    pub fn select_brush(&mut self, brush: BrushId) -> Result<(), EngineError> {
        match brush {
            BrushId::ActiveColor => {}
            BrushId::Drawing(id) => {
                if !self.buffers.contains_key(&id) {
                    return Err(EngineError::UnknownDrawing(id));
                }
            }
            BrushId::Compiled(key) => {
                if !self.project.brushes.contains_key(key.as_str()) {
                    return Err(EngineError::UnknownBrush(key.as_str().to_string()));
                }
            }
        }
        self.active_brush = brush;
        self.refresh_stamp();
        log::debug!("active brush {brush:?}");
        Ok(())
    }

    pub fn color(&self) -> Color {
        self.color
    }

    /// Set the color of the synthetic color brush.
    pub fn set_color(&mut self, color: Color) {
        self.color = color;
        if self.active_brush == BrushId::ActiveColor {
            self.refresh_stamp();
        }
    }

    /// Pull the current color from the picker.
    pub fn refresh_color(&mut self, source: &(impl ColorSource + ?Sized)) {
        self.set_color(source.current_color());
    }

    pub fn palette(&self) -> &Palette {
        &self.palette
    }

    /// Replace the palette from editor text. Returns the canonical text.
    pub fn set_palette_text(&mut self, text: &str) -> &str {
        self.palette = Palette::parse(text);
        self.project.palette = self.palette.to_text();
        if matches!(self.active_brush, BrushId::Compiled(_)) {
            self.refresh_stamp();
        }
        &self.project.palette
    }

    /// Store (or replace) a palette brush's grid text.
    pub fn set_brush_source(&mut self, key: &str, text: &str) -> BrushId {
        self.project.brushes.insert(key.to_string(), text.to_string());
        let brush = BrushId::Compiled(BrushKey::intern(key));
        if self.active_brush == brush {
            self.refresh_stamp();
        }
        brush
    }

    pub fn remove_brush_source(&mut self, key: &str) -> bool {
        let removed = self.project.brushes.remove(key).is_some();
        if removed && self.active_brush == BrushId::Compiled(BrushKey::intern(key)) {
            self.active_brush = BrushId::ActiveColor;
            self.refresh_stamp();
        }
        removed
    }

    /// Rebuild the stamp snapshot. An unavailable brush stamps nothing.
    fn refresh_stamp(&mut self) {
        self.stamp = self
            .brush_buffer(self.active_brush)
            .unwrap_or_else(|| PixelBuffer::new(1, 1));
    }

    // ─── Tool state ──────────────────────────────────────────────────────

    pub fn mode(&self) -> ToolMode {
        self.engine.mode()
    }

    pub fn set_mode(&mut self, mode: ToolMode) {
        self.engine.set_mode(mode);
    }

    pub fn erase(&self) -> bool {
        self.engine.erase()
    }

    pub fn set_erase(&mut self, erase: bool) {
        self.engine.set_erase(erase);
    }

    // ─── Pointer input ───────────────────────────────────────────────────

    /// Dispatch a normalized input event.
    pub fn handle(&mut self, event: &InputEvent) -> StrokeEffect {
        match *event {
            InputEvent::PointerDown { x, y } => self.pointer_down(Point::new(x, y)),
            InputEvent::PointerMove { x, y } => self.pointer_move(Point::new(x, y)),
            InputEvent::PointerUp { .. } => {
                self.pointer_up();
                StrokeEffect::default()
            }
            InputEvent::PointerCancel => {
                let preview = self.engine.cancel();
                StrokeEffect {
                    preview,
                    ..StrokeEffect::default()
                }
            }
            InputEvent::Scroll {
                x,
                y,
                dx,
                dy,
                zoom,
            } => {
                if zoom != 1.0 {
                    self.zoom_scene(zoom, Point::new(x, y));
                }
                if dx != 0.0 || dy != 0.0 {
                    self.pan_scene(Vec2::new(-dx, -dy));
                }
                StrokeEffect {
                    moved: true,
                    ..StrokeEffect::default()
                }
            }
        }
    }

    /// Press at a screen point. The topmost surface under the pointer
    /// becomes active before the stroke or drag starts.
    pub fn pointer_down(&mut self, screen: Point) -> StrokeEffect {
        if let Some(hit) = self.topmost_hit(screen)
            && Some(hit) != self.active_drawing
        {
            self.activate(hit);
        }
        // Drawing brushes pick up the latest pixels at every stroke start.
        if matches!(self.active_brush, BrushId::Drawing(_)) {
            self.refresh_stamp();
        }
        match self.active_target() {
            Some((engine, target)) => engine.pointer_down(screen, target),
            None => StrokeEffect::default(),
        }
    }

    pub fn pointer_move(&mut self, screen: Point) -> StrokeEffect {
        let effect = match self.active_target() {
            Some((engine, target)) => engine.pointer_move(screen, target),
            None => StrokeEffect::default(),
        };
        if effect.moved {
            self.pin_active();
        }
        effect
    }

    /// Release. Also the right call for a pointer-up seen anywhere in the
    /// window, since the host listens above the individual surface.
    pub fn pointer_up(&mut self) -> bool {
        self.engine.pointer_up()
    }

    /// Pointer left the window.
    pub fn pointer_cancel(&mut self) -> bool {
        self.engine.cancel()
    }

    fn topmost_hit(&self, screen: Point) -> Option<DrawingId> {
        self.surfaces.iter().rev().find_map(|surface| {
            let buffer = self.buffers.get(&surface.drawing())?;
            surface
                .hit(screen, buffer.width(), buffer.height())
                .map(|_| surface.drawing())
        })
    }

    fn active_target(&mut self) -> Option<(&mut StrokeEngine, StrokeTarget<'_>)> {
        let id = self.active_drawing?;
        let surface = self.surfaces.iter_mut().find(|s| s.drawing() == id)?;
        let buffer = self.buffers.get_mut(&id)?;
        Some((
            &mut self.engine,
            StrokeTarget {
                surface,
                buffer,
                brush: &self.stamp,
            },
        ))
    }

    /// Persist a dragged placement as the drawing's pinned position.
    fn pin_active(&mut self) {
        let Some(id) = self.active_drawing else {
            return;
        };
        let Some(placement) = self.surface(id).map(DrawingSurface::placement) else {
            return;
        };
        let pin = self.layout.pin_for(placement);
        if let Some(drawing) = self.project.drawing_mut(id) {
            drawing.position = pin;
        }
    }

    // ─── Scene view ──────────────────────────────────────────────────────

    /// Zoom the scene around a screen point. Returns the applied factor.
    pub fn zoom_scene(&mut self, factor: f64, anchor: Point) -> f64 {
        let applied = self.layout.zoom_at(factor, anchor);
        self.relayout();
        applied
    }

    pub fn pan_scene(&mut self, delta: Vec2) {
        self.layout.pan(delta);
        self.relayout();
    }

    pub fn set_view(&mut self, view: AffineTransform) -> Result<(), EngineError> {
        self.layout.set_view(view)?;
        self.relayout();
        Ok(())
    }

    // ─── Drawing commands ────────────────────────────────────────────────

    /// Apply a drawing-panel command. Returns the id of a drawing the
    /// command created, if any.
    pub fn apply(&mut self, command: DrawingCommand) -> Result<Option<DrawingId>, EngineError> {
        let id = command.target();
        if self.project.drawing(id).is_none() {
            return Err(EngineError::UnknownDrawing(id));
        }
        log::debug!("{} on {id}", command.describe());

        match command {
            DrawingCommand::Rename { name, .. } => {
                if let Some(drawing) = self.project.drawing_mut(id) {
                    drawing.name = name;
                }
                Ok(None)
            }
            DrawingCommand::Resize { width, height, .. } => {
                let buffer = self
                    .buffers
                    .get_mut(&id)
                    .ok_or(EngineError::UnknownDrawing(id))?;
                let (width, height) = buffer.resize(width, height);
                self.relayout();
                if self.active_drawing == Some(id) {
                    self.engine.pointer_up();
                    self.engine.fit_preview(width, height);
                }
                if self.active_brush == BrushId::Drawing(id) {
                    self.refresh_stamp();
                }
                Ok(None)
            }
            DrawingCommand::Clone { .. } => {
                let buffer = self
                    .buffers
                    .get(&id)
                    .cloned()
                    .ok_or(EngineError::UnknownDrawing(id))?;
                let source = self.project.drawing(id).cloned();
                let (name, image) = source
                    .map(|d| (format!("{} copy", d.name), d.image))
                    .unwrap_or_default();
                Ok(Some(self.import_drawing(name, image, buffer)))
            }
            DrawingCommand::Clear { .. } => {
                let buffer = self
                    .buffers
                    .get_mut(&id)
                    .ok_or(EngineError::UnknownDrawing(id))?;
                buffer.fill(None);
                Ok(None)
            }
            DrawingCommand::Delete { .. } => {
                if let Some(index) = self.project.index_of(id) {
                    self.project.drawings.remove(index);
                }
                self.buffers.remove(&id);
                self.rebuild_surfaces();
                if self.active_drawing == Some(id) {
                    self.engine.pointer_up();
                    self.active_drawing = None;
                    match self.first_available() {
                        Some(first) => self.activate(first),
                        None => self.engine.fit_preview(1, 1),
                    }
                }
                if self.active_brush == BrushId::Drawing(id) {
                    self.active_brush = BrushId::ActiveColor;
                    self.refresh_stamp();
                }
                Ok(None)
            }
            DrawingCommand::Unpin { .. } => {
                if let Some(drawing) = self.project.drawing_mut(id) {
                    drawing.position = None;
                }
                self.relayout();
                Ok(None)
            }
        }
    }

    // ─── Layout ──────────────────────────────────────────────────────────

    fn rebuild_surfaces(&mut self) {
        let capability = self.config.capability;
        self.surfaces = self
            .project
            .drawings
            .iter()
            .filter(|d| self.buffers.contains_key(&d.id))
            .map(|d| DrawingSurface::new(d.id, AffineTransform::identity(), capability))
            .collect();
        self.relayout();
    }

    fn relayout(&mut self) {
        let items: Vec<LayoutItem> = self
            .surfaces
            .iter()
            .map(|surface| LayoutItem {
                width: self
                    .buffers
                    .get(&surface.drawing())
                    .map_or(1, PixelBuffer::width),
                pinned: self
                    .project
                    .drawing(surface.drawing())
                    .and_then(|d| d.position),
            })
            .collect();
        self.layout.arrange(&mut self.surfaces, &items);
    }
}
