//! WASM bridge for Exquisite: exposes the editing session to JavaScript.
//!
//! Compiled via `wasm-pack build --target web`. The page owns the DOM:
//! it decodes images, blits RGBA bytes into canvases and positions them
//! with the CSS matrices returned by `placements_json`. Everything
//! stateful happens here.
//!
//! Drawing ids cross the boundary as plain strings. Brush ids use the
//! forms `color`, `drawing:<id>` and `brush:<key>`.

use exq_core::codec::{decode_data_url, decode_image};
use exq_core::{
    BrushId, BrushKey, Color, ColorSource, DrawingId, EngineError, PixelBuffer, Point, Project,
};
use exq_editor::{DrawingCommand, InputEvent, LoadTicket, Session, StrokeEffect, ToolMode};
use wasm_bindgen::prelude::*;

/// The main WASM-facing controller.
///
/// Holds the session and the most recent load ticket. All interaction
/// from the page goes through this struct.
#[wasm_bindgen]
pub struct ExqCanvas {
    session: Session,
    /// Decodes the page still has to perform.
    ticket: LoadTicket,
}

impl Default for ExqCanvas {
    fn default() -> Self {
        Self::new()
    }
}

#[wasm_bindgen]
impl ExqCanvas {
    #[wasm_bindgen(constructor)]
    pub fn new() -> Self {
        console_error_panic_hook_setup();
        Self {
            session: Session::default(),
            ticket: LoadTicket {
                generation: 0,
                pending: Vec::new(),
            },
        }
    }

    // ─── Project ─────────────────────────────────────────────────────────

    /// Replace the session's project with an exported JSON document.
    /// Returns `false` (and keeps the old project) on malformed JSON.
    pub fn open_project(&mut self, json: &str) -> bool {
        match Project::from_json(json) {
            Ok(project) => {
                self.ticket = self.session.open(project);
                true
            }
            Err(e) => {
                log::warn!("open_project: {e}");
                false
            }
        }
    }

    /// Add the new drawings of another exported project.
    pub fn merge_project(&mut self, json: &str) -> bool {
        match Project::from_json(json) {
            Ok(project) => {
                let ticket = self.session.merge_project(project);
                self.queue(ticket);
                true
            }
            Err(e) => {
                log::warn!("merge_project: {e}");
                false
            }
        }
    }

    /// Drop every decoded buffer and request them all again.
    pub fn reload(&mut self) {
        self.ticket = self.session.begin_reload();
    }

    pub fn close_project(&mut self) {
        self.session.close();
        self.ticket = LoadTicket {
            generation: self.session.generation(),
            pending: Vec::new(),
        };
    }

    /// Serialize the project. Returns JSON `{"ok":true,"project":{...}}`
    /// or `{"ok":false,"error":"..."}`.
    pub fn export_project(&self) -> String {
        match self.session.to_json() {
            Ok(json) => format!(r#"{{"ok":true,"project":{json}}}"#),
            Err(e) => error_json(&e),
        }
    }

    /// Decodes the page must perform:
    /// `{"generation":n,"drawings":[{"id":"..","image":".."}]}`.
    pub fn pending_loads(&self) -> String {
        let drawings: Vec<serde_json::Value> = self
            .ticket
            .pending
            .iter()
            .map(|(id, image)| serde_json::json!({ "id": id.as_str(), "image": image }))
            .collect();
        serde_json::json!({
            "generation": self.ticket.generation,
            "drawings": drawings,
        })
        .to_string()
    }

    /// Hand back pixels the page decoded itself (e.g. via `getImageData`).
    pub fn finish_drawing_rgba(
        &mut self,
        generation: f64,
        id: &str,
        width: u32,
        height: u32,
        rgba: Vec<u8>,
    ) -> bool {
        let decoded = PixelBuffer::from_rgba(width, height, rgba);
        self.finish(generation, id, decoded)
    }

    /// Hand back the encoded image bytes for decoding on this side.
    pub fn finish_drawing_encoded(&mut self, generation: f64, id: &str, bytes: &[u8]) -> bool {
        self.finish(generation, id, decode_image(bytes))
    }

    /// Decode a `data:` URL image source on this side, e.g. the ones an
    /// exported project carries.
    pub fn finish_drawing_data_url(&mut self, generation: f64, id: &str, url: &str) -> bool {
        self.finish(generation, id, decode_data_url(url))
    }

    /// The page could not load a drawing's image.
    pub fn fail_drawing_load(&mut self, generation: f64, id: &str, reason: &str) -> bool {
        self.finish(generation, id, Err(EngineError::Decode(reason.to_string())))
    }

    /// Add a freshly uploaded image. Returns the new drawing id, or an
    /// empty string if the bytes don't decode.
    pub fn import_drawing(&mut self, name: &str, image: &str, bytes: &[u8]) -> String {
        match decode_image(bytes) {
            Ok(buffer) => self
                .session
                .import_drawing(name, image, buffer)
                .as_str()
                .to_string(),
            Err(e) => {
                log::warn!("import_drawing {name}: {e}");
                String::new()
            }
        }
    }

    /// Record the data URL the page produced for a drawing's pixels.
    pub fn set_drawing_image(&mut self, id: &str, image: &str) -> bool {
        self.session
            .set_drawing_image(DrawingId::intern(id), image.to_string())
            .is_ok()
    }

    // ─── Pointer input ───────────────────────────────────────────────────

    /// Returns a JSON effect: `{"stamps":n,"moved":bool,"preview":bool}`.
    pub fn pointer_down(&mut self, x: f64, y: f64) -> String {
        let effect = self.session.handle(&InputEvent::from_pointer_down(x, y));
        effect_json(effect)
    }

    pub fn pointer_move(&mut self, x: f64, y: f64) -> String {
        let effect = self.session.handle(&InputEvent::from_pointer_move(x, y));
        effect_json(effect)
    }

    /// Registered on the window, so a release outside the scene still
    /// ends the gesture.
    pub fn pointer_up(&mut self, x: f64, y: f64) -> String {
        let effect = self.session.handle(&InputEvent::from_pointer_up(x, y));
        effect_json(effect)
    }

    pub fn pointer_leave(&mut self) -> String {
        let effect = self.session.handle(&InputEvent::PointerCancel);
        effect_json(effect)
    }

    /// Wheel or pinch over the scene.
    pub fn scroll(&mut self, x: f64, y: f64, dx: f64, dy: f64, zoom: f64) -> String {
        let effect = self.session.handle(&InputEvent::Scroll { x, y, dx, dy, zoom });
        effect_json(effect)
    }

    // ─── Tool state ──────────────────────────────────────────────────────

    /// `"draw"` or `"move"`; anything else falls back to draw.
    pub fn set_mode(&mut self, name: &str) {
        let mode = match name {
            "move" => ToolMode::Move,
            _ => ToolMode::Draw,
        };
        self.session.set_mode(mode);
    }

    pub fn get_mode(&self) -> String {
        mode_to_name(self.session.mode()).to_string()
    }

    pub fn set_erase(&mut self, erase: bool) {
        self.session.set_erase(erase);
    }

    /// Set the color brush from a hex string. Returns `false` if it
    /// doesn't parse.
    pub fn set_color(&mut self, hex: &str) -> bool {
        match Color::from_hex(hex) {
            Some(color) => {
                self.session.set_color(color);
                true
            }
            None => false,
        }
    }

    /// Set the color brush from the HSV wheel. Components are in `0..=1`.
    pub fn set_color_hsv(&mut self, h: f32, s: f32, v: f32) {
        self.session.refresh_color(&WheelColor { h, s, v });
    }

    pub fn get_color(&self) -> String {
        self.session.color().to_hex()
    }

    // ─── Palette & brushes ───────────────────────────────────────────────

    /// Replace the palette. Returns the canonical text so the editor can
    /// show what was actually kept.
    pub fn set_palette_text(&mut self, text: &str) -> String {
        self.session.set_palette_text(text).to_string()
    }

    pub fn palette_text(&self) -> String {
        self.session.palette().to_text()
    }

    /// Store a palette brush's grid text. Returns its brush id.
    pub fn set_brush_text(&mut self, key: &str, text: &str) -> String {
        brush_to_name(self.session.set_brush_source(key, text))
    }

    pub fn remove_brush(&mut self, key: &str) -> bool {
        self.session.remove_brush_source(key)
    }

    pub fn select_brush(&mut self, brush: &str) -> bool {
        let Some(id) = brush_from_name(brush) else {
            return false;
        };
        match self.session.select_brush(id) {
            Ok(()) => true,
            Err(e) => {
                log::warn!("select_brush: {e}");
                false
            }
        }
    }

    pub fn active_brush(&self) -> String {
        brush_to_name(self.session.active_brush())
    }

    /// JSON array of selectable brush ids.
    pub fn brushes_json(&self) -> String {
        let names: Vec<String> = self.session.brushes().into_iter().map(brush_to_name).collect();
        serde_json::to_string(&names).unwrap_or_else(|_| "[]".to_string())
    }

    /// Brush thumbnail pixels as `width`, `height` (u32 LE) then RGBA.
    pub fn brush_rgba(&self, brush: &str) -> Vec<u8> {
        brush_from_name(brush)
            .and_then(|id| self.session.brush_buffer(id))
            .map(|buffer| sized_rgba(&buffer))
            .unwrap_or_default()
    }

    // ─── Drawing panel ───────────────────────────────────────────────────

    pub fn set_active_drawing(&mut self, id: &str) -> bool {
        self.session
            .set_active_drawing(DrawingId::intern(id))
            .is_ok()
    }

    pub fn active_drawing(&self) -> String {
        self.session
            .active_drawing()
            .map(|id| id.as_str().to_string())
            .unwrap_or_default()
    }

    pub fn rename_drawing(&mut self, id: &str, name: &str) -> bool {
        self.command(DrawingCommand::Rename {
            id: DrawingId::intern(id),
            name: name.to_string(),
        })
        .is_some()
    }

    pub fn resize_drawing(&mut self, id: &str, width: u32, height: u32) -> bool {
        self.command(DrawingCommand::Resize {
            id: DrawingId::intern(id),
            width,
            height,
        })
        .is_some()
    }

    /// Returns the clone's id, or an empty string on failure.
    pub fn clone_drawing(&mut self, id: &str) -> String {
        self.command(DrawingCommand::Clone {
            id: DrawingId::intern(id),
        })
        .flatten()
        .map(|id| id.as_str().to_string())
        .unwrap_or_default()
    }

    pub fn clear_drawing(&mut self, id: &str) -> bool {
        self.command(DrawingCommand::Clear {
            id: DrawingId::intern(id),
        })
        .is_some()
    }

    pub fn delete_drawing(&mut self, id: &str) -> bool {
        self.command(DrawingCommand::Delete {
            id: DrawingId::intern(id),
        })
        .is_some()
    }

    pub fn unpin_drawing(&mut self, id: &str) -> bool {
        self.command(DrawingCommand::Unpin {
            id: DrawingId::intern(id),
        })
        .is_some()
    }

    // ─── Pixels & placement ──────────────────────────────────────────────

    /// JSON array of available drawing ids in display order.
    pub fn drawing_ids(&self) -> String {
        let ids: Vec<&str> = self
            .session
            .surfaces()
            .iter()
            .map(|s| s.drawing().as_str())
            .collect();
        serde_json::to_string(&ids).unwrap_or_else(|_| "[]".to_string())
    }

    /// Drawing pixels as `width`, `height` (u32 LE) then RGBA. Empty if the
    /// drawing is unavailable.
    pub fn drawing_rgba(&self, id: &str) -> Vec<u8> {
        self.session
            .drawing_buffer(DrawingId::intern(id))
            .map(sized_rgba)
            .unwrap_or_default()
    }

    /// PNG bytes for download or for a data URL.
    pub fn drawing_png(&self, id: &str) -> Vec<u8> {
        match self.session.export_png(DrawingId::intern(id)) {
            Ok(png) => png,
            Err(e) => {
                log::warn!("drawing_png {id}: {e}");
                Vec::new()
            }
        }
    }

    /// Cursor preview of the active drawing, same layout as `drawing_rgba`.
    pub fn preview_rgba(&self) -> Vec<u8> {
        sized_rgba(self.session.preview())
    }

    /// `[{"id":"..","matrix":[a,b,c,d,e,f]}]`, ready for CSS `matrix()`.
    pub fn placements_json(&self) -> String {
        let placements: Vec<serde_json::Value> = self
            .session
            .surfaces()
            .iter()
            .map(|s| {
                serde_json::json!({
                    "id": s.drawing().as_str(),
                    "matrix": s.placement().coeffs(),
                })
            })
            .collect();
        serde_json::Value::Array(placements).to_string()
    }

    /// Whether a screen point is over the active drawing. Used for the
    /// cursor style.
    pub fn is_over_active(&self, x: f64, y: f64) -> bool {
        let Some(id) = self.session.active_drawing() else {
            return false;
        };
        let (Some(surface), Some(buffer)) = (self.session.surface(id), self.session.drawing_buffer(id))
        else {
            return false;
        };
        surface
            .hit(Point::new(x, y), buffer.width(), buffer.height())
            .is_some()
    }
}

// ─── Internal helpers ────────────────────────────────────────────────────

impl ExqCanvas {
    fn finish(
        &mut self,
        generation: f64,
        id: &str,
        decoded: Result<PixelBuffer, EngineError>,
    ) -> bool {
        let id = DrawingId::intern(id);
        let done = self.session.finish_load(generation as u64, id, decoded);
        if generation as u64 == self.ticket.generation {
            self.ticket.pending.retain(|(pending, _)| *pending != id);
        }
        done
    }

    /// Merge follow-up decodes into the outstanding ticket.
    fn queue(&mut self, ticket: LoadTicket) {
        if ticket.generation == self.ticket.generation {
            self.ticket.pending.extend(ticket.pending);
        } else {
            self.ticket = ticket;
        }
    }

    /// `None` on error, otherwise the command's created id (if any).
    fn command(&mut self, command: DrawingCommand) -> Option<Option<DrawingId>> {
        match self.session.apply(command) {
            Ok(created) => Some(created),
            Err(e) => {
                log::warn!("drawing command failed: {e}");
                None
            }
        }
    }
}

/// The picker wheel's current position.
struct WheelColor {
    h: f32,
    s: f32,
    v: f32,
}

impl ColorSource for WheelColor {
    fn current_color(&self) -> Color {
        Color::from_hsv(self.h, self.s, self.v)
    }
}

fn mode_to_name(mode: ToolMode) -> &'static str {
    match mode {
        ToolMode::Draw => "draw",
        ToolMode::Move => "move",
    }
}

fn brush_to_name(brush: BrushId) -> String {
    match brush {
        BrushId::ActiveColor => "color".to_string(),
        BrushId::Drawing(id) => format!("drawing:{}", id.as_str()),
        BrushId::Compiled(key) => format!("brush:{}", key.as_str()),
    }
}

fn brush_from_name(name: &str) -> Option<BrushId> {
    if name == "color" {
        return Some(BrushId::ActiveColor);
    }
    if let Some(id) = name.strip_prefix("drawing:") {
        return Some(BrushId::Drawing(DrawingId::intern(id)));
    }
    name.strip_prefix("brush:")
        .map(|key| BrushId::Compiled(BrushKey::intern(key)))
}

fn effect_json(effect: StrokeEffect) -> String {
    format!(
        r#"{{"stamps":{},"moved":{},"preview":{}}}"#,
        effect.stamps, effect.moved, effect.preview
    )
}

fn error_json(error: &EngineError) -> String {
    serde_json::json!({ "ok": false, "error": error.to_string() }).to_string()
}

fn sized_rgba(buffer: &PixelBuffer) -> Vec<u8> {
    let mut out = Vec::with_capacity(8 + buffer.as_bytes().len());
    out.extend_from_slice(&buffer.width().to_le_bytes());
    out.extend_from_slice(&buffer.height().to_le_bytes());
    out.extend_from_slice(buffer.as_bytes());
    out
}

/// Set up a panic hook that logs to the browser console.
fn console_error_panic_hook_setup() {
    #[cfg(target_arch = "wasm32")]
    {
        use std::sync::Once;
        static SET_HOOK: Once = Once::new();
        SET_HOOK.call_once(|| {
            std::panic::set_hook(Box::new(|info| {
                let msg = format!("Exquisite WASM panic: {info}");
                web_sys::console::error_1(&msg.into());
            }));
        });
    }
}

// ─── Standalone helpers (no canvas needed) ───────────────────────────────

/// Normalize palette text without a session. Returns the canonical text.
#[wasm_bindgen]
pub fn normalize_palette(text: &str) -> String {
    exq_core::Palette::parse(text).to_text()
}

/// Compile a brush grid against palette text. Returns the sized RGBA
/// layout used by `drawing_rgba`.
#[wasm_bindgen]
pub fn compile_brush_rgba(grid: &str, palette: &str) -> Vec<u8> {
    let palette = exq_core::Palette::parse(palette);
    sized_rgba(&exq_core::compile_brush(grid, &palette))
}

#[cfg(test)]
mod tests {
    use super::*;
    use exq_core::codec::encode_png;
    use pretty_assertions::assert_eq;

    fn opened(json: &str) -> (ExqCanvas, Vec<String>) {
        let mut canvas = ExqCanvas::new();
        assert!(canvas.open_project(json));
        let pending: serde_json::Value = serde_json::from_str(&canvas.pending_loads()).unwrap();
        let generation = pending["generation"].as_f64().unwrap();
        let ids: Vec<String> = pending["drawings"]
            .as_array()
            .unwrap()
            .iter()
            .map(|d| d["id"].as_str().unwrap().to_string())
            .collect();
        for id in &ids {
            assert!(canvas.finish_drawing_rgba(generation, id, 4, 4, vec![0; 64]));
        }
        (canvas, ids)
    }

    #[test]
    fn malformed_project_is_rejected() {
        let mut canvas = ExqCanvas::new();
        assert!(!canvas.open_project("{not json"));
        assert_eq!(canvas.drawing_ids(), "[]");
    }

    #[test]
    fn loads_drain_the_pending_list() {
        let (canvas, ids) =
            opened(r#"{"drawings":[{"id":"wasm_a","image":"a"},{"id":"wasm_b","image":"b"}]}"#);
        assert_eq!(ids, vec!["wasm_a", "wasm_b"]);
        assert_eq!(canvas.drawing_ids(), r#"["wasm_a","wasm_b"]"#);
        let pending: serde_json::Value = serde_json::from_str(&canvas.pending_loads()).unwrap();
        assert_eq!(pending["drawings"], serde_json::json!([]));
        assert_eq!(canvas.active_drawing(), "wasm_a");
    }

    #[test]
    fn bad_rgba_length_fails_the_load() {
        let mut canvas = ExqCanvas::new();
        canvas.open_project(r#"{"drawings":[{"id":"wasm_short","image":"x"}]}"#);
        let generation = canvas.session.generation() as f64;
        assert!(!canvas.finish_drawing_rgba(generation, "wasm_short", 4, 4, vec![0; 3]));
        assert!(canvas.drawing_rgba("wasm_short").is_empty());
    }

    #[test]
    fn stroke_reports_effect_and_pixels() {
        let (mut canvas, _) = opened(r#"{"drawings":[{"id":"wasm_stroke","image":"s"}]}"#);
        assert!(canvas.set_color("#ff0000"));
        assert_eq!(
            canvas.pointer_down(1.0, 1.0),
            r#"{"stamps":1,"moved":false,"preview":false}"#
        );
        canvas.pointer_up(1.0, 1.0);

        let rgba = canvas.drawing_rgba("wasm_stroke");
        assert_eq!(&rgba[..8], &[4, 0, 0, 0, 4, 0, 0, 0]);
        let offset = 8 + (4 + 1) * 4;
        assert_eq!(&rgba[offset..offset + 4], &[255, 0, 0, 255]);
    }

    #[test]
    fn hsv_wheel_sets_the_color_brush() {
        let mut canvas = ExqCanvas::new();
        canvas.set_color_hsv(0.5, 1.0, 1.0);
        assert_eq!(canvas.get_color(), "#00ffff");
        assert_eq!(canvas.brush_rgba("color"), vec![1, 0, 0, 0, 1, 0, 0, 0, 0, 255, 255, 255]);
        canvas.set_color_hsv(0.0, 0.0, 0.0);
        assert_eq!(canvas.get_color(), "#000000");
    }

    #[test]
    fn exported_project_reloads_with_its_pixels() {
        let (mut canvas, _) = opened(r#"{"drawings":[{"id":"wasm_rt","image":"data:stale"}]}"#);
        canvas.set_color("#0000ff");
        canvas.pointer_down(2.0, 3.0);
        canvas.pointer_up(2.0, 3.0);
        let before = canvas.drawing_rgba("wasm_rt");

        let out: serde_json::Value = serde_json::from_str(&canvas.export_project()).unwrap();
        let mut reloaded = ExqCanvas::new();
        assert!(reloaded.open_project(&out["project"].to_string()));
        let url = out["project"]["drawings"][0]["image"].as_str().unwrap();
        let generation = reloaded.session.generation() as f64;
        assert!(reloaded.finish_drawing_data_url(generation, "wasm_rt", url));
        assert_eq!(reloaded.drawing_rgba("wasm_rt"), before);
        assert!(!reloaded.finish_drawing_data_url(generation, "wasm_rt", "data:stale"));
    }

    #[test]
    fn brush_names_roundtrip() {
        let (mut canvas, _) = opened(r#"{"drawings":[{"id":"wasm_brush","image":"b"}]}"#);
        canvas.set_palette_text("r #ff0000");
        let name = canvas.set_brush_text("dot", "r");
        assert_eq!(name, "brush:dot");
        assert!(canvas.select_brush(&name));
        assert_eq!(canvas.active_brush(), "brush:dot");
        assert!(canvas.select_brush("drawing:wasm_brush"));
        assert!(!canvas.select_brush("brush:missing"));
        assert!(!canvas.select_brush("nonsense"));
        assert_eq!(
            canvas.brushes_json(),
            r#"["color","drawing:wasm_brush","brush:dot"]"#
        );
    }

    #[test]
    fn import_then_clone_and_delete() {
        let mut canvas = ExqCanvas::new();
        let png = encode_png(&PixelBuffer::solid(2, 2, Color::WHITE)).unwrap();
        let id = canvas.import_drawing("white", "data:white", &png);
        assert!(!id.is_empty());
        let copy = canvas.clone_drawing(&id);
        assert!(!copy.is_empty());
        assert_eq!(canvas.active_drawing(), copy);
        assert!(canvas.delete_drawing(&copy));
        assert_eq!(canvas.active_drawing(), id);
        assert!(!canvas.delete_drawing(&copy));
        assert_eq!(canvas.import_drawing("junk", "data:junk", b"nope"), "");
    }

    #[test]
    fn placements_follow_layout() {
        let (canvas, _) = opened(
            r#"{"drawings":[{"id":"wasm_p0","image":"0"},{"id":"wasm_p1","image":"1"}]}"#,
        );
        let placements: serde_json::Value = serde_json::from_str(&canvas.placements_json()).unwrap();
        assert_eq!(placements[1]["id"], "wasm_p1");
        assert_eq!(
            placements[1]["matrix"],
            serde_json::json!([1.0, 0.0, 0.0, 1.0, 20.0, 0.0])
        );
    }

    #[test]
    fn export_wraps_project_json() {
        let (canvas, _) = opened(r#"{"drawings":[{"id":"wasm_e","image":"e"}],"title":"zine"}"#);
        let out: serde_json::Value = serde_json::from_str(&canvas.export_project()).unwrap();
        assert_eq!(out["ok"], true);
        assert_eq!(out["project"]["title"], "zine");
        assert_eq!(out["project"]["drawings"][0]["id"], "wasm_e");
    }

    #[test]
    fn standalone_palette_normalization() {
        assert_eq!(normalize_palette("a #FF0000\nbroken\n"), "a #ff0000");
        let rgba = compile_brush_rgba("a", "a #00ff00");
        assert_eq!(rgba, vec![1, 0, 0, 0, 1, 0, 0, 0, 0, 255, 0, 255]);
    }
}
