pub mod commands;
pub mod input;
pub mod session;
pub mod stroke;

pub use commands::DrawingCommand;
pub use input::InputEvent;
pub use session::{LoadTicket, Session, SessionConfig};
pub use stroke::{StrokeEffect, StrokeEngine, StrokeState, StrokeTarget, ToolMode};
