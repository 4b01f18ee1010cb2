//! WebSocket surface for live prediction sessions.

mod connections;
mod handler;

pub use connections::{ConnectionManager, Session, SessionId};
pub use handler::ws_handler;
