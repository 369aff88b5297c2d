//! WebSocket transport: one connection per client, one joined room at a
//! time.

pub mod handler;

pub use handler::ws_handler;
