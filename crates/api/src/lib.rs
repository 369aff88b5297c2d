//! Collaborative map server library.
//!
//! Exposes the building blocks (config, state, error handling, routes, room
//! actors, WebSocket transport) so integration tests and the binary
//! entrypoint can both access them.

pub mod background;
pub mod config;
pub mod error;
pub mod response;
pub mod rooms;
pub mod router;
pub mod routes;
pub mod state;
pub mod ws;
