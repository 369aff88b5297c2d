use crate::types::{MapId, NodeId};

/// Domain-level error taxonomy.
///
/// Validation errors are resolved at the room boundary and surfaced only to
/// the requesting client; they never reach other room subscribers.
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Map not found: {0}")]
    MapNotFound(MapId),

    #[error("Node not found: {0}")]
    NodeNotFound(NodeId),

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Persistence failure: {0}")]
    Persistence(String),
}
