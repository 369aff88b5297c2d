//! Live room management.
//!
//! Each open map is owned by exactly one room actor; the registry spawns
//! rooms on first join and evicts them when the last session leaves.

pub mod registry;
pub mod room;

pub use registry::RoomRegistry;
pub use room::{JoinAccepted, RoomHandle};
