//! Database repositories.
//!
//! Each repository is a stateless unit struct whose methods take a pool (or
//! transaction) explicitly.

pub mod map_repo;
pub mod overlay_repo;

pub use map_repo::MapRepo;
pub use overlay_repo::OverlayRepo;
