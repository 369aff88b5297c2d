//! Domain core for the collaborative map engine.
//!
//! This crate has zero internal dependencies and no async runtime (the one
//! exception being the [`storage::MapStorage`] trait, which is async so the
//! persistence layer can implement it against a connection pool). Everything
//! here is pure state and validation: the node tree, the diff engine, the
//! undo/redo history, the overlay store, the wire protocol, and the
//! client-side reconciliation contract.

pub mod access;
pub mod diff;
pub mod error;
pub mod history;
pub mod map;
pub mod node;
pub mod overlay;
pub mod protocol;
pub mod reconcile;
pub mod storage;
pub mod transform;
pub mod types;
