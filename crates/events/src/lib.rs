//! Publish/subscribe primitives for the collaboration engine.
//!
//! Two channel flavors cover every state slice in the system:
//!
//! - [`StateChannel`]: replay-last-value semantics. Subscribers receive the
//!   current value immediately and every subsequent change. Used for local
//!   state slices (overlay collections, connection status, edit mode).
//! - [`Fanout`]: ordered broadcast without replay. Used for room message
//!   fan-out, where subscribers must see changes in apply order and join
//!   with an explicit snapshot instead of a replayed value.

pub mod bus;
pub mod channel;

pub use bus::Fanout;
pub use channel::StateChannel;
