/// Maps and their child entities are keyed by UUID across the wire, the
/// database, and in-memory state.
pub type MapId = uuid::Uuid;

/// Node identifier within a map.
pub type NodeId = uuid::Uuid;

/// Server-assigned identifier of a live client connection. Carried on every
/// broadcast message so originators can suppress their own echoes.
pub type ClientId = String;

/// All timestamps are UTC.
pub type Timestamp = chrono::DateTime<chrono::Utc>;
