//! Access control: admin/guest capability derived from the per-map
//! modification secret.
//!
//! The secret is an opaque random token returned exactly once at map
//! creation and carried out-of-band (a URL fragment the browser never sends
//! on normal navigation). Presenting it on join reclaims admin capability.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::CoreError;
use crate::map::MapOptions;
use crate::protocol::ClientRequest;

/// Permission level of a room session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Capability {
    Admin,
    Guest,
}

/// Admin identity and modification secret of one map. Persisted alongside
/// the map, never serialized into public map payloads.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MapSecurity {
    pub admin_id: Uuid,
    pub modification_secret: Uuid,
}

impl MapSecurity {
    /// Generate a fresh admin identity and secret for a new map.
    pub fn generate() -> Self {
        Self {
            admin_id: Uuid::new_v4(),
            modification_secret: Uuid::new_v4(),
        }
    }

    /// Capability granted for a presented secret.
    pub fn capability_for(&self, presented: Option<Uuid>) -> Capability {
        if presented == Some(self.modification_secret) {
            Capability::Admin
        } else {
            Capability::Guest
        }
    }
}

/// Check whether a session with `capability` may perform `request` under
/// the map's current options.
///
/// Admin-only: map-wide option changes. Guests may mutate nodes and
/// connections (and drive undo/redo) only while `options.guest_write` is
/// enabled. Joining, selection relays, and leaving are always allowed.
pub fn authorize(
    capability: Capability,
    request: &ClientRequest,
    options: &MapOptions,
) -> Result<(), CoreError> {
    match request {
        ClientRequest::UpdateMapOptions { .. } => match capability {
            Capability::Admin => Ok(()),
            Capability::Guest => Err(CoreError::Unauthorized(
                "changing map options requires admin capability".to_string(),
            )),
        },
        ClientRequest::AddNodes { .. }
        | ClientRequest::UpdateNode { .. }
        | ClientRequest::RemoveNode { .. }
        | ClientRequest::AddConnection { .. }
        | ClientRequest::RemoveConnection { .. }
        | ClientRequest::Undo
        | ClientRequest::Redo => {
            if capability == Capability::Admin || options.guest_write {
                Ok(())
            } else {
                Err(CoreError::Unauthorized(
                    "this map is read-only for guests".to_string(),
                ))
            }
        }
        ClientRequest::Join { .. }
        | ClientRequest::UpdateSelection { .. }
        | ClientRequest::Leave => Ok(()),
    }
}
