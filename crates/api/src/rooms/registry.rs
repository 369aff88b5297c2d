//! Registry of live rooms, keyed by map uuid.
//!
//! A room exists only while it has sessions: the first join loads the map
//! from storage and spawns the actor, the last leave evicts the handle.
//! Dropping the last handle closes the actor's queue, which writes the
//! final state and exits.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use uuid::Uuid;

use mapforge_core::error::CoreError;
use mapforge_core::protocol::ClientRequest;
use mapforge_core::storage::{MapRecord, MapStorage};
use mapforge_core::types::{ClientId, MapId};
use mapforge_events::StateChannel;

use crate::rooms::room::{JoinAccepted, Room, RoomHandle};

/// How long a map deletion waits for the evicted room's final save.
const EVICTION_TIMEOUT: Duration = Duration::from_secs(5);

struct RoomEntry {
    handle: RoomHandle,
    task: JoinHandle<()>,
}

pub struct RoomRegistry {
    storage: Arc<dyn MapStorage>,
    rooms: Mutex<HashMap<MapId, RoomEntry>>,
    /// Live room count, observable without taking the registry lock.
    gauge: StateChannel<usize>,
}

impl RoomRegistry {
    pub fn new(storage: Arc<dyn MapStorage>) -> Self {
        Self {
            storage,
            rooms: Mutex::new(HashMap::new()),
            gauge: StateChannel::new(0),
        }
    }

    /// Allocate and persist a fresh map. The caller receives the full
    /// record including the security fields; this is the only moment the
    /// modification secret leaves the server.
    pub async fn create_map(&self) -> Result<MapRecord, CoreError> {
        let record = MapRecord::new();
        self.storage.save_map(&record).await?;
        tracing::info!(map_id = %record.properties.uuid, "Map created");
        Ok(record)
    }

    /// Join a room, spawning it from storage if it is not live yet.
    ///
    /// The lock is held across the join reply, mirroring [`Self::leave`]:
    /// otherwise a last-leave could drain the actor's sessions and evict
    /// the entry between the handle lookup and the `Join` landing, leaving
    /// the new session attached to a room the registry no longer knows.
    pub async fn join(
        &self,
        map_id: MapId,
        client_id: ClientId,
        modification_secret: Option<Uuid>,
    ) -> Result<JoinAccepted, CoreError> {
        let mut rooms = self.rooms.lock().await;
        let handle = match rooms.get(&map_id) {
            Some(entry) if !entry.handle.is_closed() => entry.handle.clone(),
            _ => {
                let record = self
                    .storage
                    .load_map(map_id)
                    .await?
                    .ok_or(CoreError::MapNotFound(map_id))?;
                let (handle, task) = Room::spawn(record, Arc::clone(&self.storage));
                rooms.insert(
                    map_id,
                    RoomEntry {
                        handle: handle.clone(),
                        task,
                    },
                );
                self.gauge.publish(rooms.len());
                handle
            }
        };
        handle.join(client_id, modification_secret).await
    }

    /// Route a request to a live room. A request for a room with no
    /// sessions is a protocol violation and fails.
    pub async fn request(
        &self,
        map_id: MapId,
        client_id: ClientId,
        request: ClientRequest,
    ) -> Result<(), CoreError> {
        let handle = {
            let rooms = self.rooms.lock().await;
            rooms
                .get(&map_id)
                .map(|entry| entry.handle.clone())
                .ok_or(CoreError::MapNotFound(map_id))?
        };
        handle.request(client_id, request).await
    }

    /// Drop a session; evicts the room when it was the last one. The lock
    /// is held across the leave so a concurrent join cannot land on a
    /// handle that is about to be removed.
    pub async fn leave(&self, map_id: MapId, client_id: ClientId) {
        let mut rooms = self.rooms.lock().await;
        if let Some(entry) = rooms.get(&map_id) {
            if entry.handle.leave(client_id).await {
                rooms.remove(&map_id);
                self.gauge.publish(rooms.len());
                tracing::info!(map_id = %map_id, "Room evicted");
            }
        }
    }

    /// Delete a map for its admin. A live room is shut down first and its
    /// final save awaited, so the deletion cannot be undone by a stale
    /// room write.
    pub async fn delete_map(&self, map_id: MapId, admin_id: Uuid) -> Result<(), CoreError> {
        let record = self
            .storage
            .load_map(map_id)
            .await?
            .ok_or(CoreError::MapNotFound(map_id))?;
        if record.security.admin_id != admin_id {
            return Err(CoreError::Unauthorized(
                "deleting a map requires its admin id".to_string(),
            ));
        }

        let entry = {
            let mut rooms = self.rooms.lock().await;
            let entry = rooms.remove(&map_id);
            self.gauge.publish(rooms.len());
            entry
        };
        if let Some(entry) = entry {
            drop(entry.handle);
            let _ = tokio::time::timeout(EVICTION_TIMEOUT, entry.task).await;
        }

        self.storage.delete_map(map_id).await?;
        tracing::info!(map_id = %map_id, "Map deleted");
        Ok(())
    }

    /// Number of currently live rooms, read from the gauge.
    pub fn room_count(&self) -> usize {
        self.gauge.latest()
    }
}
