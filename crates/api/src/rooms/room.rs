//! The room actor: single owner of one map's authoritative state.
//!
//! All commands for a map flow through the actor's queue and are applied
//! strictly in arrival order, which serializes concurrent edits without
//! locks. Every accepted mutation is broadcast to all subscribers first and
//! persisted afterwards, so clients never wait on the database.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{broadcast, mpsc, oneshot};
use uuid::Uuid;

use mapforge_core::access::{authorize, Capability};
use mapforge_core::diff::diff;
use mapforge_core::error::CoreError;
use mapforge_core::history::History;
use mapforge_core::map::{MapContent, MapProperties};
use mapforge_core::protocol::{ClientRequest, ServerMessage};
use mapforge_core::storage::{MapRecord, MapStorage};
use mapforge_core::types::{ClientId, MapId};
use mapforge_events::Fanout;

/// Granted room membership, returned to a joining client.
#[derive(Debug)]
pub struct JoinAccepted {
    pub capability: Capability,
    /// Authoritative map at the moment of joining.
    pub map: MapProperties,
    /// Subscription to every message the room broadcasts from now on.
    pub updates: broadcast::Receiver<ServerMessage>,
}

enum RoomCommand {
    Join {
        client_id: ClientId,
        modification_secret: Option<Uuid>,
        reply: oneshot::Sender<JoinAccepted>,
    },
    Request {
        client_id: ClientId,
        request: ClientRequest,
        reply: oneshot::Sender<Result<(), CoreError>>,
    },
    Leave {
        client_id: ClientId,
        /// `true` when the room is now empty and may be evicted.
        reply: oneshot::Sender<bool>,
    },
}

/// Cheap handle to a running room actor.
#[derive(Clone)]
pub struct RoomHandle {
    map_id: MapId,
    tx: mpsc::UnboundedSender<RoomCommand>,
}

impl RoomHandle {
    /// `true` once the actor task has exited.
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }

    pub async fn join(
        &self,
        client_id: ClientId,
        modification_secret: Option<Uuid>,
    ) -> Result<JoinAccepted, CoreError> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(RoomCommand::Join {
                client_id,
                modification_secret,
                reply,
            })
            .map_err(|_| CoreError::MapNotFound(self.map_id))?;
        rx.await.map_err(|_| CoreError::MapNotFound(self.map_id))
    }

    pub async fn request(
        &self,
        client_id: ClientId,
        request: ClientRequest,
    ) -> Result<(), CoreError> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(RoomCommand::Request {
                client_id,
                request,
                reply,
            })
            .map_err(|_| CoreError::MapNotFound(self.map_id))?;
        rx.await.map_err(|_| CoreError::MapNotFound(self.map_id))?
    }

    /// Remove a session. Returns `true` when the room is now empty.
    pub async fn leave(&self, client_id: ClientId) -> bool {
        let (reply, rx) = oneshot::channel();
        if self
            .tx
            .send(RoomCommand::Leave { client_id, reply })
            .is_err()
        {
            return true;
        }
        rx.await.unwrap_or(true)
    }
}

/// Actor state for one open map.
pub(crate) struct Room {
    record: MapRecord,
    sessions: HashMap<ClientId, Capability>,
    history: History<MapContent>,
    fanout: Fanout<ServerMessage>,
    storage: Arc<dyn MapStorage>,
}

impl Room {
    /// Spawn the actor for a loaded map record. The returned task handle
    /// resolves once the actor has written its final state and exited.
    pub fn spawn(
        record: MapRecord,
        storage: Arc<dyn MapStorage>,
    ) -> (RoomHandle, tokio::task::JoinHandle<()>) {
        let map_id = record.properties.uuid;
        let (tx, mut rx) = mpsc::unbounded_channel();

        let mut room = Room {
            history: History::new(record.properties.content.clone()),
            record,
            sessions: HashMap::new(),
            fanout: Fanout::default(),
            storage,
        };

        let task = tokio::spawn(async move {
            tracing::info!(map_id = %map_id, "Room started");
            while let Some(command) = rx.recv().await {
                room.handle(command).await;
            }
            // Registry dropped the handle: write the final state before
            // the room disappears.
            if let Err(e) = room.storage.save_map(&room.record).await {
                tracing::error!(map_id = %map_id, error = %e, "Final room save failed");
            }
            tracing::info!(map_id = %map_id, "Room stopped");
        });

        (RoomHandle { map_id, tx }, task)
    }

    async fn handle(&mut self, command: RoomCommand) {
        match command {
            RoomCommand::Join {
                client_id,
                modification_secret,
                reply,
            } => {
                let capability = self.record.security.capability_for(modification_secret);
                self.sessions.insert(client_id.clone(), capability);
                tracing::debug!(
                    map_id = %self.record.properties.uuid,
                    client_id = %client_id,
                    ?capability,
                    "Client joined room"
                );
                let _ = reply.send(JoinAccepted {
                    capability,
                    map: self.record.properties.clone(),
                    updates: self.fanout.subscribe(),
                });
            }
            RoomCommand::Request {
                client_id,
                request,
                reply,
            } => {
                let result = self.apply(client_id, request).await;
                let _ = reply.send(result);
            }
            RoomCommand::Leave { client_id, reply } => {
                self.sessions.remove(&client_id);
                tracing::debug!(
                    map_id = %self.record.properties.uuid,
                    client_id = %client_id,
                    remaining = self.sessions.len(),
                    "Client left room"
                );
                let _ = reply.send(self.sessions.is_empty());
            }
        }
    }

    /// Validate, apply, broadcast, persist. A failed request leaves the map
    /// untouched and is reported only to the requester.
    async fn apply(&mut self, client_id: ClientId, request: ClientRequest) -> Result<(), CoreError> {
        let capability = *self
            .sessions
            .get(&client_id)
            .ok_or_else(|| CoreError::Unauthorized("no session in this room".to_string()))?;
        authorize(capability, &request, &self.record.properties.options)?;

        let content = &mut self.record.properties.content;
        let messages = match request {
            ClientRequest::AddNodes { nodes } => {
                content.add_nodes(&nodes)?;
                self.record.properties.touch();
                self.commit();
                vec![ServerMessage::NodesAdded { client_id, nodes }]
            }
            ClientRequest::UpdateNode { node, property } => {
                content.update_node(&node)?;
                self.record.properties.touch();
                self.commit();
                vec![ServerMessage::NodeUpdated {
                    client_id,
                    node,
                    property,
                }]
            }
            ClientRequest::RemoveNode { node_id } => {
                content.remove_node(node_id)?;
                self.record.properties.touch();
                self.commit();
                // Subscribers cascade the subtree and its connections
                // locally, exactly as the room just did.
                vec![ServerMessage::NodeRemoved { client_id, node_id }]
            }
            ClientRequest::AddConnection { connection } => {
                content.add_connection(&connection)?;
                self.record.properties.touch();
                self.commit();
                vec![ServerMessage::ConnectionAdded {
                    client_id,
                    connection,
                }]
            }
            ClientRequest::RemoveConnection { connection_id } => {
                content.remove_connection(connection_id)?;
                self.record.properties.touch();
                self.commit();
                vec![ServerMessage::ConnectionRemoved {
                    client_id,
                    connection_id,
                }]
            }
            ClientRequest::UpdateMapOptions { options } => {
                // Options live outside the content snapshot and are not
                // undoable.
                self.record.properties.options = options.clone();
                self.record.properties.touch();
                vec![ServerMessage::MapOptionsUpdated { client_id, options }]
            }
            ClientRequest::UpdateSelection { node_id, selected } => {
                // Ephemeral: relayed to subscribers, never stored.
                self.fanout.publish(ServerMessage::SelectionUpdated {
                    client_id,
                    node_id,
                    selected,
                });
                return Ok(());
            }
            ClientRequest::Undo => self.step_history(client_id, true),
            ClientRequest::Redo => self.step_history(client_id, false),
            ClientRequest::Join { .. } | ClientRequest::Leave => {
                return Err(CoreError::Validation(
                    "lifecycle requests are not room mutations".to_string(),
                ))
            }
        };

        if messages.is_empty() {
            return Ok(());
        }
        for message in messages {
            self.fanout.publish(message);
        }
        self.persist().await;
        Ok(())
    }

    fn commit(&mut self) {
        self.history.commit(self.record.properties.content.clone());
    }

    /// Undo or redo one step. At the history floor (or with nothing to
    /// redo) this is a silent no-op.
    fn step_history(&mut self, client_id: ClientId, undo: bool) -> Vec<ServerMessage> {
        let before = self.record.properties.content.clone();
        let restored = if undo {
            self.history.undo().cloned()
        } else {
            self.history.redo().cloned()
        };
        let Some(restored) = restored else {
            return Vec::new();
        };

        let mut messages = vec![ServerMessage::UndoRedoChanges {
            client_id: client_id.clone(),
            diff: diff(&before.nodes, &restored.nodes),
        }];

        // Connection deltas ride as regular connection messages; re-adding
        // an id replaces it on every client (last writer wins).
        for (id, connection) in &restored.connections {
            if before.connections.get(id) != Some(connection) {
                messages.push(ServerMessage::ConnectionAdded {
                    client_id: client_id.clone(),
                    connection: connection.clone(),
                });
            }
        }
        for id in before.connections.keys() {
            if !restored.connections.contains_key(id) {
                messages.push(ServerMessage::ConnectionRemoved {
                    client_id: client_id.clone(),
                    connection_id: *id,
                });
            }
        }

        self.record.properties.content = restored;
        self.record.properties.touch();
        messages
    }

    /// Write the full record. Subscribers were already notified; a failed
    /// save is logged and retried implicitly by the next mutation.
    async fn persist(&self) {
        if let Err(e) = self.storage.save_map(&self.record).await {
            tracing::error!(
                map_id = %self.record.properties.uuid,
                error = %e,
                "Room save failed"
            );
        }
    }
}
