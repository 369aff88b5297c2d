//! Client-side reconciliation shim.
//!
//! Each connected client keeps an optimistic local replica of the room's
//! map. Local intents mutate the replica immediately; the server's
//! broadcast later confirms them. The shim's one hard invariant is echo
//! suppression: a broadcast whose `client_id` matches this replica's id is
//! the round trip of a mutation the replica already applied, and must be
//! discarded. No mutation is ever applied twice by its originator.

use crate::diff::{self, ChangeSet};
use crate::error::CoreError;
use crate::history::History;
use crate::map::MapContent;
use crate::protocol::{ClientRequest, ConnectionStatus, ServerMessage};
use crate::types::ClientId;

/// Outcome of feeding one broadcast message to the replica.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyOutcome {
    /// Remote change, applied to local state.
    Applied,
    /// Own echo, discarded.
    Suppressed,
}

/// Optimistic local mirror of one room, owned by a single client.
#[derive(Debug, Clone)]
pub struct ClientReplica {
    client_id: ClientId,
    status: ConnectionStatus,
    content: MapContent,
    history: History<MapContent>,
}

impl ClientReplica {
    /// Start a replica from the snapshot received on join.
    pub fn new(client_id: impl Into<ClientId>, initial: MapContent) -> Self {
        Self {
            client_id: client_id.into(),
            status: ConnectionStatus::Connected,
            history: History::new(initial.clone()),
            content: initial,
        }
    }

    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    pub fn content(&self) -> &MapContent {
        &self.content
    }

    pub fn status(&self) -> ConnectionStatus {
        self.status
    }

    /// Transport lifecycle. On `Disconnected` the replica stops accepting
    /// local intents until reconnection.
    pub fn set_status(&mut self, status: ConnectionStatus) {
        self.status = status;
    }

    /// Apply a local mutation intent optimistically, before the round trip
    /// completes.
    ///
    /// Intents attempted while disconnected fail fast and are discarded,
    /// never queued: there is no outbox.
    ///
    /// An intent the server later rejects (valid against the local state,
    /// stale by the time it arrived) is not rolled back: the replica stays
    /// ahead of the authoritative state until the next full snapshot. The
    /// recovery path is a rejoin, whose `map.updated` payload resets both
    /// content and history, see [`Self::apply_remote`].
    pub fn apply_local(&mut self, request: &ClientRequest) -> Result<(), CoreError> {
        if self.status == ConnectionStatus::Disconnected {
            return Err(CoreError::Validation(
                "disconnected: local mutations are not accepted".to_string(),
            ));
        }

        match request {
            ClientRequest::AddNodes { nodes } => {
                self.content.add_nodes(nodes)?;
                self.history.commit(self.content.clone());
            }
            ClientRequest::UpdateNode { node, .. } => {
                self.content.update_node(node)?;
                self.history.commit(self.content.clone());
            }
            ClientRequest::RemoveNode { node_id } => {
                self.content.remove_node(*node_id)?;
                self.history.commit(self.content.clone());
            }
            ClientRequest::AddConnection { connection } => {
                self.content.add_connection(connection)?;
                self.history.commit(self.content.clone());
            }
            ClientRequest::RemoveConnection { connection_id } => {
                self.content.remove_connection(*connection_id)?;
                self.history.commit(self.content.clone());
            }
            ClientRequest::Undo => {
                if let Some(restored) = self.history.undo() {
                    self.content = restored.clone();
                }
            }
            ClientRequest::Redo => {
                if let Some(restored) = self.history.redo() {
                    self.content = restored.clone();
                }
            }
            // Join/leave, selection relays, and option changes carry no
            // tree state to mirror locally.
            ClientRequest::Join { .. }
            | ClientRequest::Leave
            | ClientRequest::UpdateSelection { .. }
            | ClientRequest::UpdateMapOptions { .. } => {}
        }
        Ok(())
    }

    /// Reconcile one broadcast message into the replica.
    pub fn apply_remote(&mut self, message: &ServerMessage) -> Result<ApplyOutcome, CoreError> {
        if message.client_id() == self.client_id {
            return Ok(ApplyOutcome::Suppressed);
        }

        match message {
            ServerMessage::MapUpdated { map, .. } => {
                self.content = map.content.clone();
                self.history = History::new(self.content.clone());
            }
            ServerMessage::NodesAdded { nodes, .. } => {
                for node in nodes {
                    self.content.nodes.insert(node.id, node.clone());
                }
                self.history.commit(self.content.clone());
            }
            ServerMessage::NodeUpdated { node, .. } => {
                self.content.nodes.insert(node.id, node.clone());
                self.history.commit(self.content.clone());
            }
            ServerMessage::NodeRemoved { node_id, .. } => {
                // Stale removals are fine: the node may already be gone.
                if self.content.nodes.contains_key(node_id) {
                    self.content.remove_node(*node_id)?;
                }
                self.history.commit(self.content.clone());
            }
            ServerMessage::ConnectionAdded { connection, .. } => {
                self.content.connections.insert(connection.id, connection.clone());
                self.history.commit(self.content.clone());
            }
            ServerMessage::ConnectionRemoved { connection_id, .. } => {
                self.content.connections.remove(connection_id);
                self.history.commit(self.content.clone());
            }
            ServerMessage::UndoRedoChanges { diff, .. } => {
                self.apply_node_diff(diff)?;
                self.history.commit(self.content.clone());
            }
            // Ephemeral or addressed-only messages: nothing to reconcile.
            ServerMessage::MapOptionsUpdated { .. }
            | ServerMessage::SelectionUpdated { .. }
            | ServerMessage::ClientNotification { .. } => {}
        }
        Ok(ApplyOutcome::Applied)
    }

    fn apply_node_diff(&mut self, changes: &ChangeSet) -> Result<(), CoreError> {
        self.content.nodes = diff::apply_changeset(&self.content.nodes, changes)?;
        // Connections referencing nodes the diff removed are dropped, the
        // same cascade the authoritative tree performs.
        let nodes = self.content.nodes.clone();
        self.content
            .connections
            .retain(|_, c| nodes.contains_key(&c.from_node_id) && nodes.contains_key(&c.to_node_id));
        Ok(())
    }
}
