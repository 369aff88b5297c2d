//! WebSocket connection lifecycle.
//!
//! Each connection gets a server-assigned client id. The first request must
//! be `map.join`; after that, requests are routed to the joined room and
//! every room broadcast is forwarded back out. Request failures are
//! reported only to this connection as `client.notification` messages, so
//! other subscribers never see another client's validation errors.

use std::time::Duration;

use axum::body::Bytes;
use axum::extract::ws::{Message, Utf8Bytes, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::IntoResponse;
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use mapforge_core::error::CoreError;
use mapforge_core::protocol::{ClientRequest, Severity, ServerMessage};
use mapforge_core::types::{ClientId, MapId};

use crate::state::AppState;

/// Interval between heartbeat pings.
const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(30);

/// HTTP handler that upgrades the connection to WebSocket.
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

type Outbound = mpsc::UnboundedSender<Message>;

/// Manage a single WebSocket connection after upgrade.
async fn handle_socket(socket: WebSocket, state: AppState) {
    let client_id: ClientId = uuid::Uuid::new_v4().to_string();
    tracing::info!(client_id = %client_id, "WebSocket connected");

    let (mut sink, mut stream) = socket.split();
    let (out_tx, mut out_rx) = mpsc::unbounded_channel::<Message>();

    // Sender task: forward outbound messages and keep the connection alive
    // with periodic pings.
    let send_task = tokio::spawn(async move {
        let mut heartbeat = tokio::time::interval(HEARTBEAT_INTERVAL);
        loop {
            tokio::select! {
                msg = out_rx.recv() => match msg {
                    Some(msg) => {
                        if sink.send(msg).await.is_err() {
                            break;
                        }
                    }
                    None => break,
                },
                _ = heartbeat.tick() => {
                    if sink.send(Message::Ping(Bytes::new())).await.is_err() {
                        break;
                    }
                }
            }
        }
    });

    let mut joined: Option<MapId> = None;
    let mut forward_task: Option<JoinHandle<()>> = None;

    while let Some(result) = stream.next().await {
        match result {
            Ok(Message::Text(text)) => {
                let request: ClientRequest = match serde_json::from_str(&text) {
                    Ok(request) => request,
                    Err(e) => {
                        notify(&out_tx, &client_id, &format!("Malformed request: {e}"));
                        continue;
                    }
                };

                match request {
                    ClientRequest::Join {
                        map_id,
                        modification_secret,
                    } => {
                        if joined.is_some() {
                            notify(&out_tx, &client_id, "Already joined a map");
                            continue;
                        }
                        match state
                            .rooms
                            .join(map_id, client_id.clone(), modification_secret)
                            .await
                        {
                            Ok(accepted) => {
                                joined = Some(map_id);
                                // The full authoritative map goes to the
                                // joining client only.
                                send(
                                    &out_tx,
                                    &ServerMessage::MapUpdated {
                                        client_id: client_id.clone(),
                                        map: accepted.map,
                                    },
                                );
                                forward_task = Some(forward_updates(
                                    accepted.updates,
                                    out_tx.clone(),
                                    client_id.clone(),
                                ));
                            }
                            Err(e) => notify_error(&out_tx, &client_id, &e),
                        }
                    }
                    ClientRequest::Leave => {
                        if let Some(map_id) = joined.take() {
                            state.rooms.leave(map_id, client_id.clone()).await;
                            if let Some(task) = forward_task.take() {
                                task.abort();
                            }
                        }
                    }
                    other => match joined {
                        Some(map_id) => {
                            if let Err(e) =
                                state.rooms.request(map_id, client_id.clone(), other).await
                            {
                                notify_error(&out_tx, &client_id, &e);
                            }
                        }
                        None => notify(&out_tx, &client_id, "Join a map first"),
                    },
                }
            }
            Ok(Message::Close(_)) => break,
            Ok(Message::Pong(_)) => {
                tracing::trace!(client_id = %client_id, "Pong received");
            }
            Ok(_) => {}
            Err(e) => {
                tracing::debug!(client_id = %client_id, error = %e, "WebSocket receive error");
                break;
            }
        }
    }

    // Disconnecting has the same effect as an explicit leave.
    if let Some(map_id) = joined {
        state.rooms.leave(map_id, client_id.clone()).await;
    }
    if let Some(task) = forward_task {
        task.abort();
    }
    send_task.abort();
    tracing::info!(client_id = %client_id, "WebSocket disconnected");
}

/// Spawn a task forwarding room broadcasts to this connection.
fn forward_updates(
    mut updates: tokio::sync::broadcast::Receiver<ServerMessage>,
    out_tx: Outbound,
    client_id: ClientId,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            match updates.recv().await {
                Ok(message) => send(&out_tx, &message),
                Err(tokio::sync::broadcast::error::RecvError::Lagged(skipped)) => {
                    // The client missed updates and can no longer converge
                    // by patching; it must rejoin for a full map.
                    tracing::warn!(client_id = %client_id, skipped, "Subscriber lagged");
                    notify(&out_tx, &client_id, "Out of sync, please rejoin the map");
                    break;
                }
                Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
            }
        }
    })
}

/// Serialize and enqueue one server message.
fn send(out_tx: &Outbound, message: &ServerMessage) {
    match serde_json::to_string(message) {
        Ok(json) => {
            let _ = out_tx.send(Message::Text(Utf8Bytes::from(json)));
        }
        Err(e) => tracing::error!(error = %e, "Failed to serialize server message"),
    }
}

fn notify(out_tx: &Outbound, client_id: &str, message: &str) {
    send(
        out_tx,
        &ServerMessage::ClientNotification {
            client_id: client_id.to_string(),
            message: message.to_string(),
            severity: Severity::Error,
        },
    );
}

fn notify_error(out_tx: &Outbound, client_id: &str, error: &CoreError) {
    notify(out_tx, client_id, &error.to_string());
}
