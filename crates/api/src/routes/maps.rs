//! Map lifecycle and overlay routes.
//!
//! Map creation is the only response that carries the admin id and
//! modification secret; every other read returns the public properties
//! only. Overlay collections are opaque JSON arrays persisted per map and
//! kind, so clients can sync their local link and shape annotations across
//! devices.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use mapforge_core::error::CoreError;
use mapforge_core::map::MapProperties;
use mapforge_core::storage::OverlayKind;

use crate::error::{AppError, AppResult};
use crate::response::DataResponse;
use crate::state::AppState;

/// Response to map creation. The admin id and modification secret are
/// returned exactly once, here.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatedMap {
    pub map: MapProperties,
    pub admin_id: Uuid,
    pub modification_secret: Uuid,
}

/// POST /api/maps -- allocate a fresh map.
async fn create_map(State(state): State<AppState>) -> AppResult<Json<DataResponse<CreatedMap>>> {
    let record = state.rooms.create_map().await?;
    Ok(Json(DataResponse {
        data: CreatedMap {
            map: record.properties,
            admin_id: record.security.admin_id,
            modification_secret: record.security.modification_secret,
        },
    }))
}

/// GET /api/maps/{uuid} -- public map properties.
async fn get_map(
    State(state): State<AppState>,
    Path(uuid): Path<Uuid>,
) -> AppResult<Json<DataResponse<MapProperties>>> {
    let record = state
        .storage
        .load_map(uuid)
        .await?
        .ok_or(CoreError::MapNotFound(uuid))?;
    Ok(Json(DataResponse {
        data: record.properties,
    }))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteMapRequest {
    pub admin_id: Uuid,
}

/// DELETE /api/maps/{uuid} -- admin-only map deletion.
async fn delete_map(
    State(state): State<AppState>,
    Path(uuid): Path<Uuid>,
    Json(body): Json<DeleteMapRequest>,
) -> AppResult<StatusCode> {
    state.rooms.delete_map(uuid, body.admin_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

fn parse_kind(kind: &str) -> Result<OverlayKind, AppError> {
    match kind {
        "links" => Ok(OverlayKind::Links),
        "shapes" => Ok(OverlayKind::Shapes),
        other => Err(AppError::BadRequest(format!(
            "Unknown overlay kind: {other}"
        ))),
    }
}

/// GET /api/maps/{uuid}/overlay/{kind} -- stored overlay entities.
async fn get_overlay(
    State(state): State<AppState>,
    Path((uuid, kind)): Path<(Uuid, String)>,
) -> AppResult<Json<DataResponse<Vec<serde_json::Value>>>> {
    let kind = parse_kind(&kind)?;
    // Reads for a missing map yield 404, not an empty collection.
    state
        .storage
        .load_map(uuid)
        .await?
        .ok_or(CoreError::MapNotFound(uuid))?;
    let entities = state.storage.load_overlay(kind, uuid).await?;
    Ok(Json(DataResponse { data: entities }))
}

/// PUT /api/maps/{uuid}/overlay/{kind} -- replace an overlay collection.
async fn put_overlay(
    State(state): State<AppState>,
    Path((uuid, kind)): Path<(Uuid, String)>,
    Json(entities): Json<Vec<serde_json::Value>>,
) -> AppResult<StatusCode> {
    let kind = parse_kind(&kind)?;
    state
        .storage
        .load_map(uuid)
        .await?
        .ok_or(CoreError::MapNotFound(uuid))?;
    state.storage.save_overlay(kind, uuid, &entities).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/maps", axum::routing::post(create_map))
        .route("/maps/{uuid}", get(get_map).delete(delete_map))
        .route(
            "/maps/{uuid}/overlay/{kind}",
            get(get_overlay).put(put_overlay),
        )
}
