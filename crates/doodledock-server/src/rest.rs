//! Room management over plain HTTP.

use crate::AppState;
use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use doodledock_core::actions::{DecodeError, decode, encode};
use doodledock_core::store::{RoomInfo, RoomSnapshot, RoomStore, StoreError};
use serde::Deserialize;
use serde_json::{Value, json};
use std::sync::Arc;
use thiserror::Error;

/// Errors returned by REST handlers as `{"error": message}`.
#[derive(Debug, Error)]
pub(crate) enum ApiError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("Invalid action: {0}")]
    InvalidAction(#[from] DecodeError),
    #[error("Failed to encode action: {0}")]
    Encode(#[from] serde_json::Error),
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            ApiError::Store(StoreError::RoomNotFound(_)) => StatusCode::NOT_FOUND,
            ApiError::Store(StoreError::PermissionDenied(_)) => StatusCode::FORBIDDEN,
            ApiError::Store(StoreError::Unavailable(_)) => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::Store(StoreError::Lock(_)) | ApiError::Encode(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::InvalidAction(_) => StatusCode::BAD_REQUEST,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status(), Json(json!({ "error": self.to_string() }))).into_response()
    }
}

type ApiResult<T> = Result<T, ApiError>;

#[derive(Debug, Deserialize)]
pub(crate) struct CreateRoomRequest {
    name: String,
    #[serde(default, alias = "isPrivate")]
    is_private: bool,
    creator: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct UserRequest {
    user: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct AppendRequest {
    user: String,
    action: Value,
}

#[derive(Debug, Deserialize)]
pub(crate) struct JoinByCodeRequest {
    code: String,
    user: String,
}

/// List all rooms
pub(crate) async fn list_rooms(State(state): State<Arc<AppState>>) -> ApiResult<Json<Vec<RoomInfo>>> {
    Ok(Json(state.rooms.list_rooms()?))
}

/// Create a new room with a fresh join code
pub(crate) async fn create_room(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateRoomRequest>,
) -> ApiResult<(StatusCode, Json<RoomInfo>)> {
    let room = state.rooms.create_room(&req.name, req.is_private, &req.creator)?;
    tracing::info!("Created room {} ({}) for {}", room.id, room.code, room.creator);
    Ok((StatusCode::CREATED, Json(room)))
}

/// Rooms created by one user
pub(crate) async fn rooms_by_user(
    State(state): State<Arc<AppState>>,
    Path(user): Path<String>,
) -> ApiResult<Json<Vec<RoomInfo>>> {
    Ok(Json(state.rooms.rooms_created_by(&user)?))
}

/// Room metadata and log
pub(crate) async fn get_room(State(state): State<Arc<AppState>>, Path(id): Path<String>) -> ApiResult<Json<RoomSnapshot>> {
    Ok(Json(state.rooms.get(&id).await?))
}

/// Room log only
pub(crate) async fn get_actions(State(state): State<Arc<AppState>>, Path(id): Path<String>) -> ApiResult<Json<Value>> {
    let snapshot = state.rooms.get(&id).await?;
    Ok(Json(json!({ "actions": snapshot.actions })))
}

/// Append one validated action record
pub(crate) async fn append_action(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(req): Json<AppendRequest>,
) -> ApiResult<StatusCode> {
    let record = encode(&decode(&req.action)?)?;
    state.rooms.append(&id, &req.user, record).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Empty a room's log
pub(crate) async fn clear_room(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(req): Json<UserRequest>,
) -> ApiResult<StatusCode> {
    state.rooms.replace(&id, &req.user, Vec::new()).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Join a room by id (admits the user to a private room)
pub(crate) async fn join_room(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(req): Json<UserRequest>,
) -> ApiResult<Json<RoomInfo>> {
    Ok(Json(state.rooms.join(&id, &req.user)?))
}

/// Join a room by its join code
pub(crate) async fn join_by_code(
    State(state): State<Arc<AppState>>,
    Json(req): Json<JoinByCodeRequest>,
) -> ApiResult<Json<RoomInfo>> {
    Ok(Json(state.rooms.join_by_code(&req.code, &req.user)?))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state() -> Arc<AppState> {
        Arc::new(AppState::new())
    }

    async fn create(state: &Arc<AppState>, is_private: bool) -> RoomInfo {
        let req = CreateRoomRequest {
            name: "board".to_string(),
            is_private,
            creator: "alice".to_string(),
        };
        let (status, Json(room)) = create_room(State(Arc::clone(state)), Json(req)).await.unwrap();
        assert_eq!(status, StatusCode::CREATED);
        room
    }

    #[tokio::test]
    async fn test_create_and_fetch_room() {
        let state = state();
        let room = create(&state, false).await;
        let Json(snapshot) = get_room(State(Arc::clone(&state)), Path(room.id.clone())).await.unwrap();
        assert_eq!(snapshot.info, room);

        let Json(rooms) = rooms_by_user(State(state), Path("alice".to_string())).await.unwrap();
        assert_eq!(rooms.len(), 1);
    }

    #[tokio::test]
    async fn test_append_validates_action() {
        let state = state();
        let room = create(&state, false).await;

        let bad = AppendRequest {
            user: "bob".to_string(),
            action: json!({"type": "rect", "x": 1}),
        };
        let err = append_action(State(Arc::clone(&state)), Path(room.id.clone()), Json(bad))
            .await
            .unwrap_err();
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);

        let legacy = AppendRequest {
            user: "bob".to_string(),
            action: json!({"type": "draw", "from": {"x": 0, "y": 0}, "to": {"x": 1, "y": 1}}),
        };
        append_action(State(Arc::clone(&state)), Path(room.id.clone()), Json(legacy))
            .await
            .unwrap();

        let Json(body) = get_actions(State(state), Path(room.id)).await.unwrap();
        // Stored in the current stroke shape.
        assert_eq!(body["actions"][0]["type"], "stroke");
    }

    #[tokio::test]
    async fn test_private_room_flow() {
        let state = state();
        let room = create(&state, true).await;

        let req = UserRequest {
            user: "bob".to_string(),
        };
        let err = clear_room(State(Arc::clone(&state)), Path(room.id.clone()), Json(req))
            .await
            .unwrap_err();
        assert_eq!(err.status(), StatusCode::FORBIDDEN);

        let req = JoinByCodeRequest {
            code: room.code.clone(),
            user: "bob".to_string(),
        };
        let Json(joined) = join_by_code(State(Arc::clone(&state)), Json(req)).await.unwrap();
        assert_eq!(joined.allowed_users, vec!["bob".to_string()]);

        let req = UserRequest {
            user: "bob".to_string(),
        };
        let status = clear_room(State(state), Path(room.id), Json(req)).await.unwrap();
        assert_eq!(status, StatusCode::NO_CONTENT);
    }

    #[tokio::test]
    async fn test_unknown_room_is_not_found() {
        let err = get_room(State(state()), Path("missing".to_string())).await.unwrap_err();
        assert_eq!(err.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_create_request_accepts_camel_case_flag() {
        let req: CreateRoomRequest =
            serde_json::from_value(json!({"name": "n", "isPrivate": true, "creator": "c"})).unwrap();
        assert!(req.is_private);
    }
}
