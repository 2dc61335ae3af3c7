use axum::{
    extract::{Path, State},
    routing::get,
    Json, Router,
};
use tracing::instrument;

use super::dto::{DeletedUser, UpdateUserRequest};
use crate::{
    auth::dto::PublicUser,
    error::AppError,
    extractors::{parse_user_id, JsonBody},
    state::AppState,
};

pub fn user_routes() -> Router<AppState> {
    Router::new()
        .route("/api/users", get(list_users))
        .route(
            "/api/users/:id",
            get(get_user).put(update_user).delete(delete_user),
        )
}

#[instrument(skip(state))]
pub async fn list_users(State(state): State<AppState>) -> Result<Json<Vec<PublicUser>>, AppError> {
    Ok(Json(state.auth.list_users().await?))
}

#[instrument(skip(state))]
pub async fn get_user(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<PublicUser>, AppError> {
    let id = parse_user_id(&id)?;
    Ok(Json(state.auth.get_user(id).await?))
}

#[instrument(skip(state, payload))]
pub async fn update_user(
    State(state): State<AppState>,
    Path(id): Path<String>,
    JsonBody(payload): JsonBody<UpdateUserRequest>,
) -> Result<Json<PublicUser>, AppError> {
    let id = parse_user_id(&id)?;
    let user = state
        .auth
        .update_user(id, payload.email.as_deref(), payload.password.as_deref())
        .await?;
    Ok(Json(user))
}

#[instrument(skip(state))]
pub async fn delete_user(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<DeletedUser>, AppError> {
    let id = parse_user_id(&id)?;
    state.auth.delete_user(id).await?;
    Ok(Json(DeletedUser { deleted: true, id }))
}
