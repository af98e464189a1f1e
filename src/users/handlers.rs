use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use tracing::{info, instrument};
use uuid::Uuid;

use crate::{
    auth::services::AuthUser,
    error::ApiError,
    kuris::dto::Ack,
    state::AppState,
    users::{
        dto::{CreateUserRequest, PublicUser, UpdateUserRequest},
        repo::Role,
        services::{self, require_user},
    },
};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/users", get(list_users).post(create_user))
        .route("/users/:id", axum::routing::put(update_user).delete(delete_user))
}

#[instrument(skip(state))]
pub async fn list_users(
    State(state): State<AppState>,
    AuthUser(_actor_id): AuthUser,
) -> Result<Json<Vec<PublicUser>>, ApiError> {
    let users = state.users.list().await?;
    Ok(Json(users.into_iter().map(PublicUser::from).collect()))
}

/// Create a real account or a placeholder member. Placeholders may be
/// created by anyone assembling a kuri roster; the store write is what
/// makes them resolvable for every other viewer.
#[instrument(skip(state, payload))]
pub async fn create_user(
    State(state): State<AppState>,
    AuthUser(_actor_id): AuthUser,
    Json(payload): Json<CreateUserRequest>,
) -> Result<(StatusCode, Json<PublicUser>), ApiError> {
    let user = services::create_user(state.users.as_ref(), state.config.code_format, payload).await?;
    info!(user_id = %user.id, is_dummy = user.is_dummy, "user created");
    Ok((StatusCode::CREATED, Json(PublicUser::from(user))))
}

#[instrument(skip(state, payload))]
pub async fn update_user(
    State(state): State<AppState>,
    AuthUser(actor_id): AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateUserRequest>,
) -> Result<Json<PublicUser>, ApiError> {
    let actor = require_user(state.users.as_ref(), actor_id).await?;
    if actor.role != Role::Admin {
        return Err(ApiError::Forbidden("Only admins can update users"));
    }

    let mut user = require_user(state.users.as_ref(), id).await?;
    if let Some(name) = payload.name {
        let name = name.trim().to_string();
        if name.is_empty() {
            return Err(ApiError::Validation("Name cannot be empty".into()));
        }
        user.name = name;
    }
    if let Some(role) = payload.role {
        user.role = role;
    }
    if let Some(status) = payload.status {
        user.status = status;
    }

    if !state.users.update(user.clone()).await? {
        return Err(ApiError::NotFound("User"));
    }
    Ok(Json(PublicUser::from(user)))
}

/// Deleting a user never cleans up kuri member lists; rosters tolerate the
/// dangling id by synthesizing a placeholder.
#[instrument(skip(state))]
pub async fn delete_user(
    State(state): State<AppState>,
    AuthUser(actor_id): AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<Ack>, ApiError> {
    let actor = require_user(state.users.as_ref(), actor_id).await?;
    if actor.role != Role::Admin {
        return Err(ApiError::Forbidden("Only admins can delete users"));
    }

    if !state.users.delete(id).await? {
        return Err(ApiError::NotFound("User"));
    }
    info!(user_id = %id, "user deleted");
    Ok(Json(Ack {
        success: true,
        message: "User deleted",
    }))
}
