use std::convert::Infallible;

use axum::{
    extract::{Path, State},
    response::sse::{Event, KeepAlive, Sse},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use time::OffsetDateTime;
use tokio_stream::{wrappers::BroadcastStream, Stream, StreamExt};
use tracing::{info, instrument};
use uuid::Uuid;

use crate::{
    auth::services::AuthUser,
    error::ApiError,
    kuris::{dto::Ack, policy},
    spin::hub::SpinEvent,
    state::AppState,
    users::services::require_user,
};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/spinner/stream/:kuri_id", get(stream_spins))
        .route("/spinner/spin/:kuri_id", post(broadcast_spin))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpinRequest {
    pub easing: String,
    pub speed: f64,
    pub rotates: u32,
    pub winner: String,
}

/// Live spin feed for one kuri. Browsers connect with `EventSource`, which
/// cannot set headers, so the stream itself is unauthenticated; only
/// publishing is gated.
#[instrument(skip(state))]
pub async fn stream_spins(
    State(state): State<AppState>,
    Path(kuri_id): Path<Uuid>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let rx = state.spins.subscribe(kuri_id);
    let stream = BroadcastStream::new(rx)
        .filter_map(|msg| msg.ok())
        .map(|event| Ok(Event::default().json_data(&event).unwrap_or_default()));
    Sse::new(stream).keep_alive(KeepAlive::default())
}

/// Fire-and-forget: delivery is best-effort to whoever is connected right
/// now, nothing is replayed.
#[instrument(skip(state, payload))]
pub async fn broadcast_spin(
    State(state): State<AppState>,
    AuthUser(actor_id): AuthUser,
    Path(kuri_id): Path<Uuid>,
    Json(payload): Json<SpinRequest>,
) -> Result<Json<Ack>, ApiError> {
    if payload.easing.trim().is_empty() || payload.winner.trim().is_empty() {
        return Err(ApiError::Validation("Missing required fields".into()));
    }

    let actor = require_user(state.users.as_ref(), actor_id).await?;
    let kuri = state
        .kuris
        .get(kuri_id)
        .await?
        .ok_or(ApiError::NotFound("Kuri"))?;
    if !policy::can_manage(&actor, &kuri) {
        return Err(ApiError::Forbidden("Only kuri admin can broadcast a spin"));
    }

    let now = OffsetDateTime::now_utc();
    let event = SpinEvent {
        easing: payload.easing,
        speed: payload.speed,
        rotates: payload.rotates,
        winner: payload.winner,
        admin_id: actor.id,
        timestamp: (now.unix_timestamp_nanos() / 1_000_000) as i64,
    };
    let delivered = state.spins.publish(kuri_id, event);
    info!(%kuri_id, delivered, "spin broadcasted");
    Ok(Json(Ack {
        success: true,
        message: "Spin broadcasted",
    }))
}
