use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use time::OffsetDateTime;
use tracing::{info, instrument};
use uuid::Uuid;

use crate::{
    auth::services::AuthUser,
    config::RotationPolicy,
    error::ApiError,
    kuris::{
        dto::{
            Ack, AnalyticsQuery, AnalyticsResponse, AssignWinnerRequest, CollectionReport,
            CreateKuri, DecideNominationRequest, KuriView, ListQuery, MemberCollectionView,
            MemberPaid, NominateRequest, SetPaymentRequest, UpdateKuri,
        },
        engine,
        model::{Kuri, Nomination, Payment},
        policy,
    },
    state::AppState,
    users::services::{require_user, resolve_roster},
};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/kuris", get(list_kuris).post(create_kuri))
        .route(
            "/kuris/:id",
            get(get_kuri).put(update_kuri).delete(delete_kuri),
        )
        .route("/kuris/:id/winner", post(assign_winner))
        .route("/kuris/:id/nominate-winner", post(nominate_winner))
        .route("/kuris/:id/approve-nomination", post(approve_nomination))
        .route("/kuris/:id/payments", post(set_payment))
        .route("/kuris/:id/analytics", get(analytics))
}

async fn load_kuri(state: &AppState, id: Uuid) -> Result<Kuri, ApiError> {
    Ok(state.kuris.get(id).await?.ok_or(ApiError::NotFound("Kuri"))?)
}

/// Write the whole document back; a vanished id means the kuri was deleted
/// underneath us.
async fn save(state: &AppState, kuri: Kuri) -> Result<Kuri, ApiError> {
    if !state.kuris.put(kuri.clone()).await? {
        return Err(ApiError::NotFound("Kuri"));
    }
    Ok(kuri)
}

/// The nomination workflow is an optional extension; `direct` deployments
/// run without it.
fn require_nomination_policy(state: &AppState) -> Result<(), ApiError> {
    if state.config.rotation == RotationPolicy::Nominate {
        Ok(())
    } else {
        Err(ApiError::PolicyDisabled)
    }
}

#[instrument(skip(state))]
pub async fn list_kuris(
    State(state): State<AppState>,
    AuthUser(actor_id): AuthUser,
    Query(query): Query<ListQuery>,
) -> Result<Json<Vec<KuriView>>, ApiError> {
    let actor = require_user(state.users.as_ref(), actor_id).await?;
    let mut kuris = state.kuris.list().await?;
    if let Some(user_id) = query.user_id {
        kuris.retain(|k| policy::is_visible_to(k, user_id));
    }
    let views = kuris
        .into_iter()
        .map(|k| KuriView::for_viewer(k, &actor, None))
        .collect();
    Ok(Json(views))
}

#[instrument(skip(state))]
pub async fn get_kuri(
    State(state): State<AppState>,
    AuthUser(actor_id): AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<KuriView>, ApiError> {
    let actor = require_user(state.users.as_ref(), actor_id).await?;
    let kuri = load_kuri(&state, id).await?;
    let roster = resolve_roster(state.users.as_ref(), &kuri.member_ids).await?;
    Ok(Json(KuriView::for_viewer(kuri, &actor, Some(roster))))
}

#[instrument(skip(state, payload))]
pub async fn create_kuri(
    State(state): State<AppState>,
    AuthUser(actor_id): AuthUser,
    Json(payload): Json<CreateKuri>,
) -> Result<(StatusCode, Json<Kuri>), ApiError> {
    let actor = require_user(state.users.as_ref(), actor_id).await?;
    let kuri = engine::create(payload, &actor, OffsetDateTime::now_utc())?;
    state.kuris.insert(kuri.clone()).await?;
    info!(kuri_id = %kuri.id, status = ?kuri.status, "kuri created");
    Ok((StatusCode::CREATED, Json(kuri)))
}

#[instrument(skip(state, payload))]
pub async fn update_kuri(
    State(state): State<AppState>,
    AuthUser(actor_id): AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateKuri>,
) -> Result<Json<Kuri>, ApiError> {
    let actor = require_user(state.users.as_ref(), actor_id).await?;
    let mut kuri = load_kuri(&state, id).await?;
    if !policy::can_manage(&actor, &kuri) {
        return Err(ApiError::Forbidden("Only kuri admin can edit this kuri"));
    }
    engine::apply_update(&mut kuri, payload)?;
    let kuri = save(&state, kuri).await?;
    Ok(Json(kuri))
}

#[instrument(skip(state))]
pub async fn delete_kuri(
    State(state): State<AppState>,
    AuthUser(actor_id): AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<Ack>, ApiError> {
    let actor = require_user(state.users.as_ref(), actor_id).await?;
    let kuri = load_kuri(&state, id).await?;
    if !policy::can_manage(&actor, &kuri) {
        return Err(ApiError::Forbidden("Only kuri admin can delete this kuri"));
    }
    if !state.kuris.delete(kuri.id).await? {
        return Err(ApiError::NotFound("Kuri"));
    }
    info!(kuri_id = %id, "kuri deleted");
    Ok(Json(Ack {
        success: true,
        message: "Kuri deleted",
    }))
}

/// Direct winner assignment, gated on the month's taken date. Present in
/// every deployment: in `nominate` deployments this is also how the admin
/// seeds the incumbent the hand-off workflow starts from.
#[instrument(skip(state, payload))]
pub async fn assign_winner(
    State(state): State<AppState>,
    AuthUser(actor_id): AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<AssignWinnerRequest>,
) -> Result<Json<Kuri>, ApiError> {
    let actor = require_user(state.users.as_ref(), actor_id).await?;
    let mut kuri = load_kuri(&state, id).await?;
    if !policy::can_manage(&actor, &kuri) {
        return Err(ApiError::Forbidden("Only kuri admin can assign winners"));
    }
    engine::assign_winner(
        &mut kuri,
        payload.month,
        payload.member_id,
        OffsetDateTime::now_utc(),
    )?;
    let kuri = save(&state, kuri).await?;
    info!(kuri_id = %id, month = payload.month, "winner assigned");
    Ok(Json(kuri))
}

#[instrument(skip(state, payload))]
pub async fn nominate_winner(
    State(state): State<AppState>,
    AuthUser(actor_id): AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<NominateRequest>,
) -> Result<Json<Nomination>, ApiError> {
    require_nomination_policy(&state)?;
    let mut kuri = load_kuri(&state, id).await?;
    let nomination = engine::nominate(
        &mut kuri,
        payload.month,
        actor_id,
        payload.nominated_member_id,
        OffsetDateTime::now_utc(),
    )?;
    save(&state, kuri).await?;
    info!(kuri_id = %id, month = payload.month, "winner nominated");
    Ok(Json(nomination))
}

#[instrument(skip(state, payload))]
pub async fn approve_nomination(
    State(state): State<AppState>,
    AuthUser(actor_id): AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<DecideNominationRequest>,
) -> Result<Json<Kuri>, ApiError> {
    require_nomination_policy(&state)?;
    let mut kuri = load_kuri(&state, id).await?;
    engine::decide_nomination(
        &mut kuri,
        payload.month,
        actor_id,
        payload.approve,
        OffsetDateTime::now_utc(),
    )?;
    let kuri = save(&state, kuri).await?;
    info!(kuri_id = %id, month = payload.month, approve = payload.approve, "nomination decided");
    Ok(Json(kuri))
}

#[instrument(skip(state, payload))]
pub async fn set_payment(
    State(state): State<AppState>,
    AuthUser(actor_id): AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<SetPaymentRequest>,
) -> Result<Json<Payment>, ApiError> {
    let actor = require_user(state.users.as_ref(), actor_id).await?;
    let mut kuri = load_kuri(&state, id).await?;
    if !policy::can_manage(&actor, &kuri) {
        return Err(ApiError::Forbidden("Only kuri admin can record payments"));
    }
    let payment = engine::set_payment(
        &mut kuri,
        payload.member_id,
        payload.month,
        payload.status,
        OffsetDateTime::now_utc(),
    )?;
    save(&state, kuri).await?;
    Ok(Json(payment))
}

/// Collection figures for one month. Owners and admins get the full
/// report with per-member flags; a plain member only learns their own
/// status.
#[instrument(skip(state))]
pub async fn analytics(
    State(state): State<AppState>,
    AuthUser(actor_id): AuthUser,
    Path(id): Path<Uuid>,
    Query(query): Query<AnalyticsQuery>,
) -> Result<Json<AnalyticsResponse>, ApiError> {
    let actor = require_user(state.users.as_ref(), actor_id).await?;
    let kuri = load_kuri(&state, id).await?;

    if policy::can_manage(&actor, &kuri) {
        let stats = engine::month_analytics(&kuri, query.month);
        let members = kuri
            .member_ids
            .iter()
            .map(|m| MemberPaid {
                member_id: *m,
                paid: engine::has_paid(&kuri, *m, query.month),
            })
            .collect();
        return Ok(Json(AnalyticsResponse::Full(CollectionReport {
            month: query.month,
            stats,
            members,
        })));
    }

    if !kuri.is_member(actor.id) {
        return Err(ApiError::Forbidden("You are not part of this kuri"));
    }
    Ok(Json(AnalyticsResponse::Mine(MemberCollectionView {
        month: query.month,
        has_paid: engine::has_paid(&kuri, actor.id, query.month),
    })))
}
