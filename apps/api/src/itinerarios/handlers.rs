use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::AppError;
use crate::itinerarios::converter::{convert, preview, ConversionPreview, ConversionResult, ConvertRequest};
use crate::itinerarios::execution::{
    load_execution, start, toggle_activity, ExecutionView, ToggleOutcome,
};
use crate::itinerarios::lifecycle::StatusTransition;
use crate::itinerarios::listing::{list_itinerarios, ItinerarioSummary};
use crate::models::itinerario::ItinerarioStatus;
use crate::session::Session;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct ListParams {
    pub status: Option<ItinerarioStatus>,
}

#[derive(Debug, Deserialize)]
pub struct ToggleRequest {
    pub completed: bool,
}

#[derive(Debug, Serialize)]
pub struct StartResponse {
    pub transition: StatusTransition,
    pub itinerario: ExecutionView,
}

/// GET /api/v1/roteiros/:id/conversion
pub async fn handle_preview_conversion(
    State(state): State<AppState>,
    session: Session,
    Path(roteiro_id): Path<Uuid>,
) -> Result<Json<ConversionPreview>, AppError> {
    let preview = preview(
        state.store.as_ref(),
        &session,
        roteiro_id,
        &state.config.default_activity_time,
    )
    .await?;
    Ok(Json(preview))
}

/// POST /api/v1/roteiros/:id/convert
pub async fn handle_convert(
    State(state): State<AppState>,
    session: Session,
    Path(roteiro_id): Path<Uuid>,
    Json(request): Json<ConvertRequest>,
) -> Result<(StatusCode, Json<ConversionResult>), AppError> {
    let result = convert(
        state.store.as_ref(),
        &session,
        roteiro_id,
        request,
        &state.config.default_activity_time,
    )
    .await?;
    Ok((StatusCode::CREATED, Json(result)))
}

/// GET /api/v1/itinerarios
pub async fn handle_list_itinerarios(
    State(state): State<AppState>,
    session: Session,
    Query(params): Query<ListParams>,
) -> Result<Json<Vec<ItinerarioSummary>>, AppError> {
    Ok(Json(
        list_itinerarios(state.store.as_ref(), &session, params.status).await?,
    ))
}

/// GET /api/v1/itinerarios/:id
pub async fn handle_get_itinerario(
    State(state): State<AppState>,
    session: Session,
    Path(id): Path<Uuid>,
) -> Result<Json<ExecutionView>, AppError> {
    let execution = load_execution(state.store.as_ref(), &session, id).await?;
    Ok(Json(execution.into()))
}

/// POST /api/v1/itinerarios/:id/start
pub async fn handle_start(
    State(state): State<AppState>,
    session: Session,
    Path(id): Path<Uuid>,
) -> Result<Json<StartResponse>, AppError> {
    let store = state.store.as_ref();
    let mut execution = load_execution(store, &session, id).await?;
    let transition = start(store, &session, &mut execution).await?;
    Ok(Json(StartResponse {
        transition,
        itinerario: execution.into(),
    }))
}

/// PATCH /api/v1/itinerarios/:id/activities/:link_id
pub async fn handle_toggle_activity(
    State(state): State<AppState>,
    session: Session,
    Path((id, link_id)): Path<(Uuid, Uuid)>,
    Json(request): Json<ToggleRequest>,
) -> Result<Json<ToggleOutcome>, AppError> {
    let store = state.store.as_ref();
    let mut execution = load_execution(store, &session, id).await?;
    let outcome = toggle_activity(store, &session, &mut execution, link_id, request.completed).await?;
    Ok(Json(outcome))
}
