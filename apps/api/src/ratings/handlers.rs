use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use uuid::Uuid;

use crate::errors::AppError;
use crate::ratings::aggregation::{
    itinerario_stats, rated_itineraries, rating_history, rating_sheet, RatingHistoryEntry,
    RatingSheet, RatingStats,
};
use crate::ratings::upsert::{rate, RateOutcome};
use crate::ratings::validation::RatingInput;
use crate::session::Session;
use crate::state::AppState;

/// GET /api/v1/itinerarios/:id/ratings
pub async fn handle_rating_sheet(
    State(state): State<AppState>,
    session: Session,
    Path(id): Path<Uuid>,
) -> Result<Json<RatingSheet>, AppError> {
    Ok(Json(rating_sheet(state.store.as_ref(), &session, id).await?))
}

/// PUT /api/v1/itinerarios/:id/ratings
pub async fn handle_rate(
    State(state): State<AppState>,
    session: Session,
    Path(id): Path<Uuid>,
    Json(input): Json<RatingInput>,
) -> Result<(StatusCode, Json<RateOutcome>), AppError> {
    let outcome = rate(state.store.as_ref(), &session, id, input).await?;
    let status = if outcome.created {
        StatusCode::CREATED
    } else {
        StatusCode::OK
    };
    Ok((status, Json(outcome)))
}

/// GET /api/v1/itinerarios/:id/ratings/summary
pub async fn handle_itinerario_stats(
    State(state): State<AppState>,
    session: Session,
    Path(id): Path<Uuid>,
) -> Result<Json<RatingStats>, AppError> {
    Ok(Json(itinerario_stats(state.store.as_ref(), &session, id).await?))
}

/// GET /api/v1/ratings
pub async fn handle_rating_history(
    State(state): State<AppState>,
    session: Session,
) -> Result<Json<Vec<RatingHistoryEntry>>, AppError> {
    Ok(Json(rating_history(state.store.as_ref(), &session).await?))
}

/// GET /api/v1/ratings/summary
pub async fn handle_rated_itineraries(
    State(state): State<AppState>,
    session: Session,
) -> Result<Json<Vec<RatingStats>>, AppError> {
    Ok(Json(rated_itineraries(state.store.as_ref(), &session).await?))
}
