use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use uuid::Uuid;

use crate::errors::AppError;
use crate::roteiros::catalog::{
    create_roteiro, get_roteiro, list_roteiros, CreateRoteiroRequest, RoteiroDetail,
    RoteiroSummary,
};
use crate::session::Session;
use crate::state::AppState;

/// GET /api/v1/roteiros
pub async fn handle_list_roteiros(
    State(state): State<AppState>,
    session: Session,
) -> Result<Json<Vec<RoteiroSummary>>, AppError> {
    Ok(Json(list_roteiros(state.store.as_ref(), &session).await?))
}

/// POST /api/v1/roteiros
pub async fn handle_create_roteiro(
    State(state): State<AppState>,
    session: Session,
    Json(request): Json<CreateRoteiroRequest>,
) -> Result<(StatusCode, Json<RoteiroDetail>), AppError> {
    let detail = create_roteiro(state.store.as_ref(), &session, request).await?;
    Ok((StatusCode::CREATED, Json(detail)))
}

/// GET /api/v1/roteiros/:id
pub async fn handle_get_roteiro(
    State(state): State<AppState>,
    session: Session,
    Path(id): Path<Uuid>,
) -> Result<Json<RoteiroDetail>, AppError> {
    Ok(Json(get_roteiro(state.store.as_ref(), &session, id).await?))
}
