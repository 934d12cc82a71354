use axum::{
    extract::{Query, State},
    Json,
};
use serde::Deserialize;

use crate::errors::AppError;
use crate::models::social::Profile;
use crate::session::Session;
use crate::social::feed::{feed, own_profile, FeedPost};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct FeedParams {
    pub limit: Option<usize>,
}

/// GET /api/v1/feed
pub async fn handle_feed(
    State(state): State<AppState>,
    _session: Session,
    Query(params): Query<FeedParams>,
) -> Result<Json<Vec<FeedPost>>, AppError> {
    let limit = params.limit.unwrap_or(state.config.feed_page_size);
    Ok(Json(feed(state.store.as_ref(), limit).await?))
}

/// GET /api/v1/profile
pub async fn handle_profile(
    State(state): State<AppState>,
    session: Session,
) -> Result<Json<Profile>, AppError> {
    Ok(Json(own_profile(state.store.as_ref(), &session).await?))
}
