pub mod health;

use axum::{
    routing::{get, patch, post},
    Router,
};

use crate::itinerarios::handlers as itinerarios;
use crate::ratings::handlers as ratings;
use crate::roteiros::handlers as roteiros;
use crate::social::handlers as social;
use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_handler))
        // Roteiros and conversion
        .route(
            "/api/v1/roteiros",
            get(roteiros::handle_list_roteiros).post(roteiros::handle_create_roteiro),
        )
        .route("/api/v1/roteiros/:id", get(roteiros::handle_get_roteiro))
        .route(
            "/api/v1/roteiros/:id/conversion",
            get(itinerarios::handle_preview_conversion),
        )
        .route("/api/v1/roteiros/:id/convert", post(itinerarios::handle_convert))
        // Itinerario execution
        .route("/api/v1/itinerarios", get(itinerarios::handle_list_itinerarios))
        .route("/api/v1/itinerarios/:id", get(itinerarios::handle_get_itinerario))
        .route("/api/v1/itinerarios/:id/start", post(itinerarios::handle_start))
        .route(
            "/api/v1/itinerarios/:id/activities/:link_id",
            patch(itinerarios::handle_toggle_activity),
        )
        // Ratings
        .route(
            "/api/v1/itinerarios/:id/ratings",
            get(ratings::handle_rating_sheet).put(ratings::handle_rate),
        )
        .route(
            "/api/v1/itinerarios/:id/ratings/summary",
            get(ratings::handle_itinerario_stats),
        )
        .route("/api/v1/ratings", get(ratings::handle_rating_history))
        .route("/api/v1/ratings/summary", get(ratings::handle_rated_itineraries))
        // Social
        .route("/api/v1/feed", get(social::handle_feed))
        .route("/api/v1/profile", get(social::handle_profile))
        .with_state(state)
}
