// Itinerarios: dated trip plans converted from roteiros, then executed activity by activity.

pub mod converter;
pub mod execution;
pub mod handlers;
pub mod lifecycle;
pub mod listing;
