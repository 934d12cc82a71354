// Ratings: one 1-5 score (plus optional comment) per user, itinerario and activity.

pub mod aggregation;
pub mod handlers;
pub mod upsert;
pub mod validation;
