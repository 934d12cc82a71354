// Roteiros: reusable, undated activity templates and the activity catalog they draw from.

pub mod catalog;
pub mod handlers;
