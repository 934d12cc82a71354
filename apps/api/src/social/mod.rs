// Social: read-only trip feed and the current user's profile.

pub mod feed;
pub mod handlers;
