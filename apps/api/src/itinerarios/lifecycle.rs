//! Status rules for an itinerario: planned → in_progress → completed, forward only.

use serde::Serialize;

use crate::errors::AppError;
use crate::models::itinerario::ItinerarioStatus;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleEvent {
    /// The traveller begins the trip.
    Start,
    /// Every activity is done. Derived, never requested directly.
    Complete,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StatusTransition {
    pub from: ItinerarioStatus,
    pub to: ItinerarioStatus,
}

impl ItinerarioStatus {
    /// Next status for `event`, or an error if the event is not allowed from here.
    pub fn apply(self, event: LifecycleEvent) -> Result<ItinerarioStatus, AppError> {
        let next = match (self, event) {
            (ItinerarioStatus::Planned, LifecycleEvent::Start) => ItinerarioStatus::InProgress,
            (ItinerarioStatus::Planned | ItinerarioStatus::InProgress, LifecycleEvent::Complete) => {
                ItinerarioStatus::Completed
            }
            (from, event) => {
                return Err(AppError::InvalidTransition(format!(
                    "cannot {} an itinerario that is {from}",
                    match event {
                        LifecycleEvent::Start => "start",
                        LifecycleEvent::Complete => "complete",
                    }
                )))
            }
        };
        debug_assert!(next.rank() > self.rank());
        Ok(next)
    }

    pub fn is_terminal(self) -> bool {
        self == ItinerarioStatus::Completed
    }
}

/// True when there is at least one activity and all of them are done.
/// An empty itinerario never counts as finished.
pub fn all_completed<I>(flags: I) -> bool
where
    I: IntoIterator<Item = bool>,
{
    let mut any = false;
    for done in flags {
        if !done {
            return false;
        }
        any = true;
    }
    any
}
