//! Execution engine: start an itinerario, check off its activities, and complete it
//! automatically once every activity is done.
//!
//! Every operation works on an [`ItinerarioExecution`] snapshot. Writes go to the store
//! first; the snapshot only mirrors a change after the write has landed.

use chrono::Utc;
use serde::Serialize;
use serde_json::json;
use tracing::info;
use uuid::Uuid;

use crate::errors::AppError;
use crate::itinerarios::lifecycle::{all_completed, LifecycleEvent, StatusTransition};
use crate::models::itinerario::{Itinerario, ItinerarioActivityLink, ItinerarioStatus};
use crate::roteiros::catalog::fetch_activities;
use crate::session::Session;
use crate::store::{fetch_all, fetch_optional, row, Filter, Query, Table, TableStore};

#[derive(Debug, Clone, Serialize)]
pub struct ExecutionActivity {
    pub link_id: Uuid,
    pub activity_id: Uuid,
    pub name: String,
    pub place: String,
    pub day: i32,
    pub time: Option<String>,
    pub order: i32,
    pub completed: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Progress {
    pub completed: usize,
    pub total: usize,
    /// Rounded to the nearest whole percent; 0 when there is nothing to do.
    pub percent: u8,
}

impl Progress {
    pub fn new(completed: usize, total: usize) -> Self {
        let percent = if total == 0 {
            0
        } else {
            ((completed as f64 / total as f64) * 100.0).round() as u8
        };
        Progress {
            completed,
            total,
            percent,
        }
    }

    pub fn of<I: IntoIterator<Item = bool>>(flags: I) -> Self {
        let (completed, total) = flags
            .into_iter()
            .fold((0, 0), |(done, all), flag| (done + usize::from(flag), all + 1));
        Progress::new(completed, total)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ItinerarioExecution {
    pub itinerario: Itinerario,
    pub activities: Vec<ExecutionActivity>,
}

impl ItinerarioExecution {
    pub fn status(&self) -> ItinerarioStatus {
        self.itinerario.status
    }

    pub fn progress(&self) -> Progress {
        Progress::of(self.activities.iter().map(|a| a.completed))
    }
}

#[derive(Debug, Serialize)]
pub struct ExecutionView {
    #[serde(flatten)]
    pub execution: ItinerarioExecution,
    pub progress: Progress,
}

impl From<ItinerarioExecution> for ExecutionView {
    fn from(execution: ItinerarioExecution) -> Self {
        let progress = execution.progress();
        ExecutionView {
            execution,
            progress,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ToggleOutcome {
    pub link_id: Uuid,
    pub completed: bool,
    /// Set when this toggle finished the itinerario.
    pub transition: Option<StatusTransition>,
    pub status: ItinerarioStatus,
    pub progress: Progress,
}

pub async fn load_itinerario(
    store: &dyn TableStore,
    session: &Session,
    itinerario_id: Uuid,
) -> Result<Itinerario, AppError> {
    let query = Query::from(Table::Itinerarios).eq("id", json!(itinerario_id));
    let itinerario: Itinerario = fetch_optional(store, &query)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Itinerario {itinerario_id} not found")))?;
    session.ensure_owner(itinerario.user_id)?;
    Ok(itinerario)
}

/// Loads the itinerario with its activities in stored order.
pub async fn load_execution(
    store: &dyn TableStore,
    session: &Session,
    itinerario_id: Uuid,
) -> Result<ItinerarioExecution, AppError> {
    let itinerario = load_itinerario(store, session, itinerario_id).await?;

    let links: Vec<ItinerarioActivityLink> = fetch_all(
        store,
        &Query::from(Table::AtividadesItinerario)
            .eq("itinerario_id", json!(itinerario_id))
            .order_by("ordem", true),
    )
    .await?;
    let ids: Vec<Uuid> = links.iter().map(|l| l.atividade_id).collect();
    let catalog = fetch_activities(store, &ids).await?;

    let activities = links
        .into_iter()
        .map(|link| {
            let activity = catalog.get(&link.atividade_id).ok_or_else(|| {
                AppError::NotFound(format!(
                    "Activity {} referenced by itinerario {itinerario_id} not found",
                    link.atividade_id
                ))
            })?;
            Ok(ExecutionActivity {
                link_id: link.id,
                activity_id: link.atividade_id,
                name: activity.nome.clone(),
                place: activity.local.clone(),
                day: link.dia,
                time: link.horario,
                order: link.ordem,
                completed: link.concluida,
            })
        })
        .collect::<Result<Vec<_>, AppError>>()?;

    Ok(ItinerarioExecution {
        itinerario,
        activities,
    })
}

async fn persist_status(
    store: &dyn TableStore,
    execution: &mut ItinerarioExecution,
    event: LifecycleEvent,
) -> Result<StatusTransition, AppError> {
    let from = execution.status();
    let to = from.apply(event)?;
    let now = Utc::now();

    let touched = store
        .update(
            Table::Itinerarios,
            row(json!({ "status": to, "updated_at": now })),
            &[
                Filter::eq("id", json!(execution.itinerario.id)),
                Filter::eq("user_id", json!(execution.itinerario.user_id)),
            ],
        )
        .await?;
    if touched == 0 {
        return Err(AppError::NotFound(format!(
            "Itinerario {} not found",
            execution.itinerario.id
        )));
    }

    execution.itinerario.status = to;
    execution.itinerario.updated_at = now;
    info!("Itinerario {} moved {from} -> {to}", execution.itinerario.id);
    Ok(StatusTransition { from, to })
}

/// planned → in_progress.
pub async fn start(
    store: &dyn TableStore,
    session: &Session,
    execution: &mut ItinerarioExecution,
) -> Result<StatusTransition, AppError> {
    session.ensure_owner(execution.itinerario.user_id)?;
    persist_status(store, execution, LifecycleEvent::Start).await
}

/// Marks one activity done or not done. If that leaves every activity done, the
/// itinerario is completed in the same call. Unchecking never reverts a completed status.
pub async fn toggle_activity(
    store: &dyn TableStore,
    session: &Session,
    execution: &mut ItinerarioExecution,
    link_id: Uuid,
    completed: bool,
) -> Result<ToggleOutcome, AppError> {
    session.ensure_owner(execution.itinerario.user_id)?;
    let index = execution
        .activities
        .iter()
        .position(|a| a.link_id == link_id)
        .ok_or_else(|| {
            AppError::NotFound(format!(
                "Activity link {link_id} is not part of itinerario {}",
                execution.itinerario.id
            ))
        })?;

    let touched = store
        .update(
            Table::AtividadesItinerario,
            row(json!({ "concluida": completed })),
            &[
                Filter::eq("id", json!(link_id)),
                Filter::eq("itinerario_id", json!(execution.itinerario.id)),
            ],
        )
        .await?;
    if touched == 0 {
        return Err(AppError::NotFound(format!("Activity link {link_id} not found")));
    }
    execution.activities[index].completed = completed;

    let transition = if !execution.status().is_terminal()
        && all_completed(execution.activities.iter().map(|a| a.completed))
    {
        Some(complete(store, execution).await?)
    } else {
        None
    };

    Ok(ToggleOutcome {
        link_id,
        completed,
        transition,
        status: execution.status(),
        progress: execution.progress(),
    })
}

/// Derived completion; only reached from `toggle_activity`.
async fn complete(
    store: &dyn TableStore,
    execution: &mut ItinerarioExecution,
) -> Result<StatusTransition, AppError> {
    let transition = persist_status(store, execution, LifecycleEvent::Complete).await?;
    info!(
        "Itinerario {} completed: all {} activities done",
        execution.itinerario.id,
        execution.activities.len()
    );
    Ok(transition)
}
