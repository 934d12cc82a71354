//! Roteiro → Itinerario conversion.
//!
//! The client loads a roteiro's activities as an [`ActivitySequence`], reorders it and sets
//! per-activity times locally, then commits once. Commit creates the itinerario and all of
//! its links through `insert_with_children`, every link on day 1.

use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{info, warn};
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::itinerario::{ItinerarioStatus, NewItinerario, NewItinerarioActivityLink};
use crate::models::roteiro::Roteiro;
use crate::roteiros::catalog::{load_roteiro, load_roteiro_activities, RoteiroActivity};
use crate::session::Session;
use crate::store::{encode_row, ChildRows, Table, TableStore};

/// Every converted activity lands on the first day; spreading them out is left to the user.
pub const CONVERTED_DAY: i32 = 1;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlannedActivity {
    pub activity_id: Uuid,
    pub name: String,
    pub place: String,
    pub time: String,
}

/// Ordered, in-memory list of activities being arranged for conversion.
/// Position in the list is the order that gets persisted.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct ActivitySequence {
    items: Vec<PlannedActivity>,
}

impl ActivitySequence {
    pub fn new(items: Vec<PlannedActivity>) -> Self {
        Self { items }
    }

    pub fn from_roteiro(activities: Vec<RoteiroActivity>, default_time: &str) -> Self {
        Self::new(
            activities
                .into_iter()
                .map(|a| PlannedActivity {
                    activity_id: a.activity_id,
                    name: a.name,
                    place: a.place,
                    time: default_time.to_string(),
                })
                .collect(),
        )
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Moves the element at `from` to index `to`; everything in between shifts by one.
    pub fn move_element(&mut self, from: usize, to: usize) -> Result<(), AppError> {
        let len = self.items.len();
        if from >= len || to >= len {
            return Err(AppError::Validation(format!(
                "cannot move activity from position {from} to {to} in a list of {len}"
            )));
        }
        if from != to {
            let item = self.items.remove(from);
            self.items.insert(to, item);
        }
        Ok(())
    }

    /// Drag-end form: move the `active` activity to where `over` currently sits.
    pub fn move_item(&mut self, active: Uuid, over: Uuid) -> Result<(), AppError> {
        let from = self.position(active)?;
        let to = self.position(over)?;
        self.move_element(from, to)
    }

    /// Sets the time for every row of `activity_id`; returns how many rows changed.
    pub fn set_time(&mut self, activity_id: Uuid, time: &str) -> Result<usize, AppError> {
        let normalized = normalize_time(time)?;
        let mut touched = 0;
        for item in self.items.iter_mut().filter(|i| i.activity_id == activity_id) {
            item.time = normalized.clone();
            touched += 1;
        }
        if touched == 0 {
            return Err(AppError::Validation(format!(
                "activity {activity_id} is not part of this roteiro"
            )));
        }
        Ok(touched)
    }

    fn position(&self, activity_id: Uuid) -> Result<usize, AppError> {
        self.items
            .iter()
            .position(|i| i.activity_id == activity_id)
            .ok_or_else(|| {
                AppError::Validation(format!("activity {activity_id} is not part of this roteiro"))
            })
    }

    fn into_links(self) -> Vec<NewItinerarioActivityLink> {
        self.items
            .into_iter()
            .enumerate()
            .map(|(i, item)| NewItinerarioActivityLink {
                atividade_id: item.activity_id,
                dia: CONVERTED_DAY,
                horario: Some(item.time),
                ordem: i as i32,
                concluida: false,
            })
            .collect()
    }
}

/// `ceil((end − start) / 1 day) + 1`; whole dates make the ceiling exact.
pub fn day_count(start: NaiveDate, end: NaiveDate) -> i64 {
    (end - start).num_days() + 1
}

pub fn parse_time(raw: &str) -> Result<NaiveTime, AppError> {
    let raw = raw.trim();
    NaiveTime::parse_from_str(raw, "%H:%M")
        .or_else(|_| NaiveTime::parse_from_str(raw, "%H:%M:%S"))
        .map_err(|_| AppError::Validation(format!("'{raw}' is not a time of day (HH:MM)")))
}

fn normalize_time(raw: &str) -> Result<String, AppError> {
    Ok(parse_time(raw)?.format("%H:%M").to_string())
}

// ────────────────────────────────────────────────────────────────────────────
// Request / Response types
// ────────────────────────────────────────────────────────────────────────────

/// One reorder step: by list position, or drag-end style by activity id.
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(untagged)]
pub enum Move {
    Position { from: usize, to: usize },
    Drag { active: Uuid, over: Uuid },
}

#[derive(Debug, Clone, Deserialize)]
pub struct TimeAssignment {
    pub activity_id: Uuid,
    pub time: String,
}

#[derive(Debug, Deserialize)]
pub struct ConvertRequest {
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    #[serde(default)]
    pub place: Option<String>,
    /// Applied in order to the roteiro's stored sequence.
    #[serde(default)]
    pub moves: Vec<Move>,
    #[serde(default)]
    pub times: Vec<TimeAssignment>,
}

#[derive(Debug, Serialize)]
pub struct ConversionPreview {
    pub roteiro: Roteiro,
    pub activities: ActivitySequence,
}

#[derive(Debug, Serialize)]
pub struct ConversionResult {
    pub itinerario_id: Uuid,
    pub day_count: i64,
    pub activity_count: usize,
}

// ────────────────────────────────────────────────────────────────────────────
// Operations
// ────────────────────────────────────────────────────────────────────────────

/// Loads the roteiro's activities in stored order, each with the default time.
pub async fn preview(
    store: &dyn TableStore,
    session: &Session,
    roteiro_id: Uuid,
    default_time: &str,
) -> Result<ConversionPreview, AppError> {
    let roteiro = load_roteiro(store, session, roteiro_id).await?;
    let activities = load_roteiro_activities(store, roteiro_id).await?;
    Ok(ConversionPreview {
        roteiro,
        activities: ActivitySequence::from_roteiro(activities, default_time),
    })
}

pub async fn convert(
    store: &dyn TableStore,
    session: &Session,
    roteiro_id: Uuid,
    request: ConvertRequest,
    default_time: &str,
) -> Result<ConversionResult, AppError> {
    let (start, end) = match (request.start_date, request.end_date) {
        (Some(start), Some(end)) => (start, end),
        _ => {
            return Err(AppError::Validation(
                "Start and end dates are required".to_string(),
            ))
        }
    };
    for assignment in &request.times {
        parse_time(&assignment.time)?;
    }

    let ConversionPreview {
        roteiro,
        mut activities,
    } = preview(store, session, roteiro_id, default_time).await?;

    for step in &request.moves {
        match *step {
            Move::Position { from, to } => activities.move_element(from, to)?,
            Move::Drag { active, over } => activities.move_item(active, over)?,
        }
    }
    for assignment in &request.times {
        activities.set_time(assignment.activity_id, &assignment.time)?;
    }

    let days = day_count(start, end);
    if end < start {
        warn!("Converting roteiro {roteiro_id} with end date {end} before start date {start}");
    }
    let dias = i32::try_from(days)
        .map_err(|_| AppError::Validation(format!("date range of {days} days is too long")))?;

    let itinerario = NewItinerario {
        user_id: session.user_id,
        roteiro_id: Some(roteiro.id),
        titulo: roteiro.titulo,
        descricao: roteiro.descricao,
        local: request.place.filter(|p| !p.trim().is_empty()),
        data_inicio: start,
        data_fim: end,
        dias,
        status: ItinerarioStatus::Planned,
    };
    if activities.is_empty() {
        warn!("Roteiro {roteiro_id} has no activities; its itinerario can only be started");
    }
    let activity_count = activities.len();
    let links = activities
        .into_links()
        .iter()
        .map(|link| encode_row(Table::AtividadesItinerario, link))
        .collect::<Result<Vec<_>, _>>()?;

    let (row, _) = store
        .insert_with_children(
            Table::Itinerarios,
            encode_row(Table::Itinerarios, &itinerario)?,
            ChildRows {
                table: Table::AtividadesItinerario,
                parent_key: "itinerario_id",
                rows: links,
            },
        )
        .await?;

    let itinerario_id = row
        .get("id")
        .and_then(Value::as_str)
        .and_then(|s| Uuid::parse_str(s).ok())
        .ok_or_else(|| AppError::Internal(anyhow::anyhow!("itinerario insert returned no id")))?;

    info!(
        "Converted roteiro {roteiro_id} into itinerario {itinerario_id} ({days} days, {activity_count} activities)"
    );

    Ok(ConversionResult {
        itinerario_id,
        day_count: days,
        activity_count,
    })
}
