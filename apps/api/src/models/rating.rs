use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Row of `avaliacoes`. Unique per (user_id, itinerario_id, atividade_id).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Rating {
    pub id: Uuid,
    pub user_id: Uuid,
    pub itinerario_id: Uuid,
    pub atividade_id: Uuid,
    pub nota: i32,
    pub comentario: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct NewRating {
    pub user_id: Uuid,
    pub itinerario_id: Uuid,
    pub atividade_id: Uuid,
    pub nota: i32,
    pub comentario: Option<String>,
}
