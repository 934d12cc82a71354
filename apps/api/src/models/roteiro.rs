use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::null_as_default;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Roteiro {
    pub id: Uuid,
    pub user_id: Uuid,
    pub titulo: String,
    pub descricao: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct NewRoteiro {
    pub user_id: Uuid,
    pub titulo: String,
    pub descricao: Option<String>,
}

/// Row of `atividades_roteiro`: places a catalog activity at `ordem` within a roteiro.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoteiroActivityLink {
    pub id: Uuid,
    pub roteiro_id: Uuid,
    pub atividade_id: Uuid,
    #[serde(default, deserialize_with = "null_as_default")]
    pub ordem: i32,
    pub created_at: DateTime<Utc>,
}

/// `roteiro_id` is stamped by the store when inserted together with the roteiro.
#[derive(Debug, Clone, Serialize)]
pub struct NewRoteiroActivityLink {
    pub atividade_id: Uuid,
    pub ordem: i32,
}
