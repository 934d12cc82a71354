use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Catalog entry in `atividades`. Created ad hoc, never deleted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Activity {
    pub id: Uuid,
    pub nome: String,
    pub local: String,
    pub descricao: Option<String>,
    pub foto_url: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewActivity {
    pub nome: String,
    pub local: String,
    #[serde(default)]
    pub descricao: Option<String>,
    #[serde(default)]
    pub foto_url: Option<String>,
}
