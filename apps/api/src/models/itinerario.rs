use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::null_as_default;

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub enum ItinerarioStatus {
    #[default]
    #[serde(rename = "planejado")]
    Planned,
    #[serde(rename = "em_andamento")]
    InProgress,
    #[serde(rename = "concluido")]
    Completed,
}

impl ItinerarioStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            ItinerarioStatus::Planned => "planejado",
            ItinerarioStatus::InProgress => "em_andamento",
            ItinerarioStatus::Completed => "concluido",
        }
    }

    /// Position along planned → in_progress → completed.
    pub fn rank(self) -> u8 {
        match self {
            ItinerarioStatus::Planned => 0,
            ItinerarioStatus::InProgress => 1,
            ItinerarioStatus::Completed => 2,
        }
    }
}

impl std::fmt::Display for ItinerarioStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Itinerario {
    pub id: Uuid,
    pub user_id: Uuid,
    pub roteiro_id: Option<Uuid>,
    pub titulo: String,
    pub descricao: Option<String>,
    pub local: Option<String>,
    pub data_inicio: NaiveDate,
    pub data_fim: NaiveDate,
    /// Computed once at creation; never recomputed.
    pub dias: Option<i32>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub status: ItinerarioStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct NewItinerario {
    pub user_id: Uuid,
    pub roteiro_id: Option<Uuid>,
    pub titulo: String,
    pub descricao: Option<String>,
    pub local: Option<String>,
    pub data_inicio: NaiveDate,
    pub data_fim: NaiveDate,
    pub dias: i32,
    pub status: ItinerarioStatus,
}

/// Row of `atividades_itinerario`. Only `concluida` changes after creation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ItinerarioActivityLink {
    pub id: Uuid,
    pub itinerario_id: Uuid,
    pub atividade_id: Uuid,
    pub dia: i32,
    pub horario: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub ordem: i32,
    #[serde(default, deserialize_with = "null_as_default")]
    pub concluida: bool,
    pub created_at: DateTime<Utc>,
}

/// `itinerario_id` is stamped by the store when inserted together with the itinerario.
#[derive(Debug, Clone, Serialize)]
pub struct NewItinerarioActivityLink {
    pub atividade_id: Uuid,
    pub dia: i32,
    pub horario: Option<String>,
    pub ordem: i32,
    pub concluida: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_status_wire_names() {
        assert_eq!(json!(ItinerarioStatus::InProgress), json!("em_andamento"));
        let parsed: ItinerarioStatus = serde_json::from_value(json!("concluido")).unwrap();
        assert_eq!(parsed, ItinerarioStatus::Completed);
    }

    #[test]
    fn test_null_status_reads_as_planned() {
        let row = json!({
            "id": Uuid::new_v4(),
            "user_id": Uuid::new_v4(),
            "roteiro_id": null,
            "titulo": "Lisboa em 3 dias",
            "descricao": null,
            "local": "Lisboa",
            "data_inicio": "2024-03-15",
            "data_fim": "2024-03-17",
            "dias": 3,
            "status": null,
            "created_at": "2024-03-01T10:00:00Z",
            "updated_at": "2024-03-01T10:00:00+00:00"
        });
        let it: Itinerario = serde_json::from_value(row).unwrap();
        assert_eq!(it.status, ItinerarioStatus::Planned);
        assert_eq!(it.dias, Some(3));
    }

    #[test]
    fn test_link_defaults_for_missing_flags() {
        let row = json!({
            "id": Uuid::new_v4(),
            "itinerario_id": Uuid::new_v4(),
            "atividade_id": Uuid::new_v4(),
            "dia": 1,
            "horario": "09:00:00",
            "created_at": "2024-03-01T10:00:00Z"
        });
        let link: ItinerarioActivityLink = serde_json::from_value(row).unwrap();
        assert!(!link.concluida);
        assert_eq!(link.ordem, 0);
    }
}
