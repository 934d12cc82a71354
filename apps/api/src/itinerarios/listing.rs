use std::collections::HashMap;

use serde::Serialize;
use serde_json::json;
use uuid::Uuid;

use crate::errors::AppError;
use crate::itinerarios::execution::Progress;
use crate::models::itinerario::{Itinerario, ItinerarioStatus};
use crate::session::Session;
use crate::store::{fetch_all, Query, Table, TableStore};

#[derive(Debug, Serialize)]
pub struct ItinerarioSummary {
    #[serde(flatten)]
    pub itinerario: Itinerario,
    pub progress: Progress,
}

/// The user's itinerarios, newest first, with completion progress.
///
/// The status filter runs after decoding so rows stored with a null status count as planned.
pub async fn list_itinerarios(
    store: &dyn TableStore,
    session: &Session,
    status: Option<ItinerarioStatus>,
) -> Result<Vec<ItinerarioSummary>, AppError> {
    let query = Query::from(Table::Itinerarios)
        .eq("user_id", json!(session.user_id))
        .order_by("created_at", false);
    let itinerarios: Vec<Itinerario> = fetch_all(store, &query).await?;
    let itinerarios: Vec<Itinerario> = itinerarios
        .into_iter()
        .filter(|i| status.map_or(true, |wanted| i.status == wanted))
        .collect();
    if itinerarios.is_empty() {
        return Ok(Vec::new());
    }

    let links = store
        .select(
            &Query::from(Table::AtividadesItinerario)
                .columns(&["itinerario_id", "concluida"])
                .is_in("itinerario_id", itinerarios.iter().map(|i| json!(i.id)).collect()),
        )
        .await?;

    let mut tally: HashMap<Uuid, (usize, usize)> = HashMap::new();
    for link in links {
        let Some(id) = link
            .get("itinerario_id")
            .and_then(|v| v.as_str())
            .and_then(|s| Uuid::parse_str(s).ok())
        else {
            continue;
        };
        let done = link.get("concluida").and_then(|v| v.as_bool()).unwrap_or(false);
        let entry = tally.entry(id).or_default();
        entry.0 += usize::from(done);
        entry.1 += 1;
    }

    Ok(itinerarios
        .into_iter()
        .map(|itinerario| {
            let (completed, total) = tally.get(&itinerario.id).copied().unwrap_or((0, 0));
            ItinerarioSummary {
                itinerario,
                progress: Progress::new(completed, total),
            }
        })
        .collect())
}
