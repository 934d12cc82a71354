use serde::Serialize;
use serde_json::json;
use tracing::info;
use uuid::Uuid;

use crate::errors::AppError;
use crate::itinerarios::execution::load_itinerario;
use crate::models::itinerario::ItinerarioActivityLink;
use crate::models::rating::{NewRating, Rating};
use crate::ratings::validation::{validate_rating, RatingInput};
use crate::session::Session;
use crate::store::{fetch_one, fetch_optional, insert_one, row, Filter, Query, Table, TableStore};

#[derive(Debug, Serialize)]
pub struct RateOutcome {
    pub rating: Rating,
    /// False when an existing rating was overwritten.
    pub created: bool,
}

/// Rates one activity of an itinerario the user owns.
///
/// At most one rating exists per (user, itinerario, activity): an existing one is updated
/// in place, otherwise a new row is inserted.
pub async fn rate(
    store: &dyn TableStore,
    session: &Session,
    itinerario_id: Uuid,
    input: RatingInput,
) -> Result<RateOutcome, AppError> {
    let valid = validate_rating(input.score, input.comment.as_deref())?;
    let activity_id = input.activity_id;

    load_itinerario(store, session, itinerario_id).await?;
    let linked: Option<ItinerarioActivityLink> = fetch_optional(
        store,
        &Query::from(Table::AtividadesItinerario)
            .eq("itinerario_id", json!(itinerario_id))
            .eq("atividade_id", json!(activity_id)),
    )
    .await?;
    if linked.is_none() {
        return Err(AppError::NotFound(format!(
            "Activity {activity_id} is not part of itinerario {itinerario_id}"
        )));
    }

    let key = Query::from(Table::Avaliacoes)
        .eq("user_id", json!(session.user_id))
        .eq("itinerario_id", json!(itinerario_id))
        .eq("atividade_id", json!(activity_id));
    let existing: Option<Rating> = fetch_optional(store, &key).await?;

    match existing {
        Some(current) => {
            store
                .update(
                    Table::Avaliacoes,
                    row(json!({ "nota": valid.nota, "comentario": valid.comentario })),
                    &[Filter::eq("id", json!(current.id))],
                )
                .await?;
            let rating: Rating = fetch_one(
                store,
                &Query::from(Table::Avaliacoes).eq("id", json!(current.id)),
            )
            .await?;
            info!(
                "User {} re-rated activity {activity_id} in itinerario {itinerario_id}: {} -> {}",
                session.user_id, current.nota, rating.nota
            );
            Ok(RateOutcome {
                rating,
                created: false,
            })
        }
        None => {
            let rating: Rating = insert_one(
                store,
                Table::Avaliacoes,
                &NewRating {
                    user_id: session.user_id,
                    itinerario_id,
                    atividade_id: activity_id,
                    nota: valid.nota,
                    comentario: valid.comentario,
                },
            )
            .await?;
            info!(
                "User {} rated activity {activity_id} in itinerario {itinerario_id}: {}",
                session.user_id, rating.nota
            );
            Ok(RateOutcome {
                rating,
                created: true,
            })
        }
    }
}
