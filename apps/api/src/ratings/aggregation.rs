//! Read side of ratings: per-itinerario statistics, the rating sheet for one trip, and the
//! user's rating history.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::json;
use tracing::warn;
use uuid::Uuid;

use crate::errors::AppError;
use crate::itinerarios::execution::{load_execution, load_itinerario, Progress};
use crate::models::itinerario::{Itinerario, ItinerarioActivityLink};
use crate::models::rating::Rating;
use crate::roteiros::catalog::fetch_activities;
use crate::session::Session;
use crate::store::{fetch_all, Query, Table, TableStore};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RatingStats {
    pub itinerario_id: Uuid,
    pub titulo: String,
    pub local: Option<String>,
    /// Distinct activities linked to the itinerario.
    pub total_activities: usize,
    pub rated_count: usize,
    /// Mean score, 0 when nothing is rated.
    pub average_score: f64,
}

#[derive(Debug, Serialize)]
pub struct SheetEntry {
    pub link_id: Uuid,
    pub activity_id: Uuid,
    pub name: String,
    pub place: String,
    pub day: i32,
    pub time: Option<String>,
    pub rating: Option<Rating>,
}

#[derive(Debug, Serialize)]
pub struct RatingSheet {
    pub itinerario: Itinerario,
    pub activities: Vec<SheetEntry>,
    pub progress: Progress,
}

#[derive(Debug, Serialize)]
pub struct ActivityRef {
    pub id: Uuid,
    pub name: String,
    pub place: String,
}

#[derive(Debug, Serialize)]
pub struct ItinerarioRef {
    pub id: Uuid,
    pub titulo: String,
    pub local: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct RatingHistoryEntry {
    pub id: Uuid,
    pub score: i32,
    pub comment: Option<String>,
    pub created_at: DateTime<Utc>,
    pub activity: ActivityRef,
    pub itinerario: ItinerarioRef,
}

/// Pure aggregation over one itinerario. Links and ratings for other itinerarios are ignored.
pub fn compute_stats(
    itinerario: &Itinerario,
    links: &[ItinerarioActivityLink],
    ratings: &[Rating],
) -> RatingStats {
    let total_activities = links
        .iter()
        .filter(|l| l.itinerario_id == itinerario.id)
        .map(|l| l.atividade_id)
        .collect::<HashSet<_>>()
        .len();

    let scores: Vec<i32> = ratings
        .iter()
        .filter(|r| r.itinerario_id == itinerario.id)
        .map(|r| r.nota)
        .collect();
    let average_score = if scores.is_empty() {
        0.0
    } else {
        scores.iter().map(|&n| f64::from(n)).sum::<f64>() / scores.len() as f64
    };

    RatingStats {
        itinerario_id: itinerario.id,
        titulo: itinerario.titulo.clone(),
        local: itinerario.local.clone(),
        total_activities,
        rated_count: scores.len(),
        average_score,
    }
}

async fn user_ratings(
    store: &dyn TableStore,
    session: &Session,
    itinerario_ids: &[Uuid],
) -> Result<Vec<Rating>, AppError> {
    let query = Query::from(Table::Avaliacoes)
        .eq("user_id", json!(session.user_id))
        .is_in("itinerario_id", itinerario_ids.iter().map(|id| json!(id)).collect());
    Ok(fetch_all(store, &query).await?)
}

async fn links_of(
    store: &dyn TableStore,
    itinerario_ids: &[Uuid],
) -> Result<Vec<ItinerarioActivityLink>, AppError> {
    let query = Query::from(Table::AtividadesItinerario)
        .is_in("itinerario_id", itinerario_ids.iter().map(|id| json!(id)).collect());
    Ok(fetch_all(store, &query).await?)
}

pub async fn itinerario_stats(
    store: &dyn TableStore,
    session: &Session,
    itinerario_id: Uuid,
) -> Result<RatingStats, AppError> {
    let itinerario = load_itinerario(store, session, itinerario_id).await?;
    let links = links_of(store, &[itinerario_id]).await?;
    let ratings = user_ratings(store, session, &[itinerario_id]).await?;
    Ok(compute_stats(&itinerario, &links, &ratings))
}

/// Stats for every itinerario of the user that has at least one rating, newest first.
pub async fn rated_itineraries(
    store: &dyn TableStore,
    session: &Session,
) -> Result<Vec<RatingStats>, AppError> {
    let itinerarios: Vec<Itinerario> = fetch_all(
        store,
        &Query::from(Table::Itinerarios)
            .eq("user_id", json!(session.user_id))
            .order_by("created_at", false),
    )
    .await?;
    if itinerarios.is_empty() {
        return Ok(Vec::new());
    }

    let ids: Vec<Uuid> = itinerarios.iter().map(|i| i.id).collect();
    let links = links_of(store, &ids).await?;
    let ratings = user_ratings(store, session, &ids).await?;

    Ok(itinerarios
        .iter()
        .map(|itinerario| compute_stats(itinerario, &links, &ratings))
        .filter(|stats| stats.rated_count > 0)
        .collect())
}

/// Activities of one itinerario ordered by day then time, each with the user's rating if any.
pub async fn rating_sheet(
    store: &dyn TableStore,
    session: &Session,
    itinerario_id: Uuid,
) -> Result<RatingSheet, AppError> {
    let execution = load_execution(store, session, itinerario_id).await?;
    let by_activity: HashMap<Uuid, Rating> = user_ratings(store, session, &[itinerario_id])
        .await?
        .into_iter()
        .map(|r| (r.atividade_id, r))
        .collect();

    let mut activities = execution.activities;
    // Untimed activities go last within their day.
    activities.sort_by(|a, b| {
        (a.day, a.time.is_none(), &a.time).cmp(&(b.day, b.time.is_none(), &b.time))
    });

    let activities: Vec<SheetEntry> = activities
        .into_iter()
        .map(|a| SheetEntry {
            link_id: a.link_id,
            activity_id: a.activity_id,
            rating: by_activity.get(&a.activity_id).cloned(),
            name: a.name,
            place: a.place,
            day: a.day,
            time: a.time,
        })
        .collect();

    let progress = Progress::of(activities.iter().map(|a| a.rating.is_some()));
    Ok(RatingSheet {
        itinerario: execution.itinerario,
        activities,
        progress,
    })
}

/// Every rating the user has given, newest first, with activity and itinerario context.
pub async fn rating_history(
    store: &dyn TableStore,
    session: &Session,
) -> Result<Vec<RatingHistoryEntry>, AppError> {
    let ratings: Vec<Rating> = fetch_all(
        store,
        &Query::from(Table::Avaliacoes)
            .eq("user_id", json!(session.user_id))
            .order_by("created_at", false),
    )
    .await?;
    if ratings.is_empty() {
        return Ok(Vec::new());
    }

    let activity_ids: Vec<Uuid> = ratings.iter().map(|r| r.atividade_id).collect();
    let activities = fetch_activities(store, &activity_ids).await?;

    let mut itinerario_ids: Vec<Uuid> = ratings.iter().map(|r| r.itinerario_id).collect();
    itinerario_ids.sort();
    itinerario_ids.dedup();
    let itinerarios: HashMap<Uuid, Itinerario> = fetch_all::<Itinerario>(
        store,
        &Query::from(Table::Itinerarios)
            .is_in("id", itinerario_ids.iter().map(|id| json!(id)).collect()),
    )
    .await?
    .into_iter()
    .map(|i| (i.id, i))
    .collect();

    Ok(ratings
        .into_iter()
        .filter_map(|rating| {
            let (Some(activity), Some(itinerario)) = (
                activities.get(&rating.atividade_id),
                itinerarios.get(&rating.itinerario_id),
            ) else {
                warn!("Skipping rating {} with a dangling reference", rating.id);
                return None;
            };
            Some(RatingHistoryEntry {
                id: rating.id,
                score: rating.nota,
                comment: rating.comentario,
                created_at: rating.created_at,
                activity: ActivityRef {
                    id: activity.id,
                    name: activity.nome.clone(),
                    place: activity.local.clone(),
                },
                itinerario: ItinerarioRef {
                    id: itinerario.id,
                    titulo: itinerario.titulo.clone(),
                    local: itinerario.local.clone(),
                },
            })
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ratings::upsert::rate;
    use crate::ratings::validation::RatingInput;
    use crate::store::MemoryStore;
    use crate::testing::seed_itinerario;
    use chrono::NaiveDate;

    fn itinerario(id: Uuid) -> Itinerario {
        let date = NaiveDate::from_ymd_opt(2024, 7, 1).unwrap();
        Itinerario {
            id,
            user_id: Uuid::new_v4(),
            roteiro_id: None,
            titulo: "Salvador".to_string(),
            descricao: None,
            local: Some("Bahia".to_string()),
            data_inicio: date,
            data_fim: date,
            dias: Some(1),
            status: Default::default(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn link(itinerario_id: Uuid, atividade_id: Uuid) -> ItinerarioActivityLink {
        ItinerarioActivityLink {
            id: Uuid::new_v4(),
            itinerario_id,
            atividade_id,
            dia: 1,
            horario: None,
            ordem: 0,
            concluida: false,
            created_at: Utc::now(),
        }
    }

    fn rating(itinerario_id: Uuid, atividade_id: Uuid, nota: i32) -> Rating {
        Rating {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            itinerario_id,
            atividade_id,
            nota,
            comentario: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_compute_stats_counts_distinct_activities() {
        let it = itinerario(Uuid::new_v4());
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let links = vec![link(it.id, a), link(it.id, a), link(it.id, b), link(Uuid::new_v4(), b)];
        let ratings = vec![rating(it.id, a, 4), rating(it.id, b, 5), rating(Uuid::new_v4(), a, 1)];

        let stats = compute_stats(&it, &links, &ratings);
        assert_eq!(stats.total_activities, 2);
        assert_eq!(stats.rated_count, 2);
        assert!((stats.average_score - 4.5).abs() < f64::EPSILON);
    }

    #[test]
    fn test_compute_stats_four_activities_two_ratings() {
        let it = itinerario(Uuid::new_v4());
        let acts: Vec<Uuid> = (0..4).map(|_| Uuid::new_v4()).collect();
        let links: Vec<_> = acts.iter().map(|a| link(it.id, *a)).collect();
        let ratings = vec![rating(it.id, acts[0], 3), rating(it.id, acts[2], 5)];

        let stats = compute_stats(&it, &links, &ratings);
        assert_eq!(stats.total_activities, 4);
        assert_eq!(stats.rated_count, 2);
        assert_eq!(stats.average_score, 4.0);
    }

    #[test]
    fn test_compute_stats_without_ratings() {
        let it = itinerario(Uuid::new_v4());
        let stats = compute_stats(&it, &[link(it.id, Uuid::new_v4())], &[]);
        assert_eq!(stats.rated_count, 0);
        assert_eq!(stats.average_score, 0.0);
    }

    async fn rate_first(store: &MemoryStore, session: &Session, id: Uuid, score: i32) {
        let activity = load_execution(store, session, id).await.unwrap().activities[0].activity_id;
        rate(
            store,
            session,
            id,
            RatingInput {
                activity_id: activity,
                score: Some(score),
                comment: Some("bom".to_string()),
            },
        )
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn test_rated_itineraries_skips_unrated() {
        let store = MemoryStore::new();
        let session = Session::new(Uuid::new_v4());
        let rated = seed_itinerario(&store, &session, &["Pelourinho", "Farol"]).await;
        seed_itinerario(&store, &session, &["Elevador Lacerda"]).await;
        rate_first(&store, &session, rated, 4).await;

        let stats = rated_itineraries(&store, &session).await.unwrap();
        assert_eq!(stats.len(), 1);
        assert_eq!(stats[0].itinerario_id, rated);
        assert_eq!(stats[0].total_activities, 2);
        assert_eq!(stats[0].rated_count, 1);

        let single = itinerario_stats(&store, &session, rated).await.unwrap();
        assert_eq!(single, stats[0]);
    }

    #[tokio::test]
    async fn test_rating_sheet_attaches_existing_ratings() {
        let store = MemoryStore::new();
        let session = Session::new(Uuid::new_v4());
        let id = seed_itinerario(&store, &session, &["Mercado", "Praia"]).await;
        rate_first(&store, &session, id, 5).await;

        let sheet = rating_sheet(&store, &session, id).await.unwrap();
        assert_eq!(sheet.activities.len(), 2);
        assert_eq!(sheet.activities[0].name, "Mercado");
        assert_eq!(sheet.activities[0].rating.as_ref().map(|r| r.nota), Some(5));
        assert!(sheet.activities[1].rating.is_none());
        assert_eq!(sheet.progress, Progress::new(1, 2));
    }

    #[tokio::test]
    async fn test_rating_history_is_joined_and_newest_first() {
        let store = MemoryStore::new();
        let session = Session::new(Uuid::new_v4());
        let first = seed_itinerario(&store, &session, &["Museu"]).await;
        let second = seed_itinerario(&store, &session, &["Parque"]).await;
        rate_first(&store, &session, first, 3).await;
        rate_first(&store, &session, second, 5).await;

        let history = rating_history(&store, &session).await.unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].itinerario.id, second);
        assert_eq!(history[0].activity.name, "Parque");
        assert_eq!(history[0].score, 5);
        assert_eq!(history[1].itinerario.local.as_deref(), Some("Rio de Janeiro"));

        assert!(rating_history(&store, &Session::new(Uuid::new_v4()))
            .await
            .unwrap()
            .is_empty());
    }
}
