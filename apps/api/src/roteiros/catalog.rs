use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::info;
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::activity::{Activity, NewActivity};
use crate::models::roteiro::{NewRoteiro, NewRoteiroActivityLink, Roteiro, RoteiroActivityLink};
use crate::session::Session;
use crate::store::{
    decode_rows, encode_row, fetch_all, fetch_optional, insert_many, ChildRows, Query, Table,
    TableStore,
};

/// A roteiro link joined with its catalog activity.
#[derive(Debug, Clone, Serialize)]
pub struct RoteiroActivity {
    pub link_id: Uuid,
    pub activity_id: Uuid,
    pub order: i32,
    pub name: String,
    pub place: String,
    pub description: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct RoteiroDetail {
    pub roteiro: Roteiro,
    pub activities: Vec<RoteiroActivity>,
}

#[derive(Debug, Serialize)]
pub struct RoteiroSummary {
    #[serde(flatten)]
    pub roteiro: Roteiro,
    pub activity_count: usize,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum RoteiroActivityInput {
    Existing { activity_id: Uuid },
    New(NewActivity),
}

#[derive(Debug, Deserialize)]
pub struct CreateRoteiroRequest {
    pub titulo: String,
    #[serde(default)]
    pub descricao: Option<String>,
    #[serde(default)]
    pub activities: Vec<RoteiroActivityInput>,
}

/// Looks up catalog activities by id. Ids may repeat; unknown ids are simply absent.
pub async fn fetch_activities(
    store: &dyn TableStore,
    ids: &[Uuid],
) -> Result<HashMap<Uuid, Activity>, AppError> {
    let mut unique: Vec<Uuid> = ids.to_vec();
    unique.sort();
    unique.dedup();
    if unique.is_empty() {
        return Ok(HashMap::new());
    }

    let query = Query::from(Table::Atividades)
        .is_in("id", unique.iter().map(|id| json!(id)).collect());
    let activities: Vec<Activity> = fetch_all(store, &query).await?;
    Ok(activities.into_iter().map(|a| (a.id, a)).collect())
}

pub async fn load_roteiro(
    store: &dyn TableStore,
    session: &Session,
    roteiro_id: Uuid,
) -> Result<Roteiro, AppError> {
    let query = Query::from(Table::Roteiros).eq("id", json!(roteiro_id));
    let roteiro: Roteiro = fetch_optional(store, &query)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Roteiro {roteiro_id} not found")))?;
    session.ensure_owner(roteiro.user_id)?;
    Ok(roteiro)
}

/// The roteiro's activities in ascending stored order.
pub async fn load_roteiro_activities(
    store: &dyn TableStore,
    roteiro_id: Uuid,
) -> Result<Vec<RoteiroActivity>, AppError> {
    let query = Query::from(Table::AtividadesRoteiro)
        .eq("roteiro_id", json!(roteiro_id))
        .order_by("ordem", true);
    let links: Vec<RoteiroActivityLink> = fetch_all(store, &query).await?;

    let ids: Vec<Uuid> = links.iter().map(|l| l.atividade_id).collect();
    let catalog = fetch_activities(store, &ids).await?;

    links
        .into_iter()
        .map(|link| {
            let activity = catalog.get(&link.atividade_id).ok_or_else(|| {
                AppError::NotFound(format!(
                    "Activity {} referenced by roteiro {roteiro_id} not found",
                    link.atividade_id
                ))
            })?;
            Ok(RoteiroActivity {
                link_id: link.id,
                activity_id: activity.id,
                order: link.ordem,
                name: activity.nome.clone(),
                place: activity.local.clone(),
                description: activity.descricao.clone(),
            })
        })
        .collect()
}

pub async fn get_roteiro(
    store: &dyn TableStore,
    session: &Session,
    roteiro_id: Uuid,
) -> Result<RoteiroDetail, AppError> {
    let roteiro = load_roteiro(store, session, roteiro_id).await?;
    let activities = load_roteiro_activities(store, roteiro_id).await?;
    Ok(RoteiroDetail {
        roteiro,
        activities,
    })
}

/// The user's roteiros, newest first.
pub async fn list_roteiros(
    store: &dyn TableStore,
    session: &Session,
) -> Result<Vec<RoteiroSummary>, AppError> {
    let query = Query::from(Table::Roteiros)
        .eq("user_id", json!(session.user_id))
        .order_by("created_at", false);
    let roteiros: Vec<Roteiro> = fetch_all(store, &query).await?;
    if roteiros.is_empty() {
        return Ok(Vec::new());
    }

    let links = store
        .select(
            &Query::from(Table::AtividadesRoteiro)
                .columns(&["roteiro_id"])
                .is_in("roteiro_id", roteiros.iter().map(|r| json!(r.id)).collect()),
        )
        .await?;
    let mut counts: HashMap<String, usize> = HashMap::new();
    for link in links {
        if let Some(id) = link.get("roteiro_id").and_then(|v| v.as_str()) {
            *counts.entry(id.to_string()).or_default() += 1;
        }
    }

    Ok(roteiros
        .into_iter()
        .map(|roteiro| {
            let activity_count = counts.get(&roteiro.id.to_string()).copied().unwrap_or(0);
            RoteiroSummary {
                roteiro,
                activity_count,
            }
        })
        .collect())
}

/// Creates a roteiro and its ordered activity links. New catalog activities in the
/// request are created first; existing ones must already be in the catalog.
pub async fn create_roteiro(
    store: &dyn TableStore,
    session: &Session,
    request: CreateRoteiroRequest,
) -> Result<RoteiroDetail, AppError> {
    let titulo = request.titulo.trim().to_string();
    if titulo.is_empty() {
        return Err(AppError::Validation("Roteiro title is required".to_string()));
    }

    let existing_ids: Vec<Uuid> = request
        .activities
        .iter()
        .filter_map(|a| match a {
            RoteiroActivityInput::Existing { activity_id } => Some(*activity_id),
            RoteiroActivityInput::New(_) => None,
        })
        .collect();
    let existing = fetch_activities(store, &existing_ids).await?;
    if let Some(missing) = existing_ids.iter().find(|id| !existing.contains_key(*id)) {
        return Err(AppError::Validation(format!("Activity {missing} does not exist")));
    }

    let new_activities: Vec<&NewActivity> = request
        .activities
        .iter()
        .filter_map(|a| match a {
            RoteiroActivityInput::New(new) => Some(new),
            RoteiroActivityInput::Existing { .. } => None,
        })
        .collect();
    if new_activities
        .iter()
        .any(|a| a.nome.trim().is_empty() || a.local.trim().is_empty())
    {
        return Err(AppError::Validation(
            "Every new activity needs a name and a place".to_string(),
        ));
    }
    let created: Vec<Activity> = insert_many(store, Table::Atividades, &new_activities).await?;

    let mut created_iter = created.into_iter();
    let mut ordered: Vec<Activity> = Vec::with_capacity(request.activities.len());
    for input in &request.activities {
        let activity = match input {
            RoteiroActivityInput::Existing { activity_id } => existing.get(activity_id).cloned(),
            RoteiroActivityInput::New(_) => created_iter.next(),
        };
        ordered.push(activity.ok_or_else(|| {
            AppError::Internal(anyhow::anyhow!("activity catalog insert returned too few rows"))
        })?);
    }

    let links = ordered
        .iter()
        .enumerate()
        .map(|(i, a)| {
            encode_row(
                Table::AtividadesRoteiro,
                &NewRoteiroActivityLink {
                    atividade_id: a.id,
                    ordem: i as i32,
                },
            )
        })
        .collect::<Result<Vec<_>, _>>()?;

    let parent = encode_row(
        Table::Roteiros,
        &NewRoteiro {
            user_id: session.user_id,
            titulo,
            descricao: request.descricao.filter(|d| !d.trim().is_empty()),
        },
    )?;
    let (roteiro_row, link_rows) = store
        .insert_with_children(
            Table::Roteiros,
            parent,
            ChildRows {
                table: Table::AtividadesRoteiro,
                parent_key: "roteiro_id",
                rows: links,
            },
        )
        .await?;

    let roteiro: Roteiro = decode_rows(Table::Roteiros, vec![roteiro_row])?
        .pop()
        .ok_or_else(|| AppError::Internal(anyhow::anyhow!("roteiro insert returned no row")))?;
    let mut links: Vec<RoteiroActivityLink> = decode_rows(Table::AtividadesRoteiro, link_rows)?;
    links.sort_by_key(|l| l.ordem);

    info!(
        "Created roteiro {} with {} activities for user {}",
        roteiro.id,
        links.len(),
        session.user_id
    );

    let activities = links
        .into_iter()
        .zip(ordered)
        .map(|(link, activity)| RoteiroActivity {
            link_id: link.id,
            activity_id: activity.id,
            order: link.ordem,
            name: activity.nome,
            place: activity.local,
            description: activity.descricao,
        })
        .collect();

    Ok(RoteiroDetail {
        roteiro,
        activities,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    fn new_activity(nome: &str, local: &str) -> RoteiroActivityInput {
        RoteiroActivityInput::New(NewActivity {
            nome: nome.to_string(),
            local: local.to_string(),
            descricao: None,
            foto_url: None,
        })
    }

    #[tokio::test]
    async fn test_create_and_load_roteiro_in_order() {
        let store = MemoryStore::new();
        let session = Session::new(Uuid::new_v4());

        let detail = create_roteiro(
            &store,
            &session,
            CreateRoteiroRequest {
                titulo: "Lisboa em 3 dias".to_string(),
                descricao: Some("Clássicos".to_string()),
                activities: vec![
                    new_activity("Torre de Belém", "Belém"),
                    new_activity("Alfama", "Lisboa"),
                    new_activity("Sintra", "Sintra"),
                ],
            },
        )
        .await
        .unwrap();
        assert_eq!(detail.activities.len(), 3);

        let loaded = load_roteiro_activities(&store, detail.roteiro.id).await.unwrap();
        let names: Vec<_> = loaded.iter().map(|a| a.name.as_str()).collect();
        assert_eq!(names, vec!["Torre de Belém", "Alfama", "Sintra"]);
        assert_eq!(loaded.iter().map(|a| a.order).collect::<Vec<_>>(), vec![0, 1, 2]);
    }

    #[tokio::test]
    async fn test_create_roteiro_reuses_existing_activity() {
        let store = MemoryStore::new();
        let session = Session::new(Uuid::new_v4());
        let first = create_roteiro(
            &store,
            &session,
            CreateRoteiroRequest {
                titulo: "Porto".to_string(),
                descricao: None,
                activities: vec![new_activity("Ribeira", "Porto")],
            },
        )
        .await
        .unwrap();
        let ribeira = first.activities[0].activity_id;

        let second = create_roteiro(
            &store,
            &session,
            CreateRoteiroRequest {
                titulo: "Porto e Douro".to_string(),
                descricao: None,
                activities: vec![
                    new_activity("Pinhão", "Douro"),
                    RoteiroActivityInput::Existing { activity_id: ribeira },
                ],
            },
        )
        .await
        .unwrap();

        assert_eq!(second.activities[1].activity_id, ribeira);
        assert_eq!(store.row_count(Table::Atividades), 2);
    }

    #[tokio::test]
    async fn test_create_roteiro_requires_title() {
        let store = MemoryStore::new();
        let session = Session::new(Uuid::new_v4());
        let err = create_roteiro(
            &store,
            &session,
            CreateRoteiroRequest {
                titulo: "   ".to_string(),
                descricao: None,
                activities: vec![],
            },
        )
        .await
        .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
        assert_eq!(store.row_count(Table::Roteiros), 0);
    }

    #[tokio::test]
    async fn test_unknown_existing_activity_is_rejected() {
        let store = MemoryStore::new();
        let session = Session::new(Uuid::new_v4());
        let err = create_roteiro(
            &store,
            &session,
            CreateRoteiroRequest {
                titulo: "Madrid".to_string(),
                descricao: None,
                activities: vec![RoteiroActivityInput::Existing {
                    activity_id: Uuid::new_v4(),
                }],
            },
        )
        .await
        .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[tokio::test]
    async fn test_list_roteiros_counts_and_ownership() {
        let store = MemoryStore::new();
        let me = Session::new(Uuid::new_v4());
        let other = Session::new(Uuid::new_v4());
        let mine = create_roteiro(
            &store,
            &me,
            CreateRoteiroRequest {
                titulo: "Roma".to_string(),
                descricao: None,
                activities: vec![new_activity("Coliseu", "Roma"), new_activity("Vaticano", "Roma")],
            },
        )
        .await
        .unwrap();
        create_roteiro(
            &store,
            &other,
            CreateRoteiroRequest {
                titulo: "Paris".to_string(),
                descricao: None,
                activities: vec![],
            },
        )
        .await
        .unwrap();

        let listed = list_roteiros(&store, &me).await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].activity_count, 2);

        let denied = load_roteiro(&store, &other, mine.roteiro.id).await.unwrap_err();
        assert!(matches!(denied, AppError::Forbidden));
    }
}
