use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::json;
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::social::{Post, Profile};
use crate::session::Session;
use crate::store::{fetch_all, fetch_optional, Query, Table, TableStore};

pub const ANONYMOUS_NAME: &str = "Anônimo";
pub const MAX_FEED_PAGE: usize = 100;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Author {
    pub user_id: Uuid,
    pub nome: String,
    pub avatar_url: Option<String>,
    /// The author has no profile row.
    pub anonymous: bool,
}

#[derive(Debug, Serialize)]
pub struct FeedPost {
    pub id: Uuid,
    pub texto: String,
    pub foto_url: Option<String>,
    pub created_at: DateTime<Utc>,
    pub author: Author,
}

impl Author {
    fn from_profile(user_id: Uuid, profile: Option<&Profile>) -> Self {
        match profile {
            Some(p) => Author {
                user_id,
                nome: p.nome.clone(),
                avatar_url: p.avatar_url.clone(),
                anonymous: false,
            },
            None => Author {
                user_id,
                nome: ANONYMOUS_NAME.to_string(),
                avatar_url: None,
                anonymous: true,
            },
        }
    }
}

/// Latest posts, newest first, each with its author's name and avatar.
pub async fn feed(store: &dyn TableStore, limit: usize) -> Result<Vec<FeedPost>, AppError> {
    let limit = limit.clamp(1, MAX_FEED_PAGE);
    let posts: Vec<Post> = fetch_all(
        store,
        &Query::from(Table::Publicacoes)
            .order_by("created_at", false)
            .limit(limit),
    )
    .await?;
    if posts.is_empty() {
        return Ok(Vec::new());
    }

    let mut author_ids: Vec<Uuid> = posts.iter().map(|p| p.user_id).collect();
    author_ids.sort();
    author_ids.dedup();
    let profiles: HashMap<Uuid, Profile> = fetch_all::<Profile>(
        store,
        &Query::from(Table::Profiles).is_in("id", author_ids.iter().map(|id| json!(id)).collect()),
    )
    .await?
    .into_iter()
    .map(|p| (p.id, p))
    .collect();

    Ok(posts
        .into_iter()
        .map(|post| FeedPost {
            author: Author::from_profile(post.user_id, profiles.get(&post.user_id)),
            id: post.id,
            texto: post.texto,
            foto_url: post.foto_url,
            created_at: post.created_at,
        })
        .collect())
}

pub async fn own_profile(store: &dyn TableStore, session: &Session) -> Result<Profile, AppError> {
    fetch_optional(
        store,
        &Query::from(Table::Profiles).eq("id", json!(session.user_id)),
    )
    .await?
    .ok_or_else(|| AppError::NotFound(format!("Profile for user {} not found", session.user_id)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{row, MemoryStore};

    async fn post(store: &MemoryStore, user_id: Uuid, texto: &str) {
        store
            .insert(
                Table::Publicacoes,
                vec![row(json!({ "user_id": user_id, "texto": texto, "foto_url": null }))],
            )
            .await
            .unwrap();
    }

    async fn profile(store: &MemoryStore, user_id: Uuid, nome: &str) {
        store
            .insert(
                Table::Profiles,
                vec![row(json!({ "id": user_id, "nome": nome, "avatar_url": "https://cdn/a.png" }))],
            )
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_feed_newest_first_with_authors() {
        let store = MemoryStore::new();
        let ana = Uuid::new_v4();
        let ghost = Uuid::new_v4();
        profile(&store, ana, "Ana").await;
        post(&store, ana, "Chegando em Ouro Preto").await;
        post(&store, ghost, "Sem perfil").await;
        post(&store, ana, "Cachoeira!").await;

        let posts = feed(&store, 20).await.unwrap();
        let texts: Vec<&str> = posts.iter().map(|p| p.texto.as_str()).collect();
        assert_eq!(texts, vec!["Cachoeira!", "Sem perfil", "Chegando em Ouro Preto"]);
        assert_eq!(posts[0].author.nome, "Ana");
        assert!(!posts[0].author.anonymous);
        assert_eq!(posts[1].author, Author::from_profile(ghost, None));
    }

    #[tokio::test]
    async fn test_feed_respects_limit() {
        let store = MemoryStore::new();
        let user = Uuid::new_v4();
        for i in 0..5 {
            post(&store, user, &format!("post {i}")).await;
        }
        let posts = feed(&store, 2).await.unwrap();
        assert_eq!(posts.len(), 2);
        assert_eq!(posts[0].texto, "post 4");
        assert_eq!(feed(&store, 0).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_own_profile() {
        let store = MemoryStore::new();
        let me = Uuid::new_v4();
        profile(&store, me, "Bruno").await;

        let found = own_profile(&store, &Session::new(me)).await.unwrap();
        assert_eq!(found.nome, "Bruno");
        assert!(found.interesses.is_empty());

        let err = own_profile(&store, &Session::new(Uuid::new_v4())).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }
}
