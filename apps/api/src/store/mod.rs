//! Table store: the data-access seam between the core and the relational backend.
//!
//! The core talks to storage only through [`TableStore`]: select / insert / update / delete
//! against named tables, each a single atomic round trip. Rows cross the seam as JSON objects
//! and are decoded into typed structs exactly once, by the helpers at the bottom of this module.
//!
//! `AppState` holds an `Arc<dyn TableStore>`, chosen at startup via `STORE_BACKEND`.

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use serde::{de::DeserializeOwned, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;
use tracing::{error, warn};

pub use memory::MemoryStore;
pub use postgres::PgTableStore;

/// One row as it crosses the store boundary.
pub type Row = Map<String, Value>;

// ────────────────────────────────────────────────────────────────────────────
// Schema surface
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Table {
    Atividades,
    Roteiros,
    AtividadesRoteiro,
    Itinerarios,
    AtividadesItinerario,
    Avaliacoes,
    Profiles,
    Publicacoes,
}

impl Table {
    pub fn name(self) -> &'static str {
        match self {
            Table::Atividades => "atividades",
            Table::Roteiros => "roteiros",
            Table::AtividadesRoteiro => "atividades_roteiro",
            Table::Itinerarios => "itinerarios",
            Table::AtividadesItinerario => "atividades_itinerario",
            Table::Avaliacoes => "avaliacoes",
            Table::Profiles => "profiles",
            Table::Publicacoes => "publicacoes",
        }
    }
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("no matching row in {table}")]
    NotFound { table: &'static str },

    #[error("constraint violation: {0}")]
    Constraint(String),

    #[error("malformed row from {table}: {source}")]
    Decode {
        table: &'static str,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid query: {0}")]
    InvalidQuery(String),

    #[error("database error: {0}")]
    Database(sqlx::Error),

    #[error("store unavailable: {0}")]
    Unavailable(String),
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db) = &err {
            if db.is_unique_violation() || db.is_foreign_key_violation() || db.is_check_violation()
            {
                return StoreError::Constraint(db.message().to_string());
            }
        }
        if matches!(
            err,
            sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_)
        ) {
            return StoreError::Unavailable(err.to_string());
        }
        StoreError::Database(err)
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Query description
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    Eq(String, Value),
    In(String, Vec<Value>),
}

impl Filter {
    pub fn eq(column: &str, value: Value) -> Self {
        Filter::Eq(column.to_string(), value)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct OrderBy {
    pub column: String,
    pub ascending: bool,
}

/// A `select` against one table. Built fluently:
/// `Query::from(Table::Itinerarios).eq("user_id", json!(id)).order_by("created_at", false)`.
#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    pub table: Table,
    /// Empty means every column.
    pub columns: Vec<String>,
    pub filters: Vec<Filter>,
    pub order: Vec<OrderBy>,
    pub limit: Option<usize>,
}

impl Query {
    pub fn from(table: Table) -> Self {
        Query {
            table,
            columns: Vec::new(),
            filters: Vec::new(),
            order: Vec::new(),
            limit: None,
        }
    }

    pub fn columns(mut self, columns: &[&str]) -> Self {
        self.columns = columns.iter().map(|c| c.to_string()).collect();
        self
    }

    pub fn eq(mut self, column: &str, value: Value) -> Self {
        self.filters.push(Filter::eq(column, value));
        self
    }

    pub fn is_in(mut self, column: &str, values: Vec<Value>) -> Self {
        self.filters.push(Filter::In(column.to_string(), values));
        self
    }

    pub fn order_by(mut self, column: &str, ascending: bool) -> Self {
        self.order.push(OrderBy {
            column: column.to_string(),
            ascending,
        });
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }
}

/// Child rows inserted together with a parent by [`TableStore::insert_with_children`].
/// `parent_key` is the child column that receives the parent's id.
#[derive(Debug, Clone)]
pub struct ChildRows {
    pub table: Table,
    pub parent_key: &'static str,
    pub rows: Vec<Row>,
}

// ────────────────────────────────────────────────────────────────────────────
// Trait definition
// ────────────────────────────────────────────────────────────────────────────

/// Generic table-oriented access to the remote relational store.
///
/// Every method is one atomic remote call. Nothing here spans calls except
/// `insert_with_children`, which backends with transactions override.
#[async_trait]
pub trait TableStore: Send + Sync {
    async fn select(&self, query: &Query) -> Result<Vec<Row>, StoreError>;

    /// Inserts `rows` and returns them as stored (ids and defaults filled in).
    async fn insert(&self, table: Table, rows: Vec<Row>) -> Result<Vec<Row>, StoreError>;

    /// Applies `patch` to every row matching `filters`; returns the number of rows touched.
    async fn update(&self, table: Table, patch: Row, filters: &[Filter]) -> Result<u64, StoreError>;

    async fn delete(&self, table: Table, filters: &[Filter]) -> Result<u64, StoreError>;

    /// Creates a parent row and its children as one operation.
    ///
    /// Without transaction support this is two round trips; if the children fail to land,
    /// the parent is deleted again before the original error is returned.
    async fn insert_with_children(
        &self,
        table: Table,
        parent: Row,
        children: ChildRows,
    ) -> Result<(Row, Vec<Row>), StoreError> {
        let parent = single(table, self.insert(table, vec![parent]).await?)?;
        let parent_id = parent
            .get("id")
            .cloned()
            .ok_or_else(|| StoreError::InvalidQuery(format!("{} row has no id", table.name())))?;

        if children.rows.is_empty() {
            return Ok((parent, Vec::new()));
        }

        let rows = stamp_parent(children.rows, children.parent_key, &parent_id);
        match self.insert(children.table, rows).await {
            Ok(inserted) => Ok((parent, inserted)),
            Err(err) => {
                warn!(
                    "Inserting {} failed, removing {} {parent_id}: {err}",
                    children.table.name(),
                    table.name()
                );
                if let Err(cleanup) = self.delete(table, &[Filter::eq("id", parent_id.clone())]).await {
                    error!("Compensating delete of {} {parent_id} failed: {cleanup}", table.name());
                }
                Err(err)
            }
        }
    }
}

pub(crate) fn stamp_parent(rows: Vec<Row>, parent_key: &str, parent_id: &Value) -> Vec<Row> {
    rows.into_iter()
        .map(|mut row| {
            row.insert(parent_key.to_string(), parent_id.clone());
            row
        })
        .collect()
}

fn single(table: Table, mut rows: Vec<Row>) -> Result<Row, StoreError> {
    match rows.len() {
        1 => Ok(rows.remove(0)),
        0 => Err(StoreError::NotFound { table: table.name() }),
        n => Err(StoreError::InvalidQuery(format!(
            "expected one row from {}, got {n}",
            table.name()
        ))),
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Typed boundary
// ────────────────────────────────────────────────────────────────────────────

/// Turns a `json!({...})` object literal into a row. Anything else yields an empty row.
pub fn row(value: Value) -> Row {
    match value {
        Value::Object(map) => map,
        _ => Row::new(),
    }
}

pub fn encode_row<T: Serialize>(table: Table, value: &T) -> Result<Row, StoreError> {
    match serde_json::to_value(value) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(other) => Err(StoreError::InvalidQuery(format!(
            "{} row must be an object, got {other}",
            table.name()
        ))),
        Err(source) => Err(StoreError::Decode {
            table: table.name(),
            source,
        }),
    }
}

pub fn decode_rows<T: DeserializeOwned>(table: Table, rows: Vec<Row>) -> Result<Vec<T>, StoreError> {
    rows.into_iter()
        .map(|r| {
            serde_json::from_value(Value::Object(r)).map_err(|source| StoreError::Decode {
                table: table.name(),
                source,
            })
        })
        .collect()
}

pub async fn fetch_all<T: DeserializeOwned>(
    store: &dyn TableStore,
    query: &Query,
) -> Result<Vec<T>, StoreError> {
    decode_rows(query.table, store.select(query).await?)
}

pub async fn fetch_optional<T: DeserializeOwned>(
    store: &dyn TableStore,
    query: &Query,
) -> Result<Option<T>, StoreError> {
    let query = query.clone().limit(1);
    Ok(fetch_all(store, &query).await?.into_iter().next())
}

/// Like `fetch_optional`, but a missing row is `StoreError::NotFound`.
pub async fn fetch_one<T: DeserializeOwned>(
    store: &dyn TableStore,
    query: &Query,
) -> Result<T, StoreError> {
    fetch_optional(store, query)
        .await?
        .ok_or(StoreError::NotFound {
            table: query.table.name(),
        })
}

pub async fn insert_one<N: Serialize, T: DeserializeOwned>(
    store: &dyn TableStore,
    table: Table,
    value: &N,
) -> Result<T, StoreError> {
    let inserted = store.insert(table, vec![encode_row(table, value)?]).await?;
    let stored = single(table, inserted)?;
    decode_rows(table, vec![stored])?
        .pop()
        .ok_or(StoreError::NotFound { table: table.name() })
}

pub async fn insert_many<N: Serialize, T: DeserializeOwned>(
    store: &dyn TableStore,
    table: Table,
    values: &[N],
) -> Result<Vec<T>, StoreError> {
    if values.is_empty() {
        return Ok(Vec::new());
    }
    let rows = values
        .iter()
        .map(|v| encode_row(table, v))
        .collect::<Result<Vec<_>, _>>()?;
    decode_rows(table, store.insert(table, rows).await?)
}

/// Column names are spliced into SQL, so only plain identifiers are accepted.
pub(crate) fn ident(name: &str) -> Result<&str, StoreError> {
    let valid = !name.is_empty()
        && name.chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
        && !name.starts_with(|c: char| c.is_ascii_digit());
    if valid {
        Ok(name)
    } else {
        Err(StoreError::InvalidQuery(format!("invalid column name '{name}'")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use serde_json::json;

    #[derive(Debug, Deserialize, PartialEq)]
    struct Named {
        nome: String,
    }

    #[test]
    fn test_ident_accepts_plain_columns() {
        assert!(ident("itinerario_id").is_ok());
        assert!(ident("dia").is_ok());
    }

    #[test]
    fn test_ident_rejects_injection() {
        assert!(ident("id; DROP TABLE roteiros").is_err());
        assert!(ident("Nome").is_err());
        assert!(ident("1col").is_err());
        assert!(ident("").is_err());
    }

    #[test]
    fn test_query_builder_accumulates() {
        let q = Query::from(Table::Avaliacoes)
            .eq("user_id", json!("u"))
            .is_in("atividade_id", vec![json!("a"), json!("b")])
            .order_by("created_at", false)
            .limit(5);
        assert_eq!(q.filters.len(), 2);
        assert!(matches!(&q.filters[1], Filter::In(c, v) if c == "atividade_id" && v.len() == 2));
        assert!(!q.order[0].ascending);
        assert_eq!(q.limit, Some(5));
    }

    #[test]
    fn test_decode_rows_reports_table() {
        let err = decode_rows::<Named>(Table::Atividades, vec![row(json!({"local": "x"}))])
            .unwrap_err();
        assert!(err.to_string().contains("atividades"));
    }

    #[test]
    fn test_row_from_non_object_is_empty() {
        assert!(row(json!([1, 2])).is_empty());
        assert_eq!(row(json!({"a": 1})).len(), 1);
    }
}
