//! In-process `TableStore`.
//!
//! Emulates the parts of the relational backend the core relies on: generated ids and
//! timestamps, column defaults, the unique keys on `avaliacoes` and `atividades_roteiro`,
//! nulls-last ordering. Failures can be injected per (operation, table) to exercise the
//! error paths.

use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::{DateTime, Duration, SecondsFormat, Utc};
use serde_json::{json, Value};
use tracing::debug;
use uuid::Uuid;

use super::{Filter, OrderBy, Query, Row, StoreError, Table, TableStore};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    Select,
    Insert,
    Update,
    Delete,
}

#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<HashMap<Table, Vec<Row>>>,
    failures: Mutex<HashSet<(Operation, Table)>>,
    clock: Mutex<Option<DateTime<Utc>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every later `op` against `table` fail with `StoreError::Unavailable`.
    #[cfg(test)]
    pub fn fail_on(&self, op: Operation, table: Table) {
        if let Ok(mut failures) = self.failures.lock() {
            failures.insert((op, table));
        }
    }

    #[cfg(test)]
    pub fn clear_failures(&self) {
        if let Ok(mut failures) = self.failures.lock() {
            failures.clear();
        }
    }

    #[cfg(test)]
    pub fn row_count(&self, table: Table) -> usize {
        self.tables
            .lock()
            .map(|t| t.get(&table).map_or(0, Vec::len))
            .unwrap_or(0)
    }

    fn check_failure(&self, op: Operation, table: Table) -> Result<(), StoreError> {
        if lock(&self.failures)?.contains(&(op, table)) {
            return Err(StoreError::Unavailable(format!(
                "injected {op:?} failure on {}",
                table.name()
            )));
        }
        Ok(())
    }

    /// Strictly increasing, so rows inserted back to back still sort by creation.
    fn next_timestamp(&self) -> Result<String, StoreError> {
        let mut last = lock(&self.clock)?;
        let now = Utc::now();
        let ts = match *last {
            Some(prev) if prev >= now => prev + Duration::microseconds(1),
            _ => now,
        };
        *last = Some(ts);
        Ok(ts.to_rfc3339_opts(SecondsFormat::Micros, true))
    }

    fn with_defaults(&self, table: Table, mut row: Row) -> Result<Row, StoreError> {
        let now = self.next_timestamp()?;
        let mut defaults: Vec<(&str, Value)> = vec![
            ("id", json!(Uuid::new_v4())),
            ("created_at", json!(now)),
        ];
        match table {
            Table::Roteiros | Table::Publicacoes => defaults.push(("updated_at", json!(now))),
            Table::Itinerarios => {
                defaults.push(("updated_at", json!(now)));
                defaults.push(("status", json!("planejado")));
            }
            Table::Profiles => {
                defaults.push(("updated_at", json!(now)));
                defaults.push(("interesses", json!([])));
            }
            Table::AtividadesRoteiro => defaults.push(("ordem", json!(0))),
            Table::AtividadesItinerario => {
                defaults.push(("ordem", json!(0)));
                defaults.push(("concluida", json!(false)));
            }
            Table::Atividades | Table::Avaliacoes => {}
        }
        for (column, value) in defaults {
            row.entry(column.to_string()).or_insert(value);
        }
        Ok(row)
    }
}

fn lock<T>(mutex: &Mutex<T>) -> Result<MutexGuard<'_, T>, StoreError> {
    mutex
        .lock()
        .map_err(|_| StoreError::Unavailable("memory store lock poisoned".to_string()))
}

fn unique_keys(table: Table) -> &'static [&'static str] {
    match table {
        Table::Avaliacoes => &["user_id", "itinerario_id", "atividade_id"],
        Table::AtividadesRoteiro => &["roteiro_id", "ordem"],
        _ => &[],
    }
}

fn key_of(row: &Row, columns: &[&str]) -> Vec<Value> {
    columns
        .iter()
        .map(|c| row.get(*c).cloned().unwrap_or(Value::Null))
        .collect()
}

fn matches(row: &Row, filters: &[Filter]) -> bool {
    filters.iter().all(|f| match f {
        Filter::Eq(column, Value::Null) => row.get(column).map_or(true, Value::is_null),
        Filter::Eq(column, value) => row.get(column) == Some(value),
        Filter::In(column, values) => row.get(column).is_some_and(|v| values.contains(v)),
    })
}

/// Nulls sort after everything else, like Postgres does for ascending order.
fn compare_values(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    let a = a.filter(|v| !v.is_null());
    let b = b.filter(|v| !v.is_null());
    match (a, b) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Greater,
        (Some(_), None) => Ordering::Less,
        (Some(Value::Number(x)), Some(Value::Number(y))) => x
            .as_f64()
            .partial_cmp(&y.as_f64())
            .unwrap_or(Ordering::Equal),
        (Some(Value::String(x)), Some(Value::String(y))) => x.cmp(y),
        (Some(Value::Bool(x)), Some(Value::Bool(y))) => x.cmp(y),
        (Some(x), Some(y)) => x.to_string().cmp(&y.to_string()),
    }
}

fn compare_rows(a: &Row, b: &Row, order: &[OrderBy]) -> Ordering {
    for key in order {
        let ord = compare_values(a.get(&key.column), b.get(&key.column));
        let ord = if key.ascending { ord } else { ord.reverse() };
        if ord != Ordering::Equal {
            return ord;
        }
    }
    Ordering::Equal
}

#[async_trait]
impl TableStore for MemoryStore {
    async fn select(&self, query: &Query) -> Result<Vec<Row>, StoreError> {
        self.check_failure(Operation::Select, query.table)?;
        let tables = lock(&self.tables)?;
        let mut rows: Vec<Row> = tables
            .get(&query.table)
            .map(|rows| rows.iter().filter(|r| matches(r, &query.filters)).cloned().collect())
            .unwrap_or_default();
        drop(tables);

        rows.sort_by(|a, b| compare_rows(a, b, &query.order));
        if let Some(limit) = query.limit {
            rows.truncate(limit);
        }
        if !query.columns.is_empty() {
            for row in &mut rows {
                row.retain(|k, _| query.columns.iter().any(|c| c == k));
            }
        }
        Ok(rows)
    }

    async fn insert(&self, table: Table, rows: Vec<Row>) -> Result<Vec<Row>, StoreError> {
        self.check_failure(Operation::Insert, table)?;
        let rows = rows
            .into_iter()
            .map(|r| self.with_defaults(table, r))
            .collect::<Result<Vec<_>, _>>()?;

        let mut tables = lock(&self.tables)?;
        let existing = tables.entry(table).or_default();

        let keys = unique_keys(table);
        if !keys.is_empty() {
            let mut seen: HashSet<String> = existing
                .iter()
                .map(|r| Value::Array(key_of(r, keys)).to_string())
                .collect();
            for row in &rows {
                let key = Value::Array(key_of(row, keys)).to_string();
                if !seen.insert(key.clone()) {
                    return Err(StoreError::Constraint(format!(
                        "duplicate key {key} violates unique constraint on {} ({})",
                        table.name(),
                        keys.join(", ")
                    )));
                }
            }
        }

        existing.extend(rows.iter().cloned());
        debug!("memory store: inserted {} row(s) into {}", rows.len(), table.name());
        Ok(rows)
    }

    async fn update(&self, table: Table, patch: Row, filters: &[Filter]) -> Result<u64, StoreError> {
        self.check_failure(Operation::Update, table)?;
        let mut tables = lock(&self.tables)?;
        let mut touched = 0;
        for row in tables.entry(table).or_default().iter_mut() {
            if matches(row, filters) {
                for (k, v) in &patch {
                    row.insert(k.clone(), v.clone());
                }
                touched += 1;
            }
        }
        Ok(touched)
    }

    async fn delete(&self, table: Table, filters: &[Filter]) -> Result<u64, StoreError> {
        self.check_failure(Operation::Delete, table)?;
        let mut tables = lock(&self.tables)?;
        let rows = tables.entry(table).or_default();
        let before = rows.len();
        rows.retain(|r| !matches(r, filters));
        Ok((before - rows.len()) as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{row, ChildRows};

    #[tokio::test]
    async fn test_insert_fills_defaults() {
        let store = MemoryStore::new();
        let inserted = store
            .insert(
                Table::AtividadesItinerario,
                vec![row(json!({"itinerario_id": "it", "atividade_id": "a", "dia": 1}))],
            )
            .await
            .unwrap();
        let r = &inserted[0];
        assert!(r.get("id").is_some());
        assert!(r.get("created_at").is_some());
        assert_eq!(r["concluida"], json!(false));
        assert_eq!(r["ordem"], json!(0));
    }

    #[tokio::test]
    async fn test_unique_key_rejects_duplicate_rating() {
        let store = MemoryStore::new();
        let rating = row(json!({"user_id": "u", "itinerario_id": "i", "atividade_id": "a", "nota": 3}));
        store.insert(Table::Avaliacoes, vec![rating.clone()]).await.unwrap();
        let err = store.insert(Table::Avaliacoes, vec![rating]).await.unwrap_err();
        assert!(matches!(err, StoreError::Constraint(_)));
        assert_eq!(store.row_count(Table::Avaliacoes), 1);
    }

    #[tokio::test]
    async fn test_select_filters_orders_and_projects() {
        let store = MemoryStore::new();
        store
            .insert(
                Table::AtividadesRoteiro,
                vec![
                    row(json!({"roteiro_id": "r", "atividade_id": "b", "ordem": 1})),
                    row(json!({"roteiro_id": "r", "atividade_id": "a", "ordem": 0})),
                    row(json!({"roteiro_id": "other", "atividade_id": "c", "ordem": 0})),
                ],
            )
            .await
            .unwrap();

        let rows = store
            .select(
                &Query::from(Table::AtividadesRoteiro)
                    .columns(&["atividade_id"])
                    .eq("roteiro_id", json!("r"))
                    .order_by("ordem", true),
            )
            .await
            .unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0]["atividade_id"], json!("a"));
        assert_eq!(rows[1]["atividade_id"], json!("b"));
        assert_eq!(rows[0].len(), 1);
    }

    #[tokio::test]
    async fn test_nulls_sort_last_ascending() {
        let store = MemoryStore::new();
        store
            .insert(
                Table::AtividadesItinerario,
                vec![
                    row(json!({"itinerario_id": "i", "horario": null})),
                    row(json!({"itinerario_id": "i", "horario": "08:00"})),
                ],
            )
            .await
            .unwrap();
        let rows = store
            .select(&Query::from(Table::AtividadesItinerario).order_by("horario", true))
            .await
            .unwrap();
        assert_eq!(rows[0]["horario"], json!("08:00"));
        assert!(rows[1]["horario"].is_null());
    }

    #[tokio::test]
    async fn test_update_and_delete_report_counts() {
        let store = MemoryStore::new();
        store
            .insert(
                Table::Itinerarios,
                vec![row(json!({"titulo": "a"})), row(json!({"titulo": "b"}))],
            )
            .await
            .unwrap();
        let touched = store
            .update(
                Table::Itinerarios,
                row(json!({"status": "em_andamento"})),
                &[Filter::eq("titulo", json!("a"))],
            )
            .await
            .unwrap();
        assert_eq!(touched, 1);
        let removed = store.delete(Table::Itinerarios, &[]).await.unwrap();
        assert_eq!(removed, 2);
    }

    #[tokio::test]
    async fn test_insert_with_children_compensates_on_child_failure() {
        let store = MemoryStore::new();
        store.fail_on(Operation::Insert, Table::AtividadesItinerario);

        let result = store
            .insert_with_children(
                Table::Itinerarios,
                row(json!({"titulo": "Lisboa"})),
                ChildRows {
                    table: Table::AtividadesItinerario,
                    parent_key: "itinerario_id",
                    rows: vec![row(json!({"atividade_id": "a", "dia": 1}))],
                },
            )
            .await;

        assert!(matches!(result, Err(StoreError::Unavailable(_))));
        assert_eq!(store.row_count(Table::Itinerarios), 0);
    }

    #[tokio::test]
    async fn test_insert_with_children_stamps_parent_id() {
        let store = MemoryStore::new();
        let (parent, children) = store
            .insert_with_children(
                Table::Roteiros,
                row(json!({"titulo": "Porto"})),
                ChildRows {
                    table: Table::AtividadesRoteiro,
                    parent_key: "roteiro_id",
                    rows: vec![
                        row(json!({"atividade_id": "a", "ordem": 0})),
                        row(json!({"atividade_id": "b", "ordem": 1})),
                    ],
                },
            )
            .await
            .unwrap();
        assert_eq!(children.len(), 2);
        assert!(children.iter().all(|c| c["roteiro_id"] == parent["id"]));
    }

    #[tokio::test]
    async fn test_injected_failure_can_be_cleared() {
        let store = MemoryStore::new();
        store.fail_on(Operation::Select, Table::Profiles);
        assert!(store.select(&Query::from(Table::Profiles)).await.is_err());
        store.clear_failures();
        assert!(store.select(&Query::from(Table::Profiles)).await.unwrap().is_empty());
    }
}
