//! PostgreSQL `TableStore`.
//!
//! Rows travel as JSON in both directions: selects return `to_jsonb(t)`, inserts and updates
//! feed a JSON document through `jsonb_populate_record(set)` so column types come from the
//! table definition rather than from the caller.

use std::collections::BTreeSet;

use async_trait::async_trait;
use serde_json::Value;
use sqlx::postgres::PgExecutor;
use sqlx::types::Json;
use sqlx::{PgPool, Postgres, QueryBuilder, Row as _};
use tracing::{debug, info};

use super::{ident, stamp_parent, ChildRows, Filter, Query, Row, StoreError, Table, TableStore};

#[derive(Clone)]
pub struct PgTableStore {
    pool: PgPool,
}

impl PgTableStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn push_filters(builder: &mut QueryBuilder<'_, Postgres>, filters: &[Filter]) -> Result<(), StoreError> {
    for (i, filter) in filters.iter().enumerate() {
        builder.push(if i == 0 { " WHERE " } else { " AND " });
        match filter {
            Filter::Eq(column, Value::Null) => {
                builder.push(format!("t.{} IS NULL", ident(column)?));
            }
            Filter::Eq(column, value) => {
                builder.push(format!("to_jsonb(t.{}) = ", ident(column)?));
                builder.push_bind(Json(value.clone()));
            }
            // A jsonb array contains a scalar when the scalar is one of its elements.
            Filter::In(column, values) => {
                builder.push_bind(Json(Value::Array(values.clone())));
                builder.push(format!(" @> to_jsonb(t.{})", ident(column)?));
            }
        }
    }
    Ok(())
}

fn column_list(rows: &[Row]) -> Result<Vec<&str>, StoreError> {
    let columns: BTreeSet<&str> = rows.iter().flat_map(|r| r.keys().map(String::as_str)).collect();
    columns.into_iter().map(ident).collect()
}

fn decode_returned(rows: Vec<sqlx::postgres::PgRow>) -> Result<Vec<Row>, StoreError> {
    rows.iter()
        .map(|r| r.try_get::<Json<Row>, _>("row").map(|j| j.0))
        .collect::<Result<Vec<Row>, sqlx::Error>>()
        .map_err(StoreError::from)
}

async fn insert_rows<'c, E>(executor: E, table: Table, rows: Vec<Row>) -> Result<Vec<Row>, StoreError>
where
    E: PgExecutor<'c>,
{
    if rows.is_empty() {
        return Ok(Vec::new());
    }
    let columns = column_list(&rows)?.join(", ");
    let name = table.name();

    let mut builder = QueryBuilder::<Postgres>::new(format!(
        "INSERT INTO {name} AS t ({columns}) SELECT {columns} FROM jsonb_populate_recordset(NULL::{name}, "
    ));
    builder.push_bind(Json(Value::Array(rows.into_iter().map(Value::Object).collect())));
    builder.push(") RETURNING to_jsonb(t) AS row");

    let returned = builder.build().fetch_all(executor).await?;
    debug!("Inserted {} row(s) into {name}", returned.len());
    decode_returned(returned)
}

#[async_trait]
impl TableStore for PgTableStore {
    async fn select(&self, query: &Query) -> Result<Vec<Row>, StoreError> {
        let mut builder = QueryBuilder::<Postgres>::new("SELECT ");
        if query.columns.is_empty() {
            builder.push("to_jsonb(t)");
        } else {
            let pairs = query
                .columns
                .iter()
                .map(|c| ident(c).map(|c| format!("'{c}', t.{c}")))
                .collect::<Result<Vec<_>, _>>()?;
            builder.push(format!("jsonb_build_object({})", pairs.join(", ")));
        }
        builder.push(format!(" AS row FROM {} t", query.table.name()));

        push_filters(&mut builder, &query.filters)?;

        if !query.order.is_empty() {
            let order = query
                .order
                .iter()
                .map(|o| {
                    ident(&o.column)
                        .map(|c| format!("t.{c} {}", if o.ascending { "ASC" } else { "DESC" }))
                })
                .collect::<Result<Vec<_>, _>>()?;
            builder.push(format!(" ORDER BY {}", order.join(", ")));
        }
        if let Some(limit) = query.limit {
            builder.push(" LIMIT ");
            builder.push_bind(limit as i64);
        }

        let rows = builder.build().fetch_all(&self.pool).await?;
        decode_returned(rows)
    }

    async fn insert(&self, table: Table, rows: Vec<Row>) -> Result<Vec<Row>, StoreError> {
        insert_rows(&self.pool, table, rows).await
    }

    async fn update(&self, table: Table, patch: Row, filters: &[Filter]) -> Result<u64, StoreError> {
        let columns = column_list(std::slice::from_ref(&patch))?;
        if columns.is_empty() {
            return Err(StoreError::InvalidQuery("empty update patch".to_string()));
        }
        let name = table.name();
        let columns = columns.join(", ");
        // Single-column targets cannot use the parenthesised row form.
        let target = if patch.len() == 1 {
            columns.clone()
        } else {
            format!("({columns})")
        };

        let mut builder = QueryBuilder::<Postgres>::new(format!(
            "UPDATE {name} AS t SET {target} = (SELECT {columns} FROM jsonb_populate_record(NULL::{name}, "
        ));
        builder.push_bind(Json(Value::Object(patch)));
        builder.push("))");
        push_filters(&mut builder, filters)?;

        let result = builder.build().execute(&self.pool).await?;
        Ok(result.rows_affected())
    }

    async fn delete(&self, table: Table, filters: &[Filter]) -> Result<u64, StoreError> {
        let mut builder = QueryBuilder::<Postgres>::new(format!("DELETE FROM {} AS t", table.name()));
        push_filters(&mut builder, filters)?;
        let result = builder.build().execute(&self.pool).await?;
        Ok(result.rows_affected())
    }

    async fn insert_with_children(
        &self,
        table: Table,
        parent: Row,
        children: ChildRows,
    ) -> Result<(Row, Vec<Row>), StoreError> {
        let mut tx = self.pool.begin().await?;

        let parent = insert_rows(&mut *tx, table, vec![parent])
            .await?
            .pop()
            .ok_or(StoreError::NotFound { table: table.name() })?;
        let parent_id = parent
            .get("id")
            .cloned()
            .ok_or_else(|| StoreError::InvalidQuery(format!("{} row has no id", table.name())))?;

        let rows = stamp_parent(children.rows, children.parent_key, &parent_id);
        let inserted = insert_rows(&mut *tx, children.table, rows).await?;

        tx.commit().await?;
        info!(
            "Created {} {parent_id} with {} {} row(s) in one transaction",
            table.name(),
            inserted.len(),
            children.table.name()
        );
        Ok((parent, inserted))
    }
}
