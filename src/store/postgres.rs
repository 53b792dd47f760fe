use std::str::FromStr;

use async_trait::async_trait;
use rust_decimal::Decimal;
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::types::Json;
use sqlx::{Postgres, QueryBuilder, Row};
use uuid::Uuid;

use super::document_store::{document_version, Document, DocumentStore, Filter, Query, StoreError};

// ============================================================================
// Postgres Document Store - JSONB documents keyed by (collection, id)
// ============================================================================

const SCHEMA: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS documents (
        collection TEXT NOT NULL,
        id UUID NOT NULL,
        version BIGINT NOT NULL,
        body JSONB NOT NULL,
        PRIMARY KEY (collection, id)
    )",
    "CREATE TABLE IF NOT EXISTS sequences (
        name TEXT PRIMARY KEY,
        value BIGINT NOT NULL
    )",
];

pub struct PostgresDocumentStore {
    pool: PgPool,
}

impl PostgresDocumentStore {
    pub async fn connect(database_url: &str) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(10)
            .connect(database_url)
            .await?;

        for statement in SCHEMA {
            sqlx::query(statement).execute(&pool).await?;
        }

        tracing::info!("Postgres document store ready");
        Ok(Self { pool })
    }
}

fn path_of(field: &str) -> Vec<String> {
    field.split('.').map(str::to_string).collect()
}

fn push_filters(builder: &mut QueryBuilder<'_, Postgres>, filters: &[Filter]) {
    for filter in filters {
        builder.push(" AND ");
        match filter {
            Filter::Eq(field, value) => {
                builder
                    .push("body #> ")
                    .push_bind(path_of(field))
                    .push(" = ")
                    .push_bind(Json(value.clone()));
            }
            Filter::Matches { fields, needle } => {
                let pattern = format!("%{}%", needle.replace('%', "\\%").replace('_', "\\_"));
                builder.push("(FALSE");
                for field in fields {
                    builder
                        .push(" OR body #>> ")
                        .push_bind(path_of(field))
                        .push(" ILIKE ")
                        .push_bind(pattern.clone());
                }
                builder.push(")");
            }
        }
    }
}

#[async_trait]
impl DocumentStore for PostgresDocumentStore {
    async fn insert(&self, collection: &str, id: Uuid, doc: Document) -> Result<(), StoreError> {
        let result = sqlx::query(
            "INSERT INTO documents (collection, id, version, body) VALUES ($1, $2, $3, $4)
             ON CONFLICT (collection, id) DO NOTHING",
        )
        .bind(collection)
        .bind(id)
        .bind(document_version(&doc))
        .bind(Json(&doc))
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::AlreadyExists {
                collection: collection.to_string(),
                id,
            });
        }
        Ok(())
    }

    async fn get(&self, collection: &str, id: Uuid) -> Result<Option<Document>, StoreError> {
        let row = sqlx::query("SELECT body FROM documents WHERE collection = $1 AND id = $2")
            .bind(collection)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row
            .map(|row| row.try_get::<Json<Document>, _>("body"))
            .transpose()?
            .map(|Json(doc)| doc))
    }

    async fn replace(
        &self,
        collection: &str,
        id: Uuid,
        expected_version: i64,
        doc: Document,
    ) -> Result<(), StoreError> {
        let result = sqlx::query(
            "UPDATE documents SET body = $4, version = $5
             WHERE collection = $1 AND id = $2 AND version = $3",
        )
        .bind(collection)
        .bind(id)
        .bind(expected_version)
        .bind(Json(&doc))
        .bind(document_version(&doc))
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 1 {
            return Ok(());
        }

        let current: Option<i64> =
            sqlx::query_scalar("SELECT version FROM documents WHERE collection = $1 AND id = $2")
                .bind(collection)
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;

        Err(match current {
            Some(actual) => StoreError::Conflict {
                collection: collection.to_string(),
                id,
                expected: expected_version,
                actual,
            },
            None => StoreError::NotFound {
                collection: collection.to_string(),
                id,
            },
        })
    }

    async fn find(&self, collection: &str, query: &Query) -> Result<Vec<Document>, StoreError> {
        let mut builder = QueryBuilder::<Postgres>::new("SELECT body FROM documents WHERE collection = ");
        builder.push_bind(collection.to_string());
        push_filters(&mut builder, &query.filters);

        if let Some(sort) = &query.sort {
            builder
                .push(" ORDER BY body #>> ")
                .push_bind(path_of(&sort.field))
                .push(if sort.descending { " DESC" } else { " ASC" });
        }
        if let Some(limit) = query.limit {
            builder.push(" LIMIT ").push_bind(limit as i64);
        }
        if query.skip > 0 {
            builder.push(" OFFSET ").push_bind(query.skip as i64);
        }

        let rows = builder.build().fetch_all(&self.pool).await?;
        rows.into_iter()
            .map(|row| {
                row.try_get::<Json<Document>, _>("body")
                    .map(|Json(doc)| doc)
                    .map_err(StoreError::from)
            })
            .collect()
    }

    async fn count(&self, collection: &str, filters: &[Filter]) -> Result<u64, StoreError> {
        let mut builder = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM documents WHERE collection = ");
        builder.push_bind(collection.to_string());
        push_filters(&mut builder, filters);

        let count: i64 = builder.build_query_scalar().fetch_one(&self.pool).await?;
        Ok(count.max(0) as u64)
    }

    async fn sum(&self, collection: &str, filters: &[Filter], field: &str) -> Result<Decimal, StoreError> {
        let mut builder = QueryBuilder::<Postgres>::new("SELECT COALESCE(SUM((body #>> ");
        builder
            .push_bind(path_of(field))
            .push(")::numeric), 0)::text FROM documents WHERE collection = ")
            .push_bind(collection.to_string());
        push_filters(&mut builder, filters);

        let total: String = builder.build_query_scalar().fetch_one(&self.pool).await?;
        Decimal::from_str(&total).map_err(|e| StoreError::Backend(format!("bad numeric sum {total}: {e}")))
    }

    async fn next_sequence(&self, name: &str) -> Result<i64, StoreError> {
        let value: i64 = sqlx::query_scalar(
            "INSERT INTO sequences (name, value) VALUES ($1, 1)
             ON CONFLICT (name) DO UPDATE SET value = sequences.value + 1
             RETURNING value",
        )
        .bind(name)
        .fetch_one(&self.pool)
        .await?;

        Ok(value)
    }

    fn backend(&self) -> &'static str {
        "postgres"
    }
}
