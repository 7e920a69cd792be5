//! Postgres-backed document store.
//!
//! All collections share one `documents` table keyed by `(collection, id)`
//! with the document body in a JSONB column.
//!
//! ## Connection lifecycle
//!
//! [`PgBackend`] owns a lazily-connecting pool. The schema is created on the
//! first successful round-trip and remembered for the lifetime of the
//! backend; a failed attempt is retried by the next operation.
//!
//! ## Enrollment
//!
//! [`AlunoCollection::insert_within_capacity`] runs in a transaction holding a
//! per-turma advisory lock (`pg_advisory_xact_lock(hashtext(turma_id))`), so
//! the seat count and the insert are serialized per turma.

use std::marker::PhantomData;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value as JsonValue;
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::Row;
use tokio::sync::OnceCell;
use tracing::instrument;

use identyflow_core::Entity;
use identyflow_school::{Admission, Aluno, Turma, has_seat};

use super::{ALUNOS, AlunoCollection, Collection, Document, StoreError};

const MAX_CONNECTIONS: u32 = 10;

const SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS documents (
        collection TEXT NOT NULL,
        id TEXT NOT NULL,
        body JSONB NOT NULL,
        updated_at TIMESTAMPTZ NOT NULL DEFAULT now(),
        PRIMARY KEY (collection, id)
    )
    "#,
    r#"
    CREATE INDEX IF NOT EXISTS documents_aluno_turma
        ON documents ((body->>'turmaId'))
        WHERE collection = 'alunos'
    "#,
];

fn map_sqlx_error(operation: &'static str, err: sqlx::Error) -> StoreError {
    StoreError::Database {
        operation,
        message: err.to_string(),
    }
}

/// Explicit connection object owned by the process bootstrap.
pub struct PgBackend {
    pool: PgPool,
    schema: OnceCell<()>,
}

impl PgBackend {
    /// Build a lazily-connecting pool. Fails only on a malformed URL.
    pub fn new(database_url: &str, acquire_timeout: Duration) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(MAX_CONNECTIONS)
            .acquire_timeout(acquire_timeout)
            .connect_lazy(database_url)
            .map_err(|e| map_sqlx_error("connect", e))?;
        Ok(Self {
            pool,
            schema: OnceCell::new(),
        })
    }

    /// The pool, once the schema is known to exist.
    pub async fn ready(&self) -> Result<&PgPool, StoreError> {
        self.schema
            .get_or_try_init(|| async {
                for statement in SCHEMA {
                    sqlx::query(*statement)
                        .execute(&self.pool)
                        .await
                        .map_err(|e| map_sqlx_error("ensure_schema", e))?;
                }
                tracing::info!("document schema ready");
                Ok::<(), StoreError>(())
            })
            .await?;
        Ok(&self.pool)
    }
}

/// One named collection inside the `documents` table.
pub struct PgCollection<V> {
    backend: Arc<PgBackend>,
    name: &'static str,
    _doc: PhantomData<fn() -> V>,
}

impl<V> PgCollection<V> {
    pub fn new(backend: Arc<PgBackend>, name: &'static str) -> Self {
        Self {
            backend,
            name,
            _doc: PhantomData,
        }
    }
}

impl<V: Document> PgCollection<V> {
    fn decode(&self, id: String, body: JsonValue) -> Result<V, StoreError> {
        serde_json::from_value(body).map_err(|e| StoreError::Decode {
            collection: self.name,
            id,
            message: e.to_string(),
        })
    }

    fn encode(value: &V) -> Result<(String, JsonValue), StoreError> {
        let body = serde_json::to_value(value).map_err(|e| StoreError::Encode(e.to_string()))?;
        Ok((value.id().to_string(), body))
    }
}

#[async_trait]
impl<V: Document> Collection<V> for PgCollection<V> {
    #[instrument(skip(self), fields(collection = self.name), err)]
    async fn get(&self, id: &V::Id) -> Result<Option<V>, StoreError> {
        let pool = self.backend.ready().await?;
        let row = sqlx::query(
            r#"
            SELECT body
            FROM documents
            WHERE collection = $1 AND id = $2
            "#,
        )
        .bind(self.name)
        .bind(id.to_string())
        .fetch_optional(pool)
        .await
        .map_err(|e| map_sqlx_error("get", e))?;

        match row {
            None => Ok(None),
            Some(row) => {
                let body: JsonValue = row
                    .try_get("body")
                    .map_err(|e| map_sqlx_error("get", e))?;
                self.decode(id.to_string(), body).map(Some)
            }
        }
    }

    #[instrument(skip(self, value), fields(collection = self.name), err)]
    async fn upsert(&self, value: V) -> Result<(), StoreError> {
        let pool = self.backend.ready().await?;
        let (id, body) = Self::encode(&value)?;
        sqlx::query(
            r#"
            INSERT INTO documents (collection, id, body)
            VALUES ($1, $2, $3)
            ON CONFLICT (collection, id)
            DO UPDATE SET body = EXCLUDED.body, updated_at = now()
            "#,
        )
        .bind(self.name)
        .bind(id)
        .bind(body)
        .execute(pool)
        .await
        .map_err(|e| map_sqlx_error("upsert", e))?;
        Ok(())
    }

    #[instrument(skip(self), fields(collection = self.name), err)]
    async fn delete(&self, id: &V::Id) -> Result<bool, StoreError> {
        let pool = self.backend.ready().await?;
        let result = sqlx::query("DELETE FROM documents WHERE collection = $1 AND id = $2")
            .bind(self.name)
            .bind(id.to_string())
            .execute(pool)
            .await
            .map_err(|e| map_sqlx_error("delete", e))?;
        Ok(result.rows_affected() > 0)
    }

    #[instrument(skip(self), fields(collection = self.name), err)]
    async fn list(&self) -> Result<Vec<V>, StoreError> {
        let pool = self.backend.ready().await?;
        let rows = sqlx::query(
            r#"
            SELECT id, body
            FROM documents
            WHERE collection = $1
            ORDER BY id ASC
            "#,
        )
        .bind(self.name)
        .fetch_all(pool)
        .await
        .map_err(|e| map_sqlx_error("list", e))?;

        let mut out = Vec::with_capacity(rows.len());
        for row in rows {
            let id: String = row.try_get("id").map_err(|e| map_sqlx_error("list", e))?;
            let body: JsonValue = row
                .try_get("body")
                .map_err(|e| map_sqlx_error("list", e))?;
            out.push(self.decode(id, body)?);
        }
        Ok(out)
    }
}

#[async_trait]
impl AlunoCollection for PgCollection<Aluno> {
    #[instrument(skip(self, aluno, turma), fields(turma_id = %turma.id), err)]
    async fn insert_within_capacity(
        &self,
        aluno: Aluno,
        turma: &Turma,
    ) -> Result<Admission, StoreError> {
        let pool = self.backend.ready().await?;
        let (id, body) = Self::encode(&aluno)?;
        let turma_id = turma.id.to_string();

        let mut tx = pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("enroll.begin", e))?;

        sqlx::query("SELECT pg_advisory_xact_lock(hashtext($1))")
            .bind(&turma_id)
            .execute(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("enroll.lock", e))?;

        let row = sqlx::query(
            r#"
            SELECT COUNT(*) AS enrolled
            FROM documents
            WHERE collection = $1 AND body->>'turmaId' = $2
            "#,
        )
        .bind(ALUNOS)
        .bind(&turma_id)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("enroll.count", e))?;
        let enrolled: i64 = row
            .try_get("enrolled")
            .map_err(|e| map_sqlx_error("enroll.count", e))?;
        let matriculados = u32::try_from(enrolled).unwrap_or(u32::MAX);

        if !has_seat(turma.capacidade, matriculados) {
            tx.rollback()
                .await
                .map_err(|e| map_sqlx_error("enroll.rollback", e))?;
            return Ok(Admission::Full { matriculados });
        }

        sqlx::query(
            r#"
            INSERT INTO documents (collection, id, body)
            VALUES ($1, $2, $3)
            "#,
        )
        .bind(ALUNOS)
        .bind(id)
        .bind(body)
        .execute(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("enroll.insert", e))?;

        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("enroll.commit", e))?;
        Ok(Admission::Inserted)
    }
}
