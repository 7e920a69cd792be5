//! Document datastore boundary.
//!
//! Every collection stores whole documents keyed by their entity id. Queries
//! beyond get/list are answered by the services over the listed documents;
//! the only store-side query is the capacity-checked enrollment insert, which
//! must be atomic.

pub mod memory;
pub mod postgres;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use serde::de::DeserializeOwned;
use thiserror::Error;

use identyflow_auth::User;
use identyflow_billing::Subscription;
use identyflow_core::Entity;
use identyflow_school::{Admission, Aluno, Curso, Turma};

pub use memory::InMemoryCollection;
pub use postgres::{PgBackend, PgCollection};

pub const USERS: &str = "users";
pub const SUBSCRIPTIONS: &str = "subscriptions";
pub const CURSOS: &str = "cursos";
pub const TURMAS: &str = "turmas";
pub const ALUNOS: &str = "alunos";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("datastore operation '{operation}' failed: {message}")]
    Database {
        operation: &'static str,
        message: String,
    },

    #[error("document {collection}/{id} could not be decoded: {message}")]
    Decode {
        collection: &'static str,
        id: String,
        message: String,
    },

    #[error("document could not be encoded: {0}")]
    Encode(String),

    #[error("in-memory store lock poisoned")]
    Poisoned,
}

/// Anything a collection can hold.
pub trait Document: Entity + Clone + Serialize + DeserializeOwned + Send + Sync + 'static {}

impl<T> Document for T where T: Entity + Clone + Serialize + DeserializeOwned + Send + Sync + 'static
{}

/// A named set of documents of one type.
#[async_trait]
pub trait Collection<V: Document>: Send + Sync {
    async fn get(&self, id: &V::Id) -> Result<Option<V>, StoreError>;

    /// Insert or replace (last write wins).
    async fn upsert(&self, value: V) -> Result<(), StoreError>;

    /// Returns whether a document was removed.
    async fn delete(&self, id: &V::Id) -> Result<bool, StoreError>;

    async fn list(&self) -> Result<Vec<V>, StoreError>;
}

#[async_trait]
impl<V, S> Collection<V> for Arc<S>
where
    V: Document,
    S: Collection<V> + ?Sized,
{
    async fn get(&self, id: &V::Id) -> Result<Option<V>, StoreError> {
        (**self).get(id).await
    }

    async fn upsert(&self, value: V) -> Result<(), StoreError> {
        (**self).upsert(value).await
    }

    async fn delete(&self, id: &V::Id) -> Result<bool, StoreError> {
        (**self).delete(id).await
    }

    async fn list(&self) -> Result<Vec<V>, StoreError> {
        (**self).list().await
    }
}

/// Aluno collection with the capacity-checked insert.
#[async_trait]
pub trait AlunoCollection: Collection<Aluno> {
    /// Insert `aluno` into `turma` only while the turma has a free seat.
    ///
    /// Counting and inserting happen under one lock (or transaction), so two
    /// concurrent enrollments can never both take the last seat.
    async fn insert_within_capacity(
        &self,
        aluno: Aluno,
        turma: &Turma,
    ) -> Result<Admission, StoreError>;
}

/// The process-wide datastore handle, built once at bootstrap and injected.
#[derive(Clone)]
pub struct Datastore {
    pub users: Arc<dyn Collection<User>>,
    pub subscriptions: Arc<dyn Collection<Subscription>>,
    pub cursos: Arc<dyn Collection<Curso>>,
    pub turmas: Arc<dyn Collection<Turma>>,
    pub alunos: Arc<dyn AlunoCollection>,
}

impl Datastore {
    pub fn in_memory() -> Self {
        Self {
            users: Arc::new(InMemoryCollection::<User>::new()),
            subscriptions: Arc::new(InMemoryCollection::<Subscription>::new()),
            cursos: Arc::new(InMemoryCollection::<Curso>::new()),
            turmas: Arc::new(InMemoryCollection::<Turma>::new()),
            alunos: Arc::new(InMemoryCollection::<Aluno>::new()),
        }
    }

    pub fn postgres(backend: Arc<PgBackend>) -> Self {
        Self {
            users: Arc::new(PgCollection::<User>::new(backend.clone(), USERS)),
            subscriptions: Arc::new(PgCollection::<Subscription>::new(
                backend.clone(),
                SUBSCRIPTIONS,
            )),
            cursos: Arc::new(PgCollection::<Curso>::new(backend.clone(), CURSOS)),
            turmas: Arc::new(PgCollection::<Turma>::new(backend.clone(), TURMAS)),
            alunos: Arc::new(PgCollection::<Aluno>::new(backend, ALUNOS)),
        }
    }

    /// Open the datastore named by `database_url`, or an in-memory one.
    ///
    /// A failed first connection is logged and the process keeps running;
    /// the pool reconnects on the next request.
    pub async fn open(
        database_url: Option<&str>,
        connect_timeout: Duration,
    ) -> Result<Self, StoreError> {
        let Some(url) = database_url else {
            tracing::warn!("DATABASE_URL not set; using the in-memory datastore");
            return Ok(Self::in_memory());
        };

        let backend = Arc::new(PgBackend::new(url, connect_timeout)?);
        match tokio::time::timeout(connect_timeout, backend.ready()).await {
            Ok(Ok(_)) => tracing::info!("datastore connected"),
            Ok(Err(err)) => tracing::error!(error = %err, "datastore connection failed; continuing"),
            Err(_) => tracing::error!(
                timeout_secs = connect_timeout.as_secs(),
                "datastore connection timed out; continuing"
            ),
        }
        Ok(Self::postgres(backend))
    }
}
