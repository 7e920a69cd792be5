use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;

use identyflow_core::Entity;
use identyflow_school::{Admission, Aluno, Turma, has_seat};

use super::{AlunoCollection, Collection, Document, StoreError};

/// In-memory collection for tests/dev.
pub struct InMemoryCollection<V: Entity> {
    inner: RwLock<HashMap<V::Id, V>>,
}

impl<V: Entity> InMemoryCollection<V> {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(HashMap::new()),
        }
    }
}

impl<V: Entity> Default for InMemoryCollection<V> {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl<V: Document> Collection<V> for InMemoryCollection<V> {
    async fn get(&self, id: &V::Id) -> Result<Option<V>, StoreError> {
        let map = self.inner.read().map_err(|_| StoreError::Poisoned)?;
        Ok(map.get(id).cloned())
    }

    async fn upsert(&self, value: V) -> Result<(), StoreError> {
        let mut map = self.inner.write().map_err(|_| StoreError::Poisoned)?;
        map.insert(value.id().clone(), value);
        Ok(())
    }

    async fn delete(&self, id: &V::Id) -> Result<bool, StoreError> {
        let mut map = self.inner.write().map_err(|_| StoreError::Poisoned)?;
        Ok(map.remove(id).is_some())
    }

    async fn list(&self) -> Result<Vec<V>, StoreError> {
        let map = self.inner.read().map_err(|_| StoreError::Poisoned)?;
        Ok(map.values().cloned().collect())
    }
}

#[async_trait]
impl AlunoCollection for InMemoryCollection<Aluno> {
    async fn insert_within_capacity(
        &self,
        aluno: Aluno,
        turma: &Turma,
    ) -> Result<Admission, StoreError> {
        let mut map = self.inner.write().map_err(|_| StoreError::Poisoned)?;
        let enrolled = map
            .values()
            .filter(|a| a.turma_id == Some(turma.id))
            .count();
        let matriculados = u32::try_from(enrolled).unwrap_or(u32::MAX);
        if !has_seat(turma.capacidade, matriculados) {
            return Ok(Admission::Full { matriculados });
        }
        map.insert(aluno.id, aluno);
        Ok(Admission::Inserted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use identyflow_auth::{Principal, Role};
    use identyflow_core::{CursoId, UserId};
    use identyflow_school::{NewAluno, NewTurma};
    use std::sync::Arc;

    fn turma(capacidade: u32) -> Turma {
        let admin = Principal::new(UserId::new(), Role::Admin);
        Turma::create(
            NewTurma {
                nome: "Coloração".into(),
                curso_id: CursoId::new(),
                data_inicio: None,
                data_fim: None,
                horario: None,
                capacidade: Some(capacidade),
                status: None,
                instrutor_id: None,
            },
            &admin,
            Utc::now(),
        )
        .unwrap()
    }

    fn aluno(turma: &Turma) -> Aluno {
        let admin = Principal::new(UserId::new(), Role::Admin);
        Aluno::create(
            NewAluno {
                nome: "Aluno".into(),
                cpf: "1".into(),
                turma_id: Some(turma.id),
                ..Default::default()
            },
            &admin,
            Utc::now(),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn upsert_get_delete() {
        let store = InMemoryCollection::<Turma>::new();
        let t = turma(5);
        store.upsert(t.clone()).await.unwrap();
        assert_eq!(store.get(&t.id).await.unwrap(), Some(t.clone()));
        assert!(store.delete(&t.id).await.unwrap());
        assert!(!store.delete(&t.id).await.unwrap());
        assert!(store.list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn capacity_checked_insert_stops_at_capacity() {
        let store = InMemoryCollection::<Aluno>::new();
        let t = turma(2);
        for _ in 0..2 {
            assert_eq!(
                store.insert_within_capacity(aluno(&t), &t).await.unwrap(),
                Admission::Inserted
            );
        }
        assert_eq!(
            store.insert_within_capacity(aluno(&t), &t).await.unwrap(),
            Admission::Full { matriculados: 2 }
        );
        assert_eq!(store.list().await.unwrap().len(), 2);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_enrollment_never_overbooks() {
        let store = Arc::new(InMemoryCollection::<Aluno>::new());
        let t = Arc::new(turma(5));

        let mut handles = Vec::new();
        for _ in 0..20 {
            let store = store.clone();
            let t = t.clone();
            handles.push(tokio::spawn(async move {
                store.insert_within_capacity(aluno(&t), &t).await.unwrap()
            }));
        }

        let mut inserted = 0;
        for h in handles {
            if h.await.unwrap() == Admission::Inserted {
                inserted += 1;
            }
        }
        assert_eq!(inserted, 5);
        assert_eq!(store.list().await.unwrap().len(), 5);
    }
}
