//! Read-only aggregations, scoped the same way as the aluno listings.

use std::sync::Arc;

use chrono::Utc;

use identyflow_auth::{Action, AuthzError, Principal, authorize};
use identyflow_billing::PlanCatalog;
use identyflow_core::UserId;
use identyflow_school::Aluno;
use identyflow_school::stats::{Analytics, Dashboard, GodMetrics, InstrutorStats};

use crate::error::ServiceResult;
use crate::services::scope_from;
use crate::store::Datastore;

#[derive(Clone)]
pub struct StatsService {
    store: Datastore,
    catalog: Arc<PlanCatalog>,
}

fn to_u32(n: usize) -> u32 {
    u32::try_from(n).unwrap_or(u32::MAX)
}

impl StatsService {
    pub fn new(store: Datastore, catalog: Arc<PlanCatalog>) -> Self {
        Self { store, catalog }
    }

    async fn visible_alunos(&self, principal: &Principal) -> ServiceResult<Vec<Aluno>> {
        let users = self.store.users.list().await?;
        let scope = scope_from(&users, principal);
        Ok(self
            .store
            .alunos
            .list()
            .await?
            .into_iter()
            .filter(|a| a.visible_in(&scope))
            .collect())
    }

    pub async fn dashboard(&self, principal: &Principal) -> ServiceResult<Dashboard> {
        authorize(principal, Action::ViewDashboard)?;
        let alunos = self.visible_alunos(principal).await?;
        let total_cursos = self
            .store
            .cursos
            .list()
            .await?
            .iter()
            .filter(|c| c.is_active())
            .count();
        let total_usuarios = self
            .store
            .users
            .list()
            .await?
            .iter()
            .filter(|u| u.visible_to(principal))
            .count();
        Ok(Dashboard::compute(
            &alunos,
            to_u32(total_cursos),
            to_u32(total_usuarios),
            Utc::now(),
        ))
    }

    pub async fn analytics(&self, principal: &Principal) -> ServiceResult<Analytics> {
        authorize(principal, Action::ViewAnalytics)?;
        let alunos = self.visible_alunos(principal).await?;
        Ok(Analytics::compute(&alunos, Utc::now()))
    }

    /// Turmas, students and commission of one instrutor. Callers only see
    /// instrutores inside their own scope.
    pub async fn instrutor(&self, principal: &Principal, instrutor_id: UserId) -> ServiceResult<InstrutorStats> {
        let users = self.store.users.list().await?;
        if !scope_from(&users, principal).covers_instrutor(instrutor_id) {
            return Err(AuthzError::OutOfScope.into());
        }
        let turmas: Vec<_> = self
            .store
            .turmas
            .list()
            .await?
            .into_iter()
            .filter(|t| t.instrutor_id == Some(instrutor_id))
            .collect();
        let alunos: Vec<Aluno> = self
            .store
            .alunos
            .list()
            .await?
            .into_iter()
            .filter(|a| a.turma_id.is_some_and(|id| turmas.iter().any(|t| t.id == id)))
            .collect();
        let cursos = self.store.cursos.list().await?;
        Ok(InstrutorStats::compute(&turmas, &cursos, &alunos, Utc::now()))
    }

    pub async fn god_metrics(&self, principal: &Principal) -> ServiceResult<GodMetrics> {
        authorize(principal, Action::ViewGodMetrics)?;
        let users = self.store.users.list().await?;
        let subs = self.store.subscriptions.list().await?;
        let alunos = self.store.alunos.list().await?;
        Ok(GodMetrics::compute(
            &users,
            &subs,
            &alunos,
            &self.catalog,
            Utc::now(),
        ))
    }
}
