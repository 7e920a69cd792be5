//! Subscription lifecycle on top of the datastore.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{info, warn};

use identyflow_auth::{Principal, Role};
use identyflow_billing::{
    Ciclo, FeatureAccess, FeatureKey, LimitKey, LimitStatus, PaymentInfo, PlanCatalog,
    Subscription, SubscriptionSummary, UsageCounts, WebhookEvent, WebhookOutcome, check_feature,
    check_limit, count_since,
};
use identyflow_core::{DomainError, UserId};

use crate::error::ServiceResult;
use crate::services::{scope_from, team_of};
use crate::store::Datastore;

#[derive(Clone)]
pub struct SubscriptionService {
    store: Datastore,
    catalog: Arc<PlanCatalog>,
    auto_provision: bool,
}

impl SubscriptionService {
    /// `auto_provision` controls whether a non-god principal without a row
    /// gets a courtesy starter subscription on first read. God always gets
    /// premium.
    pub fn new(store: Datastore, catalog: Arc<PlanCatalog>, auto_provision: bool) -> Self {
        Self {
            store,
            catalog,
            auto_provision,
        }
    }

    pub fn catalog(&self) -> &PlanCatalog {
        &self.catalog
    }

    /// Most recent row for `user_id`.
    async fn find(&self, user_id: UserId) -> ServiceResult<Option<Subscription>> {
        let mut rows: Vec<Subscription> = self
            .store
            .subscriptions
            .list()
            .await?
            .into_iter()
            .filter(|s| s.user_id == user_id)
            .collect();
        rows.sort_by(|a, b| b.criado_em.cmp(&a.criado_em));
        Ok(rows.into_iter().next())
    }

    /// Existing row (refreshed and persisted if its state moved), or a
    /// provisioned one, or `None` when provisioning is switched off.
    pub async fn get_or_create(&self, principal: &Principal) -> ServiceResult<Option<Subscription>> {
        let now = Utc::now();
        match self.find(principal.id).await? {
            Some(mut sub) => {
                if sub.refresh(principal.role, now) {
                    info!(user_id = %principal.id, status = ?sub.status, plano = %sub.plano, "subscription refreshed");
                    self.store.subscriptions.upsert(sub.clone()).await?;
                }
                Ok(Some(sub))
            }
            None if principal.is_god() || self.auto_provision => {
                let sub = Subscription::auto_provision(principal.id, principal.role, now);
                info!(user_id = %principal.id, plano = %sub.plano, "subscription auto-provisioned");
                self.store.subscriptions.upsert(sub.clone()).await?;
                Ok(Some(sub))
            }
            None => Ok(None),
        }
    }

    /// Live counters for the principal's tenant.
    pub async fn usage(
        &self,
        principal: &Principal,
        sub: Option<&Subscription>,
    ) -> ServiceResult<UsageCounts> {
        let users = self.store.users.list().await?;
        let instrutores = match principal.role {
            Role::God => users.iter().filter(|u| u.role == Role::Instrutor).count(),
            Role::Admin | Role::Instrutor => team_of(&users, principal.id).len(),
        };
        let scope = scope_from(&users, principal);
        let anchor = sub.map_or(DateTime::<Utc>::MIN_UTC, |s| s.uso.alunos_ano_reset);
        let alunos = self.store.alunos.list().await?;
        let alunos_ano = count_since(
            anchor,
            alunos
                .iter()
                .filter(|a| a.visible_in(&scope))
                .map(|a| a.criado_em),
        );
        let cursos = self
            .store
            .cursos
            .list()
            .await?
            .iter()
            .filter(|c| c.is_active())
            .count();

        Ok(UsageCounts {
            alunos_ano,
            cursos: to_u32(cursos),
            instrutores: to_u32(instrutores),
        })
    }

    /// "My subscription". `None` when there is none and provisioning is off.
    pub async fn summary(&self, principal: &Principal) -> ServiceResult<Option<SubscriptionSummary>> {
        let Some(mut sub) = self.get_or_create(principal).await? else {
            return Ok(None);
        };
        let uso = self.usage(principal, Some(&sub)).await?;
        if uso != stored_usage(&sub) {
            sub.record_usage(uso);
            self.store.subscriptions.upsert(sub.clone()).await?;
        }
        Ok(Some(SubscriptionSummary::build(
            &sub,
            principal.role,
            &self.catalog,
            uso,
            Utc::now(),
        )))
    }

    /// Unknown feature names resolve to "no access", never to an error.
    pub async fn feature(&self, principal: &Principal, feature: &str) -> ServiceResult<FeatureAccess> {
        let key = feature.parse::<FeatureKey>().ok();
        let sub = self.get_or_create(principal).await?;
        Ok(check_feature(
            sub.as_ref(),
            principal.role,
            &self.catalog,
            key,
            Utc::now(),
        ))
    }

    /// Unknown limit types are a validation error.
    pub async fn limit(&self, principal: &Principal, tipo: &str) -> ServiceResult<LimitStatus> {
        let key = tipo.parse::<LimitKey>()?;
        let sub = self.get_or_create(principal).await?;
        let uso = self.usage(principal, sub.as_ref()).await?;
        Ok(check_limit(
            sub.as_ref(),
            principal.role,
            &self.catalog,
            key,
            uso.get(key),
            Utc::now(),
        ))
    }

    pub async fn subscribe(
        &self,
        principal: &Principal,
        plano: &str,
        ciclo: Ciclo,
        payment: Option<PaymentInfo>,
    ) -> ServiceResult<Subscription> {
        let existing = self.find(principal.id).await?;
        let sub = Subscription::create_or_renew(
            existing,
            principal.id,
            &self.catalog,
            plano,
            ciclo,
            payment,
            Utc::now(),
        )?;
        self.store.subscriptions.upsert(sub.clone()).await?;
        info!(user_id = %principal.id, plano = %sub.plano, ciclo = ?sub.ciclo, "subscription created or renewed");
        Ok(sub)
    }

    pub async fn start_trial(&self, principal: &Principal) -> ServiceResult<Subscription> {
        let existing = self.find(principal.id).await?;
        let sub = Subscription::start_trial(existing, principal.id, Utc::now())?;
        self.store.subscriptions.upsert(sub.clone()).await?;
        info!(user_id = %principal.id, expires = %sub.data_expiracao, "trial started");
        Ok(sub)
    }

    /// Access remains until the stored expiry.
    pub async fn cancel(&self, principal: &Principal) -> ServiceResult<Subscription> {
        let mut sub = self
            .find(principal.id)
            .await?
            .ok_or(DomainError::SubscriptionNotFound)?;
        sub.cancel(Utc::now());
        self.store.subscriptions.upsert(sub.clone()).await?;
        info!(user_id = %principal.id, until = %sub.data_expiracao, "subscription cancelled");
        Ok(sub)
    }

    /// Apply an already-authenticated gateway event. A client id that
    /// matches no subscription is logged and ignored.
    pub async fn apply_webhook(&self, event: &WebhookEvent) -> ServiceResult<WebhookOutcome> {
        let Some(cliente_id) = event.cliente_id() else {
            warn!(evento = %event.evento, "webhook without clienteId ignored");
            return Ok(WebhookOutcome::Ignored);
        };
        let matched = self
            .store
            .subscriptions
            .list()
            .await?
            .into_iter()
            .find(|s| s.pagamento.gateway_id.as_deref() == Some(cliente_id));
        let Some(mut sub) = matched else {
            warn!(evento = %event.evento, cliente_id, "webhook matches no subscription");
            return Ok(WebhookOutcome::Ignored);
        };

        let outcome = sub.apply_payment_webhook(event, &self.catalog, Utc::now());
        if outcome != WebhookOutcome::Ignored {
            self.store.subscriptions.upsert(sub.clone()).await?;
        }
        info!(user_id = %sub.user_id, evento = %event.evento, ?outcome, "webhook applied");
        Ok(outcome)
    }

    /// Guard run before an admin creates an instrutor: a subscription inside
    /// its paid period is required (a cancelled one counts until expiry) and
    /// the plan's `instrutores` limit must leave room for one more.
    pub async fn ensure_instrutor_capacity(&self, admin: &Principal) -> ServiceResult<()> {
        let now = Utc::now();
        let sub = self
            .get_or_create(admin)
            .await?
            .filter(|s| s.within_paid_period(admin.role, now))
            .ok_or(DomainError::SubscriptionRequired)?;

        let users = self.store.users.list().await?;
        let atual = to_u32(team_of(&users, admin.id).len());
        if !sub.within_limit(&self.catalog, LimitKey::Instrutores, atual) {
            let limite = self
                .catalog
                .get(&sub.plano)
                .map_or(0, |p| p.limites.get(LimitKey::Instrutores));
            warn!(admin_id = %admin.id, limite, atual, "instructor limit reached");
            return Err(DomainError::InstructorLimitReached { limite, atual }.into());
        }
        Ok(())
    }
}

fn stored_usage(sub: &Subscription) -> UsageCounts {
    UsageCounts {
        alunos_ano: sub.uso.alunos_ano,
        cursos: sub.uso.cursos,
        instrutores: sub.uso.instrutores,
    }
}

fn to_u32(n: usize) -> u32 {
    u32::try_from(n).unwrap_or(u32::MAX)
}
