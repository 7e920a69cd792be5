//! Subscription entity and its lifecycle.
//!
//! # Invariants
//! - `trial_usado` never goes back to `false`.
//! - A god principal is always treated as active and is kept on premium.
//! - Expiry is lazy: `ativa` becomes `expirada` only when the row is read
//!   through [`Subscription::refresh`].
//! - `historico_pagamentos` is append-only.

use chrono::{DateTime, Duration, Months, Utc};
use serde::{Deserialize, Serialize};

use identyflow_auth::Role;
use identyflow_core::{DomainError, DomainResult, Entity, SubscriptionId, UserId};

use crate::{FeatureKey, Features, LimitKey, Limits, PREMIUM, PlanCatalog, STARTER, UsageCounts};

/// Lifetime of auto-provisioned rows ("forever").
const AUTO_PROVISION_MONTHS: u32 = 100 * 12;
const TRIAL_DAYS: i64 = 7;

#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Ciclo {
    #[default]
    Mensal,
    Anual,
}

impl Ciclo {
    pub fn months(self) -> u32 {
        match self {
            Ciclo::Mensal => 1,
            Ciclo::Anual => 12,
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubscriptionStatus {
    Pendente,
    Ativa,
    Trial,
    Cancelada,
    Expirada,
}

#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MetodoPagamento {
    #[default]
    Cartao,
    Pix,
    Boleto,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    Aprovado,
    Recusado,
    Pendente,
    Estornado,
}

/// Stored payment method. Card data is masked; `gateway_id` is the
/// customer id at the payment gateway and keys incoming webhooks.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Pagamento {
    pub metodo: MetodoPagamento,
    pub ultimos_digitos: Option<String>,
    pub bandeira: Option<String>,
    pub token_cartao: Option<String>,
    pub gateway_id: Option<String>,
}

/// Payment details supplied on create/renew. Only present fields overwrite.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PaymentInfo {
    pub metodo: Option<MetodoPagamento>,
    pub ultimos_digitos: Option<String>,
    pub bandeira: Option<String>,
    pub token_cartao: Option<String>,
    pub gateway_id: Option<String>,
    pub transacao_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentRecord {
    pub data: DateTime<Utc>,
    pub valor_centavos: u64,
    pub status: PaymentStatus,
    #[serde(default)]
    pub transacao_id: Option<String>,
    pub metodo: MetodoPagamento,
}

/// Usage sub-document: last computed counters plus the `alunosAno` anchor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Uso {
    #[serde(default)]
    pub alunos_ano: u32,
    pub alunos_ano_reset: DateTime<Utc>,
    #[serde(default)]
    pub cursos: u32,
    #[serde(default)]
    pub instrutores: u32,
}

impl Uso {
    pub fn reset_at(anchor: DateTime<Utc>) -> Self {
        Self {
            alunos_ano: 0,
            alunos_ano_reset: anchor,
            cursos: 0,
            instrutores: 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Subscription {
    pub id: SubscriptionId,
    pub user_id: UserId,
    /// Catalog key. Kept as text so rows survive catalog changes.
    pub plano: String,
    #[serde(default)]
    pub ciclo: Ciclo,
    pub status: SubscriptionStatus,
    pub data_inicio: DateTime<Utc>,
    pub data_expiracao: DateTime<Utc>,
    #[serde(default)]
    pub data_proxima_cobranca: Option<DateTime<Utc>>,
    #[serde(default)]
    pub pagamento: Pagamento,
    #[serde(default)]
    pub historico_pagamentos: Vec<PaymentRecord>,
    pub uso: Uso,
    #[serde(default)]
    pub trial_usado: bool,
    /// Courtesy row created on first read rather than purchased.
    #[serde(default)]
    pub automatico: bool,
    #[serde(default)]
    pub observacoes: Option<String>,
    pub criado_em: DateTime<Utc>,
    pub atualizado_em: DateTime<Utc>,
}

impl Entity for Subscription {
    type Id = SubscriptionId;

    fn id(&self) -> &SubscriptionId {
        &self.id
    }
}

/// `now + n` calendar months, clamped to month end.
pub fn add_months(now: DateTime<Utc>, n: u32) -> DateTime<Utc> {
    now.checked_add_months(Months::new(n))
        .unwrap_or_else(|| now + Duration::days(30 * i64::from(n)))
}

impl Subscription {
    fn blank(user_id: UserId, plano: &str, status: SubscriptionStatus, now: DateTime<Utc>) -> Self {
        Self {
            id: SubscriptionId::new(),
            user_id,
            plano: plano.to_string(),
            ciclo: Ciclo::Mensal,
            status,
            data_inicio: now,
            data_expiracao: now,
            data_proxima_cobranca: None,
            pagamento: Pagamento::default(),
            historico_pagamentos: Vec::new(),
            uso: Uso::reset_at(now),
            trial_usado: false,
            automatico: false,
            observacoes: None,
            criado_em: now,
            atualizado_em: now,
        }
    }

    /// Courtesy row for a principal reading its subscription for the first time.
    ///
    /// God gets premium, everyone else starter; both effectively never expire.
    pub fn auto_provision(user_id: UserId, role: Role, now: DateTime<Utc>) -> Self {
        let plano = if role.is_god() { PREMIUM } else { STARTER };
        let mut sub = Self::blank(user_id, plano, SubscriptionStatus::Ativa, now);
        sub.data_expiracao = add_months(now, AUTO_PROVISION_MONTHS);
        sub.data_proxima_cobranca = Some(sub.data_expiracao);
        sub.automatico = true;
        sub.observacoes = Some(format!("{plano} plan provisioned automatically"));
        sub
    }

    /// Re-evaluate stored state on read. Returns `true` when the row changed
    /// and must be persisted.
    pub fn refresh(&mut self, role: Role, now: DateTime<Utc>) -> bool {
        let mut changed = false;
        if role.is_god() && self.plano != PREMIUM {
            self.plano = PREMIUM.to_string();
            self.status = SubscriptionStatus::Ativa;
            self.automatico = true;
            changed = true;
        }
        if !role.is_god() && self.status == SubscriptionStatus::Ativa && now > self.data_expiracao {
            self.status = SubscriptionStatus::Expirada;
            changed = true;
        }
        if changed {
            self.atualizado_em = now;
        }
        changed
    }

    /// Status in {ativa, trial} and not past expiry. God is always active.
    pub fn is_active(&self, role: Role, now: DateTime<Utc>) -> bool {
        if role.is_god() {
            return true;
        }
        matches!(
            self.status,
            SubscriptionStatus::Ativa | SubscriptionStatus::Trial
        ) && now <= self.data_expiracao
    }

    /// Paid-for period still running: active, or cancelled but not yet
    /// past `data_expiracao`.
    pub fn within_paid_period(&self, role: Role, now: DateTime<Utc>) -> bool {
        self.is_active(role, now)
            || (self.status == SubscriptionStatus::Cancelada && now <= self.data_expiracao)
    }

    pub fn has_feature(&self, catalog: &PlanCatalog, feature: FeatureKey) -> bool {
        catalog.has_feature(&self.plano, feature)
    }

    pub fn within_limit(&self, catalog: &PlanCatalog, key: LimitKey, current: u32) -> bool {
        catalog.within_limit(&self.plano, key, current)
    }

    /// Start the one-time 7-day trial on `existing` (or a fresh row).
    pub fn start_trial(
        existing: Option<Subscription>,
        user_id: UserId,
        now: DateTime<Utc>,
    ) -> DomainResult<Subscription> {
        let mut sub = match existing {
            Some(s) if s.trial_usado => return Err(DomainError::TrialAlreadyUsed),
            Some(s) => s,
            None => Self::blank(user_id, STARTER, SubscriptionStatus::Trial, now),
        };
        sub.plano = STARTER.to_string();
        sub.status = SubscriptionStatus::Trial;
        sub.data_inicio = now;
        sub.data_expiracao = now + Duration::days(TRIAL_DAYS);
        sub.trial_usado = true;
        sub.automatico = false;
        sub.atualizado_em = now;
        Ok(sub)
    }

    /// Create or overwrite the user's subscription after a confirmed purchase.
    pub fn create_or_renew(
        existing: Option<Subscription>,
        user_id: UserId,
        catalog: &PlanCatalog,
        plano: &str,
        ciclo: Ciclo,
        payment: Option<PaymentInfo>,
        now: DateTime<Utc>,
    ) -> DomainResult<Subscription> {
        let plan = catalog
            .get(plano)
            .ok_or_else(|| DomainError::InvalidPlan(plano.to_string()))?;
        let expiracao = add_months(now, ciclo.months());

        let mut sub = existing
            .unwrap_or_else(|| Self::blank(user_id, plano, SubscriptionStatus::Ativa, now));
        sub.plano = plano.to_string();
        sub.ciclo = ciclo;
        sub.status = SubscriptionStatus::Ativa;
        sub.data_inicio = now;
        sub.data_expiracao = expiracao;
        sub.data_proxima_cobranca = Some(expiracao);
        sub.automatico = false;
        sub.observacoes = None;
        sub.atualizado_em = now;

        if let Some(info) = payment {
            let valor = match ciclo {
                Ciclo::Anual => plan.preco_anual_centavos,
                Ciclo::Mensal => plan.preco_centavos,
            };
            let metodo = info.metodo.unwrap_or_default();
            sub.merge_payment(info.clone());
            sub.historico_pagamentos.push(PaymentRecord {
                data: now,
                valor_centavos: valor,
                status: PaymentStatus::Aprovado,
                transacao_id: info.transacao_id,
                metodo,
            });
        }
        Ok(sub)
    }

    fn merge_payment(&mut self, info: PaymentInfo) {
        let p = &mut self.pagamento;
        if let Some(m) = info.metodo {
            p.metodo = m;
        }
        if info.ultimos_digitos.is_some() {
            p.ultimos_digitos = info.ultimos_digitos;
        }
        if info.bandeira.is_some() {
            p.bandeira = info.bandeira;
        }
        if info.token_cartao.is_some() {
            p.token_cartao = info.token_cartao;
        }
        if info.gateway_id.is_some() {
            p.gateway_id = info.gateway_id;
        }
    }

    /// Mark as cancelled. Expiry is untouched; the caller reports it.
    pub fn cancel(&mut self, now: DateTime<Utc>) {
        self.status = SubscriptionStatus::Cancelada;
        self.atualizado_em = now;
    }

    /// Gateway confirmed a charge: reactivate and extend by one cycle from `now`.
    pub fn approve_payment(&mut self, record: PaymentRecord, now: DateTime<Utc>) {
        let expiracao = add_months(now, self.ciclo.months());
        self.status = SubscriptionStatus::Ativa;
        self.data_expiracao = expiracao;
        self.data_proxima_cobranca = Some(expiracao);
        self.historico_pagamentos.push(record);
        self.atualizado_em = now;
    }

    /// Gateway declined a charge.
    pub fn decline_payment(&mut self, now: DateTime<Utc>) {
        self.status = SubscriptionStatus::Pendente;
        self.atualizado_em = now;
    }

    /// Store the latest computed counters on the usage sub-document.
    pub fn record_usage(&mut self, usage: UsageCounts) {
        self.uso.alunos_ano = usage.alunos_ano;
        self.uso.cursos = usage.cursos;
        self.uso.instrutores = usage.instrutores;
    }
}

/// Response body of "my subscription".
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionSummary {
    pub id: SubscriptionId,
    pub plano: String,
    pub plano_nome: String,
    pub ciclo: Ciclo,
    pub status: SubscriptionStatus,
    pub is_ativa: bool,
    pub data_inicio: DateTime<Utc>,
    pub data_expiracao: DateTime<Utc>,
    pub data_proxima_cobranca: Option<DateTime<Utc>>,
    pub features: Features,
    pub limites: Option<Limits>,
    pub uso: UsageCounts,
    pub is_god: bool,
    pub is_automatic: bool,
    pub trial_usado: bool,
}

impl SubscriptionSummary {
    pub fn build(
        sub: &Subscription,
        role: Role,
        catalog: &PlanCatalog,
        uso: UsageCounts,
        now: DateTime<Utc>,
    ) -> Self {
        let plan = catalog.get(&sub.plano);
        Self {
            id: sub.id,
            plano: sub.plano.clone(),
            plano_nome: plan.map_or_else(|| sub.plano.clone(), |p| p.nome.clone()),
            ciclo: sub.ciclo,
            status: sub.status,
            is_ativa: sub.is_active(role, now),
            data_inicio: sub.data_inicio,
            data_expiracao: sub.data_expiracao,
            data_proxima_cobranca: sub.data_proxima_cobranca,
            features: plan.map(|p| p.features).unwrap_or_default(),
            limites: plan.map(|p| p.limites),
            uso,
            is_god: role.is_god(),
            is_automatic: sub.automatico,
            trial_usado: sub.trial_usado,
        }
    }
}
