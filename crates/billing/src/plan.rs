//! Static plan catalog.
//!
//! # Invariants
//! - The catalog always contains [`STARTER`] and [`PREMIUM`].
//! - `turmasAuto` is granted by every plan.
//! - Lookups for unknown plans or features resolve to "no access", never panic.

use std::collections::BTreeMap;

use core::str::FromStr;
use serde::{Deserialize, Serialize};

use identyflow_core::{DomainError, DomainResult};

pub const STARTER: &str = "starter";
pub const PREMIUM: &str = "premium";

/// Boolean capability gated by plan.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FeatureKey {
    TurmasAuto,
    TurmasManuais,
    AgendaAtendimentos,
    NotificacoesWapp,
    EstatisticasAvancadas,
    DownloadRelatorios,
    NotificacaoApp,
    Backup,
    Suporte24h,
    FaturamentoAnual,
    ExpectativaFaturamento,
}

impl FeatureKey {
    pub const ALL: [FeatureKey; 11] = [
        FeatureKey::TurmasAuto,
        FeatureKey::TurmasManuais,
        FeatureKey::AgendaAtendimentos,
        FeatureKey::NotificacoesWapp,
        FeatureKey::EstatisticasAvancadas,
        FeatureKey::DownloadRelatorios,
        FeatureKey::NotificacaoApp,
        FeatureKey::Backup,
        FeatureKey::Suporte24h,
        FeatureKey::FaturamentoAnual,
        FeatureKey::ExpectativaFaturamento,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            FeatureKey::TurmasAuto => "turmasAuto",
            FeatureKey::TurmasManuais => "turmasManuais",
            FeatureKey::AgendaAtendimentos => "agendaAtendimentos",
            FeatureKey::NotificacoesWapp => "notificacoesWapp",
            FeatureKey::EstatisticasAvancadas => "estatisticasAvancadas",
            FeatureKey::DownloadRelatorios => "downloadRelatorios",
            FeatureKey::NotificacaoApp => "notificacaoApp",
            FeatureKey::Backup => "backup",
            FeatureKey::Suporte24h => "suporte24h",
            FeatureKey::FaturamentoAnual => "faturamentoAnual",
            FeatureKey::ExpectativaFaturamento => "expectativaFaturamento",
        }
    }
}

impl FromStr for FeatureKey {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        FeatureKey::ALL
            .into_iter()
            .find(|k| k.as_str() == s)
            .ok_or_else(|| DomainError::validation(format!("unknown feature '{s}'")))
    }
}

/// Countable resource capped by plan.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum LimitKey {
    AlunosAno,
    Cursos,
    Instrutores,
}

impl LimitKey {
    pub const ALL: [LimitKey; 3] = [LimitKey::AlunosAno, LimitKey::Cursos, LimitKey::Instrutores];

    pub fn as_str(&self) -> &'static str {
        match self {
            LimitKey::AlunosAno => "alunosAno",
            LimitKey::Cursos => "cursos",
            LimitKey::Instrutores => "instrutores",
        }
    }
}

impl FromStr for LimitKey {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        LimitKey::ALL
            .into_iter()
            .find(|k| k.as_str() == s)
            .ok_or_else(|| DomainError::validation(format!("invalid limit type '{s}'")))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Limits {
    pub alunos_ano: u32,
    pub cursos: u32,
    pub instrutores: u32,
}

impl Limits {
    pub fn get(&self, key: LimitKey) -> u32 {
        match key {
            LimitKey::AlunosAno => self.alunos_ano,
            LimitKey::Cursos => self.cursos,
            LimitKey::Instrutores => self.instrutores,
        }
    }

    fn set(&mut self, key: LimitKey, value: u32) {
        match key {
            LimitKey::AlunosAno => self.alunos_ano = value,
            LimitKey::Cursos => self.cursos = value,
            LimitKey::Instrutores => self.instrutores = value,
        }
    }
}

/// Feature flags. Flags missing from a loaded catalog default to `false`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Features {
    pub turmas_auto: bool,
    pub turmas_manuais: bool,
    pub agenda_atendimentos: bool,
    pub notificacoes_wapp: bool,
    pub estatisticas_avancadas: bool,
    pub download_relatorios: bool,
    pub notificacao_app: bool,
    pub backup: bool,
    pub suporte24h: bool,
    pub faturamento_anual: bool,
    pub expectativa_faturamento: bool,
}

impl Features {
    pub fn all() -> Self {
        Self {
            turmas_auto: true,
            turmas_manuais: true,
            agenda_atendimentos: true,
            notificacoes_wapp: true,
            estatisticas_avancadas: true,
            download_relatorios: true,
            notificacao_app: true,
            backup: true,
            suporte24h: true,
            faturamento_anual: true,
            expectativa_faturamento: true,
        }
    }

    pub fn get(&self, key: FeatureKey) -> bool {
        match key {
            FeatureKey::TurmasAuto => self.turmas_auto,
            FeatureKey::TurmasManuais => self.turmas_manuais,
            FeatureKey::AgendaAtendimentos => self.agenda_atendimentos,
            FeatureKey::NotificacoesWapp => self.notificacoes_wapp,
            FeatureKey::EstatisticasAvancadas => self.estatisticas_avancadas,
            FeatureKey::DownloadRelatorios => self.download_relatorios,
            FeatureKey::NotificacaoApp => self.notificacao_app,
            FeatureKey::Backup => self.backup,
            FeatureKey::Suporte24h => self.suporte24h,
            FeatureKey::FaturamentoAnual => self.faturamento_anual,
            FeatureKey::ExpectativaFaturamento => self.expectativa_faturamento,
        }
    }
}

/// One catalog entry. Prices are in centavos.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Plan {
    pub nome: String,
    pub preco_centavos: u64,
    pub preco_anual_centavos: u64,
    pub limites: Limits,
    pub features: Features,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PlanCatalog {
    plans: BTreeMap<String, Plan>,
}

impl PlanCatalog {
    /// The catalog shipped with the product.
    pub fn builtin() -> Self {
        let starter = Plan {
            nome: "Starter".to_string(),
            preco_centavos: 7_990,
            preco_anual_centavos: 79_900,
            limites: Limits {
                alunos_ano: 1_000,
                cursos: 30,
                instrutores: 10,
            },
            features: Features {
                turmas_auto: true,
                ..Features::default()
            },
        };
        let premium = Plan {
            nome: "Premium".to_string(),
            preco_centavos: 14_990,
            preco_anual_centavos: 149_900,
            limites: Limits {
                alunos_ano: 5_000,
                cursos: 90,
                instrutores: 30,
            },
            features: Features::all(),
        };

        let mut plans = BTreeMap::new();
        plans.insert(STARTER.to_string(), starter);
        plans.insert(PREMIUM.to_string(), premium);
        Self { plans }
    }

    /// Parse a catalog from JSON (`{"starter": {...}, "premium": {...}}`).
    pub fn from_json(raw: &str) -> DomainResult<Self> {
        let catalog: PlanCatalog = serde_json::from_str(raw)
            .map_err(|e| DomainError::validation(format!("invalid plan catalog: {e}")))?;
        for required in [STARTER, PREMIUM] {
            if !catalog.plans.contains_key(required) {
                return Err(DomainError::validation(format!(
                    "plan catalog is missing '{required}'"
                )));
            }
        }
        Ok(catalog)
    }

    /// Override one numeric limit. Unknown plans are left untouched.
    pub fn with_limit(mut self, plan: &str, key: LimitKey, value: u32) -> Self {
        if let Some(p) = self.plans.get_mut(plan) {
            p.limites.set(key, value);
        }
        self
    }

    pub fn get(&self, plan: &str) -> Option<&Plan> {
        self.plans.get(plan)
    }

    pub fn contains(&self, plan: &str) -> bool {
        self.plans.contains_key(plan)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Plan)> {
        self.plans.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Flag for `feature` on `plan`; `false` when the plan is unknown.
    pub fn has_feature(&self, plan: &str, feature: FeatureKey) -> bool {
        self.get(plan).is_some_and(|p| p.features.get(feature))
    }

    /// `current < limit`; `false` when the plan is unknown.
    pub fn within_limit(&self, plan: &str, key: LimitKey, current: u32) -> bool {
        self.get(plan).is_some_and(|p| current < p.limites.get(key))
    }
}

impl Default for PlanCatalog {
    fn default() -> Self {
        Self::builtin()
    }
}
