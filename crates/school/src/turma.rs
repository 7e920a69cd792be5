use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use identyflow_auth::{Principal, Role};
use identyflow_core::{CursoId, DomainError, DomainResult, Entity, TurmaId, UserId};

pub const DEFAULT_CAPACIDADE: u32 = 30;
pub const MAX_CAPACIDADE: u32 = 100;

#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TurmaStatus {
    #[default]
    Ativa,
    Concluida,
    Cancelada,
}

/// A scheduled cohort of a curso.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Turma {
    pub id: TurmaId,
    pub nome: String,
    pub curso_id: CursoId,
    #[serde(default)]
    pub data_inicio: Option<NaiveDate>,
    #[serde(default)]
    pub data_fim: Option<NaiveDate>,
    #[serde(default)]
    pub horario: Option<String>,
    pub capacidade: u32,
    #[serde(default)]
    pub status: TurmaStatus,
    #[serde(default)]
    pub instrutor_id: Option<UserId>,
    #[serde(default)]
    pub criado_por: Option<UserId>,
    pub criado_em: DateTime<Utc>,
    pub atualizado_em: DateTime<Utc>,
}

impl Entity for Turma {
    type Id = TurmaId;

    fn id(&self) -> &TurmaId {
        &self.id
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewTurma {
    pub nome: String,
    pub curso_id: CursoId,
    #[serde(default)]
    pub data_inicio: Option<NaiveDate>,
    #[serde(default)]
    pub data_fim: Option<NaiveDate>,
    #[serde(default)]
    pub horario: Option<String>,
    #[serde(default)]
    pub capacidade: Option<u32>,
    #[serde(default)]
    pub status: Option<TurmaStatus>,
    #[serde(default)]
    pub instrutor_id: Option<UserId>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TurmaPatch {
    pub nome: Option<String>,
    pub curso_id: Option<CursoId>,
    pub data_inicio: Option<NaiveDate>,
    pub data_fim: Option<NaiveDate>,
    pub horario: Option<String>,
    pub capacidade: Option<u32>,
    pub status: Option<TurmaStatus>,
    pub instrutor_id: Option<UserId>,
}

impl Turma {
    /// Build a turma created by `creator`. An instrutor creating a turma
    /// without naming one becomes its instrutor.
    pub fn create(input: NewTurma, creator: &Principal, now: DateTime<Utc>) -> DomainResult<Self> {
        let instrutor_id = match (input.instrutor_id, creator.role) {
            (Some(id), _) => Some(id),
            (None, Role::Instrutor) => Some(creator.id),
            (None, _) => None,
        };
        let turma = Self {
            id: TurmaId::new(),
            nome: input.nome.trim().to_string(),
            curso_id: input.curso_id,
            data_inicio: input.data_inicio,
            data_fim: input.data_fim,
            horario: input.horario,
            capacidade: input.capacidade.unwrap_or(DEFAULT_CAPACIDADE),
            status: input.status.unwrap_or_default(),
            instrutor_id,
            criado_por: Some(creator.id),
            criado_em: now,
            atualizado_em: now,
        };
        turma.validate()?;
        Ok(turma)
    }

    fn validate(&self) -> DomainResult<()> {
        if self.nome.is_empty() {
            return Err(DomainError::validation("nome da turma is required"));
        }
        if !(1..=MAX_CAPACIDADE).contains(&self.capacidade) {
            return Err(DomainError::validation(format!(
                "capacidade must be between 1 and {MAX_CAPACIDADE}"
            )));
        }
        if let (Some(inicio), Some(fim)) = (self.data_inicio, self.data_fim) {
            if fim < inicio {
                return Err(DomainError::validation("dataFim must not precede dataInicio"));
            }
        }
        Ok(())
    }

    /// Apply an update. Capacity may not drop below the current enrolment.
    pub fn apply(
        &mut self,
        patch: TurmaPatch,
        matriculados: u32,
        now: DateTime<Utc>,
    ) -> DomainResult<()> {
        let mut next = self.clone();
        if let Some(nome) = patch.nome {
            next.nome = nome.trim().to_string();
        }
        if let Some(curso_id) = patch.curso_id {
            next.curso_id = curso_id;
        }
        if patch.data_inicio.is_some() {
            next.data_inicio = patch.data_inicio;
        }
        if patch.data_fim.is_some() {
            next.data_fim = patch.data_fim;
        }
        if patch.horario.is_some() {
            next.horario = patch.horario;
        }
        if let Some(capacidade) = patch.capacidade {
            if capacidade < matriculados {
                return Err(DomainError::conflict(format!(
                    "turma '{}' already has {matriculados} alunos",
                    self.nome
                )));
            }
            next.capacidade = capacidade;
        }
        if let Some(status) = patch.status {
            next.status = status;
        }
        if patch.instrutor_id.is_some() {
            next.instrutor_id = patch.instrutor_id;
        }
        next.validate()?;
        next.atualizado_em = now;
        *self = next;
        Ok(())
    }
}

/// Turma plus its derived enrolment count.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TurmaView {
    #[serde(flatten)]
    pub turma: Turma,
    pub alunos_count: u32,
}
