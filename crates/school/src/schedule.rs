//! "Next available turma" lookup for a curso.

use chrono::{Days, NaiveDate};
use serde::Serialize;

use identyflow_core::TurmaId;

use crate::{Curso, Turma, TurmaStatus};

/// Lead time when a curso declares no duration.
const DEFAULT_LEAD_DAYS: u32 = 30;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CursoResumo {
    pub nome: String,
    pub valor_total_centavos: u64,
    pub carga_horaria: u32,
    pub dias: u32,
}

impl From<&Curso> for CursoResumo {
    fn from(c: &Curso) -> Self {
        Self {
            nome: c.nome.clone(),
            valor_total_centavos: c.valor_total_centavos,
            carga_horaria: c.carga_horaria,
            dias: c.dias,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProximaTurma {
    pub id: TurmaId,
    pub nome: String,
    pub data_inicio: Option<NaiveDate>,
    pub data_fim: Option<NaiveDate>,
    pub horario: Option<String>,
    pub capacidade: u32,
    pub alunos_matriculados: u32,
    pub vagas_disponiveis: u32,
    pub curso: CursoResumo,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Sugestao {
    pub proxima_data_disponivel: NaiveDate,
    pub curso: CursoResumo,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProximaTurmaResponse {
    pub proxima_turma: Option<ProximaTurma>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sugestao: Option<Sugestao>,
}

impl ProximaTurmaResponse {
    pub fn scheduled(turma: &Turma, curso: &Curso, matriculados: u32) -> Self {
        Self {
            proxima_turma: Some(ProximaTurma {
                id: turma.id,
                nome: turma.nome.clone(),
                data_inicio: turma.data_inicio,
                data_fim: turma.data_fim,
                horario: turma.horario.clone(),
                capacidade: turma.capacidade,
                alunos_matriculados: matriculados,
                vagas_disponiveis: turma.capacidade.saturating_sub(matriculados),
                curso: curso.into(),
            }),
            sugestao: None,
        }
    }

    /// No turma scheduled: suggest `today + curso.dias` (30 when zero).
    pub fn suggested(curso: &Curso, today: NaiveDate) -> Self {
        let lead = if curso.dias == 0 {
            DEFAULT_LEAD_DAYS
        } else {
            curso.dias
        };
        let data = today
            .checked_add_days(Days::new(u64::from(lead)))
            .unwrap_or(today);
        Self {
            proxima_turma: None,
            sugestao: Some(Sugestao {
                proxima_data_disponivel: data,
                curso: curso.into(),
            }),
        }
    }
}

/// Earliest active turma of `curso` starting on or after `today`.
pub fn next_turma<'a, I>(curso: &Curso, turmas: I, today: NaiveDate) -> Option<&'a Turma>
where
    I: IntoIterator<Item = &'a Turma>,
{
    turmas
        .into_iter()
        .filter(|t| t.curso_id == curso.id && t.status == TurmaStatus::Ativa)
        .filter_map(|t| t.data_inicio.filter(|d| *d >= today).map(|d| (d, t)))
        .min_by_key(|(d, _)| *d)
        .map(|(_, t)| t)
}
