//! Course catalog entry with soft delete.
//!
//! Documents written before `ativo` existed carry no such field; they are
//! active. Only an explicit `ativo: false` marks a course as deleted.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use identyflow_core::{CursoId, DomainError, DomainResult, Entity};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Curso {
    pub id: CursoId,
    pub nome: String,
    pub carga_horaria: u32,
    pub dias: u32,
    pub valor_total_centavos: u64,
    pub min_vagas: u32,
    pub max_vagas: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ativo: Option<bool>,
    #[serde(default)]
    pub deletado_em: Option<DateTime<Utc>>,
    pub criado_em: DateTime<Utc>,
}

impl Entity for Curso {
    type Id = CursoId;

    fn id(&self) -> &CursoId {
        &self.id
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewCurso {
    pub nome: String,
    pub carga_horaria: u32,
    pub dias: u32,
    pub valor_total_centavos: u64,
    pub min_vagas: u32,
    pub max_vagas: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CursoPatch {
    pub nome: Option<String>,
    pub carga_horaria: Option<u32>,
    pub dias: Option<u32>,
    pub valor_total_centavos: Option<u64>,
    pub min_vagas: Option<u32>,
    pub max_vagas: Option<u32>,
}

impl Curso {
    pub fn create(input: NewCurso, now: DateTime<Utc>) -> DomainResult<Self> {
        let curso = Self {
            id: CursoId::new(),
            nome: input.nome.trim().to_string(),
            carga_horaria: input.carga_horaria,
            dias: input.dias,
            valor_total_centavos: input.valor_total_centavos,
            min_vagas: input.min_vagas,
            max_vagas: input.max_vagas,
            ativo: Some(true),
            deletado_em: None,
            criado_em: now,
        };
        curso.validate()?;
        Ok(curso)
    }

    fn validate(&self) -> DomainResult<()> {
        if self.nome.is_empty() {
            return Err(DomainError::validation("nome is required"));
        }
        if self.max_vagas == 0 {
            return Err(DomainError::validation("maxVagas must be at least 1"));
        }
        if self.min_vagas > self.max_vagas {
            return Err(DomainError::validation("minVagas must not exceed maxVagas"));
        }
        Ok(())
    }

    /// Legacy documents without `ativo` count as active.
    pub fn is_active(&self) -> bool {
        self.ativo != Some(false)
    }

    pub fn apply(&mut self, patch: CursoPatch) -> DomainResult<()> {
        let mut next = self.clone();
        if let Some(nome) = patch.nome {
            next.nome = nome.trim().to_string();
        }
        if let Some(v) = patch.carga_horaria {
            next.carga_horaria = v;
        }
        if let Some(v) = patch.dias {
            next.dias = v;
        }
        if let Some(v) = patch.valor_total_centavos {
            next.valor_total_centavos = v;
        }
        if let Some(v) = patch.min_vagas {
            next.min_vagas = v;
        }
        if let Some(v) = patch.max_vagas {
            next.max_vagas = v;
        }
        next.validate()?;
        *self = next;
        Ok(())
    }

    pub fn soft_delete(&mut self, now: DateTime<Utc>) -> DomainResult<()> {
        if !self.is_active() {
            return Err(DomainError::validation("curso is already inactive"));
        }
        self.ativo = Some(false);
        self.deletado_em = Some(now);
        Ok(())
    }

    pub fn reactivate(&mut self) -> DomainResult<()> {
        if self.is_active() {
            return Err(DomainError::validation("curso is already active"));
        }
        self.ativo = Some(true);
        self.deletado_em = None;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn input(nome: &str) -> NewCurso {
        NewCurso {
            nome: nome.to_string(),
            carga_horaria: 40,
            dias: 10,
            valor_total_centavos: 120_000,
            min_vagas: 5,
            max_vagas: 20,
        }
    }

    #[test]
    fn legacy_document_without_ativo_is_active() {
        let raw = serde_json::json!({
            "id": CursoId::new(),
            "nome": "Corte Masculino",
            "cargaHoraria": 20,
            "dias": 5,
            "valorTotalCentavos": 50_000,
            "minVagas": 1,
            "maxVagas": 10,
            "criadoEm": Utc::now(),
        });
        let curso: Curso = serde_json::from_value(raw).unwrap();
        assert_eq!(curso.ativo, None);
        assert!(curso.is_active());

        let back = serde_json::to_value(&curso).unwrap();
        assert!(back.get("ativo").is_none());
    }

    #[test]
    fn soft_delete_then_reactivate() {
        let now = Utc::now();
        let mut curso = Curso::create(input("Colorimetria"), now).unwrap();
        curso.soft_delete(now).unwrap();
        assert!(!curso.is_active());
        assert_eq!(curso.deletado_em, Some(now));
        assert!(curso.soft_delete(now).is_err());

        curso.reactivate().unwrap();
        assert!(curso.is_active());
        assert_eq!(curso.deletado_em, None);
        assert!(curso.reactivate().is_err());
    }

    #[test]
    fn create_and_patch_validate_seats() {
        let now = Utc::now();
        let mut bad = input("Escova");
        bad.min_vagas = 30;
        assert!(Curso::create(bad, now).is_err());
        assert!(Curso::create(input("  "), now).is_err());

        let mut curso = Curso::create(input("Escova"), now).unwrap();
        let before = curso.clone();
        let patch = CursoPatch {
            max_vagas: Some(2),
            ..Default::default()
        };
        assert!(curso.apply(patch).is_err());
        assert_eq!(curso, before);
    }
}
