use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use identyflow_auth::{Principal, VisibilityScope};
use identyflow_core::{AlunoId, DomainError, DomainResult, Entity, TurmaId, UserId};

#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StatusPagamento {
    #[default]
    Pendente,
    Pago,
    Parcial,
    Isento,
}

#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FormaPagamento {
    /// Not informed yet (wire value `""`).
    #[default]
    #[serde(rename = "")]
    NaoInformada,
    Pix,
    Credito,
    Debito,
    Dinheiro,
    Boleto,
}

/// Enrolled student.
///
/// `cursos` holds free-text course names, not references.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Aluno {
    pub id: AlunoId,
    pub nome: String,
    #[serde(default)]
    pub data_nascimento: Option<String>,
    pub cpf: String,
    #[serde(default)]
    pub rg: Option<String>,
    #[serde(default)]
    pub telefone: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub data_cadastro: Option<String>,
    #[serde(default)]
    pub endereco: Option<String>,
    #[serde(default)]
    pub escolaridade: Option<String>,
    #[serde(default)]
    pub cursos: Vec<String>,
    #[serde(default)]
    pub turma_id: Option<TurmaId>,
    #[serde(default)]
    pub instrutor_id: Option<UserId>,
    #[serde(default)]
    pub status_pagamento: StatusPagamento,
    #[serde(default)]
    pub forma_pagamento: FormaPagamento,
    #[serde(default)]
    pub criado_por: Option<UserId>,
    pub criado_em: DateTime<Utc>,
}

impl Entity for Aluno {
    type Id = AlunoId;

    fn id(&self) -> &AlunoId {
        &self.id
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct NewAluno {
    pub nome: String,
    pub data_nascimento: Option<String>,
    pub cpf: String,
    pub rg: Option<String>,
    pub telefone: Option<String>,
    pub email: Option<String>,
    pub data_cadastro: Option<String>,
    pub endereco: Option<String>,
    pub escolaridade: Option<String>,
    pub cursos: Vec<String>,
    pub turma_id: Option<TurmaId>,
    pub instrutor_id: Option<UserId>,
    pub status_pagamento: StatusPagamento,
    pub forma_pagamento: FormaPagamento,
}

impl Aluno {
    pub fn create(input: NewAluno, creator: &Principal, now: DateTime<Utc>) -> DomainResult<Self> {
        let nome = input.nome.trim().to_string();
        let cpf = input.cpf.trim().to_string();
        if nome.is_empty() || cpf.is_empty() {
            return Err(DomainError::validation("nome and cpf are required"));
        }
        Ok(Self {
            id: AlunoId::new(),
            nome,
            data_nascimento: input.data_nascimento,
            cpf,
            rg: input.rg,
            telefone: input.telefone,
            email: input.email,
            data_cadastro: input.data_cadastro,
            endereco: input.endereco,
            escolaridade: input.escolaridade,
            cursos: input
                .cursos
                .into_iter()
                .map(|c| c.trim().to_string())
                .filter(|c| !c.is_empty())
                .collect(),
            turma_id: input.turma_id,
            instrutor_id: input.instrutor_id,
            status_pagamento: input.status_pagamento,
            forma_pagamento: input.forma_pagamento,
            criado_por: Some(creator.id),
            criado_em: now,
        })
    }

    pub fn visible_in(&self, scope: &VisibilityScope) -> bool {
        scope.admits(self.instrutor_id, self.criado_por)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use identyflow_auth::Role;

    fn input() -> NewAluno {
        NewAluno {
            nome: "Carla Dias".into(),
            cpf: "123.456.789-00".into(),
            cursos: vec!["Corte".into(), " ".into()],
            ..Default::default()
        }
    }

    #[test]
    fn nome_and_cpf_are_required() {
        let p = Principal::new(UserId::new(), Role::Admin);
        let mut missing_cpf = input();
        missing_cpf.cpf = "  ".into();
        assert!(matches!(
            Aluno::create(missing_cpf, &p, Utc::now()),
            Err(DomainError::Validation(_))
        ));

        let ok = Aluno::create(input(), &p, Utc::now()).unwrap();
        assert_eq!(ok.criado_por, Some(p.id));
        assert_eq!(ok.cursos, vec!["Corte".to_string()]);
    }

    #[test]
    fn empty_forma_pagamento_round_trips_as_empty_string() {
        let parsed: NewAluno = serde_json::from_value(serde_json::json!({
            "nome": "Ana", "cpf": "1", "formaPagamento": "", "statusPagamento": "pago"
        }))
        .unwrap();
        assert_eq!(parsed.forma_pagamento, FormaPagamento::NaoInformada);
        assert_eq!(parsed.status_pagamento, StatusPagamento::Pago);
        assert_eq!(
            serde_json::to_value(FormaPagamento::NaoInformada).unwrap(),
            serde_json::json!("")
        );
    }

    #[test]
    fn visibility_follows_instrutor_and_creator() {
        let admin = Principal::new(UserId::new(), Role::Admin);
        let instrutor = UserId::new();
        let mut a = Aluno::create(input(), &admin, Utc::now()).unwrap();
        a.instrutor_id = Some(instrutor);

        let team = VisibilityScope::for_principal(&admin, [instrutor]);
        assert!(a.visible_in(&team));

        let own = VisibilityScope::Instrutor(instrutor);
        assert!(a.visible_in(&own));
        assert!(!a.visible_in(&VisibilityScope::Instrutor(UserId::new())));

        let stranger = Principal::new(UserId::new(), Role::Admin);
        assert!(!a.visible_in(&VisibilityScope::for_principal(&stranger, [])));
    }
}
