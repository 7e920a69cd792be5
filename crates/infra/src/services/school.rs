//! Cursos, turmas and alunos.

use std::collections::HashMap;

use chrono::Utc;
use tracing::{info, warn};

use identyflow_auth::{Action, AuthzError, Principal, Role, authorize};
use identyflow_core::{CursoId, DomainError, TurmaId, UserId};
use identyflow_school::{
    Admission, Aluno, Curso, CursoPatch, NewAluno, NewCurso, NewTurma, ProximaTurmaResponse, Turma,
    TurmaPatch, TurmaView, next_turma, prepare_enrollment, turma_full,
};

use crate::error::ServiceResult;
use crate::services::visibility_scope;
use crate::store::Datastore;

#[derive(Clone)]
pub struct SchoolService {
    store: Datastore,
}

fn newest_first<T>(items: &mut [T], created: impl Fn(&T) -> chrono::DateTime<Utc>) {
    items.sort_by(|a, b| created(b).cmp(&created(a)));
}

impl SchoolService {
    pub fn new(store: Datastore) -> Self {
        Self { store }
    }

    // ---- cursos ----

    async fn load_curso(&self, id: CursoId) -> ServiceResult<Curso> {
        self.store
            .cursos
            .get(&id)
            .await?
            .ok_or_else(|| DomainError::not_found("curso").into())
    }

    async fn ensure_curso_name_free(&self, nome: &str, except: Option<CursoId>) -> ServiceResult<()> {
        let wanted = nome.trim().to_lowercase();
        let taken = self
            .store
            .cursos
            .list()
            .await?
            .iter()
            .any(|c| Some(c.id) != except && c.nome.to_lowercase() == wanted);
        if taken {
            return Err(DomainError::conflict(format!("curso '{}' already exists", nome.trim())).into());
        }
        Ok(())
    }

    /// Active cursos; legacy documents without `ativo` are included.
    pub async fn list_cursos(&self, principal: &Principal) -> ServiceResult<Vec<Curso>> {
        authorize(principal, Action::ListCursos)?;
        let mut cursos: Vec<Curso> = self
            .store
            .cursos
            .list()
            .await?
            .into_iter()
            .filter(Curso::is_active)
            .collect();
        newest_first(&mut cursos, |c| c.criado_em);
        Ok(cursos)
    }

    pub async fn create_curso(&self, principal: &Principal, input: NewCurso) -> ServiceResult<Curso> {
        authorize(principal, Action::CreateCurso)?;
        let curso = Curso::create(input, Utc::now())?;
        self.ensure_curso_name_free(&curso.nome, None).await?;
        self.store.cursos.upsert(curso.clone()).await?;
        info!(curso_id = %curso.id, nome = %curso.nome, "curso created");
        Ok(curso)
    }

    pub async fn update_curso(
        &self,
        principal: &Principal,
        id: CursoId,
        patch: CursoPatch,
    ) -> ServiceResult<Curso> {
        authorize(principal, Action::UpdateCurso)?;
        let mut curso = self.load_curso(id).await?;
        if let Some(nome) = patch.nome.as_deref() {
            self.ensure_curso_name_free(nome, Some(id)).await?;
        }
        curso.apply(patch)?;
        self.store.cursos.upsert(curso.clone()).await?;
        Ok(curso)
    }

    pub async fn soft_delete_curso(&self, principal: &Principal, id: CursoId) -> ServiceResult<Curso> {
        authorize(principal, Action::ToggleCurso)?;
        let mut curso = self.load_curso(id).await?;
        curso.soft_delete(Utc::now())?;
        self.store.cursos.upsert(curso.clone()).await?;
        info!(curso_id = %curso.id, "curso deactivated");
        Ok(curso)
    }

    pub async fn reactivate_curso(&self, principal: &Principal, id: CursoId) -> ServiceResult<Curso> {
        authorize(principal, Action::ToggleCurso)?;
        let mut curso = self.load_curso(id).await?;
        curso.reactivate()?;
        self.store.cursos.upsert(curso.clone()).await?;
        info!(curso_id = %curso.id, "curso reactivated");
        Ok(curso)
    }

    // ---- turmas ----

    async fn load_turma(&self, id: TurmaId) -> ServiceResult<Turma> {
        self.store
            .turmas
            .get(&id)
            .await?
            .ok_or_else(|| DomainError::not_found("turma").into())
    }

    async fn enrolment_counts(&self) -> ServiceResult<HashMap<TurmaId, u32>> {
        let mut counts = HashMap::new();
        for aluno in self.store.alunos.list().await? {
            if let Some(t) = aluno.turma_id {
                *counts.entry(t).or_insert(0u32) += 1;
            }
        }
        Ok(counts)
    }

    async fn ensure_instrutor(&self, id: Option<UserId>) -> ServiceResult<()> {
        let Some(id) = id else {
            return Ok(());
        };
        match self.store.users.get(&id).await? {
            Some(u) if u.role == Role::Instrutor => Ok(()),
            _ => Err(DomainError::validation("instrutorId must reference an instrutor").into()),
        }
    }

    pub async fn list_turmas(&self) -> ServiceResult<Vec<TurmaView>> {
        let counts = self.enrolment_counts().await?;
        let mut turmas = self.store.turmas.list().await?;
        newest_first(&mut turmas, |t| t.criado_em);
        Ok(turmas
            .into_iter()
            .map(|turma| TurmaView {
                alunos_count: counts.get(&turma.id).copied().unwrap_or(0),
                turma,
            })
            .collect())
    }

    pub async fn get_turma(&self, id: TurmaId) -> ServiceResult<TurmaView> {
        let turma = self.load_turma(id).await?;
        let alunos_count = self.enrolment_counts().await?.get(&id).copied().unwrap_or(0);
        Ok(TurmaView {
            turma,
            alunos_count,
        })
    }

    pub async fn turmas_by_curso(&self, curso_id: CursoId) -> ServiceResult<Vec<Turma>> {
        let mut turmas: Vec<Turma> = self
            .store
            .turmas
            .list()
            .await?
            .into_iter()
            .filter(|t| t.curso_id == curso_id)
            .collect();
        newest_first(&mut turmas, |t| t.criado_em);
        Ok(turmas)
    }

    pub async fn create_turma(&self, principal: &Principal, input: NewTurma) -> ServiceResult<Turma> {
        authorize(principal, Action::CreateTurma)?;
        self.load_curso(input.curso_id).await?;
        self.ensure_instrutor(input.instrutor_id).await?;
        let turma = Turma::create(input, principal, Utc::now())?;
        self.store.turmas.upsert(turma.clone()).await?;
        info!(turma_id = %turma.id, by = %principal.id, "turma created");
        Ok(turma)
    }

    pub async fn update_turma(
        &self,
        principal: &Principal,
        id: TurmaId,
        patch: TurmaPatch,
    ) -> ServiceResult<Turma> {
        authorize(principal, Action::UpdateTurma)?;
        let mut turma = self.load_turma(id).await?;
        if let Some(curso_id) = patch.curso_id {
            self.load_curso(curso_id).await?;
        }
        self.ensure_instrutor(patch.instrutor_id).await?;
        let matriculados = self.enrolment_counts().await?.get(&id).copied().unwrap_or(0);
        turma.apply(patch, matriculados, Utc::now())?;
        self.store.turmas.upsert(turma.clone()).await?;
        Ok(turma)
    }

    /// Alunos keep their `turmaId`; the reference simply dangles.
    pub async fn delete_turma(&self, principal: &Principal, id: TurmaId) -> ServiceResult<()> {
        authorize(principal, Action::DeleteTurma)?;
        if !self.store.turmas.delete(&id).await? {
            return Err(DomainError::not_found("turma").into());
        }
        info!(turma_id = %id, by = %principal.id, "turma deleted");
        Ok(())
    }

    /// Alunos of a turma visible to the caller, by name.
    pub async fn turma_alunos(&self, principal: &Principal, id: TurmaId) -> ServiceResult<Vec<Aluno>> {
        self.load_turma(id).await?;
        let mut alunos = self.alunos_by_turma(principal, id).await?;
        alunos.sort_by(|a, b| a.nome.cmp(&b.nome));
        Ok(alunos)
    }

    /// Next active turma of the active curso named `curso_nome`, or a
    /// suggested start date when none is scheduled.
    pub async fn proxima_turma(&self, curso_nome: &str) -> ServiceResult<ProximaTurmaResponse> {
        let curso = self
            .store
            .cursos
            .list()
            .await?
            .into_iter()
            .find(|c| c.nome == curso_nome && c.is_active())
            .ok_or(DomainError::not_found("curso"))?;

        let today = Utc::now().date_naive();
        let turmas = self.store.turmas.list().await?;
        match next_turma(&curso, &turmas, today) {
            Some(turma) => {
                let matriculados = self
                    .enrolment_counts()
                    .await?
                    .get(&turma.id)
                    .copied()
                    .unwrap_or(0);
                Ok(ProximaTurmaResponse::scheduled(turma, &curso, matriculados))
            }
            None => Ok(ProximaTurmaResponse::suggested(&curso, today)),
        }
    }

    // ---- alunos ----

    pub async fn list_alunos(&self, principal: &Principal) -> ServiceResult<Vec<Aluno>> {
        let scope = visibility_scope(&self.store, principal).await?;
        let mut alunos: Vec<Aluno> = self
            .store
            .alunos
            .list()
            .await?
            .into_iter()
            .filter(|a| a.visible_in(&scope))
            .collect();
        newest_first(&mut alunos, |a| a.criado_em);
        Ok(alunos)
    }

    pub async fn alunos_by_instrutor(
        &self,
        principal: &Principal,
        instrutor_id: UserId,
    ) -> ServiceResult<Vec<Aluno>> {
        let scope = visibility_scope(&self.store, principal).await?;
        if !scope.covers_instrutor(instrutor_id) {
            return Err(AuthzError::OutOfScope.into());
        }
        let mut alunos: Vec<Aluno> = self
            .store
            .alunos
            .list()
            .await?
            .into_iter()
            .filter(|a| a.instrutor_id == Some(instrutor_id))
            .collect();
        newest_first(&mut alunos, |a| a.criado_em);
        Ok(alunos)
    }

    pub async fn alunos_by_turma(
        &self,
        principal: &Principal,
        turma_id: TurmaId,
    ) -> ServiceResult<Vec<Aluno>> {
        let scope = visibility_scope(&self.store, principal).await?;
        let mut alunos: Vec<Aluno> = self
            .store
            .alunos
            .list()
            .await?
            .into_iter()
            .filter(|a| a.turma_id == Some(turma_id) && a.visible_in(&scope))
            .collect();
        newest_first(&mut alunos, |a| a.criado_em);
        Ok(alunos)
    }

    /// Register an aluno, enforcing the turma's capacity atomically.
    pub async fn create_aluno(&self, principal: &Principal, input: NewAluno) -> ServiceResult<Aluno> {
        authorize(principal, Action::CreateAluno)?;
        if let Some(instrutor) = input.instrutor_id {
            let scope = visibility_scope(&self.store, principal).await?;
            if !scope.covers_instrutor(instrutor) {
                return Err(DomainError::forbidden("instrutorId is outside the caller's team").into());
            }
        }
        let aluno = Aluno::create(input, principal, Utc::now())?;

        let Some(turma_id) = aluno.turma_id else {
            let aluno = prepare_enrollment(aluno, None, principal);
            self.store.alunos.upsert(aluno.clone()).await?;
            info!(aluno_id = %aluno.id, "aluno registered");
            return Ok(aluno);
        };

        let turma = self.load_turma(turma_id).await?;
        let aluno = prepare_enrollment(aluno, Some(&turma), principal);
        match self
            .store
            .alunos
            .insert_within_capacity(aluno.clone(), &turma)
            .await?
        {
            Admission::Inserted => {
                info!(aluno_id = %aluno.id, turma_id = %turma.id, "aluno enrolled");
                Ok(aluno)
            }
            Admission::Full { matriculados } => {
                warn!(turma_id = %turma.id, matriculados, capacidade = turma.capacidade, "turma full");
                Err(turma_full(&turma).into())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use identyflow_auth::{NewUser, User};
    use std::sync::Arc;

    fn curso_input(nome: &str) -> NewCurso {
        NewCurso {
            nome: nome.into(),
            carga_horaria: 40,
            dias: 10,
            valor_total_centavos: 120_000,
            min_vagas: 2,
            max_vagas: 20,
        }
    }

    fn turma_input(curso_id: CursoId, capacidade: u32, instrutor_id: Option<UserId>) -> NewTurma {
        NewTurma {
            nome: "Corte Feminino - Manhã".into(),
            curso_id,
            data_inicio: None,
            data_fim: None,
            horario: None,
            capacidade: Some(capacidade),
            status: None,
            instrutor_id,
        }
    }

    fn aluno_input(nome: &str, turma_id: Option<TurmaId>) -> NewAluno {
        NewAluno {
            nome: nome.into(),
            cpf: "000.000.000-00".into(),
            turma_id,
            ..Default::default()
        }
    }

    async fn add_user(store: &Datastore, role: Role, admin_pai: Option<UserId>) -> Principal {
        let user = User::create(NewUser {
            nome: "Pessoa".into(),
            email: format!("{}@escola.com", UserId::new()),
            senha_hash: "x".into(),
            telefone: None,
            role,
            admin_pai,
            nome_empresa: None,
            criado_em: Utc::now(),
        });
        store.users.upsert(user.clone()).await.unwrap();
        Principal::new(user.id, role)
    }

    #[tokio::test]
    async fn third_enrolment_in_turma_of_two_is_refused() {
        let svc = SchoolService::new(Datastore::in_memory());
        let admin = Principal::new(UserId::new(), Role::Admin);
        let curso = svc.create_curso(&admin, curso_input("Corte")).await.unwrap();
        let turma = svc
            .create_turma(&admin, turma_input(curso.id, 2, None))
            .await
            .unwrap();

        for nome in ["Ana", "Bia"] {
            svc.create_aluno(&admin, aluno_input(nome, Some(turma.id)))
                .await
                .unwrap();
        }
        for nome in ["Caio", "Duda"] {
            let err = svc
                .create_aluno(&admin, aluno_input(nome, Some(turma.id)))
                .await
                .unwrap_err();
            let msg = err.to_string();
            assert!(msg.contains("Corte Feminino - Manhã"), "{msg}");
            assert!(msg.contains('2'), "{msg}");
        }
        assert_eq!(svc.get_turma(turma.id).await.unwrap().alunos_count, 2);
    }

    #[tokio::test]
    async fn unknown_turma_is_not_found() {
        let svc = SchoolService::new(Datastore::in_memory());
        let admin = Principal::new(UserId::new(), Role::Admin);
        let err = svc
            .create_aluno(&admin, aluno_input("Ana", Some(TurmaId::new())))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            crate::ServiceError::Domain(DomainError::NotFound("turma"))
        ));
    }

    #[tokio::test]
    async fn aluno_inherits_turma_instrutor() {
        let store = Datastore::in_memory();
        let svc = SchoolService::new(store.clone());
        let admin = add_user(&store, Role::Admin, None).await;
        let i1 = add_user(&store, Role::Instrutor, Some(admin.id)).await;
        let curso = svc.create_curso(&admin, curso_input("Escova")).await.unwrap();
        let turma = svc
            .create_turma(&admin, turma_input(curso.id, 10, Some(i1.id)))
            .await
            .unwrap();

        let aluno = svc
            .create_aluno(&admin, aluno_input("Ana", Some(turma.id)))
            .await
            .unwrap();
        assert_eq!(aluno.instrutor_id, Some(i1.id));
    }

    #[tokio::test]
    async fn explicit_instrutor_must_be_within_the_callers_scope() {
        let store = Datastore::in_memory();
        let svc = SchoolService::new(store.clone());
        let a = add_user(&store, Role::Admin, None).await;
        let b = add_user(&store, Role::Admin, None).await;
        let ia = add_user(&store, Role::Instrutor, Some(a.id)).await;
        let ib = add_user(&store, Role::Instrutor, Some(b.id)).await;

        for (caller, target) in [(ia, ib.id), (ia, a.id), (a, ib.id)] {
            let mut input = aluno_input("Bia", None);
            input.instrutor_id = Some(target);
            assert!(matches!(
                svc.create_aluno(&caller, input).await.unwrap_err(),
                crate::ServiceError::Domain(DomainError::Forbidden(_))
            ));
        }
        assert!(store.alunos.list().await.unwrap().is_empty());

        let mut input = aluno_input("Bia", None);
        input.instrutor_id = Some(ia.id);
        let aluno = svc.create_aluno(&a, input).await.unwrap();
        assert_eq!(aluno.instrutor_id, Some(ia.id));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_enrolments_fill_exactly_the_capacity() {
        let svc = Arc::new(SchoolService::new(Datastore::in_memory()));
        let admin = Principal::new(UserId::new(), Role::Admin);
        let curso = svc.create_curso(&admin, curso_input("Barba")).await.unwrap();
        let turma = svc
            .create_turma(&admin, turma_input(curso.id, 5, None))
            .await
            .unwrap();

        let mut handles = Vec::new();
        for i in 0..20 {
            let svc = svc.clone();
            handles.push(tokio::spawn(async move {
                svc.create_aluno(&admin, aluno_input(&format!("Aluno {i}"), Some(turma.id)))
                    .await
                    .is_ok()
            }));
        }
        let mut ok = 0;
        for h in handles {
            if h.await.unwrap() {
                ok += 1;
            }
        }
        assert_eq!(ok, 5);
        assert_eq!(svc.get_turma(turma.id).await.unwrap().alunos_count, 5);
    }

    #[tokio::test]
    async fn soft_deleted_curso_leaves_listing_and_legacy_stays() {
        let store = Datastore::in_memory();
        let svc = SchoolService::new(store.clone());
        let admin = Principal::new(UserId::new(), Role::Admin);
        let a = svc.create_curso(&admin, curso_input("Tranças")).await.unwrap();
        let mut legacy = Curso::create(curso_input("Legado"), Utc::now()).unwrap();
        legacy.ativo = None;
        store.cursos.upsert(legacy.clone()).await.unwrap();

        svc.soft_delete_curso(&admin, a.id).await.unwrap();
        let listed: Vec<CursoId> = svc
            .list_cursos(&admin)
            .await
            .unwrap()
            .iter()
            .map(|c| c.id)
            .collect();
        assert_eq!(listed, vec![legacy.id]);

        assert!(svc.soft_delete_curso(&admin, a.id).await.is_err());
        svc.reactivate_curso(&admin, a.id).await.unwrap();
        assert_eq!(svc.list_cursos(&admin).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn curso_names_are_unique_and_instrutores_cannot_create() {
        let svc = SchoolService::new(Datastore::in_memory());
        let admin = Principal::new(UserId::new(), Role::Admin);
        svc.create_curso(&admin, curso_input("Corte")).await.unwrap();
        assert!(matches!(
            svc.create_curso(&admin, curso_input("corte")).await.unwrap_err(),
            crate::ServiceError::Domain(DomainError::Conflict(_))
        ));
        let instrutor = Principal::new(UserId::new(), Role::Instrutor);
        assert!(matches!(
            svc.create_curso(&instrutor, curso_input("Outro")).await.unwrap_err(),
            crate::ServiceError::Authz(_)
        ));
    }

    #[tokio::test]
    async fn instrutor_creates_but_cannot_delete_turmas() {
        let svc = SchoolService::new(Datastore::in_memory());
        let admin = Principal::new(UserId::new(), Role::Admin);
        let instrutor = Principal::new(UserId::new(), Role::Instrutor);
        let curso = svc.create_curso(&admin, curso_input("Química")).await.unwrap();

        let turma = svc
            .create_turma(&instrutor, turma_input(curso.id, 10, None))
            .await
            .unwrap();
        assert_eq!(turma.instrutor_id, Some(instrutor.id));
        assert!(matches!(
            svc.delete_turma(&instrutor, turma.id).await.unwrap_err(),
            crate::ServiceError::Authz(AuthzError::Forbidden { .. })
        ));
        svc.delete_turma(&admin, turma.id).await.unwrap();
    }

    #[tokio::test]
    async fn listing_is_scoped_per_role() {
        let store = Datastore::in_memory();
        let svc = SchoolService::new(store.clone());
        let a = add_user(&store, Role::Admin, None).await;
        let b = add_user(&store, Role::Admin, None).await;
        let ia = add_user(&store, Role::Instrutor, Some(a.id)).await;
        let god = add_user(&store, Role::God, None).await;

        svc.create_aluno(&ia, aluno_input("Da equipe A", None)).await.unwrap();
        svc.create_aluno(&a, aluno_input("Do admin A", None)).await.unwrap();
        svc.create_aluno(&b, aluno_input("Do admin B", None)).await.unwrap();

        assert_eq!(svc.list_alunos(&god).await.unwrap().len(), 3);
        assert_eq!(svc.list_alunos(&a).await.unwrap().len(), 2);
        assert_eq!(svc.list_alunos(&b).await.unwrap().len(), 1);
        let own = svc.list_alunos(&ia).await.unwrap();
        assert_eq!(own.len(), 1);
        assert_eq!(own[0].nome, "Da equipe A");

        assert!(svc.alunos_by_instrutor(&a, ia.id).await.is_ok());
        assert!(matches!(
            svc.alunos_by_instrutor(&b, ia.id).await.unwrap_err(),
            crate::ServiceError::Authz(AuthzError::OutOfScope)
        ));
    }

    #[tokio::test]
    async fn proxima_turma_prefers_scheduled_then_suggests() {
        let svc = SchoolService::new(Datastore::in_memory());
        let admin = Principal::new(UserId::new(), Role::Admin);
        let curso = svc.create_curso(&admin, curso_input("Mechas")).await.unwrap();

        let resp = svc.proxima_turma("Mechas").await.unwrap();
        assert!(resp.proxima_turma.is_none());
        assert!(resp.sugestao.is_some());

        let mut input = turma_input(curso.id, 8, None);
        input.data_inicio = NaiveDate::from_ymd_opt(2999, 1, 10);
        svc.create_turma(&admin, input).await.unwrap();
        let resp = svc.proxima_turma("Mechas").await.unwrap();
        assert_eq!(resp.proxima_turma.unwrap().vagas_disponiveis, 8);

        assert!(svc.proxima_turma("Inexistente").await.is_err());
    }
}
