//! Accounts: registration, login, team management and profile edits.

use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Deserializer, Serialize};
use tracing::info;

use identyflow_auth::{
    Action, Hs256TokenService, NewUser, Principal, Role, User, UserPatch, UserView, authorize,
    ensure_can_manage_user, generate_password, hash_password, normalize_email, validate_admin_pai,
    validate_email, verify_password,
};
use identyflow_core::{DomainError, UserId};

use crate::error::{ServiceError, ServiceResult};
use crate::services::SubscriptionService;
use crate::store::Datastore;

/// Public self-registration; always creates an admin.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterUser {
    #[serde(default)]
    pub nome: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub senha: String,
    #[serde(default)]
    pub nome_empresa: Option<String>,
}

/// Create an instrutor (or, for god, an admin) or link an existing instrutor.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CreateMember {
    pub nome: String,
    pub email: String,
    pub senha: Option<String>,
    pub telefone: Option<String>,
    pub role: Option<Role>,
    pub admin_pai: Option<UserId>,
    pub instrutor_existente_id: Option<UserId>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct UpdateUser {
    pub nome: Option<String>,
    pub email: Option<String>,
    pub telefone: Option<String>,
    pub foto: Option<String>,
    pub role: Option<Role>,
    /// Absent: unchanged. `null` or `""`: unbind. Otherwise an admin id.
    #[serde(deserialize_with = "present")]
    pub admin_pai: Option<Option<String>>,
}

fn present<'de, D>(de: D) -> Result<Option<Option<String>>, D::Error>
where
    D: Deserializer<'de>,
{
    Option::<String>::deserialize(de).map(Some)
}

#[derive(Debug, Clone, Serialize)]
pub struct LoginResponse {
    pub token: String,
    pub user: UserView,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MemberOutcome {
    Linked(UserView),
    Created {
        user: UserView,
        /// Only set when the password was generated server-side.
        senha_gerada: Option<String>,
    },
}

#[derive(Clone)]
pub struct UserService {
    store: Datastore,
    subscriptions: SubscriptionService,
    tokens: Arc<Hs256TokenService>,
}

impl UserService {
    pub fn new(
        store: Datastore,
        subscriptions: SubscriptionService,
        tokens: Arc<Hs256TokenService>,
    ) -> Self {
        Self {
            store,
            subscriptions,
            tokens,
        }
    }

    async fn find_by_email(&self, email: &str) -> ServiceResult<Option<User>> {
        let email = normalize_email(email);
        Ok(self
            .store
            .users
            .list()
            .await?
            .into_iter()
            .find(|u| u.email == email))
    }

    async fn ensure_email_free(&self, email: &str, except: Option<UserId>) -> ServiceResult<()> {
        match self.find_by_email(email).await? {
            Some(u) if Some(u.id) != except => {
                Err(DomainError::conflict("email already in use").into())
            }
            _ => Ok(()),
        }
    }

    async fn load(&self, id: UserId) -> ServiceResult<User> {
        self.store
            .users
            .get(&id)
            .await?
            .ok_or_else(|| DomainError::not_found("user").into())
    }

    async fn load_admin(&self, id: UserId) -> ServiceResult<User> {
        self.store
            .users
            .get(&id)
            .await?
            .ok_or_else(|| DomainError::not_found("adminPai").into())
    }

    pub async fn register(&self, input: RegisterUser) -> ServiceResult<UserView> {
        if input.nome.trim().is_empty() || input.email.trim().is_empty() || input.senha.is_empty() {
            return Err(DomainError::validation("nome, email and senha are required").into());
        }
        validate_email(&input.email)?;
        self.ensure_email_free(&input.email, None).await?;

        let user = User::create(NewUser {
            nome: input.nome,
            email: input.email,
            senha_hash: hash_password(&input.senha)?,
            telefone: None,
            role: Role::Admin,
            admin_pai: None,
            nome_empresa: input.nome_empresa,
            criado_em: Utc::now(),
        });
        self.store.users.upsert(user.clone()).await?;
        info!(user_id = %user.id, "admin registered");
        Ok(UserView::from(&user))
    }

    pub async fn login(&self, email: &str, senha: &str) -> ServiceResult<LoginResponse> {
        let user = self
            .find_by_email(email)
            .await?
            .ok_or(ServiceError::InvalidCredentials)?;
        if !verify_password(senha, &user.senha_hash)? {
            return Err(ServiceError::InvalidCredentials);
        }
        let token = self
            .tokens
            .issue(Principal::new(user.id, user.role), Utc::now())?;
        info!(user_id = %user.id, role = %user.role, "login");
        Ok(LoginResponse {
            token,
            user: UserView::from(&user),
        })
    }

    /// God sees everyone; an admin sees itself plus its instrutores.
    pub async fn list(&self, principal: &Principal) -> ServiceResult<Vec<UserView>> {
        authorize(principal, Action::ListUsers)?;
        let mut users: Vec<User> = self
            .store
            .users
            .list()
            .await?
            .into_iter()
            .filter(|u| u.visible_to(principal))
            .collect();
        users.sort_by(|a, b| a.criado_em.cmp(&b.criado_em));
        Ok(users.iter().map(UserView::from).collect())
    }

    pub async fn list_unbound_instrutores(&self, principal: &Principal) -> ServiceResult<Vec<UserView>> {
        authorize(principal, Action::ListUnboundInstrutores)?;
        Ok(self
            .store
            .users
            .list()
            .await?
            .iter()
            .filter(|u| u.role == Role::Instrutor && u.admin_pai.is_none())
            .map(UserView::from)
            .collect())
    }

    pub async fn create_member(
        &self,
        principal: &Principal,
        input: CreateMember,
    ) -> ServiceResult<MemberOutcome> {
        authorize(principal, Action::CreateInstrutor)?;

        if let Some(existing) = input.instrutor_existente_id {
            authorize(principal, Action::LinkInstrutor)?;
            return self.link_instrutor(existing, input.admin_pai).await;
        }

        let role = match (principal.role, input.role) {
            (Role::God, Some(role)) => role,
            _ => Role::Instrutor,
        };
        match role {
            Role::God => {
                return Err(DomainError::forbidden("the god role cannot be granted").into());
            }
            Role::Admin => authorize(principal, Action::CreateAdmin)?,
            Role::Instrutor => {}
        }

        if input.nome.trim().is_empty() || input.email.trim().is_empty() {
            return Err(DomainError::validation("nome and email are required").into());
        }
        validate_email(&input.email)?;

        let admin_pai = match (role, principal.role) {
            (Role::Instrutor, Role::God) => match input.admin_pai {
                Some(id) => Some(validate_admin_pai(role, &self.load_admin(id).await?)?),
                None => None,
            },
            (Role::Instrutor, _) => Some(principal.id),
            _ => None,
        };

        if principal.role == Role::Admin {
            self.subscriptions.ensure_instrutor_capacity(principal).await?;
        }
        self.ensure_email_free(&input.email, None).await?;

        let (senha, senha_gerada) = match input.senha.filter(|s| !s.is_empty()) {
            Some(s) => (s, None),
            None => {
                let generated = generate_password();
                (generated.clone(), Some(generated))
            }
        };

        let user = User::create(NewUser {
            nome: input.nome,
            email: input.email,
            senha_hash: hash_password(&senha)?,
            telefone: input.telefone,
            role,
            admin_pai,
            nome_empresa: None,
            criado_em: Utc::now(),
        });
        self.store.users.upsert(user.clone()).await?;
        info!(user_id = %user.id, role = %user.role, created_by = %principal.id, "user created");
        Ok(MemberOutcome::Created {
            user: UserView::from(&user),
            senha_gerada,
        })
    }

    async fn link_instrutor(
        &self,
        instrutor_id: UserId,
        admin_pai: Option<UserId>,
    ) -> ServiceResult<MemberOutcome> {
        let mut instrutor = self
            .store
            .users
            .get(&instrutor_id)
            .await?
            .filter(|u| u.role == Role::Instrutor)
            .ok_or(DomainError::not_found("instrutor"))?;
        instrutor.admin_pai = match admin_pai {
            Some(id) => Some(validate_admin_pai(Role::Instrutor, &self.load_admin(id).await?)?),
            None => None,
        };
        instrutor.atualizado_em = Utc::now();
        self.store.users.upsert(instrutor.clone()).await?;
        info!(user_id = %instrutor.id, admin_pai = ?instrutor.admin_pai, "instrutor linked");
        Ok(MemberOutcome::Linked(UserView::from(&instrutor)))
    }

    /// Profile edit. Non-god callers only change non-privileged fields.
    pub async fn update(
        &self,
        principal: &Principal,
        id: UserId,
        input: UpdateUser,
    ) -> ServiceResult<UserView> {
        authorize(principal, Action::EditOwnProfile)?;
        let mut target = self.load(id).await?;
        ensure_can_manage_user(principal, &target)?;

        if let Some(email) = input.email.as_deref() {
            self.ensure_email_free(email, Some(id)).await?;
        }

        let admin_pai = match input.admin_pai {
            None => None,
            Some(None) => Some(None),
            Some(Some(raw)) if raw.trim().is_empty() => Some(None),
            Some(Some(raw)) => Some(Some(raw.parse::<UserId>()?)),
        };
        let new_parent = match admin_pai {
            Some(Some(parent_id)) if principal.is_god() => Some(self.load_admin(parent_id).await?),
            _ => None,
        };
        if input.role.is_some() && principal.is_god() {
            authorize(principal, Action::ChangeRole)?;
        }
        if admin_pai.is_some() && principal.is_god() {
            authorize(principal, Action::ReassignAdminPai)?;
        }

        let patch = UserPatch {
            nome: input.nome,
            email: input.email,
            telefone: input.telefone,
            foto: input.foto,
            role: input.role,
            admin_pai,
        };
        let was_admin = target.role == Role::Admin;
        target.apply_patch(principal, patch, new_parent.as_ref(), Utc::now())?;
        self.store.users.upsert(target.clone()).await?;
        if was_admin && target.role != Role::Admin {
            self.unbind_team(target.id).await?;
        }
        info!(user_id = %target.id, by = %principal.id, "user updated");
        Ok(UserView::from(&target))
    }

    /// Delete a user. Instrutores bound to a deleted admin become unbound.
    pub async fn delete(&self, principal: &Principal, id: UserId) -> ServiceResult<()> {
        authorize(principal, Action::DeleteUser)?;
        let target = self.load(id).await?;

        if target.role == Role::Admin {
            self.unbind_team(target.id).await?;
        }
        self.store.users.delete(&target.id).await?;
        info!(user_id = %target.id, by = %principal.id, "user deleted");
        Ok(())
    }

    /// Clear `admin_pai` on every instrutor bound to `admin`.
    async fn unbind_team(&self, admin: UserId) -> ServiceResult<()> {
        let now = Utc::now();
        let mut unbound = 0usize;
        for mut instrutor in self.store.users.list().await? {
            if instrutor.admin_pai == Some(admin) {
                instrutor.admin_pai = None;
                instrutor.atualizado_em = now;
                self.store.users.upsert(instrutor).await?;
                unbound += 1;
            }
        }
        if unbound > 0 {
            info!(admin_id = %admin, unbound, "team unbound");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use identyflow_auth::{AuthzError, JwtValidator};
    use identyflow_billing::{Ciclo, LimitKey, PREMIUM, PlanCatalog, STARTER};

    fn services() -> (UserService, SubscriptionService) {
        let store = Datastore::in_memory();
        let catalog = PlanCatalog::builtin().with_limit(STARTER, LimitKey::Instrutores, 3);
        let subs = SubscriptionService::new(store.clone(), Arc::new(catalog), true);
        let tokens = Arc::new(Hs256TokenService::new(b"test-secret", chrono::Duration::hours(1)));
        (UserService::new(store, subs.clone(), tokens), subs)
    }

    async fn register(users: &UserService, email: &str) -> Principal {
        let view = users
            .register(RegisterUser {
                nome: "Dona Salão".into(),
                email: email.into(),
                senha: "segredo".into(),
                nome_empresa: Some("Salão Escola".into()),
            })
            .await
            .unwrap();
        Principal::new(view.id, view.role)
    }

    fn member(email: &str) -> CreateMember {
        CreateMember {
            nome: "Instrutor".into(),
            email: email.into(),
            ..Default::default()
        }
    }

    async fn god(users: &UserService) -> Principal {
        let user = User::create(NewUser {
            nome: "Root".into(),
            email: "root@identyflow.com".into(),
            senha_hash: hash_password("root").unwrap(),
            telefone: None,
            role: Role::God,
            admin_pai: None,
            nome_empresa: None,
            criado_em: Utc::now(),
        });
        users.store.users.upsert(user.clone()).await.unwrap();
        Principal::new(user.id, Role::God)
    }

    #[tokio::test]
    async fn register_then_login_issues_a_valid_token() {
        let (users, _) = services();
        let admin = register(&users, "Dona@Salao.com").await;
        assert_eq!(admin.role, Role::Admin);

        let resp = users.login("dona@salao.com", "segredo").await.unwrap();
        let claims = users.tokens.validate(&resp.token, Utc::now()).unwrap();
        assert_eq!(claims.principal(), admin);

        assert!(matches!(
            users.login("dona@salao.com", "errada").await.unwrap_err(),
            ServiceError::InvalidCredentials
        ));
        assert!(matches!(
            users.login("ninguem@salao.com", "segredo").await.unwrap_err(),
            ServiceError::InvalidCredentials
        ));
    }

    #[tokio::test]
    async fn duplicate_email_is_a_conflict() {
        let (users, _) = services();
        register(&users, "a@b.com").await;
        let err = users
            .register(RegisterUser {
                nome: "Outra".into(),
                email: "A@B.com".into(),
                senha: "x".into(),
                nome_empresa: None,
            })
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Domain(DomainError::Conflict(_))));
    }

    #[tokio::test]
    async fn admin_creates_bound_instrutor_with_generated_password() {
        let (users, _) = services();
        let admin = register(&users, "admin@escola.com").await;
        let outcome = users
            .create_member(&admin, member("i1@escola.com"))
            .await
            .unwrap();
        let MemberOutcome::Created { user, senha_gerada } = outcome else {
            panic!("expected a created user");
        };
        assert_eq!(user.role, Role::Instrutor);
        assert_eq!(user.admin_pai, Some(admin.id));
        let senha = senha_gerada.unwrap();
        assert_eq!(senha.len(), 8);
        users.login("i1@escola.com", &senha).await.unwrap();
    }

    #[tokio::test]
    async fn admin_cannot_create_admins() {
        let (users, _) = services();
        let admin = register(&users, "admin@escola.com").await;
        let mut input = member("x@escola.com");
        input.role = Some(Role::Admin);
        let outcome = users.create_member(&admin, input).await.unwrap();
        let MemberOutcome::Created { user, .. } = outcome else {
            panic!("expected a created user");
        };
        assert_eq!(user.role, Role::Instrutor);
    }

    #[tokio::test]
    async fn limit_reached_writes_nothing_until_upgrade() {
        let (users, subs) = services();
        let admin = register(&users, "admin@escola.com").await;
        for i in 0..3 {
            users
                .create_member(&admin, member(&format!("i{i}@escola.com")))
                .await
                .unwrap();
        }
        let before = users.store.users.list().await.unwrap().len();

        let err = users
            .create_member(&admin, member("i4@escola.com"))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ServiceError::Domain(DomainError::InstructorLimitReached { limite: 3, atual: 3 })
        ));
        assert_eq!(users.store.users.list().await.unwrap().len(), before);

        subs.subscribe(&admin, PREMIUM, Ciclo::Mensal, None)
            .await
            .unwrap();
        users
            .create_member(&admin, member("i4@escola.com"))
            .await
            .unwrap();
        assert_eq!(users.store.users.list().await.unwrap().len(), before + 1);
    }

    #[tokio::test]
    async fn instrutor_cannot_create_users() {
        let (users, _) = services();
        let admin = register(&users, "admin@escola.com").await;
        let MemberOutcome::Created { user, .. } = users
            .create_member(&admin, member("i@escola.com"))
            .await
            .unwrap()
        else {
            panic!("expected a created user");
        };
        let instrutor = Principal::new(user.id, Role::Instrutor);
        assert!(matches!(
            users
                .create_member(&instrutor, member("j@escola.com"))
                .await
                .unwrap_err(),
            ServiceError::Authz(AuthzError::Forbidden { .. })
        ));
    }

    #[tokio::test]
    async fn god_links_unbound_instrutor_and_deleting_admin_unbinds() {
        let (users, _) = services();
        let root = god(&users).await;
        let admin = register(&users, "admin@escola.com").await;

        let MemberOutcome::Created { user, .. } = users
            .create_member(&root, member("solto@escola.com"))
            .await
            .unwrap()
        else {
            panic!("expected a created user");
        };
        assert_eq!(user.admin_pai, None);
        assert_eq!(users.list_unbound_instrutores(&root).await.unwrap().len(), 1);

        let linked = users
            .create_member(
                &root,
                CreateMember {
                    instrutor_existente_id: Some(user.id),
                    admin_pai: Some(admin.id),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert!(matches!(linked, MemberOutcome::Linked(ref v) if v.admin_pai == Some(admin.id)));
        assert!(users.list_unbound_instrutores(&root).await.unwrap().is_empty());

        users.delete(&root, admin.id).await.unwrap();
        assert_eq!(users.list_unbound_instrutores(&root).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn demoting_an_admin_unbinds_its_team() {
        let (users, _) = services();
        let root = god(&users).await;
        let admin = register(&users, "admin@escola.com").await;
        for i in 0..2 {
            users
                .create_member(&admin, member(&format!("i{i}@escola.com")))
                .await
                .unwrap();
        }
        assert!(users.list_unbound_instrutores(&root).await.unwrap().is_empty());

        let view = users
            .update(
                &root,
                admin.id,
                UpdateUser {
                    role: Some(Role::Instrutor),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(view.role, Role::Instrutor);

        let everyone = users.store.users.list().await.unwrap();
        assert!(everyone.iter().all(|u| u.admin_pai != Some(admin.id)));
        // The two former members plus the demoted admin itself.
        assert_eq!(users.list_unbound_instrutores(&root).await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn cancelled_admin_still_creates_instrutores() {
        let (users, subs) = services();
        let admin = register(&users, "admin@escola.com").await;
        subs.subscribe(&admin, PREMIUM, Ciclo::Mensal, None)
            .await
            .unwrap();
        subs.cancel(&admin).await.unwrap();

        let outcome = users
            .create_member(&admin, member("i@escola.com"))
            .await
            .unwrap();
        assert!(matches!(outcome, MemberOutcome::Created { .. }));
    }

    #[tokio::test]
    async fn admin_lists_itself_and_its_team_only() {
        let (users, _) = services();
        let a = register(&users, "a@escola.com").await;
        let b = register(&users, "b@escola.com").await;
        users.create_member(&a, member("ia@escola.com")).await.unwrap();
        users.create_member(&b, member("ib@escola.com")).await.unwrap();

        let visible = users.list(&a).await.unwrap();
        assert_eq!(visible.len(), 2);
        assert!(visible.iter().all(|u| u.id == a.id || u.admin_pai == Some(a.id)));
    }

    #[tokio::test]
    async fn non_god_role_change_is_ignored_and_god_cannot_mint_gods() {
        let (users, _) = services();
        let root = god(&users).await;
        let admin = register(&users, "admin@escola.com").await;

        let view = users
            .update(
                &admin,
                admin.id,
                UpdateUser {
                    nome: Some("Novo Nome".into()),
                    role: Some(Role::God),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(view.nome, "Novo Nome");
        assert_eq!(view.role, Role::Admin);

        let err = users
            .update(
                &root,
                admin.id,
                UpdateUser {
                    role: Some(Role::God),
                    ..Default::default()
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Domain(DomainError::Forbidden(_))));
    }

    #[tokio::test]
    async fn admin_pai_accepts_empty_string_as_unbind() {
        let parsed: UpdateUser = serde_json::from_value(serde_json::json!({ "adminPai": "" })).unwrap();
        assert_eq!(parsed.admin_pai, Some(Some(String::new())));
        let parsed: UpdateUser = serde_json::from_value(serde_json::json!({ "adminPai": null })).unwrap();
        assert_eq!(parsed.admin_pai, Some(None));
        let parsed: UpdateUser = serde_json::from_value(serde_json::json!({})).unwrap();
        assert_eq!(parsed.admin_pai, None);
    }

    #[tokio::test]
    async fn deleting_users_is_god_only() {
        let (users, _) = services();
        let admin = register(&users, "admin@escola.com").await;
        assert!(users.delete(&admin, admin.id).await.is_err());
    }
}
