//! User entity: principals of the system and their owning-admin link.
//!
//! # Invariants
//! - `admin_pai`, when set, belongs to an instrutor and references an admin.
//! - god and admin users never carry `admin_pai`.
//! - `nome_empresa` is only kept for admins.
//! - Only god changes `role` or `admin_pai`, and never to or from god.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use identyflow_core::{DomainError, DomainResult, Entity, UserId};

use crate::{Principal, Role};

/// Persisted user document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: UserId,
    pub nome: String,
    pub email: String,
    pub senha_hash: String,
    #[serde(default)]
    pub telefone: Option<String>,
    #[serde(default)]
    pub foto: Option<String>,
    pub role: Role,
    #[serde(default)]
    pub admin_pai: Option<UserId>,
    #[serde(default)]
    pub nome_empresa: Option<String>,
    pub criado_em: DateTime<Utc>,
    pub atualizado_em: DateTime<Utc>,
}

impl Entity for User {
    type Id = UserId;

    fn id(&self) -> &UserId {
        &self.id
    }
}

/// Input for [`User::create`]. The password arrives already hashed.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub nome: String,
    pub email: String,
    pub senha_hash: String,
    pub telefone: Option<String>,
    pub role: Role,
    pub admin_pai: Option<UserId>,
    pub nome_empresa: Option<String>,
    pub criado_em: DateTime<Utc>,
}

/// Partial profile update. `None` means "leave unchanged".
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UserPatch {
    pub nome: Option<String>,
    pub email: Option<String>,
    pub telefone: Option<String>,
    pub foto: Option<String>,
    pub role: Option<Role>,
    /// `Some(None)` unbinds, `Some(Some(id))` rebinds.
    pub admin_pai: Option<Option<UserId>>,
}

impl User {
    /// Build a user from already-validated input, normalising role-dependent fields.
    pub fn create(input: NewUser) -> Self {
        let admin_pai = match input.role {
            Role::Instrutor => input.admin_pai,
            Role::God | Role::Admin => None,
        };
        let nome_empresa = match input.role {
            Role::Admin => input.nome_empresa.filter(|n| !n.trim().is_empty()),
            _ => None,
        };
        Self {
            id: UserId::new(),
            nome: input.nome.trim().to_string(),
            email: normalize_email(&input.email),
            senha_hash: input.senha_hash,
            telefone: input.telefone,
            foto: None,
            role: input.role,
            admin_pai,
            nome_empresa,
            criado_em: input.criado_em,
            atualizado_em: input.criado_em,
        }
    }

    /// Whether this record shows up in `principal`'s user listing.
    pub fn visible_to(&self, principal: &Principal) -> bool {
        match principal.role {
            Role::God => true,
            Role::Admin => self.id == principal.id || self.admin_pai == Some(principal.id),
            Role::Instrutor => self.id == principal.id,
        }
    }

    /// Apply a profile update on behalf of `actor`.
    ///
    /// `new_parent` must be the resolved user behind `patch.admin_pai` when it
    /// names one. Privileged fields sent by a non-god actor are ignored.
    pub fn apply_patch(
        &mut self,
        actor: &Principal,
        patch: UserPatch,
        new_parent: Option<&User>,
        now: DateTime<Utc>,
    ) -> DomainResult<()> {
        if let Some(nome) = patch.nome {
            let nome = nome.trim();
            if nome.is_empty() {
                return Err(DomainError::validation("nome must not be empty"));
            }
            self.nome = nome.to_string();
        }
        if let Some(email) = patch.email {
            validate_email(&email)?;
            self.email = normalize_email(&email);
        }
        if let Some(telefone) = patch.telefone {
            self.telefone = Some(telefone);
        }
        if let Some(foto) = patch.foto {
            self.foto = Some(foto);
        }

        if actor.is_god() {
            if let Some(role) = patch.role {
                self.change_role(role)?;
            }
            if let Some(admin_pai) = patch.admin_pai {
                self.admin_pai = match admin_pai {
                    None => None,
                    Some(id) => {
                        let parent = new_parent
                            .filter(|p| p.id == id)
                            .ok_or(DomainError::not_found("adminPai"))?;
                        Some(validate_admin_pai(self.role, parent)?)
                    }
                };
            }
        } else if patch.role.is_some() || patch.admin_pai.is_some() {
            tracing::debug!(actor = %actor.id, target = %self.id, "ignoring privileged fields from non-god actor");
        }

        self.atualizado_em = now;
        Ok(())
    }

    fn change_role(&mut self, role: Role) -> DomainResult<()> {
        if role == self.role {
            return Ok(());
        }
        if role == Role::God || self.role == Role::God {
            return Err(DomainError::forbidden("the god role cannot be granted or revoked"));
        }
        self.role = role;
        if role != Role::Instrutor {
            self.admin_pai = None;
        }
        if role != Role::Admin {
            self.nome_empresa = None;
        }
        Ok(())
    }
}

/// Check that `parent` may own a user of role `child_role`.
pub fn validate_admin_pai(child_role: Role, parent: &User) -> DomainResult<UserId> {
    if child_role != Role::Instrutor {
        return Err(DomainError::validation("only instrutores can be bound to an admin"));
    }
    if parent.role != Role::Admin {
        return Err(DomainError::validation("adminPai must reference an admin"));
    }
    Ok(parent.id)
}

pub fn validate_email(email: &str) -> DomainResult<()> {
    let email = email.trim();
    match email.split_once('@') {
        Some((local, domain)) if !local.is_empty() && !domain.is_empty() => Ok(()),
        _ => Err(DomainError::validation("email is invalid")),
    }
}

pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Public projection of a user (no password hash).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserView {
    pub id: UserId,
    pub nome: String,
    pub email: String,
    pub telefone: Option<String>,
    pub foto: Option<String>,
    pub role: Role,
    pub admin_pai: Option<UserId>,
    pub nome_empresa: Option<String>,
    pub criado_em: DateTime<Utc>,
}

impl From<&User> for UserView {
    fn from(u: &User) -> Self {
        Self {
            id: u.id,
            nome: u.nome.clone(),
            email: u.email.clone(),
            telefone: u.telefone.clone(),
            foto: u.foto.clone(),
            role: u.role,
            admin_pai: u.admin_pai,
            nome_empresa: u.nome_empresa.clone(),
            criado_em: u.criado_em,
        }
    }
}
