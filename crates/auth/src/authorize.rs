use std::collections::BTreeSet;

use thiserror::Error;

use identyflow_core::UserId;

use crate::{Action, Principal, Role, User};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthzError {
    #[error("forbidden: role '{role}' may not perform '{action}'")]
    Forbidden { action: Action, role: Role },

    #[error("forbidden: record is outside the caller's scope")]
    OutOfScope,
}

/// Authorize a principal for an action against the central policy table.
///
/// - No IO
/// - No panics
pub fn authorize(principal: &Principal, action: Action) -> Result<(), AuthzError> {
    if action.is_granted_to(principal.role) {
        Ok(())
    } else {
        Err(AuthzError::Forbidden {
            action,
            role: principal.role,
        })
    }
}

/// May `principal` write to `target`'s user record?
///
/// God: anyone. Everyone: themselves. Admin: instrutores bound to it.
pub fn ensure_can_manage_user(principal: &Principal, target: &User) -> Result<(), AuthzError> {
    if principal.is_god() || principal.id == target.id {
        return Ok(());
    }
    if principal.role == Role::Admin
        && target.role == Role::Instrutor
        && target.admin_pai == Some(principal.id)
    {
        return Ok(());
    }
    Err(AuthzError::OutOfScope)
}

/// Which student records a principal may read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VisibilityScope {
    /// Unrestricted (god).
    All,
    /// Records assigned to this instrutor only.
    Instrutor(UserId),
    /// Records assigned to, or created by, any member of an admin's team
    /// (the admin itself plus its bound instrutores).
    Team(BTreeSet<UserId>),
}

impl VisibilityScope {
    /// Build the scope for `principal`. `team` lists the instrutores bound to
    /// the principal and is only consulted for admins.
    pub fn for_principal(principal: &Principal, team: impl IntoIterator<Item = UserId>) -> Self {
        match principal.role {
            Role::God => VisibilityScope::All,
            Role::Instrutor => VisibilityScope::Instrutor(principal.id),
            Role::Admin => {
                let mut members: BTreeSet<UserId> = team.into_iter().collect();
                members.insert(principal.id);
                VisibilityScope::Team(members)
            }
        }
    }

    /// Whether a record with the given assigned instrutor and creator is visible.
    pub fn admits(&self, instrutor: Option<UserId>, creator: Option<UserId>) -> bool {
        match self {
            VisibilityScope::All => true,
            VisibilityScope::Instrutor(me) => instrutor == Some(*me),
            VisibilityScope::Team(members) => {
                instrutor.is_some_and(|i| members.contains(&i))
                    || creator.is_some_and(|c| members.contains(&c))
            }
        }
    }

    /// Whether the scope covers records assigned to `instrutor`.
    pub fn covers_instrutor(&self, instrutor: UserId) -> bool {
        match self {
            VisibilityScope::All => true,
            VisibilityScope::Instrutor(me) => *me == instrutor,
            VisibilityScope::Team(members) => members.contains(&instrutor),
        }
    }
}
