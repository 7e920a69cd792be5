//! Application services: orchestrate datastore access around the pure
//! domain crates. Every write path authorizes against the central policy
//! table before touching the store.

pub mod school;
pub mod stats;
pub mod subscriptions;
pub mod users;

pub use school::SchoolService;
pub use stats::StatsService;
pub use subscriptions::SubscriptionService;
pub use users::{CreateMember, LoginResponse, MemberOutcome, RegisterUser, UpdateUser, UserService};

use identyflow_auth::{Principal, Role, User, VisibilityScope};
use identyflow_core::UserId;

use crate::error::ServiceResult;
use crate::store::Datastore;

/// Ids of the instrutores bound to `admin`.
pub(crate) fn team_of(users: &[User], admin: UserId) -> Vec<UserId> {
    users
        .iter()
        .filter(|u| u.role == Role::Instrutor && u.admin_pai == Some(admin))
        .map(|u| u.id)
        .collect()
}

/// Which alunos `principal` may read, given every user.
pub(crate) fn scope_from(users: &[User], principal: &Principal) -> VisibilityScope {
    let team = match principal.role {
        Role::Admin => team_of(users, principal.id),
        Role::God | Role::Instrutor => Vec::new(),
    };
    VisibilityScope::for_principal(principal, team)
}

pub(crate) async fn visibility_scope(
    store: &Datastore,
    principal: &Principal,
) -> ServiceResult<VisibilityScope> {
    Ok(scope_from(&store.users.list().await?, principal))
}
