use serde::Serialize;

use crate::Role;

/// A mutation or privileged read that is gated by role.
///
/// Every endpoint consults [`Action::is_granted_to`] instead of re-deriving
/// role checks locally; the table below is the single source of truth.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    ListCursos,
    CreateCurso,
    UpdateCurso,
    /// Soft-delete or reactivate.
    ToggleCurso,
    CreateTurma,
    UpdateTurma,
    DeleteTurma,
    CreateAluno,
    ListUsers,
    ListUnboundInstrutores,
    CreateInstrutor,
    CreateAdmin,
    LinkInstrutor,
    ChangeRole,
    ReassignAdminPai,
    DeleteUser,
    EditOwnProfile,
    ViewDashboard,
    ViewAnalytics,
    ViewGodMetrics,
}

const EVERYONE: &[Role] = &[Role::God, Role::Admin, Role::Instrutor];
const STAFF: &[Role] = &[Role::God, Role::Admin];
const GOD_ONLY: &[Role] = &[Role::God];

impl Action {
    pub const ALL: [Action; 20] = [
        Action::ListCursos,
        Action::CreateCurso,
        Action::UpdateCurso,
        Action::ToggleCurso,
        Action::CreateTurma,
        Action::UpdateTurma,
        Action::DeleteTurma,
        Action::CreateAluno,
        Action::ListUsers,
        Action::ListUnboundInstrutores,
        Action::CreateInstrutor,
        Action::CreateAdmin,
        Action::LinkInstrutor,
        Action::ChangeRole,
        Action::ReassignAdminPai,
        Action::DeleteUser,
        Action::EditOwnProfile,
        Action::ViewDashboard,
        Action::ViewAnalytics,
        Action::ViewGodMetrics,
    ];

    /// Roles allowed to perform this action.
    pub fn allowed_roles(self) -> &'static [Role] {
        match self {
            Action::CreateTurma
            | Action::UpdateTurma
            | Action::CreateAluno
            | Action::EditOwnProfile
            | Action::ViewDashboard => EVERYONE,

            Action::ListCursos
            | Action::CreateCurso
            | Action::UpdateCurso
            | Action::ToggleCurso
            | Action::DeleteTurma
            | Action::ListUsers
            | Action::CreateInstrutor
            | Action::ViewAnalytics => STAFF,

            Action::ListUnboundInstrutores
            | Action::CreateAdmin
            | Action::LinkInstrutor
            | Action::ChangeRole
            | Action::ReassignAdminPai
            | Action::DeleteUser
            | Action::ViewGodMetrics => GOD_ONLY,
        }
    }

    pub fn is_granted_to(self, role: Role) -> bool {
        self.allowed_roles().contains(&role)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Action::ListCursos => "cursos.list",
            Action::CreateCurso => "cursos.create",
            Action::UpdateCurso => "cursos.update",
            Action::ToggleCurso => "cursos.toggle",
            Action::CreateTurma => "turmas.create",
            Action::UpdateTurma => "turmas.update",
            Action::DeleteTurma => "turmas.delete",
            Action::CreateAluno => "alunos.create",
            Action::ListUsers => "users.list",
            Action::ListUnboundInstrutores => "users.list_unbound",
            Action::CreateInstrutor => "users.create_instrutor",
            Action::CreateAdmin => "users.create_admin",
            Action::LinkInstrutor => "users.link_instrutor",
            Action::ChangeRole => "users.change_role",
            Action::ReassignAdminPai => "users.reassign_admin_pai",
            Action::DeleteUser => "users.delete",
            Action::EditOwnProfile => "users.edit_self",
            Action::ViewDashboard => "stats.dashboard",
            Action::ViewAnalytics => "stats.analytics",
            Action::ViewGodMetrics => "stats.god_metrics",
        }
    }

    /// Every action granted to `role`, in table order.
    pub fn granted_to(role: Role) -> Vec<Action> {
        Action::ALL
            .into_iter()
            .filter(|a| a.is_granted_to(role))
            .collect()
    }
}

impl core::fmt::Display for Action {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}
