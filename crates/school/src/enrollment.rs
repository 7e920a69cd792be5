//! Turma capacity rule applied when an aluno is registered.
//!
//! Stores run [`has_seat`] and the insert under one lock/transaction so two
//! concurrent registrations can never both take the last seat.

use identyflow_auth::{Principal, Role};
use identyflow_core::DomainError;

use crate::{Aluno, Turma};

/// Result of an atomic capacity-checked insert.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Admission {
    Inserted,
    Full { matriculados: u32 },
}

/// Strictly fewer alunos than seats.
pub fn has_seat(capacidade: u32, matriculados: u32) -> bool {
    matriculados < capacidade
}

pub fn turma_full(turma: &Turma) -> DomainError {
    DomainError::TurmaFull {
        turma: turma.nome.clone(),
        capacidade: turma.capacidade,
    }
}

/// Fill in the aluno's instrutor before insertion.
///
/// An explicit `instrutorId` wins; otherwise the turma's instrutor is
/// inherited; otherwise an instrutor registering the aluno claims it.
pub fn prepare_enrollment(mut aluno: Aluno, turma: Option<&Turma>, creator: &Principal) -> Aluno {
    if aluno.instrutor_id.is_none() {
        aluno.instrutor_id = turma.and_then(|t| t.instrutor_id);
    }
    if aluno.instrutor_id.is_none() && creator.role == Role::Instrutor {
        aluno.instrutor_id = Some(creator.id);
    }
    aluno
}
