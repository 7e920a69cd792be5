//! School module: cursos, turmas, alunos and the rules binding them.
//!
//! Pure domain logic only: no IO, no HTTP, no persistence concerns.

pub mod aluno;
pub mod curso;
pub mod enrollment;
pub mod schedule;
pub mod stats;
pub mod turma;

pub use aluno::{Aluno, FormaPagamento, NewAluno, StatusPagamento};
pub use curso::{Curso, CursoPatch, NewCurso};
pub use enrollment::{Admission, has_seat, prepare_enrollment, turma_full};
pub use schedule::{CursoResumo, ProximaTurma, ProximaTurmaResponse, Sugestao, next_turma};
pub use turma::{NewTurma, Turma, TurmaPatch, TurmaStatus, TurmaView};
