//! `identyflow-core`: domain foundation building blocks.
//!
//! This crate contains **pure domain** primitives shared by every other crate:
//! typed identifiers, the entity contract used by the datastore, and the
//! domain error taxonomy. No infrastructure concerns live here.

pub mod entity;
pub mod error;
pub mod id;

pub use entity::Entity;
pub use error::{DomainError, DomainResult};
pub use id::{AlunoId, CursoId, SubscriptionId, TurmaId, UserId};
