//! Datastore and application services for IdentyFlow.
//!
//! The domain crates stay pure; this crate owns every suspension point.
//! Services take the caller's [`identyflow_auth::Principal`], authorize it,
//! read/write documents through [`store::Datastore`], and return domain
//! values or a [`ServiceError`].

pub mod error;
pub mod services;
pub mod store;

pub use error::{ServiceError, ServiceResult};
pub use services::{
    CreateMember, LoginResponse, MemberOutcome, RegisterUser, SchoolService, StatsService,
    SubscriptionService, UpdateUser, UserService,
};
pub use store::{AlunoCollection, Collection, Datastore, Document, StoreError};
