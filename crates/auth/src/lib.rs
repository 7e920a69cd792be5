//! `identyflow-auth`: authentication/authorization boundary.
//!
//! Role hierarchy, the central permission table, visibility scoping, the user
//! entity and its linking invariants, JWT claims and password hashing. This
//! crate is decoupled from HTTP and storage.

pub mod authorize;
pub mod claims;
pub mod password;
pub mod permissions;
pub mod principal;
pub mod roles;
pub mod user;

pub use authorize::{AuthzError, VisibilityScope, authorize, ensure_can_manage_user};
pub use claims::{Hs256TokenService, JwtClaims, JwtValidator, TokenError, validate_claims};
pub use password::{PasswordError, generate_password, hash_password, verify_password};
pub use permissions::Action;
pub use principal::Principal;
pub use roles::Role;
pub use user::{NewUser, User, UserPatch, UserView, normalize_email, validate_admin_pai, validate_email};
