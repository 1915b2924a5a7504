//! `arkpos-auth`: user accounts, credentials and role-based authorization.
//!
//! Decoupled from HTTP and storage: the API layer extracts tokens and the infra
//! layer persists the `User` aggregate.

pub mod authorize;
pub mod claims;
pub mod jwt;
pub mod password;
pub mod permissions;
pub mod roles;
pub mod user;

pub use authorize::{AuthzError, CommandAuthorization, Principal, authorize};
pub use claims::{JwtClaims, TokenValidationError, validate_claims};
pub use jwt::{Hs256JwtValidator, JwtValidator};
pub use password::{PasswordError, hash_password, validate_new_password, verify_password};
pub use permissions::Permission;
pub use roles::Role;
pub use user::{
    ChangePassword, PasswordChanged, ProfileUpdated, ReactivateUser, RegisterUser, SuspendUser,
    UpdateProfile, User, UserCommand, UserEvent, UserId, UserReactivated, UserRegistered,
    UserStatus, UserSuspended,
};
