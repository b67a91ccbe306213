//! Services layer - Business logic
//!
//! Services validate input, consult `crate::policy` for every access
//! decision and coordinate the repositories. They never render responses;
//! each one returns its own error enum that the API layer maps to a status.

pub mod admin;
pub mod document;
pub mod download;
pub mod email;
pub mod member;
pub mod password;
pub mod slug;
pub mod user;

pub use admin::{AdminService, AdminServiceError, DeletedUser};
pub use document::{DocumentService, DocumentServiceError, UpdatedDocument};
pub use download::{DownloadFile, DownloadFormat};
pub use email::{notifier_from_config, DocumentNotice, NoopNotifier, Notifier, SmtpNotifier};
pub use member::{MemberService, MemberServiceError};
pub use password::{hash_password, verify_password};
pub use user::{
    ChangePasswordInput, LoginInput, PasswordChanged, Profile, UpdateProfileInput, UserService,
    UserServiceError,
};

use crate::models::{RoleSet, User};

/// The authenticated account a service call acts on behalf of
#[derive(Debug, Clone, Copy)]
pub struct Caller<'a> {
    pub id: i64,
    pub roles: &'a RoleSet,
    pub display_name: &'a str,
}

impl<'a> From<&'a User> for Caller<'a> {
    fn from(user: &'a User) -> Self {
        Self {
            id: user.id,
            roles: &user.roles,
            display_name: &user.name,
        }
    }
}
