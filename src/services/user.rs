//! User service
//!
//! Account registration, login/logout, session validation and the
//! self-service profile and password endpoints. New accounts start with an
//! empty role set and wait for an administrator to approve them.

use crate::db::repositories::{MemberRepository, SessionRepository, UserRepository};
use crate::models::{CreateUserInput, Member, MemberProfilePatch, Session, User};
use crate::services::email::Notifier;
use crate::services::password::{hash_password, verify_password};
use anyhow::Context;
use serde::Serialize;
use std::sync::Arc;

/// Default session expiration time in days
const DEFAULT_SESSION_EXPIRATION_DAYS: i64 = 7;

/// Minimum length of a new password
pub const MIN_PASSWORD_LENGTH: usize = 8;

/// Error types for user service operations
#[derive(Debug, thiserror::Error)]
pub enum UserServiceError {
    /// Authentication failed (invalid credentials)
    #[error("Authentication failed: {0}")]
    AuthenticationError(String),

    /// Validation error (invalid input)
    #[error("Validation error: {0}")]
    ValidationError(String),

    /// Email already registered
    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Not found: {0}")]
    NotFound(String),

    /// Internal error
    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

/// Credentials for login
#[derive(Debug, Clone)]
pub struct LoginInput {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone)]
pub struct ChangePasswordInput {
    pub current_password: String,
    pub new_password: String,
    pub confirm_password: String,
}

/// Result of a successful password change
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PasswordChanged {
    /// Other sessions that were signed out
    pub sessions_revoked: u64,
    /// The client should sign the current session out as well
    pub should_logout: bool,
}

#[derive(Debug, Clone)]
pub struct UpdateProfileInput {
    pub name: String,
    pub email: String,
    /// Applied only when the account has a linked member profile
    pub member: Option<MemberProfilePatch>,
}

/// An account together with its linked member profile
#[derive(Debug, Clone, Serialize)]
pub struct Profile {
    #[serde(flatten)]
    pub user: User,
    pub member: Option<Member>,
}

pub struct UserService {
    user_repo: Arc<dyn UserRepository>,
    session_repo: Arc<dyn SessionRepository>,
    member_repo: Arc<dyn MemberRepository>,
    notifier: Arc<dyn Notifier>,
    session_expiration_days: i64,
}

impl UserService {
    pub fn new(
        user_repo: Arc<dyn UserRepository>,
        session_repo: Arc<dyn SessionRepository>,
        member_repo: Arc<dyn MemberRepository>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            user_repo,
            session_repo,
            member_repo,
            notifier,
            session_expiration_days: DEFAULT_SESSION_EXPIRATION_DAYS,
        }
    }

    pub fn with_session_expiration(mut self, days: i64) -> Self {
        self.session_expiration_days = days;
        self
    }

    /// Register a new, unapproved account.
    ///
    /// The welcome email is best effort and never fails the registration.
    pub async fn register(&self, input: CreateUserInput) -> Result<User, UserServiceError> {
        let name = input.name.trim().to_string();
        let email = input.email.trim().to_string();

        if name.chars().count() < 2 {
            return Err(UserServiceError::ValidationError(
                "Name must be at least 2 characters".to_string(),
            ));
        }
        if !is_valid_email(&email) {
            return Err(UserServiceError::ValidationError(
                "Invalid email address".to_string(),
            ));
        }
        if input.password.chars().count() < MIN_PASSWORD_LENGTH {
            return Err(UserServiceError::ValidationError(
                "Password must be at least 8 characters".to_string(),
            ));
        }

        let existing = self
            .user_repo
            .get_by_email(&email)
            .await
            .context("Failed to check email")?;
        if existing.is_some() {
            return Err(UserServiceError::Conflict(
                "User with this email already exists".to_string(),
            ));
        }

        let password_hash = hash_password(&input.password).context("Failed to hash password")?;
        let user = self
            .user_repo
            .create(&User::new(name, email, password_hash))
            .await
            .context("Failed to create user")?;

        tracing::info!("Registered user {} awaiting approval", user.id);

        if let Err(e) = self.notifier.send_welcome(&user).await {
            tracing::warn!("Failed to send welcome email to {}: {:#}", user.email, e);
        }

        Ok(user)
    }

    /// Check credentials and open a new session.
    ///
    /// Pending accounts may sign in; routing keeps them on the pending page.
    pub async fn login(&self, input: LoginInput) -> Result<Session, UserServiceError> {
        let invalid = || UserServiceError::AuthenticationError("Invalid email or password".to_string());

        let user = self
            .user_repo
            .get_by_email(input.email.trim())
            .await
            .context("Failed to get user by email")?
            .ok_or_else(invalid)?;

        let password_valid = verify_password(&input.password, &user.password_hash)
            .context("Failed to verify password")?;
        if !password_valid {
            return Err(invalid());
        }

        let session = Session::start(user.id, self.session_expiration_days);
        let session = self
            .session_repo
            .create(&session)
            .await
            .context("Failed to create session")?;

        tracing::debug!("User {} signed in", user.id);
        Ok(session)
    }

    pub async fn logout(&self, session_id: &str) -> Result<(), UserServiceError> {
        self.session_repo
            .delete(session_id)
            .await
            .context("Failed to delete session")?;
        Ok(())
    }

    pub async fn get_by_id(&self, id: i64) -> Result<Option<User>, UserServiceError> {
        let user = self
            .user_repo
            .get_by_id(id)
            .await
            .context("Failed to get user by ID")?;
        Ok(user)
    }

    /// Resolve a session token to its user.
    ///
    /// Unknown or expired tokens yield `None`; expired sessions are removed.
    pub async fn validate_session(&self, token: &str) -> Result<Option<User>, UserServiceError> {
        let session = match self
            .session_repo
            .get_by_id(token)
            .await
            .context("Failed to get session")?
        {
            Some(s) => s,
            None => return Ok(None),
        };

        if session.is_expired() {
            if let Err(e) = self.session_repo.delete(token).await {
                tracing::warn!("Failed to delete expired session: {:#}", e);
            }
            return Ok(None);
        }

        let user = self
            .user_repo
            .get_by_id(session.user_id)
            .await
            .context("Failed to get user")?;
        Ok(user)
    }

    /// Delete all expired sessions, returning how many were removed
    pub async fn cleanup_expired_sessions(&self) -> Result<u64, UserServiceError> {
        let count = self
            .session_repo
            .delete_expired()
            .await
            .context("Failed to delete expired sessions")?;
        Ok(count)
    }

    /// Change the caller's password and sign out their other sessions.
    pub async fn change_password(
        &self,
        user_id: i64,
        current_session: &str,
        input: ChangePasswordInput,
    ) -> Result<PasswordChanged, UserServiceError> {
        if input.current_password.is_empty() {
            return Err(UserServiceError::ValidationError(
                "Current password is required".to_string(),
            ));
        }
        if input.new_password.chars().count() < MIN_PASSWORD_LENGTH {
            return Err(UserServiceError::ValidationError(
                "Password must be at least 8 characters long".to_string(),
            ));
        }
        if input.new_password != input.confirm_password {
            return Err(UserServiceError::ValidationError(
                "New passwords don't match".to_string(),
            ));
        }

        let user = self
            .get_by_id(user_id)
            .await?
            .ok_or_else(|| UserServiceError::NotFound("User not found".to_string()))?;

        let current_valid = verify_password(&input.current_password, &user.password_hash)
            .context("Failed to verify password")?;
        if !current_valid {
            return Err(UserServiceError::ValidationError(
                "Current password is incorrect".to_string(),
            ));
        }

        let password_hash = hash_password(&input.new_password).context("Failed to hash password")?;
        self.user_repo
            .update_password(user_id, &password_hash)
            .await
            .context("Failed to update password")?;

        let sessions_revoked = self
            .session_repo
            .delete_others(user_id, current_session)
            .await
            .context("Failed to revoke sessions")?;

        tracing::info!("User {} changed password, {} other sessions revoked", user_id, sessions_revoked);

        Ok(PasswordChanged {
            sessions_revoked,
            should_logout: true,
        })
    }

    pub async fn profile(&self, user_id: i64) -> Result<Profile, UserServiceError> {
        let user = self
            .get_by_id(user_id)
            .await?
            .ok_or_else(|| UserServiceError::NotFound("User not found".to_string()))?;
        let member = self
            .member_repo
            .get_by_user_id(user_id)
            .await
            .context("Failed to get linked member")?;
        Ok(Profile { user, member })
    }

    /// Update name and email, and the linked member profile when one exists.
    pub async fn update_profile(
        &self,
        user_id: i64,
        input: UpdateProfileInput,
    ) -> Result<Profile, UserServiceError> {
        let name = input.name.trim().to_string();
        let email = input.email.trim().to_string();

        if name.is_empty() {
            return Err(UserServiceError::ValidationError("Name is required".to_string()));
        }
        if !is_valid_email(&email) {
            return Err(UserServiceError::ValidationError("Invalid email format".to_string()));
        }

        let holder = self
            .user_repo
            .get_by_email(&email)
            .await
            .context("Failed to check email")?;
        if holder.is_some_and(|other| other.id != user_id) {
            return Err(UserServiceError::Conflict("Email is already taken".to_string()));
        }

        if self.get_by_id(user_id).await?.is_none() {
            return Err(UserServiceError::NotFound("User not found".to_string()));
        }

        let user = self
            .user_repo
            .update_profile(user_id, &name, &email)
            .await
            .context("Failed to update user")?;

        let mut member = self
            .member_repo
            .get_by_user_id(user_id)
            .await
            .context("Failed to get linked member")?;

        if let (Some(patch), Some(existing)) = (input.member, member.as_mut()) {
            existing.apply_profile_patch(patch);
            *existing = self
                .member_repo
                .update(existing)
                .await
                .context("Failed to update linked member")?;
        }

        Ok(Profile { user, member })
    }
}

/// Shape check for an email address: `local@domain.tld`, no whitespace.
pub fn is_valid_email(email: &str) -> bool {
    if email.chars().any(char::is_whitespace) {
        return false;
    }
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    !local.is_empty()
        && !domain.contains('@')
        && domain
            .split_once('.')
            .is_some_and(|(head, tail)| !head.is_empty() && !tail.is_empty())
        && !domain.ends_with('.')
}
