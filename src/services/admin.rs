//! Administrator user management
//!
//! Listing accounts, assigning role sets and deleting accounts. Every check
//! is delegated to `policy`; this service only fetches the facts the policy
//! needs and applies the outcome.

use crate::db::repositories::{ContentRepository, MemberRepository, UserRepository};
use crate::models::{ContentSummary, OwnedContent, RoleSet, User, UserFilter};
use crate::policy::{
    can_list_unlinked_users, can_manage_users, check_account_delete, check_role_assignment,
    AccountDecision, ConfirmationFlow, ConfirmationTarget, TargetAccount,
};
use crate::services::email::Notifier;
use crate::services::Caller;
use anyhow::Context;
use serde::Serialize;
use std::sync::Arc;

#[derive(Debug, thiserror::Error)]
pub enum AdminServiceError {
    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    /// The target still owns content and cannot be deleted
    #[error("Cannot delete user with existing content. Please transfer or delete their content first.")]
    OwnsContent {
        summary: ContentSummary,
        details: OwnedContent,
    },

    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

/// Account removed by [`AdminService::delete_user`]
#[derive(Debug, Clone, Serialize)]
pub struct DeletedUser {
    pub id: i64,
    pub name: String,
    pub email: String,
    pub had_member_profile: bool,
}

pub struct AdminService {
    user_repo: Arc<dyn UserRepository>,
    member_repo: Arc<dyn MemberRepository>,
    content_repo: Arc<dyn ContentRepository>,
    notifier: Arc<dyn Notifier>,
}

impl AdminService {
    pub fn new(
        user_repo: Arc<dyn UserRepository>,
        member_repo: Arc<dyn MemberRepository>,
        content_repo: Arc<dyn ContentRepository>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            user_repo,
            member_repo,
            content_repo,
            notifier,
        }
    }

    /// All accounts, newest first, narrowed by `filter`
    pub async fn list_users(
        &self,
        caller: Caller<'_>,
        filter: &UserFilter,
    ) -> Result<Vec<User>, AdminServiceError> {
        if !can_manage_users(caller.roles) {
            return Err(AdminServiceError::Forbidden(
                "Only administrators can manage users".to_string(),
            ));
        }
        let users = self.user_repo.list(filter).await.context("Failed to list users")?;
        Ok(users)
    }

    /// Accounts without a member profile, for the member-linking picker
    pub async fn list_unlinked_users(&self, caller: Caller<'_>) -> Result<Vec<User>, AdminServiceError> {
        if !can_list_unlinked_users(caller.roles) {
            return Err(AdminServiceError::Forbidden(
                "Only administrators can access user list".to_string(),
            ));
        }
        let users = self
            .user_repo
            .list_unlinked()
            .await
            .context("Failed to list unlinked users")?;
        Ok(users)
    }

    /// Whether the caller may replace the roles of `target_id`; checked
    /// before the requested role list is even looked at
    pub fn authorize_role_assignment(
        &self,
        caller: Caller<'_>,
        target_id: i64,
    ) -> Result<(), AdminServiceError> {
        match check_role_assignment(target_id, caller.id, caller.roles) {
            AccountDecision::Allowed => Ok(()),
            AccountDecision::SelfTarget => Err(AdminServiceError::ValidationError(
                "Cannot change your own roles".to_string(),
            )),
            _ => Err(AdminServiceError::Forbidden(
                "Only administrators can change user roles".to_string(),
            )),
        }
    }

    /// Replace a target account's role set. An empty set returns the account
    /// to pending.
    pub async fn assign_roles(
        &self,
        caller: Caller<'_>,
        target_id: i64,
        roles: RoleSet,
    ) -> Result<User, AdminServiceError> {
        self.authorize_role_assignment(caller, target_id)?;

        if self
            .user_repo
            .get_by_id(target_id)
            .await
            .context("Failed to get user")?
            .is_none()
        {
            return Err(AdminServiceError::NotFound("User not found".to_string()));
        }

        let updated = self
            .user_repo
            .update_roles(target_id, &roles)
            .await
            .context("Failed to update roles")?;

        tracing::info!(
            "User {} assigned roles [{}] to user {}",
            caller.id,
            updated.roles,
            updated.id
        );

        if let Err(e) = self
            .notifier
            .send_role_assignment(&updated, caller.display_name)
            .await
        {
            tracing::warn!("Failed to send role assignment email to {}: {:#}", updated.email, e);
        }

        Ok(updated)
    }

    /// Delete an account after the caller typed its exact email.
    ///
    /// Checks run in order: administrator, target exists, confirmation,
    /// not self, target not an administrator, target owns no content.
    pub async fn delete_user(
        &self,
        caller: Caller<'_>,
        target_id: i64,
        email_confirmation: Option<&str>,
    ) -> Result<DeletedUser, AdminServiceError> {
        if !can_manage_users(caller.roles) {
            return Err(AdminServiceError::Forbidden(
                "Only administrators can delete users".to_string(),
            ));
        }

        let target = self
            .user_repo
            .get_by_id(target_id)
            .await
            .context("Failed to get user")?
            .ok_or_else(|| AdminServiceError::NotFound("User not found".to_string()))?;

        let mut confirmation = ConfirmationFlow::new(ConfirmationTarget::AccountEmail, &target.email);
        confirmation.begin();
        confirmation
            .submit(email_confirmation)
            .map_err(|e| AdminServiceError::ValidationError(e.to_string()))?;

        let owned = self
            .content_repo
            .owned_by(target.id)
            .await
            .context("Failed to load owned content")?;

        let decision = check_account_delete(
            TargetAccount {
                id: target.id,
                roles: &target.roles,
                owned: &owned,
            },
            caller.id,
            caller.roles,
        );
        match decision {
            AccountDecision::Allowed => {}
            AccountDecision::SelfTarget => {
                return Err(AdminServiceError::ValidationError(
                    "Cannot delete your own account".to_string(),
                ))
            }
            AccountDecision::NotAdministrator => {
                return Err(AdminServiceError::Forbidden(
                    "Only administrators can delete users".to_string(),
                ))
            }
            AccountDecision::TargetIsAdministrator => {
                return Err(AdminServiceError::ValidationError(
                    "Cannot delete other administrator accounts".to_string(),
                ))
            }
            AccountDecision::OwnsContent(summary) => {
                return Err(AdminServiceError::OwnsContent {
                    summary,
                    details: owned,
                })
            }
        }

        let had_member_profile = self
            .member_repo
            .get_by_user_id(target.id)
            .await
            .context("Failed to check member profile")?
            .is_some();

        // Sessions and the linked member profile go with the account
        self.user_repo
            .delete(target.id)
            .await
            .context("Failed to delete user")?;
        confirmation.complete();

        tracing::info!("User {} deleted user {} ({})", caller.id, target.id, target.email);

        Ok(DeletedUser {
            id: target.id,
            name: target.name,
            email: target.email,
            had_member_profile,
        })
    }
}
