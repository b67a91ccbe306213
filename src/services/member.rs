//! Member directory service

use crate::db::repositories::{MemberRepository, UserRepository};
use crate::models::{CreateMemberInput, Member, MemberFilter, MemberWithAccount, UpdateMemberInput};
use crate::policy::{
    can_create_member, can_delete_member, can_edit_member, ConfirmationFlow, ConfirmationTarget,
};
use crate::services::slug::member_slug;
use crate::services::user::is_valid_email;
use crate::services::Caller;
use anyhow::Context;
use chrono::Utc;
use std::sync::Arc;

#[derive(Debug, thiserror::Error)]
pub enum MemberServiceError {
    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

pub struct MemberService {
    members: Arc<dyn MemberRepository>,
    users: Arc<dyn UserRepository>,
}

impl MemberService {
    pub fn new(members: Arc<dyn MemberRepository>, users: Arc<dyn UserRepository>) -> Self {
        Self { members, users }
    }

    pub async fn list(&self, filter: &MemberFilter) -> Result<Vec<MemberWithAccount>, MemberServiceError> {
        let members = self.members.list(filter).await.context("Failed to list members")?;
        Ok(members)
    }

    pub async fn get_by_slug(&self, slug: &str) -> Result<MemberWithAccount, MemberServiceError> {
        self.members
            .get_by_slug(slug)
            .await
            .context("Failed to get member")?
            .ok_or_else(not_found)
    }

    /// Create a member profile, optionally linked to an account that has none yet
    pub async fn create(
        &self,
        caller: Caller<'_>,
        mut input: CreateMemberInput,
    ) -> Result<Member, MemberServiceError> {
        if !can_create_member(caller.roles) {
            return Err(MemberServiceError::Forbidden("Admin access required".to_string()));
        }

        input.name = input.name.trim().to_string();
        input.email = input.email.trim().to_string();
        if input.name.is_empty() {
            return Err(MemberServiceError::ValidationError("Name is required".to_string()));
        }
        if !is_valid_email(&input.email) {
            return Err(MemberServiceError::ValidationError("Invalid email address".to_string()));
        }

        self.ensure_email_free(&input.email, None).await?;

        if let Some(user_id) = input.user_id {
            let linked = self
                .members
                .get_by_user_id(user_id)
                .await
                .context("Failed to check linked member")?;
            if linked.is_some() {
                return Err(MemberServiceError::ValidationError(
                    "This user is already linked to another member".to_string(),
                ));
            }
            let user = self.users.get_by_id(user_id).await.context("Failed to get user")?;
            if user.is_none() {
                return Err(MemberServiceError::ValidationError(
                    "Selected user does not exist".to_string(),
                ));
            }
        }

        let slug = member_slug(&input.name);
        let member = self
            .members
            .create(&Member::new(input, slug))
            .await
            .context("Failed to create member")?;

        tracing::info!("User {} created member {} ({})", caller.id, member.id, member.slug);
        Ok(member)
    }

    pub async fn update(
        &self,
        caller: Caller<'_>,
        id: i64,
        mut input: UpdateMemberInput,
    ) -> Result<Member, MemberServiceError> {
        input.name = input.name.trim().to_string();
        if input.name.is_empty() {
            return Err(MemberServiceError::ValidationError("Name is required".to_string()));
        }
        if let Some(email) = input.email.as_deref().filter(|e| !e.is_empty()) {
            if !is_valid_email(email) {
                return Err(MemberServiceError::ValidationError("Invalid email address".to_string()));
            }
        }

        let existing = self.find(id).await?;
        if !can_edit_member(
            existing.member.user_id,
            existing.linked_account_is_admin,
            caller.roles,
            caller.id,
        ) {
            return Err(MemberServiceError::Forbidden(
                "You can only edit your own member profile or you need MODERATOR/ADMIN privileges"
                    .to_string(),
            ));
        }

        if let Some(email) = input.email.as_deref().filter(|e| !e.is_empty()) {
            self.ensure_email_free(email, Some(id)).await?;
        }

        let mut member = existing.member;
        let renamed = member.name != input.name;
        member.apply_update(input);
        if renamed {
            member.slug = member_slug(&member.name);
        }
        member.updated_at = Utc::now();

        let member = self
            .members
            .update(&member)
            .await
            .context("Failed to update member")?;

        tracing::info!("User {} updated member {}", caller.id, member.id);
        Ok(member)
    }

    /// Delete a member after the caller typed its exact name
    pub async fn delete(
        &self,
        caller: Caller<'_>,
        id: i64,
        name_confirmation: Option<&str>,
    ) -> Result<(), MemberServiceError> {
        // Role gate against an unlinked profile first; a non-admin never learns whether `id` exists
        if !can_delete_member(false, caller.roles) {
            return Err(MemberServiceError::Forbidden(
                "Only administrators can delete members".to_string(),
            ));
        }

        let existing = self.find(id).await?;
        if !can_delete_member(existing.linked_account_is_admin, caller.roles) {
            return Err(MemberServiceError::Forbidden(
                "Cannot delete administrator members".to_string(),
            ));
        }

        let mut confirmation = ConfirmationFlow::new(ConfirmationTarget::MemberName, &existing.member.name);
        confirmation.begin();
        confirmation
            .submit(name_confirmation)
            .map_err(|e| MemberServiceError::ValidationError(e.to_string()))?;

        self.members.delete(id).await.context("Failed to delete member")?;
        confirmation.complete();

        tracing::info!("User {} deleted member {}", caller.id, id);
        Ok(())
    }

    async fn find(&self, id: i64) -> Result<MemberWithAccount, MemberServiceError> {
        self.members
            .get_by_id(id)
            .await
            .context("Failed to get member")?
            .ok_or_else(not_found)
    }

    async fn ensure_email_free(&self, email: &str, excluding: Option<i64>) -> Result<(), MemberServiceError> {
        let holder = self
            .members
            .get_by_email(email)
            .await
            .context("Failed to check member email")?;
        match holder {
            Some(m) if Some(m.id) != excluding => Err(MemberServiceError::ValidationError(
                "Member with this email already exists".to_string(),
            )),
            _ => Ok(()),
        }
    }
}

fn not_found() -> MemberServiceError {
    MemberServiceError::NotFound("Member not found".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::{SqlxMemberRepository, SqlxUserRepository};
    use crate::db::{create_test_pool, migrations};
    use crate::models::{MemberStatus, Role, RoleSet, User};

    struct Fixture {
        service: MemberService,
        users: Arc<dyn UserRepository>,
    }

    async fn setup() -> Fixture {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        migrations::run_migrations(&pool)
            .await
            .expect("Failed to run migrations");
        let users = SqlxUserRepository::boxed(pool.clone());
        Fixture {
            service: MemberService::new(SqlxMemberRepository::boxed(pool), users.clone()),
            users,
        }
    }

    async fn create_user(fx: &Fixture, email: &str, roles: RoleSet) -> User {
        let user = fx
            .users
            .create(&User::new("Someone".into(), email.into(), "hash".into()))
            .await
            .unwrap();
        fx.users.update_roles(user.id, &roles).await.unwrap()
    }

    fn input(name: &str, email: &str) -> CreateMemberInput {
        CreateMemberInput {
            name: name.to_string(),
            email: email.to_string(),
            ..Default::default()
        }
    }

    fn rename(name: &str) -> UpdateMemberInput {
        UpdateMemberInput {
            name: name.to_string(),
            status: MemberStatus::Active,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_create_rules() {
        let fx = setup().await;
        let admin = create_user(&fx, "admin@example.com", RoleSet::from([Role::Admin])).await;
        let moderator = create_user(&fx, "mod@example.com", RoleSet::from([Role::Moderator])).await;
        let account = create_user(&fx, "linked@example.com", RoleSet::from([Role::User])).await;

        let denied = fx
            .service
            .create(Caller::from(&moderator), input("Leyla", "leyla@example.com"))
            .await;
        assert!(matches!(denied, Err(MemberServiceError::Forbidden(msg)) if msg == "Admin access required"));

        let member = fx
            .service
            .create(
                Caller::from(&admin),
                CreateMemberInput {
                    user_id: Some(account.id),
                    ..input("Leyla  Mammadova", "leyla@example.com")
                },
            )
            .await
            .unwrap();
        assert_eq!(member.slug, "leyla-mammadova");
        assert_eq!(member.status, MemberStatus::Active);
        assert!(member.mobile_numbers.is_empty());

        let cases = [
            (input("", "x@example.com"), "Name is required"),
            (input("X", "not-an-email"), "Invalid email address"),
            (input("X", "leyla@example.com"), "Member with this email already exists"),
            (
                CreateMemberInput {
                    user_id: Some(account.id),
                    ..input("X", "x@example.com")
                },
                "This user is already linked to another member",
            ),
            (
                CreateMemberInput {
                    user_id: Some(9999),
                    ..input("X", "x@example.com")
                },
                "Selected user does not exist",
            ),
        ];
        for (case, expected) in cases {
            let result = fx.service.create(Caller::from(&admin), case).await;
            assert!(
                matches!(&result, Err(MemberServiceError::ValidationError(msg)) if msg == expected),
                "expected {expected:?}, got {result:?}"
            );
        }
    }

    #[tokio::test]
    async fn test_update_permissions() {
        let fx = setup().await;
        let admin = create_user(&fx, "admin@example.com", RoleSet::from([Role::Admin])).await;
        let other_admin = create_user(&fx, "admin2@example.com", RoleSet::from([Role::Admin])).await;
        let moderator = create_user(&fx, "mod@example.com", RoleSet::from([Role::Moderator])).await;
        let owner = create_user(&fx, "owner@example.com", RoleSet::from([Role::User])).await;
        let stranger = create_user(&fx, "stranger@example.com", RoleSet::from([Role::User])).await;

        let owned = fx
            .service
            .create(
                Caller::from(&admin),
                CreateMemberInput {
                    user_id: Some(owner.id),
                    ..input("Owner Member", "owner.member@example.com")
                },
            )
            .await
            .unwrap();
        let admin_profile = fx
            .service
            .create(
                Caller::from(&admin),
                CreateMemberInput {
                    user_id: Some(admin.id),
                    ..input("Admin Member", "admin.member@example.com")
                },
            )
            .await
            .unwrap();

        let denied = fx.service.update(Caller::from(&stranger), owned.id, rename("Hacked")).await;
        assert!(matches!(denied, Err(MemberServiceError::Forbidden(_))));

        let by_owner = fx
            .service
            .update(Caller::from(&owner), owned.id, rename("Owner Renamed"))
            .await
            .unwrap();
        assert_eq!(by_owner.slug, "owner-renamed");
        fx.service
            .update(Caller::from(&moderator), owned.id, rename("Owner Member"))
            .await
            .unwrap();

        // Admin-linked profiles are editable only by their owner
        for outsider in [&other_admin, &moderator] {
            let result = fx
                .service
                .update(Caller::from(outsider), admin_profile.id, rename("Nope"))
                .await;
            assert!(matches!(result, Err(MemberServiceError::Forbidden(_))));
        }
        fx.service
            .update(Caller::from(&admin), admin_profile.id, rename("Admin Member"))
            .await
            .unwrap();

        let missing = fx.service.update(Caller::from(&admin), 9999, rename("X")).await;
        assert!(matches!(missing, Err(MemberServiceError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_update_rejects_taken_email() {
        let fx = setup().await;
        let admin = create_user(&fx, "admin@example.com", RoleSet::from([Role::Admin])).await;
        fx.service
            .create(Caller::from(&admin), input("First", "first@example.com"))
            .await
            .unwrap();
        let second = fx
            .service
            .create(Caller::from(&admin), input("Second", "second@example.com"))
            .await
            .unwrap();

        let result = fx
            .service
            .update(
                Caller::from(&admin),
                second.id,
                UpdateMemberInput {
                    email: Some("first@example.com".into()),
                    ..rename("Second")
                },
            )
            .await;
        assert!(matches!(result, Err(MemberServiceError::ValidationError(_))));

        let kept = fx
            .service
            .update(
                Caller::from(&admin),
                second.id,
                UpdateMemberInput {
                    email: Some("second@example.com".into()),
                    ..rename("Second")
                },
            )
            .await
            .unwrap();
        assert_eq!(kept.email, "second@example.com");
    }

    #[tokio::test]
    async fn test_delete_rules() {
        let fx = setup().await;
        let admin = create_user(&fx, "admin@example.com", RoleSet::from([Role::Admin])).await;
        let other_admin = create_user(&fx, "admin2@example.com", RoleSet::from([Role::Admin])).await;
        let moderator = create_user(&fx, "mod@example.com", RoleSet::from([Role::Moderator])).await;

        let plain = fx
            .service
            .create(Caller::from(&admin), input("Plain Member", "plain@example.com"))
            .await
            .unwrap();
        let admin_profile = fx
            .service
            .create(
                Caller::from(&admin),
                CreateMemberInput {
                    user_id: Some(other_admin.id),
                    ..input("Admin Member", "am@example.com")
                },
            )
            .await
            .unwrap();

        let denied = fx
            .service
            .delete(Caller::from(&moderator), plain.id, Some("Plain Member"))
            .await;
        assert!(matches!(denied, Err(MemberServiceError::Forbidden(msg)) if msg == "Only administrators can delete members"));

        let denied_missing = fx
            .service
            .delete(Caller::from(&moderator), 9999, Some("Ghost"))
            .await;
        assert!(matches!(denied_missing, Err(MemberServiceError::Forbidden(msg)) if msg == "Only administrators can delete members"));

        let protected = fx
            .service
            .delete(Caller::from(&admin), admin_profile.id, Some("Admin Member"))
            .await;
        assert!(matches!(protected, Err(MemberServiceError::Forbidden(msg)) if msg == "Cannot delete administrator members"));

        let mismatch = fx
            .service
            .delete(Caller::from(&admin), plain.id, Some("plain member"))
            .await;
        assert!(matches!(mismatch, Err(MemberServiceError::ValidationError(_))));

        fx.service
            .delete(Caller::from(&admin), plain.id, Some("Plain Member"))
            .await
            .unwrap();
        assert!(matches!(
            fx.service.get_by_slug("plain-member").await,
            Err(MemberServiceError::NotFound(_))
        ));
    }
}
