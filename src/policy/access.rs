//! Resource access decisions.
//!
//! Every function here is a pure decision over the caller's role set and
//! already-fetched resource facts:
//! - No IO
//! - No panics
//! - No errors (always a definite answer)
//!
//! Callers enforce the answer (403, redirect, ...) before touching storage.

use serde::Serialize;

use crate::models::{ContentStatus, ContentSummary, DocumentClassification, OwnedContent, Role, RoleSet};

/// Whether the caller clears the classification gate of a document.
pub fn can_view_document(classification: DocumentClassification, roles: &RoleSet) -> bool {
    match classification {
        DocumentClassification::Public => true,
        DocumentClassification::Internal => {
            roles.contains(Role::Admin) || roles.contains(Role::Moderator)
        }
        DocumentClassification::Restricted => roles.contains(Role::Admin),
    }
}

/// Classification gate for a raw stored label.
///
/// Labels that are not a known classification are denied.
pub fn can_view_classification_label(label: &str, roles: &RoleSet) -> bool {
    match label.parse::<DocumentClassification>() {
        Ok(classification) => can_view_document(classification, roles),
        Err(_) => false,
    }
}

/// Whether the caller clears the publication-status gate.
///
/// Unpublished documents are visible to any OFFICIAL holder, not only the author.
pub fn can_view_status(status: ContentStatus, roles: &RoleSet) -> bool {
    match status {
        ContentStatus::Published => true,
        ContentStatus::Draft | ContentStatus::Archived => roles.contains(Role::Official),
    }
}

/// Both view gates ANDed together.
pub fn can_read_document(
    classification: DocumentClassification,
    status: ContentStatus,
    roles: &RoleSet,
) -> bool {
    can_view_document(classification, roles) && can_view_status(status, roles)
}

pub fn can_create_document(roles: &RoleSet) -> bool {
    roles.contains(Role::Official)
}

/// ADMIN edits anything; an OFFICIAL edits only what they authored.
pub fn can_edit_document(author_id: i64, roles: &RoleSet, caller_id: i64) -> bool {
    if roles.contains(Role::Admin) {
        return true;
    }
    roles.contains(Role::Official) && author_id == caller_id
}

pub fn can_delete_document(roles: &RoleSet) -> bool {
    roles.contains(Role::Admin)
}

pub fn can_create_member(roles: &RoleSet) -> bool {
    roles.contains(Role::Admin)
}

/// Member edit access.
///
/// A profile linked to an ADMIN account is editable only by its owner; that
/// check runs first and shuts out every role-based grant.
pub fn can_edit_member(
    owner_id: Option<i64>,
    linked_account_is_admin: bool,
    roles: &RoleSet,
    caller_id: i64,
) -> bool {
    let is_owner = owner_id == Some(caller_id);
    if linked_account_is_admin {
        return is_owner;
    }
    roles.contains(Role::Admin) || roles.contains(Role::Moderator) || is_owner
}

pub fn can_delete_member(linked_account_is_admin: bool, roles: &RoleSet) -> bool {
    roles.contains(Role::Admin) && !linked_account_is_admin
}

/// Access to the user-management surfaces (role assignment, account deletion, listings)
pub fn can_manage_users(roles: &RoleSet) -> bool {
    roles.contains(Role::Admin)
}

/// Listing accounts that have no member profile yet (member linking picker)
pub fn can_list_unlinked_users(roles: &RoleSet) -> bool {
    can_manage_users(roles)
}

/// Outcome of an account-level action check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "decision", rename_all = "snake_case")]
pub enum AccountDecision {
    Allowed,
    /// Caller targeted their own account
    SelfTarget,
    /// Caller does not hold ADMIN
    NotAdministrator,
    /// Target account holds ADMIN
    TargetIsAdministrator,
    /// Target still owns content
    OwnsContent(ContentSummary),
}

impl AccountDecision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, AccountDecision::Allowed)
    }
}

/// Facts about the account an action targets
#[derive(Debug, Clone, Copy)]
pub struct TargetAccount<'a> {
    pub id: i64,
    pub roles: &'a RoleSet,
    pub owned: &'a OwnedContent,
}

/// Role assignment: never on oneself, otherwise ADMIN only.
pub fn check_role_assignment(target_id: i64, caller_id: i64, caller_roles: &RoleSet) -> AccountDecision {
    if target_id == caller_id {
        return AccountDecision::SelfTarget;
    }
    if !caller_roles.contains(Role::Admin) {
        return AccountDecision::NotAdministrator;
    }
    AccountDecision::Allowed
}

/// Account deletion: the role-assignment rules, then the target must not be
/// an ADMIN and must not own any content.
pub fn check_account_delete(
    target: TargetAccount<'_>,
    caller_id: i64,
    caller_roles: &RoleSet,
) -> AccountDecision {
    let base = check_role_assignment(target.id, caller_id, caller_roles);
    if !base.is_allowed() {
        return base;
    }
    if target.roles.contains(Role::Admin) {
        return AccountDecision::TargetIsAdministrator;
    }
    if !target.owned.is_empty() {
        return AccountDecision::OwnsContent(target.owned.summary());
    }
    AccountDecision::Allowed
}
