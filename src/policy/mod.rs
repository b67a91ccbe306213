//! Access control core
//!
//! Pure decision functions consumed by the service, API and page layers:
//! - `access`: per-resource view/create/edit/delete decisions and account actions
//! - `lifecycle`: account state (pending / active / administrator) and page routing
//! - `confirmation`: typed confirmation for irreversible deletes
//!
//! Nothing in this module performs IO or holds state; callers pass in the
//! caller's roles and the facts they have already fetched.

pub mod access;
pub mod confirmation;
pub mod lifecycle;

pub use access::{
    can_create_document, can_create_member, can_delete_document, can_delete_member,
    can_edit_document, can_edit_member, can_list_unlinked_users, can_manage_users, can_read_document,
    can_view_classification_label, can_view_document, can_view_status, check_account_delete,
    check_role_assignment, AccountDecision, TargetAccount,
};
pub use confirmation::{
    confirmation_matches, ConfirmationError, ConfirmationFlow, ConfirmationState,
    ConfirmationTarget,
};
pub use lifecycle::{
    api_access_allowed, lifecycle_state, route_decision, LifecycleState, RouteDecision, Surface,
};
