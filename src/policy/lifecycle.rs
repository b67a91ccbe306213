//! Account lifecycle and page routing decisions.
//!
//! An account's state is a function of its role set alone. The routing
//! decision is recomputed on every request from the caller's current roles.

use serde::Serialize;

use crate::models::{Role, RoleSet};

/// Account state derived from the role set
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleState {
    /// No roles yet; waiting for an administrator
    Pending,
    /// At least one role, no ADMIN
    Active,
    /// Holds ADMIN
    Administrator,
}

pub fn lifecycle_state(roles: &RoleSet) -> LifecycleState {
    if roles.is_empty() {
        LifecycleState::Pending
    } else if roles.contains(Role::Admin) {
        LifecycleState::Administrator
    } else {
        LifecycleState::Active
    }
}

/// Page groups the routing decision distinguishes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Surface {
    SignIn,
    Register,
    /// The "awaiting approval" page
    Pending,
    SignOut,
    UserManagement,
    Other,
}

pub const SIGN_IN_PATH: &str = "/login";
pub const REGISTER_PATH: &str = "/register";
pub const PENDING_PATH: &str = "/pending-approval";
pub const SIGN_OUT_PATH: &str = "/logout";
pub const HOME_PATH: &str = "/";

impl Surface {
    pub fn from_path(path: &str) -> Self {
        let path = path.trim_end_matches('/');
        match path {
            SIGN_IN_PATH => Surface::SignIn,
            REGISTER_PATH => Surface::Register,
            PENDING_PATH => Surface::Pending,
            SIGN_OUT_PATH => Surface::SignOut,
            p if p == "/admin" || p.starts_with("/admin/") => Surface::UserManagement,
            _ => Surface::Other,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteDecision {
    Allow,
    RedirectToSignIn,
    RedirectToPending,
    RedirectToHome,
}

impl RouteDecision {
    /// Location for redirecting decisions
    pub fn location(&self) -> Option<&'static str> {
        match self {
            RouteDecision::Allow => None,
            RouteDecision::RedirectToSignIn => Some(SIGN_IN_PATH),
            RouteDecision::RedirectToPending => Some(PENDING_PATH),
            RouteDecision::RedirectToHome => Some(HOME_PATH),
        }
    }
}

/// Decide what happens to a page request.
///
/// `caller` is `None` for unauthenticated requests.
pub fn route_decision(caller: Option<&RoleSet>, surface: Surface) -> RouteDecision {
    let state = caller.map(lifecycle_state);

    match (surface, state) {
        (Surface::SignIn | Surface::Register, None) => RouteDecision::Allow,
        (Surface::SignIn | Surface::Register, Some(LifecycleState::Pending)) => {
            RouteDecision::RedirectToPending
        }
        (Surface::SignIn | Surface::Register, Some(_)) => RouteDecision::RedirectToHome,

        (Surface::Pending, None) => RouteDecision::RedirectToSignIn,
        (Surface::Pending, Some(LifecycleState::Pending)) => RouteDecision::Allow,
        (Surface::Pending, Some(_)) => RouteDecision::RedirectToHome,

        (Surface::SignOut, None) => RouteDecision::RedirectToSignIn,
        (Surface::SignOut, Some(_)) => RouteDecision::Allow,

        (Surface::UserManagement | Surface::Other, None) => RouteDecision::RedirectToSignIn,
        (Surface::UserManagement | Surface::Other, Some(LifecycleState::Pending)) => {
            RouteDecision::RedirectToPending
        }
        (Surface::UserManagement, Some(LifecycleState::Active)) => RouteDecision::RedirectToHome,
        (Surface::UserManagement | Surface::Other, Some(_)) => RouteDecision::Allow,
    }
}

/// API form of the lifecycle gate: pending accounts only reach their own
/// session and profile endpoints.
pub fn api_access_allowed(roles: &RoleSet) -> bool {
    lifecycle_state(roles) != LifecycleState::Pending
}
