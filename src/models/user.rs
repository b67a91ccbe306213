//! User model
//!
//! Defines the account entity together with the role vocabulary that every
//! access decision in the portal is made over.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

/// User account.
///
/// An account with an empty role set is awaiting administrator approval.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    /// Unique identifier
    pub id: i64,
    /// Display name
    pub name: String,
    /// Email address (unique)
    pub email: String,
    /// Password hash (argon2)
    #[serde(skip_serializing, default)]
    pub password_hash: String,
    /// Assigned roles
    pub roles: RoleSet,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
    /// Last update timestamp
    pub updated_at: DateTime<Utc>,
}

impl User {
    /// Create a new, unapproved user.
    ///
    /// The password must already be hashed with `services::password::hash_password()`.
    pub fn new(name: String, email: String, password_hash: String) -> Self {
        let now = Utc::now();
        Self {
            id: 0, // Will be set by the database
            name,
            email,
            password_hash,
            roles: RoleSet::empty(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Check if the user holds the ADMIN role
    pub fn is_admin(&self) -> bool {
        self.roles.contains(Role::Admin)
    }

    /// Check if the account is still waiting for a role assignment
    pub fn is_pending(&self) -> bool {
        self.roles.is_empty()
    }
}

/// Permission flag an account may hold zero or more of.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Role {
    User,
    Editor,
    Journalist,
    Official,
    Moderator,
    Admin,
}

impl Role {
    /// Every role, in declaration order
    pub const ALL: [Role; 6] = [
        Role::User,
        Role::Editor,
        Role::Journalist,
        Role::Official,
        Role::Moderator,
        Role::Admin,
    ];

    /// Wire name of the role
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "USER",
            Role::Editor => "EDITOR",
            Role::Journalist => "JOURNALIST",
            Role::Official => "OFFICIAL",
            Role::Moderator => "MODERATOR",
            Role::Admin => "ADMIN",
        }
    }

    /// Exact-match parse of a wire name; no trimming or case folding
    pub fn from_wire(name: &str) -> Option<Role> {
        Role::ALL.into_iter().find(|role| role.as_str() == name)
    }

    /// Human readable label shown in pages and notification emails
    pub fn display_name(&self) -> &'static str {
        match self {
            Role::User => "İstifadəçi",
            Role::Editor => "Redaktor",
            Role::Journalist => "Jurnalist",
            Role::Official => "İcma Rəsmisi",
            Role::Moderator => "Moderator",
            Role::Admin => "Administrator",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "USER" => Ok(Role::User),
            "EDITOR" => Ok(Role::Editor),
            "JOURNALIST" => Ok(Role::Journalist),
            "OFFICIAL" => Ok(Role::Official),
            "MODERATOR" => Ok(Role::Moderator),
            "ADMIN" => Ok(Role::Admin),
            _ => Err(anyhow::anyhow!("Invalid role: {}", s)),
        }
    }
}

/// The set of roles held by one account.
///
/// Serialized as a JSON array of role names and stored as a
/// comma-separated list.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoleSet(BTreeSet<Role>);

impl RoleSet {
    pub fn empty() -> Self {
        Self(BTreeSet::new())
    }

    pub fn contains(&self, role: Role) -> bool {
        self.0.contains(&role)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn insert(&mut self, role: Role) -> bool {
        self.0.insert(role)
    }

    pub fn iter(&self) -> impl Iterator<Item = Role> + '_ {
        self.0.iter().copied()
    }

    /// Comma-separated display labels, e.g. for notification emails
    pub fn display_names(&self) -> String {
        self.iter()
            .map(|r| r.display_name())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

impl FromIterator<Role> for RoleSet {
    fn from_iter<I: IntoIterator<Item = Role>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl<const N: usize> From<[Role; N]> for RoleSet {
    fn from(roles: [Role; N]) -> Self {
        roles.into_iter().collect()
    }
}

impl fmt::Display for RoleSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = self.iter().map(|r| r.as_str()).collect();
        f.write_str(&names.join(","))
    }
}

impl FromStr for RoleSet {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.split(',')
            .map(str::trim)
            .filter(|part| !part.is_empty())
            .map(Role::from_str)
            .collect()
    }
}

/// Input for registering a new account
#[derive(Debug, Clone)]
pub struct CreateUserInput {
    pub name: String,
    pub email: String,
    /// Plaintext password (will be hashed)
    pub password: String,
}

/// Role criterion for the administrator user listing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoleFilter {
    /// Accounts holding this role
    Has(Role),
    /// Accounts with an empty role set
    NoRoles,
}

impl RoleFilter {
    pub fn matches(&self, roles: &RoleSet) -> bool {
        match self {
            RoleFilter::Has(role) => roles.contains(*role),
            RoleFilter::NoRoles => roles.is_empty(),
        }
    }
}

impl FromStr for RoleFilter {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.trim().eq_ignore_ascii_case("none") {
            Ok(RoleFilter::NoRoles)
        } else {
            Role::from_str(s).map(RoleFilter::Has)
        }
    }
}

/// Administrator user listing criteria
#[derive(Debug, Clone, Default)]
pub struct UserFilter {
    /// Case-insensitive match on name or email
    pub search: Option<String>,
    pub role: Option<RoleFilter>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_filter() {
        assert_eq!(RoleFilter::from_str("none").unwrap(), RoleFilter::NoRoles);
        assert_eq!(RoleFilter::from_str("official").unwrap(), RoleFilter::Has(Role::Official));
        assert!(RoleFilter::from_str("everyone").is_err());

        assert!(RoleFilter::NoRoles.matches(&RoleSet::empty()));
        assert!(!RoleFilter::NoRoles.matches(&RoleSet::from([Role::User])));
        assert!(RoleFilter::Has(Role::Admin).matches(&RoleSet::from([Role::User, Role::Admin])));
    }

    #[test]
    fn test_user_new_is_pending() {
        let user = User::new(
            "Aysel".to_string(),
            "aysel@example.com".to_string(),
            "hash".to_string(),
        );

        assert_eq!(user.id, 0);
        assert!(user.is_pending());
        assert!(!user.is_admin());
    }

    #[test]
    fn test_role_from_str_case_insensitive() {
        assert_eq!(Role::from_str("admin").unwrap(), Role::Admin);
        assert_eq!(Role::from_str("Official").unwrap(), Role::Official);
        assert_eq!(Role::from_str(" MODERATOR ").unwrap(), Role::Moderator);
        assert!(Role::from_str("superuser").is_err());
    }

    #[test]
    fn test_role_from_wire_is_exact() {
        assert_eq!(Role::from_wire("ADMIN"), Some(Role::Admin));
        assert_eq!(Role::from_wire("OFFICIAL"), Some(Role::Official));
        assert_eq!(Role::from_wire("admin"), None);
        assert_eq!(Role::from_wire(" ADMIN "), None);
        assert_eq!(Role::from_wire(""), None);
    }

    #[test]
    fn test_role_set_storage_format() {
        let roles = RoleSet::from([Role::Official, Role::Admin]);
        assert_eq!(roles.to_string(), "OFFICIAL,ADMIN");

        let parsed = RoleSet::from_str("OFFICIAL,ADMIN").unwrap();
        assert_eq!(parsed, roles);
    }

    #[test]
    fn test_role_set_empty_string_is_pending() {
        let parsed = RoleSet::from_str("").unwrap();
        assert!(parsed.is_empty());
        assert_eq!(RoleSet::empty().to_string(), "");
    }

    #[test]
    fn test_role_set_rejects_unknown_role() {
        assert!(RoleSet::from_str("USER,ROOT").is_err());
    }

    #[test]
    fn test_role_set_json_is_array() {
        let roles = RoleSet::from([Role::User, Role::Editor]);
        let json = serde_json::to_value(&roles).unwrap();
        assert_eq!(json, serde_json::json!(["USER", "EDITOR"]));

        let back: RoleSet = serde_json::from_value(serde_json::json!([])).unwrap();
        assert!(back.is_empty());
    }

    #[test]
    fn test_password_hash_not_serialized() {
        let user = User::new("A".into(), "a@example.com".into(), "secret-hash".into());
        let json = serde_json::to_string(&user).unwrap();
        assert!(!json.contains("secret-hash"));
    }
}
