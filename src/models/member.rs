//! Member model
//!
//! Community directory profiles. A member may be linked to at most one user
//! account through `user_id`; the link is a plain identity reference.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Member profile
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Member {
    pub id: i64,
    /// URL slug derived from the name
    pub slug: String,
    pub name: String,
    /// Email address (unique among members)
    pub email: String,
    pub date_of_birth: Option<NaiveDate>,
    pub place_of_birth: Option<String>,
    pub bio: Option<String>,
    pub status: MemberStatus,
    pub mobile_numbers: Vec<String>,
    pub avatar_url: Option<String>,
    pub instagram: Option<String>,
    pub github: Option<String>,
    pub facebook: Option<String>,
    pub x: Option<String>,
    pub linkedin: Option<String>,
    pub title: Option<String>,
    pub organization: Option<String>,
    /// Linked user account, if any
    pub user_id: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Member plus the facts about its linked account the edit/delete policy needs
#[derive(Debug, Clone, Serialize)]
pub struct MemberWithAccount {
    #[serde(flatten)]
    pub member: Member,
    /// Whether the linked account holds ADMIN
    pub linked_account_is_admin: bool,
}

/// Descriptive member status. Not an access gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum MemberStatus {
    #[default]
    Active,
    Inactive,
    Banned,
}

impl MemberStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            MemberStatus::Active => "ACTIVE",
            MemberStatus::Inactive => "INACTIVE",
            MemberStatus::Banned => "BANNED",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            MemberStatus::Active => "Aktiv",
            MemberStatus::Inactive => "Deaktiv",
            MemberStatus::Banned => "Cəzalı",
        }
    }
}

impl fmt::Display for MemberStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MemberStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "ACTIVE" => Ok(MemberStatus::Active),
            "INACTIVE" => Ok(MemberStatus::Inactive),
            "BANNED" => Ok(MemberStatus::Banned),
            _ => Err(anyhow::anyhow!("Invalid member status: {}", s)),
        }
    }
}

/// Input for creating a member
#[derive(Debug, Clone, Default)]
pub struct CreateMemberInput {
    pub name: String,
    pub email: String,
    pub date_of_birth: Option<NaiveDate>,
    pub place_of_birth: Option<String>,
    pub bio: Option<String>,
    pub status: Option<MemberStatus>,
    pub mobile_numbers: Option<Vec<String>>,
    pub instagram: Option<String>,
    pub github: Option<String>,
    pub facebook: Option<String>,
    pub x: Option<String>,
    pub linkedin: Option<String>,
    pub title: Option<String>,
    pub organization: Option<String>,
    pub user_id: Option<i64>,
}

/// Input for updating a member.
///
/// `None` leaves a field unchanged; name and status are always supplied.
#[derive(Debug, Clone, Default)]
pub struct UpdateMemberInput {
    pub name: String,
    pub status: MemberStatus,
    pub email: Option<String>,
    pub date_of_birth: Option<NaiveDate>,
    pub place_of_birth: Option<String>,
    pub bio: Option<String>,
    pub avatar_url: Option<String>,
    pub mobile_numbers: Option<Vec<String>>,
    pub instagram: Option<String>,
    pub github: Option<String>,
    pub facebook: Option<String>,
    pub x: Option<String>,
    pub linkedin: Option<String>,
    pub title: Option<String>,
    pub organization: Option<String>,
}

/// Self-service edits a user may make to their own linked profile
#[derive(Debug, Clone, Default)]
pub struct MemberProfilePatch {
    pub bio: Option<String>,
    pub date_of_birth: Option<NaiveDate>,
    pub place_of_birth: Option<String>,
    pub title: Option<String>,
    pub organization: Option<String>,
    pub avatar_url: Option<String>,
    pub instagram: Option<String>,
    pub github: Option<String>,
    pub facebook: Option<String>,
    pub x: Option<String>,
    pub linkedin: Option<String>,
}

impl Member {
    /// Build an unsaved member from creation input. Status defaults to ACTIVE.
    pub fn new(input: CreateMemberInput, slug: String) -> Self {
        let now = Utc::now();
        Self {
            id: 0, // Will be set by the database
            slug,
            name: input.name,
            email: input.email,
            date_of_birth: input.date_of_birth,
            place_of_birth: input.place_of_birth,
            bio: input.bio,
            status: input.status.unwrap_or_default(),
            mobile_numbers: input.mobile_numbers.unwrap_or_default(),
            avatar_url: None,
            instagram: input.instagram,
            github: input.github,
            facebook: input.facebook,
            x: input.x,
            linkedin: input.linkedin,
            title: input.title,
            organization: input.organization,
            user_id: input.user_id,
            created_at: now,
            updated_at: now,
        }
    }

    /// Apply an update. Empty optional strings are treated as "unchanged".
    pub fn apply_update(&mut self, input: UpdateMemberInput) {
        self.name = input.name;
        self.status = input.status;
        if let Some(email) = non_empty(input.email) {
            self.email = email;
        }
        if input.date_of_birth.is_some() {
            self.date_of_birth = input.date_of_birth;
        }
        if let Some(numbers) = input.mobile_numbers {
            self.mobile_numbers = numbers;
        }
        merge(&mut self.place_of_birth, input.place_of_birth);
        merge(&mut self.bio, input.bio);
        merge(&mut self.avatar_url, input.avatar_url);
        merge(&mut self.instagram, input.instagram);
        merge(&mut self.github, input.github);
        merge(&mut self.facebook, input.facebook);
        merge(&mut self.x, input.x);
        merge(&mut self.linkedin, input.linkedin);
        merge(&mut self.title, input.title);
        merge(&mut self.organization, input.organization);
    }

    /// Apply a self-service profile patch with the same empty-means-unchanged rule
    pub fn apply_profile_patch(&mut self, patch: MemberProfilePatch) {
        if patch.date_of_birth.is_some() {
            self.date_of_birth = patch.date_of_birth;
        }
        merge(&mut self.bio, patch.bio);
        merge(&mut self.place_of_birth, patch.place_of_birth);
        merge(&mut self.title, patch.title);
        merge(&mut self.organization, patch.organization);
        merge(&mut self.avatar_url, patch.avatar_url);
        merge(&mut self.instagram, patch.instagram);
        merge(&mut self.github, patch.github);
        merge(&mut self.facebook, patch.facebook);
        merge(&mut self.x, patch.x);
        merge(&mut self.linkedin, patch.linkedin);
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}

fn merge(target: &mut Option<String>, value: Option<String>) {
    if let Some(v) = non_empty(value) {
        *target = Some(v);
    }
}

/// Filter for member listings
#[derive(Debug, Clone, Default)]
pub struct MemberFilter {
    pub status: Option<MemberStatus>,
    /// Case-insensitive match on name, title, organization or email
    pub search: Option<String>,
}
