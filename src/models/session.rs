//! Login session model

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Server-side session backing the `session` cookie / bearer token
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    /// Opaque token (uuid v4)
    pub id: String,
    pub user_id: i64,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl Session {
    /// Start a fresh session for `user_id` lasting `lifetime_days`
    pub fn start(user_id: i64, lifetime_days: i64) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            user_id,
            expires_at: now + Duration::days(lifetime_days),
            created_at: now,
        }
    }

    pub fn is_expired(&self) -> bool {
        self.expires_at < Utc::now()
    }

    /// Remaining lifetime in whole seconds, used for the cookie `Max-Age`
    pub fn max_age_seconds(&self) -> i64 {
        (self.expires_at - Utc::now()).num_seconds().max(0)
    }
}
