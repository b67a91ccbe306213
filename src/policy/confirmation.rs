//! Typed-confirmation flow for irreversible deletes.
//!
//! The caller must type an immutable field of the target (document title,
//! member name, account email). Matching is exact: no trimming, no case folding.

use std::fmt;

/// Which field the typed value is checked against
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfirmationTarget {
    DocumentTitle,
    MemberName,
    AccountEmail,
}

impl ConfirmationTarget {
    pub fn mismatch_message(&self) -> &'static str {
        match self {
            ConfirmationTarget::DocumentTitle => {
                "Title confirmation does not match. Please type the exact document title to confirm deletion."
            }
            ConfirmationTarget::MemberName => {
                "Name confirmation does not match. Please type the exact member name to confirm deletion."
            }
            ConfirmationTarget::AccountEmail => {
                "Email confirmation does not match. Please type the exact user email to confirm deletion."
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfirmationError {
    #[error("{}", .0.mismatch_message())]
    Mismatch(ConfirmationTarget),
    #[error("Confirmation is not awaiting input")]
    NotAwaiting,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfirmationState {
    Idle,
    AwaitingTypedConfirmation {
        /// Set after a mismatched attempt
        last_error: Option<ConfirmationTarget>,
    },
    Executing,
    Done,
}

/// Exact match; a missing or empty value never matches.
pub fn confirmation_matches(expected: &str, typed: Option<&str>) -> bool {
    match typed {
        Some(value) if !value.is_empty() => value == expected,
        _ => false,
    }
}

/// `Idle -> AwaitingTypedConfirmation -> Executing -> Done`, where a mismatch
/// keeps the flow awaiting input.
pub struct ConfirmationFlow {
    target: ConfirmationTarget,
    expected: String,
    state: ConfirmationState,
}

impl ConfirmationFlow {
    pub fn new(target: ConfirmationTarget, expected: impl Into<String>) -> Self {
        Self {
            target,
            expected: expected.into(),
            state: ConfirmationState::Idle,
        }
    }

    pub fn state(&self) -> &ConfirmationState {
        &self.state
    }

    /// Open the prompt
    pub fn begin(&mut self) {
        if self.state == ConfirmationState::Idle {
            self.state = ConfirmationState::AwaitingTypedConfirmation { last_error: None };
        }
    }

    /// Check a typed value; on success the flow moves to `Executing`.
    pub fn submit(&mut self, typed: Option<&str>) -> Result<(), ConfirmationError> {
        if !matches!(self.state, ConfirmationState::AwaitingTypedConfirmation { .. }) {
            return Err(ConfirmationError::NotAwaiting);
        }
        if confirmation_matches(&self.expected, typed) {
            self.state = ConfirmationState::Executing;
            Ok(())
        } else {
            self.state = ConfirmationState::AwaitingTypedConfirmation {
                last_error: Some(self.target),
            };
            Err(ConfirmationError::Mismatch(self.target))
        }
    }

    /// Mark the guarded action as finished
    pub fn complete(&mut self) {
        if self.state == ConfirmationState::Executing {
            self.state = ConfirmationState::Done;
        }
    }

    /// Close the prompt without acting
    pub fn cancel(&mut self) {
        if self.state != ConfirmationState::Done {
            self.state = ConfirmationState::Idle;
        }
    }
}

impl fmt::Debug for ConfirmationFlow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConfirmationFlow")
            .field("target", &self.target)
            .field("state", &self.state)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exact_match_only() {
        assert!(confirmation_matches("Charter of 2024", Some("Charter of 2024")));
        assert!(!confirmation_matches("Charter of 2024", Some("charter of 2024")));
        assert!(!confirmation_matches("Charter of 2024", Some("Charter of 2024 ")));
        assert!(!confirmation_matches("Charter of 2024", None));
        assert!(!confirmation_matches("", Some("")));
    }

    #[test]
    fn test_happy_path() {
        let mut flow = ConfirmationFlow::new(ConfirmationTarget::MemberName, "Kamran Aliyev");
        assert_eq!(flow.state(), &ConfirmationState::Idle);

        flow.begin();
        assert!(flow.submit(Some("Kamran Aliyev")).is_ok());
        assert_eq!(flow.state(), &ConfirmationState::Executing);

        flow.complete();
        assert_eq!(flow.state(), &ConfirmationState::Done);
    }

    #[test]
    fn test_mismatch_stays_awaiting_and_can_retry() {
        let mut flow = ConfirmationFlow::new(ConfirmationTarget::AccountEmail, "a@example.com");
        flow.begin();

        let err = flow.submit(Some("A@example.com")).unwrap_err();
        assert_eq!(err, ConfirmationError::Mismatch(ConfirmationTarget::AccountEmail));
        assert!(err.to_string().contains("Email confirmation does not match"));
        assert_eq!(
            flow.state(),
            &ConfirmationState::AwaitingTypedConfirmation {
                last_error: Some(ConfirmationTarget::AccountEmail)
            }
        );

        assert!(flow.submit(Some("a@example.com")).is_ok());
        assert_eq!(flow.state(), &ConfirmationState::Executing);
    }

    #[test]
    fn test_submit_requires_open_prompt() {
        let mut flow = ConfirmationFlow::new(ConfirmationTarget::DocumentTitle, "Decree");
        assert_eq!(flow.submit(Some("Decree")), Err(ConfirmationError::NotAwaiting));

        flow.begin();
        flow.cancel();
        assert_eq!(flow.state(), &ConfirmationState::Idle);
    }
}
