use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::model::ids::UserId;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum UserError {
    #[error("google id cannot be empty")]
    EmptyGoogleId,

    #[error("invalid email address")]
    InvalidEmail,

    #[error("display name cannot be empty")]
    EmptyName,
}

/// Identity claims handed over by the sign-in provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserDraft {
    pub google_id: String,
    pub email: String,
    pub name: String,
}

impl UserDraft {
    /// Trim and check the claims.
    ///
    /// # Errors
    ///
    /// Returns `UserError` when a field is blank or the email has no `@`.
    pub fn validate(self) -> Result<NewUser, UserError> {
        let google_id = self.google_id.trim().to_owned();
        let email = self.email.trim().to_owned();
        let name = self.name.trim().to_owned();

        if google_id.is_empty() {
            return Err(UserError::EmptyGoogleId);
        }
        if !email.contains('@') || email.starts_with('@') || email.ends_with('@') {
            return Err(UserError::InvalidEmail);
        }
        if name.is_empty() {
            return Err(UserError::EmptyName);
        }

        Ok(NewUser {
            google_id,
            email,
            name,
        })
    }
}

/// Validated claims ready to be upserted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewUser {
    google_id: String,
    email: String,
    name: String,
}

impl NewUser {
    #[must_use]
    pub fn google_id(&self) -> &str {
        &self.google_id
    }

    #[must_use]
    pub fn email(&self) -> &str {
        &self.email
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn assign_id(self, id: UserId, created_at: DateTime<Utc>) -> User {
        User {
            id,
            google_id: self.google_id,
            email: self.email,
            name: self.name,
            created_at,
        }
    }
}

/// A stored user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub id: UserId,
    pub google_id: String,
    pub email: String,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

/// Who is using the app right now. Only decides whether a sign-in prompt is shown
/// and whether results are saved; it never changes how a session runs.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Identity {
    user: Option<User>,
}

impl Identity {
    #[must_use]
    pub fn anonymous() -> Self {
        Self { user: None }
    }

    #[must_use]
    pub fn signed_in(user: User) -> Self {
        Self { user: Some(user) }
    }

    #[must_use]
    pub fn is_signed_in(&self) -> bool {
        self.user.is_some()
    }

    #[must_use]
    pub fn user(&self) -> Option<&User> {
        self.user.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::fixed_now;

    fn draft(email: &str) -> UserDraft {
        UserDraft {
            google_id: " g-123 ".into(),
            email: email.into(),
            name: "Ada".into(),
        }
    }

    #[test]
    fn validate_trims_claims() {
        let user = draft("ada@example.com").validate().unwrap();
        assert_eq!(user.google_id(), "g-123");
        let stored = user.assign_id(UserId::new(4), fixed_now());
        assert_eq!(stored.id, UserId::new(4));
    }

    #[test]
    fn validate_rejects_bad_email() {
        assert_eq!(draft("nope").validate().unwrap_err(), UserError::InvalidEmail);
        assert_eq!(draft("@x").validate().unwrap_err(), UserError::InvalidEmail);
    }

    #[test]
    fn identity_reports_sign_in_state() {
        assert!(!Identity::anonymous().is_signed_in());
        let user = draft("ada@example.com")
            .validate()
            .unwrap()
            .assign_id(UserId::new(1), fixed_now());
        assert!(Identity::signed_in(user).is_signed_in());
    }
}
