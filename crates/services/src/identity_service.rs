use std::sync::Arc;

use exam_core::model::{Identity, UserDraft};
use storage::repository::UserRepository;
use tracing::info;

use crate::Clock;
use crate::error::IdentityError;

#[derive(Clone)]
pub struct IdentityService {
    clock: Clock,
    users: Arc<dyn UserRepository>,
}

impl IdentityService {
    #[must_use]
    pub fn new(clock: Clock, users: Arc<dyn UserRepository>) -> Self {
        Self { clock, users }
    }

    /// Validate the profile and upsert it by google id.
    ///
    /// # Errors
    ///
    /// Returns `IdentityError` if validation fails or persistence fails.
    pub async fn sign_in(&self, draft: UserDraft) -> Result<Identity, IdentityError> {
        let user = draft.validate()?;
        let stored = self.users.upsert_user(&user, self.clock.now()).await?;
        info!(user_id = %stored.id, "user signed in");
        Ok(Identity::signed_in(stored))
    }

    /// Look up a previously signed-in user without touching their profile.
    ///
    /// # Errors
    ///
    /// Returns `IdentityError` on storage failures.
    pub async fn restore(&self, google_id: &str) -> Result<Identity, IdentityError> {
        let user = self.users.find_user_by_google_id(google_id).await?;
        Ok(user.map_or_else(Identity::anonymous, Identity::signed_in))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use exam_core::model::UserError;
    use exam_core::time::fixed_clock;
    use storage::repository::InMemoryRepository;

    fn service() -> IdentityService {
        IdentityService::new(fixed_clock(), Arc::new(InMemoryRepository::new()))
    }

    fn draft(email: &str) -> UserDraft {
        UserDraft {
            google_id: "g-9".into(),
            email: email.into(),
            name: "Noor".into(),
        }
    }

    #[tokio::test]
    async fn sign_in_upserts_and_restores() {
        let service = service();
        assert!(!service.restore("g-9").await.unwrap().is_signed_in());

        let first = service.sign_in(draft("a@example.com")).await.unwrap();
        let second = service.sign_in(draft("b@example.com")).await.unwrap();

        let (first, second) = (first.user().unwrap(), second.user().unwrap());
        assert_eq!(first.id, second.id);
        assert_eq!(second.email, "b@example.com");

        let restored = service.restore("g-9").await.unwrap();
        assert_eq!(restored.user(), Some(second));
    }

    #[tokio::test]
    async fn invalid_profile_is_rejected() {
        let err = service().sign_in(draft("not-an-email")).await.unwrap_err();
        assert!(matches!(err, IdentityError::User(UserError::InvalidEmail)));
    }
}
