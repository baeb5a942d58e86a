// 👤 User Entity - the identity principal
//
// Password credentials never live on this struct; they stay in the
// identity store and are only read during sign-in.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    /// Stable identity (UUID)
    pub id: String,

    /// Display name (3–65 characters)
    pub name: String,

    /// Unique, normalized to lower case
    pub email: String,

    /// One of the bundled profile images
    pub profile_image: String,

    /// None until the confirmation token is redeemed
    pub confirmed_at: Option<DateTime<Utc>>,

    pub created_at: DateTime<Utc>,
}

impl User {
    pub fn is_confirmed(&self) -> bool {
        self.confirmed_at.is_some()
    }
}

/// The actor behind a request.
///
/// Anonymous stands in for "no session": a non-persisted user that owns
/// nothing and may do nothing.
#[derive(Debug, Clone, PartialEq)]
pub enum Principal {
    Anonymous,
    User(User),
}

impl Principal {
    pub fn is_persisted(&self) -> bool {
        matches!(self, Principal::User(_))
    }

    pub fn id(&self) -> Option<&str> {
        match self {
            Principal::Anonymous => None,
            Principal::User(user) => Some(&user.id),
        }
    }

    pub fn user(&self) -> Option<&User> {
        match self {
            Principal::Anonymous => None,
            Principal::User(user) => Some(user),
        }
    }

    /// The persisted user, or `Unauthenticated`
    pub fn require_user(&self) -> crate::Result<&User> {
        self.user().ok_or(crate::AppError::Unauthenticated)
    }
}

impl From<User> for Principal {
    fn from(user: User) -> Self {
        Principal::User(user)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_user() -> User {
        User {
            id: "user-1".to_string(),
            name: "Ana".to_string(),
            email: "ana@example.com".to_string(),
            profile_image: "avatar-1.png".to_string(),
            confirmed_at: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_anonymous_has_no_identity() {
        let principal = Principal::Anonymous;
        assert!(!principal.is_persisted());
        assert_eq!(principal.id(), None);
        assert!(matches!(
            principal.require_user(),
            Err(crate::AppError::Unauthenticated)
        ));
    }

    #[test]
    fn test_user_principal() {
        let principal = Principal::from(sample_user());
        assert!(principal.is_persisted());
        assert_eq!(principal.id(), Some("user-1"));
        assert_eq!(principal.require_user().unwrap().name, "Ana");
    }

    #[test]
    fn test_confirmation_state() {
        let mut user = sample_user();
        assert!(!user.is_confirmed());
        user.confirmed_at = Some(Utc::now());
        assert!(user.is_confirmed());
    }
}
