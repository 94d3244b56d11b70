use chrono::{DateTime, Utc};
use rand::{distributions::Alphanumeric, Rng};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

const SECRET_LENGTH: usize = 32;

/// Single-use secret that lets an authenticated user attach themselves to an
/// unassigned order. Tokens are never deleted; expiry is checked on use.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClaimToken {
    pub id: Uuid,
    pub order_id: Uuid,
    pub token: String,
    pub phone_number: Option<String>,
    pub claimed_at: Option<DateTime<Utc>>,
    pub claimed_by_user_id: Option<String>,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl ClaimToken {
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }

    pub fn is_claimed(&self) -> bool {
        self.claimed_at.is_some()
    }

    pub fn is_claimed_by(&self, user_id: &str) -> bool {
        self.claimed_by_user_id.as_deref() == Some(user_id)
    }

    /// Generates an unguessable alphanumeric claim secret.
    pub fn generate_secret() -> String {
        rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(SECRET_LENGTH)
            .map(char::from)
            .collect()
    }
}

#[derive(Debug, Clone)]
pub struct NewClaimToken {
    pub order_id: Uuid,
    pub token: String,
    pub phone_number: Option<String>,
    pub expires_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn secrets_are_long_and_distinct() {
        let a = ClaimToken::generate_secret();
        let b = ClaimToken::generate_secret();
        assert_eq!(a.len(), SECRET_LENGTH);
        assert!(a.chars().all(|c| c.is_ascii_alphanumeric()));
        assert_ne!(a, b);
    }

    #[test]
    fn expiry_is_strictly_after_deadline() {
        let now = Utc::now();
        let token = ClaimToken {
            id: Uuid::new_v4(),
            order_id: Uuid::new_v4(),
            token: "t".into(),
            phone_number: None,
            claimed_at: None,
            claimed_by_user_id: None,
            expires_at: now,
            created_at: now - Duration::hours(1),
        };
        assert!(!token.is_expired_at(now));
        assert!(token.is_expired_at(now + Duration::seconds(1)));
    }
}
