use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    pub id: Uuid,
    /// External identity of the owning user.
    pub user_id: String,
    pub phone_number: String,
    pub location_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Profile {
    /// A profile is complete once it has a phone number and a delivery location.
    pub fn is_complete(&self) -> bool {
        !self.phone_number.trim().is_empty() && self.location_id.is_some()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProfileLocation {
    pub id: Uuid,
    pub longitude: f64,
    pub latitude: f64,
    pub address: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn completeness_needs_phone_and_location() {
        let mut profile = Profile {
            id: Uuid::new_v4(),
            user_id: "user-1".into(),
            phone_number: "".into(),
            location_id: Some(Uuid::new_v4()),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        assert!(!profile.is_complete());
        profile.phone_number = "+5491100000000".into();
        assert!(profile.is_complete());
        profile.location_id = None;
        assert!(!profile.is_complete());
    }
}
