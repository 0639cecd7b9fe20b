//! Short link model
//!
//! A short link maps a slug to a destination URL. It only resolves while it
//! is active and not past `expires_at`; `clicks` only ever grows.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShortUrl {
    pub id: i64,
    pub slug: String,
    pub destination: String,
    pub title: Option<String>,
    pub clicks: i64,
    pub is_active: bool,
    pub expires_at: Option<DateTime<Utc>>,
    pub og_title: Option<String>,
    pub og_description: Option<String>,
    pub og_image: Option<String>,
    pub created_by: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Whether a stored link may be followed right now
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LinkState {
    Active,
    Inactive,
    Expired,
}

impl ShortUrl {
    /// Deactivation wins over expiry; a link expiring exactly `now` is expired
    pub fn state_at(&self, now: DateTime<Utc>) -> LinkState {
        if !self.is_active {
            LinkState::Inactive
        } else if self.expires_at.is_some_and(|at| at <= now) {
            LinkState::Expired
        } else {
            LinkState::Active
        }
    }

    pub fn is_followable_at(&self, now: DateTime<Utc>) -> bool {
        self.state_at(now) == LinkState::Active
    }

    /// Stored Open Graph data, if any was captured
    pub fn og_metadata(&self) -> Option<OgMetadata> {
        if self.og_title.is_none() && self.og_description.is_none() && self.og_image.is_none() {
            return None;
        }
        Some(OgMetadata {
            title: self.og_title.clone(),
            description: self.og_description.clone(),
            image: self.og_image.clone(),
            site_name: None,
        })
    }
}

/// Link-preview data scraped from a destination page
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OgMetadata {
    pub title: Option<String>,
    pub description: Option<String>,
    pub image: Option<String>,
    pub site_name: Option<String>,
}

impl OgMetadata {
    pub fn is_empty(&self) -> bool {
        self.title.is_none() && self.description.is_none() && self.image.is_none()
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CreateShortUrlInput {
    pub destination: String,
    /// Random when absent
    #[serde(default)]
    pub slug: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub is_active: Option<bool>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateShortUrlInput {
    pub destination: Option<String>,
    pub title: Option<String>,
    pub is_active: Option<bool>,
    /// `Some(None)` clears the expiry
    #[serde(default, with = "double_option")]
    pub expires_at: Option<Option<DateTime<Utc>>>,
}

/// Distinguishes an absent field from an explicit `null`
mod double_option {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<T: Serialize, S: Serializer>(
        value: &Option<Option<T>>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match value {
            Some(inner) => inner.serialize(serializer),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, T: Deserialize<'de>, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<Option<T>>, D::Error> {
        Option::<T>::deserialize(deserializer).map(Some)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn link(is_active: bool, expires_at: Option<DateTime<Utc>>) -> ShortUrl {
        let now = Utc::now();
        ShortUrl {
            id: 1,
            slug: "abc".to_string(),
            destination: "https://example.com".to_string(),
            title: None,
            clicks: 0,
            is_active,
            expires_at,
            og_title: None,
            og_description: None,
            og_image: None,
            created_by: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_state_at() {
        let now = Utc::now();
        assert_eq!(link(true, None).state_at(now), LinkState::Active);
        assert_eq!(link(false, None).state_at(now), LinkState::Inactive);
        assert_eq!(
            link(true, Some(now - Duration::seconds(1))).state_at(now),
            LinkState::Expired
        );
        assert_eq!(link(true, Some(now)).state_at(now), LinkState::Expired);
        assert_eq!(
            link(true, Some(now + Duration::hours(1))).state_at(now),
            LinkState::Active
        );
        assert_eq!(
            link(false, Some(now - Duration::hours(1))).state_at(now),
            LinkState::Inactive
        );
    }

    #[test]
    fn test_update_input_distinguishes_null_expiry() {
        let absent: UpdateShortUrlInput = serde_json::from_str("{}").unwrap();
        assert!(absent.expires_at.is_none());

        let cleared: UpdateShortUrlInput =
            serde_json::from_str(r#"{"expires_at": null}"#).unwrap();
        assert_eq!(cleared.expires_at, Some(None));

        let set: UpdateShortUrlInput =
            serde_json::from_str(r#"{"expires_at": "2030-01-01T00:00:00Z"}"#).unwrap();
        assert!(matches!(set.expires_at, Some(Some(_))));
    }
}
