//! Storage key layout.
//!
//! Every per-pet record lives under `petTracker_<kind>_<tagId>`, so switching
//! tags only changes which keys are read.

use std::fmt;

use crate::tag::TagId;

/// Prefix shared by all tracker keys.
pub const KEY_PREFIX: &str = "petTracker_";

/// Session-store key holding the pending OAuth anti-forgery state.
pub const OAUTH_STATE_KEY: &str = "patreon_oauth_state";

/// A key in the persistent store.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum StorageKey {
    /// The currently bound tag id.
    NfcTag,
    /// The cached auth session.
    Auth,
    /// The user profile for a tag.
    Profile(TagId),
    /// The contact record for a tag.
    Contact(TagId),
    /// The medical record for a tag.
    Medical(TagId),
    /// Location history for a tag.
    Location(TagId),
    /// Geofences for a tag.
    Geofences(TagId),
    /// Care reminders for a tag.
    Reminders(TagId),
}

impl StorageKey {
    /// Render the key string.
    #[must_use]
    pub fn as_key(&self) -> String {
        match self {
            Self::NfcTag => format!("{KEY_PREFIX}nfcTag"),
            Self::Auth => format!("{KEY_PREFIX}auth"),
            Self::Profile(tag) => format!("{KEY_PREFIX}profile_{tag}"),
            Self::Contact(tag) => format!("{KEY_PREFIX}contact_{tag}"),
            Self::Medical(tag) => format!("{KEY_PREFIX}medical_{tag}"),
            Self::Location(tag) => format!("{KEY_PREFIX}location_{tag}"),
            Self::Geofences(tag) => format!("{KEY_PREFIX}geofences_{tag}"),
            Self::Reminders(tag) => format!("{KEY_PREFIX}reminders_{tag}"),
        }
    }

    /// Every per-tag key for `tag`.
    #[must_use]
    pub fn all_for(tag: &TagId) -> [Self; 6] {
        [
            Self::Profile(tag.clone()),
            Self::Contact(tag.clone()),
            Self::Medical(tag.clone()),
            Self::Location(tag.clone()),
            Self::Geofences(tag.clone()),
            Self::Reminders(tag.clone()),
        ]
    }
}

impl fmt::Display for StorageKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.as_key())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_strings() {
        let tag = TagId::parse("Rex2024").unwrap();
        assert_eq!(StorageKey::NfcTag.as_key(), "petTracker_nfcTag");
        assert_eq!(StorageKey::Auth.as_key(), "petTracker_auth");
        assert_eq!(
            StorageKey::Contact(tag.clone()).as_key(),
            "petTracker_contact_Rex2024"
        );
        assert_eq!(
            StorageKey::Medical(tag.clone()).as_key(),
            "petTracker_medical_Rex2024"
        );
        assert_eq!(
            StorageKey::Location(tag.clone()).as_key(),
            "petTracker_location_Rex2024"
        );
        assert_eq!(
            StorageKey::Geofences(tag.clone()).as_key(),
            "petTracker_geofences_Rex2024"
        );
        assert_eq!(
            StorageKey::Reminders(tag.clone()).to_string(),
            "petTracker_reminders_Rex2024"
        );
        assert_eq!(
            StorageKey::Profile(tag).to_string(),
            "petTracker_profile_Rex2024"
        );
    }

    #[test]
    fn test_keys_are_namespaced_by_tag() {
        let a = TagId::parse("Rex2024").unwrap();
        let b = TagId::parse("Max2024").unwrap();
        let keys_a: Vec<String> = StorageKey::all_for(&a).iter().map(StorageKey::as_key).collect();
        let keys_b: Vec<String> = StorageKey::all_for(&b).iter().map(StorageKey::as_key).collect();
        for key in &keys_a {
            assert!(key.starts_with(KEY_PREFIX));
            assert!(key.ends_with("_Rex2024"));
            assert!(!keys_b.contains(key));
        }
    }
}
