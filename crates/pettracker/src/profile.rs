//! The per-tag user profile.
//!
//! A profile is created the first time a tag id is resolved and is never
//! deleted. Page modules own their own records in storage; the profile keeps
//! the shell's in-memory copy of them so that pages can read each other's
//! data (the home dashboard shows the pet name from the contact page, the
//! medical report shows the owner's phone).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::pages::contact::ContactRecord;
use crate::pages::location::LocationState;
use crate::pages::medical::MedicalRecord;
use crate::tag::TagId;

/// Notification and tracking preferences.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Preferences {
    /// Send notifications for this tag.
    pub notifications: bool,
    /// Accept location updates for this tag.
    pub tracking_enabled: bool,
}

impl Default for Preferences {
    fn default() -> Self {
        Self {
            notifications: true,
            tracking_enabled: true,
        }
    }
}

/// Everything known about the pet bound to one tag.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    /// The tag this profile belongs to.
    pub tag_id: TagId,
    /// When the tag was first resolved.
    pub created_at: DateTime<Utc>,
    /// Pet name, mirrored from the contact record.
    #[serde(default)]
    pub pet_name: String,
    /// Owner name, mirrored from the contact record.
    #[serde(default)]
    pub owner_name: String,
    /// Contact record.
    #[serde(default)]
    pub contact_info: ContactRecord,
    /// Medical record.
    #[serde(default)]
    pub medical_info: MedicalRecord,
    /// Last known location and history.
    #[serde(default)]
    pub location: LocationState,
    /// Preferences.
    #[serde(default)]
    pub preferences: Preferences,
}

impl UserProfile {
    /// Create an empty profile for a freshly registered tag.
    #[must_use]
    pub fn new(tag_id: TagId, created_at: DateTime<Utc>) -> Self {
        Self {
            tag_id,
            created_at,
            pet_name: String::new(),
            owner_name: String::new(),
            contact_info: ContactRecord::default(),
            medical_info: MedicalRecord::default(),
            location: LocationState::default(),
            preferences: Preferences::default(),
        }
    }

    /// The pet's display name, or `"Pet"` when none has been saved.
    #[must_use]
    pub fn display_name(&self) -> &str {
        if self.pet_name.is_empty() {
            "Pet"
        } else {
            &self.pet_name
        }
    }

    /// Apply a change produced by a page module or the shell.
    pub fn apply(&mut self, patch: ProfilePatch) {
        match patch {
            ProfilePatch::Contact(contact) => {
                self.pet_name.clone_from(&contact.pet_name);
                self.owner_name.clone_from(&contact.owner_name);
                self.contact_info = contact;
            }
            ProfilePatch::Medical(medical) => self.medical_info = medical,
            ProfilePatch::Location(location) => self.location = location,
        }
    }
}

/// A change to the shell-owned profile.
///
/// Pages only see the profile read-only; they hand one of these back and the
/// shell applies it.
#[derive(Debug, Clone, PartialEq)]
pub enum ProfilePatch {
    /// The contact record was saved.
    Contact(ContactRecord),
    /// The medical record was saved.
    Medical(MedicalRecord),
    /// The location history changed.
    Location(LocationState),
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tag() -> TagId {
        TagId::parse("Rex2024").unwrap()
    }

    #[test]
    fn test_new_profile_is_empty() {
        let profile = UserProfile::new(tag(), Utc::now());
        assert!(profile.pet_name.is_empty());
        assert!(profile.location.history.is_empty());
        assert!(profile.preferences.notifications);
        assert_eq!(profile.display_name(), "Pet");
    }

    #[test]
    fn test_contact_patch_mirrors_names() {
        let mut profile = UserProfile::new(tag(), Utc::now());
        let contact = ContactRecord {
            pet_name: "Rex".to_string(),
            owner_name: "Sam".to_string(),
            ..ContactRecord::default()
        };

        profile.apply(ProfilePatch::Contact(contact.clone()));

        assert_eq!(profile.pet_name, "Rex");
        assert_eq!(profile.owner_name, "Sam");
        assert_eq!(profile.contact_info, contact);
        assert_eq!(profile.display_name(), "Rex");
    }

    #[test]
    fn test_serialized_field_names() {
        let profile = UserProfile::new(tag(), Utc::now());
        let json = serde_json::to_value(&profile).unwrap();
        assert!(json.get("tagId").is_some());
        assert!(json.get("createdAt").is_some());
        assert!(json.get("contactInfo").is_some());
        assert!(json["location"].get("lastKnown").is_some());
        assert_eq!(json["preferences"]["trackingEnabled"], true);
    }

    #[test]
    fn test_deserialize_minimal_profile() {
        let json = r#"{"tagId": "Rex2024", "createdAt": "2024-01-15T10:00:00Z"}"#;
        let profile: UserProfile = serde_json::from_str(json).unwrap();
        assert_eq!(profile.tag_id, tag());
        assert!(profile.contact_info.pet_name.is_empty());
    }
}
