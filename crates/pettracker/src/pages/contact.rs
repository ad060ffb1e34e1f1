//! Contact page: owner, phone and emergency contact details.

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::validation::{FieldRule, FieldStatus, FormErrors, FormInput, RuleSet};
use super::PageContext;
use crate::error::{Error, Result};
use crate::geolocation::{self, PositionOptions};
use crate::profile::ProfilePatch;
use crate::storage::StorageKey;
use crate::timer::{self, TimerHandle, TimerKind};
use crate::view::{self, push_field, Render, ToastLevel};

/// Form field names, in display order.
pub const CONTACT_FIELDS: [&str; 9] = [
    "petName",
    "petBreed",
    "ownerName",
    "primaryPhone",
    "secondaryPhone",
    "email",
    "emergencyName",
    "emergencyPhone",
    "address",
];

/// Saved contact details for one pet.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ContactRecord {
    /// Pet name.
    pub pet_name: String,
    /// Pet breed.
    pub pet_breed: String,
    /// Owner name.
    pub owner_name: String,
    /// Main phone number.
    pub primary_phone: String,
    /// Alternate phone number.
    pub secondary_phone: String,
    /// Owner email.
    pub email: String,
    /// Emergency contact name.
    pub emergency_name: String,
    /// Emergency contact phone.
    pub emergency_phone: String,
    /// Home address.
    pub address: String,
}

impl ContactRecord {
    fn field(&self, name: &str) -> Option<&String> {
        Some(match name {
            "petName" => &self.pet_name,
            "petBreed" => &self.pet_breed,
            "ownerName" => &self.owner_name,
            "primaryPhone" => &self.primary_phone,
            "secondaryPhone" => &self.secondary_phone,
            "email" => &self.email,
            "emergencyName" => &self.emergency_name,
            "emergencyPhone" => &self.emergency_phone,
            "address" => &self.address,
            _ => return None,
        })
    }

    fn field_mut(&mut self, name: &str) -> Option<&mut String> {
        Some(match name {
            "petName" => &mut self.pet_name,
            "petBreed" => &mut self.pet_breed,
            "ownerName" => &mut self.owner_name,
            "primaryPhone" => &mut self.primary_phone,
            "secondaryPhone" => &mut self.secondary_phone,
            "email" => &mut self.email,
            "emergencyName" => &mut self.emergency_name,
            "emergencyPhone" => &mut self.emergency_phone,
            "address" => &mut self.address,
            _ => return None,
        })
    }

    /// The record as raw form values.
    #[must_use]
    pub fn to_form(&self) -> FormInput {
        CONTACT_FIELDS
            .iter()
            .filter_map(|name| self.field(name).map(|v| ((*name).to_string(), v.clone())))
            .collect()
    }

    /// A copy with every field trimmed.
    #[must_use]
    pub fn trimmed(&self) -> Self {
        let mut out = self.clone();
        for name in CONTACT_FIELDS {
            if let Some(value) = out.field_mut(name) {
                *value = value.trim().to_string();
            }
        }
        out
    }

    /// Whether every field is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        CONTACT_FIELDS
            .iter()
            .all(|name| self.field(name).map_or(true, |v| v.trim().is_empty()))
    }

    /// One-line text for a QR code: `Pet: .. | Owner: .. | Phone: .. | Email: ..`.
    #[must_use]
    pub fn qr_text(&self) -> String {
        let parts: Vec<String> = [
            ("Pet", &self.pet_name),
            ("Owner", &self.owner_name),
            ("Phone", &self.primary_phone),
            ("Email", &self.email),
        ]
        .iter()
        .filter(|(_, value)| !value.is_empty())
        .map(|(label, value)| format!("{label}: {value}"))
        .collect();
        parts.join(" | ")
    }

    /// Multi-line text for sharing.
    #[must_use]
    pub fn share_text(&self) -> String {
        let mut lines = Vec::new();
        push_field(&mut lines, "Owner", &self.owner_name);
        push_field(&mut lines, "Phone", &self.primary_phone);
        push_field(&mut lines, "Email", &self.email);
        if !self.emergency_phone.is_empty() {
            let name = if self.emergency_name.is_empty() {
                "Emergency Contact"
            } else {
                &self.emergency_name
            };
            lines.push(format!("Emergency: {name} - {}", self.emergency_phone));
        }
        if lines.is_empty() {
            "No contact information available".to_string()
        } else {
            lines.join("\n")
        }
    }

    /// Title used when sharing.
    #[must_use]
    pub fn share_title(&self) -> String {
        let name = if self.pet_name.is_empty() {
            "Pet"
        } else {
            &self.pet_name
        };
        format!("{name} Contact Information")
    }

    /// Every non-empty phone number with its role.
    #[must_use]
    pub fn phones(&self) -> Vec<(&'static str, String)> {
        [
            ("Primary", &self.primary_phone),
            ("Secondary", &self.secondary_phone),
            ("Emergency", &self.emergency_phone),
        ]
        .into_iter()
        .filter(|(_, number)| !number.is_empty())
        .map(|(kind, number)| (kind, number.clone()))
        .collect()
    }
}

/// The saved-contact summary panel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContactSummary {
    /// `(label, value)` rows; empty when nothing is saved.
    pub rows: Vec<(&'static str, String)>,
}

impl ContactSummary {
    /// Build the summary for a saved record.
    #[must_use]
    pub fn of(record: &ContactRecord) -> Self {
        let mut rows = Vec::new();
        if !record.pet_name.is_empty() {
            let pet = if record.pet_breed.is_empty() {
                record.pet_name.clone()
            } else {
                format!("{} ({})", record.pet_name, record.pet_breed)
            };
            rows.push(("Pet", pet));
        }
        if !record.owner_name.is_empty() {
            rows.push(("Owner", record.owner_name.clone()));
        }
        if !record.primary_phone.is_empty() {
            rows.push(("Phone", record.primary_phone.clone()));
        }
        if !record.email.is_empty() {
            rows.push(("Email", record.email.clone()));
        }
        if !record.emergency_name.is_empty() && !record.emergency_phone.is_empty() {
            rows.push((
                "Emergency",
                format!("{} - {}", record.emergency_name, record.emergency_phone),
            ));
        }
        if !record.address.is_empty() {
            rows.push(("Address", record.address.clone()));
        }
        Self { rows }
    }
}

impl Render for ContactSummary {
    fn render(&self) -> String {
        if self.rows.is_empty() {
            return "Contact information will appear here after saving".to_string();
        }
        self.rows
            .iter()
            .map(|(label, value)| format!("{label}: {value}"))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Details of a lost-pet report.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LostReport {
    /// Where the pet was last seen.
    pub last_seen: String,
    /// Anything else worth knowing.
    pub details: String,
    /// Attach the device's current position.
    pub include_location: bool,
}

/// Contact page state.
#[derive(Debug)]
pub struct ContactPage {
    initialized: bool,
    rules: RuleSet,
    saved: ContactRecord,
    draft: ContactRecord,
    autosave: Option<TimerHandle>,
}

impl Default for ContactPage {
    fn default() -> Self {
        Self::new()
    }
}

impl ContactPage {
    /// An uninitialized page.
    #[must_use]
    pub fn new() -> Self {
        Self {
            initialized: false,
            rules: contact_rules(),
            saved: ContactRecord::default(),
            draft: ContactRecord::default(),
            autosave: None,
        }
    }

    /// Whether `init` has run.
    #[must_use]
    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    /// Load the saved record into the form and start auto-save.
    ///
    /// # Errors
    ///
    /// Returns an error if storage cannot be read.
    pub fn init(&mut self, ctx: &mut PageContext<'_>) -> Result<()> {
        if self.initialized {
            return Ok(());
        }
        debug!("Initializing contact page");

        self.load(ctx)?;
        self.autosave = Some(timer::spawn_periodic(
            TimerKind::ContactAutosave,
            std::time::Duration::from_secs(ctx.timers.contact_autosave_secs),
            ctx.ticks.clone(),
        ));
        self.initialized = true;
        Ok(())
    }

    fn load(&mut self, ctx: &mut PageContext<'_>) -> Result<()> {
        let Some(tag) = ctx.tag else {
            ctx.toast(ToastLevel::Warning, super::CONNECT_FIRST);
            return Ok(());
        };
        let stored: Option<ContactRecord> = ctx.store.load(&StorageKey::Contact(tag.clone()))?;
        let record = stored
            .or_else(|| ctx.user.map(|u| u.contact_info.clone()))
            .unwrap_or_default();
        self.saved = record.clone();
        self.draft = record;
        Ok(())
    }

    /// Stop auto-save and flush unsaved changes.
    ///
    /// # Errors
    ///
    /// Returns an error if the flush cannot be written.
    pub fn destroy(&mut self, ctx: &mut PageContext<'_>) -> Result<Option<ProfilePatch>> {
        if let Some(mut handle) = self.autosave.take() {
            handle.stop();
        }
        let patch = if self.initialized {
            self.auto_save(ctx)?
        } else {
            None
        };
        self.initialized = false;
        Ok(patch)
    }

    /// Set one form field and validate it.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownField`] if the form has no such field.
    pub fn edit(&mut self, field: &str, value: &str) -> Result<FieldStatus> {
        let slot = self.draft.field_mut(field).ok_or_else(|| Error::UnknownField {
            field: field.to_string(),
        })?;
        *slot = value.to_string();
        Ok(self.rules.validate_field(field, value))
    }

    /// The form as currently edited.
    #[must_use]
    pub fn draft(&self) -> &ContactRecord {
        &self.draft
    }

    /// The last saved record.
    #[must_use]
    pub fn saved(&self) -> &ContactRecord {
        &self.saved
    }

    /// Validate the whole form.
    #[must_use]
    pub fn validate(&self) -> FormErrors {
        self.rules.validate_form(&self.draft.to_form())
    }

    /// Whether the form differs from the saved record.
    #[must_use]
    pub fn has_unsaved_changes(&self) -> bool {
        self.draft.trimmed() != self.saved
    }

    /// Validate and save the form, then report the update.
    ///
    /// Nothing is written unless every field passes.
    ///
    /// # Errors
    ///
    /// Returns [`Error::TagRequired`] with no tag, [`Error::Validation`] if
    /// any field fails, or a storage error.
    pub async fn save(&mut self, ctx: &mut PageContext<'_>) -> Result<ProfilePatch> {
        let tag = ctx.require_tag()?;

        let errors = self.validate();
        if !errors.is_empty() {
            ctx.toast(ToastLevel::Error, "Please fix validation errors before saving");
            return Err(Error::Validation(errors));
        }

        let record = self.draft.trimmed();
        ctx.store.save(&StorageKey::Contact(tag.clone()), &record)?;
        self.saved = record.clone();
        self.draft = record.clone();
        info!(tag = %tag, "Contact information saved");

        let email = if record.email.is_empty() {
            "Not provided"
        } else {
            &record.email
        };
        ctx.notifier
            .create_issue(
                format!("Contact Information Updated - {tag}"),
                format!(
                    "Contact information has been updated for pet tracker {tag}\n\n\
                     Pet Name: {}\nOwner: {}\nPrimary Phone: {}\nEmail: {email}\nUpdated: {}",
                    record.pet_name,
                    record.owner_name,
                    record.primary_phone,
                    view::iso_timestamp(ctx.now)
                ),
                &["contact-update", &tag.label()],
                Some(&tag),
            )
            .await;

        ctx.toast(ToastLevel::Success, "Contact information saved successfully!");
        Ok(ProfilePatch::Contact(record))
    }

    /// Persist pending changes without notifying.
    ///
    /// Drafts that fail validation are left unsaved.
    ///
    /// # Errors
    ///
    /// Returns an error if storage cannot be written.
    pub fn auto_save(&mut self, ctx: &mut PageContext<'_>) -> Result<Option<ProfilePatch>> {
        let Some(tag) = ctx.tag else {
            return Ok(None);
        };
        if !self.has_unsaved_changes() {
            return Ok(None);
        }
        let errors = self.validate();
        if !errors.is_empty() {
            debug!(fields = errors.len(), "Skipping contact auto-save, form invalid");
            return Ok(None);
        }

        let record = self.draft.trimmed();
        ctx.store.save(&StorageKey::Contact(tag.clone()), &record)?;
        self.saved = record.clone();
        debug!(tag = %tag, "Contact draft auto-saved");
        Ok(Some(ProfilePatch::Contact(record)))
    }

    /// Discard edits and reload the saved record.
    ///
    /// # Errors
    ///
    /// Returns an error if storage cannot be read.
    pub fn reset(&mut self, ctx: &mut PageContext<'_>) -> Result<()> {
        self.load(ctx)?;
        ctx.toast(ToastLevel::Success, "Form reset successfully");
        Ok(())
    }

    /// Summary of the saved record.
    #[must_use]
    pub fn summary(&self) -> ContactSummary {
        ContactSummary::of(&self.saved)
    }

    /// QR code text for the saved record, if anything is saved.
    pub fn qr_text(&self, ctx: &mut PageContext<'_>) -> Option<String> {
        if self.saved.is_empty() {
            ctx.toast(ToastLevel::Warning, "Please save contact information first");
            return None;
        }
        Some(self.saved.qr_text())
    }

    /// `(title, text)` to share, if anything is saved.
    pub fn share(&self, ctx: &mut PageContext<'_>) -> Option<(String, String)> {
        if self.saved.is_empty() {
            ctx.toast(ToastLevel::Warning, "No contact information to share");
            return None;
        }
        Some((self.saved.share_title(), self.saved.share_text()))
    }

    /// Saved phone numbers to test-call.
    pub fn phones(&self, ctx: &mut PageContext<'_>) -> Vec<(&'static str, String)> {
        let phones = self.saved.phones();
        if phones.is_empty() {
            ctx.toast(ToastLevel::Warning, "No phone numbers to test");
        }
        phones
    }

    /// Printable contact card, if anything is saved.
    pub fn contact_card(&self, ctx: &mut PageContext<'_>) -> Option<String> {
        if self.saved.is_empty() {
            ctx.toast(ToastLevel::Warning, "No contact information to print");
            return None;
        }
        let name = if self.saved.pet_name.is_empty() {
            "Pet"
        } else {
            &self.saved.pet_name
        };
        let tag = ctx.tag.map(ToString::to_string).unwrap_or_default();
        Some(format!(
            "{name} - Contact Information\n\n{}\n\nNFC Tag ID: {tag}\nGenerated: {}",
            self.saved.share_text(),
            view::format_date(ctx.now)
        ))
    }

    /// Send a high-priority lost-pet alert.
    ///
    /// A failed position lookup is reported as "Location unavailable"
    /// rather than aborting the report.
    ///
    /// # Errors
    ///
    /// Returns [`Error::TagRequired`] when no tag is bound.
    pub async fn report_lost(&self, ctx: &mut PageContext<'_>, report: &LostReport) -> Result<()> {
        let tag = ctx.require_tag()?;

        let current_location = if report.include_location {
            match geolocation::locate(ctx.geolocator, PositionOptions::emergency()).await {
                Ok(p) => format!("{}, {}", p.latitude, p.longitude),
                Err(e) => {
                    debug!(error = %e, "No position for lost report");
                    "Location unavailable".to_string()
                }
            }
        } else {
            "Not provided".to_string()
        };

        let or_unknown = |s: &str| {
            if s.is_empty() {
                "Unknown".to_string()
            } else {
                s.to_string()
            }
        };
        let pet = &self.saved;
        let details = if report.details.is_empty() {
            "None provided"
        } else {
            &report.details
        };

        ctx.notifier
            .create_issue(
                format!("🚨 LOST PET ALERT - {tag}"),
                format!(
                    "LOST PET ALERT for {}\n\n\
                     Pet Information:\n- Name: {}\n- Breed: {}\n\n\
                     Owner Information:\n- Name: {}\n- Phone: {}\n- Email: {}\n\n\
                     Last Seen: {}\nCurrent Location: {current_location}\n\
                     Additional Details: {details}\n\nReport Time: {}",
                    ctx.pet_name(),
                    or_unknown(&pet.pet_name),
                    or_unknown(&pet.pet_breed),
                    or_unknown(&pet.owner_name),
                    or_unknown(&pet.primary_phone),
                    or_unknown(&pet.email),
                    report.last_seen,
                    view::iso_timestamp(ctx.now)
                ),
                &["lost-pet", "emergency", "high-priority", &tag.label()],
                Some(&tag),
            )
            .await;

        ctx.toast(ToastLevel::Success, "Lost pet report submitted successfully!");
        Ok(())
    }
}

fn contact_rules() -> RuleSet {
    RuleSet::new()
        .field("petName", FieldRule::new("Pet Name").required().min_length(2))
        .field("ownerName", FieldRule::new("Owner Name").required().min_length(2))
        .field("primaryPhone", FieldRule::phone("Primary Phone").required())
        .field("secondaryPhone", FieldRule::phone("Secondary Phone"))
        .field("emergencyPhone", FieldRule::phone("Emergency Contact Phone"))
        .field("email", FieldRule::email("Email Address"))
}

#[cfg(test)]
mod tests {
    use super::super::testing::Harness;
    use super::*;

    fn valid_page() -> ContactPage {
        let mut page = ContactPage::new();
        page.edit("petName", "Rex").unwrap();
        page.edit("ownerName", "Sam Carter").unwrap();
        page.edit("primaryPhone", "+1 (555) 123-4567").unwrap();
        page.edit("email", "sam@example.com").unwrap();
        page
    }

    #[test]
    fn test_edit_validates_field() {
        let mut page = ContactPage::new();
        assert_eq!(
            page.edit("petName", "R").unwrap(),
            FieldStatus::Invalid("Pet Name must be at least 2 characters".to_string())
        );
        assert_eq!(
            page.edit("petBreed", "Beagle").unwrap(),
            FieldStatus::Valid { marked: false }
        );
        assert!(matches!(
            page.edit("favoriteToy", "ball"),
            Err(Error::UnknownField { .. })
        ));
    }

    #[test]
    fn test_secondary_phone_checked_when_present() {
        let mut page = valid_page();
        assert!(page.edit("secondaryPhone", "").unwrap().is_valid());
        assert!(!page.edit("secondaryPhone", "12345").unwrap().is_valid());
    }

    #[tokio::test]
    async fn test_save_persists_and_notifies() {
        let mut harness = Harness::new();
        let mut page = valid_page();

        let patch = page.save(&mut harness.ctx()).await.unwrap();
        harness.apply(Some(patch));

        let stored: ContactRecord = harness
            .store
            .load(&StorageKey::Contact(harness.tag.clone().unwrap()))
            .unwrap()
            .unwrap();
        assert_eq!(stored.pet_name, "Rex");
        assert_eq!(harness.user.as_ref().unwrap().pet_name, "Rex");

        let events = harness.issues.events();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].title, "Contact Information Updated - Rex2024");
        assert_eq!(events[0].labels, vec!["contact-update", "tag-Rex2024"]);
        assert!(events[0].body.contains("Email: sam@example.com"));
        assert!(!page.has_unsaved_changes());
    }

    #[tokio::test]
    async fn test_invalid_form_saves_nothing() {
        let mut harness = Harness::new();
        let mut page = valid_page();
        page.save(&mut harness.ctx()).await.unwrap();
        let key = StorageKey::Contact(harness.tag.clone().unwrap());
        let before: ContactRecord = harness.store.load(&key).unwrap().unwrap();

        page.edit("ownerName", "Alex Smith").unwrap();
        page.edit("email", "not-an-email").unwrap();
        let err = page.save(&mut harness.ctx()).await.unwrap_err();

        match err {
            Error::Validation(errors) => {
                assert_eq!(errors.len(), 1);
                assert!(errors.get("email").is_some());
            }
            other => panic!("unexpected error: {other}"),
        }
        let after: ContactRecord = harness.store.load(&key).unwrap().unwrap();
        assert_eq!(before, after);
        assert_eq!(harness.issues.events().len(), 1);
        assert_eq!(
            harness.last_toast().unwrap().message,
            "Please fix validation errors before saving"
        );
    }

    #[tokio::test]
    async fn test_save_without_tag() {
        let mut harness = Harness::without_tag();
        let mut page = valid_page();
        let err = page.save(&mut harness.ctx()).await.unwrap_err();
        assert!(err.is_state_integrity());
        assert!(harness.issues.events().is_empty());
    }

    #[tokio::test]
    async fn test_init_loads_saved_record() {
        let mut harness = Harness::new();
        let record = ContactRecord {
            pet_name: "Rex".to_string(),
            owner_name: "Sam".to_string(),
            ..ContactRecord::default()
        };
        harness
            .store
            .save(&StorageKey::Contact(harness.tag.clone().unwrap()), &record)
            .unwrap();

        let mut page = ContactPage::new();
        page.init(&mut harness.ctx()).unwrap();
        assert_eq!(page.saved(), &record);
        assert_eq!(page.draft(), &record);
        assert!(!page.has_unsaved_changes());
        page.destroy(&mut harness.ctx()).unwrap();
    }

    #[tokio::test]
    async fn test_auto_save_only_valid_drafts_without_notifying() {
        let mut harness = Harness::new();
        let key = StorageKey::Contact(harness.tag.clone().unwrap());
        let mut page = ContactPage::new();
        page.init(&mut harness.ctx()).unwrap();

        page.edit("petName", "R").unwrap();
        assert!(page.auto_save(&mut harness.ctx()).unwrap().is_none());
        assert!(harness.store.load::<ContactRecord>(&key).unwrap().is_none());

        page.edit("petName", "Rex").unwrap();
        page.edit("ownerName", "Sam").unwrap();
        page.edit("primaryPhone", "555 123 4567").unwrap();
        let patch = page.auto_save(&mut harness.ctx()).unwrap();
        assert!(matches!(patch, Some(ProfilePatch::Contact(_))));
        assert!(harness.store.load::<ContactRecord>(&key).unwrap().is_some());
        assert!(harness.issues.events().is_empty());

        assert!(page.auto_save(&mut harness.ctx()).unwrap().is_none());
        page.destroy(&mut harness.ctx()).unwrap();
    }

    #[tokio::test]
    async fn test_destroy_flushes_changes() {
        let mut harness = Harness::new();
        let key = StorageKey::Contact(harness.tag.clone().unwrap());
        let mut page = ContactPage::new();
        page.init(&mut harness.ctx()).unwrap();
        page.edit("petName", "Rex").unwrap();
        page.edit("ownerName", "Sam").unwrap();
        page.edit("primaryPhone", "5551234567").unwrap();

        let patch = page.destroy(&mut harness.ctx()).unwrap();
        assert!(patch.is_some());
        assert!(!page.is_initialized());
        let stored: ContactRecord = harness.store.load(&key).unwrap().unwrap();
        assert_eq!(stored.primary_phone, "5551234567");
    }

    #[tokio::test]
    async fn test_reset_discards_edits() {
        let mut harness = Harness::new();
        let mut page = ContactPage::new();
        page.init(&mut harness.ctx()).unwrap();
        page.edit("petName", "Rex").unwrap();
        page.reset(&mut harness.ctx()).unwrap();
        assert!(page.draft().pet_name.is_empty());
        assert_eq!(harness.last_toast().unwrap().message, "Form reset successfully");
        page.destroy(&mut harness.ctx()).unwrap();
    }

    #[tokio::test]
    async fn test_summary_qr_and_share() {
        let mut harness = Harness::new();
        let mut page = valid_page();
        assert!(page.qr_text(&mut harness.ctx()).is_none());

        page.edit("petBreed", "Beagle").unwrap();
        page.edit("emergencyName", "Jo").unwrap();
        page.edit("emergencyPhone", "555-987-6543").unwrap();
        page.save(&mut harness.ctx()).await.unwrap();

        assert_eq!(
            page.qr_text(&mut harness.ctx()).unwrap(),
            "Pet: Rex | Owner: Sam Carter | Phone: +1 (555) 123-4567 | Email: sam@example.com"
        );

        let summary = page.summary().render();
        assert!(summary.contains("Pet: Rex (Beagle)"));
        assert!(summary.contains("Emergency: Jo - 555-987-6543"));

        let (title, text) = page.share(&mut harness.ctx()).unwrap();
        assert_eq!(title, "Rex Contact Information");
        assert!(text.starts_with("Owner: Sam Carter\nPhone: +1 (555) 123-4567"));

        let phones = page.phones(&mut harness.ctx());
        assert_eq!(phones.len(), 2);
        assert_eq!(phones[1], ("Emergency", "555-987-6543".to_string()));

        let card = page.contact_card(&mut harness.ctx()).unwrap();
        assert!(card.starts_with("Rex - Contact Information"));
        assert!(card.contains("NFC Tag ID: Rex2024"));
    }

    #[test]
    fn test_empty_summary() {
        assert_eq!(
            ContactSummary::of(&ContactRecord::default()).render(),
            "Contact information will appear here after saving"
        );
    }

    #[tokio::test]
    async fn test_report_lost_includes_location() {
        let mut harness = Harness::new().located_at(40.7128, -74.006);
        let mut page = valid_page();
        page.save(&mut harness.ctx()).await.unwrap();

        let report = LostReport {
            last_seen: "Central Park".to_string(),
            details: String::new(),
            include_location: true,
        };
        page.report_lost(&mut harness.ctx(), &report).await.unwrap();

        let events = harness.issues.events();
        let alert = events.last().unwrap();
        assert_eq!(alert.title, "🚨 LOST PET ALERT - Rex2024");
        assert_eq!(
            alert.labels,
            vec!["lost-pet", "emergency", "high-priority", "tag-Rex2024"]
        );
        assert!(alert.body.contains("Current Location: 40.7128, -74.006"));
        assert!(alert.body.contains("Additional Details: None provided"));
    }

    #[tokio::test]
    async fn test_report_lost_without_position() {
        let mut harness = Harness::new();
        let page = valid_page();
        let report = LostReport {
            last_seen: "Park".to_string(),
            details: "Red collar".to_string(),
            include_location: true,
        };
        page.report_lost(&mut harness.ctx(), &report).await.unwrap();
        let events = harness.issues.events();
        assert!(events[0].body.contains("Current Location: Location unavailable"));
    }
}
