//! Medical page: vitals, veterinary care, medications, vaccinations,
//! care reminders and medical emergencies.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Local, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::validation::{FieldRule, FieldStatus, FormErrors, FormInput, RuleSet, PHONE_PATTERN};
use super::PageContext;
use crate::error::{Error, Result};
use crate::geo;
use crate::profile::ProfilePatch;
use crate::storage::StorageKey;
use crate::timer::{self, TimerHandle, TimerKind};
use crate::view::{self, push_field, Export, Render, ToastLevel};

/// Free-text form fields, in display order.
pub const MEDICAL_FIELDS: [&str; 19] = [
    "weight",
    "weightUnit",
    "height",
    "heightUnit",
    "microchipId",
    "birthDate",
    "veterinarianName",
    "vetClinicName",
    "vetPhone",
    "vetEmail",
    "vetAddress",
    "foodAllergies",
    "medicationAllergies",
    "environmentalAllergies",
    "chronicConditions",
    "pastSurgeries",
    "behavioralIssues",
    "emergencyInstructions",
    "criticalMedications",
];

/// Vaccinations become due once this fraction of a year has passed.
const DUE_SOON_YEARS: f64 = 0.8;

/// A tracked vaccine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VaccineType {
    /// Rabies.
    Rabies,
    /// Distemper, hepatitis, parainfluenza and parvovirus.
    Dhpp,
    /// Kennel cough.
    Bordetella,
    /// Lyme disease.
    Lyme,
}

impl VaccineType {
    /// Every tracked vaccine.
    pub const ALL: [Self; 4] = [Self::Rabies, Self::Dhpp, Self::Bordetella, Self::Lyme];
}

impl fmt::Display for VaccineType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Rabies => write!(f, "rabies"),
            Self::Dhpp => write!(f, "dhpp"),
            Self::Bordetella => write!(f, "bordetella"),
            Self::Lyme => write!(f, "lyme"),
        }
    }
}

impl std::str::FromStr for VaccineType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|v| v.to_string() == s)
            .ok_or_else(|| Error::internal(format!("unknown vaccine: {s}")))
    }
}

/// One vaccination date.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Vaccination {
    /// Date given.
    pub date: NaiveDate,
    /// Marked as current on the form.
    pub is_active: bool,
}

/// One current medication.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Medication {
    /// Drug name.
    pub name: String,
    /// Dose and schedule.
    pub dosage: String,
    /// Purpose or notes.
    pub notes: String,
}

/// Saved medical details for one pet.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct MedicalRecord {
    /// Weight as entered.
    pub weight: String,
    /// `lbs` or `kg`.
    pub weight_unit: String,
    /// Height as entered.
    pub height: String,
    /// `in` or `cm`.
    pub height_unit: String,
    /// 15-digit hex microchip number.
    pub microchip_id: String,
    /// Date of birth.
    pub birth_date: String,
    /// Veterinarian name.
    pub veterinarian_name: String,
    /// Clinic name.
    pub vet_clinic_name: String,
    /// Clinic phone.
    pub vet_phone: String,
    /// Clinic email.
    pub vet_email: String,
    /// Clinic address.
    pub vet_address: String,
    /// Food allergies.
    pub food_allergies: String,
    /// Medication allergies.
    pub medication_allergies: String,
    /// Environmental allergies.
    pub environmental_allergies: String,
    /// Chronic conditions.
    pub chronic_conditions: String,
    /// Past surgeries.
    pub past_surgeries: String,
    /// Behavioral notes.
    pub behavioral_issues: String,
    /// Instructions for whoever finds the pet.
    pub emergency_instructions: String,
    /// Medications that must not be missed.
    pub critical_medications: String,
    /// Only entries with a name are kept on save.
    pub medications: Vec<Medication>,
    /// Vaccines ticked as current.
    pub vaccination_status: Vec<VaccineType>,
    /// Vaccines with a recorded date.
    pub vaccinations: BTreeMap<VaccineType, Vaccination>,
}

impl MedicalRecord {
    fn field(&self, name: &str) -> Option<&String> {
        Some(match name {
            "weight" => &self.weight,
            "weightUnit" => &self.weight_unit,
            "height" => &self.height,
            "heightUnit" => &self.height_unit,
            "microchipId" => &self.microchip_id,
            "birthDate" => &self.birth_date,
            "veterinarianName" => &self.veterinarian_name,
            "vetClinicName" => &self.vet_clinic_name,
            "vetPhone" => &self.vet_phone,
            "vetEmail" => &self.vet_email,
            "vetAddress" => &self.vet_address,
            "foodAllergies" => &self.food_allergies,
            "medicationAllergies" => &self.medication_allergies,
            "environmentalAllergies" => &self.environmental_allergies,
            "chronicConditions" => &self.chronic_conditions,
            "pastSurgeries" => &self.past_surgeries,
            "behavioralIssues" => &self.behavioral_issues,
            "emergencyInstructions" => &self.emergency_instructions,
            "criticalMedications" => &self.critical_medications,
            _ => return None,
        })
    }

    fn field_mut(&mut self, name: &str) -> Option<&mut String> {
        Some(match name {
            "weight" => &mut self.weight,
            "weightUnit" => &mut self.weight_unit,
            "height" => &mut self.height,
            "heightUnit" => &mut self.height_unit,
            "microchipId" => &mut self.microchip_id,
            "birthDate" => &mut self.birth_date,
            "veterinarianName" => &mut self.veterinarian_name,
            "vetClinicName" => &mut self.vet_clinic_name,
            "vetPhone" => &mut self.vet_phone,
            "vetEmail" => &mut self.vet_email,
            "vetAddress" => &mut self.vet_address,
            "foodAllergies" => &mut self.food_allergies,
            "medicationAllergies" => &mut self.medication_allergies,
            "environmentalAllergies" => &mut self.environmental_allergies,
            "chronicConditions" => &mut self.chronic_conditions,
            "pastSurgeries" => &mut self.past_surgeries,
            "behavioralIssues" => &mut self.behavioral_issues,
            "emergencyInstructions" => &mut self.emergency_instructions,
            "criticalMedications" => &mut self.critical_medications,
            _ => return None,
        })
    }

    /// The text fields as raw form values.
    #[must_use]
    pub fn to_form(&self) -> FormInput {
        MEDICAL_FIELDS
            .iter()
            .filter_map(|name| self.field(name).map(|v| ((*name).to_string(), v.clone())))
            .collect()
    }

    /// The record as it is stored: trimmed text, named medications only,
    /// and each vaccination's active flag taken from `vaccination_status`.
    #[must_use]
    pub fn normalized(&self) -> Self {
        let mut out = self.clone();
        for name in MEDICAL_FIELDS {
            if let Some(value) = out.field_mut(name) {
                *value = value.trim().to_string();
            }
        }
        out.medications = self
            .medications
            .iter()
            .map(|m| Medication {
                name: m.name.trim().to_string(),
                dosage: m.dosage.trim().to_string(),
                notes: m.notes.trim().to_string(),
            })
            .filter(|m| !m.name.is_empty())
            .collect();
        for (kind, vaccination) in &mut out.vaccinations {
            vaccination.is_active = self.vaccination_status.contains(kind);
        }
        out
    }

    /// Whether nothing has been entered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.normalized() == Self::default()
    }

    /// Whether any allergy is recorded.
    #[must_use]
    pub fn has_allergies(&self) -> bool {
        !(self.food_allergies.is_empty()
            && self.medication_allergies.is_empty()
            && self.environmental_allergies.is_empty())
    }
}

/// Plain-text medical record for export or printing.
#[must_use]
pub fn medical_report(record: &MedicalRecord, pet_name: &str, tag: &str, now: DateTime<Utc>) -> String {
    let with_unit = |value: &str, unit: &str| format!("{value} {unit}").trim_end().to_string();

    let mut lines = vec![
        format!("MEDICAL RECORD - {pet_name}"),
        format!("NFC Tag ID: {tag}"),
        format!("Generated: {}", view::format_date_long(now)),
        String::new(),
        "--- BASIC INFORMATION ---".to_string(),
    ];
    if !record.weight.is_empty() {
        lines.push(format!("Weight: {}", with_unit(&record.weight, &record.weight_unit)));
    }
    if !record.height.is_empty() {
        lines.push(format!("Height: {}", with_unit(&record.height, &record.height_unit)));
    }
    push_field(&mut lines, "Microchip ID", &record.microchip_id);
    push_field(&mut lines, "Birth Date", &record.birth_date);

    lines.push(String::new());
    lines.push("--- VETERINARY CARE ---".to_string());
    push_field(&mut lines, "Veterinarian", &record.veterinarian_name);
    push_field(&mut lines, "Clinic", &record.vet_clinic_name);
    push_field(&mut lines, "Phone", &record.vet_phone);
    push_field(&mut lines, "Email", &record.vet_email);
    push_field(&mut lines, "Address", &record.vet_address);

    lines.push(String::new());
    lines.push("--- MEDICATIONS ---".to_string());
    if record.medications.is_empty() {
        lines.push("No current medications".to_string());
        lines.push(String::new());
    }
    for (i, med) in record.medications.iter().enumerate() {
        lines.push(format!("{}. {}", i + 1, med.name));
        push_field(&mut lines, "   Dosage", &med.dosage);
        push_field(&mut lines, "   Notes", &med.notes);
        lines.push(String::new());
    }

    lines.push("--- ALLERGIES ---".to_string());
    push_field(&mut lines, "Food Allergies", &record.food_allergies);
    push_field(&mut lines, "Medication Allergies", &record.medication_allergies);
    push_field(&mut lines, "Environmental Allergies", &record.environmental_allergies);
    if !record.has_allergies() {
        lines.push("No known allergies".to_string());
    }

    lines.push(String::new());
    lines.push("--- MEDICAL CONDITIONS ---".to_string());
    push_field(&mut lines, "Chronic Conditions", &record.chronic_conditions);
    push_field(&mut lines, "Past Surgeries", &record.past_surgeries);
    push_field(&mut lines, "Behavioral Notes", &record.behavioral_issues);

    lines.push(String::new());
    lines.push("--- EMERGENCY INFORMATION ---".to_string());
    if !record.emergency_instructions.is_empty() {
        lines.push(record.emergency_instructions.clone());
    }
    push_field(&mut lines, "Critical Medications", &record.critical_medications);

    lines.join("\n")
}

/// The saved-record summary panel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MedicalSummary {
    /// `(label, value)` rows; empty when nothing is saved.
    pub rows: Vec<(&'static str, String)>,
}

impl MedicalSummary {
    /// Build the summary for a saved record.
    #[must_use]
    pub fn of(record: &MedicalRecord) -> Self {
        let mut rows = Vec::new();
        if !record.weight.is_empty() && !record.weight_unit.is_empty() {
            rows.push(("Weight", format!("{} {}", record.weight, record.weight_unit)));
        }
        if !record.microchip_id.is_empty() {
            rows.push(("Microchip ID", record.microchip_id.clone()));
        }
        if !record.veterinarian_name.is_empty() {
            let vet = if record.vet_clinic_name.is_empty() {
                record.veterinarian_name.clone()
            } else {
                format!("{} at {}", record.veterinarian_name, record.vet_clinic_name)
            };
            rows.push(("Veterinarian", vet));
        }
        if !record.vet_phone.is_empty() {
            rows.push(("Vet Phone", record.vet_phone.clone()));
        }
        if !record.medications.is_empty() {
            let meds: Vec<String> = record
                .medications
                .iter()
                .map(|m| {
                    if m.dosage.is_empty() {
                        m.name.clone()
                    } else {
                        format!("{} - {}", m.name, m.dosage)
                    }
                })
                .collect();
            rows.push(("Current Medications", meds.join(", ")));
        }
        if record.has_allergies() {
            let mut allergies = Vec::new();
            push_field(&mut allergies, "Food", &record.food_allergies);
            push_field(&mut allergies, "Medication", &record.medication_allergies);
            push_field(&mut allergies, "Environmental", &record.environmental_allergies);
            rows.push(("⚠️ Allergies", allergies.join("; ")));
        }
        if !record.emergency_instructions.is_empty() {
            rows.push(("🚨 Emergency Instructions", record.emergency_instructions.clone()));
        }
        Self { rows }
    }
}

impl Render for MedicalSummary {
    fn render(&self) -> String {
        if self.rows.is_empty() {
            return "Medical information will appear here after saving".to_string();
        }
        self.rows
            .iter()
            .map(|(label, value)| format!("{label}: {value}"))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Whether a vaccination is still current.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VaccinationState {
    /// Given within the last 0.8 year.
    Current,
    /// Older.
    DueSoon,
}

impl fmt::Display for VaccinationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Current => write!(f, "Current"),
            Self::DueSoon => write!(f, "Due Soon"),
        }
    }
}

impl VaccinationState {
    /// Classify a vaccination given on `date` as of `today`.
    #[must_use]
    pub fn classify(date: NaiveDate, today: NaiveDate) -> Self {
        #[allow(clippy::cast_precision_loss)]
        let years = (today - date).num_days() as f64 / 365.0;
        if years > DUE_SOON_YEARS {
            Self::DueSoon
        } else {
            Self::Current
        }
    }
}

/// Vaccination status panel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VaccinationSummary {
    /// One entry per dated vaccine.
    pub entries: Vec<(VaccineType, NaiveDate, VaccinationState)>,
}

impl VaccinationSummary {
    /// Classify every dated vaccination as of `today`.
    #[must_use]
    pub fn of(vaccinations: &BTreeMap<VaccineType, Vaccination>, today: NaiveDate) -> Self {
        Self {
            entries: vaccinations
                .iter()
                .map(|(kind, v)| (*kind, v.date, VaccinationState::classify(v.date, today)))
                .collect(),
        }
    }
}

impl Render for VaccinationSummary {
    fn render(&self) -> String {
        if self.entries.is_empty() {
            return "Vaccination status will appear here".to_string();
        }
        self.entries
            .iter()
            .map(|(kind, date, state)| {
                format!(
                    "{}: {} ({state})",
                    kind.to_string().to_uppercase(),
                    date.format("%b %-d, %Y")
                )
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// A scheduled care reminder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CareReminder {
    /// Identifier, `reminder_<random>`.
    pub id: String,
    /// What kind of care, e.g. `checkup`.
    #[serde(rename = "type")]
    pub kind: String,
    /// When it is due.
    pub date: NaiveDate,
    /// Free-text notes.
    #[serde(default)]
    pub notes: String,
    /// When it was scheduled.
    pub created_at: DateTime<Utc>,
    /// Still pending.
    pub is_active: bool,
}

/// A care reminder as entered by the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReminderDraft {
    /// What kind of care.
    pub kind: String,
    /// When it is due.
    pub date: NaiveDate,
    /// Free-text notes.
    pub notes: String,
}

/// How to reach the veterinarian.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VetContact {
    /// `Dr. <name>`, if a name is saved.
    pub name: Option<String>,
    /// Clinic name, if saved.
    pub clinic: Option<String>,
    /// Phone, if saved.
    pub phone: Option<String>,
    /// Email, if saved.
    pub email: Option<String>,
}

impl Render for VetContact {
    fn render(&self) -> String {
        let mut lines = vec!["Contact Veterinarian".to_string()];
        lines.extend(self.name.clone());
        lines.extend(self.clinic.clone());
        if let Some(phone) = &self.phone {
            lines.push(format!("Call {phone}"));
        }
        if let Some(email) = &self.email {
            lines.push(format!("Email {email}"));
        }
        lines.join("\n")
    }
}

/// Kind of medical emergency.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmergencyKind {
    /// Pet is injured.
    Injured,
    /// Potential poisoning.
    Poisoned,
    /// Allergic reaction.
    AllergicReaction,
    /// Seizure.
    Seizure,
    /// Breathing problems.
    Respiratory,
    /// Unconscious.
    Unconscious,
    /// Anything else.
    Other,
}

impl EmergencyKind {
    /// Every kind.
    pub const ALL: [Self; 7] = [
        Self::Injured,
        Self::Poisoned,
        Self::AllergicReaction,
        Self::Seizure,
        Self::Respiratory,
        Self::Unconscious,
        Self::Other,
    ];
}

impl fmt::Display for EmergencyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let token = match self {
            Self::Injured => "injured",
            Self::Poisoned => "poisoned",
            Self::AllergicReaction => "allergic-reaction",
            Self::Seizure => "seizure",
            Self::Respiratory => "respiratory",
            Self::Unconscious => "unconscious",
            Self::Other => "other",
        };
        f.write_str(token)
    }
}

impl std::str::FromStr for EmergencyKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|k| k.to_string() == s)
            .ok_or_else(|| Error::internal(format!("unknown emergency type: {s}")))
    }
}

/// A medical emergency as reported by the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MedicalEmergency {
    /// What happened.
    pub kind: EmergencyKind,
    /// Symptoms and current condition.
    pub symptoms: String,
    /// Where the pet is now.
    pub location: String,
}

/// Who to call after an emergency alert.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmergencyContact {
    /// Display name.
    pub name: String,
    /// Number to call.
    pub phone: String,
}

/// Medical page state.
#[derive(Debug)]
pub struct MedicalPage {
    initialized: bool,
    rules: RuleSet,
    saved: MedicalRecord,
    draft: MedicalRecord,
    autosave: Option<TimerHandle>,
}

impl Default for MedicalPage {
    fn default() -> Self {
        Self::new()
    }
}

impl MedicalPage {
    /// An uninitialized page.
    #[must_use]
    pub fn new() -> Self {
        Self {
            initialized: false,
            rules: medical_rules(),
            saved: MedicalRecord::default(),
            draft: MedicalRecord::default(),
            autosave: None,
        }
    }

    /// Whether `init` has run.
    #[must_use]
    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    /// Load the saved record and start auto-save.
    ///
    /// # Errors
    ///
    /// Returns an error if storage cannot be read.
    pub fn init(&mut self, ctx: &mut PageContext<'_>) -> Result<()> {
        if self.initialized {
            return Ok(());
        }
        debug!("Initializing medical page");

        self.load(ctx)?;
        self.autosave = Some(timer::spawn_periodic(
            TimerKind::MedicalAutosave,
            std::time::Duration::from_secs(ctx.timers.medical_autosave_secs),
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
        let stored: Option<MedicalRecord> = ctx.store.load(&StorageKey::Medical(tag.clone()))?;
        let record = stored
            .or_else(|| ctx.user.map(|u| u.medical_info.clone()))
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

    /// Set one text field and validate it.
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

    /// Append a medication entry.
    pub fn add_medication(&mut self, medication: Medication) {
        self.draft.medications.push(medication);
    }

    /// Remove the medication entry at `index`.
    pub fn remove_medication(&mut self, index: usize) -> Option<Medication> {
        (index < self.draft.medications.len()).then(|| self.draft.medications.remove(index))
    }

    /// Set a vaccine's date and whether it is ticked as current.
    pub fn set_vaccination(&mut self, kind: VaccineType, date: Option<NaiveDate>, current: bool) {
        match date {
            Some(date) => {
                self.draft.vaccinations.insert(
                    kind,
                    Vaccination {
                        date,
                        is_active: current,
                    },
                );
            }
            None => {
                self.draft.vaccinations.remove(&kind);
            }
        }
        self.draft.vaccination_status.retain(|k| *k != kind);
        if current {
            self.draft.vaccination_status.push(kind);
            self.draft.vaccination_status.sort();
        }
    }

    /// The form as currently edited.
    #[must_use]
    pub fn draft(&self) -> &MedicalRecord {
        &self.draft
    }

    /// The last saved record.
    #[must_use]
    pub fn saved(&self) -> &MedicalRecord {
        &self.saved
    }

    /// Validate every text field.
    #[must_use]
    pub fn validate(&self) -> FormErrors {
        self.rules.validate_form(&self.draft.to_form())
    }

    /// Whether the form differs from the saved record.
    #[must_use]
    pub fn has_unsaved_changes(&self) -> bool {
        self.draft.normalized() != self.saved
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

        let record = self.draft.normalized();
        ctx.store.save(&StorageKey::Medical(tag.clone()), &record)?;
        self.saved = record.clone();
        self.draft = record.clone();
        info!(tag = %tag, medications = record.medications.len(), "Medical information saved");

        let pet = ctx
            .user
            .map(|u| u.pet_name.as_str())
            .filter(|name| !name.is_empty())
            .unwrap_or("Unknown")
            .to_string();
        let or_unspecified = |s: &str| {
            if s.is_empty() {
                "Not specified".to_string()
            } else {
                s.to_string()
            }
        };
        ctx.notifier
            .create_issue(
                format!("Medical Information Updated - {tag}"),
                format!(
                    "Medical information has been updated for pet tracker {tag}\n\n\
                     Pet: {pet}\nWeight: {} {}\nVeterinarian: {}\nClinic: {}\n\
                     Medications: {} listed\nAllergies: {}\nUpdated: {}",
                    or_unspecified(&record.weight),
                    record.weight_unit,
                    or_unspecified(&record.veterinarian_name),
                    or_unspecified(&record.vet_clinic_name),
                    record.medications.len(),
                    if record.has_allergies() { "Yes" } else { "No" },
                    view::iso_timestamp(ctx.now)
                ),
                &["medical-update", &tag.label()],
                Some(&tag),
            )
            .await;

        ctx.toast(ToastLevel::Success, "Medical information saved successfully!");
        Ok(ProfilePatch::Medical(record))
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
            debug!(fields = errors.len(), "Skipping medical auto-save, form invalid");
            return Ok(None);
        }

        let record = self.draft.normalized();
        ctx.store.save(&StorageKey::Medical(tag.clone()), &record)?;
        self.saved = record.clone();
        debug!(tag = %tag, "Medical draft auto-saved");
        Ok(Some(ProfilePatch::Medical(record)))
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
    pub fn summary(&self) -> MedicalSummary {
        MedicalSummary::of(&self.saved)
    }

    /// Vaccination status as of `now`.
    #[must_use]
    pub fn vaccination_summary(&self, now: DateTime<Utc>) -> VaccinationSummary {
        VaccinationSummary::of(
            &self.saved.vaccinations,
            now.with_timezone(&Local).date_naive(),
        )
    }

    /// The saved record as a downloadable text report.
    pub fn export_report(&self, ctx: &mut PageContext<'_>) -> Option<Export> {
        if self.saved.is_empty() {
            ctx.toast(ToastLevel::Warning, "No medical data to export");
            return None;
        }
        let tag = ctx.tag.map(ToString::to_string).unwrap_or_default();
        let export = Export {
            file_name: format!("pet-medical-record-{tag}-{}.txt", ctx.now.format("%Y-%m-%d")),
            contents: medical_report(&self.saved, ctx.pet_name(), &tag, ctx.now),
        };
        ctx.toast(ToastLevel::Success, "Medical data exported successfully");
        Some(export)
    }

    /// Printable card: emergency numbers followed by the full report.
    pub fn medical_card(&self, ctx: &mut PageContext<'_>) -> Option<String> {
        if self.saved.is_empty() {
            ctx.toast(ToastLevel::Warning, "No medical information to print");
            return None;
        }
        let tag = ctx.tag.map(ToString::to_string).unwrap_or_default();
        let owner_phone = ctx
            .user
            .map(|u| u.contact_info.primary_phone.as_str())
            .filter(|p| !p.is_empty())
            .unwrap_or("Not available");

        let mut lines = vec!["Pet Medical Record".to_string(), String::new()];
        lines.push("EMERGENCY CONTACT:".to_string());
        push_field(&mut lines, "Veterinarian", &self.saved.vet_phone);
        lines.push(format!("Owner: {owner_phone}"));
        lines.push(String::new());
        lines.push(medical_report(&self.saved, ctx.pet_name(), &tag, ctx.now));
        Some(lines.join("\n"))
    }

    /// Saved reminders for the bound tag.
    ///
    /// # Errors
    ///
    /// Returns [`Error::TagRequired`] with no tag, or a storage error.
    pub fn reminders(&self, ctx: &mut PageContext<'_>) -> Result<Vec<CareReminder>> {
        let tag = ctx.require_tag()?;
        ctx.store.load_or_default(&StorageKey::Reminders(tag))
    }

    /// Schedule a care reminder and report it.
    ///
    /// # Errors
    ///
    /// Returns [`Error::TagRequired`] with no tag, [`Error::Validation`] if
    /// the reminder type is empty, or a storage error.
    pub async fn schedule_reminder(
        &self,
        ctx: &mut PageContext<'_>,
        draft: ReminderDraft,
    ) -> Result<CareReminder> {
        let tag = ctx.require_tag()?;
        if draft.kind.trim().is_empty() {
            let errors = FormErrors::single("reminderType", "Reminder Type is required");
            ctx.toast(
                ToastLevel::Error,
                format!("Failed to schedule reminder: {errors}"),
            );
            return Err(Error::Validation(errors));
        }

        let reminder = CareReminder {
            id: geo::generate_id("reminder"),
            kind: draft.kind.trim().to_string(),
            date: draft.date,
            notes: draft.notes.trim().to_string(),
            created_at: ctx.now,
            is_active: true,
        };

        let key = StorageKey::Reminders(tag.clone());
        let mut reminders: Vec<CareReminder> = ctx.store.load_or_default(&key)?;
        reminders.push(reminder.clone());
        ctx.store.save(&key, &reminders)?;
        info!(tag = %tag, kind = %reminder.kind, date = %reminder.date, "Care reminder scheduled");

        let notes = if reminder.notes.is_empty() {
            "None"
        } else {
            &reminder.notes
        };
        ctx.notifier
            .create_issue(
                format!("Care Reminder Scheduled - {tag}"),
                format!(
                    "Care reminder scheduled for pet tracker {tag}\n\n\
                     Type: {}\nDate: {}\nNotes: {notes}\nCreated: {}",
                    reminder.kind,
                    reminder.date,
                    view::iso_timestamp(reminder.created_at)
                ),
                &["care-reminder", &tag.label()],
                Some(&tag),
            )
            .await;

        ctx.toast(ToastLevel::Success, "Care reminder scheduled successfully!");
        Ok(reminder)
    }

    /// Ways to reach the saved veterinarian.
    pub fn contact_vet(&self, ctx: &mut PageContext<'_>) -> Option<VetContact> {
        let record = &self.saved;
        if record.vet_phone.is_empty() && record.vet_email.is_empty() {
            ctx.toast(
                ToastLevel::Warning,
                "No veterinarian contact information available",
            );
            return None;
        }
        let non_empty = |s: &str| (!s.is_empty()).then(|| s.to_string());
        Some(VetContact {
            name: non_empty(&record.veterinarian_name).map(|n| format!("Dr. {n}")),
            clinic: non_empty(&record.vet_clinic_name),
            phone: non_empty(&record.vet_phone),
            email: non_empty(&record.vet_email),
        })
    }

    /// Text of a medical emergency alert.
    #[must_use]
    pub fn emergency_report(&self, ctx: &PageContext<'_>, emergency: &MedicalEmergency) -> String {
        let record = &self.saved;
        let owner = ctx.user.map(|u| &u.contact_info);
        let or_na = |s: Option<&String>| {
            s.filter(|s| !s.is_empty())
                .map_or_else(|| "Not available".to_string(), Clone::clone)
        };
        let tag = ctx.tag.map(ToString::to_string).unwrap_or_default();

        let mut out = vec![
            "MEDICAL EMERGENCY ALERT".to_string(),
            format!("Pet: {}", ctx.pet_name()),
            format!("NFC Tag: {tag}"),
            format!("Emergency Type: {}", emergency.kind),
            format!("Time: {}", view::format_date_long(ctx.now)),
            String::new(),
            "SYMPTOMS/CONDITION:".to_string(),
            emergency.symptoms.clone(),
            String::new(),
        ];

        if !emergency.location.is_empty() {
            out.push("CURRENT LOCATION:".to_string());
            out.push(emergency.location.clone());
            out.push(String::new());
        }

        out.push("OWNER CONTACT:".to_string());
        out.push(format!("Name: {}", or_na(owner.map(|c| &c.owner_name))));
        out.push(format!("Phone: {}", or_na(owner.map(|c| &c.primary_phone))));
        if let Some(email) = owner.map(|c| &c.email).filter(|e| !e.is_empty()) {
            out.push(format!("Email: {email}"));
        }
        out.push(String::new());

        if !record.veterinarian_name.is_empty() {
            out.push("VETERINARIAN:".to_string());
            out.push(format!("Name: {}", record.veterinarian_name));
            push_field(&mut out, "Clinic", &record.vet_clinic_name);
            push_field(&mut out, "Phone", &record.vet_phone);
            push_field(&mut out, "Email", &record.vet_email);
            out.push(String::new());
        }

        out.push("CRITICAL MEDICAL INFORMATION:".to_string());
        if record.has_allergies() {
            out.push("⚠️ ALLERGIES:".to_string());
            push_field(&mut out, "Food", &record.food_allergies);
            push_field(&mut out, "Medications", &record.medication_allergies);
            push_field(&mut out, "Environmental", &record.environmental_allergies);
            out.push(String::new());
        }
        if !record.medications.is_empty() {
            out.push("CURRENT MEDICATIONS:".to_string());
            for (i, med) in record.medications.iter().enumerate() {
                let mut line = format!("{}. {}", i + 1, med.name);
                if !med.dosage.is_empty() {
                    line.push_str(&format!(" - {}", med.dosage));
                }
                if !med.notes.is_empty() {
                    line.push_str(&format!(" ({})", med.notes));
                }
                out.push(line);
            }
            out.push(String::new());
        }
        if !record.chronic_conditions.is_empty() {
            out.push("CHRONIC CONDITIONS:".to_string());
            out.push(record.chronic_conditions.clone());
            out.push(String::new());
        }
        if !record.emergency_instructions.is_empty() {
            out.push("EMERGENCY INSTRUCTIONS:".to_string());
            out.push(record.emergency_instructions.clone());
            out.push(String::new());
        }
        out.join("\n")
    }

    /// Send a high-priority medical emergency alert and list who to call.
    ///
    /// # Errors
    ///
    /// Returns [`Error::TagRequired`] with no tag, or [`Error::Validation`]
    /// if no symptoms are given.
    pub async fn report_emergency(
        &self,
        ctx: &mut PageContext<'_>,
        emergency: &MedicalEmergency,
    ) -> Result<Vec<EmergencyContact>> {
        let tag = ctx.require_tag()?;
        if emergency.symptoms.trim().is_empty() {
            ctx.toast(ToastLevel::Error, "Please describe the symptoms");
            return Err(Error::Validation(FormErrors::single(
                "symptoms",
                "Symptoms/Details is required",
            )));
        }

        let report = self.emergency_report(ctx, emergency);
        ctx.notifier
            .create_issue(
                format!("🚨 MEDICAL EMERGENCY - {tag}"),
                report,
                &["medical-emergency", "high-priority", "urgent", &tag.label()],
                Some(&tag),
            )
            .await;
        info!(tag = %tag, kind = %emergency.kind, "Medical emergency reported");

        ctx.toast(ToastLevel::Success, "Medical emergency alert sent successfully!");
        Ok(self.emergency_contacts(ctx))
    }

    /// Vet, owner and emergency contact numbers that are on file.
    #[must_use]
    pub fn emergency_contacts(&self, ctx: &PageContext<'_>) -> Vec<EmergencyContact> {
        let record = &self.saved;
        let mut contacts = Vec::new();

        if !record.vet_phone.is_empty() {
            let name = if record.veterinarian_name.is_empty() {
                "Veterinarian"
            } else {
                &record.veterinarian_name
            };
            let name = if record.vet_clinic_name.is_empty() {
                name.to_string()
            } else {
                format!("{name} ({})", record.vet_clinic_name)
            };
            contacts.push(EmergencyContact {
                name,
                phone: record.vet_phone.clone(),
            });
        }

        if let Some(contact) = ctx.user.map(|u| &u.contact_info) {
            if !contact.primary_phone.is_empty() {
                contacts.push(EmergencyContact {
                    name: "Pet Owner".to_string(),
                    phone: contact.primary_phone.clone(),
                });
            }
            if !contact.emergency_phone.is_empty() {
                let name = if contact.emergency_name.is_empty() {
                    "Emergency Contact".to_string()
                } else {
                    contact.emergency_name.clone()
                };
                contacts.push(EmergencyContact {
                    name,
                    phone: contact.emergency_phone.clone(),
                });
            }
        }
        contacts
    }
}

fn medical_rules() -> RuleSet {
    let number = r"^\d+(\.\d+)?$";
    RuleSet::new()
        .field(
            "weight",
            FieldRule::new("Weight")
                .pattern(number)
                .message("Weight must be a valid number"),
        )
        .field(
            "height",
            FieldRule::new("Height")
                .pattern(number)
                .message("Height must be a valid number"),
        )
        .field(
            "microchipId",
            FieldRule::new("Microchip ID")
                .pattern(r"^[0-9A-Fa-f]{15}$")
                .message("Microchip ID must be 15 digits"),
        )
        .field(
            "vetPhone",
            FieldRule::new("Vet Phone")
                .pattern(PHONE_PATTERN)
                .message("Please enter a valid phone number"),
        )
        .field("vetEmail", FieldRule::email("Vet Email"))
}

#[cfg(test)]
mod tests {
    use super::super::contact::ContactRecord;
    use super::super::testing::Harness;
    use super::*;
    use crate::profile::ProfilePatch;

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn filled_page() -> MedicalPage {
        let mut page = MedicalPage::new();
        page.edit("weight", "32.5").unwrap();
        page.edit("weightUnit", "lbs").unwrap();
        page.edit("microchipId", "985112345678901").unwrap();
        page.edit("veterinarianName", "Patel").unwrap();
        page.edit("vetClinicName", "Riverside Animal Clinic").unwrap();
        page.edit("vetPhone", "555-222-3333").unwrap();
        page.edit("foodAllergies", "Chicken").unwrap();
        page.add_medication(Medication {
            name: "Metacam".to_string(),
            dosage: "5mg twice daily".to_string(),
            notes: "For arthritis pain".to_string(),
        });
        page.add_medication(Medication::default());
        page
    }

    #[test]
    fn test_field_rules() {
        let mut page = MedicalPage::new();
        assert_eq!(
            page.edit("weight", "heavy").unwrap(),
            FieldStatus::Invalid("Weight must be a valid number".to_string())
        );
        assert!(page.edit("height", "24").unwrap().is_valid());
        assert_eq!(
            page.edit("microchipId", "12345").unwrap(),
            FieldStatus::Invalid("Microchip ID must be 15 digits".to_string())
        );
        assert!(page.edit("microchipId", "ABCDEF012345678").unwrap().is_valid());
        // Vet phone is checked for shape only.
        assert!(page.edit("vetPhone", "555-1234").unwrap().is_valid());
        assert!(!page.edit("vetEmail", "vet@clinic").unwrap().is_valid());
        assert!(page.edit("pastSurgeries", "").unwrap().is_valid());
        assert!(matches!(
            page.edit("bloodType", "A"),
            Err(Error::UnknownField { .. })
        ));
    }

    #[test]
    fn test_normalized_drops_unnamed_medications_and_sets_vaccine_flags() {
        let mut page = filled_page();
        page.set_vaccination(VaccineType::Rabies, Some(date("2024-03-01")), true);
        page.set_vaccination(VaccineType::Lyme, Some(date("2023-05-01")), false);
        page.set_vaccination(VaccineType::Dhpp, None, true);

        let record = page.draft().normalized();
        assert_eq!(record.medications.len(), 1);
        assert_eq!(
            record.vaccination_status,
            vec![VaccineType::Rabies, VaccineType::Dhpp]
        );
        assert_eq!(record.vaccinations.len(), 2);
        assert!(record.vaccinations[&VaccineType::Rabies].is_active);
        assert!(!record.vaccinations[&VaccineType::Lyme].is_active);
        assert!(record.has_allergies());
    }

    #[test]
    fn test_vaccination_map_serializes_by_type() {
        let mut record = MedicalRecord::default();
        record.vaccinations.insert(
            VaccineType::Bordetella,
            Vaccination {
                date: date("2024-01-10"),
                is_active: true,
            },
        );
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["vaccinations"]["bordetella"]["date"], "2024-01-10");
        assert_eq!(json["vaccinations"]["bordetella"]["isActive"], true);
        let back: MedicalRecord = serde_json::from_value(json).unwrap();
        assert_eq!(back, record);
    }

    #[tokio::test]
    async fn test_save_persists_and_notifies() {
        let mut harness = Harness::new();
        let mut page = filled_page();

        let patch = page.save(&mut harness.ctx()).await.unwrap();
        assert!(matches!(patch, ProfilePatch::Medical(_)));
        harness.apply(Some(patch));
        assert_eq!(
            harness.user.as_ref().unwrap().medical_info.microchip_id,
            "985112345678901"
        );

        let stored: MedicalRecord = harness
            .store
            .load(&StorageKey::Medical(harness.tag.clone().unwrap()))
            .unwrap()
            .unwrap();
        assert_eq!(stored.medications.len(), 1);

        let events = harness.issues.events();
        assert_eq!(events[0].title, "Medical Information Updated - Rex2024");
        assert_eq!(events[0].labels, vec!["medical-update", "tag-Rex2024"]);
        assert!(events[0].body.contains("Pet: Unknown"));
        assert!(events[0].body.contains("Weight: 32.5 lbs"));
        assert!(events[0].body.contains("Medications: 1 listed"));
        assert!(events[0].body.contains("Allergies: Yes"));
        assert!(!page.has_unsaved_changes());
    }

    #[tokio::test]
    async fn test_invalid_save_writes_nothing() {
        let mut harness = Harness::new();
        let mut page = filled_page();
        page.edit("microchipId", "not-a-chip").unwrap();

        let err = page.save(&mut harness.ctx()).await.unwrap_err();
        assert!(err.is_validation());
        assert!(harness
            .store
            .load::<MedicalRecord>(&StorageKey::Medical(harness.tag.clone().unwrap()))
            .unwrap()
            .is_none());
        assert!(harness.issues.events().is_empty());
    }

    #[tokio::test]
    async fn test_auto_save_and_destroy() {
        let mut harness = Harness::new();
        let key = StorageKey::Medical(harness.tag.clone().unwrap());
        let mut page = MedicalPage::new();
        page.init(&mut harness.ctx()).unwrap();
        assert!(page.auto_save(&mut harness.ctx()).unwrap().is_none());

        page.edit("weight", "30").unwrap();
        assert!(page.auto_save(&mut harness.ctx()).unwrap().is_some());
        assert_eq!(harness.store.load::<MedicalRecord>(&key).unwrap().unwrap().weight, "30");

        page.edit("height", "tall").unwrap();
        assert!(page.destroy(&mut harness.ctx()).unwrap().is_none());
        assert!(harness.store.load::<MedicalRecord>(&key).unwrap().unwrap().height.is_empty());
        assert!(harness.issues.events().is_empty());
    }

    #[tokio::test]
    async fn test_report_and_export() {
        let mut harness = Harness::new();
        let mut page = MedicalPage::new();
        assert!(page.export_report(&mut harness.ctx()).is_none());
        assert_eq!(harness.last_toast().unwrap().message, "No medical data to export");

        let mut filled = filled_page();
        filled.save(&mut harness.ctx()).await.unwrap();
        page = filled;

        let export = page.export_report(&mut harness.ctx()).unwrap();
        assert!(export.file_name.starts_with("pet-medical-record-Rex2024-"));
        assert!(export.file_name.ends_with(".txt"));

        let report = export.contents;
        assert!(report.starts_with("MEDICAL RECORD - Pet\nNFC Tag ID: Rex2024\nGenerated: "));
        assert!(report.contains("--- BASIC INFORMATION ---\nWeight: 32.5 lbs\nMicrochip ID: 985112345678901"));
        assert!(report.contains("1. Metacam\n   Dosage: 5mg twice daily\n   Notes: For arthritis pain"));
        assert!(report.contains("Food Allergies: Chicken"));
        assert!(!report.contains("No known allergies"));
        assert!(report.contains("--- EMERGENCY INFORMATION ---"));

        let card = page.medical_card(&mut harness.ctx()).unwrap();
        assert!(card.contains("Veterinarian: 555-222-3333\nOwner: Not available"));
    }

    #[test]
    fn test_report_for_sparse_record() {
        let record = MedicalRecord {
            weight: "12".to_string(),
            ..MedicalRecord::default()
        };
        let report = medical_report(&record, "Rex", "Rex2024", Utc::now());
        assert!(report.contains("Weight: 12\n"));
        assert!(report.contains("No current medications"));
        assert!(report.contains("No known allergies"));
    }

    #[test]
    fn test_vaccination_summary() {
        let today = date("2024-06-01");
        assert_eq!(
            VaccinationState::classify(date("2024-01-01"), today),
            VaccinationState::Current
        );
        assert_eq!(
            VaccinationState::classify(date("2023-07-01"), today),
            VaccinationState::DueSoon
        );

        let mut vaccinations = BTreeMap::new();
        vaccinations.insert(
            VaccineType::Rabies,
            Vaccination {
                date: date("2023-07-01"),
                is_active: true,
            },
        );
        let summary = VaccinationSummary::of(&vaccinations, today);
        assert_eq!(summary.render(), "RABIES: Jul 1, 2023 (Due Soon)");
        assert_eq!(
            VaccinationSummary::of(&BTreeMap::new(), today).render(),
            "Vaccination status will appear here"
        );
    }

    #[tokio::test]
    async fn test_schedule_reminder() {
        let mut harness = Harness::new();
        let page = MedicalPage::new();
        let reminder = page
            .schedule_reminder(
                &mut harness.ctx(),
                ReminderDraft {
                    kind: "checkup".to_string(),
                    date: date("2025-02-01"),
                    notes: String::new(),
                },
            )
            .await
            .unwrap();
        assert!(reminder.id.starts_with("reminder_"));
        assert!(reminder.is_active);

        let saved = page.reminders(&mut harness.ctx()).unwrap();
        assert_eq!(saved, vec![reminder]);

        let events = harness.issues.events();
        assert_eq!(events[0].title, "Care Reminder Scheduled - Rex2024");
        assert_eq!(events[0].labels, vec!["care-reminder", "tag-Rex2024"]);
        assert!(events[0].body.contains("Type: checkup\nDate: 2025-02-01\nNotes: None"));
    }

    #[tokio::test]
    async fn test_contact_vet() {
        let mut harness = Harness::new();
        let mut page = MedicalPage::new();
        assert!(page.contact_vet(&mut harness.ctx()).is_none());

        page.edit("veterinarianName", "Patel").unwrap();
        page.edit("vetEmail", "desk@riverside.vet").unwrap();
        page.save(&mut harness.ctx()).await.unwrap();

        let vet = page.contact_vet(&mut harness.ctx()).unwrap();
        assert_eq!(vet.name.as_deref(), Some("Dr. Patel"));
        assert_eq!(vet.phone, None);
        assert_eq!(vet.render(), "Contact Veterinarian\nDr. Patel\nEmail desk@riverside.vet");
    }

    #[tokio::test]
    async fn test_report_emergency() {
        let mut harness = Harness::new();
        harness.apply(Some(ProfilePatch::Contact(ContactRecord {
            pet_name: "Rex".to_string(),
            owner_name: "Sam".to_string(),
            primary_phone: "555-123-4567".to_string(),
            emergency_phone: "555-987-6543".to_string(),
            ..ContactRecord::default()
        })));
        let mut page = filled_page();
        page.save(&mut harness.ctx()).await.unwrap();

        let contacts = page
            .report_emergency(
                &mut harness.ctx(),
                &MedicalEmergency {
                    kind: EmergencyKind::AllergicReaction,
                    symptoms: "Swollen face".to_string(),
                    location: String::new(),
                },
            )
            .await
            .unwrap();

        let events = harness.issues.events();
        let alert = events.last().unwrap();
        assert_eq!(alert.title, "🚨 MEDICAL EMERGENCY - Rex2024");
        assert_eq!(
            alert.labels,
            vec!["medical-emergency", "high-priority", "urgent", "tag-Rex2024"]
        );
        assert!(alert.body.starts_with("MEDICAL EMERGENCY ALERT\nPet: Rex\nNFC Tag: Rex2024\nEmergency Type: allergic-reaction"));
        assert!(alert.body.contains("⚠️ ALLERGIES:\nFood: Chicken"));
        assert!(alert.body.contains("1. Metacam - 5mg twice daily (For arthritis pain)"));
        assert!(!alert.body.contains("CURRENT LOCATION"));

        assert_eq!(
            contacts,
            vec![
                EmergencyContact {
                    name: "Patel (Riverside Animal Clinic)".to_string(),
                    phone: "555-222-3333".to_string(),
                },
                EmergencyContact {
                    name: "Pet Owner".to_string(),
                    phone: "555-123-4567".to_string(),
                },
                EmergencyContact {
                    name: "Emergency Contact".to_string(),
                    phone: "555-987-6543".to_string(),
                },
            ]
        );
    }

    #[tokio::test]
    async fn test_report_emergency_requires_symptoms() {
        let mut harness = Harness::new();
        let page = MedicalPage::new();
        let err = page
            .report_emergency(
                &mut harness.ctx(),
                &MedicalEmergency {
                    kind: EmergencyKind::Other,
                    symptoms: "  ".to_string(),
                    location: String::new(),
                },
            )
            .await
            .unwrap_err();
        assert!(err.is_validation());
        assert!(harness.issues.events().is_empty());
    }

    #[test]
    fn test_parse_tokens() {
        assert_eq!("dhpp".parse::<VaccineType>().unwrap(), VaccineType::Dhpp);
        assert_eq!(
            "allergic-reaction".parse::<EmergencyKind>().unwrap(),
            EmergencyKind::AllergicReaction
        );
        assert!("flu".parse::<VaccineType>().is_err());
    }
}
