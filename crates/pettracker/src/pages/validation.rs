//! Rule-driven form field validation.
//!
//! Each field maps to a [`FieldRule`]. A field is valid iff every rule that
//! applies passes; rules are checked in order (required, minimum length,
//! pattern, minimum digit count) and the first failure supplies the message.

use std::collections::BTreeMap;
use std::fmt;

use regex::Regex;

/// Raw form values keyed by field name.
pub type FormInput = BTreeMap<String, String>;

/// Phone numbers: digits, spaces, dashes and parentheses, optional leading `+`.
pub const PHONE_PATTERN: &str = r"^\+?[\d\s\-\(\)]+$";

/// Minimal email shape.
pub const EMAIL_PATTERN: &str = r"^[^\s@]+@[^\s@]+\.[^\s@]+$";

/// Validation rules for one field.
#[derive(Debug, Clone)]
pub struct FieldRule {
    label: &'static str,
    required: bool,
    min_length: Option<usize>,
    pattern: Option<Regex>,
    min_digits: Option<usize>,
    message: Option<&'static str>,
}

impl FieldRule {
    /// An optional field with no checks yet, shown as `label` in messages.
    #[must_use]
    pub fn new(label: &'static str) -> Self {
        Self {
            label,
            required: false,
            min_length: None,
            pattern: None,
            min_digits: None,
            message: None,
        }
    }

    /// The field must be non-empty.
    #[must_use]
    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    /// Non-empty values need at least `len` characters.
    #[must_use]
    pub fn min_length(mut self, len: usize) -> Self {
        self.min_length = Some(len);
        self
    }

    /// Non-empty values must match `pattern`.
    ///
    /// # Panics
    ///
    /// Panics if the regex pattern is invalid.
    #[must_use]
    pub fn pattern(mut self, pattern: &str) -> Self {
        self.pattern = Some(Regex::new(pattern).expect("Invalid regex pattern"));
        self
    }

    /// Non-empty values need at least `count` ASCII digits.
    #[must_use]
    pub fn min_digits(mut self, count: usize) -> Self {
        self.min_digits = Some(count);
        self
    }

    /// Message for pattern and digit failures.
    #[must_use]
    pub fn message(mut self, message: &'static str) -> Self {
        self.message = Some(message);
        self
    }

    /// A phone number field.
    #[must_use]
    pub fn phone(label: &'static str) -> Self {
        Self::new(label)
            .pattern(PHONE_PATTERN)
            .min_digits(10)
            .message("Please enter a valid phone number")
    }

    /// An email field.
    #[must_use]
    pub fn email(label: &'static str) -> Self {
        Self::new(label)
            .pattern(EMAIL_PATTERN)
            .message("Please enter a valid email address")
    }

    /// The label used in messages.
    #[must_use]
    pub fn label(&self) -> &'static str {
        self.label
    }

    /// Check one value. Surrounding whitespace is ignored.
    #[must_use]
    pub fn check(&self, value: &str) -> FieldStatus {
        let value = value.trim();

        if value.is_empty() {
            return if self.required {
                FieldStatus::Invalid(format!("{} is required", self.label))
            } else {
                FieldStatus::Valid { marked: false }
            };
        }

        if let Some(min) = self.min_length {
            if value.chars().count() < min {
                return FieldStatus::Invalid(format!(
                    "{} must be at least {min} characters",
                    self.label
                ));
            }
        }

        if let Some(pattern) = &self.pattern {
            if !pattern.is_match(value) {
                return FieldStatus::Invalid(self.format_message());
            }
        }

        if let Some(min) = self.min_digits {
            if value.chars().filter(char::is_ascii_digit).count() < min {
                return FieldStatus::Invalid(self.format_message());
            }
        }

        FieldStatus::Valid { marked: true }
    }

    fn format_message(&self) -> String {
        self.message.map_or_else(
            || format!("Please enter a valid {}", self.label.to_lowercase()),
            ToString::to_string,
        )
    }
}

/// Outcome of validating one field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldStatus {
    /// The value passes; `marked` when it is non-empty and gets a positive marker.
    Valid {
        /// Show the positive marker.
        marked: bool,
    },
    /// The value fails with this inline message.
    Invalid(String),
}

impl FieldStatus {
    /// Whether the field passed.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        matches!(self, Self::Valid { .. })
    }
}

/// Field-level errors for a whole form, keyed by field name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FormErrors {
    errors: BTreeMap<String, String>,
}

impl FormErrors {
    /// Whether no field failed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    /// Errors for a single field.
    #[must_use]
    pub fn single(field: &str, message: impl Into<String>) -> Self {
        let mut errors = Self::default();
        errors.insert(field, message.into());
        errors
    }

    /// Number of failing fields.
    #[must_use]
    pub fn len(&self) -> usize {
        self.errors.len()
    }

    /// The message for `field`, if it failed.
    #[must_use]
    pub fn get(&self, field: &str) -> Option<&str> {
        self.errors.get(field).map(String::as_str)
    }

    /// Iterate `(field, message)` pairs in field order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.errors.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    fn insert(&mut self, field: &str, message: String) {
        self.errors.insert(field.to_string(), message);
    }
}

impl fmt::Display for FormErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let messages: Vec<&str> = self.errors.values().map(String::as_str).collect();
        f.write_str(&messages.join("; "))
    }
}

/// The rules for one form.
#[derive(Debug, Clone, Default)]
pub struct RuleSet {
    rules: BTreeMap<&'static str, FieldRule>,
}

impl RuleSet {
    /// An empty rule set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add the rule for `field`.
    #[must_use]
    pub fn field(mut self, field: &'static str, rule: FieldRule) -> Self {
        self.rules.insert(field, rule);
        self
    }

    /// Whether `field` has a rule.
    #[must_use]
    pub fn has_rule(&self, field: &str) -> bool {
        self.rules.contains_key(field)
    }

    /// Validate one field. Fields without rules are always valid and unmarked.
    #[must_use]
    pub fn validate_field(&self, field: &str, value: &str) -> FieldStatus {
        self.rules
            .get(field)
            .map_or(FieldStatus::Valid { marked: false }, |rule| rule.check(value))
    }

    /// Validate every ruled field; missing values count as empty.
    #[must_use]
    pub fn validate_form(&self, input: &FormInput) -> FormErrors {
        let mut errors = FormErrors::default();
        for (field, rule) in &self.rules {
            let value = input.get(*field).map_or("", String::as_str);
            if let FieldStatus::Invalid(message) = rule.check(value) {
                errors.insert(field, message);
            }
        }
        errors
    }
}
