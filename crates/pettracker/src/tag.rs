//! NFC tag identifiers.
//!
//! A tag id is the primary key for every per-pet record. It is bound once
//! per session and every storage key is namespaced by it.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Minimum accepted tag id length.
pub const MIN_TAG_LEN: usize = 6;

/// Maximum accepted tag id length.
pub const MAX_TAG_LEN: usize = 20;

/// A validated tag identifier: 6-20 ASCII alphanumeric characters.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TagId(String);

impl TagId {
    /// Parse a tag id exactly as entered.
    ///
    /// Leading and trailing whitespace is ignored; anything else outside
    /// `[A-Za-z0-9]` is rejected.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidTag`] if the input is not 6-20 alphanumerics.
    pub fn parse(input: &str) -> Result<Self> {
        let trimmed = input.trim();
        if is_valid_tag(trimmed) {
            Ok(Self(trimmed.to_string()))
        } else {
            Err(Error::InvalidTag {
                input: input.to_string(),
            })
        }
    }

    /// Build a tag id from a hardware serial number.
    ///
    /// NFC readers report serials like `04:a2:5b:1c:9f:61:80`; separators are
    /// dropped before validation.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidTag`] if what remains is not a valid tag id.
    pub fn from_serial(serial: &str) -> Result<Self> {
        let compact: String = serial
            .chars()
            .filter(|c| !matches!(c, ':' | '-' | ' '))
            .collect();
        Self::parse(&compact).map_err(|_| Error::InvalidTag {
            input: serial.to_string(),
        })
    }

    /// The tag id as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Issue label used to group notifications for this tag.
    #[must_use]
    pub fn label(&self) -> String {
        format!("tag-{}", self.0)
    }
}

/// Check whether a string is an acceptable tag id.
#[must_use]
pub fn is_valid_tag(candidate: &str) -> bool {
    (MIN_TAG_LEN..=MAX_TAG_LEN).contains(&candidate.len())
        && candidate.chars().all(|c| c.is_ascii_alphanumeric())
}

impl fmt::Display for TagId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for TagId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl TryFrom<String> for TagId {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        Self::parse(&value)
    }
}

impl From<TagId> for String {
    fn from(tag: TagId) -> Self {
        tag.0
    }
}

impl AsRef<str> for TagId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_valid() {
        let tag = TagId::parse("ABC123").unwrap();
        assert_eq!(tag.as_str(), "ABC123");
        assert_eq!(tag.to_string(), "ABC123");
    }

    #[test]
    fn test_parse_trims_whitespace() {
        let tag = TagId::parse("  dog42abc \n").unwrap();
        assert_eq!(tag.as_str(), "dog42abc");
    }

    #[test]
    fn test_parse_length_bounds() {
        assert!(TagId::parse("abc12").is_err());
        assert!(TagId::parse("abc123").is_ok());
        assert!(TagId::parse(&"a".repeat(20)).is_ok());
        assert!(TagId::parse(&"a".repeat(21)).is_err());
    }

    #[test]
    fn test_parse_rejects_punctuation() {
        let err = TagId::parse("abc-123").unwrap_err();
        assert!(matches!(err, Error::InvalidTag { .. }));
        assert!(TagId::parse("abc 123").is_err());
        assert!(TagId::parse("täg1234").is_err());
    }

    #[test]
    fn test_from_serial_strips_separators() {
        let tag = TagId::from_serial("04:a2:5b:1c:9f:61:80").unwrap();
        assert_eq!(tag.as_str(), "04a25b1c9f6180");
    }

    #[test]
    fn test_from_serial_reports_original_input() {
        let err = TagId::from_serial("04:a2").unwrap_err();
        assert!(err.to_string().contains("04:a2"));
    }

    #[test]
    fn test_label() {
        let tag = TagId::parse("Rex2024").unwrap();
        assert_eq!(tag.label(), "tag-Rex2024");
    }

    #[test]
    fn test_serde_round_trip_validates() {
        let tag = TagId::parse("Rex2024").unwrap();
        let json = serde_json::to_string(&tag).unwrap();
        assert_eq!(json, "\"Rex2024\"");

        let back: TagId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, tag);

        let bad: std::result::Result<TagId, _> = serde_json::from_str("\"no\"");
        assert!(bad.is_err());
    }
}
