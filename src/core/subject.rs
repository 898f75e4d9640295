// Subject validation: the image references a scan can be requested for.
// Input is never rewritten; anything that would need trimming or
// lower-casing to become valid is rejected instead.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{KdashError, Result};

/// Maximum image reference length
const MAX_SUBJECT_LENGTH: usize = 255;

/// `repo[/path]*[:tag]` with lowercase repository components
static IMAGE_REFERENCE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^[a-z0-9]+(?:[._-][a-z0-9]+)*(?:/[a-z0-9]+(?:[._-][a-z0-9]+)*)*(?::[a-zA-Z0-9][a-zA-Z0-9._-]*)?$",
    )
    .expect("image reference pattern is valid")
});

/// A validated subject identifier (an image reference).
///
/// Two keys are equal only if their strings are identical.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ScanKey(String);

impl ScanKey {
    pub fn parse(raw: &str) -> Result<Self> {
        if raw.is_empty() {
            return Err(KdashError::invalid_subject("image name is required"));
        }

        if raw.len() > MAX_SUBJECT_LENGTH {
            return Err(KdashError::invalid_subject(format!(
                "image name is too long ({} characters, max {})",
                raw.len(),
                MAX_SUBJECT_LENGTH
            )));
        }

        if raw.chars().any(|c| c.is_whitespace() || c.is_control()) {
            return Err(KdashError::invalid_subject(format!(
                "image name contains whitespace or control characters: {:?}",
                raw
            )));
        }

        if !IMAGE_REFERENCE.is_match(raw) {
            return Err(KdashError::invalid_subject(format!(
                "invalid image name format: {}",
                raw
            )));
        }

        Ok(Self(raw.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ScanKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for ScanKey {
    type Error = KdashError;

    fn try_from(value: String) -> Result<Self> {
        Self::parse(&value)
    }
}

impl From<ScanKey> for String {
    fn from(key: ScanKey) -> Self {
        key.0
    }
}

impl std::str::FromStr for ScanKey {
    type Err = KdashError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}
