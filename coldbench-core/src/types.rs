// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Newtype wrappers for validated inputs.
//!
//! Following the "Newtype" pattern in Rust to ensure valid state by construction.
//! All types validate their invariants at creation time.

use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::HardValidationError;

/// Maximum length of a deployable function name.
const MAX_VARIANT_NAME_LEN: usize = 63;

/// Validated variant name.
/// Lowercase alphanumeric with hyphens, starting with a letter, max 63 chars.
/// The name doubles as the remote function name, so it follows the
/// platform's naming rules.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct VariantName(String);

impl VariantName {
    /// Create a new VariantName with validation.
    pub fn new(name: impl Into<String>) -> Result<Self, HardValidationError> {
        let name = name.into();

        if name.is_empty() {
            return Err(HardValidationError::InvalidFieldValue {
                field: "name",
                value: name,
                reason: "Variant name cannot be empty".to_string(),
            });
        }

        if name.len() > MAX_VARIANT_NAME_LEN {
            return Err(HardValidationError::InvalidFieldValue {
                field: "name",
                value: name.clone(),
                reason: format!(
                    "Variant name too long: {} chars (max {})",
                    name.len(),
                    MAX_VARIANT_NAME_LEN
                ),
            });
        }

        if !name.starts_with(|c: char| c.is_ascii_lowercase()) {
            return Err(HardValidationError::InvalidFieldValue {
                field: "name",
                value: name,
                reason: "Variant name must start with a lowercase letter".to_string(),
            });
        }

        if !name
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
        {
            return Err(HardValidationError::InvalidFieldValue {
                field: "name",
                value: name,
                reason: "Variant name must contain only lowercase letters, digits, and hyphens"
                    .to_string(),
            });
        }

        if name.ends_with('-') {
            return Err(HardValidationError::InvalidFieldValue {
                field: "name",
                value: name,
                reason: "Variant name cannot end with a hyphen".to_string(),
            });
        }

        Ok(Self(name))
    }

    /// Name of the `index`-th replica of this variant (1-based).
    pub fn replica(&self, index: usize) -> Result<Self, HardValidationError> {
        Self::new(format!("{}-{:03}", self.0, index))
    }

    /// Get the inner string value.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for VariantName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<String> for VariantName {
    type Error = HardValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<VariantName> for String {
    fn from(name: VariantName) -> Self {
        name.0
    }
}

/// Opaque identifier of a deployed function, as assigned by the provider.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DeploymentId(String);

impl DeploymentId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DeploymentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Hosting platform generation a variant is deployed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Generation {
    Gen1,
    #[default]
    Gen2,
}

impl Generation {
    pub fn parse(value: &str) -> Result<Self, HardValidationError> {
        match value.to_ascii_lowercase().as_str() {
            "gen1" | "1" => Ok(Self::Gen1),
            "gen2" | "2" => Ok(Self::Gen2),
            _ => Err(HardValidationError::InvalidFieldValue {
                field: "generation",
                value: value.to_string(),
                reason: "Generation must be gen1 or gen2".to_string(),
            }),
        }
    }
}

impl fmt::Display for Generation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Gen1 => write!(f, "gen1"),
            Self::Gen2 => write!(f, "gen2"),
        }
    }
}

/// Validated runtime identifier, e.g. `nodejs20`.
/// Must be a lowercase language name followed by a version number.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RuntimeVersion(String);

impl RuntimeVersion {
    pub fn new(runtime: impl Into<String>) -> Result<Self, HardValidationError> {
        let runtime = runtime.into();

        let language_len = runtime
            .chars()
            .take_while(|c| c.is_ascii_lowercase())
            .count();
        let version = &runtime[language_len..];

        if language_len == 0 || version.is_empty() || !version.chars().all(|c| c.is_ascii_digit())
        {
            return Err(HardValidationError::InvalidFieldValue {
                field: "runtime",
                value: runtime,
                reason: "Runtime must look like <language><version>, e.g. nodejs20".to_string(),
            });
        }

        Ok(Self(runtime))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RuntimeVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<String> for RuntimeVersion {
    type Error = HardValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<RuntimeVersion> for String {
    fn from(runtime: RuntimeVersion) -> Self {
        runtime.0
    }
}

/// Reference to the source bundle uploaded on deploy.
/// Must be an existing directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "PathBuf", into = "PathBuf")]
pub struct SourceBundle(PathBuf);

impl SourceBundle {
    /// Create a new SourceBundle with existence validation.
    pub fn new(path: impl Into<PathBuf>) -> Result<Self, HardValidationError> {
        let path = path.into();

        if !path.is_dir() {
            return Err(HardValidationError::InvalidFieldValue {
                field: "source",
                value: path.display().to_string(),
                reason: "Source bundle must be an existing directory".to_string(),
            });
        }

        Ok(Self(path))
    }

    /// Create without validation (for testing or trusted paths).
    pub fn new_unchecked(path: impl Into<PathBuf>) -> Self {
        Self(path.into())
    }

    /// Get the inner path.
    pub fn as_path(&self) -> &std::path::Path {
        &self.0
    }
}

impl fmt::Display for SourceBundle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.display())
    }
}

impl TryFrom<PathBuf> for SourceBundle {
    type Error = HardValidationError;

    fn try_from(value: PathBuf) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<SourceBundle> for PathBuf {
    fn from(source: SourceBundle) -> Self {
        source.0
    }
}
