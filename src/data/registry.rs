use reqwest::Url;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::error::PipelineError;

/// One configured remote dataset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceEntry {
    /// Stable identifier, e.g. `united_kingdom`.
    pub key: String,
    /// Display name, e.g. `United Kingdom`.
    pub label: String,
    /// Absolute URL of the delimited file.
    pub locator: String,
}

impl SourceEntry {
    pub fn new(key: impl Into<String>, label: impl Into<String>, locator: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            label: label.into(),
            locator: locator.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    #[error("source key '{0}' is configured more than once")]
    DuplicateKey(String),
    #[error("source key must not be empty")]
    EmptyKey,
    #[error("source '{key}' has an invalid locator '{locator}': {reason}")]
    InvalidLocator {
        key: String,
        locator: String,
        reason: String,
    },
}

/// Lowercase a requested key and turn each whitespace run into one `_`.
pub fn normalize_key(key: &str) -> String {
    let mut out = String::with_capacity(key.len());
    let mut in_space = false;
    for c in key.chars() {
        if c.is_whitespace() {
            if !in_space {
                out.push('_');
            }
            in_space = true;
        } else {
            out.extend(c.to_lowercase());
            in_space = false;
        }
    }
    out
}

/// Ordered, immutable list of sources. Order is display order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<SourceEntry>", into = "Vec<SourceEntry>")]
pub struct SourceRegistry {
    entries: Vec<SourceEntry>,
}

impl SourceRegistry {
    /// Validate keys (non-empty, unique) and locators (absolute URLs).
    pub fn new(entries: Vec<SourceEntry>) -> Result<Self, RegistryError> {
        for (i, entry) in entries.iter().enumerate() {
            if entry.key.trim().is_empty() {
                return Err(RegistryError::EmptyKey);
            }
            if entries[..i].iter().any(|e| e.key == entry.key) {
                return Err(RegistryError::DuplicateKey(entry.key.clone()));
            }
            Url::parse(&entry.locator).map_err(|e| RegistryError::InvalidLocator {
                key: entry.key.clone(),
                locator: entry.locator.clone(),
                reason: e.to_string(),
            })?;
        }
        Ok(Self { entries })
    }

    /// Compiled-in source lists skip validation; the config tests cover them.
    pub(crate) fn builtin(entries: Vec<SourceEntry>) -> Self {
        Self { entries }
    }

    /// Look up a source by key.
    ///
    /// An exact match wins; otherwise the key is compared in its
    /// [`normalize_key`] form, so `United Kingdom` finds `united_kingdom`.
    pub fn get(&self, key: &str) -> Result<&SourceEntry, PipelineError> {
        if let Some(entry) = self.entries.iter().find(|e| e.key == key) {
            return Ok(entry);
        }
        let normalized = normalize_key(key);
        self.entries
            .iter()
            .find(|e| e.key == normalized)
            .ok_or_else(|| PipelineError::SourceNotFound {
                key: key.to_string(),
            })
    }

    /// All sources in declared order.
    pub fn entries(&self) -> &[SourceEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl TryFrom<Vec<SourceEntry>> for SourceRegistry {
    type Error = RegistryError;

    fn try_from(entries: Vec<SourceEntry>) -> Result<Self, Self::Error> {
        Self::new(entries)
    }
}

impl From<SourceRegistry> for Vec<SourceEntry> {
    fn from(registry: SourceRegistry) -> Self {
        registry.entries
    }
}
