//! The profile store.
//!
//! This module owns the data model persisted in `~/.chcc.yaml`:
//! - An ordered list of profiles (name, base URL, token)
//! - The name of the default profile
//!
//! All mutations are in-memory; callers decide when to `save`. The file keeps
//! the keys `api_sites` / `default_api_site` so existing config files load
//! unchanged.

use anyhow::{Result, bail};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::StoreError;
use crate::fs_utils::write_atomic;

/// Longest profile name accepted by `add`
const MAX_NAME_LEN: usize = 64;

/// A named API endpoint configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    pub name: String,
    pub base_url: String,
    pub token: String,
}

impl Profile {
    /// Leading part of the token for display, never more than `max_chars`
    pub fn token_preview(&self, max_chars: usize) -> String {
        let prefix: String = self.token.chars().take(max_chars).collect();
        format!("{}...", prefix)
    }
}

/// Result of `Store::add_or_update`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Upsert {
    /// A new profile was appended
    Added {
        /// The profile also became the default
        became_default: bool,
    },
    /// An existing profile had its URL and token replaced
    Updated,
}

/// Consistency problems a hand-edited config file can contain
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreIssue {
    DuplicateName(String),
    EmptyName { index: usize },
    DanglingDefault(String),
}

impl std::fmt::Display for StoreIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::DuplicateName(name) => write!(f, "profile name '{}' appears more than once", name),
            Self::EmptyName { index } => write!(f, "profile #{} has an empty name", index + 1),
            Self::DanglingDefault(name) => {
                write!(f, "default profile '{}' does not match any profile", name)
            }
        }
    }
}

/// Profiles plus the default selection, as stored on disk
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Store {
    #[serde(rename = "api_sites", default)]
    pub profiles: Vec<Profile>,

    #[serde(rename = "default_api_site", default)]
    pub default_name: String,
}

impl Store {
    /// Read the store from `path`, returning an empty store if it doesn't exist
    pub fn load(path: &Path) -> Result<Self, StoreError> {
        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Self::default()),
            Err(source) => {
                return Err(StoreError::Io {
                    path: path.to_path_buf(),
                    source,
                });
            }
        };

        if content.trim().is_empty() {
            return Ok(Self::default());
        }

        serde_yaml::from_str(&content).map_err(|source| StoreError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Rewrite the whole file at `path` with this store
    pub fn save(&self, path: &Path) -> Result<(), StoreError> {
        let content = serde_yaml::to_string(self).map_err(StoreError::Serialize)?;
        write_atomic(path, content.as_bytes()).map_err(|source| StoreError::Io {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn is_empty(&self) -> bool {
        self.profiles.is_empty()
    }

    pub fn len(&self) -> usize {
        self.profiles.len()
    }

    /// Profile names in stored order
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.profiles.iter().map(|p| p.name.as_str())
    }

    /// Add a profile, or replace the URL and token of an existing one in place
    ///
    /// The first profile added to an empty store with no default becomes the
    /// default.
    pub fn add_or_update(&mut self, name: &str, base_url: &str, token: &str) -> Upsert {
        if let Some(existing) = self.profiles.iter_mut().find(|p| p.name == name) {
            existing.base_url = base_url.to_string();
            existing.token = token.to_string();
            return Upsert::Updated;
        }

        let became_default = self.profiles.is_empty() && self.default_name.is_empty();
        self.profiles.push(Profile {
            name: name.to_string(),
            base_url: base_url.to_string(),
            token: token.to_string(),
        });
        if became_default {
            self.default_name = name.to_string();
        }

        Upsert::Added { became_default }
    }

    pub fn get(&self, name: &str) -> Option<&Profile> {
        self.profiles.iter().find(|p| p.name == name)
    }

    /// The default profile, falling back to the first profile
    pub fn default_profile(&self) -> Option<&Profile> {
        self.get(&self.default_name).or_else(|| self.profiles.first())
    }

    /// Select `name` as the default. Returns false (and changes nothing) if
    /// no such profile exists.
    pub fn set_default(&mut self, name: &str) -> bool {
        if self.get(name).is_none() {
            return false;
        }
        self.default_name = name.to_string();
        true
    }

    /// Remove a profile, keeping the order of the rest
    ///
    /// Removing the default moves it to the first remaining profile, or
    /// clears it when none remain.
    pub fn remove(&mut self, name: &str) -> bool {
        let Some(index) = self.profiles.iter().position(|p| p.name == name) else {
            return false;
        };
        self.profiles.remove(index);

        if self.default_name == name {
            self.default_name = self
                .profiles
                .first()
                .map(|p| p.name.clone())
                .unwrap_or_default();
        }
        true
    }

    /// Inconsistencies a hand-edited file may have introduced
    pub fn issues(&self) -> Vec<StoreIssue> {
        let mut issues = Vec::new();
        let mut seen = std::collections::HashSet::new();

        for (index, profile) in self.profiles.iter().enumerate() {
            if profile.name.is_empty() {
                issues.push(StoreIssue::EmptyName { index });
            } else if !seen.insert(profile.name.as_str()) {
                issues.push(StoreIssue::DuplicateName(profile.name.clone()));
            }
        }

        if !self.default_name.is_empty() && self.get(&self.default_name).is_none() {
            issues.push(StoreIssue::DanglingDefault(self.default_name.clone()));
        }

        issues
    }
}

/// Validate a profile name given on the command line
pub fn validate_profile_name(name: &str) -> Result<()> {
    if name.trim().is_empty() {
        bail!("Profile name cannot be empty");
    }

    if name.trim() != name {
        bail!("Profile name cannot start or end with whitespace");
    }

    if name.chars().count() > MAX_NAME_LEN {
        bail!("Profile name cannot be longer than {} characters", MAX_NAME_LEN);
    }

    if name.chars().any(char::is_control) {
        bail!("Profile name cannot contain control characters");
    }

    Ok(())
}
