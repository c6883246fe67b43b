//! # Domain Identity Newtypes
//!
//! Newtype wrappers for the identifiers of the record card engine.
//! These prevent accidental identifier confusion: you cannot pass a
//! `ThemeId` where a `GroupId` is expected.
//!
//! Numeric identifiers serialize transparently as plain integers so that
//! persisted rows and scenario files stay readable.

use serde::{Deserialize, Serialize};

/// Identifier of a responsibility group (a node of the group tree).
///
/// The numeric value is what appears in materialized plates (`"1-4-9-"`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GroupId(pub u64);

/// Identifier of a record card.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordCardId(pub u64);

/// Identifier of a theme (element detail).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ThemeId(pub u64);

/// Identifier of a city district, used by district-scoped derivations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DistrictId(pub u16);

/// Login of the user acting on a record. Scheduler runs use [`UserId::system()`].
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub String);

impl GroupId {
    /// The raw numeric value.
    pub fn get(&self) -> u64 {
        self.0
    }
}

impl RecordCardId {
    /// The raw numeric value.
    pub fn get(&self) -> u64 {
        self.0
    }
}

impl ThemeId {
    /// The raw numeric value.
    pub fn get(&self) -> u64 {
        self.0
    }
}

impl UserId {
    /// Create a user identifier from a login.
    pub fn new(login: impl Into<String>) -> Self {
        Self(login.into())
    }

    /// The identity used for automatic actions (derivations, sweeps).
    pub fn system() -> Self {
        Self("system".to_string())
    }

    /// Access the login string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for GroupId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "group:{}", self.0)
    }
}

impl std::fmt::Display for RecordCardId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "record:{}", self.0)
    }
}

impl std::fmt::Display for ThemeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "theme:{}", self.0)
    }
}

impl std::fmt::Display for DistrictId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "district:{}", self.0)
    }
}

impl std::fmt::Display for UserId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}
