//! # Parameter Store
//!
//! Named settings (day thresholds, response windows) consumed by the
//! engine. The engine only sees the [`ParameterStore`] trait; [`Parameters`]
//! is the in-memory implementation, loadable from YAML.
//!
//! A missing or malformed threshold never fails an operation: the lenient
//! lookup logs a warning and falls back to the documented default.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::IrisError;

/// Parameter keys and their documented defaults.
pub mod keys {
    /// Days a coordinator may still move a record out of its ambit.
    pub const DIES_CANVI_TEMATICA_FORA_AREA_COORD: &str = "DIES_CANVI_TEMATICA_FORA_AREA_COORD";
    /// Days any other group may still move a record out of its ambit.
    pub const DIES_CANVI_TEMATICA_FORA_AREA: &str = "DIES_CANVI_TEMATICA_FORA_AREA";
    /// Days before the ANS limit at which a record is near expiry.
    pub const DIES_PROPERS_VENCIMENT_ANS: &str = "DIES_PROPERS_VENCIMENT_ANS";
    /// Days the citizen answer window stays open once a record is pending reply.
    pub const DIES_RESPOSTA_CIUTADA: &str = "DIES_RESPOSTA_CIUTADA";
    /// Days a pending message waits for an answer before it expires.
    pub const DIES_RESPOSTA_MISSATGE: &str = "DIES_RESPOSTA_MISSATGE";

    pub const DEFAULT_DIES_CANVI_TEMATICA_FORA_AREA_COORD: i64 = 10;
    pub const DEFAULT_DIES_CANVI_TEMATICA_FORA_AREA: i64 = 8;
    pub const DEFAULT_DIES_PROPERS_VENCIMENT_ANS: i64 = 2;
    pub const DEFAULT_DIES_RESPOSTA_CIUTADA: i64 = 30;
    pub const DEFAULT_DIES_RESPOSTA_MISSATGE: i64 = 5;

    /// Upper bound for any configured day count, and for a theme's ANS delay.
    pub const MAX_DAYS: i64 = 3650;
}

/// Source of named configuration values.
pub trait ParameterStore: Send + Sync {
    /// Raw value of a parameter, if configured.
    fn get(&self, key: &str) -> Option<String>;

    /// Integer value of a parameter, or `default` when absent or malformed.
    fn int_or_default(&self, key: &str, default: i64) -> i64 {
        match self.require_int(key) {
            Ok(value) => value,
            Err(err) => {
                tracing::warn!(key, default, error = %err, "parameter unavailable; using default");
                default
            }
        }
    }

    /// Day count in `0..=keys::MAX_DAYS`, or `default` when absent,
    /// malformed or out of range.
    fn days_or_default(&self, key: &str, default: i64) -> i64 {
        let value = self.int_or_default(key, default);
        if (0..=keys::MAX_DAYS).contains(&value) {
            return value;
        }
        tracing::warn!(
            key,
            value,
            default,
            max = keys::MAX_DAYS,
            "day count out of range; using default"
        );
        default
    }

    /// Integer value of a parameter.
    ///
    /// # Errors
    ///
    /// [`IrisError::ConfigurationMissing`] when the key is absent,
    /// [`IrisError::ConfigurationInvalid`] when it is not an integer.
    fn require_int(&self, key: &str) -> Result<i64, IrisError> {
        let raw = self.get(key).ok_or_else(|| IrisError::ConfigurationMissing {
            key: key.to_string(),
        })?;
        raw.trim().parse::<i64>().map_err(|_| IrisError::ConfigurationInvalid {
            key: key.to_string(),
            value: raw.clone(),
        })
    }
}

/// A scalar as written in a YAML parameters table.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum ParameterValue {
    Int(i64),
    Bool(bool),
    Text(String),
}

impl ParameterValue {
    fn into_string(self) -> String {
        match self {
            Self::Int(v) => v.to_string(),
            Self::Bool(v) => v.to_string(),
            Self::Text(v) => v,
        }
    }
}

/// In-memory parameter table.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(
    from = "BTreeMap<String, ParameterValue>",
    into = "BTreeMap<String, String>"
)]
pub struct Parameters {
    values: BTreeMap<String, String>,
}

impl Parameters {
    /// An empty table: every lookup falls back to its default.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a parameter, returning the table for chaining.
    pub fn with(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.set(key, value);
        self
    }

    /// Set or replace a parameter.
    pub fn set(&mut self, key: impl Into<String>, value: impl ToString) {
        self.values.insert(key.into(), value.to_string());
    }

    /// Number of configured parameters.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether no parameter is configured.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Parse a YAML mapping of `KEY: value`.
    pub fn from_yaml_str(yaml: &str) -> Result<Self, IrisError> {
        serde_yaml::from_str(yaml).map_err(|e| IrisError::Serialization(e.to_string()))
    }

    /// Load a YAML parameters file.
    pub fn from_path(path: &Path) -> Result<Self, IrisError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&text)
    }
}

impl ParameterStore for Parameters {
    fn get(&self, key: &str) -> Option<String> {
        self.values.get(key).cloned()
    }
}

impl From<BTreeMap<String, ParameterValue>> for Parameters {
    fn from(raw: BTreeMap<String, ParameterValue>) -> Self {
        Self {
            values: raw.into_iter().map(|(k, v)| (k, v.into_string())).collect(),
        }
    }
}

impl From<Parameters> for BTreeMap<String, String> {
    fn from(params: Parameters) -> Self {
        params.values
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_parameter_falls_back_to_default() {
        let params = Parameters::new();
        assert_eq!(
            params.int_or_default(keys::DIES_CANVI_TEMATICA_FORA_AREA, 8),
            8
        );
        assert!(matches!(
            params.require_int(keys::DIES_CANVI_TEMATICA_FORA_AREA),
            Err(IrisError::ConfigurationMissing { .. })
        ));
    }

    #[test]
    fn malformed_parameter_falls_back_to_default() {
        let params = Parameters::new().with(keys::DIES_RESPOSTA_CIUTADA, "thirty");
        assert_eq!(params.int_or_default(keys::DIES_RESPOSTA_CIUTADA, 30), 30);
        assert!(matches!(
            params.require_int(keys::DIES_RESPOSTA_CIUTADA),
            Err(IrisError::ConfigurationInvalid { .. })
        ));
    }

    #[test]
    fn configured_parameter_wins() {
        let params = Parameters::new().with(keys::DIES_CANVI_TEMATICA_FORA_AREA_COORD, 15);
        assert_eq!(
            params.int_or_default(keys::DIES_CANVI_TEMATICA_FORA_AREA_COORD, 10),
            15
        );
    }

    #[test]
    fn out_of_range_day_counts_fall_back() {
        let params = Parameters::new()
            .with(keys::DIES_RESPOSTA_CIUTADA, -3)
            .with(keys::DIES_RESPOSTA_MISSATGE, 200_000_000)
            .with(keys::DIES_PROPERS_VENCIMENT_ANS, keys::MAX_DAYS);
        assert_eq!(params.days_or_default(keys::DIES_RESPOSTA_CIUTADA, 30), 30);
        assert_eq!(params.days_or_default(keys::DIES_RESPOSTA_MISSATGE, 5), 5);
        assert_eq!(
            params.days_or_default(keys::DIES_PROPERS_VENCIMENT_ANS, 2),
            keys::MAX_DAYS
        );
        assert_eq!(params.days_or_default(keys::DIES_CANVI_TEMATICA_FORA_AREA, 8), 8);
    }

    #[test]
    fn yaml_accepts_numbers_and_strings() {
        let yaml = "DIES_CANVI_TEMATICA_FORA_AREA: 12\nDIES_RESPOSTA_CIUTADA: \"20\"\n";
        let params = Parameters::from_yaml_str(yaml).unwrap();
        assert_eq!(params.len(), 2);
        assert_eq!(params.require_int(keys::DIES_CANVI_TEMATICA_FORA_AREA).unwrap(), 12);
        assert_eq!(params.require_int(keys::DIES_RESPOSTA_CIUTADA).unwrap(), 20);
    }

    #[test]
    fn invalid_yaml_is_a_serialization_error() {
        assert!(matches!(
            Parameters::from_yaml_str("- just\n- a list\n"),
            Err(IrisError::Serialization(_))
        ));
    }
}
