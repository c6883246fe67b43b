//! # Record Card
//!
//! The citizen request or complaint that moves through the lifecycle.

use serde::{Deserialize, Serialize};

use iris_core::{DistrictId, GroupId, RecordCardId, RecordState, ThemeId, Timestamp};
use iris_themes::AmbitQuery;

use crate::deadline::DeadlineFields;

/// Alarm flags of a record. Sweeps only ever turn them on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct AlarmFlags {
    #[serde(default)]
    pub ans_expired: bool,
    #[serde(default)]
    pub near_expire: bool,
    #[serde(default)]
    pub response_time_expired: bool,
}

impl AlarmFlags {
    /// An expiry has happened. Near-expire alone is only a warning.
    pub fn alarm(&self) -> bool {
        self.ans_expired || self.response_time_expired
    }
}

/// A message waiting for an answer from the citizen or another group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingMessage {
    pub id: u64,
    pub sent_at: Timestamp,
    pub response_limit: Timestamp,
    #[serde(default)]
    pub answered_at: Option<Timestamp>,
    #[serde(default)]
    pub response_time_expired: bool,
}

impl PendingMessage {
    pub fn is_pending(&self) -> bool {
        self.answered_at.is_none()
    }
}

fn first_claim() -> u32 {
    1
}

/// A record card.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordCard {
    pub id: RecordCardId,
    /// Public reference, e.g. `"123XLAS"` or `"123XLAS-02"` for a claim.
    pub normalized_record_id: String,
    pub state: RecordState,
    #[serde(default)]
    pub theme: Option<ThemeId>,
    #[serde(default)]
    pub district: Option<DistrictId>,
    pub responsible_group: GroupId,
    pub creation_group: GroupId,
    #[serde(default)]
    pub validated: bool,
    #[serde(default)]
    pub validated_at: Option<Timestamp>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
    #[serde(default)]
    pub ans_limit_date: Option<Timestamp>,
    #[serde(default)]
    pub ans_limit_nearexpire: Option<Timestamp>,
    /// Set while the record waits in `PendingReply`.
    #[serde(default)]
    pub response_limit_date: Option<Timestamp>,
    #[serde(default)]
    pub closing_date: Option<Timestamp>,
    #[serde(default)]
    pub alarms: AlarmFlags,
    /// The closed record this one reopens.
    #[serde(default)]
    pub claimed_from: Option<RecordCardId>,
    /// The claim that reopened this record.
    #[serde(default)]
    pub claimed_by: Option<RecordCardId>,
    #[serde(default = "first_claim")]
    pub claims_number: u32,
    #[serde(default)]
    pub messages: Vec<PendingMessage>,
    /// Optimistic lock counter, bumped on every committed change.
    #[serde(default)]
    pub version: u64,
}

impl RecordCard {
    pub fn is_open(&self) -> bool {
        self.state.is_open()
    }

    pub fn is_closed(&self) -> bool {
        self.state.is_closed()
    }

    pub fn alarm(&self) -> bool {
        self.alarms.alarm()
    }

    pub fn deadline_fields(&self) -> DeadlineFields {
        DeadlineFields {
            open: self.state.is_open(),
            ans_limit_date: self.ans_limit_date,
            ans_limit_nearexpire: self.ans_limit_nearexpire,
            response_limit_date: self.response_limit_date,
        }
    }

    pub fn ambit_query(&self) -> AmbitQuery {
        AmbitQuery {
            theme: self.theme,
            state: self.state,
            district: self.district,
            responsible: self.responsible_group,
            creation_group: self.creation_group,
        }
    }

    pub fn message(&self, id: u64) -> Option<&PendingMessage> {
        self.messages.iter().find(|m| m.id == id)
    }

    pub(crate) fn message_mut(&mut self, id: u64) -> Option<&mut PendingMessage> {
        self.messages.iter_mut().find(|m| m.id == id)
    }
}

/// Input for registering a new record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewRecordCard {
    pub normalized_record_id: String,
    #[serde(default)]
    pub theme: Option<ThemeId>,
    #[serde(default)]
    pub district: Option<DistrictId>,
    pub creation_group: GroupId,
    /// Defaults to the theme's derivation for `PendingValidate`, else the
    /// creation group.
    #[serde(default)]
    pub responsible_group: Option<GroupId>,
}

impl NewRecordCard {
    pub fn new(normalized_record_id: impl Into<String>, creation_group: GroupId) -> Self {
        Self {
            normalized_record_id: normalized_record_id.into(),
            theme: None,
            district: None,
            creation_group,
            responsible_group: None,
        }
    }

    pub fn with_theme(mut self, theme: ThemeId) -> Self {
        self.theme = Some(theme);
        self
    }

    pub fn with_district(mut self, district: DistrictId) -> Self {
        self.district = Some(district);
        self
    }

    pub fn with_responsible(mut self, group: GroupId) -> Self {
        self.responsible_group = Some(group);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn alarm_ignores_near_expire() {
        let mut flags = AlarmFlags::default();
        assert!(!flags.alarm());
        flags.near_expire = true;
        assert!(!flags.alarm());
        flags.response_time_expired = true;
        assert!(flags.alarm());
        flags = AlarmFlags {
            ans_expired: true,
            ..AlarmFlags::default()
        };
        assert!(flags.alarm());
    }

    #[test]
    fn deserializes_minimal_record() {
        let json = r#"{
            "id": 7,
            "normalized_record_id": "123XLAS",
            "state": "in_solution",
            "responsible_group": 4,
            "creation_group": 4,
            "created_at": "2026-05-01T09:00:00Z",
            "updated_at": "2026-05-01T09:00:00Z"
        }"#;
        let record: RecordCard = serde_json::from_str(json).unwrap();
        assert_eq!(record.state, RecordState::InSolution);
        assert_eq!(record.claims_number, 1);
        assert_eq!(record.version, 0);
        assert!(record.deadline_fields().open);
        assert!(record.is_open() && !record.is_closed());
        assert_eq!(record.ambit_query().responsible, GroupId(4));
    }
}
