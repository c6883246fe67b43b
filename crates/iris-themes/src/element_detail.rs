//! # Element Detail
//!
//! The theme a record is filed under, with its derivation tables.
//!
//! A *direct* derivation maps a record state to a group. A *district*
//! derivation maps `(district, state)` to a group and, when both match,
//! takes precedence over the direct rule.

use serde::{Deserialize, Serialize};

use iris_core::{keys, DistrictId, GroupId, RecordState, ThemeId, Timestamp};

/// How an SLA delay is counted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DelayKind {
    /// Calendar days.
    #[default]
    Natural,
    /// Monday to Friday only.
    Business,
}

/// The ANS (service-level) delay of a theme.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnsDelay {
    pub days: u32,
    #[serde(default)]
    pub kind: DelayKind,
}

impl AnsDelay {
    pub fn natural(days: u32) -> Self {
        Self {
            days,
            kind: DelayKind::Natural,
        }
    }

    pub fn business(days: u32) -> Self {
        Self {
            days,
            kind: DelayKind::Business,
        }
    }

    /// The deadline for a clock starting at `start`, or `None` when it
    /// falls outside the representable range.
    pub fn apply(&self, start: Timestamp) -> Option<Timestamp> {
        match self.kind {
            DelayKind::Natural => start.checked_plus_days(i64::from(self.days)),
            DelayKind::Business => start.checked_plus_business_days(self.days),
        }
    }

    /// At most [`keys::MAX_DAYS`] days.
    pub fn is_within_bounds(&self) -> bool {
        i64::from(self.days) <= keys::MAX_DAYS
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectDerivation {
    pub state: RecordState,
    pub group: GroupId,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DistrictDerivation {
    pub district: DistrictId,
    pub state: RecordState,
    pub group: GroupId,
}

/// A theme.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElementDetail {
    pub id: ThemeId,
    pub description: String,
    #[serde(default)]
    pub deleted_at: Option<Timestamp>,
    #[serde(default)]
    pub direct_derivations: Vec<DirectDerivation>,
    #[serde(default)]
    pub district_derivations: Vec<DistrictDerivation>,
    #[serde(default)]
    pub ans_delay: Option<AnsDelay>,
}

impl ElementDetail {
    pub fn new(id: ThemeId, description: impl Into<String>) -> Self {
        Self {
            id,
            description: description.into(),
            deleted_at: None,
            direct_derivations: Vec::new(),
            district_derivations: Vec::new(),
            ans_delay: None,
        }
    }

    pub fn with_direct(mut self, state: RecordState, group: GroupId) -> Self {
        self.direct_derivations.push(DirectDerivation { state, group });
        self
    }

    pub fn with_district(
        mut self,
        district: DistrictId,
        state: RecordState,
        group: GroupId,
    ) -> Self {
        self.district_derivations.push(DistrictDerivation {
            district,
            state,
            group,
        });
        self
    }

    pub fn with_ans_delay(mut self, delay: AnsDelay) -> Self {
        self.ans_delay = Some(delay);
        self
    }

    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }

    /// The group a record in `state` should be derived to.
    ///
    /// A district rule matching `(district, state)` wins over a direct rule
    /// for `state`.
    pub fn derivation_target(
        &self,
        state: RecordState,
        district: Option<DistrictId>,
    ) -> Option<GroupId> {
        district
            .and_then(|d| {
                self.district_derivations
                    .iter()
                    .find(|rule| rule.district == d && rule.state == state)
                    .map(|rule| rule.group)
            })
            .or_else(|| {
                self.direct_derivations
                    .iter()
                    .find(|rule| rule.state == state)
                    .map(|rule| rule.group)
            })
    }

    /// Union of every group targeted for `state`, by direct rules and by
    /// district rules for `district`.
    pub fn derivation_groups(
        &self,
        state: RecordState,
        district: Option<DistrictId>,
    ) -> impl Iterator<Item = GroupId> + '_ {
        let direct = self
            .direct_derivations
            .iter()
            .filter(move |rule| rule.state == state)
            .map(|rule| rule.group);
        let by_district = self
            .district_derivations
            .iter()
            .filter(move |rule| Some(rule.district) == district && rule.state == state)
            .map(|rule| rule.group);
        direct.chain(by_district)
    }

    /// Every group targeted by any rule of the theme.
    pub fn all_targets(&self) -> impl Iterator<Item = GroupId> + '_ {
        self.direct_derivations
            .iter()
            .map(|rule| rule.group)
            .chain(self.district_derivations.iter().map(|rule| rule.group))
    }
}
