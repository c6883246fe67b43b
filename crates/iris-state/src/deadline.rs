//! # Deadlines
//!
//! ANS (service-level), citizen response and message deadlines, plus the
//! alarm evaluation that compares them with the current time.
//!
//! Everything here is a pure function of its arguments and the offsets
//! captured at construction. The calculator never reads a clock.
//! Configured offsets outside `0..=MAX_DAYS` fall back to their defaults,
//! and a deadline past the end of representable time is an error rather
//! than a panic.
//!
//! | Parameter                      | Default | Meaning                                   |
//! |--------------------------------|---------|-------------------------------------------|
//! | `DIES_PROPERS_VENCIMENT_ANS`   | 2       | near-expire warning, days before the ANS   |
//! | `DIES_RESPOSTA_CIUTADA`        | 30      | days the citizen has in `PendingReply`     |
//! | `DIES_RESPOSTA_MISSATGE`       | 5       | days to answer a message                   |

use serde::{Deserialize, Serialize};

use iris_core::{keys, ParameterStore, Timestamp};
use iris_themes::AnsDelay;

use crate::error::EngineError;
use crate::record::{AlarmFlags, PendingMessage};

/// An ANS deadline and its warning threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnsDeadline {
    pub limit: Timestamp,
    pub near_expire: Timestamp,
}

/// The deadline fields of a record that alarm evaluation reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DeadlineFields {
    /// Closed records never raise alarms.
    pub open: bool,
    pub ans_limit_date: Option<Timestamp>,
    pub ans_limit_nearexpire: Option<Timestamp>,
    pub response_limit_date: Option<Timestamp>,
}

/// Deadline arithmetic over configured offsets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeadlineCalculator {
    near_expire_days: i64,
    citizen_response_days: i64,
    message_response_days: i64,
}

impl Default for DeadlineCalculator {
    fn default() -> Self {
        Self {
            near_expire_days: keys::DEFAULT_DIES_PROPERS_VENCIMENT_ANS,
            citizen_response_days: keys::DEFAULT_DIES_RESPOSTA_CIUTADA,
            message_response_days: keys::DEFAULT_DIES_RESPOSTA_MISSATGE,
        }
    }
}

impl DeadlineCalculator {
    /// Read the offsets, falling back to defaults for missing, malformed
    /// or out-of-range keys.
    pub fn from_parameters(params: &dyn ParameterStore) -> Self {
        Self {
            near_expire_days: params.days_or_default(
                keys::DIES_PROPERS_VENCIMENT_ANS,
                keys::DEFAULT_DIES_PROPERS_VENCIMENT_ANS,
            ),
            citizen_response_days: params.days_or_default(
                keys::DIES_RESPOSTA_CIUTADA,
                keys::DEFAULT_DIES_RESPOSTA_CIUTADA,
            ),
            message_response_days: params.days_or_default(
                keys::DIES_RESPOSTA_MISSATGE,
                keys::DEFAULT_DIES_RESPOSTA_MISSATGE,
            ),
        }
    }

    /// ANS limit for a clock started at `start`.
    ///
    /// The near-expire threshold sits the configured number of days before
    /// the limit, never before `start`.
    pub fn ans_deadline(
        &self,
        start: Timestamp,
        delay: &AnsDelay,
    ) -> Result<AnsDeadline, EngineError> {
        let limit = delay.apply(start).ok_or(EngineError::DeadlineOutOfRange { start })?;
        let near_expire = limit
            .checked_plus_days(-self.near_expire_days)
            .ok_or(EngineError::DeadlineOutOfRange { start })?
            .max(start);
        Ok(AnsDeadline { limit, near_expire })
    }

    /// Deadline for the citizen once the record enters `PendingReply`.
    pub fn response_deadline(&self, entered: Timestamp) -> Result<Timestamp, EngineError> {
        entered
            .checked_plus_days(self.citizen_response_days)
            .ok_or(EngineError::DeadlineOutOfRange { start: entered })
    }

    /// Deadline to answer a message sent at `sent`.
    pub fn message_deadline(&self, sent: Timestamp) -> Result<Timestamp, EngineError> {
        sent.checked_plus_days(self.message_response_days)
            .ok_or(EngineError::DeadlineOutOfRange { start: sent })
    }

    /// The alarm flags `fields` call for at `now`.
    ///
    /// A deadline is expired once `now` is strictly past it. The result
    /// says which flags *should* be set; callers only ever raise flags.
    pub fn evaluate(&self, now: Timestamp, fields: &DeadlineFields) -> AlarmFlags {
        if !fields.open {
            return AlarmFlags::default();
        }
        AlarmFlags {
            ans_expired: fields.ans_limit_date.is_some_and(|limit| now > limit),
            near_expire: fields.ans_limit_nearexpire.is_some_and(|near| now >= near),
            response_time_expired: fields.response_limit_date.is_some_and(|limit| now > limit),
        }
    }

    /// Whether a message has gone unanswered past its deadline.
    pub fn message_expired(&self, now: Timestamp, message: &PendingMessage) -> bool {
        message.is_pending() && now > message.response_limit
    }
}
