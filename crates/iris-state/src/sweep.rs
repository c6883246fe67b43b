//! # Alarm Sweep
//!
//! Run periodically by an external scheduler. For every open record the
//! sweep compares its deadlines with the given time and raises the alarm
//! flags that are due.
//!
//! Flags only ever go from false to true, and an event is emitted exactly
//! when one flips. Running the sweep again over unchanged records changes
//! nothing and notifies nobody.

use std::sync::Arc;

use serde::Serialize;

use iris_core::{RecordCardId, Timestamp};

use crate::deadline::DeadlineCalculator;
use crate::engine::StateMachine;
use crate::error::EngineError;
use crate::events::{AlarmKind, EngineEvent, EventBus};
use crate::record::RecordCard;
use crate::store::RecordCardStore;

/// Raise every alarm `record` is due at `now`, returning one event per flip.
pub(crate) fn raise_alarms(
    calc: &DeadlineCalculator,
    record: &mut RecordCard,
    now: Timestamp,
) -> Vec<EngineEvent> {
    let due = calc.evaluate(now, &record.deadline_fields());
    let mut raised = Vec::new();
    let id = record.id;
    let mut flip = |flag: &mut bool, should: bool, kind: AlarmKind, message: Option<u64>| {
        if should && !*flag {
            *flag = true;
            raised.push(EngineEvent::AlarmRaised {
                record: id,
                kind,
                message,
            });
        }
    };

    flip(&mut record.alarms.ans_expired, due.ans_expired, AlarmKind::AnsExpired, None);
    flip(&mut record.alarms.near_expire, due.near_expire, AlarmKind::NearExpire, None);
    flip(
        &mut record.alarms.response_time_expired,
        due.response_time_expired,
        AlarmKind::ResponseTimeExpired,
        None,
    );

    if record.state.is_open() {
        for message in record.messages.iter_mut() {
            // A message raises the record flag once, when it first expires.
            let newly_expired =
                calc.message_expired(now, message) && !message.response_time_expired;
            flip(
                &mut message.response_time_expired,
                newly_expired,
                AlarmKind::MessageResponseExpired,
                Some(message.id),
            );
            if newly_expired {
                flip(
                    &mut record.alarms.response_time_expired,
                    true,
                    AlarmKind::ResponseTimeExpired,
                    None,
                );
            }
        }
    }
    raised
}

pub(crate) fn count_alarms(events: &[EngineEvent]) {
    for event in events {
        if let EngineEvent::AlarmRaised { kind, .. } = event {
            metrics::counter!("iris_alarms_raised_total", "kind" => kind.as_str()).increment(1);
        }
    }
}

/// Outcome of one sweep.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SweepReport {
    pub scanned: usize,
    /// Records that had at least one flag raised.
    pub updated: Vec<RecordCardId>,
    pub raised: Vec<EngineEvent>,
}

impl SweepReport {
    pub fn is_noop(&self) -> bool {
        self.raised.is_empty()
    }
}

/// The deadline sweep over a record store.
#[derive(Debug, Clone)]
pub struct AlarmSweep {
    store: Arc<RecordCardStore>,
    deadlines: DeadlineCalculator,
    events: Arc<EventBus>,
}

impl AlarmSweep {
    pub fn new(
        store: Arc<RecordCardStore>,
        deadlines: DeadlineCalculator,
        events: Arc<EventBus>,
    ) -> Self {
        Self {
            store,
            deadlines,
            events,
        }
    }

    /// A sweep over the engine's store, configuration and observers.
    pub fn for_engine(engine: &StateMachine) -> Self {
        Self::new(engine.store().clone(), engine.deadlines(), engine.events().clone())
    }

    pub fn run(&self, now: Timestamp) -> SweepReport {
        let mut report = SweepReport::default();
        for id in self.store.open_ids() {
            report.scanned += 1;
            let result = self
                .store
                .try_update(id, None, |record| Ok(raise_alarms(&self.deadlines, record, now)));
            let raised = match result {
                Ok((_, raised)) => raised,
                Err(EngineError::NotFound(_)) => continue,
                Err(err) => {
                    tracing::error!(record = %id, error = %err, "sweep could not update record");
                    continue;
                }
            };
            if raised.is_empty() {
                continue;
            }
            count_alarms(&raised);
            self.events.publish(&raised);
            report.updated.push(id);
            report.raised.extend(raised);
        }
        tracing::info!(
            scanned = report.scanned,
            updated = report.updated.len(),
            raised = report.raised.len(),
            at = %now,
            "alarm sweep finished"
        );
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::RecordingDispatcher;
    use crate::record::PendingMessage;
    use iris_core::{GroupId, RecordState};

    fn ts(s: &str) -> Timestamp {
        Timestamp::parse(s).unwrap()
    }

    fn record(id: u64, state: RecordState) -> RecordCard {
        let at = ts("2026-05-01T00:00:00Z");
        RecordCard {
            id: RecordCardId(id),
            normalized_record_id: format!("{id}AAA"),
            state,
            theme: None,
            district: None,
            responsible_group: GroupId(1),
            creation_group: GroupId(1),
            validated: false,
            validated_at: None,
            created_at: at,
            updated_at: at,
            ans_limit_date: Some(ts("2026-05-11T00:00:00Z")),
            ans_limit_nearexpire: Some(ts("2026-05-09T00:00:00Z")),
            response_limit_date: None,
            closing_date: None,
            alarms: Default::default(),
            claimed_from: None,
            claimed_by: None,
            claims_number: 1,
            messages: Vec::new(),
            version: 0,
        }
    }

    fn sweep(
        records: Vec<RecordCard>,
    ) -> (AlarmSweep, Arc<RecordCardStore>, Arc<RecordingDispatcher>) {
        let store = Arc::new(RecordCardStore::with_records(records));
        let bus = Arc::new(EventBus::new());
        let recorder = Arc::new(RecordingDispatcher::new());
        bus.subscribe(recorder.clone());
        (
            AlarmSweep::new(store.clone(), DeadlineCalculator::default(), bus),
            store,
            recorder,
        )
    }

    #[test]
    fn second_run_is_silent() {
        let (sweep, store, recorder) = sweep(vec![record(1, RecordState::InSolution)]);
        let now = ts("2026-05-12T00:00:00Z");
        let first = sweep.run(now);
        assert_eq!(first.updated, vec![RecordCardId(1)]);
        assert_eq!(first.raised.len(), 2);
        let after_first = store.get(RecordCardId(1)).unwrap();
        assert!(after_first.alarms.ans_expired && after_first.alarms.near_expire);

        let second = sweep.run(now);
        assert!(second.is_noop());
        assert_eq!(second.scanned, 1);
        assert_eq!(recorder.len(), 2);
        assert_eq!(store.get(RecordCardId(1)).unwrap(), after_first);
    }

    #[test]
    fn near_expire_then_expired() {
        let (sweep, store, recorder) = sweep(vec![record(1, RecordState::Planned)]);
        sweep.run(ts("2026-05-09T12:00:00Z"));
        let r = store.get(RecordCardId(1)).unwrap();
        assert!(r.alarms.near_expire && !r.alarms.ans_expired && !r.alarm());
        sweep.run(ts("2026-05-11T00:00:01Z"));
        assert!(store.get(RecordCardId(1)).unwrap().alarm());
        let kinds: Vec<_> = recorder
            .events()
            .into_iter()
            .filter_map(|e| match e {
                EngineEvent::AlarmRaised { kind, .. } => Some(kind),
                _ => None,
            })
            .collect();
        assert_eq!(kinds, vec![AlarmKind::NearExpire, AlarmKind::AnsExpired]);
    }

    #[test]
    fn closed_records_are_skipped() {
        let (sweep, store, recorder) = sweep(vec![record(1, RecordState::Closed)]);
        let report = sweep.run(ts("2026-06-01T00:00:00Z"));
        assert_eq!(report.scanned, 0);
        assert!(recorder.is_empty());
        assert!(!store.get(RecordCardId(1)).unwrap().alarm());
    }

    #[test]
    fn expired_message_raises_record_alarm_once() {
        let mut r = record(1, RecordState::InSolution);
        r.ans_limit_date = None;
        r.ans_limit_nearexpire = None;
        for id in [1, 2] {
            r.messages.push(PendingMessage {
                id,
                sent_at: ts("2026-05-01T00:00:00Z"),
                response_limit: ts("2026-05-06T00:00:00Z"),
                answered_at: None,
                response_time_expired: false,
            });
        }
        let (sweep, store, _) = sweep(vec![r]);
        let report = sweep.run(ts("2026-05-07T00:00:00Z"));
        // Two message expiries and a single record-level alarm.
        assert_eq!(report.raised.len(), 3);
        let r = store.get(RecordCardId(1)).unwrap();
        assert!(r.alarms.response_time_expired);
        assert!(r.messages.iter().all(|m| m.response_time_expired));
        assert!(sweep.run(ts("2026-05-08T00:00:00Z")).is_noop());
    }

    #[test]
    fn lowered_record_flag_is_not_raised_again_by_old_messages() {
        let mut r = record(1, RecordState::InSolution);
        r.ans_limit_date = None;
        r.ans_limit_nearexpire = None;
        r.messages.push(PendingMessage {
            id: 1,
            sent_at: ts("2026-05-01T00:00:00Z"),
            response_limit: ts("2026-05-06T00:00:00Z"),
            answered_at: None,
            response_time_expired: false,
        });
        let (sweep, store, recorder) = sweep(vec![r]);
        assert_eq!(sweep.run(ts("2026-05-07T00:00:00Z")).raised.len(), 2);

        store
            .try_update(RecordCardId(1), None, |r| {
                r.alarms.response_time_expired = false;
                Ok(())
            })
            .unwrap();
        assert!(sweep.run(ts("2026-05-08T00:00:00Z")).is_noop());
        assert!(!store.get(RecordCardId(1)).unwrap().alarms.response_time_expired);
        assert_eq!(recorder.len(), 2);
    }
}
