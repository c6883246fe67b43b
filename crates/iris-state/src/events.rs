//! # Engine Events
//!
//! Observers registered on an [`EventBus`] receive every committed change.
//! Dispatch happens after the record's lock is released and is
//! fire-and-forget: a dispatcher cannot fail the operation that produced
//! the event.

use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use serde::Serialize;

use iris_core::{GroupId, RecordCardId, RecordState, UserId};

use crate::history::ReasignationReason;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AlarmKind {
    AnsExpired,
    NearExpire,
    ResponseTimeExpired,
    MessageResponseExpired,
}

impl AlarmKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AnsExpired => "ans_expired",
            Self::NearExpire => "near_expire",
            Self::ResponseTimeExpired => "response_time_expired",
            Self::MessageResponseExpired => "message_response_expired",
        }
    }
}

impl std::fmt::Display for AlarmKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A committed change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum EngineEvent {
    StateChanged {
        record: RecordCardId,
        from: RecordState,
        to: RecordState,
        group: GroupId,
        user: UserId,
        automatic: bool,
    },
    Reassigned {
        record: RecordCardId,
        from: GroupId,
        to: GroupId,
        reason: ReasignationReason,
    },
    AlarmRaised {
        record: RecordCardId,
        kind: AlarmKind,
        /// Set for message expiries.
        message: Option<u64>,
    },
    ClaimCreated {
        original: RecordCardId,
        claim: RecordCardId,
        reference: String,
    },
}

impl EngineEvent {
    pub fn record(&self) -> RecordCardId {
        match self {
            Self::StateChanged { record, .. }
            | Self::Reassigned { record, .. }
            | Self::AlarmRaised { record, .. } => *record,
            Self::ClaimCreated { claim, .. } => *claim,
        }
    }
}

/// Receiver of engine events.
pub trait NotificationDispatcher: Send + Sync {
    fn dispatch(&self, event: &EngineEvent);
}

/// Fan-out to every registered dispatcher, in registration order.
#[derive(Default)]
pub struct EventBus {
    dispatchers: RwLock<Vec<Arc<dyn NotificationDispatcher>>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self, dispatcher: Arc<dyn NotificationDispatcher>) {
        self.dispatchers.write().push(dispatcher);
    }

    pub fn publish(&self, events: &[EngineEvent]) {
        if events.is_empty() {
            return;
        }
        let dispatchers = self.dispatchers.read().clone();
        for event in events {
            for dispatcher in &dispatchers {
                dispatcher.dispatch(event);
            }
        }
    }
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("dispatchers", &self.dispatchers.read().len())
            .finish()
    }
}

/// Keeps every event it receives. Used by tests and by the CLI to report
/// what an operation produced.
#[derive(Debug, Default)]
pub struct RecordingDispatcher {
    events: Mutex<Vec<EngineEvent>>,
}

impl RecordingDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<EngineEvent> {
        self.events.lock().clone()
    }

    pub fn take(&self) -> Vec<EngineEvent> {
        std::mem::take(&mut *self.events.lock())
    }

    pub fn len(&self) -> usize {
        self.events.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.lock().is_empty()
    }
}

impl NotificationDispatcher for RecordingDispatcher {
    fn dispatch(&self, event: &EngineEvent) {
        self.events.lock().push(event.clone());
    }
}

/// Writes each event to the log.
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingDispatcher;

impl NotificationDispatcher for LoggingDispatcher {
    fn dispatch(&self, event: &EngineEvent) {
        match event {
            EngineEvent::AlarmRaised { record, kind, .. } => {
                tracing::warn!(%record, %kind, "alarm raised");
            }
            other => tracing::info!(record = %other.record(), event = ?other, "record event"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bus_fans_out_in_order() {
        let bus = EventBus::new();
        let a = Arc::new(RecordingDispatcher::new());
        let b = Arc::new(RecordingDispatcher::new());
        bus.subscribe(a.clone());
        bus.subscribe(b.clone());
        bus.subscribe(Arc::new(LoggingDispatcher));
        let events = vec![
            EngineEvent::AlarmRaised {
                record: RecordCardId(1),
                kind: AlarmKind::AnsExpired,
                message: None,
            },
            EngineEvent::ClaimCreated {
                original: RecordCardId(1),
                claim: RecordCardId(2),
                reference: "X-02".into(),
            },
        ];
        bus.publish(&events);
        assert_eq!(a.events(), events);
        assert_eq!(b.take().len(), 2);
        assert!(b.is_empty());
        assert_eq!(events[1].record(), RecordCardId(2));
    }

    #[test]
    fn events_serialize_tagged() {
        let json = serde_json::to_value(EngineEvent::AlarmRaised {
            record: RecordCardId(3),
            kind: AlarmKind::NearExpire,
            message: None,
        })
        .unwrap();
        assert_eq!(json["event"], "alarm_raised");
        assert_eq!(json["kind"], "near_expire");
        assert_eq!(json["record"], 3);
    }
}
