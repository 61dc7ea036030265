//! Pipeline event system.
//!
//! [`EventBus`] wraps a `tokio::sync::broadcast` channel with a bounded
//! ring-buffer of recent events so that late subscribers can catch up.

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use tokio::sync::broadcast;

use crate::ids::{EventId, JobId};

/// Maximum number of events retained in the ring buffer.
const MAX_RECENT_EVENTS: usize = 100;

/// Payload describing what happened.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EventPayload {
    JobQueued {
        job_id: JobId,
    },
    JobStarted {
        job_id: JobId,
    },
    InspectionFinished {
        job_id: JobId,
        duration_secs: f64,
    },
    ThumbnailFinished {
        job_id: JobId,
        success: bool,
    },
    RenditionProgress {
        job_id: JobId,
        quality: String,
        /// 0.0 -- 100.0
        progress: f32,
    },
    RenditionFinished {
        job_id: JobId,
        quality: String,
        success: bool,
    },
    JobCompleted {
        job_id: JobId,
        completed: usize,
        total: usize,
    },
    JobFailed {
        job_id: JobId,
        error: String,
    },
}

impl EventPayload {
    /// The job this event belongs to.
    pub fn job_id(&self) -> JobId {
        match self {
            EventPayload::JobQueued { job_id }
            | EventPayload::JobStarted { job_id }
            | EventPayload::InspectionFinished { job_id, .. }
            | EventPayload::ThumbnailFinished { job_id, .. }
            | EventPayload::RenditionProgress { job_id, .. }
            | EventPayload::RenditionFinished { job_id, .. }
            | EventPayload::JobCompleted { job_id, .. }
            | EventPayload::JobFailed { job_id, .. } => *job_id,
        }
    }
}

/// A timestamped event ready for broadcast.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub id: EventId,
    pub timestamp: DateTime<Utc>,
    pub payload: EventPayload,
}

impl Event {
    /// Create a new event with a fresh id and the current timestamp.
    pub fn new(payload: EventPayload) -> Self {
        Self {
            id: EventId::new(),
            timestamp: Utc::now(),
            payload,
        }
    }
}

/// Broadcast channel with a bounded ring buffer of recent events.
pub struct EventBus {
    tx: broadcast::Sender<Event>,
    recent: RwLock<VecDeque<Event>>,
}

impl EventBus {
    /// Create a new event bus.
    ///
    /// `capacity` controls the broadcast channel buffer size (not the ring
    /// buffer, which is always [`MAX_RECENT_EVENTS`]).
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self {
            tx,
            recent: RwLock::new(VecDeque::with_capacity(MAX_RECENT_EVENTS)),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.tx.subscribe()
    }

    /// Broadcast an event to all current subscribers and store it in the
    /// ring buffer.
    pub fn broadcast(&self, payload: EventPayload) {
        let event = Event::new(payload);

        {
            let mut recent = self.recent.write();
            if recent.len() >= MAX_RECENT_EVENTS {
                recent.pop_back();
            }
            recent.push_front(event.clone());
        }

        // No subscribers is fine.
        let _ = self.tx.send(event);
    }

    /// Recent events for one job, oldest first.
    pub fn history_for(&self, job_id: JobId) -> Vec<Event> {
        let recent = self.recent.read();
        recent
            .iter()
            .rev()
            .filter(|e| e.payload.job_id() == job_id)
            .cloned()
            .collect()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn broadcast_and_receive() {
        let bus = EventBus::new(16);
        let mut rx = bus.subscribe();

        let job_id = JobId::new();
        bus.broadcast(EventPayload::JobQueued { job_id });

        let event = rx.try_recv().unwrap();
        match &event.payload {
            EventPayload::JobQueued { job_id: received } => assert_eq!(*received, job_id),
            other => panic!("unexpected payload: {:?}", other),
        }
    }

    #[test]
    fn history_is_capped() {
        let bus = EventBus::new(256);
        let job_id = JobId::new();

        for _ in 0..150 {
            bus.broadcast(EventPayload::JobStarted { job_id });
        }

        assert_eq!(bus.history_for(job_id).len(), MAX_RECENT_EVENTS);
    }

    #[test]
    fn history_for_filters_and_orders() {
        let bus = EventBus::default();
        let a = JobId::new();
        let b = JobId::new();

        bus.broadcast(EventPayload::JobQueued { job_id: a });
        bus.broadcast(EventPayload::JobQueued { job_id: b });
        bus.broadcast(EventPayload::JobStarted { job_id: a });

        let history = bus.history_for(a);
        assert_eq!(history.len(), 2);
        assert!(matches!(history[0].payload, EventPayload::JobQueued { .. }));
        assert!(matches!(history[1].payload, EventPayload::JobStarted { .. }));
    }

    #[test]
    fn payload_serializes_with_type_tag() {
        let payload = EventPayload::RenditionFinished {
            job_id: JobId::new(),
            quality: "720p".into(),
            success: true,
        };
        let json = serde_json::to_string(&payload).unwrap();
        assert!(json.contains("\"type\":\"rendition_finished\""), "got: {json}");
    }

    #[test]
    fn no_subscribers_does_not_panic() {
        let bus = EventBus::new(4);
        bus.broadcast(EventPayload::JobFailed {
            job_id: JobId::new(),
            error: "test".into(),
        });
    }
}
