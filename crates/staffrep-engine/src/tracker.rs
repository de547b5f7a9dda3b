//! Error tracker implementations.
//!
//! Every tracked event gets a short correlation id that can be shown to
//! the invoking actor and later matched against the operator logs.

use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::{Mutex, PoisonError};

use chrono::{DateTime, Utc};
use serde::Serialize;
use staffrep_core::ports::{ErrorTracker, Severity, TrackedEvent};
use tracing::{error, warn};
use uuid::Uuid;

/// 16 upper-case hex characters.
pub fn correlation_id() -> String {
    let mut id = Uuid::new_v4().simple().to_string();
    id.truncate(16);
    id.make_ascii_uppercase();
    id
}

/// A tracked event as stored on disk or in memory.
#[derive(Debug, Clone, Serialize)]
pub struct TrackedRecord {
    pub correlation_id: String,
    pub recorded_at: DateTime<Utc>,
    #[serde(flatten)]
    pub event: TrackedEvent,
}

impl TrackedRecord {
    fn new(event: TrackedEvent) -> Self {
        Self {
            correlation_id: correlation_id(),
            recorded_at: Utc::now(),
            event,
        }
    }
}

/// Production tracker: logs every event and optionally persists it as
/// one JSON file per event under `log_dir`.
#[derive(Debug, Clone, Default)]
pub struct TracingErrorTracker {
    log_dir: Option<PathBuf>,
}

impl TracingErrorTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_log_dir(log_dir: impl Into<PathBuf>) -> Self {
        Self {
            log_dir: Some(log_dir.into()),
        }
    }

    fn persist(&self, record: &TrackedRecord) {
        let Some(dir) = &self.log_dir else {
            return;
        };
        let result = std::fs::create_dir_all(dir).and_then(|()| {
            let json = serde_json::to_vec_pretty(record).map_err(std::io::Error::other)?;
            let name = format!(
                "{}_{}.json",
                record.recorded_at.format("%Y%m%dT%H%M%S"),
                record.correlation_id
            );
            std::fs::write(dir.join(name), json)
        });
        if let Err(e) = result {
            warn!(
                correlation_id = %record.correlation_id,
                error = %e,
                "failed to write error report"
            );
        }
    }
}

impl ErrorTracker for TracingErrorTracker {
    fn track(&self, event: TrackedEvent) -> String {
        let record = TrackedRecord::new(event);
        let event = &record.event;
        let user_id = event.user_id.as_deref().unwrap_or("-");
        let context = serde_json::Value::Object(event.context.clone());
        match event.severity {
            Severity::Fatal => error!(
                correlation_id = %record.correlation_id,
                source = ?event.source,
                user_id,
                context = %context,
                "FATAL: {}",
                event.message
            ),
            Severity::Error => error!(
                correlation_id = %record.correlation_id,
                source = ?event.source,
                user_id,
                context = %context,
                "{}",
                event.message
            ),
        }
        self.persist(&record);
        record.correlation_id
    }
}

/// In-memory tracker for tests. Keeps the last `capacity` events.
#[derive(Debug)]
pub struct MemoryErrorTracker {
    records: Mutex<VecDeque<TrackedRecord>>,
    capacity: usize,
}

impl Default for MemoryErrorTracker {
    fn default() -> Self {
        Self::with_capacity(256)
    }
}

impl MemoryErrorTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            records: Mutex::new(VecDeque::new()),
            capacity: capacity.max(1),
        }
    }

    pub fn get(&self, correlation_id: &str) -> Option<TrackedRecord> {
        self.lock()
            .iter()
            .find(|r| r.correlation_id == correlation_id)
            .cloned()
    }

    /// Newest first.
    pub fn recent(&self, limit: usize) -> Vec<TrackedRecord> {
        self.lock().iter().rev().take(limit).cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, VecDeque<TrackedRecord>> {
        self.records.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl ErrorTracker for MemoryErrorTracker {
    fn track(&self, event: TrackedEvent) -> String {
        let record = TrackedRecord::new(event);
        let id = record.correlation_id.clone();
        let mut records = self.lock();
        if records.len() == self.capacity {
            records.pop_front();
        }
        records.push_back(record);
        id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use staffrep_core::ports::EventSource;

    #[test]
    fn correlation_ids_are_sixteen_uppercase_hex() {
        let id = correlation_id();
        assert_eq!(id.len(), 16);
        assert!(
            id.chars()
                .all(|c| c.is_ascii_digit() || ('A'..='F').contains(&c))
        );
        assert_ne!(id, correlation_id());
    }

    #[test]
    fn memory_tracker_looks_up_by_id_and_evicts_oldest() {
        let tracker = MemoryErrorTracker::with_capacity(2);
        let first = tracker.track(TrackedEvent::error(EventSource::Command, "one"));
        tracker.track(TrackedEvent::error(EventSource::Command, "two"));
        let third = tracker.track(
            TrackedEvent::fatal(EventSource::RankChange, "three")
                .for_user("42")
                .with("attempts", 4),
        );

        assert_eq!(tracker.len(), 2);
        assert!(tracker.get(&first).is_none());
        let record = tracker.get(&third).unwrap();
        assert_eq!(record.event.severity, Severity::Fatal);
        assert_eq!(record.event.user_id.as_deref(), Some("42"));
        assert_eq!(tracker.recent(1)[0].event.message, "three");
    }

    #[test]
    fn tracing_tracker_writes_one_file_per_event() {
        let dir = std::env::temp_dir().join(format!("staffrep-tracker-{}", Uuid::new_v4()));
        let tracker = TracingErrorTracker::with_log_dir(&dir);
        let id = tracker.track(TrackedEvent::error(EventSource::Store, "store down"));

        let files: Vec<_> = std::fs::read_dir(&dir).unwrap().collect();
        assert_eq!(files.len(), 1);
        let path = files[0].as_ref().unwrap().path();
        let body = std::fs::read_to_string(&path).unwrap();
        assert!(body.contains(&id));
        assert!(body.contains("store down"));
        std::fs::remove_dir_all(&dir).unwrap();
    }
}
