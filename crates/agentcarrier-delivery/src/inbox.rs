use std::sync::{Mutex, MutexGuard, PoisonError};

use tracing::debug;

use crate::handler::{DeliverySink, Segment};

#[derive(Debug, Default)]
struct InboxState {
    last_segment: Option<Segment>,
    segments: u64,
    logs: Vec<String>,
    yamls: Vec<String>,
}

/// In-memory [`DeliverySink`] that keeps what it receives.
///
/// Holds the most recent segment and every log and yaml text, in arrival order.
#[derive(Debug, Default)]
pub struct Inbox {
    state: Mutex<InboxState>,
}

impl Inbox {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn last_segment(&self) -> Option<Segment> {
        self.lock().last_segment.clone()
    }

    /// Total number of segments received.
    pub fn segment_count(&self) -> u64 {
        self.lock().segments
    }

    pub fn logs(&self) -> Vec<String> {
        self.lock().logs.clone()
    }

    pub fn yamls(&self) -> Vec<String> {
        self.lock().yamls.clone()
    }

    /// Forget everything received so far.
    pub fn reset(&self) {
        *self.lock() = InboxState::default();
    }

    // A panicking handler elsewhere must not lose what was already delivered.
    fn lock(&self) -> MutexGuard<'_, InboxState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl DeliverySink for Inbox {
    fn on_log(&self, peer: &str, text: &str) {
        debug!(peer, len = text.len(), "log received");
        self.lock().logs.push(text.to_string());
    }

    fn on_yaml(&self, peer: &str, text: &str) {
        debug!(peer, len = text.len(), "yaml received");
        self.lock().yamls.push(text.to_string());
    }

    fn on_segment(&self, segment: Segment) {
        debug!(peer = %segment.peer, answer_id = segment.answer_id, len = segment.data.len(), "segment received");
        let mut state = self.lock();
        state.segments += 1;
        state.last_segment = Some(segment);
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use bytes::Bytes;

    use super::*;

    #[test]
    fn keeps_everything_until_reset() {
        let inbox = Inbox::new();
        inbox.on_log("x", "one");
        inbox.on_log("x", "two");
        inbox.on_yaml("y", "a: 1");
        for answer_id in [1, 2] {
            inbox.on_segment(Segment {
                peer: "a".to_string(),
                answer_id,
                timestamp: Duration::from_nanos(answer_id),
                data: Bytes::from_static(b"data"),
            });
        }

        assert_eq!(inbox.logs(), vec!["one".to_string(), "two".to_string()]);
        assert_eq!(inbox.yamls(), vec!["a: 1".to_string()]);
        assert_eq!(inbox.segment_count(), 2);
        assert_eq!(inbox.last_segment().map(|s| s.answer_id), Some(2));

        inbox.reset();
        assert!(inbox.logs().is_empty());
        assert!(inbox.last_segment().is_none());
        assert_eq!(inbox.segment_count(), 0);
    }
}
