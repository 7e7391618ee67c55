//! Monotonic answer ids for segment frames.

use std::sync::OnceLock;
use std::time::{Duration, Instant};

static EPOCH: OnceLock<Instant> = OnceLock::new();

/// Nanoseconds elapsed since a fixed, process-wide monotonic epoch.
///
/// Segment frames carry this value as their answer id so the consumer can
/// correlate the segment with the request that triggered it.
pub fn monotonic_answer_id() -> u64 {
    let epoch = *EPOCH.get_or_init(Instant::now);
    u64::try_from(epoch.elapsed().as_nanos()).unwrap_or(u64::MAX)
}

/// Interpret an answer id as a duration since the monotonic epoch.
pub fn answer_id_to_duration(answer_id: u64) -> Duration {
    Duration::from_nanos(answer_id)
}
