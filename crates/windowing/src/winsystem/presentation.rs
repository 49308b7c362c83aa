//! Presentation feedback bookkeeping
//!
//! Every swapped frame gets a submission entry keyed by the feedback id.
//! Timestamps are durations on the presentation clock announced by the
//! compositor. The feedback for a frame may never arrive, so the pending
//! list is bounded by count and by age; evicted entries count as discarded.

use std::collections::VecDeque;
use std::time::Duration;

use crate::config::PresentationConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmissionState {
    Pending,
    Presented,
    Discarded,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Submission {
    id: u64,
    submitted_at: Duration,
}

/// Counters since creation
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PresentationStats {
    pub presented: u64,
    pub discarded: u64,
    pub evicted: u64,
}

#[derive(Debug)]
pub struct PresentationTracker {
    pending: VecDeque<Submission>,
    /// Outcome of recently completed submissions, oldest first
    finished: VecDeque<(u64, SubmissionState)>,
    latencies: VecDeque<Duration>,
    window: usize,
    max_pending: usize,
    timeout: Duration,
    stats: PresentationStats,
}

impl PresentationTracker {
    pub fn new(config: &PresentationConfig) -> Self {
        Self {
            pending: VecDeque::new(),
            finished: VecDeque::new(),
            latencies: VecDeque::with_capacity(config.latency_window),
            window: config.latency_window.max(1),
            max_pending: config.max_pending.max(1),
            timeout: Duration::from_millis(config.pending_timeout_ms),
            stats: PresentationStats::default(),
        }
    }

    /// A frame was swapped; `now` is the current presentation-clock time
    pub fn submit(&mut self, id: u64, now: Duration) {
        self.evict_expired(now);
        while self.pending.len() >= self.max_pending {
            if let Some(oldest) = self.pending.pop_front() {
                tracing::trace!(id = oldest.id, "evicting oldest pending feedback");
                self.stats.evicted += 1;
                self.stats.discarded += 1;
                self.finish(oldest.id, SubmissionState::Discarded);
            }
        }
        self.pending.push_back(Submission {
            id,
            submitted_at: now,
        });
    }

    /// The compositor presented frame `id` at `presented_at`
    ///
    /// Returns the latency of this frame, or `None` for an unknown id.
    pub fn presented(&mut self, id: u64, presented_at: Duration) -> Option<Duration> {
        let submission = self.take(id)?;
        let latency = presented_at.saturating_sub(submission.submitted_at);
        if self.latencies.len() == self.window {
            self.latencies.pop_front();
        }
        self.latencies.push_back(latency);
        self.stats.presented += 1;
        self.finish(id, SubmissionState::Presented);
        Some(latency)
    }

    /// The compositor discarded frame `id`
    pub fn discarded(&mut self, id: u64) -> bool {
        let known = self.take(id).is_some();
        if known {
            self.stats.discarded += 1;
            self.finish(id, SubmissionState::Discarded);
        }
        known
    }

    /// Drop pending entries older than the timeout
    pub fn evict_expired(&mut self, now: Duration) {
        while let Some(oldest) = self.pending.front() {
            if now.saturating_sub(oldest.submitted_at) <= self.timeout {
                break;
            }
            let id = oldest.id;
            tracing::trace!(id, "pending feedback timed out");
            self.pending.pop_front();
            self.stats.evicted += 1;
            self.stats.discarded += 1;
            self.finish(id, SubmissionState::Discarded);
        }
    }

    /// Moving average of the last presented frames
    pub fn latency(&self) -> Option<Duration> {
        if self.latencies.is_empty() {
            return None;
        }
        let total: Duration = self.latencies.iter().sum();
        Some(total / self.latencies.len() as u32)
    }

    /// `None` for ids never submitted or completed too long ago
    pub fn state(&self, id: u64) -> Option<SubmissionState> {
        if self.pending.iter().any(|s| s.id == id) {
            return Some(SubmissionState::Pending);
        }
        self.finished
            .iter()
            .rev()
            .find(|(finished, _)| *finished == id)
            .map(|(_, state)| *state)
    }

    pub fn pending(&self) -> usize {
        self.pending.len()
    }

    pub fn stats(&self) -> PresentationStats {
        self.stats
    }

    fn finish(&mut self, id: u64, state: SubmissionState) {
        if self.finished.len() >= self.max_pending {
            self.finished.pop_front();
        }
        self.finished.push_back((id, state));
    }

    fn take(&mut self, id: u64) -> Option<Submission> {
        let index = self.pending.iter().position(|s| s.id == id)?;
        self.pending.remove(index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tracker(window: usize, max_pending: usize, timeout_ms: u64) -> PresentationTracker {
        PresentationTracker::new(&PresentationConfig {
            latency_window: window,
            max_pending,
            pending_timeout_ms: timeout_ms,
        })
    }

    fn ms(value: u64) -> Duration {
        Duration::from_millis(value)
    }

    #[test]
    fn latency_is_average_of_window() {
        let mut t = tracker(2, 8, 1000);
        t.submit(1, ms(0));
        t.submit(2, ms(10));
        t.submit(3, ms(20));
        assert_eq!(t.presented(1, ms(16)), Some(ms(16)));
        assert_eq!(t.presented(2, ms(30)), Some(ms(20)));
        assert_eq!(t.latency(), Some(ms(18)));
        assert_eq!(t.state(1), Some(SubmissionState::Presented));

        // Window of two drops the first sample
        t.presented(3, ms(44));
        assert_eq!(t.latency(), Some(ms(22)));
        assert_eq!(t.stats().presented, 3);
    }

    #[test]
    fn no_latency_before_first_presentation() {
        let mut t = tracker(4, 8, 1000);
        t.submit(1, ms(0));
        assert_eq!(t.latency(), None);
        assert!(t.discarded(1));
        assert_eq!(t.latency(), None);
    }

    #[test]
    fn pending_bounded_by_count() {
        let mut t = tracker(4, 2, 1000);
        t.submit(1, ms(0));
        t.submit(2, ms(1));
        t.submit(3, ms(2));
        assert_eq!(t.pending(), 2);
        assert_eq!(t.state(1), Some(SubmissionState::Discarded));
        assert_eq!(t.state(3), Some(SubmissionState::Pending));
        assert_eq!(t.stats().evicted, 1);
        assert_eq!(t.stats().discarded, 1);

        // Late feedback for an evicted frame is ignored
        assert_eq!(t.presented(1, ms(20)), None);
    }

    #[test]
    fn pending_bounded_by_age() {
        let mut t = tracker(4, 16, 100);
        t.submit(1, ms(0));
        t.submit(2, ms(70));
        t.submit(3, ms(160));
        assert_eq!(t.pending(), 2);
        assert_eq!(t.state(1), Some(SubmissionState::Discarded));

        t.evict_expired(ms(300));
        assert_eq!(t.pending(), 0);
        assert_eq!(t.stats().discarded, 3);
    }

    #[test]
    fn presentation_before_submission_time_saturates() {
        let mut t = tracker(4, 16, 100);
        t.submit(7, ms(50));
        assert_eq!(t.presented(7, ms(40)), Some(Duration::ZERO));
    }

    #[test]
    fn unknown_discard_is_ignored() {
        let mut t = tracker(4, 16, 100);
        assert!(!t.discarded(42));
        assert_eq!(t.state(42), None);
        assert_eq!(t.stats().discarded, 0);
    }
}
