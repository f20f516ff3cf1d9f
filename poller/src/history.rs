//! Bounded log of recent version checks, for diagnostics.

use std::collections::VecDeque;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::time::Instant;

use staleguard_types::Trigger;

pub const HISTORY_CAPACITY: usize = 50;
pub const STATS_WINDOW: Duration = Duration::from_secs(10 * 60);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckStatus {
    Success,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckRecord {
    pub recorded_at: DateTime<Utc>,
    /// Monotonic timestamp used for windowing.
    pub at: Instant,
    pub trigger: Trigger,
    pub status: CheckStatus,
    pub detail: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CheckStats {
    pub successes: usize,
    pub failures: usize,
    /// Checks inside the window.
    pub recent: usize,
    /// Mean spacing between checks inside the window.
    pub average_interval: Option<Duration>,
}

#[derive(Debug, Default)]
pub struct CheckHistory {
    records: VecDeque<CheckRecord>,
}

impl CheckHistory {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(
        &mut self,
        at: Instant,
        trigger: Trigger,
        status: CheckStatus,
        detail: impl Into<String>,
    ) {
        if self.records.len() == HISTORY_CAPACITY {
            self.records.pop_front();
        }
        self.records.push_back(CheckRecord {
            recorded_at: Utc::now(),
            at,
            trigger,
            status,
            detail: detail.into(),
        });
    }

    /// Oldest first.
    pub fn records(&self) -> impl DoubleEndedIterator<Item = &CheckRecord> + ExactSizeIterator {
        self.records.iter()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    #[must_use]
    pub fn latest(&self) -> Option<&CheckRecord> {
        self.records.back()
    }

    /// Stats over checks recorded in the last [`STATS_WINDOW`] before `now`.
    #[must_use]
    pub fn stats(&self, now: Instant) -> CheckStats {
        let recent: Vec<&CheckRecord> = self
            .records
            .iter()
            .filter(|r| now.saturating_duration_since(r.at) < STATS_WINDOW)
            .collect();

        let successes = recent
            .iter()
            .filter(|r| r.status == CheckStatus::Success)
            .count();

        let average_interval = match (recent.first(), recent.last()) {
            (Some(first), Some(last)) if recent.len() > 1 => {
                let span = last.at.saturating_duration_since(first.at);
                Some(span / u32::try_from(recent.len() - 1).unwrap_or(u32::MAX))
            }
            _ => None,
        };

        CheckStats {
            successes,
            failures: recent.len() - successes,
            recent: recent.len(),
            average_interval,
        }
    }
}
