//! Database statistics.
//!
//! Counters are updated with relaxed atomics while the database runs;
//! [`Database::stats`](crate::Database::stats) combines them with gauges
//! read from the current state into a [`StatsSnapshot`].

use std::sync::atomic::{AtomicU64, Ordering};

/// Running counters for one open database.
#[derive(Debug, Default)]
pub struct DatabaseStats {
    transactions_started: AtomicU64,
    commits: AtomicU64,
    failed_commits: AtomicU64,
    rollbacks: AtomicU64,
    bytes_logged: AtomicU64,
    compactions: AtomicU64,
}

impl DatabaseStats {
    /// Creates zeroed counters.
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record_begin(&self) {
        self.transactions_started.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_commit(&self, bytes: u64) {
        self.commits.fetch_add(1, Ordering::Relaxed);
        self.bytes_logged.fetch_add(bytes, Ordering::Relaxed);
    }

    pub(crate) fn record_failed_commit(&self) {
        self.failed_commits.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_rollback(&self) {
        self.rollbacks.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_compaction(&self) {
        self.compactions.fetch_add(1, Ordering::Relaxed);
    }

    /// Transactions begun against the database.
    pub fn transactions_started(&self) -> u64 {
        self.transactions_started.load(Ordering::Relaxed)
    }

    /// Successful commits since open.
    pub fn commits(&self) -> u64 {
        self.commits.load(Ordering::Relaxed)
    }

    /// Commits that failed to reach the log.
    pub fn failed_commits(&self) -> u64 {
        self.failed_commits.load(Ordering::Relaxed)
    }

    /// Rollbacks since open.
    pub fn rollbacks(&self) -> u64 {
        self.rollbacks.load(Ordering::Relaxed)
    }

    /// Bytes appended to the commit log by commits.
    pub fn bytes_logged(&self) -> u64 {
        self.bytes_logged.load(Ordering::Relaxed)
    }

    /// Compactions since open.
    pub fn compactions(&self) -> u64 {
        self.compactions.load(Ordering::Relaxed)
    }
}

/// A point-in-time view of database statistics.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct StatsSnapshot {
    /// Live committed entries.
    pub entries: u64,
    /// Sequence number of the last commit.
    pub sequence: u64,
    /// Current size of the commit log in bytes.
    pub log_size: u64,
    /// Approximate memory held by the committed trie.
    pub memory_usage: u64,
    /// Records replayed when the database was opened.
    pub replayed_records: u64,
    /// Transactions begun since open.
    pub transactions_started: u64,
    /// Successful commits since open.
    pub commits: u64,
    /// Commits that failed to reach the log.
    pub failed_commits: u64,
    /// Rollbacks since open.
    pub rollbacks: u64,
    /// Bytes appended to the log by commits since open.
    pub bytes_logged: u64,
    /// Compactions since open.
    pub compactions: u64,
}

impl StatsSnapshot {
    pub(crate) fn with_counters(mut self, stats: &DatabaseStats) -> Self {
        self.transactions_started = stats.transactions_started();
        self.commits = stats.commits();
        self.failed_commits = stats.failed_commits();
        self.rollbacks = stats.rollbacks();
        self.bytes_logged = stats.bytes_logged();
        self.compactions = stats.compactions();
        self
    }
}
