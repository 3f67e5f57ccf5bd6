//! # Repair log
//!
//! ## Responsibility
//! Keep an append-only, time-ordered audit trail of every detected issue and
//! the remediation taken, bounded to a fixed capacity.
//!
//! ## Guarantees
//! - Immutable: entries are never edited after append
//! - Bounded: the oldest entry is evicted once capacity is reached
//! - Ordered: `recent(n)` is newest-first
//!
//! ## NOT Responsible For
//! - Deciding when to repair (see `monitor` and `recovery`)

use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Classification of a repair action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum IssueType {
    /// A component stopped responding or was restored.
    Failure,
    /// In-flight work exceeded aggregate capacity.
    Congestion,
    /// An in-flight request was abandoned after exceeding the timeout.
    Timeout,
    /// No component was eligible; all were reactivated.
    Emergency,
}

impl IssueType {
    /// Upper-case name used in views and metric labels.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Failure => "FAILURE",
            Self::Congestion => "CONGESTION",
            Self::Timeout => "TIMEOUT",
            Self::Emergency => "EMERGENCY",
        }
    }
}

impl std::fmt::Display for IssueType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One immutable audit record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RepairAction {
    /// Wall-clock time the action was taken.
    pub timestamp: DateTime<Utc>,
    /// Affected component; empty for systemic issues.
    pub component_id: String,
    /// Issue classification.
    pub issue_type: IssueType,
    /// What was done.
    pub action: String,
    /// Whether the remediation achieved its aim.
    pub success: bool,
    /// Free-form detail.
    pub message: String,
}

impl RepairAction {
    /// Build a successful action stamped with the current time.
    pub fn new(
        component_id: impl Into<String>,
        issue_type: IssueType,
        action: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            timestamp: Utc::now(),
            component_id: component_id.into(),
            issue_type,
            action: action.into(),
            success: true,
            message: message.into(),
        }
    }

    /// Override the success flag.
    pub fn with_success(mut self, success: bool) -> Self {
        self.success = success;
        self
    }
}

/// Operator-facing rendering of a [`RepairAction`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RepairActionView {
    /// Component id, empty for systemic issues.
    pub component: String,
    /// Issue name, e.g. `"TIMEOUT"`.
    pub issue: IssueType,
    /// What was done.
    pub action: String,
    /// Whether the remediation achieved its aim.
    pub success: bool,
    /// Free-form detail.
    pub message: String,
    /// RFC 3339 timestamp.
    pub timestamp: String,
}

impl From<&RepairAction> for RepairActionView {
    fn from(a: &RepairAction) -> Self {
        Self {
            component: a.component_id.clone(),
            issue: a.issue_type,
            action: a.action.clone(),
            success: a.success,
            message: a.message.clone(),
            timestamp: a.timestamp.to_rfc3339(),
        }
    }
}

/// Bounded, append-only log of [`RepairAction`]s.
#[derive(Debug, Clone)]
pub struct RepairLog {
    entries: VecDeque<RepairAction>,
    capacity: usize,
    total: u64,
}

impl RepairLog {
    /// Create a log retaining at most `capacity` entries (minimum 1).
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            entries: VecDeque::with_capacity(capacity.min(1024)),
            capacity,
            total: 0,
        }
    }

    /// Append an action, evicting the oldest when full.
    pub fn push(&mut self, action: RepairAction) {
        if self.entries.len() >= self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(action);
        self.total = self.total.saturating_add(1);
    }

    /// The `n` most recent actions, newest first.
    pub fn recent(&self, n: usize) -> impl Iterator<Item = &RepairAction> {
        self.entries.iter().rev().take(n)
    }

    /// Entries currently retained.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// `true` when nothing has been retained.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Actions ever appended, including evicted ones.
    pub fn total_appended(&self) -> u64 {
        self.total
    }
}
