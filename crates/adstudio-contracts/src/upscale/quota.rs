use std::path::{Path, PathBuf};

use chrono::{DateTime, Datelike, Utc};
use serde::{Deserialize, Serialize};

pub const MONTHLY_FREE_QUOTA: u32 = 100;

/// On-disk shape of the ledger: usage counter for one calendar month.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuotaTracker {
    pub month: String,
    pub used: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuotaStatus {
    pub used: u32,
    pub total: u32,
    pub remaining: u32,
}

impl QuotaStatus {
    pub fn is_exhausted(&self) -> bool {
        self.remaining == 0
    }
}

/// Monthly upscale allowance persisted as a small JSON file. A tracker from
/// an earlier month reads back as zero usage.
#[derive(Debug, Clone)]
pub struct QuotaLedger {
    path: PathBuf,
    monthly_quota: u32,
}

impl QuotaLedger {
    pub fn new(path: impl Into<PathBuf>, monthly_quota: u32) -> Self {
        Self {
            path: path.into(),
            monthly_quota,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn status(&self) -> QuotaStatus {
        self.status_for(&month_key(Utc::now()))
    }

    pub fn status_for(&self, month: &str) -> QuotaStatus {
        let tracker = self.tracker_for(month);
        QuotaStatus {
            used: tracker.used,
            total: self.monthly_quota,
            remaining: self.monthly_quota.saturating_sub(tracker.used),
        }
    }

    pub fn record_use(&self) -> anyhow::Result<QuotaStatus> {
        self.record_use_for(&month_key(Utc::now()))
    }

    pub fn record_use_for(&self, month: &str) -> anyhow::Result<QuotaStatus> {
        let mut tracker = self.tracker_for(month);
        tracker.used = tracker.used.saturating_add(1);
        write_tracker(&self.path, &tracker)?;
        Ok(self.status_for(month))
    }

    fn tracker_for(&self, month: &str) -> QuotaTracker {
        match read_tracker(&self.path) {
            Some(tracker) if tracker.month == month => tracker,
            _ => QuotaTracker {
                month: month.to_string(),
                used: 0,
            },
        }
    }
}

/// `YYYY-MM` key for the month containing `now`.
pub fn month_key(now: DateTime<Utc>) -> String {
    format!("{:04}-{:02}", now.year(), now.month())
}

fn read_tracker(path: &Path) -> Option<QuotaTracker> {
    let raw = std::fs::read_to_string(path).ok()?;
    serde_json::from_str(&raw).ok()
}

fn write_tracker(path: &Path, tracker: &QuotaTracker) -> anyhow::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, serde_json::to_string_pretty(tracker)?)?;
    Ok(())
}
