use crate::error::AppError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::str::FromStr;
use time::{Date, OffsetDateTime};

/// How long a sent-notification key suppresses a resend.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DedupPolicy {
    /// Keys live until their own expiry: a reminder until the occurrence has
    /// started, a miss notice until the occurrence date is over.
    #[default]
    UntilOccurrencePassed,
    /// Every key is dropped at the end of each sweep over all users.
    PerSweep,
}

impl DedupPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::UntilOccurrencePassed => "until_occurrence_passed",
            Self::PerSweep => "per_sweep",
        }
    }
}

impl FromStr for DedupPolicy {
    type Err = AppError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "until_occurrence_passed" | "occurrence" => Ok(Self::UntilOccurrencePassed),
            "per_sweep" | "sweep" => Ok(Self::PerSweep),
            other => Err(AppError::invalid_input(format!(
                "unknown dedup policy '{other}' (expected until_occurrence_passed or per_sweep)"
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DedupKey {
    pub user_id: String,
    pub task_id: String,
    pub date: Date,
}

impl DedupKey {
    pub fn new(user_id: &str, task_id: &str, date: Date) -> Self {
        Self {
            user_id: user_id.to_string(),
            task_id: task_id.to_string(),
            date,
        }
    }
}

/// Keys of notifications already sent, each with the instant after which it
/// no longer suppresses anything.
#[derive(Debug, Default, Clone)]
pub struct DedupSet {
    entries: BTreeMap<DedupKey, OffsetDateTime>,
}

impl DedupSet {
    pub fn contains(&self, key: &DedupKey) -> bool {
        self.entries.contains_key(key)
    }

    pub fn insert(&mut self, key: DedupKey, expires_at: OffsetDateTime) {
        self.entries.insert(key, expires_at);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn purge_expired(&mut self, now: OffsetDateTime) {
        self.entries.retain(|_, expires_at| *expires_at > now);
    }

    /// End-of-sweep housekeeping for `policy`.
    pub fn end_sweep(&mut self, policy: DedupPolicy, now: OffsetDateTime) {
        match policy {
            DedupPolicy::PerSweep => self.clear(),
            DedupPolicy::UntilOccurrencePassed => self.purge_expired(now),
        }
    }
}
