use crate::dates::iso_date;
use serde::{Deserialize, Serialize};
use time::{Date, OffsetDateTime};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletionRecord {
    pub task_id: String,
    #[serde(with = "iso_date")]
    pub date: Date,
    #[serde(with = "time::serde::rfc3339")]
    pub completed_at: OffsetDateTime,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MissedRecord {
    pub task_id: String,
    #[serde(with = "iso_date")]
    pub date: Date,
    #[serde(with = "time::serde::rfc3339")]
    pub missed_at: OffsetDateTime,
}

impl CompletionRecord {
    pub fn matches(&self, task_id: &str, date: Date) -> bool {
        self.task_id == task_id && self.date == date
    }
}

impl MissedRecord {
    pub fn matches(&self, task_id: &str, date: Date) -> bool {
        self.task_id == task_id && self.date == date
    }
}
