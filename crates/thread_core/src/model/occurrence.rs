use super::Importance;
use crate::dates::iso_date;
use serde::Serialize;
use time::{Date, OffsetDateTime};

/// A task materialised on one calendar date. Never stored; identity for
/// completion tracking is `(task_id, date)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Occurrence {
    pub task_id: String,
    #[serde(with = "iso_date")]
    pub date: Date,
    #[serde(with = "time::serde::rfc3339")]
    pub start: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub end: OffsetDateTime,
    /// Whether the task carries an explicit end (a recurring task without an
    /// end time has `end == start`).
    pub has_end: bool,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    pub importance: Importance,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
}

impl Occurrence {
    pub fn key(&self) -> (&str, Date) {
        (self.task_id.as_str(), self.date)
    }

    pub fn is_in_progress(&self, now: OffsetDateTime) -> bool {
        self.start <= now && now <= self.end
    }
}
