use crate::model::{CompletionRecord, MissedRecord};
use time::{Date, OffsetDateTime};

/// Completion and missed records for one user, keyed by `(task_id, date)`.
///
/// Completion is set-like and idempotent. Missed marks flip on every
/// [`Ledger::toggle_missed`]. The two sets are independent: a pair may be both
/// completed and missed.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Ledger {
    completions: Vec<CompletionRecord>,
    missed: Vec<MissedRecord>,
}

impl Ledger {
    pub fn new(completions: Vec<CompletionRecord>, missed: Vec<MissedRecord>) -> Self {
        Self {
            completions,
            missed,
        }
    }

    pub fn completions(&self) -> &[CompletionRecord] {
        &self.completions
    }

    pub fn missed(&self) -> &[MissedRecord] {
        &self.missed
    }

    /// Returns `true` when a new record was added.
    pub fn complete(&mut self, task_id: &str, date: Date, completed_at: OffsetDateTime) -> bool {
        if self.is_completed(task_id, date) {
            return false;
        }
        self.completions.push(CompletionRecord {
            task_id: task_id.to_string(),
            date,
            completed_at,
        });
        true
    }

    /// Returns `true` when a record was removed.
    pub fn uncomplete(&mut self, task_id: &str, date: Date) -> bool {
        let before = self.completions.len();
        self.completions
            .retain(|record| !record.matches(task_id, date));
        self.completions.len() != before
    }

    pub fn is_completed(&self, task_id: &str, date: Date) -> bool {
        self.completions
            .iter()
            .any(|record| record.matches(task_id, date))
    }

    /// Flips the missed mark and returns the new state.
    pub fn toggle_missed(&mut self, task_id: &str, date: Date, missed_at: OffsetDateTime) -> bool {
        if self.unmark_missed(task_id, date) {
            return false;
        }
        self.missed.push(MissedRecord {
            task_id: task_id.to_string(),
            date,
            missed_at,
        });
        true
    }

    pub fn is_missed(&self, task_id: &str, date: Date) -> bool {
        self.missed.iter().any(|record| record.matches(task_id, date))
    }

    /// Clears the missed mark whatever its state. Returns `true` when one
    /// was present.
    pub fn unmark_missed(&mut self, task_id: &str, date: Date) -> bool {
        let before = self.missed.len();
        self.missed.retain(|record| !record.matches(task_id, date));
        self.missed.len() != before
    }

    pub fn completed_since(&self, since: OffsetDateTime) -> usize {
        self.completions
            .iter()
            .filter(|record| record.completed_at >= since)
            .count()
    }

    /// Drops every record of `task_id`.
    pub fn forget_task(&mut self, task_id: &str) {
        self.completions.retain(|record| record.task_id != task_id);
        self.missed.retain(|record| record.task_id != task_id);
    }

    pub fn into_parts(self) -> (Vec<CompletionRecord>, Vec<MissedRecord>) {
        (self.completions, self.missed)
    }
}
