//! Expands task definitions into dated occurrences.
//!
//! Resolution is a pure function of `(task, date)` and the local offset fixed
//! when the [`Resolver`] is built, so repeated calls always agree. That is what
//! lets the poller derive stable dedup keys from occurrences.

use crate::dates::{self, at_time};
use crate::model::{Occurrence, Schedule, Task};
use time::{Date, Duration, UtcOffset};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Resolver {
    offset: UtcOffset,
}

impl Resolver {
    pub fn new(offset: UtcOffset) -> Self {
        Self { offset }
    }

    pub fn offset(&self) -> UtcOffset {
        self.offset
    }

    pub fn resolve(&self, task: &Task, date: Date) -> Option<Occurrence> {
        let (start, end, has_end) = match &task.schedule {
            Schedule::OneTime {
                start_time,
                end_time,
            } => {
                if dates::local_date(*start_time, self.offset) != date {
                    return None;
                }
                (
                    start_time.to_offset(self.offset),
                    end_time.to_offset(self.offset),
                    true,
                )
            }
            Schedule::Recurring {
                start_date,
                time,
                end_time,
                days_of_week,
                cycle_weeks,
            } => {
                let week = dates::week_index(*start_date, date)?;
                if week > i64::from(*cycle_weeks) {
                    return None;
                }
                if !days_of_week.contains(&dates::weekday_index(date)) {
                    return None;
                }
                let start = at_time(date, *time, self.offset);
                let end = end_time.map_or(start, |end| at_time(date, end, self.offset));
                (start, end, end_time.is_some())
            }
        };

        Some(Occurrence {
            task_id: task.id.clone(),
            date,
            start,
            end,
            has_end,
            name: task.name.clone(),
            location: task.location.clone(),
            importance: task.importance,
            comment: task.comment.clone(),
        })
    }

    /// All occurrences on `date`, earliest start first. Ties keep task order.
    pub fn resolve_all(&self, tasks: &[Task], date: Date) -> Vec<Occurrence> {
        let mut occurrences: Vec<Occurrence> = tasks
            .iter()
            .filter_map(|task| self.resolve(task, date))
            .collect();
        occurrences.sort_by_key(|occurrence| occurrence.start);
        occurrences
    }

    /// Occurrences for every date in `from..=to`, grouped by date ascending.
    pub fn resolve_range(&self, tasks: &[Task], from: Date, to: Date) -> Vec<Occurrence> {
        let mut occurrences = Vec::new();
        let mut date = from;
        while date <= to {
            occurrences.extend(self.resolve_all(tasks, date));
            match date.checked_add(Duration::days(1)) {
                Some(next) => date = next,
                None => break,
            }
        }
        occurrences
    }
}
