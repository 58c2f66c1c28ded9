//! Task workflows over one user's slice of the store: the operations behind
//! the CLI commands.
//!
//! Every mutation validates its input before touching storage and saves the
//! affected keys in one pass.

use crate::adherence::{self, AdherenceReport};
use crate::clock::Clock;
use crate::dates::{DAYS_IN_WEEK, at_time, local_date};
use crate::error::AppError;
use crate::model::{
    MAX_INACTIVE_DAYS, NotificationSettings, Occurrence, Schedule, ScheduleDraft, Task, TaskDraft,
    ThreadPeriod,
};
use crate::resolver::Resolver;
use crate::storage::UserSpace;
use serde::Serialize;
use std::collections::BTreeSet;
use time::{Date, Duration, OffsetDateTime, Time};
use tracing::debug;

/// Length given to a one-time task entered without an end.
pub const DEFAULT_ONE_TIME_DURATION: Duration = Duration::hours(1);

/// An occurrence with its ledger state for that date.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DayEntry {
    #[serde(flatten)]
    pub occurrence: Occurrence,
    pub completed: bool,
    pub missed: bool,
}

pub fn add_task(space: &UserSpace, draft: TaskDraft, clock: &dyn Clock) -> Result<Task, AppError> {
    let (name, schedule) = validate_draft(&draft)?;
    let mut tasks = space.tasks()?;
    let now = clock.now();

    let task = Task {
        id: next_task_id(&tasks, now),
        name,
        schedule,
        location: clean_optional(draft.location),
        importance: draft.importance,
        comment: clean_optional(draft.comment),
        created_at: now,
    };

    tasks.push(task.clone());
    space.save_tasks(&tasks)?;
    debug!(user = space.user_id(), task = %task.id, "task added");

    Ok(task)
}

/// Replaces every editable field of `id`, keeping its id and creation time.
pub fn update_task(space: &UserSpace, id: &str, draft: TaskDraft) -> Result<Task, AppError> {
    let (name, schedule) = validate_draft(&draft)?;
    let mut tasks = space.tasks()?;
    let task = find_task_mut(&mut tasks, id)?;

    task.name = name;
    task.schedule = schedule;
    task.location = clean_optional(draft.location);
    task.importance = draft.importance;
    task.comment = clean_optional(draft.comment);

    let updated = task.clone();
    space.save_tasks(&tasks)?;

    Ok(updated)
}

/// Removes the task together with its completion and missed history.
pub fn delete_task(space: &UserSpace, id: &str) -> Result<Task, AppError> {
    let mut tasks = space.tasks()?;
    let index = tasks
        .iter()
        .position(|task| task.id == id)
        .ok_or_else(|| task_not_found(id))?;
    let removed = tasks.remove(index);

    let mut ledger = space.ledger()?;
    ledger.forget_task(id);

    space.save_tasks(&tasks)?;
    space.save_ledger(&ledger)?;
    debug!(user = space.user_id(), task = id, "task deleted");

    Ok(removed)
}

pub fn get_task(space: &UserSpace, id: &str) -> Result<Task, AppError> {
    space
        .tasks()?
        .into_iter()
        .find(|task| task.id == id)
        .ok_or_else(|| task_not_found(id))
}

pub fn list_tasks(space: &UserSpace) -> Result<Vec<Task>, AppError> {
    space.tasks()
}

/// The day's agenda: every occurrence on `date`, earliest first, with its
/// completed and missed flags.
pub fn tasks_for_date(
    space: &UserSpace,
    clock: &dyn Clock,
    date: Date,
) -> Result<Vec<DayEntry>, AppError> {
    let tasks = space.tasks()?;
    let ledger = space.ledger()?;
    let resolver = Resolver::new(clock.offset());

    Ok(resolver
        .resolve_all(&tasks, date)
        .into_iter()
        .map(|occurrence| DayEntry {
            completed: ledger.is_completed(&occurrence.task_id, date),
            missed: ledger.is_missed(&occurrence.task_id, date),
            occurrence,
        })
        .collect())
}

/// Marks `(id, date)` done and clears any missed mark on it. Returns `false`
/// when it was already done.
pub fn complete_occurrence(
    space: &UserSpace,
    clock: &dyn Clock,
    id: &str,
    date: Date,
) -> Result<bool, AppError> {
    ensure_task_exists(space, id)?;
    let mut ledger = space.ledger()?;
    let added = ledger.complete(id, date, clock.now());
    ledger.unmark_missed(id, date);
    space.save_ledger(&ledger)?;
    Ok(added)
}

/// Returns `false` when `(id, date)` was not done.
pub fn uncomplete_occurrence(space: &UserSpace, id: &str, date: Date) -> Result<bool, AppError> {
    ensure_task_exists(space, id)?;
    let mut ledger = space.ledger()?;
    let removed = ledger.uncomplete(id, date);
    ledger.unmark_missed(id, date);
    space.save_ledger(&ledger)?;
    Ok(removed)
}

/// Flips the missed mark and returns the new state.
pub fn toggle_missed(
    space: &UserSpace,
    clock: &dyn Clock,
    id: &str,
    date: Date,
) -> Result<bool, AppError> {
    ensure_task_exists(space, id)?;
    let mut ledger = space.ledger()?;
    let missed = ledger.toggle_missed(id, date, clock.now());
    space.save_ledger(&ledger)?;
    Ok(missed)
}

/// Moves a one-time task to `new_date` at `new_time` (local), keeping its
/// length. The missed mark on the old date is cleared.
pub fn reschedule_task(
    space: &UserSpace,
    clock: &dyn Clock,
    id: &str,
    new_date: Date,
    new_time: Time,
) -> Result<Task, AppError> {
    let mut tasks = space.tasks()?;
    let task = find_task_mut(&mut tasks, id)?;

    let Schedule::OneTime {
        start_time,
        end_time,
    } = &mut task.schedule
    else {
        return Err(AppError::invalid_input(
            "only one-time tasks can be rescheduled",
        ));
    };

    let old_date = local_date(*start_time, clock.offset());
    let new_start = at_time(new_date, new_time, clock.offset());
    let new_end = new_start
        .checked_add(*end_time - *start_time)
        .ok_or_else(end_out_of_range)?;
    *start_time = new_start;
    *end_time = new_end;

    let updated = task.clone();
    let mut ledger = space.ledger()?;
    ledger.unmark_missed(id, old_date);

    space.save_tasks(&tasks)?;
    space.save_ledger(&ledger)?;

    Ok(updated)
}

/// Records a miss for every one-time occurrence of today that has ended
/// without being completed or marked missed. Returns how many were marked.
pub fn mark_overdue_missed(space: &UserSpace, clock: &dyn Clock) -> Result<usize, AppError> {
    let now = clock.now();
    let today = clock.today();
    let tasks = space.tasks()?;
    let mut ledger = space.ledger()?;
    let resolver = Resolver::new(clock.offset());

    let overdue: Vec<Occurrence> = tasks
        .iter()
        .filter(|task| task.is_one_time())
        .filter_map(|task| resolver.resolve(task, today))
        .filter(|occurrence| occurrence.end < now)
        .filter(|occurrence| {
            !ledger.is_completed(&occurrence.task_id, today)
                && !ledger.is_missed(&occurrence.task_id, today)
        })
        .collect();
    if overdue.is_empty() {
        return Ok(0);
    }

    for occurrence in &overdue {
        ledger.toggle_missed(&occurrence.task_id, today, now);
    }
    space.save_ledger(&ledger)?;
    debug!(user = space.user_id(), count = overdue.len(), "overdue tasks marked missed");

    Ok(overdue.len())
}

/// First uncompleted occurrence of today that is under way at `clock.now()`.
pub fn current_task(space: &UserSpace, clock: &dyn Clock) -> Result<Option<Occurrence>, AppError> {
    let now = clock.now();
    Ok(open_occurrences_today(space, clock)?
        .into_iter()
        .find(|occurrence| occurrence.is_in_progress(now)))
}

/// Earliest uncompleted occurrence of today that has not started yet.
pub fn next_task(space: &UserSpace, clock: &dyn Clock) -> Result<Option<Occurrence>, AppError> {
    let now = clock.now();
    Ok(open_occurrences_today(space, clock)?
        .into_iter()
        .find(|occurrence| occurrence.start > now))
}

/// Adherence over `period`, or over the user's stored period when `None`.
pub fn strength(
    space: &UserSpace,
    clock: &dyn Clock,
    period: Option<ThreadPeriod>,
) -> Result<AdherenceReport, AppError> {
    let period = match period {
        Some(period) => period,
        None => space.period()?,
    };
    let tasks = space.tasks()?;
    let ledger = space.ledger()?;
    let resolver = Resolver::new(clock.offset());

    Ok(adherence::report(
        &tasks,
        &ledger,
        &resolver,
        clock.today(),
        period.days(),
    ))
}

pub fn period(space: &UserSpace) -> Result<ThreadPeriod, AppError> {
    space.period()
}

pub fn set_period(space: &UserSpace, period: ThreadPeriod) -> Result<(), AppError> {
    space.save_period(period)
}

pub fn notification_settings(space: &UserSpace) -> Result<NotificationSettings, AppError> {
    space.settings()
}

pub fn save_notification_settings(
    space: &UserSpace,
    settings: &NotificationSettings,
) -> Result<(), AppError> {
    if settings.inactive_days > MAX_INACTIVE_DAYS {
        return Err(AppError::invalid_input(format!(
            "inactivity window must be at most {MAX_INACTIVE_DAYS} days"
        )));
    }
    space.save_settings(settings)
}

fn open_occurrences_today(
    space: &UserSpace,
    clock: &dyn Clock,
) -> Result<Vec<Occurrence>, AppError> {
    let today = clock.today();
    let tasks = space.tasks()?;
    let ledger = space.ledger()?;
    let resolver = Resolver::new(clock.offset());

    Ok(resolver
        .resolve_all(&tasks, today)
        .into_iter()
        .filter(|occurrence| !ledger.is_completed(&occurrence.task_id, today))
        .collect())
}

fn validate_draft(draft: &TaskDraft) -> Result<(String, Schedule), AppError> {
    let name = draft.name.trim();
    if name.is_empty() {
        return Err(AppError::invalid_input("task name is required"));
    }

    let schedule = match &draft.schedule {
        ScheduleDraft::OneTime {
            start_time,
            end_time,
        } => {
            let end_time = match end_time {
                Some(end_time) => *end_time,
                None => start_time
                    .checked_add(DEFAULT_ONE_TIME_DURATION)
                    .ok_or_else(end_out_of_range)?,
            };
            if end_time < *start_time {
                return Err(AppError::invalid_input("end time must not precede start time"));
            }
            Schedule::OneTime {
                start_time: *start_time,
                end_time,
            }
        }
        ScheduleDraft::Recurring {
            start_date,
            time,
            end_time,
            days_of_week,
            cycle_weeks,
        } => {
            if days_of_week.is_empty() {
                return Err(AppError::invalid_input(
                    "select at least one day of the week",
                ));
            }
            if let Some(day) = days_of_week.iter().find(|day| **day >= DAYS_IN_WEEK) {
                return Err(AppError::invalid_input(format!(
                    "day of week {day} is out of range (0=Monday..6=Sunday)"
                )));
            }
            if *cycle_weeks < 1 {
                return Err(AppError::invalid_input("cycle must last at least one week"));
            }
            if let Some(end) = end_time
                && end < time
            {
                return Err(AppError::invalid_input("end time must not precede start time"));
            }
            Schedule::Recurring {
                start_date: *start_date,
                time: *time,
                end_time: *end_time,
                days_of_week: days_of_week.iter().copied().collect::<BTreeSet<u8>>(),
                cycle_weeks: *cycle_weeks,
            }
        }
    };

    Ok((name.to_string(), schedule))
}

fn clean_optional(value: Option<String>) -> Option<String> {
    value
        .map(|raw| raw.trim().to_string())
        .filter(|trimmed| !trimmed.is_empty())
}

fn next_task_id(tasks: &[Task], now: OffsetDateTime) -> String {
    let mut nanos = now.unix_timestamp_nanos();
    loop {
        let candidate = format!("task-{nanos}");
        if !tasks.iter().any(|task| task.id == candidate) {
            return candidate;
        }
        nanos += 1;
    }
}

fn find_task_mut<'a>(tasks: &'a mut [Task], id: &str) -> Result<&'a mut Task, AppError> {
    tasks
        .iter_mut()
        .find(|task| task.id == id)
        .ok_or_else(|| task_not_found(id))
}

fn ensure_task_exists(space: &UserSpace, id: &str) -> Result<(), AppError> {
    if space.tasks()?.iter().any(|task| task.id == id) {
        Ok(())
    } else {
        Err(task_not_found(id))
    }
}

fn end_out_of_range() -> AppError {
    AppError::invalid_input("end time falls outside the supported date range")
}

fn task_not_found(id: &str) -> AppError {
    AppError::not_found(format!("task '{id}' not found"))
}
