//! Reminder poller.
//!
//! Each tick walks the registered users in order and, for today's
//! occurrences, sends pre-start reminders and miss notices, plus an
//! inactivity nudge at most once per rolling day. All mutable poller state
//! lives in [`SchedulerState`], which the caller owns and passes in.

mod dedup;
mod messages;

pub use dedup::{DedupKey, DedupPolicy, DedupSet};
pub use messages::{inactivity_text, missed_text, reminder_text};

use crate::clock::Clock;
use crate::dates::at_time;
use crate::error::AppError;
use crate::ledger::Ledger;
use crate::model::{MAX_INACTIVE_DAYS, NotificationSettings, Occurrence, Task};
use crate::notify::NotificationSink;
use crate::resolver::Resolver;
use crate::storage::{KvStore, UserSpace};
use serde::Serialize;
use std::collections::BTreeMap;
use std::future::Future;
use time::{Duration, OffsetDateTime, Time};
use tracing::{debug, info, warn};

/// Interval between poller ticks.
pub const DEFAULT_TICK_INTERVAL: std::time::Duration = std::time::Duration::from_secs(60);

const INACTIVITY_CHECK_EVERY: Duration = Duration::hours(24);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserEntry {
    /// Used when the user has no stored settings.
    pub settings: NotificationSettings,
    pub last_inactivity_check: Option<OffsetDateTime>,
}

impl UserEntry {
    pub fn new(settings: NotificationSettings) -> Self {
        Self {
            settings,
            last_inactivity_check: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct SchedulerState {
    users: BTreeMap<String, UserEntry>,
    reminders: DedupSet,
    miss_notices: DedupSet,
    policy: DedupPolicy,
    sweeps: u64,
}

impl SchedulerState {
    pub fn new(policy: DedupPolicy) -> Self {
        Self {
            users: BTreeMap::new(),
            reminders: DedupSet::default(),
            miss_notices: DedupSet::default(),
            policy,
            sweeps: 0,
        }
    }

    pub fn policy(&self) -> DedupPolicy {
        self.policy
    }

    /// Registers `user_id` with default settings; existing entries are kept.
    pub fn register_user(&mut self, user_id: &str) -> &mut UserEntry {
        self.users
            .entry(user_id.to_string())
            .or_insert_with(|| UserEntry::new(NotificationSettings::default()))
    }

    pub fn register_user_with(&mut self, user_id: &str, settings: NotificationSettings) {
        self.users
            .insert(user_id.to_string(), UserEntry::new(settings));
    }

    pub fn user(&self, user_id: &str) -> Option<&UserEntry> {
        self.users.get(user_id)
    }

    pub fn user_ids(&self) -> impl Iterator<Item = &str> {
        self.users.keys().map(String::as_str)
    }

    /// Registers every user the store knows about. Returns how many were new.
    pub fn discover_users(&mut self, store: &dyn KvStore) -> Result<usize, AppError> {
        let before = self.users.len();
        for user_id in store.users()? {
            self.register_user(&user_id);
        }
        Ok(self.users.len() - before)
    }

    pub fn reminders(&self) -> &DedupSet {
        &self.reminders
    }

    pub fn miss_notices(&self) -> &DedupSet {
        &self.miss_notices
    }

    pub fn sweeps(&self) -> u64 {
        self.sweeps
    }
}

impl Default for SchedulerState {
    fn default() -> Self {
        Self::new(DedupPolicy::default())
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TickReport {
    pub users: usize,
    pub reminders: usize,
    pub miss_notices: usize,
    pub inactivity_nudges: usize,
    pub failures: usize,
}

/// Runs one sweep over every registered user. Never fails: per-user errors
/// are logged and counted in the report.
pub fn tick(
    state: &mut SchedulerState,
    store: &dyn KvStore,
    sink: &dyn NotificationSink,
    clock: &dyn Clock,
) -> TickReport {
    let now = clock.now();
    let resolver = Resolver::new(clock.offset());
    let mut report = TickReport::default();

    let SchedulerState {
        users,
        reminders,
        miss_notices,
        policy,
        sweeps,
    } = state;

    for (user_id, entry) in users.iter_mut() {
        report.users += 1;
        let mut sweep = UserSweep {
            user_id,
            entry,
            reminders: &mut *reminders,
            miss_notices: &mut *miss_notices,
            store,
            sink,
            resolver: &resolver,
            now,
            report: &mut report,
        };
        if let Err(err) = sweep.run() {
            warn!(user = %user_id, "skipping user for this tick: {err}");
            report.failures += 1;
        }
    }

    reminders.end_sweep(*policy, now);
    miss_notices.end_sweep(*policy, now);
    *sweeps += 1;

    if report.reminders + report.miss_notices + report.inactivity_nudges > 0 || report.failures > 0
    {
        info!(
            users = report.users,
            reminders = report.reminders,
            miss_notices = report.miss_notices,
            inactivity_nudges = report.inactivity_nudges,
            failures = report.failures,
            "reminder sweep finished"
        );
    } else {
        debug!(users = report.users, "reminder sweep finished, nothing to send");
    }

    report
}

/// Ticks on a fixed interval until `shutdown` resolves. The first tick runs
/// immediately.
pub async fn run<F>(
    state: &mut SchedulerState,
    store: &dyn KvStore,
    sink: &dyn NotificationSink,
    clock: &dyn Clock,
    every: std::time::Duration,
    discover: bool,
    shutdown: F,
) where
    F: Future<Output = ()>,
{
    let mut interval = tokio::time::interval(every);
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    tokio::pin!(shutdown);

    info!(every_secs = every.as_secs(), "reminder poller started");
    loop {
        tokio::select! {
            _ = &mut shutdown => {
                info!(sweeps = state.sweeps(), "reminder poller stopped");
                return;
            }
            _ = interval.tick() => {
                if discover {
                    match state.discover_users(store) {
                        Ok(0) => {}
                        Ok(added) => info!(added, "registered new users"),
                        Err(err) => warn!("user discovery failed: {err}"),
                    }
                }
                tick(state, store, sink, clock);
            }
        }
    }
}

struct UserSweep<'a> {
    user_id: &'a str,
    entry: &'a mut UserEntry,
    reminders: &'a mut DedupSet,
    miss_notices: &'a mut DedupSet,
    store: &'a dyn KvStore,
    sink: &'a dyn NotificationSink,
    resolver: &'a Resolver,
    now: OffsetDateTime,
    report: &'a mut TickReport,
}

impl UserSweep<'_> {
    fn run(&mut self) -> Result<(), AppError> {
        let space = UserSpace::new(self.store, self.user_id);
        let tasks = space.tasks()?;
        if let Some(stored) = space.stored_settings()? {
            self.entry.settings = stored;
        }
        let settings = self.entry.settings;
        let today = self.now.date();
        let occurrences = self.resolver.resolve_all(&tasks, today);

        if settings.enabled {
            for occurrence in &occurrences {
                self.remind(occurrence, settings.before_task);
            }
        }

        let mut ledger: Option<Ledger> = None;
        if settings.missed_task {
            for occurrence in &occurrences {
                if occurrence.end >= self.now || occurrence.date != today {
                    continue;
                }
                let key = DedupKey::new(self.user_id, &occurrence.task_id, occurrence.date);
                if self.miss_notices.contains(&key) {
                    continue;
                }
                if ledger.is_none() {
                    ledger = Some(space.ledger()?);
                }
                let completed = ledger
                    .as_ref()
                    .is_some_and(|ledger| ledger.is_completed(&occurrence.task_id, occurrence.date));
                if completed {
                    continue;
                }
                if self.deliver(&missed_text(occurrence), "miss notice") {
                    let expires_at = end_of_day(occurrence);
                    self.miss_notices.insert(key, expires_at);
                    self.report.miss_notices += 1;
                }
            }
        }

        let due = self
            .entry
            .last_inactivity_check
            .is_none_or(|last| self.now - last > INACTIVITY_CHECK_EVERY);
        if due {
            self.entry.last_inactivity_check = Some(self.now);
            if settings.inactive_days > 0 {
                let ledger = match ledger {
                    Some(ledger) => ledger,
                    None => space.ledger()?,
                };
                self.check_inactivity(&tasks, &ledger, settings.inactive_days);
            }
        }

        Ok(())
    }

    fn remind(&mut self, occurrence: &Occurrence, before_task: u32) {
        let until = occurrence.start - self.now;
        if until <= Duration::ZERO || until > Duration::minutes(i64::from(before_task)) {
            return;
        }
        let key = DedupKey::new(self.user_id, &occurrence.task_id, occurrence.date);
        if self.reminders.contains(&key) {
            return;
        }
        if self.deliver(&reminder_text(occurrence), "reminder") {
            self.reminders.insert(key, occurrence.start);
            self.report.reminders += 1;
        }
    }

    fn check_inactivity(&mut self, tasks: &[Task], ledger: &Ledger, days: u32) {
        let days = days.min(MAX_INACTIVE_DAYS);
        let recent = match self.now.checked_sub(Duration::days(i64::from(days))) {
            Some(since) => ledger.completed_since(since),
            None => ledger.completions().len(),
        };
        if recent > 0 {
            return;
        }
        let today = self.now.date();
        let from = today
            .checked_sub(Duration::days(i64::from(days) - 1))
            .unwrap_or(today);
        if self.resolver.resolve_range(tasks, from, today).is_empty() {
            return;
        }
        if self.deliver(&inactivity_text(days), "inactivity nudge") {
            self.report.inactivity_nudges += 1;
        }
    }

    fn deliver(&mut self, text: &str, what: &str) -> bool {
        match self.sink.send(self.user_id, text) {
            Ok(()) => {
                debug!(user = %self.user_id, "{what} sent");
                true
            }
            Err(err) => {
                warn!(user = %self.user_id, "{what} not delivered: {err}");
                self.report.failures += 1;
                false
            }
        }
    }
}

/// Midnight after the occurrence date, in the occurrence's offset.
fn end_of_day(occurrence: &Occurrence) -> OffsetDateTime {
    let offset = occurrence.start.offset();
    match occurrence.date.next_day() {
        Some(next) => at_time(next, Time::MIDNIGHT, offset),
        None => occurrence.end,
    }
}

#[cfg(test)]
mod tests {
    use super::{DedupPolicy, SchedulerState, run, tick};
    use crate::clock::FixedClock;
    use crate::error::AppError;
    use crate::model::{Importance, NotificationSettings, Schedule, Task};
    use crate::notify::{NotificationSink, RecordingSink};
    use crate::storage::{KvStore, MemoryStore, UserSpace};
    use std::collections::BTreeSet;
    use time::macros::{date, datetime, time};
    use time::{Duration, OffsetDateTime};

    fn one_time(id: &str, name: &str, start: OffsetDateTime) -> Task {
        Task {
            id: id.to_string(),
            name: name.to_string(),
            schedule: Schedule::OneTime {
                start_time: start,
                end_time: start + Duration::hours(1),
            },
            location: None,
            importance: Importance::Medium,
            comment: None,
            created_at: datetime!(2024-01-01 0:00 UTC),
        }
    }

    fn quiet_settings() -> NotificationSettings {
        NotificationSettings {
            enabled: true,
            before_task: 15,
            missed_task: true,
            inactive_days: 0,
        }
    }

    fn seed(store: &MemoryStore, user: &str, tasks: &[Task]) {
        UserSpace::new(store, user).save_tasks(tasks).unwrap();
    }

    fn texts(sink: &RecordingSink) -> Vec<String> {
        sink.sent().into_iter().map(|(_, text)| text).collect()
    }

    #[test]
    fn reminder_fires_once_inside_window() {
        let store = MemoryStore::new();
        seed(
            &store,
            "local",
            &[one_time("task-1", "Dentist", datetime!(2024-03-01 9:00 UTC))],
        );
        let clock = FixedClock::new(datetime!(2024-03-01 8:50 UTC));
        let sink = RecordingSink::new();
        let mut state = SchedulerState::default();
        state.register_user_with("local", quiet_settings());

        let first = tick(&mut state, &store, &sink, &clock);
        clock.advance(Duration::minutes(1));
        let second = tick(&mut state, &store, &sink, &clock);

        assert_eq!(first.reminders, 1);
        assert_eq!(second.reminders, 0);
        let sent = texts(&sink);
        assert_eq!(sent.len(), 1);
        assert!(sent[0].starts_with("Reminder: Dentist"));
    }

    #[test]
    fn per_sweep_policy_resends_after_clear() {
        let store = MemoryStore::new();
        seed(
            &store,
            "local",
            &[one_time("task-1", "Dentist", datetime!(2024-03-01 9:00 UTC))],
        );
        let clock = FixedClock::new(datetime!(2024-03-01 8:50 UTC));
        let sink = RecordingSink::new();
        let mut state = SchedulerState::new(DedupPolicy::PerSweep);
        state.register_user_with("local", quiet_settings());

        tick(&mut state, &store, &sink, &clock);
        assert!(state.reminders().is_empty());
        clock.advance(Duration::minutes(1));
        tick(&mut state, &store, &sink, &clock);

        assert_eq!(texts(&sink).len(), 2);
        assert_eq!(state.sweeps(), 2);
    }

    #[test]
    fn reminder_key_expires_once_occurrence_starts() {
        let store = MemoryStore::new();
        seed(
            &store,
            "local",
            &[one_time("task-1", "Dentist", datetime!(2024-03-01 9:00 UTC))],
        );
        let clock = FixedClock::new(datetime!(2024-03-01 8:50 UTC));
        let sink = RecordingSink::new();
        let mut state = SchedulerState::default();
        state.register_user_with("local", quiet_settings());

        tick(&mut state, &store, &sink, &clock);
        assert_eq!(state.reminders().len(), 1);
        clock.set(datetime!(2024-03-01 9:01 UTC));
        tick(&mut state, &store, &sink, &clock);

        assert!(state.reminders().is_empty());
        assert_eq!(texts(&sink).len(), 1);
    }

    #[test]
    fn reminder_skips_outside_window_or_when_disabled() {
        let store = MemoryStore::new();
        seed(
            &store,
            "local",
            &[
                one_time("far", "Later", datetime!(2024-03-01 9:30 UTC)),
                one_time("now", "Exactly now", datetime!(2024-03-01 8:50 UTC)),
            ],
        );
        let clock = FixedClock::new(datetime!(2024-03-01 8:50 UTC));
        let sink = RecordingSink::new();
        let mut state = SchedulerState::default();
        state.register_user_with("local", quiet_settings());

        let report = tick(&mut state, &store, &sink, &clock);
        assert_eq!(report.reminders, 0);

        clock.set(datetime!(2024-03-01 9:20 UTC));
        let mut disabled = quiet_settings();
        disabled.enabled = false;
        UserSpace::new(&store, "local").save_settings(&disabled).unwrap();
        let report = tick(&mut state, &store, &sink, &clock);

        assert_eq!(report.reminders, 0);
        assert_eq!(state.user("local").unwrap().settings, disabled);
    }

    #[test]
    fn recurring_occurrence_gets_a_reminder() {
        let store = MemoryStore::new();
        let task = Task {
            id: "swim".to_string(),
            name: "Swim".to_string(),
            schedule: Schedule::Recurring {
                start_date: date!(2024-01-01),
                time: time!(18:00),
                end_time: None,
                days_of_week: BTreeSet::from([0, 2]),
                cycle_weeks: 2,
            },
            location: Some("Pool".to_string()),
            importance: Importance::High,
            comment: None,
            created_at: datetime!(2024-01-01 0:00 UTC),
        };
        seed(&store, "local", &[task]);
        let clock = FixedClock::new(datetime!(2024-01-10 17:50 UTC));
        let sink = RecordingSink::new();
        let mut state = SchedulerState::default();
        state.register_user_with("local", quiet_settings());

        tick(&mut state, &store, &sink, &clock);

        assert_eq!(
            texts(&sink),
            vec!["Reminder: Swim\nStarts at 18:00\nLocation: Pool\nHigh importance!"]
        );
    }

    #[test]
    fn miss_notice_sent_once_for_uncompleted_occurrence() {
        let store = MemoryStore::new();
        seed(
            &store,
            "local",
            &[
                one_time("task-1", "Dentist", datetime!(2024-03-01 9:00 UTC)),
                one_time("task-2", "Gym", datetime!(2024-03-01 8:00 UTC)),
            ],
        );
        let space = UserSpace::new(&store, "local");
        let mut ledger = space.ledger().unwrap();
        ledger.complete("task-2", date!(2024-03-01), datetime!(2024-03-01 8:30 UTC));
        space.save_ledger(&ledger).unwrap();

        let clock = FixedClock::new(datetime!(2024-03-01 10:05 UTC));
        let sink = RecordingSink::new();
        let mut state = SchedulerState::default();
        state.register_user_with("local", quiet_settings());

        let first = tick(&mut state, &store, &sink, &clock);
        clock.advance(Duration::minutes(1));
        let second = tick(&mut state, &store, &sink, &clock);

        assert_eq!(first.miss_notices, 1);
        assert_eq!(second.miss_notices, 0);
        assert_eq!(texts(&sink), vec!["You missed: Dentist\nIt started at 09:00"]);
        // Notify-only: the ledger is untouched.
        assert!(!space.ledger().unwrap().is_missed("task-1", date!(2024-03-01)));
    }

    #[test]
    fn miss_notice_repeats_each_sweep_under_per_sweep_policy() {
        let store = MemoryStore::new();
        seed(
            &store,
            "local",
            &[one_time("task-1", "Dentist", datetime!(2024-03-01 9:00 UTC))],
        );
        let clock = FixedClock::new(datetime!(2024-03-01 10:05 UTC));
        let sink = RecordingSink::new();
        let mut state = SchedulerState::new(DedupPolicy::PerSweep);
        state.register_user_with("local", quiet_settings());

        let first = tick(&mut state, &store, &sink, &clock);
        let second = tick(&mut state, &store, &sink, &clock);

        assert_eq!(first.miss_notices, 1);
        assert_eq!(second.miss_notices, 1);
    }

    #[test]
    fn miss_detection_respects_setting() {
        let store = MemoryStore::new();
        seed(
            &store,
            "local",
            &[one_time("task-1", "Dentist", datetime!(2024-03-01 9:00 UTC))],
        );
        let clock = FixedClock::new(datetime!(2024-03-01 10:05 UTC));
        let sink = RecordingSink::new();
        let mut state = SchedulerState::default();
        let mut settings = quiet_settings();
        settings.missed_task = false;
        state.register_user_with("local", settings);

        let report = tick(&mut state, &store, &sink, &clock);

        assert_eq!(report.miss_notices, 0);
        assert!(sink.sent().is_empty());
    }

    #[test]
    fn inactivity_nudge_at_most_once_per_day() {
        let store = MemoryStore::new();
        seed(
            &store,
            "local",
            &[one_time("task-1", "Dentist", datetime!(2024-03-01 20:00 UTC))],
        );
        let clock = FixedClock::new(datetime!(2024-03-01 10:00 UTC));
        let sink = RecordingSink::new();
        let mut state = SchedulerState::default();
        state.register_user("local");

        let first = tick(&mut state, &store, &sink, &clock);
        clock.advance(Duration::hours(23));
        let second = tick(&mut state, &store, &sink, &clock);

        assert_eq!(first.inactivity_nudges, 1);
        assert_eq!(second.inactivity_nudges, 0);
        assert_eq!(
            state.user("local").unwrap().last_inactivity_check,
            Some(datetime!(2024-03-01 10:00 UTC))
        );
    }

    #[test]
    fn inactivity_skipped_with_recent_completion_or_nothing_scheduled() {
        let store = MemoryStore::new();
        seed(
            &store,
            "busy",
            &[one_time("task-1", "Dentist", datetime!(2024-03-01 20:00 UTC))],
        );
        let busy = UserSpace::new(&store, "busy");
        let mut ledger = busy.ledger().unwrap();
        ledger.complete("task-0", date!(2024-02-28), datetime!(2024-02-28 12:00 UTC));
        busy.save_ledger(&ledger).unwrap();
        seed(
            &store,
            "idle",
            &[one_time("task-9", "Far away", datetime!(2024-05-01 20:00 UTC))],
        );

        let clock = FixedClock::new(datetime!(2024-03-01 10:00 UTC));
        let sink = RecordingSink::new();
        let mut state = SchedulerState::default();
        state.discover_users(&store).unwrap();

        let report = tick(&mut state, &store, &sink, &clock);

        assert_eq!(report.users, 2);
        assert_eq!(report.inactivity_nudges, 0);
    }

    #[test]
    fn oversized_inactivity_window_is_capped() {
        let store = MemoryStore::new();
        seed(
            &store,
            "local",
            &[one_time("task-1", "Dentist", datetime!(2024-03-01 20:00 UTC))],
        );
        let space = UserSpace::new(&store, "local");
        let mut ledger = space.ledger().unwrap();
        ledger.complete("task-0", date!(2023-06-01), datetime!(2023-06-01 12:00 UTC));
        space.save_ledger(&ledger).unwrap();

        let clock = FixedClock::new(datetime!(2024-03-01 10:00 UTC));
        let sink = RecordingSink::new();
        let mut state = SchedulerState::default();
        state.register_user_with(
            "local",
            NotificationSettings {
                inactive_days: 5_000_000,
                ..quiet_settings()
            },
        );
        let report = tick(&mut state, &store, &sink, &clock);

        assert_eq!(report.users, 1);
        assert_eq!(report.failures, 0);
        assert_eq!(report.inactivity_nudges, 0);
    }

    struct FlakyStore {
        inner: MemoryStore,
        broken_user: &'static str,
    }

    impl KvStore for FlakyStore {
        fn get(&self, user_id: &str, key: &str) -> Result<Option<String>, AppError> {
            if user_id == self.broken_user {
                return Err(AppError::io("connection refused"));
            }
            self.inner.get(user_id, key)
        }

        fn set(&self, user_id: &str, key: &str, value: &str) -> Result<(), AppError> {
            self.inner.set(user_id, key, value)
        }

        fn remove(&self, user_id: &str, key: &str) -> Result<(), AppError> {
            self.inner.remove(user_id, key)
        }

        fn users(&self) -> Result<Vec<String>, AppError> {
            self.inner.users()
        }
    }

    struct FailingSink {
        failing_user: &'static str,
        inner: RecordingSink,
    }

    impl NotificationSink for FailingSink {
        fn send(&self, user_id: &str, text: &str) -> Result<(), AppError> {
            if user_id == self.failing_user {
                return Err(AppError::io("sink offline"));
            }
            self.inner.send(user_id, text)
        }
    }

    #[test]
    fn one_user_failing_does_not_stop_the_sweep() {
        let store = FlakyStore {
            inner: MemoryStore::new(),
            broken_user: "alice",
        };
        let task = one_time("task-1", "Dentist", datetime!(2024-03-01 9:00 UTC));
        for user in ["alice", "bob", "carol"] {
            UserSpace::new(&store.inner, user)
                .save_tasks(std::slice::from_ref(&task))
                .unwrap();
        }
        let sink = FailingSink {
            failing_user: "bob",
            inner: RecordingSink::new(),
        };
        let clock = FixedClock::new(datetime!(2024-03-01 8:50 UTC));
        let mut state = SchedulerState::default();
        for user in ["alice", "bob", "carol"] {
            state.register_user_with(user, quiet_settings());
        }

        let report = tick(&mut state, &store, &sink, &clock);

        assert_eq!(report.users, 3);
        assert_eq!(report.failures, 2);
        assert_eq!(report.reminders, 1);
        assert_eq!(sink.inner.sent()[0].0, "carol");
        // bob's reminder was not recorded, so the next tick retries it.
        assert_eq!(state.reminders().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn run_ticks_on_interval_until_shutdown() {
        let store = MemoryStore::new();
        seed(
            &store,
            "local",
            &[one_time("task-1", "Dentist", datetime!(2024-03-01 9:00 UTC))],
        );
        let clock = FixedClock::new(datetime!(2024-03-01 8:50 UTC));
        let sink = RecordingSink::new();
        let mut state = SchedulerState::default();

        run(
            &mut state,
            &store,
            &sink,
            &clock,
            std::time::Duration::from_secs(60),
            true,
            tokio::time::sleep(std::time::Duration::from_secs(150)),
        )
        .await;

        assert_eq!(state.sweeps(), 3);
        assert!(state.user("local").is_some());
        let reminders = texts(&sink)
            .into_iter()
            .filter(|text| text.starts_with("Reminder:"))
            .count();
        assert_eq!(reminders, 1);
    }
}
