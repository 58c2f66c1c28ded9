use super::{
    COMPLETED_KEY, KvStore, MISSED_KEY, NOTIFICATIONS_KEY, PERIOD_KEY, TASKS_KEY, THEME_KEY,
};
use crate::error::AppError;
use crate::ledger::Ledger;
use crate::model::{NotificationSettings, Task, ThreadPeriod};
use serde::Serialize;
use serde::de::DeserializeOwned;

/// One user's slice of the key-value store, with typed accessors.
///
/// Absent keys read as the type's default.
#[derive(Clone, Copy)]
pub struct UserSpace<'a> {
    store: &'a dyn KvStore,
    user_id: &'a str,
}

impl<'a> UserSpace<'a> {
    pub fn new(store: &'a dyn KvStore, user_id: &'a str) -> Self {
        Self { store, user_id }
    }

    pub fn user_id(&self) -> &str {
        self.user_id
    }

    pub fn load<T: DeserializeOwned + Default>(&self, key: &str) -> Result<T, AppError> {
        match self.store.get(self.user_id, key)? {
            Some(raw) if !raw.trim().is_empty() => serde_json::from_str(&raw).map_err(|err| {
                AppError::invalid_data(format!("invalid value for '{key}': {err}"))
            }),
            _ => Ok(T::default()),
        }
    }

    pub fn save<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> Result<(), AppError> {
        let raw = serde_json::to_string(value)?;
        self.store.set(self.user_id, key, &raw)
    }

    pub fn tasks(&self) -> Result<Vec<Task>, AppError> {
        self.load(TASKS_KEY)
    }

    pub fn save_tasks(&self, tasks: &[Task]) -> Result<(), AppError> {
        self.save(TASKS_KEY, tasks)
    }

    pub fn ledger(&self) -> Result<Ledger, AppError> {
        Ok(Ledger::new(self.load(COMPLETED_KEY)?, self.load(MISSED_KEY)?))
    }

    /// Completions and missed records go out in one store write.
    pub fn save_ledger(&self, ledger: &Ledger) -> Result<(), AppError> {
        let completions = serde_json::to_string(ledger.completions())?;
        let missed = serde_json::to_string(ledger.missed())?;
        self.store.set_many(
            self.user_id,
            &[(COMPLETED_KEY, completions), (MISSED_KEY, missed)],
        )
    }

    /// Stored settings, or `None` when the user never saved any.
    pub fn stored_settings(&self) -> Result<Option<NotificationSettings>, AppError> {
        match self.store.get(self.user_id, NOTIFICATIONS_KEY)? {
            Some(raw) if !raw.trim().is_empty() => Ok(Some(serde_json::from_str(&raw)?)),
            _ => Ok(None),
        }
    }

    pub fn settings(&self) -> Result<NotificationSettings, AppError> {
        self.load(NOTIFICATIONS_KEY)
    }

    pub fn save_settings(&self, settings: &NotificationSettings) -> Result<(), AppError> {
        self.save(NOTIFICATIONS_KEY, settings)
    }

    pub fn period(&self) -> Result<ThreadPeriod, AppError> {
        self.load(PERIOD_KEY)
    }

    pub fn save_period(&self, period: ThreadPeriod) -> Result<(), AppError> {
        self.save(PERIOD_KEY, &period)
    }

    pub fn theme(&self) -> Result<Option<String>, AppError> {
        self.load(THEME_KEY)
    }

    pub fn save_theme(&self, theme: &str) -> Result<(), AppError> {
        self.save(THEME_KEY, theme)
    }
}
