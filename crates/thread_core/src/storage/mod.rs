//! Key-value store collaborator and the typed per-user view over it.

pub mod json_store;
mod memory;
mod user_space;

use crate::error::AppError;

pub use json_store::JsonFileStore;
pub use memory::MemoryStore;
pub use user_space::UserSpace;

pub const TASKS_KEY: &str = "tasks";
pub const COMPLETED_KEY: &str = "completed_tasks";
pub const MISSED_KEY: &str = "missed_tasks";
pub const NOTIFICATIONS_KEY: &str = "notifications";
pub const PERIOD_KEY: &str = "thread_period";
pub const THEME_KEY: &str = "theme";

/// Opaque string values scoped per user. Values are JSON text; the store
/// never interprets them.
pub trait KvStore: Send + Sync {
    fn get(&self, user_id: &str, key: &str) -> Result<Option<String>, AppError>;

    fn set(&self, user_id: &str, key: &str, value: &str) -> Result<(), AppError>;

    /// Writes several keys of one user. Stores that can should apply them in
    /// a single write.
    fn set_many(&self, user_id: &str, entries: &[(&str, String)]) -> Result<(), AppError> {
        for (key, value) in entries {
            self.set(user_id, key, value)?;
        }
        Ok(())
    }

    fn remove(&self, user_id: &str, key: &str) -> Result<(), AppError>;

    /// Every user with at least one stored key, in a stable order.
    fn users(&self) -> Result<Vec<String>, AppError>;
}
