mod occurrence;
mod record;
mod settings;
mod task;

pub use occurrence::Occurrence;
pub use record::{CompletionRecord, MissedRecord};
pub use settings::{MAX_INACTIVE_DAYS, NotificationSettings, ThreadPeriod};
pub use task::{Importance, Schedule, ScheduleDraft, Task, TaskDraft};
