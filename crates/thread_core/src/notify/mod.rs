//! Notification sink collaborator: fire-and-forget delivery of a text to a
//! user. Callers log failures; nothing is retried.

use crate::error::AppError;
use std::sync::Mutex;
use tracing::info;

#[cfg(target_os = "linux")]
mod linux;
#[cfg(target_os = "linux")]
pub use linux::LinuxSink;

#[cfg(windows)]
mod windows;
#[cfg(windows)]
pub use windows::WindowsSink;

pub const APP_NAME: &str = "strongthread";
const DISABLE_ENV_VAR: &str = "STRONGTHREAD_DISABLE_NOTIFICATIONS";

pub trait NotificationSink: Send + Sync {
    fn send(&self, user_id: &str, text: &str) -> Result<(), AppError>;
}

pub struct NoopSink;

impl NotificationSink for NoopSink {
    fn send(&self, _user_id: &str, _text: &str) -> Result<(), AppError> {
        Ok(())
    }
}

/// Prints each notification on stdout, one block per message.
pub struct StdoutSink;

impl NotificationSink for StdoutSink {
    fn send(&self, user_id: &str, text: &str) -> Result<(), AppError> {
        println!("[{user_id}] {text}");
        Ok(())
    }
}

/// Keeps every sent message in memory; used to observe a tick.
#[derive(Debug, Default)]
pub struct RecordingSink {
    sent: Mutex<Vec<(String, String)>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sent(&self) -> Vec<(String, String)> {
        match self.sent.lock() {
            Ok(sent) => sent.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

impl NotificationSink for RecordingSink {
    fn send(&self, user_id: &str, text: &str) -> Result<(), AppError> {
        self.sent
            .lock()
            .map_err(|_| AppError::io("recording sink lock poisoned"))?
            .push((user_id.to_string(), text.to_string()));
        Ok(())
    }
}

/// Picks the desktop sink for this platform, falling back to stdout when the
/// platform has none. `STRONGTHREAD_DISABLE_NOTIFICATIONS` forces a no-op sink.
pub fn sink_from_env() -> Box<dyn NotificationSink> {
    if std::env::var(DISABLE_ENV_VAR).is_ok() {
        return Box::new(NoopSink);
    }

    match platform_sink() {
        Ok(sink) => sink,
        Err(err) => {
            info!("desktop notifications unavailable ({err}), using stdout");
            Box::new(StdoutSink)
        }
    }
}

#[cfg(target_os = "linux")]
pub fn platform_sink() -> Result<Box<dyn NotificationSink>, AppError> {
    Ok(Box::new(LinuxSink))
}

#[cfg(windows)]
pub fn platform_sink() -> Result<Box<dyn NotificationSink>, AppError> {
    Ok(Box::new(WindowsSink))
}

#[cfg(not(any(target_os = "linux", windows)))]
pub fn platform_sink() -> Result<Box<dyn NotificationSink>, AppError> {
    Err(AppError::invalid_data(
        "notifications are not supported on this platform",
    ))
}

#[cfg(test)]
mod tests {
    use super::{NotificationSink, RecordingSink};

    #[test]
    fn recording_sink_keeps_order() {
        let sink = RecordingSink::new();
        sink.send("alice", "first").unwrap();
        sink.send("bob", "second").unwrap();

        assert_eq!(
            sink.sent(),
            vec![
                ("alice".to_string(), "first".to_string()),
                ("bob".to_string(), "second".to_string())
            ]
        );
    }
}
