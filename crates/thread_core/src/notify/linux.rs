use super::{APP_NAME, NotificationSink};
use crate::error::AppError;
use notify_rust::Notification;

pub struct LinuxSink;

impl NotificationSink for LinuxSink {
    fn send(&self, _user_id: &str, text: &str) -> Result<(), AppError> {
        let (summary, body) = text.split_once('\n').unwrap_or((text, ""));
        let mut notification = Notification::new();
        notification.appname(APP_NAME);
        notification.summary(summary);
        notification.body(body.trim());

        notification
            .show()
            .map_err(|err| AppError::io(err.to_string()))?;
        Ok(())
    }
}
