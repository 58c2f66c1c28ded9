use super::NotificationSink;
use crate::error::AppError;
use tauri_winrt_notification::Toast;

pub struct WindowsSink;

impl NotificationSink for WindowsSink {
    fn send(&self, user_id: &str, text: &str) -> Result<(), AppError> {
        let (summary, body) = text.split_once('\n').unwrap_or((text, ""));
        Toast::new(Toast::POWERSHELL_APP_ID)
            .title(summary)
            .text1(body.trim())
            .text2(user_id)
            .show()
            .map_err(|err| AppError::io(err.to_string()))?;
        Ok(())
    }
}
