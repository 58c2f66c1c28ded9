use crate::error::AppError;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Longest inactivity window a user may configure.
pub const MAX_INACTIVE_DAYS: u32 = 365;

/// Per-user notification preferences read by the reminder poller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NotificationSettings {
    pub enabled: bool,
    /// Minutes before an occurrence starts at which the reminder fires.
    pub before_task: u32,
    pub missed_task: bool,
    /// Days without any completion before an inactivity nudge; 0 disables.
    pub inactive_days: u32,
}

impl Default for NotificationSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            before_task: 15,
            missed_task: true,
            inactive_days: 3,
        }
    }
}

/// Trailing window used for the thread strength figure.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ThreadPeriod {
    Day,
    Week,
    #[default]
    Month,
}

impl ThreadPeriod {
    pub fn days(&self) -> u32 {
        match self {
            Self::Day => 1,
            Self::Week => 7,
            Self::Month => 30,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Day => "day",
            Self::Week => "week",
            Self::Month => "month",
        }
    }
}

impl FromStr for ThreadPeriod {
    type Err = AppError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "day" | "1" => Ok(Self::Day),
            "week" | "7" => Ok(Self::Week),
            "month" | "30" => Ok(Self::Month),
            other => Err(AppError::invalid_input(format!(
                "unknown period '{other}' (expected day, week or month)"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{NotificationSettings, ThreadPeriod};

    #[test]
    fn partial_settings_fill_defaults() {
        let settings: NotificationSettings =
            serde_json::from_str(r#"{ "before_task": 30 }"#).unwrap();
        assert_eq!(settings.before_task, 30);
        assert!(settings.enabled);
        assert_eq!(settings.inactive_days, 3);
    }

    #[test]
    fn period_maps_to_window_length() {
        assert_eq!("week".parse::<ThreadPeriod>().unwrap().days(), 7);
        assert_eq!(ThreadPeriod::default().days(), 30);
        assert!("year".parse::<ThreadPeriod>().is_err());
    }
}
