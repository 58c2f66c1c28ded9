use crate::dates::{hour_minute, iso_date, optional_hour_minute};
use crate::error::AppError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;
use time::{Date, OffsetDateTime, Time};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    pub id: String,
    pub name: String,
    #[serde(flatten)]
    pub schedule: Schedule,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(default)]
    pub importance: Importance,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Schedule {
    OneTime {
        #[serde(with = "time::serde::rfc3339")]
        start_time: OffsetDateTime,
        #[serde(with = "time::serde::rfc3339")]
        end_time: OffsetDateTime,
    },
    Recurring {
        /// First day of week 1 of the cycle.
        #[serde(with = "iso_date")]
        start_date: Date,
        #[serde(with = "hour_minute")]
        time: Time,
        #[serde(
            default,
            skip_serializing_if = "Option::is_none",
            with = "optional_hour_minute"
        )]
        end_time: Option<Time>,
        /// Monday=0..Sunday=6.
        days_of_week: BTreeSet<u8>,
        cycle_weeks: u32,
    },
}

impl Task {
    pub fn is_one_time(&self) -> bool {
        matches!(self.schedule, Schedule::OneTime { .. })
    }

    pub fn kind_label(&self) -> &'static str {
        match self.schedule {
            Schedule::OneTime { .. } => "one-time",
            Schedule::Recurring { .. } => "recurring",
        }
    }
}

/// Unvalidated task input, as collected from a form or command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskDraft {
    pub name: String,
    pub schedule: ScheduleDraft,
    pub location: Option<String>,
    pub importance: Importance,
    pub comment: Option<String>,
}

impl From<&Task> for TaskDraft {
    fn from(task: &Task) -> Self {
        let schedule = match &task.schedule {
            Schedule::OneTime {
                start_time,
                end_time,
            } => ScheduleDraft::OneTime {
                start_time: *start_time,
                end_time: Some(*end_time),
            },
            Schedule::Recurring {
                start_date,
                time,
                end_time,
                days_of_week,
                cycle_weeks,
            } => ScheduleDraft::Recurring {
                start_date: *start_date,
                time: *time,
                end_time: *end_time,
                days_of_week: days_of_week.iter().copied().collect(),
                cycle_weeks: *cycle_weeks,
            },
        };

        Self {
            name: task.name.clone(),
            schedule,
            location: task.location.clone(),
            importance: task.importance,
            comment: task.comment.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScheduleDraft {
    OneTime {
        start_time: OffsetDateTime,
        end_time: Option<OffsetDateTime>,
    },
    Recurring {
        start_date: Date,
        time: Time,
        end_time: Option<Time>,
        days_of_week: Vec<u8>,
        cycle_weeks: u32,
    },
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Importance {
    Low,
    #[default]
    Medium,
    High,
}

impl Importance {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        }
    }
}

impl fmt::Display for Importance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Importance {
    type Err = AppError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "low" => Ok(Self::Low),
            "medium" | "normal" => Ok(Self::Medium),
            "high" => Ok(Self::High),
            other => Err(AppError::invalid_input(format!(
                "unknown importance '{other}' (expected low, medium or high)"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{Importance, Schedule, Task};
    use std::collections::BTreeSet;
    use time::macros::{date, datetime, time};

    #[test]
    fn recurring_task_serializes_with_type_tag() {
        let task = Task {
            id: "task-1".to_string(),
            name: "swim".to_string(),
            schedule: Schedule::Recurring {
                start_date: date!(2024-01-01),
                time: time!(7:30),
                end_time: None,
                days_of_week: BTreeSet::from([0, 2]),
                cycle_weeks: 2,
            },
            location: None,
            importance: Importance::High,
            comment: None,
            created_at: datetime!(2023-12-31 12:00 UTC),
        };

        let value = serde_json::to_value(&task).unwrap();
        assert_eq!(value["type"], "recurring");
        assert_eq!(value["start_date"], "2024-01-01");
        assert_eq!(value["time"], "07:30");
        assert_eq!(value["days_of_week"], serde_json::json!([0, 2]));
        assert_eq!(value["importance"], "high");
        assert!(value.get("location").is_none());
        assert!(value.get("end_time").is_none());

        let back: Task = serde_json::from_value(value).unwrap();
        assert_eq!(back, task);
    }

    #[test]
    fn recurring_end_time_accepts_explicit_null() {
        let value = serde_json::json!({
            "id": "task-3",
            "name": "swim",
            "type": "recurring",
            "start_date": "2024-01-01",
            "time": "18:00",
            "end_time": null,
            "days_of_week": [0],
            "cycle_weeks": 1,
            "created_at": "2024-01-01T00:00:00Z"
        });

        let task: Task = serde_json::from_value(value).unwrap();
        match task.schedule {
            Schedule::Recurring { end_time, .. } => assert_eq!(end_time, None),
            other => panic!("unexpected schedule: {other:?}"),
        }
    }

    #[test]
    fn one_time_task_defaults_optional_metadata() {
        let value = serde_json::json!({
            "id": "task-2",
            "name": "dentist",
            "type": "one_time",
            "start_time": "2024-03-01T09:00:00Z",
            "end_time": "2024-03-01T10:00:00Z",
            "created_at": "2024-02-01T00:00:00Z"
        });

        let task: Task = serde_json::from_value(value).unwrap();
        assert!(task.is_one_time());
        assert_eq!(task.importance, Importance::Medium);
        assert_eq!(task.location, None);
    }

    #[test]
    fn importance_parses_case_insensitively() {
        assert_eq!("HIGH".parse::<Importance>().unwrap(), Importance::High);
        assert_eq!(
            "urgent".parse::<Importance>().unwrap_err().code(),
            "invalid_input"
        );
    }
}
