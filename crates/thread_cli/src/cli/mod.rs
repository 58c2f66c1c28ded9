use clap::{Args, Parser, Subcommand};
use thread_core::config::ConfigOverrides;
use thread_core::dates::{parse_date, parse_time_of_day};
use thread_core::model::{Importance, MAX_INACTIVE_DAYS, ThreadPeriod};
use thread_core::scheduler::DedupPolicy;
use time::{Date, Time};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Output JSON
    #[arg(long, global = true)]
    pub json: bool,

    /// Act as this user (defaults to $STRONGTHREAD_USER, then "local")
    #[arg(long, global = true, value_name = "ID")]
    pub user: Option<String>,

    /// Override configuration values (format KEY=VALUE)
    #[arg(long = "config-override", value_name = "KEY=VALUE", global = true)]
    pub config_override: Vec<String>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Add a task. Passing --days makes it recurring
    ///
    /// Example: thread add "Dentist" --date 2024-03-01 --time 09:00
    /// Example: thread add "Swim" --date 2024-01-01 --time 18:00 --end 19:00 --days mon,wed --weeks 2
    Add {
        name: String,
        #[command(flatten)]
        schedule: ScheduleArgs,
        #[command(flatten)]
        details: DetailArgs,
    },
    /// Edit a task; omitted fields keep their value
    ///
    /// Example: thread edit task-1 --name "Swim long" --end 20:00
    Edit {
        id: String,
        #[arg(long)]
        name: Option<String>,
        #[command(flatten)]
        schedule: ScheduleArgs,
        #[command(flatten)]
        details: DetailArgs,
    },
    /// Delete a task and its history
    ///
    /// Example: thread delete task-1
    Delete { id: String },
    /// Show details of a task
    ///
    /// Example: thread show task-1
    Show { id: String },
    /// List the agenda for a date, or every task with --all
    ///
    /// Example: thread list
    /// Example: thread list --date 2024-01-03
    List {
        #[arg(long, value_parser = parse_date_arg)]
        date: Option<Date>,
        #[arg(long, conflicts_with = "date")]
        all: bool,
    },
    /// Mark an occurrence as done
    ///
    /// Example: thread done task-1 --date 2024-01-03
    Done {
        id: String,
        #[arg(long, value_parser = parse_date_arg)]
        date: Option<Date>,
    },
    /// Undo a completion
    ///
    /// Example: thread undo task-1
    Undo {
        id: String,
        #[arg(long, value_parser = parse_date_arg)]
        date: Option<Date>,
    },
    /// Toggle the missed mark of an occurrence
    ///
    /// Example: thread miss task-1
    Miss {
        id: String,
        #[arg(long, value_parser = parse_date_arg)]
        date: Option<Date>,
    },
    /// Move a one-time task, keeping its length
    ///
    /// Example: thread reschedule task-1 2024-03-04 14:15
    Reschedule {
        id: String,
        #[arg(value_parser = parse_date_arg)]
        date: Date,
        #[arg(value_parser = parse_time_arg)]
        time: Time,
    },
    /// Show the task under way and the next one today
    ///
    /// Example: thread now
    Now,
    /// Show thread strength
    ///
    /// Example: thread strength --period week
    Strength {
        #[arg(long, value_parser = parse_period_arg)]
        period: Option<ThreadPeriod>,
    },
    /// Show or set the default strength period
    ///
    /// Example: thread period week
    Period {
        #[arg(value_parser = parse_period_arg)]
        period: Option<ThreadPeriod>,
    },
    /// Show or change notification settings
    ///
    /// Example: thread notifications --before 30 --inactive-days 5
    Notifications(NotificationArgs),
    /// Show or set the stored display theme
    ///
    /// Example: thread theme dark
    Theme { name: Option<String> },
    /// Run one reminder sweep over every known user
    ///
    /// Example: thread poll
    Poll,
    /// Run the reminder poller until interrupted
    ///
    /// Example: thread watch
    Watch,
}

#[derive(Args, Debug, Default, Clone)]
pub struct ScheduleArgs {
    /// Date of a one-time task, or first day of a recurring cycle
    #[arg(long, value_parser = parse_date_arg)]
    pub date: Option<Date>,
    /// Start time (HH:MM)
    #[arg(long, value_parser = parse_time_arg)]
    pub time: Option<Time>,
    /// End time (HH:MM)
    #[arg(long, value_parser = parse_time_arg)]
    pub end: Option<Time>,
    /// Weekdays of a recurring task, e.g. mon,wed or 0,2 (0=Monday)
    #[arg(long, value_parser = parse_days_arg)]
    pub days: Option<Weekdays>,
    /// Length of the recurring cycle in weeks
    #[arg(long)]
    pub weeks: Option<u32>,
}

#[derive(Args, Debug, Default, Clone)]
pub struct DetailArgs {
    #[arg(long)]
    pub location: Option<String>,
    #[arg(long, value_parser = parse_importance_arg)]
    pub importance: Option<Importance>,
    #[arg(long)]
    pub comment: Option<String>,
}

#[derive(Args, Debug, Default, Clone)]
pub struct NotificationArgs {
    #[arg(long)]
    pub enabled: Option<bool>,
    /// Minutes before start to send a reminder
    #[arg(long, value_name = "MINUTES")]
    pub before: Option<u32>,
    /// Notify when an occurrence ends without completion
    #[arg(long)]
    pub missed: Option<bool>,
    /// Nudge after this many days without a completion (0 disables)
    #[arg(
        long,
        value_name = "DAYS",
        value_parser = clap::value_parser!(u32).range(..=i64::from(MAX_INACTIVE_DAYS))
    )]
    pub inactive_days: Option<u32>,
}

impl NotificationArgs {
    pub fn is_empty(&self) -> bool {
        self.enabled.is_none()
            && self.before.is_none()
            && self.missed.is_none()
            && self.inactive_days.is_none()
    }
}

fn parse_date_arg(raw: &str) -> Result<Date, String> {
    parse_date(raw).map_err(|err| err.message().to_string())
}

fn parse_time_arg(raw: &str) -> Result<Time, String> {
    parse_time_of_day(raw).map_err(|err| err.message().to_string())
}

fn parse_period_arg(raw: &str) -> Result<ThreadPeriod, String> {
    raw.parse().map_err(|err: thread_core::error::AppError| err.message().to_string())
}

fn parse_importance_arg(raw: &str) -> Result<Importance, String> {
    raw.parse().map_err(|err: thread_core::error::AppError| err.message().to_string())
}

/// Monday=0 weekday indices, sorted and deduplicated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Weekdays(pub Vec<u8>);

/// Parses a comma-separated weekday list of names or indices.
pub fn parse_days_arg(raw: &str) -> Result<Weekdays, String> {
    let mut days = Vec::new();
    for part in raw.split(',').map(str::trim).filter(|part| !part.is_empty()) {
        let day = match part.to_ascii_lowercase().as_str() {
            "mon" | "monday" => 0,
            "tue" | "tuesday" => 1,
            "wed" | "wednesday" => 2,
            "thu" | "thursday" => 3,
            "fri" | "friday" => 4,
            "sat" | "saturday" => 5,
            "sun" | "sunday" => 6,
            other => other
                .parse::<u8>()
                .ok()
                .filter(|index| *index < 7)
                .ok_or_else(|| format!("unknown weekday '{part}'"))?,
        };
        days.push(day);
    }

    if days.is_empty() {
        return Err("at least one weekday is required".to_string());
    }
    days.sort_unstable();
    days.dedup();
    Ok(Weekdays(days))
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigOverrideTarget {
    Theme,
    PollIntervalSecs,
    DedupPolicy,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedConfigOverride {
    pub target: ConfigOverrideTarget,
    pub value: String,
}

/// Parse a raw `KEY=VALUE` override string into a structured target.
pub fn parse_config_override(raw: &str) -> Result<ParsedConfigOverride, String> {
    let trimmed = raw.trim();
    let (key_raw, value_raw) = trimmed
        .split_once('=')
        .ok_or_else(|| "override must be in KEY=VALUE format".to_string())?;

    let value = value_raw.trim().to_string();
    let canonical_field =
        canonicalize_flag_name(key_raw).ok_or_else(|| "override key cannot be empty".to_string())?;

    let target = match canonical_field.as_str() {
        "theme" => ConfigOverrideTarget::Theme,
        "poll_interval_secs" | "poll_interval" => ConfigOverrideTarget::PollIntervalSecs,
        "dedup_policy" | "dedup" => ConfigOverrideTarget::DedupPolicy,
        other => return Err(format!("unknown config field '{other}'")),
    };

    Ok(ParsedConfigOverride { target, value })
}

/// Folds every `--config-override` into one set; later flags win.
pub fn collect_overrides(raw: &[String]) -> Result<ConfigOverrides, String> {
    let mut overrides = ConfigOverrides::default();
    for entry in raw {
        let parsed = parse_config_override(entry)?;
        match parsed.target {
            ConfigOverrideTarget::Theme => overrides.theme = Some(parsed.value),
            ConfigOverrideTarget::PollIntervalSecs => {
                let secs = parsed
                    .value
                    .parse::<u64>()
                    .map_err(|_| format!("poll_interval_secs must be a number, got '{}'", parsed.value))?;
                overrides.poll_interval_secs = Some(secs);
            }
            ConfigOverrideTarget::DedupPolicy => {
                let policy = parsed
                    .value
                    .parse::<DedupPolicy>()
                    .map_err(|err| err.message().to_string())?;
                overrides.dedup_policy = Some(policy);
            }
        }
    }
    Ok(overrides)
}

fn canonicalize_flag_name(name: &str) -> Option<String> {
    let joined = name
        .split(|ch: char| !ch.is_ascii_alphanumeric())
        .filter(|part| !part.is_empty())
        .map(str::to_ascii_lowercase)
        .collect::<Vec<_>>()
        .join("_");
    (!joined.is_empty()).then_some(joined)
}
