//! Thread strength: share of scheduled occurrences completed over a trailing
//! window of calendar dates ending today.

use crate::dates::trailing_window;
use crate::ledger::Ledger;
use crate::model::Task;
use crate::resolver::Resolver;
use serde::Serialize;
use time::Date;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct AdherenceReport {
    pub period_days: u32,
    pub completed: usize,
    pub total: usize,
    pub percent: f64,
}

impl AdherenceReport {
    pub fn band(&self) -> StrengthBand {
        StrengthBand::for_percent(self.percent)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StrengthBand {
    Strong,
    Steady,
    Fraying,
    Broken,
}

impl StrengthBand {
    pub fn for_percent(percent: f64) -> Self {
        if percent >= 80.0 {
            Self::Strong
        } else if percent >= 50.0 {
            Self::Steady
        } else if percent >= 20.0 {
            Self::Fraying
        } else {
            Self::Broken
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Strong => "strong",
            Self::Steady => "steady",
            Self::Fraying => "fraying",
            Self::Broken => "broken",
        }
    }
}

/// Counts occurrences and completions over the `period_days` dates ending at
/// `today`. With nothing scheduled the percentage is 100.
pub fn report(
    tasks: &[Task],
    ledger: &Ledger,
    resolver: &Resolver,
    today: Date,
    period_days: u32,
) -> AdherenceReport {
    let mut total = 0;
    let mut completed = 0;

    for date in trailing_window(today, period_days) {
        for occurrence in resolver.resolve_all(tasks, date) {
            total += 1;
            if ledger.is_completed(&occurrence.task_id, date) {
                completed += 1;
            }
        }
    }

    let percent = if total == 0 {
        100.0
    } else {
        100.0 * completed as f64 / total as f64
    };

    AdherenceReport {
        period_days,
        completed,
        total,
        percent,
    }
}

pub fn strength(
    tasks: &[Task],
    ledger: &Ledger,
    resolver: &Resolver,
    today: Date,
    period_days: u32,
) -> f64 {
    report(tasks, ledger, resolver, today, period_days).percent
}
