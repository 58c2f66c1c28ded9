use crate::dates::format_time_of_day;
use crate::model::{Importance, Occurrence};

/// First line is the title; the rest is the body.
pub fn reminder_text(occurrence: &Occurrence) -> String {
    let mut text = format!(
        "Reminder: {}\nStarts at {}",
        occurrence.name,
        format_time_of_day(occurrence.start)
    );
    if occurrence.has_end {
        text.push_str(&format!("\nUntil {}", format_time_of_day(occurrence.end)));
    }
    if let Some(location) = occurrence.location.as_deref() {
        text.push_str(&format!("\nLocation: {location}"));
    }
    if occurrence.importance == Importance::High {
        text.push_str("\nHigh importance!");
    }
    text
}

pub fn missed_text(occurrence: &Occurrence) -> String {
    format!(
        "You missed: {}\nIt started at {}",
        occurrence.name,
        format_time_of_day(occurrence.start)
    )
}

pub fn inactivity_text(days: u32) -> String {
    format!(
        "Your thread is weakening\nNothing completed in the last {days} days. Don't forget your tasks!"
    )
}

#[cfg(test)]
mod tests {
    use super::{missed_text, reminder_text};
    use crate::model::{Importance, Occurrence};
    use time::macros::{date, datetime};

    fn occurrence() -> Occurrence {
        Occurrence {
            task_id: "task-1".to_string(),
            date: date!(2024-03-01),
            start: datetime!(2024-03-01 9:00 +3),
            end: datetime!(2024-03-01 10:15 +3),
            has_end: true,
            name: "Dentist".to_string(),
            location: Some("Main st. 5".to_string()),
            importance: Importance::High,
            comment: None,
        }
    }

    #[test]
    fn reminder_lists_times_location_and_importance() {
        let text = reminder_text(&occurrence());
        assert_eq!(
            text,
            "Reminder: Dentist\nStarts at 09:00\nUntil 10:15\nLocation: Main st. 5\nHigh importance!"
        );
    }

    #[test]
    fn reminder_omits_absent_end_and_metadata() {
        let mut occurrence = occurrence();
        occurrence.has_end = false;
        occurrence.location = None;
        occurrence.importance = Importance::Low;

        assert_eq!(reminder_text(&occurrence), "Reminder: Dentist\nStarts at 09:00");
        assert_eq!(missed_text(&occurrence), "You missed: Dentist\nIt started at 09:00");
    }
}
