use clap::Parser;
use clap::error::ErrorKind;
use tabled::settings::Style;
use tabled::{Table, Tabled};
use thread_cli::cli::{Cli, Command, DetailArgs, NotificationArgs, ScheduleArgs, collect_overrides};
use thread_core::adherence::{AdherenceReport, StrengthBand};
use thread_core::clock::{Clock, SystemClock};
use thread_core::config::{
    Config, Palette, canonical_theme_name, load_config_with_fallback, merge_overrides,
    palette_for_theme,
};
use thread_core::dates::{at_time, format_date, format_hour_minute, format_time_of_day};
use thread_core::error::AppError;
use thread_core::identity::resolve_user_id;
use thread_core::model::{Occurrence, Schedule, ScheduleDraft, Task, TaskDraft};
use thread_core::notify::sink_from_env;
use thread_core::scheduler::{self, SchedulerState};
use thread_core::storage::{JsonFileStore, UserSpace};
use thread_core::task_api::{self, DayEntry};
use time::{Date, UtcOffset};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

const DAY_LABELS: [&str; 7] = ["Mon", "Tue", "Wed", "Thu", "Fri", "Sat", "Sun"];

#[derive(Tabled)]
struct AgendaRow {
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "Time")]
    time: String,
    #[tabled(rename = "Task")]
    name: String,
    #[tabled(rename = "Importance")]
    importance: String,
    #[tabled(rename = "Status")]
    status: String,
}

#[derive(Tabled)]
struct TaskRow {
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "Task")]
    name: String,
    #[tabled(rename = "Kind")]
    kind: String,
    #[tabled(rename = "Schedule")]
    schedule: String,
    #[tabled(rename = "Importance")]
    importance: String,
}

struct Context<'a> {
    json: bool,
    user_id: String,
    store: JsonFileStore,
    clock: &'a dyn Clock,
    config: Config,
    palette: Palette,
}

impl Context<'_> {
    fn space(&self) -> UserSpace<'_> {
        UserSpace::new(&self.store, &self.user_id)
    }

    fn date_or_today(&self, date: Option<Date>) -> Date {
        date.unwrap_or_else(|| self.clock.today())
    }
}

fn init_tracing(default_filter: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    let _ = tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(filter)
        .try_init();
}

fn normalize_parse_error(err: clap::Error) -> AppError {
    let rendered = err.to_string();
    let first_line = rendered.lines().next().unwrap_or("invalid command").trim();
    let message = first_line
        .strip_prefix("error: ")
        .unwrap_or(first_line)
        .to_string();
    AppError::invalid_input(message)
}

fn print_json<T: serde::Serialize + ?Sized>(value: &T) -> Result<(), AppError> {
    println!("{}", serde_json::to_string(value)?);
    Ok(())
}

fn schedule_summary(task: &Task, offset: UtcOffset) -> String {
    match &task.schedule {
        Schedule::OneTime {
            start_time,
            end_time,
        } => {
            let start = start_time.to_offset(offset);
            format!(
                "{} {}-{}",
                format_date(start.date()),
                format_time_of_day(start),
                format_time_of_day(end_time.to_offset(offset))
            )
        }
        Schedule::Recurring {
            start_date,
            time,
            end_time,
            days_of_week,
            cycle_weeks,
        } => {
            let days: Vec<&str> = days_of_week
                .iter()
                .filter_map(|day| DAY_LABELS.get(usize::from(*day)).copied())
                .collect();
            let hours = match end_time {
                Some(end) => format!("{}-{}", format_hour_minute(*time), format_hour_minute(*end)),
                None => format_hour_minute(*time),
            };
            let weeks = if *cycle_weeks == 1 { "week" } else { "weeks" };
            format!(
                "{} {} for {} {} from {}",
                days.join(","),
                hours,
                cycle_weeks,
                weeks,
                format_date(*start_date)
            )
        }
    }
}

fn occurrence_hours(occurrence: &Occurrence) -> String {
    if occurrence.has_end {
        format!(
            "{}-{}",
            format_time_of_day(occurrence.start),
            format_time_of_day(occurrence.end)
        )
    } else {
        format_time_of_day(occurrence.start)
    }
}

fn entry_status(entry: &DayEntry) -> &'static str {
    match (entry.completed, entry.missed) {
        (true, _) => "done",
        (false, true) => "missed",
        (false, false) => "open",
    }
}

fn print_agenda(entries: &[DayEntry]) {
    if entries.is_empty() {
        println!("Nothing scheduled.");
        return;
    }

    let rows: Vec<AgendaRow> = entries
        .iter()
        .map(|entry| AgendaRow {
            id: entry.occurrence.task_id.clone(),
            time: occurrence_hours(&entry.occurrence),
            name: entry.occurrence.name.clone(),
            importance: entry.occurrence.importance.to_string(),
            status: entry_status(entry).to_string(),
        })
        .collect();
    println!("{}", Table::new(rows).with(Style::psql()));
}

fn print_tasks(tasks: &[Task], offset: UtcOffset) {
    if tasks.is_empty() {
        println!("No tasks.");
        return;
    }

    let rows: Vec<TaskRow> = tasks
        .iter()
        .map(|task| TaskRow {
            id: task.id.clone(),
            name: task.name.clone(),
            kind: task.kind_label().to_string(),
            schedule: schedule_summary(task, offset),
            importance: task.importance.to_string(),
        })
        .collect();
    println!("{}", Table::new(rows).with(Style::psql()));
}

fn print_task_details(task: &Task, offset: UtcOffset, palette: &Palette) {
    println!("{} ({})", palette.accentize(&task.name), task.id);
    println!("  kind:       {}", task.kind_label());
    println!("  schedule:   {}", schedule_summary(task, offset));
    println!("  importance: {}", task.importance);
    if let Some(location) = &task.location {
        println!("  location:   {location}");
    }
    if let Some(comment) = &task.comment {
        println!("  comment:    {comment}");
    }
}

fn print_strength(report: &AdherenceReport, palette: &Palette) {
    let band = report.band();
    let figure = format!("{:.0}%", report.percent);
    let figure = match band {
        StrengthBand::Strong | StrengthBand::Steady => palette.accentize(&figure),
        StrengthBand::Fraying | StrengthBand::Broken => palette.alertize(&figure),
    };
    println!(
        "Thread strength: {} ({}) - {}/{} done over {} day(s)",
        figure,
        band.as_str(),
        report.completed,
        report.total,
        report.period_days
    );
}

fn build_draft(
    name: String,
    schedule: ScheduleArgs,
    details: DetailArgs,
    clock: &dyn Clock,
) -> Result<TaskDraft, AppError> {
    let time = schedule
        .time
        .ok_or_else(|| AppError::invalid_input("--time is required"))?;
    let date = schedule.date.unwrap_or_else(|| clock.today());
    let offset = clock.offset();

    let schedule = match schedule.days {
        Some(days) => ScheduleDraft::Recurring {
            start_date: date,
            time,
            end_time: schedule.end,
            days_of_week: days.0,
            cycle_weeks: schedule.weeks.unwrap_or(1),
        },
        None if schedule.weeks.is_some() => {
            return Err(AppError::invalid_input("--weeks requires --days"));
        }
        None => ScheduleDraft::OneTime {
            start_time: at_time(date, time, offset),
            end_time: schedule.end.map(|end| at_time(date, end, offset)),
        },
    };

    Ok(TaskDraft {
        name,
        schedule,
        location: details.location,
        importance: details.importance.unwrap_or_default(),
        comment: details.comment,
    })
}

fn apply_edit(
    task: &Task,
    name: Option<String>,
    args: ScheduleArgs,
    details: DetailArgs,
    offset: UtcOffset,
) -> Result<TaskDraft, AppError> {
    let mut draft = TaskDraft::from(task);
    if let Some(name) = name {
        draft.name = name;
    }
    if details.location.is_some() {
        draft.location = details.location;
    }
    if let Some(importance) = details.importance {
        draft.importance = importance;
    }
    if details.comment.is_some() {
        draft.comment = details.comment;
    }

    draft.schedule = match draft.schedule {
        ScheduleDraft::OneTime {
            start_time,
            end_time,
        } => {
            let local_start = start_time.to_offset(offset);
            let date = args.date.unwrap_or(local_start.date());
            let time = args.time.unwrap_or(local_start.time());
            match args.days {
                Some(days) => ScheduleDraft::Recurring {
                    start_date: date,
                    time,
                    end_time: args
                        .end
                        .or_else(|| end_time.map(|end| end.to_offset(offset).time())),
                    days_of_week: days.0,
                    cycle_weeks: args.weeks.unwrap_or(1),
                },
                None => {
                    let new_start = at_time(date, time, offset);
                    let new_end = match (args.end, end_time) {
                        (Some(end), _) => Some(at_time(date, end, offset)),
                        (None, Some(end)) => Some(
                            new_start.checked_add(end - start_time).ok_or_else(|| {
                                AppError::invalid_input(
                                    "end time falls outside the supported date range",
                                )
                            })?,
                        ),
                        (None, None) => None,
                    };
                    ScheduleDraft::OneTime {
                        start_time: new_start,
                        end_time: new_end,
                    }
                }
            }
        }
        ScheduleDraft::Recurring {
            start_date,
            time,
            end_time,
            days_of_week,
            cycle_weeks,
        } => ScheduleDraft::Recurring {
            start_date: args.date.unwrap_or(start_date),
            time: args.time.unwrap_or(time),
            end_time: args.end.or(end_time),
            days_of_week: args.days.map(|days| days.0).unwrap_or(days_of_week),
            cycle_weeks: args.weeks.unwrap_or(cycle_weeks),
        },
    };

    Ok(draft)
}

fn update_notifications(ctx: &Context, args: NotificationArgs) -> Result<(), AppError> {
    let space = ctx.space();
    let mut settings = task_api::notification_settings(&space)?;
    if !args.is_empty() {
        if let Some(enabled) = args.enabled {
            settings.enabled = enabled;
        }
        if let Some(before) = args.before {
            settings.before_task = before;
        }
        if let Some(missed) = args.missed {
            settings.missed_task = missed;
        }
        if let Some(days) = args.inactive_days {
            settings.inactive_days = days;
        }
        task_api::save_notification_settings(&space, &settings)?;
    }

    if ctx.json {
        print_json(&settings)?;
    } else {
        let on_off = |flag: bool| if flag { "on" } else { "off" };
        println!("notifications:  {}", on_off(settings.enabled));
        println!("remind before:  {} min", settings.before_task);
        println!("missed notices: {}", on_off(settings.missed_task));
        println!("inactivity:     {} day(s)", settings.inactive_days);
    }
    Ok(())
}

fn poll_once(ctx: &Context) -> Result<(), AppError> {
    let mut state = SchedulerState::new(ctx.config.dedup_policy());
    state.register_user(&ctx.user_id);
    state.discover_users(&ctx.store)?;
    let sink = sink_from_env();

    let report = scheduler::tick(&mut state, &ctx.store, sink.as_ref(), ctx.clock);

    if ctx.json {
        print_json(&report)?;
    } else {
        println!(
            "Swept {} user(s): {} reminder(s), {} miss notice(s), {} inactivity nudge(s), {} failure(s)",
            report.users,
            report.reminders,
            report.miss_notices,
            report.inactivity_nudges,
            report.failures
        );
    }
    Ok(())
}

fn watch(ctx: &Context) -> Result<(), AppError> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(|err| AppError::io(err.to_string()))?;

    let mut state = SchedulerState::new(ctx.config.dedup_policy());
    state.register_user(&ctx.user_id);
    let sink = sink_from_env();
    let every = ctx.config.poll_interval();

    runtime.block_on(scheduler::run(
        &mut state,
        &ctx.store,
        sink.as_ref(),
        ctx.clock,
        every,
        true,
        async {
            if let Err(err) = tokio::signal::ctrl_c().await {
                warn!("cannot listen for ctrl-c: {err}");
                std::future::pending::<()>().await;
            }
        },
    ));
    Ok(())
}

fn run_command(cli: Cli, clock: &dyn Clock) -> Result<(), AppError> {
    let loaded = load_config_with_fallback();
    if let Some(err) = &loaded.error {
        warn!("using default configuration: {err}");
    }
    let overrides = collect_overrides(&cli.config_override).map_err(AppError::invalid_input)?;
    let config = merge_overrides(&loaded.config, &overrides);

    let user_id = resolve_user_id(cli.user.as_deref());
    let store = JsonFileStore::from_env()?;
    let stored_theme = UserSpace::new(&store, &user_id).theme().ok().flatten();
    let palette = palette_for_theme(config.theme.as_deref().or(stored_theme.as_deref()));

    let ctx = Context {
        json: cli.json,
        user_id,
        store,
        clock,
        config,
        palette,
    };
    let offset = clock.offset();

    match cli.command {
        Command::Add {
            name,
            schedule,
            details,
        } => {
            let draft = build_draft(name, schedule, details, clock)?;
            let task = task_api::add_task(&ctx.space(), draft, clock)?;
            if ctx.json {
                print_json(&task)?;
            } else {
                println!("Added task: {} ({})", task.name, task.id);
            }
        }
        Command::Edit {
            id,
            name,
            schedule,
            details,
        } => {
            let space = ctx.space();
            let existing = task_api::get_task(&space, &id)?;
            let draft = apply_edit(&existing, name, schedule, details, offset)?;
            let task = task_api::update_task(&space, &id, draft)?;
            if ctx.json {
                print_json(&task)?;
            } else {
                println!("Updated task: {} ({})", task.name, task.id);
            }
        }
        Command::Delete { id } => {
            let task = task_api::delete_task(&ctx.space(), &id)?;
            if ctx.json {
                print_json(&task)?;
            } else {
                println!("Deleted task: {} ({})", task.name, task.id);
            }
        }
        Command::Show { id } => {
            let task = task_api::get_task(&ctx.space(), &id)?;
            if ctx.json {
                print_json(&task)?;
            } else {
                print_task_details(&task, offset, &ctx.palette);
            }
        }
        Command::List { date, all } => {
            if all {
                let tasks = task_api::list_tasks(&ctx.space())?;
                if ctx.json {
                    print_json(&tasks)?;
                } else {
                    print_tasks(&tasks, offset);
                }
            } else {
                let space = ctx.space();
                task_api::mark_overdue_missed(&space, clock)?;
                let date = ctx.date_or_today(date);
                let entries = task_api::tasks_for_date(&space, clock, date)?;
                if ctx.json {
                    print_json(&entries)?;
                } else {
                    println!("{}", ctx.palette.mutedize(&format_date(date)));
                    print_agenda(&entries);
                }
            }
        }
        Command::Done { id, date } => {
            let date = ctx.date_or_today(date);
            let added = task_api::complete_occurrence(&ctx.space(), clock, &id, date)?;
            if ctx.json {
                print_json(&serde_json::json!({
                    "task_id": id,
                    "date": format_date(date),
                    "completed": true,
                    "changed": added,
                }))?;
            } else if added {
                println!("Completed {} on {}", id, format_date(date));
            } else {
                println!("{} was already completed on {}", id, format_date(date));
            }
        }
        Command::Undo { id, date } => {
            let date = ctx.date_or_today(date);
            let removed = task_api::uncomplete_occurrence(&ctx.space(), &id, date)?;
            if ctx.json {
                print_json(&serde_json::json!({
                    "task_id": id,
                    "date": format_date(date),
                    "completed": false,
                    "changed": removed,
                }))?;
            } else if removed {
                println!("Reopened {} on {}", id, format_date(date));
            } else {
                println!("{} was not completed on {}", id, format_date(date));
            }
        }
        Command::Miss { id, date } => {
            let date = ctx.date_or_today(date);
            let missed = task_api::toggle_missed(&ctx.space(), clock, &id, date)?;
            if ctx.json {
                print_json(&serde_json::json!({
                    "task_id": id,
                    "date": format_date(date),
                    "missed": missed,
                }))?;
            } else if missed {
                println!("Marked {} missed on {}", id, format_date(date));
            } else {
                println!("Cleared missed mark of {} on {}", id, format_date(date));
            }
        }
        Command::Reschedule { id, date, time } => {
            let task = task_api::reschedule_task(&ctx.space(), clock, &id, date, time)?;
            if ctx.json {
                print_json(&task)?;
            } else {
                println!(
                    "Rescheduled task: {} ({}) to {}",
                    task.name,
                    task.id,
                    schedule_summary(&task, offset)
                );
            }
        }
        Command::Now => {
            let space = ctx.space();
            task_api::mark_overdue_missed(&space, clock)?;
            let current = task_api::current_task(&space, clock)?;
            let next = task_api::next_task(&space, clock)?;
            if ctx.json {
                print_json(&serde_json::json!({ "current": current, "next": next }))?;
            } else {
                match &current {
                    Some(occurrence) => println!(
                        "Now:  {} ({})",
                        ctx.palette.accentize(&occurrence.name),
                        occurrence_hours(occurrence)
                    ),
                    None => println!("Now:  {}", ctx.palette.mutedize("nothing under way")),
                }
                match &next {
                    Some(occurrence) => println!(
                        "Next: {} ({})",
                        occurrence.name,
                        occurrence_hours(occurrence)
                    ),
                    None => println!("Next: {}", ctx.palette.mutedize("nothing else today")),
                }
            }
        }
        Command::Strength { period } => {
            let report = task_api::strength(&ctx.space(), clock, period)?;
            if ctx.json {
                print_json(&serde_json::json!({
                    "period_days": report.period_days,
                    "completed": report.completed,
                    "total": report.total,
                    "percent": report.percent,
                    "band": report.band(),
                }))?;
            } else {
                print_strength(&report, &ctx.palette);
            }
        }
        Command::Period { period } => {
            let space = ctx.space();
            if let Some(period) = period {
                task_api::set_period(&space, period)?;
            }
            let period = task_api::period(&space)?;
            if ctx.json {
                print_json(&serde_json::json!({ "period": period, "days": period.days() }))?;
            } else {
                println!("Strength period: {} ({} day(s))", period.as_str(), period.days());
            }
        }
        Command::Theme { name } => {
            let space = ctx.space();
            if let Some(raw) = name {
                space.save_theme(&canonical_theme_name(&raw))?;
            }
            let theme = space.theme()?;
            if ctx.json {
                print_json(&serde_json::json!({ "theme": theme }))?;
            } else {
                println!("Theme: {}", theme.as_deref().unwrap_or("plain"));
            }
        }
        Command::Notifications(args) => update_notifications(&ctx, args)?,
        Command::Poll => poll_once(&ctx)?,
        Command::Watch => {
            info!(user = %ctx.user_id, "watching for reminders, press ctrl-c to stop");
            watch(&ctx)?;
        }
    }

    Ok(())
}

fn main() {
    // Local offset lookup fails once other threads exist.
    let clock = SystemClock::new();

    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) if matches!(err.kind(), ErrorKind::DisplayHelp | ErrorKind::DisplayVersion) => {
            err.exit()
        }
        Err(err) => {
            eprintln!("ERROR: {}", normalize_parse_error(err));
            std::process::exit(1);
        }
    };

    init_tracing(if matches!(cli.command, Command::Watch) {
        "info"
    } else {
        "warn"
    });

    if let Err(err) = run_command(cli, &clock) {
        eprintln!("ERROR: {}", err);
        std::process::exit(1);
    }
}
