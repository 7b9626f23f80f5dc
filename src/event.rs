//! Front-end commands and their routing into the session controller.

use crate::controller::{AssistantReply, SessionController, StartOutcome};
use crate::models::{Provider, TimerProfile};
use crate::timer::{format_time, TimerState};

/// Everything the main loop reacts to.
#[derive(Debug)]
pub enum AppEvent {
    /// One second of wall-clock time elapsed in the given clock phase.
    Tick(u64),
    /// A line of user input.
    Command(Command),
    /// A background assistant request finished.
    Reply(AssistantReply),
    /// The input stream was closed.
    InputClosed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Start a session, optionally with the task to focus on.
    Start(Option<String>),
    Pause,
    Skip,
    Status,
    Add(String),
    Done,
    Tasks,
    Stats,
    Profile(TimerProfile),
    Custom { work: String, rest: String },
    Key {
        api_key: String,
        provider: Provider,
        base_url: Option<String>,
    },
    Tip,
    Analyze,
    Insights,
    Generate(String),
    History,
    Help,
    Quit,
}

/// Result of handling a command.
#[derive(Debug, Clone, PartialEq)]
pub enum EventResult {
    /// Event handled, nothing to print.
    Continue,
    /// Event handled, show this text.
    Output(String),
    /// User requested quit.
    Quit,
}

pub const HELP: &str = "\
Commands:
  start [task]              start a session (resumes when paused)
  pause                     pause or resume
  skip                      abandon the session and switch mode
  status                    show the timer and the latest suggestion
  add <task>                add a task
  done                      complete the current task
  tasks                     list tasks
  stats                     show today's stats
  profile <pomodoro|long|custom>
  custom <work> <break>     custom durations in minutes
  key <api-key> [openai|gemini] [base-url]
  tip | analyze | insights  ask the assistant
  generate <context>        generate tasks with the assistant
  history                   show earlier tips
  quit";

/// Parses one input line. Errors carry a message for the user.
pub fn parse_command(line: &str) -> Result<Command, String> {
    let line = line.trim();
    let (word, rest) = match line.split_once(char::is_whitespace) {
        Some((word, rest)) => (word, rest.trim()),
        None => (line, ""),
    };

    let command = match word.to_ascii_lowercase().as_str() {
        "start" | "s" => Command::Start((!rest.is_empty()).then(|| rest.to_string())),
        "pause" | "resume" | "p" => Command::Pause,
        "skip" => Command::Skip,
        "status" | "" => Command::Status,
        "add" => Command::Add(required(rest, "add <task>")?.to_string()),
        "done" => Command::Done,
        "tasks" => Command::Tasks,
        "stats" => Command::Stats,
        "profile" => Command::Profile(parse_profile(rest)?),
        "custom" => {
            let mut parts = rest.split_whitespace();
            match (parts.next(), parts.next()) {
                (Some(work), Some(rest)) => Command::Custom {
                    work: work.to_string(),
                    rest: rest.to_string(),
                },
                _ => return Err("usage: custom <work> <break>".to_string()),
            }
        }
        "key" => {
            let mut parts = rest.split_whitespace();
            let api_key = parts
                .next()
                .ok_or_else(|| "usage: key <api-key> [openai|gemini] [base-url]".to_string())?;
            let provider = match parts.next() {
                Some(name) => {
                    Provider::parse(name).ok_or_else(|| format!("unknown provider: {name}"))?
                }
                None => Provider::default(),
            };
            Command::Key {
                api_key: api_key.to_string(),
                provider,
                base_url: parts.next().map(str::to_string),
            }
        }
        "tip" => Command::Tip,
        "analyze" => Command::Analyze,
        "insights" => Command::Insights,
        "generate" => Command::Generate(required(rest, "generate <context>")?.to_string()),
        "history" => Command::History,
        "help" | "?" => Command::Help,
        "quit" | "exit" | "q" => Command::Quit,
        other => return Err(format!("unknown command: {other} (type 'help')")),
    };
    Ok(command)
}

fn required<'a>(rest: &'a str, usage: &str) -> Result<&'a str, String> {
    if rest.is_empty() {
        Err(format!("usage: {usage}"))
    } else {
        Ok(rest)
    }
}

fn parse_profile(name: &str) -> Result<TimerProfile, String> {
    match name.to_ascii_lowercase().as_str() {
        "pomodoro" | "0" => Ok(TimerProfile::Pomodoro),
        "long" | "longfocus" | "1" => Ok(TimerProfile::LongFocus),
        "custom" | "2" => Ok(TimerProfile::Custom),
        other => Err(format!("unknown profile: {other:?}")),
    }
}

/// One-line summary of the timer.
pub fn status_line(controller: &SessionController) -> String {
    let assistant = if controller.is_assistant_ready() {
        "ready"
    } else {
        "no key"
    };
    let timer = controller.timer();
    let state = match timer.state() {
        TimerState::Idle => "ready",
        TimerState::Running => "running",
        TimerState::Paused => "paused",
    };
    let task = match controller.task_input() {
        "" => "none",
        task => task,
    };
    format!(
        "{} {} {} | {} | pomodoros: {} | task: {} | assistant: {}",
        timer.mode(),
        state,
        format_time(controller.display_secs()),
        controller.profile().label(),
        timer.pomodoro_count(),
        task,
        assistant
    )
}

fn status_report(controller: &SessionController) -> String {
    match controller.latest_suggestion() {
        Some(text) => format!("{}\nLatest: {text}", status_line(controller)),
        None => status_line(controller),
    }
}

/// Handles a command and updates the controller accordingly.
pub fn handle_command(controller: &mut SessionController, command: Command) -> EventResult {
    match command {
        Command::Start(task) => {
            let resuming = controller.timer().is_paused();
            if let Some(task) = &task {
                if !resuming {
                    controller.set_task_input(task);
                }
            }
            match controller.start() {
                Ok(StartOutcome::Resumed) if task.is_some() => EventResult::Output(format!(
                    "Resumed. Task unchanged: {}",
                    controller.tasks().current_task
                )),
                Ok(StartOutcome::Resumed) => EventResult::Output("Resumed.".to_string()),
                Ok(StartOutcome::Started { mode, secs }) => {
                    EventResult::Output(format!("{mode} session started: {}", format_time(secs)))
                }
                Err(e) => EventResult::Output(e.to_string()),
            }
        }
        Command::Pause => match controller.toggle_pause() {
            Some(true) => EventResult::Output("Paused.".to_string()),
            Some(false) => EventResult::Output("Resumed.".to_string()),
            None => EventResult::Continue,
        },
        Command::Skip => match controller.skip() {
            Some(mode) => EventResult::Output(format!("Skipped. Next: {mode} Mode")),
            None => EventResult::Continue,
        },
        Command::Status => EventResult::Output(status_report(controller)),
        Command::Add(task) => {
            if controller.add_task(&task) {
                EventResult::Output(controller.tasks().render())
            } else {
                EventResult::Output("Task description is empty.".to_string())
            }
        }
        Command::Done => {
            if controller.tasks().current_task.is_empty() {
                return EventResult::Output("No current task.".to_string());
            }
            controller.complete_current_task();
            EventResult::Output(controller.tasks().render())
        }
        Command::Tasks => EventResult::Output(controller.tasks().render()),
        Command::Stats => EventResult::Output(
            controller
                .stats()
                .render(&controller.tasks().current_task),
        ),
        Command::Profile(profile) => {
            controller.set_profile(profile);
            EventResult::Output(status_line(controller))
        }
        Command::Custom { work, rest } => {
            controller.set_custom_times(&work, &rest);
            EventResult::Output(status_line(controller))
        }
        Command::Key {
            api_key,
            provider,
            base_url,
        } => match controller.validate_credentials(&api_key, provider, base_url.as_deref()) {
            Ok(message) => EventResult::Output(message),
            Err(e) => EventResult::Output(format!("Validation failed: {e}")),
        },
        Command::Tip => requested(controller.request_tip(), "Getting AI suggestion..."),
        Command::Analyze => {
            requested(controller.request_analysis(), "Analyzing your productivity...")
        }
        Command::Insights => requested(controller.request_insights(), "Getting AI insights..."),
        Command::Generate(context) => requested(
            controller.request_tasks(&context),
            "Generating tasks with AI...",
        ),
        Command::History => {
            if controller.history().is_empty() {
                return EventResult::Output("No suggestions yet.".to_string());
            }
            let lines: Vec<String> = controller
                .history()
                .iter()
                .map(|s| format!("[{}] {}", s.time, s.text))
                .collect();
            EventResult::Output(lines.join("\n"))
        }
        Command::Help => EventResult::Output(HELP.to_string()),
        Command::Quit => EventResult::Quit,
    }
}

fn requested(sent: bool, pending: &str) -> EventResult {
    if sent {
        EventResult::Output(pending.to_string())
    } else {
        EventResult::Output("API key not validated".to_string())
    }
}
