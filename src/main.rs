//! Pomomind - a Pomodoro focus timer with an AI productivity assistant.
//!
//! The timer, task list and daily stats live on the main thread. A ticker
//! thread, a stdin reader and background assistant requests all feed one
//! channel that the main loop drains.

use std::io::{self, BufRead, Write};
use std::sync::mpsc::{self, Sender};
use std::thread;

use tracing_subscriber::EnvFilter;

mod assistant;
mod controller;
mod event;
mod models;
mod notifications;
mod persistence;
mod stats;
mod tasks;
mod timer;

use controller::{SessionController, TickOutcome};
use event::{AppEvent, Command, EventResult};
use timer::{Ticker, TimerState};

/// Reads commands line by line and forwards them to the main loop.
fn read_input(tx: Sender<AppEvent>) {
    let stdin = io::stdin();
    for line in stdin.lock().lines() {
        let line = match line {
            Ok(line) => line,
            Err(e) => {
                tracing::warn!(error = %e, "failed to read input");
                break;
            }
        };
        match event::parse_command(&line) {
            Ok(command) => {
                if tx.send(AppEvent::Command(command)).is_err() {
                    return;
                }
            }
            Err(message) => println!("{message}"),
        }
    }
    let _ = tx.send(AppEvent::InputClosed);
}

fn print_prompt() {
    print!("> ");
    let _ = io::stdout().flush();
}

fn run(mut controller: SessionController, mut ticker: Ticker, rx: mpsc::Receiver<AppEvent>) {
    println!("{}", event::status_line(&controller));
    print_prompt();

    for app_event in rx {
        match app_event {
            AppEvent::Tick(generation) if !ticker.is_current(generation) => {}
            AppEvent::Tick(_) => match controller.tick() {
                TickOutcome::Completed(completion) => {
                    notifications::notify_completion(completion);
                    let (title, body) = notifications::completion_message(&completion);
                    println!("\n{title}: {body}");
                    println!("{}", event::status_line(&controller));
                    print_prompt();
                }
                TickOutcome::Counting(remaining) if remaining % 60 == 0 => {
                    println!("\n{}", event::status_line(&controller));
                    print_prompt();
                }
                TickOutcome::Counting(_) | TickOutcome::Idle => {}
            },
            AppEvent::Command(command) => {
                // A started or resumed session gets a full first second.
                let moves_clock = matches!(command, Command::Start(_) | Command::Pause);
                let result = event::handle_command(&mut controller, command);
                if moves_clock && controller.timer().state() == TimerState::Running {
                    ticker.restart();
                }
                match result {
                    EventResult::Quit => break,
                    EventResult::Output(text) => println!("{text}"),
                    EventResult::Continue => {}
                }
                print_prompt();
            }
            AppEvent::Reply(reply) => {
                let text = controller.apply_reply(reply);
                println!("\n[assistant] {text}");
                print_prompt();
            }
            AppEvent::InputClosed => break,
        }
    }

    controller.shutdown();
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(io::stderr)
        .init();

    // Create channel for ticks, commands and assistant replies
    let (tx, rx) = mpsc::channel();

    let controller = SessionController::open(tx.clone())?;

    let ticker = Ticker::spawn(tx.clone());

    thread::spawn(move || read_input(tx));

    run(controller, ticker, rx);
    Ok(())
}
