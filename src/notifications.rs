//! Desktop notifications for finished sessions.

use crate::controller::CompletionEvent;
use crate::models::Mode;
use notify_rust::Notification;
use std::thread;

/// Title and body announcing a finished session.
pub fn completion_message(event: &CompletionEvent) -> (String, String) {
    let what = match event.finished {
        Mode::Work => "work session",
        Mode::Break => "break",
    };
    let title = match event.finished {
        Mode::Work => "Work Session Complete",
        Mode::Break => "Break Complete",
    };
    let body = match event.finished {
        Mode::Work if event.pomodoro_count == 1 => {
            format!("Your {what} has ended. 1 pomodoro completed. Time for a break.")
        }
        Mode::Work => format!(
            "Your {what} has ended. {} pomodoros completed. Time for a break.",
            event.pomodoro_count
        ),
        Mode::Break => format!("Your {what} has ended. Ready for the next session?"),
    };
    (title.to_string(), body)
}

/// Shows a notification for a finished session.
/// Runs in a background thread to avoid blocking.
pub fn notify_completion(event: CompletionEvent) {
    thread::spawn(move || {
        let (title, body) = completion_message(&event);
        if let Err(e) = Notification::new()
            .summary(&title)
            .body(&body)
            .appname("pomomind")
            .show()
        {
            tracing::warn!(error = %e, "failed to show notification");
        }
    });
}
