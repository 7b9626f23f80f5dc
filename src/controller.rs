//! Session orchestration: drives the timer and applies its side effects to the
//! task list, the daily stats, the assistant and the settings store.

use crate::assistant::{Assistant, AssistantError, ChatAssistant, Credentials};
use crate::event::AppEvent;
use crate::models::{CustomTimes, Mode, Provider, SettingsDocument, TimerProfile};
use crate::persistence::{Database, DatabaseError};
use crate::stats::StatsManager;
use crate::tasks::TaskManager;
use crate::timer::{resolve_minutes_or_default, Tick, TimerError, TimerModel};
use chrono::Local;
use rand::rngs::StdRng;
use rand::{Rng, RngCore, SeedableRng};
use std::sync::mpsc::Sender;
use std::sync::Arc;
use std::thread;
use thiserror::Error;

/// Chance of an unprompted tip at each whole minute of a work session.
const SUGGESTION_PROBABILITY: f64 = 0.05;

const WELCOME_MESSAGE: &str = "Welcome! Start the timer to begin working, and I'll share \
     suggestions along the way.";

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),
    #[error("Assistant error: {0}")]
    Assistant(#[from] AssistantError),
}

/// Emitted when a session runs to zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompletionEvent {
    /// The mode that just ended.
    pub finished: Mode,
    /// The mode the next session will use.
    pub next: Mode,
    pub pomodoro_count: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartOutcome {
    Started { mode: Mode, secs: u32 },
    /// A paused session was picked up again.
    Resumed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// No session is counting.
    Idle,
    Counting(u32),
    Completed(CompletionEvent),
}

/// Result of a background assistant request, delivered back to the main loop.
/// Errors arrive as display text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AssistantReply {
    Tip(Result<String, String>),
    Break(Result<String, String>),
    Analysis(Result<String, String>),
    Insights(Result<String, String>),
    Tasks(Result<Vec<String>, String>),
}

/// A productivity tip stamped with the local time it arrived.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Suggestion {
    pub time: String,
    pub text: String,
}

impl Suggestion {
    fn now(text: String) -> Self {
        Self {
            time: Local::now().format("%H:%M").to_string(),
            text,
        }
    }
}

pub struct SessionController {
    timer: TimerModel,
    tasks: TaskManager,
    stats: StatsManager,
    profile: TimerProfile,
    /// Task entry text, captured as the current task when a session starts.
    task_input: String,
    /// Seconds shown to the user: the live countdown, or the next session's length.
    display_secs: u32,
    assistant: Arc<dyn Assistant>,
    rng: Box<dyn RngCore + Send>,
    replies: Sender<AppEvent>,
    db: Database,
    history: Vec<Suggestion>,
    latest: Option<String>,
}

impl SessionController {
    pub fn new(
        db: Database,
        assistant: Arc<dyn Assistant>,
        rng: Box<dyn RngCore + Send>,
        replies: Sender<AppEvent>,
    ) -> Self {
        let timer = TimerModel::new();
        let profile = TimerProfile::default();
        let display_secs = timer.next_duration(profile);
        Self {
            timer,
            tasks: TaskManager::new(),
            stats: StatsManager::new(),
            profile,
            task_input: String::new(),
            display_secs,
            assistant,
            rng,
            replies,
            db,
            history: Vec::new(),
            latest: None,
        }
    }

    /// Opens the default database and HTTP assistant, then restores saved settings.
    pub fn open(replies: Sender<AppEvent>) -> Result<Self, AppError> {
        let db = Database::new()?;
        let assistant = Arc::new(ChatAssistant::new()?);
        let rng = Box::new(StdRng::from_entropy());
        let mut controller = Self::new(db, assistant, rng, replies);
        controller.load_settings();
        Ok(controller)
    }

    pub fn timer(&self) -> &TimerModel {
        &self.timer
    }

    pub fn tasks(&self) -> &TaskManager {
        &self.tasks
    }

    pub fn stats(&self) -> &StatsManager {
        &self.stats
    }

    pub fn profile(&self) -> TimerProfile {
        self.profile
    }

    pub fn display_secs(&self) -> u32 {
        self.display_secs
    }

    pub fn task_input(&self) -> &str {
        &self.task_input
    }

    pub fn history(&self) -> &[Suggestion] {
        &self.history
    }

    /// Text currently shown on the suggestion surface.
    pub fn latest_suggestion(&self) -> Option<&str> {
        self.latest.as_deref()
    }

    pub fn is_assistant_ready(&self) -> bool {
        self.assistant.is_validated()
    }

    pub fn set_task_input(&mut self, text: &str) {
        self.task_input = text.to_string();
    }

    pub fn set_profile(&mut self, profile: TimerProfile) {
        self.profile = profile;
        self.refresh_idle_display();
    }

    pub fn set_custom_times(&mut self, work: &str, rest: &str) {
        self.timer.custom = CustomTimes {
            work: work.to_string(),
            rest: rest.to_string(),
        };
        self.refresh_idle_display();
    }

    fn refresh_idle_display(&mut self) {
        if !self.timer.is_active() {
            self.display_secs = self.timer.next_duration(self.profile);
        }
    }

    /// Starts a session in the current mode, or resumes a paused one.
    pub fn start(&mut self) -> Result<StartOutcome, TimerError> {
        if self.timer.is_paused() {
            self.timer.toggle_pause();
            tracing::info!("session resumed");
            return Ok(StartOutcome::Resumed);
        }

        self.tasks.current_task = self.task_input.clone();
        let mode = self.timer.mode();
        let secs = self.timer.start(self.profile, mode).inspect_err(|e| {
            tracing::warn!(error = %e, "refusing to start session");
        })?;
        self.display_secs = secs;
        tracing::info!(%mode, secs, task = %self.tasks.current_task, "session started");

        if mode == Mode::Work && self.assistant.is_validated() {
            self.dispatch_tip();
        }
        Ok(StartOutcome::Started { mode, secs })
    }

    /// Pauses or resumes. Returns the new paused flag, `None` when idle.
    pub fn toggle_pause(&mut self) -> Option<bool> {
        let paused = self.timer.toggle_pause()?;
        tracing::info!(paused, "pause toggled");
        Some(paused)
    }

    /// Discards the active session without recording anything.
    pub fn skip(&mut self) -> Option<Mode> {
        let next = self.timer.skip()?;
        self.display_secs = self.timer.next_duration(self.profile);
        tracing::info!(%next, "session skipped");
        Some(next)
    }

    /// Advances the session by one second.
    pub fn tick(&mut self) -> TickOutcome {
        match self.timer.tick() {
            Tick::Inactive => TickOutcome::Idle,
            Tick::Counting(remaining) => {
                self.display_secs = remaining;
                if self.timer.mode() == Mode::Work
                    && remaining % 60 == 0
                    && self.rng.gen_bool(SUGGESTION_PROBABILITY)
                    && self.assistant.is_validated()
                {
                    tracing::debug!(remaining, "sending unprompted tip request");
                    self.dispatch_tip();
                }
                TickOutcome::Counting(remaining)
            }
            Tick::Complete => TickOutcome::Completed(self.finish_session()),
        }
    }

    fn finish_session(&mut self) -> CompletionEvent {
        let finished = self.timer.mode();

        if finished == Mode::Work {
            let minutes = resolve_minutes_or_default(self.profile, Mode::Work, &self.timer.custom);
            self.stats.record_work_completed(minutes);
            self.timer.record_pomodoro();
            if !self.tasks.current_task.is_empty() {
                self.complete_current_task();
            }
        }

        let next = self.timer.complete();
        self.display_secs = self.timer.next_duration(self.profile);
        tracing::info!(%finished, %next, pomodoros = self.timer.pomodoro_count(), "session complete");

        if finished == Mode::Break && self.assistant.is_validated() {
            self.dispatch_break_suggestion();
        }

        self.save_settings();

        CompletionEvent {
            finished,
            next,
            pomodoro_count: self.timer.pomodoro_count(),
        }
    }

    /// Appends a task. When no task is entered yet, the new one becomes the entry.
    pub fn add_task(&mut self, description: &str) -> bool {
        let description = description.trim();
        if !self.tasks.add(description) {
            return false;
        }
        if self.task_input.is_empty() {
            self.task_input = description.to_string();
        }
        true
    }

    /// Removes the current task from the list, counting it when it was present.
    /// The current task and the entry are cleared either way.
    pub fn complete_current_task(&mut self) -> bool {
        let task = std::mem::take(&mut self.tasks.current_task);
        let done = self.tasks.complete(&task);
        if done {
            self.stats.record_task_completed();
            tracing::info!(%task, "task completed");
        }
        self.task_input.clear();
        done
    }

    /// Checks credentials against the provider and saves them on success.
    pub fn validate_credentials(
        &mut self,
        api_key: &str,
        provider: Provider,
        base_url: Option<&str>,
    ) -> Result<String, AssistantError> {
        let message = self
            .assistant
            .validate(api_key.trim(), provider, base_url)
            .inspect_err(|e| tracing::warn!(error = %e, "API key validation failed"))?;
        self.latest = Some(WELCOME_MESSAGE.to_string());
        self.save_settings();
        Ok(message)
    }

    /// Asks for a productivity tip. Returns false when the assistant is not ready.
    pub fn request_tip(&mut self) -> bool {
        self.when_ready(Self::dispatch_tip)
    }

    pub fn request_analysis(&mut self) -> bool {
        self.when_ready(|this| {
            let stats = this.stats.daily();
            let current = this.tasks.current_task.clone();
            let tasks = this.tasks.tasks().to_vec();
            this.dispatch(move |assistant| {
                AssistantReply::Analysis(
                    assistant
                        .analyze(&stats, &current, &tasks)
                        .map_err(|e| e.to_string()),
                )
            });
        })
    }

    pub fn request_insights(&mut self) -> bool {
        self.when_ready(|this| {
            let stats = this.stats.daily();
            this.dispatch(move |assistant| {
                AssistantReply::Insights(assistant.insights(&stats).map_err(|e| e.to_string()))
            });
        })
    }

    /// Asks for a generated task list for `context`.
    pub fn request_tasks(&mut self, context: &str) -> bool {
        let context = context.trim().to_string();
        self.when_ready(move |this| {
            this.dispatch(move |assistant| {
                AssistantReply::Tasks(
                    assistant
                        .generate_tasks(&context)
                        .map_err(|e| e.to_string()),
                )
            });
        })
    }

    fn when_ready(&mut self, request: impl FnOnce(&mut Self)) -> bool {
        if !self.assistant.is_validated() {
            return false;
        }
        request(self);
        true
    }

    fn dispatch_tip(&mut self) {
        let current = self.tasks.current_task.clone();
        let stats = self.stats.daily();
        self.dispatch(move |assistant| {
            AssistantReply::Tip(
                assistant
                    .suggest_tip(&current, &stats)
                    .map_err(|e| e.to_string()),
            )
        });
    }

    fn dispatch_break_suggestion(&mut self) {
        let focus_minutes = self.stats.daily().focus_time;
        self.dispatch(move |assistant| {
            AssistantReply::Break(
                assistant
                    .suggest_break(focus_minutes)
                    .map_err(|e| e.to_string()),
            )
        });
    }

    /// Runs `job` on a background thread and posts its reply to the main loop.
    fn dispatch<F>(&self, job: F)
    where
        F: FnOnce(&dyn Assistant) -> AssistantReply + Send + 'static,
    {
        let assistant = Arc::clone(&self.assistant);
        let replies = self.replies.clone();
        thread::spawn(move || {
            let reply = job(assistant.as_ref());
            if replies.send(AppEvent::Reply(reply)).is_err() {
                tracing::debug!("main loop gone, dropping assistant reply");
            }
        });
    }

    /// Applies a background reply on the controller thread and returns the text to show.
    pub fn apply_reply(&mut self, reply: AssistantReply) -> String {
        match reply {
            AssistantReply::Tip(Ok(text)) => {
                self.history.push(Suggestion::now(text.clone()));
                self.show(text)
            }
            AssistantReply::Break(Ok(text))
            | AssistantReply::Analysis(Ok(text))
            | AssistantReply::Insights(Ok(text)) => self.show(text),
            AssistantReply::Tip(Err(e))
            | AssistantReply::Break(Err(e))
            | AssistantReply::Analysis(Err(e))
            | AssistantReply::Insights(Err(e)) => self.show(e),
            AssistantReply::Tasks(Ok(generated)) => {
                let added: Vec<&String> = generated
                    .iter()
                    .filter(|task| self.tasks.add(task))
                    .collect();
                if added.is_empty() {
                    return "No tasks could be generated.".to_string();
                }
                if self.task_input.is_empty() {
                    self.task_input = added[0].clone();
                }
                format!("Successfully generated {} tasks.", added.len())
            }
            AssistantReply::Tasks(Err(e)) => e,
        }
    }

    fn show(&mut self, text: String) -> String {
        self.latest = Some(text.clone());
        text
    }

    /// Merges every component's subset into one settings document.
    pub fn settings_document(&self) -> SettingsDocument {
        let credentials = self.assistant.credentials();
        let mut doc = SettingsDocument {
            api_key: credentials.api_key,
            model_type: credentials.provider,
            base_url: credentials.base_url,
            pomodoro_count: self.timer.pomodoro_count(),
            work_time: self.timer.custom.work.clone(),
            break_time: self.timer.custom.rest.clone(),
            mode_index: self.profile.index(),
            ..SettingsDocument::default()
        };
        self.tasks.export(&mut doc);
        self.stats.export(&mut doc);
        doc
    }

    /// Persists the settings. Failures are logged, never raised.
    pub fn save_settings(&mut self) {
        let doc = self.settings_document();
        match self.db.save_settings(&doc) {
            Ok(()) => tracing::debug!("settings saved"),
            Err(e) => tracing::warn!(error = %e, "failed to save settings"),
        }
    }

    /// Restores saved settings, falling back to defaults when they cannot be read.
    /// A stored API key is validated again.
    pub fn load_settings(&mut self) {
        let doc = self.db.load_settings().unwrap_or_else(|e| {
            tracing::warn!(error = %e, "failed to load settings, using defaults");
            SettingsDocument::default()
        });
        self.apply_settings(&doc);

        if !doc.api_key.is_empty() {
            if let Err(e) =
                self.validate_credentials(&doc.api_key, doc.model_type, doc.base_url.as_deref())
            {
                tracing::warn!(error = %e, "stored API key could not be validated");
            }
        }
    }

    fn apply_settings(&mut self, doc: &SettingsDocument) {
        self.timer.set_pomodoro_count(doc.pomodoro_count);
        self.timer.custom = CustomTimes {
            work: doc.work_time.clone(),
            rest: doc.break_time.clone(),
        };
        self.profile = TimerProfile::from_index(doc.mode_index);
        self.tasks.load(doc);
        self.stats.load(doc);
        self.assistant.set_credentials(Credentials {
            api_key: doc.api_key.clone(),
            provider: doc.model_type,
            base_url: doc.base_url.clone(),
        });
        self.refresh_idle_display();
    }

    pub fn shutdown(&mut self) {
        self.save_settings();
        tracing::info!("settings saved on shutdown");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::DailyStats;
    use rand::rngs::mock::StepRng;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::mpsc::{self, Receiver};
    use std::sync::Mutex;
    use std::time::Duration;

    /// Canned assistant that records which operations were called.
    #[derive(Default)]
    struct StubAssistant {
        validated: AtomicBool,
        credentials: Mutex<Credentials>,
    }

    impl StubAssistant {
        fn validated() -> Self {
            let stub = Self::default();
            stub.validated.store(true, Ordering::SeqCst);
            stub
        }
    }

    impl Assistant for StubAssistant {
        fn validate(
            &self,
            api_key: &str,
            provider: Provider,
            base_url: Option<&str>,
        ) -> Result<String, AssistantError> {
            *self.credentials.lock().unwrap() = Credentials {
                api_key: api_key.to_string(),
                provider,
                base_url: base_url.map(str::to_string),
            };
            if api_key == "good-key" {
                self.validated.store(true, Ordering::SeqCst);
                Ok("API key validated successfully!".to_string())
            } else {
                self.validated.store(false, Ordering::SeqCst);
                Err(AssistantError::Rejected)
            }
        }

        fn is_validated(&self) -> bool {
            self.validated.load(Ordering::SeqCst)
        }

        fn credentials(&self) -> Credentials {
            self.credentials.lock().unwrap().clone()
        }

        fn set_credentials(&self, credentials: Credentials) {
            *self.credentials.lock().unwrap() = credentials;
            self.validated.store(false, Ordering::SeqCst);
        }

        fn suggest_tip(
            &self,
            current_task: &str,
            _stats: &DailyStats,
        ) -> Result<String, AssistantError> {
            Ok(format!("tip for {current_task}"))
        }

        fn suggest_break(&self, focus_minutes: u32) -> Result<String, AssistantError> {
            Ok(format!("break after {focus_minutes}"))
        }

        fn analyze(
            &self,
            _stats: &DailyStats,
            _current_task: &str,
            tasks: &[String],
        ) -> Result<String, AssistantError> {
            Ok(format!("{} tasks", tasks.len()))
        }

        fn generate_tasks(&self, context: &str) -> Result<Vec<String>, AssistantError> {
            if context.is_empty() {
                return Err(AssistantError::MissingContext);
            }
            Ok(vec![format!("Plan {context}"), format!("Ship {context}")])
        }

        fn insights(&self, _stats: &DailyStats) -> Result<String, AssistantError> {
            Err(AssistantError::EmptyResponse)
        }
    }

    fn controller_with(
        assistant: StubAssistant,
        rng: StepRng,
    ) -> (SessionController, Receiver<AppEvent>) {
        let (tx, rx) = mpsc::channel();
        let db = Database::new_in_memory().unwrap();
        let controller = SessionController::new(db, Arc::new(assistant), Box::new(rng), tx);
        (controller, rx)
    }

    fn create_test_controller() -> (SessionController, Receiver<AppEvent>) {
        controller_with(StubAssistant::default(), never())
    }

    /// Makes every suggestion roll succeed.
    fn always() -> StepRng {
        StepRng::new(0, 0)
    }

    /// Makes every suggestion roll fail.
    fn never() -> StepRng {
        StepRng::new(u64::MAX, 0)
    }

    fn next_reply(rx: &Receiver<AppEvent>) -> AssistantReply {
        match rx.recv_timeout(Duration::from_secs(5)) {
            Ok(AppEvent::Reply(reply)) => reply,
            other => panic!("expected assistant reply, got {other:?}"),
        }
    }

    fn assert_no_reply(rx: &Receiver<AppEvent>) {
        assert!(rx.recv_timeout(Duration::from_millis(200)).is_err());
    }

    fn run_to_completion(controller: &mut SessionController) -> CompletionEvent {
        for _ in 0..=controller.timer().remaining_secs() {
            if let TickOutcome::Completed(event) = controller.tick() {
                return event;
            }
        }
        panic!("session did not complete");
    }

    #[test]
    fn test_initial_state() {
        let (controller, _rx) = create_test_controller();
        assert!(!controller.timer().is_active());
        assert_eq!(controller.timer().mode(), Mode::Work);
        assert_eq!(controller.profile(), TimerProfile::Pomodoro);
        assert_eq!(controller.display_secs(), 25 * 60);
        assert_eq!(controller.latest_suggestion(), None);
    }

    #[test]
    fn test_pomodoro_runs_to_break() {
        let (mut controller, rx) = create_test_controller();
        controller.start().unwrap();

        let mut completion = None;
        for i in 1..=1500 {
            let outcome = controller.tick();
            if i < 1500 {
                assert_eq!(outcome, TickOutcome::Counting(1500 - i));
            } else if let TickOutcome::Completed(event) = outcome {
                completion = Some(event);
            }
        }

        assert_eq!(
            completion,
            Some(CompletionEvent {
                finished: Mode::Work,
                next: Mode::Break,
                pomodoro_count: 1,
            })
        );
        assert_eq!(controller.timer().mode(), Mode::Break);
        assert_eq!(controller.timer().pomodoro_count(), 1);
        assert_eq!(controller.stats().daily().focus_time, 25);
        assert_eq!(controller.stats().daily().pomodoros_completed, 1);
        assert_eq!(controller.display_secs(), 5 * 60);
        assert_eq!(controller.tick(), TickOutcome::Idle);

        // Completion persists the settings.
        let saved = controller.db.load_settings().unwrap();
        assert_eq!(saved.pomodoro_count, 1);
        assert_eq!(saved.daily_stats.focus_time, 25);

        // Assistant not validated: nothing was requested.
        assert_no_reply(&rx);
    }

    #[test]
    fn test_invalid_custom_time_blocks_start() {
        let (mut controller, _rx) = create_test_controller();
        controller.set_profile(TimerProfile::Custom);
        controller.set_custom_times("abc", "5");

        let result = controller.start();
        assert!(matches!(result, Err(TimerError::InvalidDuration(_))));
        assert!(!controller.timer().is_active());
        assert_eq!(controller.tick(), TickOutcome::Idle);
        // The idle display falls back to the default length.
        assert_eq!(controller.display_secs(), 25 * 60);
    }

    #[test]
    fn test_custom_work_completion_uses_custom_minutes() {
        let (mut controller, _rx) = create_test_controller();
        controller.set_profile(TimerProfile::Custom);
        controller.set_custom_times("2", "1");

        controller.start().unwrap();
        run_to_completion(&mut controller);
        assert_eq!(controller.stats().daily().focus_time, 2);
        assert_eq!(controller.display_secs(), 60);
    }

    #[test]
    fn test_completion_falls_back_when_custom_edited_mid_session() {
        let (mut controller, _rx) = create_test_controller();
        controller.set_profile(TimerProfile::Custom);
        controller.set_custom_times("1", "1");
        controller.start().unwrap();

        controller.set_custom_times("oops", "1");
        run_to_completion(&mut controller);
        assert_eq!(controller.stats().daily().focus_time, 25);
    }

    #[test]
    fn test_work_completion_completes_current_task() {
        let (mut controller, _rx) = create_test_controller();
        controller.set_profile(TimerProfile::Custom);
        controller.set_custom_times("1", "1");
        controller.add_task("Write report");
        controller.add_task("Write report");
        assert_eq!(controller.task_input(), "Write report");

        controller.start().unwrap();
        assert_eq!(controller.tasks().current_task, "Write report");
        run_to_completion(&mut controller);

        assert_eq!(controller.tasks().tasks(), ["Write report".to_string()]);
        assert_eq!(controller.stats().daily().tasks_completed, 1);
        assert_eq!(controller.tasks().current_task, "");
        assert_eq!(controller.task_input(), "");
    }

    #[test]
    fn test_work_completion_with_unlisted_task() {
        let (mut controller, _rx) = create_test_controller();
        controller.set_profile(TimerProfile::Custom);
        controller.set_custom_times("1", "1");
        controller.add_task("Listed");
        controller.set_task_input("Not in the list");

        controller.start().unwrap();
        run_to_completion(&mut controller);

        assert_eq!(controller.tasks().tasks().len(), 1);
        assert_eq!(controller.stats().daily().tasks_completed, 0);
        assert_eq!(controller.stats().daily().pomodoros_completed, 1);
        assert_eq!(controller.tasks().current_task, "");
    }

    #[test]
    fn test_break_completion_records_nothing() {
        let (mut controller, rx) = controller_with(StubAssistant::validated(), never());
        controller.set_profile(TimerProfile::Custom);
        controller.set_custom_times("1", "1");
        controller.add_task("Keep me");

        controller.start().unwrap();
        assert!(matches!(next_reply(&rx), AssistantReply::Tip(Ok(_))));
        assert_eq!(controller.skip(), Some(Mode::Break));

        controller.start().unwrap();
        let event = run_to_completion(&mut controller);

        assert_eq!(event.finished, Mode::Break);
        assert_eq!(event.next, Mode::Work);
        assert_eq!(event.pomodoro_count, 0);
        assert_eq!(controller.stats().daily(), DailyStats::default());
        assert_eq!(controller.tasks().tasks(), ["Keep me".to_string()]);
        assert_eq!(controller.tasks().current_task, "Keep me");
        assert_eq!(
            next_reply(&rx),
            AssistantReply::Break(Ok("break after 0".to_string()))
        );
    }

    #[test]
    fn test_skip_discards_session() {
        let (mut controller, rx) = controller_with(StubAssistant::validated(), always());
        controller.add_task("Write report");
        controller.start().unwrap();
        // Start in work mode asks for a tip.
        next_reply(&rx);

        for _ in 0..30 {
            controller.tick();
        }
        assert_eq!(controller.skip(), Some(Mode::Break));

        assert!(!controller.timer().is_active());
        assert_eq!(controller.display_secs(), 5 * 60);
        assert_eq!(controller.stats().daily(), DailyStats::default());
        assert_eq!(controller.tasks().tasks().len(), 1);
        assert_eq!(controller.timer().pomodoro_count(), 0);
        assert_no_reply(&rx);

        // Skipping while idle is a no-op.
        assert_eq!(controller.skip(), None);
        assert_eq!(controller.timer().mode(), Mode::Break);
    }

    #[test]
    fn test_pause_and_resume() {
        let (mut controller, _rx) = create_test_controller();
        assert_eq!(controller.toggle_pause(), None);

        controller.start().unwrap();
        for _ in 0..10 {
            controller.tick();
        }
        assert_eq!(controller.toggle_pause(), Some(true));
        let remaining = controller.display_secs();
        assert_eq!(controller.tick(), TickOutcome::Idle);
        assert_eq!(controller.display_secs(), remaining);

        assert_eq!(controller.toggle_pause(), Some(false));
        assert_eq!(controller.tick(), TickOutcome::Counting(remaining - 1));
    }

    #[test]
    fn test_start_while_paused_resumes() {
        let (mut controller, _rx) = create_test_controller();
        controller.start().unwrap();
        controller.tick();
        controller.toggle_pause();

        assert_eq!(controller.start(), Ok(StartOutcome::Resumed));
        assert!(!controller.timer().is_paused());
        assert_eq!(controller.timer().remaining_secs(), 25 * 60 - 1);
    }

    #[test]
    fn test_start_requests_tip_only_for_validated_work() {
        let (mut controller, rx) = controller_with(StubAssistant::validated(), never());
        controller.set_task_input("Deep work");
        controller.start().unwrap();
        assert_eq!(
            next_reply(&rx),
            AssistantReply::Tip(Ok("tip for Deep work".to_string()))
        );

        controller.skip();
        controller.start().unwrap();
        assert_no_reply(&rx);
    }

    #[test]
    fn test_minute_boundary_tips_follow_the_roll() {
        let (mut controller, rx) = controller_with(StubAssistant::validated(), always());
        controller.set_profile(TimerProfile::Custom);
        controller.set_custom_times("3", "1");
        controller.start().unwrap();
        next_reply(&rx);

        // Boundaries at 120 and 60 seconds left; completion at 0 does not roll.
        run_to_completion(&mut controller);
        next_reply(&rx);
        next_reply(&rx);
        assert_no_reply(&rx);

        let (mut quiet, rx) = controller_with(StubAssistant::validated(), never());
        quiet.set_profile(TimerProfile::Custom);
        quiet.set_custom_times("3", "1");
        quiet.start().unwrap();
        next_reply(&rx);
        run_to_completion(&mut quiet);
        assert_no_reply(&rx);
    }

    #[test]
    fn test_boundary_tips_need_validation() {
        let (mut controller, rx) = controller_with(StubAssistant::default(), always());
        controller.set_profile(TimerProfile::Custom);
        controller.set_custom_times("2", "1");
        controller.start().unwrap();
        run_to_completion(&mut controller);
        assert_no_reply(&rx);
    }

    #[test]
    fn test_manual_requests_need_validation() {
        let (mut controller, rx) = create_test_controller();
        assert!(!controller.request_tip());
        assert!(!controller.request_analysis());
        assert!(!controller.request_insights());
        assert!(!controller.request_tasks("launch"));
        assert_no_reply(&rx);
    }

    #[test]
    fn test_manual_requests_deliver_replies() {
        let (mut controller, rx) = controller_with(StubAssistant::validated(), never());
        controller.add_task("A");

        assert!(controller.request_analysis());
        let reply = next_reply(&rx);
        assert_eq!(reply, AssistantReply::Analysis(Ok("1 tasks".to_string())));
        assert_eq!(controller.apply_reply(reply), "1 tasks");
        assert_eq!(controller.latest_suggestion(), Some("1 tasks"));

        assert!(controller.request_insights());
        let reply = next_reply(&rx);
        assert_eq!(
            controller.apply_reply(reply),
            "response contained no text"
        );
    }

    #[test]
    fn test_generated_tasks_are_added_on_apply() {
        let (mut controller, rx) = controller_with(StubAssistant::validated(), never());
        assert!(controller.request_tasks("  blog  "));
        let reply = next_reply(&rx);
        // Nothing changes until the reply is applied.
        assert!(controller.tasks().tasks().is_empty());

        assert_eq!(
            controller.apply_reply(reply),
            "Successfully generated 2 tasks."
        );
        assert_eq!(
            controller.tasks().tasks(),
            ["Plan blog".to_string(), "Ship blog".to_string()]
        );
        assert_eq!(controller.task_input(), "Plan blog");

        assert!(controller.request_tasks(""));
        let reply = next_reply(&rx);
        assert_eq!(controller.apply_reply(reply), "Context required");
    }

    #[test]
    fn test_tip_history_is_timestamped() {
        let (mut controller, _rx) = create_test_controller();
        controller.apply_reply(AssistantReply::Tip(Ok("Breathe".to_string())));
        controller.apply_reply(AssistantReply::Tip(Err("API key not validated".to_string())));

        assert_eq!(controller.history().len(), 1);
        assert_eq!(controller.history()[0].text, "Breathe");
        assert_eq!(controller.history()[0].time.len(), 5);
        assert_eq!(controller.latest_suggestion(), Some("API key not validated"));
    }

    #[test]
    fn test_validate_credentials_saves_on_success() {
        let (mut controller, _rx) = create_test_controller();

        assert!(controller
            .validate_credentials("bad-key", Provider::OpenAi, None)
            .is_err());
        assert_eq!(controller.db.load_settings().unwrap().api_key, "");

        let message = controller
            .validate_credentials("good-key", Provider::Gemini, Some("https://example.invalid"))
            .unwrap();
        assert_eq!(message, "API key validated successfully!");
        assert!(controller.is_assistant_ready());

        let saved = controller.db.load_settings().unwrap();
        assert_eq!(saved.api_key, "good-key");
        assert_eq!(saved.model_type, Provider::Gemini);
        assert_eq!(saved.base_url.as_deref(), Some("https://example.invalid"));
    }

    #[test]
    fn test_settings_restore_between_runs() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pomomind.db");

        {
            let (tx, _rx) = mpsc::channel();
            let db = Database::open(&path).unwrap();
            let mut controller = SessionController::new(
                db,
                Arc::new(StubAssistant::default()),
                Box::new(never()),
                tx,
            );
            controller.set_profile(TimerProfile::LongFocus);
            controller.set_custom_times("40", "abc");
            controller.add_task("Carry over");
            controller.timer.record_pomodoro();
            controller.stats.record_work_completed(50);
            controller.shutdown();
        }

        let (tx, _rx) = mpsc::channel();
        let db = Database::open(&path).unwrap();
        let mut controller =
            SessionController::new(db, Arc::new(StubAssistant::default()), Box::new(never()), tx);
        controller.load_settings();

        assert_eq!(controller.profile(), TimerProfile::LongFocus);
        assert_eq!(controller.timer().custom.work, "40");
        assert_eq!(controller.timer().custom.rest, "abc");
        assert_eq!(controller.timer().pomodoro_count(), 1);
        assert_eq!(controller.tasks().tasks(), ["Carry over".to_string()]);
        assert_eq!(controller.stats().daily().focus_time, 50);
        assert_eq!(controller.display_secs(), 50 * 60);
        assert!(!controller.is_assistant_ready());
    }

    #[test]
    fn test_load_revalidates_stored_key() {
        let (mut controller, _rx) = create_test_controller();
        let doc = SettingsDocument {
            api_key: "good-key".to_string(),
            ..SettingsDocument::default()
        };
        controller.db.save_settings(&doc).unwrap();

        controller.load_settings();
        assert!(controller.is_assistant_ready());
        assert_eq!(controller.latest_suggestion(), Some(WELCOME_MESSAGE));
    }

    #[test]
    fn test_add_task_rejects_blank_and_keeps_entry() {
        let (mut controller, _rx) = create_test_controller();
        assert!(!controller.add_task("   "));
        assert_eq!(controller.task_input(), "");

        controller.set_task_input("Typed");
        assert!(controller.add_task("Other"));
        assert_eq!(controller.task_input(), "Typed");
    }
}
