//! AI productivity assistant backed by an OpenAI-compatible chat-completion API.
//!
//! Every operation returns `Result<_, AssistantError>`; failures never escape as
//! panics and callers show the error text in place of a suggestion.

use crate::models::{DailyStats, Provider};
use serde::{Deserialize, Serialize};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use thiserror::Error;

pub const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const VALIDATION_PHRASE: &str = "API key is valid";

#[derive(Error, Debug)]
pub enum AssistantError {
    #[error("API key not validated")]
    NotValidated,
    #[error("API Key Required")]
    MissingKey,
    #[error("Context required")]
    MissingContext,
    #[error("Could not validate API key. Please check and try again.")]
    Rejected,
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("API returned {status}: {message}")]
    Api { status: u16, message: String },
    #[error("response contained no text")]
    EmptyResponse,
    #[error("Error {action}: {source}")]
    Failed {
        action: &'static str,
        #[source]
        source: Box<AssistantError>,
    },
}

impl AssistantError {
    /// Wraps a remote failure with the operation it interrupted.
    fn during(self, action: &'static str) -> Self {
        match self {
            Self::Http(_) | Self::Api { .. } | Self::EmptyResponse => Self::Failed {
                action,
                source: Box::new(self),
            },
            other => other,
        }
    }
}

/// Credentials and endpoint selection, persisted with the settings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Credentials {
    pub api_key: String,
    pub provider: Provider,
    pub base_url: Option<String>,
}

impl Credentials {
    /// Base URL requests are sent to. A custom URL applies to Gemini only.
    pub fn endpoint(&self) -> &str {
        match (self.provider, self.base_url.as_deref()) {
            (Provider::Gemini, Some(url)) if !url.trim().is_empty() => url.trim_end_matches('/'),
            _ => OPENAI_BASE_URL,
        }
    }
}

/// The capability boundary the session controller talks to.
pub trait Assistant: Send + Sync {
    /// Stores the credentials and checks them with a probe request.
    fn validate(
        &self,
        api_key: &str,
        provider: Provider,
        base_url: Option<&str>,
    ) -> Result<String, AssistantError>;

    fn is_validated(&self) -> bool;

    fn credentials(&self) -> Credentials;

    /// Restores stored credentials without validating them.
    fn set_credentials(&self, credentials: Credentials);

    fn suggest_tip(&self, current_task: &str, stats: &DailyStats)
        -> Result<String, AssistantError>;

    fn suggest_break(&self, focus_minutes: u32) -> Result<String, AssistantError>;

    fn analyze(
        &self,
        stats: &DailyStats,
        current_task: &str,
        tasks: &[String],
    ) -> Result<String, AssistantError>;

    fn generate_tasks(&self, context: &str) -> Result<Vec<String>, AssistantError>;

    fn insights(&self, stats: &DailyStats) -> Result<String, AssistantError>;
}

#[derive(Debug, Default)]
struct Session {
    credentials: Credentials,
    validated: bool,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 1],
    max_tokens: u32,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatReply,
}

#[derive(Deserialize)]
struct ChatReply {
    content: Option<String>,
}

#[derive(Deserialize)]
struct ApiErrorBody {
    error: ApiErrorDetail,
}

#[derive(Deserialize)]
struct ApiErrorDetail {
    message: String,
}

/// Blocking HTTP implementation of [`Assistant`].
///
/// Credentials sit behind a mutex that is only held long enough to copy them,
/// never across a request.
pub struct ChatAssistant {
    http: reqwest::blocking::Client,
    session: Mutex<Session>,
}

impl ChatAssistant {
    pub fn new() -> Result<Self, AssistantError> {
        let http = reqwest::blocking::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        Ok(Self {
            http,
            session: Mutex::new(Session::default()),
        })
    }

    fn session(&self) -> MutexGuard<'_, Session> {
        self.session.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn validated_credentials(&self) -> Result<Credentials, AssistantError> {
        let session = self.session();
        if session.validated {
            Ok(session.credentials.clone())
        } else {
            Err(AssistantError::NotValidated)
        }
    }

    fn chat(
        &self,
        credentials: &Credentials,
        prompt: &str,
        max_tokens: u32,
    ) -> Result<String, AssistantError> {
        let url = format!("{}/chat/completions", credentials.endpoint());
        let request = ChatRequest {
            model: credentials.provider.model(),
            messages: [ChatMessage {
                role: "user",
                content: prompt,
            }],
            max_tokens,
        };

        tracing::debug!(%url, max_tokens, "sending chat completion");
        let response = self
            .http
            .post(&url)
            .bearer_auth(&credentials.api_key)
            .json(&request)
            .send()?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            let message = serde_json::from_str::<ApiErrorBody>(&body)
                .map(|b| b.error.message)
                .unwrap_or(body);
            return Err(AssistantError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let parsed: ChatResponse = response.json()?;
        extract_text(parsed)
    }

    fn complete(
        &self,
        prompt: &str,
        max_tokens: u32,
        action: &'static str,
    ) -> Result<String, AssistantError> {
        let credentials = self.validated_credentials()?;
        self.chat(&credentials, prompt, max_tokens)
            .map_err(|e| e.during(action))
    }
}

fn extract_text(response: ChatResponse) -> Result<String, AssistantError> {
    response
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.message.content)
        .map(|text| text.trim().to_string())
        .filter(|text| !text.is_empty())
        .ok_or(AssistantError::EmptyResponse)
}

impl Assistant for ChatAssistant {
    fn validate(
        &self,
        api_key: &str,
        provider: Provider,
        base_url: Option<&str>,
    ) -> Result<String, AssistantError> {
        if api_key.is_empty() {
            return Err(AssistantError::MissingKey);
        }

        let credentials = Credentials {
            api_key: api_key.to_string(),
            provider,
            base_url: base_url.map(str::to_string),
        };
        {
            let mut session = self.session();
            session.credentials = credentials.clone();
            session.validated = false;
        }

        let prompt = format!(
            "Hello, this is a test message. Please respond with '{}'.",
            VALIDATION_PHRASE
        );
        let reply = self
            .chat(&credentials, &prompt, 10)
            .map_err(|e| e.during("validating API key"))?;

        if !reply.contains(VALIDATION_PHRASE) {
            tracing::warn!(?provider, "API key probe returned unexpected reply");
            return Err(AssistantError::Rejected);
        }

        let mut session = self.session();
        // Credentials may have been replaced by a concurrent validation.
        if session.credentials == credentials {
            session.validated = true;
        }
        tracing::info!(?provider, "API key validated");
        Ok("API key validated successfully!".to_string())
    }

    fn is_validated(&self) -> bool {
        self.session().validated
    }

    fn credentials(&self) -> Credentials {
        self.session().credentials.clone()
    }

    fn set_credentials(&self, credentials: Credentials) {
        let mut session = self.session();
        session.credentials = credentials;
        session.validated = false;
    }

    fn suggest_tip(
        &self,
        current_task: &str,
        stats: &DailyStats,
    ) -> Result<String, AssistantError> {
        self.complete(&tip_prompt(current_task, stats), 150, "getting AI suggestion")
    }

    fn suggest_break(&self, focus_minutes: u32) -> Result<String, AssistantError> {
        self.complete(
            &break_prompt(focus_minutes),
            150,
            "getting break suggestion",
        )
    }

    fn analyze(
        &self,
        stats: &DailyStats,
        current_task: &str,
        tasks: &[String],
    ) -> Result<String, AssistantError> {
        self.complete(
            &analysis_prompt(stats, current_task, tasks),
            200,
            "analyzing productivity",
        )
    }

    fn generate_tasks(&self, context: &str) -> Result<Vec<String>, AssistantError> {
        let credentials = self.validated_credentials()?;
        if context.trim().is_empty() {
            return Err(AssistantError::MissingContext);
        }
        let text = self
            .chat(&credentials, &task_prompt(context), 250)
            .map_err(|e| e.during("generating tasks"))?;
        Ok(parse_task_list(&text))
    }

    fn insights(&self, stats: &DailyStats) -> Result<String, AssistantError> {
        self.complete(&insights_prompt(stats), 300, "getting AI insights")
    }
}

fn tip_prompt(current_task: &str, stats: &DailyStats) -> String {
    let task = if current_task.is_empty() {
        "an unknown task"
    } else {
        current_task
    };
    format!(
        "You are a productivity assistant in a focus timer app.\n\
         The user is currently working on: \"{task}\".\n\
         Today they have completed {} pomodoros and focused for {} minutes in total.\n\n\
         Give one short, practical productivity tip or motivational message that helps them \
         stay focused. Keep it under 120 words and directly actionable. Sound like a calm, \
         knowledgeable productivity coach rather than a cheerleader.",
        stats.pomodoros_completed, stats.focus_time
    )
}

fn break_prompt(focus_minutes: u32) -> String {
    format!(
        "You are a productivity assistant in a focus timer app.\n\
         The user has just finished a {focus_minutes} minute work session and is starting a break.\n\n\
         Suggest one specific break activity that will refresh their mind for the next session. \
         Keep it under 100 words."
    )
}

fn analysis_prompt(stats: &DailyStats, current_task: &str, tasks: &[String]) -> String {
    let current = if current_task.is_empty() {
        "None"
    } else {
        current_task
    };
    let task_list = if tasks.is_empty() {
        "No tasks added yet.".to_string()
    } else {
        tasks
            .iter()
            .map(|task| format!("- {task}"))
            .collect::<Vec<_>>()
            .join("\n")
    };
    format!(
        "You are a productivity assistant in a focus timer app.\n\
         Analyze the user's productivity today:\n\n\
         - Focus time today: {} minutes\n\
         - Pomodoros completed: {}\n\
         - Tasks completed: {}\n\n\
         Current task: \"{current}\"\n\n\
         Task list:\n{task_list}\n\n\
         Give a brief analysis of their patterns and one specific suggestion to improve. \
         Keep it to about 150 words.",
        stats.focus_time, stats.pomodoros_completed, stats.tasks_completed
    )
}

fn task_prompt(context: &str) -> String {
    format!(
        "You are a productivity assistant in a focus timer app.\n\
         The user is working on: \"{context}\".\n\n\
         Generate 5-7 specific, actionable tasks that move this work forward. Each task must be \
         clear, small enough for one focused session of 25-50 minutes, and start with a verb.\n\
         Reply with a plain list only, no explanations."
    )
}

fn insights_prompt(stats: &DailyStats) -> String {
    format!(
        "You are a productivity assistant in a focus timer app.\n\
         The user's stats for today:\n\n\
         - Focus time today: {} minutes\n\
         - Pomodoros completed: {}\n\
         - Tasks completed: {}\n\n\
         Give data-driven insights about these numbers and 2-3 specific strategies to improve. \
         If they spent a lot of time but finished few tasks, suggest ways to break work down. \
         If they ran many short sessions, suggest longer focus periods.",
        stats.focus_time, stats.pomodoros_completed, stats.tasks_completed
    )
}

/// Extracts task descriptions from a free-text list.
///
/// Leading ordinals (`1. `, `2- `, `3) `) and bullets (`-`, `*`, `•`) are removed and
/// blank lines dropped.
pub fn parse_task_list(text: &str) -> Vec<String> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(strip_list_marker)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}

fn strip_list_marker(line: &str) -> &str {
    let digits = line.len() - line.trim_start_matches(|c: char| c.is_ascii_digit()).len();
    if digits > 0 {
        let rest = &line[digits..];
        for marker in [". ", "- ", ") "] {
            if let Some(stripped) = rest.strip_prefix(marker) {
                return stripped.trim();
            }
        }
        return line;
    }
    match line.strip_prefix(&['-', '*', '•'][..]) {
        Some(stripped) => stripped.trim(),
        None => line,
    }
}
