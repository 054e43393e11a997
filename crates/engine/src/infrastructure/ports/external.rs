//! External service port traits (LLM, Narrative Generation, Output).

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use macrosim_domain::{MacroState, NarrativeContext, NarrativeKind, Regime};
use serde::{Deserialize, Serialize};

use super::error::{LlmError, NarrativeError};

// =============================================================================
// LLM Types
// =============================================================================

/// LLM request/response types
#[derive(Debug, Clone)]
pub struct LlmRequest {
    /// The conversation history
    pub messages: Vec<ChatMessage>,
    /// System prompt / context
    pub system_prompt: Option<String>,
    /// Temperature for response generation (0.0 - 2.0)
    pub temperature: Option<f32>,
    /// Maximum tokens to generate
    pub max_tokens: Option<u32>,
}

impl LlmRequest {
    pub fn new(messages: Vec<ChatMessage>) -> Self {
        Self {
            messages,
            system_prompt: None,
            temperature: None,
            max_tokens: None,
        }
    }

    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = Some(prompt.into());
        self
    }

    pub fn with_temperature(mut self, temp: f32) -> Self {
        self.temperature = Some(temp);
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: Option<u32>) -> Self {
        self.max_tokens = max_tokens;
        self
    }
}

/// A message in the conversation
#[derive(Debug, Clone)]
pub struct ChatMessage {
    pub role: MessageRole,
    pub content: String,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::User,
            content: content.into(),
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::System,
            content: content.into(),
        }
    }
}

/// Role of a message sender
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageRole {
    User,
    Assistant,
    System,
}

/// Response from the LLM
#[derive(Debug, Clone)]
pub struct LlmResponse {
    /// The generated text content
    pub content: String,
    /// Finish reason
    pub finish_reason: FinishReason,
    /// Token usage
    pub usage: Option<TokenUsage>,
}

/// Reason the generation finished
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FinishReason {
    Stop,
    Length,
    ContentFilter,
    #[serde(other)]
    Unknown,
}

/// Token usage information
#[derive(Debug, Clone)]
pub struct TokenUsage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait LlmPort: Send + Sync {
    async fn generate(&self, request: LlmRequest) -> Result<LlmResponse, LlmError>;
}

// =============================================================================
// Narrative Generation
// =============================================================================

/// Turns a structured narrative context into prose.
///
/// The narrative kind is carried by the context itself (`context.kind()`).
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait NarrativePort: Send + Sync {
    async fn generate(&self, context: &NarrativeContext) -> Result<String, NarrativeError>;
}

// =============================================================================
// Output Rendering
// =============================================================================

/// Severity of a system log line shown to the operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Info,
    Success,
    Warning,
    Error,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Info => "INFO",
            LogLevel::Success => "SUCCESS",
            LogLevel::Warning => "WARNING",
            LogLevel::Error => "ERROR",
        }
    }
}

/// One unit of operator-facing output.
#[derive(Debug, Clone, PartialEq)]
pub enum OutputLine {
    /// Banner for a scheduled item, e.g. its one-line summary.
    Header {
        title: String,
        at: DateTime<Utc>,
    },
    System {
        level: LogLevel,
        message: String,
        at: Option<DateTime<Utc>>,
    },
    MacroState {
        state: MacroState,
        regime: Regime,
    },
    Narrative {
        kind: NarrativeKind,
        label: String,
        content: String,
        at: DateTime<Utc>,
    },
}

impl OutputLine {
    pub fn system(level: LogLevel, message: impl Into<String>) -> Self {
        OutputLine::System {
            level,
            message: message.into(),
            at: None,
        }
    }

    pub fn system_at(level: LogLevel, message: impl Into<String>, at: DateTime<Utc>) -> Self {
        OutputLine::System {
            level,
            message: message.into(),
            at: Some(at),
        }
    }
}

/// Fire-and-forget rendering. Implementations swallow their own failures.
#[cfg_attr(test, mockall::automock)]
pub trait OutputPort: Send + Sync {
    fn render(&self, line: OutputLine);
}
