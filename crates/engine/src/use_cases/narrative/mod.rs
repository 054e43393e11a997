//! Narrative use cases.
//!
//! Narratives bracket each firing: an optional pre-release piece before the
//! number is known, then a post-release or event piece once the impact has
//! been applied. Generation failures never stop the simulation; the loop
//! falls back to [`fallback_text`].

pub mod prompt_builder;
pub mod template_narrator;

use std::sync::Arc;

use async_trait::async_trait;
use macrosim_domain::{NarrativeContext, NarrativeKind};

use crate::infrastructure::ports::{
    ChatMessage, LlmPort, LlmRequest, NarrativeError, NarrativePort,
};

pub use template_narrator::TemplateNarrator;

/// Narrator backed by a chat-completion LLM.
pub struct LlmNarrator {
    llm: Arc<dyn LlmPort>,
    max_tokens: u32,
    temperature: f32,
    target_words: String,
}

impl LlmNarrator {
    pub fn new(
        llm: Arc<dyn LlmPort>,
        max_tokens: u32,
        temperature: f32,
        target_words: impl Into<String>,
    ) -> Self {
        Self {
            llm,
            max_tokens,
            temperature,
            target_words: target_words.into(),
        }
    }
}

#[async_trait]
impl NarrativePort for LlmNarrator {
    async fn generate(&self, context: &NarrativeContext) -> Result<String, NarrativeError> {
        let prompt = prompt_builder::build_prompt(context, &self.target_words);
        let request = LlmRequest::new(vec![ChatMessage::user(prompt)])
            .with_system_prompt(prompt_builder::SYSTEM_PROMPT)
            .with_temperature(self.temperature)
            .with_max_tokens(Some(self.max_tokens));

        let response = self.llm.generate(request).await?;
        let content = response.content.trim();
        if content.is_empty() {
            return Err(NarrativeError::EmptyOutput);
        }
        Ok(content.to_string())
    }
}

/// Placeholder shown when narrative generation fails.
pub fn fallback_text(kind: NarrativeKind) -> &'static str {
    match kind {
        NarrativeKind::PreRelease => "[Pre-release commentary unavailable]",
        NarrativeKind::PostRelease => "[Market reaction commentary unavailable]",
        NarrativeKind::Event => "[Event commentary unavailable]",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::ports::{FinishReason, LlmError, LlmResponse, MockLlmPort};
    use chrono::{TimeZone, Utc};
    use macrosim_domain::{ImpactDelta, MacroState};

    fn event_context() -> NarrativeContext {
        let at = Utc
            .with_ymd_and_hms(2025, 3, 1, 9, 0, 0)
            .single()
            .expect("valid date");
        NarrativeContext::Event {
            headline: "Central bank surprises with emergency cut".to_string(),
            description: None,
            occurred_at: at,
            impact: ImpactDelta::new(0.3, 0.1, -1.0),
            before: MacroState::new(2.3, 2.1, 12.0, at),
            after: MacroState::new(2.6, 2.2, 11.0, at),
        }
    }

    fn response(content: &str) -> LlmResponse {
        LlmResponse {
            content: content.to_string(),
            finish_reason: FinishReason::Stop,
            usage: None,
        }
    }

    #[tokio::test]
    async fn when_llm_answers_then_text_is_trimmed() {
        let mut llm = MockLlmPort::new();
        llm.expect_generate()
            .withf(|request| {
                request.max_tokens == Some(600)
                    && request.temperature == Some(0.7)
                    && request.system_prompt.is_some()
                    && request.messages[0]
                        .content
                        .contains("Central bank surprises with emergency cut")
            })
            .times(1)
            .returning(|_| Ok(response("  Rates fall.\n")));

        let narrator = LlmNarrator::new(Arc::new(llm), 600, 0.7, "300-400");
        let text = narrator
            .generate(&event_context())
            .await
            .expect("narrative");

        assert_eq!(text, "Rates fall.");
    }

    #[tokio::test]
    async fn when_llm_returns_blank_then_empty_output_error() {
        let mut llm = MockLlmPort::new();
        llm.expect_generate().returning(|_| Ok(response("   ")));

        let narrator = LlmNarrator::new(Arc::new(llm), 600, 0.7, "300-400");
        let err = narrator
            .generate(&event_context())
            .await
            .expect_err("blank output");

        assert!(matches!(err, NarrativeError::EmptyOutput));
    }

    #[tokio::test]
    async fn when_llm_fails_then_error_is_wrapped() {
        let mut llm = MockLlmPort::new();
        llm.expect_generate()
            .returning(|_| Err(LlmError::RequestFailed("503 unavailable".to_string())));

        let narrator = LlmNarrator::new(Arc::new(llm), 600, 0.7, "300-400");
        let err = narrator
            .generate(&event_context())
            .await
            .expect_err("llm failure");

        assert!(matches!(err, NarrativeError::Llm(LlmError::RequestFailed(_))));
    }
}
