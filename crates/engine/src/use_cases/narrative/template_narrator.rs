//! Offline narrator.
//!
//! Produces short deterministic commentary from the same structured context
//! the LLM sees. Used when no narrative service is configured and in tests.

use async_trait::async_trait;
use macrosim_domain::{ImpactDelta, MacroState, NarrativeContext};

use crate::infrastructure::ports::{NarrativeError, NarrativePort};

#[derive(Debug, Clone, Copy, Default)]
pub struct TemplateNarrator;

impl TemplateNarrator {
    pub fn new() -> Self {
        Self
    }

    pub fn render(context: &NarrativeContext) -> String {
        match context {
            NarrativeContext::PreRelease {
                release, state, ..
            } => format!(
                "Markets brace for {} ({}) due {}. Consensus sits at {}. \
                 The backdrop is {}, with growth at {:.2}%, inflation at {:.2}% \
                 and volatility at {:.2}. A print far from consensus would test that view.",
                release.name,
                release.release_type,
                release.scheduled_at.format("%Y-%m-%d %H:%M UTC"),
                release.consensus,
                state.regime(),
                state.growth,
                state.inflation,
                state.volatility
            ),
            NarrativeContext::PostRelease {
                release,
                actual,
                impact,
                before,
                after,
            } => {
                let surprise = actual - release.consensus;
                let verdict = if surprise > 0.0 {
                    "beat"
                } else if surprise < 0.0 {
                    "missed"
                } else {
                    "matched"
                };
                format!(
                    "{} came in at {} against a consensus of {}, {} expectations by {:+.1}. {} {}",
                    release.name,
                    actual,
                    release.consensus,
                    verdict,
                    surprise,
                    describe_moves(*impact),
                    describe_transition(before, after)
                )
            }
            NarrativeContext::Event {
                headline,
                impact,
                before,
                after,
                ..
            } => format!(
                "{}. {} {}",
                headline.trim_end_matches('.'),
                describe_moves(*impact),
                describe_transition(before, after)
            ),
        }
    }
}

fn describe_moves(impact: ImpactDelta) -> String {
    if impact.is_zero() {
        return "The macro picture is unchanged.".to_string();
    }
    let mut moves = Vec::new();
    if impact.d_growth != 0.0 {
        moves.push(format!("growth {:+.2}pp", impact.d_growth));
    }
    if impact.d_inflation != 0.0 {
        moves.push(format!("inflation {:+.2}pp", impact.d_inflation));
    }
    if impact.d_volatility != 0.0 {
        moves.push(format!("volatility {:+.2} points", impact.d_volatility));
    }
    format!("Repricing: {}.", moves.join(", "))
}

fn describe_transition(before: &MacroState, after: &MacroState) -> String {
    let (from, to) = (before.regime(), after.regime());
    if from == to {
        format!("The economy remains in {}.", to.display_name())
    } else {
        format!(
            "The regime shifts from {} to {}.",
            from.display_name(),
            to.display_name()
        )
    }
}

#[async_trait]
impl NarrativePort for TemplateNarrator {
    async fn generate(&self, context: &NarrativeContext) -> Result<String, NarrativeError> {
        Ok(Self::render(context))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use macrosim_domain::{Release, ReleaseId, ScheduledItem};

    #[tokio::test]
    async fn when_release_beats_then_text_names_the_beat() {
        let at = Utc
            .with_ymd_and_hms(2025, 2, 7, 13, 30, 0)
            .single()
            .expect("valid date");
        let release = ScheduledItem::from(Release {
            id: ReleaseId::new(),
            name: "Non-Farm Payrolls January".to_string(),
            release_type: "NFP".to_string(),
            consensus: 180.0,
            actual: 215.0,
            scheduled_at: at,
            impact: ImpactDelta::new(0.08, 0.02, 0.3),
            fired: false,
        });
        let before = MacroState::new(2.3, 2.1, 12.0, at);
        let after = MacroState::new(2.38, 2.12, 12.3, at);

        let text = TemplateNarrator::new()
            .generate(&NarrativeContext::resolved(&release, before, after))
            .await
            .expect("template never fails");

        assert!(text.contains("beat expectations by +35.0"));
        assert!(text.contains("growth +0.08pp"));
        assert!(text.contains("remains in Expansion"));
    }

    #[test]
    fn same_context_renders_same_text() {
        let at = Utc
            .with_ymd_and_hms(2025, 3, 1, 9, 0, 0)
            .single()
            .expect("valid date");
        let context = NarrativeContext::Event {
            headline: "Oil supply shock.".to_string(),
            description: None,
            occurred_at: at,
            impact: ImpactDelta::new(-1.5, 1.5, 8.0),
            before: MacroState::new(2.3, 2.1, 12.0, at),
            after: MacroState::new(0.8, 3.6, 20.0, at),
        };

        let first = TemplateNarrator::render(&context);
        assert_eq!(first, TemplateNarrator::render(&context));
        assert!(first.starts_with("Oil supply shock. Repricing:"));
        assert!(first.contains("shifts from Expansion to Stagflation"));
    }
}
