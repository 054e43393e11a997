//! Prompt building functions for narrative requests.
//!
//! Each narrative kind has one template. The pre-release template only sees
//! what the market knows before the print: consensus, current state and recent
//! history. Post-release and event templates see the resolved impact and the
//! state on both sides of it.

use chrono::{DateTime, Utc};
use macrosim_domain::{HistoryRecord, ImpactDelta, MacroState, NarrativeContext, ReleaseBrief};

/// How many history records a pre-release prompt shows.
pub const HISTORY_WINDOW: usize = 3;

/// System prompt shared by every narrative request.
pub const SYSTEM_PROMPT: &str = "You are a senior financial market analyst. \
You write for institutional investors in flowing prose, never in bullet points.";

/// Build the user prompt for a narrative context.
pub fn build_prompt(context: &NarrativeContext, target_words: &str) -> String {
    match context {
        NarrativeContext::PreRelease {
            release,
            state,
            recent_history,
        } => build_pre_release_prompt(release, state, recent_history, target_words),
        NarrativeContext::PostRelease {
            release,
            actual,
            impact,
            before,
            after,
        } => build_post_release_prompt(release, *actual, *impact, before, after, target_words),
        NarrativeContext::Event {
            headline,
            description,
            occurred_at,
            impact,
            before,
            after,
        } => build_event_prompt(
            headline,
            description.as_deref(),
            *occurred_at,
            *impact,
            before,
            after,
            target_words,
        ),
    }
}

fn build_pre_release_prompt(
    release: &ReleaseBrief,
    state: &MacroState,
    recent_history: &[HistoryRecord],
    target_words: &str,
) -> String {
    let mut prompt = String::new();
    prompt.push_str(
        "You are a financial market analyst writing a pre-release analysis for institutional investors.\n\n",
    );

    prompt.push_str("CONTEXT:\n");
    prompt.push_str(&format!(
        "- Release: {} ({})\n",
        release.name, release.release_type
    ));
    prompt.push_str(&format!(
        "- Scheduled for: {}\n",
        format_instant(release.scheduled_at)
    ));
    prompt.push_str(&format!("- Consensus Forecast: {}\n\n", release.consensus));

    prompt.push_str("CURRENT MACRO-ECONOMIC STATE:\n");
    prompt.push_str(&format!("- Growth: {:.2}%\n", state.growth));
    prompt.push_str(&format!("- Inflation: {:.2}%\n", state.inflation));
    prompt.push_str(&format!("- Market Volatility: {:.2}\n", state.volatility));
    prompt.push_str(&format!("- Regime: {}\n\n", state.regime()));

    prompt.push_str(&format_history(recent_history));
    prompt.push_str("\n\n");

    prompt.push_str("TASK:\nWrite a market analysis discussing:\n");
    prompt.push_str("1. What the consensus forecast implies for the economy\n");
    prompt.push_str("2. How this release fits into the current macro environment\n");
    prompt.push_str("3. What market participants should watch for\n");
    prompt.push_str("4. Potential market reactions to beats or misses vs consensus\n\n");

    prompt.push_str("STYLE GUIDELINES:\n");
    prompt.push_str("- Professional, analytical tone appropriate for institutional investors\n");
    prompt.push_str("- Focus on economic implications and market dynamics\n");
    push_common_style(&mut prompt, target_words);
    prompt.push_str("- Be specific about numbers and magnitudes when relevant\n");
    prompt.push_str("- No bullet points or lists - write in flowing paragraphs\n\n");

    prompt.push_str("Write the analysis:");
    prompt
}

fn build_post_release_prompt(
    release: &ReleaseBrief,
    actual: f64,
    impact: ImpactDelta,
    before: &MacroState,
    after: &MacroState,
    target_words: &str,
) -> String {
    let surprise = actual - release.consensus;
    let surprise_pct = if release.consensus != 0.0 {
        surprise / release.consensus * 100.0
    } else {
        0.0
    };
    let verdict = if surprise > 0.0 {
        "beat"
    } else if surprise < 0.0 {
        "missed"
    } else {
        "matched"
    };

    let mut prompt = String::new();
    prompt.push_str(
        "You are a financial market analyst writing an immediate market reaction analysis.\n\n",
    );

    prompt.push_str("RELEASE DETAILS:\n");
    prompt.push_str(&format!(
        "- Release: {} ({})\n",
        release.name, release.release_type
    ));
    prompt.push_str(&format!("- Consensus: {}\n", release.consensus));
    prompt.push_str(&format!("- Actual: {}\n", actual));
    prompt.push_str(&format!(
        "- Surprise: {:+.1} ({:+.1}%) - {} expectations\n\n",
        surprise, surprise_pct, verdict
    ));

    push_state_change(&mut prompt, before, after, "New State After Release");
    prompt.push_str(&format_impact_summary(impact));
    prompt.push_str("\n\n");

    prompt.push_str("TASK:\nWrite a market reaction analysis covering:\n");
    prompt.push_str("1. Immediate interpretation of the data surprise\n");
    prompt.push_str("2. What this means for the economic narrative\n");
    prompt.push_str("3. Market implications and likely asset class reactions\n");
    prompt.push_str("4. Forward-looking considerations for investors\n\n");

    prompt.push_str("STYLE GUIDELINES:\n");
    prompt.push_str("- Urgent, immediate tone appropriate for breaking market news\n");
    prompt.push_str("- Professional analysis for institutional investors\n");
    push_common_style(&mut prompt, target_words);
    prompt.push_str("- Be specific about the magnitude of surprise and impacts\n");
    prompt.push_str("- No bullet points or lists - write in flowing paragraphs\n\n");

    prompt.push_str("Write the analysis:");
    prompt
}

fn build_event_prompt(
    headline: &str,
    description: Option<&str>,
    occurred_at: DateTime<Utc>,
    impact: ImpactDelta,
    before: &MacroState,
    after: &MacroState,
    target_words: &str,
) -> String {
    let mut prompt = String::new();
    prompt.push_str(
        "You are a financial market analyst writing commentary on a major macro-economic or geopolitical event.\n\n",
    );

    prompt.push_str("EVENT:\n");
    prompt.push_str(headline);
    prompt.push('\n');
    if let Some(description) = description.filter(|d| !d.trim().is_empty()) {
        prompt.push_str(description);
        prompt.push('\n');
    }
    prompt.push_str(&format!("Date: {}\n\n", format_instant(occurred_at)));

    push_state_change(&mut prompt, before, after, "New State After Event");
    prompt.push_str(&format_impact_summary(impact));
    prompt.push_str("\n\n");

    prompt.push_str("TASK:\nWrite a market commentary covering:\n");
    prompt.push_str("1. Context and significance of this event\n");
    prompt.push_str("2. Economic and market implications\n");
    prompt.push_str("3. How this changes the macro outlook\n");
    prompt.push_str("4. What investors should watch next\n\n");

    prompt.push_str("STYLE GUIDELINES:\n");
    prompt.push_str("- Authoritative, analytical tone for institutional investors\n");
    prompt.push_str("- Connect the event to broader economic themes\n");
    prompt.push_str(&format!("- Approximately {} words\n", target_words));
    prompt.push_str("- Use appropriate economic and market terminology\n");
    prompt.push_str("- Be specific about impacts and magnitudes\n");
    prompt.push_str("- No bullet points or lists - write in flowing paragraphs\n\n");

    prompt.push_str("Write the commentary:");
    prompt
}

fn push_common_style(prompt: &mut String, target_words: &str) {
    prompt.push_str(&format!("- Approximately {} words\n", target_words));
    prompt.push_str("- Use market terminology naturally\n");
}

fn push_state_change(prompt: &mut String, before: &MacroState, after: &MacroState, label: &str) {
    let change = after.delta_from(before);

    prompt.push_str("MACRO-ECONOMIC IMPACT:\nPrevious State:\n");
    prompt.push_str(&format!("- Growth: {:.2}%\n", before.growth));
    prompt.push_str(&format!("- Inflation: {:.2}%\n", before.inflation));
    prompt.push_str(&format!("- Volatility: {:.2}\n\n", before.volatility));

    prompt.push_str(&format!("{}:\n", label));
    prompt.push_str(&format!(
        "- Growth: {:.2}% (change: {:+.2})\n",
        after.growth, change.d_growth
    ));
    prompt.push_str(&format!(
        "- Inflation: {:.2}% (change: {:+.2})\n",
        after.inflation, change.d_inflation
    ));
    prompt.push_str(&format!(
        "- Volatility: {:.2} (change: {:+.2})\n\n",
        after.volatility, change.d_volatility
    ));

    prompt.push_str(&format!("Current Regime: {}\n\n", after.regime()));
}

/// Recent history block. `history` is most recent first.
pub fn format_history(history: &[HistoryRecord]) -> String {
    if history.len() < 2 {
        return "RECENT HISTORY: Limited historical data available.".to_string();
    }

    let mut lines = vec!["RECENT HISTORY:".to_string()];
    for (i, record) in history.iter().take(HISTORY_WINDOW).enumerate() {
        let mut line = format!(
            "- {}: Growth={:.2}%, Inflation={:.2}%, Volatility={:.2}",
            record.timestamp().format("%Y-%m-%d"),
            record.state.growth,
            record.state.inflation,
            record.state.volatility
        );
        if i == 0 {
            line.push_str(" (current)");
        }
        lines.push(line);
    }
    lines.join("\n")
}

/// Impact breakdown. Zero components are left out.
pub fn format_impact_summary(impact: ImpactDelta) -> String {
    let mut lines = vec!["IMPACT BREAKDOWN:".to_string()];

    if impact.d_growth != 0.0 {
        let direction = if impact.d_growth > 0.0 { "boosted" } else { "reduced" };
        lines.push(format!(
            "- Growth outlook {} by {:.2}%",
            direction,
            impact.d_growth.abs()
        ));
    }
    if impact.d_inflation != 0.0 {
        let direction = if impact.d_inflation > 0.0 {
            "increased"
        } else {
            "decreased"
        };
        lines.push(format!(
            "- Inflation pressure {} by {:.2}%",
            direction,
            impact.d_inflation.abs()
        ));
    }
    if impact.d_volatility != 0.0 {
        let direction = if impact.d_volatility > 0.0 { "rose" } else { "fell" };
        lines.push(format!(
            "- Market volatility {} by {:.2} points",
            direction,
            impact.d_volatility.abs()
        ));
    }

    lines.join("\n")
}

fn format_instant(at: DateTime<Utc>) -> String {
    at.format("%Y-%m-%d %H:%M UTC").to_string()
}
