//! Terminal rendering of playback output.

use std::io::Write;
use std::sync::{Mutex, PoisonError};

use crossterm::style::Stylize;
use macrosim_domain::NarrativeKind;

use crate::infrastructure::ports::{LogLevel, OutputLine, OutputPort};

const RULE_WIDTH: usize = 80;

/// Writes formatted output to stdout. Write failures are logged and dropped.
pub struct TerminalOutput {
    use_colors: bool,
}

impl TerminalOutput {
    pub fn new(use_colors: bool) -> Self {
        Self { use_colors }
    }

    /// Opening banner shown before playback.
    pub fn welcome(&self, scenario: Option<&str>) {
        let title = match scenario {
            Some(name) => format!("MACRO SCENARIO PLAYBACK: {name}"),
            None => "MACRO SCENARIO PLAYBACK".to_string(),
        };
        let rule = "=".repeat(RULE_WIDTH);
        let text = if self.use_colors {
            format!("{}\n{}\n{}", rule, title.bold().cyan(), rule)
        } else {
            format!("{rule}\n{title}\n{rule}")
        };
        self.write(&text);
    }

    fn write(&self, text: &str) {
        let mut stdout = std::io::stdout().lock();
        if let Err(e) = writeln!(stdout, "{text}") {
            tracing::debug!(error = %e, "Failed to write terminal output");
        }
    }
}

impl OutputPort for TerminalOutput {
    fn render(&self, line: OutputLine) {
        self.write(&format_line(&line, self.use_colors));
    }
}

/// Format one output line, optionally with ANSI styling.
pub fn format_line(line: &OutputLine, use_colors: bool) -> String {
    match line {
        OutputLine::Header { title, at } => {
            let rule = "-".repeat(RULE_WIDTH);
            let stamp = at.format("%Y-%m-%d %H:%M");
            if use_colors {
                format!("\n{}\n{} {}\n{}", rule, format!("[{stamp}]").dim(), title.clone().bold(), rule)
            } else {
                format!("\n{rule}\n[{stamp}] {title}\n{rule}")
            }
        }
        OutputLine::System { level, message, at } => {
            let prefix = match at {
                Some(at) => format!("[{}] ", at.format("%Y-%m-%d %H:%M")),
                None => String::new(),
            };
            let mut tag = format!("[{}]", level.as_str());
            if use_colors {
                tag = match level {
                    LogLevel::Info => tag.blue(),
                    LogLevel::Success => tag.green(),
                    LogLevel::Warning => tag.yellow(),
                    LogLevel::Error => tag.red().bold(),
                }
                .to_string();
            }
            format!("{prefix}{tag} {message}")
        }
        OutputLine::MacroState { state, regime } => {
            let body = format!(
                "  Growth: {:.2}%  |  Inflation: {:.2}%  |  Volatility: {:.2}\n  Regime: {}",
                state.growth, state.inflation, state.volatility, regime
            );
            if use_colors {
                format!("{}\n{}", "MACRO STATE".bold().magenta(), body)
            } else {
                format!("MACRO STATE\n{body}")
            }
        }
        OutputLine::Narrative {
            kind,
            label,
            content,
            at,
        } => {
            let title = match kind {
                NarrativeKind::PreRelease => format!("PRE-RELEASE ANALYSIS: {label}"),
                NarrativeKind::PostRelease => format!("MARKET REACTION: {label}"),
                NarrativeKind::Event => format!("EVENT ANALYSIS: {label}"),
            };
            let stamp = at.format("%Y-%m-%d %H:%M");
            if use_colors {
                format!("\n{} {}\n\n{}\n", format!("[{stamp}]").dim(), title.bold().yellow(), content.trim())
            } else {
                format!("\n[{stamp}] {title}\n\n{}\n", content.trim())
            }
        }
    }
}

/// Collects rendered lines in memory instead of printing them.
#[derive(Default)]
pub struct BufferedOutput {
    lines: Mutex<Vec<OutputLine>>,
}

impl BufferedOutput {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lines(&self) -> Vec<OutputLine> {
        self.lines
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl OutputPort for BufferedOutput {
    fn render(&self, line: OutputLine) {
        self.lines
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(line);
    }
}
