//! Live progress presentation

mod inline;
pub mod input;
mod plain;
pub mod styles;

use std::io;

use enum_dispatch::enum_dispatch;
use serde_json::Value;
use unicode_width::UnicodeWidthChar;

use crate::engine::OperationMode;
use crate::session::{Outcome, ProgressSnapshot};

pub use inline::InlineView;
pub use plain::PlainLog;

pub const SPINNER_FRAMES: [char; 10] = ['⠋', '⠙', '⠹', '⠸', '⠼', '⠴', '⠦', '⠧', '⠇', '⠏'];

/// What a sink gets to draw on each tick.
pub struct ProgressView<'a> {
    pub deployment: &'a str,
    pub mode: OperationMode,
    pub status: &'a str,
    pub spinner: char,
    pub snapshot: &'a ProgressSnapshot,
}

/// Destination for live progress. Owns stdout for the duration of a run.
#[enum_dispatch]
pub trait ProgressSink {
    fn render(&mut self, view: &ProgressView<'_>) -> io::Result<()>;

    /// Raw engine output; shown only in verbose mode.
    fn line(&mut self, line: &str) -> io::Result<()>;

    fn finish(&mut self, view: &ProgressView<'_>, outcome: &Outcome) -> io::Result<()>;
}

#[enum_dispatch(ProgressSink)]
pub enum Presenter {
    InlineView,
    PlainLog,
}

impl Presenter {
    /// Interactive view when stdout is a terminal we can size, plain log
    /// lines otherwise.
    pub fn detect(plain: bool, verbose: bool) -> Self {
        use std::io::IsTerminal;

        if !plain && io::stdout().is_terminal() {
            match InlineView::new(verbose) {
                Ok(view) => return Presenter::InlineView(view),
                Err(e) => tracing::debug!("falling back to plain output: {}", e),
            }
        }
        Presenter::PlainLog(PlainLog::stdout(verbose))
    }

    pub fn is_interactive(&self) -> bool {
        matches!(self, Presenter::InlineView(_))
    }
}

/// Words for a resource step in `mode`: (in progress, done).
pub fn step_words(mode: OperationMode) -> (&'static str, &'static str) {
    match mode {
        OperationMode::Preview => ("Planning", "Planned"),
        OperationMode::Apply => ("Creating", "Created"),
        OperationMode::Destroy => ("Deleting", "Deleted"),
    }
}

/// Final lines for an outcome, shared by every sink.
pub fn outcome_lines(view: &ProgressView<'_>, outcome: &Outcome) -> Vec<String> {
    match outcome {
        Outcome::Succeeded { outputs } => {
            let mut lines = vec![format!(
                "✅ Ploy deployment {}: {}",
                view.mode.past_tense(),
                view.deployment
            )];
            if !outputs.is_empty() {
                lines.push(String::new());
                lines.push("Outputs".to_string());
                for (key, value) in outputs {
                    lines.push(format!("    - {}: {}", key, display_value(value)));
                }
            }
            lines
        }
        Outcome::Failed { cause } => vec![
            format!(
                "❌ Error {} Ploy deployment: {}",
                view.mode.verb().to_lowercase(),
                view.deployment
            ),
            format!("   {}", cause.summary()),
        ],
        Outcome::Cancelled => vec![format!(
            "⚠ Cancelled {} {}; the engine may still finish the operation remotely",
            view.mode.verb().to_lowercase(),
            view.deployment
        )],
    }
}

pub fn display_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// Wrap `line` to `width` display columns. `None` leaves it unconstrained.
pub fn wrap(line: &str, width: Option<usize>) -> Vec<String> {
    let Some(width) = width.filter(|w| *w > 0) else {
        return vec![line.to_string()];
    };

    let mut lines = Vec::new();
    let mut current = String::new();
    let mut current_width = 0;
    for c in line.chars() {
        let w = c.width().unwrap_or(0);
        if current_width + w > width && !current.is_empty() {
            lines.push(std::mem::take(&mut current));
            current_width = 0;
        }
        current.push(c);
        current_width += w;
    }
    if !current.is_empty() || lines.is_empty() {
        lines.push(current);
    }
    lines
}
