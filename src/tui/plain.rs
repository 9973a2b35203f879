//! Line-oriented progress output for pipes, CI logs and dumb terminals

use std::collections::HashMap;
use std::io::{self, Stdout, Write};

use super::{outcome_lines, step_words, wrap, ProgressSink, ProgressView};
use crate::session::{Outcome, ResourceState};

/// Prints one line per resource transition instead of redrawing.
pub struct PlainLog<W: Write = Stdout> {
    out: W,
    verbose: bool,
    width: Option<usize>,
    reported: HashMap<String, ResourceState>,
    started: bool,
}

impl PlainLog<Stdout> {
    pub fn stdout(verbose: bool) -> Self {
        let width = crossterm::terminal::size()
            .ok()
            .map(|(columns, _)| columns as usize);
        Self::new(io::stdout(), verbose, width)
    }
}

impl<W: Write> PlainLog<W> {
    pub fn new(out: W, verbose: bool, width: Option<usize>) -> Self {
        Self {
            out,
            verbose,
            width,
            reported: HashMap::new(),
            started: false,
        }
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    fn emit(&mut self, line: &str) -> io::Result<()> {
        for part in wrap(line, self.width) {
            writeln!(self.out, "{}", part)?;
        }
        Ok(())
    }
}

impl<W: Write> ProgressSink for PlainLog<W> {
    fn render(&mut self, view: &ProgressView<'_>) -> io::Result<()> {
        if !self.started {
            self.started = true;
            self.emit(&format!(
                "{} ploy deployment: {}",
                view.mode.verb(),
                view.deployment
            ))?;
        }

        let (active_word, done_word) = step_words(view.mode);
        let mut transitions = Vec::new();
        for resource in view
            .snapshot
            .in_progress()
            .into_iter()
            .chain(view.snapshot.completed())
        {
            if self.reported.get(&resource.identity) == Some(&resource.state) {
                continue;
            }
            self.reported
                .insert(resource.identity.clone(), resource.state);
            let line = match resource.state {
                ResourceState::Complete => format!("  ✓ {} {}", done_word, resource.label()),
                _ => format!("  - {} {}", active_word, resource.label()),
            };
            transitions.push(line);
        }
        for line in transitions {
            self.emit(&line)?;
        }
        self.out.flush()
    }

    fn line(&mut self, line: &str) -> io::Result<()> {
        if self.verbose {
            self.emit(line)?;
        }
        Ok(())
    }

    fn finish(&mut self, view: &ProgressView<'_>, outcome: &Outcome) -> io::Result<()> {
        self.render(view)?;
        for line in outcome_lines(view, outcome) {
            self.emit(&line)?;
        }
        self.out.flush()
    }
}
