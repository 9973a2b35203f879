//! Interactive inline progress view

use std::io::{self, Stdout, Write};

use crossterm::terminal::{disable_raw_mode, enable_raw_mode};
use ratatui::backend::CrosstermBackend;
use ratatui::layout::Position;
use ratatui::prelude::*;
use ratatui::widgets::*;
use ratatui::{TerminalOptions, Viewport};

use super::styles::Theme;
use super::{outcome_lines, step_words, wrap, ProgressSink, ProgressView};
use crate::session::{Outcome, ResourceProgress};

const VIEWPORT_HEIGHT: u16 = 12;

/// Draws into a fixed-height region below the cursor, leaving scrollback
/// intact. Raw mode is on while the view lives so single keypresses reach
/// the cancellation listener.
pub struct InlineView {
    terminal: Terminal<CrosstermBackend<Stdout>>,
    theme: Theme,
    verbose: bool,
    raw_mode: bool,
}

impl InlineView {
    pub fn new(verbose: bool) -> io::Result<Self> {
        let backend = CrosstermBackend::new(io::stdout());
        let terminal = Terminal::with_options(
            backend,
            TerminalOptions {
                viewport: Viewport::Inline(VIEWPORT_HEIGHT),
            },
        )?;
        enable_raw_mode()?;

        Ok(Self {
            terminal,
            theme: Theme::default(),
            verbose,
            raw_mode: true,
        })
    }

    fn restore(&mut self) -> io::Result<()> {
        if self.raw_mode {
            disable_raw_mode()?;
            self.raw_mode = false;
        }
        Ok(())
    }
}

impl ProgressSink for InlineView {
    fn render(&mut self, view: &ProgressView<'_>) -> io::Result<()> {
        let theme = self.theme;
        self.terminal
            .draw(|frame| draw_progress(frame, view, &theme, true))?;
        Ok(())
    }

    fn line(&mut self, line: &str) -> io::Result<()> {
        if !self.verbose {
            return Ok(());
        }
        let width = self.terminal.size()?.width as usize;
        let text: Vec<Line> = wrap(line, Some(width)).into_iter().map(Line::from).collect();
        let height = text.len() as u16;
        self.terminal.insert_before(height, |buf| {
            Paragraph::new(text).render(buf.area, buf);
        })
    }

    fn finish(&mut self, view: &ProgressView<'_>, outcome: &Outcome) -> io::Result<()> {
        let theme = self.theme;
        self.terminal
            .draw(|frame| draw_progress(frame, view, &theme, false))?;

        let area = self.terminal.get_frame().area();
        self.terminal
            .set_cursor_position(Position::new(0, area.bottom().saturating_sub(1)))?;
        self.restore()?;

        let mut stdout = io::stdout();
        writeln!(stdout)?;
        for line in outcome_lines(view, outcome) {
            writeln!(stdout, "{}", line)?;
        }
        stdout.flush()
    }
}

impl Drop for InlineView {
    fn drop(&mut self) {
        let _ = self.restore();
    }
}

fn draw_progress(frame: &mut Frame, view: &ProgressView<'_>, theme: &Theme, live: bool) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(1),
            Constraint::Length(1),
            Constraint::Min(3),
            Constraint::Length(1),
        ])
        .split(frame.area());

    let (active_word, done_word) = step_words(view.mode);
    let marker = if live { view.spinner.to_string() } else { "•".to_string() };
    let header = Line::from(vec![
        Span::styled(format!("{} ", marker), Style::default().fg(theme.running)),
        Span::styled(
            format!("{} ploy deployment: ", view.mode.verb()),
            Style::default().fg(theme.text),
        ),
        Span::styled(view.deployment, Style::default().fg(theme.title).bold()),
    ]);
    frame.render_widget(Paragraph::new(header), chunks[0]);

    let status = match view.snapshot.last_error() {
        Some(error) => Line::from(Span::styled(error, Style::default().fg(theme.error))),
        None => Line::from(Span::styled(view.status, Style::default().fg(theme.dimmed))),
    };
    frame.render_widget(Paragraph::new(status), chunks[1]);

    let columns = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(50), Constraint::Percentage(50)])
        .split(chunks[2]);

    let in_progress = view.snapshot.in_progress();
    let completed = view.snapshot.completed();

    let active_lines = resource_lines(&in_progress, &view.spinner.to_string(), theme.running);
    frame.render_widget(
        Paragraph::new(active_lines)
            .wrap(Wrap { trim: true })
            .block(column_block(active_word, in_progress.len(), theme)),
        columns[0],
    );

    let done_lines = resource_lines(&completed, "✓", theme.success);
    frame.render_widget(
        Paragraph::new(done_lines)
            .wrap(Wrap { trim: true })
            .block(column_block(done_word, completed.len(), theme)),
        columns[1],
    );

    if live {
        let hint = Line::from(vec![
            Span::styled("q", Style::default().fg(theme.hint)),
            Span::raw("/"),
            Span::styled("Esc", Style::default().fg(theme.hint)),
            Span::raw(" cancel"),
        ]);
        frame.render_widget(Paragraph::new(hint), chunks[3]);
    }
}

fn column_block<'a>(title: &str, count: usize, theme: &Theme) -> Block<'a> {
    Block::default()
        .borders(Borders::TOP)
        .border_style(Style::default().fg(theme.dimmed))
        .title(format!(" {} ({}) ", title, count))
        .title_style(Style::default().fg(theme.accent).bold())
}

fn resource_lines<'a>(resources: &[&ResourceProgress], marker: &str, color: Color) -> Vec<Line<'a>> {
    resources
        .iter()
        .map(|r| {
            Line::from(vec![
                Span::styled(format!("{} ", marker), Style::default().fg(color)),
                Span::raw(r.label()),
            ])
        })
        .collect()
}
