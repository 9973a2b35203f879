//! Colors used by the interactive view

use ratatui::style::Color;

#[derive(Debug, Clone, Copy)]
pub struct Theme {
    pub title: Color,
    pub text: Color,
    pub dimmed: Color,
    pub accent: Color,
    pub running: Color,
    pub success: Color,
    pub error: Color,
    pub hint: Color,
}

impl Default for Theme {
    fn default() -> Self {
        Self {
            title: Color::Cyan,
            text: Color::Reset,
            dimmed: Color::DarkGray,
            accent: Color::Blue,
            running: Color::Yellow,
            success: Color::Green,
            error: Color::Red,
            hint: Color::Magenta,
        }
    }
}
