//! Shared UI helpers: theme color accessors and popup placement

use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::Color,
};

use super::theme;

pub fn accent() -> Color { theme().accent }
pub fn success() -> Color { theme().success }
pub fn warning() -> Color { theme().warning }
pub fn danger() -> Color { theme().danger }
pub fn text() -> Color { theme().text }
pub fn text_dim() -> Color { theme().text_dim }
pub fn bg_selected() -> Color { theme().bg_selected }
pub fn inactive() -> Color { theme().inactive }
pub fn header() -> Color { theme().header }

/// A rect of the given percentages centered in `r`
pub fn centered_rect(percent_x: u16, percent_y: u16, r: Rect) -> Rect {
    let popup_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage((100 - percent_y) / 2),
        ])
        .split(r);

    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(popup_layout[1])[1]
}
