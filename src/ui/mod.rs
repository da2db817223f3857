mod components;

use std::sync::OnceLock;
use ratatui::{
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, Paragraph, Row, Table, Wrap},
    Frame,
};

use crate::api::Transport;
use crate::app::{App, FormTarget, Popup};
use crate::client::render::{render_item, sanitize};
use crate::client::RenderMode;
use crate::theme::Theme;

use components::{accent, bg_selected, centered_rect, danger, header, inactive, success, text, text_dim, warning};

static THEME: OnceLock<Theme> = OnceLock::new();

/// Install the theme built from config. Only the first call has an effect.
pub fn init_theme(theme: Theme) {
    if THEME.set(theme).is_err() {
        tracing::debug!("Theme already initialized");
    }
}

fn theme() -> &'static Theme {
    THEME.get_or_init(Theme::default)
}

pub fn draw<T: Transport>(f: &mut Frame, app: &App<T>) {
    let area = f.area();

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .margin(0)
        .constraints([
            Constraint::Length(1),               // Info line
            Constraint::Min(4),                  // Users box
            Constraint::Length(1),               // Footer
        ])
        .split(area);

    draw_info_line(f, app, chunks[0]);
    draw_users_box(f, app, chunks[1]);
    draw_footer(f, app, chunks[2]);

    // Draw popups on top
    match app.popup {
        Popup::None => {}
        Popup::UserForm | Popup::Register => draw_form(f, app),
        Popup::Help => draw_help_popup(f),
        Popup::Confirm => draw_confirm_popup(f, app),
    }

    // Alerts sit above everything, like the browser's alert()
    if !app.alerts.is_empty() {
        draw_alert(f, app);
    }
}

fn draw_info_line<T: Transport>(f: &mut Frame, app: &App<T>, area: Rect) {
    // Priority: status message > requests in flight > ready
    let line = if let Some(ref status) = app.status_message {
        Line::from(vec![
            Span::styled(status, Style::default().fg(warning())),
        ])
    } else if app.in_flight() > 0 {
        Line::from(vec![
            Span::styled(
                format!("󰔟 {} request(s) in flight", app.in_flight()),
                Style::default().fg(text_dim()),
            ),
        ])
    } else {
        Line::from(vec![
            Span::styled("Ready", Style::default().fg(text_dim())),
        ])
    };

    let info = Paragraph::new(line).alignment(Alignment::Center);
    f.render_widget(info, area);
}

fn draw_users_box<T: Transport>(f: &mut Frame, app: &App<T>, area: Rect) {
    let is_active = !app.is_modal();
    let border_color = if is_active { accent() } else { inactive() };
    let title_style = if is_active {
        Style::default().fg(accent()).add_modifier(Modifier::BOLD)
    } else {
        Style::default().fg(inactive())
    };

    let title = match app.mode() {
        RenderMode::List => " Users ",
        RenderMode::Single => " User ",
    };

    let block = Block::default()
        .title(Span::styled(title, title_style))
        .borders(Borders::ALL)
        .border_style(Style::default().fg(border_color));

    let header_row = Row::new(vec![
        Span::styled("", Style::default().fg(header())),
        Span::styled("Id", Style::default().fg(header())),
        Span::styled("User", Style::default().fg(header())),
    ]);

    let rows: Vec<Row> = if app.users.is_empty() {
        vec![
            Row::new(vec![
                Span::raw(""),
                Span::raw(""),
                Span::styled("No users loaded", Style::default().fg(text_dim())),
            ]),
            Row::new(vec![
                Span::raw(""),
                Span::raw(""),
                Span::styled("Press 'n' to create or 'r' to register", Style::default().fg(accent())),
            ]),
        ]
    } else {
        app.users
            .iter()
            .enumerate()
            .map(|(i, user)| {
                let selected = i == app.selected_user && is_active;
                let row_style = if selected {
                    Style::default().bg(bg_selected()).fg(text())
                } else {
                    Style::default()
                };

                Row::new(vec![
                    Span::styled(if selected { "›" } else { " " }, Style::default().fg(accent())),
                    Span::styled(sanitize(user.id.as_deref()), Style::default().fg(text_dim())),
                    Span::styled(render_item(user), Style::default().fg(text())),
                ])
                .style(row_style)
            })
            .collect()
    };

    let widths = vec![
        Constraint::Length(2),
        Constraint::Length(8),
        Constraint::Min(10),
    ];

    let table = Table::new(rows, widths)
        .header(header_row.style(Style::default()))
        .block(block);

    f.render_widget(table, area);
}

fn draw_footer<T: Transport>(f: &mut Frame, app: &App<T>, area: Rect) {
    let hints: Vec<(&str, &str)> = if !app.alerts.is_empty() {
        vec![("Enter", "Dismiss")]
    } else {
        match app.popup {
            Popup::None => vec![
                ("↑↓", "Nav"),
                ("n", "New"),
                ("e", "Edit"),
                ("d", "Del"),
                ("r", "Register"),
                ("R", "Refresh"),
                ("h", "Help"),
                ("q", "Quit"),
            ],
            Popup::UserForm | Popup::Register => vec![
                ("Tab", "Next field"),
                ("Enter", "Next/Submit"),
                ("Esc", "Cancel"),
            ],
            Popup::Confirm => vec![("y", "Yes"), ("n", "No")],
            Popup::Help => vec![("Esc", "Close")],
        }
    };

    // Responsive: show fewer hints on narrow terminals
    let max_hints = if area.width < 60 { 4 } else if area.width < 80 { 6 } else { hints.len() };

    let hint_spans: Vec<Span> = hints
        .iter()
        .take(max_hints)
        .flat_map(|(key, action)| {
            vec![
                Span::styled(*key, Style::default().fg(accent())),
                Span::styled(format!(" {} │ ", action), Style::default().fg(text_dim())),
            ]
        })
        .collect();

    let footer = Paragraph::new(Line::from(hint_spans))
        .alignment(Alignment::Center);

    f.render_widget(footer, area);
}

fn draw_form<T: Transport>(f: &mut Frame, app: &App<T>) {
    let field_count = app.form.fields.len() as u16;
    let area = f.area();
    let popup_area = centered_rect(if area.width < 80 { 90 } else { 60 }, 80, area);
    let popup_area = Rect {
        height: popup_area.height.min(field_count * 3 + 2),
        ..popup_area
    };

    f.render_widget(Clear, popup_area);

    let title = match (app.popup, &app.form_target) {
        (Popup::Register, _) => " Register User ".to_string(),
        (_, FormTarget::Create) => " New User ".to_string(),
        (_, FormTarget::Update(id)) => format!(" Edit User {} ", sanitize(Some(id))),
    };

    let block = Block::default()
        .title(Span::styled(title, Style::default().fg(accent())))
        .borders(Borders::ALL)
        .border_style(Style::default().fg(accent()));

    f.render_widget(block, popup_area);

    let inner = Layout::default()
        .direction(Direction::Vertical)
        .margin(1)
        .constraints(vec![Constraint::Length(3); app.form.fields.len()])
        .split(popup_area);

    for (i, field) in app.form.fields.iter().enumerate() {
        let focused = i == app.form.focus;
        let border = if focused { accent() } else { inactive() };
        let cursor = if focused { "_" } else { "" };
        let value = if field.masked {
            "•".repeat(field.value.chars().count())
        } else {
            field.value.clone()
        };

        let input = Paragraph::new(format!("{}{}", value, cursor))
            .style(Style::default().fg(text()))
            .block(
                Block::default()
                    .title(Span::styled(
                        format!(" {} ", field.label),
                        Style::default().fg(if focused { accent() } else { header() }),
                    ))
                    .borders(Borders::ALL)
                    .border_style(Style::default().fg(border)),
            );
        f.render_widget(input, inner[i]);
    }
}

fn draw_help_popup(f: &mut Frame) {
    let area = f.area();
    let popup_area = centered_rect(
        if area.width < 80 { 90 } else { 60 },
        if area.height < 30 { 90 } else { 60 },
        area,
    );

    f.render_widget(Clear, popup_area);

    let key = |k: &'static str| Span::styled(format!("  {:<8}", k), Style::default().fg(accent()));
    let desc = |d: &'static str| Span::styled(d, Style::default().fg(text()));

    let lines = vec![
        Line::from(Span::styled("Users", Style::default().fg(header()).add_modifier(Modifier::BOLD))),
        Line::from(vec![key("↑↓ j k"), desc("Move selection")]),
        Line::from(vec![key("n"), desc("Create a user")]),
        Line::from(vec![key("e Enter"), desc("Update the selected user")]),
        Line::from(vec![key("d Del"), desc("Delete the selected user")]),
        Line::from(vec![key("r"), desc("Register a new account")]),
        Line::from(vec![key("R"), desc("Reload from the server")]),
        Line::from(""),
        Line::from(Span::styled("General", Style::default().fg(header()).add_modifier(Modifier::BOLD))),
        Line::from(vec![key("h ?"), desc("This help")]),
        Line::from(vec![key("q"), desc("Quit")]),
    ];

    let help = Paragraph::new(lines)
        .wrap(Wrap { trim: false })
        .block(
            Block::default()
                .title(Span::styled(" Help ", Style::default().fg(accent())))
                .borders(Borders::ALL)
                .border_style(Style::default().fg(accent())),
        );

    f.render_widget(help, popup_area);
}

fn draw_confirm_popup<T: Transport>(f: &mut Frame, app: &App<T>) {
    let popup_area = centered_rect(50, 20, f.area());

    f.render_widget(Clear, popup_area);

    let confirm = Paragraph::new(vec![
        Line::from(""),
        Line::from(Span::styled(app.confirm_message.as_str(), Style::default().fg(warning()))),
        Line::from(""),
        Line::from(vec![
            Span::styled("  y", Style::default().fg(success()).add_modifier(Modifier::BOLD)),
            Span::raw(" Yes   "),
            Span::styled("n", Style::default().fg(danger()).add_modifier(Modifier::BOLD)),
            Span::raw(" No"),
        ]),
    ])
    .wrap(Wrap { trim: true })
    .block(
        Block::default()
            .title(Span::styled(" Confirm ", Style::default().fg(warning())))
            .borders(Borders::ALL)
            .border_style(Style::default().fg(warning())),
    )
    .alignment(Alignment::Center);

    f.render_widget(confirm, popup_area);
}

fn draw_alert<T: Transport>(f: &mut Frame, app: &App<T>) {
    let Some(alert) = app.alerts.front() else {
        return;
    };
    let popup_area = centered_rect(50, 20, f.area());

    f.render_widget(Clear, popup_area);

    let color = if alert.failure { danger() } else { success() };
    let queued = app.alerts.len() - 1;
    let title = if queued > 0 {
        format!(" Alert (+{}) ", queued)
    } else {
        " Alert ".to_string()
    };

    let body = Paragraph::new(vec![
        Line::from(""),
        Line::from(Span::styled(alert.message.as_str(), Style::default().fg(color).add_modifier(Modifier::BOLD))),
        Line::from(""),
        Line::from(vec![
            Span::styled("Enter", Style::default().fg(accent())),
            Span::styled(" OK", Style::default().fg(text_dim())),
        ]),
    ])
    .wrap(Wrap { trim: true })
    .block(
        Block::default()
            .title(Span::styled(title, Style::default().fg(color)))
            .borders(Borders::ALL)
            .border_style(Style::default().fg(color)),
    )
    .alignment(Alignment::Center);

    f.render_widget(body, popup_area);
}
