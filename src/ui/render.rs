use ratatui::{
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    text::{Line, Span},
    widgets::{Block, Borders, Cell, Clear, Paragraph, Row, Table},
    Frame,
};

use crate::app::{App, AppState, LoginFocus, Tab};
use crate::auth::{gate, GateDecision};

use super::styles;

pub fn render(frame: &mut Frame, app: &App) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // Title bar
            Constraint::Length(2), // Tabs
            Constraint::Min(10),   // Main content
            Constraint::Length(2), // Status bar
        ])
        .split(frame.area());

    render_title_bar(frame, chunks[0]);
    render_tabs(frame, app, chunks[1]);
    render_main_content(frame, app, chunks[2]);
    render_status_bar(frame, app, chunks[3]);

    if matches!(app.state, AppState::LoggingIn) {
        render_login_overlay(frame, app);
    }

    if matches!(app.state, AppState::ConfirmingQuit) {
        render_quit_overlay(frame);
    }
}

fn render_title_bar(frame: &mut Frame, area: Rect) {
    let title = "  shopdash";
    let hint = "[q] Quit  [L] Logout  [r] Refresh";

    let line = Line::from(vec![
        Span::styled(title, styles::title_style()),
        Span::raw(" ".repeat(
            area.width
                .saturating_sub(title.len() as u16 + hint.len() as u16 + 4) as usize,
        )),
        Span::styled(hint, styles::muted_style()),
    ]);

    let block = Block::default()
        .borders(Borders::BOTTOM)
        .border_style(styles::muted_style());
    frame.render_widget(Paragraph::new(line).block(block), area);
}

fn render_tabs(frame: &mut Frame, app: &App, area: Rect) {
    let tabs = [
        ("[1] Dashboard", Tab::Dashboard),
        ("[2] Orders", Tab::Orders),
    ];

    let mut spans = vec![Span::raw(" ")];
    for (i, (label, tab)) in tabs.iter().enumerate() {
        if i > 0 {
            spans.push(Span::styled(" | ", styles::muted_style()));
        }
        spans.push(Span::styled(
            *label,
            styles::tab_style(app.current_tab == *tab),
        ));
    }

    frame.render_widget(Paragraph::new(Line::from(spans)), area);
}

fn render_main_content(frame: &mut Frame, app: &App, area: Rect) {
    // The gate decides whether the protected view may render at all
    match gate::decide(app.session.phase(), app.current_tab) {
        GateDecision::Loading => render_loading(frame, area),
        GateDecision::RedirectToLogin { .. } => {
            // The login overlay is drawn on top; keep the backdrop neutral
            frame.render_widget(
                Paragraph::new("").block(Block::default().borders(Borders::ALL)),
                area,
            );
        }
        GateDecision::Render => match app.current_tab {
            Tab::Dashboard => render_dashboard(frame, app, area),
            Tab::Orders => render_orders(frame, app, area),
        },
    }
}

fn render_loading(frame: &mut Frame, area: Rect) {
    let paragraph = Paragraph::new("Loading session...")
        .alignment(Alignment::Center)
        .style(styles::muted_style())
        .block(Block::default().borders(Borders::ALL));
    frame.render_widget(paragraph, area);
}

fn render_dashboard(frame: &mut Frame, app: &App, area: Rect) {
    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(5), Constraint::Min(3)])
        .split(area);

    let kpis = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage(25),
            Constraint::Percentage(25),
            Constraint::Percentage(25),
            Constraint::Percentage(25),
        ])
        .split(rows[0]);

    let summary = &app.summary;
    render_kpi(frame, kpis[0], "Revenue today", &summary.revenue_display());
    render_kpi(frame, kpis[1], "Orders", &summary.order_count.to_string());
    render_kpi(frame, kpis[2], "Customers", &summary.customer_count.to_string());
    render_kpi(frame, kpis[3], "Low stock", &summary.low_stock_count.to_string());

    let welcome = app
        .session
        .user()
        .map(|u| format!("Signed in as {} ({})", u.display_name(), u.role))
        .unwrap_or_default();
    frame.render_widget(
        Paragraph::new(welcome)
            .style(styles::muted_style())
            .block(Block::default().borders(Borders::ALL).title(" Overview ")),
        rows[1],
    );
}

fn render_kpi(frame: &mut Frame, area: Rect, label: &str, value: &str) {
    let lines = vec![
        Line::from(Span::styled(value.to_string(), styles::kpi_value_style())),
        Line::from(Span::styled(label.to_string(), styles::muted_style())),
    ];
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(styles::border_style(false));
    frame.render_widget(
        Paragraph::new(lines).alignment(Alignment::Center).block(block),
        area,
    );
}

fn render_orders(frame: &mut Frame, app: &App, area: Rect) {
    let header = Row::new(vec!["ID", "Customer", "Total", "Status", "Placed"])
        .style(styles::title_style());

    let rows: Vec<Row> = app
        .orders
        .iter()
        .enumerate()
        .map(|(i, order)| {
            let row = Row::new(vec![
                Cell::from(order.id.to_string()),
                Cell::from(order.customer_display().to_string()),
                Cell::from(format!("${:.2}", order.total)),
                Cell::from(order.status_display().to_string()),
                Cell::from(order.placed_display()),
            ]);
            if i == app.orders_selection {
                row.style(styles::selected_style())
            } else {
                row
            }
        })
        .collect();

    let table = Table::new(
        rows,
        [
            Constraint::Length(8),
            Constraint::Min(20),
            Constraint::Length(10),
            Constraint::Length(12),
            Constraint::Length(18),
        ],
    )
    .header(header)
    .block(
        Block::default()
            .borders(Borders::ALL)
            .title(format!(" Recent orders ({}) ", app.orders.len())),
    );

    frame.render_widget(table, area);
}

fn render_status_bar(frame: &mut Frame, app: &App, area: Rect) {
    let snap = app.session.snapshot();
    let user = snap
        .user
        .map(|u| u.display_name())
        .unwrap_or_else(|| "not signed in".to_string());

    let status = if app.session.is_loading() {
        "signing in...".to_string()
    } else if app.refreshing {
        "refreshing...".to_string()
    } else {
        app.status_message.clone().unwrap_or_default()
    };

    let line = Line::from(vec![
        Span::raw(format!(" {} ", user)),
        Span::styled("| ", styles::muted_style()),
        Span::raw(status),
    ]);

    frame.render_widget(
        Paragraph::new(line).style(styles::status_bar_style()),
        area,
    );
}

fn render_login_overlay(frame: &mut Frame, app: &App) {
    let area = centered_rect(50, 14, frame.area());
    frame.render_widget(Clear, area);

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(styles::border_style(true))
        .title(" Sign in ");
    frame.render_widget(block, area);

    let inner = Layout::default()
        .direction(Direction::Vertical)
        .margin(2)
        .constraints([
            Constraint::Length(3), // Username
            Constraint::Length(3), // Password
            Constraint::Length(1), // Button
            Constraint::Length(2), // Error
        ])
        .split(area);

    let username = Paragraph::new(app.login_username.as_str()).block(
        Block::default()
            .borders(Borders::ALL)
            .title(" Username ")
            .border_style(styles::border_style(app.login_focus == LoginFocus::Username)),
    );
    frame.render_widget(username, inner[0]);

    let masked = "*".repeat(app.login_password.len());
    let password = Paragraph::new(masked).block(
        Block::default()
            .borders(Borders::ALL)
            .title(" Password ")
            .border_style(styles::border_style(app.login_focus == LoginFocus::Password)),
    );
    frame.render_widget(password, inner[1]);

    let button_style = if app.login_focus == LoginFocus::Button {
        styles::selected_style()
    } else {
        styles::muted_style()
    };
    frame.render_widget(
        Paragraph::new("[ Sign in ]")
            .alignment(Alignment::Center)
            .style(button_style),
        inner[2],
    );

    if let Some(ref error) = app.login_error {
        frame.render_widget(
            Paragraph::new(error.as_str())
                .alignment(Alignment::Center)
                .style(styles::error_style()),
            inner[3],
        );
    }
}

fn render_quit_overlay(frame: &mut Frame) {
    let area = centered_rect(36, 5, frame.area());
    frame.render_widget(Clear, area);
    let paragraph = Paragraph::new("Quit shopdash? [y/n]")
        .alignment(Alignment::Center)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(styles::border_style(true)),
        );
    frame.render_widget(paragraph, area);
}

/// Center a fixed-size rect within the given area
fn centered_rect(width: u16, height: u16, area: Rect) -> Rect {
    let x = area.x + area.width.saturating_sub(width) / 2;
    let y = area.y + area.height.saturating_sub(height) / 2;
    Rect {
        x,
        y,
        width: width.min(area.width),
        height: height.min(area.height),
    }
}
