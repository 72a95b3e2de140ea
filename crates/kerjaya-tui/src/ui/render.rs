use kerjaya_core::{Gated, Session};
use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::Style,
    text::{Line, Span},
    widgets::{Block, Borders, Clear, Paragraph, Wrap},
    Frame,
};
use serde_json::Value;

use crate::app::{App, AppState, AuthMode, LoginFocus, Report, Tab, ToolKind};

use super::styles;

/// The three tools offered on the dashboard, with the key that starts each
const TOOLS: [(&str, &str, &str); 3] = [
    (
        "[h]",
        "Resume Health Check",
        "AI scan for structure, contact info, and missing sections.",
    ),
    (
        "[a]",
        "ATS Robot Check",
        "Ensure your resume passes automated hiring filters.",
    ),
    (
        "[f]",
        "Internship Finder",
        "Match your skills with companies in KL & Penang. Pick a resume on the Profile tab.",
    ),
];

/// Lines of extracted resume text shown in the ATS report
const PREVIEW_LINES: usize = 8;

pub fn render(frame: &mut Frame, app: &App) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // Title bar
            Constraint::Length(2), // Tabs
            Constraint::Min(8),    // Main content
            Constraint::Length(1), // Status bar
        ])
        .split(frame.area());

    // Resolve the gate once per frame so every panel agrees
    let gated = app.gate.guard(|session| session.clone());

    render_title_bar(frame, &gated, chunks[0]);
    match gated {
        Gated::Render(session) => {
            render_tabs(frame, app, chunks[1]);
            match app.current_tab {
                Tab::Dashboard => render_dashboard(frame, app, &session, chunks[2]),
                Tab::Profile => render_profile(frame, app, chunks[2]),
                Tab::Results => render_results(frame, app, chunks[2]),
            }
        }
        Gated::Redirect(_) => render_login(frame, app, chunks[2]),
    }
    render_status_bar(frame, app, chunks[3]);

    match app.state {
        AppState::ConfirmingQuit => render_quit_overlay(frame),
        AppState::EnteringPath(kind) => render_path_prompt(frame, app, kind),
        AppState::Normal | AppState::Quitting => {}
    }
}

fn render_title_bar(frame: &mut Frame, gated: &Gated<Session>, area: Rect) {
    let greeting = match gated {
        Gated::Render(session) => format!("Hello, {}", session.username()),
        Gated::Redirect(_) => "Hello, Job Seeker".to_string(),
    };

    let brand_len = "  KerjayaFlow".len();
    let title_line = Line::from(vec![
        Span::styled("  Kerjaya", styles::title_style()),
        Span::styled("Flow", styles::brand_accent_style()),
        Span::raw(" ".repeat(
            area.width
                .saturating_sub(brand_len as u16 + greeting.len() as u16 + 2)
                as usize,
        )),
        Span::styled(greeting, styles::muted_style()),
    ]);

    let block = Block::default()
        .borders(Borders::BOTTOM)
        .border_style(styles::muted_style());
    frame.render_widget(Paragraph::new(title_line).block(block), area);
}

fn render_tabs(frame: &mut Frame, app: &App, area: Rect) {
    let tabs = [
        ("[1] Dashboard", app.current_tab == Tab::Dashboard),
        ("[2] Profile", app.current_tab == Tab::Profile),
        ("[3] Results", app.current_tab == Tab::Results),
    ];

    let mut spans = vec![Span::raw(" ")];
    for (i, (label, selected)) in tabs.iter().enumerate() {
        if i > 0 {
            spans.push(Span::styled(" | ", styles::muted_style()));
        }
        spans.push(Span::styled(*label, styles::tab_style(*selected)));
    }

    let block = Block::default()
        .borders(Borders::BOTTOM)
        .border_style(styles::muted_style());
    frame.render_widget(Paragraph::new(Line::from(spans)).block(block), area);
}

fn render_dashboard(frame: &mut Frame, app: &App, session: &Session, area: Rect) {
    let mut lines = vec![
        Line::from(Span::styled(
            format!("Apa khabar, {}?", session.username()),
            styles::title_style(),
        )),
        Line::from(Span::styled(
            "Ready to upgrade your career journey today?",
            styles::muted_style(),
        )),
        Line::from(""),
    ];

    for (key, name, description) in TOOLS {
        lines.push(Line::from(vec![
            Span::styled(key, styles::help_key_style()),
            Span::raw(" "),
            Span::styled(name, styles::success_style()),
        ]));
        lines.push(Line::from(vec![
            Span::raw("    "),
            Span::styled(description, styles::list_item_style()),
        ]));
        lines.push(Line::from(""));
    }
    if let Some(line) = tool_status_line(app) {
        lines.push(line);
    }

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(styles::border_style(false));
    frame.render_widget(Paragraph::new(lines).block(block), area);
}

fn render_profile(frame: &mut Frame, app: &App, area: Rect) {
    let lines = if let Some(ref error) = app.profile_error {
        vec![
            Line::from(Span::styled(error.clone(), styles::error_style())),
            Line::from(vec![
                Span::styled("Press ", styles::muted_style()),
                Span::styled("[l]", styles::help_key_style()),
                Span::styled(" to log out, ", styles::muted_style()),
                Span::styled("[r]", styles::help_key_style()),
                Span::styled(" to retry", styles::muted_style()),
            ]),
        ]
    } else if let Some(ref profile) = app.profile {
        let mut lines = profile_lines(profile, app.selected_resume);
        if !app.resume_ids().is_empty() {
            lines.push(Line::from(""));
            lines.push(Line::from(vec![
                Span::styled("[j/k]", styles::help_key_style()),
                Span::styled(" select  ", styles::muted_style()),
                Span::styled("[t]", styles::help_key_style()),
                Span::styled(" ATS check  ", styles::muted_style()),
                Span::styled("[m]", styles::help_key_style()),
                Span::styled(" find internships", styles::muted_style()),
            ]));
        }
        lines.extend(tool_status_line(app));
        lines
    } else {
        vec![Line::from(Span::styled(
            "Loading Profile...",
            styles::muted_style(),
        ))]
    };

    let block = Block::default()
        .title(" My Resumes ")
        .borders(Borders::ALL)
        .border_style(styles::border_style(false));
    frame.render_widget(
        Paragraph::new(lines).block(block).wrap(Wrap { trim: false }),
        area,
    );
}

/// Display text for a payload field; missing and null read as "-".
fn field(value: &Value, key: &str) -> String {
    match value.get(key) {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Null) | None => "-".to_string(),
        Some(other) => other.to_string(),
    }
}

/// The string items of an array field
fn string_list(value: &Value, key: &str) -> Vec<String> {
    value
        .get(key)
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .map(|item| item.as_str().map(str::to_string).unwrap_or_else(|| item.to_string()))
                .collect()
        })
        .unwrap_or_default()
}

/// Progress or failure of the last resume tool call
fn tool_status_line(app: &App) -> Option<Line<'static>> {
    if app.tool_pending {
        Some(Line::from(Span::styled("Robot is reading...", styles::muted_style())))
    } else {
        app.report_error
            .as_ref()
            .map(|e| Line::from(Span::styled(e.clone(), styles::error_style())))
    }
}

/// Lines for the profile payload. Only the fields the page needs are read;
/// anything else in the payload is ignored.
fn profile_lines(profile: &Value, selected: usize) -> Vec<Line<'static>> {
    let text = |key: &str| profile.get(key).and_then(Value::as_str).unwrap_or("").to_string();

    let mut lines = vec![
        Line::from(Span::styled(text("username"), styles::title_style())),
        Line::from(Span::styled(text("email"), styles::muted_style())),
        Line::from(""),
    ];

    let resumes = profile
        .get("resumes")
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or_default();

    if resumes.is_empty() {
        lines.push(Line::from(Span::styled(
            "You haven't uploaded any resumes yet.",
            styles::muted_style(),
        )));
    }

    for (i, resume) in resumes.iter().enumerate() {
        let marker = if i == selected { "▶ " } else { "  " };
        let name_style = if i == selected {
            styles::selected_style()
        } else {
            styles::list_item_style()
        };
        lines.push(Line::from(vec![
            Span::raw(marker),
            Span::styled(format!("#{} ", field(resume, "id")), styles::help_key_style()),
            Span::styled(field(resume, "filename"), name_style),
            Span::styled(format!("  {}", field(resume, "date")), styles::muted_style()),
        ]));
    }

    lines
}

fn render_results(frame: &mut Frame, app: &App, area: Rect) {
    let (title, mut lines) = match app.report {
        Some(ref report) => (format!(" {} ", report.kind.label()), report_lines(report)),
        None => (
            " Results ".to_string(),
            vec![Line::from(Span::styled(
                "No results yet. Run a tool from the Dashboard or Profile tab.",
                styles::muted_style(),
            ))],
        ),
    };
    if let Some(line) = tool_status_line(app) {
        lines.insert(0, line);
    }

    let block = Block::default()
        .title(title)
        .borders(Borders::ALL)
        .border_style(styles::border_style(false));
    frame.render_widget(
        Paragraph::new(lines).block(block).wrap(Wrap { trim: false }),
        area,
    );
}

fn report_lines(report: &Report) -> Vec<Line<'static>> {
    let data = &report.data;
    let mut lines = match report.kind {
        ToolKind::HealthCheck => health_lines(data),
        ToolKind::AtsScan | ToolKind::AtsRescan => ats_lines(data),
        ToolKind::InternshipMatch => match_lines(data),
    };
    if data.get("is_saved").and_then(Value::as_bool) == Some(false) {
        lines.push(Line::from(""));
        lines.push(Line::from(Span::styled(
            "Report not saved to your history.",
            styles::muted_style(),
        )));
    }
    lines
}

fn health_lines(data: &Value) -> Vec<Line<'static>> {
    let present = string_list(data, "present");
    let missing = string_list(data, "missing");

    let mut lines = vec![
        Line::from(Span::styled(
            format!("Completeness: {}/100", field(data, "score")),
            styles::title_style(),
        )),
        Line::from(""),
        Line::from(Span::styled(
            format!("Good Job! ({})", present.len()),
            styles::success_style(),
        )),
    ];
    lines.extend(present.into_iter().map(|item| {
        Line::from(Span::styled(format!("  ✓ {}", item), styles::list_item_style()))
    }));
    lines.push(Line::from(Span::styled(
        format!("Missing Sections ({})", missing.len()),
        styles::error_style(),
    )));
    lines.extend(missing.into_iter().map(|item| {
        Line::from(Span::styled(format!("  ✗ {}", item), styles::list_item_style()))
    }));
    lines
}

fn ats_lines(data: &Value) -> Vec<Line<'static>> {
    let results = data.get("results").cloned().unwrap_or(Value::Null);
    let parsed = results.get("parsed_info").cloned().unwrap_or(Value::Null);
    let issues = string_list(&results, "issues");

    let mut lines = Vec::new();
    if let Some(name) = data.get("filename").and_then(Value::as_str) {
        lines.push(Line::from(Span::styled(
            format!("Analysis for: {}", name),
            styles::muted_style(),
        )));
    }
    lines.push(Line::from(Span::styled(
        format!("Parsability Score: {}%", field(data, "score")),
        styles::title_style(),
    )));
    lines.push(Line::from(""));

    for (label, key) in [("Email", "email"), ("Phone", "phone")] {
        let value = match parsed.get(key).and_then(Value::as_str) {
            Some(found) if !found.is_empty() => {
                Span::styled(found.to_string(), styles::success_style())
            }
            _ => Span::styled("Not Found", styles::error_style()),
        };
        lines.push(Line::from(vec![
            Span::styled(format!("{}: ", label), styles::muted_style()),
            value,
        ]));
    }

    lines.push(Line::from(""));
    lines.push(Line::from(Span::styled(
        format!("{} Issues", issues.len()),
        if issues.is_empty() {
            styles::success_style()
        } else {
            styles::error_style()
        },
    )));
    lines.extend(issues.into_iter().map(|issue| {
        Line::from(Span::styled(format!("  - {}", issue), styles::list_item_style()))
    }));

    if let Some(preview) = results.get("raw_text_preview").and_then(Value::as_str) {
        lines.push(Line::from(""));
        lines.push(Line::from(Span::styled("Robot Vision", styles::title_style())));
        lines.extend(preview.lines().take(PREVIEW_LINES).map(|line| {
            Line::from(Span::styled(format!("  {}", line), styles::muted_style()))
        }));
    }
    lines
}

fn match_lines(data: &Value) -> Vec<Line<'static>> {
    let skills = string_list(data, "skills_detected");
    let matches = data
        .get("matches")
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default();

    let mut lines = vec![
        Line::from(Span::styled(
            format!("Found {} Matches based on: {}", matches.len(), skills.join(", ")),
            styles::title_style(),
        )),
        Line::from(""),
    ];

    for entry in &matches {
        let job = entry.get("job").cloned().unwrap_or(Value::Null);
        let strong = entry.get("score").and_then(Value::as_f64).unwrap_or(0.0) > 70.0;
        lines.push(Line::from(vec![
            Span::styled(
                format!("{:>4}% ", field(entry, "score")),
                if strong {
                    styles::success_style()
                } else {
                    styles::brand_accent_style()
                },
            ),
            Span::styled(field(&job, "title"), styles::list_item_style()),
            Span::styled(format!("  {}", field(&job, "company")), styles::muted_style()),
        ]));
        let matched = string_list(entry, "matched_skills");
        if !matched.is_empty() {
            lines.push(Line::from(Span::styled(
                format!("       Matched Skills: {}", matched.join(", ")),
                styles::muted_style(),
            )));
        }
    }
    lines
}

fn render_path_prompt(frame: &mut Frame, app: &App, kind: ToolKind) {
    let area = centered_rect_fixed(64, 6, frame.area());
    frame.render_widget(Clear, area);

    // Show the tail of long paths so the cursor stays visible
    let width = 56;
    let count = app.path_input.chars().count();
    let shown: String = app
        .path_input
        .chars()
        .skip(count.saturating_sub(width))
        .collect();

    let lines = vec![
        Line::from(Span::styled(
            format!(" {}: path to your resume (PDF)", kind.label()),
            styles::title_style(),
        )),
        Line::from(""),
        Line::from(vec![
            Span::raw(" "),
            Span::styled(format!("{}▌", shown), styles::selected_style()),
        ]),
        Line::from(vec![
            Span::styled(" [Enter]", styles::help_key_style()),
            Span::styled(" upload  ", styles::muted_style()),
            Span::styled("[Esc]", styles::help_key_style()),
            Span::styled(" cancel", styles::muted_style()),
        ]),
    ];

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(styles::border_style(true));
    frame.render_widget(Paragraph::new(lines).block(block), area);
}

fn render_login(frame: &mut Frame, app: &App, area: Rect) {
    let register = app.auth_mode == AuthMode::Register;
    let mut height = if register { 12 } else { 11 };
    if app.login_error.is_some() {
        height += 2;
    }
    let area = centered_rect_fixed(46, height, area);
    frame.render_widget(Clear, area);

    let heading = if register {
        "          Join KerjayaFlow"
    } else {
        "        Login to KerjayaFlow"
    };
    let mut lines = vec![
        Line::from(Span::styled(heading, styles::title_style())),
        Line::from(""),
    ];

    let field_line = |label: &'static str, value: String, focused: bool| {
        let style = if focused {
            styles::selected_style()
        } else {
            styles::list_item_style()
        };
        let cursor = if focused { "▌" } else { "" };
        Line::from(vec![
            Span::raw("      "),
            Span::styled(label, styles::muted_style()),
            Span::styled(format!("{:<16}{}", value, cursor), style),
            Span::styled("]", styles::muted_style()),
        ])
    };
    // Long values show their tail so typing stays visible
    let tail = |value: &str| -> String {
        let count = value.chars().count();
        value.chars().skip(count.saturating_sub(16)).collect()
    };

    lines.push(field_line(
        "Username: [",
        tail(&app.login_username),
        app.login_focus == LoginFocus::Username,
    ));
    if register {
        lines.push(field_line(
            "Email:    [",
            tail(&app.login_email),
            app.login_focus == LoginFocus::Email,
        ));
    }
    lines.push(field_line(
        "Password: [",
        "*".repeat(app.login_password.chars().count().min(16)),
        app.login_focus == LoginFocus::Password,
    ));

    lines.push(Line::from(""));
    let button = if app.login_pending {
        if register {
            "  Creating... "
        } else {
            " Signing in "
        }
    } else {
        match (register, app.login_focus == LoginFocus::Button) {
            (false, true) => " ▶ Login ◀ ",
            (false, false) => "   Login   ",
            (true, true) => " ▶ Create Account ◀ ",
            (true, false) => "   Create Account   ",
        }
    };
    let button_style = if app.login_focus == LoginFocus::Button {
        styles::selected_style()
    } else {
        styles::list_item_style()
    };
    lines.push(Line::from(vec![
        Span::raw(if register { "         [" } else { "            [" }),
        Span::styled(button, button_style),
        Span::raw("]"),
    ]));

    lines.push(Line::from(""));
    let link = if register {
        "Have an account? Log in"
    } else {
        "New here? Create an account"
    };
    let link_style = if app.login_focus == LoginFocus::Switch {
        styles::selected_style()
    } else {
        styles::help_key_style()
    };
    lines.push(Line::from(vec![
        Span::raw("        "),
        Span::styled(link, link_style),
    ]));

    if let Some(ref error) = app.login_error {
        lines.push(Line::from(""));
        lines.push(Line::from(Span::styled(
            format!(" {}", error),
            styles::error_style(),
        )));
    }

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(styles::border_style(true))
        .style(Style::default());
    frame.render_widget(Paragraph::new(lines).block(block), area);
}

fn render_status_bar(frame: &mut Frame, app: &App, area: Rect) {
    let text = match app.status_message {
        Some(ref message) => format!(" {}", message),
        None if app.is_authenticated() => match app.current_tab {
            Tab::Dashboard => " [1-3] tabs  [h] health check  [a] ATS scan  [l] logout  [q] quit",
            Tab::Profile => " [1-3] tabs  [r] refresh  [t] ATS  [m] internships  [l] logout  [q] quit",
            Tab::Results => " [1-3] tabs  [l] logout  [q] quit",
        }
        .to_string(),
        None => " [Tab] next field  [Enter] submit  [Esc] quit".to_string(),
    };
    frame.render_widget(
        Paragraph::new(text).style(styles::status_bar_style()),
        area,
    );
}

/// Create a centered rectangle with fixed dimensions
fn centered_rect_fixed(width: u16, height: u16, r: Rect) -> Rect {
    let x = r.x + (r.width.saturating_sub(width)) / 2;
    let y = r.y + (r.height.saturating_sub(height)) / 2;
    Rect::new(x, y, width.min(r.width), height.min(r.height))
}

fn render_quit_overlay(frame: &mut Frame) {
    let area = centered_rect_fixed(40, 5, frame.area());
    frame.render_widget(Clear, area);

    let lines = vec![
        Line::from(Span::styled(
            "  Are you sure you want to quit?",
            styles::title_style(),
        )),
        Line::from(""),
        Line::from(vec![
            Span::styled("  Press ", styles::muted_style()),
            Span::styled("[Y]", styles::help_key_style()),
            Span::styled(" to quit, ", styles::muted_style()),
            Span::styled("[N]", styles::help_key_style()),
            Span::styled(" to cancel", styles::muted_style()),
        ]),
    ];

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(styles::border_style(true));
    frame.render_widget(Paragraph::new(lines).block(block), area);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line_text(line: &Line) -> String {
        line.spans.iter().map(|s| &*s.content).collect()
    }

    #[test]
    fn test_profile_lines_lists_resumes() {
        let profile = serde_json::json!({
            "username": "ada",
            "email": "ada@example.com",
            "resumes": [
                {"id": 4, "filename": "ada_cv.pdf", "date": "2024-05-01", "score": 80},
                {"id": 7, "filename": "ada_cv_v2.pdf", "date": null}
            ]
        });
        let text: Vec<String> = profile_lines(&profile, 1).iter().map(line_text).collect();

        assert_eq!(text[0], "ada");
        assert_eq!(text[1], "ada@example.com");
        assert_eq!(text[3], "  #4 ada_cv.pdf  2024-05-01");
        assert_eq!(text[4], "▶ #7 ada_cv_v2.pdf  -");
    }

    #[test]
    fn test_profile_lines_without_resumes() {
        let profile = serde_json::json!({"username": "ada"});
        let text: Vec<String> = profile_lines(&profile, 0).iter().map(line_text).collect();
        assert!(text.iter().any(|l| l.contains("haven't uploaded")));
    }

    fn report_text(kind: ToolKind, data: Value) -> Vec<String> {
        report_lines(&Report { kind, data }).iter().map(line_text).collect()
    }

    #[test]
    fn test_health_report_lists_sections() {
        let text = report_text(
            ToolKind::HealthCheck,
            serde_json::json!({
                "score": 60,
                "present": ["Education", "Skills"],
                "missing": ["Projects"],
                "is_saved": true
            }),
        );

        assert_eq!(text[0], "Completeness: 60/100");
        assert!(text.contains(&"Good Job! (2)".to_string()));
        assert!(text.contains(&"  ✓ Skills".to_string()));
        assert!(text.contains(&"Missing Sections (1)".to_string()));
        assert!(text.contains(&"  ✗ Projects".to_string()));
        assert!(!text.iter().any(|l| l.contains("not saved")));
    }

    #[test]
    fn test_ats_report_shows_extracted_data() {
        let text = report_text(
            ToolKind::AtsRescan,
            serde_json::json!({
                "filename": "ada_cv.pdf",
                "score": 85,
                "is_saved": false,
                "results": {
                    "parsed_info": {"email": "ada@example.com", "phone": null},
                    "issues": ["Tables detected"],
                    "raw_text_preview": "ADA LOVELACE\nMathematician"
                }
            }),
        );

        assert_eq!(text[0], "Analysis for: ada_cv.pdf");
        assert_eq!(text[1], "Parsability Score: 85%");
        assert!(text.contains(&"Email: ada@example.com".to_string()));
        assert!(text.contains(&"Phone: Not Found".to_string()));
        assert!(text.contains(&"1 Issues".to_string()));
        assert!(text.contains(&"  ADA LOVELACE".to_string()));
        assert_eq!(text.last().map(String::as_str), Some("Report not saved to your history."));
    }

    #[test]
    fn test_match_report_lists_jobs() {
        let text = report_text(
            ToolKind::InternshipMatch,
            serde_json::json!({
                "skills_detected": ["python", "sql"],
                "matches": [{
                    "score": 80,
                    "job": {"title": "Data Intern", "company": "Petronas"},
                    "matched_skills": ["python"]
                }]
            }),
        );

        assert_eq!(text[0], "Found 1 Matches based on: python, sql");
        assert_eq!(text[2], "  80% Data Intern  Petronas");
        assert_eq!(text[3], "       Matched Skills: python");
    }

    #[test]
    fn test_centered_rect_fixed_clamps() {
        let outer = Rect::new(0, 0, 20, 10);
        let rect = centered_rect_fixed(46, 12, outer);
        assert_eq!(rect, Rect::new(0, 0, 20, 10));

        let rect = centered_rect_fixed(10, 4, Rect::new(0, 0, 30, 10));
        assert_eq!(rect, Rect::new(10, 3, 10, 4));
    }
}
