use ratatui::Frame;
use ratatui::layout::{Constraint, Direction, Layout, Position, Rect};
use ratatui::style::{Color, Modifier, Style, Stylize};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Gauge, Paragraph, Sparkline, Wrap};
use unicode_width::UnicodeWidthStr;

use crate::tui::{App, SETUP_LABELS, Screen, SetupForm, Speaker};

/// Render agent output through `tui_markdown` (ratatui-core types) as ratatui 0.29 lines.
fn md_to_lines(content: &str) -> Vec<Line<'static>> {
    let rendered = tui_markdown::from_str(content);
    rendered
        .lines
        .into_iter()
        .map(|line| {
            let spans: Vec<Span<'static>> = line
                .spans
                .into_iter()
                .map(|s| Span::styled(s.content.into_owned(), convert_style(s.style)))
                .collect();
            Line::from(spans)
        })
        .collect()
}

fn convert_style(s: ratatui_core::style::Style) -> Style {
    let mut out = Style::default();
    if let Some(c) = s.fg {
        out.fg = Some(convert_color(c));
    }
    if let Some(c) = s.bg {
        out.bg = Some(convert_color(c));
    }
    out.add_modifier = Modifier::from_bits_truncate(s.add_modifier.bits());
    out.sub_modifier = Modifier::from_bits_truncate(s.sub_modifier.bits());
    out
}

fn convert_color(c: ratatui_core::style::Color) -> Color {
    use ratatui_core::style::Color as C;
    match c {
        C::Reset => Color::Reset,
        C::Black => Color::Black,
        C::Red => Color::Red,
        C::Green => Color::Green,
        C::Yellow => Color::Yellow,
        C::Blue => Color::Blue,
        C::Magenta => Color::Magenta,
        C::Cyan => Color::Cyan,
        C::Gray => Color::Gray,
        C::DarkGray => Color::DarkGray,
        C::LightRed => Color::LightRed,
        C::LightGreen => Color::LightGreen,
        C::LightYellow => Color::LightYellow,
        C::LightBlue => Color::LightBlue,
        C::LightMagenta => Color::LightMagenta,
        C::LightCyan => Color::LightCyan,
        C::White => Color::White,
        C::Rgb(r, g, b) => Color::Rgb(r, g, b),
        C::Indexed(i) => Color::Indexed(i),
    }
}

const SPINNER: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"];
const INPUT_PREFIX: &str = "> ";
/// Reasoning panel height cap, borders included.
const REASONING_MAX_HEIGHT: u16 = 12;
/// Width share of the confidence row given to the gauge; the trend gets the rest.
const GAUGE_PERCENT: u16 = 40;

pub fn draw(f: &mut Frame, app: &App) {
    match &app.screen {
        Screen::Setup(form) => draw_setup(f, form),
        Screen::Chat => draw_dashboard(f, app),
    }
}

fn draw_setup(f: &mut Frame, form: &SetupForm) {
    let area = centered(f.area(), 60, 14);
    let block = Block::default()
        .borders(Borders::ALL)
        .title(" cogito setup ");
    let inner = block.inner(area);
    f.render_widget(block, area);

    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Length(3),
            Constraint::Length(3),
            Constraint::Length(1),
            Constraint::Min(1),
        ])
        .split(inner);

    for (i, (field, label)) in form.fields.iter().zip(SETUP_LABELS).enumerate() {
        let focused = i == form.focus;
        let style = if focused {
            Style::default().fg(Color::Cyan)
        } else {
            Style::default().fg(Color::DarkGray)
        };
        let para = Paragraph::new(field.text.as_str()).block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(style)
                .title(format!(" {label} ")),
        );
        f.render_widget(para, rows[i]);
        if focused {
            let col = field.text[..field.cursor].width() as u16;
            f.set_cursor_position(Position::new(
                rows[i].x + 1 + col.min(rows[i].width.saturating_sub(3)),
                rows[i].y + 1,
            ));
        }
    }

    let hint = match &form.error {
        Some(err) => Line::from(Span::styled(err.as_str(), Style::default().fg(Color::Red))),
        None => Line::from(Span::styled(
            "Tab next field, Enter to start, Ctrl+C to quit",
            Style::default().dim(),
        )),
    };
    f.render_widget(Paragraph::new(hint), rows[3]);
}

fn draw_dashboard(f: &mut Frame, app: &App) {
    let reasoning_height = match (app.last_reasoning(), app.show_reasoning) {
        (Some(steps), true) => panel_height(steps.len()),
        (None, true) => 3,
        _ => 0,
    };
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Min(3),
            Constraint::Length(reasoning_height),
            Constraint::Length(3),
            Constraint::Length(1),
        ])
        .split(f.area());

    draw_chat(f, app, chunks[0]);
    if reasoning_height > 0 {
        draw_reasoning(f, app, chunks[1]);
    }
    draw_confidence(f, app, chunks[2]);
    draw_status(f, app, chunks[3]);
}

/// Bordered panel tall enough for `rows` lines, capped.
fn panel_height(rows: usize) -> u16 {
    u16::try_from(rows)
        .unwrap_or(u16::MAX)
        .saturating_add(2)
        .min(REASONING_MAX_HEIGHT)
}

/// Current confidence gauge beside the per-turn trend.
fn draw_confidence(f: &mut Frame, app: &App, area: Rect) {
    let cols = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage(GAUGE_PERCENT),
            Constraint::Percentage(100 - GAUGE_PERCENT),
        ])
        .split(area);

    let ratio = app
        .confidence_history
        .last()
        .map_or(0.0, |c| c.clamp(0.0, 1.0));
    let gauge = Gauge::default()
        .block(Block::default().borders(Borders::ALL).title(" confidence "))
        .gauge_style(Style::default().fg(confidence_color(ratio)))
        .ratio(ratio)
        .label(format!("{:.0}%", ratio * 100.0));
    f.render_widget(gauge, cols[0]);

    // newest turns win when the history is wider than the panel
    let width = usize::from(cols[1].width.saturating_sub(2));
    let history = &app.confidence_history;
    let points = sparkline_points(&history[history.len().saturating_sub(width)..]);
    let sparkline = Sparkline::default()
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title(format!(" trend ({}) ", history.len())),
        )
        .data(&points)
        .max(100)
        .style(Style::default().fg(confidence_color(ratio)));
    f.render_widget(sparkline, cols[1]);
}

/// Confidence as whole percentage points.
fn sparkline_points(history: &[f64]) -> Vec<u64> {
    history
        .iter()
        .map(|c| (c.clamp(0.0, 1.0) * 100.0).round() as u64)
        .collect()
}

fn confidence_color(ratio: f64) -> Color {
    if ratio >= 0.8 {
        Color::Green
    } else if ratio >= 0.5 {
        Color::Yellow
    } else {
        Color::Red
    }
}

/// Numbered chain, newest steps kept in view.
fn draw_reasoning(f: &mut Frame, app: &App, area: Rect) {
    let steps = app.last_reasoning().unwrap_or(&[]);
    let lines: Vec<Line> = if steps.is_empty() {
        vec![Line::from(Span::styled("no reasoning yet", Style::default().dim()))]
    } else {
        steps
            .iter()
            .enumerate()
            .map(|(i, step)| {
                Line::from(vec![
                    Span::styled(format!("{:>3}. ", i + 1), Style::default().dim()),
                    Span::raw(step.as_str()),
                ])
            })
            .collect()
    };
    let visible = area.height.saturating_sub(2);
    let scroll = u16::try_from(lines.len())
        .unwrap_or(u16::MAX)
        .saturating_sub(visible);
    let para = Paragraph::new(lines)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title(format!(" reasoning ({}) ", steps.len())),
        )
        .scroll((scroll, 0));
    f.render_widget(para, area);
}

fn draw_status(f: &mut Frame, app: &App, area: Rect) {
    let latency = app
        .latency
        .map_or_else(|| "-".to_string(), |t| format!("{t:.2}s"));
    let text = format!(
        " {}  |  latency {latency}  |  Ctrl+R reasoning  Ctrl+N reset  Ctrl+C quit",
        app.model
    );
    let para = Paragraph::new(Line::from(Span::styled(
        text,
        Style::default().fg(Color::DarkGray),
    )));
    f.render_widget(para, area);
}

fn draw_chat(f: &mut Frame, app: &App, area: Rect) {
    let mut lines: Vec<Line> = Vec::new();
    for msg in &app.messages {
        if !lines.is_empty() && msg.speaker == Speaker::You {
            lines.push(Line::default());
        }
        match msg.speaker {
            Speaker::You => {
                lines.push(Line::from(vec![Span::raw(INPUT_PREFIX), Span::raw(&msg.content)]))
            }
            Speaker::Agent => lines.extend(md_to_lines(&msg.content)),
            Speaker::Error => lines.push(Line::from(Span::styled(
                format!("error: {}", msg.content),
                Style::default().fg(Color::Red),
            ))),
        }
        if let Some(confidence) = msg.confidence {
            lines.push(Line::from(Span::styled(
                format!(
                    "  confidence {:.0}%, {} reasoning steps",
                    confidence * 100.0,
                    msg.reasoning.len()
                ),
                Style::default().fg(confidence_color(confidence)).dim(),
            )));
        }
    }
    if app.thinking {
        let frame = SPINNER[app.anim_frame % SPINNER.len()];
        lines.push(Line::from(Span::styled(
            format!("{frame} thinking..."),
            Style::default().dim(),
        )));
    }

    if !lines.is_empty() {
        lines.push(Line::default());
    }
    lines.push(Line::from(vec![
        Span::raw(INPUT_PREFIX),
        Span::raw(&app.input.text),
    ]));

    let inner_w = area.width.saturating_sub(2) as usize;
    let wrapped_total = lines
        .iter()
        .fold(0u16, |acc, l| acc.saturating_add(wrapped_line_count(l, inner_w)));
    let visible = area.height.saturating_sub(2);
    let scroll = wrapped_total
        .saturating_sub(visible)
        .saturating_sub(app.scroll_offset);

    let block = Block::default().borders(Borders::ALL).title(" cogito ");
    let para = Paragraph::new(lines)
        .block(block)
        .wrap(Wrap { trim: false })
        .scroll((scroll, 0));
    f.render_widget(para, area);

    // cursor sits on the last wrapped row group, which is the input line
    let cursor_w = INPUT_PREFIX.width() + app.input.text[..app.input.cursor].width();
    let (cursor_row, cursor_col) = if inner_w > 0 {
        (cursor_w / inner_w, cursor_w % inner_w)
    } else {
        (0, 0)
    };
    let input_line = format!("{INPUT_PREFIX}{}", app.input.text);
    let input_first_row = wrapped_total.saturating_sub(greedy_wrap_rows(&input_line, inner_w));
    let vis_row = input_first_row
        .saturating_add(u16::try_from(cursor_row).unwrap_or(u16::MAX))
        .saturating_sub(scroll);

    f.set_cursor_position(Position::new(
        area.x + 1 + cursor_col as u16,
        area.y + 1 + vis_row,
    ));
}

fn centered(area: Rect, width: u16, height: u16) -> Rect {
    let width = width.min(area.width);
    let height = height.min(area.height);
    Rect::new(
        area.x + (area.width - width) / 2,
        area.y + (area.height - height) / 2,
        width,
        height,
    )
}

/// Rows `line` needs at `width` columns, embedded newlines included.
fn wrapped_line_count(line: &Line, width: usize) -> u16 {
    let full: String = line.spans.iter().map(|s| s.content.as_ref()).collect();
    full.split('\n')
        .fold(0u16, |acc, seg| acc.saturating_add(greedy_wrap_rows(seg, width)))
}

/// Char-level greedy wrap; close enough to ratatui's word wrap for scrolling.
fn greedy_wrap_rows(s: &str, width: usize) -> u16 {
    if width == 0 {
        return 1;
    }
    let (rows, _) = s
        .chars()
        .filter_map(unicode_width::UnicodeWidthChar::width)
        .filter(|&w| w > 0)
        .fold((1u16, 0usize), |(rows, col), w| {
            if col + w > width { (rows.saturating_add(1), w) } else { (rows, col + w) }
        });
    rows
}
