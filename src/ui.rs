use insight_core::{ChartSpec, Entry, MessageId, Role, TaskFilter, TaskStatus};
use ratatui::{
    layout::{Constraint, Layout, Rect},
    style::{Color, Modifier, Style, Stylize},
    text::{Line, Span, Text},
    widgets::{Block, Borders, Clear, Paragraph},
    Frame,
};
use unicode_width::{UnicodeWidthChar, UnicodeWidthStr};

use crate::app::{App, FocusPane, HitAreas};

const SIDEBAR_WIDTH: u16 = 36;
const DASHBOARD_HEIGHT: u16 = 12;
/// Rows reserved for a chart inside the conversation
const CHART_HEIGHT: u16 = 12;
const SEND_BUTTON_WIDTH: u16 = 10;
const RERUN_LABEL: &str = "[↻ 重新运行]";

pub fn render(app: &mut App, frame: &mut Frame) {
    let area = frame.area();
    app.areas = HitAreas::default();

    // Main layout: header, body, footer
    let [header_area, body_area, footer_area] = Layout::vertical([
        Constraint::Length(1),
        Constraint::Min(0),
        Constraint::Length(1),
    ])
    .areas(area);

    render_header(app, frame, header_area);

    let sidebar_width = SIDEBAR_WIDTH.min(body_area.width / 3);
    let [sidebar_area, main_area] =
        Layout::horizontal([Constraint::Length(sidebar_width), Constraint::Min(0)])
            .areas(body_area);

    let [dashboard_area, tasks_area] = Layout::vertical([
        Constraint::Length(DASHBOARD_HEIGHT.min(sidebar_area.height / 2)),
        Constraint::Min(0),
    ])
    .areas(sidebar_area);

    let [chat_area, input_row] =
        Layout::vertical([Constraint::Min(0), Constraint::Length(3)]).areas(main_area);

    render_dashboard(app, frame, dashboard_area);
    render_tasks(app, frame, tasks_area);
    render_conversation(app, frame, chat_area);
    render_input(app, frame, input_row);
    render_footer(app, frame, footer_area);

    if app.chart_popup.is_some() {
        render_chart_popup(app, frame, area);
    }
}

fn render_header(app: &App, frame: &mut Frame, area: Rect) {
    let mut spans = vec![
        Span::styled(" InsightDesk 数据分析助手 ", Style::default().fg(Color::Cyan).bold()),
        Span::styled(
            format!("[{}]", app.backend.describe()),
            Style::default().fg(Color::Gray),
        ),
        Span::raw(" "),
        Span::styled(
            format!("v{}", env!("CARGO_PKG_VERSION")),
            Style::default().fg(Color::Gray),
        ),
    ];

    if let Some(status) = &app.status {
        let color = if status.is_error { Color::LightRed } else { Color::LightGreen };
        spans.push(Span::raw("  "));
        spans.push(Span::styled(status.text.clone(), Style::default().fg(color)));
    }

    let header = Paragraph::new(Line::from(spans)).style(Style::default().bg(Color::DarkGray));
    frame.render_widget(header, area);
}

fn render_footer(app: &App, frame: &mut Frame, area: Rect) {
    let mode_style = match app.focus {
        FocusPane::Input => Style::default().bg(Color::Yellow).fg(Color::Black),
        _ => Style::default().bg(Color::Blue).fg(Color::White),
    };

    let mode_text = match app.focus {
        FocusPane::Input => " INPUT ",
        FocusPane::Conversation => " CHAT ",
        FocusPane::Tasks => " TASKS ",
    };

    // Key style: dark background with bright text for visibility on both light/dark terminals
    let key_style = Style::default().bg(Color::DarkGray).fg(Color::White);
    let label_style = Style::default().bg(Color::Black).fg(Color::White);

    let hint = |key: &str, label: &str| {
        [
            Span::styled(format!(" {} ", key), key_style),
            Span::styled(format!(" {} ", label), label_style),
        ]
    };

    let mut hints: Vec<Span> = Vec::new();
    if app.chart_popup.is_some() {
        hints.extend(hint("t", "switch"));
        hints.extend(hint("s", "download"));
        hints.extend(hint("Esc", "close"));
    } else {
        match app.focus {
            FocusPane::Input => {
                hints.extend(hint("Enter", "send"));
                hints.extend(hint("↑/↓", "scroll"));
            }
            FocusPane::Conversation => {
                hints.extend(hint("j/k", "scroll"));
                hints.extend(hint("e", "expand"));
                hints.extend(hint("t", "switch"));
                hints.extend(hint("s", "download"));
                hints.extend(hint("i", "type"));
            }
            FocusPane::Tasks => {
                hints.extend(hint("j/k", "nav"));
                hints.extend(hint("h/l", "filter"));
                hints.extend(hint("Enter", "re-run"));
            }
        }
        if app.controller.is_pending() {
            hints.extend(hint("Esc", "cancel"));
        }
        if app.controller.log().last_failure().is_some() {
            hints.extend(hint("^R", "retry"));
        }
        hints.extend(hint("Tab", "focus"));
        hints.extend(hint("^C", "quit"));
    }

    let footer_content = Line::from(
        vec![
            Span::styled(mode_text, mode_style),
            Span::styled(" ", label_style),
        ]
        .into_iter()
        .chain(hints)
        .collect::<Vec<_>>(),
    );

    let footer = Paragraph::new(footer_content).style(Style::default().bg(Color::Black));
    frame.render_widget(footer, area);
}

fn render_dashboard(app: &App, frame: &mut Frame, area: Rect) {
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::DarkGray))
        .title(format!(" {} ", app.dashboard_chart.title));
    app.renderer
        .render(frame, Some(area), &app.dashboard_chart, Some(block));
}

fn render_tasks(app: &mut App, frame: &mut Frame, area: Rect) {
    app.areas.tasks = Some(area);

    let focused = app.focus == FocusPane::Tasks;
    let border_color = if focused { Color::Cyan } else { Color::DarkGray };
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(border_color))
        .title(format!(" 任务 ({}) ", app.controller.history().len()));
    let inner = block.inner(area);
    frame.render_widget(block, area);

    if inner.height == 0 || inner.width == 0 {
        return;
    }

    // Filter tabs on the first row
    let current = app.controller.history().filter();
    let mut tab_spans = Vec::new();
    let mut x = inner.x;
    for filter in TaskFilter::all() {
        let label = format!(" {} ", filter.display_name());
        let width = (label.width() as u16).min(inner.right().saturating_sub(x));
        if width > 0 {
            app.areas.filter_tabs.push((Rect::new(x, inner.y, width, 1), filter));
        }
        let style = if filter == current {
            Style::default().bg(Color::Cyan).fg(Color::Black).add_modifier(Modifier::BOLD)
        } else {
            Style::default().fg(Color::Gray)
        };
        x = x.saturating_add(width + 1);
        tab_spans.push(Span::styled(label, style));
        tab_spans.push(Span::raw(" "));
    }
    frame.render_widget(
        Paragraph::new(Line::from(tab_spans)),
        Rect::new(inner.x, inner.y, inner.width, 1),
    );

    let list_area = Rect::new(
        inner.x,
        inner.y + 1,
        inner.width,
        inner.height.saturating_sub(1),
    );
    if list_area.height == 0 {
        return;
    }

    let visible: Vec<_> = app.controller.history().visible().cloned().collect();
    if visible.is_empty() {
        let hint = if app.controller.history().is_empty() {
            "暂无任务"
        } else {
            "没有符合条件的任务"
        };
        frame.render_widget(
            Paragraph::new(Span::styled(hint, Style::default().fg(Color::DarkGray))),
            list_area,
        );
        return;
    }

    // Keep the selection in view, two rows per record
    let capacity = ((list_area.height / 2) as usize).max(1);
    let selected_idx = app.selected_task_index();
    if selected_idx < app.task_scroll {
        app.task_scroll = selected_idx;
    } else if selected_idx >= app.task_scroll + capacity {
        app.task_scroll = selected_idx + 1 - capacity;
    }
    app.task_scroll = app.task_scroll.min(visible.len().saturating_sub(1));

    let width = list_area.width as usize;
    let mut lines: Vec<Line> = Vec::new();
    for (i, record) in visible.iter().enumerate().skip(app.task_scroll).take(capacity) {
        let row_y = list_area.y + (lines.len() as u16);
        let selected = focused && i == selected_idx;

        let (mark, mark_color) = match record.status {
            TaskStatus::Completed => ("✓", Color::Green),
            TaskStatus::Failed => ("✗", Color::Red),
        };
        let title_style = if selected {
            Style::default().bg(Color::Blue).fg(Color::White).add_modifier(Modifier::BOLD)
        } else {
            Style::default()
        };
        lines.push(Line::from(vec![
            Span::styled(format!("{} ", mark), Style::default().fg(mark_color)),
            Span::styled(truncate_to_width(&record.title, width.saturating_sub(2)), title_style),
        ]));

        let time = format!("  {}  ", record.time_label());
        let rerun_x = list_area.x + time.width() as u16;
        let rerun_width = (RERUN_LABEL.width() as u16).min(list_area.right().saturating_sub(rerun_x));
        lines.push(Line::from(vec![
            Span::styled(time, Style::default().fg(Color::DarkGray)),
            Span::styled(RERUN_LABEL, Style::default().fg(Color::Cyan)),
        ]));

        app.areas
            .task_rows
            .push((Rect::new(list_area.x, row_y, list_area.width, 2), record.id));
        if rerun_width > 0 && row_y + 1 < list_area.bottom() {
            app.areas
                .rerun_buttons
                .push((Rect::new(rerun_x, row_y + 1, rerun_width, 1), record.id));
        }
    }

    frame.render_widget(Paragraph::new(Text::from(lines)), list_area);
}

/// One row of the conversation view
enum ChatRow {
    Text(Line<'static>),
    /// A row reserved for chart `slot`
    Chart(usize),
}

struct ChartSlot {
    id: MessageId,
    spec: ChartSpec,
    first_row: usize,
}

fn render_conversation(app: &mut App, frame: &mut Frame, area: Rect) {
    app.areas.chat = Some(area);

    let focused = app.focus == FocusPane::Conversation;
    let border_color = if focused { Color::Cyan } else { Color::DarkGray };
    let title = if app.controller.log().is_pinned() {
        " 对话 ".to_string()
    } else {
        format!(" 对话 (↑{}) ", app.controller.log().scroll_back())
    };
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(border_color))
        .title(title);
    let inner = block.inner(area);
    frame.render_widget(block, area);

    app.chat_page = inner.height;
    if inner.height == 0 || inner.width == 0 {
        return;
    }

    if app.controller.log().is_empty() {
        let hint = Paragraph::new(Span::styled(
            "输入数据分析需求，例如：销量分析",
            Style::default().fg(Color::DarkGray),
        ));
        frame.render_widget(hint, inner);
        return;
    }

    let chart_height = CHART_HEIGHT.min(inner.height) as usize;
    let (rows, slots) = build_chat_rows(app, inner.width as usize, chart_height);

    // Pinned means the last row sits on the bottom edge
    let view_h = inner.height as usize;
    let max_scroll = rows.len().saturating_sub(view_h);
    app.controller
        .log_mut()
        .clamp_scroll(max_scroll.min(u16::MAX as usize) as u16);
    let top = max_scroll - app.controller.log().scroll_back() as usize;
    let bottom = (top + view_h).min(rows.len());

    let mut hinted = vec![false; slots.len()];
    let lines: Vec<Line> = rows[top..bottom]
        .iter()
        .map(|row| match row {
            ChatRow::Text(line) => line.clone(),
            ChatRow::Chart(slot) => {
                // Charts cut off by the viewport are not drawn, leave a marker instead
                let slot_fits = slots[*slot].first_row >= top
                    && slots[*slot].first_row + chart_height <= bottom;
                if slot_fits || hinted[*slot] {
                    Line::default()
                } else {
                    hinted[*slot] = true;
                    Line::from(Span::styled(
                        format!("  ▤ {}（滚动查看完整图表）", slots[*slot].spec.title),
                        Style::default().fg(Color::DarkGray),
                    ))
                }
            }
        })
        .collect();
    frame.render_widget(Paragraph::new(Text::from(lines)), inner);

    for slot in &slots {
        let container = if slot.first_row >= top && slot.first_row + chart_height <= bottom {
            Some(Rect::new(
                inner.x,
                inner.y + (slot.first_row - top) as u16,
                inner.width,
                chart_height as u16,
            ))
        } else {
            None
        };
        let block = Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::DarkGray))
            .title(format!(" {} ", slot.spec.title));
        if let Some(handle) = app.renderer.render(frame, container, &slot.spec, Some(block)) {
            app.areas.charts.push((handle.area, slot.id));
        }
    }
}

fn build_chat_rows(app: &App, width: usize, chart_height: usize) -> (Vec<ChatRow>, Vec<ChartSlot>) {
    let user_style = Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD);
    let ai_style = Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD);

    let mut rows = Vec::new();
    let mut slots = Vec::new();
    let push_text = |rows: &mut Vec<ChatRow>, text: &str, style: Style| {
        for line in wrap_text(text, width) {
            rows.push(ChatRow::Text(Line::from(Span::styled(line, style))));
        }
    };

    for entry in app.controller.log().entries() {
        match entry {
            Entry::Message(msg) => {
                let style = match msg.role {
                    Role::User => user_style,
                    Role::Assistant => ai_style,
                };
                let header = format!("{}:", msg.role.label());
                rows.push(ChatRow::Text(Line::from(Span::styled(header, style))));
                push_text(&mut rows, &msg.text, Style::default());

                if let Some(spec) = &msg.chart {
                    let slot = slots.len();
                    slots.push(ChartSlot {
                        id: msg.id,
                        spec: app.displayed_chart(msg.id, spec),
                        first_row: rows.len(),
                    });
                    rows.extend((0..chart_height).map(|_| ChatRow::Chart(slot)));
                }
            }
            Entry::Pending => {
                rows.push(ChatRow::Text(Line::from(Span::styled("AI:", ai_style))));
                // Animated ellipsis: cycles through ".", "..", "..."
                let dots = ".".repeat((app.animation_frame as usize) + 1);
                rows.push(ChatRow::Text(Line::from(Span::styled(
                    format!("正在分析{}", dots),
                    Style::default().fg(Color::DarkGray).add_modifier(Modifier::ITALIC),
                ))));
            }
            Entry::Failure(notice) => {
                rows.push(ChatRow::Text(Line::from(Span::styled("AI:", ai_style))));
                push_text(
                    &mut rows,
                    &format!("分析失败：{}", notice.reason),
                    Style::default().fg(Color::Red),
                );
                rows.push(ChatRow::Text(Line::from(Span::styled(
                    "按 Ctrl-R 重试",
                    Style::default().fg(Color::DarkGray),
                ))));
            }
        }
        rows.push(ChatRow::Text(Line::default()));
    }

    (rows, slots)
}

fn render_input(app: &mut App, frame: &mut Frame, area: Rect) {
    let [input_area, button_area] =
        Layout::horizontal([Constraint::Min(0), Constraint::Length(SEND_BUTTON_WIDTH)])
            .areas(area);
    app.areas.input = Some(input_area);
    app.areas.send_button = Some(button_area);

    let focused = app.focus == FocusPane::Input;
    let border_color = if focused { Color::Yellow } else { Color::DarkGray };
    let input_block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(border_color))
        .title(" 分析需求 ");

    let inner_width = input_area.width.saturating_sub(2) as usize;
    let input = app.controller.input();
    let (visible_text, cursor_x) = visible_input(input.text(), input.cursor(), inner_width);

    let paragraph = Paragraph::new(visible_text)
        .style(Style::default().fg(Color::Cyan))
        .block(input_block);
    frame.render_widget(paragraph, input_area);

    if focused && app.chart_popup.is_none() {
        frame.set_cursor_position((input_area.x + cursor_x + 1, input_area.y + 1));
    }

    let (label, style) = if app.controller.is_pending() {
        ("分析中", Style::default().fg(Color::DarkGray))
    } else {
        ("发送", Style::default().fg(Color::White).bg(Color::Rgb(0x4F, 0x46, 0xE5)).bold())
    };
    let button = Paragraph::new(Line::from(Span::styled(format!(" {} ", label), style)))
        .centered()
        .block(Block::default().borders(Borders::ALL).border_style(Style::default().fg(Color::DarkGray)));
    frame.render_widget(button, button_area);
}

fn render_chart_popup(app: &App, frame: &mut Frame, area: Rect) {
    let Some(spec) = app.active_displayed_chart() else {
        return;
    };

    // Calculate popup size and position (centered)
    let popup_width = (area.width * 4 / 5).max(20).min(area.width);
    let popup_height = (area.height * 3 / 4).max(8).min(area.height);
    let popup_x = area.x + (area.width.saturating_sub(popup_width)) / 2;
    let popup_y = area.y + (area.height.saturating_sub(popup_height)) / 2;
    let popup_area = Rect::new(popup_x, popup_y, popup_width, popup_height);

    // Clear the area behind the popup
    frame.render_widget(Clear, popup_area);

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Cyan))
        .title(format!(" {} ({}) ", spec.title, spec.kind.as_str()));
    app.renderer.render(frame, Some(popup_area), &spec, Some(block));
}

/// Break `text` into rows no wider than `width` display columns
fn wrap_text(text: &str, width: usize) -> Vec<String> {
    let width = width.max(1);
    let mut out = Vec::new();
    for raw in text.split('\n') {
        let mut line = String::new();
        let mut used = 0;
        for c in raw.chars() {
            let w = c.width().unwrap_or(0);
            if used + w > width && !line.is_empty() {
                out.push(std::mem::take(&mut line));
                used = 0;
            }
            line.push(c);
            used += w;
        }
        out.push(line);
    }
    out
}

fn truncate_to_width(text: &str, width: usize) -> String {
    if text.width() <= width {
        return text.to_string();
    }
    let mut out = String::new();
    let mut used = 0;
    for c in text.chars() {
        let w = c.width().unwrap_or(0);
        if used + w + 1 > width {
            break;
        }
        out.push(c);
        used += w;
    }
    out.push('…');
    out
}

/// Slice of the input that keeps the cursor on screen, and the cursor column
fn visible_input(text: &str, cursor: usize, width: usize) -> (String, u16) {
    if width == 0 {
        return (String::new(), 0);
    }
    let chars: Vec<char> = text.chars().collect();
    let cursor = cursor.min(chars.len());
    let w = |c: &char| c.width().unwrap_or(0);

    // Drop leading chars until the cursor cell fits
    let mut start = 0;
    let mut before: usize = chars[..cursor].iter().map(w).sum();
    while start < cursor && before + 1 > width {
        before -= w(&chars[start]);
        start += 1;
    }

    let mut out = String::new();
    let mut used = 0;
    for c in &chars[start..] {
        let cw = w(c);
        if used + cw > width {
            break;
        }
        out.push(*c);
        used += cw;
    }
    (out, before as u16)
}
