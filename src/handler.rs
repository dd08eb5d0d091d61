use anyhow::Result;
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers, MouseButton, MouseEvent, MouseEventKind};
use insight_core::TaskFilter;
use ratatui::layout::Rect;

use crate::app::{App, FocusPane};
use crate::tui::AppEvent;

const WHEEL_ROWS: u16 = 3;

pub fn handle_event(app: &mut App, event: AppEvent) -> Result<()> {
    match event {
        AppEvent::Key(key) => handle_key(app, key),
        AppEvent::Mouse(mouse) => handle_mouse(app, mouse),
        AppEvent::Resize(w, h) => app.on_resize(w, h),
        AppEvent::Tick => app.tick(),
        AppEvent::Settled { ticket, outcome } => app.settle(ticket, outcome),
    }
    Ok(())
}

fn handle_key(app: &mut App, key: KeyEvent) {
    let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);

    // Global keys that work in any pane
    match key.code {
        KeyCode::Char('c') if ctrl => {
            app.should_quit = true;
            return;
        }
        KeyCode::Char('r') if ctrl => {
            app.retry_last_failure();
            return;
        }
        KeyCode::Esc => {
            if app.chart_popup.is_some() {
                app.chart_popup = None;
            } else if app.controller.is_pending() {
                app.cancel_request();
            } else if app.focus == FocusPane::Input {
                app.focus = FocusPane::Conversation;
            }
            return;
        }
        KeyCode::Tab => {
            app.focus = app.focus.next();
            return;
        }
        _ => {}
    }

    // The popup swallows everything except its own toggles
    if app.chart_popup.is_some() {
        match key.code {
            KeyCode::Char('e') | KeyCode::Char('q') => app.chart_popup = None,
            KeyCode::Char('t') => app.toggle_chart_kind(),
            KeyCode::Char('s') => app.export_chart(),
            _ => {}
        }
        return;
    }

    match app.focus {
        FocusPane::Input => handle_input_key(app, key),
        FocusPane::Conversation => handle_conversation_key(app, key),
        FocusPane::Tasks => handle_tasks_key(app, key),
    }
}

fn handle_input_key(app: &mut App, key: KeyEvent) {
    match key.code {
        // Shift+Enter is not a submit
        KeyCode::Enter if key.modifiers.contains(KeyModifiers::SHIFT) => {}
        KeyCode::Enter => app.submit(),
        KeyCode::Char('s') if key.modifiers.contains(KeyModifiers::CONTROL) => app.submit(),
        KeyCode::Backspace => app.controller.input_mut().backspace(),
        KeyCode::Delete => app.controller.input_mut().delete(),
        KeyCode::Left => app.controller.input_mut().move_left(),
        KeyCode::Right => app.controller.input_mut().move_right(),
        KeyCode::Home => app.controller.input_mut().home(),
        KeyCode::End => app.controller.input_mut().end(),
        KeyCode::Up | KeyCode::PageUp => app.scroll_chat_up(app.half_page()),
        KeyCode::Down | KeyCode::PageDown => app.scroll_chat_down(app.half_page()),
        KeyCode::Char(c) if !key.modifiers.contains(KeyModifiers::CONTROL) => app.controller.input_mut().insert(c),
        _ => {}
    }
}

fn handle_conversation_key(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Char('q') => app.should_quit = true,
        KeyCode::Char('i') | KeyCode::Enter => app.focus = FocusPane::Input,

        // Scrolling
        KeyCode::Char('j') | KeyCode::Down => app.scroll_chat_down(1),
        KeyCode::Char('k') | KeyCode::Up => app.scroll_chat_up(1),
        KeyCode::PageDown => app.scroll_chat_down(app.half_page()),
        KeyCode::PageUp => app.scroll_chat_up(app.half_page()),
        KeyCode::Char('G') | KeyCode::End => app.controller.log_mut().pin_to_bottom(),
        KeyCode::Char('g') | KeyCode::Home => app.scroll_chat_up(u16::MAX),

        // Chart toolbar
        KeyCode::Char('e') => app.toggle_chart_popup(),
        KeyCode::Char('t') => app.toggle_chart_kind(),
        KeyCode::Char('s') => app.export_chart(),
        _ => {}
    }
}

fn handle_tasks_key(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Char('q') => app.should_quit = true,
        KeyCode::Char('i') => app.focus = FocusPane::Input,

        KeyCode::Char('j') | KeyCode::Down => app.task_nav_down(),
        KeyCode::Char('k') | KeyCode::Up => app.task_nav_up(),

        // Filter tabs
        KeyCode::Char('h') | KeyCode::Left => app.cycle_filter(false),
        KeyCode::Char('l') | KeyCode::Right => app.cycle_filter(true),
        KeyCode::Char(c @ '1'..='3') => {
            let idx = c as usize - '1' as usize;
            if let Some(filter) = TaskFilter::all().get(idx) {
                app.set_filter(*filter);
            }
        }

        KeyCode::Enter | KeyCode::Char('r') => app.rerun_selected(),
        _ => {}
    }
}

fn point_in_rect(x: u16, y: u16, rect: Rect) -> bool {
    x >= rect.x && x < rect.x + rect.width && y >= rect.y && y < rect.y + rect.height
}

fn hit(area: Option<Rect>, x: u16, y: u16) -> bool {
    area.map(|r| point_in_rect(x, y, r)).unwrap_or(false)
}

fn handle_mouse(app: &mut App, mouse: MouseEvent) {
    let x = mouse.column;
    let y = mouse.row;

    match mouse.kind {
        MouseEventKind::Down(MouseButton::Left) => handle_click(app, x, y),
        MouseEventKind::ScrollDown => {
            if hit(app.areas.chat, x, y) {
                app.scroll_chat_down(WHEEL_ROWS);
            } else if hit(app.areas.tasks, x, y) {
                app.task_nav_down();
            }
        }
        MouseEventKind::ScrollUp => {
            if hit(app.areas.chat, x, y) {
                app.scroll_chat_up(WHEEL_ROWS);
            } else if hit(app.areas.tasks, x, y) {
                app.task_nav_up();
            }
        }
        _ => {}
    }
}

fn handle_click(app: &mut App, x: u16, y: u16) {
    if app.chart_popup.is_some() {
        app.chart_popup = None;
        return;
    }

    if hit(app.areas.send_button, x, y) {
        app.submit();
        return;
    }

    let tab = app
        .areas
        .filter_tabs
        .iter()
        .find(|(r, _)| point_in_rect(x, y, *r))
        .map(|(_, f)| *f);
    if let Some(filter) = tab {
        app.focus = FocusPane::Tasks;
        app.set_filter(filter);
        return;
    }

    let rerun = app
        .areas
        .rerun_buttons
        .iter()
        .find(|(r, _)| point_in_rect(x, y, *r))
        .map(|(_, id)| *id);
    if let Some(id) = rerun {
        app.rerun(id);
        return;
    }

    let chart = app
        .areas
        .charts
        .iter()
        .find(|(r, _)| point_in_rect(x, y, *r))
        .map(|(_, id)| *id);
    if let Some(id) = chart {
        app.focus = FocusPane::Conversation;
        app.open_chart_popup(id);
        return;
    }

    let row = app
        .areas
        .task_rows
        .iter()
        .find(|(r, _)| point_in_rect(x, y, *r))
        .map(|(_, id)| *id);
    if let Some(id) = row {
        app.focus = FocusPane::Tasks;
        app.select_task(id);
        return;
    }

    if hit(app.areas.input, x, y) {
        app.focus = FocusPane::Input;
    } else if hit(app.areas.chat, x, y) {
        app.focus = FocusPane::Conversation;
    } else if hit(app.areas.tasks, x, y) {
        app.focus = FocusPane::Tasks;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::tests::test_app;
    use crossterm::event::{KeyEventKind, KeyEventState};
    use insight_core::{MockAnalyst, TaskStatus};
    use std::time::Duration;

    fn key(code: KeyCode) -> AppEvent {
        AppEvent::Key(KeyEvent::new(code, KeyModifiers::NONE))
    }

    fn key_with(code: KeyCode, modifiers: KeyModifiers) -> AppEvent {
        AppEvent::Key(KeyEvent {
            code,
            modifiers,
            kind: KeyEventKind::Press,
            state: KeyEventState::NONE,
        })
    }

    fn click(x: u16, y: u16) -> AppEvent {
        AppEvent::Mouse(MouseEvent {
            kind: MouseEventKind::Down(MouseButton::Left),
            column: x,
            row: y,
            modifiers: KeyModifiers::NONE,
        })
    }

    fn type_text(app: &mut App, text: &str) {
        for c in text.chars() {
            handle_event(app, key(KeyCode::Char(c))).unwrap();
        }
    }

    fn settle_completed(app: &mut App, query: &str) {
        app.controller.input_mut().set(query);
        let d = app.controller.submit().unwrap();
        app.controller.settle(d.ticket, Ok(MockAnalyst::canned_report()));
    }

    #[tokio::test]
    async fn test_enter_submits_and_shift_enter_does_not() {
        let (mut app, _rx) = test_app(Duration::from_secs(2));
        type_text(&mut app, "销量分析");
        assert_eq!(app.controller.input().text(), "销量分析");

        handle_event(&mut app, key_with(KeyCode::Enter, KeyModifiers::SHIFT)).unwrap();
        assert!(!app.controller.is_pending());

        handle_event(&mut app, key(KeyCode::Enter)).unwrap();
        assert!(app.controller.is_pending());
        assert_eq!(app.controller.input().text(), "");
        app.shutdown();
    }

    #[tokio::test]
    async fn test_ctrl_s_submits() {
        let (mut app, _rx) = test_app(Duration::from_secs(2));
        type_text(&mut app, "q");
        handle_event(&mut app, key_with(KeyCode::Char('s'), KeyModifiers::CONTROL)).unwrap();
        assert!(app.controller.is_pending());
        app.shutdown();
    }

    #[tokio::test]
    async fn test_escape_cancels_pending_request() {
        let (mut app, _rx) = test_app(Duration::from_secs(2));
        type_text(&mut app, "q");
        handle_event(&mut app, key(KeyCode::Enter)).unwrap();
        handle_event(&mut app, key(KeyCode::Esc)).unwrap();

        assert!(!app.controller.is_pending());
        assert!(app.in_flight.is_none());
        assert_eq!(app.focus, FocusPane::Input);
    }

    #[test]
    fn test_blank_enter_is_ignored() {
        let (mut app, _rx) = test_app(Duration::ZERO);
        type_text(&mut app, "   ");
        handle_event(&mut app, key(KeyCode::Enter)).unwrap();
        assert!(app.controller.log().is_empty());
        assert!(app.in_flight.is_none());
    }

    #[test]
    fn test_focus_cycle_and_quit() {
        let (mut app, _rx) = test_app(Duration::ZERO);
        handle_event(&mut app, key(KeyCode::Tab)).unwrap();
        assert_eq!(app.focus, FocusPane::Conversation);
        handle_event(&mut app, key(KeyCode::Tab)).unwrap();
        assert_eq!(app.focus, FocusPane::Tasks);

        handle_event(&mut app, key(KeyCode::Char('q'))).unwrap();
        assert!(app.should_quit);
    }

    #[test]
    fn test_q_in_input_is_text() {
        let (mut app, _rx) = test_app(Duration::ZERO);
        handle_event(&mut app, key(KeyCode::Char('q'))).unwrap();
        assert!(!app.should_quit);
        assert_eq!(app.controller.input().text(), "q");
    }

    #[test]
    fn test_task_keys_filter_and_rerun() {
        let (mut app, _rx) = test_app(Duration::ZERO);
        settle_completed(&mut app, "销量分析");
        settle_completed(&mut app, "库存");
        app.focus = FocusPane::Tasks;

        handle_event(&mut app, key(KeyCode::Char('3'))).unwrap();
        assert_eq!(app.controller.history().filter(), TaskFilter::Only(TaskStatus::Failed));
        assert_eq!(app.controller.history().visible_count(), 0);

        handle_event(&mut app, key(KeyCode::Char('1'))).unwrap();
        handle_event(&mut app, key(KeyCode::Char('j'))).unwrap();
        handle_event(&mut app, key(KeyCode::Enter)).unwrap();

        // Newest first, so the second row is the older task
        assert_eq!(app.controller.input().text(), "销量分析");
        assert_eq!(app.focus, FocusPane::Input);
        assert!(!app.controller.is_pending());
    }

    #[test]
    fn test_clicks_hit_recorded_areas() {
        let (mut app, _rx) = test_app(Duration::ZERO);
        settle_completed(&mut app, "销量分析");
        let id = app.controller.history().records()[0].id;

        app.areas.filter_tabs = vec![
            (Rect::new(0, 0, 6, 1), TaskFilter::All),
            (Rect::new(7, 0, 8, 1), TaskFilter::Only(TaskStatus::Completed)),
        ];
        app.areas.rerun_buttons = vec![(Rect::new(20, 3, 2, 1), id)];

        handle_event(&mut app, click(9, 0)).unwrap();
        assert_eq!(
            app.controller.history().filter(),
            TaskFilter::Only(TaskStatus::Completed)
        );
        assert_eq!(app.focus, FocusPane::Tasks);

        handle_event(&mut app, click(21, 3)).unwrap();
        assert_eq!(app.controller.input().text(), "销量分析");
        assert_eq!(app.focus, FocusPane::Input);
    }

    #[test]
    fn test_chart_click_opens_popup_and_escape_closes() {
        let (mut app, _rx) = test_app(Duration::ZERO);
        settle_completed(&mut app, "销量分析");
        let (id, _) = app.controller.log().latest_chart().unwrap();
        app.areas.charts = vec![(Rect::new(40, 5, 60, 12), id)];

        handle_event(&mut app, click(50, 10)).unwrap();
        assert_eq!(app.chart_popup, Some(id));
        assert_eq!(app.focus, FocusPane::Conversation);

        // Keys go to the popup while it is open
        handle_event(&mut app, key(KeyCode::Char('t'))).unwrap();
        assert_eq!(app.active_displayed_chart().unwrap().kind, insight_core::ChartKind::Bar);

        handle_event(&mut app, key(KeyCode::Esc)).unwrap();
        assert_eq!(app.chart_popup, None);
        assert_eq!(app.focus, FocusPane::Conversation);
    }

    #[tokio::test]
    async fn test_send_button_click_submits() {
        let (mut app, _rx) = test_app(Duration::from_secs(2));
        app.areas.send_button = Some(Rect::new(50, 20, 8, 3));
        type_text(&mut app, "q");

        handle_event(&mut app, click(52, 21)).unwrap();
        assert!(app.controller.is_pending());
        app.shutdown();
    }

    #[test]
    fn test_point_in_rect_edges() {
        let r = Rect::new(2, 2, 3, 3);
        assert!(point_in_rect(2, 2, r));
        assert!(point_in_rect(4, 4, r));
        assert!(!point_in_rect(5, 4, r));
        assert!(!point_in_rect(1, 2, r));
    }
}
