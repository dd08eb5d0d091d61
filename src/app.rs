use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use insight_core::{
    AnalysisError, AnalysisReport, Backend, ChartKind, ChartSpec, InFlight, InteractionController,
    MessageId, SettleOutcome, SubmitRejected, TaskFilter, TaskId, Ticket,
};
use ratatui::layout::Rect;
use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, warn};

use crate::chart::ChartRenderer;
use crate::export;
use crate::tui::AppEvent;

/// Ticks a status message stays in the header (300ms each)
const STATUS_TICKS: u8 = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FocusPane {
    Input,
    Conversation,
    Tasks,
}

impl FocusPane {
    pub fn next(self) -> Self {
        match self {
            FocusPane::Input => FocusPane::Conversation,
            FocusPane::Conversation => FocusPane::Tasks,
            FocusPane::Tasks => FocusPane::Input,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusLine {
    pub text: String,
    pub is_error: bool,
    ttl: u8,
}

/// Clickable regions recorded during the last render
#[derive(Debug, Default)]
pub struct HitAreas {
    pub chat: Option<Rect>,
    pub tasks: Option<Rect>,
    pub input: Option<Rect>,
    pub send_button: Option<Rect>,
    pub filter_tabs: Vec<(Rect, TaskFilter)>,
    pub task_rows: Vec<(Rect, TaskId)>,
    pub rerun_buttons: Vec<(Rect, TaskId)>,
    /// Charts mounted in the conversation
    pub charts: Vec<(Rect, MessageId)>,
}

pub struct App {
    // Core state
    pub should_quit: bool,
    pub focus: FocusPane,
    pub controller: InteractionController,

    // Request plumbing
    pub backend: Backend,
    pub request_timeout: Duration,
    pub in_flight: Option<InFlight>,
    events: UnboundedSender<AppEvent>,

    // Charts
    pub renderer: ChartRenderer,
    pub dashboard_chart: ChartSpec,
    /// Kind switches chosen by the user; messages themselves never change
    pub chart_overrides: HashMap<MessageId, ChartKind>,
    /// Message whose chart is shown expanded
    pub chart_popup: Option<MessageId>,
    pub export_dir: PathBuf,

    // Task list selection; the row index is derived from the visible records
    pub selected_task: Option<TaskId>,
    pub task_scroll: usize,

    // View state
    pub animation_frame: u8,
    pub status: Option<StatusLine>,
    /// Inner height of the conversation pane, for paging
    pub chat_page: u16,
    pub areas: HitAreas,
}

impl App {
    pub fn new(
        backend: Backend,
        request_timeout: Duration,
        events: UnboundedSender<AppEvent>,
        export_dir: PathBuf,
    ) -> Self {
        Self {
            should_quit: false,
            focus: FocusPane::Input,
            controller: InteractionController::new(),

            backend,
            request_timeout,
            in_flight: None,
            events,

            renderer: ChartRenderer::new(),
            dashboard_chart: ChartSpec::sales_top10(),
            chart_overrides: HashMap::new(),
            chart_popup: None,
            export_dir,

            selected_task: None,
            task_scroll: 0,

            animation_frame: 0,
            status: None,
            chat_page: 0,
            areas: HitAreas::default(),
        }
    }

    // Request cycle

    pub fn submit(&mut self) {
        let result = self.controller.submit();
        self.handle_submit_result(result);
    }

    pub fn retry_last_failure(&mut self) {
        let result = self.controller.retry_last_failure();
        self.handle_submit_result(result);
    }

    fn handle_submit_result(&mut self, result: Result<insight_core::Dispatch, SubmitRejected>) {
        match result {
            Ok(dispatch) => {
                let tx = self.events.clone();
                self.in_flight = Some(InFlight::spawn(
                    self.backend.clone(),
                    dispatch,
                    self.request_timeout,
                    move |ticket, outcome| {
                        let _ = tx.send(AppEvent::Settled { ticket, outcome });
                    },
                ));
            }
            Err(SubmitRejected::Busy) => {
                self.set_status("分析进行中，请稍候（Esc 取消）", false);
            }
            Err(SubmitRejected::EmptyInput) => {}
        }
    }

    pub fn settle(&mut self, ticket: Ticket, outcome: Result<AnalysisReport, AnalysisError>) {
        match self.controller.settle(ticket, outcome) {
            SettleOutcome::Completed(_) => {
                self.in_flight = None;
            }
            SettleOutcome::Failed(_) => {
                self.in_flight = None;
                self.set_status("分析失败，按 Ctrl-R 重试", true);
            }
            SettleOutcome::Stale => {}
        }
    }

    pub fn cancel_request(&mut self) {
        if let Some(ticket) = self.controller.cancel() {
            if let Some(in_flight) = self.in_flight.take() {
                debug_assert_eq!(in_flight.ticket(), ticket);
                in_flight.abort();
            }
            self.set_status("已取消分析", false);
        }
    }

    /// Abort anything still running before the UI goes away
    pub fn shutdown(&mut self) {
        if let Some(in_flight) = self.in_flight.take() {
            in_flight.abort();
        }
    }

    // Task history

    pub fn visible_task_ids(&self) -> Vec<TaskId> {
        self.controller.history().visible().map(|r| r.id).collect()
    }

    pub fn set_filter(&mut self, filter: TaskFilter) {
        self.controller.set_filter(filter);
        self.selected_task = None;
        self.task_scroll = 0;
    }

    pub fn cycle_filter(&mut self, forward: bool) {
        let filters = TaskFilter::all();
        let current = self.controller.history().filter();
        let idx = filters.iter().position(|f| *f == current).unwrap_or(0);
        let next = if forward {
            (idx + 1) % filters.len()
        } else {
            (idx + filters.len() - 1) % filters.len()
        };
        self.set_filter(filters[next]);
    }

    /// Row of the selected record among the visible ones. Falls back to the
    /// first row when nothing visible is selected.
    pub fn selected_task_index(&self) -> usize {
        self.selected_task
            .and_then(|id| self.visible_task_ids().iter().position(|t| *t == id))
            .unwrap_or(0)
    }

    pub fn task_nav_down(&mut self) {
        let ids = self.visible_task_ids();
        if !ids.is_empty() {
            let idx = (self.selected_task_index() + 1).min(ids.len() - 1);
            self.selected_task = Some(ids[idx]);
        }
    }

    pub fn task_nav_up(&mut self) {
        let ids = self.visible_task_ids();
        if !ids.is_empty() {
            let idx = self.selected_task_index().saturating_sub(1);
            self.selected_task = Some(ids[idx]);
        }
    }

    pub fn selected_task_id(&self) -> Option<TaskId> {
        self.visible_task_ids().get(self.selected_task_index()).copied()
    }

    pub fn select_task(&mut self, id: TaskId) {
        if self.visible_task_ids().contains(&id) {
            self.selected_task = Some(id);
        }
    }

    /// Copy the task's title into the input and focus it. Nothing is submitted.
    pub fn rerun(&mut self, id: TaskId) {
        if self.controller.rerun(id) {
            self.select_task(id);
            self.focus = FocusPane::Input;
        }
    }

    pub fn rerun_selected(&mut self) {
        if let Some(id) = self.selected_task_id() {
            self.rerun(id);
        }
    }

    // Chart actions

    /// The chart of `id` as currently displayed, with any kind switch applied
    pub fn displayed_chart(&self, id: MessageId, spec: &ChartSpec) -> ChartSpec {
        match self.chart_overrides.get(&id) {
            Some(kind) => spec.with_kind(*kind),
            None => spec.clone(),
        }
    }

    /// The expanded chart if the popup is open, otherwise the newest one
    fn active_chart(&self) -> Option<(MessageId, &ChartSpec)> {
        let log = self.controller.log();
        match self.chart_popup {
            Some(id) => log.get(id).and_then(|m| m.chart.as_ref()).map(|c| (id, c)),
            None => log.latest_chart(),
        }
    }

    pub fn active_displayed_chart(&self) -> Option<ChartSpec> {
        self.active_chart()
            .map(|(id, spec)| self.displayed_chart(id, spec))
    }

    pub fn toggle_chart_kind(&mut self) {
        let Some((id, spec)) = self.active_chart() else {
            return;
        };
        let current = self.chart_overrides.get(&id).copied().unwrap_or(spec.kind);
        self.chart_overrides.insert(id, current.toggled());
        debug!(message = id.0, kind = current.toggled().as_str(), "chart kind switched");
    }

    pub fn toggle_chart_popup(&mut self) {
        self.chart_popup = match self.chart_popup {
            Some(_) => None,
            None => self.controller.log().latest_chart().map(|(id, _)| id),
        };
    }

    pub fn open_chart_popup(&mut self, id: MessageId) {
        if self.controller.log().get(id).is_some_and(|m| m.has_chart()) {
            self.chart_popup = Some(id);
        }
    }

    pub fn export_chart(&mut self) {
        let Some(spec) = self.active_displayed_chart() else {
            self.set_status("没有可下载的图表", true);
            return;
        };
        match export::export_chart(&spec, &self.export_dir) {
            Ok(path) => self.set_status(&format!("图表已保存：{}", path.display()), false),
            Err(e) => {
                warn!(error = %e, "chart export failed");
                self.set_status(&format!("保存失败：{}", e), true);
            }
        }
    }

    // Conversation scrolling

    pub fn scroll_chat_up(&mut self, rows: u16) {
        self.controller.log_mut().scroll_up(rows);
    }

    pub fn scroll_chat_down(&mut self, rows: u16) {
        self.controller.log_mut().scroll_down(rows);
    }

    pub fn half_page(&self) -> u16 {
        (self.chat_page / 2).max(1)
    }

    // Misc

    pub fn set_status(&mut self, text: &str, is_error: bool) {
        self.status = Some(StatusLine {
            text: text.to_string(),
            is_error,
            ttl: STATUS_TICKS,
        });
    }

    /// Tick animation frame and expire the status line (called by Tick event)
    pub fn tick(&mut self) {
        if self.controller.is_pending() {
            self.animation_frame = (self.animation_frame + 1) % 3;
        }
        if let Some(status) = &mut self.status {
            status.ttl = status.ttl.saturating_sub(1);
            if status.ttl == 0 {
                self.status = None;
            }
        }
    }

    pub fn on_resize(&mut self, width: u16, height: u16) {
        if self.renderer.refit(width, height) {
            debug!(width, height, "terminal resized");
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use insight_core::{Entry, MockAnalyst, Phase, Role, TaskStatus};
    use tokio::sync::mpsc;

    pub(crate) fn test_app(delay: Duration) -> (App, mpsc::UnboundedReceiver<AppEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let dir = std::env::temp_dir().join("insight-desk-tests");
        let app = App::new(
            Backend::Mock(MockAnalyst::new(delay)),
            Duration::from_secs(30),
            tx,
            dir,
        );
        (app, rx)
    }

    async fn next_settled(rx: &mut mpsc::UnboundedReceiver<AppEvent>) -> (Ticket, Result<AnalysisReport, AnalysisError>) {
        match rx.recv().await {
            Some(AppEvent::Settled { ticket, outcome }) => (ticket, outcome),
            other => panic!("expected settled event, got {:?}", other),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_submit_round_trip_through_event_channel() {
        let (mut app, mut rx) = test_app(Duration::from_millis(2000));
        app.controller.input_mut().set("销量分析");
        app.submit();

        assert!(app.in_flight.is_some());
        assert!(app.controller.log().has_pending());

        let (ticket, outcome) = next_settled(&mut rx).await;
        app.settle(ticket, outcome);

        assert!(app.in_flight.is_none());
        assert!(!app.controller.log().has_pending());
        assert_eq!(app.controller.phase(), &Phase::Idle);
        let last = app.controller.log().entries().last().unwrap();
        match last {
            Entry::Message(msg) => {
                assert_eq!(msg.role, Role::Assistant);
                assert_eq!(msg.chart.as_ref().map(|c| c.len()), Some(6));
            }
            other => panic!("unexpected entry {:?}", other),
        }
        let newest = &app.controller.history().records()[0];
        assert_eq!(newest.title, "销量分析");
        assert_eq!(newest.status, TaskStatus::Completed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_busy_submit_sets_status() {
        let (mut app, _rx) = test_app(Duration::from_millis(2000));
        app.controller.input_mut().set("one");
        app.submit();
        app.controller.input_mut().set("two");
        app.submit();

        assert_eq!(app.controller.log().messages().count(), 1);
        assert!(app.status.as_ref().unwrap().text.contains("分析进行中"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_aborts_and_ignores_late_result() {
        let (mut app, mut rx) = test_app(Duration::from_millis(2000));
        app.controller.input_mut().set("q");
        app.submit();
        app.cancel_request();

        assert!(app.in_flight.is_none());
        assert!(!app.controller.is_pending());

        tokio::time::sleep(Duration::from_secs(5)).await;
        assert!(rx.try_recv().is_err());
        assert!(app.controller.history().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_records_failed_task() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut app = App::new(
            Backend::Mock(MockAnalyst::new(Duration::from_secs(60))),
            Duration::from_secs(2),
            tx,
            std::env::temp_dir(),
        );
        app.controller.input_mut().set("慢查询");
        app.submit();

        let (ticket, outcome) = next_settled(&mut rx).await;
        assert!(matches!(outcome, Err(AnalysisError::Timeout(_))));
        app.settle(ticket, outcome);

        assert_eq!(app.controller.history().records()[0].status, TaskStatus::Failed);
        assert!(app.status.as_ref().unwrap().is_error);

        app.retry_last_failure();
        assert!(app.controller.is_pending());
        assert!(app.in_flight.is_some());
    }

    #[test]
    fn test_rerun_prefills_and_focuses_input() {
        let (mut app, _rx) = test_app(Duration::ZERO);
        let d = {
            app.controller.input_mut().set("销量分析");
            app.controller.submit().unwrap()
        };
        app.controller.settle(d.ticket, Ok(MockAnalyst::canned_report()));
        app.focus = FocusPane::Tasks;

        app.rerun_selected();
        assert_eq!(app.controller.input().text(), "销量分析");
        assert_eq!(app.focus, FocusPane::Input);
        assert!(!app.controller.is_pending());
        assert_eq!(app.controller.history().len(), 1);
    }

    fn settle_query(app: &mut App, query: &str) {
        app.controller.input_mut().set(query);
        let d = app.controller.submit().unwrap();
        app.controller.settle(d.ticket, Ok(MockAnalyst::canned_report()));
    }

    #[test]
    fn test_selection_follows_record_when_new_task_lands() {
        let (mut app, _rx) = test_app(Duration::ZERO);
        settle_query(&mut app, "older");
        settle_query(&mut app, "newer");

        app.task_nav_down();
        assert_eq!(app.selected_task_index(), 1);

        // A new record is prepended above the selection
        app.controller.input_mut().set("newest");
        let d = app.controller.submit().unwrap();
        app.settle(d.ticket, Ok(MockAnalyst::canned_report()));
        assert_eq!(app.selected_task_index(), 2);

        app.rerun_selected();
        assert_eq!(app.controller.input().text(), "older");
    }

    #[test]
    fn test_task_nav_stays_in_bounds() {
        let (mut app, _rx) = test_app(Duration::ZERO);
        app.task_nav_down();
        assert_eq!(app.selected_task, None);

        settle_query(&mut app, "a");
        settle_query(&mut app, "b");
        app.task_nav_up();
        assert_eq!(app.selected_task_index(), 0);
        app.task_nav_down();
        app.task_nav_down();
        assert_eq!(app.selected_task_index(), 1);
        assert_eq!(app.selected_task_id(), Some(app.controller.history().records()[1].id));
    }

    #[test]
    fn test_filter_cycle_and_selection_reset() {
        let (mut app, _rx) = test_app(Duration::ZERO);
        app.selected_task = Some(TaskId(3));
        app.cycle_filter(true);
        assert_eq!(app.controller.history().filter(), TaskFilter::Only(TaskStatus::Completed));
        assert_eq!(app.selected_task, None);
        assert_eq!(app.selected_task_index(), 0);
        app.cycle_filter(false);
        app.cycle_filter(false);
        assert_eq!(app.controller.history().filter(), TaskFilter::Only(TaskStatus::Failed));
    }

    #[test]
    fn test_chart_kind_switch_is_a_view_override() {
        let (mut app, _rx) = test_app(Duration::ZERO);
        app.controller.input_mut().set("q");
        let d = app.controller.submit().unwrap();
        app.controller.settle(d.ticket, Ok(MockAnalyst::canned_report()));

        app.toggle_chart_kind();
        assert_eq!(app.active_displayed_chart().unwrap().kind, ChartKind::Bar);
        let (_, stored) = app.controller.log().latest_chart().unwrap();
        assert_eq!(stored.kind, ChartKind::Line);

        app.toggle_chart_kind();
        assert_eq!(app.active_displayed_chart().unwrap().kind, ChartKind::Line);
    }

    #[test]
    fn test_chart_popup_requires_a_chart() {
        let (mut app, _rx) = test_app(Duration::ZERO);
        app.toggle_chart_popup();
        assert_eq!(app.chart_popup, None);
        app.open_chart_popup(MessageId(0));
        assert_eq!(app.chart_popup, None);
        app.export_chart();
        assert!(app.status.as_ref().unwrap().is_error);
    }

    #[test]
    fn test_export_latest_chart_to_dir() {
        let dir = tempfile::tempdir().unwrap();
        let (mut app, _rx) = test_app(Duration::ZERO);
        app.export_dir = dir.path().to_path_buf();
        app.controller.input_mut().set("q");
        let d = app.controller.submit().unwrap();
        app.controller.settle(d.ticket, Ok(MockAnalyst::canned_report()));

        app.export_chart();
        let status = app.status.clone().unwrap();
        assert!(!status.is_error, "{}", status.text);
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[test]
    fn test_status_expires_after_ticks() {
        let (mut app, _rx) = test_app(Duration::ZERO);
        app.set_status("hello", false);
        for _ in 0..STATUS_TICKS - 1 {
            app.tick();
        }
        assert!(app.status.is_some());
        app.tick();
        assert!(app.status.is_none());
    }
}
