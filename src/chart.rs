//! Draws [`ChartSpec`]s with ratatui's chart widgets.
//!
//! Charts are laid out against whatever region they are given on each draw,
//! so a terminal resize simply re-fits them on the next frame.

use insight_core::chart::format_value;
use insight_core::{ChartKind, ChartSpec};
use ratatui::{
    layout::Rect,
    style::{Color, Style},
    symbols,
    text::{Line, Span},
    widgets::{Axis, Bar, BarChart, BarGroup, Block, Chart, Dataset, GraphType, Paragraph},
    Frame,
};
use tracing::debug;

const BAR_GAP: u16 = 1;
const MAX_BAR_WIDTH: u16 = 9;

/// Where a chart ended up on screen
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChartHandle {
    pub area: Rect,
    pub kind: ChartKind,
}

#[derive(Debug, Default)]
pub struct ChartRenderer {
    viewport: Option<(u16, u16)>,
}

impl ChartRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a new terminal size. Returns `true` if mounted charts need a re-fit.
    pub fn refit(&mut self, width: u16, height: u16) -> bool {
        let changed = self.viewport != Some((width, height));
        if changed {
            debug!(width, height, "re-fitting charts to new viewport");
            self.viewport = Some((width, height));
        }
        changed
    }

    /// Draw `spec` into `container`. An absent container is a no-op.
    pub fn render(
        &self,
        frame: &mut Frame,
        container: Option<Rect>,
        spec: &ChartSpec,
        block: Option<Block>,
    ) -> Option<ChartHandle> {
        let area = container?;
        if area.width == 0 || area.height == 0 {
            return None;
        }

        let block = block.unwrap_or_default();
        let color = series_color(spec);

        if spec.is_empty() {
            let empty = Paragraph::new("暂无数据")
                .style(Style::default().fg(Color::DarkGray))
                .block(block);
            frame.render_widget(empty, area);
        } else {
            match spec.kind {
                ChartKind::Bar => render_bars(frame, area, spec, block, color),
                ChartKind::Line => render_line(frame, area, spec, block, color),
            }
        }

        Some(ChartHandle {
            area,
            kind: spec.kind,
        })
    }
}

fn series_color(spec: &ChartSpec) -> Color {
    spec.rgb()
        .map(|(r, g, b)| Color::Rgb(r, g, b))
        .unwrap_or(Color::Blue)
}

/// Widest bar that still lets every category fit in `inner_width` columns
fn bar_width(inner_width: u16, count: usize) -> u16 {
    let count = u16::try_from(count.max(1)).unwrap_or(u16::MAX);
    let per_bar = inner_width.saturating_add(BAR_GAP) / count;
    per_bar.saturating_sub(BAR_GAP).clamp(1, MAX_BAR_WIDTH)
}

fn render_bars(frame: &mut Frame, area: Rect, spec: &ChartSpec, block: Block, color: Color) {
    let inner = block.inner(area);

    let bars: Vec<Bar> = spec
        .points()
        .map(|(label, value)| {
            Bar::default()
                .value(value.max(0.0).round() as u64)
                .text_value(format_value(value))
                .label(Line::from(label.to_string()))
        })
        .collect();

    let chart = BarChart::default()
        .block(block)
        .data(BarGroup::default().bars(&bars))
        .bar_width(bar_width(inner.width, bars.len()))
        .bar_gap(BAR_GAP)
        .bar_style(Style::default().fg(color))
        .value_style(Style::default().fg(Color::White).bg(color))
        .label_style(Style::default().fg(Color::Gray));

    frame.render_widget(chart, area);
}

fn render_line(frame: &mut Frame, area: Rect, spec: &ChartSpec, block: Block, color: Color) {
    let data: Vec<(f64, f64)> = spec
        .points()
        .enumerate()
        .map(|(i, (_, value))| (i as f64, value))
        .collect();

    let (y_lo, y_hi) = y_bounds(spec);
    let x_hi = (data.len().saturating_sub(1) as f64).max(1.0);

    let inner = block.inner(area);
    let x_labels = axis_labels(spec, inner.width);

    let datasets = vec![Dataset::default()
        .marker(symbols::Marker::Braille)
        .graph_type(GraphType::Line)
        .style(Style::default().fg(color))
        .data(&data)];

    let chart = Chart::new(datasets)
        .block(block)
        .x_axis(
            Axis::default()
                .style(Style::default().fg(Color::Gray))
                .bounds([0.0, x_hi])
                .labels(x_labels),
        )
        .y_axis(
            Axis::default()
                .style(Style::default().fg(Color::Gray))
                .bounds([y_lo, y_hi])
                .labels(vec![
                    Span::raw(format_value(y_lo)),
                    Span::raw(format_value(y_hi)),
                ]),
        );

    frame.render_widget(chart, area);
}

/// Y range from zero (or the lowest value) to a little above the highest value
fn y_bounds(spec: &ChartSpec) -> (f64, f64) {
    let (lo, hi) = spec.bounds().unwrap_or((0.0, 1.0));
    let y_lo = lo.min(0.0);
    // Headroom is added, never scaled, so all-negative series keep their maximum
    let y_hi = if hi > y_lo {
        hi + (hi - y_lo).abs() * 0.1
    } else {
        y_lo + 1.0
    };
    (y_lo, y_hi)
}

/// Category labels for the x axis; thinned to first/last when space is tight
fn axis_labels(spec: &ChartSpec, inner_width: u16) -> Vec<Span<'static>> {
    let labels: Vec<&str> = spec.points().map(|(label, _)| label).collect();
    let needed: usize = labels.iter().map(|l| l.chars().count() * 2 + 2).sum();

    if needed <= inner_width as usize || labels.len() <= 2 {
        labels.into_iter().map(|l| Span::raw(l.to_string())).collect()
    } else {
        let first = labels.first().copied().unwrap_or_default();
        let last = labels.last().copied().unwrap_or_default();
        vec![Span::raw(first.to_string()), Span::raw(last.to_string())]
    }
}
