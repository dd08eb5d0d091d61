//! Declarative chart descriptions
//!
//! A [`ChartSpec`] is a plain value: category labels along the x axis, one
//! numeric series, and the kind of chart to draw. Front ends decide how to
//! turn it into pixels or terminal cells.

use serde::{Deserialize, Serialize};

/// Accent colour used by the built-in charts
pub const ACCENT_COLOR: &str = "#4F46E5";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ChartKind {
    #[default]
    Bar,
    Line,
}

impl ChartKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChartKind::Bar => "bar",
            ChartKind::Line => "line",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "bar" => Some(ChartKind::Bar),
            "line" => Some(ChartKind::Line),
            _ => None,
        }
    }

    pub fn toggled(self) -> Self {
        match self {
            ChartKind::Bar => ChartKind::Line,
            ChartKind::Line => ChartKind::Bar,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChartSpec {
    #[serde(default)]
    pub title: String,
    pub categories: Vec<String>,
    pub series: Vec<f64>,
    #[serde(default)]
    pub kind: ChartKind,
    /// Hex colour hint such as `#4F46E5`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
}

impl ChartSpec {
    pub fn new<C, S>(title: &str, kind: ChartKind, categories: C, series: S) -> Self
    where
        C: IntoIterator,
        C::Item: Into<String>,
        S: IntoIterator<Item = f64>,
    {
        Self {
            title: title.to_string(),
            categories: categories.into_iter().map(Into::into).collect(),
            series: series.into_iter().collect(),
            kind,
            color: Some(ACCENT_COLOR.to_string()),
        }
    }

    /// The dashboard chart shown at start-up: top ten products by sales.
    pub fn sales_top10() -> Self {
        Self::new(
            "销售TOP10",
            ChartKind::Bar,
            ["产品A", "产品B", "产品C", "产品D", "产品E", "产品F", "产品G", "产品H", "产品I", "产品J"],
            [12580.0, 10345.0, 8923.0, 7651.0, 6872.0, 5430.0, 4892.0, 3765.0, 2980.0, 1890.0],
        )
    }

    /// Six-month trend line returned with every canned analysis.
    pub fn monthly_trend() -> Self {
        Self::new(
            "月度趋势",
            ChartKind::Line,
            ["1月", "2月", "3月", "4月", "5月", "6月"],
            [1200.0, 1900.0, 3000.0, 5000.0, 4500.0, 6000.0],
        )
    }

    pub fn with_kind(&self, kind: ChartKind) -> Self {
        Self {
            kind,
            ..self.clone()
        }
    }

    /// Number of plottable points (categories without a value are dropped)
    pub fn len(&self) -> usize {
        self.categories.len().min(self.series.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Category/value pairs, truncated to the shorter of the two sequences
    pub fn points(&self) -> impl Iterator<Item = (&str, f64)> {
        self.categories
            .iter()
            .map(String::as_str)
            .zip(self.series.iter().copied())
    }

    /// `(min, max)` of the series, `None` when there is nothing to plot
    pub fn bounds(&self) -> Option<(f64, f64)> {
        self.points().map(|(_, v)| v).fold(None, |acc, v| match acc {
            None => Some((v, v)),
            Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
        })
    }

    /// Parse the colour hint as an RGB triple
    pub fn rgb(&self) -> Option<(u8, u8, u8)> {
        let hex = self.color.as_deref()?.strip_prefix('#')?;
        if hex.len() != 6 {
            return None;
        }
        let channel = |i: usize| u8::from_str_radix(hex.get(i..i + 2)?, 16).ok();
        Some((channel(0)?, channel(2)?, channel(4)?))
    }
}

/// Format a value with thousands separators, dropping a zero fraction.
pub fn format_value(value: f64) -> String {
    let negative = value < 0.0;
    let rounded = (value.abs() * 100.0).round() / 100.0;
    let whole = rounded.trunc() as u64;
    let frac = ((rounded - rounded.trunc()) * 100.0).round() as u64;

    let digits = whole.to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(c);
    }

    let mut out = String::new();
    if negative && (whole > 0 || frac > 0) {
        out.push('-');
    }
    out.push_str(&grouped);
    if frac > 0 {
        let frac = format!("{:02}", frac);
        out.push('.');
        out.push_str(frac.trim_end_matches('0'));
    }
    out
}
