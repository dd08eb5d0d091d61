use std::time::Duration;

use tracing::debug;

use super::{AnalysisReport, AnalysisRequest};
use crate::chart::ChartSpec;

pub const DEFAULT_DELAY: Duration = Duration::from_millis(2000);

const NARRATIVE: &str = "根据您的需求，生成以下分析结果：\n\
分析结论：数据呈现明显增长趋势，建议重点关注TOP3产品的库存管理。";

/// Stand-in backend: waits a fixed delay, then always returns the same report.
#[derive(Debug, Clone)]
pub struct MockAnalyst {
    delay: Duration,
}

impl Default for MockAnalyst {
    fn default() -> Self {
        Self::new(DEFAULT_DELAY)
    }
}

impl MockAnalyst {
    pub fn new(delay: Duration) -> Self {
        Self { delay }
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    pub async fn analyze(&self, request: &AnalysisRequest) -> AnalysisReport {
        debug!(query = %request.query, delay_ms = self.delay.as_millis() as u64, "mock analysis");
        tokio::time::sleep(self.delay).await;
        Self::canned_report()
    }

    pub fn canned_report() -> AnalysisReport {
        AnalysisReport {
            narrative: NARRATIVE.to_string(),
            chart: Some(ChartSpec::monthly_trend()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_waits_for_the_delay() {
        let analyst = MockAnalyst::default();
        let started = tokio::time::Instant::now();
        let report = analyst.analyze(&AnalysisRequest::new("销量分析")).await;
        assert!(started.elapsed() >= Duration::from_millis(2000));
        assert!(report.narrative.contains("增长趋势"));
        assert_eq!(report.chart, Some(ChartSpec::monthly_trend()));
    }
}
