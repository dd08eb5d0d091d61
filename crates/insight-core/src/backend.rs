use std::time::Duration;

use tracing::{info, warn};

use crate::analysis::{AnalysisError, AnalysisReport, AnalysisRequest, HttpAnalyst, MockAnalyst};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendKind {
    Mock,
    Http,
}

impl BackendKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            BackendKind::Mock => "mock",
            BackendKind::Http => "http",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "mock" => Some(BackendKind::Mock),
            "http" => Some(BackendKind::Http),
            _ => None,
        }
    }

    pub fn all() -> Vec<BackendKind> {
        vec![BackendKind::Mock, BackendKind::Http]
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            BackendKind::Mock => "Mock (canned)",
            BackendKind::Http => "Analysis server",
        }
    }
}

/// The analysis collaborator behind the console
#[derive(Clone)]
pub enum Backend {
    Mock(MockAnalyst),
    Http(HttpAnalyst),
}

impl Backend {
    pub fn kind(&self) -> BackendKind {
        match self {
            Backend::Mock(_) => BackendKind::Mock,
            Backend::Http(_) => BackendKind::Http,
        }
    }

    /// Short description for headers and logs
    pub fn describe(&self) -> String {
        match self {
            Backend::Mock(mock) => format!("mock ({}ms)", mock.delay().as_millis()),
            Backend::Http(http) => http.base_url().to_string(),
        }
    }

    pub async fn analyze(&self, request: &AnalysisRequest) -> Result<AnalysisReport, AnalysisError> {
        match self {
            Backend::Mock(mock) => Ok(mock.analyze(request).await),
            Backend::Http(http) => http.analyze(request).await,
        }
    }

    /// Run [`Backend::analyze`] under a deadline.
    pub async fn analyze_within(
        &self,
        request: &AnalysisRequest,
        limit: Duration,
    ) -> Result<AnalysisReport, AnalysisError> {
        match tokio::time::timeout(limit, self.analyze(request)).await {
            Ok(result) => {
                if let Err(e) = &result {
                    warn!(error = %e, "analysis failed");
                }
                result
            }
            Err(_) => {
                warn!(timeout_secs = limit.as_secs(), "analysis timed out");
                Err(AnalysisError::Timeout(limit))
            }
        }
    }

    pub async fn health(&self) -> Result<String, AnalysisError> {
        match self {
            Backend::Mock(_) => Ok("running".to_string()),
            Backend::Http(http) => {
                let status = http.health().await?;
                info!(%status, "analysis server health");
                Ok(status)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_round_trip() {
        for kind in BackendKind::all() {
            assert_eq!(BackendKind::from_str(kind.as_str()), Some(kind));
        }
        assert_eq!(BackendKind::from_str("HTTP"), Some(BackendKind::Http));
        assert_eq!(BackendKind::from_str("grpc"), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_deadline_turns_slow_mock_into_timeout() {
        let backend = Backend::Mock(MockAnalyst::new(Duration::from_secs(5)));
        let err = backend
            .analyze_within(&AnalysisRequest::new("q"), Duration::from_secs(1))
            .await
            .unwrap_err();
        assert_eq!(err, AnalysisError::Timeout(Duration::from_secs(1)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_mock_within_deadline_succeeds() {
        let backend = Backend::Mock(MockAnalyst::default());
        let report = backend
            .analyze_within(&AnalysisRequest::new("q"), Duration::from_secs(30))
            .await
            .unwrap();
        assert!(report.chart.is_some());
        assert_eq!(backend.health().await.unwrap(), "running");
    }
}
