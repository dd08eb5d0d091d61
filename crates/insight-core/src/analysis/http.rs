use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::{AnalysisError, AnalysisReport, AnalysisRequest};
use crate::chart::ChartSpec;

const TOOL_TYPE: &str = "Python";

#[derive(Serialize)]
struct AnalyzeRequest<'a> {
    requirement: &'a str,
    tool_type: &'a str,
    user_id: &'a str,
    execute_code: bool,
}

/// `{code, msg, data}` wrapper used by every server endpoint
#[derive(Debug, Deserialize)]
struct Envelope<T> {
    code: i64,
    #[serde(default)]
    msg: String,
    data: Option<T>,
}

#[derive(Debug, Default, Deserialize)]
struct AnalyzeData {
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    execution: Option<Execution>,
    #[serde(default)]
    chart: Option<ChartSpec>,
}

#[derive(Debug, Default, Deserialize)]
struct Execution {
    #[serde(default)]
    success: bool,
    #[serde(default)]
    output: String,
    #[serde(default)]
    error: String,
    /// PNG file names, served under `/api/code/charts/`
    #[serde(default)]
    charts: Vec<String>,
    /// CSV files the generated code wrote
    #[serde(default)]
    data_files: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct HealthData {
    #[serde(default)]
    status: String,
}

/// Client for the analysis server's `/api/v1/data` endpoints
#[derive(Clone)]
pub struct HttpAnalyst {
    client: Client,
    base_url: String,
    user_id: String,
}

impl HttpAnalyst {
    pub fn new(base_url: &str, user_id: &str) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            user_id: user_id.to_string(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub async fn analyze(&self, request: &AnalysisRequest) -> Result<AnalysisReport, AnalysisError> {
        let url = format!("{}/api/v1/data/analyze", self.base_url);

        let body = AnalyzeRequest {
            requirement: &request.query,
            tool_type: TOOL_TYPE,
            user_id: &self.user_id,
            execute_code: true,
        };

        debug!(%url, "posting analysis request");
        let response = self.client.post(&url).json(&body).send().await?;

        let status = response.status();
        let text = response.text().await?;
        let envelope: Envelope<AnalyzeData> = serde_json::from_str(&text).map_err(|e| {
            warn!(%status, "undecodable analysis response");
            AnalysisError::Decode(e.to_string())
        })?;

        report_from_envelope(envelope, &self.base_url)
    }

    /// Returns the server's reported status string
    pub async fn health(&self) -> Result<String, AnalysisError> {
        let url = format!("{}/api/v1/data/health", self.base_url);

        let response = self.client.get(&url).send().await?;
        let envelope: Envelope<HealthData> = response.json().await?;

        if envelope.code != 200 {
            return Err(AnalysisError::Rejected {
                code: envelope.code,
                msg: envelope.msg,
            });
        }

        Ok(envelope
            .data
            .map(|d| d.status)
            .filter(|s| !s.is_empty())
            .unwrap_or(envelope.msg))
    }
}

fn report_from_envelope(
    envelope: Envelope<AnalyzeData>,
    base_url: &str,
) -> Result<AnalysisReport, AnalysisError> {
    if envelope.code != 200 {
        return Err(AnalysisError::Rejected {
            code: envelope.code,
            msg: envelope.msg,
        });
    }

    let data = envelope.data.unwrap_or_default();
    let mut narrative = envelope.msg;

    if let Some(exec) = &data.execution {
        if exec.success && !exec.output.is_empty() {
            narrative.push_str("\n执行结果：\n");
            narrative.push_str(exec.output.trim_end());
        }
        if !exec.error.is_empty() {
            narrative.push_str("\n执行错误：");
            narrative.push_str(exec.error.trim_end());
        }
        if !exec.charts.is_empty() {
            narrative.push_str("\n生成图表：");
            for name in &exec.charts {
                narrative.push_str(&format!("\n{}/api/code/charts/{}", base_url, name));
            }
        }
        if !exec.data_files.is_empty() {
            narrative.push_str("\n数据文件：");
            for name in &exec.data_files {
                narrative.push('\n');
                narrative.push_str(name);
            }
        }
    }

    if let Some(code) = data.code.as_deref().filter(|c| !c.trim().is_empty()) {
        narrative.push_str("\n生成代码：\n");
        narrative.push_str(code.trim_end());
    }

    Ok(AnalysisReport {
        narrative,
        chart: data.chart,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chart::ChartKind;
    use pretty_assertions::assert_eq;

    fn decode(json: &str) -> Result<AnalysisReport, AnalysisError> {
        let envelope: Envelope<AnalyzeData> = serde_json::from_str(json).unwrap();
        report_from_envelope(envelope, "http://localhost:5001")
    }

    #[test]
    fn test_health_envelope_ignores_service_name() {
        let envelope: Envelope<HealthData> = serde_json::from_str(
            r#"{"code": 200, "msg": "ok", "data": {"service": "data-analysis", "status": "healthy"}}"#,
        )
        .unwrap();
        assert_eq!(envelope.data.unwrap().status, "healthy");
    }

    #[test]
    fn test_executor_files_are_listed() {
        let report = decode(
            r#"{
                "code": 200,
                "msg": "代码生成成功并执行完成",
                "data": {
                    "requirement": "按月统计销量并画折线图",
                    "code": "df.plot()\n",
                    "execution": {
                        "success": true,
                        "output": "代码执行成功，无输出",
                        "error": "",
                        "charts": ["sales_trend.png", "top10.png"],
                        "data_files": ["monthly.csv"]
                    }
                }
            }"#,
        )
        .unwrap();

        assert_eq!(
            report.narrative,
            "代码生成成功并执行完成\n执行结果：\n代码执行成功，无输出\n生成图表：\n\
             http://localhost:5001/api/code/charts/sales_trend.png\n\
             http://localhost:5001/api/code/charts/top10.png\n\
             数据文件：\nmonthly.csv\n生成代码：\ndf.plot()"
        );
        assert!(report.chart.is_none());
    }

    #[test]
    fn test_report_with_execution_and_chart() {
        let report = decode(
            r#"{
                "code": 200,
                "msg": "代码生成成功并执行完成",
                "data": {
                    "requirement": "求平均值",
                    "code": "print(3)\n",
                    "execution": {"success": true, "output": "3\n", "error": ""},
                    "chart": {"categories": ["a", "b"], "series": [1, 2], "kind": "line"}
                }
            }"#,
        )
        .unwrap();

        assert_eq!(
            report.narrative,
            "代码生成成功并执行完成\n执行结果：\n3\n生成代码：\nprint(3)"
        );
        let chart = report.chart.unwrap();
        assert_eq!(chart.kind, ChartKind::Line);
        assert_eq!(chart.series, vec![1.0, 2.0]);
    }

    #[test]
    fn test_unexecuted_report_has_no_chart() {
        let report = decode(
            r#"{"code": 200, "msg": "代码生成成功", "data": {"code": "", "execution": {"msg": "未执行代码"}}}"#,
        )
        .unwrap();
        assert_eq!(report.narrative, "代码生成成功");
        assert!(report.chart.is_none());
    }

    #[test]
    fn test_execution_error_is_reported() {
        let report = decode(
            r#"{"code": 200, "msg": "ok", "data": {"execution": {"success": false, "output": "", "error": "代码执行超时（>30秒）"}}}"#,
        )
        .unwrap();
        assert!(report.narrative.ends_with("执行错误：代码执行超时（>30秒）"));
    }

    #[test]
    fn test_non_200_is_rejected() {
        let err = decode(r#"{"code": 400, "msg": "缺少分析需求（requirement）", "data": {}}"#).unwrap_err();
        assert_eq!(
            err,
            AnalysisError::Rejected {
                code: 400,
                msg: "缺少分析需求（requirement）".to_string()
            }
        );
    }

    #[test]
    fn test_base_url_trailing_slash() {
        let analyst = HttpAnalyst::new("http://localhost:5001/", "u");
        assert_eq!(analyst.base_url(), "http://localhost:5001");
    }

    #[tokio::test]
    async fn test_unreachable_server_is_a_network_error() {
        // Port 9 (discard) is not expected to run an HTTP server
        let analyst = HttpAnalyst::new("http://127.0.0.1:9", "u");
        let err = analyst.analyze(&AnalysisRequest::new("q")).await.unwrap_err();
        assert!(matches!(err, AnalysisError::Network(_)));
    }
}
