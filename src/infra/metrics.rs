//! Prometheus 指标：网关请求量与耗时、策略评估、限流、审计失败
//!
//! 通过 `init()` 安装全局 Recorder，通过 HTTP GET `/metrics` 暴露抓取端点。

use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::OnceLock;

static HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

const COUNTER_GATEWAY_REQUESTS: &str = "commgate_gateway_requests_total";
const HISTOGRAM_GATEWAY_DURATION: &str = "commgate_gateway_duration_seconds";
const COUNTER_POLICY_EVALUATIONS: &str = "commgate_policy_evaluations_total";
const COUNTER_RATE_LIMITED: &str = "commgate_rate_limited_total";
const COUNTER_AUDIT_FAILURES: &str = "commgate_audit_failures_total";

/// 安装全局 Recorder。仅需在进程内调用一次；重复调用会返回 Err。
pub fn init() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let handle = metrics_exporter_prometheus::PrometheusBuilder::new().install_recorder()?;
    HANDLE
        .set(handle)
        .map_err(|_| "metrics already initialized")?;
    Ok(())
}

pub fn is_initialized() -> bool {
    HANDLE.get().is_some()
}

/// 渲染当前指标为 Prometheus 文本格式，未初始化时返回 None
pub fn render_metrics() -> Option<String> {
    HANDLE.get().map(|h| h.render())
}

/// 记录一次网关调用：结果计数 + 耗时直方图
pub fn record_gateway_request(channel: &'static str, outcome: &'static str, duration_secs: f64) {
    metrics::counter!(COUNTER_GATEWAY_REQUESTS, "channel" => channel, "outcome" => outcome)
        .increment(1);
    metrics::histogram!(HISTOGRAM_GATEWAY_DURATION, "channel" => channel).record(duration_secs);
}

/// 记录一次策略评估（按生效阶段）
pub fn record_policy_evaluation(stage: &'static str) {
    metrics::counter!(COUNTER_POLICY_EVALUATIONS, "stage" => stage).increment(1);
}

pub fn record_rate_limited(channel: &'static str) {
    metrics::counter!(COUNTER_RATE_LIMITED, "channel" => channel).increment(1);
}

pub fn record_audit_failure() {
    metrics::counter!(COUNTER_AUDIT_FAILURES).increment(1);
}
