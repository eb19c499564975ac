//! Readiness probe over the sink's Prometheus metrics.

use async_trait::async_trait;
use regex::Regex;
use reqwest::Client;
use std::sync::LazyLock;
use std::time::Duration;
use tracing::{debug, warn};

use crate::domain::models::{Readiness, SinkConfig};
use crate::domain::ports::ReadinessCheck;

static HEAD_BLOCK_TIME_DRIFT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"head_block_time_drift\{app="substreams_sink"\} ([\d.e+]+)"#).unwrap()
});

/// Seconds behind the chain head, from a Prometheus text exposition.
pub fn parse_drift(metrics: &str) -> Option<f64> {
    HEAD_BLOCK_TIME_DRIFT
        .captures(metrics)
        .and_then(|caps| caps.get(1))
        .and_then(|value| value.as_str().parse().ok())
}

/// Scrapes the sink's metrics endpoint on every check. Holds no state between checks.
#[derive(Debug, Clone)]
pub struct MetricsReadinessProbe {
    http: Client,
    metrics_url: String,
    threshold_secs: f64,
}

impl MetricsReadinessProbe {
    pub fn new(metrics_url: impl Into<String>, threshold_secs: f64) -> Self {
        let http = Client::builder()
            .timeout(Duration::from_secs(5))
            .build()
            .unwrap_or_default();

        Self {
            http,
            metrics_url: metrics_url.into(),
            threshold_secs,
        }
    }

    pub fn from_config(config: &SinkConfig) -> Self {
        Self::new(&config.metrics_url, config.readiness_threshold_secs)
    }

    async fn scrape(&self) -> Result<String, reqwest::Error> {
        self.http
            .get(&self.metrics_url)
            .send()
            .await?
            .error_for_status()?
            .text()
            .await
    }
}

#[async_trait]
impl ReadinessCheck for MetricsReadinessProbe {
    async fn check(&self) -> Readiness {
        let metrics = match self.scrape().await {
            Ok(body) => body,
            Err(e) => {
                warn!(url = %self.metrics_url, error = %e, "failed to scrape sink metrics");
                return Readiness::unknown();
            }
        };

        let drift = parse_drift(&metrics);
        if drift.is_none() {
            debug!(url = %self.metrics_url, "head_block_time_drift not found in metrics");
        }
        Readiness::from_drift(drift, self.threshold_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn metrics_with_drift(drift: &str) -> String {
        format!(
            "# HELP head_block_time_drift Number of seconds away from head block\n\
             # TYPE head_block_time_drift gauge\n\
             head_block_time_drift{{app=\"substreams_sink\"}} {drift}\n\
             head_block_number{{app=\"substreams_sink\"}} 4.5e+07\n"
        )
    }

    #[test]
    fn test_parse_drift() {
        assert_eq!(parse_drift(&metrics_with_drift("50")), Some(50.0));
        assert_eq!(parse_drift(&metrics_with_drift("1.5e+02")), Some(150.0));
        assert_eq!(parse_drift("head_block_time_drift{app=\"other\"} 3"), None);
        assert_eq!(parse_drift(""), None);
    }

    async fn probe_against(body: &str) -> Readiness {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/")
            .with_status(200)
            .with_body(body)
            .create_async()
            .await;

        MetricsReadinessProbe::new(server.url(), 120.0).check().await
    }

    #[tokio::test]
    async fn test_ready_below_threshold() {
        let readiness = probe_against(&metrics_with_drift("50")).await;
        assert_eq!(readiness, Readiness { ready: true, delay: 50.0 });
    }

    #[tokio::test]
    async fn test_not_ready_above_threshold() {
        let readiness = probe_against(&metrics_with_drift("200")).await;
        assert_eq!(readiness, Readiness { ready: false, delay: 200.0 });
    }

    #[tokio::test]
    async fn test_missing_metric() {
        let readiness = probe_against("process_cpu_seconds_total 12\n").await;
        assert_eq!(readiness, Readiness { ready: false, delay: 0.0 });
    }

    #[tokio::test]
    async fn test_unreachable_endpoint() {
        let probe = MetricsReadinessProbe::new("http://127.0.0.1:1", 120.0);
        assert_eq!(probe.check().await, Readiness::unknown());
    }
}
