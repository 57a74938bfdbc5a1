//! Liveness probe against a peer's `/health` endpoint.
//!
//! A probe is one bounded-timeout `GET <url>/health`. The peer must answer
//! `200` with a JSON body carrying its `instance_name`; anything else is
//! `Unhealthy`. Retrying is left to the polling cadence.

use std::time::Duration;

use bytes::Bytes;
use http_body_util::{BodyExt, Empty, Limited};
use hyper_util::client::legacy::Client;
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::rt::TokioExecutor;
use serde::Deserialize;
use tracing::debug;

/// Largest `/health` body we are willing to read.
const MAX_BODY_BYTES: usize = 64 * 1024;

/// Result of a single liveness probe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProbeOutcome {
    /// Answered correctly; carries the peer's reported instance name.
    Healthy(String),
    /// Transport failure, timeout, non-200, or malformed body.
    Unhealthy,
    /// Answered with our own instance name.
    SelfDetected,
}

#[derive(Debug, Deserialize)]
struct HealthReport {
    instance_name: String,
}

/// Plain-HTTP prober with a fixed per-request timeout. Cheap to clone.
#[derive(Clone)]
pub struct Prober {
    client: Client<HttpConnector, Empty<Bytes>>,
    timeout: Duration,
}

impl Prober {
    pub fn new(timeout: Duration) -> Self {
        let client = Client::builder(TokioExecutor::new()).build_http();
        Self { client, timeout }
    }

    /// Probe `url` and classify the answer against `self_instance_name`.
    pub async fn probe(&self, url: &str, self_instance_name: &str) -> ProbeOutcome {
        match tokio::time::timeout(self.timeout, self.fetch_instance_name(url)).await {
            Ok(Ok(name)) if name == self_instance_name => ProbeOutcome::SelfDetected,
            Ok(Ok(name)) => ProbeOutcome::Healthy(name),
            Ok(Err(reason)) => {
                debug!(%url, %reason, "peer probe failed");
                ProbeOutcome::Unhealthy
            }
            Err(_) => {
                debug!(%url, timeout = ?self.timeout, "peer probe timed out");
                ProbeOutcome::Unhealthy
            }
        }
    }

    async fn fetch_instance_name(&self, url: &str) -> Result<String, String> {
        let uri: http::Uri = format!("{url}/health")
            .parse()
            .map_err(|e| format!("invalid probe URL: {e}"))?;

        let req = http::Request::builder()
            .method(http::Method::GET)
            .uri(uri)
            .header(http::header::USER_AGENT, "beacon-watch/0.1")
            .body(Empty::<Bytes>::new())
            .map_err(|e| e.to_string())?;

        let resp = self.client.request(req).await.map_err(|e| e.to_string())?;
        if resp.status() != http::StatusCode::OK {
            return Err(format!("unexpected status {}", resp.status()));
        }

        let body = Limited::new(resp.into_body(), MAX_BODY_BYTES)
            .collect()
            .await
            .map_err(|e| format!("failed to read body: {e}"))?
            .to_bytes();

        let report: HealthReport =
            serde_json::from_slice(&body).map_err(|e| format!("malformed health body: {e}"))?;
        Ok(report.instance_name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn peer(response: ResponseTemplate) -> MockServer {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/health"))
            .respond_with(response)
            .mount(&server)
            .await;
        server
    }

    fn prober() -> Prober {
        Prober::new(Duration::from_millis(500))
    }

    #[tokio::test]
    async fn healthy_peer_reports_its_name() {
        let server = peer(
            ResponseTemplate::new(200)
                .set_body_json(json!({"instance_name": "beacon-2", "app": "healthy"})),
        )
        .await;

        let outcome = prober().probe(&server.uri(), "beacon-1").await;
        assert_eq!(outcome, ProbeOutcome::Healthy("beacon-2".to_string()));
    }

    #[tokio::test]
    async fn own_name_is_self_detected() {
        let server =
            peer(ResponseTemplate::new(200).set_body_json(json!({"instance_name": "beacon-1"})))
                .await;

        let outcome = prober().probe(&server.uri(), "beacon-1").await;
        assert_eq!(outcome, ProbeOutcome::SelfDetected);
    }

    #[tokio::test]
    async fn non_200_is_unhealthy() {
        let server = peer(ResponseTemplate::new(503)).await;
        assert_eq!(prober().probe(&server.uri(), "beacon-1").await, ProbeOutcome::Unhealthy);
    }

    #[tokio::test]
    async fn other_success_codes_are_unhealthy() {
        let server = peer(ResponseTemplate::new(204)).await;
        assert_eq!(prober().probe(&server.uri(), "beacon-1").await, ProbeOutcome::Unhealthy);
    }

    #[tokio::test]
    async fn malformed_body_is_unhealthy() {
        let server = peer(ResponseTemplate::new(200).set_body_string("ok")).await;
        assert_eq!(prober().probe(&server.uri(), "beacon-1").await, ProbeOutcome::Unhealthy);
    }

    #[tokio::test]
    async fn missing_instance_name_is_unhealthy() {
        let server = peer(ResponseTemplate::new(200).set_body_json(json!({"app": "healthy"}))).await;
        assert_eq!(prober().probe(&server.uri(), "beacon-1").await, ProbeOutcome::Unhealthy);
    }

    #[tokio::test]
    async fn non_string_instance_name_is_unhealthy() {
        let server = peer(ResponseTemplate::new(200).set_body_json(json!({"instance_name": 7}))).await;
        assert_eq!(prober().probe(&server.uri(), "beacon-1").await, ProbeOutcome::Unhealthy);
    }

    #[tokio::test]
    async fn slow_peer_times_out() {
        let server = peer(
            ResponseTemplate::new(200)
                .set_body_json(json!({"instance_name": "beacon-2"}))
                .set_delay(Duration::from_secs(2)),
        )
        .await;

        let prober = Prober::new(Duration::from_millis(100));
        assert_eq!(prober.probe(&server.uri(), "beacon-1").await, ProbeOutcome::Unhealthy);
    }

    #[tokio::test]
    async fn closed_port_is_unhealthy() {
        let outcome = prober().probe("http://127.0.0.1:1", "beacon-1").await;
        assert_eq!(outcome, ProbeOutcome::Unhealthy);
    }

    #[tokio::test]
    async fn unparseable_url_is_unhealthy() {
        let outcome = prober().probe("not a url", "beacon-1").await;
        assert_eq!(outcome, ProbeOutcome::Unhealthy);
    }
}
