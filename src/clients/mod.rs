pub mod contexts;

use std::time::Duration;

use base64::Engine as _;
use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;

use crate::error::CollectError;
use crate::models::k8s::{EventList, PodList};
use contexts::ClusterTarget;

/// Authenticated client for one cluster context. Token and CA material are
/// read at construction, so building a fresh client per scan picks up
/// rotated credentials without any refresh logic of its own.
#[derive(Debug)]
pub struct ClusterClient {
    server: String,
    http: Client,
    token: Option<String>,
    timeout_secs: u64,
}

impl ClusterClient {
    pub fn connect(target: &ClusterTarget, timeout: Duration) -> Result<Self, CollectError> {
        let mut builder = Client::builder().timeout(timeout);
        if target.insecure_skip_tls_verify {
            builder = builder.danger_accept_invalid_certs(true);
        }
        if let Some(pem) = read_ca(target)? {
            let cert = reqwest::Certificate::from_pem(&pem)
                .map_err(|e| CollectError::Auth(format!("invalid CA certificate: {e}")))?;
            builder = builder.add_root_certificate(cert);
        }
        let http = builder
            .build()
            .map_err(|e| CollectError::Auth(format!("building HTTP client: {e}")))?;

        Ok(Self {
            server: target.server.trim_end_matches('/').to_string(),
            http,
            token: read_token(target)?,
            timeout_secs: timeout.as_secs(),
        })
    }

    /// List pods across all namespaces, bounded by the client timeout.
    pub async fn list_all_pods(&self) -> Result<PodList, CollectError> {
        self.get_json(self.get("/api/v1/pods")).await
    }

    /// Events for one pod, looked up on demand outside the scan cycle.
    pub async fn list_pod_events(&self, ns: &str, pod: &str) -> Result<EventList, CollectError> {
        let req = self
            .get(&format!("/api/v1/namespaces/{ns}/events"))
            .query(&[("fieldSelector", format!("involvedObject.name={pod}"))]);
        self.get_json(req).await
    }

    fn get(&self, path: &str) -> RequestBuilder {
        let mut req = self
            .http
            .get(format!("{}{}", self.server, path))
            .header("Accept", "application/json");
        if let Some(token) = &self.token {
            req = req.bearer_auth(token);
        }
        req
    }

    async fn get_json<T: DeserializeOwned>(&self, req: RequestBuilder) -> Result<T, CollectError> {
        let resp = req.send().await.map_err(|e| self.transport_error(e))?;
        let status = resp.status();
        if status.as_u16() >= 400 {
            let body = resp.text().await.unwrap_or_default();
            return Err(CollectError::Api {
                status: status.as_u16(),
                body,
            });
        }
        resp.json().await.map_err(|e| self.transport_error(e))
    }

    fn transport_error(&self, e: reqwest::Error) -> CollectError {
        if e.is_timeout() {
            CollectError::Timeout(self.timeout_secs)
        } else {
            CollectError::Connectivity(e.to_string())
        }
    }
}

fn read_token(target: &ClusterTarget) -> Result<Option<String>, CollectError> {
    if let Some(token) = &target.token {
        return Ok(Some(token.clone()));
    }
    match &target.token_path {
        Some(path) => std::fs::read_to_string(path)
            .map(|t| Some(t.trim().to_string()))
            .map_err(|e| CollectError::Auth(format!("reading token {path}: {e}"))),
        None => Ok(None),
    }
}

fn read_ca(target: &ClusterTarget) -> Result<Option<Vec<u8>>, CollectError> {
    if let Some(data) = &target.ca_cert_data {
        let pem = base64::engine::general_purpose::STANDARD
            .decode(data.trim())
            .map_err(|e| CollectError::Auth(format!("decoding CA certificate data: {e}")))?;
        return Ok(Some(pem));
    }
    match &target.ca_cert_path {
        Some(path) => std::fs::read(path)
            .map(Some)
            .map_err(|e| CollectError::Auth(format!("reading CA certificate {path}: {e}"))),
        None => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn target() -> ClusterTarget {
        ClusterTarget {
            cluster: "prod".to_string(),
            context: "prod-admin".to_string(),
            server: "https://10.0.0.1:6443/".to_string(),
            token: Some("secret".to_string()),
            token_path: None,
            ca_cert_path: None,
            ca_cert_data: None,
            insecure_skip_tls_verify: true,
        }
    }

    #[test]
    fn connect_trims_trailing_slash() {
        let client = ClusterClient::connect(&target(), Duration::from_secs(5)).expect("connect");
        assert_eq!(client.server, "https://10.0.0.1:6443");
    }

    #[test]
    fn inline_token_wins_over_token_path() {
        let mut t = target();
        t.token_path = Some("/nonexistent/token".to_string());
        let client = ClusterClient::connect(&t, Duration::from_secs(5)).expect("connect");
        assert_eq!(client.token.as_deref(), Some("secret"));
    }

    #[test]
    fn missing_token_file_is_a_provisioning_error() {
        let mut t = target();
        t.token = None;
        t.token_path = Some("/nonexistent/token".to_string());
        let err = ClusterClient::connect(&t, Duration::from_secs(5)).expect_err("must fail");
        assert_eq!(err.status_label(), "CONNECTION_ERROR");
    }

    #[test]
    fn bad_ca_data_is_a_provisioning_error() {
        let mut t = target();
        t.ca_cert_data = Some("%%% not base64 %%%".to_string());
        assert!(ClusterClient::connect(&t, Duration::from_secs(5)).is_err());
    }
}
