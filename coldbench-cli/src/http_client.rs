// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! HTTP invocation client.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;

use coldbench_core::{InvocationClient, InvocationError, InvocationResponse, LatencyClock};

use crate::metrics;

/// Stored response bodies are cut to this many bytes.
const MAX_BODY_BYTES: usize = 4096;

/// Invokes functions with a JSON POST.
pub struct HttpInvocationClient {
    client: Client,
    timeout: Duration,
}

impl HttpInvocationClient {
    pub fn new(timeout: Duration) -> Result<Self, reqwest::Error> {
        // Reused connections would hide TLS setup in cold samples.
        let client = Client::builder()
            .timeout(timeout)
            .pool_max_idle_per_host(0)
            .build()?;
        Ok(Self { client, timeout })
    }
}

#[async_trait]
impl InvocationClient for HttpInvocationClient {
    async fn invoke(
        &self,
        url: &str,
        payload: &serde_json::Value,
    ) -> Result<InvocationResponse, InvocationError> {
        let t0 = LatencyClock::start();

        let result = async {
            let response = self.client.post(url).json(payload).send().await?;
            let status = response.status().as_u16();
            let body = response.text().await?;
            Ok::<_, reqwest::Error>((status, body))
        }
        .await;

        let elapsed = LatencyClock::elapsed(t0);

        let (status, body) = result.map_err(|e| {
            metrics::INVOCATIONS.with_label_values(&["error"]).inc();
            if e.is_timeout() {
                InvocationError::Timeout {
                    url: url.to_string(),
                    after_ms: self.timeout.as_millis() as u64,
                }
            } else {
                InvocationError::Network {
                    url: url.to_string(),
                    reason: e.to_string(),
                }
            }
        })?;

        let class = metrics::status_class(status);
        metrics::INVOCATIONS.with_label_values(&[class]).inc();
        metrics::INVOCATION_LATENCY
            .with_label_values(&[class])
            .observe(elapsed.as_secs_f64());

        tracing::debug!(url = %url, status, elapsed_ms = elapsed.as_millis() as u64, "Invoked");

        Ok(InvocationResponse {
            status,
            elapsed,
            instance_reused: instance_reused(&body),
            body: truncate(body, MAX_BODY_BYTES),
        })
    }
}

/// Sample functions report `isColdStart`; `false` means a warm instance answered.
pub fn instance_reused(body: &str) -> Option<bool> {
    let value: serde_json::Value = serde_json::from_str(body).ok()?;
    value
        .get("isColdStart")
        .and_then(serde_json::Value::as_bool)
        .map(|cold| !cold)
}

fn truncate(mut body: String, max: usize) -> String {
    if body.len() > max {
        let mut cut = max;
        while !body.is_char_boundary(cut) {
            cut -= 1;
        }
        body.truncate(cut);
    }
    body
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// Serve a single canned response and return the URL.
    async fn serve_once(status_line: &'static str, body: &'static str) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = vec![0u8; 8192];
            let _ = socket.read(&mut buf).await;
            let response = format!(
                "HTTP/1.1 {}\r\nConnection: close\r\nContent-Type: application/json\r\nContent-Length: {}\r\n\r\n{}",
                status_line,
                body.len(),
                body
            );
            socket.write_all(response.as_bytes()).await.unwrap();
            socket.flush().await.unwrap();
        });
        format!("http://{}/", addr)
    }

    #[test]
    fn test_instance_reused_parsing() {
        assert_eq!(instance_reused(r#"{"isColdStart":true}"#), Some(false));
        assert_eq!(instance_reused(r#"{"isColdStart":false}"#), Some(true));
        assert_eq!(instance_reused(r#"{"message":"hi"}"#), None);
        assert_eq!(instance_reused("plain text"), None);
    }

    #[test]
    fn test_truncate_respects_char_boundary() {
        let body = "é".repeat(10);
        let cut = truncate(body, 5);
        assert_eq!(cut, "éé");
        assert_eq!(truncate("short".to_string(), 100), "short");
    }

    #[tokio::test]
    async fn test_invoke_success() {
        let url = serve_once("200 OK", r#"{"isColdStart":true,"message":"ok"}"#).await;
        let client = HttpInvocationClient::new(Duration::from_secs(5)).unwrap();

        let response = client
            .invoke(&url, &serde_json::json!({"message": "coldbench"}))
            .await
            .unwrap();

        assert_eq!(response.status, 200);
        assert!(response.is_success());
        assert_eq!(response.instance_reused, Some(false));
        assert!(response.body.contains("ok"));
    }

    #[tokio::test]
    async fn test_invoke_server_error_is_a_response() {
        let url = serve_once("503 Service Unavailable", "{}").await;
        let client = HttpInvocationClient::new(Duration::from_secs(5)).unwrap();

        let response = client.invoke(&url, &serde_json::json!({})).await.unwrap();
        assert_eq!(response.status, 503);
        assert!(!response.is_success());
    }

    #[tokio::test]
    async fn test_invoke_connection_refused() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let client = HttpInvocationClient::new(Duration::from_secs(5)).unwrap();
        let err = client
            .invoke(&format!("http://{}/", addr), &serde_json::json!({}))
            .await
            .unwrap_err();
        assert!(matches!(err, InvocationError::Network { .. }));
    }
}
