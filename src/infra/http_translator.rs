use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

use crate::app::ports::TranslatorPort;
use crate::config::TranslationConfig;
use crate::error::Result;
use crate::observability::metrics;

/// Request body for a LibreTranslate-compatible `/translate` endpoint
#[derive(Serialize)]
struct TranslateRequest<'a> {
    q: &'a str,
    source: &'a str,
    target: &'a str,
    format: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    api_key: Option<&'a str>,
}

#[derive(Deserialize)]
struct TranslateResponse {
    #[serde(rename = "translatedText")]
    translated_text: String,
}

/// Outcome of a single attempt; only transient failures are retried
enum AttemptError {
    Transient(String),
    Permanent(String),
}

pub struct HttpTranslator {
    client: reqwest::Client,
    endpoint: String,
    api_key: Option<String>,
    max_retries: u32,
    retry_delay: Duration,
}

impl HttpTranslator {
    pub fn from_config(config: &TranslationConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds.max(1)))
            .build()?;
        Ok(Self {
            client,
            endpoint: config.endpoint.clone(),
            api_key: config.api_key.clone(),
            max_retries: config.max_retries,
            retry_delay: Duration::from_millis(config.retry_delay_ms),
        })
    }

    async fn attempt(&self, text: &str, source: &str, target: &str) -> std::result::Result<String, AttemptError> {
        let body = TranslateRequest {
            q: text,
            source,
            target,
            format: "text",
            api_key: self.api_key.as_deref(),
        };

        let resp = self
            .client
            .post(&self.endpoint)
            .json(&body)
            .send()
            .await
            .map_err(|e| AttemptError::Transient(e.to_string()))?;

        let status = resp.status();
        if status.is_server_error() || status.as_u16() == 429 {
            return Err(AttemptError::Transient(format!("service responded {}", status.as_u16())));
        }
        if !status.is_success() {
            return Err(AttemptError::Permanent(format!("service responded {}", status.as_u16())));
        }

        let parsed: TranslateResponse = resp
            .json()
            .await
            .map_err(|e| AttemptError::Permanent(format!("unexpected response body: {e}")))?;
        Ok(parsed.translated_text)
    }
}

#[async_trait]
impl TranslatorPort for HttpTranslator {
    async fn translate(&self, text: &str, source: &str, target: &str) -> std::result::Result<String, String> {
        let mut last_error = String::new();
        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                metrics::translation::retry();
                tokio::time::sleep(self.retry_delay * attempt).await;
            }
            match self.attempt(text, source, target).await {
                Ok(translated) => {
                    debug!("'{}' translated on attempt {}", text, attempt + 1);
                    return Ok(translated);
                }
                Err(AttemptError::Permanent(e)) => return Err(e),
                Err(AttemptError::Transient(e)) => {
                    warn!("Translation attempt {} for '{}' failed: {}", attempt + 1, text, e);
                    last_error = e;
                }
            }
        }
        Err(format!("gave up after {} attempts: {}", self.max_retries + 1, last_error))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// Serve canned HTTP responses, one per connection, in order
    async fn serve(responses: Vec<(u16, &'static str)>) -> (String, Arc<AtomicUsize>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = hits.clone();

        tokio::spawn(async move {
            for (status, body) in responses {
                let (mut socket, _) = listener.accept().await.unwrap();
                counter.fetch_add(1, Ordering::SeqCst);
                read_request(&mut socket).await;
                let reply = format!(
                    "HTTP/1.1 {status} X\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                    body.len()
                );
                socket.write_all(reply.as_bytes()).await.unwrap();
                socket.shutdown().await.ok();
            }
        });

        (format!("http://{addr}/translate"), hits)
    }

    /// Accept connections and read their requests without ever answering
    async fn stall() -> (String, Arc<AtomicUsize>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = hits.clone();

        tokio::spawn(async move {
            let mut held = Vec::new();
            while let Ok((mut socket, _)) = listener.accept().await {
                counter.fetch_add(1, Ordering::SeqCst);
                read_request(&mut socket).await;
                held.push(socket);
            }
        });

        (format!("http://{addr}/translate"), hits)
    }

    async fn read_request(socket: &mut tokio::net::TcpStream) {
        let mut buf = Vec::new();
        let mut chunk = [0u8; 1024];
        loop {
            let n = socket.read(&mut chunk).await.unwrap();
            if n == 0 {
                return;
            }
            buf.extend_from_slice(&chunk[..n]);
            let text = String::from_utf8_lossy(&buf);
            if let Some(end) = text.find("\r\n\r\n") {
                let length = text[..end]
                    .lines()
                    .find_map(|l| {
                        let lower = l.to_ascii_lowercase();
                        lower.strip_prefix("content-length:").map(|v| v.trim().parse::<usize>().unwrap_or(0))
                    })
                    .unwrap_or(0);
                if buf.len() >= end + 4 + length {
                    return;
                }
            }
        }
    }

    fn config(endpoint: String) -> TranslationConfig {
        TranslationConfig {
            endpoint,
            max_retries: 2,
            retry_delay_ms: 1,
            timeout_seconds: 5,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_returns_translated_text() {
        let (endpoint, hits) = serve(vec![(200, r#"{"translatedText":"Province"}"#)]).await;
        let translator = HttpTranslator::from_config(&config(endpoint)).unwrap();
        let out = translator.translate("省份", "auto", "en").await.unwrap();
        assert_eq!(out, "Province");
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_retries_server_errors() {
        let (endpoint, hits) = serve(vec![
            (503, "{}"),
            (200, r#"{"translatedText":"City"}"#),
        ])
        .await;
        let translator = HttpTranslator::from_config(&config(endpoint)).unwrap();
        assert_eq!(translator.translate("城市", "auto", "en").await.unwrap(), "City");
        assert_eq!(hits.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_client_errors_are_not_retried() {
        let (endpoint, hits) = serve(vec![(400, r#"{"error":"bad"}"#)]).await;
        let translator = HttpTranslator::from_config(&config(endpoint)).unwrap();
        let err = translator.translate("城市", "auto", "en").await.unwrap_err();
        assert!(err.contains("400"));
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_gives_up_after_bounded_retries() {
        let (endpoint, hits) = serve(vec![(500, "{}"), (500, "{}"), (500, "{}")]).await;
        let translator = HttpTranslator::from_config(&config(endpoint)).unwrap();
        let err = translator.translate("城市", "auto", "en").await.unwrap_err();
        assert!(err.contains("gave up after 3 attempts"));
        assert_eq!(hits.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_timed_out_requests_are_retried_then_abandoned() {
        let (endpoint, hits) = stall().await;
        let stalled = TranslationConfig {
            timeout_seconds: 1,
            max_retries: 1,
            ..config(endpoint)
        };
        let translator = HttpTranslator::from_config(&stalled).unwrap();

        let started = std::time::Instant::now();
        let err = translator.translate("城市", "auto", "en").await.unwrap_err();
        assert!(err.contains("gave up after 2 attempts"), "{err}");
        assert_eq!(hits.load(Ordering::SeqCst), 2);
        assert!(started.elapsed() >= Duration::from_secs(2));
    }
}
