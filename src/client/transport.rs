//! HTTP transport boundary.
//!
//! [`HttpFetch`] is the seam between the client and the network: one GET
//! with explicit headers, returning status, content type, and body.
//! Classification into the error taxonomy happens in
//! [`FetchResponse::into_json`] so stub transports in tests go through
//! exactly the same path as reqwest.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;

use crate::error::{MetError, MetResult};

/// Raw outcome of one upstream GET.
#[derive(Debug, Clone)]
pub struct FetchResponse {
    pub status: u16,
    pub content_type: Option<String>,
    pub body: String,
    /// Parsed Retry-After header (seconds), when present.
    pub retry_after: Option<Duration>,
}

impl FetchResponse {
    /// Classify the response and parse the body as JSON.
    ///
    /// 404 maps to the definitive-absent error; 429/403 to transient HTTP
    /// errors carrying any Retry-After hint; other non-2xx statuses and
    /// non-JSON content types are fatal.
    pub fn into_json(self, url: &str) -> MetResult<serde_json::Value> {
        if self.status == 404 {
            return Err(MetError::NotFound {
                url: url.to_string(),
            });
        }
        if !(200..300).contains(&self.status) {
            return Err(MetError::Http {
                status: self.status,
                url: url.to_string(),
                retry_after: self.retry_after,
            });
        }
        let is_json = self
            .content_type
            .as_deref()
            .is_some_and(|ct| ct.contains("application/json"));
        if !is_json {
            return Err(MetError::InvalidContentType {
                content_type: self.content_type,
                url: url.to_string(),
            });
        }
        serde_json::from_str(&self.body).map_err(|source| MetError::InvalidJson {
            url: url.to_string(),
            source,
        })
    }
}

/// One-shot HTTP GET, injectable for tests.
#[async_trait]
pub trait HttpFetch: Send + Sync {
    async fn get(&self, url: &str, headers: &[(String, String)]) -> MetResult<FetchResponse>;
}

/// Production transport backed by reqwest.
pub struct ReqwestFetch {
    client: Client,
}

impl ReqwestFetch {
    pub fn new(timeout: Duration) -> Self {
        let client = Client::builder()
            .timeout(timeout)
            .gzip(true)
            .brotli(true)
            .build()
            .expect("Failed to create HTTP client");
        Self { client }
    }
}

#[async_trait]
impl HttpFetch for ReqwestFetch {
    async fn get(&self, url: &str, headers: &[(String, String)]) -> MetResult<FetchResponse> {
        let mut request = self.client.get(url);
        for (name, value) in headers {
            request = request.header(name, value);
        }

        let response = request.send().await.map_err(|source| MetError::Network {
            url: url.to_string(),
            source,
        })?;

        let status = response.status().as_u16();
        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_string());
        let retry_after = response
            .headers()
            .get(reqwest::header::RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.parse::<u64>().ok())
            .map(Duration::from_secs);

        let body = response.text().await.map_err(|source| MetError::Network {
            url: url.to_string(),
            source,
        })?;

        Ok(FetchResponse {
            status,
            content_type,
            body,
            retry_after,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn response(status: u16, content_type: &str, body: &str) -> FetchResponse {
        FetchResponse {
            status,
            content_type: Some(content_type.to_string()),
            body: body.to_string(),
            retry_after: None,
        }
    }

    #[test]
    fn test_success_parses_json() {
        let json = response(200, "application/json; charset=utf-8", r#"{"objectID":1}"#)
            .into_json("u")
            .unwrap();
        assert_eq!(json["objectID"], 1);
    }

    #[test]
    fn test_404_is_not_found() {
        let err = response(404, "application/json", "").into_json("u").unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn test_429_is_transient_with_retry_after() {
        let mut resp = response(429, "application/json", "");
        resp.retry_after = Some(Duration::from_secs(3));
        let err = resp.into_json("u").unwrap_err();
        assert!(err.is_transient());
        assert_eq!(err.retry_after(), Some(Duration::from_secs(3)));
    }

    #[test]
    fn test_wrong_content_type_is_fatal() {
        let err = response(200, "text/html", "<html></html>")
            .into_json("u")
            .unwrap_err();
        assert!(matches!(err, MetError::InvalidContentType { .. }));
        assert!(!err.is_transient());
    }

    #[test]
    fn test_malformed_body_is_fatal() {
        let err = response(200, "application/json", "{not json")
            .into_json("u")
            .unwrap_err();
        assert!(matches!(err, MetError::InvalidJson { .. }));
        assert!(!err.is_transient());
    }
}
