//! HTTP client implementation
//!
//! This module provides the core HTTP client for the SDK with retry logic
//! for idempotent requests, request/response logging, and a separate
//! long-lived connection for event streams.

use crate::config::SdkConfig;
use crate::error::{SdkError, SdkResult};
use reqwest::{header, Client, Method, Response, StatusCode};
use serde::{de::DeserializeOwned, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// The HTTP client for making API requests
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: Client,
    stream_client: Client,
    config: Arc<SdkConfig>,
}

impl HttpClient {
    /// Create a new HTTP client with the given configuration
    pub fn new(config: SdkConfig) -> SdkResult<Self> {
        config.validate()?;

        let mut headers = header::HeaderMap::new();

        // Add custom headers
        for (name, value) in &config.custom_headers {
            if let (Ok(name), Ok(value)) = (
                header::HeaderName::try_from(name.as_str()),
                header::HeaderValue::try_from(value.as_str()),
            ) {
                headers.insert(name, value);
            } else {
                warn!("Skipping invalid custom header {}", name);
            }
        }

        let client = Client::builder()
            .timeout(config.timeout)
            .connect_timeout(config.connect_timeout)
            .user_agent(&config.user_agent)
            .default_headers(headers.clone())
            .gzip(true)
            .brotli(true)
            .build()
            .map_err(SdkError::NetworkError)?;

        // Event streams stay open for the whole agent run, so only the
        // connect phase is bounded.
        let stream_client = Client::builder()
            .connect_timeout(config.connect_timeout)
            .user_agent(&config.user_agent)
            .default_headers(headers)
            .build()
            .map_err(SdkError::NetworkError)?;

        Ok(Self {
            client,
            stream_client,
            config: Arc::new(config),
        })
    }

    /// Get a reference to the configuration
    pub fn config(&self) -> &SdkConfig {
        &self.config
    }

    /// Build the full URL for an endpoint
    pub fn url(&self, path: &str) -> String {
        let base = self.config.base_url.trim_end_matches('/');
        let path = path.trim_start_matches('/');
        format!("{}/{}", base, path)
    }

    /// Make a GET request
    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> SdkResult<T> {
        self.request(Method::GET, path, Option::<()>::None).await
    }

    /// Make a POST request with a JSON body
    pub async fn post<T: DeserializeOwned, B: Serialize>(
        &self,
        path: &str,
        body: B,
    ) -> SdkResult<T> {
        self.request(Method::POST, path, Some(body)).await
    }

    /// Make a POST request without a body
    pub async fn post_empty<T: DeserializeOwned>(&self, path: &str) -> SdkResult<T> {
        self.request(Method::POST, path, Option::<()>::None).await
    }

    /// Open a Server-Sent Events stream.
    ///
    /// The returned response has a success status; its body is read
    /// incrementally by [`crate::stream::EventStream`].
    pub async fn open_stream(&self, path: &str) -> SdkResult<Response> {
        let url = self.url(path);
        if self.config.enable_logging {
            debug!("Opening event stream: GET {}", url);
        }

        let response = self
            .stream_client
            .get(&url)
            .header(header::ACCEPT, "text/event-stream")
            .header(header::CACHE_CONTROL, "no-cache")
            .send()
            .await
            .map_err(|e| self.map_send_error(e))?;

        let status = response.status();
        if status.is_success() {
            Ok(response)
        } else {
            let text = response.text().await.map_err(SdkError::NetworkError)?;
            Err(SdkError::from_response(status.as_u16(), &text))
        }
    }

    /// Make a request with optional body
    async fn request<T: DeserializeOwned, B: Serialize>(
        &self,
        method: Method,
        path: &str,
        body: Option<B>,
    ) -> SdkResult<T> {
        let response = self.execute_with_retry(method, path, body).await?;

        let status = response.status();
        let text = response.text().await.map_err(SdkError::NetworkError)?;

        if self.config.enable_logging {
            debug!("Response {}: {}", status, text);
        }

        if status.is_success() {
            serde_json::from_str(&text).map_err(SdkError::SerializationError)
        } else {
            Err(SdkError::from_response(status.as_u16(), &text))
        }
    }

    /// Execute a request, retrying idempotent ones.
    ///
    /// Only GET requests are retried; a repeated POST could create a second
    /// race or start a second agent run.
    async fn execute_with_retry<B: Serialize>(
        &self,
        method: Method,
        path: &str,
        body: Option<B>,
    ) -> SdkResult<Response> {
        let url = self.url(path);
        let body_json = body.as_ref().map(serde_json::to_string).transpose()?;
        let max_retries = if method == Method::GET {
            self.config.max_retries
        } else {
            0
        };

        let mut attempts = 0;
        let mut last_error: Option<SdkError> = None;
        let mut backoff = self.config.retry_initial_backoff;

        while attempts <= max_retries {
            if attempts > 0 {
                info!(
                    "Retrying request (attempt {}/{}), waiting {:?}",
                    attempts, max_retries, backoff
                );
                tokio::time::sleep(backoff).await;
                backoff = std::cmp::min(backoff * 2, self.config.retry_max_backoff);
            }

            let mut request = self
                .client
                .request(method.clone(), &url)
                .header(header::ACCEPT, "application/json");

            if let Some(ref body_str) = body_json {
                request = request
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(body_str.clone());
            }

            if self.config.enable_logging {
                debug!("Request: {} {}", method, url);
                if let Some(ref body_str) = body_json {
                    debug!("Request body: {}", body_str);
                }
            }

            match request.send().await {
                Ok(response) => {
                    let status = response.status();

                    if status == StatusCode::TOO_MANY_REQUESTS && attempts < max_retries {
                        let retry_after = response
                            .headers()
                            .get(header::RETRY_AFTER)
                            .and_then(|v| v.to_str().ok())
                            .and_then(|v| v.parse::<u64>().ok())
                            .unwrap_or(1);

                        warn!("Rate limited, retry after {} seconds", retry_after);
                        last_error = Some(SdkError::from_response(status.as_u16(), ""));
                        backoff = Duration::from_secs(retry_after);
                        attempts += 1;
                        continue;
                    }

                    if status.is_server_error() && attempts < max_retries {
                        warn!("Server error {}, will retry", status);
                        last_error = Some(SdkError::from_response(status.as_u16(), ""));
                        attempts += 1;
                        continue;
                    }

                    return Ok(response);
                }
                Err(e) => {
                    error!("Request {} {} failed: {}", method, url, e);

                    let mapped = self.map_send_error(e);
                    if !mapped.is_retryable() {
                        return Err(mapped);
                    }
                    last_error = Some(mapped);
                    attempts += 1;
                }
            }
        }

        Err(last_error
            .unwrap_or_else(|| SdkError::InvalidState(format!("Request to {} failed", url))))
    }

    fn map_send_error(&self, e: reqwest::Error) -> SdkError {
        if e.is_timeout() {
            SdkError::Timeout(self.config.timeout.as_secs())
        } else {
            SdkError::NetworkError(e)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_url_building() {
        let config = SdkConfig::new("https://api.example.com/");
        let client = HttpClient::new(config).unwrap();

        assert_eq!(client.url("/race"), "https://api.example.com/race");
        assert_eq!(
            client.url("run/abc/events"),
            "https://api.example.com/run/abc/events"
        );
    }

    #[test]
    fn test_invalid_config_rejected() {
        assert!(HttpClient::new(SdkConfig::new("")).is_err());
    }
}
