use std::time::Duration;

use bytes::Bytes;
use reqwest::multipart::Form;
use serde::Serialize;

use crate::config::ServerConfig;
use crate::error::RelayError;
use crate::protocol::error_shapes::sanitize_upstream_error;

use super::retry_policy::{
    retry_backoff_delay, retry_delay, should_retry_transport_error, should_retry_upstream_status,
    RETRY_MAX_ATTEMPTS,
};

const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

fn build_reqwest_client(config: &ServerConfig) -> Result<reqwest::Client, RelayError> {
    let pool_idle_timeout = if config.http_pool_idle_timeout_secs == 0 {
        None
    } else {
        Some(Duration::from_secs(config.http_pool_idle_timeout_secs))
    };

    let mut builder = reqwest::Client::builder()
        .pool_max_idle_per_host(config.http_pool_max_idle_per_host.max(1))
        .pool_idle_timeout(pool_idle_timeout)
        .tcp_nodelay(true)
        .connect_timeout(CONNECT_TIMEOUT)
        .redirect(reqwest::redirect::Policy::none())
        .timeout(Duration::from_secs(config.timeout));

    if let Some(proxy_url) = config.http_proxy.as_deref() {
        let proxy = reqwest::Proxy::all(proxy_url)
            .map_err(|err| RelayError::Config(format!("Invalid proxy URL: {err}")))?;
        builder = builder.no_proxy().proxy(proxy);
    } else if !config.http_use_env_proxy {
        builder = builder.no_proxy();
    }

    builder
        .build()
        .map_err(|err| RelayError::Config(format!("Failed to build HTTP client: {err}")))
}

/// Outbound HTTP client shared by every relay route.
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    /// Create a transport with connection pooling and timeouts from the server config.
    ///
    /// # Errors
    ///
    /// Returns [`RelayError::Config`] when the proxy URL is invalid or the
    /// client cannot be built.
    pub fn new(config: &ServerConfig) -> Result<Self, RelayError> {
        Ok(Self {
            client: build_reqwest_client(config)?,
        })
    }

    /// POST a JSON body.
    ///
    /// # Errors
    ///
    /// Returns [`RelayError::Internal`] when the body cannot be serialized and
    /// [`RelayError::Transport`] when the request fails after retries.
    pub async fn post_json<T>(
        &self,
        url: &str,
        headers: &http::HeaderMap,
        body: &T,
    ) -> Result<reqwest::Response, RelayError>
    where
        T: Serialize + ?Sized,
    {
        let body = Bytes::from(serde_json::to_vec(body).map_err(|err| {
            RelayError::Internal(format!("Failed to encode upstream request: {err}"))
        })?);
        self.execute_with_retry(false, || {
            Ok(self
                .client
                .post(url)
                .headers(headers.clone())
                .header(http::header::CONTENT_TYPE, "application/json")
                .body(body.clone()))
        })
        .await
    }

    /// POST a multipart form. `build_form` runs once per attempt because
    /// forms cannot be replayed.
    ///
    /// # Errors
    ///
    /// Returns the error of `build_form`, or [`RelayError::Transport`] when
    /// the request fails after retries.
    pub async fn post_multipart<F>(
        &self,
        url: &str,
        headers: &http::HeaderMap,
        build_form: F,
    ) -> Result<reqwest::Response, RelayError>
    where
        F: Fn() -> Result<Form, RelayError>,
    {
        self.execute_with_retry(false, || {
            Ok(self
                .client
                .post(url)
                .headers(headers.clone())
                .multipart(build_form()?))
        })
        .await
    }

    /// # Errors
    ///
    /// Returns [`RelayError::Transport`] when the request fails after retries.
    pub async fn get(
        &self,
        url: &str,
        headers: &http::HeaderMap,
    ) -> Result<reqwest::Response, RelayError> {
        self.execute_with_retry(true, || Ok(self.client.get(url).headers(headers.clone())))
            .await
    }

    /// Send with retries. Retriable statuses are retried for every method;
    /// timeouts and after-send failures only when `idempotent` is set, since
    /// the POSTs here start paid upstream work.
    async fn execute_with_retry<F>(
        &self,
        idempotent: bool,
        make_request: F,
    ) -> Result<reqwest::Response, RelayError>
    where
        F: Fn() -> Result<reqwest::RequestBuilder, RelayError>,
    {
        let mut attempt = 0;
        loop {
            let request = make_request()?
                .build()
                .map_err(|err| RelayError::Internal(format!("Invalid upstream request: {err}")))?;
            let url = request.url().clone();

            match self.client.execute(request).await {
                Ok(response) => {
                    if attempt < RETRY_MAX_ATTEMPTS
                        && should_retry_upstream_status(response.status())
                    {
                        let delay = retry_delay(response.headers(), attempt);
                        tracing::debug!(
                            host = url.host_str().unwrap_or_default(),
                            status = response.status().as_u16(),
                            retry_attempt = attempt + 1,
                            delay_ms = delay.as_millis(),
                            "retrying upstream request after retriable status"
                        );
                        drop(response);
                        tokio::time::sleep(delay).await;
                        attempt += 1;
                        continue;
                    }
                    return Ok(response);
                }
                Err(err) => {
                    let retriable = should_retry_transport_error(&err, idempotent);
                    // Upstream URLs can carry credentials in the query string.
                    let message = err.without_url().to_string();
                    if attempt >= RETRY_MAX_ATTEMPTS || !retriable {
                        return Err(RelayError::Transport(message));
                    }

                    let delay = retry_backoff_delay(attempt);
                    tracing::debug!(
                        host = url.host_str().unwrap_or_default(),
                        retry_attempt = attempt + 1,
                        delay_ms = delay.as_millis(),
                        error = %message,
                        "retrying upstream request after transport error"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }
}

/// Read the body of a successful response, or turn a non-2xx response into
/// [`RelayError::Upstream`] with a sanitized message.
///
/// # Errors
///
/// Returns [`RelayError::Upstream`] for non-success statuses and
/// [`RelayError::Transport`] when the body cannot be read.
pub async fn read_success_body(response: reqwest::Response) -> Result<Bytes, RelayError> {
    let status = response.status();
    let body = response
        .bytes()
        .await
        .map_err(|err| RelayError::Transport(format!("Failed to read upstream body: {err}")))?;
    if !status.is_success() {
        return Err(RelayError::Upstream {
            status: status.as_u16(),
            message: sanitize_upstream_error(&body),
        });
    }
    Ok(body)
}

/// Read a successful response and decode it as JSON.
///
/// # Errors
///
/// Returns the errors of [`read_success_body`], or [`RelayError::Decode`]
/// when the body is not the expected JSON.
pub async fn read_success_json<T>(response: reqwest::Response) -> Result<T, RelayError>
where
    T: serde::de::DeserializeOwned,
{
    let body = read_success_body(response).await?;
    serde_json::from_slice(&body)
        .map_err(|err| RelayError::Decode(format!("Invalid upstream JSON: {err}")))
}
