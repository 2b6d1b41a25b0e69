//! Single-attempt execution.
//!
//! Each attempt gets one deadline. Sending the request and draining the body
//! both race that deadline and the caller's cancellation token; whichever
//! future loses is dropped, which aborts the underlying connection.

use crate::request::RequestDescriptor;
use crate::{FetcherError, FetcherErrorKind};
use http::{HeaderMap, StatusCode};
use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Why a bounded future did not complete.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Interrupted {
    Timeout,
    Cancelled,
}

/// Runs `fut` until it completes, `deadline` passes, or `cancel` fires.
pub(crate) async fn bounded<F>(
    fut: F,
    deadline: Instant,
    cancel: Option<&CancellationToken>,
) -> Result<F::Output, Interrupted>
where
    F: Future,
{
    let cancelled = async {
        match cancel {
            Some(token) => token.cancelled().await,
            None => std::future::pending::<()>().await,
        }
    };

    tokio::select! {
        biased;
        _ = cancelled => Err(Interrupted::Cancelled),
        result = tokio::time::timeout_at(deadline, fut) => result.map_err(|_| Interrupted::Timeout),
    }
}

/// Used when `now + timeout` is not representable.
const FAR_FUTURE: Duration = Duration::from_secs(86_400 * 365 * 30);

/// The instant an attempt started now with `timeout` must finish by.
fn attempt_deadline(timeout: Duration) -> Instant {
    let now = Instant::now();
    now.checked_add(timeout).unwrap_or_else(|| now + FAR_FUTURE)
}

/// A response whose status has not been interpreted yet.
pub(crate) struct RawResponse {
    pub(crate) status: StatusCode,
    pub(crate) headers: HeaderMap,
    pub(crate) url: String,
    timeout: Duration,
    deadline: Instant,
    cancel: Option<CancellationToken>,
    response: reqwest::Response,
}

impl RawResponse {
    /// The response's `Content-Type`, if present and readable.
    pub(crate) fn content_type(&self) -> Option<String> {
        self.headers
            .get(http::header::CONTENT_TYPE)?
            .to_str()
            .ok()
            .map(str::to_string)
    }

    /// Drains the body within the attempt's deadline.
    pub(crate) async fn read_body(self) -> Result<Vec<u8>, FetcherError> {
        let url = self.url;
        let status = self.status;
        match bounded(self.response.bytes(), self.deadline, self.cancel.as_ref()).await {
            Ok(Ok(bytes)) => Ok(bytes.to_vec()),
            Ok(Err(e)) => Err(FetcherError::new(
                FetcherErrorKind::Network,
                format!("Failed to read response body: {}", e),
                url,
            )
            .with_status(status)
            .with_source(e)),
            Err(interrupted) => Err(interruption_error(interrupted, self.timeout, url)),
        }
    }
}

/// Issues one attempt for `descriptor` through `client`.
///
/// Status codes are not interpreted here; a 500 is a successful transport.
pub(crate) async fn execute(
    client: &reqwest::Client,
    descriptor: &RequestDescriptor,
    timeout: Duration,
    cancel: Option<&CancellationToken>,
    attempt: usize,
) -> Result<RawResponse, FetcherError> {
    let mut builder = client
        .request(descriptor.method.clone(), descriptor.url.as_str())
        .headers(descriptor.headers.clone());
    if let Some(body) = &descriptor.body {
        builder = builder.body(body.as_str().to_owned());
    }
    let request = builder
        .build()
        .map_err(|e| classify_reqwest_error(e, &descriptor.url))?;

    tracing::debug!(
        method = %descriptor.method,
        url = %descriptor.url,
        attempt = attempt,
        timeout_ms = timeout.as_millis() as u64,
        "Executing HTTP request"
    );

    let deadline = attempt_deadline(timeout);
    match bounded(client.execute(request), deadline, cancel).await {
        Ok(Ok(response)) => Ok(RawResponse {
            status: response.status(),
            headers: response.headers().clone(),
            url: descriptor.url.clone(),
            timeout,
            deadline,
            cancel: cancel.cloned(),
            response,
        }),
        Ok(Err(e)) => Err(classify_reqwest_error(e, &descriptor.url)),
        Err(interrupted) => Err(interruption_error(interrupted, timeout, descriptor.url.clone())),
    }
}

pub(crate) fn interruption_error(
    interrupted: Interrupted,
    timeout: Duration,
    url: impl Into<String>,
) -> FetcherError {
    match interrupted {
        Interrupted::Timeout => FetcherError::new(
            FetcherErrorKind::Timeout,
            format!("Request timed out after {}ms", timeout.as_millis()),
            url,
        ),
        Interrupted::Cancelled => {
            FetcherError::new(FetcherErrorKind::Cancelled, "Request was cancelled", url)
        }
    }
}

fn classify_reqwest_error(error: reqwest::Error, url: &str) -> FetcherError {
    let (kind, message) = if error.is_timeout() {
        (FetcherErrorKind::Timeout, format!("Request timed out: {}", error))
    } else if error.is_builder() {
        (FetcherErrorKind::Configuration, format!("Invalid request: {}", error))
    } else {
        (FetcherErrorKind::Network, format!("Network error: {}", error))
    };
    FetcherError::new(kind, message, url).with_source(error)
}
