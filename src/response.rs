//! Response interpretation and the successful-response wrapper.
//!
//! Interpretation classifies the status, drains and parses the body, and runs
//! the caller's decoder. Non-2xx statuses become
//! [`FetcherErrorKind::HttpStatus`] errors carrying whatever JSON error body
//! the server sent. 2xx bodies that are not JSON become
//! [`FetcherErrorKind::Parse`] errors with a short preview of the text.

use crate::options::Decoder;
use crate::rate_limit::{rate_limit_message, retry_hint};
use crate::schema::Issue;
use crate::transport::RawResponse;
use crate::{Error, FetcherError, FetcherErrorKind, Result, ValidationError};
use http::{HeaderMap, Method, StatusCode};
use serde_json::Value;
use std::time::{Duration, Instant};

/// How many characters of an unparseable body are kept on the error.
pub const BODY_PREVIEW_CHARS: usize = 200;

/// A successful, decoded response.
///
/// # Examples
///
/// ```no_run
/// use fetchwise::{Fetcher, FetcherOptions};
///
/// # async fn example() -> Result<(), fetchwise::Error> {
/// let fetcher = Fetcher::builder().build()?;
/// let response = fetcher
///     .get("https://api.example.com/status", FetcherOptions::new(), None)
///     .await?;
///
/// println!("Status: {}", response.status);
/// println!("Took {:?} over {} attempt(s)", response.latency, response.attempts);
/// println!("Body: {}", response.data);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct Response<T> {
    /// The decoded body.
    pub data: T,

    /// The body as received.
    pub raw_body: String,

    /// The HTTP status code.
    pub status: StatusCode,

    /// The response headers.
    pub headers: HeaderMap,

    /// Time from the start of the first attempt to the decoded result,
    /// backoff waits included.
    pub latency: Duration,

    /// The attempt that succeeded (1 if no retry was needed).
    pub attempts: usize,
}

impl<T> Response<T> {
    /// Creates a new `Response`.
    pub fn new(
        data: T,
        raw_body: String,
        status: StatusCode,
        headers: HeaderMap,
        latency: Duration,
        attempts: usize,
    ) -> Self {
        Self {
            data,
            raw_body,
            status,
            headers,
            latency,
            attempts,
        }
    }

    /// Maps the decoded data, keeping the metadata.
    ///
    /// # Examples
    ///
    /// ```
    /// # use fetchwise::Response;
    /// # use http::{HeaderMap, StatusCode};
    /// # use std::time::Duration;
    /// let response = Response::new(
    ///     vec![1, 2, 3],
    ///     "[1,2,3]".to_string(),
    ///     StatusCode::OK,
    ///     HeaderMap::new(),
    ///     Duration::from_millis(12),
    ///     1,
    /// );
    ///
    /// let count = response.map(|items| items.len());
    /// assert_eq!(count.data, 3);
    /// ```
    pub fn map<U, F>(self, f: F) -> Response<U>
    where
        F: FnOnce(T) -> U,
    {
        Response {
            data: f(self.data),
            raw_body: self.raw_body,
            status: self.status,
            headers: self.headers,
            latency: self.latency,
            attempts: self.attempts,
        }
    }

    /// Returns `true` if more than one attempt was needed.
    pub fn was_retried(&self) -> bool {
        self.attempts > 1
    }

    /// Returns a header value by name, if present and valid UTF-8.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name)?.to_str().ok()
    }

    /// Discards the metadata.
    pub fn into_data(self) -> T {
        self.data
    }
}

impl<T> AsRef<T> for Response<T> {
    fn as_ref(&self) -> &T {
        &self.data
    }
}

impl<T> std::ops::Deref for Response<T> {
    type Target = T;

    fn deref(&self) -> &Self::Target {
        &self.data
    }
}

/// Turns a raw response into a decoded value or a classified error.
pub(crate) async fn interpret<T>(
    raw: RawResponse,
    decoder: &Decoder<T>,
    method: &Method,
    started: Instant,
    attempt: usize,
) -> Result<Response<T>> {
    let status = raw.status;
    let headers = raw.headers.clone();
    let url = raw.url.clone();

    if !status.is_success() {
        return Err(status_error(raw).await);
    }

    let content_type = raw.content_type();
    let body = raw.read_body().await?;
    let raw_body = String::from_utf8_lossy(&body).into_owned();

    let value = if is_bodiless(method, status, &body) {
        Value::Null
    } else {
        match serde_json::from_slice::<Value>(&body) {
            Ok(value) => value,
            Err(e) => {
                tracing::warn!(
                    error = %e,
                    status = status.as_u16(),
                    content_type = content_type.as_deref().unwrap_or("unknown"),
                    "Response body is not valid JSON"
                );
                let mut err = FetcherError::new(
                    FetcherErrorKind::Parse,
                    format!("Failed to parse response as JSON: {}", e),
                    url,
                )
                .with_status(status)
                .with_source(e);
                err.content_type = content_type;
                err.body_preview = Some(raw_body.chars().take(BODY_PREVIEW_CHARS).collect());
                return Err(err.into());
            }
        }
    };

    let data = decode(decoder, value, &url, status)?;

    Ok(Response::new(
        data,
        raw_body,
        status,
        headers,
        started.elapsed(),
        attempt,
    ))
}

fn decode<T>(decoder: &Decoder<T>, value: Value, url: &str, status: StatusCode) -> Result<T> {
    match decoder {
        Decoder::Implicit(decode) => decode(&value).map_err(|e| {
            let err = FetcherError::new(
                FetcherErrorKind::Parse,
                format!("Response body does not match the expected type: {}", e),
                url,
            )
            .with_status(status)
            .with_source(e);
            Error::from(err.with_response_data(value.clone()))
        }),
        Decoder::Schema(schema) => schema.validate(&value).map_err(|mut issues| {
            if issues.is_empty() {
                issues.push(Issue::root("payload rejected by schema"));
            }
            tracing::warn!(
                url = %url,
                issues = issues.len(),
                "Response failed schema validation"
            );
            Error::from(ValidationError::new(url, issues, value.clone()))
        }),
    }
}

async fn status_error(raw: RawResponse) -> Error {
    let status = raw.status;
    let url = raw.url.clone();
    let hint = retry_hint(&raw.headers);

    let response_data = match raw.read_body().await {
        Ok(body) => serde_json::from_slice::<Value>(&body).ok(),
        Err(err) if err.kind == FetcherErrorKind::Cancelled => return err.into(),
        Err(_) => None,
    };

    let message = if status == StatusCode::TOO_MANY_REQUESTS {
        rate_limit_message(hint)
    } else {
        response_data
            .as_ref()
            .and_then(error_message)
            .unwrap_or_else(|| {
                format!(
                    "HTTP error {} {}",
                    status.as_u16(),
                    status.canonical_reason().unwrap_or("Unknown Status")
                )
            })
    };

    if status.is_client_error() {
        tracing::error!(
            status = status.as_u16(),
            url = %url,
            error_message = %message,
            "Client error (4xx)"
        );
    } else {
        tracing::warn!(
            status = status.as_u16(),
            url = %url,
            error_message = %message,
            "Server error"
        );
    }

    let mut err = FetcherError::new(FetcherErrorKind::HttpStatus, message, url).with_status(status);
    err.response_data = response_data;
    err.retry_after = hint;
    err.into()
}

/// Pulls a message out of common JSON error shapes:
/// `{"message": ..}`, `{"error": ..}` and `{"error": {"message": ..}}`.
fn error_message(data: &Value) -> Option<String> {
    let candidate = data
        .get("message")
        .or_else(|| data.get("error"))?;
    match candidate {
        Value::String(message) if !message.is_empty() => Some(message.clone()),
        Value::Object(_) => candidate
            .get("message")
            .and_then(Value::as_str)
            .map(str::to_string),
        _ => None,
    }
}

fn is_bodiless(method: &Method, status: StatusCode, body: &[u8]) -> bool {
    *method == Method::HEAD
        || status == StatusCode::NO_CONTENT
        || status == StatusCode::RESET_CONTENT
        || body.iter().all(u8::is_ascii_whitespace)
}
