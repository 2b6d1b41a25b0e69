//! Error types for fetch calls.
//!
//! Every failure is reported as one of two tiers:
//!
//! - [`FetcherError`] for anything that went wrong before a usable body was
//!   decoded: network failures, timeouts, cancellation, request-body
//!   serialization, non-2xx statuses and unparseable response bodies.
//! - [`ValidationError`] for a body that parsed fine but did not satisfy the
//!   schema supplied by the caller.
//!
//! Both keep the URL, the attempt index and whatever payload was received so
//! the terminal error of a retried call is still diagnosable.

use crate::schema::Issues;
use http::StatusCode;
use serde_json::Value;
use std::fmt;
use std::time::Duration;

type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Coarse classification of a [`FetcherError`].
///
/// The retry scheduler only looks at this kind (plus the status code for
/// [`FetcherErrorKind::HttpStatus`]) to decide whether another attempt can help.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FetcherErrorKind {
    /// Connection, DNS, TLS or body-stream failure.
    Network,
    /// The attempt did not finish before its deadline.
    Timeout,
    /// The caller's cancellation token fired.
    Cancelled,
    /// The request body could not be encoded.
    Serialization,
    /// The server answered with a non-2xx status.
    HttpStatus,
    /// A 2xx body was not valid JSON, or did not decode into the expected type.
    Parse,
    /// Invalid URL, header or option values.
    Configuration,
}

impl FetcherErrorKind {
    /// Short lowercase label, used in log fields.
    pub fn as_str(&self) -> &'static str {
        match self {
            FetcherErrorKind::Network => "network",
            FetcherErrorKind::Timeout => "timeout",
            FetcherErrorKind::Cancelled => "cancelled",
            FetcherErrorKind::Serialization => "serialization",
            FetcherErrorKind::HttpStatus => "http_status",
            FetcherErrorKind::Parse => "parse",
            FetcherErrorKind::Configuration => "configuration",
        }
    }
}

impl fmt::Display for FetcherErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A transport-level failure.
///
/// # Examples
///
/// ```
/// use fetchwise::{FetcherError, FetcherErrorKind};
/// use http::StatusCode;
///
/// let err = FetcherError::new(FetcherErrorKind::HttpStatus, "Not found", "https://api.example.com/x")
///     .with_status(StatusCode::NOT_FOUND)
///     .with_attempt(1);
///
/// assert_eq!(
///     err.to_string(),
///     "FetcherError: Not found (url: https://api.example.com/x, status: 404, attempt: 1)"
/// );
/// ```
#[derive(thiserror::Error, Debug)]
#[error("FetcherError: {message} (url: {url}{})", context_suffix(.status, .attempt))]
pub struct FetcherError {
    /// What kind of failure this is.
    pub kind: FetcherErrorKind,
    /// Human-readable description.
    pub message: String,
    /// The URL the request was dispatched to (or the unresolved path if
    /// resolution itself failed).
    pub url: String,
    /// HTTP status, when a response was received.
    pub status: Option<StatusCode>,
    /// Decoded error body for non-2xx responses, when it was JSON.
    pub response_data: Option<Value>,
    /// The attempt that produced this error (1-indexed).
    pub attempt: Option<usize>,
    /// Content type of an unparseable 2xx body.
    pub content_type: Option<String>,
    /// First 200 characters of an unparseable 2xx body.
    pub body_preview: Option<String>,
    /// Wait hint from `Retry-After` / `X-RateLimit-Reset` on a 429.
    pub retry_after: Option<Duration>,
    #[source]
    source: Option<BoxError>,
}

impl FetcherError {
    /// Creates an error of the given kind with no response context.
    pub fn new(kind: FetcherErrorKind, message: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            url: url.into(),
            status: None,
            response_data: None,
            attempt: None,
            content_type: None,
            body_preview: None,
            retry_after: None,
            source: None,
        }
    }

    pub(crate) fn configuration(message: impl Into<String>, url: impl Into<String>) -> Self {
        Self::new(FetcherErrorKind::Configuration, message, url)
    }

    /// Attaches the HTTP status.
    pub fn with_status(mut self, status: StatusCode) -> Self {
        self.status = Some(status);
        self
    }

    /// Attaches the attempt index.
    pub fn with_attempt(mut self, attempt: usize) -> Self {
        self.attempt = Some(attempt);
        self
    }

    /// Attaches the decoded response payload.
    pub fn with_response_data(mut self, data: Value) -> Self {
        self.response_data = Some(data);
        self
    }

    pub(crate) fn with_source(
        mut self,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        self.source = Some(Box::new(source));
        self
    }

    /// Returns `true` if another attempt could plausibly succeed.
    ///
    /// 429 is retryable, every other 4xx is not. Network failures, timeouts,
    /// 5xx and unparseable bodies are retryable. Serialization,
    /// configuration and cancellation are final.
    pub fn is_retryable(&self) -> bool {
        match self.kind {
            FetcherErrorKind::Network | FetcherErrorKind::Timeout | FetcherErrorKind::Parse => true,
            FetcherErrorKind::HttpStatus => match self.status {
                Some(status) if status == StatusCode::TOO_MANY_REQUESTS => true,
                Some(status) => !status.is_client_error(),
                None => true,
            },
            FetcherErrorKind::Serialization
            | FetcherErrorKind::Configuration
            | FetcherErrorKind::Cancelled => false,
        }
    }

    /// Returns `true` if the server answered 429.
    pub fn is_rate_limited(&self) -> bool {
        self.status == Some(StatusCode::TOO_MANY_REQUESTS)
    }
}

/// Renders `, status: 404, attempt: 2` for whichever of the two is known.
fn context_suffix(status: &Option<StatusCode>, attempt: &Option<usize>) -> String {
    let mut suffix = String::new();
    if let Some(status) = status {
        suffix.push_str(&format!(", status: {}", status.as_u16()));
    }
    if let Some(attempt) = attempt {
        suffix.push_str(&format!(", attempt: {}", attempt));
    }
    suffix
}

/// A response body that parsed but did not satisfy the caller's schema.
///
/// Never retried: the same body would fail the same way.
#[derive(thiserror::Error, Debug, Clone)]
#[error(
    "ValidationError: {message} (url: {url}{})\n{problems}",
    context_suffix(&None, .attempt)
)]
pub struct ValidationError {
    /// Human-readable summary.
    pub message: String,
    /// The URL the request was dispatched to.
    pub url: String,
    /// The formatted issue tree.
    pub problems: String,
    /// The individual issues behind `problems`.
    pub issues: Issues,
    /// The decoded body that failed validation.
    pub response_data: Value,
    /// The attempt that produced this error (1-indexed).
    pub attempt: Option<usize>,
}

impl ValidationError {
    /// Creates a validation error from the issues reported by a schema.
    pub fn new(url: impl Into<String>, issues: Issues, response_data: Value) -> Self {
        Self {
            message: "Response validation failed".to_string(),
            url: url.into(),
            problems: issues.to_tree(),
            issues,
            response_data,
            attempt: None,
        }
    }

    /// Attaches the attempt index.
    pub fn with_attempt(mut self, attempt: usize) -> Self {
        self.attempt = Some(attempt);
        self
    }
}

/// The error returned by every fetch call.
///
/// # Examples
///
/// ```no_run
/// use fetchwise::{Error, Fetcher, FetcherErrorKind, FetcherOptions};
///
/// # async fn example() -> Result<(), Error> {
/// let fetcher = Fetcher::builder().build()?;
///
/// match fetcher.get("/api/v1/messages", FetcherOptions::new(), None).await {
///     Ok(response) => println!("Got {}", response.data),
///     Err(Error::Validation(err)) => eprintln!("Unexpected shape:\n{}", err.problems),
///     Err(Error::Fetcher(err)) if err.kind == FetcherErrorKind::Timeout => {
///         eprintln!("Timed out after {:?} attempts", err.attempt)
///     }
///     Err(e) => eprintln!("{}", e),
/// }
/// # Ok(())
/// # }
/// ```
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// Transport, status, serialization or parse failure.
    #[error(transparent)]
    Fetcher(#[from] FetcherError),

    /// Schema validation failure.
    #[error(transparent)]
    Validation(#[from] ValidationError),
}

impl Error {
    /// Returns `true` if the retry scheduler may try again after this error.
    ///
    /// # Examples
    ///
    /// ```
    /// use fetchwise::{Error, FetcherError, FetcherErrorKind};
    /// use http::StatusCode;
    ///
    /// let server = Error::from(
    ///     FetcherError::new(FetcherErrorKind::HttpStatus, "boom", "/x")
    ///         .with_status(StatusCode::INTERNAL_SERVER_ERROR),
    /// );
    /// assert!(server.is_retryable());
    ///
    /// let client = Error::from(
    ///     FetcherError::new(FetcherErrorKind::HttpStatus, "bad", "/x")
    ///         .with_status(StatusCode::BAD_REQUEST),
    /// );
    /// assert!(!client.is_retryable());
    /// ```
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::Fetcher(err) => err.is_retryable(),
            Error::Validation(_) => false,
        }
    }

    /// Returns the failure kind for transport-tier errors.
    pub fn kind(&self) -> Option<FetcherErrorKind> {
        match self {
            Error::Fetcher(err) => Some(err.kind),
            Error::Validation(_) => None,
        }
    }

    /// Returns the HTTP status code if a response was received.
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            Error::Fetcher(err) => err.status,
            Error::Validation(_) => None,
        }
    }

    /// Returns the attempt that produced this error.
    pub fn attempt(&self) -> Option<usize> {
        match self {
            Error::Fetcher(err) => err.attempt,
            Error::Validation(err) => err.attempt,
        }
    }

    /// Returns the URL the failing request targeted.
    pub fn url(&self) -> &str {
        match self {
            Error::Fetcher(err) => &err.url,
            Error::Validation(err) => &err.url,
        }
    }

    /// Returns the decoded payload attached to the error, if any.
    pub fn response_data(&self) -> Option<&Value> {
        match self {
            Error::Fetcher(err) => err.response_data.as_ref(),
            Error::Validation(err) => Some(&err.response_data),
        }
    }

    pub(crate) fn with_attempt(self, attempt: usize) -> Self {
        match self {
            Error::Fetcher(err) => Error::Fetcher(err.with_attempt(attempt)),
            Error::Validation(err) => Error::Validation(err.with_attempt(attempt)),
        }
    }
}

/// A specialized `Result` type for fetch calls.
pub type Result<T> = std::result::Result<T, Error>;
