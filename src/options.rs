//! Per-call options.

use crate::request::BodyEncoding;
use crate::retry::{RetryPolicy, RetryPredicate};
use crate::schema::Schema;
use crate::{Error, FetcherError, Result};
use http::{HeaderMap, HeaderName, HeaderValue};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Default number of retries after the first attempt.
pub const DEFAULT_RETRIES: u32 = 0;
/// Default base delay for exponential backoff.
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_millis(1000);
/// Default per-attempt timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(10_000);

/// Callback invoked with the terminal error of a call, before it is returned.
pub type ErrorHook = Arc<dyn Fn(&Error) + Send + Sync>;

/// How a 2xx JSON body becomes a `T`.
pub(crate) enum Decoder<T> {
    /// No schema was supplied; `T`'s `Deserialize` impl is used and a
    /// mismatch is a parse error.
    Implicit(fn(&Value) -> serde_json::Result<T>),
    /// A schema was supplied; a mismatch is a validation error.
    Schema(Arc<dyn Schema<T>>),
}

impl<T> Clone for Decoder<T> {
    fn clone(&self) -> Self {
        match self {
            Decoder::Implicit(decode) => Decoder::Implicit(*decode),
            Decoder::Schema(schema) => Decoder::Schema(Arc::clone(schema)),
        }
    }
}

fn implicit<T: DeserializeOwned>(value: &Value) -> serde_json::Result<T> {
    T::deserialize(value)
}

/// Options for a single fetch call.
///
/// The type parameter is the decoded success type. [`FetcherOptions::new`]
/// decodes into a raw [`serde_json::Value`]; [`FetcherOptions::schema`] and
/// [`FetcherOptions::decode_as`] switch to a typed result.
///
/// # Examples
///
/// ```
/// use fetchwise::{BodyEncoding, FetcherOptions};
/// use fetchwise::schema::SerdeSchema;
/// use serde::Deserialize;
/// use std::time::Duration;
///
/// #[derive(Deserialize)]
/// struct Message { id: u64 }
///
/// # fn example() -> Result<(), fetchwise::Error> {
/// let options = FetcherOptions::new()
///     .retries(2)
///     .retry_delay(Duration::from_millis(250))
///     .timeout(Duration::from_secs(5))
///     .header("x-request-source", "portfolio")?
///     .body_encoding(BodyEncoding::Json)
///     .schema(SerdeSchema::<Vec<Message>>::new());
///
/// assert!(options.has_schema());
/// # Ok(())
/// # }
/// ```
pub struct FetcherOptions<T = Value> {
    pub(crate) retries: u32,
    pub(crate) retry_delay: Duration,
    pub(crate) max_retry_delay: Option<Duration>,
    pub(crate) jitter: bool,
    pub(crate) timeout: Duration,
    pub(crate) headers: HeaderMap,
    pub(crate) decoder: Decoder<T>,
    pub(crate) on_error: Option<ErrorHook>,
    pub(crate) body_encoding: BodyEncoding,
    pub(crate) cancel: Option<CancellationToken>,
    pub(crate) respect_retry_after: bool,
    pub(crate) retry_predicate: Option<Arc<dyn RetryPredicate>>,
}

impl FetcherOptions<Value> {
    /// Default options: no retries, 1s base backoff, 10s timeout, JSON bodies,
    /// result decoded as raw JSON.
    pub fn new() -> Self {
        Self {
            retries: DEFAULT_RETRIES,
            retry_delay: DEFAULT_RETRY_DELAY,
            max_retry_delay: None,
            jitter: false,
            timeout: DEFAULT_TIMEOUT,
            headers: HeaderMap::new(),
            decoder: Decoder::Implicit(implicit::<Value>),
            on_error: None,
            body_encoding: BodyEncoding::Json,
            cancel: None,
            respect_retry_after: false,
            retry_predicate: None,
        }
    }
}

impl Default for FetcherOptions<Value> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> FetcherOptions<T> {
    /// Number of retries after the first attempt.
    pub fn retries(mut self, retries: u32) -> Self {
        self.retries = retries;
        self
    }

    /// Base delay of the exponential backoff. Must be non-zero.
    pub fn retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    /// Caps each backoff delay, and any server-provided rate-limit wait.
    pub fn max_retry_delay(mut self, max: Duration) -> Self {
        self.max_retry_delay = Some(max);
        self
    }

    /// Randomizes each backoff delay to 50-100% of its computed value.
    pub fn jitter(mut self, jitter: bool) -> Self {
        self.jitter = jitter;
        self
    }

    /// Hard limit for one attempt, body included. Must be non-zero.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Adds a request header. Applied after body encoding, so it can
    /// override the encoding's `Content-Type`.
    ///
    /// # Errors
    ///
    /// Returns an error if the header name or value is invalid.
    pub fn header(mut self, name: impl AsRef<str>, value: impl AsRef<str>) -> Result<Self> {
        let name = HeaderName::try_from(name.as_ref()).map_err(|e| {
            FetcherError::configuration(format!("Invalid header name: {}", e), "")
        })?;
        let value = HeaderValue::try_from(value.as_ref()).map_err(|e| {
            FetcherError::configuration(format!("Invalid header value: {}", e), "")
        })?;
        self.headers.insert(name, value);
        Ok(self)
    }

    /// Adds every header from `headers`.
    pub fn headers(mut self, headers: HeaderMap) -> Self {
        self.headers.extend(headers);
        self
    }

    /// Called with the terminal error of the call before it is returned.
    pub fn on_error<F>(mut self, hook: F) -> Self
    where
        F: Fn(&Error) + Send + Sync + 'static,
    {
        self.on_error = Some(Arc::new(hook));
        self
    }

    /// How POST/PUT/PATCH bodies are encoded.
    pub fn body_encoding(mut self, encoding: BodyEncoding) -> Self {
        self.body_encoding = encoding;
        self
    }

    /// Aborts the in-flight attempt (and any pending retry) when cancelled.
    pub fn cancel_token(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    /// Waits for the server's `Retry-After` hint on 429 instead of the
    /// computed backoff.
    pub fn respect_retry_after(mut self, respect: bool) -> Self {
        self.respect_retry_after = respect;
        self
    }

    /// Further restricts which failures are retried.
    ///
    /// The predicate is only consulted for failures that are retryable in
    /// the first place; it cannot make a validation error or a 4xx retryable.
    pub fn retry_predicate(mut self, predicate: impl RetryPredicate + 'static) -> Self {
        self.retry_predicate = Some(Arc::new(predicate));
        self
    }

    /// Validates 2xx bodies with `schema`, typing the result as `U`.
    pub fn schema<U, S>(self, schema: S) -> FetcherOptions<U>
    where
        S: Schema<U> + 'static,
    {
        self.with_decoder(Decoder::Schema(Arc::new(schema)))
    }

    /// Decodes 2xx bodies into `U` without schema validation.
    ///
    /// A mismatch is reported as a parse error rather than a validation error.
    pub fn decode_as<U: DeserializeOwned>(self) -> FetcherOptions<U> {
        self.with_decoder(Decoder::Implicit(implicit::<U>))
    }

    /// Returns `true` if a schema was supplied.
    pub fn has_schema(&self) -> bool {
        matches!(self.decoder, Decoder::Schema(_))
    }

    fn with_decoder<U>(self, decoder: Decoder<U>) -> FetcherOptions<U> {
        FetcherOptions {
            retries: self.retries,
            retry_delay: self.retry_delay,
            max_retry_delay: self.max_retry_delay,
            jitter: self.jitter,
            timeout: self.timeout,
            headers: self.headers,
            decoder,
            on_error: self.on_error,
            body_encoding: self.body_encoding,
            cancel: self.cancel,
            respect_retry_after: self.respect_retry_after,
            retry_predicate: self.retry_predicate,
        }
    }

    /// Rejects zero durations.
    pub(crate) fn check(&self, url: &str) -> std::result::Result<(), FetcherError> {
        if self.retry_delay.is_zero() {
            return Err(FetcherError::configuration(
                "retry delay must be greater than zero",
                url,
            ));
        }
        if self.timeout.is_zero() {
            return Err(FetcherError::configuration(
                "timeout must be greater than zero",
                url,
            ));
        }
        Ok(())
    }

    pub(crate) fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            retries: self.retries,
            base_delay: self.retry_delay,
            max_delay: self.max_retry_delay,
            jitter: self.jitter,
        }
    }
}

impl<T> Clone for FetcherOptions<T> {
    fn clone(&self) -> Self {
        Self {
            retries: self.retries,
            retry_delay: self.retry_delay,
            max_retry_delay: self.max_retry_delay,
            jitter: self.jitter,
            timeout: self.timeout,
            headers: self.headers.clone(),
            decoder: self.decoder.clone(),
            on_error: self.on_error.clone(),
            body_encoding: self.body_encoding,
            cancel: self.cancel.clone(),
            respect_retry_after: self.respect_retry_after,
            retry_predicate: self.retry_predicate.clone(),
        }
    }
}

impl<T> fmt::Debug for FetcherOptions<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FetcherOptions")
            .field("retries", &self.retries)
            .field("retry_delay", &self.retry_delay)
            .field("max_retry_delay", &self.max_retry_delay)
            .field("jitter", &self.jitter)
            .field("timeout", &self.timeout)
            .field("headers", &self.headers)
            .field("schema", &self.has_schema())
            .field("on_error", &self.on_error.is_some())
            .field("body_encoding", &self.body_encoding)
            .field("cancellable", &self.cancel.is_some())
            .field("respect_retry_after", &self.respect_retry_after)
            .finish()
    }
}
