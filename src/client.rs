//! The caller-facing fetch client and its retry loop.
//!
//! [`Fetcher`] resolves the URL, builds the request once, then runs attempts
//! until one succeeds, the retry budget is spent, or a failure is not worth
//! retrying. Use [`FetcherBuilder`] to configure and create one.

use crate::options::FetcherOptions;
use crate::query::QueryParams;
use crate::rate_limit::DEFAULT_MAX_RATE_LIMIT_WAIT;
use crate::request::RequestDescriptor;
use crate::resolve::{ExecutionContext, SiteConfig, UrlResolver};
use crate::retry::is_eligible;
use crate::transport::{self, Interrupted};
use crate::{response, Error, FetcherError, Response, Result};
use http::{HeaderMap, HeaderName, HeaderValue, Method};
use serde::Serialize;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// An HTTP client with selective retries, timeouts and response validation.
///
/// Cheap to clone; clones share the underlying connection pool. Each call is
/// independent and carries its own attempt counter.
///
/// # Examples
///
/// ```no_run
/// use fetchwise::{ExecutionContext, Fetcher, FetcherOptions, SiteConfig};
/// use fetchwise::schema::SerdeSchema;
/// use serde::{Deserialize, Serialize};
/// use std::time::Duration;
///
/// #[derive(Deserialize)]
/// struct Message {
///     id: u64,
///     body: String,
/// }
///
/// #[derive(Serialize)]
/// struct NewMessage {
///     body: String,
/// }
///
/// # async fn example() -> Result<(), fetchwise::Error> {
/// let fetcher = Fetcher::builder()
///     .context(ExecutionContext::Server)
///     .site_config(SiteConfig::default().site_url("https://example.com"))
///     .default_header("user-agent", "portfolio/1.0")?
///     .build()?;
///
/// // GET with validation and retries
/// let messages = fetcher
///     .get(
///         "/api/v1/messages",
///         FetcherOptions::new()
///             .retries(2)
///             .timeout(Duration::from_secs(5))
///             .schema(SerdeSchema::<Vec<Message>>::new()),
///         None,
///     )
///     .await?;
/// println!("{} messages", messages.data.len());
///
/// // POST without a schema yields raw JSON
/// let created = fetcher
///     .post(
///         "/api/v1/messages",
///         Some(&NewMessage { body: "hi".to_string() }),
///         FetcherOptions::new(),
///         None,
///     )
///     .await?;
/// println!("Created: {}", created.data);
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct Fetcher {
    inner: Arc<FetcherInner>,
}

struct FetcherInner {
    http_client: reqwest::Client,
    resolver: UrlResolver,
    default_headers: HeaderMap,
}

impl std::fmt::Debug for Fetcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Fetcher")
            .field("resolver", &self.inner.resolver)
            .field("default_headers", &self.inner.default_headers.len())
            .finish()
    }
}

impl Fetcher {
    /// Creates a new `FetcherBuilder`.
    pub fn builder() -> FetcherBuilder {
        FetcherBuilder::new()
    }

    /// The resolver used to turn paths into URLs.
    pub fn resolver(&self) -> &UrlResolver {
        &self.inner.resolver
    }

    /// Makes a request with any method.
    ///
    /// This is what the verb methods call. `body` is only sent for POST, PUT
    /// and PATCH. `options.on_error` runs with the terminal error, if any,
    /// before this returns.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use fetchwise::{Fetcher, FetcherOptions, QueryParams};
    /// use http::Method;
    ///
    /// # async fn example() -> Result<(), fetchwise::Error> {
    /// let fetcher = Fetcher::builder().build()?;
    /// let query = QueryParams::new().with("tag", vec!["rust", "http"]);
    ///
    /// let response = fetcher
    ///     .fetch::<(), _>(
    ///         Method::GET,
    ///         "https://api.example.com/posts",
    ///         None,
    ///         FetcherOptions::new(),
    ///         Some(&query),
    ///     )
    ///     .await?;
    /// println!("{}", response.data);
    /// # Ok(())
    /// # }
    /// ```
    pub async fn fetch<B, T>(
        &self,
        method: Method,
        url: &str,
        body: Option<&B>,
        options: FetcherOptions<T>,
        query: Option<&QueryParams>,
    ) -> Result<Response<T>>
    where
        B: Serialize + ?Sized,
    {
        let outcome = self.prepare_and_run(method, url, body, &options, query).await;

        if let Err(err) = &outcome {
            if let Some(hook) = &options.on_error {
                hook(err);
            }
        }

        outcome
    }

    async fn prepare_and_run<B, T>(
        &self,
        method: Method,
        path: &str,
        body: Option<&B>,
        options: &FetcherOptions<T>,
        query: Option<&QueryParams>,
    ) -> Result<Response<T>>
    where
        B: Serialize + ?Sized,
    {
        let url = self.inner.resolver.resolve(path, query)?;
        options.check(&url)?;

        let descriptor = RequestDescriptor::build(
            method,
            url,
            body,
            options.body_encoding,
            &self.inner.default_headers,
            &options.headers,
        )?;

        self.run(&descriptor, options).await
    }

    /// Runs attempts for `descriptor` until success or a terminal failure.
    async fn run<T>(
        &self,
        descriptor: &RequestDescriptor,
        options: &FetcherOptions<T>,
    ) -> Result<Response<T>> {
        let started = Instant::now();
        let policy = options.retry_policy();
        let mut attempt = 0;

        loop {
            attempt += 1;

            let error = match self.attempt(descriptor, options, started, attempt).await {
                Ok(response) => {
                    tracing::info!(
                        status = response.status.as_u16(),
                        latency_ms = response.latency.as_millis() as u64,
                        attempts = attempt,
                        "Received HTTP response"
                    );
                    return Ok(response);
                }
                Err(e) => e.with_attempt(attempt),
            };

            tracing::warn!(
                error = %error,
                attempt = attempt,
                method = %descriptor.method,
                url = %descriptor.url,
                "Request failed"
            );

            if !is_eligible(&error, attempt, options.retry_predicate.as_ref()) {
                return Err(error);
            }

            let Some(backoff) = policy.delay_for_attempt(attempt) else {
                return Err(error);
            };
            let delay = retry_delay(&error, backoff, options);

            tracing::info!(
                delay_ms = delay.as_millis() as u64,
                attempt = attempt,
                "Retrying request after delay"
            );

            if let Err(interrupted) = self.wait(delay, options).await {
                let err =
                    transport::interruption_error(interrupted, options.timeout, &descriptor.url);
                return Err(Error::from(err.with_attempt(attempt)));
            }
        }
    }

    async fn attempt<T>(
        &self,
        descriptor: &RequestDescriptor,
        options: &FetcherOptions<T>,
        started: Instant,
        attempt: usize,
    ) -> Result<Response<T>> {
        let raw = transport::execute(
            &self.inner.http_client,
            descriptor,
            options.timeout,
            options.cancel.as_ref(),
            attempt,
        )
        .await?;

        response::interpret(raw, &options.decoder, &descriptor.method, started, attempt).await
    }

    /// Sleeps for the backoff, waking early only for cancellation.
    async fn wait<T>(
        &self,
        delay: Duration,
        options: &FetcherOptions<T>,
    ) -> std::result::Result<(), Interrupted> {
        match &options.cancel {
            Some(token) => tokio::select! {
                biased;
                _ = token.cancelled() => Err(Interrupted::Cancelled),
                _ = tokio::time::sleep(delay) => Ok(()),
            },
            None => {
                tokio::time::sleep(delay).await;
                Ok(())
            }
        }
    }

    /// Makes a GET request.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use fetchwise::{Fetcher, FetcherOptions};
    /// use serde::Deserialize;
    ///
    /// #[derive(Deserialize)]
    /// struct Repo { stargazers_count: u64 }
    ///
    /// # async fn example() -> Result<(), fetchwise::Error> {
    /// let fetcher = Fetcher::builder().build()?;
    /// let repo = fetcher
    ///     .get(
    ///         "https://api.github.com/repos/rust-lang/rust",
    ///         FetcherOptions::new().decode_as::<Repo>(),
    ///         None,
    ///     )
    ///     .await?;
    /// println!("Stars: {}", repo.data.stargazers_count);
    /// # Ok(())
    /// # }
    /// ```
    pub async fn get<T>(
        &self,
        url: &str,
        options: FetcherOptions<T>,
        query: Option<&QueryParams>,
    ) -> Result<Response<T>> {
        self.fetch::<(), T>(Method::GET, url, None, options, query).await
    }

    /// Makes a POST request. `None` or a JSON-`null` body sends no body.
    pub async fn post<B, T>(
        &self,
        url: &str,
        body: Option<&B>,
        options: FetcherOptions<T>,
        query: Option<&QueryParams>,
    ) -> Result<Response<T>>
    where
        B: Serialize + ?Sized,
    {
        self.fetch(Method::POST, url, body, options, query).await
    }

    /// Makes a PUT request.
    pub async fn put<B, T>(
        &self,
        url: &str,
        body: Option<&B>,
        options: FetcherOptions<T>,
        query: Option<&QueryParams>,
    ) -> Result<Response<T>>
    where
        B: Serialize + ?Sized,
    {
        self.fetch(Method::PUT, url, body, options, query).await
    }

    /// Makes a PATCH request.
    pub async fn patch<B, T>(
        &self,
        url: &str,
        body: Option<&B>,
        options: FetcherOptions<T>,
        query: Option<&QueryParams>,
    ) -> Result<Response<T>>
    where
        B: Serialize + ?Sized,
    {
        self.fetch(Method::PATCH, url, body, options, query).await
    }

    /// Makes a DELETE request.
    pub async fn delete<T>(
        &self,
        url: &str,
        options: FetcherOptions<T>,
        query: Option<&QueryParams>,
    ) -> Result<Response<T>> {
        self.fetch::<(), T>(Method::DELETE, url, None, options, query).await
    }

    /// Makes an OPTIONS request.
    pub async fn options<T>(
        &self,
        url: &str,
        options: FetcherOptions<T>,
        query: Option<&QueryParams>,
    ) -> Result<Response<T>> {
        self.fetch::<(), T>(Method::OPTIONS, url, None, options, query).await
    }

    /// Makes a HEAD request. The decoded body is always JSON `null`.
    pub async fn head<T>(
        &self,
        url: &str,
        options: FetcherOptions<T>,
        query: Option<&QueryParams>,
    ) -> Result<Response<T>> {
        self.fetch::<(), T>(Method::HEAD, url, None, options, query).await
    }
}

/// Picks the wait before the next attempt.
///
/// A 429 with a server hint overrides the computed backoff when the caller
/// opted in; the hint is still capped.
fn retry_delay<T>(error: &Error, backoff: Duration, options: &FetcherOptions<T>) -> Duration {
    if !options.respect_retry_after {
        return backoff;
    }
    let hint = match error {
        Error::Fetcher(err) if err.is_rate_limited() => err.retry_after,
        _ => None,
    };
    match hint {
        Some(hint) => {
            let cap = options
                .max_retry_delay
                .unwrap_or(DEFAULT_MAX_RATE_LIMIT_WAIT);
            tracing::info!(
                retry_after_ms = hint.as_millis() as u64,
                max_wait_ms = cap.as_millis() as u64,
                "Rate limited - waiting for server hint before retry"
            );
            hint.min(cap)
        }
        None => backoff,
    }
}

/// Builder for configuring and creating a [`Fetcher`].
///
/// # Examples
///
/// ```no_run
/// use fetchwise::{ExecutionContext, FetcherBuilder, SiteConfig};
///
/// # fn example() -> Result<(), fetchwise::Error> {
/// let fetcher = FetcherBuilder::new()
///     .context(ExecutionContext::Server)
///     .site_config(SiteConfig::from_env())
///     .default_header("accept", "application/json")?
///     .build()?;
/// # Ok(())
/// # }
/// ```
pub struct FetcherBuilder {
    http_client: Option<reqwest::Client>,
    context: ExecutionContext,
    site: Option<SiteConfig>,
    default_headers: HeaderMap,
}

impl FetcherBuilder {
    /// Creates a builder for a server-context fetcher.
    pub fn new() -> Self {
        Self {
            http_client: None,
            context: ExecutionContext::Server,
            site: None,
            default_headers: HeaderMap::new(),
        }
    }

    /// Uses an existing `reqwest::Client` instead of creating one.
    pub fn http_client(mut self, client: reqwest::Client) -> Self {
        self.http_client = Some(client);
        self
    }

    /// Sets the execution context used for URL resolution.
    pub fn context(mut self, context: ExecutionContext) -> Self {
        self.context = context;
        self
    }

    /// Sets the base URL candidates. Defaults to [`SiteConfig::from_env`].
    pub fn site_config(mut self, site: SiteConfig) -> Self {
        self.site = Some(site);
        self
    }

    /// Adds a header sent with every request.
    ///
    /// # Errors
    ///
    /// Returns an error if the header name or value is invalid.
    pub fn default_header(mut self, name: impl AsRef<str>, value: impl AsRef<str>) -> Result<Self> {
        let name = HeaderName::try_from(name.as_ref()).map_err(|e| {
            FetcherError::configuration(format!("Invalid header name: {}", e), "")
        })?;
        let value = HeaderValue::try_from(value.as_ref()).map_err(|e| {
            FetcherError::configuration(format!("Invalid header value: {}", e), "")
        })?;
        self.default_headers.insert(name, value);
        Ok(self)
    }

    /// Builds the configured `Fetcher`.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be created.
    pub fn build(self) -> Result<Fetcher> {
        let http_client = match self.http_client {
            Some(client) => client,
            None => reqwest::Client::builder().build().map_err(|e| {
                FetcherError::configuration(format!("Failed to build HTTP client: {}", e), "")
            })?,
        };

        let site = self.site.unwrap_or_else(SiteConfig::from_env);

        Ok(Fetcher {
            inner: Arc::new(FetcherInner {
                http_client,
                resolver: UrlResolver::new(self.context, site),
                default_headers: self.default_headers,
            }),
        })
    }
}

impl Default for FetcherBuilder {
    fn default() -> Self {
        Self::new()
    }
}
