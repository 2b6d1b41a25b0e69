//! Environment-aware URL resolution.
//!
//! Browser-facing code can hand relative URLs straight to the platform, which
//! resolves them against the page origin and attaches cookies. Server-side
//! code has no origin to resolve against, so relative paths are anchored to
//! the first configured base: an explicit site URL, then the platform's
//! deployment URL, then a localhost fallback.

use crate::query::{append_query, QueryParams};
use crate::{FetcherError, Result};
use url::Url;

/// Default base used on the server when nothing else is configured.
pub const DEFAULT_LOCALHOST: &str = "http://localhost:3000";

/// Where the calling code runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExecutionContext {
    /// Relative URLs are left for the browser to resolve.
    Browser,
    /// Relative URLs are made absolute before dispatch.
    #[default]
    Server,
}

/// Candidate base URLs for server-side resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SiteConfig {
    /// Explicitly configured public site URL.
    pub site_url: Option<String>,
    /// Host (or URL) provided by the deployment platform.
    pub deployment_url: Option<String>,
    /// Used when neither of the above is set.
    pub localhost_fallback: String,
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            site_url: None,
            deployment_url: None,
            localhost_fallback: DEFAULT_LOCALHOST.to_string(),
        }
    }
}

impl SiteConfig {
    /// Reads the site configuration from the environment.
    ///
    /// - `SITE_URL`: explicit site URL
    /// - `DEPLOYMENT_URL`: platform deployment host; `https://` is assumed
    ///   when no scheme is given
    ///
    /// Unset or blank variables are ignored.
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let read = |name: &str| {
            lookup(name)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };
        Self {
            site_url: read("SITE_URL"),
            deployment_url: read("DEPLOYMENT_URL"),
            localhost_fallback: DEFAULT_LOCALHOST.to_string(),
        }
    }

    /// Sets the explicit site URL.
    pub fn site_url(mut self, url: impl Into<String>) -> Self {
        self.site_url = Some(url.into());
        self
    }

    /// Sets the platform deployment URL.
    pub fn deployment_url(mut self, url: impl Into<String>) -> Self {
        self.deployment_url = Some(url.into());
        self
    }

    /// Overrides the localhost fallback.
    pub fn localhost_fallback(mut self, url: impl Into<String>) -> Self {
        self.localhost_fallback = url.into();
        self
    }

    /// The base URL server-side requests resolve against.
    pub fn base_url(&self) -> String {
        if let Some(site) = &self.site_url {
            return site.clone();
        }
        if let Some(deployment) = &self.deployment_url {
            return if has_scheme(deployment) {
                deployment.clone()
            } else {
                format!("https://{}", deployment)
            };
        }
        self.localhost_fallback.clone()
    }
}

/// Turns a path plus query parameters into a dispatchable URL.
///
/// # Examples
///
/// ```
/// use fetchwise::{ExecutionContext, QueryParams, SiteConfig, UrlResolver};
///
/// let server = UrlResolver::new(
///     ExecutionContext::Server,
///     SiteConfig::default().deployment_url("my-site.example.app"),
/// );
/// let query = QueryParams::new().with("page", 2);
///
/// assert_eq!(
///     server.resolve("/api/v1/messages", Some(&query)).unwrap(),
///     "https://my-site.example.app/api/v1/messages?page=2"
/// );
///
/// let browser = UrlResolver::new(ExecutionContext::Browser, SiteConfig::default());
/// assert_eq!(browser.resolve("/api/v1/messages", None).unwrap(), "/api/v1/messages");
/// ```
#[derive(Debug, Clone, Default)]
pub struct UrlResolver {
    context: ExecutionContext,
    site: SiteConfig,
}

impl UrlResolver {
    /// Creates a resolver for the given context and site configuration.
    pub fn new(context: ExecutionContext, site: SiteConfig) -> Self {
        Self { context, site }
    }

    /// The execution context this resolver was built for.
    pub fn context(&self) -> ExecutionContext {
        self.context
    }

    /// The site configuration this resolver was built with.
    pub fn site(&self) -> &SiteConfig {
        &self.site
    }

    /// Resolves `path` and appends `query`.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the result is not a valid absolute
    /// URL when one is required.
    pub fn resolve(&self, path: &str, query: Option<&QueryParams>) -> Result<String> {
        if has_scheme(path) {
            let url = append_query(path, query);
            validate_absolute(&url)?;
            return Ok(url);
        }

        match self.context {
            ExecutionContext::Browser => Ok(append_query(path, query)),
            ExecutionContext::Server => {
                let base = self.site.base_url();
                let joined = join(&base, path);
                let url = append_query(&joined, query);
                validate_absolute(&url)?;
                Ok(url)
            }
        }
    }
}

fn join(base: &str, path: &str) -> String {
    let base = base.trim_end_matches('/');
    if path.is_empty() {
        return base.to_string();
    }
    if path.starts_with('/') || path.starts_with('?') {
        format!("{}{}", base, path)
    } else {
        format!("{}/{}", base, path)
    }
}

fn validate_absolute(url: &str) -> Result<()> {
    match Url::parse(url) {
        Ok(_) => Ok(()),
        Err(e) => {
            let err = FetcherError::configuration(format!("Invalid URL: {}", e), url);
            Err(err.with_source(e).into())
        }
    }
}

/// `true` for `scheme://...` URLs.
fn has_scheme(url: &str) -> bool {
    let Some((scheme, rest)) = url.split_once(':') else {
        return false;
    };
    let mut chars = scheme.chars();
    let valid_scheme = chars.next().is_some_and(|c| c.is_ascii_alphabetic())
        && chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'));
    valid_scheme && rest.starts_with("//")
}
