//! Wait hints carried by 429 responses.
//!
//! Servers announce when a rate-limited client may come back through
//! `Retry-After` (delay-seconds or an HTTP date) or a reset timestamp in
//! `X-RateLimit-Reset` / `RateLimit-Reset`. The hint is recorded on the
//! error, mentioned in its message, and used as the retry delay when the
//! caller opts in with [`FetcherOptions::respect_retry_after`](crate::FetcherOptions::respect_retry_after).

use http::HeaderMap;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Upper bound on a server-provided wait when the caller set no
/// `max_retry_delay`.
pub const DEFAULT_MAX_RATE_LIMIT_WAIT: Duration = Duration::from_secs(300);

/// Returns how long the server asked the client to wait, if it said so.
///
/// `Retry-After` wins over reset timestamps. Dates and timestamps already in
/// the past yield no hint.
pub fn retry_hint(headers: &HeaderMap) -> Option<Duration> {
    parse_retry_after(headers).or_else(|| {
        parse_reset(headers)?
            .duration_since(SystemTime::now())
            .ok()
    })
}

/// Builds the operator-facing message for a 429.
pub(crate) fn rate_limit_message(hint: Option<Duration>) -> String {
    match hint {
        Some(wait) => format!(
            "Rate limit exceeded (HTTP 429). The server asked to retry after {}s",
            wait.as_secs_f64().ceil() as u64
        ),
        None => "Rate limit exceeded (HTTP 429). Too many requests, slow down and retry later"
            .to_string(),
    }
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name)?.to_str().ok().map(str::trim)
}

fn parse_retry_after(headers: &HeaderMap) -> Option<Duration> {
    let value = header_str(headers, "retry-after")?;

    if let Ok(seconds) = value.parse::<u64>() {
        return Some(Duration::from_secs(seconds));
    }

    let date = httpdate::parse_http_date(value).ok()?;
    date.duration_since(SystemTime::now()).ok()
}

fn parse_reset(headers: &HeaderMap) -> Option<SystemTime> {
    ["x-ratelimit-reset", "ratelimit-reset"]
        .into_iter()
        .find_map(|name| header_str(headers, name)?.parse::<u64>().ok())
        .and_then(|timestamp| UNIX_EPOCH.checked_add(Duration::from_secs(timestamp)))
}
