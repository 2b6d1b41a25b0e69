//! Example demonstrating schema validation and error handling.
//!
//! This example shows how to:
//! - Validate a response with a serde-backed schema
//! - Write a hand-rolled schema that reports every problem it finds
//! - Tell validation failures apart from transport failures
//! - Route terminal errors to a logging hook
//!
//! Run with: `cargo run --example validated_fetch`

use fetchwise::retry::{AnyOf, RetryOn5xx, RetryOnTimeout};
use fetchwise::schema::{self, Issue, Issues, SerdeSchema};
use fetchwise::{Error, Fetcher, FetcherErrorKind, FetcherOptions, SiteConfig};
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;

#[derive(Debug, Deserialize)]
#[allow(dead_code)]
struct User {
    id: u32,
    name: String,
    email: String,
}

fn log_failure(error: &Error) {
    tracing::error!(error = %error, retryable = error.is_retryable(), "Fetch failed");
}

fn report(error: Error) {
    match error {
        Error::Validation(err) => {
            println!("Payload from {} did not match:", err.url);
            println!("{}", err.problems);
        }
        Error::Fetcher(err) => match err.kind {
            FetcherErrorKind::HttpStatus => println!(
                "HTTP {:?} after {:?} attempt(s): {}",
                err.status, err.attempt, err.message
            ),
            FetcherErrorKind::Timeout => println!("Timed out: {}", err.message),
            FetcherErrorKind::Parse => println!("Not JSON, starts with: {:?}", err.body_preview),
            _ => println!("Failed: {}", err),
        },
    }
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    tracing_subscriber::fmt()
        .with_env_filter("fetchwise=info,validated_fetch=info")
        .init();

    let fetcher = Fetcher::builder()
        .site_config(SiteConfig::default().site_url("https://jsonplaceholder.typicode.com"))
        .default_header("accept", "application/json")?
        .build()?;

    println!("=== Serde Schema ===");
    let users = fetcher
        .get(
            "/users",
            FetcherOptions::new()
                .timeout(Duration::from_secs(5))
                .schema(SerdeSchema::<Vec<User>>::new()),
            None,
        )
        .await?;
    println!("Fetched {} users", users.len());
    println!();

    println!("=== Hand-written Schema ===");
    // Posts have no "email" field, so every element is reported
    let emails = schema::from_fn(|value: &Value| {
        let items = value
            .as_array()
            .ok_or_else(|| Issues::from(Issue::root("expected an array")))?;
        let mut issues = Issues::default();
        let mut emails = Vec::new();
        for (index, item) in items.iter().take(3).enumerate() {
            match item.get("email").and_then(Value::as_str) {
                Some(email) => emails.push(email.to_string()),
                None => issues.push(Issue::new(
                    vec![index.into(), "email".into()],
                    "expected string",
                )),
            }
        }
        if issues.is_empty() {
            Ok(emails)
        } else {
            Err(issues)
        }
    });

    match fetcher
        .get(
            "/posts",
            FetcherOptions::new().schema(emails).on_error(log_failure),
            None,
        )
        .await
    {
        Ok(response) => println!("Emails: {:?}", response.data),
        Err(e) => report(e),
    }
    println!();

    println!("=== Missing Resource ===");
    let options = FetcherOptions::new()
        .retries(3)
        .retry_delay(Duration::from_millis(200))
        .retry_predicate(AnyOf::new(vec![
            Box::new(RetryOn5xx),
            Box::new(RetryOnTimeout),
        ]))
        .on_error(log_failure);

    // 404 is final, so only one attempt is made
    if let Err(e) = fetcher.get("/posts/999999", options, None).await {
        report(e);
    }

    Ok(())
}
