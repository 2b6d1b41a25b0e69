//! # Fetchwise - a resilient, schema-validated HTTP fetch layer
//!
//! Fetchwise is a typed HTTP client built on top of `reqwest` for calling
//! first- and third-party JSON APIs from both server-side and browser-facing
//! code. Every call goes through the same pipeline:
//!
//! 1. **URL resolution** - relative paths stay relative in a browser context
//!    and are anchored to the configured site URL on the server.
//! 2. **Request building** - POST/PUT/PATCH bodies are encoded as JSON (or
//!    text), then caller headers are applied on top.
//! 3. **Attempts** - each attempt has a hard timeout and honours an optional
//!    cancellation token.
//! 4. **Interpretation** - status classification, JSON parsing and optional
//!    schema validation.
//! 5. **Retries** - exponential backoff for failures that can succeed on a
//!    second try; validation errors and 4xx (except 429) are final.
//!
//! ## Quick Start
//!
//! ```no_run
//! use fetchwise::{Fetcher, FetcherOptions, SiteConfig};
//! use fetchwise::schema::SerdeSchema;
//! use serde::{Deserialize, Serialize};
//! use std::time::Duration;
//!
//! #[derive(Deserialize)]
//! struct Message {
//!     id: u64,
//!     body: String,
//! }
//!
//! #[derive(Serialize)]
//! struct Contact {
//!     email: String,
//! }
//!
//! #[tokio::main]
//! async fn main() -> Result<(), fetchwise::Error> {
//!     let fetcher = Fetcher::builder()
//!         .site_config(SiteConfig::default().site_url("https://example.com"))
//!         .build()?;
//!
//!     let messages = fetcher
//!         .get(
//!             "/api/v1/messages",
//!             FetcherOptions::new()
//!                 .retries(2)
//!                 .retry_delay(Duration::from_millis(500))
//!                 .schema(SerdeSchema::<Vec<Message>>::new()),
//!             None,
//!         )
//!         .await?;
//!     for message in messages.iter() {
//!         println!("#{}: {}", message.id, message.body);
//!     }
//!
//!     let contact = Contact { email: "hi@example.com".to_string() };
//!     let ack = fetcher
//!         .post("/api/contact", Some(&contact), FetcherOptions::new(), None)
//!         .await?;
//!     println!("Server said: {}", ack.data);
//!
//!     Ok(())
//! }
//! ```
//!
//! ## Error Handling
//!
//! Errors come in two tiers, both carrying the URL and attempt number:
//!
//! ```no_run
//! use fetchwise::{Error, Fetcher, FetcherErrorKind, FetcherOptions};
//!
//! # async fn example() -> Result<(), Error> {
//! # let fetcher = Fetcher::builder().build()?;
//! match fetcher.get("https://api.example.com/feed", FetcherOptions::new(), None).await {
//!     Ok(response) => println!("Got {}", response.data),
//!     Err(Error::Validation(err)) => {
//!         eprintln!("Payload did not match:\n{}", err.problems);
//!     }
//!     Err(Error::Fetcher(err)) => match err.kind {
//!         FetcherErrorKind::HttpStatus => eprintln!("HTTP {:?}: {}", err.status, err.message),
//!         FetcherErrorKind::Parse => eprintln!("Not JSON: {:?}", err.body_preview),
//!         _ => eprintln!("{}", err),
//!     },
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Logging
//!
//! The crate emits `tracing` events for each attempt, failure and retry but
//! never installs a subscriber. Terminal errors can additionally be routed to
//! any sink through [`FetcherOptions::on_error`].

mod client;
mod error;
mod options;
pub mod query;
pub mod rate_limit;
mod request;
pub mod resolve;
mod response;
pub mod retry;
pub mod schema;
mod transport;

pub use client::{Fetcher, FetcherBuilder};
pub use error::{Error, FetcherError, FetcherErrorKind, Result, ValidationError};
pub use options::{ErrorHook, FetcherOptions};
pub use query::{QueryParams, QueryValue};
pub use request::{BodyEncoding, RequestBody, RequestDescriptor};
pub use resolve::{ExecutionContext, SiteConfig, UrlResolver};
pub use response::Response;
pub use retry::{RetryPolicy, RetryPredicate};
pub use tokio_util::sync::CancellationToken;
