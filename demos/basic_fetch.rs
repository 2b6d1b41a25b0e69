//! Basic example demonstrating GET and POST requests with fetchwise.
//!
//! Relative paths are resolved against the site URL, the GET is retried on
//! transient failures, and the POST body is sent as JSON.
//!
//! Run with: `cargo run --example basic_fetch`

use fetchwise::{Error, Fetcher, FetcherOptions, QueryParams, SiteConfig};
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Deserialize)]
#[allow(dead_code)]
struct Post {
    #[serde(rename = "userId")]
    user_id: u32,
    id: u32,
    title: String,
    body: String,
}

#[derive(Debug, Serialize)]
struct NewPost {
    title: String,
    body: String,
    #[serde(rename = "userId")]
    user_id: u32,
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    // Initialize tracing for logging
    tracing_subscriber::fmt()
        .with_env_filter("fetchwise=debug,basic_fetch=info")
        .init();

    let fetcher = Fetcher::builder()
        .site_config(SiteConfig::default().site_url("https://jsonplaceholder.typicode.com"))
        .build()?;

    println!("=== GET Request Example ===");
    let response = fetcher
        .get(
            "/posts/1",
            FetcherOptions::new()
                .retries(2)
                .retry_delay(Duration::from_millis(500))
                .decode_as::<Post>(),
            None,
        )
        .await?;

    println!("Post ID: {}", response.data.id);
    println!("Title: {}", response.data.title);
    println!("Request latency: {:?}", response.latency);
    println!("Status code: {}", response.status);
    println!();

    println!("=== GET With Query Parameters ===");
    let query = QueryParams::new().with("userId", 1).with("_limit", 3);
    let posts = fetcher
        .get("/posts", FetcherOptions::new(), Some(&query))
        .await?;
    println!("Raw JSON: {}", posts.data);
    println!();

    println!("=== POST Request Example ===");
    let new_post = NewPost {
        title: "My New Post".to_string(),
        body: "This is the content of my new post!".to_string(),
        user_id: 1,
    };

    let response = fetcher
        .post(
            "/posts",
            Some(&new_post),
            FetcherOptions::new().decode_as::<Post>(),
            None,
        )
        .await?;

    println!("Created post ID: {}", response.data.id);
    println!("Status code: {}", response.status);
    println!("Content-Type: {:?}", response.header("content-type"));
    println!("Was retried: {}", response.was_retried());

    Ok(())
}
