//! Request construction.
//!
//! A [`RequestDescriptor`] is built once per call and reused unchanged by
//! every attempt, body included.

use crate::{FetcherError, FetcherErrorKind};
use http::header::CONTENT_TYPE;
use http::{HeaderMap, HeaderValue, Method};
use serde::Serialize;
use serde_json::Value;

const JSON_CONTENT_TYPE: &str = "application/json";
const TEXT_CONTENT_TYPE: &str = "text/plain;charset=UTF-8";

/// How a request body is put on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BodyEncoding {
    /// Serialize as JSON with `Content-Type: application/json`.
    #[default]
    Json,
    /// Send as plain text. String values are sent verbatim, anything else
    /// as its JSON text.
    Text,
}

/// An encoded request body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequestBody {
    /// JSON text.
    Json(String),
    /// Raw text.
    Text(String),
}

impl RequestBody {
    /// The encoded body as a string.
    pub fn as_str(&self) -> &str {
        match self {
            RequestBody::Json(body) | RequestBody::Text(body) => body,
        }
    }
}

/// Everything needed to issue one attempt.
#[derive(Debug, Clone)]
pub struct RequestDescriptor {
    /// The HTTP method.
    pub method: Method,
    /// The resolved URL.
    pub url: String,
    /// Headers in application order.
    pub headers: HeaderMap,
    /// The encoded body, if one is sent.
    pub body: Option<RequestBody>,
    /// The encoding requested for the body.
    pub body_encoding: BodyEncoding,
}

impl RequestDescriptor {
    /// Builds a descriptor.
    ///
    /// Only POST, PUT and PATCH carry a body, and only when it is not JSON
    /// `null`. Headers are layered after encoding: `default_headers` first,
    /// then `headers`, each replacing earlier values for the same name.
    ///
    /// # Errors
    ///
    /// Returns a serialization error if the body cannot be encoded.
    ///
    /// # Examples
    ///
    /// ```
    /// use fetchwise::{BodyEncoding, RequestBody, RequestDescriptor};
    /// use http::{HeaderMap, Method};
    /// use serde_json::json;
    ///
    /// let descriptor = RequestDescriptor::build(
    ///     Method::POST,
    ///     "https://example.com/z".to_string(),
    ///     Some(&json!({ "a": 1 })),
    ///     BodyEncoding::Json,
    ///     &HeaderMap::new(),
    ///     &HeaderMap::new(),
    /// )
    /// .unwrap();
    ///
    /// assert_eq!(descriptor.body, Some(RequestBody::Json("{\"a\":1}".to_string())));
    /// assert_eq!(descriptor.headers["content-type"], "application/json");
    /// ```
    pub fn build<B>(
        method: Method,
        url: String,
        body: Option<&B>,
        body_encoding: BodyEncoding,
        default_headers: &HeaderMap,
        headers: &HeaderMap,
    ) -> Result<Self, FetcherError>
    where
        B: Serialize + ?Sized,
    {
        let mut descriptor = Self {
            method,
            url,
            headers: HeaderMap::new(),
            body: None,
            body_encoding,
        };

        if let Some(body) = body.filter(|_| carries_body(&descriptor.method)) {
            descriptor.encode_body(body)?;
        }

        for source in [default_headers, headers] {
            for name in source.keys() {
                descriptor.headers.remove(name);
            }
            for (name, value) in source {
                descriptor.headers.append(name.clone(), value.clone());
            }
        }

        Ok(descriptor)
    }

    fn encode_body<B>(&mut self, body: &B) -> Result<(), FetcherError>
    where
        B: Serialize + ?Sized,
    {
        let value = serde_json::to_value(body).map_err(|e| self.serialization_error(e))?;
        if value.is_null() {
            return Ok(());
        }

        let (encoded, content_type) = match self.body_encoding {
            BodyEncoding::Json => {
                let json = serde_json::to_string(&value).map_err(|e| self.serialization_error(e))?;
                (RequestBody::Json(json), JSON_CONTENT_TYPE)
            }
            BodyEncoding::Text => {
                let text = match value {
                    Value::String(text) => text,
                    other => other.to_string(),
                };
                (RequestBody::Text(text), TEXT_CONTENT_TYPE)
            }
        };

        self.headers
            .insert(CONTENT_TYPE, HeaderValue::from_static(content_type));
        self.body = Some(encoded);
        Ok(())
    }

    fn serialization_error(&self, error: serde_json::Error) -> FetcherError {
        FetcherError::new(
            FetcherErrorKind::Serialization,
            format!("Failed to serialize request body: {}", error),
            self.url.clone(),
        )
        .with_source(error)
    }
}

fn carries_body(method: &Method) -> bool {
    *method == Method::POST || *method == Method::PUT || *method == Method::PATCH
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::ser::Error as _;
    use serde_json::json;
    use std::collections::BTreeMap;

    fn build(
        method: Method,
        body: Option<&Value>,
        encoding: BodyEncoding,
        headers: &HeaderMap,
    ) -> Result<RequestDescriptor, FetcherError> {
        RequestDescriptor::build(
            method,
            "https://example.com/z".to_string(),
            body,
            encoding,
            &HeaderMap::new(),
            headers,
        )
    }

    #[test]
    fn test_json_body_sets_content_type() {
        let descriptor = build(
            Method::PUT,
            Some(&json!({ "a": 1 })),
            BodyEncoding::Json,
            &HeaderMap::new(),
        )
        .unwrap();
        assert_eq!(descriptor.body.unwrap().as_str(), "{\"a\":1}");
        assert_eq!(descriptor.headers[CONTENT_TYPE], JSON_CONTENT_TYPE);
    }

    #[test]
    fn test_text_body_sent_verbatim() {
        let descriptor = build(
            Method::POST,
            Some(&json!("plain words")),
            BodyEncoding::Text,
            &HeaderMap::new(),
        )
        .unwrap();
        assert_eq!(
            descriptor.body,
            Some(RequestBody::Text("plain words".to_string()))
        );
        assert_eq!(descriptor.headers[CONTENT_TYPE], TEXT_CONTENT_TYPE);
    }

    #[test]
    fn test_caller_headers_override_encoding_default() {
        let mut headers = HeaderMap::new();
        headers.insert(
            CONTENT_TYPE,
            HeaderValue::from_static("application/vnd.api+json"),
        );
        let descriptor = build(
            Method::PATCH,
            Some(&json!({ "a": 1 })),
            BodyEncoding::Json,
            &headers,
        )
        .unwrap();
        assert_eq!(descriptor.headers[CONTENT_TYPE], "application/vnd.api+json");
        assert_eq!(descriptor.headers.get_all(CONTENT_TYPE).iter().count(), 1);
    }

    #[test]
    fn test_per_call_headers_override_defaults() {
        let mut defaults = HeaderMap::new();
        defaults.insert("x-client", HeaderValue::from_static("default"));
        defaults.insert("x-keep", HeaderValue::from_static("kept"));
        let mut headers = HeaderMap::new();
        headers.insert("x-client", HeaderValue::from_static("call"));

        let descriptor = RequestDescriptor::build::<Value>(
            Method::GET,
            "https://example.com".to_string(),
            None,
            BodyEncoding::Json,
            &defaults,
            &headers,
        )
        .unwrap();
        assert_eq!(descriptor.headers["x-client"], "call");
        assert_eq!(descriptor.headers["x-keep"], "kept");
    }

    #[test]
    fn test_bodies_ignored_for_non_mutating_methods() {
        for method in [Method::GET, Method::DELETE, Method::HEAD, Method::OPTIONS] {
            let descriptor = build(
                method,
                Some(&json!({ "a": 1 })),
                BodyEncoding::Json,
                &HeaderMap::new(),
            )
            .unwrap();
            assert!(descriptor.body.is_none());
            assert!(descriptor.headers.get(CONTENT_TYPE).is_none());
        }
    }

    #[test]
    fn test_null_body_not_sent() {
        let descriptor = build(
            Method::POST,
            Some(&Value::Null),
            BodyEncoding::Json,
            &HeaderMap::new(),
        )
        .unwrap();
        assert!(descriptor.body.is_none());
    }

    #[test]
    fn test_serialization_failure_is_classified() {
        struct Unserializable;

        impl Serialize for Unserializable {
            fn serialize<S: serde::Serializer>(&self, _: S) -> Result<S::Ok, S::Error> {
                Err(S::Error::custom("refusing to serialize"))
            }
        }

        let err = RequestDescriptor::build(
            Method::POST,
            "https://example.com/z".to_string(),
            Some(&Unserializable),
            BodyEncoding::Json,
            &HeaderMap::new(),
            &HeaderMap::new(),
        )
        .unwrap_err();
        assert_eq!(err.kind, FetcherErrorKind::Serialization);
        assert!(!err.is_retryable());
        assert!(err.message.contains("refusing to serialize"));
    }

    #[test]
    fn test_non_string_map_keys_fail_serialization() {
        let mut map = BTreeMap::new();
        map.insert(vec![1u8], "value");
        let err = RequestDescriptor::build(
            Method::POST,
            "https://example.com/z".to_string(),
            Some(&map),
            BodyEncoding::Json,
            &HeaderMap::new(),
            &HeaderMap::new(),
        )
        .unwrap_err();
        assert_eq!(err.kind, FetcherErrorKind::Serialization);
    }
}
