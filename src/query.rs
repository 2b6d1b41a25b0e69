//! Query-string parameters.
//!
//! [`QueryParams`] keeps insertion order, drops absent values and expands
//! lists into repeated `key=value` pairs, so
//! `{ a: [1, 2], b: null, c: "x" }` serializes to `a=1&a=2&c=x`.

use url::form_urlencoded;

/// A single query value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryValue {
    /// A stringified scalar.
    Scalar(String),
    /// Several values under one key, emitted as repeated pairs.
    List(Vec<String>),
    /// Null or undefined. Skipped on serialization.
    Absent,
}

macro_rules! scalar_from {
    ($($ty:ty),*) => {
        $(
            impl From<$ty> for QueryValue {
                fn from(value: $ty) -> Self {
                    QueryValue::Scalar(value.to_string())
                }
            }
        )*
    };
}

scalar_from!(
    &str, String, bool, char, i8, i16, i32, i64, isize, u8, u16, u32, u64, usize, f32, f64
);

impl<T: ToString> From<Vec<T>> for QueryValue {
    fn from(values: Vec<T>) -> Self {
        QueryValue::List(values.iter().map(ToString::to_string).collect())
    }
}

impl<T: ToString> From<&[T]> for QueryValue {
    fn from(values: &[T]) -> Self {
        QueryValue::List(values.iter().map(ToString::to_string).collect())
    }
}

impl<T: Into<QueryValue>> From<Option<T>> for QueryValue {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(QueryValue::Absent)
    }
}

/// Ordered query parameters.
///
/// # Examples
///
/// ```
/// use fetchwise::QueryParams;
///
/// let query = QueryParams::new()
///     .with("a", vec![1, 2])
///     .with("b", None::<&str>)
///     .with("c", "x");
///
/// assert_eq!(query.to_query_string(), "a=1&a=2&c=x");
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryParams {
    entries: Vec<(String, QueryValue)>,
}

impl QueryParams {
    /// Creates an empty parameter list.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a parameter, keeping insertion order.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<QueryValue>) -> Self {
        self.push(key, value);
        self
    }

    /// Appends a parameter in place.
    pub fn push(&mut self, key: impl Into<String>, value: impl Into<QueryValue>) {
        self.entries.push((key.into(), value.into()));
    }

    /// Returns `true` if there are no entries at all, absent ones included.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterates over the entries in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &QueryValue)> {
        self.entries.iter().map(|(key, value)| (key.as_str(), value))
    }

    /// Serializes to an `application/x-www-form-urlencoded` string without
    /// the leading `?`. Empty if every value is absent.
    pub fn to_query_string(&self) -> String {
        let mut serializer = form_urlencoded::Serializer::new(String::new());
        for (key, value) in &self.entries {
            match value {
                QueryValue::Scalar(value) => {
                    serializer.append_pair(key, value);
                }
                QueryValue::List(values) => {
                    for value in values {
                        serializer.append_pair(key, value);
                    }
                }
                QueryValue::Absent => {}
            }
        }
        serializer.finish()
    }

    /// Parses a query string (with or without a leading `?`) into a
    /// multi-map. Repeated keys become lists.
    ///
    /// # Examples
    ///
    /// ```
    /// use fetchwise::{QueryParams, QueryValue};
    ///
    /// let parsed = QueryParams::parse("a=1&a=2&c=x");
    /// let entries: Vec<_> = parsed.iter().collect();
    /// assert_eq!(entries[0], ("a", &QueryValue::List(vec!["1".into(), "2".into()])));
    /// assert_eq!(entries[1], ("c", &QueryValue::Scalar("x".into())));
    /// ```
    pub fn parse(query: &str) -> Self {
        let query = query.strip_prefix('?').unwrap_or(query);
        let mut params = QueryParams::new();
        for (key, value) in form_urlencoded::parse(query.as_bytes()) {
            let value = value.into_owned();
            let existing = params.entries.iter_mut().find(|(k, _)| *k == key);
            match existing {
                Some((_, slot)) => {
                    let merged = match std::mem::replace(slot, QueryValue::Absent) {
                        QueryValue::Scalar(first) => vec![first, value],
                        QueryValue::List(mut values) => {
                            values.push(value);
                            values
                        }
                        QueryValue::Absent => vec![value],
                    };
                    *slot = QueryValue::List(merged);
                }
                None => params.entries.push((key.into_owned(), QueryValue::Scalar(value))),
            }
        }
        params
    }

    /// Returns the same parameters with absent entries removed and
    /// single-element lists collapsed to scalars.
    ///
    /// Two parameter sets that serialize to the same query string have equal
    /// normalized forms.
    pub fn normalized(&self) -> Self {
        let entries = self
            .entries
            .iter()
            .filter_map(|(key, value)| match value {
                QueryValue::Absent => None,
                QueryValue::List(values) if values.is_empty() => None,
                QueryValue::List(values) if values.len() == 1 => {
                    Some((key.clone(), QueryValue::Scalar(values[0].clone())))
                }
                other => Some((key.clone(), other.clone())),
            })
            .collect();
        Self { entries }
    }
}

impl<K, V> FromIterator<(K, V)> for QueryParams
where
    K: Into<String>,
    V: Into<QueryValue>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut params = QueryParams::new();
        for (key, value) in iter {
            params.push(key, value);
        }
        params
    }
}

/// Appends `query` to `url`, using `&` if the URL already has a query.
/// A `#fragment` stays at the end.
pub(crate) fn append_query(url: &str, query: Option<&QueryParams>) -> String {
    let encoded = query.map(QueryParams::to_query_string).unwrap_or_default();
    if encoded.is_empty() {
        return url.to_string();
    }
    let (base, fragment) = match url.split_once('#') {
        Some((base, fragment)) => (base, Some(fragment)),
        None => (url, None),
    };
    let separator = match base.find('?') {
        Some(index) if index + 1 == base.len() || base.ends_with('&') => "",
        Some(_) => "&",
        None => "?",
    };
    match fragment {
        Some(fragment) => format!("{}{}{}#{}", base, separator, encoded, fragment),
        None => format!("{}{}{}", base, separator, encoded),
    }
}
