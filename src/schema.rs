//! Structural validation of decoded response bodies.
//!
//! The fetch layer does not ship a validator of its own. It calls whatever
//! implements [`Schema`] with the decoded JSON and either gets a typed value
//! back or a list of [`Issue`]s, which it renders into the problem tree
//! carried by [`ValidationError`](crate::ValidationError).
//!
//! Two adapters are provided:
//!
//! - [`SerdeSchema`] uses the type's `Deserialize` impl as the schema.
//! - [`FnSchema`] (built with [`from_fn`]) wraps a hand-written check.

use serde::de::DeserializeOwned;
use serde_json::Value;
use std::fmt;
use std::marker::PhantomData;

/// A runtime-checkable type descriptor for response bodies.
///
/// # Examples
///
/// ```
/// use fetchwise::schema::{Issue, Issues, Schema};
/// use serde_json::{json, Value};
///
/// struct NonEmptyList;
///
/// impl Schema<Vec<Value>> for NonEmptyList {
///     fn validate(&self, value: &Value) -> Result<Vec<Value>, Issues> {
///         match value.as_array() {
///             Some(items) if !items.is_empty() => Ok(items.clone()),
///             Some(_) => Err(Issue::root("expected at least one item").into()),
///             None => Err(Issue::root("expected an array").into()),
///         }
///     }
/// }
///
/// assert!(NonEmptyList.validate(&json!([1])).is_ok());
/// assert!(NonEmptyList.validate(&json!([])).is_err());
/// ```
pub trait Schema<T>: Send + Sync {
    /// Checks `value` and converts it into `T`, or reports every problem found.
    fn validate(&self, value: &Value) -> Result<T, Issues>;
}

/// One step in the path to an offending value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathSegment {
    /// An object key.
    Key(String),
    /// An array index.
    Index(usize),
}

impl fmt::Display for PathSegment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PathSegment::Key(key) => write!(f, "[{:?}]", key),
            PathSegment::Index(index) => write!(f, "[{}]", index),
        }
    }
}

impl From<&str> for PathSegment {
    fn from(key: &str) -> Self {
        PathSegment::Key(key.to_string())
    }
}

impl From<String> for PathSegment {
    fn from(key: String) -> Self {
        PathSegment::Key(key)
    }
}

impl From<usize> for PathSegment {
    fn from(index: usize) -> Self {
        PathSegment::Index(index)
    }
}

/// A single validation problem.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Issue {
    /// Where in the payload the problem is. Empty means the root value.
    pub path: Vec<PathSegment>,
    /// What is wrong.
    pub message: String,
}

impl Issue {
    /// Creates an issue at the given path.
    pub fn new(path: Vec<PathSegment>, message: impl Into<String>) -> Self {
        Self {
            path,
            message: message.into(),
        }
    }

    /// Creates an issue about the root value.
    pub fn root(message: impl Into<String>) -> Self {
        Self::new(Vec::new(), message)
    }
}

impl fmt::Display for Issue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.path.is_empty() {
            return f.write_str(&self.message);
        }
        for segment in &self.path {
            write!(f, "{}", segment)?;
        }
        write!(f, ": {}", self.message)
    }
}

/// Every problem a schema found in one payload.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Issues(Vec<Issue>);

impl Issues {
    /// Returns `true` if no issues were recorded.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Number of issues.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Iterates over the recorded issues.
    pub fn iter(&self) -> std::slice::Iter<'_, Issue> {
        self.0.iter()
    }

    /// Records another issue.
    pub fn push(&mut self, issue: Issue) {
        self.0.push(issue);
    }

    /// Renders the issues as a tree grouped by path.
    ///
    /// # Examples
    ///
    /// ```
    /// use fetchwise::schema::{Issue, Issues};
    ///
    /// let issues = Issues::from(vec![
    ///     Issue::new(vec!["data".into(), 0.into(), "id".into()], "expected number"),
    ///     Issue::new(vec!["data".into(), 0.into(), "body".into()], "missing field"),
    /// ]);
    ///
    /// assert_eq!(
    ///     issues.to_tree(),
    ///     "└─ [\"data\"]\n   └─ [0]\n      ├─ [\"id\"]\n      │  └─ expected number\n      └─ [\"body\"]\n         └─ missing field"
    /// );
    /// ```
    pub fn to_tree(&self) -> String {
        let mut root = TreeNode::default();
        for issue in &self.0 {
            root.insert(&issue.path, &issue.message);
        }
        let mut lines = Vec::new();
        root.render("", &mut lines);
        lines.join("\n")
    }
}

impl From<Vec<Issue>> for Issues {
    fn from(issues: Vec<Issue>) -> Self {
        Self(issues)
    }
}

impl From<Issue> for Issues {
    fn from(issue: Issue) -> Self {
        Self(vec![issue])
    }
}

impl IntoIterator for Issues {
    type Item = Issue;
    type IntoIter = std::vec::IntoIter<Issue>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl<'a> IntoIterator for &'a Issues {
    type Item = &'a Issue;
    type IntoIter = std::slice::Iter<'a, Issue>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

#[derive(Default)]
struct TreeNode {
    messages: Vec<String>,
    children: Vec<(PathSegment, TreeNode)>,
}

impl TreeNode {
    fn insert(&mut self, path: &[PathSegment], message: &str) {
        let Some((head, rest)) = path.split_first() else {
            self.messages.push(message.to_string());
            return;
        };
        let position = self.children.iter().position(|(segment, _)| segment == head);
        let index = match position {
            Some(index) => index,
            None => {
                self.children.push((head.clone(), TreeNode::default()));
                self.children.len() - 1
            }
        };
        self.children[index].1.insert(rest, message);
    }

    fn render(&self, prefix: &str, lines: &mut Vec<String>) {
        let total = self.messages.len() + self.children.len();
        let mut position = 0;

        for message in &self.messages {
            position += 1;
            let connector = if position == total { "└─ " } else { "├─ " };
            lines.push(format!("{}{}{}", prefix, connector, message));
        }

        for (segment, child) in &self.children {
            position += 1;
            let last = position == total;
            let connector = if last { "└─ " } else { "├─ " };
            lines.push(format!("{}{}{}", prefix, connector, segment));
            let indent = if last { "   " } else { "│  " };
            child.render(&format!("{}{}", prefix, indent), lines);
        }
    }
}

/// Uses `T`'s `Deserialize` impl as the schema.
///
/// # Examples
///
/// ```
/// use fetchwise::schema::{Schema, SerdeSchema};
/// use serde::Deserialize;
/// use serde_json::json;
///
/// #[derive(Deserialize)]
/// struct Message { id: u64 }
///
/// let schema = SerdeSchema::<Message>::new();
/// assert_eq!(schema.validate(&json!({ "id": 7 })).unwrap().id, 7);
/// assert!(schema.validate(&json!({ "id": "7" })).is_err());
/// ```
pub struct SerdeSchema<T> {
    _marker: PhantomData<fn() -> T>,
}

impl<T> SerdeSchema<T> {
    /// Creates the schema.
    pub fn new() -> Self {
        Self {
            _marker: PhantomData,
        }
    }
}

impl<T> Default for SerdeSchema<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> fmt::Debug for SerdeSchema<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SerdeSchema")
            .field("type", &std::any::type_name::<T>())
            .finish()
    }
}

impl<T: DeserializeOwned> Schema<T> for SerdeSchema<T> {
    fn validate(&self, value: &Value) -> Result<T, Issues> {
        serde_path_to_error::deserialize(value).map_err(|e| {
            let path = e.path().iter().filter_map(segment_from_serde).collect();
            Issue::new(path, e.inner().to_string()).into()
        })
    }
}

fn segment_from_serde(segment: &serde_path_to_error::Segment) -> Option<PathSegment> {
    use serde_path_to_error::Segment;
    match segment {
        Segment::Seq { index } => Some(PathSegment::Index(*index)),
        Segment::Map { key } => Some(PathSegment::Key(key.clone())),
        Segment::Enum { variant } => Some(PathSegment::Key(variant.clone())),
        Segment::Unknown => None,
    }
}

/// A schema backed by a closure. Build one with [`from_fn`].
pub struct FnSchema<F, T> {
    check: F,
    _marker: PhantomData<fn() -> T>,
}

impl<F, T> Schema<T> for FnSchema<F, T>
where
    F: Fn(&Value) -> Result<T, Issues> + Send + Sync,
{
    fn validate(&self, value: &Value) -> Result<T, Issues> {
        (self.check)(value)
    }
}

/// Wraps a closure as a [`Schema`].
///
/// # Examples
///
/// ```
/// use fetchwise::schema::{self, Issue, Schema};
/// use serde_json::json;
///
/// let ok_flag = schema::from_fn(|value| {
///     value
///         .get("ok")
///         .and_then(|ok| ok.as_bool())
///         .ok_or_else(|| Issue::new(vec!["ok".into()], "expected boolean").into())
/// });
///
/// assert_eq!(ok_flag.validate(&json!({ "ok": true })), Ok(true));
/// ```
pub fn from_fn<F, T>(check: F) -> FnSchema<F, T>
where
    F: Fn(&Value) -> Result<T, Issues> + Send + Sync,
{
    FnSchema {
        check,
        _marker: PhantomData,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use serde_json::json;

    #[derive(Debug, Deserialize, PartialEq)]
    struct Message {
        id: u64,
        body: String,
    }

    #[test]
    fn test_serde_schema_accepts_matching_payload() {
        let schema = SerdeSchema::<Message>::new();
        let message = schema
            .validate(&json!({ "id": 1, "body": "hello" }))
            .unwrap();
        assert_eq!(
            message,
            Message {
                id: 1,
                body: "hello".to_string()
            }
        );
    }

    #[test]
    fn test_serde_schema_reports_mismatch() {
        let schema = SerdeSchema::<Message>::new();
        let issues = schema.validate(&json!({ "id": 1 })).unwrap_err();
        assert_eq!(issues.len(), 1);
        assert!(issues.to_tree().contains("missing field `body`"));
    }

    #[test]
    fn test_serde_schema_reports_nested_path() {
        let schema = SerdeSchema::<Vec<Message>>::new();
        let issues = schema
            .validate(&json!([{ "id": 1, "body": "ok" }, { "id": "two", "body": "x" }]))
            .unwrap_err();

        let issue = issues.iter().next().unwrap();
        assert_eq!(issue.path, vec![PathSegment::Index(1), PathSegment::from("id")]);
        assert!(issue.message.contains("invalid type"));
        assert!(issues.to_tree().starts_with("└─ [1]\n   └─ [\"id\"]"));
    }

    #[test]
    fn test_tree_groups_shared_prefixes() {
        let issues = Issues::from(vec![
            Issue::root("expected object"),
            Issue::new(vec!["a".into()], "first"),
            Issue::new(vec!["a".into()], "second"),
        ]);
        assert_eq!(
            issues.to_tree(),
            "├─ expected object\n└─ [\"a\"]\n   ├─ first\n   └─ second"
        );
    }

    #[test]
    fn test_issue_display_with_path() {
        let issue = Issue::new(vec!["items".into(), 2.into()], "expected string");
        assert_eq!(issue.to_string(), "[\"items\"][2]: expected string");
        assert_eq!(Issue::root("bad").to_string(), "bad");
    }

    #[test]
    fn test_fn_schema_collects_issues() {
        let schema = from_fn(|value: &Value| {
            let mut issues = Issues::default();
            if value.get("id").and_then(Value::as_u64).is_none() {
                issues.push(Issue::new(vec!["id".into()], "expected integer"));
            }
            if value.get("body").and_then(Value::as_str).is_none() {
                issues.push(Issue::new(vec!["body".into()], "expected string"));
            }
            if issues.is_empty() {
                Ok(())
            } else {
                Err(issues)
            }
        });

        let issues = schema.validate(&json!({})).unwrap_err();
        assert_eq!(issues.len(), 2);
        assert!(schema.validate(&json!({ "id": 3, "body": "x" })).is_ok());
    }
}
