//! Query parameters and request options.

use serde_json::Value;

/// A primitive query-string value.
///
/// `Absent` values are dropped when the URL is built, so optional filters can
/// be passed straight through.
#[derive(Debug, Clone, PartialEq)]
pub enum QueryValue {
    /// String value.
    Str(String),
    /// Integer value.
    Int(i64),
    /// Floating-point value.
    Float(f64),
    /// Boolean value.
    Bool(bool),
    /// No value; the key is omitted.
    Absent,
}

impl QueryValue {
    /// Renders the value for the query string, or `None` when absent.
    #[must_use]
    pub fn render(&self) -> Option<String> {
        match self {
            Self::Str(s) => Some(s.clone()),
            Self::Int(i) => Some(i.to_string()),
            Self::Float(f) => Some(f.to_string()),
            Self::Bool(b) => Some(b.to_string()),
            Self::Absent => None,
        }
    }
}

impl From<&str> for QueryValue {
    fn from(value: &str) -> Self {
        Self::Str(value.to_string())
    }
}

impl From<String> for QueryValue {
    fn from(value: String) -> Self {
        Self::Str(value)
    }
}

impl From<i64> for QueryValue {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<i32> for QueryValue {
    fn from(value: i32) -> Self {
        Self::Int(i64::from(value))
    }
}

impl From<u32> for QueryValue {
    fn from(value: u32) -> Self {
        Self::Int(i64::from(value))
    }
}

impl From<f64> for QueryValue {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<bool> for QueryValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl<T: Into<QueryValue>> From<Option<T>> for QueryValue {
    fn from(value: Option<T>) -> Self {
        value.map_or(Self::Absent, Into::into)
    }
}

/// Ordered query parameters.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Query {
    params: Vec<(String, QueryValue)>,
}

impl Query {
    /// Creates an empty query.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a parameter.
    #[must_use]
    pub fn param(mut self, key: impl Into<String>, value: impl Into<QueryValue>) -> Self {
        self.params.push((key.into(), value.into()));
        self
    }

    /// Returns the key/value pairs that will be sent, skipping absent values.
    #[must_use]
    pub fn pairs(&self) -> Vec<(&str, String)> {
        self.params
            .iter()
            .filter_map(|(k, v)| v.render().map(|rendered| (k.as_str(), rendered)))
            .collect()
    }

    /// Returns true if no parameter will be sent.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.params.iter().all(|(_, v)| *v == QueryValue::Absent)
    }
}

/// Optional parts of a request.
#[derive(Debug, Clone, Default)]
pub struct RequestOptions {
    /// Query parameters.
    pub query: Query,
    /// JSON body; only sent for POST and PUT.
    pub body: Option<Value>,
}

impl RequestOptions {
    /// Creates empty options.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the query parameters.
    #[must_use]
    pub fn with_query(mut self, query: Query) -> Self {
        self.query = query;
        self
    }

    /// Sets the JSON body.
    #[must_use]
    pub fn with_body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_skips_absent_values() {
        let query = Query::new()
            .param("method", "historical")
            .param("alpha", 0.99)
            .param("lookback", None::<u32>)
            .param("save", true);

        assert_eq!(
            query.pairs(),
            vec![
                ("method", "historical".to_string()),
                ("alpha", "0.99".to_string()),
                ("save", "true".to_string()),
            ]
        );
    }

    #[test]
    fn test_query_empty_when_all_absent() {
        let query = Query::new().param("limit", None::<u32>);
        assert!(query.is_empty());
        assert!(query.pairs().is_empty());
        assert!(Query::new().is_empty());
    }

    #[test]
    fn test_option_some_is_rendered() {
        let value: QueryValue = Some(250u32).into();
        assert_eq!(value.render().as_deref(), Some("250"));
    }
}
