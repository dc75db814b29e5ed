// src/ingest/query.rs
use std::fmt;

/// Search expression plus optional pass-through parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchQuery {
    expression: String,
    additional: Option<String>,
}

impl SearchQuery {
    /// Blank `additional` is treated as absent.
    pub fn new(expression: impl Into<String>, additional: Option<String>) -> Self {
        let additional = additional
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty());
        Self {
            expression: expression.into(),
            additional,
        }
    }

    pub fn expression(&self) -> &str {
        &self.expression
    }

    /// `q=<url-encoded expression>[&<additional, unescaped>]`
    pub fn to_query_string(&self) -> String {
        let mut out = format!("q={}", urlencoding::encode(&self.expression));
        if let Some(extra) = &self.additional {
            out.push('&');
            out.push_str(extra);
        }
        out
    }
}

impl fmt::Display for SearchQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_query_string())
    }
}
