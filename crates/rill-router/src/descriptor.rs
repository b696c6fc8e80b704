//! Request descriptor parsing.
//!
//! A descriptor is the `METHOD:PATH[?QUERY]` string derived from one raw
//! request line. A single regex pass extracts the method, the path and the
//! compliant portion of the query string.

use std::collections::HashMap;
use std::sync::OnceLock;

use regex::Regex;

use crate::error::{Result, RouterError};

/// How malformed query-string fragments are treated.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum QueryMode {
    /// Fragments outside the grammar are silently dropped.
    #[default]
    Lenient,
    /// Any input not covered by the grammar fails the parse.
    Strict,
}

fn descriptor_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"(?im)^(?P<method>\w+):(?P<path>(?:/[\w-]*)+)/?(?:\?(?P<query>\w+=[\w\s-]+(?:&\w+=[\w\s-]+)*))?",
        )
        .expect("descriptor grammar regex")
    })
}

/// The parsed form of one inbound request line.
///
/// Produced once per request; immutable afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestDescriptor {
    /// The raw descriptor string the parse ran against.
    pub input: String,
    /// Uppercased request method.
    pub method: String,
    /// Request path, starting with `/`.
    pub path: String,
    /// Flat query mapping; later duplicate keys overwrite earlier ones.
    pub query_params: HashMap<String, String>,
}

impl RequestDescriptor {
    /// Parses a `METHOD:PATH[?QUERY]` descriptor string.
    ///
    /// The match is case-insensitive, multiline and unicode-aware. A missing
    /// method or path is a [`RouterError::MalformedRequest`]; input past the
    /// recognized portion is a [`RouterError::MalformedQuery`] in strict mode
    /// and is dropped in lenient mode.
    pub fn parse(input: &str, mode: QueryMode) -> Result<Self> {
        let caps = descriptor_regex()
            .captures(input)
            .ok_or_else(|| RouterError::MalformedRequest(input.to_string()))?;

        if mode == QueryMode::Strict {
            let end = caps.get(0).map_or(0, |m| m.end());
            if end != input.len() {
                return Err(RouterError::MalformedQuery(input[end..].to_string()));
            }
        }

        let method = caps
            .name("method")
            .map(|m| m.as_str().to_uppercase())
            .ok_or_else(|| RouterError::MalformedRequest(input.to_string()))?;
        let path = caps
            .name("path")
            .map(|m| m.as_str().to_string())
            .ok_or_else(|| RouterError::MalformedRequest(input.to_string()))?;

        let mut query_params = HashMap::new();
        if let Some(query) = caps.name("query").map(|m| m.as_str()) {
            for pair in query.split('&') {
                let mut parts = pair.splitn(2, '=');
                if let (Some(key), Some(value)) = (parts.next(), parts.next()) {
                    query_params.insert(key.to_string(), value.to_string());
                }
            }
        }

        Ok(Self {
            input: input.to_string(),
            method,
            path,
            query_params,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_method_path_and_query() {
        let d = RequestDescriptor::parse("GET:/a/b?k=v", QueryMode::Lenient).unwrap();
        assert_eq!(d.method, "GET");
        assert_eq!(d.path, "/a/b");
        assert_eq!(d.query_params.get("k"), Some(&"v".to_string()));
    }

    #[test]
    fn method_is_uppercased() {
        let d = RequestDescriptor::parse("get:/users", QueryMode::Lenient).unwrap();
        assert_eq!(d.method, "GET");
    }

    #[test]
    fn later_duplicate_keys_overwrite() {
        let d = RequestDescriptor::parse("GET:/a?k=1&k=2", QueryMode::Lenient).unwrap();
        assert_eq!(d.query_params.get("k"), Some(&"2".to_string()));
    }

    #[test]
    fn missing_path_is_malformed() {
        assert!(matches!(
            RequestDescriptor::parse("GET:", QueryMode::Lenient),
            Err(RouterError::MalformedRequest(_))
        ));
        assert!(matches!(
            RequestDescriptor::parse("no descriptor here", QueryMode::Lenient),
            Err(RouterError::MalformedRequest(_))
        ));
    }

    #[test]
    fn lenient_mode_drops_malformed_fragments() {
        let d = RequestDescriptor::parse("GET:/a?k=1&bad", QueryMode::Lenient).unwrap();
        assert_eq!(d.query_params.get("k"), Some(&"1".to_string()));
        assert_eq!(d.query_params.len(), 1);

        // A query that never matches the grammar is dropped wholesale.
        let d = RequestDescriptor::parse("GET:/a?bad", QueryMode::Lenient).unwrap();
        assert!(d.query_params.is_empty());
    }

    #[test]
    fn strict_mode_rejects_trailing_input() {
        assert!(matches!(
            RequestDescriptor::parse("GET:/a?k=1&bad", QueryMode::Strict),
            Err(RouterError::MalformedQuery(_))
        ));
        assert!(matches!(
            RequestDescriptor::parse("GET:/a?bad", QueryMode::Strict),
            Err(RouterError::MalformedQuery(_))
        ));
        assert!(RequestDescriptor::parse("GET:/a?k=1&j=2", QueryMode::Strict).is_ok());
    }

    #[test]
    fn values_may_contain_spaces_and_hyphens() {
        let d = RequestDescriptor::parse("GET:/a?name=John Doe&tag=a-b_c", QueryMode::Lenient)
            .unwrap();
        assert_eq!(d.query_params.get("name"), Some(&"John Doe".to_string()));
        assert_eq!(d.query_params.get("tag"), Some(&"a-b_c".to_string()));
    }

    #[test]
    fn parse_is_idempotent() {
        let a = RequestDescriptor::parse("GET:/a/b?k=v", QueryMode::Lenient).unwrap();
        let b = RequestDescriptor::parse("GET:/a/b?k=v", QueryMode::Lenient).unwrap();
        assert_eq!(a, b);
    }
}
