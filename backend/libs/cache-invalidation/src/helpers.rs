//! Helper functions for cache key management

use crate::{InvalidationError, QueryKey, Result};

const SEPARATOR: char = ':';
const ESCAPE: char = '\\';

/// Build the flat string form of a query key
///
/// Separators and backslashes inside a segment are backslash-escaped, so
/// JSON filter segments survive a round trip through [`parse_cache_key`].
///
/// # Example
///
/// ```
/// use cache_invalidation::{build_cache_key, QueryKey};
///
/// let key = QueryKey::new(["orders", "detail", "123"]);
/// assert_eq!(build_cache_key(&key), "orders:detail:123");
///
/// let list = QueryKey::new(["orders", "list", r#"{"page":1}"#]);
/// assert_eq!(build_cache_key(&list), r#"orders:list:{"page"\:1}"#);
/// ```
pub fn build_cache_key(key: &QueryKey) -> String {
    let mut flat = String::new();
    for (i, segment) in key.segments().iter().enumerate() {
        if i > 0 {
            flat.push(SEPARATOR);
        }
        for c in segment.chars() {
            if c == SEPARATOR || c == ESCAPE {
                flat.push(ESCAPE);
            }
            flat.push(c);
        }
    }
    flat
}

/// Parse a flat cache key back into a query key
///
/// # Example
///
/// ```
/// use cache_invalidation::{parse_cache_key, QueryKey};
///
/// let key = parse_cache_key("orders:list").unwrap();
/// assert_eq!(key, QueryKey::new(["orders", "list"]));
/// ```
pub fn parse_cache_key(key: &str) -> Result<QueryKey> {
    match split_segments(key) {
        Some(segments) if segments.iter().all(|s| !s.is_empty()) => Ok(QueryKey::new(segments)),
        _ => Err(InvalidationError::InvalidKey(format!(
            "{}. Expected format: <segment>[:<segment>...]",
            key
        ))),
    }
}

/// Split on unescaped separators. `None` when the key ends in a lone escape.
fn split_segments(key: &str) -> Option<Vec<String>> {
    let mut segments = Vec::new();
    let mut current = String::new();
    let mut chars = key.chars();

    while let Some(c) = chars.next() {
        match c {
            ESCAPE => current.push(chars.next()?),
            SEPARATOR => segments.push(std::mem::take(&mut current)),
            _ => current.push(c),
        }
    }
    segments.push(current);
    Some(segments)
}

/// Encode a structured segment (for example list filters) as a single key segment
///
/// # Example
///
/// ```
/// use cache_invalidation::helpers::encode_segment;
/// use serde_json::json;
///
/// let segment = encode_segment(&json!({"page": 1})).unwrap();
/// assert_eq!(segment, r#"{"page":1}"#);
/// ```
pub fn encode_segment<T: serde::Serialize>(value: &T) -> Result<String> {
    Ok(serde_json::to_string(value)?)
}

/// Validate cache key format
///
/// # Example
///
/// ```
/// use cache_invalidation::helpers::validate_cache_key;
///
/// assert!(validate_cache_key("orders"));
/// assert!(validate_cache_key("orders:detail:42"));
/// assert!(!validate_cache_key(""));
/// assert!(!validate_cache_key("orders:"));
/// assert!(!validate_cache_key(":42"));
/// ```
pub fn validate_cache_key(key: &str) -> bool {
    parse_cache_key(key).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_cache_key() {
        assert_eq!(build_cache_key(&QueryKey::new(["orders"])), "orders");
        assert_eq!(
            build_cache_key(&QueryKey::new(["orders", "list"])),
            "orders:list"
        );
    }

    #[test]
    fn test_parse_cache_key() {
        let key = parse_cache_key("orders:detail:42").unwrap();
        assert_eq!(key.segments(), ["orders", "detail", "42"]);
    }

    #[test]
    fn test_parse_cache_key_invalid() {
        assert!(parse_cache_key("").is_err());
        assert!(parse_cache_key(":").is_err());
        assert!(parse_cache_key("orders::42").is_err());
    }

    #[test]
    fn test_list_key_with_json_filters_round_trips() {
        let filters = encode_segment(&serde_json::json!({"page": 1, "status": "a\\b"})).unwrap();
        let key = QueryKey::new(["orders".to_string(), "list".to_string(), filters]);

        let flat = build_cache_key(&key);
        assert_eq!(parse_cache_key(&flat).unwrap(), key);
        assert!(validate_cache_key(&flat));
    }

    #[test]
    fn test_trailing_escape_is_invalid() {
        assert!(parse_cache_key("orders\\").is_err());
    }

    #[test]
    fn test_encode_segment_is_stable() {
        #[derive(serde::Serialize)]
        struct Filters {
            status: &'static str,
            page: u32,
        }

        let a = encode_segment(&Filters { status: "pending", page: 2 }).unwrap();
        let b = encode_segment(&Filters { status: "pending", page: 2 }).unwrap();
        assert_eq!(a, b);
    }
}
