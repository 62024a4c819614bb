use crate::error::Result;
use cache_invalidation::helpers::encode_segment;
use cache_invalidation::QueryKey;
use serde::Serialize;

/// Query key layout for order data:
///
/// ```text
/// ["orders"]
/// ["orders", "list"]
/// ["orders", "list", <filters as JSON>]
/// ["orders", "detail"]
/// ["orders", "detail", <order id>]
/// ```
pub struct OrderKeys;

impl OrderKeys {
    pub fn all() -> QueryKey {
        QueryKey::new(["orders"])
    }

    /// Prefix of every list variant
    pub fn lists() -> QueryKey {
        Self::all().child("list")
    }

    pub fn list<F: Serialize>(filters: &F) -> Result<QueryKey> {
        Ok(Self::lists().child(encode_segment(filters)?))
    }

    pub fn details() -> QueryKey {
        Self::all().child("detail")
    }

    pub fn detail(order_id: &str) -> QueryKey {
        Self::details().child(order_id)
    }
}
