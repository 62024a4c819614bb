/// Cache bridge: push events drive query-cache invalidation and optimistic writes

pub mod keys;
pub mod order_updates;

pub use keys::OrderKeys;
pub use order_updates::OrderUpdates;
