/// Typed event routing
///
/// `SubscriptionRegistry` holds listeners; `EventDispatcher` decodes frames
/// handed over by the connection manager and fans them out.

pub mod dispatcher;
pub mod registry;

pub use dispatcher::{DispatchStats, EventDispatcher};
pub use registry::{Listener, Subscription, SubscriptionRegistry, Topic};
