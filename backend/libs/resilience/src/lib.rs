/// Resilience patterns for long-lived client connections
///
/// This library provides the pieces a reconnecting client needs:
/// - **Backoff**: Exponential reconnect delays with a hard attempt budget
/// - **Timeout**: Enforces time limits on connection establishment
/// - **Preset Configurations**: Pre-tuned settings for the order push feed
///
/// # Example: Reconnect schedule
///
/// ```rust
/// use resilience::{Backoff, BackoffConfig};
/// use std::time::Duration;
///
/// let mut backoff = Backoff::new(BackoffConfig::default());
///
/// assert_eq!(backoff.next_delay(), Some(Duration::from_secs(1)));
/// assert_eq!(backoff.next_delay(), Some(Duration::from_secs(2)));
/// assert_eq!(backoff.attempts(), 2);
/// ```
///
/// # Example: Connect with timeout
///
/// ```rust,no_run
/// use resilience::presets;
///
/// #[tokio::main]
/// async fn main() {
///     let config = presets::push_feed_config();
///
///     let result = config.connect_timeout.run(async {
///         // Open the socket here
///     })
///     .await;
/// }
/// ```

pub mod backoff;
pub mod presets;
pub mod timeout;

// Re-export main types for convenience
pub use backoff::{Backoff, BackoffConfig};
pub use presets::{push_feed_config, ConnectionPreset};
pub use timeout::{ConnectTimeout, TimeoutError};
