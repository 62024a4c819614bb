/// Notification aggregator
///
/// Derives user-facing notifications from push events, keeps a bounded
/// read/unread log and optionally raises native notices.

pub mod center;
pub mod desktop;
pub mod templates;

pub use center::NotificationCenter;
pub use desktop::{DesktopNotifier, DisabledNotifier, Permission, TracingNotifier};
pub use templates::{derive, Notification, NotificationKind};
