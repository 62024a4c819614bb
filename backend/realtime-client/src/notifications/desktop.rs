/// Native notification seam
use super::templates::Notification;
use crate::error::Result;
use async_trait::async_trait;
use parking_lot::Mutex;
use serde::Serialize;
use tracing::info;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Permission {
    /// Not asked yet
    Default,
    Granted,
    Denied,
}

#[async_trait]
pub trait DesktopNotifier: Send + Sync {
    fn permission(&self) -> Permission;

    /// Ask for permission if not decided yet; returns the resulting state
    async fn request_permission(&self) -> Permission;

    /// Must not block; errors are logged by the caller and otherwise ignored
    fn show(&self, notification: &Notification) -> Result<()>;
}

/// Writes notices to the log. Permission starts undecided and is granted on request.
#[derive(Debug)]
pub struct TracingNotifier {
    permission: Mutex<Permission>,
}

impl TracingNotifier {
    pub fn new() -> Self {
        Self {
            permission: Mutex::new(Permission::Default),
        }
    }

    pub fn granted() -> Self {
        Self {
            permission: Mutex::new(Permission::Granted),
        }
    }
}

impl Default for TracingNotifier {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DesktopNotifier for TracingNotifier {
    fn permission(&self) -> Permission {
        *self.permission.lock()
    }

    async fn request_permission(&self) -> Permission {
        let mut permission = self.permission.lock();
        if *permission == Permission::Default {
            *permission = Permission::Granted;
        }
        *permission
    }

    fn show(&self, notification: &Notification) -> Result<()> {
        info!(
            id = %notification.id,
            kind = %notification.kind,
            title = %notification.title,
            body = %notification.message,
            "Desktop notification"
        );
        Ok(())
    }
}

/// Never shows anything
#[derive(Debug, Default, Clone, Copy)]
pub struct DisabledNotifier;

#[async_trait]
impl DesktopNotifier for DisabledNotifier {
    fn permission(&self) -> Permission {
        Permission::Denied
    }

    async fn request_permission(&self) -> Permission {
        Permission::Denied
    }

    fn show(&self, _notification: &Notification) -> Result<()> {
        Ok(())
    }
}
