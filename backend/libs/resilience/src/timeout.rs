/// Upper bound on how long a socket open may take
use std::future::Future;
use std::time::Duration;

const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectTimeout {
    pub duration: Duration,
}

impl ConnectTimeout {
    pub const fn from_secs(secs: u64) -> Self {
        Self {
            duration: Duration::from_secs(secs),
        }
    }

    /// Drive `open` to completion, or fail once the budget is spent.
    ///
    /// The inner future is dropped on expiry, which cancels the open.
    pub async fn run<F>(&self, open: F) -> Result<F::Output, TimeoutError>
    where
        F: Future,
    {
        tokio::time::timeout(self.duration, open)
            .await
            .map_err(|_| TimeoutError::Elapsed(self.duration))
    }
}

impl Default for ConnectTimeout {
    fn default() -> Self {
        Self {
            duration: DEFAULT_CONNECT_TIMEOUT,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum TimeoutError {
    #[error("connect did not finish within {0:?}")]
    Elapsed(Duration),
}
