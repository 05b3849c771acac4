//! Post-admission notifications.
//!
//! The registration path only ever calls [`NotificationQueue::enqueue`],
//! which never waits. A single [`NotificationDispatcher`] task drains the
//! queue and fans each admission out to the configured
//! [`NotificationChannel`]s. Delivery is best-effort and at-most-once.
//!
//! ```text
//! RegistrationService ──enqueue──► mpsc (bounded) ──► NotificationDispatcher
//!                                                         ├── ResendEmailChannel
//!                                                         └── SheetsSyncChannel
//! ```

pub mod dispatcher;
pub mod email;
pub mod queue;
pub mod sheets;

use std::fmt::Debug;
use std::time::Duration;

use async_trait::async_trait;

use crate::domain::Admission;

pub use dispatcher::NotificationDispatcher;
pub use email::ResendEmailChannel;
pub use queue::{DispatchSnapshot, DispatchStats, NotificationQueue};
pub use sheets::SheetsSyncChannel;

/// Longest response body kept in [`NotifyError::Rejected`].
const MAX_ERROR_BODY: usize = 512;

/// Failure of a single delivery attempt.
#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    /// The request could not be sent or the response could not be read.
    #[error("http request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The endpoint answered with a non-success status.
    #[error("endpoint rejected notification with status {status}: {body}")]
    Rejected {
        /// HTTP status code returned by the endpoint.
        status: u16,
        /// Response body, truncated.
        body: String,
    },
}

/// A side effect to run once per admission.
#[async_trait]
pub trait NotificationChannel: Send + Sync + Debug {
    /// Short name used in logs.
    fn name(&self) -> &'static str;

    /// Makes one delivery attempt.
    ///
    /// # Errors
    ///
    /// Returns a [`NotifyError`] if the attempt did not succeed. The
    /// dispatcher logs it and does not retry.
    async fn deliver(&self, admission: &Admission) -> Result<(), NotifyError>;
}

/// Builds the HTTP client shared by the channels.
///
/// # Errors
///
/// Returns a [`NotifyError`] if the client cannot be constructed.
pub fn http_client(timeout: Duration) -> Result<reqwest::Client, NotifyError> {
    let client = reqwest::Client::builder()
        .timeout(timeout)
        .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
        .build()?;
    Ok(client)
}

/// Turns a non-2xx response into [`NotifyError::Rejected`].
async fn ensure_success(response: reqwest::Response) -> Result<(), NotifyError> {
    let status = response.status();
    if status.is_success() {
        return Ok(());
    }
    let mut body = response.text().await.unwrap_or_default();
    if body.len() > MAX_ERROR_BODY {
        let mut cut = MAX_ERROR_BODY;
        while !body.is_char_boundary(cut) {
            cut -= 1;
        }
        body.truncate(cut);
    }
    Err(NotifyError::Rejected {
        status: status.as_u16(),
        body,
    })
}
