//! Timeout enforcement.
//!
//! # Responsibilities
//! - Wrap upstream dials with the configured connect timeout
//! - Cancel the dial cleanly on expiry
//!
//! # Design Decisions
//! - Uses Tokio's timeout facilities
//! - Timeout errors are distinct from other upstream errors

use std::future::Future;
use std::time::Duration;

use crate::error::RelayError;

/// Run `fut` under an optional deadline.
///
/// `None` waits indefinitely. On expiry the future is dropped and
/// [`RelayError::Timeout`] is returned.
pub async fn bounded<F>(limit: Option<Duration>, fut: F) -> Result<F::Output, RelayError>
where
    F: Future,
{
    match limit {
        Some(limit) => tokio::time::timeout(limit, fut)
            .await
            .map_err(|_| RelayError::Timeout(limit)),
        None => Ok(fut.await),
    }
}
