//! Deletion confirmation
//!
//! Deleting an entity on the remote service only starts the deletion: the
//! entity lingers in a deleting status before it disappears. The reconciler
//! polls until the entity is gone, reports a terminal deleted status, or the
//! time budget runs out.

use crate::error::{CloudError, Result};
use crate::retry::{RetryConfig, RetryFailure, retry};
use std::future::Future;
use tokio_util::sync::CancellationToken;

/// Terminal status reported by entities that linger after deletion
pub const DELETED_STATUS: &str = "DELETED";

/// What a single describe call observed
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Observation {
    /// The remote service reports the entity as absent
    Absent,

    /// The entity exists with the given lifecycle status
    Present(String),
}

impl Observation {
    pub fn is_gone(&self) -> bool {
        match self {
            Observation::Absent => true,
            Observation::Present(status) => status == DELETED_STATUS,
        }
    }
}

#[derive(Debug)]
enum PollError<E> {
    StillExists(String),
    Remote(E),
}

/// Poll `probe` until the entity is gone
///
/// Any probe error aborts the wait immediately. When the budget runs out (or
/// `cancel` fires) the probe is run exactly once more: a gone entity still
/// counts as deleted, anything else is reported as [`CloudError::Timeout`].
pub async fn wait_for_deletion<F, Fut, E>(
    resource_type: &str,
    id: &str,
    config: &RetryConfig,
    cancel: &CancellationToken,
    mut probe: F,
) -> Result<()>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = std::result::Result<Observation, E>>,
    E: std::fmt::Display,
{
    let waited = retry(
        config,
        cancel,
        || {
            let observed = probe();
            async move {
                match observed.await {
                    Ok(observation) if observation.is_gone() => Ok(()),
                    Ok(Observation::Present(status)) => Err(PollError::StillExists(status)),
                    Ok(Observation::Absent) => Ok(()),
                    Err(e) => Err(PollError::Remote(e)),
                }
            }
        },
        |e| matches!(e, PollError::StillExists(_)),
    )
    .await;

    let wait_error = |message: String| CloudError::DeleteFailed {
        resource_type: resource_type.to_string(),
        id: id.to_string(),
        message: format!("error waiting for deletion: {}", message),
    };

    match waited {
        Ok(()) => {
            tracing::debug!(resource_type, id, "deletion confirmed");
            Ok(())
        }
        Err(RetryFailure::Permanent(PollError::Remote(e))) => Err(wait_error(e.to_string())),
        Err(RetryFailure::Permanent(PollError::StillExists(status))) => {
            Err(wait_error(format!("still exists ({})", status)))
        }
        Err(RetryFailure::TimedOut { attempts, .. }) => {
            tracing::debug!(resource_type, id, attempts, "deletion wait expired, checking once more");
            match probe().await {
                Ok(observation) if observation.is_gone() => Ok(()),
                Ok(Observation::Present(status)) => Err(CloudError::Timeout {
                    resource_type: resource_type.to_string(),
                    id: id.to_string(),
                    timeout: config.timeout,
                    last_status: status,
                }),
                Ok(Observation::Absent) => Ok(()),
                Err(e) => Err(wait_error(e.to_string())),
            }
        }
    }
}
