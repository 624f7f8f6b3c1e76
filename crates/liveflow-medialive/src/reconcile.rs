//! Pieces shared by the MediaLive reconcilers

use crate::error::ApiError;
use liveflow_cloud::{CancellationToken, CloudError, IgnoreTags, Observation, RetryConfig, Tags};
use std::time::Duration;

/// Settings every reconciler accepts
#[derive(Debug, Clone, Default)]
pub struct ReconcileOptions {
    /// Deletion wait; `None` keeps the entity type's own budget
    pub delete_retry: Option<RetryConfig>,

    /// Tag keys left out of observed state and tag updates
    pub ignore_tags: IgnoreTags,

    /// Cuts deletion waits short; treated like the budget running out
    pub cancel: CancellationToken,
}

impl ReconcileOptions {
    pub(crate) fn delete_retry_or(&self, timeout: Duration) -> RetryConfig {
        self.delete_retry
            .clone()
            .unwrap_or_else(|| RetryConfig::with_timeout(timeout))
    }
}

/// Turn a describe result into what the deletion waiter needs
pub(crate) fn observe<T>(
    described: Result<T, ApiError>,
    state: impl FnOnce(&T) -> &str,
) -> Result<Observation, ApiError> {
    match described {
        Ok(entity) => Ok(Observation::Present(state(&entity).to_string())),
        Err(e) if e.is_not_found() => Ok(Observation::Absent),
        Err(e) => Err(e),
    }
}

/// Map a describe failure; absence becomes [`CloudError::NotFound`]
pub(crate) fn read_error(resource_type: &str, id: &str, error: ApiError) -> CloudError {
    if error.is_not_found() {
        CloudError::not_found(resource_type, id)
    } else {
        CloudError::ReadFailed {
            resource_type: resource_type.to_string(),
            id: id.to_string(),
            message: error.to_string(),
        }
    }
}

pub(crate) fn update_error(resource_type: &str, id: &str, group: &str, error: ApiError) -> CloudError {
    CloudError::UpdateFailed {
        resource_type: resource_type.to_string(),
        id: id.to_string(),
        group: group.to_string(),
        message: error.to_string(),
    }
}

pub(crate) fn create_error(resource_type: &str, error: ApiError) -> CloudError {
    CloudError::CreateFailed {
        resource_type: resource_type.to_string(),
        message: error.to_string(),
    }
}

pub(crate) fn delete_error(resource_type: &str, id: &str, error: ApiError) -> CloudError {
    CloudError::DeleteFailed {
        resource_type: resource_type.to_string(),
        id: id.to_string(),
        message: error.to_string(),
    }
}

/// Tags to send on creation, `None` when nothing is left to send
pub(crate) fn creation_tags(ignore: &IgnoreTags, tags: &Tags) -> Option<Tags> {
    let tags = ignore.filter(tags);
    if tags.is_empty() { None } else { Some(tags) }
}

/// Fail with [`CloudError::ReplacementRequired`] when immutable fields changed
pub(crate) fn reject_replacement(
    resource_type: &str,
    id: &str,
    fields: &[&'static str],
) -> Result<(), CloudError> {
    if fields.is_empty() {
        return Ok(());
    }
    Err(CloudError::ReplacementRequired {
        resource_type: resource_type.to_string(),
        id: id.to_string(),
        fields: fields.iter().map(|f| f.to_string()).collect(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_observe_maps_not_found_to_absent() {
        let gone: Result<String, ApiError> = Err(ApiError::NotFound("no such input".into()));
        assert_eq!(observe(gone, |s| s.as_str()), Ok(Observation::Absent));

        let deleting: Result<String, ApiError> = Ok("DELETING".into());
        assert_eq!(
            observe(deleting, |s| s.as_str()),
            Ok(Observation::Present("DELETING".into()))
        );

        let broken: Result<String, ApiError> = Err(ApiError::service("InternalServerError", "boom"));
        assert!(observe(broken, |s| s.as_str()).is_err());
    }

    #[test]
    fn test_read_error_keeps_not_found_distinct() {
        let err = read_error("MediaLive Input", "1234", ApiError::NotFound("gone".into()));
        assert!(err.is_not_found());

        let err = read_error(
            "MediaLive Input",
            "1234",
            ApiError::service("ForbiddenException", "denied"),
        );
        assert_eq!(
            err.to_string(),
            "error describing MediaLive Input (1234): ForbiddenException: denied"
        );
    }

    #[test]
    fn test_creation_tags_drops_reserved_keys() {
        let mut tags = Tags::new();
        tags.insert("aws:cloudformation:stack-name".into(), "x".into());
        assert_eq!(creation_tags(&IgnoreTags::default(), &tags), None);

        tags.insert("env".into(), "prod".into());
        let sent = creation_tags(&IgnoreTags::default(), &tags).unwrap();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent["env"], "prod");
    }

    #[test]
    fn test_delete_retry_defaults_per_entity() {
        let options = ReconcileOptions::default();
        assert_eq!(
            options.delete_retry_or(Duration::from_secs(30)).timeout,
            Duration::from_secs(30)
        );

        let options = ReconcileOptions {
            delete_retry: Some(RetryConfig::fixed(Duration::from_secs(5), Duration::from_secs(1))),
            ..Default::default()
        };
        assert_eq!(
            options.delete_retry_or(Duration::from_secs(30)).timeout,
            Duration::from_secs(5)
        );
    }
}
