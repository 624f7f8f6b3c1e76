//! Channel reconciler
//!
//! A channel ingests from one or two attached inputs and delivers to its
//! output destinations. Every top-level field is its own field group; the
//! channel class goes through the dedicated class-change call, everything
//! else through `UpdateChannel` scoped to the changed field.

mod config;
mod convert;

pub use config::*;

use crate::api::{
    Channel, CreateChannelRequest, MediaLiveApi, UpdateChannelClassRequest, UpdateChannelRequest,
};
use crate::error::ApiError;
use crate::reconcile::{
    ReconcileOptions, create_error, creation_tags, delete_error, observe, read_error,
    reject_replacement, update_error,
};
use async_trait::async_trait;
use convert::{expand_attachments, expand_destinations, flatten_attachments, flatten_destinations};
use liveflow_cloud::{
    CloudError, DELETED_STATUS, DesiredState, Observation, Resource, Result, RetryConfig, Tags,
    Validate, wait_for_deletion,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

/// Log level sent when `log_level` is removed from the configuration
const DEFAULT_LOG_LEVEL: &str = "DISABLED";

/// Channel as read back from the service
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelState {
    pub id: String,
    pub arn: String,
    pub name: Option<String>,
    pub class: String,
    pub state: String,
    pub destination: BTreeSet<DestinationConfig>,
    pub input_attachment: Vec<InputAttachmentConfig>,
    pub log_level: Option<String>,
    pub role_arn: Option<String>,
    pub pipelines_running_count: i32,
    pub egress_endpoints: Vec<String>,
    pub tags: Tags,
}

impl From<&ChannelState> for ChannelConfig {
    fn from(state: &ChannelState) -> Self {
        Self {
            class: state.class.clone(),
            destination: state.destination.clone(),
            input_attachment: state.input_attachment.clone(),
            log_level: state.log_level.clone(),
            name: state.name.clone(),
            role_arn: state.role_arn.clone(),
            tags: state.tags.clone(),
        }
    }
}

/// Reconciler for MediaLive channels
pub struct ChannelResource {
    api: Arc<dyn MediaLiveApi>,
    options: ReconcileOptions,
    delete_retry: RetryConfig,
}

impl ChannelResource {
    pub const RESOURCE_TYPE: &'static str = "channel";
    pub const DISPLAY_NAME: &'static str = "MediaLive Channel";
    pub const DELETE_TIMEOUT: Duration = Duration::from_secs(5 * 60);

    pub fn new(api: Arc<dyn MediaLiveApi>) -> Self {
        Self::with_options(api, ReconcileOptions::default())
    }

    pub fn with_options(api: Arc<dyn MediaLiveApi>, options: ReconcileOptions) -> Self {
        let delete_retry = options.delete_retry_or(Self::DELETE_TIMEOUT);
        Self {
            api,
            options,
            delete_retry,
        }
    }

    fn observed(&self, channel: Channel) -> ChannelState {
        ChannelState {
            tags: self.options.ignore_tags.filter(&channel.tags),
            destination: flatten_destinations(&channel.destinations),
            input_attachment: flatten_attachments(&channel.input_attachments),
            class: channel.channel_class.unwrap_or_default(),
            id: channel.id,
            arn: channel.arn,
            name: channel.name,
            state: channel.state,
            log_level: channel.log_level,
            role_arn: channel.role_arn,
            pipelines_running_count: channel.pipelines_running_count,
            egress_endpoints: channel.egress_endpoints,
        }
    }

    async fn describe(&self, id: &str) -> Result<Channel> {
        tracing::debug!(id, "describing channel");
        let channel = self
            .api
            .describe_channel(id)
            .await
            .map_err(|e| read_error(Self::DISPLAY_NAME, id, e))?;
        if channel.state == DELETED_STATUS {
            return Err(CloudError::not_found(Self::DISPLAY_NAME, id));
        }
        Ok(channel)
    }

    async fn update_group(&self, group: &'static str, request: UpdateChannelRequest) -> Result<()> {
        tracing::debug!(id = %request.channel_id, group, "updating channel");
        let id = request.channel_id.clone();
        self.api
            .update_channel(request)
            .await
            .map_err(|e| update_error(Self::DISPLAY_NAME, &id, group, e))?;
        Ok(())
    }

    async fn probe(&self, id: &str) -> std::result::Result<Observation, ApiError> {
        observe(self.api.describe_channel(id).await, |c| c.state.as_str())
    }
}

#[async_trait]
impl Resource for ChannelResource {
    type Desired = ChannelConfig;
    type Observed = ChannelState;

    fn resource_type(&self) -> &'static str {
        Self::RESOURCE_TYPE
    }

    fn display_name(&self) -> &'static str {
        Self::DISPLAY_NAME
    }

    async fn create(&self, desired: &ChannelConfig) -> Result<ChannelState> {
        desired.ensure_valid(Self::DISPLAY_NAME)?;

        let request = CreateChannelRequest {
            name: desired.name.clone(),
            channel_class: desired.class.clone(),
            destinations: expand_destinations(&desired.destination),
            input_attachments: expand_attachments(&desired.input_attachment),
            log_level: desired.log_level.clone(),
            role_arn: desired.role_arn.clone(),
            tags: creation_tags(&self.options.ignore_tags, &desired.tags),
        };

        tracing::debug!(class = %desired.class, "creating channel");
        let created = self
            .api
            .create_channel(request)
            .await
            .map_err(|e| create_error(Self::DISPLAY_NAME, e))?;
        tracing::info!(id = %created.id, "created channel");

        self.read(&created.id).await
    }

    async fn read(&self, id: &str) -> Result<ChannelState> {
        let channel = self.describe(id).await?;
        Ok(self.observed(channel))
    }

    async fn update(&self, id: &str, old: &ChannelConfig, new: &ChannelConfig) -> Result<ChannelState> {
        new.ensure_valid(Self::DISPLAY_NAME)?;
        let diff = old.diff_ignoring(new, &self.options.ignore_tags);
        reject_replacement(Self::DISPLAY_NAME, id, &diff.replace)?;

        if diff.has_group("class") {
            tracing::debug!(id, group = "class", "updating channel");
            self.api
                .update_channel_class(UpdateChannelClassRequest {
                    channel_id: id.to_string(),
                    channel_class: new.class.clone(),
                })
                .await
                .map_err(|e| update_error(Self::DISPLAY_NAME, id, "class", e))?;
        }

        if diff.has_group("destination") {
            let mut request = UpdateChannelRequest::new(id);
            request.destinations = Some(expand_destinations(&new.destination));
            self.update_group("destination", request).await?;
        }

        if diff.has_group("input_attachment") {
            let mut request = UpdateChannelRequest::new(id);
            request.input_attachments = Some(expand_attachments(&new.input_attachment));
            self.update_group("input_attachment", request).await?;
        }

        if diff.has_group("log_level") {
            let mut request = UpdateChannelRequest::new(id);
            request.log_level = Some(
                new.log_level
                    .clone()
                    .unwrap_or_else(|| DEFAULT_LOG_LEVEL.to_string()),
            );
            self.update_group("log_level", request).await?;
        }

        // an empty string clears the field
        if diff.has_group("name") {
            let mut request = UpdateChannelRequest::new(id);
            request.name = Some(new.name.clone().unwrap_or_default());
            self.update_group("name", request).await?;
        }

        if diff.has_group("role_arn") {
            let mut request = UpdateChannelRequest::new(id);
            request.role_arn = Some(new.role_arn.clone().unwrap_or_default());
            self.update_group("role_arn", request).await?;
        }

        if diff.tags {
            let arn = self.describe(id).await?.arn;
            let ignore = &self.options.ignore_tags;
            tracing::debug!(id, %arn, "updating tags");
            self.api
                .update_tags(&arn, &ignore.filter(&old.tags), &ignore.filter(&new.tags))
                .await
                .map_err(|e| update_error(Self::DISPLAY_NAME, id, "tags", e))?;
        }

        self.read(id).await
    }

    async fn delete(&self, id: &str) -> Result<()> {
        tracing::debug!(id, "deleting channel");
        match self.api.delete_channel(id).await {
            Ok(()) => {}
            Err(e) if e.is_not_found() => {
                tracing::debug!(id, "channel already gone");
                return Ok(());
            }
            Err(e) => return Err(delete_error(Self::DISPLAY_NAME, id, e)),
        }

        wait_for_deletion(
            Self::DISPLAY_NAME,
            id,
            &self.delete_retry,
            &self.options.cancel,
            || self.probe(id),
        )
        .await?;
        tracing::info!(id, "deleted channel");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{CreateInputRequest, InputDestinationRequest};
    use crate::memory::{ApiCall, DeletionMode, InMemoryMediaLive};

    async fn input(api: &InMemoryMediaLive, name: &str) -> String {
        api.create_input(CreateInputRequest {
            name: name.to_string(),
            input_type: "RTMP_PUSH".to_string(),
            destinations: Some(vec![InputDestinationRequest {
                stream_name: format!("live/{}", name),
            }]),
            ..Default::default()
        })
        .await
        .unwrap()
        .id
    }

    fn channel(input_id: &str) -> ChannelConfig {
        ChannelConfig {
            class: "SINGLE_PIPELINE".to_string(),
            destination: [DestinationConfig {
                id: Some("out".to_string()),
                destination_type: "standard".to_string(),
                url: Some("rtmp://a.rtmp.example.com/live".to_string()),
                stream_name: Some("key".to_string()),
                ..Default::default()
            }]
            .into(),
            input_attachment: vec![InputAttachmentConfig {
                name: Some("primary".to_string()),
                input_id: input_id.to_string(),
                input_settings: Some(InputSettingsConfig {
                    source_end_behaviour: Some("CONTINUE".to_string()),
                    ..Default::default()
                }),
                ..Default::default()
            }],
            name: Some("news".to_string()),
            ..Default::default()
        }
    }

    async fn setup() -> (Arc<InMemoryMediaLive>, ChannelResource, String) {
        let api = Arc::new(InMemoryMediaLive::new());
        let input_id = input(&api, "main").await;
        let resource = ChannelResource::new(api.clone());
        api.clear_calls();
        (api, resource, input_id)
    }

    #[tokio::test]
    async fn test_out_of_range_filter_strength_is_rejected_locally() {
        let (api, resource, input_id) = setup().await;
        let mut desired = channel(&input_id);
        if let Some(settings) = desired.input_attachment[0].input_settings.as_mut() {
            settings.filter_strength = Some(9);
        }

        let err = resource.create(&desired).await.unwrap_err();
        assert!(err.is_validation());
        assert!(err.to_string().contains("filter_strength"));
        assert!(api.calls().is_empty());
    }

    #[tokio::test]
    async fn test_create_then_read() {
        let (api, resource, input_id) = setup().await;
        let desired = channel(&input_id);

        let observed = resource.create(&desired).await.unwrap();

        assert!(!observed.id.is_empty());
        assert_eq!(observed.class, "SINGLE_PIPELINE");
        assert_eq!(observed.egress_endpoints.len(), 1);
        assert_eq!(observed.state, "IDLE");
        assert_eq!(ChannelConfig::from(&observed), desired);
        assert_eq!(api.input(&input_id).unwrap().state, "ATTACHED");
    }

    #[tokio::test]
    async fn test_class_change_uses_class_call() {
        let (api, resource, input_id) = setup().await;
        let old = channel(&input_id);
        let created = resource.create(&old).await.unwrap();
        api.clear_calls();

        let mut new = old.clone();
        new.class = "STANDARD".to_string();
        let observed = resource.update(&created.id, &old, &new).await.unwrap();

        assert_eq!(observed.class, "STANDARD");
        assert_eq!(observed.egress_endpoints.len(), 2);
        let mutations = api.mutations();
        assert_eq!(mutations.len(), 1);
        assert!(matches!(mutations[0], ApiCall::UpdateChannelClass(_)));
    }

    #[tokio::test]
    async fn test_removed_optional_fields_are_cleared() {
        let (api, resource, input_id) = setup().await;
        let mut old = channel(&input_id);
        old.log_level = Some("DEBUG".to_string());
        let created = resource.create(&old).await.unwrap();
        api.clear_calls();

        let mut new = old.clone();
        new.log_level = None;
        new.name = None;
        let observed = resource.update(&created.id, &old, &new).await.unwrap();

        let requests: Vec<UpdateChannelRequest> = api
            .mutations()
            .into_iter()
            .filter_map(|c| match c {
                ApiCall::UpdateChannel(request) => Some(request),
                _ => None,
            })
            .collect();
        assert_eq!(requests.len(), 2);
        assert_eq!(requests[0].log_level.as_deref(), Some("DISABLED"));
        assert_eq!(requests[1].name.as_deref(), Some(""));
        assert_eq!(observed.name, None);
    }

    #[tokio::test]
    async fn test_failed_group_aborts_remaining_groups() {
        let (api, resource, input_id) = setup().await;
        let old = channel(&input_id);
        let created = resource.create(&old).await.unwrap();
        let backup = input(&api, "backup").await;
        api.fail_when(
            |call| matches!(call, ApiCall::UpdateChannel(r) if r.input_attachments.is_some()),
            ApiError::service("UnprocessableEntityException", "channel is running"),
        );
        api.clear_calls();

        let mut new = old.clone();
        new.input_attachment[0].input_id = backup;
        new.role_arn = Some("arn:aws:iam::123456789012:role/MediaLiveAccessRole".to_string());
        let err = resource.update(&created.id, &old, &new).await.unwrap_err();

        assert!(matches!(
            err,
            CloudError::UpdateFailed { ref group, .. } if group == "input_attachment"
        ));
        assert!(
            !api
                .calls()
                .iter()
                .any(|c| matches!(c, ApiCall::UpdateChannel(r) if r.role_arn.is_some()))
        );
    }

    #[tokio::test]
    async fn test_tag_only_update() {
        let (api, resource, input_id) = setup().await;
        let old = channel(&input_id);
        let created = resource.create(&old).await.unwrap();
        api.clear_calls();

        let mut new = old.clone();
        new.tags.insert("env".into(), "prod".into());
        resource.update(&created.id, &old, &new).await.unwrap();

        let mutations = api.mutations();
        assert_eq!(mutations.len(), 1);
        assert!(mutations[0].is_tag_update());
    }

    #[tokio::test(start_paused = true)]
    async fn test_delete_detaches_inputs() {
        let (api, _, input_id) = setup().await;
        api.set_deletion_mode(DeletionMode::Vanish { polls: 2 });
        let resource = ChannelResource::new(api.clone());
        let created = resource.create(&channel(&input_id)).await.unwrap();

        resource.delete(&created.id).await.unwrap();
        assert!(resource.read(&created.id).await.unwrap_err().is_not_found());
        assert_eq!(api.input(&input_id).unwrap().state, "DETACHED");
        resource.delete(&created.id).await.unwrap();
    }
}
