//! Input reconciler
//!
//! Inputs are push endpoints (RTMP, RTP or UDP) a channel ingests from. The
//! input type and VPC placement are fixed at creation; destinations, attached
//! security groups and the name are each updated with their own call.

use crate::api::{
    CreateInputRequest, Input, InputDestination, InputDestinationRequest, InputDestinationVpc,
    InputVpcRequest, MediaLiveApi, UpdateInputRequest,
};
use crate::error::ApiError;
use crate::reconcile::{
    ReconcileOptions, create_error, creation_tags, delete_error, observe, read_error,
    reject_replacement, update_error,
};
use async_trait::async_trait;
use liveflow_cloud::{
    CloudError, DELETED_STATUS, DesiredState, Diff, Observation, Resource, Result, RetryConfig,
    Tags, Validate, Validator, Violation, wait_for_deletion,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

/// Input types that can be managed
pub const INPUT_TYPES: &[&str] = &["RTMP_PUSH", "RTP_PUSH", "UDP_PUSH"];

/// Name-addressable part of an ingest URL
///
/// The URL is split on `/`, empty segments dropped, and the fourth segment
/// returned: `rtmp://198.51.100.10:1935/live/main` yields `main`. A URL with
/// fewer segments yields an empty string.
pub fn endpoint_from_url(url: &str) -> String {
    url.split('/')
        .filter(|s| !s.is_empty())
        .nth(3)
        .unwrap_or_default()
        .to_string()
}

/// Stream name (`app/instance`) a push URL was created for
fn stream_name_from_url(url: &str) -> String {
    url.split('/')
        .filter(|s| !s.is_empty())
        .skip(2)
        .collect::<Vec<_>>()
        .join("/")
}

/// Desired state of an input
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct InputConfig {
    pub name: String,

    #[serde(rename = "type")]
    pub input_type: String,

    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub destinations: BTreeSet<InputDestinationConfig>,

    /// Input security group IDs
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub input_security_groups: BTreeSet<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vpc: Option<InputVpcConfig>,

    #[serde(default, skip_serializing_if = "Tags::is_empty")]
    pub tags: Tags,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct InputDestinationConfig {
    /// Stream name pushed to, `app/instance` for RTMP
    pub endpoint: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct InputVpcConfig {
    pub subnet_ids: BTreeSet<String>,

    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub security_group_ids: BTreeSet<String>,
}

impl Validate for InputConfig {
    fn validate(&self) -> Vec<Violation> {
        let mut v = Validator::new();
        v.required("name", &self.name);
        v.one_of("type", &self.input_type, INPUT_TYPES);

        for (i, destination) in self.destinations.iter().enumerate() {
            v.required(&format!("destinations[{}].endpoint", i), &destination.endpoint);
        }

        if let Some(vpc) = &self.vpc {
            v.nested("vpc", |v| {
                v.len_between("subnet_ids", vpc.subnet_ids.len(), 2, Some(2));
                v.len_between("security_group_ids", vpc.security_group_ids.len(), 0, Some(5));
            });
        }
        v.into_violations()
    }
}

impl DesiredState for InputConfig {
    fn tags(&self) -> &Tags {
        &self.tags
    }

    fn diff(&self, new: &Self) -> Diff {
        let mut diff = Diff::new();
        diff.force_new("type", &self.input_type, &new.input_type);
        diff.force_new("vpc", &self.vpc, &new.vpc);
        diff.group("destinations", &self.destinations, &new.destinations);
        diff.group(
            "input_security_groups",
            &self.input_security_groups,
            &new.input_security_groups,
        );
        diff.group("name", &self.name, &new.name);
        diff.compare_tags(&self.tags, &new.tags);
        diff
    }
}

/// Input as read back from the service
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputState {
    pub id: String,
    pub arn: String,
    pub name: String,
    #[serde(rename = "type")]
    pub input_type: String,
    pub input_class: Option<String>,
    pub input_source_type: Option<String>,
    pub state: String,
    pub destinations: Vec<InputDestinationState>,
    pub input_security_groups: BTreeSet<String>,
    pub attached_channels: Vec<String>,
    pub tags: Tags,
}

/// Ingest endpoint assigned to an input
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputDestinationState {
    /// Decomposed from `url`, see [`endpoint_from_url`]
    pub endpoint: String,
    pub ip: Option<String>,
    pub port: Option<String>,
    pub url: Option<String>,
    pub vpc: Option<InputDestinationVpc>,
}

impl From<InputDestination> for InputDestinationState {
    fn from(destination: InputDestination) -> Self {
        Self {
            endpoint: destination
                .url
                .as_deref()
                .map(endpoint_from_url)
                .unwrap_or_default(),
            ip: destination.ip,
            port: destination.port,
            url: destination.url,
            vpc: destination.vpc,
        }
    }
}

impl From<&InputState> for InputConfig {
    /// Desired state matching an existing input
    ///
    /// VPC placement is not reported back by the service and stays unset.
    fn from(state: &InputState) -> Self {
        let destinations = if state.input_type == "RTMP_PUSH" {
            state
                .destinations
                .iter()
                .filter_map(|d| d.url.as_deref())
                .map(|url| InputDestinationConfig {
                    endpoint: stream_name_from_url(url),
                })
                .filter(|d| !d.endpoint.is_empty())
                .collect()
        } else {
            BTreeSet::new()
        };

        Self {
            name: state.name.clone(),
            input_type: state.input_type.clone(),
            destinations,
            input_security_groups: state.input_security_groups.clone(),
            vpc: None,
            tags: state.tags.clone(),
        }
    }
}

fn destination_requests(
    destinations: &BTreeSet<InputDestinationConfig>,
) -> Vec<InputDestinationRequest> {
    destinations
        .iter()
        .map(|d| InputDestinationRequest {
            stream_name: d.endpoint.clone(),
        })
        .collect()
}

fn vpc_request(vpc: &InputVpcConfig) -> InputVpcRequest {
    InputVpcRequest {
        subnet_ids: vpc.subnet_ids.iter().cloned().collect(),
        security_group_ids: (!vpc.security_group_ids.is_empty())
            .then(|| vpc.security_group_ids.iter().cloned().collect()),
    }
}

/// Reconciler for MediaLive inputs
pub struct InputResource {
    api: Arc<dyn MediaLiveApi>,
    options: ReconcileOptions,
    delete_retry: RetryConfig,
}

impl InputResource {
    pub const RESOURCE_TYPE: &'static str = "input";
    pub const DISPLAY_NAME: &'static str = "MediaLive Input";
    pub const DELETE_TIMEOUT: Duration = Duration::from_secs(30);

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

    fn create_request(&self, desired: &InputConfig) -> CreateInputRequest {
        CreateInputRequest {
            name: desired.name.clone(),
            input_type: desired.input_type.clone(),
            destinations: (!desired.destinations.is_empty())
                .then(|| destination_requests(&desired.destinations)),
            input_security_groups: (!desired.input_security_groups.is_empty())
                .then(|| desired.input_security_groups.iter().cloned().collect()),
            vpc: desired.vpc.as_ref().map(vpc_request),
            tags: creation_tags(&self.options.ignore_tags, &desired.tags),
        }
    }

    fn observed(&self, input: Input) -> InputState {
        InputState {
            tags: self.options.ignore_tags.filter(&input.tags),
            destinations: input.destinations.into_iter().map(Into::into).collect(),
            input_security_groups: input.security_groups.into_iter().collect(),
            id: input.id,
            arn: input.arn,
            name: input.name,
            input_type: input.input_type,
            input_class: input.input_class,
            input_source_type: input.input_source_type,
            state: input.state,
            attached_channels: input.attached_channels,
        }
    }

    async fn describe(&self, id: &str) -> Result<Input> {
        tracing::debug!(id, "describing input");
        let input = self
            .api
            .describe_input(id)
            .await
            .map_err(|e| read_error(Self::DISPLAY_NAME, id, e))?;
        if input.state == DELETED_STATUS {
            return Err(CloudError::not_found(Self::DISPLAY_NAME, id));
        }
        Ok(input)
    }

    async fn update_group(&self, group: &'static str, request: UpdateInputRequest) -> Result<()> {
        tracing::debug!(id = %request.input_id, group, "updating input");
        let id = request.input_id.clone();
        self.api
            .update_input(request)
            .await
            .map_err(|e| update_error(Self::DISPLAY_NAME, &id, group, e))?;
        Ok(())
    }

    async fn probe(&self, id: &str) -> std::result::Result<Observation, ApiError> {
        observe(self.api.describe_input(id).await, |i| i.state.as_str())
    }
}

#[async_trait]
impl Resource for InputResource {
    type Desired = InputConfig;
    type Observed = InputState;

    fn resource_type(&self) -> &'static str {
        Self::RESOURCE_TYPE
    }

    fn display_name(&self) -> &'static str {
        Self::DISPLAY_NAME
    }

    async fn create(&self, desired: &InputConfig) -> Result<InputState> {
        desired.ensure_valid(Self::DISPLAY_NAME)?;

        tracing::debug!(name = %desired.name, input_type = %desired.input_type, "creating input");
        let created = self
            .api
            .create_input(self.create_request(desired))
            .await
            .map_err(|e| create_error(Self::DISPLAY_NAME, e))?;
        tracing::info!(id = %created.id, name = %desired.name, "created input");

        self.read(&created.id).await
    }

    async fn read(&self, id: &str) -> Result<InputState> {
        let input = self.describe(id).await?;
        Ok(self.observed(input))
    }

    async fn update(&self, id: &str, old: &InputConfig, new: &InputConfig) -> Result<InputState> {
        new.ensure_valid(Self::DISPLAY_NAME)?;
        let diff = old.diff_ignoring(new, &self.options.ignore_tags);
        reject_replacement(Self::DISPLAY_NAME, id, &diff.replace)?;

        if diff.has_group("destinations") {
            let mut request = UpdateInputRequest::new(id);
            request.destinations = Some(destination_requests(&new.destinations));
            self.update_group("destinations", request).await?;
        }

        if diff.has_group("input_security_groups") {
            let mut request = UpdateInputRequest::new(id);
            request.input_security_groups = Some(new.input_security_groups.iter().cloned().collect());
            self.update_group("input_security_groups", request).await?;
        }

        if diff.has_group("name") {
            let mut request = UpdateInputRequest::new(id);
            request.name = Some(new.name.clone());
            self.update_group("name", request).await?;
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
        tracing::debug!(id, "deleting input");
        match self.api.delete_input(id).await {
            Ok(()) => {}
            Err(e) if e.is_not_found() => {
                tracing::debug!(id, "input already gone");
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
        tracing::info!(id, "deleted input");
        Ok(())
    }
}
