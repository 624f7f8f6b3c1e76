//! Input security group reconciler
//!
//! An input security group is a CIDR allow-list attached to push inputs.
//! Its only mutable field group is the whitelist itself.

use crate::api::{
    CreateInputSecurityGroupRequest, InputSecurityGroup, MediaLiveApi,
    UpdateInputSecurityGroupRequest,
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

/// Desired state of an input security group
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct InputSecurityGroupConfig {
    /// IPv4 CIDR blocks allowed to push to attached inputs
    pub ipv4_whitelist: BTreeSet<String>,

    #[serde(default, skip_serializing_if = "Tags::is_empty")]
    pub tags: Tags,
}

impl Validate for InputSecurityGroupConfig {
    fn validate(&self) -> Vec<Violation> {
        let mut v = Validator::new();
        v.len_between("ipv4_whitelist", self.ipv4_whitelist.len(), 1, None);
        for (i, cidr) in self.ipv4_whitelist.iter().enumerate() {
            v.ipv4_cidr(&format!("ipv4_whitelist[{}]", i), cidr);
        }
        v.into_violations()
    }
}

impl DesiredState for InputSecurityGroupConfig {
    fn tags(&self) -> &Tags {
        &self.tags
    }

    fn diff(&self, new: &Self) -> Diff {
        let mut diff = Diff::new();
        diff.group("ipv4_whitelist", &self.ipv4_whitelist, &new.ipv4_whitelist);
        diff.compare_tags(&self.tags, &new.tags);
        diff
    }
}

/// Input security group as read back from the service
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputSecurityGroupState {
    pub id: String,
    pub arn: String,
    pub state: String,
    pub ipv4_whitelist: BTreeSet<String>,
    /// Inputs currently using the group
    pub inputs: Vec<String>,
    pub tags: Tags,
}

impl From<&InputSecurityGroupState> for InputSecurityGroupConfig {
    fn from(state: &InputSecurityGroupState) -> Self {
        Self {
            ipv4_whitelist: state.ipv4_whitelist.clone(),
            tags: state.tags.clone(),
        }
    }
}

/// Reconciler for MediaLive input security groups
pub struct InputSecurityGroupResource {
    api: Arc<dyn MediaLiveApi>,
    options: ReconcileOptions,
    delete_retry: RetryConfig,
}

impl InputSecurityGroupResource {
    pub const RESOURCE_TYPE: &'static str = "input_security_group";
    pub const DISPLAY_NAME: &'static str = "MediaLive Input Security Group";
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

    fn observed(&self, group: InputSecurityGroup) -> InputSecurityGroupState {
        InputSecurityGroupState {
            ipv4_whitelist: group.whitelist_rules.into_iter().collect(),
            tags: self.options.ignore_tags.filter(&group.tags),
            id: group.id,
            arn: group.arn,
            state: group.state,
            inputs: group.inputs,
        }
    }

    async fn describe(&self, id: &str) -> Result<InputSecurityGroup> {
        tracing::debug!(id, "describing input security group");
        let group = self
            .api
            .describe_input_security_group(id)
            .await
            .map_err(|e| read_error(Self::DISPLAY_NAME, id, e))?;
        if group.state == DELETED_STATUS {
            return Err(CloudError::not_found(Self::DISPLAY_NAME, id));
        }
        Ok(group)
    }

    async fn probe(&self, id: &str) -> std::result::Result<Observation, ApiError> {
        observe(self.api.describe_input_security_group(id).await, |g| {
            g.state.as_str()
        })
    }
}

#[async_trait]
impl Resource for InputSecurityGroupResource {
    type Desired = InputSecurityGroupConfig;
    type Observed = InputSecurityGroupState;

    fn resource_type(&self) -> &'static str {
        Self::RESOURCE_TYPE
    }

    fn display_name(&self) -> &'static str {
        Self::DISPLAY_NAME
    }

    async fn create(&self, desired: &InputSecurityGroupConfig) -> Result<InputSecurityGroupState> {
        desired.ensure_valid(Self::DISPLAY_NAME)?;

        let request = CreateInputSecurityGroupRequest {
            whitelist_rules: desired.ipv4_whitelist.iter().cloned().collect(),
            tags: creation_tags(&self.options.ignore_tags, &desired.tags),
        };

        tracing::debug!(rules = request.whitelist_rules.len(), "creating input security group");
        let created = self
            .api
            .create_input_security_group(request)
            .await
            .map_err(|e| create_error(Self::DISPLAY_NAME, e))?;
        tracing::info!(id = %created.id, "created input security group");

        self.read(&created.id).await
    }

    async fn read(&self, id: &str) -> Result<InputSecurityGroupState> {
        let group = self.describe(id).await?;
        Ok(self.observed(group))
    }

    async fn update(
        &self,
        id: &str,
        old: &InputSecurityGroupConfig,
        new: &InputSecurityGroupConfig,
    ) -> Result<InputSecurityGroupState> {
        new.ensure_valid(Self::DISPLAY_NAME)?;
        let diff = old.diff_ignoring(new, &self.options.ignore_tags);
        reject_replacement(Self::DISPLAY_NAME, id, &diff.replace)?;

        if diff.has_group("ipv4_whitelist") {
            tracing::debug!(id, group = "ipv4_whitelist", "updating input security group");
            self.api
                .update_input_security_group(UpdateInputSecurityGroupRequest {
                    input_security_group_id: id.to_string(),
                    whitelist_rules: new.ipv4_whitelist.iter().cloned().collect(),
                })
                .await
                .map_err(|e| update_error(Self::DISPLAY_NAME, id, "ipv4_whitelist", e))?;
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
        tracing::debug!(id, "deleting input security group");
        match self.api.delete_input_security_group(id).await {
            Ok(()) => {}
            Err(e) if e.is_not_found() => {
                tracing::debug!(id, "input security group already gone");
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
        tracing::info!(id, "deleted input security group");
        Ok(())
    }
}
