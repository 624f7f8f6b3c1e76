//! In-memory MediaLive service for tests
//!
//! Behaves like the remote service closely enough for reconciler tests:
//! IDs and ARNs are assigned on creation, deletion is asynchronous when asked
//! to be, and every call is recorded so tests can assert on exactly what was
//! sent.

use crate::api::*;
use crate::error::{ApiError, Result};
use async_trait::async_trait;
use liveflow_cloud::{DELETED_STATUS, TagDiff, Tags};
use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};

const ACCOUNT_ARN_PREFIX: &str = "arn:aws:medialive:us-east-1:123456789012";
const DELETING_STATUS: &str = "DELETING";

/// A call received by [`InMemoryMediaLive`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApiCall {
    CreateInputSecurityGroup(CreateInputSecurityGroupRequest),
    DescribeInputSecurityGroup(String),
    UpdateInputSecurityGroup(UpdateInputSecurityGroupRequest),
    DeleteInputSecurityGroup(String),
    ListInputSecurityGroups,
    CreateInput(CreateInputRequest),
    DescribeInput(String),
    UpdateInput(UpdateInputRequest),
    DeleteInput(String),
    ListInputs,
    CreateChannel(CreateChannelRequest),
    DescribeChannel(String),
    UpdateChannel(UpdateChannelRequest),
    UpdateChannelClass(UpdateChannelClassRequest),
    DeleteChannel(String),
    ListChannels,
    UpdateTags { resource_arn: String, diff: TagDiff },
}

impl ApiCall {
    /// Whether the call changes remote state
    pub fn is_mutation(&self) -> bool {
        !matches!(
            self,
            ApiCall::DescribeInputSecurityGroup(_)
                | ApiCall::DescribeInput(_)
                | ApiCall::DescribeChannel(_)
                | ApiCall::ListInputSecurityGroups
                | ApiCall::ListInputs
                | ApiCall::ListChannels
        )
    }

    pub fn is_tag_update(&self) -> bool {
        matches!(self, ApiCall::UpdateTags { .. })
    }
}

/// How deleted entities disappear
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DeletionMode {
    /// Gone as soon as the delete call returns
    #[default]
    Immediate,

    /// Reported as `DELETING` for `polls` describes, then absent
    Vanish { polls: u32 },

    /// Reported as `DELETING` for `polls` describes, then as `DELETED`
    Tombstone { polls: u32 },

    /// Reported as `DELETING` forever
    Stuck,
}

struct Stored<T> {
    entity: T,
    /// Describes left before a pending deletion settles
    pending: Option<u32>,
}

impl<T> Stored<T> {
    fn new(entity: T) -> Self {
        Self {
            entity,
            pending: None,
        }
    }
}

trait Entity: Clone {
    const KIND: &'static str;
    fn arn(&self) -> &str;
    fn state(&self) -> &str;
    fn state_mut(&mut self) -> &mut String;
    fn tags_mut(&mut self) -> &mut Tags;
}

impl Entity for InputSecurityGroup {
    const KIND: &'static str = "input security group";
    fn arn(&self) -> &str {
        &self.arn
    }
    fn state(&self) -> &str {
        &self.state
    }
    fn state_mut(&mut self) -> &mut String {
        &mut self.state
    }
    fn tags_mut(&mut self) -> &mut Tags {
        &mut self.tags
    }
}

impl Entity for Input {
    const KIND: &'static str = "input";
    fn arn(&self) -> &str {
        &self.arn
    }
    fn state(&self) -> &str {
        &self.state
    }
    fn state_mut(&mut self) -> &mut String {
        &mut self.state
    }
    fn tags_mut(&mut self) -> &mut Tags {
        &mut self.tags
    }
}

impl Entity for Channel {
    const KIND: &'static str = "channel";
    fn arn(&self) -> &str {
        &self.arn
    }
    fn state(&self) -> &str {
        &self.state
    }
    fn state_mut(&mut self) -> &mut String {
        &mut self.state
    }
    fn tags_mut(&mut self) -> &mut Tags {
        &mut self.tags
    }
}

type Matcher = Box<dyn Fn(&ApiCall) -> bool + Send>;

#[derive(Default)]
struct Inner {
    next_id: u64,
    deletion: DeletionMode,
    security_groups: BTreeMap<String, Stored<InputSecurityGroup>>,
    inputs: BTreeMap<String, Stored<Input>>,
    channels: BTreeMap<String, Stored<Channel>>,
    calls: Vec<ApiCall>,
    failures: Vec<(Matcher, ApiError)>,
}

impl Inner {
    fn allocate_id(&mut self) -> String {
        self.next_id += 1;
        (1_000_000 + self.next_id).to_string()
    }

    fn tags_by_arn(&mut self, arn: &str) -> Option<&mut Tags> {
        if let Some(s) = self.security_groups.values_mut().find(|s| s.entity.arn() == arn) {
            return Some(s.entity.tags_mut());
        }
        if let Some(s) = self.inputs.values_mut().find(|s| s.entity.arn() == arn) {
            return Some(s.entity.tags_mut());
        }
        self.channels
            .values_mut()
            .find(|s| s.entity.arn() == arn)
            .map(|s| s.entity.tags_mut())
    }

    fn live_input(&self, id: &str) -> bool {
        self.inputs.get(id).is_some_and(|s| s.pending.is_none())
    }

    fn attach_security_groups(&mut self, input_id: &str, groups: &[String]) {
        for group in groups {
            if let Some(stored) = self.security_groups.get_mut(group) {
                if !stored.entity.inputs.iter().any(|i| i == input_id) {
                    stored.entity.inputs.push(input_id.to_string());
                }
                stored.entity.state = "IN_USE".to_string();
            }
        }
    }

    fn detach_security_groups(&mut self, input_id: &str) {
        for stored in self.security_groups.values_mut() {
            stored.entity.inputs.retain(|i| i != input_id);
            if stored.entity.inputs.is_empty() && stored.entity.state == "IN_USE" {
                stored.entity.state = "IDLE".to_string();
            }
        }
    }

    fn attach_inputs(&mut self, channel_id: &str, attachments: &[InputAttachment]) {
        for attachment in attachments {
            if let Some(stored) = self.inputs.get_mut(&attachment.input_id) {
                if !stored.entity.attached_channels.iter().any(|c| c == channel_id) {
                    stored.entity.attached_channels.push(channel_id.to_string());
                }
                stored.entity.state = "ATTACHED".to_string();
            }
        }
    }

    fn detach_inputs(&mut self, channel_id: &str) {
        for stored in self.inputs.values_mut() {
            stored.entity.attached_channels.retain(|c| c != channel_id);
            if stored.entity.attached_channels.is_empty() && stored.entity.state == "ATTACHED" {
                stored.entity.state = "DETACHED".to_string();
            }
        }
    }
}

fn not_found<T: Entity>(id: &str) -> ApiError {
    ApiError::NotFound(format!("{} {} does not exist", T::KIND, id))
}

fn describe<T: Entity>(
    map: &mut BTreeMap<String, Stored<T>>,
    id: &str,
    mode: DeletionMode,
) -> Result<T> {
    let Some(stored) = map.get_mut(id) else {
        return Err(not_found::<T>(id));
    };

    match stored.pending {
        None => {}
        Some(0) => match mode {
            DeletionMode::Tombstone { .. } => {
                *stored.entity.state_mut() = DELETED_STATUS.to_string();
            }
            _ => {
                map.remove(id);
                return Err(not_found::<T>(id));
            }
        },
        Some(left) => {
            if mode != DeletionMode::Stuck {
                stored.pending = Some(left - 1);
            }
        }
    }
    Ok(stored.entity.clone())
}

/// Start deleting `id` according to `mode`
fn delete<T: Entity>(
    map: &mut BTreeMap<String, Stored<T>>,
    id: &str,
    mode: DeletionMode,
) -> Result<()> {
    let Some(stored) = map.get_mut(id) else {
        return Err(not_found::<T>(id));
    };
    if stored.entity.state() == DELETED_STATUS {
        return Err(not_found::<T>(id));
    }
    if stored.pending.is_some() {
        return Ok(());
    }

    let polls = match mode {
        DeletionMode::Immediate => {
            map.remove(id);
            return Ok(());
        }
        DeletionMode::Vanish { polls } | DeletionMode::Tombstone { polls } => polls,
        DeletionMode::Stuck => 1,
    };
    stored.pending = Some(polls);
    *stored.entity.state_mut() = DELETING_STATUS.to_string();
    Ok(())
}

fn live<T: Entity>(map: &BTreeMap<String, Stored<T>>, id: &str) -> Result<()> {
    match map.get(id) {
        Some(stored) if stored.pending.is_none() => Ok(()),
        _ => Err(not_found::<T>(id)),
    }
}

fn input_destinations(
    seq: u64,
    input_type: &str,
    requested: &[InputDestinationRequest],
    in_vpc: bool,
) -> Vec<InputDestination> {
    let address = |i: usize| {
        if in_vpc {
            format!("10.0.{}.{}", i, 10 + seq % 200)
        } else {
            format!("198.51.100.{}", (10 + 2 * seq as usize + i) % 250)
        }
    };
    let vpc = |i: usize| {
        in_vpc.then(|| InputDestinationVpc {
            availability_zone: Some(format!("us-east-1{}", if i == 0 { 'a' } else { 'b' })),
            network_interface_id: Some(format!("eni-{:08x}{}", seq, i)),
        })
    };

    match input_type {
        "RTMP_PUSH" => requested
            .iter()
            .enumerate()
            .map(|(i, d)| InputDestination {
                ip: Some(address(i)),
                port: Some("1935".to_string()),
                url: Some(format!("rtmp://{}:1935/{}", address(i), d.stream_name)),
                vpc: vpc(i),
            })
            .collect(),
        other => {
            let scheme = if other == "UDP_PUSH" { "udp" } else { "rtp" };
            (0..2)
                .map(|i| InputDestination {
                    ip: Some(address(i)),
                    port: Some("5000".to_string()),
                    url: Some(format!("{}://{}:5000", scheme, address(i))),
                    vpc: vpc(i),
                })
                .collect()
        }
    }
}

fn input_class(input_type: &str, destinations: usize) -> String {
    if input_type == "RTMP_PUSH" && destinations < 2 {
        "SINGLE_PIPELINE".to_string()
    } else {
        "STANDARD".to_string()
    }
}

fn egress_endpoints(seq: u64, channel_class: &str) -> Vec<String> {
    let pipelines = if channel_class == "SINGLE_PIPELINE" { 1 } else { 2 };
    (0..pipelines)
        .map(|i| format!("203.0.113.{}", (10 + 2 * seq + i) % 250))
        .collect()
}

/// In-memory [`MediaLiveApi`]
#[derive(Default)]
pub struct InMemoryMediaLive {
    inner: Mutex<Inner>,
}

impl InMemoryMediaLive {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_deletion_mode(self, mode: DeletionMode) -> Self {
        self.set_deletion_mode(mode);
        self
    }

    pub fn set_deletion_mode(&self, mode: DeletionMode) {
        self.lock().deletion = mode;
    }

    /// Fail every call matching `matches` with `error` (the call is still recorded)
    pub fn fail_when(
        &self,
        matches: impl Fn(&ApiCall) -> bool + Send + 'static,
        error: ApiError,
    ) {
        self.lock().failures.push((Box::new(matches), error));
    }

    pub fn clear_failures(&self) {
        self.lock().failures.clear();
    }

    /// Every call received so far, oldest first
    pub fn calls(&self) -> Vec<ApiCall> {
        self.lock().calls.clone()
    }

    /// Calls that changed remote state
    pub fn mutations(&self) -> Vec<ApiCall> {
        self.lock()
            .calls
            .iter()
            .filter(|c| c.is_mutation())
            .cloned()
            .collect()
    }

    pub fn clear_calls(&self) {
        self.lock().calls.clear();
    }

    /// Attach a tag behind the reconciler's back (e.g. one the service adds itself)
    pub fn put_remote_tag(&self, arn: &str, key: &str, value: &str) -> bool {
        match self.lock().tags_by_arn(arn) {
            Some(tags) => {
                tags.insert(key.to_string(), value.to_string());
                true
            }
            None => false,
        }
    }

    pub fn input_security_group(&self, id: &str) -> Option<InputSecurityGroup> {
        self.lock()
            .security_groups
            .get(id)
            .map(|s| s.entity.clone())
    }

    pub fn input(&self, id: &str) -> Option<Input> {
        self.lock().inputs.get(id).map(|s| s.entity.clone())
    }

    pub fn channel(&self, id: &str) -> Option<Channel> {
        self.lock().channels.get(id).map(|s| s.entity.clone())
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Record `call` and return the state, or the injected failure for it
    fn begin(&self, call: ApiCall) -> Result<MutexGuard<'_, Inner>> {
        let mut inner = self.lock();
        let injected = inner
            .failures
            .iter()
            .find(|(matches, _)| matches(&call))
            .map(|(_, error)| error.clone());
        inner.calls.push(call);
        match injected {
            Some(error) => Err(error),
            None => Ok(inner),
        }
    }
}

#[async_trait]
impl MediaLiveApi for InMemoryMediaLive {
    async fn create_input_security_group(
        &self,
        request: CreateInputSecurityGroupRequest,
    ) -> Result<InputSecurityGroup> {
        let mut inner = self.begin(ApiCall::CreateInputSecurityGroup(request.clone()))?;
        let id = inner.allocate_id();
        let group = InputSecurityGroup {
            arn: format!("{}:inputSecurityGroup:{}", ACCOUNT_ARN_PREFIX, id),
            id: id.clone(),
            state: "IDLE".to_string(),
            whitelist_rules: request.whitelist_rules,
            inputs: Vec::new(),
            tags: request.tags.unwrap_or_default(),
        };
        inner.security_groups.insert(id, Stored::new(group.clone()));
        Ok(group)
    }

    async fn describe_input_security_group(&self, id: &str) -> Result<InputSecurityGroup> {
        let mut inner = self.begin(ApiCall::DescribeInputSecurityGroup(id.to_string()))?;
        let mode = inner.deletion;
        describe(&mut inner.security_groups, id, mode)
    }

    async fn update_input_security_group(
        &self,
        request: UpdateInputSecurityGroupRequest,
    ) -> Result<InputSecurityGroup> {
        let mut inner = self.begin(ApiCall::UpdateInputSecurityGroup(request.clone()))?;
        let id = request.input_security_group_id.as_str();
        live(&inner.security_groups, id)?;
        let stored = inner
            .security_groups
            .get_mut(id)
            .ok_or_else(|| not_found::<InputSecurityGroup>(id))?;
        stored.entity.whitelist_rules = request.whitelist_rules;
        Ok(stored.entity.clone())
    }

    async fn delete_input_security_group(&self, id: &str) -> Result<()> {
        let mut inner = self.begin(ApiCall::DeleteInputSecurityGroup(id.to_string()))?;
        if let Some(stored) = inner.security_groups.get(id) {
            if !stored.entity.inputs.is_empty() {
                return Err(ApiError::service(
                    "ConflictException",
                    format!("input security group {} is in use", id),
                ));
            }
        }
        let mode = inner.deletion;
        delete(&mut inner.security_groups, id, mode)
    }

    async fn list_input_security_groups(&self) -> Result<Vec<InputSecurityGroup>> {
        let inner = self.begin(ApiCall::ListInputSecurityGroups)?;
        Ok(inner
            .security_groups
            .values()
            .map(|s| s.entity.clone())
            .collect())
    }

    async fn create_input(&self, request: CreateInputRequest) -> Result<Input> {
        let mut inner = self.begin(ApiCall::CreateInput(request.clone()))?;
        let groups = request.input_security_groups.clone().unwrap_or_default();
        if let Some(missing) = groups.iter().find(|g| live(&inner.security_groups, g).is_err()) {
            return Err(ApiError::service(
                "BadRequestException",
                format!("input security group {} does not exist", missing),
            ));
        }

        let id = inner.allocate_id();
        let seq = inner.next_id;
        let requested = request.destinations.clone().unwrap_or_default();
        let input = Input {
            arn: format!("{}:input:{}", ACCOUNT_ARN_PREFIX, id),
            id: id.clone(),
            name: request.name,
            input_class: Some(input_class(&request.input_type, requested.len())),
            input_source_type: Some("STATIC".to_string()),
            state: "DETACHED".to_string(),
            destinations: input_destinations(
                seq,
                &request.input_type,
                &requested,
                request.vpc.is_some(),
            ),
            input_type: request.input_type,
            security_groups: groups.clone(),
            attached_channels: Vec::new(),
            tags: request.tags.unwrap_or_default(),
        };
        inner.inputs.insert(id.clone(), Stored::new(input.clone()));
        inner.attach_security_groups(&id, &groups);
        Ok(input)
    }

    async fn describe_input(&self, id: &str) -> Result<Input> {
        let mut inner = self.begin(ApiCall::DescribeInput(id.to_string()))?;
        let mode = inner.deletion;
        describe(&mut inner.inputs, id, mode)
    }

    async fn update_input(&self, request: UpdateInputRequest) -> Result<Input> {
        let mut inner = self.begin(ApiCall::UpdateInput(request.clone()))?;
        let id = request.input_id.as_str();
        live(&inner.inputs, id)?;

        if let Some(groups) = &request.input_security_groups {
            if let Some(missing) = groups.iter().find(|g| live(&inner.security_groups, g).is_err()) {
                return Err(ApiError::service(
                    "BadRequestException",
                    format!("input security group {} does not exist", missing),
                ));
            }
            inner.detach_security_groups(id);
            inner.attach_security_groups(id, groups);
        }

        let seq = inner.next_id;
        let stored = inner
            .inputs
            .get_mut(id)
            .ok_or_else(|| not_found::<Input>(id))?;
        if let Some(name) = request.name {
            stored.entity.name = name;
        }
        if let Some(groups) = request.input_security_groups {
            stored.entity.security_groups = groups;
        }
        if let Some(destinations) = request.destinations {
            let in_vpc = stored.entity.destinations.iter().any(|d| d.vpc.is_some());
            stored.entity.destinations =
                input_destinations(seq, &stored.entity.input_type, &destinations, in_vpc);
            stored.entity.input_class =
                Some(input_class(&stored.entity.input_type, destinations.len()));
        }
        Ok(stored.entity.clone())
    }

    async fn delete_input(&self, id: &str) -> Result<()> {
        let mut inner = self.begin(ApiCall::DeleteInput(id.to_string()))?;
        if let Some(stored) = inner.inputs.get(id) {
            if !stored.entity.attached_channels.is_empty() {
                return Err(ApiError::service(
                    "ConflictException",
                    format!("input {} is attached to a channel", id),
                ));
            }
        }
        let mode = inner.deletion;
        delete(&mut inner.inputs, id, mode)?;
        inner.detach_security_groups(id);
        Ok(())
    }

    async fn list_inputs(&self) -> Result<Vec<Input>> {
        let inner = self.begin(ApiCall::ListInputs)?;
        Ok(inner.inputs.values().map(|s| s.entity.clone()).collect())
    }

    async fn create_channel(&self, request: CreateChannelRequest) -> Result<Channel> {
        let mut inner = self.begin(ApiCall::CreateChannel(request.clone()))?;
        if let Some(missing) = request
            .input_attachments
            .iter()
            .find(|a| !inner.live_input(&a.input_id))
        {
            return Err(ApiError::service(
                "BadRequestException",
                format!("input {} does not exist", missing.input_id),
            ));
        }

        let id = inner.allocate_id();
        let seq = inner.next_id;
        let channel = Channel {
            arn: format!("{}:channel:{}", ACCOUNT_ARN_PREFIX, id),
            id: id.clone(),
            name: request.name,
            egress_endpoints: egress_endpoints(seq, &request.channel_class),
            channel_class: Some(request.channel_class),
            state: "IDLE".to_string(),
            destinations: request.destinations,
            input_attachments: request.input_attachments,
            log_level: request.log_level,
            role_arn: request.role_arn,
            pipelines_running_count: 0,
            tags: request.tags.unwrap_or_default(),
        };
        let attachments = channel.input_attachments.clone();
        inner.channels.insert(id.clone(), Stored::new(channel.clone()));
        inner.attach_inputs(&id, &attachments);
        Ok(channel)
    }

    async fn describe_channel(&self, id: &str) -> Result<Channel> {
        let mut inner = self.begin(ApiCall::DescribeChannel(id.to_string()))?;
        let mode = inner.deletion;
        describe(&mut inner.channels, id, mode)
    }

    async fn update_channel(&self, request: UpdateChannelRequest) -> Result<Channel> {
        let mut inner = self.begin(ApiCall::UpdateChannel(request.clone()))?;
        let id = request.channel_id.as_str();
        live(&inner.channels, id)?;

        if let Some(attachments) = &request.input_attachments {
            if let Some(missing) = attachments.iter().find(|a| !inner.live_input(&a.input_id)) {
                return Err(ApiError::service(
                    "BadRequestException",
                    format!("input {} does not exist", missing.input_id),
                ));
            }
            inner.detach_inputs(id);
            inner.attach_inputs(id, attachments);
        }

        let stored = inner
            .channels
            .get_mut(id)
            .ok_or_else(|| not_found::<Channel>(id))?;
        let channel = &mut stored.entity;
        if let Some(name) = request.name {
            channel.name = Some(name).filter(|n| !n.is_empty());
        }
        if let Some(destinations) = request.destinations {
            channel.destinations = destinations;
        }
        if let Some(attachments) = request.input_attachments {
            channel.input_attachments = attachments;
        }
        if let Some(log_level) = request.log_level {
            channel.log_level = Some(log_level);
        }
        if let Some(role_arn) = request.role_arn {
            channel.role_arn = Some(role_arn).filter(|r| !r.is_empty());
        }
        Ok(channel.clone())
    }

    async fn update_channel_class(&self, request: UpdateChannelClassRequest) -> Result<Channel> {
        let mut inner = self.begin(ApiCall::UpdateChannelClass(request.clone()))?;
        let id = request.channel_id.as_str();
        live(&inner.channels, id)?;
        let seq = inner.next_id;
        let stored = inner
            .channels
            .get_mut(id)
            .ok_or_else(|| not_found::<Channel>(id))?;
        stored.entity.egress_endpoints = egress_endpoints(seq, &request.channel_class);
        stored.entity.channel_class = Some(request.channel_class);
        Ok(stored.entity.clone())
    }

    async fn delete_channel(&self, id: &str) -> Result<()> {
        let mut inner = self.begin(ApiCall::DeleteChannel(id.to_string()))?;
        let mode = inner.deletion;
        delete(&mut inner.channels, id, mode)?;
        inner.detach_inputs(id);
        Ok(())
    }

    async fn list_channels(&self) -> Result<Vec<Channel>> {
        let inner = self.begin(ApiCall::ListChannels)?;
        Ok(inner.channels.values().map(|s| s.entity.clone()).collect())
    }

    async fn update_tags(&self, resource_arn: &str, old: &Tags, new: &Tags) -> Result<()> {
        let diff = TagDiff::between(old, new);
        let mut inner = self.begin(ApiCall::UpdateTags {
            resource_arn: resource_arn.to_string(),
            diff: diff.clone(),
        })?;
        let tags = inner
            .tags_by_arn(resource_arn)
            .ok_or_else(|| ApiError::NotFound(format!("resource {} does not exist", resource_arn)))?;
        for key in &diff.remove {
            tags.remove(key);
        }
        tags.extend(diff.upsert);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rtmp_input(name: &str) -> CreateInputRequest {
        CreateInputRequest {
            name: name.to_string(),
            input_type: "RTMP_PUSH".to_string(),
            destinations: Some(vec![
                InputDestinationRequest {
                    stream_name: "live/a".to_string(),
                },
                InputDestinationRequest {
                    stream_name: "live/b".to_string(),
                },
            ]),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_input_gets_id_and_endpoints() {
        let api = InMemoryMediaLive::new();
        let input = api.create_input(rtmp_input("main")).await.unwrap();

        assert!(!input.id.is_empty());
        assert!(input.arn.ends_with(&format!(":input:{}", input.id)));
        assert_eq!(input.destinations.len(), 2);
        assert!(input.destinations[0].url.as_deref().unwrap().ends_with("/live/a"));
        assert_eq!(input.input_class.as_deref(), Some("STANDARD"));
    }

    #[tokio::test]
    async fn test_vanishing_deletion() {
        let api = InMemoryMediaLive::new().with_deletion_mode(DeletionMode::Vanish { polls: 1 });
        let input = api.create_input(rtmp_input("main")).await.unwrap();

        api.delete_input(&input.id).await.unwrap();
        assert_eq!(api.describe_input(&input.id).await.unwrap().state, "DELETING");
        assert!(api.describe_input(&input.id).await.unwrap_err().is_not_found());
        assert!(api.delete_input(&input.id).await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_tombstoned_deletion() {
        let api = InMemoryMediaLive::new().with_deletion_mode(DeletionMode::Tombstone { polls: 0 });
        let input = api.create_input(rtmp_input("main")).await.unwrap();

        api.delete_input(&input.id).await.unwrap();
        assert_eq!(api.describe_input(&input.id).await.unwrap().state, "DELETED");
        assert!(api.delete_input(&input.id).await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_update_tags_applies_diff() {
        let api = InMemoryMediaLive::new();
        let mut old = Tags::new();
        old.insert("a".into(), "1".into());
        old.insert("b".into(), "2".into());
        let mut request = rtmp_input("main");
        request.tags = Some(old.clone());
        let input = api.create_input(request).await.unwrap();

        let mut new = Tags::new();
        new.insert("b".into(), "3".into());
        new.insert("c".into(), "4".into());
        api.update_tags(&input.arn, &old, &new).await.unwrap();

        assert_eq!(api.input(&input.id).unwrap().tags, new);
    }

    #[tokio::test]
    async fn test_injected_failure_is_recorded() {
        let api = InMemoryMediaLive::new();
        api.fail_when(
            |call| matches!(call, ApiCall::CreateInput(_)),
            ApiError::service("BadRequestException", "invalid stream name"),
        );

        let err = api.create_input(rtmp_input("main")).await.unwrap_err();
        assert_eq!(err.to_string(), "BadRequestException: invalid stream name");
        assert_eq!(api.calls().len(), 1);
    }

    #[tokio::test]
    async fn test_attached_input_cannot_be_deleted() {
        let api = InMemoryMediaLive::new();
        let input = api.create_input(rtmp_input("main")).await.unwrap();
        api.create_channel(CreateChannelRequest {
            channel_class: "SINGLE_PIPELINE".to_string(),
            input_attachments: vec![InputAttachment {
                input_id: input.id.clone(),
                ..Default::default()
            }],
            ..Default::default()
        })
        .await
        .unwrap();

        assert_eq!(api.input(&input.id).unwrap().state, "ATTACHED");
        let err = api.delete_input(&input.id).await.unwrap_err();
        assert!(matches!(err, ApiError::Service { ref code, .. } if code == "ConflictException"));
    }
}
