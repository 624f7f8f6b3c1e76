//! MediaLive API on the AWS SDK

use crate::convert::{
    channel_from, input_attachments, input_destination_requests, input_from,
    input_security_group_from, output_destinations, sdk_tags, vpc_request, whitelist_rules,
};
use async_trait::async_trait;
use aws_config::{BehaviorVersion, Region};
use aws_sdk_medialive::Client;
use aws_sdk_medialive::error::{DisplayErrorContext, ProvideErrorMetadata, SdkError};
use aws_sdk_medialive::types as sdk;
use liveflow_cloud::{TagDiff, Tags};
use liveflow_medialive::api::*;
use liveflow_medialive::{ApiError, MediaLiveApi, Result};

/// Where and as whom to reach the service
///
/// Unset fields fall back to the default AWS configuration chain.
#[derive(Debug, Clone, Default)]
pub struct AwsSettings {
    pub region: Option<String>,
    pub profile: Option<String>,
    /// Alternative endpoint, e.g. a local emulator
    pub endpoint_url: Option<String>,
}

/// [`MediaLiveApi`] backed by `aws-sdk-medialive`
#[derive(Debug, Clone)]
pub struct AwsMediaLive {
    client: Client,
}

impl AwsMediaLive {
    pub async fn connect(settings: &AwsSettings) -> Self {
        let mut loader = aws_config::defaults(BehaviorVersion::latest());
        if let Some(region) = &settings.region {
            loader = loader.region(Region::new(region.clone()));
        }
        if let Some(profile) = &settings.profile {
            loader = loader.profile_name(profile);
        }
        if let Some(endpoint_url) = &settings.endpoint_url {
            loader = loader.endpoint_url(endpoint_url);
        }
        let config = loader.load().await;
        tracing::debug!(region = ?config.region(), "loaded AWS configuration");

        Self::from_client(Client::new(&config))
    }

    pub fn from_client(client: Client) -> Self {
        Self { client }
    }
}

/// Map an SDK failure onto [`ApiError`], keeping the service's code and message
fn api_error<E, R>(err: SdkError<E, R>) -> ApiError
where
    E: ProvideErrorMetadata + std::error::Error + 'static,
    R: std::fmt::Debug,
{
    let message = err.message().unwrap_or_default().to_string();
    match err.code() {
        Some("NotFoundException") => ApiError::NotFound(message),
        Some(code) => ApiError::service(code, message),
        None => ApiError::Transport(DisplayErrorContext(&err).to_string()),
    }
}

fn missing(operation: &str, member: &str) -> ApiError {
    ApiError::Transport(format!("{} response has no {}", operation, member))
}

#[async_trait]
impl MediaLiveApi for AwsMediaLive {
    async fn create_input_security_group(
        &self,
        request: CreateInputSecurityGroupRequest,
    ) -> Result<InputSecurityGroup> {
        tracing::debug!("CreateInputSecurityGroup");
        let output = self
            .client
            .create_input_security_group()
            .set_whitelist_rules(Some(whitelist_rules(&request.whitelist_rules)?))
            .set_tags(request.tags.as_ref().map(sdk_tags))
            .send()
            .await
            .map_err(api_error)?;
        let group = output
            .security_group()
            .ok_or_else(|| missing("CreateInputSecurityGroup", "SecurityGroup"))?;
        Ok(input_security_group_from!(group))
    }

    async fn describe_input_security_group(&self, id: &str) -> Result<InputSecurityGroup> {
        tracing::debug!(id, "DescribeInputSecurityGroup");
        let output = self
            .client
            .describe_input_security_group()
            .input_security_group_id(id)
            .send()
            .await
            .map_err(api_error)?;
        Ok(input_security_group_from!(&output))
    }

    async fn update_input_security_group(
        &self,
        request: UpdateInputSecurityGroupRequest,
    ) -> Result<InputSecurityGroup> {
        tracing::debug!(id = %request.input_security_group_id, "UpdateInputSecurityGroup");
        let output = self
            .client
            .update_input_security_group()
            .input_security_group_id(&request.input_security_group_id)
            .set_whitelist_rules(Some(whitelist_rules(&request.whitelist_rules)?))
            .send()
            .await
            .map_err(api_error)?;
        let group = output
            .security_group()
            .ok_or_else(|| missing("UpdateInputSecurityGroup", "SecurityGroup"))?;
        Ok(input_security_group_from!(group))
    }

    async fn delete_input_security_group(&self, id: &str) -> Result<()> {
        tracing::debug!(id, "DeleteInputSecurityGroup");
        self.client
            .delete_input_security_group()
            .input_security_group_id(id)
            .send()
            .await
            .map_err(api_error)?;
        Ok(())
    }

    async fn list_input_security_groups(&self) -> Result<Vec<InputSecurityGroup>> {
        tracing::debug!("ListInputSecurityGroups");
        let mut pages = self.client.list_input_security_groups().into_paginator().send();
        let mut groups = Vec::new();
        while let Some(page) = pages.next().await {
            let page = page.map_err(api_error)?;
            groups.extend(
                page.input_security_groups()
                    .iter()
                    .map(|g| input_security_group_from!(g)),
            );
        }
        Ok(groups)
    }

    async fn create_input(&self, request: CreateInputRequest) -> Result<Input> {
        tracing::debug!(name = %request.name, "CreateInput");
        let destinations = request
            .destinations
            .as_deref()
            .map(input_destination_requests)
            .transpose()?;
        let vpc = request.vpc.as_ref().map(vpc_request).transpose()?;
        let output = self
            .client
            .create_input()
            .name(&request.name)
            .r#type(sdk::InputType::from(request.input_type.as_str()))
            .set_destinations(destinations)
            .set_input_security_groups(request.input_security_groups.clone())
            .set_vpc(vpc)
            .set_tags(request.tags.as_ref().map(sdk_tags))
            .send()
            .await
            .map_err(api_error)?;
        let input = output.input().ok_or_else(|| missing("CreateInput", "Input"))?;
        Ok(input_from!(input))
    }

    async fn describe_input(&self, id: &str) -> Result<Input> {
        tracing::debug!(id, "DescribeInput");
        let output = self
            .client
            .describe_input()
            .input_id(id)
            .send()
            .await
            .map_err(api_error)?;
        Ok(input_from!(&output))
    }

    async fn update_input(&self, request: UpdateInputRequest) -> Result<Input> {
        tracing::debug!(id = %request.input_id, "UpdateInput");
        let destinations = request
            .destinations
            .as_deref()
            .map(input_destination_requests)
            .transpose()?;
        let output = self
            .client
            .update_input()
            .input_id(&request.input_id)
            .set_name(request.name.clone())
            .set_destinations(destinations)
            .set_input_security_groups(request.input_security_groups.clone())
            .send()
            .await
            .map_err(api_error)?;
        let input = output.input().ok_or_else(|| missing("UpdateInput", "Input"))?;
        Ok(input_from!(input))
    }

    async fn delete_input(&self, id: &str) -> Result<()> {
        tracing::debug!(id, "DeleteInput");
        self.client
            .delete_input()
            .input_id(id)
            .send()
            .await
            .map_err(api_error)?;
        Ok(())
    }

    async fn list_inputs(&self) -> Result<Vec<Input>> {
        tracing::debug!("ListInputs");
        let mut pages = self.client.list_inputs().into_paginator().send();
        let mut inputs = Vec::new();
        while let Some(page) = pages.next().await {
            let page = page.map_err(api_error)?;
            inputs.extend(page.inputs().iter().map(|i| input_from!(i)));
        }
        Ok(inputs)
    }

    async fn create_channel(&self, request: CreateChannelRequest) -> Result<Channel> {
        tracing::debug!(class = %request.channel_class, "CreateChannel");
        let output = self
            .client
            .create_channel()
            .set_name(request.name.clone())
            .channel_class(sdk::ChannelClass::from(request.channel_class.as_str()))
            .set_destinations(Some(output_destinations(&request.destinations)?))
            .set_input_attachments(Some(input_attachments(&request.input_attachments)?))
            .set_log_level(request.log_level.as_deref().map(sdk::LogLevel::from))
            .set_role_arn(request.role_arn.clone())
            .set_tags(request.tags.as_ref().map(sdk_tags))
            .send()
            .await
            .map_err(api_error)?;
        let channel = output
            .channel()
            .ok_or_else(|| missing("CreateChannel", "Channel"))?;
        Ok(channel_from!(channel))
    }

    async fn describe_channel(&self, id: &str) -> Result<Channel> {
        tracing::debug!(id, "DescribeChannel");
        let output = self
            .client
            .describe_channel()
            .channel_id(id)
            .send()
            .await
            .map_err(api_error)?;
        Ok(channel_from!(&output))
    }

    async fn update_channel(&self, request: UpdateChannelRequest) -> Result<Channel> {
        tracing::debug!(id = %request.channel_id, "UpdateChannel");
        let destinations = request
            .destinations
            .as_deref()
            .map(output_destinations)
            .transpose()?;
        let attachments = request
            .input_attachments
            .as_deref()
            .map(input_attachments)
            .transpose()?;
        let output = self
            .client
            .update_channel()
            .channel_id(&request.channel_id)
            .set_name(request.name.clone())
            .set_destinations(destinations)
            .set_input_attachments(attachments)
            .set_log_level(request.log_level.as_deref().map(sdk::LogLevel::from))
            .set_role_arn(request.role_arn.clone())
            .send()
            .await
            .map_err(api_error)?;
        let channel = output
            .channel()
            .ok_or_else(|| missing("UpdateChannel", "Channel"))?;
        Ok(channel_from!(channel))
    }

    async fn update_channel_class(&self, request: UpdateChannelClassRequest) -> Result<Channel> {
        tracing::debug!(id = %request.channel_id, class = %request.channel_class, "UpdateChannelClass");
        let output = self
            .client
            .update_channel_class()
            .channel_id(&request.channel_id)
            .channel_class(sdk::ChannelClass::from(request.channel_class.as_str()))
            .send()
            .await
            .map_err(api_error)?;
        let channel = output
            .channel()
            .ok_or_else(|| missing("UpdateChannelClass", "Channel"))?;
        Ok(channel_from!(channel))
    }

    async fn delete_channel(&self, id: &str) -> Result<()> {
        tracing::debug!(id, "DeleteChannel");
        self.client
            .delete_channel()
            .channel_id(id)
            .send()
            .await
            .map_err(api_error)?;
        Ok(())
    }

    async fn list_channels(&self) -> Result<Vec<Channel>> {
        tracing::debug!("ListChannels");
        let mut pages = self.client.list_channels().into_paginator().send();
        let mut channels = Vec::new();
        while let Some(page) = pages.next().await {
            let page = page.map_err(api_error)?;
            channels.extend(page.channels().iter().map(|c| channel_from!(c)));
        }
        Ok(channels)
    }

    async fn update_tags(&self, resource_arn: &str, old: &Tags, new: &Tags) -> Result<()> {
        let diff = TagDiff::between(old, new);
        if diff.is_empty() {
            return Ok(());
        }
        tracing::debug!(
            arn = resource_arn,
            upsert = diff.upsert.len(),
            remove = diff.remove.len(),
            "updating tags"
        );

        if !diff.upsert.is_empty() {
            self.client
                .create_tags()
                .resource_arn(resource_arn)
                .set_tags(Some(sdk_tags(&diff.upsert)))
                .send()
                .await
                .map_err(api_error)?;
        }
        if !diff.remove.is_empty() {
            self.client
                .delete_tags()
                .resource_arn(resource_arn)
                .set_tag_keys(Some(diff.remove.iter().cloned().collect()))
                .send()
                .await
                .map_err(api_error)?;
        }
        Ok(())
    }
}
