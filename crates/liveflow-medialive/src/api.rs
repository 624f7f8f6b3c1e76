//! Remote MediaLive API contract
//!
//! Reconcilers never talk to the service directly: they are handed an
//! implementation of [`MediaLiveApi`], which is the AWS SDK adapter in
//! production and an in-memory double in tests. The request and response
//! shapes below mirror the service's own, with enumerations kept as their
//! wire strings.

use crate::error::Result;
use async_trait::async_trait;
use liveflow_cloud::Tags;
use serde::{Deserialize, Serialize};

/// Operations the reconcilers need from the MediaLive service
#[async_trait]
pub trait MediaLiveApi: Send + Sync {
    async fn create_input_security_group(
        &self,
        request: CreateInputSecurityGroupRequest,
    ) -> Result<InputSecurityGroup>;
    async fn describe_input_security_group(&self, id: &str) -> Result<InputSecurityGroup>;
    async fn update_input_security_group(
        &self,
        request: UpdateInputSecurityGroupRequest,
    ) -> Result<InputSecurityGroup>;
    async fn delete_input_security_group(&self, id: &str) -> Result<()>;
    async fn list_input_security_groups(&self) -> Result<Vec<InputSecurityGroup>>;

    async fn create_input(&self, request: CreateInputRequest) -> Result<Input>;
    async fn describe_input(&self, id: &str) -> Result<Input>;
    async fn update_input(&self, request: UpdateInputRequest) -> Result<Input>;
    async fn delete_input(&self, id: &str) -> Result<()>;
    async fn list_inputs(&self) -> Result<Vec<Input>>;

    async fn create_channel(&self, request: CreateChannelRequest) -> Result<Channel>;
    async fn describe_channel(&self, id: &str) -> Result<Channel>;
    async fn update_channel(&self, request: UpdateChannelRequest) -> Result<Channel>;
    async fn update_channel_class(&self, request: UpdateChannelClassRequest) -> Result<Channel>;
    async fn delete_channel(&self, id: &str) -> Result<()>;
    async fn list_channels(&self) -> Result<Vec<Channel>>;

    /// Turn the tag set of `resource_arn` from `old` into `new`
    ///
    /// Implementations add changed keys and remove dropped ones; keys equal
    /// in both maps are left alone.
    async fn update_tags(&self, resource_arn: &str, old: &Tags, new: &Tags) -> Result<()>;
}

// ---------------------------------------------------------------------------
// Input security groups
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputSecurityGroup {
    pub id: String,
    pub arn: String,
    pub state: String,
    /// Allowed source CIDR blocks
    pub whitelist_rules: Vec<String>,
    /// IDs of inputs using this group
    pub inputs: Vec<String>,
    pub tags: Tags,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateInputSecurityGroupRequest {
    pub whitelist_rules: Vec<String>,
    pub tags: Option<Tags>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateInputSecurityGroupRequest {
    pub input_security_group_id: String,
    pub whitelist_rules: Vec<String>,
}

// ---------------------------------------------------------------------------
// Inputs
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Input {
    pub id: String,
    pub arn: String,
    pub name: String,
    pub input_type: String,
    pub input_class: Option<String>,
    pub input_source_type: Option<String>,
    pub state: String,
    pub destinations: Vec<InputDestination>,
    /// IDs of attached input security groups
    pub security_groups: Vec<String>,
    pub attached_channels: Vec<String>,
    pub tags: Tags,
}

/// Ingest endpoint assigned by the service
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputDestination {
    pub ip: Option<String>,
    pub port: Option<String>,
    pub url: Option<String>,
    pub vpc: Option<InputDestinationVpc>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputDestinationVpc {
    pub availability_zone: Option<String>,
    pub network_interface_id: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputDestinationRequest {
    pub stream_name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputVpcRequest {
    pub subnet_ids: Vec<String>,
    pub security_group_ids: Option<Vec<String>>,
}

/// Fields left as `None` are not sent
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateInputRequest {
    pub name: String,
    pub input_type: String,
    pub destinations: Option<Vec<InputDestinationRequest>>,
    pub input_security_groups: Option<Vec<String>>,
    pub vpc: Option<InputVpcRequest>,
    pub tags: Option<Tags>,
}

/// Fields left as `None` are not changed
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateInputRequest {
    pub input_id: String,
    pub name: Option<String>,
    pub destinations: Option<Vec<InputDestinationRequest>>,
    pub input_security_groups: Option<Vec<String>>,
}

impl UpdateInputRequest {
    pub fn new(input_id: impl Into<String>) -> Self {
        Self {
            input_id: input_id.into(),
            ..Default::default()
        }
    }
}

// ---------------------------------------------------------------------------
// Channels
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Channel {
    pub id: String,
    pub arn: String,
    pub name: Option<String>,
    pub channel_class: Option<String>,
    pub state: String,
    pub destinations: Vec<OutputDestination>,
    pub input_attachments: Vec<InputAttachment>,
    pub log_level: Option<String>,
    pub role_arn: Option<String>,
    pub pipelines_running_count: i32,
    pub egress_endpoints: Vec<String>,
    pub tags: Tags,
}

/// Where a channel sends its output
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputDestination {
    pub id: Option<String>,
    pub media_package_settings: Vec<MediaPackageOutputDestinationSettings>,
    pub multiplex_settings: Option<MultiplexProgramChannelDestinationSettings>,
    pub settings: Vec<OutputDestinationSettings>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaPackageOutputDestinationSettings {
    pub channel_id: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MultiplexProgramChannelDestinationSettings {
    pub multiplex_id: String,
    pub program_name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputDestinationSettings {
    pub password_param: Option<String>,
    pub stream_name: Option<String>,
    pub url: Option<String>,
    pub username: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputAttachment {
    pub input_attachment_name: Option<String>,
    pub input_id: String,
    pub automatic_input_failover_settings: Option<AutomaticInputFailoverSettings>,
    pub input_settings: Option<InputSettings>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AutomaticInputFailoverSettings {
    pub input_preference: Option<String>,
    pub secondary_input_id: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputSettings {
    pub audio_selectors: Vec<AudioSelector>,
    pub caption_selectors: Vec<CaptionSelector>,
    pub deblock_filter: Option<String>,
    pub denoise_filter: Option<String>,
    pub filter_strength: Option<i32>,
    pub input_filter: Option<String>,
    pub network_input_settings: Option<NetworkInputSettings>,
    pub smpte2038_data_preference: Option<String>,
    pub source_end_behavior: Option<String>,
    pub video_selector: Option<VideoSelector>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AudioSelector {
    pub name: String,
    pub selector_settings: Option<AudioSelectorSettings>,
}

/// How an audio selector picks its source
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum AudioSelectorSettings {
    Language {
        language_code: String,
        language_selection_policy: Option<String>,
    },
    Pid {
        pid: i32,
    },
    Track {
        tracks: Vec<i32>,
    },
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaptionSelector {
    pub name: String,
    pub language_code: Option<String>,
    pub selector_settings: Option<CaptionSelectorSettings>,
}

/// Caption source of a caption selector
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum CaptionSelectorSettings {
    Arib,
    DvbSub {
        pid: Option<i32>,
    },
    Embedded {
        convert_608_to_708: Option<String>,
        scte20_detection: Option<String>,
        source_608_channel_number: Option<i32>,
    },
    Scte20 {
        convert_608_to_708: Option<String>,
        source_608_channel_number: Option<i32>,
    },
    Scte27 {
        pid: Option<i32>,
    },
    Teletext {
        page_number: Option<String>,
    },
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkInputSettings {
    pub server_validation: Option<String>,
    pub hls_input_settings: Option<HlsInputSettings>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HlsInputSettings {
    pub bandwidth: Option<i32>,
    pub buffer_segments: Option<i32>,
    pub retries: Option<i32>,
    pub retry_interval: Option<i32>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VideoSelector {
    pub color_space: Option<String>,
    pub color_space_usage: Option<String>,
    pub selector_settings: Option<VideoSelectorSettings>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum VideoSelectorSettings {
    Pid { pid: i32 },
    ProgramId { program_id: i32 },
}

/// Fields left as `None` are not sent
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateChannelRequest {
    pub name: Option<String>,
    pub channel_class: String,
    pub destinations: Vec<OutputDestination>,
    pub input_attachments: Vec<InputAttachment>,
    pub log_level: Option<String>,
    pub role_arn: Option<String>,
    pub tags: Option<Tags>,
}

/// Fields left as `None` are not changed
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateChannelRequest {
    pub channel_id: String,
    pub name: Option<String>,
    pub destinations: Option<Vec<OutputDestination>>,
    pub input_attachments: Option<Vec<InputAttachment>>,
    pub log_level: Option<String>,
    pub role_arn: Option<String>,
}

impl UpdateChannelRequest {
    pub fn new(channel_id: impl Into<String>) -> Self {
        Self {
            channel_id: channel_id.into(),
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateChannelClassRequest {
    pub channel_id: String,
    pub channel_class: String,
}
