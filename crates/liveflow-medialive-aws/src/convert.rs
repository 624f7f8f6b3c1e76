//! Mapping between LiveFlow's API model and the SDK's shapes

use aws_sdk_medialive::error::BuildError;
use aws_sdk_medialive::types as sdk;
use liveflow_cloud::Tags;
use liveflow_medialive::ApiError;
use liveflow_medialive::api::*;
use std::collections::HashMap;

type Result<T> = std::result::Result<T, ApiError>;

/// Finish an SDK builder
///
/// Shapes with required members build into a `Result`, the rest build
/// directly; both end up here so call sites read the same.
pub(crate) trait Built {
    type Shape;
    fn built(self) -> Result<Self::Shape>;
}

impl<T> Built for std::result::Result<T, BuildError> {
    type Shape = T;
    fn built(self) -> Result<T> {
        self.map_err(|e| ApiError::service("BuildError", e.to_string()))
    }
}

macro_rules! shapes {
    ($($shape:ident),* $(,)?) => {
        $(
            impl Built for sdk::$shape {
                type Shape = sdk::$shape;
                fn built(self) -> Result<Self> {
                    Ok(self)
                }
            }
        )*
    };
}

shapes!(
    AribSourceSettings,
    AudioLanguageSelection,
    AudioPidSelection,
    AudioSelector,
    AudioSelectorSettings,
    AudioTrack,
    AudioTrackSelection,
    AutomaticInputFailoverSettings,
    CaptionSelector,
    CaptionSelectorSettings,
    DvbSubSourceSettings,
    EmbeddedSourceSettings,
    HlsInputSettings,
    InputAttachment,
    InputDestinationRequest,
    InputSettings,
    InputVpcRequest,
    InputWhitelistRuleCidr,
    MediaPackageOutputDestinationSettings,
    MultiplexProgramChannelDestinationSettings,
    NetworkInputSettings,
    OutputDestination,
    OutputDestinationSettings,
    Scte20SourceSettings,
    Scte27SourceSettings,
    TeletextSourceSettings,
    VideoSelector,
    VideoSelectorPid,
    VideoSelectorProgramId,
    VideoSelectorSettings,
);

/// SDK getters return `&str` for required members and `Option<&str>` otherwise
pub(crate) trait Text {
    fn text(self) -> Option<String>;
}

impl Text for &str {
    fn text(self) -> Option<String> {
        Some(self.to_string())
    }
}

impl Text for Option<&str> {
    fn text(self) -> Option<String> {
        self.map(str::to_string)
    }
}

/// Same as [`Text`] for integer members
pub(crate) trait Int {
    fn int(self) -> Option<i32>;
}

impl Int for i32 {
    fn int(self) -> Option<i32> {
        Some(self)
    }
}

impl Int for Option<i32> {
    fn int(self) -> Option<i32> {
        self
    }
}

/// Wire string of an SDK enumeration
pub(crate) fn wire<E: AsRef<str>>(value: Option<&E>) -> Option<String> {
    value.map(|v| v.as_ref().to_string())
}

pub(crate) fn tags(tags: Option<&HashMap<String, String>>) -> Tags {
    tags.map(|t| t.iter().map(|(k, v)| (k.clone(), v.clone())).collect())
        .unwrap_or_default()
}

pub(crate) fn sdk_tags(tags: &Tags) -> HashMap<String, String> {
    tags.iter().map(|(k, v)| (k.clone(), v.clone())).collect()
}

fn non_empty<T>(items: Vec<T>) -> Option<Vec<T>> {
    if items.is_empty() { None } else { Some(items) }
}

// ---------------------------------------------------------------------------
// service -> model
// ---------------------------------------------------------------------------

// Describe outputs, list summaries and the entity shapes share member names
// but not a type, so the mappings are macros.

macro_rules! input_security_group_from {
    ($group:expr) => {{
        use $crate::convert::Text as _;
        let group = $group;
        liveflow_medialive::api::InputSecurityGroup {
            id: group.id().text().unwrap_or_default(),
            arn: group.arn().text().unwrap_or_default(),
            state: $crate::convert::wire(group.state()).unwrap_or_default(),
            whitelist_rules: group
                .whitelist_rules()
                .iter()
                .filter_map(|rule| rule.cidr().text())
                .collect(),
            inputs: group.inputs().to_vec(),
            tags: $crate::convert::tags(group.tags()),
        }
    }};
}
pub(crate) use input_security_group_from;

macro_rules! input_from {
    ($input:expr) => {{
        use $crate::convert::Text as _;
        let input = $input;
        liveflow_medialive::api::Input {
            id: input.id().text().unwrap_or_default(),
            arn: input.arn().text().unwrap_or_default(),
            name: input.name().text().unwrap_or_default(),
            input_type: $crate::convert::wire(input.r#type()).unwrap_or_default(),
            input_class: $crate::convert::wire(input.input_class()),
            input_source_type: $crate::convert::wire(input.input_source_type()),
            state: $crate::convert::wire(input.state()).unwrap_or_default(),
            destinations: input
                .destinations()
                .iter()
                .map($crate::convert::input_destination)
                .collect(),
            security_groups: input.security_groups().to_vec(),
            attached_channels: input.attached_channels().to_vec(),
            tags: $crate::convert::tags(input.tags()),
        }
    }};
}
pub(crate) use input_from;

macro_rules! channel_from {
    ($channel:expr) => {{
        use $crate::convert::{Int as _, Text as _};
        let channel = $channel;
        liveflow_medialive::api::Channel {
            id: channel.id().text().unwrap_or_default(),
            arn: channel.arn().text().unwrap_or_default(),
            name: channel.name().text(),
            channel_class: $crate::convert::wire(channel.channel_class()),
            state: $crate::convert::wire(channel.state()).unwrap_or_default(),
            destinations: channel
                .destinations()
                .iter()
                .map($crate::convert::output_destination)
                .collect(),
            input_attachments: channel
                .input_attachments()
                .iter()
                .map($crate::convert::input_attachment)
                .collect(),
            log_level: $crate::convert::wire(channel.log_level()),
            role_arn: channel.role_arn().text(),
            pipelines_running_count: channel.pipelines_running_count().int().unwrap_or_default(),
            egress_endpoints: channel
                .egress_endpoints()
                .iter()
                .filter_map(|e| e.source_ip().text())
                .collect(),
            tags: $crate::convert::tags(channel.tags()),
        }
    }};
}
pub(crate) use channel_from;

pub(crate) fn input_destination(d: &sdk::InputDestination) -> InputDestination {
    InputDestination {
        ip: d.ip().text(),
        port: d.port().text(),
        url: d.url().text(),
        vpc: d.vpc().map(|vpc| InputDestinationVpc {
            availability_zone: vpc.availability_zone().text(),
            network_interface_id: vpc.network_interface_id().text(),
        }),
    }
}

pub(crate) fn output_destination(d: &sdk::OutputDestination) -> OutputDestination {
    OutputDestination {
        id: d.id().text(),
        media_package_settings: d
            .media_package_settings()
            .iter()
            .map(|m| MediaPackageOutputDestinationSettings {
                channel_id: m.channel_id().text().unwrap_or_default(),
            })
            .collect(),
        multiplex_settings: d.multiplex_settings().map(|m| {
            MultiplexProgramChannelDestinationSettings {
                multiplex_id: m.multiplex_id().text().unwrap_or_default(),
                program_name: m.program_name().text().unwrap_or_default(),
            }
        }),
        settings: d
            .settings()
            .iter()
            .map(|s| OutputDestinationSettings {
                password_param: s.password_param().text(),
                stream_name: s.stream_name().text(),
                url: s.url().text(),
                username: s.username().text(),
            })
            .collect(),
    }
}

pub(crate) fn input_attachment(a: &sdk::InputAttachment) -> InputAttachment {
    InputAttachment {
        input_attachment_name: a.input_attachment_name().text(),
        input_id: a.input_id().text().unwrap_or_default(),
        automatic_input_failover_settings: a.automatic_input_failover_settings().map(|f| {
            AutomaticInputFailoverSettings {
                input_preference: wire(f.input_preference()),
                secondary_input_id: f.secondary_input_id().text().unwrap_or_default(),
            }
        }),
        input_settings: a.input_settings().map(input_settings),
    }
}

fn input_settings(s: &sdk::InputSettings) -> InputSettings {
    InputSettings {
        audio_selectors: s.audio_selectors().iter().map(audio_selector).collect(),
        caption_selectors: s.caption_selectors().iter().map(caption_selector).collect(),
        deblock_filter: wire(s.deblock_filter()),
        denoise_filter: wire(s.denoise_filter()),
        filter_strength: s.filter_strength().int(),
        input_filter: wire(s.input_filter()),
        network_input_settings: s.network_input_settings().map(|n| NetworkInputSettings {
            server_validation: wire(n.server_validation()),
            hls_input_settings: n.hls_input_settings().map(|h| HlsInputSettings {
                bandwidth: h.bandwidth().int(),
                buffer_segments: h.buffer_segments().int(),
                retries: h.retries().int(),
                retry_interval: h.retry_interval().int(),
            }),
        }),
        smpte2038_data_preference: wire(s.smpte2038_data_preference()),
        source_end_behavior: wire(s.source_end_behavior()),
        video_selector: s.video_selector().map(|v| VideoSelector {
            color_space: wire(v.color_space()),
            color_space_usage: wire(v.color_space_usage()),
            selector_settings: v.selector_settings().and_then(|s| {
                s.video_selector_pid()
                    .and_then(|p| p.pid().int())
                    .map(|pid| VideoSelectorSettings::Pid { pid })
                    .or_else(|| {
                        s.video_selector_program_id()
                            .and_then(|p| p.program_id().int())
                            .map(|program_id| VideoSelectorSettings::ProgramId { program_id })
                    })
            }),
        }),
    }
}

fn audio_selector(a: &sdk::AudioSelector) -> AudioSelector {
    let selector_settings = a.selector_settings().and_then(|s| {
        if let Some(language) = s.audio_language_selection() {
            Some(AudioSelectorSettings::Language {
                language_code: language.language_code().text().unwrap_or_default(),
                language_selection_policy: wire(language.language_selection_policy()),
            })
        } else if let Some(pid) = s.audio_pid_selection() {
            pid.pid().int().map(|pid| AudioSelectorSettings::Pid { pid })
        } else {
            s.audio_track_selection().map(|t| AudioSelectorSettings::Track {
                tracks: t.tracks().iter().filter_map(|t| t.track().int()).collect(),
            })
        }
    });
    AudioSelector {
        name: a.name().text().unwrap_or_default(),
        selector_settings,
    }
}

fn caption_selector(c: &sdk::CaptionSelector) -> CaptionSelector {
    CaptionSelector {
        name: c.name().text().unwrap_or_default(),
        language_code: c.language_code().text(),
        selector_settings: c.selector_settings().and_then(caption_selector_settings),
    }
}

fn caption_selector_settings(s: &sdk::CaptionSelectorSettings) -> Option<CaptionSelectorSettings> {
    if s.arib_source_settings().is_some() {
        return Some(CaptionSelectorSettings::Arib);
    }
    if let Some(dvb) = s.dvb_sub_source_settings() {
        return Some(CaptionSelectorSettings::DvbSub {
            pid: dvb.pid().int(),
        });
    }
    if let Some(embedded) = s.embedded_source_settings() {
        return Some(CaptionSelectorSettings::Embedded {
            convert_608_to_708: wire(embedded.convert608_to708()),
            scte20_detection: wire(embedded.scte20_detection()),
            source_608_channel_number: embedded.source608_channel_number().int(),
        });
    }
    if let Some(scte20) = s.scte20_source_settings() {
        return Some(CaptionSelectorSettings::Scte20 {
            convert_608_to_708: wire(scte20.convert608_to708()),
            source_608_channel_number: scte20.source608_channel_number().int(),
        });
    }
    if let Some(scte27) = s.scte27_source_settings() {
        return Some(CaptionSelectorSettings::Scte27 {
            pid: scte27.pid().int(),
        });
    }
    s.teletext_source_settings()
        .map(|t| CaptionSelectorSettings::Teletext {
            page_number: t.page_number().text(),
        })
}

// ---------------------------------------------------------------------------
// model -> service
// ---------------------------------------------------------------------------

pub(crate) fn whitelist_rules(cidrs: &[String]) -> Result<Vec<sdk::InputWhitelistRuleCidr>> {
    cidrs
        .iter()
        .map(|cidr| sdk::InputWhitelistRuleCidr::builder().cidr(cidr).build().built())
        .collect()
}

pub(crate) fn input_destination_requests(
    destinations: &[InputDestinationRequest],
) -> Result<Vec<sdk::InputDestinationRequest>> {
    destinations
        .iter()
        .map(|d| {
            sdk::InputDestinationRequest::builder()
                .stream_name(&d.stream_name)
                .build()
                .built()
        })
        .collect()
}

pub(crate) fn vpc_request(vpc: &InputVpcRequest) -> Result<sdk::InputVpcRequest> {
    sdk::InputVpcRequest::builder()
        .set_subnet_ids(Some(vpc.subnet_ids.clone()))
        .set_security_group_ids(vpc.security_group_ids.clone())
        .build()
        .built()
}

pub(crate) fn output_destinations(
    destinations: &[OutputDestination],
) -> Result<Vec<sdk::OutputDestination>> {
    destinations.iter().map(sdk_output_destination).collect()
}

fn sdk_output_destination(d: &OutputDestination) -> Result<sdk::OutputDestination> {
    let media_package = d
        .media_package_settings
        .iter()
        .map(|m| {
            sdk::MediaPackageOutputDestinationSettings::builder()
                .channel_id(&m.channel_id)
                .build()
                .built()
        })
        .collect::<Result<Vec<_>>>()?;
    let multiplex = d
        .multiplex_settings
        .as_ref()
        .map(|m| {
            sdk::MultiplexProgramChannelDestinationSettings::builder()
                .multiplex_id(&m.multiplex_id)
                .program_name(&m.program_name)
                .build()
                .built()
        })
        .transpose()?;
    let settings = d
        .settings
        .iter()
        .map(|s| {
            sdk::OutputDestinationSettings::builder()
                .set_password_param(s.password_param.clone())
                .set_stream_name(s.stream_name.clone())
                .set_url(s.url.clone())
                .set_username(s.username.clone())
                .build()
                .built()
        })
        .collect::<Result<Vec<_>>>()?;

    sdk::OutputDestination::builder()
        .set_id(d.id.clone())
        .set_media_package_settings(non_empty(media_package))
        .set_multiplex_settings(multiplex)
        .set_settings(non_empty(settings))
        .build()
        .built()
}

pub(crate) fn input_attachments(
    attachments: &[InputAttachment],
) -> Result<Vec<sdk::InputAttachment>> {
    attachments.iter().map(sdk_input_attachment).collect()
}

fn sdk_input_attachment(a: &InputAttachment) -> Result<sdk::InputAttachment> {
    let failover = a
        .automatic_input_failover_settings
        .as_ref()
        .map(|f| {
            sdk::AutomaticInputFailoverSettings::builder()
                .set_input_preference(f.input_preference.as_deref().map(sdk::InputPreference::from))
                .secondary_input_id(&f.secondary_input_id)
                .build()
                .built()
        })
        .transpose()?;

    sdk::InputAttachment::builder()
        .set_input_attachment_name(a.input_attachment_name.clone())
        .input_id(&a.input_id)
        .set_automatic_input_failover_settings(failover)
        .set_input_settings(a.input_settings.as_ref().map(sdk_input_settings).transpose()?)
        .build()
        .built()
}

fn sdk_input_settings(s: &InputSettings) -> Result<sdk::InputSettings> {
    let audio_selectors = s
        .audio_selectors
        .iter()
        .map(sdk_audio_selector)
        .collect::<Result<Vec<_>>>()?;
    let caption_selectors = s
        .caption_selectors
        .iter()
        .map(sdk_caption_selector)
        .collect::<Result<Vec<_>>>()?;
    let network = s
        .network_input_settings
        .as_ref()
        .map(sdk_network_input_settings)
        .transpose()?;
    let video = s.video_selector.as_ref().map(sdk_video_selector).transpose()?;

    sdk::InputSettings::builder()
        .set_audio_selectors(non_empty(audio_selectors))
        .set_caption_selectors(non_empty(caption_selectors))
        .set_deblock_filter(s.deblock_filter.as_deref().map(sdk::InputDeblockFilter::from))
        .set_denoise_filter(s.denoise_filter.as_deref().map(sdk::InputDenoiseFilter::from))
        .set_filter_strength(s.filter_strength)
        .set_input_filter(s.input_filter.as_deref().map(sdk::InputFilter::from))
        .set_network_input_settings(network)
        .set_smpte2038_data_preference(
            s.smpte2038_data_preference
                .as_deref()
                .map(sdk::Smpte2038DataPreference::from),
        )
        .set_source_end_behavior(
            s.source_end_behavior
                .as_deref()
                .map(sdk::InputSourceEndBehavior::from),
        )
        .set_video_selector(video)
        .build()
        .built()
}

fn sdk_network_input_settings(n: &NetworkInputSettings) -> Result<sdk::NetworkInputSettings> {
    let hls = n
        .hls_input_settings
        .as_ref()
        .map(|h| {
            sdk::HlsInputSettings::builder()
                .set_bandwidth(h.bandwidth)
                .set_buffer_segments(h.buffer_segments)
                .set_retries(h.retries)
                .set_retry_interval(h.retry_interval)
                .build()
                .built()
        })
        .transpose()?;

    sdk::NetworkInputSettings::builder()
        .set_server_validation(
            n.server_validation
                .as_deref()
                .map(sdk::NetworkInputServerValidation::from),
        )
        .set_hls_input_settings(hls)
        .build()
        .built()
}

fn sdk_video_selector(v: &VideoSelector) -> Result<sdk::VideoSelector> {
    let settings = v
        .selector_settings
        .as_ref()
        .map(|s| -> Result<sdk::VideoSelectorSettings> {
            let builder = sdk::VideoSelectorSettings::builder();
            let builder = match s {
                VideoSelectorSettings::Pid { pid } => builder
                    .video_selector_pid(sdk::VideoSelectorPid::builder().pid(*pid).build().built()?),
                VideoSelectorSettings::ProgramId { program_id } => builder.video_selector_program_id(
                    sdk::VideoSelectorProgramId::builder()
                        .program_id(*program_id)
                        .build()
                        .built()?,
                ),
            };
            builder.build().built()
        })
        .transpose()?;

    sdk::VideoSelector::builder()
        .set_color_space(v.color_space.as_deref().map(sdk::VideoSelectorColorSpace::from))
        .set_color_space_usage(
            v.color_space_usage
                .as_deref()
                .map(sdk::VideoSelectorColorSpaceUsage::from),
        )
        .set_selector_settings(settings)
        .build()
        .built()
}

fn sdk_audio_selector(a: &AudioSelector) -> Result<sdk::AudioSelector> {
    let settings = a
        .selector_settings
        .as_ref()
        .map(|s| -> Result<sdk::AudioSelectorSettings> {
            let builder = sdk::AudioSelectorSettings::builder();
            let builder = match s {
                AudioSelectorSettings::Language {
                    language_code,
                    language_selection_policy,
                } => builder.audio_language_selection(
                    sdk::AudioLanguageSelection::builder()
                        .language_code(language_code)
                        .set_language_selection_policy(
                            language_selection_policy
                                .as_deref()
                                .map(sdk::AudioLanguageSelectionPolicy::from),
                        )
                        .build()
                        .built()?,
                ),
                AudioSelectorSettings::Pid { pid } => builder.audio_pid_selection(
                    sdk::AudioPidSelection::builder().pid(*pid).build().built()?,
                ),
                AudioSelectorSettings::Track { tracks } => {
                    let tracks = tracks
                        .iter()
                        .map(|t| sdk::AudioTrack::builder().track(*t).build().built())
                        .collect::<Result<Vec<_>>>()?;
                    builder.audio_track_selection(
                        sdk::AudioTrackSelection::builder()
                            .set_tracks(Some(tracks))
                            .build()
                            .built()?,
                    )
                }
            };
            builder.build().built()
        })
        .transpose()?;

    sdk::AudioSelector::builder()
        .name(&a.name)
        .set_selector_settings(settings)
        .build()
        .built()
}

fn sdk_caption_selector(c: &CaptionSelector) -> Result<sdk::CaptionSelector> {
    let settings = c
        .selector_settings
        .as_ref()
        .map(|s| -> Result<sdk::CaptionSelectorSettings> {
            let builder = sdk::CaptionSelectorSettings::builder();
            let builder = match s {
                CaptionSelectorSettings::Arib => builder
                    .arib_source_settings(sdk::AribSourceSettings::builder().build().built()?),
                CaptionSelectorSettings::DvbSub { pid } => builder.dvb_sub_source_settings(
                    sdk::DvbSubSourceSettings::builder().set_pid(*pid).build().built()?,
                ),
                CaptionSelectorSettings::Embedded {
                    convert_608_to_708,
                    scte20_detection,
                    source_608_channel_number,
                } => builder.embedded_source_settings(
                    sdk::EmbeddedSourceSettings::builder()
                        .set_convert608_to708(
                            convert_608_to_708
                                .as_deref()
                                .map(sdk::EmbeddedConvert608To708::from),
                        )
                        .set_scte20_detection(
                            scte20_detection.as_deref().map(sdk::EmbeddedScte20Detection::from),
                        )
                        .set_source608_channel_number(*source_608_channel_number)
                        .build()
                        .built()?,
                ),
                CaptionSelectorSettings::Scte20 {
                    convert_608_to_708,
                    source_608_channel_number,
                } => builder.scte20_source_settings(
                    sdk::Scte20SourceSettings::builder()
                        .set_convert608_to708(
                            convert_608_to_708
                                .as_deref()
                                .map(sdk::Scte20Convert608To708::from),
                        )
                        .set_source608_channel_number(*source_608_channel_number)
                        .build()
                        .built()?,
                ),
                CaptionSelectorSettings::Scte27 { pid } => builder.scte27_source_settings(
                    sdk::Scte27SourceSettings::builder().set_pid(*pid).build().built()?,
                ),
                CaptionSelectorSettings::Teletext { page_number } => builder
                    .teletext_source_settings(
                        sdk::TeletextSourceSettings::builder()
                            .set_page_number(page_number.clone())
                            .build()
                            .built()?,
                    ),
            };
            builder.build().built()
        })
        .transpose()?;

    sdk::CaptionSelector::builder()
        .name(&c.name)
        .set_language_code(c.language_code.clone())
        .set_selector_settings(settings)
        .build()
        .built()
}
