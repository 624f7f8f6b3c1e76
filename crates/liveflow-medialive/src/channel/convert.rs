//! Translation between channel configuration and the service's shapes

use super::config::*;
use crate::api::{
    AudioSelector, AudioSelectorSettings, AutomaticInputFailoverSettings, CaptionSelector,
    CaptionSelectorSettings, HlsInputSettings, InputAttachment, InputSettings,
    MediaPackageOutputDestinationSettings, MultiplexProgramChannelDestinationSettings,
    NetworkInputSettings, OutputDestination, OutputDestinationSettings, VideoSelector,
    VideoSelectorSettings,
};
use std::collections::BTreeSet;

const UPCONVERT: &str = "UPCONVERT";
const DISABLED: &str = "DISABLED";
const SCTE20_AUTO: &str = "AUTO";
const SCTE20_OFF: &str = "OFF";

/// Validated integers are in range; anything else saturates
fn int(value: i64) -> i32 {
    i32::try_from(value).unwrap_or(if value < 0 { i32::MIN } else { i32::MAX })
}

// ---------------------------------------------------------------------------
// configuration -> service
// ---------------------------------------------------------------------------

pub(crate) fn expand_destinations(
    destinations: &BTreeSet<DestinationConfig>,
) -> Vec<OutputDestination> {
    destinations.iter().map(expand_destination).collect()
}

fn expand_destination(d: &DestinationConfig) -> OutputDestination {
    let mut out = OutputDestination {
        id: d.id.clone(),
        ..Default::default()
    };
    match d.destination_type.as_str() {
        "media_package" => {
            out.media_package_settings = d
                .media_package_channel_ids
                .iter()
                .map(|id| MediaPackageOutputDestinationSettings {
                    channel_id: id.clone(),
                })
                .collect();
        }
        "multiplex" => {
            out.multiplex_settings = Some(MultiplexProgramChannelDestinationSettings {
                multiplex_id: d.multiplex_id.clone().unwrap_or_default(),
                program_name: d.multiplex_program_name.clone().unwrap_or_default(),
            });
        }
        _ => {
            out.settings = vec![OutputDestinationSettings {
                password_param: d.password_param.clone(),
                stream_name: d.stream_name.clone(),
                url: d.url.clone(),
                username: d.username.clone(),
            }];
        }
    }
    out
}

pub(crate) fn expand_attachments(attachments: &[InputAttachmentConfig]) -> Vec<InputAttachment> {
    attachments
        .iter()
        .map(|a| InputAttachment {
            input_attachment_name: a.name.clone(),
            input_id: a.input_id.clone(),
            automatic_input_failover_settings: a.automatic_input_failover_settings.as_ref().map(
                |f| AutomaticInputFailoverSettings {
                    input_preference: Some(f.input_preference.clone()),
                    secondary_input_id: f.secondary_input_id.clone(),
                },
            ),
            input_settings: a.input_settings.as_ref().map(expand_input_settings),
        })
        .collect()
}

fn expand_input_settings(s: &InputSettingsConfig) -> InputSettings {
    InputSettings {
        audio_selectors: s.audio_selector.iter().map(expand_audio_selector).collect(),
        caption_selectors: s.caption_selector.iter().map(expand_caption_selector).collect(),
        deblock_filter: s.deblock_filter.clone(),
        denoise_filter: s.denoise_filter.clone(),
        filter_strength: s.filter_strength.map(int),
        input_filter: s.input_filter.clone(),
        network_input_settings: s.network_input_setting.as_ref().map(|n| {
            let hls = [
                n.hls_bandwidth,
                n.hls_buffer_segments,
                n.hls_retries,
                n.hls_retry_interval,
            ];
            NetworkInputSettings {
                server_validation: n.server_validation.clone(),
                hls_input_settings: hls.iter().any(Option::is_some).then(|| HlsInputSettings {
                    bandwidth: n.hls_bandwidth.map(int),
                    buffer_segments: n.hls_buffer_segments.map(int),
                    retries: n.hls_retries.map(int),
                    retry_interval: n.hls_retry_interval.map(int),
                }),
            }
        }),
        smpte2038_data_preference: s.smpte_2038_data_preference.clone(),
        source_end_behavior: s.source_end_behaviour.clone(),
        video_selector: s.video_selector.as_ref().map(|v| VideoSelector {
            color_space: Some(v.color_space.clone()),
            color_space_usage: Some(v.color_space_usage.clone()),
            selector_settings: match (v.pid, v.program_id) {
                (Some(pid), _) => Some(VideoSelectorSettings::Pid { pid: int(pid) }),
                (None, Some(program_id)) => Some(VideoSelectorSettings::ProgramId {
                    program_id: int(program_id),
                }),
                (None, None) => None,
            },
        }),
    }
}

fn expand_audio_selector(a: &AudioSelectorConfig) -> AudioSelector {
    let selector_settings = match a.selector_type.as_str() {
        "language" => Some(AudioSelectorSettings::Language {
            language_code: a.language_code.clone().unwrap_or_default(),
            language_selection_policy: a.language_selection_policy.clone(),
        }),
        "pid" => a.pid.map(|pid| AudioSelectorSettings::Pid { pid: int(pid) }),
        "track" => Some(AudioSelectorSettings::Track {
            tracks: a.tracks.iter().copied().map(int).collect(),
        }),
        _ => None,
    };
    AudioSelector {
        name: a.name.clone(),
        selector_settings,
    }
}

fn expand_caption_selector(c: &CaptionSelectorConfig) -> CaptionSelector {
    let convert_608_to_708 = Some(if c.upconvert_608 { UPCONVERT } else { DISABLED }.to_string());
    let source_608_channel_number = c.channel.map(int);
    let selector_settings = match c.source_type.as_str() {
        "arib" => Some(CaptionSelectorSettings::Arib),
        "dvb_source" => Some(CaptionSelectorSettings::DvbSub {
            pid: c.pid.map(int),
        }),
        "embedded" => Some(CaptionSelectorSettings::Embedded {
            convert_608_to_708,
            scte20_detection: Some(
                if c.detect_scte20 { SCTE20_AUTO } else { SCTE20_OFF }.to_string(),
            ),
            source_608_channel_number,
        }),
        "scte20" => Some(CaptionSelectorSettings::Scte20 {
            convert_608_to_708,
            source_608_channel_number,
        }),
        "scte27" => Some(CaptionSelectorSettings::Scte27 {
            pid: c.pid.map(int),
        }),
        "teletext" => Some(CaptionSelectorSettings::Teletext {
            page_number: c.page.clone(),
        }),
        _ => None,
    };
    CaptionSelector {
        name: c.name.clone(),
        language_code: c.language_code.clone(),
        selector_settings,
    }
}

// ---------------------------------------------------------------------------
// service -> configuration
// ---------------------------------------------------------------------------

pub(crate) fn flatten_destinations(
    destinations: &[OutputDestination],
) -> BTreeSet<DestinationConfig> {
    destinations.iter().map(flatten_destination).collect()
}

fn flatten_destination(d: &OutputDestination) -> DestinationConfig {
    let mut out = DestinationConfig {
        id: d.id.clone(),
        ..Default::default()
    };
    if !d.media_package_settings.is_empty() {
        out.destination_type = "media_package".to_string();
        out.media_package_channel_ids = d
            .media_package_settings
            .iter()
            .map(|s| s.channel_id.clone())
            .collect();
    } else if let Some(multiplex) = &d.multiplex_settings {
        out.destination_type = "multiplex".to_string();
        out.multiplex_id = Some(multiplex.multiplex_id.clone());
        out.multiplex_program_name = Some(multiplex.program_name.clone());
    } else {
        out.destination_type = "standard".to_string();
        if let Some(settings) = d.settings.first() {
            out.password_param = settings.password_param.clone();
            out.stream_name = settings.stream_name.clone();
            out.url = settings.url.clone();
            out.username = settings.username.clone();
        }
    }
    out
}

pub(crate) fn flatten_attachments(attachments: &[InputAttachment]) -> Vec<InputAttachmentConfig> {
    attachments
        .iter()
        .map(|a| InputAttachmentConfig {
            name: a.input_attachment_name.clone(),
            input_id: a.input_id.clone(),
            automatic_input_failover_settings: a.automatic_input_failover_settings.as_ref().map(
                |f| FailoverConfig {
                    input_preference: f.input_preference.clone().unwrap_or_default(),
                    secondary_input_id: f.secondary_input_id.clone(),
                },
            ),
            input_settings: a.input_settings.as_ref().map(flatten_input_settings),
        })
        .collect()
}

fn flatten_input_settings(s: &InputSettings) -> InputSettingsConfig {
    InputSettingsConfig {
        audio_selector: s.audio_selectors.iter().map(flatten_audio_selector).collect(),
        caption_selector: s.caption_selectors.iter().map(flatten_caption_selector).collect(),
        deblock_filter: s.deblock_filter.clone(),
        denoise_filter: s.denoise_filter.clone(),
        filter_strength: s.filter_strength.map(i64::from),
        input_filter: s.input_filter.clone(),
        network_input_setting: s.network_input_settings.as_ref().map(|n| {
            let hls = n.hls_input_settings.clone().unwrap_or_default();
            NetworkInputSettingConfig {
                server_validation: n.server_validation.clone(),
                hls_bandwidth: hls.bandwidth.map(i64::from),
                hls_buffer_segments: hls.buffer_segments.map(i64::from),
                hls_retries: hls.retries.map(i64::from),
                hls_retry_interval: hls.retry_interval.map(i64::from),
            }
        }),
        smpte_2038_data_preference: s.smpte2038_data_preference.clone(),
        source_end_behaviour: s.source_end_behavior.clone(),
        video_selector: s.video_selector.as_ref().map(|v| {
            let (pid, program_id) = match v.selector_settings {
                Some(VideoSelectorSettings::Pid { pid }) => (Some(i64::from(pid)), None),
                Some(VideoSelectorSettings::ProgramId { program_id }) => {
                    (None, Some(i64::from(program_id)))
                }
                None => (None, None),
            };
            VideoSelectorConfig {
                color_space: v.color_space.clone().unwrap_or_default(),
                color_space_usage: v.color_space_usage.clone().unwrap_or_default(),
                pid,
                program_id,
            }
        }),
    }
}

fn flatten_audio_selector(a: &AudioSelector) -> AudioSelectorConfig {
    let mut out = AudioSelectorConfig {
        name: a.name.clone(),
        ..Default::default()
    };
    match &a.selector_settings {
        Some(AudioSelectorSettings::Language {
            language_code,
            language_selection_policy,
        }) => {
            out.selector_type = "language".to_string();
            out.language_code = Some(language_code.clone());
            out.language_selection_policy = language_selection_policy.clone();
        }
        Some(AudioSelectorSettings::Pid { pid }) => {
            out.selector_type = "pid".to_string();
            out.pid = Some(i64::from(*pid));
        }
        Some(AudioSelectorSettings::Track { tracks }) => {
            out.selector_type = "track".to_string();
            out.tracks = tracks.iter().copied().map(i64::from).collect();
        }
        None => {}
    }
    out
}

fn flatten_caption_selector(c: &CaptionSelector) -> CaptionSelectorConfig {
    let mut out = CaptionSelectorConfig {
        name: c.name.clone(),
        language_code: c.language_code.clone(),
        ..Default::default()
    };
    let upconverts = |value: &Option<String>| value.as_deref() == Some(UPCONVERT);
    match &c.selector_settings {
        Some(CaptionSelectorSettings::Arib) => out.source_type = "arib".to_string(),
        Some(CaptionSelectorSettings::DvbSub { pid }) => {
            out.source_type = "dvb_source".to_string();
            out.pid = pid.map(i64::from);
        }
        Some(CaptionSelectorSettings::Embedded {
            convert_608_to_708,
            scte20_detection,
            source_608_channel_number,
        }) => {
            out.source_type = "embedded".to_string();
            out.upconvert_608 = upconverts(convert_608_to_708);
            out.detect_scte20 = scte20_detection.as_deref() == Some(SCTE20_AUTO);
            out.channel = source_608_channel_number.map(i64::from);
        }
        Some(CaptionSelectorSettings::Scte20 {
            convert_608_to_708,
            source_608_channel_number,
        }) => {
            out.source_type = "scte20".to_string();
            out.upconvert_608 = upconverts(convert_608_to_708);
            out.channel = source_608_channel_number.map(i64::from);
        }
        Some(CaptionSelectorSettings::Scte27 { pid }) => {
            out.source_type = "scte27".to_string();
            out.pid = pid.map(i64::from);
        }
        Some(CaptionSelectorSettings::Teletext { page_number }) => {
            out.source_type = "teletext".to_string();
            out.page = page_number.clone();
        }
        None => {}
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_destination_shapes() {
        let destinations: BTreeSet<DestinationConfig> = [
            DestinationConfig {
                id: Some("mp".to_string()),
                destination_type: "media_package".to_string(),
                media_package_channel_ids: ["pkg-1".to_string()].into(),
                ..Default::default()
            },
            DestinationConfig {
                id: Some("rtmp".to_string()),
                destination_type: "standard".to_string(),
                url: Some("rtmp://a.rtmp.example.com/live".to_string()),
                stream_name: Some("key".to_string()),
                ..Default::default()
            },
        ]
        .into();

        let expanded = expand_destinations(&destinations);
        assert_eq!(expanded[0].media_package_settings[0].channel_id, "pkg-1");
        assert!(expanded[0].settings.is_empty());
        assert_eq!(
            expanded[1].settings[0].url.as_deref(),
            Some("rtmp://a.rtmp.example.com/live")
        );

        assert_eq!(flatten_destinations(&expanded), destinations);
    }

    #[test]
    fn test_input_settings_survive_the_service_shape() {
        let attachments = vec![InputAttachmentConfig {
            name: Some("primary".to_string()),
            input_id: "1".to_string(),
            automatic_input_failover_settings: Some(FailoverConfig {
                input_preference: "PRIMARY_INPUT_PREFERRED".to_string(),
                secondary_input_id: "2".to_string(),
            }),
            input_settings: Some(InputSettingsConfig {
                audio_selector: vec![
                    AudioSelectorConfig {
                        name: "en".to_string(),
                        selector_type: "language".to_string(),
                        language_code: Some("eng".to_string()),
                        language_selection_policy: Some("STRICT".to_string()),
                        ..Default::default()
                    },
                    AudioSelectorConfig {
                        name: "tracks".to_string(),
                        selector_type: "track".to_string(),
                        tracks: vec![1, 2],
                        ..Default::default()
                    },
                ],
                caption_selector: vec![CaptionSelectorConfig {
                    name: "cc".to_string(),
                    source_type: "embedded".to_string(),
                    upconvert_608: true,
                    channel: Some(1),
                    ..Default::default()
                }],
                filter_strength: Some(3),
                network_input_setting: Some(NetworkInputSettingConfig {
                    hls_retries: Some(5),
                    ..Default::default()
                }),
                video_selector: Some(VideoSelectorConfig {
                    color_space: "FOLLOW".to_string(),
                    color_space_usage: "FALLBACK".to_string(),
                    program_id: Some(1),
                    pid: None,
                }),
                ..Default::default()
            }),
        }];

        let expanded = expand_attachments(&attachments);
        let settings = expanded[0].input_settings.as_ref().unwrap();
        assert!(matches!(
            settings.caption_selectors[0].selector_settings,
            Some(CaptionSelectorSettings::Embedded { ref convert_608_to_708, ref scte20_detection, .. })
                if convert_608_to_708.as_deref() == Some("UPCONVERT")
                    && scte20_detection.as_deref() == Some("OFF")
        ));
        assert_eq!(
            settings.network_input_settings.as_ref().unwrap().hls_input_settings,
            Some(HlsInputSettings {
                retries: Some(5),
                ..Default::default()
            })
        );

        assert_eq!(flatten_attachments(&expanded), attachments);
    }

    #[test]
    fn test_network_settings_without_hls() {
        let attachments = vec![InputAttachmentConfig {
            input_id: "1".to_string(),
            input_settings: Some(InputSettingsConfig {
                network_input_setting: Some(NetworkInputSettingConfig {
                    server_validation: Some("CHECK_CRYPTOGRAPHY_ONLY".to_string()),
                    ..Default::default()
                }),
                ..Default::default()
            }),
            ..Default::default()
        }];

        let expanded = expand_attachments(&attachments);
        let network = expanded[0]
            .input_settings
            .as_ref()
            .and_then(|s| s.network_input_settings.as_ref())
            .unwrap();
        assert!(network.hls_input_settings.is_none());
    }
}
