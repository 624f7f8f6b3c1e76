//! Channel desired state and its field constraints

use liveflow_cloud::{DesiredState, Diff, Tags, Validate, Validator, Violation};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

pub const CHANNEL_CLASSES: &[&str] = &["STANDARD", "SINGLE_PIPELINE"];
pub const OUTPUT_TYPES: &[&str] = &["media_package", "multiplex", "standard"];
pub const INPUT_PREFERENCES: &[&str] = &["EQUAL_INPUT_PREFERENCE", "PRIMARY_INPUT_PREFERRED"];
pub const AUDIO_SELECTOR_TYPES: &[&str] = &["language", "pid", "track"];
pub const AUDIO_LANGUAGE_SELECTION_POLICIES: &[&str] = &["LOOSE", "STRICT"];
pub const CAPTION_SOURCE_TYPES: &[&str] = &[
    "arib",
    "dvb_source",
    "embedded",
    "scte20",
    "scte27",
    "teletext",
];
pub const DEBLOCK_FILTERS: &[&str] = &["DISABLED", "ENABLED"];
pub const DENOISE_FILTERS: &[&str] = &["DISABLED", "ENABLED"];
pub const INPUT_FILTERS: &[&str] = &["AUTO", "DISABLED", "FORCED"];
pub const SERVER_VALIDATIONS: &[&str] = &[
    "CHECK_CRYPTOGRAPHY_AND_VALIDATE_NAME",
    "CHECK_CRYPTOGRAPHY_ONLY",
];
pub const SMPTE2038_DATA_PREFERENCES: &[&str] = &["IGNORE", "PREFER"];
pub const SOURCE_END_BEHAVIORS: &[&str] = &["CONTINUE", "LOOP"];
pub const COLOR_SPACES: &[&str] = &["FOLLOW", "HDR10", "HLG_2020", "REC_601", "REC_709"];
pub const COLOR_SPACE_USAGES: &[&str] = &["FALLBACK", "FORCE"];
pub const LOG_LEVELS: &[&str] = &["ERROR", "WARNING", "INFO", "DEBUG", "DISABLED"];

/// Largest MPEG-TS packet identifier
const MAX_PID: i64 = 8191;

/// Desired state of a channel
///
/// Encoder settings are not modelled; a channel created from this
/// configuration carries the service defaults.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ChannelConfig {
    /// `STANDARD` (two pipelines) or `SINGLE_PIPELINE`
    pub class: String,

    pub destination: BTreeSet<DestinationConfig>,

    /// Attached inputs; the first one is the primary
    pub input_attachment: Vec<InputAttachmentConfig>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_level: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// IAM role the channel assumes
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role_arn: Option<String>,

    #[serde(default, skip_serializing_if = "Tags::is_empty")]
    pub tags: Tags,
}

/// Output destination; which fields apply depends on `type`
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DestinationConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    #[serde(rename = "type")]
    pub destination_type: String,

    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub media_package_channel_ids: BTreeSet<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub multiplex_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub multiplex_program_name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password_param: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stream_name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct InputAttachmentConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    pub input_id: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub automatic_input_failover_settings: Option<FailoverConfig>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input_settings: Option<InputSettingsConfig>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FailoverConfig {
    pub input_preference: String,
    pub secondary_input_id: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct InputSettingsConfig {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub audio_selector: Vec<AudioSelectorConfig>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub caption_selector: Vec<CaptionSelectorConfig>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deblock_filter: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub denoise_filter: Option<String>,

    /// 1 (weakest) to 5
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filter_strength: Option<i64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input_filter: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub network_input_setting: Option<NetworkInputSettingConfig>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub smpte_2038_data_preference: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_end_behaviour: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub video_selector: Option<VideoSelectorConfig>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AudioSelectorConfig {
    pub name: String,

    /// `language`, `pid` or `track`
    #[serde(rename = "type")]
    pub selector_type: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language_code: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language_selection_policy: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pid: Option<i64>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tracks: Vec<i64>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CaptionSelectorConfig {
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language_code: Option<String>,

    #[serde(rename = "type")]
    pub source_type: String,

    /// DVB subtitles and SCTE-27
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pid: Option<i64>,

    /// Embedded and SCTE-20: convert 608 captions to 708
    #[serde(default, skip_serializing_if = "is_false")]
    pub upconvert_608: bool,

    /// Embedded: fall back to SCTE-20 when no embedded captions are found
    #[serde(default, skip_serializing_if = "is_false")]
    pub detect_scte20: bool,

    /// Embedded and SCTE-20: 608 channel number (1-4)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channel: Option<i64>,

    /// Teletext page
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NetworkInputSettingConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub server_validation: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hls_bandwidth: Option<i64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hls_buffer_segments: Option<i64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hls_retries: Option<i64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hls_retry_interval: Option<i64>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct VideoSelectorConfig {
    pub color_space: String,
    pub color_space_usage: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pid: Option<i64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub program_id: Option<i64>,
}

fn is_false(value: &bool) -> bool {
    !*value
}

impl Validate for ChannelConfig {
    fn validate(&self) -> Vec<Violation> {
        let mut v = Validator::new();
        v.one_of("class", &self.class, CHANNEL_CLASSES);

        v.len_between("destination", self.destination.len(), 1, None);
        let destinations: Vec<&DestinationConfig> = self.destination.iter().collect();
        v.each("destination", &destinations, |v, d| validate_destination(v, d));

        v.len_between("input_attachment", self.input_attachment.len(), 1, Some(2));
        v.each("input_attachment", &self.input_attachment, validate_attachment);

        v.one_of_opt("log_level", self.log_level.as_deref(), LOG_LEVELS);
        v.into_violations()
    }
}

fn validate_destination(v: &mut Validator, d: &DestinationConfig) {
    v.one_of("type", &d.destination_type, OUTPUT_TYPES);
    match d.destination_type.as_str() {
        "media_package" => v.len_between(
            "media_package_channel_ids",
            d.media_package_channel_ids.len(),
            1,
            None,
        ),
        "multiplex" => {
            v.present("multiplex_id", d.multiplex_id.as_ref());
            v.present("multiplex_program_name", d.multiplex_program_name.as_ref());
        }
        "standard" => v.present("url", d.url.as_ref()),
        _ => {}
    }
}

fn validate_attachment(v: &mut Validator, a: &InputAttachmentConfig) {
    v.required("input_id", &a.input_id);

    if let Some(failover) = &a.automatic_input_failover_settings {
        v.nested("automatic_input_failover_settings", |v| {
            v.one_of("input_preference", &failover.input_preference, INPUT_PREFERENCES);
            v.required("secondary_input_id", &failover.secondary_input_id);
        });
    }

    if let Some(settings) = &a.input_settings {
        v.nested("input_settings", |v| validate_input_settings(v, settings));
    }
}

fn validate_input_settings(v: &mut Validator, s: &InputSettingsConfig) {
    v.each("audio_selector", &s.audio_selector, validate_audio_selector);
    v.each("caption_selector", &s.caption_selector, validate_caption_selector);

    v.one_of_opt("deblock_filter", s.deblock_filter.as_deref(), DEBLOCK_FILTERS);
    v.one_of_opt("denoise_filter", s.denoise_filter.as_deref(), DENOISE_FILTERS);
    if let Some(strength) = s.filter_strength {
        v.int_between("filter_strength", strength, 1, 5);
    }
    v.one_of_opt("input_filter", s.input_filter.as_deref(), INPUT_FILTERS);
    v.one_of_opt(
        "smpte_2038_data_preference",
        s.smpte_2038_data_preference.as_deref(),
        SMPTE2038_DATA_PREFERENCES,
    );
    v.one_of_opt(
        "source_end_behaviour",
        s.source_end_behaviour.as_deref(),
        SOURCE_END_BEHAVIORS,
    );

    if let Some(network) = &s.network_input_setting {
        v.nested("network_input_setting", |v| {
            v.one_of_opt(
                "server_validation",
                network.server_validation.as_deref(),
                SERVER_VALIDATIONS,
            );
            for (field, value) in [
                ("hls_bandwidth", network.hls_bandwidth),
                ("hls_buffer_segments", network.hls_buffer_segments),
                ("hls_retries", network.hls_retries),
                ("hls_retry_interval", network.hls_retry_interval),
            ] {
                if let Some(value) = value {
                    v.int_between(field, value, 0, i64::from(i32::MAX));
                }
            }
        });
    }

    if let Some(video) = &s.video_selector {
        v.nested("video_selector", |v| {
            v.one_of("color_space", &video.color_space, COLOR_SPACES);
            v.one_of("color_space_usage", &video.color_space_usage, COLOR_SPACE_USAGES);
            if let Some(pid) = video.pid {
                v.int_between("pid", pid, 0, MAX_PID);
            }
            if let Some(program_id) = video.program_id {
                v.int_between("program_id", program_id, 0, 65535);
            }
            if video.pid.is_some() && video.program_id.is_some() {
                v.push("program_id", "conflicts with pid");
            }
        });
    }
}

fn validate_audio_selector(v: &mut Validator, a: &AudioSelectorConfig) {
    v.required("name", &a.name);
    v.one_of("type", &a.selector_type, AUDIO_SELECTOR_TYPES);
    match a.selector_type.as_str() {
        "language" => {
            v.present("language_code", a.language_code.as_ref());
            v.one_of_opt(
                "language_selection_policy",
                a.language_selection_policy.as_deref(),
                AUDIO_LANGUAGE_SELECTION_POLICIES,
            );
        }
        "pid" => match a.pid {
            Some(pid) => v.int_between("pid", pid, 0, MAX_PID),
            None => v.push("pid", "is required"),
        },
        "track" => {
            v.len_between("tracks", a.tracks.len(), 1, None);
            for (i, track) in a.tracks.iter().enumerate() {
                v.int_between(&format!("tracks[{}]", i), *track, 1, i64::from(i32::MAX));
            }
        }
        _ => {}
    }
}

fn validate_caption_selector(v: &mut Validator, c: &CaptionSelectorConfig) {
    v.required("name", &c.name);
    v.one_of("type", &c.source_type, CAPTION_SOURCE_TYPES);

    if let Some(pid) = c.pid {
        v.int_between("pid", pid, 1, MAX_PID);
    }
    if let Some(channel) = c.channel {
        v.int_between("channel", channel, 1, 4);
    }

    let embedded = c.source_type == "embedded";
    if c.upconvert_608 && !(embedded || c.source_type == "scte20") {
        v.push("upconvert_608", "only applies to embedded and scte20 selectors");
    }
    if c.detect_scte20 && !embedded {
        v.push("detect_scte20", "only applies to embedded selectors");
    }
}

impl DesiredState for ChannelConfig {
    fn tags(&self) -> &Tags {
        &self.tags
    }

    fn diff(&self, new: &Self) -> Diff {
        let mut diff = Diff::new();
        diff.group("class", &self.class, &new.class);
        diff.group("destination", &self.destination, &new.destination);
        diff.group("input_attachment", &self.input_attachment, &new.input_attachment);
        diff.group("log_level", &self.log_level, &new.log_level);
        diff.group("name", &self.name, &new.name);
        diff.group("role_arn", &self.role_arn, &new.role_arn);
        diff.compare_tags(&self.tags, &new.tags);
        diff
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn standard_channel() -> ChannelConfig {
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
                input_id: "1234567".to_string(),
                ..Default::default()
            }],
            ..Default::default()
        }
    }

    fn fields(config: &ChannelConfig) -> Vec<String> {
        config.validate().into_iter().map(|v| v.field).collect()
    }

    #[test]
    fn test_minimal_channel_is_valid() {
        assert!(standard_channel().validate().is_empty());
    }

    #[test]
    fn test_enumerations_are_case_sensitive() {
        let mut config = standard_channel();
        config.class = "standard".to_string();
        config.log_level = Some("VERBOSE".to_string());

        assert_eq!(fields(&config), vec!["class", "log_level"]);
    }

    #[test]
    fn test_attachment_count_bounds() {
        let mut config = standard_channel();
        config.input_attachment.clear();
        assert_eq!(fields(&config), vec!["input_attachment"]);

        config.input_attachment = vec![InputAttachmentConfig {
            input_id: "1".to_string(),
            ..Default::default()
        }; 3];
        assert_eq!(fields(&config), vec!["input_attachment"]);
    }

    #[test]
    fn test_nested_paths() {
        let mut config = standard_channel();
        config.input_attachment[0].input_settings = Some(InputSettingsConfig {
            filter_strength: Some(6),
            audio_selector: vec![AudioSelectorConfig {
                name: "english".to_string(),
                selector_type: "language".to_string(),
                ..Default::default()
            }],
            video_selector: Some(VideoSelectorConfig {
                color_space: "REC_709".to_string(),
                color_space_usage: "FORCE".to_string(),
                pid: Some(100),
                program_id: Some(1),
            }),
            ..Default::default()
        });

        assert_eq!(
            fields(&config),
            vec![
                "input_attachment[0].input_settings.audio_selector[0].language_code",
                "input_attachment[0].input_settings.filter_strength",
                "input_attachment[0].input_settings.video_selector.program_id",
            ]
        );
    }

    #[test]
    fn test_destination_requirements_follow_type() {
        let mut config = standard_channel();
        config.destination = [
            DestinationConfig {
                destination_type: "media_package".to_string(),
                ..Default::default()
            },
            DestinationConfig {
                destination_type: "multiplex".to_string(),
                multiplex_id: Some("mx".to_string()),
                ..Default::default()
            },
        ]
        .into();

        assert_eq!(
            fields(&config),
            vec![
                "destination[0].media_package_channel_ids",
                "destination[1].multiplex_program_name",
            ]
        );
    }

    #[test]
    fn test_caption_flags_follow_type() {
        let mut config = standard_channel();
        config.input_attachment[0].input_settings = Some(InputSettingsConfig {
            caption_selector: vec![CaptionSelectorConfig {
                name: "cc".to_string(),
                source_type: "teletext".to_string(),
                detect_scte20: true,
                ..Default::default()
            }],
            ..Default::default()
        });

        assert_eq!(
            fields(&config),
            vec!["input_attachment[0].input_settings.caption_selector[0].detect_scte20"]
        );
    }

    #[test]
    fn test_diff_groups() {
        let old = standard_channel();
        let mut new = old.clone();
        new.class = "STANDARD".to_string();
        new.log_level = Some("INFO".to_string());

        let diff = old.diff(&new);
        assert_eq!(diff.groups, vec!["class", "log_level"]);
        assert!(!diff.requires_replacement());
        assert!(!diff.tags);
    }

    #[test]
    fn test_yaml_field_names() {
        let yaml = r#"
class: STANDARD
destination:
  - id: out
    type: media_package
    media_package_channel_ids: [my-package-channel]
input_attachment:
  - input_id: "1234567"
    input_settings:
      smpte_2038_data_preference: IGNORE
      source_end_behaviour: CONTINUE
      caption_selector:
        - name: cc
          type: embedded
          upconvert_608: true
"#;
        let config: ChannelConfig = serde_yaml::from_str(yaml).unwrap();
        assert!(config.validate().is_empty());
        let settings = config.input_attachment[0].input_settings.as_ref().unwrap();
        assert!(settings.caption_selector[0].upconvert_608);
        assert!(!settings.caption_selector[0].detect_scte20);
    }
}
