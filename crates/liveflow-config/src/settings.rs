//! ユーザー設定 (config.yaml)
//!
//! ```yaml
//! region: ap-northeast-1
//! profile: broadcast
//! poll:
//!   initial_interval_ms: 1000
//!   max_interval_ms: 10000
//!   multiplier: 2.0
//! delete_timeouts:
//!   input: 30
//!   channel: 600
//! ignore_tags:
//!   key_prefixes: ["managed-by:"]
//! ```

use crate::error::{ConfigError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// 環境変数で設定ファイルを直接指定する
pub const SETTINGS_ENV: &str = "LIVEFLOW_SETTINGS";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    pub region: Option<String>,
    pub profile: Option<String>,
    pub endpoint_url: Option<String>,
    pub poll: PollSettings,
    pub delete_timeouts: DeleteTimeouts,
    pub ignore_tags: IgnoreTagSettings,
}

/// 削除待ちのポーリング間隔
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PollSettings {
    pub initial_interval_ms: u64,
    pub max_interval_ms: u64,
    pub multiplier: f64,
}

impl Default for PollSettings {
    fn default() -> Self {
        Self {
            initial_interval_ms: 1_000,
            max_interval_ms: 10_000,
            multiplier: 2.0,
        }
    }
}

impl PollSettings {
    pub fn initial_interval(&self) -> Duration {
        Duration::from_millis(self.initial_interval_ms)
    }

    pub fn max_interval(&self) -> Duration {
        Duration::from_millis(self.max_interval_ms)
    }

    /// 間隔が 0 だと削除待ちが空回りする
    fn check(&self) -> std::result::Result<(), (&'static str, String)> {
        if self.initial_interval_ms == 0 {
            return Err(("poll.initial_interval_ms", "1 以上を指定してください".into()));
        }
        if self.max_interval_ms < self.initial_interval_ms {
            return Err((
                "poll.max_interval_ms",
                format!(
                    "initial_interval_ms ({}) 以上を指定してください",
                    self.initial_interval_ms
                ),
            ));
        }
        if !self.multiplier.is_finite() || self.multiplier < 1.0 {
            return Err((
                "poll.multiplier",
                format!("1.0 以上の有限値を指定してください ({})", self.multiplier),
            ));
        }
        Ok(())
    }
}

/// リソース種別ごとの削除待ちタイムアウト (秒)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DeleteTimeouts {
    pub input: u64,
    pub input_security_group: u64,
    pub channel: u64,
}

impl Default for DeleteTimeouts {
    fn default() -> Self {
        Self {
            input: 30,
            input_security_group: 5 * 60,
            channel: 5 * 60,
        }
    }
}

impl DeleteTimeouts {
    /// `resource_type` に対応するタイムアウト
    pub fn for_type(&self, resource_type: &str) -> Option<Duration> {
        let secs = match resource_type {
            "input" => self.input,
            "input_security_group" => self.input_security_group,
            "channel" => self.channel,
            _ => return None,
        };
        Some(Duration::from_secs(secs))
    }
}

/// 差分・状態から除外するタグ
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct IgnoreTagSettings {
    pub keys: Vec<String>,
    pub key_prefixes: Vec<String>,
}

impl Settings {
    /// 設定ファイルのパス (LIVEFLOW_SETTINGS > ~/.config/liveflow/config.yaml)
    pub fn default_path() -> Result<PathBuf> {
        if let Ok(path) = std::env::var(SETTINGS_ENV) {
            return Ok(PathBuf::from(path));
        }
        Ok(crate::get_config_dir()?.join("config.yaml"))
    }

    /// 設定を読み込み、環境変数で上書きする
    pub fn load() -> Result<Self> {
        let mut settings = Self::load_from(&Self::default_path()?)?;
        settings.apply_env();
        Ok(settings)
    }

    /// `path` から読み込む。ファイルがなければデフォルト値
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            tracing::debug!(path = %path.display(), "設定ファイルなし、デフォルト値を使用");
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)?;
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        let settings: Self =
            serde_yaml::from_str(&content).map_err(|source| ConfigError::InvalidSettings {
                path: path.to_path_buf(),
                source,
            })?;
        settings
            .poll
            .check()
            .map_err(|(field, message)| ConfigError::InvalidValue {
                path: path.to_path_buf(),
                field,
                message,
            })?;
        Ok(settings)
    }

    /// AWS_REGION / AWS_PROFILE はファイルより優先
    pub fn apply_env(&mut self) {
        if let Ok(region) = std::env::var("AWS_REGION") {
            if !region.is_empty() {
                self.region = Some(region);
            }
        }
        if let Ok(profile) = std::env::var("AWS_PROFILE") {
            if !profile.is_empty() {
                self.profile = Some(profile);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::fs;

    #[test]
    fn test_missing_file_gives_defaults() {
        let temp_dir = tempfile::tempdir().unwrap();
        let settings = Settings::load_from(&temp_dir.path().join("config.yaml")).unwrap();

        assert_eq!(settings, Settings::default());
        assert_eq!(
            settings.delete_timeouts.for_type("input"),
            Some(Duration::from_secs(30))
        );
        assert_eq!(
            settings.delete_timeouts.for_type("channel"),
            Some(Duration::from_secs(300))
        );
        assert_eq!(settings.delete_timeouts.for_type("multiplex"), None);
    }

    #[test]
    fn test_partial_file_keeps_other_defaults() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("config.yaml");
        fs::write(
            &path,
            "region: ap-northeast-1\n\
             delete_timeouts:\n  channel: 600\n\
             ignore_tags:\n  key_prefixes: [\"managed-by:\"]\n",
        )
        .unwrap();

        let settings = Settings::load_from(&path).unwrap();
        assert_eq!(settings.region.as_deref(), Some("ap-northeast-1"));
        assert_eq!(settings.delete_timeouts.channel, 600);
        assert_eq!(settings.delete_timeouts.input, 30);
        assert_eq!(settings.poll, PollSettings::default());
        assert_eq!(settings.ignore_tags.key_prefixes, vec!["managed-by:"]);
    }

    #[test]
    fn test_unknown_key_is_rejected() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("config.yaml");
        fs::write(&path, "regoin: us-east-1\n").unwrap();

        let err = Settings::load_from(&path).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidSettings { .. }));
    }

    #[test]
    fn test_unusable_poll_intervals_are_rejected() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("config.yaml");

        let cases = [
            ("poll:\n  initial_interval_ms: 0\n", "poll.initial_interval_ms"),
            ("poll:\n  max_interval_ms: 0\n", "poll.max_interval_ms"),
            ("poll:\n  multiplier: 0.5\n", "poll.multiplier"),
            ("poll:\n  multiplier: .nan\n", "poll.multiplier"),
            ("poll:\n  multiplier: .inf\n", "poll.multiplier"),
        ];
        for (content, expected) in cases {
            fs::write(&path, content).unwrap();
            match Settings::load_from(&path) {
                Err(ConfigError::InvalidValue { field, .. }) => assert_eq!(field, expected),
                other => panic!("{content:?} should be rejected, got {other:?}"),
            }
        }
    }

    #[test]
    fn test_fixed_poll_interval_is_accepted() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("config.yaml");
        fs::write(
            &path,
            "poll:\n  initial_interval_ms: 500\n  max_interval_ms: 500\n  multiplier: 1.0\n",
        )
        .unwrap();

        let settings = Settings::load_from(&path).unwrap();
        assert_eq!(settings.poll.initial_interval(), Duration::from_millis(500));
        assert_eq!(settings.poll.max_interval(), Duration::from_millis(500));
    }

    #[test]
    #[serial]
    fn test_env_overrides_file() {
        let mut settings = Settings {
            region: Some("us-east-1".to_string()),
            profile: Some("default".to_string()),
            ..Default::default()
        };

        temp_env::with_vars(
            [("AWS_REGION", Some("eu-west-1")), ("AWS_PROFILE", None)],
            || settings.apply_env(),
        );

        assert_eq!(settings.region.as_deref(), Some("eu-west-1"));
        assert_eq!(settings.profile.as_deref(), Some("default"));
    }

    #[test]
    #[serial]
    fn test_settings_env_var_path() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("custom.yaml");
        fs::write(&path, "profile: broadcast\n").unwrap();

        let settings = temp_env::with_vars(
            [
                (SETTINGS_ENV, Some(path.to_str().unwrap())),
                ("AWS_REGION", None),
                ("AWS_PROFILE", None),
            ],
            Settings::load,
        )
        .unwrap();

        assert_eq!(settings.profile.as_deref(), Some("broadcast"));
        assert_eq!(settings.region, None);
    }
}
