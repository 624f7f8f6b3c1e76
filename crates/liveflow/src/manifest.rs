//! live.yaml のモデル
//!
//! ```yaml
//! input_security_groups:
//!   studio:
//!     ipv4_whitelist: ["203.0.113.0/24"]
//! inputs:
//!   main:
//!     name: main-feed
//!     type: RTMP_PUSH
//!     destinations:
//!       - endpoint: live/main
//!     input_security_groups: [input_security_group.studio]
//! channels:
//!   program:
//!     class: SINGLE_PIPELINE
//!     destination:
//!       - id: out
//!         type: standard
//!         url: rtmp://cdn.example.com/live/program
//!     input_attachment:
//!       - input_id: input.main
//! ```
//!
//! `input_security_group.<名前>` と `input.<名前>` は同じマニフェスト内の
//! エンティティへの参照で、適用時に記録済みのリモートIDへ置き換えられる。

use liveflow_cloud::{GlobalState, Validate, Violation};
use liveflow_medialive::{
    ChannelConfig, ChannelResource, InputConfig, InputResource, InputSecurityGroupConfig,
    InputSecurityGroupResource,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

const GROUP_REF: &str = "input_security_group.";
const INPUT_REF: &str = "input.";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Manifest {
    pub input_security_groups: BTreeMap<String, InputSecurityGroupConfig>,
    pub inputs: BTreeMap<String, InputConfig>,
    pub channels: BTreeMap<String, ChannelConfig>,
}

/// 解決できなかった参照
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Unresolved {
    pub resource_type: &'static str,
    pub name: String,
    pub reference: String,
}

impl std::fmt::Display for Unresolved {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}: {}", self.resource_type, self.name, self.reference)
    }
}

impl Manifest {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("{} を読み込めません: {}", path.display(), e))?;
        Self::parse(&content)
            .map_err(|e| anyhow::anyhow!("{} の解析に失敗しました: {}", path.display(), e))
    }

    pub fn parse(content: &str) -> Result<Self, serde_yaml::Error> {
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(content)
    }

    pub fn len(&self) -> usize {
        self.input_security_groups.len() + self.inputs.len() + self.channels.len()
    }

    /// 全エンティティの検証結果 (`type.name` ごと)
    ///
    /// 参照先がマニフェストにない場合もここで報告する。
    pub fn validate(&self) -> BTreeMap<String, Vec<Violation>> {
        let mut report = BTreeMap::new();
        let mut record = |resource_type: &str, name: &str, violations: Vec<Violation>| {
            if !violations.is_empty() {
                report.insert(GlobalState::key(resource_type, name), violations);
            }
        };

        for (name, config) in &self.input_security_groups {
            record(InputSecurityGroupResource::RESOURCE_TYPE, name, config.validate());
        }
        for (name, config) in &self.inputs {
            let mut violations = config.validate();
            for (i, reference) in config.input_security_groups.iter().enumerate() {
                self.check_reference(
                    &mut violations,
                    &format!("input_security_groups[{}]", i),
                    reference,
                );
            }
            record(InputResource::RESOURCE_TYPE, name, violations);
        }
        for (name, config) in &self.channels {
            let mut violations = config.validate();
            for (i, attachment) in config.input_attachment.iter().enumerate() {
                self.check_reference(
                    &mut violations,
                    &format!("input_attachment[{}].input_id", i),
                    &attachment.input_id,
                );
                if let Some(failover) = &attachment.automatic_input_failover_settings {
                    self.check_reference(
                        &mut violations,
                        &format!(
                            "input_attachment[{}].automatic_input_failover_settings.secondary_input_id",
                            i
                        ),
                        &failover.secondary_input_id,
                    );
                }
            }
            record(ChannelResource::RESOURCE_TYPE, name, violations);
        }
        report
    }

    fn check_reference(&self, violations: &mut Vec<Violation>, field: &str, reference: &str) {
        let known = if let Some(name) = reference.strip_prefix(GROUP_REF) {
            self.input_security_groups.contains_key(name)
        } else if let Some(name) = reference.strip_prefix(INPUT_REF) {
            self.inputs.contains_key(name)
        } else {
            // リモートIDの直接指定
            true
        };
        if !known {
            violations.push(Violation::new(
                field,
                format!("参照先 '{}' がマニフェストにありません", reference),
            ));
        }
    }

    /// 参照を記録済みIDへ置き換えたマニフェストを返す
    ///
    /// まだ作成されていないエンティティへの参照はそのまま残り、
    /// [`Unresolved`] として返される。
    pub fn resolve(&self, state: &GlobalState) -> (Manifest, Vec<Unresolved>) {
        let mut unresolved = Vec::new();
        let mut resolve = |resource_type: &'static str, name: &str, reference: &str| {
            let target = reference
                .strip_prefix(GROUP_REF)
                .map(|n| (InputSecurityGroupResource::RESOURCE_TYPE, n))
                .or_else(|| {
                    reference
                        .strip_prefix(INPUT_REF)
                        .map(|n| (InputResource::RESOURCE_TYPE, n))
                });
            let Some((target_type, target_name)) = target else {
                return reference.to_string();
            };
            match state.id_of(target_type, target_name) {
                Some(id) => id.to_string(),
                None => {
                    unresolved.push(Unresolved {
                        resource_type,
                        name: name.to_string(),
                        reference: reference.to_string(),
                    });
                    reference.to_string()
                }
            }
        };

        let mut resolved = self.clone();
        for (name, config) in resolved.inputs.iter_mut() {
            config.input_security_groups = config
                .input_security_groups
                .iter()
                .map(|r| resolve(InputResource::RESOURCE_TYPE, name, r))
                .collect();
        }
        for (name, config) in resolved.channels.iter_mut() {
            for attachment in config.input_attachment.iter_mut() {
                attachment.input_id =
                    resolve(ChannelResource::RESOURCE_TYPE, name, &attachment.input_id);
                if let Some(failover) = attachment.automatic_input_failover_settings.as_mut() {
                    failover.secondary_input_id = resolve(
                        ChannelResource::RESOURCE_TYPE,
                        name,
                        &failover.secondary_input_id,
                    );
                }
            }
        }
        (resolved, unresolved)
    }
}
