pub mod error;
pub mod settings;

pub use error::*;
pub use settings::{DeleteTimeouts, IgnoreTagSettings, PollSettings, Settings};

use std::path::PathBuf;

/// 環境変数でマニフェストを直接指定する
pub const MANIFEST_ENV: &str = "LIVEFLOW_MANIFEST";

const MANIFEST_CANDIDATES: [&str; 4] = [
    "live.local.yaml",
    ".live.local.yaml",
    "live.yaml",
    ".live.yaml",
];

/// LiveFlowの設定ディレクトリを取得 (~/.config/liveflow)
pub fn get_config_dir() -> Result<PathBuf> {
    let config_dir = dirs::config_dir()
        .ok_or(ConfigError::ConfigDirNotFound)?
        .join("liveflow");

    if !config_dir.exists() {
        std::fs::create_dir_all(&config_dir)?;
    }

    Ok(config_dir)
}

/// プロジェクトのlive.yamlを探す
///
/// 以下の優先順位で検索:
/// 1. 環境変数 LIVEFLOW_MANIFEST (直接パス指定)
/// 2. カレントディレクトリ: live.local.yaml, .live.local.yaml, live.yaml, .live.yaml
/// 3. ./.liveflow/ ディレクトリ内: 同様の順序
/// 4. ~/.config/liveflow/live.yaml (グローバル)
pub fn find_manifest() -> Result<PathBuf> {
    if let Ok(manifest) = std::env::var(MANIFEST_ENV) {
        let path = PathBuf::from(manifest);
        if path.exists() {
            return Ok(path);
        }
        tracing::warn!(path = %path.display(), "{} が存在しないファイルを指しています", MANIFEST_ENV);
    }

    let current_dir = std::env::current_dir()?;

    for filename in &MANIFEST_CANDIDATES {
        let path = current_dir.join(filename);
        if path.exists() {
            return Ok(path);
        }
    }

    let project_dir = current_dir.join(".liveflow");
    if project_dir.is_dir() {
        for filename in &MANIFEST_CANDIDATES {
            let path = project_dir.join(filename);
            if path.exists() {
                return Ok(path);
            }
        }
    }

    if let Some(config_dir) = dirs::config_dir() {
        let global = config_dir.join("liveflow").join("live.yaml");
        if global.exists() {
            return Ok(global);
        }
    }

    Err(ConfigError::ManifestNotFound)
}
