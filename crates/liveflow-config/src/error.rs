use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("設定ディレクトリが見つかりません")]
    ConfigDirNotFound,

    #[error(
        "マニフェストが見つかりません。以下の場所を確認してください:\n\
        - カレントディレクトリ: live.local.yaml, .live.local.yaml, live.yaml, .live.yaml\n\
        - ./.liveflow/ ディレクトリ\n\
        - ~/.config/liveflow/live.yaml\n\
        または LIVEFLOW_MANIFEST 環境変数で直接指定できます"
    )]
    ManifestNotFound,

    #[error("設定ファイル {path} を読み込めません: {source}")]
    InvalidSettings {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("設定ファイル {path} の {field} が不正です: {message}")]
    InvalidValue {
        path: PathBuf,
        field: &'static str,
        message: String,
    },

    #[error("IO エラー: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, ConfigError>;
