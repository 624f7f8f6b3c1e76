//! リモートAPIへの接続

use liveflow_config::Settings;
use liveflow_medialive::MediaLiveApi;
use std::sync::Arc;

#[cfg(feature = "aws")]
pub async fn connect(settings: &Settings) -> anyhow::Result<Arc<dyn MediaLiveApi>> {
    use liveflow_medialive_aws::{AwsMediaLive, AwsSettings};

    let aws = AwsSettings {
        region: settings.region.clone(),
        profile: settings.profile.clone(),
        endpoint_url: settings.endpoint_url.clone(),
    };
    Ok(Arc::new(AwsMediaLive::connect(&aws).await))
}

#[cfg(not(feature = "aws"))]
pub async fn connect(_settings: &Settings) -> anyhow::Result<Arc<dyn MediaLiveApi>> {
    anyhow::bail!(
        "このビルドには AWS バックエンドが含まれていません。\n\
         `cargo install liveflow --features aws` で再ビルドしてください"
    )
}
