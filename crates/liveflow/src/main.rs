mod backend;
mod commands;
mod engine;
mod manifest;

use clap::{Parser, Subcommand};
use engine::ResourceKind;
use liveflow_cloud::CancellationToken;
use liveflow_config::Settings;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "liveflow")]
#[command(about = "MediaLive の入力とチャンネルを宣言的に管理する", long_about = None)]
struct Cli {
    /// マニフェストのパス (省略時は live.yaml を探索)
    #[arg(short = 'f', long, global = true)]
    manifest: Option<PathBuf>,

    /// デバッグログを出力
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// マニフェストを検証
    Validate,
    /// 実行計画を表示 (リモートには接続しない)
    Plan,
    /// マニフェストの状態に揃える
    Apply {
        /// 確認なしで実行
        #[arg(short, long)]
        yes: bool,
    },
    /// 記録をリモートの現状で更新
    Refresh,
    /// 既存のリソースを管理下に入れる
    Import {
        /// リソース種別
        #[arg(value_enum)]
        kind: ResourceKind,
        /// マニフェスト上の名前
        name: String,
        /// リモートID
        id: String,
    },
    /// 管理中のリソースをすべて削除
    Destroy {
        /// 確認なしで実行
        #[arg(short, long)]
        yes: bool,
    },
    /// 管理中のリソースを表示
    Show,
    /// リモートのリソース一覧
    List {
        /// リソース種別
        #[arg(value_enum)]
        kind: ResourceKind,
    },
    /// バージョン情報を表示
    Version,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // ログはstderrへ (RUST_LOG が優先)
    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level)),
        )
        .init();

    if matches!(cli.command, Commands::Version) {
        println!("liveflow {}", env!("CARGO_PKG_VERSION"));
        return Ok(());
    }

    // Ctrl-C で削除待ちを打ち切る
    let cancel = CancellationToken::new();
    let watcher = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("中断します");
            watcher.cancel();
        }
    });

    let ctx = commands::Context {
        manifest: cli.manifest,
        settings: Settings::load()?,
        cancel,
    };

    match cli.command {
        Commands::Validate => commands::validate::handle(&ctx).await?,
        Commands::Plan => commands::plan::handle(&ctx).await?,
        Commands::Apply { yes } => commands::apply::handle(&ctx, yes).await?,
        Commands::Refresh => commands::refresh::handle(&ctx).await?,
        Commands::Import { kind, name, id } => {
            commands::import::handle(&ctx, kind, &name, &id).await?
        }
        Commands::Destroy { yes } => commands::destroy::handle(&ctx, yes).await?,
        Commands::Show => commands::show::handle(&ctx).await?,
        Commands::List { kind } => commands::list::handle(&ctx, kind).await?,
        Commands::Version => {}
    }

    Ok(())
}
