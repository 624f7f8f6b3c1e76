pub mod apply;
pub mod destroy;
pub mod import;
pub mod list;
pub mod plan;
pub mod refresh;
pub mod show;
pub mod validate;

use crate::engine::Engine;
use crate::manifest::Manifest;
use colored::Colorize;
use liveflow_cloud::{CancellationToken, StateManager};
use liveflow_config::Settings;
use std::path::{Path, PathBuf};

/// コマンド共通の実行環境
pub struct Context {
    pub manifest: Option<PathBuf>,
    pub settings: Settings,
    pub cancel: CancellationToken,
}

impl Context {
    pub fn manifest_path(&self) -> anyhow::Result<PathBuf> {
        match &self.manifest {
            Some(path) => Ok(path.clone()),
            None => Ok(liveflow_config::find_manifest()?),
        }
    }

    pub fn project(&self) -> anyhow::Result<Project> {
        Project::load(&self.manifest_path()?)
    }

    pub async fn engine(&self) -> anyhow::Result<Engine> {
        let api = crate::backend::connect(&self.settings).await?;
        Ok(Engine::new(api, &self.settings, self.cancel.clone()))
    }
}

/// マニフェストと状態ファイル
pub struct Project {
    pub manifest: Manifest,
    pub store: StateManager,
}

impl Project {
    pub fn load(manifest_path: &Path) -> anyhow::Result<Self> {
        let manifest = Manifest::load(manifest_path)?;
        let root = project_root(manifest_path);
        tracing::debug!(manifest = %manifest_path.display(), root = %root.display(), "project loaded");
        Ok(Self {
            manifest,
            store: StateManager::new(&root),
        })
    }

    /// マニフェストを検証し、違反があれば表示して終了する
    pub fn ensure_valid(&self) {
        let report = self.manifest.validate();
        if report.is_empty() {
            return;
        }
        eprintln!("{}", "✗ マニフェストにエラーがあります".red().bold());
        print_violations(&report);
        std::process::exit(1);
    }
}

/// 状態ファイルを置くディレクトリ
///
/// `.liveflow/` 内のマニフェストはその親をプロジェクトルートとする。
pub fn project_root(manifest_path: &Path) -> PathBuf {
    let dir = manifest_path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    if dir.file_name().is_some_and(|n| n == ".liveflow") {
        if let Some(parent) = dir.parent() {
            return parent.to_path_buf();
        }
    }
    dir.to_path_buf()
}

pub fn print_violations(report: &std::collections::BTreeMap<String, Vec<liveflow_cloud::Violation>>) {
    for (key, violations) in report {
        eprintln!("  {}", key.cyan());
        for violation in violations {
            eprintln!("    - {}", violation);
        }
    }
}

pub fn print_apply_result(result: &liveflow_cloud::ApplyResult) {
    println!();
    for success in &result.succeeded {
        println!("  {} {}", "✓".green(), success.message);
    }
    for failure in &result.failed {
        println!(
            "  {} {}: {}",
            "✗".red(),
            failure.action_id,
            failure.error.as_deref().unwrap_or("")
        );
    }
    println!();
    println!(
        "{} 件成功, {} 件失敗 ({} ms)",
        result.succeeded.len(),
        result.failed.len(),
        result.duration_ms
    );
}
