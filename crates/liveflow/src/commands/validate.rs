use super::{Context, print_violations};
use crate::manifest::Manifest;
use colored::Colorize;

pub async fn handle(ctx: &Context) -> anyhow::Result<()> {
    println!("{}", "マニフェストを検証中...".blue());

    let path = match ctx.manifest_path() {
        Ok(path) => path,
        Err(e) => {
            eprintln!();
            eprintln!("{}", "✗ マニフェストが見つかりません".red().bold());
            eprintln!("  {}", e);
            std::process::exit(1);
        }
    };
    println!("マニフェスト: {}", path.display().to_string().cyan());

    let manifest = match Manifest::load(&path) {
        Ok(manifest) => manifest,
        Err(e) => {
            eprintln!();
            eprintln!("{}", "✗ 読み込みエラー".red().bold());
            eprintln!("  {}", e);
            std::process::exit(1);
        }
    };

    let report = manifest.validate();
    if !report.is_empty() {
        eprintln!();
        eprintln!("{}", "✗ 設定エラー".red().bold());
        print_violations(&report);
        std::process::exit(1);
    }

    println!("{}", "✓ マニフェストは正常です！".green().bold());
    println!();
    println!("サマリー: {}個のリソース", manifest.len());
    println!(
        "  入力セキュリティグループ: {}個",
        manifest.input_security_groups.len()
    );
    for (name, group) in &manifest.input_security_groups {
        println!("    - {} ({}件のCIDR)", name.cyan(), group.ipv4_whitelist.len());
    }
    println!("  入力: {}個", manifest.inputs.len());
    for (name, input) in &manifest.inputs {
        println!("    - {} ({})", name.cyan(), input.input_type);
    }
    println!("  チャンネル: {}個", manifest.channels.len());
    for (name, channel) in &manifest.channels {
        println!(
            "    - {} ({}, {}個の入力)",
            name.cyan(),
            channel.class,
            channel.input_attachment.len()
        );
    }

    Ok(())
}
