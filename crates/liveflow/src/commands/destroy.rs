use super::{Context, print_apply_result};
use colored::Colorize;

pub async fn handle(ctx: &Context, yes: bool) -> anyhow::Result<()> {
    let project = ctx.project()?;
    let mut state = project.store.load().await?;

    if state.resources.is_empty() {
        println!("{}", "管理中のリソースはありません".dimmed());
        return Ok(());
    }

    println!("{}", "削除対象:".bold());
    for record in state.resources.values() {
        println!("  {} {} ({})", "-".red(), record.key(), record.id);
    }

    if !yes {
        println!();
        println!(
            "{}",
            format!("⚠ {}個のリソースを削除します", state.resources.len())
                .red()
                .bold()
        );
        println!("実行するには --yes オプションを指定してください");
        return Ok(());
    }

    println!();
    println!("{}", "削除を開始します...".blue().bold());
    let engine = ctx.engine().await?;
    let lock = project.store.acquire_lock().await?;
    let outcome = engine.destroy(&mut state, &project.store).await;
    lock.release().await?;
    let result = outcome?;

    print_apply_result(&result);
    if !result.is_success() {
        eprintln!("{}", "✗ 削除に失敗しました".red().bold());
        std::process::exit(1);
    }
    println!("{}", "✓ すべてのリソースを削除しました".green().bold());
    Ok(())
}
