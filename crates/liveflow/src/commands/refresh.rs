use super::Context;
use colored::Colorize;

pub async fn handle(ctx: &Context) -> anyhow::Result<()> {
    let project = ctx.project()?;
    let mut state = project.store.load().await?;
    if state.resources.is_empty() {
        println!("{}", "管理中のリソースはありません".dimmed());
        return Ok(());
    }

    println!("{}", "リモートの状態を取得中...".blue());
    let engine = ctx.engine().await?;
    let lock = project.store.acquire_lock().await?;
    let outcome = engine.refresh(&mut state, &project.store).await;
    lock.release().await?;
    let report = outcome?;

    for key in &report.refreshed {
        println!("  {} {}", "✓".green(), key);
    }
    for key in &report.removed {
        println!("  {} {} (リモートに存在しません)", "-".red(), key);
    }
    println!();
    println!(
        "{}",
        format!(
            "✓ {}件を更新、{}件を記録から削除しました",
            report.refreshed.len(),
            report.removed.len()
        )
        .green()
    );
    Ok(())
}
