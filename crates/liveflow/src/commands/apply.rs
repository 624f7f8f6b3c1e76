use super::{Context, print_apply_result};
use colored::Colorize;

pub async fn handle(ctx: &Context, yes: bool) -> anyhow::Result<()> {
    let project = ctx.project()?;
    project.ensure_valid();

    let mut state = project.store.load().await?;
    let plan = crate::engine::plan(
        &project.manifest,
        &state,
        &crate::engine::ignore_tags(&ctx.settings),
    )?;
    super::plan::print_plan(&plan);
    if !plan.has_changes {
        return Ok(());
    }

    if !yes {
        println!();
        println!(
            "{}",
            "⚠ MediaLive 上のリソースを変更します".yellow().bold()
        );
        println!("実行するには --yes オプションを指定してください");
        return Ok(());
    }

    println!();
    println!("{}", "適用を開始します...".blue().bold());
    let engine = ctx.engine().await?;
    let lock = project.store.acquire_lock().await?;
    let outcome = engine.apply(&project.manifest, &mut state, &project.store).await;
    lock.release().await?;
    let result = outcome?;

    print_apply_result(&result);
    if !result.is_success() {
        eprintln!("{}", "✗ 適用に失敗しました".red().bold());
        std::process::exit(1);
    }
    println!("{}", "✓ 適用が完了しました".green().bold());
    Ok(())
}
