use super::Context;
use colored::Colorize;
use liveflow_cloud::{ActionType, Plan};

pub async fn handle(ctx: &Context) -> anyhow::Result<()> {
    let project = ctx.project()?;
    project.ensure_valid();

    let state = project.store.load().await?;
    let plan = crate::engine::plan(
        &project.manifest,
        &state,
        &crate::engine::ignore_tags(&ctx.settings),
    )?;
    print_plan(&plan);
    Ok(())
}

pub fn print_plan(plan: &Plan) {
    if !plan.has_changes {
        println!("{}", "✓ 変更はありません".green());
        return;
    }

    println!("{}", "実行計画:".bold());
    for action in &plan.actions {
        let marker = match action.action_type {
            ActionType::Create => "+".green(),
            ActionType::Update => "~".yellow(),
            ActionType::Replace => "-/+".magenta(),
            ActionType::Delete => "-".red(),
            ActionType::NoOp => continue,
        };
        println!("  {} {}", marker, action.description);
    }
    println!();
    println!("{}", plan.summary());
}
