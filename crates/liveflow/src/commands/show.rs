use super::Context;
use colored::Colorize;

pub async fn handle(ctx: &Context) -> anyhow::Result<()> {
    let project = ctx.project()?;
    let state = project.store.load().await?;

    if state.resources.is_empty() {
        println!("{}", "管理中のリソースはありません".dimmed());
        return Ok(());
    }

    println!(
        "{}",
        format!("管理中のリソース ({}個):", state.resources.len()).bold()
    );
    for record in state.resources.values() {
        let status = record.status.as_deref().unwrap_or("-");
        println!(
            "  {} {} [{}] 更新: {}",
            record.key().cyan(),
            record.id,
            status,
            record.updated_at.format("%Y-%m-%d %H:%M:%S")
        );
        if let Some(arn) = record.get_attribute::<String>("arn") {
            println!("      {}", arn.dimmed());
        }
    }
    Ok(())
}
