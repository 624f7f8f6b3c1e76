use super::Context;
use crate::engine::ResourceKind;
use colored::Colorize;

pub async fn handle(ctx: &Context, kind: ResourceKind) -> anyhow::Result<()> {
    let engine = ctx.engine().await?;
    let api = engine.api();

    let rows: Vec<(String, String, String)> = match kind {
        ResourceKind::InputSecurityGroup => api
            .list_input_security_groups()
            .await?
            .into_iter()
            .map(|g| (g.id, g.whitelist_rules.join(","), g.state))
            .collect(),
        ResourceKind::Input => api
            .list_inputs()
            .await?
            .into_iter()
            .map(|i| (i.id, i.name, i.state))
            .collect(),
        ResourceKind::Channel => api
            .list_channels()
            .await?
            .into_iter()
            .map(|c| (c.id, c.name.unwrap_or_default(), c.state))
            .collect(),
    };

    if rows.is_empty() {
        println!("{}", format!("{} はありません", kind.resource_type()).dimmed());
        return Ok(());
    }
    println!("{}", format!("{} ({}個):", kind.resource_type(), rows.len()).bold());
    for (id, label, state) in rows {
        println!("  {} {} [{}]", id.cyan(), label, state);
    }
    Ok(())
}
