use super::Context;
use crate::engine::ResourceKind;
use colored::Colorize;

pub async fn handle(ctx: &Context, kind: ResourceKind, name: &str, id: &str) -> anyhow::Result<()> {
    let project = ctx.project()?;
    let mut state = project.store.load().await?;

    println!(
        "{} {} ({}) を取り込み中...",
        kind.resource_type(),
        name.cyan(),
        id
    );
    let engine = ctx.engine().await?;
    let lock = project.store.acquire_lock().await?;
    let outcome = engine
        .import(kind, name, id, &mut state, &project.store)
        .await;
    lock.release().await?;
    let record = outcome?;

    println!("{}", format!("✓ {} を取り込みました", record.key()).green());
    println!();
    println!("マニフェストに追加する設定:");
    let mut entry = serde_json::Map::new();
    entry.insert(name.to_string(), record.desired.clone());
    println!("{}", serde_yaml::to_string(&entry)?);
    println!(
        "{}",
        "IDは参照 (input.<名前> など) に書き換えても差分になりません".dimmed()
    );
    Ok(())
}
