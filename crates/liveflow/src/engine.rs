//! マニフェストと状態ファイルの突き合わせ
//!
//! 作成・更新は依存される側から (セキュリティグループ → 入力 → チャンネル)、
//! 削除はその逆順で実行する。各ステップの後に状態ファイルを保存するので、
//! 途中で失敗しても完了済みの操作は記録に残る。

use crate::manifest::{Manifest, Unresolved};
use liveflow_cloud::{
    Action, ActionType, ApplyResult, CancellationToken, GlobalState, IgnoreTags, Plan, Resource,
    ResourceRecord, RetryConfig, StateManager, plan_change,
};
use liveflow_config::Settings;
use liveflow_medialive::{
    ChannelConfig, ChannelResource, InputConfig, InputResource, InputSecurityGroupConfig,
    InputSecurityGroupResource, MediaLiveApi, ReconcileOptions,
};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;

const GROUP: &str = InputSecurityGroupResource::RESOURCE_TYPE;
const INPUT: &str = InputResource::RESOURCE_TYPE;
const CHANNEL: &str = ChannelResource::RESOURCE_TYPE;

/// 管理対象のエンティティ種別
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum ResourceKind {
    #[value(name = "input_security_group")]
    InputSecurityGroup,
    Input,
    Channel,
}

impl ResourceKind {
    pub fn resource_type(self) -> &'static str {
        match self {
            ResourceKind::InputSecurityGroup => GROUP,
            ResourceKind::Input => INPUT,
            ResourceKind::Channel => CHANNEL,
        }
    }
}

/// 設定ファイルから各リソースの調整オプションを組み立てる
pub fn reconcile_options(
    settings: &Settings,
    resource_type: &str,
    cancel: &CancellationToken,
) -> ReconcileOptions {
    let delete_retry = settings
        .delete_timeouts
        .for_type(resource_type)
        .map(|timeout| RetryConfig {
            timeout,
            initial_delay: settings.poll.initial_interval(),
            max_delay: settings.poll.max_interval(),
            backoff_multiplier: settings.poll.multiplier,
        });

    ReconcileOptions {
        delete_retry,
        ignore_tags: ignore_tags(settings),
        cancel: cancel.clone(),
    }
}

/// 差分・状態から除外するタグ
pub fn ignore_tags(settings: &Settings) -> IgnoreTags {
    IgnoreTags {
        keys: settings.ignore_tags.keys.iter().cloned().collect(),
        key_prefixes: settings.ignore_tags.key_prefixes.clone(),
    }
}

/// 計画 (リモートへの問い合わせなし)
///
/// 参照は記録済みIDで解決してから比較する。未作成の参照先を持つ
/// エンティティは作成予定として扱われる。
pub fn plan(manifest: &Manifest, state: &GlobalState, ignore: &IgnoreTags) -> anyhow::Result<Plan> {
    let (resolved, _) = manifest.resolve(state);

    let mut actions = Vec::new();
    actions.extend(plan_upserts(GROUP, &resolved.input_security_groups, state, ignore)?);
    actions.extend(plan_upserts(INPUT, &resolved.inputs, state, ignore)?);
    actions.extend(plan_upserts(CHANNEL, &resolved.channels, state, ignore)?);
    actions.extend(plan_deletes::<ChannelConfig>(CHANNEL, &resolved.channels, state, ignore)?);
    actions.extend(plan_deletes::<InputConfig>(INPUT, &resolved.inputs, state, ignore)?);
    actions.extend(plan_deletes::<InputSecurityGroupConfig>(
        GROUP,
        &resolved.input_security_groups,
        state,
        ignore,
    )?);
    Ok(Plan::new(actions))
}

fn plan_upserts<D>(
    resource_type: &str,
    desired: &BTreeMap<String, D>,
    state: &GlobalState,
    ignore: &IgnoreTags,
) -> anyhow::Result<Vec<Action>>
where
    D: liveflow_cloud::DesiredState + DeserializeOwned,
{
    let mut actions = Vec::new();
    for (name, config) in desired {
        let current = recorded::<D>(state, resource_type, name)?;
        actions.push(plan_change(
            resource_type,
            name,
            current.as_ref().map(|(id, old)| (id.as_str(), old)),
            Some(config),
            ignore,
        ));
    }
    Ok(actions)
}

fn plan_deletes<D>(
    resource_type: &str,
    desired: &BTreeMap<String, D>,
    state: &GlobalState,
    ignore: &IgnoreTags,
) -> anyhow::Result<Vec<Action>>
where
    D: liveflow_cloud::DesiredState + DeserializeOwned,
{
    let mut actions = Vec::new();
    for (name, record) in state.records_of(resource_type) {
        if desired.contains_key(name) {
            continue;
        }
        let old: D = record.desired_as()?;
        actions.push(plan_change(
            resource_type,
            name,
            Some((record.id.as_str(), &old)),
            None,
            ignore,
        ));
    }
    Ok(actions)
}

fn recorded<D: DeserializeOwned>(
    state: &GlobalState,
    resource_type: &str,
    name: &str,
) -> anyhow::Result<Option<(String, D)>> {
    match state.get_record(&GlobalState::key(resource_type, name)) {
        Some(record) => Ok(Some((record.id.clone(), record.desired_as()?))),
        None => Ok(None),
    }
}

/// 観測結果から記録を作る
///
/// IDとステータスは観測結果の `id` / `state` から取る。
fn record_for<D: Serialize, O: Serialize>(
    resource_type: &str,
    name: &str,
    desired: &D,
    observed: &O,
    previous: Option<&ResourceRecord>,
) -> anyhow::Result<ResourceRecord> {
    let attributes = serde_json::to_value(observed)?;
    let id = attributes
        .get("id")
        .and_then(|v| v.as_str())
        .ok_or_else(|| anyhow::anyhow!("{}.{} の観測結果にIDがありません", resource_type, name))?
        .to_string();

    let mut record = ResourceRecord::new(resource_type, name, id)
        .with_status(status_of(&attributes))
        .with_desired(desired)?;
    record.attributes = attributes;
    if let Some(previous) = previous {
        record.created_at = previous.created_at;
    }
    Ok(record)
}

fn status_of(attributes: &serde_json::Value) -> Option<String> {
    attributes
        .get("state")
        .and_then(|v| v.as_str())
        .map(str::to_string)
}

/// `refresh` の結果
#[derive(Debug, Default)]
pub struct RefreshReport {
    pub refreshed: Vec<String>,
    /// リモートに存在せず、記録から外したもの
    pub removed: Vec<String>,
}

/// MediaLive 上のエンティティを調整する
pub struct Engine {
    api: Arc<dyn MediaLiveApi>,
    groups: InputSecurityGroupResource,
    inputs: InputResource,
    channels: ChannelResource,
    ignore_tags: IgnoreTags,
}

impl Engine {
    pub fn new(api: Arc<dyn MediaLiveApi>, settings: &Settings, cancel: CancellationToken) -> Self {
        Self {
            groups: InputSecurityGroupResource::with_options(
                api.clone(),
                reconcile_options(settings, GROUP, &cancel),
            ),
            inputs: InputResource::with_options(
                api.clone(),
                reconcile_options(settings, INPUT, &cancel),
            ),
            channels: ChannelResource::with_options(
                api.clone(),
                reconcile_options(settings, CHANNEL, &cancel),
            ),
            ignore_tags: ignore_tags(settings),
            api,
        }
    }

    pub fn api(&self) -> &dyn MediaLiveApi {
        self.api.as_ref()
    }

    /// マニフェストの状態に揃える
    ///
    /// 最初の失敗で止まり、それ以降の操作は実行しない。
    pub async fn apply(
        &self,
        manifest: &Manifest,
        state: &mut GlobalState,
        store: &StateManager,
    ) -> anyhow::Result<ApplyResult> {
        let started = Instant::now();
        let mut result = ApplyResult::new();
        self.apply_steps(manifest, state, store, &mut result).await?;
        result.duration_ms = started.elapsed().as_millis() as u64;
        Ok(result)
    }

    async fn apply_steps(
        &self,
        manifest: &Manifest,
        state: &mut GlobalState,
        store: &StateManager,
        result: &mut ApplyResult,
    ) -> anyhow::Result<()> {
        let ignore = &self.ignore_tags;
        if !upsert_all(&self.groups, &manifest.input_security_groups, ignore, state, store, result)
            .await?
        {
            return Ok(());
        }

        let (resolved, unresolved) = manifest.resolve(state);
        if blocked(&unresolved, INPUT, result)
            || !upsert_all(&self.inputs, &resolved.inputs, ignore, state, store, result).await?
        {
            return Ok(());
        }

        let (resolved, unresolved) = manifest.resolve(state);
        if blocked(&unresolved, CHANNEL, result)
            || !upsert_all(&self.channels, &resolved.channels, ignore, state, store, result).await?
        {
            return Ok(());
        }

        let keep_channel = |name: &str| manifest.channels.contains_key(name);
        if !prune(&self.channels, keep_channel, state, store, result).await? {
            return Ok(());
        }
        let keep_input = |name: &str| manifest.inputs.contains_key(name);
        if !prune(&self.inputs, keep_input, state, store, result).await? {
            return Ok(());
        }
        let keep_group = |name: &str| manifest.input_security_groups.contains_key(name);
        prune(&self.groups, keep_group, state, store, result).await?;
        Ok(())
    }

    /// 記録済みの全エンティティを削除する
    pub async fn destroy(
        &self,
        state: &mut GlobalState,
        store: &StateManager,
    ) -> anyhow::Result<ApplyResult> {
        let started = Instant::now();
        let mut result = ApplyResult::new();
        self.destroy_steps(state, store, &mut result).await?;
        result.duration_ms = started.elapsed().as_millis() as u64;
        Ok(result)
    }

    /// チャンネル → 入力 → セキュリティグループの順に削除し、失敗したら止まる
    async fn destroy_steps(
        &self,
        state: &mut GlobalState,
        store: &StateManager,
        result: &mut ApplyResult,
    ) -> anyhow::Result<()> {
        if !prune(&self.channels, |_| false, state, store, result).await? {
            return Ok(());
        }
        if !prune(&self.inputs, |_| false, state, store, result).await? {
            return Ok(());
        }
        prune(&self.groups, |_| false, state, store, result).await?;
        Ok(())
    }

    /// 記録をリモートの現状で更新する
    pub async fn refresh(
        &self,
        state: &mut GlobalState,
        store: &StateManager,
    ) -> anyhow::Result<RefreshReport> {
        let mut report = RefreshReport::default();
        refresh_all(&self.groups, state, &mut report).await?;
        refresh_all(&self.inputs, state, &mut report).await?;
        refresh_all(&self.channels, state, &mut report).await?;
        store.save(state).await?;
        Ok(report)
    }

    /// 既存エンティティを `name` として管理下に入れる
    pub async fn import(
        &self,
        kind: ResourceKind,
        name: &str,
        id: &str,
        state: &mut GlobalState,
        store: &StateManager,
    ) -> anyhow::Result<ResourceRecord> {
        let record = match kind {
            ResourceKind::InputSecurityGroup => import_one(&self.groups, name, id, state).await?,
            ResourceKind::Input => import_one(&self.inputs, name, id, state).await?,
            ResourceKind::Channel => import_one(&self.channels, name, id, state).await?,
        };
        store.save(state).await?;
        Ok(record)
    }
}

fn blocked(unresolved: &[Unresolved], resource_type: &str, result: &mut ApplyResult) -> bool {
    let mut blocked = false;
    for u in unresolved.iter().filter(|u| u.resource_type == resource_type) {
        tracing::error!(unresolved = %u, "reference has no recorded ID");
        result.add_failure(
            format!("{}-{}.{}", ActionType::Create, u.resource_type, u.name),
            format!("参照 '{}' を解決できません", u.reference),
        );
        blocked = true;
    }
    blocked
}

/// 作成・更新・再作成。失敗したら `false`
async fn upsert_all<R>(
    resource: &R,
    desired: &BTreeMap<String, R::Desired>,
    ignore: &IgnoreTags,
    state: &mut GlobalState,
    store: &StateManager,
    result: &mut ApplyResult,
) -> anyhow::Result<bool>
where
    R: Resource,
    R::Desired: Serialize + DeserializeOwned,
    R::Observed: Serialize,
{
    let resource_type = resource.resource_type();
    for (name, config) in desired {
        let key = GlobalState::key(resource_type, name);
        let current = recorded::<R::Desired>(state, resource_type, name)?;
        let action = plan_change(
            resource_type,
            name,
            current.as_ref().map(|(id, old)| (id.as_str(), old)),
            Some(config),
            ignore,
        );
        if action.action_type == ActionType::NoOp {
            continue;
        }
        tracing::info!(action = %action.action_type, resource_type, name = %name, "applying");

        let outcome = match (action.action_type, current) {
            (ActionType::Update, Some((id, old))) => match resource.read(&id).await {
                Ok(_) => resource.update(&id, &old, config).await,
                Err(e) if e.is_not_found() => {
                    tracing::warn!(resource_type, name = %name, id = %id, "リモートに存在しないため再作成します");
                    state.remove_record(&key);
                    resource.create(config).await
                }
                Err(e) => Err(e),
            },
            (ActionType::Replace, Some((id, _))) => match resource.delete(&id).await {
                Ok(()) => {
                    state.remove_record(&key);
                    store.save(state).await?;
                    resource.create(config).await
                }
                Err(e) => Err(e),
            },
            _ => resource.create(config).await,
        };

        match outcome {
            Ok(observed) => {
                let record =
                    record_for(resource_type, name, config, &observed, state.get_record(&key))?;
                state.set_record(record);
                store.save(state).await?;
                result.add_success(action.id, action.description);
            }
            Err(e) => {
                tracing::error!(resource_type, name = %name, error = %e, "apply failed");
                result.add_failure(action.id, e.to_string());
                return Ok(false);
            }
        }
    }
    Ok(true)
}

/// `keep` が偽を返す記録を削除する。失敗したら `false`
async fn prune<R: Resource>(
    resource: &R,
    keep: impl Fn(&str) -> bool,
    state: &mut GlobalState,
    store: &StateManager,
    result: &mut ApplyResult,
) -> anyhow::Result<bool> {
    let resource_type = resource.resource_type();
    let doomed: Vec<(String, String)> = state
        .records_of(resource_type)
        .filter(|(name, _)| !keep(name))
        .map(|(name, record)| (name.to_string(), record.id.clone()))
        .collect();

    for (name, id) in doomed {
        let action_id = format!("{}-{}.{}", ActionType::Delete, resource_type, name);
        tracing::info!(resource_type, name = %name, id = %id, "deleting");
        match resource.delete(&id).await {
            Ok(()) => {
                state.remove_record(&GlobalState::key(resource_type, &name));
                store.save(state).await?;
                result.add_success(
                    action_id,
                    format!("{} {} ({}) を削除", resource_type, name, id),
                );
            }
            Err(e) => {
                tracing::error!(resource_type, name = %name, error = %e, "delete failed");
                result.add_failure(action_id, e.to_string());
                return Ok(false);
            }
        }
    }
    Ok(true)
}

async fn refresh_all<R>(
    resource: &R,
    state: &mut GlobalState,
    report: &mut RefreshReport,
) -> anyhow::Result<()>
where
    R: Resource,
    R::Observed: Serialize,
{
    let resource_type = resource.resource_type();
    let records: Vec<(String, String)> = state
        .records_of(resource_type)
        .map(|(name, record)| (name.to_string(), record.id.clone()))
        .collect();

    for (name, id) in records {
        let key = GlobalState::key(resource_type, &name);
        match resource.read(&id).await {
            Ok(observed) => {
                if let Some(mut record) = state.get_record(&key).cloned() {
                    record.set_attributes(&observed)?;
                    record.status = status_of(&record.attributes);
                    state.set_record(record);
                }
                report.refreshed.push(key);
            }
            Err(e) if e.is_not_found() => {
                tracing::warn!(resource_type, name = %name, id = %id, "リモートに存在しないため記録から外します");
                state.remove_record(&key);
                report.removed.push(key);
            }
            Err(e) => return Err(e.into()),
        }
    }
    Ok(())
}

async fn import_one<R>(
    resource: &R,
    name: &str,
    id: &str,
    state: &mut GlobalState,
) -> anyhow::Result<ResourceRecord>
where
    R: Resource,
    R::Desired: Serialize + for<'a> From<&'a R::Observed>,
    R::Observed: Serialize,
{
    let resource_type = resource.resource_type();
    if let Some(existing) = state.get_record(&GlobalState::key(resource_type, name)) {
        anyhow::bail!(
            "{}.{} は既に管理されています (ID: {})",
            resource_type,
            name,
            existing.id
        );
    }

    let observed = resource.import(id).await?;
    let desired = R::Desired::from(&observed);
    let record = record_for(resource_type, name, &desired, &observed, None)?;
    state.set_record(record.clone());
    Ok(record)
}

#[cfg(test)]
mod tests {
    use super::*;
    use liveflow_cloud::CloudError;
    use liveflow_medialive::ApiError;
    use liveflow_medialive::memory::{ApiCall, InMemoryMediaLive};

    const MANIFEST: &str = r#"
input_security_groups:
  studio:
    ipv4_whitelist: ["203.0.113.0/24"]
inputs:
  main:
    name: main-feed
    type: RTMP_PUSH
    destinations:
      - endpoint: live/main
    input_security_groups: [input_security_group.studio]
channels:
  program:
    class: SINGLE_PIPELINE
    destination:
      - id: out
        type: standard
        url: rtmp://cdn.example.com/live/program
    input_attachment:
      - input_id: input.main
"#;

    struct Fixture {
        api: Arc<InMemoryMediaLive>,
        engine: Engine,
        store: StateManager,
        _dir: tempfile::TempDir,
    }

    fn fixture() -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let api = Arc::new(InMemoryMediaLive::new());
        let engine = Engine::new(api.clone(), &Settings::default(), CancellationToken::new());
        Fixture {
            api,
            engine,
            store: StateManager::new(dir.path()),
            _dir: dir,
        }
    }

    fn manifest() -> Manifest {
        Manifest::parse(MANIFEST).unwrap()
    }

    #[test]
    fn test_options_follow_settings() {
        let mut settings = Settings::default();
        settings.delete_timeouts.input = 45;
        settings.ignore_tags.key_prefixes = vec!["managed-by:".to_string()];

        let options = reconcile_options(&settings, INPUT, &CancellationToken::new());
        let retry = options.delete_retry.unwrap();
        assert_eq!(retry.timeout.as_secs(), 45);
        assert_eq!(retry.initial_delay.as_millis(), 1_000);
        assert_eq!(retry.max_delay.as_millis(), 10_000);
        assert!(options.ignore_tags.is_ignored("managed-by:ci"));
        assert!(!options.ignore_tags.is_ignored("team"));
    }

    #[test]
    fn test_plan_from_empty_state_creates_everything() {
        let plan = plan(&manifest(), &GlobalState::new(), &IgnoreTags::default()).unwrap();
        let summary = plan.summary();
        assert_eq!(summary.create, 3);
        assert_eq!(summary.delete, 0);
        assert!(plan.has_changes);

        let order: Vec<&str> = plan.actions.iter().map(|a| a.resource_type.as_str()).collect();
        assert_eq!(order, vec![GROUP, INPUT, CHANNEL]);
    }

    #[tokio::test]
    async fn test_apply_creates_in_dependency_order() {
        let f = fixture();
        let mut state = GlobalState::new();

        let result = f.engine.apply(&manifest(), &mut state, &f.store).await.unwrap();
        assert!(result.is_success(), "{:?}", result.failed);
        assert_eq!(result.succeeded.len(), 3);

        let group_id = state.id_of(GROUP, "studio").unwrap().to_string();
        let input_id = state.id_of(INPUT, "main").unwrap().to_string();
        let channel_id = state.id_of(CHANNEL, "program").unwrap().to_string();

        let input = f.api.input(&input_id).unwrap();
        assert_eq!(input.security_groups, vec![group_id]);
        assert_eq!(input.attached_channels, vec![channel_id.clone()]);

        let record = state.get_record(&GlobalState::key(CHANNEL, "program")).unwrap();
        assert_eq!(record.status.as_deref(), Some("IDLE"));
        // 記録される desired は解決済みID
        let desired: ChannelConfig = record.desired_as().unwrap();
        assert_eq!(desired.input_attachment[0].input_id, input_id);

        // 状態ファイルにも保存されている
        let saved = f.store.load().await.unwrap();
        assert_eq!(saved.resources.len(), 3);
    }

    #[tokio::test]
    async fn test_second_apply_is_a_no_op() {
        let f = fixture();
        let mut state = GlobalState::new();
        f.engine.apply(&manifest(), &mut state, &f.store).await.unwrap();

        let plan = plan(&manifest(), &state, &IgnoreTags::default()).unwrap();
        assert!(!plan.has_changes);
        assert_eq!(plan.summary().no_change, 3);

        f.api.clear_calls();
        let result = f.engine.apply(&manifest(), &mut state, &f.store).await.unwrap();
        assert!(result.succeeded.is_empty());
        assert!(f.api.calls().is_empty());
    }

    #[tokio::test]
    async fn test_update_touches_only_changed_entity() {
        let f = fixture();
        let mut state = GlobalState::new();
        f.engine.apply(&manifest(), &mut state, &f.store).await.unwrap();

        let mut changed = manifest();
        changed
            .channels
            .get_mut("program")
            .unwrap()
            .log_level = Some("INFO".to_string());

        let plan = plan(&changed, &state, &IgnoreTags::default()).unwrap();
        assert_eq!(plan.summary().update, 1);

        f.api.clear_calls();
        let result = f.engine.apply(&changed, &mut state, &f.store).await.unwrap();
        assert!(result.is_success());
        assert_eq!(result.succeeded[0].action_id, "update-channel.program");
        let mutations = f.api.mutations();
        assert_eq!(mutations.len(), 1);
        assert!(matches!(
            &mutations[0],
            ApiCall::UpdateChannel(r) if r.log_level.as_deref() == Some("INFO")
        ));
    }

    #[tokio::test]
    async fn test_ignored_tag_change_is_not_applied() {
        let mut settings = Settings::default();
        settings.ignore_tags.keys = vec!["owner".to_string()];
        let dir = tempfile::tempdir().unwrap();
        let store = StateManager::new(dir.path());
        let api = Arc::new(InMemoryMediaLive::new());
        let engine = Engine::new(api.clone(), &settings, CancellationToken::new());

        let mut tagged = manifest();
        let input = tagged.inputs.get_mut("main").unwrap();
        input.tags.insert("env".into(), "prod".into());
        input.tags.insert("owner".into(), "alice".into());
        let mut state = GlobalState::new();
        engine.apply(&tagged, &mut state, &store).await.unwrap();

        let mut changed = tagged.clone();
        changed
            .inputs
            .get_mut("main")
            .unwrap()
            .tags
            .insert("owner".into(), "bob".into());

        let ignoring = plan(&changed, &state, &ignore_tags(&settings)).unwrap();
        assert!(!ignoring.has_changes);
        let strict = plan(&changed, &state, &IgnoreTags::default()).unwrap();
        assert_eq!(strict.summary().update, 1);

        api.clear_calls();
        let result = engine.apply(&changed, &mut state, &store).await.unwrap();
        assert!(result.succeeded.is_empty());
        assert!(api.calls().is_empty());
    }

    #[tokio::test]
    async fn test_removed_entities_are_deleted_in_reverse_order() {
        let f = fixture();
        let mut state = GlobalState::new();
        f.engine.apply(&manifest(), &mut state, &f.store).await.unwrap();

        let plan = plan(&Manifest::default(), &state, &IgnoreTags::default()).unwrap();
        let order: Vec<&str> = plan
            .actions_by_type(ActionType::Delete)
            .iter()
            .map(|a| a.resource_type.as_str())
            .collect();
        assert_eq!(order, vec![CHANNEL, INPUT, GROUP]);

        let result = f
            .engine
            .apply(&Manifest::default(), &mut state, &f.store)
            .await
            .unwrap();
        assert!(result.is_success(), "{:?}", result.failed);
        assert_eq!(result.succeeded.len(), 3);
        assert!(state.resources.is_empty());
    }

    #[tokio::test]
    async fn test_failure_stops_dependent_steps() {
        let f = fixture();
        f.api.fail_when(
            |call| matches!(call, ApiCall::CreateInput(_)),
            ApiError::service("BadRequestException", "boom"),
        );
        let mut state = GlobalState::new();

        let result = f.engine.apply(&manifest(), &mut state, &f.store).await.unwrap();
        assert!(!result.is_success());
        assert_eq!(result.failed[0].action_id, "create-input.main");
        assert!(state.id_of(GROUP, "studio").is_some());
        assert!(state.id_of(CHANNEL, "program").is_none());
        assert!(
            !f.api
                .calls()
                .iter()
                .any(|c| matches!(c, ApiCall::CreateChannel(_)))
        );
    }

    #[tokio::test]
    async fn test_update_of_vanished_entity_recreates_it() {
        let f = fixture();
        let mut state = GlobalState::new();
        f.engine.apply(&manifest(), &mut state, &f.store).await.unwrap();
        let old_id = state.id_of(GROUP, "studio").unwrap().to_string();

        // 記録だけ残してリモートから消えた状態を作る
        let input_id = state.id_of(INPUT, "main").unwrap().to_string();
        let channel_id = state.id_of(CHANNEL, "program").unwrap().to_string();
        f.api.delete_channel(&channel_id).await.unwrap();
        f.api.delete_input(&input_id).await.unwrap();
        f.api.delete_input_security_group(&old_id).await.unwrap();

        let mut changed = Manifest::default();
        let mut group = manifest().input_security_groups["studio"].clone();
        group.ipv4_whitelist.insert("198.51.100.0/24".to_string());
        changed.input_security_groups.insert("studio".to_string(), group);
        state.remove_record(&GlobalState::key(CHANNEL, "program"));
        state.remove_record(&GlobalState::key(INPUT, "main"));

        let result = f.engine.apply(&changed, &mut state, &f.store).await.unwrap();
        assert!(result.is_success(), "{:?}", result.failed);
        let new_id = state.id_of(GROUP, "studio").unwrap();
        assert_ne!(new_id, old_id);
    }

    #[tokio::test]
    async fn test_refresh_drops_missing_records() {
        let f = fixture();
        let mut state = GlobalState::new();
        f.engine.apply(&manifest(), &mut state, &f.store).await.unwrap();

        let channel_id = state.id_of(CHANNEL, "program").unwrap().to_string();
        f.api.delete_channel(&channel_id).await.unwrap();

        let report = f.engine.refresh(&mut state, &f.store).await.unwrap();
        assert_eq!(report.removed, vec!["channel.program".to_string()]);
        assert_eq!(report.refreshed.len(), 2);
        assert!(state.id_of(CHANNEL, "program").is_none());

        // 入力は切り離されたことが記録に反映される
        let input = state.get_record(&GlobalState::key(INPUT, "main")).unwrap();
        assert_eq!(input.status.as_deref(), Some("DETACHED"));
    }

    #[tokio::test]
    async fn test_import_adopts_existing_entity() {
        let f = fixture();
        let mut state = GlobalState::new();
        f.engine.apply(&manifest(), &mut state, &f.store).await.unwrap();
        let group_id = state.id_of(GROUP, "studio").unwrap().to_string();

        let mut fresh = GlobalState::new();
        let record = f
            .engine
            .import(ResourceKind::InputSecurityGroup, "studio", &group_id, &mut fresh, &f.store)
            .await
            .unwrap();
        assert_eq!(record.id, group_id);

        // 取り込んだ内容はマニフェストと一致する
        let only_group = Manifest {
            input_security_groups: manifest().input_security_groups,
            ..Default::default()
        };
        let plan = plan(&only_group, &fresh, &IgnoreTags::default()).unwrap();
        assert!(!plan.has_changes);

        let err = f
            .engine
            .import(ResourceKind::InputSecurityGroup, "studio", &group_id, &mut fresh, &f.store)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("既に管理されています"));
    }

    #[tokio::test]
    async fn test_import_of_unknown_id_fails() {
        let f = fixture();
        let mut state = GlobalState::new();
        let err = f
            .engine
            .import(ResourceKind::Channel, "ghost", "424242", &mut state, &f.store)
            .await
            .unwrap_err();
        let cloud = err.downcast_ref::<CloudError>().unwrap();
        assert!(cloud.is_not_found());
        assert!(state.resources.is_empty());
    }

    #[tokio::test]
    async fn test_destroy_removes_everything() {
        let f = fixture();
        let mut state = GlobalState::new();
        f.engine.apply(&manifest(), &mut state, &f.store).await.unwrap();

        let result = f.engine.destroy(&mut state, &f.store).await.unwrap();
        assert!(result.is_success(), "{:?}", result.failed);
        let ids: Vec<&str> = result.succeeded.iter().map(|r| r.action_id.as_str()).collect();
        assert_eq!(
            ids,
            vec![
                "delete-channel.program",
                "delete-input.main",
                "delete-input_security_group.studio"
            ]
        );
        assert!(state.resources.is_empty());
        assert!(f.store.load().await.unwrap().resources.is_empty());
    }

    #[tokio::test]
    async fn test_failed_delete_stops_later_deletes() {
        let f = fixture();
        let mut state = GlobalState::new();
        f.engine.apply(&manifest(), &mut state, &f.store).await.unwrap();
        f.api.fail_when(
            |call| matches!(call, ApiCall::DeleteInput(_)),
            ApiError::service("ConflictException", "input is attached"),
        );

        let result = f.engine.destroy(&mut state, &f.store).await.unwrap();
        assert_eq!(result.succeeded[0].action_id, "delete-channel.program");
        assert_eq!(result.failed[0].action_id, "delete-input.main");
        assert!(state.id_of(INPUT, "main").is_some());
        assert!(state.id_of(GROUP, "studio").is_some());
        assert!(
            !f.api
                .calls()
                .iter()
                .any(|c| matches!(c, ApiCall::DeleteInputSecurityGroup(_)))
        );

        // 残りの手順も同じところで止まる
        let result = f
            .engine
            .apply(&Manifest::default(), &mut state, &f.store)
            .await
            .unwrap();
        assert_eq!(result.failed.len(), 1);
        assert!(result.succeeded.is_empty());
        assert!(state.id_of(GROUP, "studio").is_some());
    }
}
