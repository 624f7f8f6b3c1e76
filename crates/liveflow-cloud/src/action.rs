//! Action types for resource reconciliation

use crate::resource::DesiredState;
use crate::tags::IgnoreTags;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Represents a planned action for a managed entity
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Action {
    /// Unique identifier for the action
    pub id: String,

    /// Type of action to perform
    pub action_type: ActionType,

    /// Resource type (e.g., "input", "channel")
    pub resource_type: String,

    /// Logical name in the manifest
    pub name: String,

    /// Remote ID, when the entity already exists
    pub resource_id: Option<String>,

    /// Description of the action
    pub description: String,

    /// Additional details about the action
    pub details: BTreeMap<String, serde_json::Value>,
}

impl Action {
    /// Record key (`type.name`) this action applies to
    pub fn key(&self) -> String {
        format!("{}.{}", self.resource_type, self.name)
    }
}

/// Type of action to perform
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionType {
    /// Create a new entity
    Create,
    /// Update changed field groups in place
    Update,
    /// Destroy and recreate because an immutable field changed
    Replace,
    /// Delete an entity
    Delete,
    /// No changes needed
    NoOp,
}

impl std::fmt::Display for ActionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ActionType::Create => write!(f, "create"),
            ActionType::Update => write!(f, "update"),
            ActionType::Replace => write!(f, "replace"),
            ActionType::Delete => write!(f, "delete"),
            ActionType::NoOp => write!(f, "no-op"),
        }
    }
}

/// Decide what has to happen to one entity
///
/// `current` is the recorded remote ID with the desired state it was last
/// reconciled to; `desired` is the new desired state (`None` = remove).
/// Tag keys matched by `ignore` never make an entity out of date.
pub fn plan_change<D: DesiredState>(
    resource_type: &str,
    name: &str,
    current: Option<(&str, &D)>,
    desired: Option<&D>,
    ignore: &IgnoreTags,
) -> Action {
    let mut details = BTreeMap::new();
    let (action_type, resource_id, description) = match (current, desired) {
        (None, None) => (
            ActionType::NoOp,
            None,
            format!("{} {} は管理対象外です", resource_type, name),
        ),
        (None, Some(_)) => (
            ActionType::Create,
            None,
            format!("{} {} を作成", resource_type, name),
        ),
        (Some((id, _)), None) => (
            ActionType::Delete,
            Some(id.to_string()),
            format!("{} {} ({}) を削除", resource_type, name, id),
        ),
        (Some((id, old)), Some(new)) => {
            let diff = old.diff_ignoring(new, ignore);
            if diff.requires_replacement() {
                details.insert("replace".to_string(), serde_json::json!(diff.replace));
                (
                    ActionType::Replace,
                    Some(id.to_string()),
                    format!(
                        "{} {} ({}) を再作成 ({} は変更できません)",
                        resource_type,
                        name,
                        id,
                        diff.replace.join(", ")
                    ),
                )
            } else if diff.is_empty() {
                (
                    ActionType::NoOp,
                    Some(id.to_string()),
                    format!("{} {} ({}) は最新です", resource_type, name, id),
                )
            } else {
                let mut changed: Vec<&str> = diff.groups.clone();
                if diff.tags {
                    changed.push("tags");
                }
                details.insert("groups".to_string(), serde_json::json!(diff.groups));
                details.insert("tags".to_string(), serde_json::json!(diff.tags));
                (
                    ActionType::Update,
                    Some(id.to_string()),
                    format!(
                        "{} {} ({}) を更新: {}",
                        resource_type,
                        name,
                        id,
                        changed.join(", ")
                    ),
                )
            }
        }
    };

    Action {
        id: format!("{}-{}.{}", action_type, resource_type, name),
        action_type,
        resource_type: resource_type.to_string(),
        name: name.to_string(),
        resource_id,
        description,
        details,
    }
}

/// Result of applying actions
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApplyResult {
    /// Successfully applied actions
    pub succeeded: Vec<ActionResult>,

    /// Failed actions
    pub failed: Vec<ActionResult>,

    /// Total execution time in milliseconds
    pub duration_ms: u64,
}

impl ApplyResult {
    pub fn new() -> Self {
        Self {
            succeeded: Vec::new(),
            failed: Vec::new(),
            duration_ms: 0,
        }
    }

    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }

    pub fn add_success(&mut self, action_id: String, message: String) {
        self.succeeded.push(ActionResult {
            action_id,
            success: true,
            message,
            error: None,
        });
    }

    pub fn add_failure(&mut self, action_id: String, error: String) {
        self.failed.push(ActionResult {
            action_id,
            success: false,
            message: String::new(),
            error: Some(error),
        });
    }
}

impl Default for ApplyResult {
    fn default() -> Self {
        Self::new()
    }
}

/// Result of a single action
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionResult {
    /// ID of the action
    pub action_id: String,

    /// Whether the action succeeded
    pub success: bool,

    /// Success message
    pub message: String,

    /// Error message if failed
    pub error: Option<String>,
}

/// Plan containing all actions to be applied
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Plan {
    /// List of actions to perform
    pub actions: Vec<Action>,

    /// Whether the plan has any changes
    pub has_changes: bool,
}

impl Plan {
    pub fn new(actions: Vec<Action>) -> Self {
        let has_changes = actions.iter().any(|a| a.action_type != ActionType::NoOp);
        Self {
            actions,
            has_changes,
        }
    }

    pub fn empty() -> Self {
        Self {
            actions: Vec::new(),
            has_changes: false,
        }
    }

    /// Get actions by type
    pub fn actions_by_type(&self, action_type: ActionType) -> Vec<&Action> {
        self.actions
            .iter()
            .filter(|a| a.action_type == action_type)
            .collect()
    }

    /// Summary of the plan
    pub fn summary(&self) -> PlanSummary {
        PlanSummary {
            create: self.actions_by_type(ActionType::Create).len(),
            update: self.actions_by_type(ActionType::Update).len(),
            replace: self.actions_by_type(ActionType::Replace).len(),
            delete: self.actions_by_type(ActionType::Delete).len(),
            no_change: self.actions_by_type(ActionType::NoOp).len(),
        }
    }
}

/// Summary of planned actions
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlanSummary {
    pub create: usize,
    pub update: usize,
    pub replace: usize,
    pub delete: usize,
    pub no_change: usize,
}

impl std::fmt::Display for PlanSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} to create, {} to update, {} to replace, {} to delete, {} unchanged",
            self.create, self.update, self.replace, self.delete, self.no_change
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resource::Diff;
    use crate::tags::Tags;
    use crate::validation::{Validate, Violation};

    #[derive(Debug, Clone)]
    struct Fake {
        kind: &'static str,
        name: &'static str,
        tags: Tags,
    }

    impl Validate for Fake {
        fn validate(&self) -> Vec<Violation> {
            Vec::new()
        }
    }

    impl DesiredState for Fake {
        fn tags(&self) -> &Tags {
            &self.tags
        }

        fn diff(&self, new: &Self) -> Diff {
            let mut diff = Diff::new();
            diff.force_new("kind", self.kind, new.kind);
            diff.group("name", self.name, new.name);
            diff.compare_tags(&self.tags, &new.tags);
            diff
        }
    }

    fn fake(kind: &'static str, name: &'static str) -> Fake {
        Fake {
            kind,
            name,
            tags: Tags::new(),
        }
    }

    #[test]
    fn test_plan_create_and_delete() {
        let new = fake("RTMP_PUSH", "a");

        let create = plan_change("input", "main", None, Some(&new), &IgnoreTags::default());
        assert_eq!(create.action_type, ActionType::Create);
        assert_eq!(create.resource_id, None);
        assert_eq!(create.key(), "input.main");

        let delete = plan_change::<Fake>(
            "input",
            "main",
            Some(("1234", &new)),
            None,
            &IgnoreTags::default(),
        );
        assert_eq!(delete.action_type, ActionType::Delete);
        assert_eq!(delete.resource_id.as_deref(), Some("1234"));
    }

    #[test]
    fn test_plan_update_lists_groups() {
        let old = fake("RTMP_PUSH", "a");
        let mut new = fake("RTMP_PUSH", "b");
        new.tags.insert("env".into(), "prod".into());

        let action = plan_change(
            "input",
            "main",
            Some(("1234", &old)),
            Some(&new),
            &IgnoreTags::default(),
        );
        assert_eq!(action.action_type, ActionType::Update);
        assert_eq!(action.details["groups"], serde_json::json!(["name"]));
        assert_eq!(action.details["tags"], serde_json::json!(true));
    }

    #[test]
    fn test_plan_ignores_unmanaged_tag_keys() {
        let mut old = fake("RTMP_PUSH", "a");
        old.tags.insert("env".into(), "prod".into());
        old.tags.insert("owner".into(), "alice".into());
        let mut new = old.clone();
        new.tags.insert("owner".into(), "bob".into());
        new.tags.insert("aws:cloudformation:stack-name".into(), "live".into());

        let ignore = IgnoreTags {
            keys: ["owner".to_string()].into(),
            key_prefixes: Vec::new(),
        };
        let action = plan_change("input", "main", Some(("1234", &old)), Some(&new), &ignore);
        assert_eq!(action.action_type, ActionType::NoOp);

        new.tags.insert("env".into(), "staging".into());
        let action = plan_change("input", "main", Some(("1234", &old)), Some(&new), &ignore);
        assert_eq!(action.action_type, ActionType::Update);
        assert_eq!(action.details["tags"], serde_json::json!(true));
    }

    #[test]
    fn test_plan_replace_on_immutable_change() {
        let old = fake("RTMP_PUSH", "a");
        let new = fake("UDP_PUSH", "b");

        let action = plan_change(
            "input",
            "main",
            Some(("1234", &old)),
            Some(&new),
            &IgnoreTags::default(),
        );
        assert_eq!(action.action_type, ActionType::Replace);
        assert_eq!(action.details["replace"], serde_json::json!(["kind"]));
    }

    #[test]
    fn test_plan_summary() {
        let a = fake("RTMP_PUSH", "a");
        let plan = Plan::new(vec![
            plan_change("input", "one", None, Some(&a), &IgnoreTags::default()),
            plan_change("input", "two", Some(("2", &a)), Some(&a), &IgnoreTags::default()),
        ]);

        assert!(plan.has_changes);
        let summary = plan.summary();
        assert_eq!(summary.create, 1);
        assert_eq!(summary.no_change, 1);
        assert_eq!(
            summary.to_string(),
            "1 to create, 0 to update, 0 to replace, 0 to delete, 1 unchanged"
        );
    }
}
