//! Typed result records the controller returns from create and delete
//! operations, instead of a bare `Result<()>` — every outcome reports
//! which substrates existed, were created, or were torn down.

use std::collections::HashMap;

use serde::Serialize;

use crate::error::ControllerError;

/// Outcome of one substrate-affecting step within a create/delete/
/// dispatch operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    Created,
    Unchanged,
    Deleted,
    Stopped,
    NotFound,
    Failed,
}

/// Per-entity outcome of a bootstrap/create step: which substrates
/// already existed, and whether anything new was created.
#[derive(Debug, Clone, Default, Serialize)]
pub struct CreateResult {
    pub name: String,
    pub metadata_created: bool,
    pub cgroup_created: bool,
    /// Set for entities with an extra owned substrate: the realm's
    /// daemon namespace, the space's CNI network, the cell's pause
    /// container. `None` for stacks, which own no substrate beyond
    /// their cgroup and metadata.
    pub substrate_created: Option<bool>,
}

impl CreateResult {
    pub fn any_created(&self) -> bool {
        self.metadata_created || self.cgroup_created || self.substrate_created.unwrap_or(false)
    }
}

/// Outcome of `CreateContainer`.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ContainerResult {
    pub name: String,
    pub container_created: bool,
    pub task_started: bool,
    pub metadata_created: bool,
}

/// A single realm→space→stack→cell bootstrap pass.
#[derive(Debug, Clone, Serialize)]
pub struct BootstrapReport {
    pub realm: CreateResult,
    pub space: CreateResult,
    pub stack: CreateResult,
    pub cell: CreateResult,
}

impl BootstrapReport {
    pub fn any_created(&self) -> bool {
        self.realm.any_created() || self.space.any_created() || self.stack.any_created() || self.cell.any_created()
    }
}

/// Outcome of deleting one entity, possibly cascading into its
/// children.
#[derive(Debug, Clone, Serialize)]
pub struct DeleteResult {
    pub entity: String,
    pub name: String,
    pub action: Action,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub cascaded: Vec<DeleteResult>,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub details: HashMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Discriminant for `error`, e.g. `"ChildrenPresent"` — lets callers
    /// (and `--output json|yaml`) tell a children-present refusal apart
    /// from a substrate I/O failure without parsing `error`'s text.
    /// `None` for substrate failures, which have no single shared taxonomy
    /// across the cgroup/cni/daemon/metadata crates they originate from.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
}

impl DeleteResult {
    pub fn not_found(entity: &str, name: &str) -> Self {
        Self {
            entity: entity.to_string(),
            name: name.to_string(),
            action: Action::NotFound,
            cascaded: Vec::new(),
            details: HashMap::new(),
            error: None,
            kind: None,
        }
    }

    pub fn failed(entity: &str, name: &str, error: impl Into<String>) -> Self {
        Self {
            entity: entity.to_string(),
            name: name.to_string(),
            action: Action::Failed,
            cascaded: Vec::new(),
            details: HashMap::new(),
            error: Some(error.into()),
            kind: None,
        }
    }

    /// A delete refused because the entity still has children and neither
    /// `--cascade` nor `--force` was passed. Carries `kind: "ChildrenPresent"`
    /// so this is distinguishable from a substrate I/O failure.
    pub fn children_present(entity: &str, name: &str, child_count: usize, child_kind: &str) -> Self {
        let err = ControllerError::ChildrenPresent(format!(
            "{entity} {name:?} has {child_count} {child_kind}(s)"
        ));
        Self {
            entity: entity.to_string(),
            name: name.to_string(),
            action: Action::Failed,
            cascaded: Vec::new(),
            details: HashMap::new(),
            error: Some(err.to_string()),
            kind: Some("ChildrenPresent".to_string()),
        }
    }

    pub fn ok(entity: &str, name: &str) -> Self {
        Self {
            entity: entity.to_string(),
            name: name.to_string(),
            action: Action::Deleted,
            cascaded: Vec::new(),
            details: HashMap::new(),
            error: None,
            kind: None,
        }
    }

    /// Any failure in `cascaded` turns the parent's own successful
    /// action into `Failed` too, even though the parent's own substrate
    /// was torn down cleanly.
    pub fn fold_cascade(mut self) -> Self {
        if self.action != Action::Failed && self.cascaded.iter().any(|c| c.action == Action::Failed) {
            self.action = Action::Failed;
            self.error = Some("one or more child entities failed to delete".to_string());
        }
        self
    }
}

/// Outcome of `kill {cell|container}`: a graceful-then-force stop that
/// leaves the container/metadata in place, unlike delete.
#[derive(Debug, Clone, Serialize)]
pub struct KillResult {
    pub entity: String,
    pub name: String,
    pub action: Action,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl KillResult {
    pub fn not_found(entity: &str, name: &str) -> Self {
        Self {
            entity: entity.to_string(),
            name: name.to_string(),
            action: Action::NotFound,
            error: None,
        }
    }

    pub fn failed(entity: &str, name: &str, error: impl Into<String>) -> Self {
        Self {
            entity: entity.to_string(),
            name: name.to_string(),
            action: Action::Failed,
            error: Some(error.into()),
        }
    }

    pub fn ok(entity: &str, name: &str) -> Self {
        Self {
            entity: entity.to_string(),
            name: name.to_string(),
            action: Action::Stopped,
            error: None,
        }
    }
}

/// One document's outcome within a batch `apply`/`delete -f` dispatch.
#[derive(Debug, Clone, Serialize)]
pub struct DocumentResult {
    pub index: usize,
    pub kind: String,
    pub name: String,
    pub action: Action,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub cascaded: Vec<DeleteResult>,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub details: HashMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Discriminant for `error`, mirroring `DeleteResult::kind` — e.g.
    /// `"ChildrenPresent"` for a refused cascade-less delete.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<String>,
}

/// The aggregate of a batch dispatch over several documents.
#[derive(Debug, Clone, Default, Serialize)]
pub struct DispatchResult {
    pub resources: Vec<DocumentResult>,
}

impl DispatchResult {
    pub fn failed(&self) -> bool {
        self.resources.iter().any(|r| r.action == Action::Failed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn child_failure_folds_into_parent_action() {
        let child = DeleteResult::failed("space", "default", "cgroup busy");
        let parent = DeleteResult {
            cascaded: vec![child],
            ..DeleteResult::ok("realm", "main")
        }
        .fold_cascade();

        assert_eq!(parent.action, Action::Failed);
        assert!(parent.error.is_some());
    }

    #[test]
    fn clean_cascade_keeps_parent_action_deleted() {
        let child = DeleteResult::ok("space", "default");
        let parent = DeleteResult {
            cascaded: vec![child],
            ..DeleteResult::ok("realm", "main")
        }
        .fold_cascade();

        assert_eq!(parent.action, Action::Deleted);
    }

    #[test]
    fn children_present_carries_its_kind_distinct_from_a_substrate_failure() {
        let refused = DeleteResult::children_present("space", "default", 2, "stack");
        assert_eq!(refused.action, Action::Failed);
        assert_eq!(refused.kind.as_deref(), Some("ChildrenPresent"));
        assert!(refused.error.as_deref().unwrap().contains("2 stack(s)"));

        let substrate_failure = DeleteResult::failed("space", "default", "cgroup busy");
        assert_eq!(substrate_failure.kind, None);
    }

    #[test]
    fn bootstrap_any_created_reflects_any_level() {
        let report = BootstrapReport {
            realm: CreateResult::default(),
            space: CreateResult {
                cgroup_created: true,
                ..Default::default()
            },
            stack: CreateResult::default(),
            cell: CreateResult::default(),
        };
        assert!(report.any_created());
    }
}
