//! Document dispatcher: routes a batch of `{apiVersion, kind, metadata,
//! spec}` documents (as read from an `apply -f`/`delete -f` manifest)
//! onto the matching `Controller` method and aggregates each outcome
//! into a single batch result, the way `kubectl apply -f` reports one
//! line per resource in a multi-document file.

use serde::{Deserialize, Serialize};

use kuke_daemon::DaemonClient;

use crate::controller::Controller;
use crate::error::{ControllerError, Result};
use crate::model::{CellSpec, ContainerTemplate, Document, RealmSpec, SpaceSpec, StackSpec};
use crate::result::{Action, CreateResult, DispatchResult, DocumentResult};

/// One parsed input document, tagged with the parent names its
/// `metadata` must carry for anything below `Realm`. The document
/// dispatcher is the only thing that needs this union — `Controller`'s
/// own methods stay generic over a single `Document<S>` each.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum Doc {
    Realm(Document<RealmSpec>),
    Space(Document<SpaceSpec>),
    Stack(Document<StackSpec>),
    Cell(Document<CellSpec>),
    Container(Document<ContainerTemplate>),
}

impl Doc {
    pub fn kind(&self) -> &'static str {
        match self {
            Doc::Realm(_) => "realm",
            Doc::Space(_) => "space",
            Doc::Stack(_) => "stack",
            Doc::Cell(_) => "cell",
            Doc::Container(_) => "container",
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Doc::Realm(d) => &d.metadata.name,
            Doc::Space(d) => &d.metadata.name,
            Doc::Stack(d) => &d.metadata.name,
            Doc::Cell(d) => &d.metadata.name,
            Doc::Container(d) => &d.metadata.name,
        }
    }

    fn realm(&self) -> Result<&str> {
        let realm = match self {
            Doc::Realm(d) => Some(d.metadata.name.as_str()),
            Doc::Space(d) => d.metadata.realm.as_deref(),
            Doc::Stack(d) => d.metadata.realm.as_deref(),
            Doc::Cell(d) => d.metadata.realm.as_deref(),
            Doc::Container(d) => d.metadata.realm.as_deref(),
        };
        realm.ok_or_else(|| ControllerError::RealmNameRequired)
    }

    fn space(&self) -> Result<&str> {
        let space = match self {
            Doc::Space(d) => Some(d.metadata.name.as_str()),
            Doc::Stack(d) => d.metadata.space.as_deref(),
            Doc::Cell(d) => d.metadata.space.as_deref(),
            Doc::Container(d) => d.metadata.space.as_deref(),
            Doc::Realm(_) => None,
        };
        space.ok_or_else(|| ControllerError::SpaceNameRequired)
    }

    fn stack(&self) -> Result<&str> {
        let stack = match self {
            Doc::Stack(d) => Some(d.metadata.name.as_str()),
            Doc::Cell(d) => d.metadata.stack.as_deref(),
            Doc::Container(d) => d.metadata.stack.as_deref(),
            Doc::Realm(_) | Doc::Space(_) => None,
        };
        stack.ok_or_else(|| ControllerError::StackNameRequired)
    }

    fn cell(&self) -> Result<&str> {
        let cell = match self {
            Doc::Cell(d) => Some(d.metadata.name.as_str()),
            Doc::Container(d) => d.metadata.cell.as_deref(),
            Doc::Realm(_) | Doc::Space(_) | Doc::Stack(_) => None,
        };
        cell.ok_or_else(|| ControllerError::CellNameRequired)
    }
}

fn created_action(r: &CreateResult) -> Action {
    if r.any_created() {
        Action::Created
    } else {
        Action::Unchanged
    }
}

/// Apply every document in order, routing each to the matching
/// `Controller::apply_*` method. A document that fails does not stop
/// the batch — its failure is recorded and the next document is still
/// attempted, mirroring `kubectl apply -f`'s per-resource reporting.
pub async fn apply_documents<C: DaemonClient>(controller: &Controller<C>, docs: Vec<Doc>) -> DispatchResult {
    let mut resources = Vec::with_capacity(docs.len());

    for (index, doc) in docs.into_iter().enumerate() {
        let kind = doc.kind().to_string();
        let name = doc.name().to_string();

        let outcome = apply_one(controller, &doc).await;
        resources.push(match outcome {
            Ok(result) => DocumentResult {
                index,
                kind,
                name,
                action: created_action(&result),
                cascaded: Vec::new(),
                details: Default::default(),
                error: None,
                error_kind: None,
            },
            Err(e) => DocumentResult {
                index,
                kind,
                name,
                action: Action::Failed,
                cascaded: Vec::new(),
                details: Default::default(),
                error: Some(e.to_string()),
                error_kind: None,
            },
        });
    }

    DispatchResult { resources }
}

async fn apply_one<C: DaemonClient>(controller: &Controller<C>, doc: &Doc) -> Result<CreateResult> {
    match doc {
        Doc::Realm(d) => controller.apply_realm(d.clone()).await,
        Doc::Space(d) => controller.apply_space(doc.realm()?, d.clone()).await,
        Doc::Stack(d) => controller.apply_stack(doc.realm()?, doc.space()?, d.clone()).await,
        Doc::Cell(d) => controller.apply_cell(doc.realm()?, doc.space()?, doc.stack()?, d.clone()).await,
        Doc::Container(d) => {
            let result = controller
                .apply_container(doc.realm()?, doc.space()?, doc.stack()?, doc.cell()?, d.clone())
                .await?;
            Ok(CreateResult {
                name: result.name,
                metadata_created: result.metadata_created,
                cgroup_created: false,
                substrate_created: Some(result.container_created),
            })
        }
    }
}

/// Delete every document in order, routing each to the matching
/// `Controller::delete_*` method by kind and hierarchy position.
pub async fn delete_documents<C: DaemonClient>(controller: &Controller<C>, docs: Vec<Doc>, force: bool, cascade: bool) -> DispatchResult {
    let mut resources = Vec::with_capacity(docs.len());

    for (index, doc) in docs.into_iter().enumerate() {
        let kind = doc.kind().to_string();
        let name = doc.name().to_string();

        let result = match delete_one(controller, &doc, force, cascade).await {
            Ok(r) => r,
            Err(e) => {
                resources.push(DocumentResult {
                    index,
                    kind,
                    name,
                    action: Action::Failed,
                    cascaded: Vec::new(),
                    details: Default::default(),
                    error: Some(e.to_string()),
                    error_kind: None,
                });
                continue;
            }
        };

        resources.push(DocumentResult {
            index,
            kind,
            name,
            action: result.action,
            cascaded: result.cascaded,
            details: result.details,
            error: result.error,
            error_kind: result.kind,
        });
    }

    DispatchResult { resources }
}

async fn delete_one<C: DaemonClient>(
    controller: &Controller<C>,
    doc: &Doc,
    force: bool,
    cascade: bool,
) -> Result<crate::result::DeleteResult> {
    Ok(match doc {
        Doc::Realm(_) => controller.delete_realm(doc.name(), force, cascade).await,
        Doc::Space(_) => controller.delete_space(doc.realm()?, doc.name(), force, cascade).await,
        Doc::Stack(_) => controller.delete_stack(doc.realm()?, doc.space()?, doc.name(), force, cascade).await,
        Doc::Cell(_) => {
            controller
                .delete_cell(doc.realm()?, doc.space()?, doc.stack()?, doc.name(), force, cascade)
                .await
        }
        Doc::Container(_) => {
            controller
                .delete_container(doc.realm()?, doc.space()?, doc.stack()?, doc.cell()?, doc.name(), force)
                .await
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Metadata;

    #[test]
    fn doc_kind_and_name_reflect_variant() {
        let doc = Doc::Realm(Document::new("Realm", Metadata::named("acme"), RealmSpec::default()));
        assert_eq!(doc.kind(), "realm");
        assert_eq!(doc.name(), "acme");
    }

    #[test]
    fn space_doc_requires_realm_in_metadata() {
        let doc = Doc::Space(Document::new("Space", Metadata::named("default"), SpaceSpec::default()));
        assert!(doc.realm().is_err());

        let doc = Doc::Space(Document::new(
            "Space",
            Metadata {
                name: "default".to_string(),
                realm: Some("acme".to_string()),
                ..Default::default()
            },
            SpaceSpec::default(),
        ));
        assert_eq!(doc.realm().unwrap(), "acme");
    }
}
