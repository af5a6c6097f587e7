//! `kuke-core`: the hierarchical realm/space/stack/cell/container
//! controller and the document dispatcher that drives it from `apply
//! -f`/`delete -f` manifests, tying together `kuke-cgroup`, `kuke-cni`,
//! `kuke-daemon`, and `kuke-metadata`.

pub mod controller;
pub mod dispatcher;
pub mod error;
pub mod model;
pub mod paths;
pub mod result;

pub use controller::{Controller, DEFAULT_CELL, DEFAULT_STACK};
pub use dispatcher::{apply_documents, delete_documents, Doc};
pub use error::{ControllerError, Result};
pub use model::{
    CellSpec, ContainerSpec, ContainerTemplate, Document, Metadata, NamespacePaths, RealmSpec, RegistryCredential, ResourceSpec,
    SpaceSpec, StackSpec,
};
pub use result::{Action, BootstrapReport, ContainerResult, CreateResult, DeleteResult, DispatchResult, DocumentResult, KillResult};
