//! Entity data model: the `{apiVersion, kind, metadata, spec}` document
//! envelope and the per-kind spec shapes persisted under the run-path
//! tree, mirroring the `SandboxConfig` builder-with-getset shape of the
//! teacher's sandbox crate but as plain serde structs (these are wire
//! documents, not live adapter handles).

use std::collections::HashMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use kuke_cgroup::{CgroupSpec, CpuSpec, IoSpec, MemorySpec};

pub use kuke_metadata::DEFAULT_API_VERSION as API_VERSION;

/// Identifies one entity within the realm/space/stack/cell hierarchy.
/// Only the fields relevant to a given `kind` are populated by callers —
/// a `Realm` document leaves all four `None`, a `Container` document
/// populates all four.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Metadata {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub realm: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub space: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stack: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cell: Option<String>,
}

impl Metadata {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }
}

/// The `{apiVersion, kind, metadata, spec}` envelope every persisted
/// entity and every `apply`/`delete -f` input document shares.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document<S> {
    #[serde(rename = "apiVersion", default)]
    pub api_version: String,
    pub kind: String,
    pub metadata: Metadata,
    pub spec: S,
}

impl<S> Document<S> {
    pub fn new(kind: impl Into<String>, metadata: Metadata, spec: S) -> Self {
        Self {
            api_version: API_VERSION.to_string(),
            kind: kind.into(),
            metadata,
            spec,
        }
    }
}

/// A registry credential entry, named explicitly by spec.md §3.1 but not
/// given a shape there.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct RegistryCredential {
    pub username: String,
    pub password: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub server: Option<String>,
}

impl From<RegistryCredential> for kuke_daemon::RegistryCredential {
    fn from(c: RegistryCredential) -> Self {
        kuke_daemon::RegistryCredential {
            username: c.username,
            password: c.password,
            server: c.server,
        }
    }
}

/// The namespace-path record recorded on a cell and consumed by
/// container creation and `join_container_namespaces`. `pid` is always
/// `None` as produced by the controller (PID namespace is left
/// independent), but the field exists so the record stays total over
/// all four namespace kinds.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NamespacePaths {
    pub net: Option<PathBuf>,
    pub ipc: Option<PathBuf>,
    pub uts: Option<PathBuf>,
    pub pid: Option<PathBuf>,
}

impl From<NamespacePaths> for kuke_daemon::NamespacePaths {
    fn from(p: NamespacePaths) -> Self {
        kuke_daemon::NamespacePaths {
            net: p.net,
            ipc: p.ipc,
            uts: p.uts,
            pid: p.pid,
        }
    }
}

/// Optional cgroup resource knobs attachable to a Space/Stack/Cell/
/// Container spec.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResourceSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cpu: Option<CpuSpec>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub memory: Option<MemorySpec>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub io: Option<IoSpec>,
}

impl ResourceSpec {
    pub fn to_cgroup_spec(&self) -> CgroupSpec {
        CgroupSpec {
            cpu: self.cpu.clone(),
            memory: self.memory.clone(),
            io: self.io.clone(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RealmSpec {
    /// Daemon namespace name; defaults to the realm's own `metadata.name`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
    #[serde(default)]
    pub registry_credentials: Vec<RegistryCredential>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resources: Option<ResourceSpec>,
}

impl RealmSpec {
    pub fn namespace_name<'a>(&'a self, realm_name: &'a str) -> &'a str {
        self.namespace.as_deref().unwrap_or(realm_name)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SpaceSpec {
    /// CNI network name; defaults to the space's own `metadata.name`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub network_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bridge_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subnet_cidr: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resources: Option<ResourceSpec>,
}

impl SpaceSpec {
    pub fn network_name<'a>(&'a self, space_name: &'a str) -> &'a str {
        self.network_name.as_deref().unwrap_or(space_name)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StackSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resources: Option<ResourceSpec>,
}

/// Shared shape for both the cell's root/pause container and an
/// ordinary workload container — the entity table gives them identical
/// spec essentials.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ContainerTemplate {
    pub image: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub command: Option<String>,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default)]
    pub env: Vec<String>,
    #[serde(default)]
    pub privileged: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cni_config_path: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resources: Option<ResourceSpec>,
}

pub type ContainerSpec = ContainerTemplate;

/// Well-known image for the cell's pause/root container — a long-lived
/// process solely holding a namespace set for workload containers to
/// join.
pub const DEFAULT_ROOT_IMAGE: &str = "registry.k8s.io/pause:3.9";

pub fn default_root_template() -> ContainerTemplate {
    ContainerTemplate {
        image: DEFAULT_ROOT_IMAGE.to_string(),
        ..Default::default()
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CellSpec {
    #[serde(default = "default_root_template")]
    pub root: ContainerTemplate,
    #[serde(default)]
    pub namespace_paths: NamespacePaths,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub root_pid: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resources: Option<ResourceSpec>,
}

/// Daemon-side id of a cell's pause/root container:
/// `<realm>-<space>-<stack>-<cell>-root`.
pub fn root_container_id(realm: &str, space: &str, stack: &str, cell: &str) -> String {
    format!("{realm}-{space}-{stack}-{cell}-root")
}

/// Daemon-side id of a workload container:
/// `<realm>-<space>-<stack>-<cell>-<name>`.
pub fn container_daemon_id(realm: &str, space: &str, stack: &str, cell: &str, name: &str) -> String {
    format!("{realm}-{space}-{stack}-{cell}-{name}")
}

/// Labels every entity's on-disk metadata keys down to for cascade
/// enumeration and report rendering — not persisted itself.
pub type Details = HashMap<String, String>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn realm_namespace_defaults_to_entity_name() {
        let spec = RealmSpec::default();
        assert_eq!(spec.namespace_name("main"), "main");

        let spec = RealmSpec {
            namespace: Some("custom-ns".into()),
            ..Default::default()
        };
        assert_eq!(spec.namespace_name("main"), "custom-ns");
    }

    #[test]
    fn space_network_name_defaults_to_entity_name() {
        let spec = SpaceSpec::default();
        assert_eq!(spec.network_name("default"), "default");
    }

    #[test]
    fn document_round_trips_through_json() {
        let doc = Document::new("Realm", Metadata::named("main"), RealmSpec::default());
        let json = serde_json::to_string(&doc).unwrap();
        let decoded: Document<RealmSpec> = serde_json::from_str(&json).unwrap();
        assert_eq!(decoded.metadata.name, "main");
        assert_eq!(decoded.api_version, API_VERSION);
    }

    #[test]
    fn cell_spec_defaults_root_to_pause_image() {
        let spec: CellSpec = serde_json::from_str("{}").unwrap();
        assert_eq!(spec.root.image, DEFAULT_ROOT_IMAGE);
    }
}
