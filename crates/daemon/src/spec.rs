//! OCI runtime-spec composition helpers — the spec-option functions the
//! rest of the adapter layers together before handing a container to the
//! daemon.

use std::collections::HashMap;

use kuke_common::{Namespace, NamespaceKind};
use oci_spec::runtime::{
    Capability, LinuxCapabilitiesBuilder, LinuxNamespaceBuilder, ProcessBuilder, Spec, SpecBuilder,
};

const DEFAULT_PATH: &str = "PATH=/usr/local/sbin:/usr/local/bin:/usr/sbin:/usr/bin:/sbin:/bin";
const ROOT_ARGS: &[&str] = &["sleep", "infinity"];

/// Every capability the OCI runtime spec knows about — granted in full to
/// a privileged container's bounding/effective/inheritable/permitted/
/// ambient sets, mirroring what `no_new_privileges: false` plus an
/// unrestricted capability set gives a privileged container elsewhere in
/// the ecosystem.
const ALL_CAPABILITIES: &[Capability] = &[
    Capability::AuditControl,
    Capability::AuditRead,
    Capability::AuditWrite,
    Capability::BlockSuspend,
    Capability::Bpf,
    Capability::CheckpointRestore,
    Capability::Chown,
    Capability::DacOverride,
    Capability::DacReadSearch,
    Capability::Fowner,
    Capability::Fsetid,
    Capability::IpcLock,
    Capability::IpcOwner,
    Capability::Kill,
    Capability::Lease,
    Capability::LinuxImmutable,
    Capability::MacAdmin,
    Capability::MacOverride,
    Capability::Mknod,
    Capability::NetAdmin,
    Capability::NetBindService,
    Capability::NetBroadcast,
    Capability::NetRaw,
    Capability::Perfmon,
    Capability::Setgid,
    Capability::Setfcap,
    Capability::Setpcap,
    Capability::Setuid,
    Capability::SysAdmin,
    Capability::SysBoot,
    Capability::SysChroot,
    Capability::SysModule,
    Capability::SysNice,
    Capability::SysPacct,
    Capability::SysPtrace,
    Capability::SysRawio,
    Capability::SysResource,
    Capability::SysTime,
    Capability::SysTtyConfig,
    Capability::Syslog,
    Capability::WakeAlarm,
];

/// Internal, already-validated description of a container to compose a
/// spec for (the controller's `ContainerSpec` reduced to what this layer
/// needs).
#[derive(Debug, Clone, Default)]
pub struct SpecInput {
    pub id: String,
    pub command: Option<String>,
    pub args: Vec<String>,
    pub env: Vec<String>,
    pub privileged: bool,
}

/// Paths recorded on a cell's pause container, reused by every workload
/// container created in that cell.
#[derive(Debug, Clone, Default)]
pub struct NamespacePaths {
    pub net: Option<std::path::PathBuf>,
    pub ipc: Option<std::path::PathBuf>,
    pub uts: Option<std::path::PathBuf>,
    pub pid: Option<std::path::PathBuf>,
}

/// Compose the OCI spec for a workload container.
pub fn build_container_spec(input: &SpecInput, labels: &HashMap<String, String>) -> anyhow::Result<Spec> {
    build_spec(input, labels, false)
}

/// Compose the OCI spec for the cell's pause/root container: no caller
/// command defaults to `sleep infinity`, labelled `container-type=root`.
pub fn build_root_container_spec(input: &SpecInput, labels: &HashMap<String, String>) -> anyhow::Result<Spec> {
    build_spec(input, labels, true)
}

fn build_spec(input: &SpecInput, _labels: &HashMap<String, String>, is_root: bool) -> anyhow::Result<Spec> {
    let args = if let Some(command) = &input.command {
        let mut v = vec![command.clone()];
        v.extend(input.args.clone());
        v
    } else if !input.args.is_empty() {
        input.args.clone()
    } else if is_root {
        ROOT_ARGS.iter().map(|s| s.to_string()).collect()
    } else {
        vec![]
    };

    let mut env = vec![DEFAULT_PATH.to_string()];
    env.extend(input.env.clone());

    let mut process_builder = ProcessBuilder::default().args(args).env(env).cwd("/").terminal(false);

    if input.privileged {
        let caps: std::collections::HashSet<Capability> = ALL_CAPABILITIES.iter().copied().collect();
        let capabilities = LinuxCapabilitiesBuilder::default()
            .bounding(caps.clone())
            .effective(caps.clone())
            .inheritable(caps.clone())
            .permitted(caps.clone())
            .ambient(caps)
            .build()?;
        process_builder = process_builder.no_new_privileges(false).capabilities(capabilities);
    }

    let process = process_builder.build()?;

    let spec = SpecBuilder::default()
        .hostname(input.id.clone())
        .process(process)
        .build()?;

    Ok(spec)
}

/// Append an `io.kukeon.cni.config=<path>` annotation to a composed spec.
pub fn with_cni_annotation(mut spec: Spec, cni_config_path: &std::path::Path) -> Spec {
    let mut annotations = spec.annotations().clone().unwrap_or_default();
    annotations.insert(
        crate::model::CNI_CONFIG_ANNOTATION.to_string(),
        cni_config_path.to_string_lossy().to_string(),
    );
    spec.set_annotations(Some(annotations));
    spec
}

/// Set or replace the `path` field of every Linux namespace entry in
/// `spec.linux.namespaces` matching one of `paths`'s populated kinds,
/// appending an entry for any kind absent from the existing spec.
pub fn join_container_namespaces(mut spec: Spec, paths: &NamespacePaths) -> anyhow::Result<Spec> {
    let mut wanted = Vec::new();
    if let Some(p) = &paths.net {
        wanted.push(Namespace {
            kind: NamespaceKind::Net,
            path: p.clone(),
        });
    }
    if let Some(p) = &paths.ipc {
        wanted.push(Namespace {
            kind: NamespaceKind::Ipc,
            path: p.clone(),
        });
    }
    if let Some(p) = &paths.uts {
        wanted.push(Namespace {
            kind: NamespaceKind::Uts,
            path: p.clone(),
        });
    }
    if let Some(p) = &paths.pid {
        wanted.push(Namespace {
            kind: NamespaceKind::Pid,
            path: p.clone(),
        });
    }

    let mut linux = spec.linux().clone().unwrap_or_default();
    let mut namespaces = linux.namespaces().clone().unwrap_or_default();

    for ns in &wanted {
        let oci_type = ns.kind.oci_type();
        if let Some(existing) = namespaces
            .iter_mut()
            .find(|n| format!("{:?}", n.typ()).to_lowercase() == oci_type)
        {
            existing.set_path(Some(ns.path.clone()));
        } else {
            let entry = LinuxNamespaceBuilder::default()
                .typ(linux_namespace_type(ns.kind))
                .path(ns.path.clone())
                .build()?;
            namespaces.push(entry);
        }
    }

    linux.set_namespaces(Some(namespaces));
    spec.set_linux(Some(linux));
    Ok(spec)
}

fn linux_namespace_type(kind: NamespaceKind) -> oci_spec::runtime::LinuxNamespaceType {
    use oci_spec::runtime::LinuxNamespaceType;
    match kind {
        NamespaceKind::Net => LinuxNamespaceType::Network,
        NamespaceKind::Ipc => LinuxNamespaceType::Ipc,
        NamespaceKind::Uts => LinuxNamespaceType::Uts,
        NamespaceKind::Pid => LinuxNamespaceType::Pid,
    }
}

/// Normalize a user-supplied image reference the way the daemon's image
/// store expects:
/// - already containing `://` → unchanged (a fully qualified URL-style ref).
/// - first path segment looks like a registry (`.` or `:`) → unchanged.
/// - single-segment ref (no `/`) → `docker.io/library/<ref>`, tag defaults to `:latest`.
/// - otherwise → prefixed with `docker.io/`.
pub fn normalize_image_reference(reference: &str) -> String {
    if reference.contains("://") {
        return reference.to_string();
    }

    let first_segment = reference.split('/').next().unwrap_or(reference);
    if first_segment.contains('.') || first_segment.contains(':') {
        return reference.to_string();
    }

    if !reference.contains('/') {
        let with_tag = if reference.contains(':') {
            reference.to_string()
        } else {
            format!("{reference}:latest")
        };
        return format!("docker.io/library/{with_tag}");
    }

    format!("docker.io/{reference}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_leaves_url_style_refs_alone() {
        assert_eq!(
            normalize_image_reference("oci://registry.example.com/foo"),
            "oci://registry.example.com/foo"
        );
    }

    #[test]
    fn normalize_leaves_registry_qualified_refs_alone() {
        assert_eq!(
            normalize_image_reference("registry.example.com/foo:latest"),
            "registry.example.com/foo:latest"
        );
        assert_eq!(normalize_image_reference("localhost:5000/foo"), "localhost:5000/foo");
    }

    #[test]
    fn normalize_adds_library_prefix_and_tag_for_single_segment() {
        assert_eq!(normalize_image_reference("alpine"), "docker.io/library/alpine:latest");
        assert_eq!(
            normalize_image_reference("alpine:3.18"),
            "docker.io/library/alpine:3.18"
        );
    }

    #[test]
    fn normalize_adds_docker_io_prefix_for_multi_segment() {
        assert_eq!(normalize_image_reference("library/alpine"), "docker.io/library/alpine");
    }

    #[test]
    fn root_spec_defaults_to_sleep_infinity() {
        let spec = build_root_container_spec(
            &SpecInput {
                id: "pause".into(),
                ..Default::default()
            },
            &HashMap::new(),
        )
        .unwrap();
        let args = spec.process().as_ref().unwrap().args().clone().unwrap();
        assert_eq!(args, vec!["sleep".to_string(), "infinity".to_string()]);
    }

    #[test]
    fn workload_spec_uses_command_and_args() {
        let spec = build_container_spec(
            &SpecInput {
                id: "work".into(),
                command: Some("/bin/echo".into()),
                args: vec!["hi".into()],
                ..Default::default()
            },
            &HashMap::new(),
        )
        .unwrap();
        let args = spec.process().as_ref().unwrap().args().clone().unwrap();
        assert_eq!(args, vec!["/bin/echo".to_string(), "hi".to_string()]);
    }

    #[test]
    fn privileged_spec_grants_full_capabilities_and_no_new_privileges_false() {
        let spec = build_container_spec(
            &SpecInput {
                id: "work".into(),
                privileged: true,
                ..Default::default()
            },
            &HashMap::new(),
        )
        .unwrap();
        let process = spec.process().as_ref().unwrap();
        assert_eq!(process.no_new_privileges(), Some(false));
        let caps = process.capabilities().as_ref().unwrap();
        assert_eq!(caps.bounding().as_ref().unwrap().len(), ALL_CAPABILITIES.len());
        assert!(caps.bounding().as_ref().unwrap().contains(&Capability::SysAdmin));
    }

    #[test]
    fn unprivileged_spec_carries_no_capabilities() {
        let spec = build_container_spec(
            &SpecInput {
                id: "work".into(),
                ..Default::default()
            },
            &HashMap::new(),
        )
        .unwrap();
        assert!(spec.process().as_ref().unwrap().capabilities().is_none());
    }

    #[test]
    fn join_namespaces_appends_missing_entries() {
        let spec = build_root_container_spec(
            &SpecInput {
                id: "pause".into(),
                ..Default::default()
            },
            &HashMap::new(),
        )
        .unwrap();

        let paths = NamespacePaths {
            net: Some("/proc/123/ns/net".into()),
            ipc: Some("/proc/123/ns/ipc".into()),
            uts: None,
            pid: None,
        };

        let joined = join_container_namespaces(spec, &paths).unwrap();
        let namespaces = joined.linux().as_ref().unwrap().namespaces().clone().unwrap();
        assert!(namespaces.iter().any(|n| n.path().as_ref().map(|p| p.to_str().unwrap()) == Some("/proc/123/ns/net")));
    }
}
