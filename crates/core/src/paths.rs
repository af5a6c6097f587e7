//! Layout of the run-path tree and the matching cgroup v2 subtree —
//! one place both the controller and its tests can derive either from
//! realm/space/stack/cell/container names.

use std::path::{Path, PathBuf};

pub fn realm_dir(run_path: &Path, realm: &str) -> PathBuf {
    run_path.join(realm)
}

pub fn space_dir(run_path: &Path, realm: &str, space: &str) -> PathBuf {
    realm_dir(run_path, realm).join(space)
}

pub fn stack_dir(run_path: &Path, realm: &str, space: &str, stack: &str) -> PathBuf {
    space_dir(run_path, realm, space).join(stack)
}

pub fn cell_dir(run_path: &Path, realm: &str, space: &str, stack: &str, cell: &str) -> PathBuf {
    stack_dir(run_path, realm, space, stack).join(cell)
}

pub fn container_dir(
    run_path: &Path,
    realm: &str,
    space: &str,
    stack: &str,
    cell: &str,
    name: &str,
) -> PathBuf {
    cell_dir(run_path, realm, space, stack, cell).join("containers").join(name)
}

pub fn metadata_path(dir: &Path) -> PathBuf {
    dir.join("metadata.json")
}

pub fn realm_group(realm: &str) -> String {
    format!("{}/{realm}", kuke_cgroup::ROOT_GROUP)
}

pub fn space_group(realm: &str, space: &str) -> String {
    format!("{}/{space}", realm_group(realm))
}

pub fn stack_group(realm: &str, space: &str, stack: &str) -> String {
    format!("{}/{stack}", space_group(realm, space))
}

pub fn cell_group(realm: &str, space: &str, stack: &str, cell: &str) -> String {
    format!("{}/{cell}", stack_group(realm, space, stack))
}

/// List the immediate child directory names under `dir` that contain
/// their own `metadata.json` — i.e. the dir's persisted child entities.
pub fn child_entities(dir: &Path) -> Vec<String> {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return Vec::new();
    };
    let mut names: Vec<String> = entries
        .filter_map(|e| e.ok())
        .filter(|e| e.path().is_dir())
        .filter(|e| metadata_path(&e.path()).is_file())
        .filter_map(|e| e.file_name().into_string().ok())
        .collect();
    names.sort();
    names
}

/// List workload container names under a cell, skipping the reserved
/// `containers` directory layer.
pub fn child_containers(run_path: &Path, realm: &str, space: &str, stack: &str, cell: &str) -> Vec<String> {
    let containers_dir = cell_dir(run_path, realm, space, stack, cell).join("containers");
    child_entities(&containers_dir)
}
