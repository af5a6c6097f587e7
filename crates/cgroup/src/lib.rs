//! Cgroup v2 unified-hierarchy adapter.
//!
//! Manages a subtree of the cgroup v2 tree rooted at `/kukeon`, wrapping
//! mountpoint discovery, group-path construction, resource-knob
//! translation, and idempotent create/load/delete — grounded in
//! `containers-youki`'s `crates/libcgroups/src/v2` manager, adapted from a
//! full OCI-spec-driven controller framework down to the knob set this
//! runtime actually needs.

pub mod cpu;
pub mod error;
mod fsutil;
pub mod io;
pub mod memory;
pub mod util;

use std::{
    collections::HashMap,
    fs,
    os::unix::fs::PermissionsExt,
    path::{Path, PathBuf},
    sync::RwLock,
};

use log::{debug, warn};

pub use cpu::CpuSpec;
pub use error::{CgroupError, Result};
pub use io::{IoSpec, ThrottleEntry, ThrottleType};
pub use memory::MemorySpec;

pub const ROOT_GROUP: &str = "/kukeon";

/// Resource knobs for one cgroup. Any field left `None`/empty is left
/// untouched on disk rather than reset to a default.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CgroupSpec {
    pub cpu: Option<CpuSpec>,
    pub memory: Option<MemorySpec>,
    pub io: Option<IoSpec>,
}

impl CgroupSpec {
    pub fn validate(&self) -> Result<()> {
        if let Some(cpu) = &self.cpu {
            cpu::validate(cpu)?;
        }
        if let Some(io) = &self.io {
            io::validate(io)?;
        }
        Ok(())
    }
}

/// Point-in-time controller stats for a single cgroup.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CgroupMetrics {
    pub cpu_usage_usec: Option<u64>,
    pub memory_current: Option<u64>,
    pub pids_current: Option<u64>,
}

/// An opaque handle for a cgroup this process has created or loaded.
/// Memoised per-group-path so repeated create/load calls within one
/// invocation are cheap; dropped on delete.
#[derive(Debug, Clone)]
pub struct CgroupHandle {
    pub path: PathBuf,
}

/// The cgroup v2 adapter. One instance per process; the mountpoint is
/// discovered once and memoised process-wide (see [`util::discover_mountpoint`]),
/// while the handle cache is per-adapter-instance.
pub struct CgroupAdapter {
    mountpoint: PathBuf,
    cache: RwLock<HashMap<PathBuf, CgroupHandle>>,
}

impl Default for CgroupAdapter {
    fn default() -> Self {
        Self::new()
    }
}

impl CgroupAdapter {
    pub fn new() -> Self {
        Self {
            mountpoint: util::discover_mountpoint(),
            cache: RwLock::new(HashMap::new()),
        }
    }

    /// Build an adapter rooted at an explicit mountpoint instead of the
    /// discovered one — for tests exercising a fake cgroupfs tree.
    pub fn with_mountpoint(mountpoint: PathBuf) -> Self {
        Self {
            mountpoint,
            cache: RwLock::new(HashMap::new()),
        }
    }

    pub fn mountpoint(&self) -> &Path {
        &self.mountpoint
    }

    pub fn group_path(&self, group: &str) -> Result<PathBuf> {
        util::group_path(&self.mountpoint, group)
    }

    /// Ensure `group` exists, enabling controllers on every non-leaf
    /// ancestor under the mountpoint (`cgroup.subtree_control`), then
    /// apply `spec`'s resource knobs. Idempotent: returns `existed` so
    /// callers can report `created` correctly.
    pub fn create(&self, group: &str, spec: &CgroupSpec) -> Result<bool> {
        spec.validate()?;
        let path = self.group_path(group)?;
        let existed = path.is_dir();

        if !existed {
            self.create_with_subtree_control(&path)?;
        }

        if let Some(cpu) = &spec.cpu {
            cpu::apply(&path, cpu)?;
        }
        if let Some(memory) = &spec.memory {
            memory::apply(&path, memory)?;
        }
        if let Some(io) = &spec.io {
            io::apply(&path, io)?;
        }

        self.cache
            .write()
            .expect("cgroup cache lock poisoned")
            .insert(path.clone(), CgroupHandle { path: path.clone() });

        debug!("cgroup {:?} ready (existed={existed})", path);
        Ok(existed)
    }

    /// Walk from the mountpoint down to `path`, creating any missing
    /// directory component and enabling every available controller via
    /// `cgroup.subtree_control` on each non-leaf ancestor — mirrors
    /// `Manager::create_unified_cgroup` in `containers-youki`.
    fn create_with_subtree_control(&self, path: &Path) -> Result<()> {
        let rel = path
            .strip_prefix(&self.mountpoint)
            .unwrap_or(path)
            .to_path_buf();

        let controllers = available_controllers(&self.mountpoint);
        let mut current = self.mountpoint.clone();
        let mut components: Vec<_> = rel.components().collect();
        let last = components.pop();

        for component in components {
            current = current.join(component);
            ensure_dir(&current)?;
            enable_controllers(&current, &controllers)?;
        }
        if let Some(last) = last {
            current = current.join(last);
            ensure_dir(&current)?;
        }
        Ok(())
    }

    /// Succeeds only if both the directory and `cgroup.controllers` exist.
    pub fn load(&self, group: &str) -> Result<CgroupHandle> {
        let path = self.group_path(group)?;
        if !path.is_dir() || !path.join("cgroup.controllers").exists() {
            return Err(CgroupError::NotFound(path));
        }
        let handle = CgroupHandle { path: path.clone() };
        self.cache
            .write()
            .expect("cgroup cache lock poisoned")
            .insert(path, handle.clone());
        Ok(handle)
    }

    /// Idempotent: absence is success. Fails if processes are still
    /// attached to `cgroup.procs`.
    pub fn delete(&self, group: &str) -> Result<()> {
        let path = self.group_path(group)?;
        if !path.is_dir() {
            self.cache
                .write()
                .expect("cgroup cache lock poisoned")
                .remove(&path);
            return Ok(());
        }

        let procs_path = path.join("cgroup.procs");
        if let Ok(content) = fs::read_to_string(&procs_path) {
            if content.lines().any(|l| !l.trim().is_empty()) {
                warn!("refusing to delete {:?}: processes still attached", path);
                return Err(CgroupError::ProcessesAttached(path));
            }
        }

        fs::remove_dir(&path).map_err(|e| error::io_err(&path, e))?;
        self.cache
            .write()
            .expect("cgroup cache lock poisoned")
            .remove(&path);
        debug!("deleted cgroup {:?}", path);
        Ok(())
    }

    pub fn add_process(&self, group: &str, pid: i64) -> Result<()> {
        if pid <= 0 {
            return Err(CgroupError::InvalidPid(pid));
        }
        let path = self.group_path(group)?;
        fsutil::write_file_str(&path.join("cgroup.procs"), &pid.to_string())
    }

    pub fn metrics(&self, group: &str) -> Result<CgroupMetrics> {
        let path = self.group_path(group)?;
        let mut metrics = CgroupMetrics::default();

        if let Ok(stat) = fsutil::read_file_str(&path.join("cpu.stat")) {
            for line in stat.lines() {
                if let Some(v) = line.strip_prefix("usage_usec ") {
                    metrics.cpu_usage_usec = v.trim().parse().ok();
                }
            }
        }
        if let Ok(v) = fsutil::read_file_str(&path.join("memory.current")) {
            metrics.memory_current = v.trim().parse().ok();
        }
        if let Ok(v) = fsutil::read_file_str(&path.join("pids.current")) {
            metrics.pids_current = v.trim().parse().ok();
        }

        Ok(metrics)
    }

    /// Cache accessor, mainly for tests asserting the memoisation contract.
    pub fn cached(&self, group: &str) -> Option<CgroupHandle> {
        let path = self.group_path(group).ok()?;
        self.cache
            .read()
            .expect("cgroup cache lock poisoned")
            .get(&path)
            .cloned()
    }
}

fn ensure_dir(path: &Path) -> Result<()> {
    if !path.exists() {
        fs::create_dir(path).map_err(|e| error::io_err(path, e))?;
        let mut perms = fs::metadata(path)
            .map_err(|e| error::io_err(path, e))?
            .permissions();
        perms.set_mode(0o755);
        fs::set_permissions(path, perms).map_err(|e| error::io_err(path, e))?;
    }
    Ok(())
}

fn available_controllers(mountpoint: &Path) -> Vec<String> {
    fsutil::read_file_str(&mountpoint.join("cgroup.controllers"))
        .map(|s| s.split_whitespace().map(|c| c.to_string()).collect())
        .unwrap_or_default()
}

fn enable_controllers(path: &Path, controllers: &[String]) -> Result<()> {
    for controller in controllers {
        let entry = format!("+{controller}");
        // Best-effort: some controllers may already be enabled or
        // unavailable at this level; a write failure here should not
        // abort the whole create — the knob-apply step surfaces any
        // real problem.
        let _ = fsutil::write_file_str(&path.join("cgroup.subtree_control"), &entry);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::os::unix::fs::PermissionsExt as _;
    use tempfile::tempdir;

    fn adapter_at(mountpoint: &Path) -> CgroupAdapter {
        CgroupAdapter {
            mountpoint: mountpoint.to_path_buf(),
            cache: RwLock::new(HashMap::new()),
        }
    }

    fn fake_controllers(mountpoint: &Path) {
        fs::write(mountpoint.join("cgroup.controllers"), "cpu io memory pids\n").unwrap();
        fs::write(mountpoint.join("cgroup.subtree_control"), "").unwrap();
    }

    #[test]
    fn create_is_idempotent() {
        let dir = tempdir().unwrap();
        fake_controllers(dir.path());
        let adapter = adapter_at(dir.path());

        let existed_first = adapter.create("/kukeon/main", &CgroupSpec::default()).unwrap();
        assert!(!existed_first);

        let existed_second = adapter.create("/kukeon/main", &CgroupSpec::default()).unwrap();
        assert!(existed_second);
    }

    #[test]
    fn load_fails_without_controllers_file() {
        let dir = tempdir().unwrap();
        fake_controllers(dir.path());
        let adapter = adapter_at(dir.path());
        fs::create_dir_all(dir.path().join("kukeon/main")).unwrap();

        assert!(matches!(
            adapter.load("/kukeon/main"),
            Err(CgroupError::NotFound(_))
        ));
    }

    #[test]
    fn load_succeeds_with_controllers_file() {
        let dir = tempdir().unwrap();
        fake_controllers(dir.path());
        let adapter = adapter_at(dir.path());
        let group_dir = dir.path().join("kukeon/main");
        fs::create_dir_all(&group_dir).unwrap();
        fs::write(group_dir.join("cgroup.controllers"), "cpu").unwrap();

        let handle = adapter.load("/kukeon/main").unwrap();
        assert_eq!(handle.path, group_dir);
        assert!(adapter.cached("/kukeon/main").is_some());
    }

    #[test]
    fn delete_absent_is_success() {
        let dir = tempdir().unwrap();
        fake_controllers(dir.path());
        let adapter = adapter_at(dir.path());
        adapter.delete("/kukeon/does-not-exist").unwrap();
    }

    #[test]
    fn delete_fails_with_processes_attached() {
        let dir = tempdir().unwrap();
        fake_controllers(dir.path());
        let adapter = adapter_at(dir.path());
        let group_dir = dir.path().join("kukeon/main");
        fs::create_dir_all(&group_dir).unwrap();
        fs::write(group_dir.join("cgroup.procs"), "1234\n").unwrap();

        assert!(matches!(
            adapter.delete("/kukeon/main"),
            Err(CgroupError::ProcessesAttached(_))
        ));
    }

    #[test]
    fn delete_removes_empty_group() {
        let dir = tempdir().unwrap();
        fake_controllers(dir.path());
        let adapter = adapter_at(dir.path());
        let group_dir = dir.path().join("kukeon/main");
        fs::create_dir_all(&group_dir).unwrap();
        fs::write(group_dir.join("cgroup.procs"), "").unwrap();

        adapter.delete("/kukeon/main").unwrap();
        assert!(!group_dir.exists());
    }

    #[test]
    fn add_process_rejects_non_positive_pid() {
        let dir = tempdir().unwrap();
        fake_controllers(dir.path());
        let adapter = adapter_at(dir.path());
        assert!(matches!(
            adapter.add_process("/kukeon/main", 0),
            Err(CgroupError::InvalidPid(0))
        ));
        assert!(matches!(
            adapter.add_process("/kukeon/main", -5),
            Err(CgroupError::InvalidPid(-5))
        ));
    }

    #[test]
    fn created_directories_are_mode_0755() {
        let dir = tempdir().unwrap();
        fake_controllers(dir.path());
        let adapter = adapter_at(dir.path());
        adapter.create("/kukeon/main", &CgroupSpec::default()).unwrap();

        let meta = fs::metadata(dir.path().join("kukeon/main")).unwrap();
        assert_eq!(meta.permissions().mode() & 0o777, 0o755);
    }
}
