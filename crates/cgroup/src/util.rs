//! Cgroup v2 mountpoint discovery.
//!
//! Mirrors `containers-youki`'s `crates/libcgroups/src/v2/util.rs`
//! `get_unified_mount_point`, but additionally honours the spec's
//! `/proc/self/cgroup` hierarchy-0 check before falling back to
//! `/proc/self/mountinfo`, and falls back further to a compile-time
//! default instead of failing.

use std::{
    fs,
    path::{Path, PathBuf},
    sync::OnceLock,
};

pub const DEFAULT_MOUNTPOINT: &str = "/sys/fs/cgroup";

static MOUNTPOINT: OnceLock<PathBuf> = OnceLock::new();

/// Resolve the cgroup v2 unified mountpoint exactly once per process and
/// memoise the result. Subsequent calls are a lock-free read.
pub fn discover_mountpoint() -> PathBuf {
    MOUNTPOINT.get_or_init(resolve_mountpoint).clone()
}

fn resolve_mountpoint() -> PathBuf {
    if let Some(mp) = from_self_cgroup().or_else(from_mountinfo) {
        return mp;
    }
    PathBuf::from(DEFAULT_MOUNTPOINT)
}

/// Parse `/proc/self/cgroup`, accepting the first entry with hierarchy `0`
/// and empty controllers list (the unified-hierarchy line under cgroup
/// v2). The line format is `hierarchy-id:controllers:path`; on a pure
/// cgroup v2 host the controllers field is always empty.
fn from_self_cgroup() -> Option<PathBuf> {
    let content = fs::read_to_string("/proc/self/cgroup").ok()?;
    for line in content.lines() {
        let mut parts = line.splitn(3, ':');
        let hierarchy = parts.next()?;
        let controllers = parts.next()?;
        if hierarchy == "0" && controllers.is_empty() {
            return from_mountinfo();
        }
    }
    None
}

/// Parse `/proc/self/mountinfo`, accepting the first row whose filesystem
/// type (the field right after the `-` separator) is `cgroup2`, and
/// returning its mount point (field index 4).
fn from_mountinfo() -> Option<PathBuf> {
    let content = fs::read_to_string("/proc/self/mountinfo").ok()?;
    for line in content.lines() {
        let fields: Vec<&str> = line.split(' ').collect();
        let sep = fields.iter().position(|f| *f == "-")?;
        let fs_type = fields.get(sep + 1)?;
        if *fs_type == "cgroup2" {
            return fields.get(4).map(PathBuf::from);
        }
    }
    None
}

/// Join `mountpoint` with a validated absolute `group` path (must start
/// with `/`).
pub fn group_path(mountpoint: &Path, group: &str) -> crate::error::Result<PathBuf> {
    if group.is_empty() {
        return Err(crate::error::CgroupError::EmptyGroupPath);
    }
    if !group.starts_with('/') {
        return Err(crate::error::CgroupError::InvalidGroupPath(
            group.to_string(),
        ));
    }
    Ok(mountpoint.join(group.trim_start_matches('/')))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn group_path_rejects_empty() {
        let mp = PathBuf::from("/sys/fs/cgroup");
        assert!(matches!(
            group_path(&mp, ""),
            Err(crate::error::CgroupError::EmptyGroupPath)
        ));
    }

    #[test]
    fn group_path_rejects_relative() {
        let mp = PathBuf::from("/sys/fs/cgroup");
        assert!(matches!(
            group_path(&mp, "kukeon/main"),
            Err(crate::error::CgroupError::InvalidGroupPath(_))
        ));
    }

    #[test]
    fn group_path_joins_absolute() {
        let mp = PathBuf::from("/sys/fs/cgroup");
        let p = group_path(&mp, "/kukeon/main").unwrap();
        assert_eq!(p, PathBuf::from("/sys/fs/cgroup/kukeon/main"));
    }
}
