//! `cpu.weight`, `cpu.max` and `cpuset.{cpus,mems}` translation.
//!
//! The quota/period composition into `cpu.max` follows
//! `containers-youki`'s `crates/libcgroups/src/v2/cpu.rs`.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{CgroupError, Result};
use crate::fsutil::write_file_str;

const CGROUP_CPU_WEIGHT: &str = "cpu.weight";
const CGROUP_CPU_MAX: &str = "cpu.max";
const CGROUP_CPUSET_CPUS: &str = "cpuset.cpus";
const CGROUP_CPUSET_MEMS: &str = "cpuset.mems";
const UNRESTRICTED_QUOTA: &str = "max";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CpuSpec {
    pub weight: Option<u64>,
    pub quota: Option<i64>,
    pub period: Option<u64>,
    pub cpus: Option<String>,
    pub mems: Option<String>,
}

pub fn validate(spec: &CpuSpec) -> Result<()> {
    if let Some(weight) = spec.weight {
        if !(1..=10000).contains(&weight) {
            return Err(CgroupError::InvalidCpuWeight(weight));
        }
    }
    Ok(())
}

pub fn apply(path: &Path, spec: &CpuSpec) -> Result<()> {
    validate(spec)?;

    if let Some(weight) = spec.weight {
        write_file_str(&path.join(CGROUP_CPU_WEIGHT), &weight.to_string())?;
    }

    let cpu_max = match (spec.quota, spec.period) {
        (None, None) => None,
        (Some(quota), Some(period)) if quota >= 0 => Some(format!("{quota} {period}")),
        (Some(_), Some(period)) => Some(format!("{UNRESTRICTED_QUOTA} {period}")),
        (Some(quota), None) if quota >= 0 => Some(quota.to_string()),
        (Some(_), None) => Some(UNRESTRICTED_QUOTA.to_string()),
        (None, Some(period)) => Some(format!("{UNRESTRICTED_QUOTA} {period}")),
    };
    if let Some(cpu_max) = cpu_max {
        write_file_str(&path.join(CGROUP_CPU_MAX), &cpu_max)?;
    }

    if let Some(cpus) = &spec.cpus {
        write_file_str(&path.join(CGROUP_CPUSET_CPUS), cpus)?;
    }
    if let Some(mems) = &spec.mems {
        write_file_str(&path.join(CGROUP_CPUSET_MEMS), mems)?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn rejects_weight_zero() {
        let spec = CpuSpec {
            weight: Some(0),
            ..Default::default()
        };
        assert!(matches!(
            validate(&spec),
            Err(CgroupError::InvalidCpuWeight(0))
        ));
    }

    #[test]
    fn rejects_weight_over_max() {
        let spec = CpuSpec {
            weight: Some(10001),
            ..Default::default()
        };
        assert!(matches!(
            validate(&spec),
            Err(CgroupError::InvalidCpuWeight(10001))
        ));
    }

    #[test]
    fn positive_quota_and_period() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join(CGROUP_CPU_MAX), "").unwrap();
        let spec = CpuSpec {
            quota: Some(200000),
            period: Some(100000),
            ..Default::default()
        };
        apply(dir.path(), &spec).unwrap();
        let content = std::fs::read_to_string(dir.path().join(CGROUP_CPU_MAX)).unwrap();
        assert_eq!(content, "200000 100000");
    }

    #[test]
    fn negative_quota_is_unrestricted() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join(CGROUP_CPU_MAX), "").unwrap();
        let spec = CpuSpec {
            quota: Some(-1),
            period: Some(50000),
            ..Default::default()
        };
        apply(dir.path(), &spec).unwrap();
        let content = std::fs::read_to_string(dir.path().join(CGROUP_CPU_MAX)).unwrap();
        assert_eq!(content, "max 50000");
    }

    #[test]
    fn weight_is_written_verbatim() {
        let dir = tempdir().unwrap();
        let spec = CpuSpec {
            weight: Some(500),
            ..Default::default()
        };
        apply(dir.path(), &spec).unwrap();
        let content = std::fs::read_to_string(dir.path().join(CGROUP_CPU_WEIGHT)).unwrap();
        assert_eq!(content, "500");
    }
}
