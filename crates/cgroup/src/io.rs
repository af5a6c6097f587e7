//! `io.weight` and `io.max` (per-device throttle) translation.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{CgroupError, Result};
use crate::fsutil::write_file_str;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ThrottleType {
    Rbps,
    Wbps,
    Riops,
    Wiops,
}

impl ThrottleType {
    fn key(self) -> &'static str {
        match self {
            ThrottleType::Rbps => "rbps",
            ThrottleType::Wbps => "wbps",
            ThrottleType::Riops => "riops",
            ThrottleType::Wiops => "wiops",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThrottleEntry {
    pub typ: ThrottleType,
    pub major: u64,
    pub minor: u64,
    pub rate: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IoSpec {
    pub weight: Option<u64>,
    pub throttle: Vec<ThrottleEntry>,
}

pub fn validate(spec: &IoSpec) -> Result<()> {
    if let Some(weight) = spec.weight {
        if weight != 0 && !(1..=1000).contains(&weight) {
            return Err(CgroupError::InvalidIoWeight(weight));
        }
    }
    for entry in &spec.throttle {
        if entry.rate == 0 {
            return Err(CgroupError::InvalidThrottle(format!(
                "{}:{} {} rate must be > 0",
                entry.major,
                entry.minor,
                entry.typ.key()
            )));
        }
    }
    Ok(())
}

pub fn apply(path: &Path, spec: &IoSpec) -> Result<()> {
    validate(spec)?;

    if let Some(weight) = spec.weight {
        if weight != 0 {
            write_file_str(&path.join("io.weight"), &weight.to_string())?;
        }
    }

    for entry in &spec.throttle {
        let line = format!("{}:{} {}={}", entry.major, entry.minor, entry.typ.key(), entry.rate);
        write_file_str(&path.join("io.max"), &line)?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn rejects_weight_over_max() {
        let spec = IoSpec {
            weight: Some(1001),
            ..Default::default()
        };
        assert!(matches!(validate(&spec), Err(CgroupError::InvalidIoWeight(1001))));
    }

    #[test]
    fn zero_weight_is_not_written() {
        let dir = tempdir().unwrap();
        let spec = IoSpec {
            weight: Some(0),
            ..Default::default()
        };
        apply(dir.path(), &spec).unwrap();
        assert!(!dir.path().join("io.weight").exists());
    }

    #[test]
    fn rejects_zero_rate_throttle() {
        let spec = IoSpec {
            throttle: vec![ThrottleEntry {
                typ: ThrottleType::Rbps,
                major: 8,
                minor: 0,
                rate: 0,
            }],
            ..Default::default()
        };
        assert!(matches!(validate(&spec), Err(CgroupError::InvalidThrottle(_))));
    }

    #[test]
    fn throttle_line_format() {
        let dir = tempdir().unwrap();
        let spec = IoSpec {
            throttle: vec![ThrottleEntry {
                typ: ThrottleType::Wiops,
                major: 8,
                minor: 16,
                rate: 1000,
            }],
            ..Default::default()
        };
        apply(dir.path(), &spec).unwrap();
        let content = std::fs::read_to_string(dir.path().join("io.max")).unwrap();
        assert_eq!(content, "8:16 wiops=1000");
    }
}
