//! `memory.{min,low,high,max,swap.max}` translation.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::fsutil::write_file_str;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MemorySpec {
    pub min: Option<i64>,
    pub low: Option<i64>,
    pub high: Option<i64>,
    pub max: Option<i64>,
    pub swap: Option<i64>,
}

pub fn apply(path: &Path, spec: &MemorySpec) -> Result<()> {
    if let Some(v) = spec.min {
        write_file_str(&path.join("memory.min"), &v.to_string())?;
    }
    if let Some(v) = spec.low {
        write_file_str(&path.join("memory.low"), &v.to_string())?;
    }
    if let Some(v) = spec.high {
        write_file_str(&path.join("memory.high"), &v.to_string())?;
    }
    if let Some(v) = spec.max {
        write_file_str(&path.join("memory.max"), &v.to_string())?;
    }
    if let Some(v) = spec.swap {
        write_file_str(&path.join("memory.swap.max"), &v.to_string())?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn only_set_knobs_are_written() {
        let dir = tempdir().unwrap();
        let spec = MemorySpec {
            max: Some(1 << 20),
            ..Default::default()
        };
        apply(dir.path(), &spec).unwrap();

        assert!(dir.path().join("memory.max").exists());
        assert!(!dir.path().join("memory.min").exists());
        assert!(!dir.path().join("memory.low").exists());
        assert!(!dir.path().join("memory.high").exists());
        assert!(!dir.path().join("memory.swap.max").exists());

        let content = std::fs::read_to_string(dir.path().join("memory.max")).unwrap();
        assert_eq!(content, (1 << 20).to_string());
    }
}
