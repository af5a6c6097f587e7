use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum CgroupError {
    #[error("group path must not be empty")]
    EmptyGroupPath,
    #[error("group path {0:?} must start with '/'")]
    InvalidGroupPath(String),
    #[error("cpu weight {0} out of range [1,10000]")]
    InvalidCpuWeight(u64),
    #[error("io weight {0} out of range [1,1000]")]
    InvalidIoWeight(u64),
    #[error("invalid throttle entry: {0}")]
    InvalidThrottle(String),
    #[error("invalid pid {0}")]
    InvalidPid(i64),
    #[error("cgroup {0} not found")]
    NotFound(PathBuf),
    #[error("processes still attached to {0}")]
    ProcessesAttached(PathBuf),
    #[error("io error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

pub type Result<T> = std::result::Result<T, CgroupError>;

pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> CgroupError {
    CgroupError::Io {
        path: path.into(),
        source,
    }
}
