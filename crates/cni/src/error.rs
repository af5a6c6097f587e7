use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum CniError {
    #[error("network {0:?} not found")]
    NetworkNotFound(String),
    #[error("network config for {0:?} not loaded")]
    ConfigNotLoaded(String),
    #[error("malformed CNI document: {0}")]
    Malformed(#[from] serde_json::Error),
    #[error("io error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("CNI plugin exec failed: {0}")]
    Exec(String),
}

pub type Result<T> = std::result::Result<T, CniError>;

pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> CniError {
    CniError::Io {
        path: path.into(),
        source,
    }
}
