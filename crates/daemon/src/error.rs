use thiserror::Error;

pub type Result<T> = std::result::Result<T, DaemonError>;

#[derive(Error, Debug)]
pub enum DaemonError {
    #[error("no active namespace set on the daemon adapter")]
    NoActiveNamespace,
    #[error("container {0:?} already exists")]
    ContainerExists(String),
    #[error("container {0:?} not found")]
    ContainerNotFound(String),
    #[error("task {0:?} not found")]
    TaskNotFound(String),
    #[error("task {0:?} is not running")]
    TaskNotRunning(String),
    #[error("invalid image reference {0:?}")]
    InvalidImage(String),
    #[error("timed out waiting for task {0:?} to stop")]
    StopTimeout(String),
    #[error("daemon rpc failed: {0}")]
    Rpc(String),
    #[error("not implemented: {0}")]
    Unimplemented(String),
    #[error("transport error: {0}")]
    Transport(#[from] tonic::transport::Error),
    #[error("uninitialized field: {0}")]
    Builder(#[from] derive_builder::UninitializedFieldError),
}

impl From<tonic::Status> for DaemonError {
    fn from(status: tonic::Status) -> Self {
        DaemonError::Rpc(status.message().to_string())
    }
}
