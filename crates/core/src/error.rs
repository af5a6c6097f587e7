//! Controller-level error taxonomy. Substrate-specific failures
//! (invalid cgroup knobs, a missing CNI network, a daemon task that
//! won't stop) already carry their own variants one layer down — this
//! enum adds only what the hierarchy and document-dispatch layers
//! themselves can get wrong.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ControllerError {
    #[error("metadata missing at {0}")]
    MetadataMissing(PathBuf),

    #[error("failed to compose container spec: {0}")]
    ConversionFailed(String),

    #[error("realm name is required")]
    RealmNameRequired,
    #[error("space name is required")]
    SpaceNameRequired,
    #[error("stack name is required")]
    StackNameRequired,
    #[error("cell name is required")]
    CellNameRequired,
    #[error("container name is required")]
    ContainerNameRequired,

    #[error("{0}; pass --cascade or --force to delete anyway")]
    ChildrenPresent(String),

    #[error("realm {0:?} not found")]
    RealmNotFound(String),
    #[error("space {0:?} not found")]
    SpaceNotFound(String),
    #[error("stack {0:?} not found")]
    StackNotFound(String),
    #[error("cell {0:?} not found")]
    CellNotFound(String),
    #[error("container {0:?} not found")]
    ContainerNotFound(String),

    #[error("no network configuration loaded for space {0:?}")]
    NetworkConfigNotLoaded(String),
    #[error("network {0:?} not found")]
    NetworkNotFound(String),

    #[error("no logger registered for this invocation")]
    LoggerNotFound,

    #[error("configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Metadata(#[from] kuke_metadata::MetadataError),
    #[error(transparent)]
    Cgroup(#[from] kuke_cgroup::CgroupError),
    #[error(transparent)]
    Cni(#[from] kuke_cni::CniError),
    #[error(transparent)]
    Daemon(#[from] kuke_daemon::DaemonError),
}

pub type Result<T> = std::result::Result<T, ControllerError>;
