//! Small types shared across the `kuke` workspace.

use std::path::PathBuf;

/// The four OCI runtime namespace kinds the hierarchical controller cares
/// about. PID is intentionally excluded from cross-container sharing (see
/// the cell invariant in the hierarchical controller), but is still a
/// first-class kind here so `NamespacePaths` stays total over it.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum NamespaceKind {
    Net,
    Ipc,
    Uts,
    Pid,
}

impl NamespaceKind {
    /// The OCI runtime spec string used in `spec.linux.namespaces[].typ`.
    pub fn oci_type(self) -> &'static str {
        match self {
            NamespaceKind::Net => "network",
            NamespaceKind::Ipc => "ipc",
            NamespaceKind::Uts => "uts",
            NamespaceKind::Pid => "pid",
        }
    }
}

/// A namespace handle: which kind, and the `/proc/<pid>/ns/<kind>` (or
/// similar) path backing it.
#[derive(Clone, Debug)]
pub struct Namespace {
    pub kind: NamespaceKind,
    pub path: PathBuf,
}

/// Flatten an [`anyhow::Error`]'s cause chain into a single colon-joined
/// string, e.g. for inclusion in a report record.
pub fn chain(err: &anyhow::Error) -> String {
    err.chain()
        .map(|e| e.to_string())
        .collect::<Vec<_>>()
        .join(": ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;

    #[test]
    fn chain_joins_causes() {
        let first = anyhow!("error 1");
        let second = anyhow!("error 2");
        let res = chain(&first.context(second));
        assert_eq!(res, "error 2: error 1");
    }

    #[test]
    fn oci_type_mapping() {
        assert_eq!(NamespaceKind::Net.oci_type(), "network");
        assert_eq!(NamespaceKind::Pid.oci_type(), "pid");
    }
}
