//! Subcommand surface: `init`, `apply -f`, `delete -f`/`delete <entity>
//! <name>`, `kill {cell|container}` from spec.md §6.5.

use clap::{Args, Subcommand, ValueEnum};

#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Bootstrap the run-path tree, cgroup root, CNI directories, and a
    /// realm/space/stack/cell, creating only what is missing.
    Init {
        /// Realm to bootstrap; defaults to `--init-realm`.
        realm: Option<String>,
        /// Space to bootstrap; defaults to `--init-space`.
        space: Option<String>,
    },
    /// Apply one or more documents (`-f file`, or `-f -` for stdin).
    Apply(FileArgs),
    /// Delete a single entity, or a batch from a document file.
    Delete(DeleteArgs),
    /// Send a graceful-then-force stop signal without deleting anything.
    Kill(KillArgs),
}

#[derive(Debug, Clone, Args)]
pub struct FileArgs {
    #[arg(short = 'f', long = "file")]
    pub file: String,
}

#[derive(Debug, Clone, Copy, ValueEnum, PartialEq, Eq)]
pub enum Entity {
    Realm,
    Space,
    Stack,
    Cell,
    Container,
}

#[derive(Debug, Clone, Copy, ValueEnum, PartialEq, Eq)]
pub enum KillEntity {
    Cell,
    Container,
}

#[derive(Debug, Clone, Args)]
pub struct DeleteArgs {
    /// Batch-delete every document in this file instead of a single entity.
    #[arg(short = 'f', long = "file", conflicts_with_all = ["entity", "name"])]
    pub file: Option<String>,

    #[arg(required_unless_present = "file")]
    pub entity: Option<Entity>,
    #[arg(required_unless_present = "file")]
    pub name: Option<String>,

    #[arg(long)]
    pub realm: Option<String>,
    #[arg(long)]
    pub space: Option<String>,
    #[arg(long)]
    pub stack: Option<String>,
    #[arg(long)]
    pub cell: Option<String>,

    #[arg(long)]
    pub force: bool,
    #[arg(long)]
    pub cascade: bool,
}

#[derive(Debug, Clone, Args)]
pub struct KillArgs {
    pub entity: KillEntity,
    pub name: String,

    #[arg(long)]
    pub realm: Option<String>,
    #[arg(long)]
    pub space: Option<String>,
    #[arg(long)]
    pub stack: Option<String>,
    #[arg(long)]
    pub cell: Option<String>,

    #[arg(long)]
    pub force: bool,
}
