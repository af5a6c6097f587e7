//! `kuke`: CLI entrypoint. Resolves configuration, wires the four
//! adapters into a [`kuke_core::Controller`], parses the invoked
//! subcommand, and renders the returned report — mirroring the
//! teacher's `src/server.rs` startup shape (`set_logging_verbosity`
//! then hand off to the long-lived component) but for a short-lived,
//! per-invocation CLI instead of a server.

mod command;
mod config;
mod manifest;
mod report;

use std::env;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use log::debug;

use kuke_cgroup::CgroupAdapter;
use kuke_cni::CniManager;
use kuke_core::{dispatcher, Action, Controller};
use kuke_daemon::{DaemonAdapter, GrpcDaemonClient};

use command::{Command, DeleteArgs, Entity, KillArgs, KillEntity};
use config::Config;
use report::OutputFormat;

#[derive(Debug, Parser)]
#[command(name = "kuke", about = "Hierarchical container runtime CLI", version)]
struct Cli {
    #[command(flatten)]
    config: Config,

    #[arg(long, value_enum, default_value = "text", global = true)]
    output: OutputFormat,

    #[command(subcommand)]
    command: Command,
}

fn set_logging_verbosity(config: &Config) -> Result<()> {
    let level = config.log_level_filter();
    env::set_var("RUST_LOG", format!("kuke={level}"));
    env_logger::builder().filter_level(level).try_init().context("init env logger")
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    set_logging_verbosity(&cli.config).ok();

    let cgroup = CgroupAdapter::new();
    let cni = CniManager::new(
        cli.config.cni_bin_dir.clone(),
        cli.config.cni_conf_dir.clone(),
        cli.config.cni_cache_dir.clone(),
    );
    let client = GrpcDaemonClient::connect(&cli.config.daemon_socket)
        .await
        .context("connect to container daemon")?;
    let daemon = DaemonAdapter::new(client);
    let controller = Controller::new(cli.config.run_path.clone(), cgroup, cni, daemon);

    debug!("dispatching {:?}", cli.command);

    match cli.command {
        Command::Init { realm, space } => {
            let realm = realm.unwrap_or_else(|| cli.config.init_realm.clone());
            let space = space.unwrap_or_else(|| cli.config.init_space.clone());
            let result = controller.bootstrap(&realm, &space).await?;
            println!("{}", report::render_bootstrap(&result, cli.output)?);
            Ok(ExitCode::SUCCESS)
        }

        Command::Apply(args) => {
            let content = manifest::read_source(&args.file)?;
            let docs = manifest::parse_documents(&content)?;
            let result = dispatcher::apply_documents(&controller, docs).await;
            println!("{}", report::render_dispatch(&result, cli.output)?);
            Ok(exit_for(result.failed()))
        }

        Command::Delete(args) => delete(&controller, args, cli.output).await,

        Command::Kill(args) => kill(&controller, args, cli.output).await,
    }
}

async fn delete(controller: &Controller<GrpcDaemonClient>, args: DeleteArgs, output: OutputFormat) -> Result<ExitCode> {
    if let Some(file) = &args.file {
        let content = manifest::read_source(file)?;
        let docs = manifest::parse_documents(&content)?;
        let result = dispatcher::delete_documents(controller, docs, args.force, args.cascade).await;
        println!("{}", report::render_dispatch(&result, output)?);
        return Ok(exit_for(result.failed()));
    }

    let entity = args.entity.context("an entity kind is required without --file")?;
    let name = args.name.context("a name is required without --file")?;

    let result = match entity {
        Entity::Realm => controller.delete_realm(&name, args.force, args.cascade).await,
        Entity::Space => {
            let realm = args.realm.context("--realm is required to delete a space")?;
            controller.delete_space(&realm, &name, args.force, args.cascade).await
        }
        Entity::Stack => {
            let realm = args.realm.context("--realm is required to delete a stack")?;
            let space = args.space.context("--space is required to delete a stack")?;
            controller.delete_stack(&realm, &space, &name, args.force, args.cascade).await
        }
        Entity::Cell => {
            let realm = args.realm.context("--realm is required to delete a cell")?;
            let space = args.space.context("--space is required to delete a cell")?;
            let stack = args.stack.context("--stack is required to delete a cell")?;
            controller
                .delete_cell(&realm, &space, &stack, &name, args.force, args.cascade)
                .await
        }
        Entity::Container => {
            let realm = args.realm.context("--realm is required to delete a container")?;
            let space = args.space.context("--space is required to delete a container")?;
            let stack = args.stack.context("--stack is required to delete a container")?;
            let cell = args.cell.context("--cell is required to delete a container")?;
            controller.delete_container(&realm, &space, &stack, &cell, &name, args.force).await
        }
    };

    println!("{}", report::render_delete(&result, output)?);
    Ok(exit_for(result.action == Action::Failed))
}

async fn kill(controller: &Controller<GrpcDaemonClient>, args: KillArgs, output: OutputFormat) -> Result<ExitCode> {
    let result = match args.entity {
        KillEntity::Container => {
            let realm = args.realm.context("--realm is required to kill a container")?;
            let space = args.space.context("--space is required to kill a container")?;
            let stack = args.stack.context("--stack is required to kill a container")?;
            let cell = args.cell.context("--cell is required to kill a container")?;
            controller.kill_container(&realm, &space, &stack, &cell, &args.name, args.force).await
        }
        KillEntity::Cell => {
            let realm = args.realm.context("--realm is required to kill a cell")?;
            let space = args.space.context("--space is required to kill a cell")?;
            let stack = args.stack.context("--stack is required to kill a cell")?;
            controller.kill_cell(&realm, &space, &stack, &args.name, args.force).await
        }
    };

    println!("{}", report::render_kill(&result, output)?);
    Ok(exit_for(result.action == Action::Failed))
}

fn exit_for(failed: bool) -> ExitCode {
    if failed {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}
