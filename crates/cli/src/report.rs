//! Thin result formatter: `Display`/`serde_json`/`serde_yaml` dump only,
//! no business logic — the boundary collaborator spec.md §2 calls out
//! as receiving the controller's report record.

use clap::ValueEnum;
use serde::Serialize;

use kuke_core::{Action, BootstrapReport, DeleteResult, DispatchResult, KillResult};

#[derive(Debug, Clone, Copy, ValueEnum, PartialEq, Eq, Default)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
    Yaml,
}

fn dump<T: Serialize>(value: &T, format: OutputFormat) -> anyhow::Result<String> {
    Ok(match format {
        OutputFormat::Json => serde_json::to_string_pretty(value)?,
        OutputFormat::Yaml => serde_yaml::to_string(value)?,
        OutputFormat::Text => unreachable!("text rendering handled by the caller"),
    })
}

pub fn render_bootstrap(report: &BootstrapReport, format: OutputFormat) -> anyhow::Result<String> {
    if matches!(format, OutputFormat::Text) {
        let header = if report.any_created() {
            "Initialized Kukeon runtime"
        } else {
            "Kukeon runtime already initialized"
        };
        return Ok(format!(
            "{header}\n  realm:  {}\n  space:  {}\n  stack:  {}\n  cell:   {}",
            summarize_create(&report.realm.name, report.realm.any_created()),
            summarize_create(&report.space.name, report.space.any_created()),
            summarize_create(&report.stack.name, report.stack.any_created()),
            summarize_create(&report.cell.name, report.cell.any_created()),
        ));
    }
    dump(report, format)
}

fn summarize_create(name: &str, created: bool) -> String {
    format!("{name} ({})", if created { "created" } else { "unchanged" })
}

pub fn render_delete(result: &DeleteResult, format: OutputFormat) -> anyhow::Result<String> {
    if matches!(format, OutputFormat::Text) {
        return Ok(render_delete_line(result, 0));
    }
    dump(result, format)
}

fn render_delete_line(result: &DeleteResult, indent: usize) -> String {
    let pad = "  ".repeat(indent);
    let mut out = format!("{pad}{} {}: {}", result.entity, result.name, action_word(result.action));
    if let Some(err) = &result.error {
        out.push_str(&format!(" ({err})"));
    }
    for child in &result.cascaded {
        out.push('\n');
        out.push_str(&render_delete_line(child, indent + 1));
    }
    out
}

pub fn render_kill(result: &KillResult, format: OutputFormat) -> anyhow::Result<String> {
    if matches!(format, OutputFormat::Text) {
        let mut out = format!("{} {}: {}", result.entity, result.name, action_word(result.action));
        if let Some(err) = &result.error {
            out.push_str(&format!(" ({err})"));
        }
        return Ok(out);
    }
    dump(result, format)
}

pub fn render_dispatch(result: &DispatchResult, format: OutputFormat) -> anyhow::Result<String> {
    if matches!(format, OutputFormat::Text) {
        let lines: Vec<String> = result
            .resources
            .iter()
            .map(|r| {
                let mut line = format!("[{}] {} {}: {}", r.index, r.kind, r.name, action_word(r.action));
                if let Some(err) = &r.error {
                    line.push_str(&format!(" ({err})"));
                }
                line
            })
            .collect();
        return Ok(lines.join("\n"));
    }
    dump(result, format)
}

fn action_word(action: Action) -> &'static str {
    match action {
        Action::Created => "created",
        Action::Unchanged => "unchanged",
        Action::Deleted => "deleted",
        Action::Stopped => "stopped",
        Action::NotFound => "not found",
        Action::Failed => "failed",
    }
}
