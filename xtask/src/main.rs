//! Repo automation for tracegate.
//!
//! Invoked as `cargo run -p xtask -- <command>`. Owns the JSON Schemas for
//! the wire documents (kept under `schemas/`) and bundles the usual repo
//! checks, including a type-check of the fuzz targets, which live outside
//! the main workspace.

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use schemars::schema::RootSchema;
use schemars::schema_for;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Parser)]
#[command(name = "xtask", about = "Repo automation for tracegate")]
struct Cli {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// (Re)generate JSON Schemas for the wire documents.
    Schema {
        /// Output directory
        #[arg(long, default_value = "schemas")]
        out_dir: PathBuf,

        /// Fail if the written schemas would differ, instead of rewriting.
        #[arg(long, default_value_t = false)]
        check: bool,
    },

    /// Run the usual repo checks (fmt, clippy, tests, schemas).
    Ci,

    /// Type-check the fuzz targets without running them.
    FuzzCheck,
}

/// Every wire document with a published schema, in output order.
fn wire_schemas() -> Vec<(&'static str, RootSchema)> {
    vec![
        (
            "tracegate.traces.v1.schema.json",
            schema_for!(tracegate_types::TraceDoc),
        ),
        (
            "tracegate.result.v1.schema.json",
            schema_for!(tracegate_types::TraceVerdict),
        ),
        (
            "tracegate.summary.v1.schema.json",
            schema_for!(tracegate_types::RunSummary),
        ),
    ]
}

fn main() -> anyhow::Result<()> {
    match Cli::parse().cmd {
        Command::Schema { out_dir, check } => cmd_schema(&out_dir, check),
        Command::Ci => cmd_ci(),
        Command::FuzzCheck => cmd_fuzz_check(),
    }
}

fn cmd_schema(out_dir: &Path, check: bool) -> anyhow::Result<()> {
    fs::create_dir_all(out_dir).with_context(|| format!("create dir {}", out_dir.display()))?;

    for (name, schema) in wire_schemas() {
        let path = out_dir.join(name);
        let mut json = serde_json::to_vec_pretty(&schema)?;
        json.push(b'\n');

        if check {
            let on_disk = fs::read(&path).with_context(|| {
                format!(
                    "read {}; run `cargo run -p xtask -- schema`",
                    path.display()
                )
            })?;
            if on_disk != json {
                bail!(
                    "{} is stale; run `cargo run -p xtask -- schema`",
                    path.display()
                );
            }
        } else {
            fs::write(&path, &json).with_context(|| format!("write {}", path.display()))?;
        }
    }

    Ok(())
}

fn cmd_ci() -> anyhow::Result<()> {
    cargo(&["fmt", "--all", "--", "--check"])?;
    cargo(&["clippy", "--workspace", "--all-targets", "--", "-D", "warnings"])?;
    cargo(&["test", "--workspace"])?;
    cmd_schema(Path::new("schemas"), false)?;
    cmd_fuzz_check()
}

fn cmd_fuzz_check() -> anyhow::Result<()> {
    // The fuzz crate is excluded from the workspace; point cargo at its
    // manifest directly so CI still notices when a target stops compiling.
    cargo(&["check", "--manifest-path", "fuzz/Cargo.toml"])
}

fn cargo(args: &[&str]) -> anyhow::Result<()> {
    let status = std::process::Command::new("cargo")
        .args(args)
        .status()
        .with_context(|| format!("running cargo {}", args.join(" ")))?;
    if !status.success() {
        bail!("cargo {} failed: {status}", args.join(" "));
    }
    Ok(())
}
