//! LIFT's single entry point: parse arguments, validate inputs, scaffold
//! the project working tree on first run, and drive the iteration engine
//! to completion. There are no subcommands — LIFT has exactly one mode of
//! operation (`spec.md` §6).

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;

use lift_config::Configuration;
use lift_core::{check_inputs, setup_new_project, IterationEngine, Paths};

#[derive(Parser)]
#[command(name = "lift", about = "Iterative LLM-driven test suite synthesis", version)]
struct Cli {
    /// Root directory for this run (created if it does not exist).
    #[arg(long, default_value = ".")]
    root: PathBuf,

    /// Directory containing program-requirements.yml, the PUT, and the
    /// agent prompt files.
    #[arg(long, default_value = "inputs")]
    inputs: PathBuf,

    /// Path to the .env file holding model and API key configuration.
    #[arg(long, default_value = "inputs/.env")]
    env_file: PathBuf,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env().add_directive("lift=info".parse()?))
        .with_target(false)
        .init();

    let cli = Cli::parse();

    let config = Configuration::load(&cli.env_file).context("failed to load configuration")?;
    let paths = Paths::new(&cli.root, &cli.inputs, &config.put_name);

    if let Err(err) = check_inputs(&paths, &config.put_name) {
        tracing::error!(%err, "input validation failed");
        anyhow::bail!(err);
    }

    if !paths.project.exists() {
        let requirement_ids = lift_core::requirements::parse_requirements_doc(&paths.req_doc)
            .context("failed to parse requirements document")?
            .all_ids();
        setup_new_project(&paths, &config.put_name, &requirement_ids).context("failed to set up project")?;
        tracing::info!(project = %paths.project.display(), "project scaffolded");
    }

    let engine = IterationEngine::new(config, paths).context("failed to initialize iteration engine")?;

    if let Err(err) = engine.run().await {
        tracing::error!(%err, "iteration run failed");
        anyhow::bail!(err);
    }

    Ok(())
}
