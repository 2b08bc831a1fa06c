use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use tracing::info;

use faultline_config::AgentConfig;
use faultline_engine::{run_scenario, save_report, AttackController, CloudConnectors, ScenarioReport};
use faultline_simulator::{load_scenario, SimulatedCloud};

const REDACTED: &str = "***";

#[derive(Parser, Debug)]
#[command(version, about)]
pub struct Cli {
    /// Configuration file; defaults to config/faultline.yaml plus environment
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Replay a scenario against the simulated cloud
    Simulate(SimulateArgs),
    /// List the actions the agent offers
    Actions,
    /// Print the effective, validated configuration
    Config,
}

#[derive(Args, Debug, Clone)]
pub struct SimulateArgs {
    /// Scenario file to replay
    #[arg(short, long)]
    pub scenario: PathBuf,
    /// Expected final state hash; overrides the one pinned in the scenario
    #[arg(long)]
    pub validate_hash: Option<String>,
    /// Write the step report as YAML
    #[arg(long)]
    pub report: Option<PathBuf>,
}

pub fn load_config(path: Option<&PathBuf>) -> Result<AgentConfig> {
    match path {
        Some(path) => AgentConfig::load_from_path(path)
            .with_context(|| format!("failed to load configuration from {}", path.display())),
        None => AgentConfig::load().context("failed to load configuration"),
    }
}

pub async fn run_command(cli: &Cli, config: AgentConfig) -> Result<()> {
    match &cli.command {
        Commands::Simulate(args) => simulate(args, &config).await.map(|_| ()),
        Commands::Actions => {
            print!("{}", render_actions(&config));
            Ok(())
        }
        Commands::Config => {
            print!("{}", serde_yaml::to_string(&redacted(config))?);
            Ok(())
        }
    }
}

pub async fn simulate(args: &SimulateArgs, config: &AgentConfig) -> Result<ScenarioReport> {
    let mut scenario = load_scenario(&args.scenario)
        .with_context(|| format!("failed to load scenario {}", args.scenario.display()))?;
    if let Some(hash) = &args.validate_hash {
        scenario.expected_hash = Some(hash.clone());
    }

    let report = run_scenario(&scenario, config)
        .await
        .with_context(|| format!("scenario '{}' could not be run", scenario.name))?;

    for step in &report.steps {
        let status = match (step.matched, step.succeeded) {
            (true, true) => "ok",
            (true, false) => "failed as expected",
            (false, _) => "UNEXPECTED",
        };
        println!(
            "{:>3} {:<8} {:<14} {}{}",
            step.index,
            step.step,
            step.execution.as_deref().unwrap_or("-"),
            status,
            step.error
                .as_deref()
                .map(|e| format!(": {}", e))
                .unwrap_or_default()
        );
    }
    println!("State hash: {}", report.state_hash);

    if let Some(path) = &args.report {
        save_report(&report, path)
            .with_context(|| format!("failed to write report {}", path.display()))?;
        info!("Report written to {}", path.display());
    }

    if report.hash_matches == Some(false) {
        bail!(
            "state hash {} does not match the expected {}",
            report.state_hash,
            scenario.expected_hash.as_deref().unwrap_or_default()
        );
    }
    let unexpected = report.failed_steps().count();
    if unexpected > 0 {
        bail!("{} step(s) of '{}' did not go as expected", unexpected, report.name);
    }
    Ok(report)
}

fn render_actions(config: &AgentConfig) -> String {
    let cloud = Arc::new(SimulatedCloud::default());
    let controller = AttackController::new(config, CloudConnectors::uniform(cloud), None);
    controller
        .actions()
        .into_iter()
        .map(|action| {
            format!(
                "{:<60} {:<16} {}\n",
                action.id, action.category, action.label
            )
        })
        .collect()
}

/// Hides credential material before the config is printed.
fn redacted(mut config: AgentConfig) -> AgentConfig {
    for secret in [
        &mut config.azure.client_secret,
        &mut config.azure.certificate_password,
        &mut config.azure.user_assertion,
    ] {
        if secret.is_some() {
            *secret = Some(REDACTED.to_string());
        }
    }
    config
}
