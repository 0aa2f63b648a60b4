use std::path::PathBuf;

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use verdant::{
    scenario::{Scenario, ScenarioLoader},
    session::{Session, SessionOptions},
    web::{self, WebServerConfig},
};

#[derive(Debug, Parser)]
#[command(author, version, about = "Verdant tile simulation runner")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Play a scenario headlessly and print the result
    Run(RunArgs),
    /// Play a scenario and stream its frames over HTTP
    Serve(ServeArgs),
}

#[derive(Debug, Args)]
struct ScenarioArgs {
    /// Path to the scenario YAML file
    #[arg(long, default_value = "scenarios/meadow.yaml")]
    scenario: PathBuf,

    /// Override tick count (uses scenario default when omitted)
    #[arg(long)]
    ticks: Option<u64>,

    /// Override snapshot interval in ticks
    #[arg(long)]
    snapshot_interval: Option<u64>,

    /// Directory for snapshots
    #[arg(long)]
    snapshot_dir: Option<PathBuf>,
}

#[derive(Debug, Args)]
struct RunArgs {
    #[command(flatten)]
    scenario: ScenarioArgs,
}

#[derive(Debug, Args)]
struct ServeArgs {
    #[command(flatten)]
    scenario: ScenarioArgs,

    #[arg(long, default_value = "127.0.0.1")]
    host: String,

    #[arg(long, default_value_t = 8080)]
    port: u16,
}

impl ScenarioArgs {
    fn load(&self) -> Result<(Scenario, SessionOptions, u64)> {
        let scenario = ScenarioLoader::new(".").load(&self.scenario)?;
        let ticks = scenario.ticks(self.ticks);
        let mut options = SessionOptions::for_scenario(&scenario);
        if let Some(interval) = self.snapshot_interval {
            options.snapshot_interval_ticks = interval;
        }
        if let Some(dir) = &self.snapshot_dir {
            options.snapshot_dir = dir.clone();
        }
        Ok((scenario, options, ticks))
    }
}

fn init_tracing(default_level: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    match cli.command {
        Command::Run(args) => {
            let (scenario, options, ticks) = args.scenario.load()?;
            init_tracing(&scenario.config.logging.level);
            let mut session = Session::new(scenario, options)?;
            let outcome = session.run(ticks)?;
            let world = session.world();
            let coverage = world.coverage();
            println!(
                "Scenario '{}' stopped after {} ticks: grass {:.1}%, corruption {:.1}%, neutral {:.1}%, outcome {}",
                session.scenario().name,
                world.tick(),
                coverage.grass_fraction * 100.0,
                coverage.corruption_fraction * 100.0,
                coverage.neutral_fraction * 100.0,
                outcome.map_or("undecided".to_string(), |outcome| format!("{outcome:?}")),
            );
        }
        Command::Serve(args) => {
            let (scenario, options, ticks) = args.scenario.load()?;
            init_tracing(&scenario.config.logging.level);
            let runtime = tokio::runtime::Runtime::new()?;
            runtime.block_on(web::run(WebServerConfig {
                scenario,
                ticks,
                options,
                host: args.host,
                port: args.port,
            }))?;
        }
    }
    Ok(())
}
