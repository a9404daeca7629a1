use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use ecofarm::{
    config::ConfigLoader,
    host::GameHost,
    identity::StaticIdentity,
    rules::Action,
    session::InMemorySessionStore,
    web::{self, WebServerConfig},
    GameConfig,
};

#[derive(Debug, Parser)]
#[command(author, version, about = "EcoFarm rice season simulator")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Play one season headless and print the harvest
    Simulate(SimulateArgs),
    /// Serve the JSON API
    Serve(ServeArgs),
}

#[derive(Debug, Args)]
struct SimulateArgs {
    /// Path to the scenario YAML file
    #[arg(long, default_value = "scenarios/mawsynram.yaml")]
    scenario: PathBuf,

    /// Comma-separated actions, repeated until the season ends
    #[arg(long, value_delimiter = ',', default_value = "irrigate,fertilize,rest")]
    actions: Vec<Action>,

    /// Print the final crop state as JSON
    #[arg(long)]
    json: bool,
}

#[derive(Debug, Args)]
struct ServeArgs {
    /// Path to the scenario YAML file
    #[arg(long, default_value = "scenarios/mawsynram.yaml")]
    scenario: PathBuf,

    /// Override the configured bind host
    #[arg(long)]
    host: Option<String>,

    /// Override the configured port
    #[arg(long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let loader = ConfigLoader::new(".");
    match cli.command {
        Command::Simulate(args) => {
            let config = loader.load(&args.scenario)?;
            init_tracing(&config);
            simulate(&loader, &config, &args).await
        }
        Command::Serve(args) => {
            let config = loader.load(&args.scenario)?;
            init_tracing(&config);
            let game = Arc::new(GameHost::new(
                InMemorySessionStore::new(),
                loader.climate_source(&config)?,
                StaticIdentity::anonymous(),
                config.seed,
            ));
            let server = WebServerConfig {
                host: args.host.unwrap_or_else(|| config.server.host.clone()),
                port: args.port.unwrap_or(config.server.port),
            };
            web::run(game, server).await
        }
    }
}

fn init_tracing(config: &GameConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.logging.level));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

async fn simulate(loader: &ConfigLoader, config: &GameConfig, args: &SimulateArgs) -> Result<()> {
    if args.actions.is_empty() {
        bail!("at least one action is required");
    }
    let game = GameHost::new(
        InMemorySessionStore::new(),
        loader.climate_source(config)?,
        StaticIdentity::anonymous(),
        config.seed,
    );
    let id = game.start_season(config.crop).await?.id;

    for action in args.actions.iter().cycle() {
        let event = game.submit_action(id, action.as_str()).await?;
        if !args.json {
            println!(
                "week {:>2}  {:<9}  {:<24}  moisture {:>5.1}  health {:>5.1}",
                event.turn.week,
                action.as_str(),
                event.turn.outcome.title,
                event.turn.soil_moisture,
                event.turn.health_score
            );
        }
        if event.turn.completed_season() {
            break;
        }
        game.settle(id).await?;
    }

    let view = game.session(id).await?;
    if args.json {
        println!("{}", serde_json::to_string_pretty(&view.state)?);
        return Ok(());
    }
    let report = view.harvest.context("season ended without a harvest")?;
    println!(
        "Scenario '{}' ({}) harvested {:.0} kg/ha: {}",
        config.name,
        view.source_tag,
        report.total_yield,
        report.rating.label()
    );
    Ok(())
}
