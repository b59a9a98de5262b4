use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod commands;
mod config;
mod storage;

use commands::{
    CaloriesCommand, ConfigCommand, MealsCommand, TodayCommand, TypesCommand, WeekCommand,
};
use config::Config;

#[derive(Parser)]
#[command(name = "plate")]
#[command(version)]
#[command(about = "Weekly meal planning and calorie tracking", long_about = None)]
struct Cli {
    /// Path to config file
    #[arg(long, short, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Plan meals for a week
    Week(WeekCommand),

    /// Enable or disable meal types
    Types(TypesCommand),

    /// Browse and add meals
    Meals(MealsCommand),

    /// Track today's meals
    Today(TodayCommand),

    /// Show consumed calories for a day
    Calories(CaloriesCommand),

    /// Manage configuration
    Config(ConfigCommand),
}

fn main() {
    if let Err(e) = run() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_env("PLATE_LOG")
                .unwrap_or_else(|_| "plate=warn,plate_core=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    // Save config path for init command
    let cli_config_path = cli.config.clone();

    let config = Config::load(cli.config)?;

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    runtime.block_on(execute_command(&cli.command, &config, cli_config_path))
}

async fn execute_command(
    command: &Option<Commands>,
    config: &Config,
    cli_config_path: Option<PathBuf>,
) -> Result<(), Box<dyn std::error::Error>> {
    match command {
        Some(Commands::Week(cmd)) => {
            cmd.run(config).await?;
        }
        Some(Commands::Types(cmd)) => {
            cmd.run(config)?;
        }
        Some(Commands::Meals(cmd)) => {
            cmd.run(config)?;
        }
        Some(Commands::Today(cmd)) => {
            cmd.run(config).await?;
        }
        Some(Commands::Calories(cmd)) => {
            cmd.run(config).await?;
        }
        Some(Commands::Config(cmd)) => {
            cmd.run(config, cli_config_path)?;
        }
        None => {
            println!("Use --help to see available commands");
        }
    }

    Ok(())
}
