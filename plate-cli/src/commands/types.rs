use clap::{Args, Subcommand};

use plate_core::MealTypeRegistry;

use super::{open_session, OutputFormat};
use crate::config::Config;
use crate::storage::LocalStore;

#[derive(Args)]
pub struct TypesCommand {
    #[command(subcommand)]
    pub command: TypesSubcommand,
}

#[derive(Subcommand)]
pub enum TypesSubcommand {
    /// List meal types in display order
    List {
        /// Output format
        #[arg(long, short, value_enum, default_value = "text")]
        format: OutputFormat,
    },

    /// Show a meal type in plans
    Enable {
        /// Meal type key
        key: String,
    },

    /// Hide a meal type from plans (assigned meals are kept)
    Disable {
        /// Meal type key
        key: String,
    },
}

impl TypesCommand {
    pub fn run(&self, config: &Config) -> Result<(), Box<dyn std::error::Error>> {
        let (session, storage) = open_session(config)?;
        let registry = session.registry();

        match &self.command {
            TypesSubcommand::List { format } => {
                match format {
                    OutputFormat::Json => {
                        println!("{}", serde_json::to_string_pretty(&registry.list())?);
                    }
                    OutputFormat::Text => {
                        for meal_type in registry.list() {
                            let mark = if meal_type.enabled { "x" } else { " " };
                            println!("[{}] {:16} {}", mark, meal_type.key, meal_type.label);
                        }
                    }
                }
                Ok(())
            }
            TypesSubcommand::Enable { key } => set_enabled(registry, &storage, key, true),
            TypesSubcommand::Disable { key } => set_enabled(registry, &storage, key, false),
        }
    }
}

fn set_enabled(
    registry: &MealTypeRegistry,
    storage: &LocalStore,
    key: &str,
    enabled: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    if !registry.set_enabled(key, enabled) {
        return Err(format!("Unknown meal type '{}'", key).into());
    }
    storage.save_meal_types(&registry.list())?;

    let state = if enabled { "enabled" } else { "disabled" };
    println!("{} {}", registry.label(key).unwrap_or_else(|| key.to_string()), state);
    Ok(())
}
