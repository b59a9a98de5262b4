use clap::{Args, Subcommand};

use plate_core::{parse_calories, ValidationError};

use super::{open_session, OutputFormat};
use crate::config::Config;

#[derive(Args)]
pub struct MealsCommand {
    #[command(subcommand)]
    pub command: MealsSubcommand,
}

#[derive(Subcommand)]
pub enum MealsSubcommand {
    /// List meals available for a meal type
    List {
        /// Meal type key
        #[arg(long = "type", short = 't', value_name = "TYPE")]
        meal_type: String,

        /// Filter by name (case-insensitive)
        #[arg(long, short)]
        search: Option<String>,

        /// Output format
        #[arg(long, short, value_enum, default_value = "text")]
        format: OutputFormat,
    },

    /// Add a custom meal
    Add {
        /// Meal type key
        #[arg(long = "type", short = 't', value_name = "TYPE")]
        meal_type: String,

        /// Meal name
        #[arg(long, short)]
        name: String,

        /// Calories (whole number)
        #[arg(long, short)]
        calories: String,
    },
}

impl MealsCommand {
    pub fn run(&self, config: &Config) -> Result<(), Box<dyn std::error::Error>> {
        let (session, storage) = open_session(config)?;

        match &self.command {
            MealsSubcommand::List {
                meal_type,
                search,
                format,
            } => {
                let meals = session
                    .catalog()
                    .search(meal_type, search.as_deref().unwrap_or(""));

                match format {
                    OutputFormat::Json => {
                        println!("{}", serde_json::to_string_pretty(&meals)?);
                    }
                    OutputFormat::Text => {
                        if meals.is_empty() {
                            println!("No meals found for {}", meal_type);
                            return Ok(());
                        }
                        for meal in &meals {
                            println!("{:>4}  {}", meal.id, meal);
                        }
                        println!("\nTotal: {} meal(s)", meals.len());
                    }
                }
                Ok(())
            }

            MealsSubcommand::Add {
                meal_type,
                name,
                calories,
            } => {
                if !session.registry().contains(meal_type) {
                    return Err(ValidationError::UnknownMealType(meal_type.clone()).into());
                }

                let calories = parse_calories(calories)?;
                let meal = session.catalog().add_custom(meal_type, name, calories)?;
                storage.save_custom_meals(&session.catalog().custom_meals())?;

                println!("Added {} meal {}: {}", meal_type, meal.id, meal);
                Ok(())
            }
        }
    }
}
