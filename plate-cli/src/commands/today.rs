use clap::{Args, Subcommand};

use plate_core::PlannerSession;

use super::{open_session, OutputFormat};
use crate::config::Config;
use crate::storage::LocalStore;

#[derive(Args)]
pub struct TodayCommand {
    #[command(subcommand)]
    pub command: TodaySubcommand,
}

#[derive(Subcommand)]
pub enum TodaySubcommand {
    /// Show today's planned meals and progress
    Show {
        /// Output format
        #[arg(long, short, value_enum, default_value = "text")]
        format: OutputFormat,
    },

    /// Mark a meal as eaten, or un-mark it
    Toggle {
        /// Meal type key
        meal_type: String,
    },
}

impl TodayCommand {
    pub async fn run(&self, config: &Config) -> Result<(), Box<dyn std::error::Error>> {
        let (session, _) = open_session(config)?;
        session.start().await?;

        match &self.command {
            TodaySubcommand::Show { format } => {
                match format {
                    OutputFormat::Json => {
                        let output = serde_json::json!({
                            "date": session.today().date(),
                            "items": session.today().items(),
                            "progress": session.today().progress(),
                            "consumed_calories": session.today().completed_calories(),
                            "calorie_target": session.ledger().target(),
                        });
                        println!("{}", serde_json::to_string_pretty(&output)?);
                    }
                    OutputFormat::Text => print_today(&session),
                }
                Ok(())
            }

            TodaySubcommand::Toggle { meal_type } => {
                let item = session
                    .today()
                    .find_by_meal_type(meal_type)
                    .ok_or_else(|| format!("No {} planned for today", meal_type))?;

                let completed = session.today().toggle(&item.id)?;
                session.today().save_completions().await?;

                let state = if completed { "eaten" } else { "not eaten" };
                println!("{} marked {}", item.meal.name, state);
                Ok(())
            }
        }
    }
}

fn print_today(session: &PlannerSession<LocalStore>) {
    let today = session.today();
    println!("{}! {}", session.greeting(), today.date().format("%A, %B %-d"));
    println!();

    let items = today.items();
    if items.is_empty() {
        println!("Nothing planned for today");
        return;
    }
    for item in &items {
        println!("{}", item);
    }

    let progress = today.progress();
    let consumed = today.completed_calories();
    let target = session.ledger().target();
    println!();
    println!(
        "Progress: {}/{} meals ({:.0}%)",
        progress.completed,
        progress.total,
        progress.percentage()
    );
    println!(
        "Calories: {} / {} ({:.0}%), {} remaining",
        consumed,
        target.calories(),
        target.percentage(consumed),
        target.remaining(consumed)
    );
}
