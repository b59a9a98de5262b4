use chrono::Local;
use clap::{Args, Subcommand};

use plate_core::{week_offset_of, MealDefinition, MealId, PlannerSession, WeekPlan};

use super::{open_session, parse_date, OutputFormat};
use crate::config::Config;
use crate::storage::LocalStore;

#[derive(Args)]
pub struct WeekCommand {
    #[command(subcommand)]
    pub command: WeekSubcommand,
}

#[derive(Subcommand)]
pub enum WeekSubcommand {
    /// Show the plan for a week
    Show {
        /// Weeks from the current week (-1 = last week)
        #[arg(long, default_value_t = 0, allow_hyphen_values = true)]
        offset: i32,

        /// Include disabled meal types
        #[arg(long)]
        all: bool,

        /// Output format
        #[arg(long, short, value_enum, default_value = "text")]
        format: OutputFormat,
    },

    /// Assign a meal to a slot and save the week
    Assign {
        /// Date (YYYY-MM-DD)
        #[arg(long, short)]
        date: String,

        /// Meal type key (breakfast, lunch, dinner, ...)
        #[arg(long = "type", short = 't', value_name = "TYPE")]
        meal_type: String,

        /// Meal ID or name
        #[arg(long, short)]
        meal: String,
    },

    /// Clear a slot and save the week
    Clear {
        /// Date (YYYY-MM-DD)
        #[arg(long, short)]
        date: String,

        /// Meal type key
        #[arg(long = "type", short = 't', value_name = "TYPE")]
        meal_type: String,
    },

    /// Fill empty slots from the previous week's plan
    CopyPrevious {
        /// Weeks from the current week to copy into
        #[arg(long, default_value_t = 0, allow_hyphen_values = true)]
        offset: i32,
    },
}

impl WeekCommand {
    pub async fn run(&self, config: &Config) -> Result<(), Box<dyn std::error::Error>> {
        let (session, _) = open_session(config)?;
        session.start().await?;

        match &self.command {
            WeekSubcommand::Show {
                offset,
                all,
                format,
            } => {
                let plan = session.store().load_week(*offset).await?;
                match format {
                    OutputFormat::Json => {
                        println!("{}", serde_json::to_string_pretty(&plan)?);
                    }
                    OutputFormat::Text => print_week(&session, &plan, *all),
                }
                Ok(())
            }

            WeekSubcommand::Assign {
                date,
                meal_type,
                meal,
            } => {
                let date = parse_date(date)?;
                session
                    .store()
                    .load_week(week_offset_of(session.ledger().today(), date))
                    .await?;

                let mut edit = session.edit(date, meal_type)?;
                let chosen = resolve_meal(&session, meal_type, meal)?;
                edit.select(chosen.id)?;
                let assigned = edit.commit_selected()?;

                save(&session).await?;
                println!("Assigned {} to {} on {}", assigned, meal_type, date);
                Ok(())
            }

            WeekSubcommand::Clear { date, meal_type } => {
                let date = parse_date(date)?;
                session
                    .store()
                    .load_week(week_offset_of(session.ledger().today(), date))
                    .await?;

                let removed = session.edit(date, meal_type)?.remove()?;
                save(&session).await?;
                match removed {
                    Some(meal) => println!("Removed {} from {} on {}", meal.name, meal_type, date),
                    None => println!("{} on {} was already empty", meal_type, date),
                }
                Ok(())
            }

            WeekSubcommand::CopyPrevious { offset } => {
                let plan = session.store().load_week(*offset).await?;
                let copied = session.store().copy_from_previous_week().await?;
                if copied == 0 {
                    println!(
                        "Nothing to copy: the week of {} already has those slots filled",
                        plan.week_start
                    );
                    return Ok(());
                }

                save(&session).await?;
                println!("Copied {} meal(s) into the week of {}", copied, plan.week_start);
                Ok(())
            }
        }
    }
}

/// Saves the current week, then today's completions when today's list was
/// rebuilt from it.
async fn save(session: &PlannerSession<LocalStore>) -> Result<(), Box<dyn std::error::Error>> {
    let receipt = session.save_week().await?;
    if session.store().current().contains_date(session.ledger().today()) {
        session.today().save_completions().await?;
    }
    tracing::info!(
        week_start = %receipt.week_start,
        total = receipt.total_assigned_meals,
        "week saved"
    );
    Ok(())
}

/// Finds a meal by ID, falling back to a case-insensitive name match.
fn resolve_meal(
    session: &PlannerSession<LocalStore>,
    meal_type: &str,
    meal: &str,
) -> Result<MealDefinition, String> {
    let catalog = session.catalog();
    let found = match meal.trim().parse::<u64>() {
        Ok(id) => catalog.find(meal_type, MealId(id)),
        Err(_) => catalog.find_by_name(meal_type, meal),
    };
    found.ok_or_else(|| format!("Meal not found for {}: {}", meal_type, meal))
}

fn print_week(session: &PlannerSession<LocalStore>, plan: &WeekPlan, all: bool) {
    let registry = session.registry();
    let types = if all {
        registry.list()
    } else {
        registry.enabled()
    };

    println!("Week of {} to {}", plan.week_start, plan.week_end());
    println!("{}", "=".repeat(30));

    for (date, slots) in plan.days() {
        println!();
        println!("{}", date.format("%a %Y-%m-%d"));
        for meal_type in &types {
            let cell = match slots.get(&meal_type.key) {
                Some(meal) => meal.to_string(),
                None => "-".to_string(),
            };
            println!("  {:16} {}", meal_type.label, cell);
        }
    }

    println!();
    println!("Assigned: {}", plan.assigned_count());
    match plan.last_saved_at {
        Some(saved_at) => println!(
            "Last saved: {}",
            saved_at.with_timezone(&Local).format("%Y-%m-%d %H:%M")
        ),
        None => println!("Last saved: never"),
    }
}
