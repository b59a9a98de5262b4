use clap::Args;

use plate_core::{CalorieReading, SelectionOutcome};

use super::{open_session, parse_date, OutputFormat};
use crate::config::Config;

#[derive(Args)]
pub struct CaloriesCommand {
    /// Date (YYYY-MM-DD), defaults to today
    #[arg(long, short)]
    date: Option<String>,

    /// Output format
    #[arg(long, short, value_enum, default_value = "text")]
    format: OutputFormat,
}

impl CaloriesCommand {
    pub async fn run(&self, config: &Config) -> Result<(), Box<dyn std::error::Error>> {
        let (session, _) = open_session(config)?;
        session.start().await?;
        let ledger = session.ledger();

        if let Some(date) = &self.date {
            ledger.select(parse_date(date)?)?;
        }

        let (date, reading) = match ledger.refresh_selected().await? {
            SelectionOutcome::Current { date, reading } => (date, reading),
            SelectionOutcome::Stale { date } => (date, CalorieReading::Pending),
        };
        let consumed = reading.calories().unwrap_or(0);
        let target = ledger.target();

        match self.format {
            OutputFormat::Json => {
                let output = serde_json::json!({
                    "date": date,
                    "reading": reading,
                    "target": target,
                    "percentage": target.percentage(consumed),
                    "remaining": target.remaining(consumed),
                });
                println!("{}", serde_json::to_string_pretty(&output)?);
            }
            OutputFormat::Text => {
                println!("{}", ledger.date_label(date));
                println!("Consumed: {}", reading);
                println!(
                    "Target:   {} ({:.0}%), {} remaining",
                    target.calories(),
                    target.percentage(consumed),
                    target.remaining(consumed)
                );
            }
        }
        Ok(())
    }
}
