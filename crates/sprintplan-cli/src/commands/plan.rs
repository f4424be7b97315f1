use chrono::NaiveDate;
use clap::Subcommand;
use sprintplan_core::store::PlanStore;
use sprintplan_core::{Config, Database, PlanBlock, PlanBuilder};

use super::{date_or_today, parse_date, print_json};

#[derive(Subcommand)]
pub enum PlanAction {
    /// Build and store a plan over the configured horizon
    Make {
        /// First day to plan (default: today)
        #[arg(long, value_parser = parse_date)]
        start: Option<NaiveDate>,
        /// Number of workdays (default: planner.horizon_days)
        #[arg(long)]
        days: Option<u32>,
        /// Restrict to these tickets (repeatable)
        #[arg(long = "ticket")]
        tickets: Vec<String>,
        /// Keep stored blocks inside the horizon
        #[arg(long)]
        keep_existing: bool,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// List stored plan blocks
    List {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

fn print_blocks(blocks: &[PlanBlock]) {
    let mut current = None;
    for block in blocks {
        if current != Some(block.date) {
            println!("{} ({})", block.date, block.date.format("%a"));
            current = Some(block.date);
        }
        println!(
            "  [{}] {} ({} items)",
            block.bucket,
            block.note.as_deref().unwrap_or("-"),
            block.item_ids.len()
        );
    }
}

pub fn run(action: PlanAction) -> Result<(), Box<dyn std::error::Error>> {
    let db = Database::open()?;

    match action {
        PlanAction::Make {
            start,
            days,
            tickets,
            keep_existing,
            json,
        } => {
            let config = Config::load_or_default();
            let mut request = config
                .planner
                .request(date_or_today(start))
                .with_tickets(tickets);
            if let Some(days) = days {
                request = request.with_days(days);
            }
            if keep_existing {
                request = request.keep_existing();
            }

            let annotator = config.narrative.annotator();
            let stored = PlanBuilder::new().build_with_store(&db, &request, annotator.as_ref())?;

            if json {
                print_json(&stored)?;
            } else if stored.outcome.is_empty() {
                println!("Nothing to plan: no open work items.");
            } else {
                print_blocks(&stored.blocks);
                if stored.cleared > 0 {
                    println!("Replaced {} stored block(s).", stored.cleared);
                }
                if !stored.outcome.unscheduled.is_empty() {
                    println!(
                        "{} work item(s) did not fit the horizon.",
                        stored.outcome.unscheduled.len()
                    );
                }
            }
        }
        PlanAction::List { json } => {
            let blocks = db.list_plan_blocks()?;
            if json {
                print_json(&blocks)?;
            } else if blocks.is_empty() {
                println!("No plan blocks.");
            } else {
                print_blocks(&blocks);
            }
        }
    }
    Ok(())
}
