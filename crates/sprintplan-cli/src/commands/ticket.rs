//! Ticket management commands for CLI.

use chrono::NaiveDate;
use clap::Subcommand;
use sprintplan_core::{Config, Database, Ticket};

use super::{parse_date, print_json};

#[derive(Subcommand)]
pub enum TicketAction {
    /// Add a ticket, or replace an existing one with the same id
    Add {
        /// Ticket id (e.g. "OPS-123")
        id: String,
        /// Ticket title
        #[arg(long)]
        title: String,
        /// Story points
        #[arg(long, default_value = "1")]
        points: u32,
        /// Technology tag (repeatable)
        #[arg(long = "tag")]
        tags: Vec<String>,
        /// Due date (YYYY-MM-DD)
        #[arg(long, value_parser = parse_date)]
        due: Option<NaiveDate>,
        /// Ticket description
        #[arg(long)]
        description: Option<String>,
    },
    /// List tickets
    List {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Generate work items for a ticket (narrative suggestions, else the template)
    Decompose {
        /// Ticket id
        id: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

pub fn run(action: TicketAction) -> Result<(), Box<dyn std::error::Error>> {
    let db = Database::open()?;

    match action {
        TicketAction::Add {
            id,
            title,
            points,
            tags,
            due,
            description,
        } => {
            let mut ticket = Ticket::new(id, title, points).with_tech(tags);
            ticket.due_date = due;
            ticket.description = description.unwrap_or_default();
            db.upsert_ticket(&ticket)?;
            println!("Ticket saved: {}", ticket.id);
        }
        TicketAction::List { json } => {
            let tickets = db.list_tickets()?;
            if json {
                print_json(&tickets)?;
            } else if tickets.is_empty() {
                println!("No tickets.");
            } else {
                for t in &tickets {
                    let due = t.due_date.map(|d| d.to_string()).unwrap_or_else(|| "-".into());
                    println!(
                        "{:<12} {:>3}pt  due {:<10}  [{}]  {}",
                        t.id,
                        t.story_points,
                        due,
                        t.tech.join(", "),
                        t.title
                    );
                }
            }
        }
        TicketAction::Decompose { id, json } => {
            let annotator = Config::load_or_default().narrative.annotator();
            let items = db.decompose_ticket(&id, annotator.as_ref())?;
            if json {
                print_json(&items)?;
            } else {
                println!("Created {} work item(s) for {id}", items.len());
                for item in &items {
                    println!("  #{} {}  ({})", item.seq, item.text, item.id);
                }
            }
        }
    }
    Ok(())
}
