use clap::Subcommand;
use sprintplan_core::store::WorkItemStore;
use sprintplan_core::{Database, WorkItemQuery, WorkItemStatus};

use super::{parse_status, print_json};

#[derive(Subcommand)]
pub enum ItemAction {
    /// List work items
    List {
        /// Filter by status (repeatable)
        #[arg(long = "status", value_parser = parse_status)]
        statuses: Vec<WorkItemStatus>,
        /// Filter by ticket id (repeatable)
        #[arg(long = "ticket")]
        tickets: Vec<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Set the status of one or more work items
    Status {
        /// New status: todo, in_progress, blocked or done
        #[arg(value_parser = parse_status)]
        status: WorkItemStatus,
        /// Work item ids
        #[arg(required = true)]
        ids: Vec<String>,
    },
}

pub fn run(action: ItemAction) -> Result<(), Box<dyn std::error::Error>> {
    let db = Database::open()?;

    match action {
        ItemAction::List {
            statuses,
            tickets,
            json,
        } => {
            let items = db.list_work_items(&WorkItemQuery {
                statuses,
                ticket_ids: tickets,
            })?;
            if json {
                print_json(&items)?;
            } else if items.is_empty() {
                println!("No work items.");
            } else {
                for item in &items {
                    println!(
                        "{}  {:<12} #{:<2} {:<11} {}",
                        item.id, item.ticket_id, item.seq, item.status.as_str(), item.text
                    );
                }
            }
        }
        ItemAction::Status { status, ids } => {
            let updated = db.set_work_item_status(&ids, status)?;
            println!("Updated {updated} work item(s)");
        }
    }
    Ok(())
}
