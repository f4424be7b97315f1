use clap::Subcommand;
use sprintplan_core::store::AffinityStore;
use sprintplan_core::{AffinityGrouper, AffinityRun, Config, Database, WorkItemStatus};

use super::{parse_status, print_json};

#[derive(Subcommand)]
pub enum AffinityAction {
    /// Group open work items by shared context and environment
    Compute {
        /// Statuses to consider (repeatable, default: todo and in_progress)
        #[arg(long = "status", value_parser = parse_status)]
        statuses: Vec<WorkItemStatus>,
        /// Restrict to these tickets (repeatable)
        #[arg(long = "ticket")]
        tickets: Vec<String>,
        /// Keep previously stored groups
        #[arg(long)]
        keep_existing: bool,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// List stored affinity groups
    List {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

fn print_groups(groups: &[sprintplan_core::AffinityGroup]) {
    if groups.is_empty() {
        println!("No affinity groups.");
        return;
    }
    for group in groups {
        println!("{} ({} items)", group.key, group.member_ids.len());
        println!("  {}", group.rationale);
    }
}

pub fn run(action: AffinityAction) -> Result<(), Box<dyn std::error::Error>> {
    let db = Database::open()?;

    match action {
        AffinityAction::Compute {
            statuses,
            tickets,
            keep_existing,
            json,
        } => {
            let mut run = AffinityRun {
                ticket_ids: tickets,
                clear_existing: !keep_existing,
                ..AffinityRun::default()
            };
            if !statuses.is_empty() {
                run.statuses = statuses;
            }
            let annotator = Config::load_or_default().narrative.annotator();
            let groups = AffinityGrouper::new().compute_with_store(&db, &run, annotator.as_ref())?;
            if json {
                print_json(&groups)?;
            } else {
                print_groups(&groups);
            }
        }
        AffinityAction::List { json } => {
            let groups = db.list_affinity_groups()?;
            if json {
                print_json(&groups)?;
            } else {
                print_groups(&groups);
            }
        }
    }
    Ok(())
}
