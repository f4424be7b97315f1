use chrono::NaiveDate;
use clap::Args;
use sprintplan_core::{BlockedItem, Config, Database, EveningReconciler, EveningReport};

use super::{date_or_today, parse_date, print_json};

#[derive(Args)]
pub struct EveningArgs {
    /// Day being closed (default: today)
    #[arg(long, value_parser = parse_date)]
    date: Option<NaiveDate>,
    /// Work item finished today (repeatable)
    #[arg(long = "completed")]
    completed: Vec<String>,
    /// Work item started but not finished (repeatable)
    #[arg(long = "partial")]
    partial: Vec<String>,
    /// Blocked work item as ID=NOTE (repeatable)
    #[arg(long = "blocked", value_parser = parse_blocked)]
    blocked: Vec<BlockedItem>,
    /// Output as JSON
    #[arg(long)]
    json: bool,
}

fn parse_blocked(s: &str) -> Result<BlockedItem, String> {
    match s.split_once('=') {
        Some((id, note)) if !id.trim().is_empty() => Ok(BlockedItem::new(id.trim(), note.trim())),
        _ => Err(format!("expected ID=NOTE, got '{s}'")),
    }
}

pub fn run(args: EveningArgs) -> Result<(), Box<dyn std::error::Error>> {
    let db = Database::open()?;
    let config = Config::load_or_default();

    let mut report = EveningReport::new(date_or_today(args.date))
        .with_completed(args.completed)
        .with_partial(args.partial);
    report.blocked = args.blocked;

    let reconciler = EveningReconciler::new()
        .with_workdays(config.planner.workdays.clone())
        .with_retry(config.narrative.retry_policy());
    let annotator = config.narrative.annotator();
    let outcome = reconciler.reconcile_with_store(&db, &report, annotator.as_ref())?;

    if args.json {
        return print_json(&outcome);
    }

    println!("Evening {} -> next workday {}", outcome.date, outcome.target_day);
    println!("Updated {} work item(s)", outcome.status_updates);
    for block in &outcome.plan_delta {
        println!(
            "  {} [{}]: {} item(s), {} new",
            block.note,
            block.bucket,
            block.item_ids.len(),
            block.newly_attached
        );
    }
    for note in &outcome.notes {
        println!("{note}");
    }
    if let Some(summary) = &outcome.summary {
        println!("\n{summary}");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blocked_argument_splits_on_first_equals() {
        let item = parse_blocked("abc=waiting on a=b").unwrap();
        assert_eq!(item.id, "abc");
        assert_eq!(item.note, "waiting on a=b");
        assert!(parse_blocked("abc").is_err());
        assert!(parse_blocked("=note").is_err());
    }
}
