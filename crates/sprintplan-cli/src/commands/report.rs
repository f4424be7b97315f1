use std::fmt::Write;

use chrono::NaiveDate;
use clap::Subcommand;
use sprintplan_core::report::MorningReport;
use sprintplan_core::{morning_report, Config, Database, PlanBucket};

use super::{date_or_today, parse_date, print_json};

#[derive(Subcommand)]
pub enum ReportAction {
    /// Today's checklist, batches and risks
    Morning {
        /// Report date (default: today)
        #[arg(long, value_parser = parse_date)]
        date: Option<NaiveDate>,
        /// Ask the narrative service for a short recap
        #[arg(long)]
        narrative: bool,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

fn render_report(report: &MorningReport) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Morning report for {}", report.date);
    if report.checklist.is_empty() {
        let _ = writeln!(out, "\nNothing planned.");
    } else {
        let _ = writeln!(out, "\nChecklist:");
        for item in &report.checklist {
            let _ = writeln!(
                out,
                "  [ ] {}#{} {}  ({})",
                item.ticket_id, item.seq, item.text, item.why_now
            );
        }
    }

    if !report.batches.is_empty() {
        let _ = writeln!(out, "\nBatches:");
        for batch in &report.batches {
            let _ = match batch.bucket {
                PlanBucket::Focus => {
                    writeln!(out, "  {} ({} items)", batch.note, batch.members.len())
                }
                PlanBucket::Admin => writeln!(out, "  {} [admin]", batch.note),
                PlanBucket::Meeting => writeln!(out, "  {} [meeting]", batch.note),
            };
        }
    }

    if !report.risks.is_empty() {
        let _ = writeln!(out, "\nRisks:");
        for risk in &report.risks {
            let _ = writeln!(out, "  - {risk}");
        }
    }

    if !report.context_tags.is_empty() {
        let _ = writeln!(out, "\nContext: {}", report.context_tags.join(", "));
    }

    if let Some(narrative) = &report.narrative {
        match (&narrative.text, &narrative.error) {
            (Some(text), _) => {
                let _ = writeln!(out, "\n{text}");
            }
            (None, Some(error)) => {
                let _ = writeln!(out, "\n(narrative unavailable: {error})");
            }
            (None, None) => {}
        }
    }
    out
}

pub fn run(action: ReportAction) -> Result<(), Box<dyn std::error::Error>> {
    let db = Database::open()?;

    match action {
        ReportAction::Morning {
            date,
            narrative,
            json,
        } => {
            let annotator = narrative.then(|| Config::load_or_default().narrative.annotator());
            let report = morning_report(&db, date_or_today(date), annotator.as_deref())?;
            if json {
                print_json(&report)?;
            } else {
                print!("{}", render_report(&report));
            }
        }
    }
    Ok(())
}
