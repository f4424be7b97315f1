use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod commands;

#[derive(Parser)]
#[command(name = "sprintplan", version, about = "Sprint work batching and daily planning")]
struct Cli {
    /// Log planner decisions to stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Ticket management
    Ticket {
        #[command(subcommand)]
        action: commands::ticket::TicketAction,
    },
    /// Work item listing and status updates
    Item {
        #[command(subcommand)]
        action: commands::item::ItemAction,
    },
    /// Affinity grouping
    Affinity {
        #[command(subcommand)]
        action: commands::affinity::AffinityAction,
    },
    /// Horizon planning
    Plan {
        #[command(subcommand)]
        action: commands::plan::PlanAction,
    },
    /// Daily reports
    Report {
        #[command(subcommand)]
        action: commands::report::ReportAction,
    },
    /// Record end-of-day outcomes and carry unfinished work forward
    Evening(commands::evening::EveningArgs),
    /// Configuration management
    Config {
        #[command(subcommand)]
        action: commands::config::ConfigAction,
    },
}

fn init_logging(verbose: bool) {
    let default = if verbose { "sprintplan_core=debug,info" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let result = match cli.command {
        Commands::Ticket { action } => commands::ticket::run(action),
        Commands::Item { action } => commands::item::run(action),
        Commands::Affinity { action } => commands::affinity::run(action),
        Commands::Plan { action } => commands::plan::run(action),
        Commands::Report { action } => commands::report::run(action),
        Commands::Evening(args) => commands::evening::run(args),
        Commands::Config { action } => commands::config::run(action),
    };

    if let Err(e) = result {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}
