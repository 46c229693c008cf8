use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod commands;
mod context;

#[derive(Parser)]
#[command(name = "questdeck", version, about = "QuestDeck challenge rotation CLI")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Catalog management and administrator edits
    Challenge {
        #[command(subcommand)]
        action: commands::challenge::ChallengeAction,
    },
    /// User registry
    User {
        #[command(subcommand)]
        action: commands::user::UserAction,
    },
    /// Mark a challenge completed for a user
    Complete(commands::complete::CompleteArgs),
    /// Show a user's current challenges, rotating if due
    Visible(commands::visible::VisibleArgs),
    /// Inspect stored snapshots
    Snapshot {
        #[command(subcommand)]
        action: commands::snapshot::SnapshotAction,
    },
    /// Configuration management
    Config {
        #[command(subcommand)]
        action: commands::config::ConfigAction,
    },
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn main() {
    init_tracing();

    let cli = Cli::parse();
    let result = match cli.command {
        Commands::Challenge { action } => commands::challenge::run(action),
        Commands::User { action } => commands::user::run(action),
        Commands::Complete(args) => commands::complete::run(args),
        Commands::Visible(args) => commands::visible::run(args),
        Commands::Snapshot { action } => commands::snapshot::run(action),
        Commands::Config { action } => commands::config::run(action),
    };

    if let Err(e) = result {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}
