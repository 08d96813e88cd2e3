use clap::{Parser, Subcommand};
use pubcrawl_core::Config;
use tracing_subscriber::EnvFilter;

mod commands;

#[derive(Parser)]
#[command(name = "pubcrawl", version, about = "12 pubs of Christmas crawl tracker")]
pub(crate) struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Register a participant (no-op if already registered)
    Join {
        /// Participant name
        name: String,
    },
    /// Complete the participant's current pub
    Complete { name: String },
    /// Spin the punishment wheel for a participant
    Spin {
        name: String,
        /// Seed the wheel for a reproducible spin
        #[arg(long)]
        seed: Option<u64>,
    },
    /// Show a participant's progress and next pub
    Status { name: String },
    /// Re-check a participant's achievements
    Evaluate { name: String },
    /// Show standings
    Leaderboard {
        /// Bypass the cached snapshot
        #[arg(long)]
        refresh: bool,
    },
    /// List logged punishments
    Punishments {
        /// Only this participant's punishments
        #[arg(long)]
        name: Option<String>,
    },
    /// List achievements, or one participant's earned/unearned achievements
    Achievements {
        #[arg(long)]
        name: Option<String>,
    },
    /// Show the route with each pub's rule
    Route {
        /// Mark pubs completed by this participant
        #[arg(long)]
        name: Option<String>,
    },
    /// Print the route as GeoJSON
    Map {
        /// Mark pubs completed by this participant
        #[arg(long)]
        name: Option<String>,
    },
    /// Safety tips and emergency contacts
    Safety,
    /// Clear all participants and punishments
    Reset {
        /// Confirm the reset
        #[arg(long)]
        yes: bool,
    },
    /// Configuration management
    Config {
        #[command(subcommand)]
        action: commands::config::ConfigAction,
    },
    /// Authentication management for the GitHub ledger
    Auth {
        #[command(subcommand)]
        action: commands::auth::AuthAction,
    },
    /// Generate shell completions
    Completions {
        shell: clap_complete::Shell,
    },
}

fn init_tracing() {
    let filter = EnvFilter::try_from_env("PUBCRAWL_LOG")
        .or_else(|_| EnvFilter::try_new(Config::load_or_default().log.filter))
        .unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn main() {
    init_tracing();

    let cli = Cli::parse();
    let result = match cli.command {
        Commands::Join { name } => commands::crawl::join(&name),
        Commands::Complete { name } => commands::crawl::complete(&name),
        Commands::Spin { name, seed } => commands::crawl::spin(&name, seed),
        Commands::Status { name } => commands::crawl::status(&name),
        Commands::Evaluate { name } => commands::crawl::evaluate(&name),
        Commands::Leaderboard { refresh } => commands::board::leaderboard(refresh),
        Commands::Punishments { name } => commands::board::punishments(name.as_deref()),
        Commands::Achievements { name } => commands::board::achievements(name.as_deref()),
        Commands::Route { name } => commands::route::route(name.as_deref()),
        Commands::Map { name } => commands::route::map(name.as_deref()),
        Commands::Safety => commands::route::safety(),
        Commands::Reset { yes } => commands::crawl::reset(yes),
        Commands::Config { action } => commands::config::run(action),
        Commands::Auth { action } => commands::auth::run(action),
        Commands::Completions { shell } => commands::completions(shell),
    };

    if let Err(e) = result {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}
