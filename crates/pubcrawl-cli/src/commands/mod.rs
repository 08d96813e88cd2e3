pub mod auth;
pub mod board;
pub mod config;
pub mod crawl;
pub mod route;

use clap::CommandFactory;
use pubcrawl_core::{Config, Session};
use serde::Serialize;

pub type CmdResult = Result<(), Box<dyn std::error::Error>>;

/// Pretty-print a value as JSON on stdout.
pub fn print_json<T: Serialize + ?Sized>(value: &T) -> CmdResult {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Load the config and open a session over the configured ledger.
pub fn open_session() -> Result<Session, Box<dyn std::error::Error>> {
    let config = Config::load()?;
    let session = Session::from_config(&config)?;
    tracing::debug!(ledger = %session.describe(), "session opened");
    Ok(session)
}

pub fn completions(shell: clap_complete::Shell) -> CmdResult {
    let mut cmd = crate::Cli::command();
    clap_complete::generate(shell, &mut cmd, "pubcrawl", &mut std::io::stdout());
    Ok(())
}
