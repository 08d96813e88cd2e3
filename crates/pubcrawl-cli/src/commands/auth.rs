use std::time::Duration;

use clap::Subcommand;
use pubcrawl_core::integrations::github::{self, GitHubBlobStore};
use pubcrawl_core::Config;
use serde_json::json;

use super::{print_json, CmdResult};

#[derive(Subcommand)]
pub enum AuthAction {
    /// GitHub: login / logout / status
    Github {
        #[command(subcommand)]
        action: AuthOp,
    },
}

#[derive(Subcommand)]
pub enum AuthOp {
    /// Verify a personal access token and store it in the OS keyring
    Login {
        /// Token with contents read/write access to the ledger repository
        #[arg(long)]
        token: Option<String>,
    },
    /// Remove the stored token
    Logout,
    /// Check authentication status
    Status,
}

pub fn run(action: AuthAction) -> CmdResult {
    match action {
        AuthAction::Github { action: op } => handle_github(op),
    }
}

fn handle_github(op: AuthOp) -> CmdResult {
    match op {
        AuthOp::Login { token } => {
            let token = token
                .or_else(|| std::env::var(github::TOKEN_ENV).ok())
                .filter(|t| !t.trim().is_empty())
                .ok_or("--token is required (or set PUBCRAWL_GITHUB_TOKEN)")?;

            let config = Config::load()?;
            let gh = &config.store.github;
            let store = GitHubBlobStore::new(
                &gh.api_url,
                &gh.owner,
                &gh.repo,
                &gh.branch,
                Some(token.trim().to_string()),
                Duration::from_secs(gh.timeout_secs),
            )?;
            let login = store.authenticated_user()?;
            github::save_token(&token)?;
            print_json(&json!({ "github": "authenticated", "login": login }))
        }
        AuthOp::Logout => {
            github::forget_token()?;
            print_json(&json!({ "github": "logged_out" }))
        }
        AuthOp::Status => {
            let status = match github::resolve_token() {
                Some((_, source)) => json!({ "authenticated": true, "source": source.as_str() }),
                None => json!({ "authenticated": false }),
            };
            print_json(&status)
        }
    }
}
