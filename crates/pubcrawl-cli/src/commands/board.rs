use pubcrawl_core::Achievement;
use serde_json::json;

use super::{open_session, print_json, CmdResult};

pub fn leaderboard(refresh: bool) -> CmdResult {
    let mut session = open_session()?;
    if refresh {
        session.refresh();
    }
    print_json(&session.leaderboard())
}

pub fn punishments(name: Option<&str>) -> CmdResult {
    let mut session = open_session()?;
    print_json(&session.punishments(name))
}

/// The achievement catalogue with configured points; with a name, whether
/// each one has been earned.
pub fn achievements(name: Option<&str>) -> CmdResult {
    let mut session = open_session()?;
    let participant = match name {
        Some(name) => Some(session.participant(name)?),
        None => None,
    };
    let scoring = session.scoring();

    let rows: Vec<_> = Achievement::ALL
        .iter()
        .map(|&a| {
            let mut row = json!({
                "id": a.id(),
                "title": a.title(),
                "description": a.description(),
                "points": scoring.points_for(a),
            });
            if let Some(p) = &participant {
                row["earned"] = json!(p.has(a));
            }
            row
        })
        .collect();
    print_json(&rows)
}
