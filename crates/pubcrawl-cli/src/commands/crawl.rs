use pubcrawl_core::punishment::seeded_rng;
use serde_json::json;

use super::{open_session, print_json, CmdResult};

pub fn join(name: &str) -> CmdResult {
    let mut session = open_session()?;
    print_json(&session.register(name)?)
}

pub fn complete(name: &str) -> CmdResult {
    let mut session = open_session()?;
    print_json(&session.complete_current_stop(name)?)
}

pub fn spin(name: &str, seed: Option<u64>) -> CmdResult {
    let mut session = open_session()?;
    let outcome = match seed {
        Some(seed) => session.spin(name, &mut seeded_rng(seed))?,
        None => session.spin(name, &mut rand::thread_rng())?,
    };
    print_json(&outcome)
}

pub fn status(name: &str) -> CmdResult {
    let mut session = open_session()?;
    let participant = session.participant(name)?;
    let route = session.route();
    let next = route.stop(participant.current_stop).map(|stop| {
        json!({
            "order": participant.current_stop + 1,
            "name": stop.name,
            "rule": stop.rule,
        })
    });
    print_json(&json!({
        "finished": next.is_none(),
        "remaining": route.len().saturating_sub(participant.completed_count()),
        "next_stop": next,
        "participant": participant,
    }))
}

pub fn evaluate(name: &str) -> CmdResult {
    let mut session = open_session()?;
    print_json(&session.evaluate(name)?)
}

pub fn reset(yes: bool) -> CmdResult {
    if !yes {
        return Err("refusing to clear the ledger without --yes".into());
    }
    let mut session = open_session()?;
    session.reset()?;
    print_json(&json!({ "reset": true, "ledger": session.describe() }))
}
