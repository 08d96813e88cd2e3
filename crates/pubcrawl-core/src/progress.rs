//! Progress engine: advancing a participant along the route.

use serde::{Deserialize, Serialize};

use crate::ledger::Participant;
use crate::route::Route;

/// Result of completing a stop.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletedStop {
    pub index: usize,
    pub stop: String,
    pub points_awarded: u64,
    /// True when this was the last stop on the route.
    pub finished_route: bool,
}

/// Mark the participant's current stop as done and pay the per-stop award.
///
/// Returns `None` without touching the participant once the route is finished,
/// so repeated calls at the end never duplicate entries or points.
pub fn complete_current_stop(
    participant: &mut Participant,
    route: &Route,
    award: u64,
) -> Option<CompletedStop> {
    let index = participant.current_stop;
    let stop = route.stop(index)?;

    participant.completed_stops.push(stop.name.clone());
    participant.current_stop += 1;
    participant.points += award;

    debug_assert_eq!(participant.completed_stops.len(), participant.current_stop);
    Some(CompletedStop {
        index,
        stop: stop.name.clone(),
        points_awarded: award,
        finished_route: participant.current_stop == route.len(),
    })
}
