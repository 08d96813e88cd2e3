//! Leaderboard standings.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use crate::ledger::ParticipantTable;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Standing {
    /// 1-based; tied entries share a rank.
    pub rank: usize,
    pub name: String,
    pub points: u64,
    pub completed: usize,
    pub achievements: usize,
}

/// Rank participants by points, then stops completed, then name.
pub fn leaderboard(table: &ParticipantTable) -> Vec<Standing> {
    let mut rows: Vec<Standing> = table
        .iter()
        .map(|p| Standing {
            rank: 0,
            name: p.name.clone(),
            points: p.points,
            completed: p.completed_count(),
            achievements: p.achievements.len(),
        })
        .collect();

    rows.sort_by(|a, b| {
        b.points
            .cmp(&a.points)
            .then(b.completed.cmp(&a.completed))
            .then_with(|| a.name.cmp(&b.name))
    });

    let mut rank = 0;
    for i in 0..rows.len() {
        let tied = i > 0 && compare_score(&rows[i - 1], &rows[i]) == Ordering::Equal;
        if !tied {
            rank = i + 1;
        }
        rows[i].rank = rank;
    }
    rows
}

fn compare_score(a: &Standing, b: &Standing) -> Ordering {
    a.points.cmp(&b.points).then(a.completed.cmp(&b.completed))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::Participant;
    use chrono::Utc;

    fn player(name: &str, points: u64, completed: usize) -> Participant {
        let mut p = Participant::new(name, Utc::now()).unwrap();
        p.points = points;
        p.completed_stops = (0..completed).map(|i| format!("stop {i}")).collect();
        p.current_stop = completed;
        p
    }

    #[test]
    fn orders_by_points_then_progress_then_name() {
        let table = ParticipantTable::from_rows(vec![
            player("Ciaran", 300, 2),
            player("Aoife", 500, 3),
            player("Bronagh", 300, 3),
            player("Dara", 300, 2),
        ]);
        let board = leaderboard(&table);
        let order: Vec<(&str, usize)> = board.iter().map(|s| (s.name.as_str(), s.rank)).collect();
        assert_eq!(
            order,
            vec![("Aoife", 1), ("Bronagh", 2), ("Ciaran", 3), ("Dara", 3)]
        );
    }

    #[test]
    fn empty_table_gives_empty_board() {
        assert!(leaderboard(&ParticipantTable::new()).is_empty());
    }
}
