//! Achievement evaluation.
//!
//! Every achievement is a predicate over the participant's current state and
//! their rows in the punishment log. [`evaluate`] checks all predicates and
//! grants the ones not yet earned, so it can be called after every action
//! without double-paying.

use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::ledger::{Participant, PunishmentLog};
use crate::punishment::PunishmentWheel;
use crate::route::Route;
use crate::storage::ScoringConfig;

/// Stop index whose rule is "No Swearing Challenge".
const SILENT_STOP: usize = 2;
/// Stop index whose rule is "No Phones".
const PHONE_FREE_STOP: usize = 4;

const HALFWAY: usize = 6;
const RULE_BREAKER_SPINS: usize = 3;
const THEMED_SPINS: usize = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Achievement {
    FirstTimer,
    HalfwayHero,
    ChallengeChampion,
    RuleBreaker,
    DanceMaster,
    KaraokeKing,
    SilentWarrior,
    PhoneFreeZone,
    PerfectRun,
    PunishmentCollector,
    SpeedDemon,
    GoldenRoute,
}

impl Achievement {
    pub const ALL: [Achievement; 12] = [
        Achievement::FirstTimer,
        Achievement::HalfwayHero,
        Achievement::ChallengeChampion,
        Achievement::RuleBreaker,
        Achievement::DanceMaster,
        Achievement::KaraokeKing,
        Achievement::SilentWarrior,
        Achievement::PhoneFreeZone,
        Achievement::PerfectRun,
        Achievement::PunishmentCollector,
        Achievement::SpeedDemon,
        Achievement::GoldenRoute,
    ];

    /// Stable identifier used in storage and config.
    pub fn id(&self) -> &'static str {
        match self {
            Achievement::FirstTimer => "first_timer",
            Achievement::HalfwayHero => "halfway_hero",
            Achievement::ChallengeChampion => "challenge_champion",
            Achievement::RuleBreaker => "rule_breaker",
            Achievement::DanceMaster => "dance_master",
            Achievement::KaraokeKing => "karaoke_king",
            Achievement::SilentWarrior => "silent_warrior",
            Achievement::PhoneFreeZone => "phone_free_zone",
            Achievement::PerfectRun => "perfect_run",
            Achievement::PunishmentCollector => "punishment_collector",
            Achievement::SpeedDemon => "speed_demon",
            Achievement::GoldenRoute => "golden_route",
        }
    }

    pub fn title(&self) -> &'static str {
        match self {
            Achievement::FirstTimer => "First Timer",
            Achievement::HalfwayHero => "Halfway Hero",
            Achievement::ChallengeChampion => "Challenge Champion",
            Achievement::RuleBreaker => "Rule Breaker",
            Achievement::DanceMaster => "Dance Master",
            Achievement::KaraokeKing => "Karaoke King/Queen",
            Achievement::SilentWarrior => "Silent Warrior",
            Achievement::PhoneFreeZone => "Phone Free Zone",
            Achievement::PerfectRun => "Perfect Run",
            Achievement::PunishmentCollector => "Punishment Collector",
            Achievement::SpeedDemon => "Speed Demon",
            Achievement::GoldenRoute => "Golden Route",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Achievement::FirstTimer => "Complete your first pub",
            Achievement::HalfwayHero => "Complete six pubs",
            Achievement::ChallengeChampion => "Complete all twelve pubs",
            Achievement::RuleBreaker => "Receive three punishments",
            Achievement::DanceMaster => "Do the Irish dance punishment twice",
            Achievement::KaraokeKing => "Sing the Christmas carol punishment twice",
            Achievement::SilentWarrior => "Get through the No Swearing pub without a punishment",
            Achievement::PhoneFreeZone => "Get through the No Phones pub without a punishment",
            Achievement::PerfectRun => "Finish the route without a single punishment",
            Achievement::PunishmentCollector => "Receive every punishment on the wheel",
            Achievement::SpeedDemon => "Finish the route within the time limit",
            Achievement::GoldenRoute => "Finish every pub in route order",
        }
    }

    /// Bonus paid out when unlocked, before config overrides.
    pub fn default_points(&self) -> u64 {
        match self {
            Achievement::FirstTimer => 100,
            Achievement::HalfwayHero => 250,
            Achievement::ChallengeChampion => 500,
            Achievement::RuleBreaker => 150,
            Achievement::DanceMaster => 150,
            Achievement::KaraokeKing => 150,
            Achievement::SilentWarrior => 200,
            Achievement::PhoneFreeZone => 200,
            Achievement::PerfectRun => 500,
            Achievement::PunishmentCollector => 400,
            Achievement::SpeedDemon => 400,
            Achievement::GoldenRoute => 300,
        }
    }
}

impl fmt::Display for Achievement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

impl FromStr for Achievement {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let needle = s.trim();
        Achievement::ALL
            .iter()
            .copied()
            .find(|a| a.id() == needle || a.title().eq_ignore_ascii_case(needle))
            .ok_or_else(|| format!("unknown achievement: {needle}"))
    }
}

/// Everything besides the participant and the log that predicates look at.
pub struct EvalContext<'a> {
    pub route: &'a Route,
    pub wheel: &'a PunishmentWheel,
    pub scoring: &'a ScoringConfig,
    pub now: DateTime<Utc>,
}

/// A freshly granted achievement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Unlock {
    pub achievement: Achievement,
    pub points: u64,
}

/// True when `completed` is exactly the first `completed.len()` stops of the route.
pub fn follows_canonical_order<'a, I>(completed: &[String], canonical: I) -> bool
where
    I: IntoIterator<Item = &'a str>,
{
    let mut canonical = canonical.into_iter();
    completed
        .iter()
        .all(|done| canonical.next().is_some_and(|expected| expected == done.as_str()))
}

fn mentions(log: &PunishmentLog, name: &str, phrase: &str) -> usize {
    log.for_participant(name)
        .filter(|r| r.punishment.to_lowercase().contains(phrase))
        .count()
}

fn clean_at(participant: &Participant, log: &PunishmentLog, route: &Route, index: usize) -> bool {
    let Some(stop) = route.stop(index) else {
        return false;
    };
    participant.completed_count() > index && log.count_at_stop(&participant.name, &stop.name) == 0
}

/// Whether `achievement`'s predicate holds right now, ignoring whether it was already earned.
pub fn is_satisfied(
    achievement: Achievement,
    participant: &Participant,
    log: &PunishmentLog,
    ctx: &EvalContext<'_>,
) -> bool {
    let completed = participant.completed_count();
    let finished = completed >= ctx.route.len();
    let name = participant.name.as_str();

    match achievement {
        Achievement::FirstTimer => completed >= 1,
        Achievement::HalfwayHero => completed >= HALFWAY,
        Achievement::ChallengeChampion => finished,
        Achievement::RuleBreaker => log.count_for(name) >= RULE_BREAKER_SPINS,
        Achievement::DanceMaster => mentions(log, name, "irish dance") >= THEMED_SPINS,
        Achievement::KaraokeKing => mentions(log, name, "christmas carol") >= THEMED_SPINS,
        Achievement::SilentWarrior => clean_at(participant, log, ctx.route, SILENT_STOP),
        Achievement::PhoneFreeZone => clean_at(participant, log, ctx.route, PHONE_FREE_STOP),
        Achievement::PerfectRun => finished && log.count_for(name) == 0,
        Achievement::PunishmentCollector => {
            let received: HashSet<&str> = log
                .for_participant(name)
                .map(|r| r.punishment.as_str())
                .collect();
            !ctx.wheel.is_empty() && ctx.wheel.entries().iter().all(|e| received.contains(e.as_str()))
        }
        Achievement::SpeedDemon => {
            let window = Duration::hours(i64::from(ctx.scoring.speed_demon_hours));
            finished && ctx.now - participant.start_time <= window
        }
        Achievement::GoldenRoute => {
            finished && follows_canonical_order(&participant.completed_stops, ctx.route.names())
        }
    }
}

/// Grant every achievement whose predicate holds and that the participant lacks.
///
/// Mutates the participant's achievement set and points; returns what was unlocked.
pub fn evaluate(
    participant: &mut Participant,
    log: &PunishmentLog,
    ctx: &EvalContext<'_>,
) -> Vec<Unlock> {
    let mut unlocked = Vec::new();
    for achievement in Achievement::ALL {
        if participant.has(achievement) || !is_satisfied(achievement, participant, log, ctx) {
            continue;
        }
        let points = ctx.scoring.points_for(achievement);
        participant.achievements.insert(achievement);
        participant.points += points;
        tracing::info!(
            participant = %participant.name,
            achievement = achievement.id(),
            points,
            "achievement unlocked"
        );
        unlocked.push(Unlock { achievement, points });
    }
    unlocked
}
