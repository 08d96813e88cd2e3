//! Per-invocation context tying the ledger, route, wheel and scoring together.
//!
//! Mutating operations always start from a fresh load, commit only the rows
//! they touched, and then refresh the cached snapshot so the caller reads its
//! own writes. Read operations are served from the cache until it is older
//! than the configured TTL.

use std::time::Duration;

use chrono::{DateTime, Utc};
use rand::Rng;
use serde::Serialize;

use crate::achievements::{self, EvalContext, Unlock};
use crate::error::{CoreError, ValidationError};
use crate::events::Event;
use crate::leaderboard::{self, Standing};
use crate::ledger::{normalize_name, Ledger, LedgerSnapshot, Participant, PunishmentRecord};
use crate::progress;
use crate::punishment::PunishmentWheel;
use crate::route::Route;
use crate::storage::{self, Config, ScoringConfig};

/// Time source, swappable in tests.
pub type Clock = fn() -> DateTime<Utc>;

/// What a mutating operation did.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ActionOutcome {
    /// The participant's row after the operation.
    pub participant: Participant,
    /// The punishment drawn, for spins.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub punishment: Option<PunishmentRecord>,
    pub events: Vec<Event>,
}

struct CachedSnapshot {
    snapshot: LedgerSnapshot,
    fetched_at: DateTime<Utc>,
}

pub struct Session {
    ledger: Box<dyn Ledger>,
    route: Route,
    wheel: PunishmentWheel,
    scoring: ScoringConfig,
    ttl: Duration,
    cache: Option<CachedSnapshot>,
    clock: Clock,
}

impl Session {
    pub fn new(
        ledger: Box<dyn Ledger>,
        route: Route,
        wheel: PunishmentWheel,
        scoring: ScoringConfig,
        ttl: Duration,
    ) -> Self {
        Self {
            ledger,
            route,
            wheel,
            scoring,
            ttl,
            cache: None,
            clock: Utc::now,
        }
    }

    /// Open the configured ledger and build a session over the Belfast route.
    pub fn from_config(config: &Config) -> Result<Self, CoreError> {
        let ledger = storage::open_ledger(config)?;
        Ok(Self::new(
            ledger,
            Route::belfast(),
            config.wheel()?,
            config.scoring.clone(),
            Duration::from_secs(config.cache.ttl_secs),
        ))
    }

    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    pub fn route(&self) -> &Route {
        &self.route
    }

    pub fn wheel(&self) -> &PunishmentWheel {
        &self.wheel
    }

    pub fn scoring(&self) -> &ScoringConfig {
        &self.scoring
    }

    pub fn describe(&self) -> String {
        self.ledger.describe()
    }

    fn now(&self) -> DateTime<Utc> {
        (self.clock)()
    }

    fn cache_is_fresh(&self, now: DateTime<Utc>) -> bool {
        self.cache.as_ref().is_some_and(|c| {
            (now - c.fetched_at)
                .to_std()
                .is_ok_and(|age| age < self.ttl)
        })
    }

    /// The cached snapshot, reloaded when older than the TTL.
    pub fn snapshot(&mut self) -> &LedgerSnapshot {
        let now = self.now();
        if self.cache_is_fresh(now) {
            tracing::debug!("ledger cache hit");
        } else {
            self.cache = None;
        }
        let ledger = &self.ledger;
        &self
            .cache
            .get_or_insert_with(|| CachedSnapshot {
                snapshot: ledger.load(),
                fetched_at: now,
            })
            .snapshot
    }

    /// Drop the cached snapshot so the next read goes to the store.
    pub fn refresh(&mut self) {
        self.cache = None;
    }

    fn fresh(&self, events: &mut Vec<Event>) -> LedgerSnapshot {
        let snapshot = self.ledger.load();
        let at = self.now();
        events.extend(snapshot.warnings.iter().map(|message| Event::StoreWarning {
            message: message.clone(),
            at,
        }));
        snapshot
    }

    fn participant_in(snapshot: &LedgerSnapshot, name: &str) -> Result<Participant, CoreError> {
        snapshot
            .participants
            .get(name)
            .cloned()
            .ok_or_else(|| ValidationError::UnknownParticipant(name.to_string()).into())
    }

    fn remember(&mut self, snapshot: LedgerSnapshot) {
        self.cache = Some(CachedSnapshot {
            snapshot,
            fetched_at: self.now(),
        });
    }

    fn unlock_events(&self, name: &str, unlocks: &[Unlock], at: DateTime<Utc>) -> Vec<Event> {
        unlocks
            .iter()
            .map(|u| Event::AchievementUnlocked {
                name: name.to_string(),
                achievement: u.achievement,
                title: u.achievement.title().to_string(),
                points: u.points,
                at,
            })
            .collect()
    }

    /// Register `name`, or return the existing row untouched.
    pub fn register(&mut self, name: &str) -> Result<ActionOutcome, CoreError> {
        let name = normalize_name(name)?;
        let mut events = Vec::new();
        let snapshot = self.fresh(&mut events);
        let now = self.now();

        if let Some(existing) = snapshot.participants.get(&name) {
            tracing::debug!(participant = %name, "already registered");
            let participant = existing.clone();
            self.remember(snapshot);
            return Ok(ActionOutcome {
                participant,
                punishment: None,
                events,
            });
        }

        let mut created = false;
        let stored = self.ledger.commit_with(&[], &mut |current: &LedgerSnapshot| {
            created = current.participants.get(&name).is_none();
            if !created {
                return Ok(vec![]);
            }
            Ok(vec![Participant::new(&name, now)?])
        })?;

        let participant = Self::participant_in(&stored, &name)?;
        if created {
            tracing::info!(participant = %name, "participant registered");
            events.push(Event::ParticipantRegistered { name, at: now });
        }
        self.remember(stored);
        Ok(ActionOutcome {
            participant,
            punishment: None,
            events,
        })
    }

    /// Complete the participant's current stop, then grant any achievements
    /// that became due. At the end of the route nothing is written.
    pub fn complete_current_stop(&mut self, name: &str) -> Result<ActionOutcome, CoreError> {
        let name = normalize_name(name)?;
        let mut events = Vec::new();
        let snapshot = self.fresh(&mut events);
        Self::participant_in(&snapshot, &name)?;
        let now = self.now();

        let ctx = EvalContext {
            route: &self.route,
            wheel: &self.wheel,
            scoring: &self.scoring,
            now,
        };
        let mut result = None;
        let stored = self.ledger.commit_with(&[], &mut |current: &LedgerSnapshot| {
            let mut participant = Self::participant_in(current, &name)?;
            result = progress::complete_current_stop(&mut participant, ctx.route, ctx.scoring.stop_award)
                .map(|done| {
                    let unlocks = achievements::evaluate(&mut participant, &current.punishments, &ctx);
                    (done, unlocks)
                });
            Ok(if result.is_some() { vec![participant] } else { vec![] })
        })?;
        let participant = Self::participant_in(&stored, &name)?;

        let Some((done, unlocks)) = result else {
            tracing::debug!(participant = %name, "route already finished");
            self.remember(stored);
            return Ok(ActionOutcome {
                participant,
                punishment: None,
                events,
            });
        };

        events.push(Event::StopCompleted {
            name: name.clone(),
            stop_index: done.index,
            stop: done.stop,
            points: done.points_awarded,
            at: now,
        });
        events.extend(self.unlock_events(&name, &unlocks, now));
        if done.finished_route {
            events.push(Event::RouteFinished {
                name: name.clone(),
                total_points: participant.points,
                at: now,
            });
        }
        self.remember(stored);
        Ok(ActionOutcome {
            participant,
            punishment: None,
            events,
        })
    }

    /// Spin the wheel for the participant at their current stop (the last
    /// stop once the route is finished) and log the result.
    ///
    /// The punishment is drawn once. The log row is written before any award
    /// it earns.
    pub fn spin<R: Rng + ?Sized>(
        &mut self,
        name: &str,
        rng: &mut R,
    ) -> Result<ActionOutcome, CoreError> {
        let name = normalize_name(name)?;
        let mut events = Vec::new();
        let snapshot = self.fresh(&mut events);
        let participant = Self::participant_in(&snapshot, &name)?;
        let now = self.now();

        let stop = self
            .route
            .stop(participant.current_stop)
            .or_else(|| self.route.stops().last())
            .map(|s| s.name.clone())
            .unwrap_or_default();
        let record = self.wheel.spin_for(rng, &name, &stop, now);

        let ctx = EvalContext {
            route: &self.route,
            wheel: &self.wheel,
            scoring: &self.scoring,
            now,
        };
        let mut unlocks = Vec::new();
        let stored = self.ledger.commit_with(
            std::slice::from_ref(&record),
            &mut |current: &LedgerSnapshot| {
                let mut participant = Self::participant_in(current, &name)?;
                unlocks = achievements::evaluate(&mut participant, &current.punishments, &ctx);
                Ok(if unlocks.is_empty() { vec![] } else { vec![participant] })
            },
        )?;
        tracing::info!(participant = %name, stop = %stop, punishment = %record.punishment, "punishment assigned");
        let participant = Self::participant_in(&stored, &name)?;

        events.push(Event::PunishmentAssigned {
            name: name.clone(),
            stop,
            punishment: record.punishment.clone(),
            at: now,
        });
        events.extend(self.unlock_events(&name, &unlocks, now));
        self.remember(stored);
        Ok(ActionOutcome {
            participant,
            punishment: Some(record),
            events,
        })
    }

    /// Re-run the achievement checks without otherwise changing state.
    pub fn evaluate(&mut self, name: &str) -> Result<ActionOutcome, CoreError> {
        let name = normalize_name(name)?;
        let mut events = Vec::new();
        let snapshot = self.fresh(&mut events);
        Self::participant_in(&snapshot, &name)?;
        let now = self.now();

        let ctx = EvalContext {
            route: &self.route,
            wheel: &self.wheel,
            scoring: &self.scoring,
            now,
        };
        let mut unlocks = Vec::new();
        let stored = self.ledger.commit_with(&[], &mut |current: &LedgerSnapshot| {
            let mut participant = Self::participant_in(current, &name)?;
            unlocks = achievements::evaluate(&mut participant, &current.punishments, &ctx);
            Ok(if unlocks.is_empty() { vec![] } else { vec![participant] })
        })?;
        let participant = Self::participant_in(&stored, &name)?;

        events.extend(self.unlock_events(&name, &unlocks, now));
        self.remember(stored);
        Ok(ActionOutcome {
            participant,
            punishment: None,
            events,
        })
    }

    pub fn participant(&mut self, name: &str) -> Result<Participant, CoreError> {
        let name = normalize_name(name)?;
        Self::participant_in(self.snapshot(), &name)
    }

    pub fn leaderboard(&mut self) -> Vec<Standing> {
        leaderboard::leaderboard(&self.snapshot().participants)
    }

    /// Logged punishments, optionally for one participant, oldest first.
    pub fn punishments(&mut self, name: Option<&str>) -> Vec<PunishmentRecord> {
        let name = name.map(str::trim);
        let log = &self.snapshot().punishments;
        match name {
            Some(name) => log.for_participant(name).cloned().collect(),
            None => log.rows().to_vec(),
        }
    }

    /// Clear both tables.
    pub fn reset(&mut self) -> Result<(), CoreError> {
        self.ledger.reset()?;
        self.cache = None;
        Ok(())
    }
}
