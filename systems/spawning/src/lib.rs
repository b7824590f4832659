#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Deterministic spawn sequencer that releases a wave one enemy at a time.
//!
//! The sequencer is a two-state machine. [`SpawnSequencer::begin_wave`]
//! resolves the turn range, fixes the enemy count and forks a composition
//! stream from the caller's RNG, then moves the sequencer from idle to
//! spawning. Simulated time is fed through [`SpawnSequencer::advance`] or
//! [`SpawnSequencer::handle`]; every time the configured interval elapses the
//! next archetype is drawn, scaled and created through the [`EnemyFactory`].
//! Memory use does not depend on the wave size. Once the last enemy has been
//! released and one further interval has passed, the sequencer returns to idle.

use std::time::Duration;

use horde_content::WaveConfiguration;
use horde_core::{
    EnemyFactory, EnemyInstance, Event, InvalidTurn, PathProvider, ScalingConfig, SkipReason,
    Turn, Waypoint,
};
use horde_system_composer::{ArchetypeTable, ComposeError};
use horde_system_scaling::StatScaler;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Configuration parameters required to construct the spawn sequencer.
#[derive(Clone, Copy, Debug)]
pub struct Config {
    spawn_interval: Duration,
    scaling: ScalingConfig,
}

impl Config {
    /// Creates a new configuration using the provided release cadence and scaling.
    #[must_use]
    pub const fn new(spawn_interval: Duration, scaling: ScalingConfig) -> Self {
        Self {
            spawn_interval,
            scaling,
        }
    }
}

/// Reasons a wave request may be rejected.
#[derive(Debug, Error)]
pub enum SpawnError {
    /// A wave is already being released; the request was ignored.
    #[error("a wave for turn {active} is still spawning")]
    AlreadySpawning {
        /// Turn of the wave currently being released.
        active: Turn,
    },
    /// The requested turn number is not positive.
    #[error(transparent)]
    InvalidTurn(#[from] InvalidTurn),
    /// The matching turn range cannot produce any enemies.
    #[error(transparent)]
    Composition(#[from] ComposeError),
}

/// Stateful system that owns at most one active wave.
#[derive(Debug)]
pub struct SpawnSequencer {
    spawn_interval: Duration,
    scaler: StatScaler,
    session: Option<SpawnSession>,
}

#[derive(Debug)]
struct SpawnSession {
    turn: Turn,
    table: ArchetypeTable,
    rng: ChaCha8Rng,
    remaining: u32,
    origin: Waypoint,
    path: Vec<Waypoint>,
    until_next: Duration,
    elapsed: Duration,
    released: u32,
}

impl SpawnSequencer {
    /// Creates an idle sequencer using the supplied configuration.
    #[must_use]
    pub fn new(config: Config) -> Self {
        Self {
            spawn_interval: config.spawn_interval,
            scaler: StatScaler::new(config.scaling),
            session: None,
        }
    }

    /// Reports whether a wave is currently being released.
    #[must_use]
    pub fn is_spawning(&self) -> bool {
        self.session.is_some()
    }

    /// Turn of the wave currently being released, if any.
    #[must_use]
    pub fn active_turn(&self) -> Option<Turn> {
        self.session.as_ref().map(|session| session.turn)
    }

    /// Plans the wave for `turn` and starts releasing it.
    ///
    /// Missing paths and turns without a configured range are not errors:
    /// they emit [`Event::WaveSkipped`] and leave the sequencer idle. The
    /// first enemy is released on the next call to [`Self::advance`].
    pub fn begin_wave<P, R>(
        &mut self,
        turn: u32,
        waves: &WaveConfiguration,
        paths: &P,
        rng: &mut R,
        out: &mut Vec<Event>,
    ) -> Result<(), SpawnError>
    where
        P: PathProvider + ?Sized,
        R: Rng + ?Sized,
    {
        if let Some(active) = self.active_turn() {
            warn!(requested = turn, %active, "wave requested while spawning");
            return Err(SpawnError::AlreadySpawning { active });
        }

        let turn = Turn::try_from(i64::from(turn))?;

        let Some(path) = paths.waypoints().filter(|waypoints| !waypoints.is_empty()) else {
            warn!(%turn, "no path configured; skipping wave");
            out.push(Event::WaveSkipped {
                turn,
                reason: SkipReason::MissingPath,
            });
            return Ok(());
        };

        let Some(range) = waves.range_for_turn(turn) else {
            warn!(%turn, "no turn range configured; skipping wave");
            out.push(Event::WaveSkipped {
                turn,
                reason: SkipReason::NoRangeForTurn,
            });
            return Ok(());
        };

        let table = ArchetypeTable::new(range)?;
        let count = self.scaler.count(turn);

        info!(%turn, planned = count, "wave started");
        out.push(Event::WaveStarted {
            turn,
            planned: count,
        });

        self.session = Some(SpawnSession {
            turn,
            table,
            rng: ChaCha8Rng::seed_from_u64(rng.gen()),
            remaining: count,
            origin: path[0],
            path: path.to_vec(),
            until_next: Duration::ZERO,
            elapsed: Duration::ZERO,
            released: 0,
        });
        Ok(())
    }

    /// Consumes events, advancing the active wave by every `TimeAdvanced` delta.
    pub fn handle<F>(&mut self, events: &[Event], factory: &mut F, out: &mut Vec<Event>)
    where
        F: EnemyFactory + ?Sized,
    {
        let mut accumulated = None;
        for event in events {
            if let Event::TimeAdvanced { dt } = event {
                accumulated = Some(
                    accumulated
                        .unwrap_or(Duration::ZERO)
                        .saturating_add(*dt),
                );
            }
        }

        if let Some(dt) = accumulated {
            self.advance(dt, factory, out);
        }
    }

    /// Advances the active wave by `dt` of simulated time.
    ///
    /// A large `dt` may release several enemies; their reported release
    /// offsets remain spaced by the configured interval.
    pub fn advance<F>(&mut self, dt: Duration, factory: &mut F, out: &mut Vec<Event>)
    where
        F: EnemyFactory + ?Sized,
    {
        let Some(session) = self.session.as_mut() else {
            return;
        };

        let mut budget = dt;
        loop {
            if session.until_next > budget {
                session.until_next -= budget;
                session.elapsed = session.elapsed.saturating_add(budget);
                return;
            }

            budget -= session.until_next;
            session.elapsed = session.elapsed.saturating_add(session.until_next);
            session.until_next = Duration::ZERO;

            if session.remaining == 0 {
                break;
            }
            session.release(&self.scaler, factory, out);
            session.until_next = self.spawn_interval;
        }

        if let Some(session) = self.session.take() {
            info!(turn = %session.turn, spawned = session.released, "wave completed");
            out.push(Event::WaveCompleted {
                turn: session.turn,
                spawned: session.released,
            });
        }
    }

    /// Stops the active wave, discarding enemies that were not yet released.
    ///
    /// Returns `false` when no wave was active.
    pub fn cancel(&mut self, out: &mut Vec<Event>) -> bool {
        let Some(session) = self.session.take() else {
            return false;
        };

        let remaining = session.remaining;
        info!(
            turn = %session.turn,
            spawned = session.released,
            remaining,
            "wave cancelled"
        );
        out.push(Event::WaveCancelled {
            turn: session.turn,
            spawned: session.released,
            remaining,
        });
        true
    }
}

impl SpawnSession {
    fn release<F>(&mut self, scaler: &StatScaler, factory: &mut F, out: &mut Vec<Event>)
    where
        F: EnemyFactory + ?Sized,
    {
        let archetype = self.table.draw(&mut self.rng);
        let stats = scaler.stats(self.turn, archetype.base());

        let enemy = factory.create(archetype, self.origin);
        enemy.initialize(&self.path);
        enemy.set_stats(stats);

        debug!(
            turn = %self.turn,
            ordinal = self.released,
            archetype = %archetype.key(),
            at_ms = self.elapsed.as_millis() as u64,
            "enemy released"
        );
        out.push(Event::EnemySpawned {
            turn: self.turn,
            ordinal: self.released,
            archetype: archetype.key().clone(),
            stats,
            at: self.elapsed,
        });
        self.remaining -= 1;
        self.released += 1;
    }
}
