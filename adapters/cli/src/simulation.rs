use std::{fmt, path::Path, time::Duration};

use anyhow::{Context, Result};
use horde_content::{LevelPath, WaveContent};
use horde_core::{
    EnemyArchetype, EnemyFactory, EnemyInstance, EnemyStats, Event, SkipReason, Turn, Waypoint,
};
use horde_system_composer::turn_rng;
use horde_system_spawning::{Config, SpawnSequencer};
use tracing::info;

/// Parameters of a single simulated wave.
#[derive(Clone, Copy, Debug)]
pub(crate) struct SimulationOptions {
    pub(crate) turn: u32,
    pub(crate) seed: u64,
    pub(crate) tick: Duration,
    pub(crate) cancel_after: Option<Duration>,
}

/// Content and path loaded from disk, ready to be replayed.
#[derive(Debug)]
pub(crate) struct Simulation {
    content: WaveContent,
    path: LevelPath,
}

impl Simulation {
    pub(crate) fn load(content: &Path, path: &Path) -> Result<Self> {
        let content = WaveContent::load(content)
            .with_context(|| format!("failed to load wave content from {}", content.display()))?;
        let path = LevelPath::load(path)
            .with_context(|| format!("failed to load level path from {}", path.display()))?;
        Ok(Self { content, path })
    }

    /// Releases the requested wave frame by frame until the sequencer goes idle.
    pub(crate) fn run(&self, options: &SimulationOptions) -> Result<SpawnReport> {
        let turn = Turn::try_from(i64::from(options.turn))?;
        let mut rng = turn_rng(options.seed, turn);
        info!(%turn, seed = options.seed, "simulating wave");

        let mut sequencer = SpawnSequencer::new(Config::new(
            self.content.spawn_interval(),
            *self.content.scaling(),
        ));
        let mut world = RecordingWorld::default();
        let mut events = Vec::new();
        sequencer
            .begin_wave(
                options.turn,
                self.content.waves(),
                &self.path,
                &mut rng,
                &mut events,
            )
            .with_context(|| format!("failed to start wave for turn {turn}"))?;

        let mut clock = Duration::ZERO;
        while sequencer.is_spawning() {
            if options.cancel_after.is_some_and(|limit| clock >= limit) {
                let _ = sequencer.cancel(&mut events);
                break;
            }
            let frame = [Event::TimeAdvanced { dt: options.tick }];
            sequencer.handle(&frame, &mut world, &mut events);
            clock = clock.saturating_add(options.tick);
        }

        Ok(SpawnReport {
            seed: options.seed,
            events,
            enemies: world.enemies,
        })
    }
}

/// Enemy as observed by the recording world.
#[derive(Debug)]
pub(crate) struct RecordedEnemy {
    position: Waypoint,
    path_len: usize,
    stats: Option<EnemyStats>,
}

impl EnemyInstance for RecordedEnemy {
    fn initialize(&mut self, path: &[Waypoint]) {
        self.path_len = path.len();
    }

    fn set_stats(&mut self, stats: EnemyStats) {
        self.stats = Some(stats);
    }
}

#[derive(Debug, Default)]
struct RecordingWorld {
    enemies: Vec<RecordedEnemy>,
}

impl EnemyFactory for RecordingWorld {
    type Enemy = RecordedEnemy;

    fn create(&mut self, _archetype: &EnemyArchetype, at: Waypoint) -> &mut RecordedEnemy {
        let index = self.enemies.len();
        self.enemies.push(RecordedEnemy {
            position: at,
            path_len: 0,
            stats: None,
        });
        &mut self.enemies[index]
    }
}

/// Outcome of a simulated wave.
#[derive(Debug)]
pub(crate) struct SpawnReport {
    seed: u64,
    events: Vec<Event>,
    enemies: Vec<RecordedEnemy>,
}

impl fmt::Display for SpawnReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "seed: {}", self.seed)?;
        let mut enemies = self.enemies.iter();
        for event in &self.events {
            match event {
                Event::TimeAdvanced { .. } => {}
                Event::WaveStarted { turn, planned } => {
                    writeln!(f, "turn {turn}: wave started, {planned} planned")?;
                }
                Event::WaveSkipped { turn, reason } => {
                    let reason = match reason {
                        SkipReason::MissingPath => "no path",
                        SkipReason::NoRangeForTurn => "no turn range",
                    };
                    writeln!(f, "turn {turn}: wave skipped ({reason})")?;
                }
                Event::EnemySpawned {
                    ordinal,
                    archetype,
                    at,
                    ..
                } => {
                    write!(f, "{:>9.3}s  #{ordinal:<4} {archetype:<12}", at.as_secs_f64())?;
                    if let Some(enemy) = enemies.next() {
                        if let Some(stats) = enemy.stats {
                            write!(
                                f,
                                " hp {:>7.1} dmg {:>5.1} spd {:>5.2}",
                                stats.health, stats.damage, stats.speed
                            )?;
                        }
                        write!(
                            f,
                            "  at ({:.1}, {:.1}, {:.1}) over {} waypoints",
                            enemy.position.x, enemy.position.y, enemy.position.z, enemy.path_len
                        )?;
                    }
                    writeln!(f)?;
                }
                Event::WaveCompleted { turn, spawned } => {
                    writeln!(f, "turn {turn}: wave completed, {spawned} spawned")?;
                }
                Event::WaveCancelled {
                    turn,
                    spawned,
                    remaining,
                } => {
                    writeln!(
                        f,
                        "turn {turn}: wave cancelled, {spawned} spawned, {remaining} discarded"
                    )?;
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const WAVES: &str = include_str!("../../../assets/waves.toml");
    const PATH: &str = include_str!("../../../assets/path.toml");

    fn simulation() -> Simulation {
        Simulation {
            content: WaveContent::from_toml_str(WAVES).expect("shipped waves parse"),
            path: LevelPath::from_toml_str(PATH).expect("shipped path parses"),
        }
    }

    fn options(turn: u32) -> SimulationOptions {
        SimulationOptions {
            turn,
            seed: 11,
            tick: Duration::from_millis(16),
            cancel_after: None,
        }
    }

    #[test]
    fn wave_runs_to_completion() {
        let report = simulation().run(&options(2)).expect("wave runs");

        assert_eq!(report.enemies.len(), 5);
        assert!(report
            .enemies
            .iter()
            .all(|enemy| enemy.stats.is_some() && enemy.path_len == 5));
        assert!(matches!(
            report.events.last(),
            Some(Event::WaveCompleted { spawned: 5, .. })
        ));
        assert!(report.to_string().contains("wave completed, 5 spawned"));
    }

    #[test]
    fn same_seed_replays_the_same_wave() {
        let simulation = simulation();
        let first = simulation.run(&options(7)).expect("wave runs");
        let second = simulation.run(&options(7)).expect("wave runs");
        assert_eq!(first.events, second.events);
    }

    #[test]
    fn cancellation_discards_pending_enemies() {
        let report = simulation()
            .run(&SimulationOptions {
                cancel_after: Some(Duration::from_millis(400)),
                ..options(3)
            })
            .expect("wave runs");

        assert_eq!(report.enemies.len(), 2);
        assert!(matches!(
            report.events.last(),
            Some(Event::WaveCancelled {
                spawned: 2,
                remaining: 5,
                ..
            })
        ));
    }

    #[test]
    fn turn_zero_is_rejected() {
        assert!(simulation().run(&options(0)).is_err());
    }
}
