#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Core contracts shared across the Horde wave engine.
//!
//! This crate defines the data model and message surface that connect the
//! content store, the pure systems, and adapters. Content is loaded once into
//! immutable [`TurnRange`] tables, systems derive spawn plans from a [`Turn`],
//! and the spawn sequencer reports progress by emitting [`Event`] values.
//! Engine-side collaborators are expressed as the [`PathProvider`],
//! [`EnemyFactory`] and [`EnemyInstance`] traits.

use std::{fmt, num::NonZeroU32, time::Duration};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Point in world space that enemies travel through.
pub type Waypoint = glam::Vec3;

/// Discrete wave index driving difficulty scaling, starting at one.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Turn(NonZeroU32);

impl Turn {
    /// The opening turn, which receives no scaling.
    pub const FIRST: Self = Self(NonZeroU32::MIN);

    /// Creates a turn from a one-based index. Returns `None` for zero.
    #[must_use]
    pub const fn new(value: u32) -> Option<Self> {
        match NonZeroU32::new(value) {
            Some(value) => Some(Self(value)),
            None => None,
        }
    }

    /// Retrieves the one-based turn index.
    #[must_use]
    pub const fn get(&self) -> u32 {
        self.0.get()
    }

    /// Number of turns completed before this one; the scaling multiplier.
    #[must_use]
    pub const fn elapsed(&self) -> u32 {
        self.0.get() - 1
    }
}

impl TryFrom<i64> for Turn {
    type Error = InvalidTurn;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        u32::try_from(value)
            .ok()
            .and_then(Self::new)
            .ok_or(InvalidTurn(value))
    }
}

impl fmt::Display for Turn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.get())
    }
}

/// Raised when a turn number outside `1..=u32::MAX` is requested.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Error)]
#[error("turn {0} is not a positive turn number")]
pub struct InvalidTurn(pub i64);

/// Identity of the prefab an archetype instantiates.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ArchetypeKey(String);

impl ArchetypeKey {
    /// Creates a new archetype key.
    #[must_use]
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// Borrow the key as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ArchetypeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(&self.0)
    }
}

/// Combat statistics carried by an enemy.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct EnemyStats {
    /// Hit points the enemy starts with.
    pub health: f32,
    /// Damage dealt when the enemy reaches its goal or attacks.
    pub damage: f32,
    /// Travel speed along the path in world units per second.
    pub speed: f32,
}

impl EnemyStats {
    /// Creates a new stat block.
    #[must_use]
    pub const fn new(health: f32, damage: f32, speed: f32) -> Self {
        Self {
            health,
            damage,
            speed,
        }
    }
}

/// Template describing an enemy before per-turn scaling.
#[derive(Clone, Debug, PartialEq)]
pub struct EnemyArchetype {
    key: ArchetypeKey,
    spawn_weight: u32,
    base: EnemyStats,
}

impl EnemyArchetype {
    /// Creates an archetype from its identity, draw weight and base stats.
    #[must_use]
    pub fn new(key: ArchetypeKey, spawn_weight: u32, base: EnemyStats) -> Self {
        Self {
            key,
            spawn_weight,
            base,
        }
    }

    /// Prefab identity of the archetype.
    #[must_use]
    pub fn key(&self) -> &ArchetypeKey {
        &self.key
    }

    /// Relative weight used by the weighted draw. Zero means never drawn.
    #[must_use]
    pub const fn spawn_weight(&self) -> u32 {
        self.spawn_weight
    }

    /// Unscaled stats applied at turn one.
    #[must_use]
    pub const fn base(&self) -> EnemyStats {
        self.base
    }
}

/// Inclusive span of turns sharing one weighted archetype list.
#[derive(Clone, Debug, PartialEq)]
pub struct TurnRange {
    start: Turn,
    end: Turn,
    archetypes: Vec<EnemyArchetype>,
}

impl TurnRange {
    /// Creates a range covering `start..=end`.
    pub fn new(
        start: Turn,
        end: Turn,
        archetypes: Vec<EnemyArchetype>,
    ) -> Result<Self, InvertedRange> {
        if end < start {
            return Err(InvertedRange { start, end });
        }

        Ok(Self {
            start,
            end,
            archetypes,
        })
    }

    /// First turn covered by the range.
    #[must_use]
    pub const fn start(&self) -> Turn {
        self.start
    }

    /// Last turn covered by the range.
    #[must_use]
    pub const fn end(&self) -> Turn {
        self.end
    }

    /// Archetypes eligible for selection, in declaration order.
    #[must_use]
    pub fn archetypes(&self) -> &[EnemyArchetype] {
        &self.archetypes
    }

    /// Reports whether the range covers the provided turn.
    #[must_use]
    pub fn contains(&self, turn: Turn) -> bool {
        self.start <= turn && turn <= self.end
    }

    /// Sum of all archetype weights.
    #[must_use]
    pub fn total_weight(&self) -> u64 {
        self.archetypes
            .iter()
            .map(|archetype| u64::from(archetype.spawn_weight()))
            .sum()
    }
}

/// Raised when a turn range ends before it starts.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Error)]
#[error("turn range ends at {end} before it starts at {start}")]
pub struct InvertedRange {
    /// First turn requested for the range.
    pub start: Turn,
    /// Last turn requested for the range.
    pub end: Turn,
}

/// Per-turn difficulty knobs applied on top of archetype base stats.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ScalingConfig {
    /// Enemies released on turn one.
    pub base_count: i32,
    /// Enemies added per turn after the first; may be negative.
    pub count_increment: i32,
    /// Health added per turn after the first.
    pub health_increment: f32,
    /// Damage added per turn after the first.
    pub damage_increment: f32,
    /// Speed added per turn after the first.
    pub speed_increment: f32,
}

impl Default for ScalingConfig {
    fn default() -> Self {
        Self {
            base_count: 3,
            count_increment: 2,
            health_increment: 15.0,
            damage_increment: 1.0,
            speed_increment: 1.2,
        }
    }
}

/// Reasons a requested wave released no enemies.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SkipReason {
    /// The path provider has no path, or the path has no waypoints.
    MissingPath,
    /// No configured turn range covers the requested turn.
    NoRangeForTurn,
}

/// Events emitted while waves are planned and released.
#[derive(Clone, Debug, PartialEq)]
pub enum Event {
    /// Indicates that the simulation clock advanced.
    TimeAdvanced {
        /// Duration of simulated time that elapsed.
        dt: Duration,
    },
    /// A wave was planned and the sequencer entered the spawning state.
    WaveStarted {
        /// Turn the wave belongs to.
        turn: Turn,
        /// Number of enemies that will be released.
        planned: u32,
    },
    /// A wave request completed immediately without spawning anything.
    WaveSkipped {
        /// Turn that was requested.
        turn: Turn,
        /// Why nothing was spawned.
        reason: SkipReason,
    },
    /// An enemy was created, placed on the path and given its stats.
    EnemySpawned {
        /// Turn the enemy belongs to.
        turn: Turn,
        /// Zero-based release order within the wave.
        ordinal: u32,
        /// Archetype the enemy was created from.
        archetype: ArchetypeKey,
        /// Scaled stats assigned to the enemy.
        stats: EnemyStats,
        /// Simulated time since the wave started at which the enemy was released.
        at: Duration,
    },
    /// Every planned enemy was released and the sequencer is idle again.
    WaveCompleted {
        /// Turn the wave belonged to.
        turn: Turn,
        /// Number of enemies released.
        spawned: u32,
    },
    /// The wave was cancelled before all enemies were released.
    WaveCancelled {
        /// Turn the wave belonged to.
        turn: Turn,
        /// Number of enemies released before cancellation.
        spawned: u32,
        /// Number of enemies that will no longer be released.
        remaining: u32,
    },
}

/// Supplies the route enemies follow from spawn to goal.
pub trait PathProvider {
    /// Ordered waypoints of the path, or `None` when no path is configured.
    fn waypoints(&self) -> Option<&[Waypoint]>;
}

impl<P: PathProvider> PathProvider for Option<P> {
    fn waypoints(&self) -> Option<&[Waypoint]> {
        self.as_ref().and_then(PathProvider::waypoints)
    }
}

/// Enemy living in the game world, configured right after creation.
pub trait EnemyInstance {
    /// Hands the enemy the full path it should follow.
    fn initialize(&mut self, path: &[Waypoint]);

    /// Assigns the scaled stats for the current turn.
    fn set_stats(&mut self, stats: EnemyStats);
}

/// Creates enemies inside the game world, which owns them from then on.
pub trait EnemyFactory {
    /// Concrete enemy type managed by the world.
    type Enemy: EnemyInstance;

    /// Instantiates an enemy of the archetype at the provided position.
    fn create(&mut self, archetype: &EnemyArchetype, at: Waypoint) -> &mut Self::Enemy;
}
