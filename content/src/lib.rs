#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Static wave content: turn-range tables, scaling knobs and level paths.
//!
//! Content is authored as TOML, validated once at load time and then only
//! read. Range lookup scans in declaration order so overlapping ranges
//! resolve to whichever the author listed first.

use std::{
    fs, io,
    path::{Path, PathBuf},
    time::Duration,
};

use horde_core::{
    ArchetypeKey, EnemyArchetype, EnemyStats, InvertedRange, PathProvider, ScalingConfig, Turn,
    TurnRange, Waypoint,
};
use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Content schema version understood by this loader.
pub const SUPPORTED_CONTENT_VERSION: u32 = 1;

const DEFAULT_SPAWN_INTERVAL_MS: u64 = 300;

/// Errors raised while loading or validating content.
#[derive(Debug, Error)]
pub enum ContentError {
    /// The content file could not be read.
    #[error("failed to read content file {}", .path.display())]
    Io {
        /// File that was requested.
        path: PathBuf,
        /// Underlying I/O failure.
        #[source]
        source: io::Error,
    },
    /// The TOML document is malformed or does not match the schema.
    #[error("failed to parse content toml")]
    Parse(#[from] toml::de::Error),
    /// The document declares a schema version this loader does not know.
    #[error("unsupported content version {found}; expected {expected}")]
    UnsupportedVersion {
        /// Version declared by the document.
        found: u32,
        /// Version this loader understands.
        expected: u32,
    },
    /// A range bound uses turn zero.
    #[error("range #{index} uses turn 0; turns start at 1")]
    ZeroTurnBound {
        /// Position of the range in declaration order.
        index: usize,
    },
    /// A range ends before it starts.
    #[error("range #{index} is inverted")]
    InvertedRange {
        /// Position of the range in declaration order.
        index: usize,
        /// Bounds that were rejected.
        #[source]
        source: InvertedRange,
    },
    /// An archetype base stat is not a positive finite number.
    #[error("archetype `{key}` has base {stat} {value}; expected a positive finite number")]
    InvalidBaseStat {
        /// Archetype that failed validation.
        key: ArchetypeKey,
        /// Name of the offending stat.
        stat: &'static str,
        /// Rejected value.
        value: f32,
    },
    /// A per-turn stat increment is negative or not finite.
    #[error("scaling {name} must be a non-negative finite number, got {value}")]
    InvalidIncrement {
        /// Name of the offending knob.
        name: &'static str,
        /// Rejected value.
        value: f32,
    },
}

/// Ordered, read-only table of turn ranges.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct WaveConfiguration {
    ranges: Vec<TurnRange>,
}

impl WaveConfiguration {
    /// Creates a configuration from ranges in declaration order.
    #[must_use]
    pub fn new(ranges: Vec<TurnRange>) -> Self {
        Self { ranges }
    }

    /// Returns the first range, in declaration order, covering the turn.
    #[must_use]
    pub fn range_for_turn(&self, turn: Turn) -> Option<&TurnRange> {
        self.ranges.iter().find(|range| range.contains(turn))
    }

    /// All configured ranges in declaration order.
    #[must_use]
    pub fn ranges(&self) -> &[TurnRange] {
        &self.ranges
    }
}

/// Complete wave content loaded at startup.
#[derive(Clone, Debug, PartialEq)]
pub struct WaveContent {
    spawn_interval: Duration,
    scaling: ScalingConfig,
    waves: WaveConfiguration,
}

impl WaveContent {
    /// Assembles validated content from its parts.
    pub fn new(
        spawn_interval: Duration,
        scaling: ScalingConfig,
        waves: WaveConfiguration,
    ) -> Result<Self, ContentError> {
        validate_scaling(&scaling)?;
        Ok(Self {
            spawn_interval,
            scaling,
            waves,
        })
    }

    /// Loads content from the TOML file at the provided path.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ContentError> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path).map_err(|source| ContentError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let content = Self::from_toml_str(&contents)?;
        info!(
            path = %path.display(),
            ranges = content.waves.ranges().len(),
            "loaded wave content"
        );
        Ok(content)
    }

    /// Parses and validates content from a TOML document.
    pub fn from_toml_str(contents: &str) -> Result<Self, ContentError> {
        let raw: RawContent = toml::from_str(contents)?;
        if raw.version != SUPPORTED_CONTENT_VERSION {
            return Err(ContentError::UnsupportedVersion {
                found: raw.version,
                expected: SUPPORTED_CONTENT_VERSION,
            });
        }

        let mut ranges = Vec::with_capacity(raw.ranges.len());
        for (index, range) in raw.ranges.into_iter().enumerate() {
            ranges.push(range.into_turn_range(index)?);
        }
        log_range_diagnostics(&ranges);

        Self::new(
            Duration::from_millis(raw.spawning.interval_ms),
            raw.scaling,
            WaveConfiguration::new(ranges),
        )
    }

    /// Simulated time between two consecutive enemy releases.
    #[must_use]
    pub const fn spawn_interval(&self) -> Duration {
        self.spawn_interval
    }

    /// Per-turn difficulty knobs.
    #[must_use]
    pub const fn scaling(&self) -> &ScalingConfig {
        &self.scaling
    }

    /// Turn-range table used for archetype selection.
    #[must_use]
    pub const fn waves(&self) -> &WaveConfiguration {
        &self.waves
    }
}

/// Fixed route loaded from level content.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct LevelPath {
    waypoints: Vec<Waypoint>,
}

impl LevelPath {
    /// Creates a path from ordered waypoints.
    #[must_use]
    pub fn new(waypoints: Vec<Waypoint>) -> Self {
        Self { waypoints }
    }

    /// Loads a path from the TOML file at the provided path.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ContentError> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path).map_err(|source| ContentError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&contents)
    }

    /// Parses a path from a TOML document containing a `waypoints` array.
    pub fn from_toml_str(contents: &str) -> Result<Self, ContentError> {
        let raw: RawPath = toml::from_str(contents)?;
        Ok(Self::new(raw.waypoints))
    }
}

impl PathProvider for LevelPath {
    fn waypoints(&self) -> Option<&[Waypoint]> {
        Some(&self.waypoints)
    }
}

fn validate_scaling(scaling: &ScalingConfig) -> Result<(), ContentError> {
    let increments = [
        ("health_increment", scaling.health_increment),
        ("damage_increment", scaling.damage_increment),
        ("speed_increment", scaling.speed_increment),
    ];
    for (name, value) in increments {
        if !value.is_finite() || value < 0.0 {
            return Err(ContentError::InvalidIncrement { name, value });
        }
    }
    Ok(())
}

fn log_range_diagnostics(ranges: &[TurnRange]) {
    for (index, range) in ranges.iter().enumerate() {
        if range.total_weight() == 0 {
            warn!(
                index,
                start = range.start().get(),
                end = range.end().get(),
                "turn range has no spawnable archetypes"
            );
        }

        let shadowed_by = ranges[..index]
            .iter()
            .position(|earlier| earlier.start() <= range.end() && range.start() <= earlier.end());
        if let Some(earlier) = shadowed_by {
            debug!(index, earlier, "turn range overlaps an earlier range");
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawContent {
    version: u32,
    #[serde(default)]
    spawning: RawSpawning,
    #[serde(default)]
    scaling: ScalingConfig,
    #[serde(default)]
    ranges: Vec<RawRange>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawSpawning {
    #[serde(default = "default_interval_ms")]
    interval_ms: u64,
}

impl Default for RawSpawning {
    fn default() -> Self {
        Self {
            interval_ms: DEFAULT_SPAWN_INTERVAL_MS,
        }
    }
}

fn default_interval_ms() -> u64 {
    DEFAULT_SPAWN_INTERVAL_MS
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawRange {
    start: u32,
    end: u32,
    #[serde(default)]
    archetypes: Vec<RawArchetype>,
}

impl RawRange {
    fn into_turn_range(self, index: usize) -> Result<TurnRange, ContentError> {
        let (Some(start), Some(end)) = (Turn::new(self.start), Turn::new(self.end)) else {
            return Err(ContentError::ZeroTurnBound { index });
        };

        let archetypes = self
            .archetypes
            .into_iter()
            .map(RawArchetype::into_archetype)
            .collect::<Result<Vec<_>, _>>()?;

        TurnRange::new(start, end, archetypes)
            .map_err(|source| ContentError::InvertedRange { index, source })
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawArchetype {
    key: ArchetypeKey,
    weight: u32,
    base_health: f32,
    base_damage: f32,
    base_speed: f32,
}

impl RawArchetype {
    fn into_archetype(self) -> Result<EnemyArchetype, ContentError> {
        let stats = [
            ("health", self.base_health),
            ("damage", self.base_damage),
            ("speed", self.base_speed),
        ];
        for (stat, value) in stats {
            if !value.is_finite() || value <= 0.0 {
                return Err(ContentError::InvalidBaseStat {
                    key: self.key,
                    stat,
                    value,
                });
            }
        }

        Ok(EnemyArchetype::new(
            self.key,
            self.weight,
            EnemyStats::new(self.base_health, self.base_damage, self.base_speed),
        ))
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawPath {
    #[serde(default)]
    waypoints: Vec<Waypoint>,
}
