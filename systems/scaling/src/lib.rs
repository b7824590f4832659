#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Pure per-turn difficulty scaling.

use horde_core::{EnemyStats, ScalingConfig, Turn};

/// Derives enemy counts and stats for a turn from the scaling knobs.
#[derive(Clone, Copy, Debug, Default)]
pub struct StatScaler {
    config: ScalingConfig,
}

impl StatScaler {
    /// Creates a scaler using the supplied configuration.
    #[must_use]
    pub const fn new(config: ScalingConfig) -> Self {
        Self { config }
    }

    /// Scaling knobs backing this scaler.
    #[must_use]
    pub const fn config(&self) -> &ScalingConfig {
        &self.config
    }

    /// Number of enemies released on the turn; never less than one.
    #[must_use]
    pub fn count(&self, turn: Turn) -> u32 {
        let elapsed = i64::from(turn.elapsed());
        let count = i64::from(self.config.base_count)
            .saturating_add(elapsed.saturating_mul(i64::from(self.config.count_increment)));
        u32::try_from(count.max(1)).unwrap_or(u32::MAX)
    }

    /// Health of an enemy on the turn.
    #[must_use]
    pub fn health(&self, turn: Turn, base: f32) -> f32 {
        scale(turn, base, self.config.health_increment)
    }

    /// Damage of an enemy on the turn.
    #[must_use]
    pub fn damage(&self, turn: Turn, base: f32) -> f32 {
        scale(turn, base, self.config.damage_increment)
    }

    /// Speed of an enemy on the turn.
    #[must_use]
    pub fn speed(&self, turn: Turn, base: f32) -> f32 {
        scale(turn, base, self.config.speed_increment)
    }

    /// Applies every per-turn increment to a base stat block.
    #[must_use]
    pub fn stats(&self, turn: Turn, base: EnemyStats) -> EnemyStats {
        EnemyStats::new(
            self.health(turn, base.health),
            self.damage(turn, base.damage),
            self.speed(turn, base.speed),
        )
    }
}

fn scale(turn: Turn, base: f32, increment: f32) -> f32 {
    base + turn.elapsed() as f32 * increment
}
