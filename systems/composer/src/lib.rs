#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Weighted archetype selection for a single wave.

use horde_core::{EnemyArchetype, Turn, TurnRange};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use sha2::{Digest, Sha256};
use thiserror::Error;
use tracing::trace;

const RNG_STREAM_COMPOSER: &str = "horde/composer";

/// Reasons a wave composition request may be rejected.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Error)]
pub enum ComposeError {
    /// The range has no archetypes, or all of their weights are zero.
    #[error("turn range {start}..={end} has no spawnable archetypes")]
    NoSpawnableArchetypes {
        /// First turn of the offending range.
        start: Turn,
        /// Last turn of the offending range.
        end: Turn,
    },
}

/// Draws archetypes from a turn range in proportion to their weights.
#[derive(Debug, Default)]
pub struct WaveComposer {
    cumulative: Vec<u64>,
}

impl WaveComposer {
    /// Creates a composer with an empty scratch buffer.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Performs `count` independent weighted draws from the range.
    ///
    /// Each draw samples `r` uniformly from `0..total` and picks the first
    /// archetype, in declaration order, whose cumulative weight exceeds `r`.
    /// Archetypes with zero weight are therefore never selected.
    pub fn select_enemies<'range, R>(
        &mut self,
        range: &'range TurnRange,
        count: u32,
        rng: &mut R,
    ) -> Result<Vec<&'range EnemyArchetype>, ComposeError>
    where
        R: Rng + ?Sized,
    {
        let archetypes = range.archetypes();
        let total = fill_cumulative(&mut self.cumulative, archetypes);
        if total == 0 {
            return Err(no_spawnable(range));
        }

        let mut selected = Vec::with_capacity(count as usize);
        for _ in 0..count {
            selected.push(&archetypes[weighted_index(&self.cumulative, total, rng)]);
        }
        Ok(selected)
    }
}

/// Owned weighted table for drawing one archetype at a time.
///
/// Draws follow the same rule as [`WaveComposer::select_enemies`], so a wave
/// can be composed lazily while it is released.
#[derive(Clone, Debug)]
pub struct ArchetypeTable {
    archetypes: Vec<EnemyArchetype>,
    cumulative: Vec<u64>,
    total: u64,
}

impl ArchetypeTable {
    /// Builds the table for a range; fails when nothing in it can be drawn.
    pub fn new(range: &TurnRange) -> Result<Self, ComposeError> {
        let mut cumulative = Vec::with_capacity(range.archetypes().len());
        let total = fill_cumulative(&mut cumulative, range.archetypes());
        if total == 0 {
            return Err(no_spawnable(range));
        }

        Ok(Self {
            archetypes: range.archetypes().to_vec(),
            cumulative,
            total,
        })
    }

    /// Sum of all spawn weights in the table; always positive.
    #[must_use]
    pub const fn total_weight(&self) -> u64 {
        self.total
    }

    /// Draws a single archetype.
    pub fn draw<R>(&self, rng: &mut R) -> &EnemyArchetype
    where
        R: Rng + ?Sized,
    {
        &self.archetypes[weighted_index(&self.cumulative, self.total, rng)]
    }
}

fn fill_cumulative(cumulative: &mut Vec<u64>, archetypes: &[EnemyArchetype]) -> u64 {
    cumulative.clear();
    let mut running = 0u64;
    for archetype in archetypes {
        running = running.saturating_add(u64::from(archetype.spawn_weight()));
        cumulative.push(running);
    }
    running
}

fn weighted_index<R: Rng + ?Sized>(cumulative: &[u64], total: u64, rng: &mut R) -> usize {
    let roll = rng.gen_range(0..total);
    let index = cumulative.partition_point(|&running| running <= roll);
    trace!(roll, index, "weighted draw");
    index
}

fn no_spawnable(range: &TurnRange) -> ComposeError {
    ComposeError::NoSpawnableArchetypes {
        start: range.start(),
        end: range.end(),
    }
}

/// Derives the deterministic random stream used to compose a turn's wave.
#[must_use]
pub fn turn_rng(global_seed: u64, turn: Turn) -> ChaCha8Rng {
    let mut hasher = Sha256::new();
    hasher.update(global_seed.to_le_bytes());
    hasher.update(turn.get().to_le_bytes());
    hasher.update(RNG_STREAM_COMPOSER.as_bytes());
    let digest = hasher.finalize();
    let mut seed = <ChaCha8Rng as SeedableRng>::Seed::default();
    let len = seed.len();
    seed.copy_from_slice(&digest[..len]);
    ChaCha8Rng::from_seed(seed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use horde_core::{ArchetypeKey, EnemyStats};

    fn turn(value: u32) -> Turn {
        Turn::new(value).expect("non-zero turn")
    }

    fn range(weights: &[(&str, u32)]) -> TurnRange {
        let archetypes = weights
            .iter()
            .map(|(key, weight)| {
                EnemyArchetype::new(
                    ArchetypeKey::new(*key),
                    *weight,
                    EnemyStats::new(10.0, 1.0, 1.0),
                )
            })
            .collect();
        TurnRange::new(turn(1), turn(5), archetypes).expect("valid range")
    }

    #[test]
    fn returns_exactly_the_requested_count() {
        let range = range(&[("a", 1), ("b", 3)]);
        let mut composer = WaveComposer::new();
        let mut rng = ChaCha8Rng::seed_from_u64(7);

        for count in [0, 1, 5, 37] {
            let selected = composer
                .select_enemies(&range, count, &mut rng)
                .expect("spawnable range");
            assert_eq!(selected.len(), count as usize);
        }
    }

    #[test]
    fn empty_range_is_degenerate() {
        let range = range(&[]);
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let error = WaveComposer::new()
            .select_enemies(&range, 3, &mut rng)
            .expect_err("no archetypes");
        assert_eq!(
            error,
            ComposeError::NoSpawnableArchetypes {
                start: turn(1),
                end: turn(5),
            }
        );
    }

    #[test]
    fn all_zero_weights_are_degenerate() {
        let range = range(&[("a", 0), ("b", 0)]);
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        assert!(WaveComposer::new()
            .select_enemies(&range, 1, &mut rng)
            .is_err());
    }

    #[test]
    fn zero_weight_archetypes_are_never_drawn() {
        let range = range(&[("never", 0), ("a", 2), ("also_never", 0), ("b", 2)]);
        let mut rng = ChaCha8Rng::seed_from_u64(99);
        let selected = WaveComposer::new()
            .select_enemies(&range, 2_000, &mut rng)
            .expect("spawnable range");
        assert!(selected
            .iter()
            .all(|archetype| archetype.spawn_weight() > 0));
    }

    #[test]
    fn draws_converge_to_weight_proportions() {
        let range = range(&[("grunt", 70), ("brute", 30)]);
        let mut rng = ChaCha8Rng::seed_from_u64(0x5eed);
        let draws = 20_000;
        let selected = WaveComposer::new()
            .select_enemies(&range, draws, &mut rng)
            .expect("spawnable range");

        let grunts = selected
            .iter()
            .filter(|archetype| archetype.key().as_str() == "grunt")
            .count();
        let share = grunts as f64 / f64::from(draws);
        assert!((share - 0.7).abs() < 0.02, "grunt share {share}");
    }

    #[test]
    fn single_archetype_always_wins() {
        let range = range(&[("only", 5)]);
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        let selected = WaveComposer::new()
            .select_enemies(&range, 10, &mut rng)
            .expect("spawnable range");
        assert!(selected
            .iter()
            .all(|archetype| archetype.key().as_str() == "only"));
    }

    #[test]
    fn table_rejects_degenerate_ranges() {
        let error = ArchetypeTable::new(&range(&[("a", 0)])).expect_err("zero weight");
        assert_eq!(
            error,
            ComposeError::NoSpawnableArchetypes {
                start: turn(1),
                end: turn(5),
            }
        );
    }

    #[test]
    fn table_draws_match_batch_selection() {
        let range = range(&[("never", 0), ("grunt", 70), ("brute", 30)]);
        let table = ArchetypeTable::new(&range).expect("spawnable range");
        assert_eq!(table.total_weight(), 100);

        let mut batch_rng = ChaCha8Rng::seed_from_u64(17);
        let mut table_rng = ChaCha8Rng::seed_from_u64(17);
        let batch = WaveComposer::new()
            .select_enemies(&range, 64, &mut batch_rng)
            .expect("spawnable range");
        for expected in batch {
            assert_eq!(table.draw(&mut table_rng), expected);
        }
    }

    #[test]
    fn turn_streams_are_deterministic_and_distinct() {
        let mut first = turn_rng(42, turn(3));
        let mut replay = turn_rng(42, turn(3));
        let mut other_turn = turn_rng(42, turn(4));

        let a: u64 = first.gen();
        let b: u64 = replay.gen();
        let c: u64 = other_turn.gen();
        assert_eq!(a, b);
        assert_ne!(a, c);
    }
}
