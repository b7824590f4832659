#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Once-per-session tutorial hints that animate a marker between two points.

use std::{collections::HashSet, fmt, time::Duration};

use horde_core::Waypoint;
use tracing::debug;

/// Tutorial hints the board knows how to show.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum HintKind {
    /// Drag a block onto the nearest valid grid cell.
    BlockPlacement,
    /// Drag a grid expansion block onto the nearest land tile.
    GridExpansion,
}

/// Engine-side renderer for the hint marker.
pub trait HintPresenter {
    /// Shows the marker; returns `false` when it cannot be displayed.
    fn present(&mut self, kind: HintKind, from: Waypoint, to: Waypoint) -> bool;

    /// Removes the marker.
    fn dismiss(&mut self, kind: HintKind);
}

/// Configuration parameters required to construct the hint board.
#[derive(Clone, Copy, Debug)]
pub struct Config {
    cycle: Duration,
}

impl Config {
    /// Creates a configuration where the marker travels once per `cycle`.
    #[must_use]
    pub const fn new(cycle: Duration) -> Self {
        Self { cycle }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::new(Duration::from_secs(2))
    }
}

#[derive(Clone, Copy, Debug)]
struct ActiveHint {
    kind: HintKind,
    from: Waypoint,
    to: Waypoint,
    elapsed: Duration,
}

type CompletionObserver = Box<dyn FnMut(HintKind)>;

/// Shows at most one hint at a time and each kind at most once per session.
pub struct HintBoard<P> {
    presenter: P,
    cycle: Duration,
    shown: HashSet<HintKind>,
    active: Option<ActiveHint>,
    observers: Vec<CompletionObserver>,
}

impl<P: fmt::Debug> fmt::Debug for HintBoard<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HintBoard")
            .field("presenter", &self.presenter)
            .field("cycle", &self.cycle)
            .field("shown", &self.shown)
            .field("active", &self.active)
            .field("observers", &self.observers.len())
            .finish()
    }
}

impl<P: HintPresenter> HintBoard<P> {
    /// Creates an empty board.
    pub fn new(config: Config, presenter: P) -> Self {
        Self {
            presenter,
            cycle: config.cycle,
            shown: HashSet::new(),
            active: None,
            observers: Vec::new(),
        }
    }

    /// Provides read-only access to the presenter.
    #[must_use]
    pub fn presenter(&self) -> &P {
        &self.presenter
    }

    /// Registers a callback invoked whenever a hint completes.
    pub fn on_completed(&mut self, observer: impl FnMut(HintKind) + 'static) {
        self.observers.push(Box::new(observer));
    }

    /// Starts the hint unless it was already shown or another hint is active.
    ///
    /// The kind counts as shown even when the presenter refuses it.
    pub fn show(&mut self, kind: HintKind, from: Waypoint, to: Waypoint) -> bool {
        if self.shown.contains(&kind) || self.active.is_some() {
            return false;
        }

        let _ = self.shown.insert(kind);
        if !self.presenter.present(kind, from, to) {
            debug!(?kind, "hint presenter unavailable");
            return false;
        }

        self.active = Some(ActiveHint {
            kind,
            from,
            to,
            elapsed: Duration::ZERO,
        });
        true
    }

    /// Advances the marker animation.
    pub fn advance(&mut self, dt: Duration) {
        if let Some(active) = self.active.as_mut() {
            active.elapsed = active.elapsed.saturating_add(dt);
        }
    }

    /// Current marker position; the animation loops from `from` to `to`.
    #[must_use]
    pub fn marker_position(&self) -> Option<Waypoint> {
        let active = self.active.as_ref()?;
        if self.cycle.is_zero() {
            return Some(active.to);
        }

        let cycle = self.cycle.as_nanos();
        let phase = active.elapsed.as_nanos() % cycle;
        let t = phase as f64 / cycle as f64;
        Some(active.from.lerp(active.to, t as f32))
    }

    /// Any player input ends the active hint.
    pub fn player_input(&mut self) {
        self.complete();
    }

    /// Ends the active hint and notifies observers.
    pub fn complete(&mut self) {
        let Some(active) = self.active.take() else {
            return;
        };

        self.presenter.dismiss(active.kind);
        debug!(kind = ?active.kind, "hint completed");
        for observer in &mut self.observers {
            observer(active.kind);
        }
    }

    /// Forgets every shown hint and removes the active one without notifying.
    pub fn reset_all(&mut self) {
        self.shown.clear();
        if let Some(active) = self.active.take() {
            self.presenter.dismiss(active.kind);
        }
    }

    /// Reports whether the kind was already shown this session.
    #[must_use]
    pub fn has_shown(&self, kind: HintKind) -> bool {
        self.shown.contains(&kind)
    }

    /// Reports whether a hint is currently displayed.
    #[must_use]
    pub fn is_showing(&self) -> bool {
        self.active.is_some()
    }
}
