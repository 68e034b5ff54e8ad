//! Engine configuration.
//!
//! A [`Config`] is built once, validated, and then passed by reference into
//! the search and the playout policy. Defaults come from
//! [`constants`](crate::constants).

use thiserror::Error;

use crate::constants::{
    ALPHA, ARENA_CAPACITY, BETA, BRIDGE_WEIGHT, CELLS, EXPAND_VISITS, GAMMA, RESOURCES_PART,
};

/// How new children are seeded and when nodes get expanded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Initialization {
    /// No priors; expand on the first visit.
    Plain = 0,
    /// `gamma` virtual visits at a 50% win rate; expand on the first visit.
    EvenPriors = 1,
    /// Even priors plus `bridge_weight` virtual wins for bridge moves.
    BridgePriors = 2,
    /// Bridge priors, but expansion waits for `EXPAND_VISITS` visits.
    Delayed = 3,
}

impl Initialization {
    /// Scheme for a numeric selector, as used by the text protocol.
    pub fn from_index(index: u32) -> Option<Self> {
        match index {
            0 => Some(Self::Plain),
            1 => Some(Self::EvenPriors),
            2 => Some(Self::BridgePriors),
            3 => Some(Self::Delayed),
            _ => None,
        }
    }

    /// Visits a node needs before it is expanded.
    pub fn expand_threshold(self) -> u32 {
        match self {
            Self::Delayed => EXPAND_VISITS,
            _ => 1,
        }
    }

    pub fn uses_priors(self) -> bool {
        self != Self::Plain
    }

    pub fn uses_bridge_priors(self) -> bool {
        matches!(self, Self::BridgePriors | Self::Delayed)
    }
}

/// Named strategy switches, each consulted at one decision point.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Toggles {
    /// Forced-move pruning at expansion (immediate wins and single blocks).
    pub hacks: bool,
    /// Playouts avoid filling carriers of their own intact bridges.
    pub avoiding_bridges: bool,
    /// Playouts answer a bridge intrusion by taking the other carrier.
    pub defending_bridges: bool,
    /// Playouts prefer local ring-pattern replies to the last move.
    pub patterns: bool,
    /// Playouts stop at the first edge-to-edge connection.
    pub detect_wins: bool,
    /// RAVE statistics in selection and backpropagation.
    pub rave: bool,
    /// Moves from the tree path also count as AMAF moves.
    pub path_amaf: bool,
    /// New children inherit RAVE counters from two plies up the path.
    pub path_rave: bool,
    /// Expansion skips cells no connection of either player can use.
    pub flood_fill: bool,
    /// Prior bonus for cells on one shortest connection of the mover.
    pub single_shortest: bool,
    /// Prior bonus for cells on any shortest connection of either player.
    pub all_shortest: bool,
}

impl Default for Toggles {
    fn default() -> Self {
        Self {
            hacks: true,
            avoiding_bridges: true,
            defending_bridges: true,
            patterns: true,
            detect_wins: true,
            rave: true,
            path_amaf: false,
            path_rave: false,
            flood_fill: false,
            single_shortest: false,
            all_shortest: false,
        }
    }
}

/// Rejected configuration values.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("alpha must be finite and non-negative, got {0}")]
    Alpha(f32),

    #[error("beta must be finite and positive, got {0}")]
    Beta(f32),

    #[error("gamma must be finite and non-negative, got {0}")]
    Gamma(f32),

    #[error("resources part must be in (0, 1], got {0}")]
    ResourcesPart(f64),

    #[error("at least one search thread is required")]
    Threads,

    #[error("arena capacity {0} cannot hold an expanded root (needs more than {})", CELLS)]
    ArenaCapacity(usize),
}

/// Search configuration, immutable while a search runs.
#[derive(Debug, Clone)]
pub struct Config {
    /// UCT exploration constant.
    pub alpha: f32,
    /// RAVE equivalence parameter.
    pub beta: f32,
    /// Virtual visits of the even prior.
    pub gamma: f32,
    pub initialization: Initialization,
    /// Virtual wins for bridge-creating or bridge-saving children.
    pub bridge_weight: u32,
    /// Fraction of the remaining clock a single move may use.
    pub resources_part: f64,
    pub toggles: Toggles,
    /// Worker threads per search.
    pub threads: usize,
    /// Base RNG seed; a fresh random seed is drawn per search when `None`.
    pub seed: Option<u64>,
    /// Node arena size.
    pub arena_capacity: usize,
    /// Keep the subtree of the moves actually played between searches.
    pub reuse_tree: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            alpha: ALPHA,
            beta: BETA,
            gamma: GAMMA,
            initialization: Initialization::BridgePriors,
            bridge_weight: BRIDGE_WEIGHT,
            resources_part: RESOURCES_PART,
            toggles: Toggles::default(),
            threads: std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1),
            seed: None,
            arena_capacity: ARENA_CAPACITY,
            reuse_tree: true,
        }
    }
}

impl Config {
    /// Single-threaded, seeded configuration for reproducible runs.
    pub fn deterministic(seed: u64) -> Self {
        Self {
            threads: 1,
            seed: Some(seed),
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.alpha.is_finite() || self.alpha < 0.0 {
            return Err(ConfigError::Alpha(self.alpha));
        }
        if !self.beta.is_finite() || self.beta <= 0.0 {
            return Err(ConfigError::Beta(self.beta));
        }
        if !self.gamma.is_finite() || self.gamma < 0.0 {
            return Err(ConfigError::Gamma(self.gamma));
        }
        if !(self.resources_part > 0.0 && self.resources_part <= 1.0) {
            return Err(ConfigError::ResourcesPart(self.resources_part));
        }
        if self.threads == 0 {
            return Err(ConfigError::Threads);
        }
        if self.arena_capacity <= CELLS {
            return Err(ConfigError::ArenaCapacity(self.arena_capacity));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        assert_eq!(Config::default().validate(), Ok(()));
        assert_eq!(Config::deterministic(7).validate(), Ok(()));
    }

    #[test]
    fn test_rejects_bad_values() {
        let cfg = Config {
            resources_part: 0.0,
            ..Config::default()
        };
        assert_eq!(cfg.validate(), Err(ConfigError::ResourcesPart(0.0)));

        let cfg = Config {
            threads: 0,
            ..Config::default()
        };
        assert_eq!(cfg.validate(), Err(ConfigError::Threads));

        let cfg = Config {
            beta: 0.0,
            ..Config::default()
        };
        assert_eq!(cfg.validate(), Err(ConfigError::Beta(0.0)));

        let cfg = Config {
            arena_capacity: 10,
            ..Config::default()
        };
        assert_eq!(cfg.validate(), Err(ConfigError::ArenaCapacity(10)));
    }

    #[test]
    fn test_initialization_selector() {
        assert_eq!(Initialization::from_index(0), Some(Initialization::Plain));
        assert_eq!(Initialization::from_index(3), Some(Initialization::Delayed));
        assert_eq!(Initialization::from_index(4), None);
        assert_eq!(Initialization::Plain.expand_threshold(), 1);
        assert_eq!(Initialization::Delayed.expand_threshold(), EXPAND_VISITS);
        assert!(!Initialization::EvenPriors.uses_bridge_priors());
    }
}
