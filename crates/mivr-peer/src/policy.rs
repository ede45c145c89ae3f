//! Action selection for the reference peer.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::environment::{Action, Observation};

/// How the peer picks its next action.
///
/// None of these try to maximize anything. They exist to exercise a renderer
/// end to end.
#[derive(Debug, Clone)]
pub enum Policy {
    /// Always [`Action::Hold`]: the renderer keeps its pose.
    Hold,
    /// Uniform over all actions.
    Random(StdRng),
    /// Replay a fixed list of actions, cycling at the end. No actions holds.
    Scripted { actions: Vec<Action>, cursor: usize },
}

impl Policy {
    /// Random policy seeded from the OS, or from `seed` for reproducible runs.
    pub fn random(seed: Option<u64>) -> Self {
        match seed {
            Some(seed) => Self::Random(StdRng::seed_from_u64(seed)),
            None => Self::Random(StdRng::from_os_rng()),
        }
    }

    /// An empty script behaves like [`Policy::Hold`].
    pub fn scripted(actions: Vec<Action>) -> Self {
        if actions.is_empty() {
            return Self::Hold;
        }
        Self::Scripted { actions, cursor: 0 }
    }

    pub fn choose(&mut self, _observation: &Observation) -> Action {
        match self {
            Self::Hold => Action::Hold,
            Self::Random(rng) => Action::ALL[rng.random_range(0..Action::ALL.len())],
            Self::Scripted { actions, .. } if actions.is_empty() => Action::Hold,
            Self::Scripted { actions, cursor } => {
                let i = *cursor % actions.len();
                *cursor = (i + 1) % actions.len();
                actions[i]
            }
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Hold => "hold",
            Self::Random(_) => "random",
            Self::Scripted { .. } => "scripted",
        }
    }
}
