use super::{Distributions, Support};
use crate::error::DistrlError;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

/// How an action is chosen from value distributions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionSelection {
    /// Argmax of the expected values.
    Greedy,

    /// Argmax of one sampled return per action.
    Sampled,
}

/// Variants of categorical distributional DQN.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub enum Variant {
    /// Bootstrap action from the target network.
    C51,

    /// Bootstrap action from the online network.
    C51Double,

    /// Sampled training actions with double bootstrap selection.
    C51Ts,
}

impl Default for Variant {
    fn default() -> Self {
        Self::C51
    }
}

impl fmt::Display for Variant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::C51 => "c51",
            Self::C51Double => "c51_double",
            Self::C51Ts => "c51_ts",
        };
        f.write_str(s)
    }
}

impl FromStr for Variant {
    type Err = DistrlError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().replace('-', "_").as_str() {
            "c51" => Ok(Self::C51),
            "c51_double" | "double_c51" => Ok(Self::C51Double),
            "c51_ts" | "c51ts" => Ok(Self::C51Ts),
            _ => Err(DistrlError::config(format!("unknown C51 variant '{}'", s))),
        }
    }
}

impl Variant {
    /// Action selection in training.
    pub fn train_selection(&self) -> ActionSelection {
        match self {
            Self::C51Ts => ActionSelection::Sampled,
            _ => ActionSelection::Greedy,
        }
    }

    /// Action selection in evaluation. Always greedy.
    pub fn eval_selection(&self) -> ActionSelection {
        ActionSelection::Greedy
    }

    /// Returns `true` if the bootstrap action is chosen by the online network.
    pub fn uses_online_bootstrap(&self) -> bool {
        !matches!(self, Self::C51)
    }

    /// Selects one action per state.
    pub fn select_actions<R: Rng + ?Sized>(
        selection: ActionSelection,
        dists: &Distributions,
        support: &Support,
        rng: &mut R,
    ) -> Vec<usize> {
        match selection {
            ActionSelection::Greedy => dists.greedy_actions(support),
            ActionSelection::Sampled => dists.sampled_actions(support, rng),
        }
    }

    /// Projected target distributions `[batch, n_atoms]`.
    ///
    /// `target_next` are the target network's distributions at the next states.
    /// `online_next` must be given if [`Variant::uses_online_bootstrap`].
    pub fn bootstrap_target(
        &self,
        support: &Support,
        target_next: &Distributions,
        online_next: Option<&Distributions>,
        reward: &[f32],
        is_done: &[bool],
        gamma: f32,
    ) -> Result<Vec<f32>, DistrlError> {
        let actions = if self.uses_online_bootstrap() {
            let online = online_next.ok_or_else(|| {
                DistrlError::config(format!("{} requires online next-state distributions", self))
            })?;
            online.greedy_actions(support)
        } else {
            target_next.greedy_actions(support)
        };
        let target_z = target_next.select(&actions)?;
        support.project(&target_z, reward, is_done, gamma)
    }
}
