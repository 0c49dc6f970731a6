#![warn(missing_docs)]
//! Core of a distributional deep Q-learning library.
//!
//! * [`replay_buffer`] - circular transition store rebuilding stacked states of
//!   consecutive frames
//! * [`explorer`] - epsilon-greedy exploration driven by a [`schedule::Schedule`]
//! * [`distributional`] - categorical support, Bellman projection and the
//!   action-selection variants C51, double C51 and Thompson-sampling C51
//! * [`C51`] - agent combining the above with a [`distributional::DistributionalModel`]
//! * [`Trainer`] - training loop, sequential or with collection and optimization
//!   overlapped on two threads
//! * [`record`], [`stats`] - metrics of a run
pub mod distributional;
pub mod dummy;
pub mod error;
pub mod evaluator;
pub mod explorer;
pub mod record;
pub mod replay_buffer;
pub mod schedule;
pub mod stats;

mod base;
pub use base::{Agent, Env, FrameElem, Info, Obs, ObsElem, Policy, Space, Step};

mod c51;
pub use c51::{C51Config, C51};

mod trainer;
pub use error::DistrlError;
pub use evaluator::{DefaultEvaluator, Evaluator};
pub use trainer::{
    is_train_tick, Cadence, ExecutionMode, Sampler, StopHandle, Trainer, TrainerConfig,
};
