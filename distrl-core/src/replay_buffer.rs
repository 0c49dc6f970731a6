//! Circular transition store with temporal frame stacking.
//!
//! [`ReplayBuffer`] keeps single frames with the action, reward and terminal flag that
//! followed them. Stacked states of `obs_len` consecutive frames are rebuilt on demand,
//! never crossing an episode boundary nor the oldest retained frame.
//! [`SharedReplayBuffer`] wraps the store for a collector thread and a learner thread.
mod base;
mod batch;
mod config;
mod shared;
pub use base::ReplayBuffer;
pub use batch::TransitionBatch;
pub use config::ReplayBufferConfig;
pub use shared::SharedReplayBuffer;
