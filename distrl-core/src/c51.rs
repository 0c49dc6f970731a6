//! Categorical distributional DQN agent.
mod base;
mod config;
pub use base::C51;
pub use config::C51Config;
