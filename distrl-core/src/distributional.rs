//! Categorical value distributions over a fixed support.
//!
//! [`Support::project`] maps a next-state distribution through the distributional
//! Bellman operator `Tz = r + gamma * (1 - done) * z` and distributes the mass of each
//! shifted atom onto its two neighbouring atoms of the support.
//!
//! ```mermaid
//! graph LR
//!     A[target net] -->|Distributions| B[Variant::bootstrap_target]
//!     C[online net] -.->|double selection| B
//!     B -->|p at bootstrap action| D[Support::project]
//!     D -->|target| E[DistributionalModel::train_step]
//! ```
mod distributions;
mod model;
mod support;
mod variant;
pub use distributions::{argmax, Distributions};
pub use model::DistributionalModel;
pub use support::{Support, SupportConfig};
pub use variant::{ActionSelection, Variant};
