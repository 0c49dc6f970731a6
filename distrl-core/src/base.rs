//! Core traits: environment, observation, policy and agent.
mod agent;
mod env;
mod policy;
mod space;
mod step;
pub use agent::Agent;
pub use env::Env;
pub use policy::Policy;
pub use space::Space;
pub use step::{Info, Step};

use num_traits::AsPrimitive;
use std::fmt::Debug;

/// Element type of an observation frame: `u8` pixels or `f32` features.
///
/// The default value is the zero used to pad stacked states.
pub trait FrameElem: Copy + Default + Debug + Send + Sync + 'static + AsPrimitive<f32> {}

impl<T> FrameElem for T where T: Copy + Default + Debug + Send + Sync + 'static + AsPrimitive<f32> {}

/// A single raw observation frame of fixed length.
pub trait Obs: Clone + Debug {
    /// Element type of the frame.
    type Elem: FrameElem;

    /// Flattened frame.
    fn frame(&self) -> &[Self::Elem];
}

impl<T: FrameElem> Obs for Vec<T> {
    type Elem = T;

    fn frame(&self) -> &[T] {
        self.as_slice()
    }
}

/// Element type of the frames observed in `E`.
pub type ObsElem<E> = <<E as Env>::Obs as Obs>::Elem;
