//! Capability interfaces of the collaborators driven by [`Driver`](crate::Driver).
mod agent;
mod env;
mod step;
pub use agent::Agent;
pub use env::{Connection, Encoder, Env};
use std::fmt::Debug;
pub use step::{Info, Step, Transition};

/// An observation given to an agent.
///
/// Raw simulator observations are converted into this type by an
/// [`Encoder`] before they reach the agent.
pub trait Obs: Clone + Debug {}

impl Obs for Vec<f32> {}
