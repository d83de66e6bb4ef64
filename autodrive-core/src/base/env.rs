//! Simulator session, environment and observation encoder.
use super::{Info, Obs, Step};
use anyhow::Result;

/// Opens a session with a simulator server.
pub trait Connection {
    /// A live session, typically a client handle and the simulated world.
    type Session;

    /// Connects to the server.
    fn setup(&self) -> Result<Self::Session>;
}

/// Represents an episodic driving environment with a discrete action set.
pub trait Env {
    /// Configurations.
    type Config: Clone;

    /// Raw observation of the simulator.
    type Obs;

    /// Information in the [`Step`] object.
    type Info: Info;

    /// Session the environment runs in.
    type Session;

    /// Builds an environment on a session with a given random seed.
    fn build(config: &Self::Config, session: Self::Session, seed: i64) -> Result<Self>
    where
        Self: Sized;

    /// Starts a new episode and returns its first observation.
    fn reset(&mut self) -> Result<Self::Obs>;

    /// Applies the action with index `act`.
    fn step(&mut self, act: usize) -> Result<Step<Self>>
    where
        Self: Sized;

    /// Returns the number of discrete actions. Valid indices are `0..n_actions()`.
    fn n_actions(&self) -> usize;
}

/// Converts raw observations of an environment into observations for an agent.
pub trait Encoder<E: Env> {
    /// Encoded observation.
    type Obs: Obs;

    /// Encodes a raw observation.
    fn process(&mut self, raw: E::Obs) -> Result<Self::Obs>;
}
