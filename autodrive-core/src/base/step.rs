//! Environment step.
use super::Env;

/// Additional information to the observation and the reward of a step.
pub trait Info {}

impl Info for () {}

/// Represents the outcome `(o_t+1, r_t, done)` of applying an action
/// to the simulator, with some additional information.
pub struct Step<E: Env> {
    /// Raw observation after the action.
    pub obs: E::Obs,

    /// Reward.
    pub reward: f32,

    /// Flag denoting if the episode is terminated, e.g., by a collision.
    pub is_terminated: bool,

    /// Flag denoting if the episode is truncated, e.g., by a time limit.
    pub is_truncated: bool,

    /// Information defined by the environment.
    pub info: E::Info,
}

impl<E: Env> Step<E> {
    /// Constructs a [`Step`] object.
    pub fn new(
        obs: E::Obs,
        reward: f32,
        is_terminated: bool,
        is_truncated: bool,
        info: E::Info,
    ) -> Self {
        Step {
            obs,
            reward,
            is_terminated,
            is_truncated,
            info,
        }
    }

    #[inline]
    /// Terminated or truncated.
    pub fn is_done(&self) -> bool {
        self.is_terminated || self.is_truncated
    }
}

/// A transition `(o_t, a_t, r_t, o_t+1, done)` pushed into the memory of an agent.
///
/// Observations are the encoded ones, not the raw observations of the simulator.
#[derive(Clone, Debug, PartialEq)]
pub struct Transition<O> {
    /// Observation before the action.
    pub obs: O,

    /// Index of the discrete action.
    pub act: usize,

    /// Reward.
    pub reward: f32,

    /// Observation after the action.
    pub next_obs: O,

    /// `1` if the action ended the episode, `0` otherwise.
    pub is_done: i8,
}

impl<O> Transition<O> {
    /// Constructs a [`Transition`].
    pub fn new(obs: O, act: usize, reward: f32, next_obs: O, is_done: bool) -> Self {
        Self {
            obs,
            act,
            reward,
            next_obs,
            is_done: is_done as i8,
        }
    }
}
