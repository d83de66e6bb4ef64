//! Agent.
use super::{Obs, Transition};
use crate::record::Record;
use anyhow::Result;
use std::path::Path;

/// Represents a trainable policy over a discrete action set.
///
/// The agent owns its memory of transitions (typically a replay buffer) and its
/// exploration schedule. The driver only pushes transitions, asks for updates
/// and reads or restores the exploration rate.
pub trait Agent<O: Obs> {
    /// Selects the index of an action, exploration included.
    fn get_action(&mut self, obs: &O) -> usize;

    /// Pushes a transition into the memory of the agent.
    fn save_transition(&mut self, transition: Transition<O>);

    /// Performs a learning update.
    ///
    /// The agent may skip the update, e.g., while its memory holds fewer
    /// transitions than a batch. Returns statistics of the update, if any.
    fn learn(&mut self) -> Result<Option<Record>>;

    /// Current exploration rate.
    fn epsilon(&self) -> f64;

    /// Overrides the exploration rate, used when training is resumed.
    fn set_epsilon(&mut self, epsilon: f64);

    /// The number of transitions in the memory.
    fn memory_len(&self) -> usize;

    /// The maximum number of transitions the memory holds.
    fn memory_capacity(&self) -> usize;

    /// Returns `true` if the memory holds as many transitions as its capacity.
    fn is_memory_full(&self) -> bool {
        self.memory_len() >= self.memory_capacity()
    }

    /// Save the parameters of the agent in the given directory.
    fn save_model(&self, path: &Path) -> Result<()>;

    /// Load the parameters of the agent from the given directory.
    fn load_model(&mut self, path: &Path) -> Result<()>;
}
