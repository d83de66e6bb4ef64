#![warn(missing_docs)]
//! Core of the autodrive training driver.
//!
//! The driver runs an episodic reinforcement-learning loop against a driving
//! simulator. The learning agent, the simulator session and the observation
//! encoder are supplied by the user through the traits in this crate;
//! [`Driver`] only orchestrates them, keeps running statistics, writes
//! [`Checkpoint`]s and hands metrics to a [`Recorder`](record::Recorder).
pub mod dummy;
pub mod error;
pub mod record;

mod base;
pub use base::{Agent, Connection, Encoder, Env, Info, Obs, Step, Transition};

mod checkpoint;
pub use checkpoint::Checkpoint;

mod score;
pub use score::ScoreTracker;

mod driver;
pub use driver::{Driver, DriverConfig, Experiment, TrainSummary, WarmupPolicy, STEP_KEY};
