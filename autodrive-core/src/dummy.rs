//! Deterministic stand-ins for the simulator, the encoder and the agent.
//!
//! These are used in tests and for dry runs of the driver without a simulator server.
use crate::{
    error::DriverError, record::Record, Agent, Connection, Encoder, Env, Step, Transition,
};
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::{
    collections::VecDeque,
    fs::{self, File},
    io::{BufReader, Write},
    path::Path,
};

/// Steering change per action index away from the neutral action.
const STEER_UNIT: f32 = 0.1;

/// Connection to an in-process lane simulator.
#[derive(Clone, Debug, Default)]
pub struct LoopbackConnection {
    refuse: bool,
}

impl LoopbackConnection {
    /// A connection that always succeeds.
    pub fn new() -> Self {
        Self { refuse: false }
    }

    /// A connection that is always refused.
    pub fn refusing() -> Self {
        Self { refuse: true }
    }
}

impl Connection for LoopbackConnection {
    type Session = ();

    fn setup(&self) -> Result<Self::Session> {
        match self.refuse {
            true => {
                let reason = "loopback configured to refuse".to_string();
                Err(DriverError::Connection(reason).into())
            }
            false => Ok(()),
        }
    }
}

/// Configuration of [`LaneEnv`].
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
pub struct LaneEnvConfig {
    /// Episodes are truncated after this number of steps.
    pub max_steps: usize,

    /// The car leaves the lane when the lateral offset exceeds this value.
    pub half_width: f32,

    /// Amplitude of the random lateral drift per step.
    pub drift: f32,

    /// The number of steering actions. The neutral action is in the middle.
    pub n_actions: usize,
}

impl Default for LaneEnvConfig {
    fn default() -> Self {
        Self {
            max_steps: 50,
            half_width: 1.0,
            drift: 0.1,
            n_actions: 7,
        }
    }
}

/// A car on a straight lane. The raw observation is the lateral offset from the centre.
pub struct LaneEnv {
    config: LaneEnvConfig,
    rng: fastrand::Rng,
    offset: f32,
    n_steps: usize,
}

impl Env for LaneEnv {
    type Config = LaneEnvConfig;
    type Obs = f32;
    type Info = ();
    type Session = ();

    fn build(config: &Self::Config, _session: Self::Session, seed: i64) -> Result<Self> {
        let rng = fastrand::Rng::new();
        rng.seed(seed as u64);
        Ok(Self {
            config: config.clone(),
            rng,
            offset: 0.0,
            n_steps: 0,
        })
    }

    fn reset(&mut self) -> Result<Self::Obs> {
        self.offset = (self.rng.f32() - 0.5) * self.config.half_width;
        self.n_steps = 0;
        Ok(self.offset)
    }

    fn step(&mut self, act: usize) -> Result<Step<Self>> {
        if act >= self.config.n_actions {
            anyhow::bail!("action {} out of range 0..{}", act, self.config.n_actions);
        }
        let neutral = (self.config.n_actions / 2) as f32;
        let steer = (act as f32 - neutral) * STEER_UNIT;
        let drift = (self.rng.f32() - 0.5) * self.config.drift;
        self.offset += steer + drift;
        self.n_steps += 1;

        let is_terminated = self.offset.abs() > self.config.half_width;
        let is_truncated = !is_terminated && self.n_steps >= self.config.max_steps;
        let reward = match is_terminated {
            true => -10.0,
            false => 1.0 - self.offset.abs() / self.config.half_width,
        };

        Ok(Step::new(self.offset, reward, is_terminated, is_truncated, ()))
    }

    fn n_actions(&self) -> usize {
        self.config.n_actions
    }
}

/// Encodes the lateral offset as its first `latent_dim` powers.
pub struct LaneEncoder {
    latent_dim: usize,
}

impl LaneEncoder {
    /// Constructs an encoder.
    pub fn new(latent_dim: usize) -> Self {
        Self { latent_dim }
    }
}

impl Encoder<LaneEnv> for LaneEncoder {
    type Obs = Vec<f32>;

    fn process(&mut self, raw: f32) -> Result<Self::Obs> {
        if self.latent_dim == 0 {
            anyhow::bail!("latent_dim must be positive");
        }
        Ok((1..=self.latent_dim).map(|i| raw.powi(i as i32)).collect())
    }
}

/// Configuration of [`DummyAgent`].
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
pub struct DummyAgentConfig {
    /// The number of discrete actions.
    pub n_actions: usize,

    /// Capacity of the transition memory.
    pub memory_capacity: usize,

    /// Learning starts when the memory holds this number of transitions.
    pub batch_size: usize,

    /// Exploration rate at the start.
    pub eps_start: f64,

    /// Lower bound of the exploration rate.
    pub eps_final: f64,

    /// Decrement of the exploration rate per learning update.
    pub eps_decay: f64,
}

impl Default for DummyAgentConfig {
    fn default() -> Self {
        Self {
            n_actions: 7,
            memory_capacity: 1000,
            batch_size: 32,
            eps_start: 1.0,
            eps_final: 0.05,
            eps_decay: 1e-3,
        }
    }
}

#[derive(Deserialize, Serialize)]
struct DummyAgentParams {
    n_learns: usize,
    epsilon: f64,
}

/// An epsilon-greedy agent steering towards the centre of the lane.
///
/// It does not learn anything. Learning updates only count and decay the exploration rate.
pub struct DummyAgent {
    config: DummyAgentConfig,
    epsilon: f64,
    memory: VecDeque<Transition<Vec<f32>>>,
    n_learns: usize,
}

impl DummyAgent {
    /// File of the parameters in the model directory.
    pub const MODEL_FILE: &'static str = "dummy_agent.yaml";

    /// Constructs an agent.
    pub fn build(config: DummyAgentConfig) -> Self {
        Self {
            epsilon: config.eps_start,
            memory: VecDeque::with_capacity(config.memory_capacity),
            config,
            n_learns: 0,
        }
    }

    /// The number of learning updates done so far.
    pub fn n_learns(&self) -> usize {
        self.n_learns
    }

    /// Transitions in the memory, oldest first.
    pub fn memory(&self) -> &VecDeque<Transition<Vec<f32>>> {
        &self.memory
    }

    fn greedy(&self, obs: &[f32]) -> usize {
        let neutral = (self.config.n_actions / 2) as f32;
        let offset = obs.first().copied().unwrap_or(0.0);
        let act = (neutral - offset / STEER_UNIT).round();
        act.max(0.0).min((self.config.n_actions - 1) as f32) as usize
    }
}

impl Agent<Vec<f32>> for DummyAgent {
    fn get_action(&mut self, obs: &Vec<f32>) -> usize {
        if fastrand::f64() < self.epsilon {
            fastrand::usize(..self.config.n_actions)
        } else {
            self.greedy(obs)
        }
    }

    fn save_transition(&mut self, transition: Transition<Vec<f32>>) {
        if self.config.memory_capacity == 0 {
            return;
        }
        if self.memory.len() == self.config.memory_capacity {
            self.memory.pop_front();
        }
        self.memory.push_back(transition);
    }

    fn learn(&mut self) -> Result<Option<Record>> {
        if self.memory.len() < self.config.batch_size {
            return Ok(None);
        }
        self.n_learns += 1;
        self.epsilon = (self.epsilon - self.config.eps_decay).max(self.config.eps_final);
        Ok(Some(Record::from_scalar("n_learns", self.n_learns as f32)))
    }

    fn epsilon(&self) -> f64 {
        self.epsilon
    }

    fn set_epsilon(&mut self, epsilon: f64) {
        self.epsilon = epsilon;
    }

    fn memory_len(&self) -> usize {
        self.memory.len()
    }

    fn memory_capacity(&self) -> usize {
        self.config.memory_capacity
    }

    fn save_model(&self, path: &Path) -> Result<()> {
        fs::create_dir_all(path)?;
        let params = DummyAgentParams {
            n_learns: self.n_learns,
            epsilon: self.epsilon,
        };
        let mut file = File::create(path.join(Self::MODEL_FILE))?;
        file.write_all(serde_yaml::to_string(&params)?.as_bytes())?;
        Ok(())
    }

    fn load_model(&mut self, path: &Path) -> Result<()> {
        let file = File::open(path.join(Self::MODEL_FILE))?;
        let params: DummyAgentParams = serde_yaml::from_reader(BufReader::new(file))?;
        self.n_learns = params.n_learns;
        self.epsilon = params.epsilon;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempdir::TempDir;

    #[test]
    fn test_lane_env_is_seeded() -> Result<()> {
        let config = LaneEnvConfig::default();
        let mut env1 = LaneEnv::build(&config, (), 3)?;
        let mut env2 = LaneEnv::build(&config, (), 3)?;
        assert_eq!(env1.reset()?, env2.reset()?);
        for act in [0usize, 3, 6, 3].iter() {
            assert_eq!(env1.step(*act)?.obs, env2.step(*act)?.obs);
        }
        Ok(())
    }

    #[test]
    fn test_lane_env_terminates_off_lane() -> Result<()> {
        let config = LaneEnvConfig {
            drift: 0.0,
            ..LaneEnvConfig::default()
        };
        let mut env = LaneEnv::build(&config, (), 0)?;
        env.reset()?;
        let mut last = None;
        for _ in 0..config.max_steps {
            let step = env.step(6)?;
            let done = step.is_done();
            last = Some(step);
            if done {
                break;
            }
        }
        let step = last.unwrap();
        assert!(step.is_terminated);
        assert!(!step.is_truncated);
        assert_eq!(step.reward, -10.0);
        assert!(env.step(7).is_err());
        Ok(())
    }

    #[test]
    fn test_lane_env_truncates() -> Result<()> {
        let config = LaneEnvConfig {
            drift: 0.0,
            max_steps: 5,
            ..LaneEnvConfig::default()
        };
        let mut env = LaneEnv::build(&config, (), 0)?;
        env.reset()?;
        let steps = (0..5).map(|_| env.step(3)).collect::<Result<Vec<_>>>()?;
        assert!(steps[..4].iter().all(|s| !s.is_done()));
        assert!(steps[4].is_truncated);
        Ok(())
    }

    #[test]
    fn test_encoder() -> Result<()> {
        let mut encoder = LaneEncoder::new(3);
        assert_eq!(encoder.process(0.5)?, vec![0.5, 0.25, 0.125]);
        assert!(LaneEncoder::new(0).process(0.5).is_err());
        Ok(())
    }

    #[test]
    fn test_dummy_agent_memory_and_learning() -> Result<()> {
        let mut agent = DummyAgent::build(DummyAgentConfig {
            memory_capacity: 3,
            batch_size: 2,
            eps_start: 0.5,
            eps_final: 0.45,
            eps_decay: 0.03,
            ..DummyAgentConfig::default()
        });
        let tr = |r: f32| Transition::new(vec![0f32], 3, r, vec![0f32], false);

        agent.save_transition(tr(1.0));
        assert!(agent.learn()?.is_none());
        for r in [2.0, 3.0, 4.0].iter() {
            agent.save_transition(tr(*r));
        }
        assert!(agent.is_memory_full());
        assert_eq!(agent.memory()[0].reward, 2.0);

        assert!(agent.learn()?.is_some());
        agent.learn()?;
        assert_eq!(agent.n_learns(), 2);
        assert!((agent.epsilon() - 0.45).abs() < 1e-12);
        Ok(())
    }

    #[test]
    fn test_dummy_agent_greedy_steers_to_centre() {
        let mut agent = DummyAgent::build(DummyAgentConfig {
            eps_start: 0.0,
            ..DummyAgentConfig::default()
        });
        assert_eq!(agent.get_action(&vec![0.0]), 3);
        assert_eq!(agent.get_action(&vec![0.2]), 1);
        assert_eq!(agent.get_action(&vec![-5.0]), 6);
    }

    #[test]
    fn test_dummy_agent_save_and_load() -> Result<()> {
        let dir = TempDir::new("dummy_agent")?;
        let mut agent = DummyAgent::build(DummyAgentConfig {
            batch_size: 0,
            ..DummyAgentConfig::default()
        });
        agent.learn()?;
        agent.save_model(dir.path())?;

        let mut agent_ = DummyAgent::build(DummyAgentConfig::default());
        agent_.load_model(dir.path())?;
        assert_eq!(agent_.n_learns(), 1);
        assert_eq!(agent_.epsilon(), agent.epsilon());
        Ok(())
    }

    #[test]
    fn test_refusing_connection() {
        assert!(LoopbackConnection::new().setup().is_ok());
        let err = LoopbackConnection::refusing().setup().unwrap_err();
        assert!(matches!(
            err.downcast_ref::<DriverError>(),
            Some(DriverError::Connection(_))
        ));
    }
}
