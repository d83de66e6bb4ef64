//! Configuration of [`Driver`](super::Driver).
use crate::error::DriverError;
use anyhow::Result;
use serde::{Deserialize, Serialize};
use serde_yaml::Value;
use std::{
    fmt,
    fs::File,
    io::{BufReader, Write},
    path::{Path, PathBuf},
    str::FromStr,
};

/// Kind of experiment run by the driver.
#[derive(Debug, Deserialize, Serialize, PartialEq, Eq, Clone, Copy)]
#[serde(rename_all = "lowercase")]
pub enum Experiment {
    /// Double deep Q-network.
    Ddqn,
}

impl Experiment {
    /// Name of the run, used as the subdirectory of the metric logs.
    pub fn run_name(&self) -> &'static str {
        match self {
            Self::Ddqn => "DDQN",
        }
    }

    /// File name of the checkpoint record in the model directory.
    pub fn checkpoint_file(&self) -> &'static str {
        match self {
            Self::Ddqn => "checkpoint_ddqn.yaml",
        }
    }
}

impl fmt::Display for Experiment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ddqn => write!(f, "ddqn"),
        }
    }
}

impl FromStr for Experiment {
    type Err = DriverError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "ddqn" => Ok(Self::Ddqn),
            _ => Err(DriverError::InvalidConfig(format!(
                "unknown experiment {:?}, expected \"ddqn\"",
                s
            ))),
        }
    }
}

/// When the memory of the agent is filled with random transitions before training.
#[derive(Debug, Deserialize, Serialize, PartialEq, Eq, Clone, Copy)]
#[serde(rename_all = "snake_case")]
pub enum WarmupPolicy {
    /// Never fill the memory in advance.
    Never,

    /// Fill the memory only when training is resumed from a checkpoint,
    /// since the memory itself is not part of the checkpoint.
    OnResume,

    /// Always fill the memory before the first episode.
    Always,
}

impl WarmupPolicy {
    /// Returns `true` if the memory should be filled.
    pub fn applies(&self, resume: bool) -> bool {
        match self {
            Self::Never => false,
            Self::OnResume => resume,
            Self::Always => true,
        }
    }
}

/// Configuration of [`Driver`](super::Driver).
#[derive(Debug, Deserialize, Serialize, PartialEq, Clone)]
#[serde(default)]
pub struct DriverConfig {
    /// Kind of experiment.
    pub exp_name: Experiment,

    /// Name of the simulation environment.
    pub env_name: String,

    /// Learning rate of the optimizer of the agent.
    pub learning_rate: f64,

    /// Seed of the experiment.
    pub seed: u64,

    /// Index of the last episode.
    pub total_episodes: usize,

    /// Requests deterministic kernels from the learning backend.
    pub deterministic: bool,

    /// Requests a CUDA device from the learning backend.
    pub cuda: bool,

    /// The number of discrete actions of the car.
    pub n_actions: usize,

    /// Dimension of encoded observations.
    pub latent_dim: usize,

    /// Resume from the model and the checkpoint in `model_dir`.
    pub resume: bool,

    /// Interval of saving the model, the checkpoint and metrics in episodes.
    pub checkpoint_interval: usize,

    /// Where model parameters and the checkpoint are saved.
    pub model_dir: String,

    /// Root directory of metric logs.
    pub log_dir: String,

    /// When the memory of the agent is filled before training.
    pub warmup: WarmupPolicy,

    /// Pause before the first episode, in milliseconds.
    pub start_delay_ms: u64,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            exp_name: Experiment::Ddqn,
            env_name: "carla".to_string(),
            learning_rate: 1e-4,
            seed: 0,
            total_episodes: 1000,
            deterministic: true,
            cuda: true,
            n_actions: 7,
            latent_dim: 95,
            resume: false,
            checkpoint_interval: 20,
            model_dir: "checkpoints".to_string(),
            log_dir: "runs".to_string(),
            warmup: WarmupPolicy::OnResume,
            start_delay_ms: 1000,
        }
    }
}

impl DriverConfig {
    /// Sets the kind of experiment.
    pub fn exp_name(mut self, v: Experiment) -> Self {
        self.exp_name = v;
        self
    }

    /// Sets the name of the simulation environment.
    pub fn env_name(mut self, v: impl Into<String>) -> Self {
        self.env_name = v.into();
        self
    }

    /// Sets the learning rate.
    pub fn learning_rate(mut self, v: f64) -> Self {
        self.learning_rate = v;
        self
    }

    /// Sets the seed.
    pub fn seed(mut self, v: u64) -> Self {
        self.seed = v;
        self
    }

    /// Sets the index of the last episode.
    pub fn total_episodes(mut self, v: usize) -> Self {
        self.total_episodes = v;
        self
    }

    /// Sets if deterministic kernels are requested.
    pub fn deterministic(mut self, v: bool) -> Self {
        self.deterministic = v;
        self
    }

    /// Sets if a CUDA device is requested.
    pub fn cuda(mut self, v: bool) -> Self {
        self.cuda = v;
        self
    }

    /// Sets the number of discrete actions.
    pub fn n_actions(mut self, v: usize) -> Self {
        self.n_actions = v;
        self
    }

    /// Sets the dimension of encoded observations.
    pub fn latent_dim(mut self, v: usize) -> Self {
        self.latent_dim = v;
        self
    }

    /// Sets if training is resumed.
    pub fn resume(mut self, v: bool) -> Self {
        self.resume = v;
        self
    }

    /// Sets the checkpoint interval in episodes.
    pub fn checkpoint_interval(mut self, v: usize) -> Self {
        self.checkpoint_interval = v;
        self
    }

    /// Sets the model directory.
    pub fn model_dir(mut self, v: impl Into<String>) -> Self {
        self.model_dir = v.into();
        self
    }

    /// Sets the root directory of metric logs.
    pub fn log_dir(mut self, v: impl Into<String>) -> Self {
        self.log_dir = v.into();
        self
    }

    /// Sets the warmup policy.
    pub fn warmup(mut self, v: WarmupPolicy) -> Self {
        self.warmup = v;
        self
    }

    /// Sets the pause before the first episode in milliseconds.
    pub fn start_delay_ms(mut self, v: u64) -> Self {
        self.start_delay_ms = v;
        self
    }

    /// Directory of the metric logs of this run.
    pub fn run_dir(&self) -> PathBuf {
        Path::new(&self.log_dir).join(self.exp_name.run_name())
    }

    /// Path of the checkpoint record.
    pub fn checkpoint_path(&self) -> PathBuf {
        Path::new(&self.model_dir).join(self.exp_name.checkpoint_file())
    }

    /// Checks that the configuration can drive a training run.
    pub fn validate(&self) -> Result<(), DriverError> {
        if self.checkpoint_interval == 0 {
            return Err(DriverError::InvalidConfig(
                "checkpoint_interval must be positive".to_string(),
            ));
        }
        if self.n_actions == 0 {
            return Err(DriverError::InvalidConfig(
                "n_actions must be positive".to_string(),
            ));
        }
        Ok(())
    }

    /// Renders the configuration as a markdown table with `param` and `value` columns.
    pub fn hyperparameter_table(&self) -> Result<String> {
        let mut table = "|param|value|\n|-|-|".to_string();
        if let Value::Mapping(map) = serde_yaml::to_value(self)? {
            for (k, v) in map.iter() {
                table.push_str(&format!("\n|{}|{}|", yaml_to_cell(k), yaml_to_cell(v)));
            }
        }
        Ok(table)
    }

    /// Constructs [`DriverConfig`] from YAML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let file = File::open(path)?;
        let rdr = BufReader::new(file);
        let b = serde_yaml::from_reader(rdr)?;
        Ok(b)
    }

    /// Saves [`DriverConfig`].
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let mut file = File::create(path)?;
        file.write_all(serde_yaml::to_string(&self)?.as_bytes())?;
        Ok(())
    }
}

fn yaml_to_cell(v: &Value) -> String {
    match v {
        Value::Null => "~".to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::String(s) => s.clone(),
        other => serde_yaml::to_string(other)
            .map(|s| s.replace('\n', " "))
            .unwrap_or_default(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempdir::TempDir;

    #[test]
    fn test_serde_driver_config() -> Result<()> {
        let config = DriverConfig::default()
            .total_episodes(200)
            .seed(42)
            .resume(true)
            .warmup(WarmupPolicy::Always)
            .model_dir("some/directory");

        let dir = TempDir::new("driver_config")?;
        let path = dir.path().join("driver_config.yaml");
        config.save(&path)?;
        let config_ = DriverConfig::load(&path)?;
        assert_eq!(config, config_);
        Ok(())
    }

    #[test]
    fn test_partial_yaml_uses_defaults() -> Result<()> {
        let dir = TempDir::new("driver_config")?;
        let path = dir.path().join("driver_config.yaml");
        std::fs::write(&path, "total_episodes: 40\nwarmup: never\n")?;
        let config = DriverConfig::load(&path)?;
        assert_eq!(config.total_episodes, 40);
        assert_eq!(config.warmup, WarmupPolicy::Never);
        assert_eq!(config.n_actions, 7);
        assert_eq!(config.exp_name, Experiment::Ddqn);
        Ok(())
    }

    #[test]
    fn test_paths_and_names() {
        let config = DriverConfig::default().log_dir("runs").model_dir("ckpt");
        assert_eq!(config.run_dir(), Path::new("runs").join("DDQN"));
        assert_eq!(
            config.checkpoint_path(),
            Path::new("ckpt").join("checkpoint_ddqn.yaml")
        );
        assert_eq!("DDQN".parse::<Experiment>().unwrap(), Experiment::Ddqn);
        assert!("ppo".parse::<Experiment>().is_err());
    }

    #[test]
    fn test_validate() {
        assert!(DriverConfig::default().validate().is_ok());
        assert!(DriverConfig::default()
            .checkpoint_interval(0)
            .validate()
            .is_err());
        assert!(DriverConfig::default().n_actions(0).validate().is_err());
    }

    #[test]
    fn test_warmup_policy() {
        assert!(!WarmupPolicy::Never.applies(true));
        assert!(!WarmupPolicy::OnResume.applies(false));
        assert!(WarmupPolicy::OnResume.applies(true));
        assert!(WarmupPolicy::Always.applies(false));
    }

    #[test]
    fn test_hyperparameter_table() -> Result<()> {
        let table = DriverConfig::default().seed(7).hyperparameter_table()?;
        let mut lines = table.lines();
        assert_eq!(lines.next(), Some("|param|value|"));
        assert_eq!(lines.next(), Some("|-|-|"));
        assert!(table.contains("|exp_name|ddqn|"));
        assert!(table.contains("|seed|7|"));
        assert!(table.contains("|warmup|on_resume|"));
        Ok(())
    }
}
