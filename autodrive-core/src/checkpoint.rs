//! Snapshot of training progress.
use crate::error::DriverError;
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::{
    fs::{self, File},
    io::{BufReader, Write},
    path::Path,
};

/// Progress of a training run, saved next to the model parameters.
///
/// Together with the parameters saved by [`Agent::save_model`](crate::Agent::save_model),
/// a checkpoint is enough to resume training from the episode following `epoch`.
#[derive(Debug, Deserialize, Serialize, PartialEq, Clone)]
pub struct Checkpoint {
    /// Index of the last finished episode.
    pub epoch: usize,

    /// Running average of episode scores up to `epoch`.
    pub cumulative_score: f32,

    /// Exploration rate of the agent at `epoch`.
    pub epsilon: f64,
}

impl Checkpoint {
    /// Constructs a checkpoint.
    pub fn new(epoch: usize, cumulative_score: f32, epsilon: f64) -> Self {
        Self {
            epoch,
            cumulative_score,
            epsilon,
        }
    }

    /// Loads a checkpoint from a YAML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let load = || -> Result<Self> {
            let file = File::open(path)?;
            let rdr = BufReader::new(file);
            Ok(serde_yaml::from_reader(rdr)?)
        };
        load().map_err(|e| {
            DriverError::Checkpoint {
                path: path.to_path_buf(),
                reason: format!("{:#}", e),
            }
            .into()
        })
    }

    /// Saves the checkpoint as a YAML file.
    ///
    /// The file is written under a temporary name and renamed into place,
    /// so an interrupted write leaves the previous checkpoint intact.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let save = || -> Result<()> {
            if let Some(dir) = path.parent() {
                fs::create_dir_all(dir)?;
            }
            let tmp = path.with_extension("yaml.tmp");
            {
                let mut file = File::create(&tmp)?;
                file.write_all(serde_yaml::to_string(&self)?.as_bytes())?;
                file.sync_all()?;
            }
            fs::rename(&tmp, path)?;
            Ok(())
        };
        save().map_err(|e| {
            DriverError::Checkpoint {
                path: path.to_path_buf(),
                reason: format!("{:#}", e),
            }
            .into()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempdir::TempDir;

    #[test]
    fn test_save_and_load_checkpoint() -> Result<()> {
        let dir = TempDir::new("checkpoint")?;
        let path = dir.path().join("nested").join("checkpoint_ddqn.yaml");
        let checkpoint = Checkpoint::new(40, -12.25, 0.35);

        checkpoint.save(&path)?;
        assert!(!path.with_extension("yaml.tmp").exists());
        assert_eq!(Checkpoint::load(&path)?, checkpoint);

        Checkpoint::new(60, 3.5, 0.3).save(&path)?;
        assert_eq!(Checkpoint::load(&path)?.epoch, 60);
        Ok(())
    }

    #[test]
    fn test_load_missing_checkpoint_names_path() -> Result<()> {
        let dir = TempDir::new("checkpoint")?;
        let path = dir.path().join("checkpoint_ddqn.yaml");
        let err = Checkpoint::load(&path).unwrap_err();
        match err.downcast_ref::<DriverError>() {
            Some(DriverError::Checkpoint { path: p, .. }) => assert_eq!(p, &path),
            _ => panic!("unexpected error: {:?}", err),
        }
        Ok(())
    }

    #[test]
    fn test_load_malformed_checkpoint() -> Result<()> {
        let dir = TempDir::new("checkpoint")?;
        let path = dir.path().join("checkpoint_ddqn.yaml");
        fs::write(&path, "epoch: [not, a, number]\n")?;
        assert!(Checkpoint::load(&path).is_err());
        Ok(())
    }
}
