//! Run episodes of an [`Agent`] in an [`Env`].
mod config;
use crate::{
    error::DriverError,
    record::{Record, RecordValue, Recorder},
    Agent, Checkpoint, Connection, Encoder, Env, Obs, ScoreTracker, Transition,
};
use anyhow::Result;
pub use config::{DriverConfig, Experiment, WarmupPolicy};
use log::{error, info};
use std::{
    fs,
    marker::PhantomData,
    path::Path,
    thread,
    time::{Duration, Instant},
};

/// Key of the episode index in the records written by [`Driver`].
pub const STEP_KEY: &str = "episode";

/// Summary of a call to [`Driver::train`].
#[derive(Debug, Clone, PartialEq)]
pub struct TrainSummary {
    /// The number of episodes run in the call.
    pub episodes_run: usize,

    /// Index of the last finished episode, including those of resumed runs.
    pub last_episode: usize,

    /// Running average score after the last episode.
    pub cumulative_score: f32,
}

/// Manages the training loop of an agent in a driving simulator.
///
/// # Training loop
///
/// 1. Seed the random number generator and write the hyperparameters to the recorder.
/// 2. If resuming, load the model of the agent from `model_dir` and restore
///    the episode index, the running average score and the exploration rate
///    from the [`Checkpoint`].
/// 3. Connect to the simulator and build the environment on the session.
/// 4. If the [`WarmupPolicy`] applies, fill the memory of the agent with
///    transitions of uniformly random actions.
/// 5. For each episode up to `total_episodes`, reset the environment, then
///    let the agent act, push the transition and learn at every step until the
///    episode is done.
/// 6. Every `checkpoint_interval` episodes, save the model and the checkpoint,
///    and write the following scalars:
///     * `Reward/info` - mean score of the last `checkpoint_interval` episodes
///     * `Cumulative Reward/info` - running average score
///     * `Episode Length (s)/info` - mean wall-clock length of the episodes
///       since the last write
///     * `Epsilon/info` - exploration rate
pub struct Driver<E: Env> {
    config: DriverConfig,
    env_config: E::Config,
    phantom: PhantomData<E>,
}

impl<E: Env> Driver<E> {
    /// Constructs a driver.
    pub fn build(config: DriverConfig, env_config: E::Config) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            env_config,
            phantom: PhantomData,
        })
    }

    /// Trains the agent.
    pub fn train<C, N, A, R>(
        &mut self,
        connection: &C,
        encoder: &mut N,
        agent: &mut A,
        recorder: &mut R,
    ) -> Result<TrainSummary>
    where
        C: Connection<Session = E::Session>,
        N: Encoder<E>,
        A: Agent<N::Obs>,
        R: Recorder,
    {
        fastrand::seed(self.config.seed);
        self.record_hyperparameters(recorder)?;

        let (epoch, scores) = match self.config.resume {
            true => self.restore::<N::Obs, A>(agent)?,
            false => (0, ScoreTracker::new()),
        };

        let session = match connection.setup() {
            Ok(session) => {
                info!("Connection has been setup successfully.");
                session
            }
            Err(e) => {
                error!("Connection has been refused by the server: {:#}", e);
                return Err(e);
            }
        };
        let mut env = E::build(&self.env_config, session, self.config.seed as i64)?;
        if env.n_actions() != self.config.n_actions {
            return Err(DriverError::InvalidConfig(format!(
                "environment has {} actions, configured {}",
                env.n_actions(),
                self.config.n_actions
            ))
            .into());
        }

        let result = self.run(&mut env, encoder, agent, recorder, epoch, scores);
        info!("Exiting.");
        result
    }

    fn run<N, A, R>(
        &self,
        env: &mut E,
        encoder: &mut N,
        agent: &mut A,
        recorder: &mut R,
        epoch: usize,
        mut scores: ScoreTracker,
    ) -> Result<TrainSummary>
    where
        N: Encoder<E>,
        A: Agent<N::Obs>,
        R: Recorder,
    {
        if self.config.warmup.applies(self.config.resume) {
            self.fill_memory(env, encoder, agent)?;
        }

        thread::sleep(Duration::from_millis(self.config.start_delay_ms));

        let interval = self.config.checkpoint_interval;
        let mut episodic_length = 0f32;
        let mut learner_record = None;
        let mut summary = TrainSummary {
            episodes_run: 0,
            last_episode: epoch,
            cumulative_score: scores.average(),
        };

        for episode in (epoch + 1)..=self.config.total_episodes {
            info!(
                "Starting Episode: {}, Epsilon Now: {:.3}",
                episode,
                agent.epsilon()
            );

            let (score, length) = self.run_episode(env, encoder, agent, &mut learner_record)?;
            episodic_length += length;

            let cumulative_score = scores.push(episode, score);
            info!(
                "Reward: {:.2}, Average Reward: {:.2}",
                score, cumulative_score
            );

            summary.episodes_run += 1;
            summary.last_episode = episode;
            summary.cumulative_score = cumulative_score;

            if episode % interval == 0 {
                let model_dir = Path::new(&self.config.model_dir);
                agent.save_model(model_dir)?;
                Checkpoint::new(episode, cumulative_score, agent.epsilon())
                    .save(self.config.checkpoint_path())?;
                info!("Saved the model and the checkpoint in {:?}", model_dir);

                let mut record = Record::from_slice(&[
                    (STEP_KEY, RecordValue::Scalar(episode as f32)),
                    ("Reward/info", RecordValue::Scalar(scores.recent_mean(interval))),
                    ("Cumulative Reward/info", RecordValue::Scalar(cumulative_score)),
                    (
                        "Episode Length (s)/info",
                        RecordValue::Scalar(episodic_length / interval as f32),
                    ),
                    ("Epsilon/info", RecordValue::Scalar(agent.epsilon() as f32)),
                ]);
                if let Some(r) = learner_record.take() {
                    record = r.merge(record);
                }
                recorder.write(record);
                recorder.flush();

                episodic_length = 0.0;
            }
        }

        Ok(summary)
    }

    /// Runs an episode and returns its score and its wall-clock length in seconds.
    ///
    /// The length is measured from the first encoded observation. The latest
    /// statistics reported by the agent are kept in `learner_record`.
    fn run_episode<N, A>(
        &self,
        env: &mut E,
        encoder: &mut N,
        agent: &mut A,
        learner_record: &mut Option<Record>,
    ) -> Result<(f32, f32)>
    where
        N: Encoder<E>,
        A: Agent<N::Obs>,
    {
        let mut obs = encoder.process(env.reset()?)?;
        let mut score = 0f32;
        let t = Instant::now();

        loop {
            let act = agent.get_action(&obs);
            let step = env.step(act)?;
            let is_done = step.is_done();
            let next_obs = encoder.process(step.obs)?;
            score += step.reward;

            agent.save_transition(Transition::new(
                obs,
                act,
                step.reward,
                next_obs.clone(),
                is_done,
            ));
            if let Some(record) = agent.learn()? {
                *learner_record = Some(record);
            }

            if is_done {
                break;
            }
            obs = next_obs;
        }

        Ok((score, t.elapsed().as_secs_f32()))
    }

    /// Fills the memory of the agent with transitions of uniformly random actions.
    fn fill_memory<N, A>(&self, env: &mut E, encoder: &mut N, agent: &mut A) -> Result<()>
    where
        N: Encoder<E>,
        A: Agent<N::Obs>,
    {
        let n_actions = self.config.n_actions;
        let mut n_episodes = 0;

        while !agent.is_memory_full() {
            let mut obs = encoder.process(env.reset()?)?;
            loop {
                let act = fastrand::usize(..n_actions);
                let step = env.step(act)?;
                let is_done = step.is_done();
                let next_obs = encoder.process(step.obs)?;
                agent.save_transition(Transition::new(
                    obs,
                    act,
                    step.reward,
                    next_obs.clone(),
                    is_done,
                ));
                if is_done || agent.is_memory_full() {
                    break;
                }
                obs = next_obs;
            }
            n_episodes += 1;
        }

        info!(
            "Filled the memory with {} transitions in {} episodes",
            agent.memory_len(),
            n_episodes
        );
        Ok(())
    }

    /// Loads the model and the checkpoint, and returns the episode index and
    /// scores to continue from.
    fn restore<O, A>(&self, agent: &mut A) -> Result<(usize, ScoreTracker)>
    where
        O: Obs,
        A: Agent<O>,
    {
        agent.load_model(Path::new(&self.config.model_dir))?;
        let checkpoint = Checkpoint::load(self.config.checkpoint_path())?;
        agent.set_epsilon(checkpoint.epsilon);
        info!(
            "Resuming from episode {} with average reward {:.2} and epsilon {:.3}",
            checkpoint.epoch, checkpoint.cumulative_score, checkpoint.epsilon
        );
        Ok((
            checkpoint.epoch,
            ScoreTracker::resume(checkpoint.cumulative_score),
        ))
    }

    /// Writes the hyperparameter table to the recorder and saves the
    /// configuration in the run directory.
    fn record_hyperparameters<R: Recorder>(&self, recorder: &mut R) -> Result<()> {
        let table = self.config.hyperparameter_table()?;
        recorder.write(Record::from_slice(&[
            (STEP_KEY, RecordValue::Scalar(0.0)),
            ("hyperparameters", RecordValue::String(table)),
        ]));

        let run_dir = self.config.run_dir();
        fs::create_dir_all(&run_dir)?;
        self.config.save(run_dir.join("config.yaml"))?;
        Ok(())
    }
}
