use anyhow::Result;
use autodrive_core::{
    dummy::{DummyAgent, DummyAgentConfig, LaneEncoder, LaneEnv, LaneEnvConfig, LoopbackConnection},
    record::Recorder,
    Driver, DriverConfig, Experiment, TrainSummary,
};
use autodrive_mlflow_tracking::MlflowTrackingClient;
use autodrive_tensorboard::TensorboardRecorder;
use clap::{builder::BoolishValueParser, Parser};
use log::info;
use std::{
    fs::{self, File, OpenOptions},
    path::{Path, PathBuf},
};

const MEMORY_CAPACITY: usize = 5_000;
const BATCH_SIZE: usize = 64;
const EPS_DECAY: f64 = 5e-5;

/// Train an agent driving a car in a simulator.
///
/// Flags override the values in the configuration file given with `--config`.
#[derive(Parser, Debug)]
#[command(version, about)]
struct Args {
    /// Name of the experiment
    #[arg(long)]
    exp_name: Option<Experiment>,

    /// Name of the simulation environment
    #[arg(long)]
    env_name: Option<String>,

    /// Learning rate of the optimizer
    #[arg(long)]
    learning_rate: Option<f64>,

    /// Seed of the experiment
    #[arg(long)]
    seed: Option<u64>,

    /// Index of the last episode
    #[arg(long)]
    total_episodes: Option<usize>,

    /// Deterministic kernels in the learning backend
    #[arg(
        long,
        num_args = 0..=1,
        default_missing_value = "true",
        value_parser = BoolishValueParser::new()
    )]
    deterministic: Option<bool>,

    /// Use a CUDA device if available
    #[arg(
        long,
        num_args = 0..=1,
        default_missing_value = "true",
        value_parser = BoolishValueParser::new()
    )]
    cuda: Option<bool>,

    /// Mirror the run to an MLflow tracking server
    #[arg(
        long,
        num_args = 0..=1,
        default_value_t = false,
        default_missing_value = "true",
        value_parser = BoolishValueParser::new()
    )]
    track: bool,

    /// URI of the MLflow tracking server
    #[arg(long, default_value = "http://localhost:8080")]
    tracking_uri: String,

    /// Experiment of the tracked runs
    #[arg(long, alias = "wandb-project-name", default_value = "autonomous driving")]
    project_name: String,

    /// Entity (team) of the tracked runs, set as a tag
    #[arg(long, alias = "wandb-entity")]
    entity: Option<String>,

    /// Write logs to this file at debug level instead of stderr
    #[arg(long)]
    log_file: Option<PathBuf>,

    /// Resume from the model and the checkpoint in the model directory
    #[arg(long, default_value_t = false)]
    resume: bool,

    /// Configuration file in YAML
    #[arg(long)]
    config: Option<PathBuf>,

    /// Directory of the model parameters and the checkpoint
    #[arg(long)]
    model_dir: Option<String>,

    /// Root directory of metric logs
    #[arg(long)]
    log_dir: Option<String>,
}

fn create_driver_config(args: &Args) -> Result<DriverConfig> {
    let mut config = match &args.config {
        Some(path) => DriverConfig::load(path)?,
        None => DriverConfig::default(),
    };

    if let Some(v) = args.exp_name {
        config = config.exp_name(v);
    }
    if let Some(v) = &args.env_name {
        config = config.env_name(v.as_str());
    }
    if let Some(v) = args.learning_rate {
        config = config.learning_rate(v);
    }
    if let Some(v) = args.seed {
        config = config.seed(v);
    }
    if let Some(v) = args.total_episodes {
        config = config.total_episodes(v);
    }
    if let Some(v) = args.deterministic {
        config = config.deterministic(v);
    }
    if let Some(v) = args.cuda {
        config = config.cuda(v);
    }
    if args.resume {
        config = config.resume(true);
    }
    if let Some(v) = &args.model_dir {
        config = config.model_dir(v.as_str());
    }
    if let Some(v) = &args.log_dir {
        config = config.log_dir(v.as_str());
    }
    config.validate()?;

    Ok(config)
}

fn create_agent_config(config: &DriverConfig) -> DummyAgentConfig {
    DummyAgentConfig {
        n_actions: config.n_actions,
        memory_capacity: MEMORY_CAPACITY,
        batch_size: BATCH_SIZE,
        eps_decay: EPS_DECAY,
        ..DummyAgentConfig::default()
    }
}

/// Returns the recorders of the run.
///
/// Metrics are written in TensorBoard format under the run directory and,
/// with `--track`, mirrored to the tracking server along with the configuration.
fn create_recorder(args: &Args, config: &DriverConfig) -> Result<Vec<Box<dyn Recorder>>> {
    let mut recorders: Vec<Box<dyn Recorder>> =
        vec![Box::new(TensorboardRecorder::new(config.run_dir()))];

    if args.track {
        let client = MlflowTrackingClient::new(&args.tracking_uri)
            .set_experiment(&args.project_name)?;
        let recorder = client.create_recorder(config.exp_name.run_name())?;
        recorder.log_params(config)?;
        recorder.set_tag("env", &config.env_name)?;
        recorder.set_tag("algo", config.exp_name.to_string())?;
        if let Some(entity) = &args.entity {
            recorder.set_tag("entity", entity)?;
        }
        info!(
            "Tracking run {:?} at {}",
            recorder.run_name(),
            args.tracking_uri
        );
        recorders.push(Box::new(recorder));
    }

    Ok(recorders)
}

fn train<R: Recorder>(config: DriverConfig, recorder: &mut R) -> Result<TrainSummary> {
    let env_config = LaneEnvConfig {
        n_actions: config.n_actions,
        ..LaneEnvConfig::default()
    };
    let mut encoder = LaneEncoder::new(config.latent_dim);
    let mut agent = DummyAgent::build(create_agent_config(&config));
    let mut driver = Driver::<LaneEnv>::build(config, env_config)?;

    driver.train(
        &LoopbackConnection::new(),
        &mut encoder,
        &mut agent,
        recorder,
    )
}

/// Opens `path` for appending, creating its directory.
fn open_log_file(path: &Path) -> Result<File> {
    if let Some(dir) = path.parent() {
        fs::create_dir_all(dir)?;
    }
    Ok(OpenOptions::new().create(true).append(true).open(path)?)
}

fn init_logger(log_file: Option<&Path>) -> Result<()> {
    match log_file {
        None => {
            env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
                .init()
        }
        Some(path) => {
            let file = open_log_file(path)?;
            env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("debug"))
                .target(env_logger::Target::Pipe(Box::new(file)))
                .init()
        }
    }
    Ok(())
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_logger(args.log_file.as_deref())?;

    let config = create_driver_config(&args)?;
    info!(
        "Running {} on the built-in lane simulator ({})",
        config.exp_name.run_name(),
        config.env_name
    );

    let mut recorder = create_recorder(&args, &config)?;
    let summary = train(config, &mut recorder)?;
    info!(
        "Finished {} episodes, last episode {}, average reward {:.2}",
        summary.episodes_run, summary.last_episode, summary.cumulative_score
    );

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use autodrive_core::{record::NullRecorder, Checkpoint};
    use std::{io::Write, net::TcpListener};
    use tempdir::TempDir;

    fn dir_args(tmp_dir: &TempDir) -> Vec<String> {
        let root = tmp_dir.path();
        vec![
            "--model-dir".to_string(),
            root.join("checkpoints").to_string_lossy().into_owned(),
            "--log-dir".to_string(),
            root.join("runs").to_string_lossy().into_owned(),
        ]
    }

    #[test]
    fn test_parse_boolean_flags() -> Result<()> {
        let args = Args::parse_from(["autodrive", "--cuda", "false", "--deterministic"].iter());
        let config = create_driver_config(&args)?;
        assert!(!config.cuda);
        assert!(config.deterministic);
        assert!(!config.resume);

        let args = Args::parse_from(["autodrive", "--cuda=no", "--exp-name", "ddqn"].iter());
        assert_eq!(args.cuda, Some(false));
        assert_eq!(args.exp_name, Some(Experiment::Ddqn));

        assert!(Args::try_parse_from(["autodrive", "--exp-name", "ppo"].iter()).is_err());
        Ok(())
    }

    #[test]
    fn test_flags_override_config_file() -> Result<()> {
        let tmp_dir = TempDir::new("autodrive")?;
        let path = tmp_dir.path().join("config.yaml");
        DriverConfig::default()
            .total_episodes(300)
            .seed(5)
            .save(&path)?;

        let args = Args::parse_from(
            [
                "autodrive",
                "--config",
                path.to_str().unwrap(),
                "--seed",
                "9",
            ]
            .iter(),
        );
        let config = create_driver_config(&args)?;
        assert_eq!(config.total_episodes, 300);
        assert_eq!(config.seed, 9);
        Ok(())
    }

    #[test]
    fn test_train_and_resume() -> Result<()> {
        let tmp_dir = TempDir::new("autodrive")?;
        let base = DriverConfig::default().start_delay_ms(0);
        let config_path = tmp_dir.path().join("base.yaml");
        base.save(&config_path)?;

        let mut argv = vec![
            "autodrive".to_string(),
            "--config".to_string(),
            config_path.to_string_lossy().into_owned(),
            "--total-episodes".to_string(),
            "20".to_string(),
        ];
        argv.extend(dir_args(&tmp_dir));
        let args = Args::parse_from(argv.iter());
        let config = create_driver_config(&args)?;
        let mut recorder = create_recorder(&args, &config)?;
        assert_eq!(recorder.len(), 1);
        let summary = train(config.clone(), &mut recorder)?;
        assert_eq!(summary.episodes_run, 20);
        assert_eq!(Checkpoint::load(config.checkpoint_path())?.epoch, 20);

        argv[4] = "40".to_string();
        argv.push("--resume".to_string());
        let config = create_driver_config(&Args::parse_from(argv.iter()))?;
        assert!(config.resume);
        let summary = train(config.clone(), &mut NullRecorder::default())?;
        assert_eq!(summary.episodes_run, 20);
        assert_eq!(summary.last_episode, 40);
        assert_eq!(Checkpoint::load(config.checkpoint_path())?.epoch, 40);
        Ok(())
    }

    #[test]
    fn test_track_flags() -> Result<()> {
        let tmp_dir = TempDir::new("autodrive")?;
        let mut argv = vec!["autodrive".to_string()];
        argv.extend(dir_args(&tmp_dir));
        let args = Args::parse_from(argv.iter());
        assert!(!args.track);
        assert_eq!(args.tracking_uri, "http://localhost:8080");
        assert_eq!(args.project_name, "autonomous driving");

        // A port nothing listens on
        let addr = TcpListener::bind("127.0.0.1:0")?.local_addr()?;
        let uri = format!("http://{}", addr);
        argv.extend(
            [
                "--track",
                "--tracking-uri",
                uri.as_str(),
                "--wandb-project-name",
                "lane keeping",
                "--wandb-entity",
                "team",
            ]
            .iter()
            .map(|s| s.to_string()),
        );
        let args = Args::parse_from(argv.iter());
        assert!(args.track);
        assert_eq!(args.project_name, "lane keeping");
        assert_eq!(args.entity.as_deref(), Some("team"));

        let config = create_driver_config(&args)?;
        assert!(create_recorder(&args, &config).is_err());
        Ok(())
    }

    #[test]
    fn test_open_log_file_appends() -> Result<()> {
        let tmp_dir = TempDir::new("autodrive")?;
        let path = tmp_dir.path().join("logs").join("ddqn.log");
        writeln!(open_log_file(&path)?, "INFO:Connection has been setup successfully.")?;
        writeln!(open_log_file(&path)?, "INFO:Exiting.")?;

        let content = fs::read_to_string(&path)?;
        assert_eq!(
            content,
            "INFO:Connection has been setup successfully.\nINFO:Exiting.\n"
        );

        let args = Args::parse_from(["autodrive", "--log-file", path.to_str().unwrap()].iter());
        assert_eq!(args.log_file, Some(path));
        Ok(())
    }
}
