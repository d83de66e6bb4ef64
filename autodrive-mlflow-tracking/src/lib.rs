//! Mirrors the runs of the autodrive driver to an [MLflow](https://mlflow.org) tracking server.
//!
//! Before running the program using this crate, run a tracking server with the following command:
//!
//! ```bash
//! mlflow server --host 127.0.0.1 --port 8080
//! ```
//!
//! The configuration of a run is logged as parameters and the scalars of the
//! records written by the driver are logged as metrics, with the episode
//! index as the step. Nested parameters are flattened, like `agent.batch_size`.
//!
//! ```no_run
//! use anyhow::Result;
//! use autodrive_core::{
//!     record::{Record, RecordValue, Recorder},
//!     DriverConfig, STEP_KEY,
//! };
//! use autodrive_mlflow_tracking::MlflowTrackingClient;
//!
//! fn main() -> Result<()> {
//!     let config = DriverConfig::default();
//!
//!     // Set the experiment of the runs, created if missing
//!     let client =
//!         MlflowTrackingClient::new("http://localhost:8080").set_experiment("autodrive")?;
//!
//!     let mut recorder = client.create_recorder("DDQN")?;
//!     recorder.log_params(&config)?;
//!     recorder.set_tag("env", &config.env_name)?;
//!
//!     for episode in (20..=100).step_by(20) {
//!         let mut record = Record::empty();
//!         record.insert(STEP_KEY, RecordValue::Scalar(episode as f32));
//!         record.insert("Reward/info", RecordValue::Scalar(episode as f32 / 10.0));
//!         recorder.write(record);
//!     }
//!
//!     // The run is marked as finished when the recorder is dropped
//!     Ok(())
//! }
//! ```
mod client;
mod experiment;
mod recorder;
mod run;
pub use client::MlflowTrackingClient;
pub use experiment::Experiment;
pub use recorder::MlflowTrackingRecorder;
pub use run::{Run, RunInfo};
use reqwest::blocking::Response;

/// Errors of the communication with a tracking server.
#[derive(thiserror::Error, Debug)]
pub enum TrackingError {
    /// [`MlflowTrackingClient::set_experiment()`] has not been called.
    #[error("No experiment is set in the client")]
    ExperimentNotSet,

    /// The server answered with an error status.
    #[error("{api} failed with status {status}: {body}")]
    Server {
        /// Called API, like `runs/create`.
        api: String,

        /// HTTP status code.
        status: u16,

        /// Response body.
        body: String,
    },

    /// Parameters are not serialized as a JSON object.
    #[error("Parameters must be serialized as an object")]
    NotAnObject,
}

fn url(base_url: &str, api: &str) -> String {
    format!("{}/api/2.0/mlflow/{}", base_url, api)
}

/// Turns an error status of the response into [`TrackingError::Server`].
fn check_response(resp: Response, api: &str) -> Result<Response, TrackingError> {
    let status = resp.status();
    match status.is_success() {
        true => Ok(resp),
        false => Err(TrackingError::Server {
            api: api.to_string(),
            status: status.as_u16(),
            body: resp.text().unwrap_or_default(),
        }),
    }
}
