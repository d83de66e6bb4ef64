use crate::{check_response, url, Experiment, MlflowTrackingRecorder, Run, TrackingError};
use anyhow::Result;
use chrono::Local;
use log::info;
use reqwest::blocking::{Client, Response};
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize)]
struct GetExperimentResponse {
    experiment: Experiment,
}

#[derive(Debug, Serialize)]
struct CreateExperimentParams<'a> {
    name: &'a str,
}

#[derive(Debug, Serialize)]
struct CreateRunParams<'a> {
    experiment_id: &'a str,
    start_time: i64,
    run_name: &'a str,
}

#[derive(Debug, Deserialize)]
struct CreateRunResponse {
    run: Run,
}

/// Provides access to an MLflow tracking server via its REST API.
///
/// An experiment has to be set with [`MlflowTrackingClient::set_experiment()`]
/// before creating recorders.
pub struct MlflowTrackingClient {
    client: Client,

    /// Base URL, like `http://localhost:8080`.
    base_url: String,

    experiment_id: Option<String>,

    user_name: String,

    password: String,
}

impl MlflowTrackingClient {
    /// Constructs a client of the server at `base_url`.
    pub fn new(base_url: impl AsRef<str>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.as_ref().trim_end_matches('/').to_string(),
            experiment_id: None,
            user_name: "".to_string(),
            password: "".to_string(),
        }
    }

    /// Sets the user name and password for basic authentication.
    pub fn basic_auth(self, user_name: impl AsRef<str>, password: impl AsRef<str>) -> Self {
        Self {
            user_name: user_name.as_ref().to_string(),
            password: password.as_ref().to_string(),
            ..self
        }
    }

    /// Sets the experiment of the runs created afterwards.
    ///
    /// The experiment is created on the server if it does not exist.
    pub fn set_experiment(self, name: impl AsRef<str>) -> Result<Self> {
        let experiment_id = self.get_or_create_experiment(name.as_ref())?.experiment_id;
        info!(
            "For experiment '{}', id={} is set in MlflowTrackingClient",
            name.as_ref(),
            experiment_id
        );

        Ok(Self {
            experiment_id: Some(experiment_id),
            ..self
        })
    }

    /// ID of the experiment set in the client.
    pub fn experiment_id(&self) -> Option<&str> {
        self.experiment_id.as_deref()
    }

    /// Gets the experiment with the given name, creating it if missing.
    pub fn get_or_create_experiment(&self, name: &str) -> Result<Experiment> {
        let api = "experiments/get-by-name";
        let resp = self.get(api, &[("experiment_name", name)])?;
        if resp.status().is_success() {
            return Ok(resp.json::<GetExperimentResponse>()?.experiment);
        }

        info!("Experiment '{}' does not exist and is created", name);
        let resp = self.post("experiments/create", &CreateExperimentParams { name })?;
        check_response(resp, "experiments/create")?;

        let resp = check_response(self.get(api, &[("experiment_name", name)])?, api)?;
        Ok(resp.json::<GetExperimentResponse>()?.experiment)
    }

    /// Creates a run in the experiment and returns a recorder writing to it.
    ///
    /// If `run_name` is empty, a run name is generated by the tracking server.
    pub fn create_recorder(&self, run_name: impl AsRef<str>) -> Result<MlflowTrackingRecorder> {
        let experiment_id = self
            .experiment_id
            .as_deref()
            .ok_or(TrackingError::ExperimentNotSet)?;
        let params = CreateRunParams {
            experiment_id,
            start_time: Local::now().timestamp_millis(),
            run_name: run_name.as_ref(),
        };
        let resp = check_response(self.post("runs/create", &params)?, "runs/create")?;
        let run = resp.json::<CreateRunResponse>()?.run;

        if run_name.as_ref().is_empty() {
            info!(
                "Run name '{}' has been automatically generated",
                run.info.run_name
            );
        }
        MlflowTrackingRecorder::new(
            self.client.clone(),
            &self.base_url,
            &self.user_name,
            &self.password,
            run,
        )
    }

    fn get(&self, api: &str, query: &impl Serialize) -> reqwest::Result<Response> {
        self.client
            .get(url(&self.base_url, api))
            .basic_auth(&self.user_name, Some(&self.password))
            .query(query)
            .send()
    }

    fn post(&self, api: &str, params: &impl Serialize) -> reqwest::Result<Response> {
        self.client
            .post(url(&self.base_url, api))
            .basic_auth(&self.user_name, Some(&self.password))
            .json(params)
            .send()
    }
}
