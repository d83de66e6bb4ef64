use serde::Deserialize;

/// An experiment of the tracking server, holding runs.
#[derive(Debug, Clone, Deserialize)]
pub struct Experiment {
    /// ID assigned by the server.
    pub experiment_id: String,

    /// Name of the experiment.
    pub name: String,

    /// Where the artifacts of the runs are stored.
    pub artifact_location: Option<String>,

    /// `active` or `deleted`.
    pub lifecycle_stage: Option<String>,
}
