use serde::Deserialize;

/// A run returned by the tracking server.
#[derive(Debug, Clone, Deserialize)]
pub struct Run {
    /// Metadata of the run.
    pub info: RunInfo,
}

/// Metadata of a [`Run`].
#[derive(Debug, Clone, Deserialize)]
pub struct RunInfo {
    /// ID assigned by the server.
    pub run_id: String,

    /// Name of the run, generated by the server when not given.
    pub run_name: String,

    /// ID of the experiment the run belongs to.
    pub experiment_id: String,

    /// `RUNNING`, `FINISHED`, etc.
    pub status: Option<String>,

    /// Start time in milliseconds since the UNIX epoch.
    pub start_time: Option<i64>,

    /// Where the artifacts of the run are stored.
    pub artifact_uri: Option<String>,
}
