use crate::{check_response, url, Run, TrackingError};
use anyhow::Result;
use autodrive_core::{
    record::{Record, RecordValue, Recorder},
    STEP_KEY,
};
use chrono::{DateTime, Duration, Local, SecondsFormat};
use log::warn;
use reqwest::blocking::Client;
use serde::Serialize;
use serde_json::{Map, Value};

#[derive(Debug, Serialize)]
struct LogParamParams<'a> {
    run_id: &'a str,
    key: &'a str,
    value: &'a str,
}

#[derive(Debug, Serialize)]
struct LogMetricParams<'a> {
    run_id: &'a str,
    key: &'a str,
    value: f64,
    timestamp: i64,
    step: i64,
}

#[derive(Debug, Serialize)]
struct UpdateRunParams<'a> {
    run_id: &'a str,
    status: &'a str,
    end_time: i64,
    run_name: &'a str,
}

#[derive(Debug, Serialize)]
struct SetTagParams<'a> {
    run_id: &'a str,
    key: &'a str,
    value: &'a str,
}

/// Records metrics of a run to the MLflow tracking server.
///
/// Before training, [`MlflowTrackingRecorder::log_params()`] logs the
/// configuration of the run and [`MlflowTrackingRecorder::set_tag()`] adds
/// tags like the name of the simulator.
///
/// [`Recorder::write()`] logs the [`RecordValue::Scalar`] values of a record
/// as metrics, with the scalar under [`STEP_KEY`] as the `step` field of
/// MLflow's metric data. Other values are ignored and records without the
/// step are discarded.
///
/// When dropped, the status of the run is updated to `FINISHED` and the tags
/// `host_end_time` and `host_duration` are added.
pub struct MlflowTrackingRecorder {
    client: Client,
    base_url: String,
    run_id: String,
    run_name: String,
    user_name: String,
    password: String,
    start_time: DateTime<Local>,
}

impl MlflowTrackingRecorder {
    /// Creates a recorder of `run` and tags it with `host_start_time`.
    pub(crate) fn new(
        client: Client,
        base_url: &str,
        user_name: &str,
        password: &str,
        run: Run,
    ) -> Result<Self> {
        let start_time = Local::now();
        let recorder = Self {
            client,
            base_url: base_url.to_string(),
            run_id: run.info.run_id,
            run_name: run.info.run_name,
            user_name: user_name.to_string(),
            password: password.to_string(),
            start_time,
        };
        recorder.set_tag(
            "host_start_time",
            start_time.to_rfc3339_opts(SecondsFormat::Secs, true),
        )?;

        Ok(recorder)
    }

    /// ID of the run.
    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    /// Name of the run.
    pub fn run_name(&self) -> &str {
        &self.run_name
    }

    /// Logs the fields of `params` as parameters of the run.
    pub fn log_params(&self, params: impl Serialize) -> Result<()> {
        for (key, value) in flatten_params(params)?.iter() {
            let params = LogParamParams {
                run_id: &self.run_id,
                key,
                value,
            };
            self.post("runs/log-parameter", &params)?;
        }
        Ok(())
    }

    /// Sets a tag of the run.
    pub fn set_tag(&self, key: impl AsRef<str>, value: impl AsRef<str>) -> Result<()> {
        let params = SetTagParams {
            run_id: &self.run_id,
            key: key.as_ref(),
            value: value.as_ref(),
        };
        self.post("runs/set-tag", &params)
    }

    fn post(&self, api: &str, params: &impl Serialize) -> Result<()> {
        let resp = self
            .client
            .post(url(&self.base_url, api))
            .basic_auth(&self.user_name, Some(&self.password))
            .json(params)
            .send()?;
        check_response(resp, api)?;
        Ok(())
    }

    fn finish(&self) -> Result<()> {
        let end_time = Local::now();
        let duration = end_time.signed_duration_since(self.start_time);
        self.set_tag(
            "host_end_time",
            end_time.to_rfc3339_opts(SecondsFormat::Secs, true),
        )?;
        self.set_tag("host_duration", format_duration(&duration))?;

        let params = UpdateRunParams {
            run_id: &self.run_id,
            status: "FINISHED",
            end_time: end_time.timestamp_millis(),
            run_name: &self.run_name,
        };
        self.post("runs/update", &params)
    }
}

impl Recorder for MlflowTrackingRecorder {
    fn write(&mut self, record: Record) {
        let (step, metrics) = match metrics_of(&record) {
            Some(metrics) => metrics,
            None => {
                warn!("Record without {:?} is discarded", STEP_KEY);
                return;
            }
        };
        let timestamp = Local::now().timestamp_millis();

        for (key, value) in metrics {
            let params = LogMetricParams {
                run_id: &self.run_id,
                key,
                value,
                timestamp,
                step,
            };
            if let Err(e) = self.post("runs/log-metric", &params) {
                warn!("Failed to log metric {:?}: {:#}", key, e);
            }
        }
    }
}

impl Drop for MlflowTrackingRecorder {
    fn drop(&mut self) {
        if let Err(e) = self.finish() {
            warn!("Failed to finish run {:?}: {:#}", self.run_name, e);
        }
    }
}

/// Flattens the fields of `params` into keys joined by `.` and string values.
fn flatten_params(params: impl Serialize) -> Result<Vec<(String, String)>> {
    match serde_json::to_value(params)? {
        Value::Object(map) => {
            let mut flat = vec![];
            flatten_into("", &map, &mut flat);
            Ok(flat)
        }
        _ => Err(TrackingError::NotAnObject.into()),
    }
}

fn flatten_into(prefix: &str, map: &Map<String, Value>, flat: &mut Vec<(String, String)>) {
    for (k, v) in map.iter() {
        let key = match prefix.is_empty() {
            true => k.clone(),
            false => format!("{}.{}", prefix, k),
        };
        match v {
            Value::Object(map) => flatten_into(&key, map, flat),
            Value::String(s) => flat.push((key, s.clone())),
            v => flat.push((key, v.to_string())),
        }
    }
}

/// Returns the step and the scalar metrics of a record, sorted by key.
fn metrics_of(record: &Record) -> Option<(i64, Vec<(&str, f64)>)> {
    let step = record.get_scalar(STEP_KEY).ok()? as i64;
    let mut metrics = record
        .iter()
        .filter(|(k, _)| k.as_str() != STEP_KEY)
        .filter_map(|(k, v)| match v {
            RecordValue::Scalar(v) => Some((k.as_str(), *v as f64)),
            _ => None,
        })
        .collect::<Vec<_>>();
    metrics.sort_by(|a, b| a.0.cmp(b.0));
    Some((step, metrics))
}

fn format_duration(dt: &Duration) -> String {
    let mut seconds = dt.num_seconds();
    let mut minutes = seconds / 60;
    seconds %= 60;
    let hours = minutes / 60;
    minutes %= 60;
    format!("{:02}:{:02}:{:02}", hours, minutes, seconds)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Serialize)]
    struct AgentParams {
        batch_size: usize,
        optimizer: Optimizer,
    }

    #[derive(Serialize)]
    enum Optimizer {
        Adam { lr: f64 },
    }

    #[derive(Serialize)]
    struct Params {
        env_name: String,
        resume: bool,
        agent: AgentParams,
    }

    #[test]
    fn test_flatten_params() {
        let params = Params {
            env_name: "carla".to_string(),
            resume: false,
            agent: AgentParams {
                batch_size: 64,
                optimizer: Optimizer::Adam { lr: 0.5 },
            },
        };
        let flat = flatten_params(&params).unwrap();
        assert_eq!(
            flat,
            vec![
                ("agent.batch_size".to_string(), "64".to_string()),
                ("agent.optimizer.Adam.lr".to_string(), "0.5".to_string()),
                ("env_name".to_string(), "carla".to_string()),
                ("resume".to_string(), "false".to_string()),
            ]
        );

        let err = flatten_params(3).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<TrackingError>(),
            Some(TrackingError::NotAnObject)
        ));
    }

    #[test]
    fn test_metrics_of_record() {
        let record = Record::from_slice(&[
            (STEP_KEY, RecordValue::Scalar(40.0)),
            ("Reward/info", RecordValue::Scalar(-2.5)),
            ("Epsilon/info", RecordValue::Scalar(0.5)),
            ("hyperparameters", RecordValue::String("|param|value|".to_string())),
        ]);
        let (step, metrics) = metrics_of(&record).unwrap();
        assert_eq!(step, 40);
        assert_eq!(metrics, vec![("Epsilon/info", 0.5), ("Reward/info", -2.5)]);

        assert!(metrics_of(&Record::from_scalar("Reward/info", 1.0)).is_none());
    }

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(&Duration::seconds(59)), "00:00:59");
        assert_eq!(format_duration(&Duration::seconds(3 * 3600 + 25 * 60 + 7)), "03:25:07");
    }
}
