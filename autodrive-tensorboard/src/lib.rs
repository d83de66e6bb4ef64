//! Writes records of the autodrive driver to TFRecord files.
use autodrive_core::{
    record::{Record, RecordValue, Recorder},
    STEP_KEY,
};
use log::{debug, warn};
use std::path::Path;
use tensorboard_rs::summary_writer::SummaryWriter;

/// Write records to TFRecord.
pub struct TensorboardRecorder {
    writer: SummaryWriter,
    ignore_unsupported_value: bool,
}

impl TensorboardRecorder {
    /// Construct a [`TensorboardRecorder`].
    ///
    /// TFRecord will be stored in `logdir`.
    pub fn new<P: AsRef<Path>>(logdir: P) -> Self {
        Self {
            writer: SummaryWriter::new(logdir),
            ignore_unsupported_value: true,
        }
    }

    /// Construct a [`TensorboardRecorder`] with checking unsupported record value.
    ///
    /// TFRecord will be stored in `logdir`.
    pub fn new_with_check_unsupported_value<P: AsRef<Path>>(logdir: P) -> Self {
        Self {
            writer: SummaryWriter::new(logdir),
            ignore_unsupported_value: false,
        }
    }
}

impl Recorder for TensorboardRecorder {
    /// Write a given [Record] into a TFRecord.
    ///
    /// This method handles [RecordValue::Scalar] in the [Record], using the
    /// scalar under [`STEP_KEY`] as the step. Strings are logged. A record
    /// without the step is dropped.
    fn write(&mut self, record: Record) {
        let step = match record.get(STEP_KEY) {
            Some(RecordValue::Scalar(v)) => *v as usize,
            _ => {
                warn!("Record without {:?} is discarded", STEP_KEY);
                return;
            }
        };

        for (k, v) in record.iter() {
            if k != STEP_KEY {
                match v {
                    RecordValue::Scalar(v) => self.writer.add_scalar(k, *v, step),
                    RecordValue::String(s) => debug!("{}:\n{}", k, s),
                    _ => {
                        if !self.ignore_unsupported_value {
                            panic!("Unsupported value: {:?}", (k, v));
                        }
                    }
                };
            }
        }
    }

    fn flush(&mut self) {
        self.writer.flush();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempdir::TempDir;

    /// Sizes of the files in `dir`.
    fn event_file_sizes(dir: &Path) -> Vec<u64> {
        std::fs::read_dir(dir)
            .map(|rd| {
                rd.filter_map(|e| e.ok())
                    .filter_map(|e| e.metadata().ok())
                    .map(|m| m.len())
                    .collect()
            })
            .unwrap_or_default()
    }

    #[test]
    fn test_write_scalars() {
        let dir = TempDir::new("tensorboard").unwrap();
        let mut recorder = TensorboardRecorder::new(dir.path());
        recorder.write(Record::from_slice(&[
            (STEP_KEY, RecordValue::Scalar(20.0)),
            ("Reward/info", RecordValue::Scalar(-3.0)),
            ("hyperparameters", RecordValue::String("|param|value|".to_string())),
            ("trace", RecordValue::Array1(vec![1.0, 2.0])),
        ]));
        recorder.write(Record::from_scalar("Reward/info", 1.0));
        recorder.flush();

        // Dropping the recorder joins the thread writing the event file
        drop(recorder);
        let sizes = event_file_sizes(dir.path());
        assert!(!sizes.is_empty());
        assert!(sizes.iter().all(|size| *size > 0), "{:?}", sizes);
    }

    #[test]
    #[should_panic]
    fn test_unsupported_value_panics_when_checked() {
        let dir = TempDir::new("tensorboard").unwrap();
        let mut recorder = TensorboardRecorder::new_with_check_unsupported_value(dir.path());
        recorder.write(Record::from_slice(&[
            (STEP_KEY, RecordValue::Scalar(1.0)),
            ("trace", RecordValue::Array1(vec![1.0])),
        ]));
    }
}
