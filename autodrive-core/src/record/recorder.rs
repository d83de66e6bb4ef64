use super::Record;

/// Writes a record to an output destination with [`Recorder::write`].
pub trait Recorder {
    /// Write a record to the [`Recorder`].
    fn write(&mut self, record: Record);

    /// Flushes buffered output, if any.
    fn flush(&mut self) {}
}

impl<R: Recorder + ?Sized> Recorder for Box<R> {
    fn write(&mut self, record: Record) {
        (**self).write(record);
    }

    fn flush(&mut self) {
        (**self).flush();
    }
}

/// Writes every record to all the recorders.
impl<R: Recorder> Recorder for Vec<R> {
    fn write(&mut self, record: Record) {
        if let Some((last, rest)) = self.split_last_mut() {
            for recorder in rest.iter_mut() {
                recorder.write(record.clone());
            }
            last.write(record);
        }
    }

    fn flush(&mut self) {
        for recorder in self.iter_mut() {
            recorder.flush();
        }
    }
}
