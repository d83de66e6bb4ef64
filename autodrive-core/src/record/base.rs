//! Base implementation of records for logging.
use crate::error::DriverError;
use std::collections::{hash_map::Iter, HashMap};

/// Represents possible types of values that can be stored in a [`Record`].
#[derive(Debug, Clone, PartialEq)]
pub enum RecordValue {
    /// A single floating-point value, typically used for metrics like rewards.
    Scalar(f32),

    /// A 1-dimensional array of floating-point values.
    Array1(Vec<f32>),

    /// A text value, e.g., a table of hyperparameters.
    String(String),
}

/// A container for storing key-value pairs of various data types.
///
/// # Examples
///
/// ```rust
/// use autodrive_core::record::{Record, RecordValue};
///
/// let mut record = Record::from_scalar("Epsilon/info", 0.5);
/// record.insert("run", RecordValue::String("DDQN".to_string()));
///
/// let eps = record.get_scalar("Epsilon/info").unwrap();
/// assert_eq!(eps, 0.5);
/// ```
#[derive(Debug, Clone, Default)]
pub struct Record(HashMap<String, RecordValue>);

impl Record {
    /// Creates an empty record.
    pub fn empty() -> Self {
        Self(HashMap::new())
    }

    /// Creates a record containing a single scalar value.
    pub fn from_scalar(name: impl Into<String>, value: f32) -> Self {
        let mut map = HashMap::new();
        map.insert(name.into(), RecordValue::Scalar(value));
        Self(map)
    }

    /// Creates a record from a slice of key-value pairs.
    pub fn from_slice<K: Into<String> + Clone>(s: &[(K, RecordValue)]) -> Self {
        Self(
            s.iter()
                .map(|(k, v)| (k.clone().into(), v.clone()))
                .collect(),
        )
    }

    /// Inserts a key-value pair into the record.
    pub fn insert(&mut self, k: impl Into<String>, v: RecordValue) {
        self.0.insert(k.into(), v);
    }

    /// Returns an iterator over the key-value pairs in the record.
    pub fn iter(&self) -> Iter<'_, String, RecordValue> {
        self.0.iter()
    }

    /// Gets a reference to the value associated with the given key.
    pub fn get(&self, k: &str) -> Option<&RecordValue> {
        self.0.get(k)
    }

    /// Merges two records, consuming both.
    ///
    /// If both records contain the same key, the value from the second record
    /// overwrites the value from the first record.
    pub fn merge(self, record: Record) -> Self {
        Record(self.0.into_iter().chain(record.0).collect())
    }

    /// Merges another record into this one in place.
    pub fn merge_inplace(&mut self, record: Record) {
        self.0.extend(record.0);
    }

    /// Gets a scalar value from the record.
    ///
    /// # Errors
    ///
    /// Returns an error if the key does not exist or the value is not a scalar.
    pub fn get_scalar(&self, k: &str) -> Result<f32, DriverError> {
        match self.0.get(k) {
            Some(RecordValue::Scalar(v)) => Ok(*v),
            Some(_) => Err(DriverError::RecordValueTypeError("Scalar".to_string())),
            None => Err(DriverError::RecordKeyError(k.to_string())),
        }
    }

    /// Gets a string value from the record.
    pub fn get_string(&self, k: &str) -> Result<String, DriverError> {
        match self.0.get(k) {
            Some(RecordValue::String(s)) => Ok(s.clone()),
            Some(_) => Err(DriverError::RecordValueTypeError("String".to_string())),
            None => Err(DriverError::RecordKeyError(k.to_string())),
        }
    }

    /// Checks if the record is empty.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// The number of values in the record.
    pub fn len(&self) -> usize {
        self.0.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_with_wrong_key_or_type() {
        let record = Record::from_slice(&[
            ("Reward/info", RecordValue::Scalar(1.5)),
            ("hyperparameters", RecordValue::String("|param|value|".to_string())),
        ]);

        assert_eq!(record.get_scalar("Reward/info").unwrap(), 1.5);
        assert_eq!(record.get_string("hyperparameters").unwrap(), "|param|value|");
        assert!(matches!(
            record.get_scalar("hyperparameters"),
            Err(DriverError::RecordValueTypeError(_))
        ));
        assert!(matches!(
            record.get_scalar("Epsilon/info"),
            Err(DriverError::RecordKeyError(_))
        ));
    }

    #[test]
    fn test_merge_overwrites_with_second() {
        let a = Record::from_slice(&[
            ("loss", RecordValue::Scalar(1.0)),
            ("episode", RecordValue::Scalar(3.0)),
        ]);
        let b = Record::from_scalar("loss", 0.25);
        let merged = a.clone().merge(b.clone());
        assert_eq!(merged.len(), 2);
        assert_eq!(merged.get_scalar("loss").unwrap(), 0.25);

        let mut c = a;
        c.merge_inplace(b);
        assert_eq!(c.get_scalar("loss").unwrap(), 0.25);
        assert_eq!(c.get_scalar("episode").unwrap(), 3.0);
    }
}
