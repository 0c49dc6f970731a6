//! Record and its values.
use crate::error::DistrlError;
use chrono::prelude::{DateTime, Local};
use std::collections::{
    hash_map::{IntoIter, Iter, Keys},
    HashMap,
};

/// Value stored in a [`Record`].
#[derive(Debug, Clone, PartialEq)]
pub enum RecordValue {
    /// Metrics like loss, episode return or epsilon.
    Scalar(f32),

    /// Timestamps.
    DateTime(DateTime<Local>),

    /// Arrays like per-episode rewards.
    Array1(Vec<f32>),

    /// Free text like the execution mode.
    String(String),
}

/// Key-value pairs written to a [`Recorder`](super::Recorder).
#[derive(Debug, Clone, Default)]
pub struct Record(HashMap<String, RecordValue>);

impl Record {
    /// Creates an empty record.
    pub fn empty() -> Self {
        Self(HashMap::new())
    }

    /// Creates a record with a single scalar value.
    pub fn from_scalar(name: impl Into<String>, value: f32) -> Self {
        Self(HashMap::from([(name.into(), RecordValue::Scalar(value))]))
    }

    /// Creates a record from key-value pairs.
    pub fn from_slice<K: Into<String> + Clone>(s: &[(K, RecordValue)]) -> Self {
        Self(
            s.iter()
                .map(|(k, v)| (k.clone().into(), v.clone()))
                .collect(),
        )
    }

    /// Keys of the entries.
    pub fn keys(&self) -> Keys<String, RecordValue> {
        self.0.keys()
    }

    /// Inserts a value, replacing the one under the same key.
    pub fn insert(&mut self, k: impl Into<String>, v: RecordValue) {
        self.0.insert(k.into(), v);
    }

    /// Iterator over the entries.
    pub fn iter(&self) -> Iter<'_, String, RecordValue> {
        self.0.iter()
    }

    /// Consumes the record into its entries.
    pub fn into_iter_in_record(self) -> IntoIter<String, RecordValue> {
        self.0.into_iter()
    }

    /// Value under `k`.
    pub fn get(&self, k: &str) -> Option<&RecordValue> {
        self.0.get(k)
    }

    /// Merges two records. Values of `record` win on key collisions.
    pub fn merge(self, record: Record) -> Self {
        Record(self.0.into_iter().chain(record.0).collect())
    }

    /// Moves the entries of `record` into `self`, overwriting on key collision.
    pub fn merge_inplace(&mut self, record: Record) {
        self.0.extend(record.0);
    }

    /// Scalar value under `k`.
    pub fn get_scalar(&self, k: &str) -> Result<f32, DistrlError> {
        match self.0.get(k) {
            Some(RecordValue::Scalar(v)) => Ok(*v),
            Some(_) => Err(DistrlError::RecordValueTypeError("Scalar".to_string())),
            None => Err(DistrlError::RecordKeyError(k.to_string())),
        }
    }

    /// Array value under `k`.
    pub fn get_array1(&self, k: &str) -> Result<Vec<f32>, DistrlError> {
        match self.0.get(k) {
            Some(RecordValue::Array1(v)) => Ok(v.clone()),
            Some(_) => Err(DistrlError::RecordValueTypeError("Array1".to_string())),
            None => Err(DistrlError::RecordKeyError(k.to_string())),
        }
    }

    /// String value under `k`.
    pub fn get_string(&self, k: &str) -> Result<String, DistrlError> {
        match self.0.get(k) {
            Some(RecordValue::String(s)) => Ok(s.clone()),
            Some(_) => Err(DistrlError::RecordValueTypeError("String".to_string())),
            None => Err(DistrlError::RecordKeyError(k.to_string())),
        }
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns `true` if the record has no entry.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_scalar() {
        let record = Record::from_slice(&[
            ("train/loss", RecordValue::Scalar(0.5)),
            ("name", RecordValue::String("c51".into())),
        ]);
        assert_eq!(record.get_scalar("train/loss").unwrap(), 0.5);
        assert!(matches!(
            record.get_scalar("name"),
            Err(DistrlError::RecordValueTypeError(_))
        ));
        assert!(matches!(
            record.get_scalar("missing"),
            Err(DistrlError::RecordKeyError(_))
        ));
    }

    #[test]
    fn test_merge_overrides() {
        let a = Record::from_scalar("x", 1.0);
        let b = Record::from_scalar("x", 2.0).merge(Record::from_scalar("y", 3.0));
        let merged = a.merge(b);
        assert_eq!(merged.len(), 2);
        assert_eq!(merged.get_scalar("x").unwrap(), 2.0);
    }
}
