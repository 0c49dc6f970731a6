//! Aggregation of records stored between two logging ticks.
use super::{Record, RecordValue};
use std::collections::HashSet;
use xxhash_rust::xxh3::Xxh3Builder;

/// Stores records and aggregates them on [`RecordStorage::aggregate`].
///
/// Scalars stored more than once are reduced to `<key>_min`, `<key>_max`, `<key>_mean`
/// and `<key>_median`. A single scalar is kept under its own key. For other value types
/// the most recent value wins.
#[derive(Debug, Default)]
pub struct RecordStorage {
    data: Vec<Record>,
}

fn mean(vs: &[f32]) -> f32 {
    vs.iter().sum::<f32>() / vs.len() as f32
}

fn median(vs: &mut [f32]) -> f32 {
    vs.sort_by(|x, y| x.total_cmp(y));
    vs[vs.len() / 2]
}

impl RecordStorage {
    /// An empty storage.
    pub fn new() -> Self {
        Self::default()
    }

    /// Keeps a record until the next aggregation.
    pub fn store(&mut self, record: Record) {
        self.data.push(record);
    }

    /// Returns `true` if no record is kept.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    fn keys(&self) -> HashSet<String, Xxh3Builder> {
        let mut keys = HashSet::<String, Xxh3Builder>::default();
        for record in self.data.iter() {
            keys.extend(record.keys().cloned());
        }
        keys
    }

    fn latest(&self, key: &str) -> Option<&RecordValue> {
        self.data.iter().rev().find_map(|record| record.get(key))
    }

    fn scalars(&self, key: &str) -> Vec<f32> {
        self.data
            .iter()
            .filter_map(|record| match record.get(key) {
                Some(RecordValue::Scalar(v)) => Some(*v),
                _ => None,
            })
            .collect()
    }

    /// Aggregates all stored records and clears the storage.
    pub fn aggregate(&mut self) -> Record {
        let mut record = Record::empty();

        for key in self.keys().iter() {
            match self.latest(key) {
                Some(RecordValue::Scalar(v)) => {
                    let mut vs = self.scalars(key);
                    if vs.len() == 1 {
                        record.insert(key.clone(), RecordValue::Scalar(*v));
                    } else {
                        let min = vs.iter().copied().fold(f32::INFINITY, f32::min);
                        let max = vs.iter().copied().fold(f32::NEG_INFINITY, f32::max);
                        record.insert(format!("{}_min", key), RecordValue::Scalar(min));
                        record.insert(format!("{}_max", key), RecordValue::Scalar(max));
                        record.insert(format!("{}_mean", key), RecordValue::Scalar(mean(&vs)));
                        record.insert(
                            format!("{}_median", key),
                            RecordValue::Scalar(median(&mut vs)),
                        );
                    }
                }
                Some(value) => record.insert(key.clone(), value.clone()),
                None => {}
            }
        }

        self.data.clear();
        record
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_aggregate_scalars() {
        let mut storage = RecordStorage::new();
        for v in [1.0, 3.0, 2.0] {
            storage.store(Record::from_scalar("train/loss", v));
        }
        storage.store(Record::from_scalar("train/learn_rate", 0.1));

        let record = storage.aggregate();
        assert_eq!(record.get_scalar("train/loss_min").unwrap(), 1.0);
        assert_eq!(record.get_scalar("train/loss_max").unwrap(), 3.0);
        assert_eq!(record.get_scalar("train/loss_mean").unwrap(), 2.0);
        assert_eq!(record.get_scalar("train/loss_median").unwrap(), 2.0);
        assert_eq!(record.get_scalar("train/learn_rate").unwrap(), 0.1);
        assert!(storage.is_empty());
    }

    #[test]
    fn test_aggregate_keeps_latest_string() {
        let mut storage = RecordStorage::new();
        storage.store(Record::from_slice(&[("mode", RecordValue::String("a".into()))]));
        storage.store(Record::from_slice(&[("mode", RecordValue::String("b".into()))]));
        assert_eq!(storage.aggregate().get_string("mode").unwrap(), "b");
    }
}
