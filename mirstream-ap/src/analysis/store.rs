//! Append-only, index-addressable feature store
//!
//! Single writer (the analysis thread), any number of readers. The write lock is
//! held only for the push.

use crate::analysis::BlockFeatures;
use mirstream_common::FeatureRecord;
use std::sync::RwLock;

#[derive(Debug, Default)]
pub struct ResultStore {
    records: RwLock<Vec<FeatureRecord>>,
}

impl ResultStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append features for physical block `block_index`, assigning the next
    /// dense index.
    pub fn append(&self, block_index: u64, features: BlockFeatures) -> FeatureRecord {
        let mut records = self.records.write().unwrap_or_else(|e| e.into_inner());
        let record = FeatureRecord {
            index: records.len() as u64,
            block_index,
            zcr: features.zcr,
            dominant_frequency: features.dominant_frequency,
        };
        records.push(record);
        record
    }

    /// Record at `index`, or `None` when negative or not (yet) available
    pub fn get(&self, index: i64) -> Option<FeatureRecord> {
        let index = usize::try_from(index).ok()?;
        self.read(|records| records.get(index).copied())
    }

    pub fn zcr(&self, index: i64) -> Option<f32> {
        self.get(index).map(|r| r.zcr)
    }

    pub fn dominant_frequency(&self, index: i64) -> Option<f32> {
        self.get(index).map(|r| r.dominant_frequency)
    }

    pub fn len(&self) -> usize {
        self.read(|records| records.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Copy of all records so far
    pub fn snapshot(&self) -> Vec<FeatureRecord> {
        self.read(|records| records.clone())
    }

    fn read<T>(&self, f: impl FnOnce(&Vec<FeatureRecord>) -> T) -> T {
        let records = self.records.read().unwrap_or_else(|e| e.into_inner());
        f(&records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn features(zcr: f32, freq: f32) -> BlockFeatures {
        BlockFeatures {
            zcr,
            dominant_frequency: freq,
        }
    }

    #[test]
    fn test_empty_store() {
        let store = ResultStore::new();
        assert!(store.is_empty());
        assert_eq!(store.get(0), None);
        assert_eq!(store.get(-1), None);
    }

    #[test]
    fn test_dense_indices() {
        let store = ResultStore::new();
        store.append(0, features(0.1, 100.0));
        // Block 1 was dropped upstream
        store.append(2, features(0.3, 300.0));

        assert_eq!(store.len(), 2);
        let second = store.get(1).unwrap();
        assert_eq!(second.index, 1);
        assert_eq!(second.block_index, 2);
        assert_eq!(store.zcr(1), Some(0.3));
        assert_eq!(store.dominant_frequency(0), Some(100.0));
        assert_eq!(store.get(2), None);
        assert_eq!(store.get(i64::MIN), None);
    }

    #[test]
    fn test_get_is_repeatable() {
        let store = ResultStore::new();
        store.append(0, features(0.5, 440.0));
        assert_eq!(store.get(0), store.get(0));
        assert_eq!(store.snapshot().len(), 1);
    }

    #[test]
    fn test_concurrent_readers_see_prefix() {
        let store = Arc::new(ResultStore::new());
        let writer = {
            let store = Arc::clone(&store);
            std::thread::spawn(move || {
                for i in 0..1000 {
                    store.append(i, features(0.0, i as f32));
                }
            })
        };

        for _ in 0..100 {
            let snapshot = store.snapshot();
            for (i, record) in snapshot.iter().enumerate() {
                assert_eq!(record.index, i as u64);
            }
        }

        writer.join().unwrap();
        assert_eq!(store.len(), 1000);
    }
}
