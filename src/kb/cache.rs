use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use tracing::debug;

use crate::error::KbError;

use super::record::{Record, record_id};

/// Anything that can resolve a full record by id, possibly slowly.
pub trait RecordSource: Send + Sync {
    fn fetch(&self, id: &str) -> Result<Record, KbError>;
}

/// Non-blocking record lookup used during expansion.
pub trait RecordLookup {
    fn peek(&self, id: &str) -> Option<Record>;
}

impl RecordLookup for HashMap<String, Record> {
    fn peek(&self, id: &str) -> Option<Record> {
        self.get(id).cloned()
    }
}

/// Memoizing front of a [`RecordSource`]. Safe to share with worker threads.
pub struct RecordCache {
    source: Arc<dyn RecordSource>,
    records: Mutex<HashMap<String, Record>>,
}

impl RecordCache {
    pub fn new(source: Arc<dyn RecordSource>) -> Self {
        Self {
            source,
            records: Mutex::new(HashMap::new()),
        }
    }

    /// Resolves a record, fetching it from the source on the first request.
    pub fn get_record(&self, id: &str) -> Result<Record, KbError> {
        if let Some(record) = self.peek(id) {
            return Ok(record);
        }

        debug!(id, "fetching record");
        let record = self.source.fetch(id)?;
        self.insert(record.clone());
        Ok(record)
    }

    /// Stores a record under its `@rid`. Later inserts replace earlier ones.
    pub fn insert(&self, record: Record) {
        let Some(id) = record_id(&record).map(str::to_owned) else {
            return;
        };
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id, record);
    }

    pub fn preload<I>(&self, records: I)
    where
        I: IntoIterator<Item = Record>,
    {
        for record in records {
            self.insert(record);
        }
    }

    pub fn len(&self) -> usize {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl RecordLookup for RecordCache {
    fn peek(&self, id: &str) -> Option<Record> {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(id)
            .cloned()
    }
}
