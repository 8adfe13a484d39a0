//! Active workload set
//!
//! Records are kept in first-observed order; a name → position index gives
//! constant-time lookup for status updates.

use crate::error::Fault;
use crate::models::WorkloadRecord;
use std::collections::HashMap;

#[derive(Debug, Default)]
pub struct ActiveSet {
    records: Vec<WorkloadRecord>,
    index: HashMap<String, usize>,
}

impl ActiveSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Records in first-observed order
    pub fn iter(&self) -> impl Iterator<Item = &WorkloadRecord> {
        self.records.iter()
    }

    /// Insert a new record. Returns false if the name is already tracked.
    pub fn insert(&mut self, record: WorkloadRecord) -> bool {
        if self.index.contains_key(&record.name) {
            return false;
        }
        self.index.insert(record.name.clone(), self.records.len());
        self.records.push(record);
        true
    }

    /// Look up a tracked record for in-place update
    pub fn get_mut(&mut self, name: &str) -> Result<&mut WorkloadRecord, Fault> {
        let pos = self.position(name)?;
        Ok(&mut self.records[pos])
    }

    /// Remove a tracked record, keeping the order of the others
    pub fn remove(&mut self, name: &str) -> Result<WorkloadRecord, Fault> {
        let pos = self.position(name)?;
        let record = self.records.remove(pos);
        self.index.remove(name);
        for (offset, shifted) in self.records[pos..].iter().enumerate() {
            self.index.insert(shifted.name.clone(), pos + offset);
        }
        Ok(record)
    }

    /// Resolve a name through the index, checking that the slot really holds it
    fn position(&self, name: &str) -> Result<usize, Fault> {
        self.index
            .get(name)
            .copied()
            .filter(|&pos| {
                self.records
                    .get(pos)
                    .map(|r| r.name == name)
                    .unwrap_or(false)
            })
            .ok_or_else(|| Fault::ActiveSetMismatch {
                name: name.to_string(),
            })
    }
}
