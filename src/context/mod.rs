//! Context store for one pipeline run.
//!
//! Holds one [`ExecutionRecord`] per completed task, in completion order,
//! and builds the upstream bundle handed to each later task. The store is
//! owned by the run and written by one task at a time, so it carries no
//! lock. Any future parallel scheduler must wrap it in a guard keyed by
//! task id.

use std::collections::HashMap;

use crate::task::{ExecutionRecord, TaskId};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ContextError {
    #[error("task '{0}' was already recorded")]
    AlreadyRecorded(TaskId),

    #[error("task '{0}' has not been recorded")]
    NotRecorded(TaskId),
}

/// Write-once, completion-ordered record store.
#[derive(Debug, Clone, Default)]
pub struct ContextStore {
    records: Vec<ExecutionRecord>,
    index: HashMap<TaskId, usize>,
}

impl ContextStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a record. A task id can be recorded only once.
    pub fn record(&mut self, record: ExecutionRecord) -> Result<(), ContextError> {
        let id = record.task().clone();
        if self.index.contains_key(&id) {
            return Err(ContextError::AlreadyRecorded(id));
        }
        self.index.insert(id, self.records.len());
        self.records.push(record);
        Ok(())
    }

    pub fn get(&self, id: &TaskId) -> Result<&ExecutionRecord, ContextError> {
        self.index
            .get(id)
            .and_then(|&i| self.records.get(i))
            .ok_or_else(|| ContextError::NotRecorded(id.clone()))
    }

    /// Records for `ids`, in the order requested.
    ///
    /// Fails on the first id that has not been recorded.
    pub fn bundle(&self, ids: &[TaskId]) -> Result<Vec<&ExecutionRecord>, ContextError> {
        ids.iter().map(|id| self.get(id)).collect()
    }

    /// All records in completion order.
    pub fn records(&self) -> impl Iterator<Item = &ExecutionRecord> {
        self.records.iter()
    }

    pub fn contains(&self, id: &TaskId) -> bool {
        self.index.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// The most recently written record.
    pub fn last(&self) -> Option<&ExecutionRecord> {
        self.records.last()
    }
}
