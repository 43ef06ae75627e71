//! Failure-tolerant lookup facade.

use tracing::warn;

use crate::record::TicRecord;
use crate::CatalogSource;

/// Title used whenever a lookup fails.
pub const PLACEHOLDER_TITLE: &str = "connection error, no data";

/// Wraps a [`CatalogSource`] so that no lookup ever fails.
#[derive(Debug, Clone)]
pub struct CatalogLookup<S> {
    source: S,
}

impl<S: CatalogSource> CatalogLookup<S> {
    /// Wrap `source`.
    pub fn new(source: S) -> Self {
        CatalogLookup { source }
    }

    /// The wrapped source.
    pub fn source(&self) -> &S {
        &self.source
    }

    /// The record for `tic_id`, or `None` after logging the failure.
    pub fn try_record(&self, tic_id: u64) -> Option<TicRecord> {
        match self.source.fetch(tic_id) {
            Ok(record) => Some(record),
            Err(e) => {
                warn!(tic_id, error = %e, "catalog lookup failed");
                None
            }
        }
    }

    /// The record for `tic_id`, or an all-missing record on failure.
    pub fn record(&self, tic_id: u64) -> TicRecord {
        self.try_record(tic_id).unwrap_or_else(|| TicRecord::empty(tic_id))
    }

    /// Plot title for `tic_id`, or [`PLACEHOLDER_TITLE`] on failure.
    pub fn title(&self, tic_id: u64) -> String {
        self.try_record(tic_id)
            .map(|r| r.title())
            .unwrap_or_else(|| PLACEHOLDER_TITLE.to_string())
    }

    /// Titles for several objects, in order.
    pub fn titles(&self, tic_ids: &[u64]) -> Vec<String> {
        tic_ids.iter().map(|&id| self.title(id)).collect()
    }
}
