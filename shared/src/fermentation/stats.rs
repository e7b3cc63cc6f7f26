//! On-demand statistics over stored readings

use std::sync::Arc;

use crate::clock::Clock;
use crate::models::{compute_batch_stats, BatchStats, FermentationBatch};

use super::readings::ReadingStore;

pub struct StatsAggregator {
    readings: Arc<ReadingStore>,
    clock: Arc<dyn Clock>,
}

impl StatsAggregator {
    pub fn new(readings: Arc<ReadingStore>, clock: Arc<dyn Clock>) -> Self {
        Self { readings, clock }
    }

    /// Aggregate the batch's current history in one pass
    pub fn compute(&self, batch: &FermentationBatch) -> BatchStats {
        let snapshot = self.readings.snapshot(batch.id);
        compute_batch_stats(batch, snapshot.iter().map(Arc::as_ref), self.clock.now())
    }
}
