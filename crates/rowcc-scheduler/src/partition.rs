//! Row-range partitioning for the pipeline scheduler

use crate::error::{SchedulerError, SchedulerResult};
use rowcc_primitives::PartitionId;
use std::ops::Range;

/// Fixed mapping of the row space `[0, R)` onto `P` contiguous ranges.
///
/// Every partition but the last spans `R / P` rows; the last one also takes
/// the remainder.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PartitionMap {
    row_count: usize,
    partitions: usize,
    width: usize,
}

impl PartitionMap {
    /// Split `row_count` rows into `partitions` ranges.
    ///
    /// Requires `0 < partitions <= row_count`.
    pub fn new(row_count: usize, partitions: usize) -> SchedulerResult<Self> {
        if partitions == 0 || partitions > row_count {
            return Err(SchedulerError::InvalidPartitionCount {
                partitions,
                row_count,
            });
        }
        Ok(Self {
            row_count,
            partitions,
            width: row_count / partitions,
        })
    }

    /// Rows owned by `partition`
    pub fn range(&self, partition: PartitionId) -> Range<usize> {
        let start = partition.index() * self.width;
        let end = if partition.index() + 1 == self.partitions {
            self.row_count
        } else {
            start + self.width
        };
        start..end
    }

    /// Every partition id, in chain order
    pub fn ids(&self) -> impl Iterator<Item = PartitionId> {
        (0..self.partitions).map(PartitionId::new)
    }
}
