//! Row and partition identifiers

use crate::error::PrimitiveError;
use std::fmt;
use std::str::FromStr;

/// Index of a row in the row store
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
pub struct RowId(pub usize);

impl RowId {
    /// Create a new row id
    pub const fn new(index: usize) -> Self {
        Self(index)
    }

    /// Get the raw index
    pub const fn index(&self) -> usize {
        self.0
    }

    /// Check that the row addresses a cell in a store of `row_count` rows
    pub fn check_bounds(&self, row_count: usize) -> Result<(), PrimitiveError> {
        if self.0 < row_count {
            Ok(())
        } else {
            Err(PrimitiveError::RowOutOfRange {
                row: self.0,
                row_count,
            })
        }
    }
}

impl fmt::Debug for RowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RowId({})", self.0)
    }
}

impl fmt::Display for RowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "row {}", self.0)
    }
}

impl From<usize> for RowId {
    fn from(index: usize) -> Self {
        Self(index)
    }
}

impl FromStr for RowId {
    type Err = PrimitiveError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim()
            .parse::<usize>()
            .map(RowId)
            .map_err(|_| PrimitiveError::InvalidId(s.to_string()))
    }
}

/// Index of a pipeline partition
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PartitionId(pub usize);

impl PartitionId {
    /// Create a new partition id
    pub const fn new(index: usize) -> Self {
        Self(index)
    }

    /// Get the raw index
    pub const fn index(&self) -> usize {
        self.0
    }

    /// Partition that follows this one in the pipeline
    pub const fn next(&self) -> Self {
        Self(self.0 + 1)
    }
}

impl fmt::Display for PartitionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "P{}", self.0)
    }
}
