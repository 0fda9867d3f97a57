//! Reshapes distributions into the parallel arrays the meter system expects.

use crate::meter::eval::Distribution;
use serde::{Deserialize, Serialize};

/// Index-aligned bucket boundaries and counts
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BucketedValues {
    buckets: Vec<i64>,
    values: Vec<i64>,
}

impl BucketedValues {
    /// Extracts boundaries and counts from a distribution.
    ///
    /// Boundaries are truncated toward zero into the 32-bit range, saturating
    /// at the ends (`+inf` becomes `i32::MAX`, `NaN` becomes 0).
    pub fn from_distribution(distribution: &Distribution) -> Self {
        let (buckets, values) = distribution
            .iter()
            .map(|(boundary, count)| (i64::from(boundary as i32), count))
            .unzip();
        Self { buckets, values }
    }

    /// Truncated bucket boundaries, ascending
    pub fn buckets(&self) -> &[i64] {
        &self.buckets
    }

    /// Counts, aligned with [`BucketedValues::buckets`]
    pub fn values(&self) -> &[i64] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.buckets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }
}

/// Bucketed values plus the percentiles to compute over them
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AvgPercentileArgument {
    pub bucketed_values: BucketedValues,
    pub ranks: Vec<i32>,
}

impl AvgPercentileArgument {
    pub fn new(bucketed_values: BucketedValues, ranks: Vec<i32>) -> Self {
        Self {
            bucketed_values,
            ranks,
        }
    }
}
