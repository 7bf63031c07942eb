//! Persistence port for per-pattern statistics.

use crate::domain::error::EdgefinderError;
use crate::domain::statistics::PatternStatistics;

/// Storage for aggregated pattern statistics.
///
/// Records are keyed by `(pattern_id, direction, lookback_days)`. Writing an
/// existing key replaces the previous record.
pub trait StatisticsStore {
    fn upsert_statistics(
        &self,
        lookback_days: u32,
        statistics: &[PatternStatistics],
    ) -> Result<usize, EdgefinderError>;

    /// Stored records for `lookback_days` that are profitable, best expectancy first.
    fn load_profitable(&self, lookback_days: u32)
    -> Result<Vec<PatternStatistics>, EdgefinderError>;
}
