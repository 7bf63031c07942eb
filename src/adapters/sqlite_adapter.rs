//! SQLite statistics store.

use crate::domain::config_validation::sqlite_pool_size;
use crate::domain::error::EdgefinderError;
use crate::domain::pattern::Direction;
use crate::domain::statistics::PatternStatistics;
use crate::ports::config_port::ConfigPort;
use crate::ports::statistics_store::StatisticsStore;
use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::params;

const COLUMNS: &str = "pattern_id, direction, sample_size, wins, losses, breakevens, win_rate, \
     avg_win, avg_loss, profit_factor, expectancy, total_pnl, largest_win, largest_loss, \
     avg_mfe, avg_mae, optimal_stop_points, optimal_target_points, avg_hold_bars, pnl_stddev, \
     confidence";

fn storage_err(e: impl std::fmt::Display) -> EdgefinderError {
    EdgefinderError::Storage {
        reason: e.to_string(),
    }
}

pub struct SqliteAdapter {
    pool: Pool<SqliteConnectionManager>,
}

impl SqliteAdapter {
    pub fn from_config(config: &dyn ConfigPort) -> Result<Self, EdgefinderError> {
        let db_path =
            config
                .get_string("sqlite", "path")
                .ok_or_else(|| EdgefinderError::ConfigMissing {
                    section: "sqlite".into(),
                    key: "path".into(),
                })?;

        let pool_size = sqlite_pool_size(config)?;

        let manager = SqliteConnectionManager::file(&db_path);
        let pool = Pool::builder()
            .max_size(pool_size)
            .build(manager)
            .map_err(storage_err)?;

        let adapter = Self { pool };
        adapter.initialize_schema()?;
        Ok(adapter)
    }

    pub fn in_memory() -> Result<Self, EdgefinderError> {
        let manager = SqliteConnectionManager::memory();
        let pool = Pool::builder()
            .max_size(1)
            .build(manager)
            .map_err(storage_err)?;

        Ok(Self { pool })
    }

    fn conn(&self) -> Result<PooledConnection<SqliteConnectionManager>, EdgefinderError> {
        self.pool.get().map_err(storage_err)
    }

    pub fn initialize_schema(&self) -> Result<(), EdgefinderError> {
        self.conn()?
            .execute_batch(
                "CREATE TABLE IF NOT EXISTS pattern_statistics (
                    pattern_id TEXT NOT NULL,
                    direction TEXT NOT NULL,
                    lookback_days INTEGER NOT NULL,
                    sample_size INTEGER NOT NULL,
                    wins INTEGER NOT NULL,
                    losses INTEGER NOT NULL,
                    breakevens INTEGER NOT NULL,
                    win_rate REAL NOT NULL,
                    avg_win REAL NOT NULL,
                    avg_loss REAL NOT NULL,
                    profit_factor REAL NOT NULL,
                    expectancy REAL NOT NULL,
                    total_pnl REAL NOT NULL,
                    largest_win REAL NOT NULL,
                    largest_loss REAL NOT NULL,
                    avg_mfe REAL NOT NULL,
                    avg_mae REAL NOT NULL,
                    optimal_stop_points REAL NOT NULL,
                    optimal_target_points REAL NOT NULL,
                    avg_hold_bars REAL NOT NULL,
                    pnl_stddev REAL NOT NULL,
                    confidence REAL NOT NULL,
                    PRIMARY KEY (pattern_id, direction, lookback_days)
                );
                CREATE INDEX IF NOT EXISTS idx_statistics_lookback
                    ON pattern_statistics(lookback_days);",
            )
            .map_err(storage_err)
    }

    /// Every stored record for `lookback_days`, ordered by key.
    pub fn load_all(&self, lookback_days: u32) -> Result<Vec<PatternStatistics>, EdgefinderError> {
        self.query(
            &format!(
                "SELECT {} FROM pattern_statistics WHERE lookback_days = ?1 \
                 ORDER BY pattern_id, direction",
                COLUMNS
            ),
            lookback_days,
        )
    }

    fn query(
        &self,
        sql: &str,
        lookback_days: u32,
    ) -> Result<Vec<PatternStatistics>, EdgefinderError> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(sql).map_err(storage_err)?;
        let rows = stmt
            .query_map(params![lookback_days], |row| {
                let direction_str: String = row.get(1)?;
                let direction = direction_str.parse::<Direction>().map_err(|e| {
                    rusqlite::Error::FromSqlConversionFailure(
                        1,
                        rusqlite::types::Type::Text,
                        e.to_string().into(),
                    )
                })?;
                Ok(PatternStatistics {
                    pattern_id: row.get(0)?,
                    direction,
                    sample_size: row.get::<_, i64>(2)? as usize,
                    wins: row.get::<_, i64>(3)? as usize,
                    losses: row.get::<_, i64>(4)? as usize,
                    breakevens: row.get::<_, i64>(5)? as usize,
                    win_rate: row.get(6)?,
                    avg_win: row.get(7)?,
                    avg_loss: row.get(8)?,
                    profit_factor: row.get(9)?,
                    expectancy: row.get(10)?,
                    total_pnl: row.get(11)?,
                    largest_win: row.get(12)?,
                    largest_loss: row.get(13)?,
                    avg_mfe: row.get(14)?,
                    avg_mae: row.get(15)?,
                    optimal_stop_points: row.get(16)?,
                    optimal_target_points: row.get(17)?,
                    avg_hold_bars: row.get(18)?,
                    pnl_stddev: row.get(19)?,
                    confidence: row.get(20)?,
                })
            })
            .map_err(storage_err)?;

        rows.collect::<Result<Vec<_>, _>>().map_err(storage_err)
    }
}

impl StatisticsStore for SqliteAdapter {
    fn upsert_statistics(
        &self,
        lookback_days: u32,
        statistics: &[PatternStatistics],
    ) -> Result<usize, EdgefinderError> {
        let mut conn = self.conn()?;
        let tx = conn.transaction().map_err(storage_err)?;

        for s in statistics {
            tx.execute(
                &format!(
                    "INSERT OR REPLACE INTO pattern_statistics (lookback_days, {})
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15,
                             ?16, ?17, ?18, ?19, ?20, ?21, ?22)",
                    COLUMNS
                ),
                params![
                    lookback_days,
                    s.pattern_id,
                    s.direction.as_str(),
                    s.sample_size as i64,
                    s.wins as i64,
                    s.losses as i64,
                    s.breakevens as i64,
                    s.win_rate,
                    s.avg_win,
                    s.avg_loss,
                    s.profit_factor,
                    s.expectancy,
                    s.total_pnl,
                    s.largest_win,
                    s.largest_loss,
                    s.avg_mfe,
                    s.avg_mae,
                    s.optimal_stop_points,
                    s.optimal_target_points,
                    s.avg_hold_bars,
                    s.pnl_stddev,
                    s.confidence
                ],
            )
            .map_err(storage_err)?;
        }

        tx.commit().map_err(storage_err)?;
        tracing::debug!(lookback_days, records = statistics.len(), "stored pattern statistics");
        Ok(statistics.len())
    }

    fn load_profitable(
        &self,
        lookback_days: u32,
    ) -> Result<Vec<PatternStatistics>, EdgefinderError> {
        self.query(
            &format!(
                "SELECT {} FROM pattern_statistics \
                 WHERE lookback_days = ?1 AND expectancy > 0 AND profit_factor > 1 \
                 ORDER BY expectancy DESC, pattern_id, direction",
                COLUMNS
            ),
            lookback_days,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct EmptyConfig;

    impl ConfigPort for EmptyConfig {
        fn get_string(&self, _section: &str, _key: &str) -> Option<String> {
            None
        }
        fn get_int(&self, _section: &str, _key: &str, default: i64) -> i64 {
            default
        }
        fn get_double(&self, _section: &str, _key: &str, default: f64) -> f64 {
            default
        }
        fn get_bool(&self, _section: &str, _key: &str, default: bool) -> bool {
            default
        }
        fn section_keys(&self, _section: &str) -> Vec<String> {
            Vec::new()
        }
    }

    fn stats(
        id: &str,
        direction: Direction,
        expectancy: f64,
        profit_factor: f64,
    ) -> PatternStatistics {
        PatternStatistics {
            pattern_id: id.to_string(),
            direction,
            sample_size: 12,
            wins: 7,
            losses: 5,
            breakevens: 0,
            win_rate: 7.0 / 12.0,
            avg_win: 150.0,
            avg_loss: 90.0,
            profit_factor,
            expectancy,
            total_pnl: expectancy * 12.0,
            largest_win: 300.0,
            largest_loss: -120.0,
            avg_mfe: 4.5,
            avg_mae: 2.0,
            optimal_stop_points: 2.2,
            optimal_target_points: 3.6,
            avg_hold_bars: 6.5,
            pnl_stddev: 110.0,
            confidence: 40.0,
        }
    }

    fn store() -> SqliteAdapter {
        let adapter = SqliteAdapter::in_memory().unwrap();
        adapter.initialize_schema().unwrap();
        adapter
    }

    #[test]
    fn from_config_missing_path() {
        let config = EmptyConfig;
        let result = SqliteAdapter::from_config(&config);
        match result {
            Err(EdgefinderError::ConfigMissing { section, key }) => {
                assert_eq!(section, "sqlite");
                assert_eq!(key, "path");
            }
            Err(other) => panic!("expected ConfigMissing, got: {other}"),
            Ok(_) => panic!("expected error, got Ok"),
        }
    }

    #[test]
    fn round_trips_every_field() {
        let adapter = store();
        let original = stats("macd_bullish_cross", Direction::Long, 40.0, 1.8);
        assert_eq!(adapter.upsert_statistics(30, std::slice::from_ref(&original)).unwrap(), 1);

        let loaded = adapter.load_all(30).unwrap();
        assert_eq!(loaded, vec![original]);
    }

    #[test]
    fn upsert_replaces_same_key() {
        let adapter = store();
        adapter
            .upsert_statistics(30, &[stats("support_bounce", Direction::Long, 10.0, 1.2)])
            .unwrap();
        adapter
            .upsert_statistics(30, &[stats("support_bounce", Direction::Long, 25.0, 1.6)])
            .unwrap();
        adapter
            .upsert_statistics(60, &[stats("support_bounce", Direction::Long, 5.0, 1.1)])
            .unwrap();

        let loaded = adapter.load_all(30).unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].expectancy, 25.0);
        assert_eq!(adapter.load_all(60).unwrap().len(), 1);
    }

    #[test]
    fn load_profitable_filters_and_orders() {
        let adapter = store();
        adapter
            .upsert_statistics(
                30,
                &[
                    stats("a", Direction::Long, 10.0, 1.5),
                    stats("b", Direction::Short, 30.0, 2.0),
                    stats("c", Direction::Long, -5.0, 0.8),
                    stats("d", Direction::Short, 5.0, 0.9),
                ],
            )
            .unwrap();

        let ids: Vec<String> = adapter
            .load_profitable(30)
            .unwrap()
            .into_iter()
            .map(|s| s.pattern_id)
            .collect();
        assert_eq!(ids, vec!["b".to_string(), "a".to_string()]);
        assert!(adapter.load_profitable(7).unwrap().is_empty());
    }
}
