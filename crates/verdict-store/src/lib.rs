//! SQLite persistence for run history: one row per suite run, one row per
//! aggregated metric, so regressions can be tracked across time.

use std::path::Path;
use std::sync::{Arc, Mutex};

use anyhow::Result;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OpenFlags};
use serde::{Deserialize, Serialize};
use verdict_types::EvalSuiteResult;

#[derive(Debug)]
pub struct Store {
    conn: Arc<Mutex<Connection>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunRecord {
    pub id: i64,
    pub created_at: DateTime<Utc>,
    pub label: String,
    pub total_cases: usize,
    pub duration_ms: u64,
    pub cost: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricRecord {
    pub run_id: i64,
    pub name: String,
    pub mean: f64,
    pub p95: f64,
    pub std_dev: f64,
}

impl Store {
    /// Open (or create) a store at the given path, e.g. `verdict.db`.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_WRITE
                | OpenFlags::SQLITE_OPEN_CREATE
                | OpenFlags::SQLITE_OPEN_URI,
        )?;
        let store = Self { conn: Arc::new(Mutex::new(conn)) };
        store.init_schema()?;
        Ok(store)
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let store = Self { conn: Arc::new(Mutex::new(conn)) };
        store.init_schema()?;
        Ok(store)
    }

    fn init_schema(&self) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "CREATE TABLE IF NOT EXISTS runs (
                id INTEGER PRIMARY KEY,
                created_at TEXT NOT NULL,
                label TEXT NOT NULL,
                total_cases INTEGER NOT NULL,
                duration_ms INTEGER NOT NULL,
                cost REAL NOT NULL
            )",
            [],
        )?;
        conn.execute(
            "CREATE TABLE IF NOT EXISTS metrics (
                run_id INTEGER NOT NULL,
                name TEXT NOT NULL,
                mean REAL NOT NULL,
                p95 REAL NOT NULL,
                std_dev REAL NOT NULL,
                FOREIGN KEY(run_id) REFERENCES runs(id)
            )",
            [],
        )?;
        Ok(())
    }

    /// Persist a run's summary and aggregated metrics; returns the run id.
    pub fn save_result(&self, label: &str, result: &EvalSuiteResult) -> Result<i64> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO runs (created_at, label, total_cases, duration_ms, cost)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                Utc::now().to_rfc3339(),
                label,
                result.stats.total as i64,
                result.stats.duration_ms as i64,
                result.stats.cost,
            ],
        )?;
        let run_id = conn.last_insert_rowid();
        for agg in result.aggregated.values() {
            conn.execute(
                "INSERT INTO metrics (run_id, name, mean, p95, std_dev)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![run_id, agg.name, agg.mean, agg.p95, agg.std_dev],
            )?;
        }
        Ok(run_id)
    }

    pub fn list_runs(&self) -> Result<Vec<RunRecord>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT id, created_at, label, total_cases, duration_ms, cost
             FROM runs ORDER BY id DESC",
        )?;
        let rows = stmt.query_map([], |row| {
            let created: String = row.get(1)?;
            Ok(RunRecord {
                id: row.get(0)?,
                created_at: created
                    .parse::<DateTime<Utc>>()
                    .unwrap_or_else(|_| Utc::now()),
                label: row.get(2)?,
                total_cases: row.get::<_, i64>(3)? as usize,
                duration_ms: row.get::<_, i64>(4)? as u64,
                cost: row.get(5)?,
            })
        })?;
        Ok(rows.collect::<std::result::Result<Vec<_>, _>>()?)
    }

    /// Historical means for one metric, oldest first.
    pub fn metric_history(&self, name: &str) -> Result<Vec<MetricRecord>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT run_id, name, mean, p95, std_dev FROM metrics
             WHERE name = ?1 ORDER BY run_id ASC",
        )?;
        let rows = stmt.query_map(params![name], |row| {
            Ok(MetricRecord {
                run_id: row.get(0)?,
                name: row.get(1)?,
                mean: row.get(2)?,
                p95: row.get(3)?,
                std_dev: row.get(4)?,
            })
        })?;
        Ok(rows.collect::<std::result::Result<Vec<_>, _>>()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use verdict_types::{AggregatedMetric, SuiteStats};

    fn sample_result(mean: f64) -> EvalSuiteResult {
        let mut agg = AggregatedMetric::zero("exact_match");
        agg.mean = mean;
        EvalSuiteResult {
            results: vec![],
            aggregated: BTreeMap::from([("exact_match".to_string(), agg)]),
            suite_scores: vec![],
            assertions: vec![],
            stats: SuiteStats { total: 10, duration_ms: 1234, cost: 0.05 },
        }
    }

    #[test]
    fn round_trips_runs_and_metric_history() {
        let store = Store::open_in_memory().unwrap();
        let first = store.save_result("main", &sample_result(0.7)).unwrap();
        let second = store.save_result("candidate", &sample_result(0.9)).unwrap();
        assert!(second > first);

        let runs = store.list_runs().unwrap();
        assert_eq!(runs.len(), 2);
        assert_eq!(runs[0].label, "candidate");
        assert_eq!(runs[1].total_cases, 10);

        let history = store.metric_history("exact_match").unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].mean, 0.7);
        assert_eq!(history[1].mean, 0.9);
    }
}
