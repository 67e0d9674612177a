//! `ChartStore` - the owned storage handle the host calls into
//!
//! One SQLite connection behind a mutex: every public operation holds the
//! lock for its whole duration, so writes are serialized and a reader never
//! sees a half-committed write. Share it across tasks with `Arc<ChartStore>`.

use crate::config::ChartsConfig;
use crate::db::init_schema;
use crate::error::{ChartsError, Result};
use crate::ingest::write_sample;
use crate::query::{query_range, QueryOptions, QueryResult};
use crate::registry::SchemaRegistry;
use crate::retention::{self, DeviceDeletion};
use crate::sqlite_pragma::apply_optimized_pragmas;
use crate::types::{DeviceSchema, Sample};
use rusqlite::Connection;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

pub struct ChartStore {
    conn: Mutex<Connection>,
    max_data_size: usize,
}

impl ChartStore {
    /// Open (or create) a file-backed store
    ///
    /// Creates the parent directory when missing, applies PRAGMAs and makes
    /// sure every table exists.
    pub fn open(db_path: impl AsRef<Path>, config: &ChartsConfig) -> Result<Self> {
        let db_path = db_path.as_ref();
        if let Some(parent) = db_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(db_path)?;
        let store = Self::with_connection(conn, config)?;
        log::info!("✅ Charts database ready: {}", db_path.display());
        Ok(store)
    }

    /// Store backed by a private in-memory database
    pub fn open_in_memory(config: &ChartsConfig) -> Result<Self> {
        Self::with_connection(Connection::open_in_memory()?, config)
    }

    /// Wrap an already opened connection
    pub fn with_connection(conn: Connection, config: &ChartsConfig) -> Result<Self> {
        apply_optimized_pragmas(&conn, config.busy_timeout())?;
        init_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
            max_data_size: config.max_data_size,
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| ChartsError::LockPoisoned)
    }

    /// Store one sample stamped with the current time
    pub fn write(&self, device_id: &str, event_kind: &str, samples: &[Sample]) -> Result<DeviceSchema> {
        self.write_at(device_id, event_kind, samples, chrono::Utc::now().timestamp())
    }

    /// Store one sample stamped with an explicit epoch-seconds timestamp
    pub fn write_at(
        &self,
        device_id: &str,
        event_kind: &str,
        samples: &[Sample],
        timestamp: i64,
    ) -> Result<DeviceSchema> {
        let mut conn = self.lock()?;
        write_sample(&mut conn, device_id, event_kind, samples, timestamp)
    }

    /// Read a device's samples in `[start_ts, end_ts]`
    pub fn query(
        &self,
        device_id: &str,
        start_ts: i64,
        end_ts: i64,
        options: &QueryOptions,
    ) -> Result<QueryResult> {
        let conn = self.lock()?;
        query_range(&conn, device_id, start_ts, end_ts, options, self.max_data_size)
    }

    /// Delete a device's samples older than `cutoff_ts`, returns rows removed
    pub fn purge(&self, device_id: &str, cutoff_ts: i64) -> Result<usize> {
        let mut conn = self.lock()?;
        let removed = retention::purge(&mut conn, device_id, cutoff_ts)?;
        log::debug!("Purged {} samples of device {} before {}", removed, device_id, cutoff_ts);
        Ok(removed)
    }

    /// Delete every sample of a device, then its schema
    pub fn delete_device(&self, device_id: &str) -> Result<DeviceDeletion> {
        let mut conn = self.lock()?;
        let deletion = retention::delete_device(&mut conn, device_id)?;
        log::info!(
            "🗑️  Device {} deleted ({} samples, schema removed: {})",
            device_id,
            deletion.samples_removed,
            deletion.schema_removed
        );
        Ok(deletion)
    }

    /// Stored schema of a device
    pub fn schema(&self, device_id: &str) -> Result<DeviceSchema> {
        let conn = self.lock()?;
        SchemaRegistry::get(&conn, device_id)
    }

    pub fn max_data_size(&self) -> usize {
        self.max_data_size
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SchemaConflict;
    use crate::query::OutputFormat;
    use rusqlite::params;
    use tempfile::tempdir;

    fn store() -> ChartStore {
        ChartStore::open_in_memory(&ChartsConfig::default()).unwrap()
    }

    #[test]
    fn test_write_then_query_now() {
        let store = store();
        for width in 1..=4usize {
            let device = format!("dev-{}", width);
            let samples: Vec<Sample> = (1..=width)
                .map(|i| Sample::new(format!("test{}", i), i as i64))
                .collect();

            let start = chrono::Utc::now().timestamp();
            store.write(&device, "test.test.test", &samples).unwrap();
            let end = chrono::Utc::now().timestamp();

            let result = store.query(&device, start, end, &QueryOptions::default()).unwrap();
            let rows = result.data.rows().unwrap();
            assert_eq!(rows.len(), 1);
            assert_eq!(result.field_names.len(), width);
            for sample in &samples {
                assert_eq!(rows[0].get(&sample.field), Some(sample.value.as_f64()));
            }
        }
    }

    #[test]
    fn test_bool_reads_back_as_one() {
        let store = store();
        store.write_at("switch", "test.test.test", &[Sample::new("on", true)], 10).unwrap();

        let result = store.query("switch", 0, 20, &QueryOptions::default()).unwrap();
        assert_eq!(result.data.rows().unwrap()[0].get("on"), Some(1.0));
    }

    #[test]
    fn test_conflicts_surface_through_store() {
        let store = store();
        store.write_at("dev", "a.b.c", &[Sample::new("x", 1i64)], 1).unwrap();

        let err = store.write_at("dev", "a.b.d", &[Sample::new("x", 1i64)], 2).unwrap_err();
        assert!(matches!(
            err,
            ChartsError::Conflict {
                conflict: SchemaConflict::EventKind { .. },
                ..
            }
        ));
        assert_eq!(store.schema("dev").unwrap().event_kind, "a.b.c");
    }

    #[test]
    fn test_purge_after_write() {
        let store = store();
        store.write("dev", "test.test.test", &[Sample::new("x", 1i64)]).unwrap();

        let removed = store.purge("dev", chrono::Utc::now().timestamp() + 1).unwrap();
        assert_eq!(removed, 1);

        let result = store
            .query("dev", 0, i64::MAX, &QueryOptions::default().with_output(OutputFormat::List))
            .unwrap();
        assert!(result.data.is_empty());
    }

    #[test]
    fn test_file_store_persists_and_creates_directory() {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("nested").join("charts.db");

        {
            let store = ChartStore::open(&db_path, &ChartsConfig::default()).unwrap();
            store.write_at("dev", "e.v.t", &[Sample::new("a", 1.5), Sample::new("b", 2i64)], 5).unwrap();
        }

        // second connection sees committed rows
        let conn = Connection::open(&db_path).unwrap();
        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM data2 WHERE device_id = ?1", params!["dev"], |row| row.get(0))
            .unwrap();
        assert_eq!(count, 1);

        let reopened = ChartStore::open(&db_path, &ChartsConfig::default()).unwrap();
        assert_eq!(reopened.schema("dev").unwrap().field_names, vec!["a", "b"]);
    }

    #[test]
    fn test_store_is_shareable() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<ChartStore>();
    }
}
