//! Database bootstrap for the charts store
//!
//! Tables created (all idempotent, `IF NOT EXISTS`):
//! - `devices` - one row per device (event kind, width, field names)
//! - `data1`..`data4` - fixed-width sample tables, one per device width
//!
//! Sample tables are indexed by `device_id` and by `timestamp` for range scans.
//! Their `device_id` references `devices`, so a schema row is written before
//! its first sample and removed only after its last one.

use crate::types::Width;
use rusqlite::Connection;

const DEVICES_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS devices (
    device_id   TEXT PRIMARY KEY NOT NULL,
    event_kind  TEXT NOT NULL,
    width       INTEGER NOT NULL CHECK (width BETWEEN 1 AND 4),
    field1      TEXT NOT NULL,
    field2      TEXT DEFAULT NULL,
    field3      TEXT DEFAULT NULL,
    field4      TEXT DEFAULT NULL
)
"#;

/// DDL for the sample table of one width
fn sample_table_ddl(width: Width) -> String {
    let table = width.table();
    let values = width
        .value_columns()
        .iter()
        .map(|column| format!("{} NUMERIC", column))
        .collect::<Vec<_>>()
        .join(", ");

    format!(
        "CREATE TABLE IF NOT EXISTS {table} (
            id          INTEGER PRIMARY KEY AUTOINCREMENT,
            timestamp   INTEGER NOT NULL,
            device_id   TEXT NOT NULL REFERENCES devices(device_id),
            {values}
        );
        CREATE INDEX IF NOT EXISTS {table}_device_index ON {table}(device_id);
        CREATE INDEX IF NOT EXISTS {table}_timestamp_index ON {table}(timestamp);",
    )
}

/// Create the devices table and the four sample tables
///
/// Safe to run on every start: existing tables and rows are left untouched.
pub fn init_schema(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(DEVICES_TABLE)?;
    for width in Width::all() {
        conn.execute_batch(&sample_table_ddl(width))?;
        log::debug!("   ├─ Table ready: {}", width.table());
    }
    log::debug!("   └─ Table ready: devices");
    Ok(())
}
