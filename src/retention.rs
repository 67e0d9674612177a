//! Retention: purge old samples and erase devices

use crate::error::{ChartsError, Result};
use crate::registry::SchemaRegistry;
use crate::types::Width;
use rusqlite::{params, Connection};

/// What `delete_device` removed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DeviceDeletion {
    pub samples_removed: usize,
    pub schema_removed: bool,
}

/// Delete a device's samples strictly older than `cutoff_ts`
///
/// Returns the number of rows removed. Fails with `NotFound` for unknown devices.
pub fn purge(conn: &mut Connection, device_id: &str, cutoff_ts: i64) -> Result<usize> {
    if device_id.is_empty() {
        return Err(ChartsError::missing("device_id"));
    }
    if cutoff_ts < 0 {
        return Err(ChartsError::invalid("cutoff_ts", "Timestamp_until value must be positive"));
    }

    let tx = conn.transaction()?;
    let schema = SchemaRegistry::get(&tx, device_id)?;
    let sql = format!(
        "DELETE FROM {} WHERE device_id = ?1 AND timestamp < ?2",
        schema.width.table()
    );
    log::debug!("Purge query: {} with device_id={}, timestamp={}", sql, device_id, cutoff_ts);

    let removed = tx.execute(&sql, params![device_id, cutoff_ts])?;
    tx.commit()?;

    Ok(removed)
}

/// Delete all of a device's samples, then its schema row
///
/// Repeating the call on an erased device succeeds and changes nothing. When
/// no schema row exists every sample table is swept, so no orphaned samples
/// survive either way.
pub fn delete_device(conn: &mut Connection, device_id: &str) -> Result<DeviceDeletion> {
    if device_id.is_empty() {
        return Err(ChartsError::missing("device_id"));
    }

    let tx = conn.transaction()?;
    let tables: Vec<&'static str> = match SchemaRegistry::find(&tx, device_id)? {
        Some(schema) => vec![schema.width.table()],
        None => Width::all().iter().map(|w| w.table()).collect(),
    };

    let mut samples_removed = 0;
    for table in tables {
        let sql = format!("DELETE FROM {} WHERE device_id = ?1", table);
        log::debug!("Data query: {}", sql);
        samples_removed += tx.execute(&sql, params![device_id])?;
    }
    let schema_removed = SchemaRegistry::remove(&tx, device_id)?;
    tx.commit()?;

    Ok(DeviceDeletion {
        samples_removed,
        schema_removed,
    })
}
