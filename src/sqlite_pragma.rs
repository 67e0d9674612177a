//! SQLite connection tuning shared by every charts connection

use rusqlite::Connection;
use std::time::Duration;

/// Pages between automatic WAL checkpoints
pub const WAL_AUTOCHECKPOINT_PAGES: i64 = 1000;

/// Apply PRAGMAs for a single-writer embedded store
///
/// - `journal_mode = WAL` (file databases only, in-memory stays MEMORY)
/// - `synchronous = NORMAL`
/// - `temp_store = MEMORY`
/// - `wal_autocheckpoint = 1000`
/// - `foreign_keys = ON`
/// - busy timeout from configuration
pub fn apply_optimized_pragmas(conn: &Connection, busy_timeout: Duration) -> rusqlite::Result<()> {
    conn.busy_timeout(busy_timeout)?;

    let in_memory = conn.path().map(|p| p.is_empty()).unwrap_or(true);
    if !in_memory {
        // journal_mode returns the resulting mode as a row
        let mode: String = conn.query_row("PRAGMA journal_mode = WAL", [], |row| row.get(0))?;
        log::debug!("SQLite journal mode: {}", mode);
    }

    conn.pragma_update(None, "synchronous", "NORMAL")?;
    conn.pragma_update(None, "temp_store", "MEMORY")?;
    conn.pragma_update(None, "wal_autocheckpoint", WAL_AUTOCHECKPOINT_PAGES)?;
    conn.pragma_update(None, "foreign_keys", "ON")?;

    Ok(())
}
