//! Sample ingestion: validate one write, resolve the device schema, insert one row
//!
//! Each accepted write is its own transaction, committed before returning.
//! The device's schema row is created on its first write.

use crate::error::{ChartsError, Result};
use crate::registry::SchemaRegistry;
use crate::types::{DeviceSchema, Sample, MAX_WIDTH};
use rusqlite::types::Value;
use rusqlite::{params_from_iter, Connection};

/// Check write parameters in order: device, event kind, sample count
pub fn validate_write(device_id: &str, event_kind: &str, samples: &[Sample]) -> Result<()> {
    if device_id.is_empty() {
        return Err(ChartsError::missing("device_id"));
    }
    if event_kind.is_empty() {
        return Err(ChartsError::missing("event_kind"));
    }
    if samples.is_empty() {
        return Err(ChartsError::invalid("values", "No value to save"));
    }
    if samples.len() > MAX_WIDTH {
        return Err(ChartsError::invalid(
            "values",
            format!(
                "Too many values to save for event \"{}\". It is limited to {} values: {:?}",
                event_kind, MAX_WIDTH, samples
            ),
        ));
    }
    Ok(())
}

/// Persist one sample row stamped with `timestamp` (epoch seconds)
///
/// Returns the device schema the row was written under.
pub fn write_sample(
    conn: &mut Connection,
    device_id: &str,
    event_kind: &str,
    samples: &[Sample],
    timestamp: i64,
) -> Result<DeviceSchema> {
    validate_write(device_id, event_kind, samples)?;
    if timestamp < 0 {
        return Err(ChartsError::invalid("timestamp", "Timestamp value must be positive"));
    }

    log::debug!(
        "Save data device_id={} event={} timestamp={} values={:?}",
        device_id,
        event_kind,
        timestamp,
        samples
    );

    let fields: Vec<&str> = samples.iter().map(|s| s.field.as_str()).collect();

    let tx = conn.transaction()?;
    let schema = SchemaRegistry::resolve_or_create(&tx, device_id, event_kind, &fields)?;

    let width = schema.width;
    let placeholders = (1..=width.get() + 2)
        .map(|i| format!("?{}", i))
        .collect::<Vec<_>>()
        .join(", ");
    let sql = format!(
        "INSERT INTO {} (timestamp, device_id, {}) VALUES ({})",
        width.table(),
        width.value_columns().join(", "),
        placeholders
    );

    let mut bound: Vec<Value> = Vec::with_capacity(width.get() + 2);
    bound.push(Value::Integer(timestamp));
    bound.push(Value::Text(device_id.to_string()));
    bound.extend(samples.iter().map(|s| s.value.coerce()));

    tx.execute(&sql, params_from_iter(bound))?;
    tx.commit()?;

    Ok(schema)
}
