//! Per-device schema registry backed by the `devices` table
//!
//! A device's event kind and width are fixed by its first accepted write and
//! never updated afterwards. Callers pass the connection (or an open
//! transaction) explicitly; the registry keeps no state of its own.

use crate::error::{ChartsError, Result, SchemaConflict};
use crate::types::{DeviceSchema, Width, TIMESTAMP_KEY};
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension};

pub struct SchemaRegistry;

impl SchemaRegistry {
    /// Look up a device's schema, `None` if the device was never written
    pub fn find(conn: &Connection, device_id: &str) -> Result<Option<DeviceSchema>> {
        let row = conn
            .query_row(
                "SELECT event_kind, width, field1, field2, field3, field4
                 FROM devices WHERE device_id = ?1",
                params![device_id],
                |row| {
                    let event_kind: String = row.get(0)?;
                    let width: i64 = row.get(1)?;
                    let mut fields = Vec::with_capacity(4);
                    for idx in 2..6 {
                        fields.push(row.get::<_, Option<String>>(idx)?);
                    }
                    Ok((event_kind, width, fields))
                },
            )
            .optional()?;

        let Some((event_kind, width, fields)) = row else {
            return Ok(None);
        };

        let width = usize::try_from(width)
            .ok()
            .and_then(Width::new)
            .ok_or(ChartsError::Database(rusqlite::Error::IntegralValueOutOfRange(1, width)))?;
        let field_names = fields.into_iter().take(width.get()).flatten().collect();

        Ok(Some(DeviceSchema {
            device_id: device_id.to_string(),
            event_kind,
            width,
            field_names,
        }))
    }

    /// Fetch a device's schema, failing with `NotFound` when absent
    pub fn get(conn: &Connection, device_id: &str) -> Result<DeviceSchema> {
        Self::find(conn, device_id)?.ok_or_else(|| ChartsError::NotFound {
            device_id: device_id.to_string(),
        })
    }

    /// Return the existing schema after checking it matches, or register a new one
    ///
    /// The width of a new device is `field_names.len()`, which must be 1..=4,
    /// and none of its fields may be named `ts`.
    /// An existing device must agree on event kind first, then on width;
    /// otherwise a `Conflict` carrying both stored and incoming values is
    /// returned and nothing is modified.
    pub fn resolve_or_create(
        conn: &Connection,
        device_id: &str,
        event_kind: &str,
        field_names: &[&str],
    ) -> Result<DeviceSchema> {
        if let Some(existing) = Self::find(conn, device_id)? {
            if existing.event_kind != event_kind {
                return Err(ChartsError::Conflict {
                    device_id: device_id.to_string(),
                    conflict: SchemaConflict::EventKind {
                        expected: existing.event_kind,
                        actual: event_kind.to_string(),
                    },
                });
            }
            if existing.width.get() != field_names.len() {
                return Err(ChartsError::Conflict {
                    device_id: device_id.to_string(),
                    conflict: SchemaConflict::Width {
                        event_kind: event_kind.to_string(),
                        expected: existing.width.get(),
                        actual: field_names.len(),
                    },
                });
            }
            return Ok(existing);
        }

        if field_names.contains(&TIMESTAMP_KEY) {
            return Err(ChartsError::invalid(
                "values",
                format!("field name \"{}\" is reserved for the sample timestamp", TIMESTAMP_KEY),
            ));
        }

        let width = Width::new(field_names.len()).ok_or_else(|| {
            ChartsError::invalid(
                "values",
                format!("a device stores 1 to 4 values, got {}", field_names.len()),
            )
        })?;

        let columns = width.field_columns().join(", ");
        let placeholders = (1..=width.get() + 3)
            .map(|i| format!("?{}", i))
            .collect::<Vec<_>>()
            .join(", ");
        let sql = format!(
            "INSERT INTO devices (device_id, event_kind, width, {}) VALUES ({})",
            columns, placeholders
        );

        let mut bound: Vec<Value> = vec![
            Value::Text(device_id.to_string()),
            Value::Text(event_kind.to_string()),
            Value::Integer(width.get() as i64),
        ];
        bound.extend(field_names.iter().map(|f| Value::Text(f.to_string())));

        conn.execute(&sql, params_from_iter(bound))?;
        log::debug!(
            "Registered device {} for event {} ({} values: {:?})",
            device_id,
            event_kind,
            width.get(),
            field_names
        );

        Ok(DeviceSchema {
            device_id: device_id.to_string(),
            event_kind: event_kind.to_string(),
            width,
            field_names: field_names.iter().map(|f| f.to_string()).collect(),
        })
    }

    /// Delete a device's schema row; absent devices are not an error
    ///
    /// Returns whether a row was removed. Samples are not touched here.
    pub fn remove(conn: &Connection, device_id: &str) -> Result<bool> {
        let removed = conn.execute("DELETE FROM devices WHERE device_id = ?1", params![device_id])?;
        Ok(removed > 0)
    }
}
