//! Core data structures for chart storage
//!
//! - `Width` selects one of the four fixed-width sample tables
//! - `MeasurementValue` / `Sample` describe one incoming `(field, value)` pair
//! - `DeviceSchema` mirrors one row of the `devices` table
//! - `Row` is one timestamped sample as read back from storage

use rusqlite::types::{ToSqlOutput, Value};
use rusqlite::ToSql;
use serde::{Deserialize, Serialize};

/// Maximum number of measurement columns per device
pub const MAX_WIDTH: usize = 4;

/// Key holding the timestamp in `dict` query output, reserved as a field name
pub const TIMESTAMP_KEY: &str = "ts";

/// Number of value columns used by a device (1..=4)
///
/// Each width maps to its own physical table, so table and column names are
/// only ever produced from this type and never from caller input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct Width(u8);

const TABLES: [&str; MAX_WIDTH] = ["data1", "data2", "data3", "data4"];
const VALUE_COLUMNS: [&str; MAX_WIDTH] = ["value1", "value2", "value3", "value4"];
const FIELD_COLUMNS: [&str; MAX_WIDTH] = ["field1", "field2", "field3", "field4"];

impl Width {
    pub fn new(count: usize) -> Option<Self> {
        if (1..=MAX_WIDTH).contains(&count) {
            Some(Width(count as u8))
        } else {
            None
        }
    }

    pub fn get(self) -> usize {
        self.0 as usize
    }

    pub fn all() -> [Width; MAX_WIDTH] {
        [Width(1), Width(2), Width(3), Width(4)]
    }

    pub fn table(self) -> &'static str {
        TABLES[self.get() - 1]
    }

    pub fn value_columns(self) -> &'static [&'static str] {
        &VALUE_COLUMNS[..self.get()]
    }

    pub fn field_columns(self) -> &'static [&'static str] {
        &FIELD_COLUMNS[..self.get()]
    }
}

/// Raw measurement value as produced by a sensor event
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MeasurementValue {
    Bool(bool),
    Integer(i64),
    Real(f64),
}

impl MeasurementValue {
    /// Booleans become integer 1/0, numbers pass through
    pub fn coerce(self) -> Value {
        match self {
            MeasurementValue::Bool(b) => Value::Integer(i64::from(b)),
            MeasurementValue::Integer(i) => Value::Integer(i),
            MeasurementValue::Real(r) => Value::Real(r),
        }
    }

    pub fn as_f64(self) -> f64 {
        match self {
            MeasurementValue::Bool(b) => {
                if b {
                    1.0
                } else {
                    0.0
                }
            }
            MeasurementValue::Integer(i) => i as f64,
            MeasurementValue::Real(r) => r,
        }
    }

    pub fn is_bool(self) -> bool {
        matches!(self, MeasurementValue::Bool(_))
    }
}

impl From<bool> for MeasurementValue {
    fn from(b: bool) -> Self {
        MeasurementValue::Bool(b)
    }
}

impl From<i64> for MeasurementValue {
    fn from(i: i64) -> Self {
        MeasurementValue::Integer(i)
    }
}

impl From<i32> for MeasurementValue {
    fn from(i: i32) -> Self {
        MeasurementValue::Integer(i64::from(i))
    }
}

impl From<f64> for MeasurementValue {
    fn from(r: f64) -> Self {
        MeasurementValue::Real(r)
    }
}

impl ToSql for MeasurementValue {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::Owned(self.coerce()))
    }
}

/// One `(field_name, value)` pair of a write
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    pub field: String,
    pub value: MeasurementValue,
}

impl Sample {
    pub fn new(field: impl Into<String>, value: impl Into<MeasurementValue>) -> Self {
        Self {
            field: field.into(),
            value: value.into(),
        }
    }
}

/// Stored layout of one device
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeviceSchema {
    pub device_id: String,
    pub event_kind: String,
    pub width: Width,
    pub field_names: Vec<String>,
}

impl DeviceSchema {
    /// Physical value column holding `field`, if the device has that field
    pub fn column_of(&self, field: &str) -> Option<usize> {
        self.field_names.iter().position(|name| name == field)
    }
}

/// One sample as read back: timestamp plus value columns in field order
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Row {
    pub timestamp: i64,
    pub values: Vec<f64>,
}

impl Row {
    pub fn new(timestamp: i64, values: Vec<f64>) -> Self {
        Self { timestamp, values }
    }
}
