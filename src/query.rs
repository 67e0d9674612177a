//! Time-range queries over a device's sample table
//!
//! A query resolves the device schema, maps requested field names to value
//! columns, scans `[start_ts, end_ts]` in the requested order, optionally
//! averages the rows down to the configured size budget and shapes them as
//! rows (`dict`) or per-field series (`list`).

use crate::downsample::{reduce_by_factor, reduction_factor};
use crate::error::{ChartsError, Result};
use crate::registry::SchemaRegistry;
use crate::types::{DeviceSchema, Row};
use rusqlite::{params, Connection};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// One map per sample, keyed by field name plus `ts`
    #[default]
    Dict,
    /// One `(timestamp, value)` series per field
    List,
}

impl FromStr for OutputFormat {
    type Err = ChartsError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "dict" => Ok(OutputFormat::Dict),
            "list" => Ok(OutputFormat::List),
            other => Err(ChartsError::invalid(
                "output",
                format!("expected \"dict\" or \"list\", got \"{}\"", other),
            )),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    #[default]
    Asc,
    Desc,
}

impl SortOrder {
    pub fn as_sql(&self) -> &'static str {
        match self {
            SortOrder::Asc => "ASC",
            SortOrder::Desc => "DESC",
        }
    }
}

impl FromStr for SortOrder {
    type Err = ChartsError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "asc" => Ok(SortOrder::Asc),
            "desc" => Ok(SortOrder::Desc),
            other => Err(ChartsError::invalid(
                "sort",
                format!("expected \"asc\" or \"desc\", got \"{}\"", other),
            )),
        }
    }
}

/// Query shaping options
///
/// Defaults: all fields, `dict` output, ascending, no limit, averaging on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueryOptions {
    /// Fields to return; empty means every field of the device
    pub fields: Vec<String>,
    pub output: OutputFormat,
    pub sort: SortOrder,
    /// Maximum number of raw samples read (must be positive)
    pub limit: Option<usize>,
    /// Route rows through the downsampler before shaping
    pub average: bool,
}

impl Default for QueryOptions {
    fn default() -> Self {
        Self {
            fields: Vec::new(),
            output: OutputFormat::Dict,
            sort: SortOrder::Asc,
            limit: None,
            average: true,
        }
    }
}

impl QueryOptions {
    pub fn with_fields<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.fields = fields.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_output(mut self, output: OutputFormat) -> Self {
        self.output = output;
        self
    }

    pub fn with_sort(mut self, sort: SortOrder) -> Self {
        self.sort = sort;
        self
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn with_average(mut self, average: bool) -> Self {
        self.average = average;
        self
    }
}

/// One sample in `dict` output: `{"ts": .., "<field>": ..}`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DataPoint {
    pub ts: i64,
    #[serde(flatten)]
    pub values: BTreeMap<String, f64>,
}

impl DataPoint {
    pub fn get(&self, field: &str) -> Option<f64> {
        self.values.get(field).copied()
    }
}

/// One field's values in `list` output
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Series {
    pub name: String,
    pub values: Vec<(i64, f64)>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum QueryData {
    Rows(Vec<DataPoint>),
    Series(Vec<Series>),
}

impl QueryData {
    /// Number of samples (rows, or points of the first series)
    pub fn len(&self) -> usize {
        match self {
            QueryData::Rows(rows) => rows.len(),
            QueryData::Series(series) => series.first().map(|s| s.values.len()).unwrap_or(0),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn rows(&self) -> Option<&[DataPoint]> {
        match self {
            QueryData::Rows(rows) => Some(rows),
            QueryData::Series(_) => None,
        }
    }

    pub fn series(&self, name: &str) -> Option<&Series> {
        match self {
            QueryData::Series(series) => series.iter().find(|s| s.name == name),
            QueryData::Rows(_) => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueryResult {
    pub device_id: String,
    pub event_kind: String,
    /// Field names present in `data`, in column order
    pub field_names: Vec<String>,
    pub data: QueryData,
}

pub fn validate_range(device_id: &str, start_ts: i64, end_ts: i64) -> Result<()> {
    if device_id.is_empty() {
        return Err(ChartsError::missing("device_id"));
    }
    if start_ts < 0 {
        return Err(ChartsError::invalid("start_ts", "Timestamp_start value must be positive"));
    }
    if end_ts < 0 {
        return Err(ChartsError::invalid("end_ts", "Timestamp_end value must be positive"));
    }
    Ok(())
}

/// Map requested field names to value column positions
///
/// Unknown names are dropped, duplicates keep their first occurrence.
fn select_columns(schema: &DeviceSchema, requested: &[String]) -> Vec<usize> {
    if requested.is_empty() {
        return (0..schema.field_names.len()).collect();
    }
    let mut columns = Vec::with_capacity(requested.len());
    for field in requested {
        match schema.column_of(field) {
            Some(col) if !columns.contains(&col) => columns.push(col),
            Some(_) => {}
            None => log::debug!("Ignoring unknown field {} for device {}", field, schema.device_id),
        }
    }
    columns
}

fn scan_rows(
    conn: &Connection,
    schema: &DeviceSchema,
    columns: &[usize],
    start_ts: i64,
    end_ts: i64,
    options: &QueryOptions,
) -> Result<Vec<Row>> {
    let value_columns = schema.width.value_columns();
    let mut select = vec!["timestamp"];
    select.extend(columns.iter().map(|&col| value_columns[col]));

    let order = options.sort.as_sql();
    let mut sql = format!(
        "SELECT {} FROM {} WHERE device_id = ?1 AND timestamp >= ?2 AND timestamp <= ?3 ORDER BY timestamp {}, id {}",
        select.join(", "),
        schema.width.table(),
        order,
        order
    );
    if let Some(limit) = options.limit {
        sql.push_str(&format!(" LIMIT {}", limit));
    }
    log::debug!("Select query: {}", sql);

    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(params![schema.device_id, start_ts, end_ts], |row| {
        let timestamp: i64 = row.get(0)?;
        let mut values = Vec::with_capacity(columns.len());
        for idx in 1..=columns.len() {
            values.push(row.get::<_, Option<f64>>(idx)?.unwrap_or(f64::NAN));
        }
        Ok(Row::new(timestamp, values))
    })?;

    let collected = rows.collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(collected)
}

/// Read a device's samples in `[start_ts, end_ts]` shaped per `options`
///
/// `size_budget` is the downsampler byte budget used when averaging is on.
pub fn query_range(
    conn: &Connection,
    device_id: &str,
    start_ts: i64,
    end_ts: i64,
    options: &QueryOptions,
    size_budget: usize,
) -> Result<QueryResult> {
    validate_range(device_id, start_ts, end_ts)?;
    match options.limit {
        Some(0) => return Err(ChartsError::invalid("limit", "Limit must be a positive integer")),
        Some(limit) if i64::try_from(limit).is_err() => {
            return Err(ChartsError::invalid(
                "limit",
                format!("Limit must not exceed {}", i64::MAX),
            ))
        }
        _ => {}
    }

    let schema = SchemaRegistry::get(conn, device_id)?;
    let columns = select_columns(&schema, &options.fields);
    let field_names: Vec<String> = columns
        .iter()
        .map(|&col| schema.field_names[col].clone())
        .collect();

    let rows = scan_rows(conn, &schema, &columns, start_ts, end_ts, options)?;
    let factor = if options.average {
        reduction_factor(rows.len(), columns.len(), size_budget)
    } else {
        1
    };
    log::debug!(
        "Query device={} range=[{}, {}] rows={} factor={} output={:?}",
        device_id,
        start_ts,
        end_ts,
        rows.len(),
        factor,
        options.output
    );

    let data = match options.output {
        OutputFormat::Dict => QueryData::Rows(
            reduce_by_factor(rows, factor)
                .into_iter()
                .map(|row| DataPoint {
                    ts: row.timestamp,
                    values: field_names.iter().cloned().zip(row.values).collect(),
                })
                .collect(),
        ),
        OutputFormat::List => QueryData::Series(
            field_names
                .iter()
                .enumerate()
                .map(|(idx, name)| {
                    let series_rows = rows
                        .iter()
                        .map(|row| Row::new(row.timestamp, vec![row.values[idx]]))
                        .collect();
                    Series {
                        name: name.clone(),
                        values: reduce_by_factor(series_rows, factor)
                            .into_iter()
                            .map(|row| (row.timestamp, row.values[0]))
                            .collect(),
                    }
                })
                .collect(),
        ),
    };

    Ok(QueryResult {
        device_id: schema.device_id,
        event_kind: schema.event_kind,
        field_names,
        data,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::init_schema;
    use crate::ingest::write_sample;
    use crate::types::Sample;

    const EVENT: &str = "test.test.test";
    const BUDGET: usize = 1_000_000;

    fn setup() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        init_schema(&conn).unwrap();
        conn
    }

    /// Writes `count` 3-field samples, value i at timestamp start + i
    fn fill(conn: &mut Connection, device: &str, start: i64, count: i64) {
        for i in 0..count {
            let values = vec![
                Sample::new("field1", i),
                Sample::new("field2", i),
                Sample::new("field3", i),
            ];
            write_sample(conn, device, EVENT, &values, start + i).unwrap();
        }
    }

    #[test]
    fn test_dict_output_all_fields() {
        let mut conn = setup();
        let values = vec![Sample::new("test1", 1i64), Sample::new("test2", 2.5)];
        write_sample(&mut conn, "dev", EVENT, &values, 500).unwrap();

        let result = query_range(&conn, "dev", 500, 500, &QueryOptions::default(), BUDGET).unwrap();
        assert_eq!(result.device_id, "dev");
        assert_eq!(result.event_kind, EVENT);
        assert_eq!(result.field_names, vec!["test1", "test2"]);

        let rows = result.data.rows().unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].ts, 500);
        assert_eq!(rows[0].get("test1"), Some(1.0));
        assert_eq!(rows[0].get("test2"), Some(2.5));
    }

    #[test]
    fn test_dict_point_serializes_with_ts_key() {
        let mut conn = setup();
        write_sample(&mut conn, "dev", EVENT, &[Sample::new("timestamp", 3i64)], 42).unwrap();

        let result = query_range(&conn, "dev", 0, 100, &QueryOptions::default(), BUDGET).unwrap();
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["data"][0]["ts"], 42);
        assert_eq!(json["data"][0]["timestamp"], 3.0);
        assert_eq!(json["field_names"][0], "timestamp");
    }

    #[test]
    fn test_sort_and_limit() {
        let mut conn = setup();
        fill(&mut conn, "dev", 1_000, 10);

        let asc = query_range(&conn, "dev", 0, 2_000, &QueryOptions::default(), BUDGET).unwrap();
        let ts: Vec<i64> = asc.data.rows().unwrap().iter().map(|p| p.ts).collect();
        assert!(ts.windows(2).all(|w| w[0] <= w[1]));

        let options = QueryOptions::default().with_sort(SortOrder::Desc);
        let desc = query_range(&conn, "dev", 0, 2_000, &options, BUDGET).unwrap();
        let ts: Vec<i64> = desc.data.rows().unwrap().iter().map(|p| p.ts).collect();
        assert!(ts.windows(2).all(|w| w[0] >= w[1]));
        assert_eq!(ts[0], 1_009);

        let options = QueryOptions::default().with_limit(2);
        let limited = query_range(&conn, "dev", 0, 2_000, &options, BUDGET).unwrap();
        assert_eq!(limited.data.len(), 2);
    }

    #[test]
    fn test_range_bounds_inclusive() {
        let mut conn = setup();
        fill(&mut conn, "dev", 100, 10);

        let result = query_range(&conn, "dev", 102, 105, &QueryOptions::default(), BUDGET).unwrap();
        let ts: Vec<i64> = result.data.rows().unwrap().iter().map(|p| p.ts).collect();
        assert_eq!(ts, vec![102, 103, 104, 105]);
    }

    #[test]
    fn test_field_filter_drops_unknown() {
        let mut conn = setup();
        fill(&mut conn, "dev", 100, 3);

        let options = QueryOptions::default().with_fields(["field2", "missing", "field2"]);
        let result = query_range(&conn, "dev", 0, 1_000, &options, BUDGET).unwrap();
        assert_eq!(result.field_names, vec!["field2"]);

        let row = &result.data.rows().unwrap()[0];
        assert!(row.get("field2").is_some());
        assert!(row.get("field1").is_none());
    }

    #[test]
    fn test_list_output() {
        let mut conn = setup();
        fill(&mut conn, "dev", 100, 6);

        let options = QueryOptions::default()
            .with_output(OutputFormat::List)
            .with_average(false);
        let result = query_range(&conn, "dev", 0, 1_000, &options, BUDGET).unwrap();

        for name in ["field1", "field2", "field3"] {
            let series = result.data.series(name).unwrap();
            assert_eq!(series.values.len(), 6);
            assert_eq!(series.values[3], (103, 3.0));
        }

        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["data"][0]["name"], "field1");
        assert_eq!(json["data"][0]["values"][0][0], 100);
    }

    #[test]
    fn test_list_and_dict_agree_without_average() {
        let mut conn = setup();
        fill(&mut conn, "dev", 100, 25);

        let dict = query_range(
            &conn,
            "dev",
            0,
            1_000,
            &QueryOptions::default().with_average(false),
            BUDGET,
        )
        .unwrap();
        let list = query_range(
            &conn,
            "dev",
            0,
            1_000,
            &QueryOptions::default()
                .with_output(OutputFormat::List)
                .with_average(false),
            BUDGET,
        )
        .unwrap();

        assert_eq!(dict.data.len(), 25);
        for name in &list.field_names {
            assert_eq!(list.data.series(name).unwrap().values.len(), 25);
        }
    }

    #[test]
    fn test_dict_output_averaged() {
        let mut conn = setup();
        fill(&mut conn, "dev", 1_000, 100);

        // 100 rows * (8 + 3 * 8) bytes = 3200 bytes
        let full = query_range(&conn, "dev", 0, 5_000, &QueryOptions::default(), 3_200).unwrap();
        assert_eq!(full.data.len(), 100);

        let half = query_range(&conn, "dev", 0, 5_000, &QueryOptions::default(), 1_600).unwrap();
        assert_eq!(half.data.len(), 50);

        let quarter = query_range(&conn, "dev", 0, 5_000, &QueryOptions::default(), 800).unwrap();
        assert_eq!(quarter.data.len(), 25);

        let twentieth = query_range(&conn, "dev", 0, 5_000, &QueryOptions::default(), 160).unwrap();
        let rows = twentieth.data.rows().unwrap();
        assert_eq!(rows.len(), 5);
        for (row, expected) in rows.iter().zip([9.5, 29.5, 49.5, 69.5, 89.5]) {
            assert_eq!(row.get("field1"), Some(expected));
            assert_eq!(row.get("field2"), Some(expected));
            assert_eq!(row.get("field3"), Some(expected));
        }

        let raw = query_range(
            &conn,
            "dev",
            0,
            5_000,
            &QueryOptions::default().with_average(false),
            160,
        )
        .unwrap();
        assert_eq!(raw.data.len(), 100);
    }

    #[test]
    fn test_list_output_averaged_series_aligned() {
        let mut conn = setup();
        fill(&mut conn, "dev", 1_000, 100);

        let options = QueryOptions::default().with_output(OutputFormat::List);
        let result = query_range(&conn, "dev", 0, 5_000, &options, 160).unwrap();

        for name in ["field1", "field2", "field3"] {
            let series = result.data.series(name).unwrap();
            let values: Vec<f64> = series.values.iter().map(|(_, v)| *v).collect();
            assert_eq!(values, vec![9.5, 29.5, 49.5, 69.5, 89.5]);
        }
        let ts1: Vec<i64> = result.data.series("field1").unwrap().values.iter().map(|(t, _)| *t).collect();
        let ts3: Vec<i64> = result.data.series("field3").unwrap().values.iter().map(|(t, _)| *t).collect();
        assert_eq!(ts1, ts3);
    }

    #[test]
    fn test_query_invalid_parameters() {
        let mut conn = setup();
        fill(&mut conn, "dev", 100, 1);
        let options = QueryOptions::default();

        assert!(matches!(
            query_range(&conn, "", 0, 1, &options, BUDGET),
            Err(ChartsError::MissingParameter { parameter: "device_id" })
        ));
        assert!(matches!(
            query_range(&conn, "dev", -1, 1, &options, BUDGET),
            Err(ChartsError::InvalidParameter { parameter: "start_ts", .. })
        ));
        assert!(matches!(
            query_range(&conn, "dev", 0, -1, &options, BUDGET),
            Err(ChartsError::InvalidParameter { parameter: "end_ts", .. })
        ));
        assert!(matches!(
            query_range(&conn, "dev", 0, 1, &QueryOptions::default().with_limit(0), BUDGET),
            Err(ChartsError::InvalidParameter { parameter: "limit", .. })
        ));
        assert!(matches!(
            query_range(&conn, "unknown", 0, 1, &options, BUDGET),
            Err(ChartsError::NotFound { .. })
        ));
    }

    #[test]
    fn test_limit_beyond_sqlite_range() {
        let mut conn = setup();
        fill(&mut conn, "dev", 100, 3);

        let err = query_range(&conn, "dev", 0, 1_000, &QueryOptions::default().with_limit(usize::MAX), BUDGET)
            .unwrap_err();
        assert!(matches!(err, ChartsError::InvalidParameter { parameter: "limit", .. }));
        assert!(err.is_validation());

        // largest limit SQLite accepts still returns everything
        let options = QueryOptions::default().with_limit(i64::MAX as usize);
        let result = query_range(&conn, "dev", 0, 1_000, &options, BUDGET).unwrap();
        assert_eq!(result.data.len(), 3);
    }

    #[test]
    fn test_options_parse() {
        assert_eq!("list".parse::<OutputFormat>().unwrap(), OutputFormat::List);
        assert_eq!("desc".parse::<SortOrder>().unwrap(), SortOrder::Desc);
        assert!("csv".parse::<OutputFormat>().is_err());

        let options: QueryOptions = serde_json::from_str(r#"{"output": "list", "limit": 5}"#).unwrap();
        assert_eq!(options.output, OutputFormat::List);
        assert_eq!(options.limit, Some(5));
        assert!(options.average);
        assert_eq!(options.sort, SortOrder::Asc);
    }
}
