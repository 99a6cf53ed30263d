//! SQLite implementation of the table store.

use super::{DateFilter, ReadRequest, Record, TableStore, Value};
use crate::checkpoint::CheckpointStore;
use crate::error::Result;
use crate::frame::{self, parse_date};
use chrono::{NaiveDate, Utc};
use polars::prelude::*;
use rusqlite::{Connection, OptionalExtension, params, params_from_iter};
use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use tracing::{debug, trace};

/// SQLite-backed table store.
///
/// Every logical table lives in one `observations` table in long format, so new tables
/// and fields need no schema change. Checkpoints live next to the data in the same file.
#[derive(Debug)]
pub struct SqliteStore {
    conn: Connection,
}

/// Row of the `observations` table.
#[derive(Debug)]
struct StoredRow {
    date: String,
    id: String,
    report_period: String,
    field: String,
    value: Option<Value>,
}

impl SqliteStore {
    /// Open (or create) a store.
    ///
    /// # Arguments
    /// * `path` - Path to the SQLite database file
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let conn = Connection::open(path)?;
        debug!(path = %path.display(), "opened table store");
        let store = Self { conn };
        store.initialize_schema()?;
        Ok(store)
    }

    /// Create an in-memory store (useful for testing).
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let store = Self { conn };
        store.initialize_schema()?;
        Ok(store)
    }

    /// Initialize the database schema.
    fn initialize_schema(&self) -> Result<()> {
        // Report period is '' for non-accounting rows so it can take part in the key
        self.conn.execute(
            "CREATE TABLE IF NOT EXISTS observations (
                table_name TEXT NOT NULL,
                date TEXT NOT NULL,
                id TEXT NOT NULL,
                report_period TEXT NOT NULL DEFAULT '',
                field TEXT NOT NULL,
                num_value REAL,
                text_value TEXT,
                written_at TEXT NOT NULL,
                PRIMARY KEY (table_name, id, date, report_period, field)
            )",
            [],
        )?;

        self.conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_observations_table_date
             ON observations(table_name, date)",
            [],
        )?;

        self.conn.execute(
            "CREATE TABLE IF NOT EXISTS checkpoints (
                stream TEXT PRIMARY KEY,
                last_processed TEXT NOT NULL,
                updated_at TEXT NOT NULL
            )",
            [],
        )?;

        trace!("table store schema ready");
        Ok(())
    }

    /// Distinct fields stored for a table.
    fn fields_of(&self, table: &str) -> Result<Vec<String>> {
        let mut stmt = self.conn.prepare(
            "SELECT DISTINCT field FROM observations WHERE table_name = ?1 ORDER BY field",
        )?;
        let fields = stmt
            .query_map(params![table], |row| row.get(0))?
            .collect::<std::result::Result<Vec<String>, _>>()?;
        Ok(fields)
    }

    fn query_rows(&self, request: &ReadRequest, fields: &[String]) -> Result<Vec<StoredRow>> {
        let mut sql = String::from(
            "SELECT date, id, report_period, field, num_value, text_value
             FROM observations WHERE table_name = ?",
        );
        let mut args = vec![request.table.clone()];

        push_in_clause(&mut sql, &mut args, "field", fields.iter().cloned());
        match &request.dates {
            DateFilter::All => {}
            DateFilter::On(dates) => {
                push_in_clause(&mut sql, &mut args, "date", dates.iter().map(|d| d.to_string()));
            }
            DateFilter::Between { start, end } => {
                if let Some(start) = start {
                    sql.push_str(" AND date >= ?");
                    args.push(start.to_string());
                }
                if let Some(end) = end {
                    sql.push_str(" AND date <= ?");
                    args.push(end.to_string());
                }
            }
        }
        if let Some(ids) = &request.ids {
            push_in_clause(&mut sql, &mut args, "id", ids.iter().cloned());
        }
        if let Some(period) = request.report_period {
            sql.push_str(" AND report_period = ?");
            args.push(period.to_string());
        }
        sql.push_str(" ORDER BY date, id, report_period");

        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map(params_from_iter(args.iter()), |row| {
            let num: Option<f64> = row.get(4)?;
            let text: Option<String> = row.get(5)?;
            Ok(StoredRow {
                date: row.get(0)?,
                id: row.get(1)?,
                report_period: row.get(2)?,
                field: row.get(3)?,
                value: num.map(Value::Number).or(text.map(Value::Text)),
            })
        })?;

        let mut stored = Vec::new();
        for row in rows {
            stored.push(row?);
        }
        Ok(stored)
    }

    /// Row counts per table.
    pub fn stats(&self) -> Result<StoreStats> {
        let mut stmt = self.conn.prepare(
            "SELECT table_name, COUNT(*) FROM observations GROUP BY table_name ORDER BY table_name",
        )?;
        let tables = stmt
            .query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)? as usize)))?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        let checkpoints: i64 =
            self.conn
                .query_row("SELECT COUNT(*) FROM checkpoints", [], |row| row.get(0))?;

        Ok(StoreStats {
            rows_per_table: tables,
            checkpoints: checkpoints as usize,
        })
    }
}

/// Append ` AND column IN (?, ?, ...)` and its arguments.
fn push_in_clause<I>(sql: &mut String, args: &mut Vec<String>, column: &str, values: I)
where
    I: IntoIterator<Item = String>,
{
    let start = args.len();
    args.extend(values);
    let count = args.len() - start;
    if count == 0 {
        return;
    }
    let placeholders = vec!["?"; count].join(", ");
    sql.push_str(&format!(" AND {column} IN ({placeholders})"));
}

/// Pivot long rows into one column per field.
fn build_frame(rows: Vec<StoredRow>, fields: &[String]) -> Result<DataFrame> {
    let mut grouped: BTreeMap<(String, String, String), HashMap<String, Value>> = BTreeMap::new();
    for row in rows {
        let entry = grouped
            .entry((row.date, row.id, row.report_period))
            .or_default();
        if let Some(value) = row.value {
            entry.insert(row.field, value);
        }
    }

    let has_period = grouped.keys().any(|(_, _, period)| !period.is_empty());
    let mut dates = Vec::with_capacity(grouped.len());
    let mut ids = Vec::with_capacity(grouped.len());
    let mut periods = Vec::with_capacity(grouped.len());
    for (date, id, period) in grouped.keys() {
        dates.push(date.clone());
        ids.push(id.clone());
        periods.push((!period.is_empty()).then(|| period.clone()));
    }

    let mut columns: Vec<Column> = vec![
        Series::new(frame::DATE.into(), dates).into(),
        Series::new(frame::ID.into(), ids).into(),
    ];
    if has_period {
        columns.push(Series::new(frame::REPORT_PERIOD.into(), periods).into());
    }

    for field in fields {
        let values: Vec<Option<&Value>> = grouped.values().map(|row| row.get(field)).collect();
        let numeric = values
            .iter()
            .all(|v| v.is_none_or(|v| matches!(v, Value::Number(_))));
        let series = if numeric {
            let nums: Vec<Option<f64>> = values.iter().map(|v| v.and_then(Value::as_f64)).collect();
            Series::new(field.as_str().into(), nums)
        } else {
            let texts: Vec<Option<String>> = values
                .iter()
                .map(|v| {
                    v.map(|v| match v {
                        Value::Number(n) => n.to_string(),
                        Value::Text(s) => s.clone(),
                    })
                })
                .collect();
            Series::new(field.as_str().into(), texts)
        };
        columns.push(series.into());
    }

    let mut casts = vec![col(frame::DATE).cast(DataType::Date)];
    if has_period {
        casts.push(col(frame::REPORT_PERIOD).cast(DataType::Date));
    }

    Ok(DataFrame::new(columns)?
        .lazy()
        .with_columns(casts)
        .collect()?)
}

impl TableStore for SqliteStore {
    fn read(&self, request: &ReadRequest) -> Result<DataFrame> {
        let fields = if request.fields.is_empty() {
            self.fields_of(&request.table)?
        } else {
            request.fields.clone()
        };

        if request.is_trivially_empty() {
            return build_frame(Vec::new(), &fields);
        }

        let rows = self.query_rows(request, &fields)?;
        build_frame(rows, &fields)
    }

    fn latest_timestamp(&self, table: &str, id: Option<&str>) -> Result<Option<NaiveDate>> {
        let latest: Option<String> = match id {
            Some(id) => self.conn.query_row(
                "SELECT MAX(date) FROM observations WHERE table_name = ?1 AND id = ?2",
                params![table, id],
                |row| row.get(0),
            )?,
            None => self.conn.query_row(
                "SELECT MAX(date) FROM observations WHERE table_name = ?1",
                params![table],
                |row| row.get(0),
            )?,
        };

        latest.as_deref().map(parse_date).transpose()
    }

    fn upsert(&self, table: &str, records: &[Record]) -> Result<usize> {
        if records.is_empty() {
            return Ok(0);
        }
        let written_at = Utc::now().to_rfc3339();

        let tx = self.conn.unchecked_transaction()?;
        {
            let mut stmt = tx.prepare(
                "INSERT OR REPLACE INTO observations
                 (table_name, date, id, report_period, field, num_value, text_value, written_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            )?;
            for record in records {
                let period = record
                    .report_period
                    .map(|p| p.to_string())
                    .unwrap_or_default();
                stmt.execute(params![
                    table,
                    record.date.to_string(),
                    record.id,
                    period,
                    record.field,
                    record.value.as_f64(),
                    record.value.as_text(),
                    written_at,
                ])?;
            }
        }
        tx.commit()?;

        debug!(table, rows = records.len(), "upserted records");
        Ok(records.len())
    }

    fn all_ids(&self, table: &str) -> Result<Vec<String>> {
        let mut stmt = self.conn.prepare(
            "SELECT DISTINCT id FROM observations WHERE table_name = ?1 ORDER BY id",
        )?;
        let ids = stmt
            .query_map(params![table], |row| row.get(0))?
            .collect::<std::result::Result<Vec<String>, _>>()?;
        Ok(ids)
    }
}

impl CheckpointStore for SqliteStore {
    fn load_checkpoint(&self, stream: &str) -> Result<Option<NaiveDate>> {
        let last: Option<String> = self
            .conn
            .query_row(
                "SELECT last_processed FROM checkpoints WHERE stream = ?1",
                params![stream],
                |row| row.get(0),
            )
            .optional()?;

        last.as_deref().map(parse_date).transpose()
    }

    fn save_checkpoint(&self, stream: &str, date: NaiveDate) -> Result<()> {
        self.conn.execute(
            "INSERT INTO checkpoints (stream, last_processed, updated_at)
             VALUES (?1, ?2, ?3)
             ON CONFLICT(stream) DO UPDATE SET
                last_processed = MAX(last_processed, excluded.last_processed),
                updated_at = excluded.updated_at",
            params![stream, date.to_string(), Utc::now().to_rfc3339()],
        )?;
        trace!(stream, %date, "checkpoint saved");
        Ok(())
    }
}

/// Store statistics.
#[derive(Debug, Clone)]
pub struct StoreStats {
    /// Number of stored points per table
    pub rows_per_table: Vec<(String, usize)>,
    /// Number of checkpoint streams
    pub checkpoints: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn seeded() -> SqliteStore {
        let store = SqliteStore::in_memory().unwrap();
        store
            .upsert(
                "stock_daily",
                &[
                    Record::new(d(2021, 1, 4), "A", "high", 10.0),
                    Record::new(d(2021, 1, 4), "A", "low", 9.0),
                    Record::new(d(2021, 1, 4), "B", "high", 5.0),
                    Record::new(d(2021, 1, 5), "A", "high", 11.0),
                    Record::new(d(2021, 1, 5), "A", "low", 11.0),
                ],
            )
            .unwrap();
        store
    }

    #[test]
    fn test_store_initialization() {
        let store = SqliteStore::in_memory();
        assert!(store.is_ok());
    }

    #[test]
    fn test_read_pivots_fields() {
        let store = seeded();
        let df = store
            .read(&ReadRequest::new("stock_daily").fields(["high", "low"]))
            .unwrap();

        assert_eq!(df.height(), 3);
        assert_eq!(df.width(), 4);
        assert_eq!(df.column("date").unwrap().dtype(), &DataType::Date);

        let lows = frame::numbers(&df, "low").unwrap();
        // B has no low on 2021-01-04
        assert_eq!(lows, vec![Some(9.0), None, Some(11.0)]);
    }

    #[test]
    fn test_read_filters() {
        let store = seeded();
        let df = store
            .read(
                &ReadRequest::new("stock_daily")
                    .field("high")
                    .on_dates([d(2021, 1, 4)])
                    .ids(["B"]),
            )
            .unwrap();
        assert_eq!(df.height(), 1);
        assert_eq!(frame::values_by_id(&df, "high").unwrap().get("B"), Some(&5.0));

        let df = store
            .read(
                &ReadRequest::new("stock_daily")
                    .field("high")
                    .between(Some(d(2021, 1, 5)), None),
            )
            .unwrap();
        assert_eq!(df.height(), 1);
    }

    #[test]
    fn test_read_empty_selection() {
        let store = seeded();
        let df = store
            .read(&ReadRequest::new("stock_daily").field("high").ids(Vec::<String>::new()))
            .unwrap();
        assert_eq!(df.height(), 0);
        assert!(df.column("high").is_ok());
    }

    #[test]
    fn test_text_values_and_report_period() {
        let store = SqliteStore::in_memory().unwrap();
        store
            .upsert(
                "balance_sheet",
                &[
                    Record::new(d(2020, 4, 28), "A", "cash", 1.0).with_report_period(d(2020, 3, 31)),
                    Record::new(d(2020, 4, 28), "A", "cash", 2.0).with_report_period(d(2019, 12, 31)),
                ],
            )
            .unwrap();
        store
            .upsert("stock_name", &[Record::new(d(2020, 1, 2), "A", "name", "Alpha")])
            .unwrap();

        let df = store.read(&ReadRequest::new("balance_sheet")).unwrap();
        assert_eq!(df.height(), 2);
        let periods = frame::dates(&df, frame::REPORT_PERIOD).unwrap();
        assert_eq!(periods, vec![d(2019, 12, 31), d(2020, 3, 31)]);

        let df = store
            .read(&ReadRequest::new("balance_sheet").report_period(d(2020, 3, 31)))
            .unwrap();
        assert_eq!(frame::numbers(&df, "cash").unwrap(), vec![Some(1.0)]);

        let df = store.read(&ReadRequest::new("stock_name")).unwrap();
        assert_eq!(frame::texts(&df, "name").unwrap(), vec![Some("Alpha".to_string())]);
        assert!(df.column(frame::REPORT_PERIOD).is_err());
    }

    #[test]
    fn test_upsert_is_idempotent() {
        let store = seeded();
        store
            .upsert("stock_daily", &[Record::new(d(2021, 1, 4), "A", "high", 12.0)])
            .unwrap();

        let stats = store.stats().unwrap();
        assert_eq!(stats.rows_per_table, vec![("stock_daily".to_string(), 5)]);

        let df = store
            .read(&ReadRequest::new("stock_daily").field("high").on_dates([d(2021, 1, 4)]).ids(["A"]))
            .unwrap();
        assert_eq!(frame::numbers(&df, "high").unwrap(), vec![Some(12.0)]);
    }

    #[test]
    fn test_latest_timestamp_and_ids() {
        let store = seeded();
        assert_eq!(store.latest_timestamp("stock_daily", None).unwrap(), Some(d(2021, 1, 5)));
        assert_eq!(
            store.latest_timestamp("stock_daily", Some("B")).unwrap(),
            Some(d(2021, 1, 4))
        );
        assert_eq!(store.latest_timestamp("missing", None).unwrap(), None);
        assert_eq!(store.all_ids("stock_daily").unwrap(), vec!["A", "B"]);
    }

    #[test]
    fn test_checkpoint_is_monotonic() {
        let store = SqliteStore::in_memory().unwrap();
        assert_eq!(store.load_checkpoint("limit_moves").unwrap(), None);

        store.save_checkpoint("limit_moves", d(2021, 1, 5)).unwrap();
        store.save_checkpoint("limit_moves", d(2021, 1, 4)).unwrap();
        assert_eq!(store.load_checkpoint("limit_moves").unwrap(), Some(d(2021, 1, 5)));

        store.save_checkpoint("limit_moves", d(2021, 1, 6)).unwrap();
        assert_eq!(store.load_checkpoint("limit_moves").unwrap(), Some(d(2021, 1, 6)));
        assert_eq!(store.stats().unwrap().checkpoints, 1);
    }
}
