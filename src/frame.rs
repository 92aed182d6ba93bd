use std::collections::HashMap;
use std::fmt;
use std::fs::File;
use std::io::{BufReader, Read};
use std::time::Duration;

use camino::{Utf8Path, Utf8PathBuf};
use chrono::NaiveDate;

use crate::error::CladeError;

pub const DATE_FORMAT: &str = "%Y-%m-%d";

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Value {
    Str(String),
    Date(NaiveDate),
    Int(i64),
    Null,
}

impl Value {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(value) => Some(value),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Str(value) => write!(f, "{value}"),
            Value::Date(value) => write!(f, "{}", value.format(DATE_FORMAT)),
            Value::Int(value) => write!(f, "{value}"),
            Value::Null => Ok(()),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Table {
    columns: Vec<String>,
    rows: Vec<Vec<Value>>,
}

impl Table {
    pub fn new(columns: Vec<String>) -> Self {
        Self {
            columns,
            rows: Vec::new(),
        }
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn height(&self) -> usize {
        self.rows.len()
    }

    pub fn rows(&self) -> &[Vec<Value>] {
        &self.rows
    }

    pub fn column_index(&self, name: &str) -> Result<usize, CladeError> {
        self.columns
            .iter()
            .position(|column| column == name)
            .ok_or_else(|| CladeError::ColumnNotFound(name.to_string()))
    }

    pub fn push_row(&mut self, row: Vec<Value>) -> Result<(), CladeError> {
        if row.len() != self.columns.len() {
            return Err(CladeError::Schema(format!(
                "row has {} values for {} columns",
                row.len(),
                self.columns.len()
            )));
        }
        self.rows.push(row);
        Ok(())
    }

    pub fn insert_column(
        &mut self,
        index: usize,
        name: &str,
        values: Vec<Value>,
    ) -> Result<(), CladeError> {
        if index > self.columns.len() {
            return Err(CladeError::Schema(format!(
                "column index {index} out of bounds for {} columns",
                self.columns.len()
            )));
        }
        if values.len() != self.rows.len() {
            return Err(CladeError::Schema(format!(
                "column {name} has {} values for {} rows",
                values.len(),
                self.rows.len()
            )));
        }
        self.columns.insert(index, name.to_string());
        for (row, value) in self.rows.iter_mut().zip(values) {
            row.insert(index, value);
        }
        Ok(())
    }

    pub fn from_reader<R: Read>(
        reader: R,
        delimiter: u8,
        limit: Option<usize>,
    ) -> Result<Self, CladeError> {
        let mut csv_reader = csv::ReaderBuilder::new()
            .delimiter(delimiter)
            .flexible(true)
            .from_reader(reader);
        let columns: Vec<String> = csv_reader
            .headers()
            .map_err(|err| CladeError::Csv(err.to_string()))?
            .iter()
            .map(str::to_string)
            .collect();
        let mut table = Table::new(columns);

        for record in csv_reader.records() {
            if let Some(limit) = limit {
                if table.rows.len() >= limit {
                    break;
                }
            }
            let record = record.map_err(|err| CladeError::Csv(err.to_string()))?;
            let row = (0..table.columns.len())
                .map(|i| match record.get(i) {
                    Some(value) if !value.is_empty() => Value::Str(value.to_string()),
                    _ => Value::Null,
                })
                .collect();
            table.rows.push(row);
        }
        Ok(table)
    }

    pub fn from_path(
        path: &Utf8Path,
        delimiter: u8,
        limit: Option<usize>,
    ) -> Result<Self, CladeError> {
        let file = File::open(path.as_std_path())
            .map_err(|err| CladeError::Filesystem(format!("open {path}: {err}")))?;
        Self::from_reader(BufReader::new(file), delimiter, limit)
    }

    pub fn write_tsv(&self, path: &Utf8Path) -> Result<(), CladeError> {
        let mut writer = csv::WriterBuilder::new()
            .delimiter(b'\t')
            .from_path(path.as_std_path())
            .map_err(|err| CladeError::Csv(err.to_string()))?;
        writer
            .write_record(&self.columns)
            .map_err(|err| CladeError::Csv(err.to_string()))?;
        for row in &self.rows {
            writer
                .write_record(row.iter().map(|value| value.to_string()))
                .map_err(|err| CladeError::Csv(err.to_string()))?;
        }
        writer
            .flush()
            .map_err(|err| CladeError::Filesystem(err.to_string()))
    }
}

#[derive(Debug, Clone)]
enum TableSource {
    Path(Utf8PathBuf),
    Url(String),
    Materialized(Table),
}

#[derive(Debug, Clone)]
enum TableOp {
    Select(Vec<String>),
    FilterEq { column: String, value: String },
    FilterIn { column: String, values: Vec<String> },
    Rename { from: String, to: String },
    CastDate { column: String },
    FilterNotNull { column: String },
    CountBy { keys: Vec<String>, alias: String },
}

// Deferred description of a tabular computation. Cloning is cheap for
// scan-backed handles; nothing is read until collect().
#[derive(Debug, Clone)]
pub struct LazyTable {
    source: TableSource,
    limit: Option<usize>,
    ops: Vec<TableOp>,
}

impl LazyTable {
    pub fn scan_path(path: impl Into<Utf8PathBuf>, limit: Option<usize>) -> Self {
        Self {
            source: TableSource::Path(path.into()),
            limit,
            ops: Vec::new(),
        }
    }

    pub fn scan_url(url: impl Into<String>, limit: Option<usize>) -> Self {
        Self {
            source: TableSource::Url(url.into()),
            limit,
            ops: Vec::new(),
        }
    }

    pub fn from_table(table: Table) -> Self {
        Self {
            source: TableSource::Materialized(table),
            limit: None,
            ops: Vec::new(),
        }
    }

    pub fn select(mut self, columns: &[&str]) -> Self {
        self.ops
            .push(TableOp::Select(columns.iter().map(|c| c.to_string()).collect()));
        self
    }

    pub fn filter_eq(mut self, column: &str, value: &str) -> Self {
        self.ops.push(TableOp::FilterEq {
            column: column.to_string(),
            value: value.to_string(),
        });
        self
    }

    pub fn filter_in(mut self, column: &str, values: &[&str]) -> Self {
        self.ops.push(TableOp::FilterIn {
            column: column.to_string(),
            values: values.iter().map(|v| v.to_string()).collect(),
        });
        self
    }

    pub fn rename(mut self, from: &str, to: &str) -> Self {
        self.ops.push(TableOp::Rename {
            from: from.to_string(),
            to: to.to_string(),
        });
        self
    }

    pub fn cast_date(mut self, column: &str) -> Self {
        self.ops.push(TableOp::CastDate {
            column: column.to_string(),
        });
        self
    }

    pub fn filter_not_null(mut self, column: &str) -> Self {
        self.ops.push(TableOp::FilterNotNull {
            column: column.to_string(),
        });
        self
    }

    pub fn count_by(mut self, keys: &[&str], alias: &str) -> Self {
        self.ops.push(TableOp::CountBy {
            keys: keys.iter().map(|k| k.to_string()).collect(),
            alias: alias.to_string(),
        });
        self
    }

    pub fn collect(&self) -> Result<Table, CladeError> {
        let mut table = match &self.source {
            TableSource::Materialized(table) => {
                let mut table = table.clone();
                if let Some(limit) = self.limit {
                    table.rows.truncate(limit);
                }
                table
            }
            TableSource::Path(path) => {
                Table::from_reader(open_path_reader(path)?, b'\t', self.limit)?
            }
            TableSource::Url(url) => {
                Table::from_reader(open_url_reader(url)?, b'\t', self.limit)?
            }
        };

        for op in &self.ops {
            table = apply_op(table, op)?;
        }
        Ok(table)
    }
}

fn is_zst(name: &str) -> bool {
    name.split('?').next().unwrap_or(name).ends_with(".zst")
}

fn open_path_reader(path: &Utf8Path) -> Result<Box<dyn Read>, CladeError> {
    let file = File::open(path.as_std_path())
        .map_err(|err| CladeError::Filesystem(format!("open {path}: {err}")))?;
    if is_zst(path.as_str()) {
        let decoder = zstd::Decoder::new(file)
            .map_err(|err| CladeError::Csv(format!("zstd decode {path}: {err}")))?;
        Ok(Box::new(decoder))
    } else {
        Ok(Box::new(BufReader::new(file)))
    }
}

fn open_url_reader(url: &str) -> Result<Box<dyn Read>, CladeError> {
    let client = reqwest::blocking::Client::builder()
        .timeout(None)
        .connect_timeout(Duration::from_secs(30))
        .build()
        .map_err(|err| CladeError::TransferHttp(err.to_string()))?;
    let response = client
        .get(url)
        .send()
        .map_err(|err| CladeError::TransferHttp(err.to_string()))?;
    if !response.status().is_success() {
        let status = response.status().as_u16();
        let message = response
            .text()
            .unwrap_or_else(|_| "metadata request failed".to_string());
        return Err(CladeError::TransferStatus { status, message });
    }

    if is_zst(url) {
        let decoder = zstd::Decoder::new(response)
            .map_err(|err| CladeError::Csv(format!("zstd decode {url}: {err}")))?;
        Ok(Box::new(decoder))
    } else {
        Ok(Box::new(response))
    }
}

fn apply_op(table: Table, op: &TableOp) -> Result<Table, CladeError> {
    match op {
        TableOp::Select(columns) => {
            let indices = columns
                .iter()
                .map(|column| table.column_index(column))
                .collect::<Result<Vec<_>, _>>()?;
            let rows = table
                .rows
                .iter()
                .map(|row| indices.iter().map(|&i| row[i].clone()).collect())
                .collect();
            Ok(Table {
                columns: columns.clone(),
                rows,
            })
        }
        TableOp::FilterEq { column, value } => {
            let index = table.column_index(column)?;
            let mut table = table;
            table
                .rows
                .retain(|row| row[index].as_str() == Some(value.as_str()));
            Ok(table)
        }
        TableOp::FilterIn { column, values } => {
            let index = table.column_index(column)?;
            let mut table = table;
            table.rows.retain(|row| {
                row[index]
                    .as_str()
                    .map(|cell| values.iter().any(|value| value == cell))
                    .unwrap_or(false)
            });
            Ok(table)
        }
        TableOp::Rename { from, to } => {
            let index = table.column_index(from)?;
            let mut table = table;
            table.columns[index] = to.clone();
            Ok(table)
        }
        TableOp::CastDate { column } => {
            let index = table.column_index(column)?;
            let mut table = table;
            for row in &mut table.rows {
                row[index] = match &row[index] {
                    Value::Str(value) => NaiveDate::parse_from_str(value.trim(), DATE_FORMAT)
                        .map(Value::Date)
                        .unwrap_or(Value::Null),
                    Value::Date(date) => Value::Date(*date),
                    _ => Value::Null,
                };
            }
            Ok(table)
        }
        TableOp::FilterNotNull { column } => {
            let index = table.column_index(column)?;
            let mut table = table;
            table.rows.retain(|row| !row[index].is_null());
            Ok(table)
        }
        TableOp::CountBy { keys, alias } => {
            let indices = keys
                .iter()
                .map(|key| table.column_index(key))
                .collect::<Result<Vec<_>, _>>()?;
            let mut counts: HashMap<Vec<Value>, i64> = HashMap::new();
            for row in &table.rows {
                let key: Vec<Value> = indices.iter().map(|&i| row[i].clone()).collect();
                *counts.entry(key).or_insert(0) += 1;
            }

            let mut columns = keys.clone();
            columns.push(alias.clone());
            let rows = counts
                .into_iter()
                .map(|(mut key, count)| {
                    key.push(Value::Int(count));
                    key
                })
                .collect();
            Ok(Table { columns, rows })
        }
    }
}
