//! Table schemas, rows and key ranges

use crate::common::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnType {
    Int32,
    Int64,
    String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnSchema {
    pub name: String,
    pub column_type: ColumnType,
}

impl ColumnSchema {
    pub fn new(name: impl Into<String>, column_type: ColumnType) -> Self {
        Self {
            name: name.into(),
            column_type,
        }
    }
}

/// Table schema. The first column is the (integer) range-partition key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Schema {
    pub columns: Vec<ColumnSchema>,
    pub num_key_columns: usize,
}

impl Schema {
    pub fn new(columns: Vec<ColumnSchema>, num_key_columns: usize) -> Result<Self> {
        let schema = Self {
            columns,
            num_key_columns,
        };
        schema.validate()?;
        Ok(schema)
    }

    pub fn validate(&self) -> Result<()> {
        if self.columns.is_empty() {
            return Err(Error::InvalidArgument("schema has no columns".into()));
        }
        if self.num_key_columns != 1 {
            return Err(Error::InvalidArgument(
                "exactly one key column is supported".into(),
            ));
        }
        if self.columns[0].column_type == ColumnType::String {
            return Err(Error::InvalidArgument(
                "key column must be an integer".into(),
            ));
        }
        Ok(())
    }

    /// Check that `row` matches this schema column by column
    pub fn check_row(&self, row: &Row) -> Result<()> {
        if row.values.len() != self.columns.len() {
            return Err(Error::InvalidArgument(format!(
                "row has {} values, schema has {} columns",
                row.values.len(),
                self.columns.len()
            )));
        }
        for (col, value) in self.columns.iter().zip(&row.values) {
            if value.column_type() != col.column_type {
                return Err(Error::InvalidArgument(format!(
                    "column {} expects {:?}, got {:?}",
                    col.name,
                    col.column_type,
                    value.column_type()
                )));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Value {
    Int32(i32),
    Int64(i64),
    String(String),
}

impl Value {
    pub fn column_type(&self) -> ColumnType {
        match self {
            Value::Int32(_) => ColumnType::Int32,
            Value::Int64(_) => ColumnType::Int64,
            Value::String(_) => ColumnType::String,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Row {
    pub values: Vec<Value>,
}

impl Row {
    pub fn new(values: Vec<Value>) -> Self {
        Self { values }
    }

    /// Partition key of this row
    pub fn key(&self) -> Result<i64> {
        match self.values.first() {
            Some(Value::Int32(v)) => Ok(*v as i64),
            Some(Value::Int64(v)) => Ok(*v),
            _ => Err(Error::InvalidArgument("row has no integer key".into())),
        }
    }
}

/// Half-open key range `[start, end)`; `None` is unbounded.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyRange {
    pub start: Option<i64>,
    pub end: Option<i64>,
}

impl KeyRange {
    pub fn contains(&self, key: i64) -> bool {
        self.start.map_or(true, |s| key >= s) && self.end.map_or(true, |e| key < e)
    }

    /// Split the full key space at `split_keys`; the ranges are disjoint and
    /// cover every key.
    pub fn partition(split_keys: &[i64]) -> Result<Vec<KeyRange>> {
        let mut keys = split_keys.to_vec();
        keys.sort_unstable();
        if keys.windows(2).any(|w| w[0] == w[1]) {
            return Err(Error::InvalidArgument("duplicate split keys".into()));
        }

        let mut ranges = Vec::with_capacity(keys.len() + 1);
        let mut start = None;
        for key in keys {
            ranges.push(KeyRange {
                start,
                end: Some(key),
            });
            start = Some(key);
        }
        ranges.push(KeyRange { start, end: None });
        Ok(ranges)
    }
}

impl fmt::Display for KeyRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let bound = |b: Option<i64>| b.map_or_else(|| "<unbounded>".to_string(), |v| v.to_string());
        write!(f, "[{}, {})", bound(self.start), bound(self.end))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partition_covers_key_space() {
        let ranges = KeyRange::partition(&[66, 33]).unwrap();
        assert_eq!(ranges.len(), 3);
        assert!(ranges[0].contains(i64::MIN));
        assert!(ranges[0].contains(32));
        assert!(!ranges[0].contains(33));
        assert!(ranges[1].contains(33));
        assert!(ranges[1].contains(65));
        assert!(ranges[2].contains(66));
        assert!(ranges[2].contains(i64::MAX));
    }

    #[test]
    fn test_partition_rejects_duplicates() {
        assert!(KeyRange::partition(&[5, 5]).is_err());
        assert_eq!(KeyRange::partition(&[]).unwrap(), vec![KeyRange::default()]);
    }

    #[test]
    fn test_check_row() {
        let schema = Schema::new(
            vec![
                ColumnSchema::new("key", ColumnType::Int32),
                ColumnSchema::new("int_val", ColumnType::Int32),
            ],
            1,
        )
        .unwrap();
        assert!(schema
            .check_row(&Row::new(vec![Value::Int32(1), Value::Int32(2)]))
            .is_ok());
        assert!(schema
            .check_row(&Row::new(vec![Value::Int32(1), Value::Int64(2)]))
            .is_err());
        assert!(schema.check_row(&Row::new(vec![Value::Int32(1)])).is_err());
    }

    #[test]
    fn test_string_key_rejected() {
        let result = Schema::new(vec![ColumnSchema::new("k", ColumnType::String)], 1);
        assert!(result.is_err());
    }
}
