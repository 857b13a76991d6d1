//! Test data generation

use crate::common::schema::{ColumnType, Row, Schema, Value};
use crate::common::{Error, Result};
use rand::distributions::Alphanumeric;
use rand::Rng;

const STRING_LEN: usize = 16;

/// Build a row whose key column holds `record_id`; every other column gets
/// a random value of its type.
pub fn generate_data_for_row<R: Rng>(
    schema: &Schema,
    record_id: u64,
    rng: &mut R,
) -> Result<Row> {
    let mut values = Vec::with_capacity(schema.columns.len());
    for (idx, column) in schema.columns.iter().enumerate() {
        let value = if idx < schema.num_key_columns {
            match column.column_type {
                ColumnType::Int32 => Value::Int32(i32::try_from(record_id).map_err(|_| {
                    Error::InvalidArgument(format!("record id {} overflows INT32", record_id))
                })?),
                ColumnType::Int64 => Value::Int64(i64::try_from(record_id).map_err(|_| {
                    Error::InvalidArgument(format!("record id {} overflows INT64", record_id))
                })?),
                ColumnType::String => {
                    return Err(Error::InvalidArgument(format!(
                        "key column {} must be an integer",
                        column.name
                    )))
                }
            }
        } else {
            match column.column_type {
                ColumnType::Int32 => Value::Int32(rng.gen()),
                ColumnType::Int64 => Value::Int64(rng.gen()),
                ColumnType::String => Value::String(
                    (0..STRING_LEN)
                        .map(|_| char::from(rng.sample(Alphanumeric)))
                        .collect(),
                ),
            }
        };
        values.push(value);
    }
    Ok(Row::new(values))
}
