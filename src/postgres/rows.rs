//! Row rendering into JSON
//!
//! Common scalar, temporal and array types map onto their natural JSON form.
//! `NUMERIC` is rendered as a string so no precision is lost. Any other type,
//! or a value a typed decoder rejects, is passed through as its raw wire
//! value: text as-is, binary as a `\x` hex literal.

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use rust_decimal::Decimal;
use serde_json::{json, Map, Value as JsonValue};
use sqlx::postgres::types::PgInterval;
use sqlx::postgres::{PgRow, PgValueFormat};
use sqlx::{Column, Row, TypeInfo, ValueRef};
use tracing::debug;
use uuid::Uuid;

use crate::error::DriverError;
use crate::types::ResultShape;

pub(crate) fn column_names(row: &PgRow) -> Vec<String> {
    row.columns().iter().map(|c| c.name().to_string()).collect()
}

pub(crate) fn render(row: &PgRow, shape: ResultShape) -> Result<JsonValue, DriverError> {
    match shape {
        ResultShape::Object => {
            let mut object = Map::with_capacity(row.len());
            for (index, column) in row.columns().iter().enumerate() {
                object.insert(column.name().to_string(), decode(row, index)?);
            }
            Ok(JsonValue::Object(object))
        }
        ResultShape::Array => {
            let values = (0..row.len())
                .map(|index| decode(row, index))
                .collect::<Result<Vec<_>, _>>()?;
            Ok(JsonValue::Array(values))
        }
    }
}

fn decode(row: &PgRow, index: usize) -> Result<JsonValue, DriverError> {
    let raw = row.try_get_raw(index)?;
    if raw.is_null() {
        return Ok(JsonValue::Null);
    }
    let type_name = raw.type_info().name().to_string();

    match decode_typed(row, index, &type_name) {
        Some(Ok(value)) => Ok(value),
        Some(Err(e)) => {
            debug!(column = index, column_type = %type_name, error = %e, "Falling back to raw value");
            raw_value(row, index)
        }
        None => raw_value(row, index),
    }
}

/// `None` when the type has no dedicated mapping
fn decode_typed(row: &PgRow, index: usize, type_name: &str) -> Option<Result<JsonValue, sqlx::Error>> {
    let value = match type_name {
        "BOOL" => row.try_get::<bool, _>(index).map(JsonValue::from),
        "INT2" => row.try_get::<i16, _>(index).map(JsonValue::from),
        "INT4" => row.try_get::<i32, _>(index).map(JsonValue::from),
        "INT8" => row.try_get::<i64, _>(index).map(JsonValue::from),
        "FLOAT4" => row.try_get::<f32, _>(index).map(JsonValue::from),
        "FLOAT8" => row.try_get::<f64, _>(index).map(JsonValue::from),
        "NUMERIC" => row
            .try_get::<Decimal, _>(index)
            .map(|d| JsonValue::from(d.to_string())),
        "TEXT" | "VARCHAR" | "BPCHAR" | "CHAR" | "NAME" | "UNKNOWN" => {
            row.try_get::<String, _>(index).map(JsonValue::from)
        }
        "JSON" | "JSONB" => row.try_get::<JsonValue, _>(index),
        "UUID" => row
            .try_get::<Uuid, _>(index)
            .map(|u| JsonValue::from(u.to_string())),
        "TIMESTAMPTZ" => row
            .try_get::<DateTime<Utc>, _>(index)
            .map(|t| JsonValue::from(t.to_rfc3339())),
        "TIMESTAMP" => row
            .try_get::<NaiveDateTime, _>(index)
            .map(|t| JsonValue::from(t.to_string())),
        "DATE" => row
            .try_get::<NaiveDate, _>(index)
            .map(|d| JsonValue::from(d.to_string())),
        "TIME" => row
            .try_get::<NaiveTime, _>(index)
            .map(|t| JsonValue::from(t.to_string())),
        "INTERVAL" => row.try_get::<PgInterval, _>(index).map(|i| {
            json!({"months": i.months, "days": i.days, "microseconds": i.microseconds})
        }),
        "BYTEA" => row
            .try_get::<Vec<u8>, _>(index)
            .map(|bytes| JsonValue::from(hex_literal(&bytes))),
        "BOOL[]" => row.try_get::<Vec<Option<bool>>, _>(index).map(JsonValue::from),
        "INT2[]" => row.try_get::<Vec<Option<i16>>, _>(index).map(JsonValue::from),
        "INT4[]" => row.try_get::<Vec<Option<i32>>, _>(index).map(JsonValue::from),
        "INT8[]" => row.try_get::<Vec<Option<i64>>, _>(index).map(JsonValue::from),
        "FLOAT4[]" => row.try_get::<Vec<Option<f32>>, _>(index).map(JsonValue::from),
        "FLOAT8[]" => row.try_get::<Vec<Option<f64>>, _>(index).map(JsonValue::from),
        "TEXT[]" | "VARCHAR[]" | "BPCHAR[]" | "NAME[]" => {
            row.try_get::<Vec<Option<String>>, _>(index).map(JsonValue::from)
        }
        "NUMERIC[]" => row.try_get::<Vec<Option<Decimal>>, _>(index).map(|values| {
            JsonValue::from(
                values
                    .into_iter()
                    .map(|d| d.map(|d| d.to_string()))
                    .collect::<Vec<_>>(),
            )
        }),
        "UUID[]" => row.try_get::<Vec<Option<Uuid>>, _>(index).map(|values| {
            JsonValue::from(
                values
                    .into_iter()
                    .map(|u| u.map(|u| u.to_string()))
                    .collect::<Vec<_>>(),
            )
        }),
        _ => return None,
    };
    Some(value)
}

fn raw_value(row: &PgRow, index: usize) -> Result<JsonValue, DriverError> {
    let raw = row.try_get_raw(index)?;
    let rendered = match raw.format() {
        PgValueFormat::Text => raw
            .as_str()
            .map_err(|e| DriverError::other(e.to_string()))?
            .to_string(),
        PgValueFormat::Binary => {
            hex_literal(raw.as_bytes().map_err(|e| DriverError::other(e.to_string()))?)
        }
    };
    Ok(JsonValue::from(rendered))
}

/// Postgres `bytea` hex output form
pub(crate) fn hex_literal(bytes: &[u8]) -> String {
    format!("\\x{}", hex::encode(bytes))
}
