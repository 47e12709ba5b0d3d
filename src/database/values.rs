//! Row decoding
//!
//! Generated SQL can return any column types, so rows are decoded into
//! `serde_json::Value` cells by classifying each column's type name and
//! trying the matching Rust types. PostgreSQL results are fetched in text
//! format, so types without a decoder here (uuid, arrays, inet, money,
//! intervals, ranges) are shown as the server prints them. A `<TYPE>`
//! placeholder is left only for a binary value with no decoder.

use serde_json::Value as JsonValue;
use sqlx::error::BoxDynError;
use sqlx::postgres::{PgRow, PgTypeInfo, PgValueFormat, PgValueRef};
use sqlx::sqlite::SqliteRow;
use sqlx::{Column, Decode, Postgres, Row, Type, TypeInfo, ValueRef};

/// Logical category for database column types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeCategory {
    Integer,
    Float,
    Decimal,
    Boolean,
    Text,
    Binary,
    Json,
    Date,
    Time,
    Timestamp,
    TimestampTz,
    Unknown,
}

const INTEGER_TYPES: &[&str] = &[
    "int", "int2", "int4", "int8", "integer", "smallint", "bigint", "tinyint", "mediumint",
    "serial", "serial2", "serial4", "serial8", "smallserial", "bigserial",
];

/// Classify a database type name into a logical category
pub fn categorize_type(type_name: &str) -> TypeCategory {
    let lower = type_name.to_lowercase();

    if lower.contains("decimal") || lower.contains("numeric") {
        return TypeCategory::Decimal;
    }
    if INTEGER_TYPES.contains(&lower.as_str()) {
        return TypeCategory::Integer;
    }
    if lower == "bool" || lower == "boolean" {
        return TypeCategory::Boolean;
    }
    if lower.contains("float") || lower.contains("double") || lower == "real" {
        return TypeCategory::Float;
    }
    if lower == "json" || lower == "jsonb" {
        return TypeCategory::Json;
    }
    if lower.contains("blob") || lower == "bytea" {
        return TypeCategory::Binary;
    }
    if lower == "timestamptz" {
        return TypeCategory::TimestampTz;
    }
    if lower == "timestamp" || lower == "datetime" {
        return TypeCategory::Timestamp;
    }
    if lower == "date" {
        return TypeCategory::Date;
    }
    if lower == "time" {
        return TypeCategory::Time;
    }
    if lower.contains("char") || lower.contains("text") || lower == "name" || lower == "citext" {
        return TypeCategory::Text;
    }

    TypeCategory::Unknown
}

/// Conversion of a fetched row into display cells
pub trait RowValues {
    /// Column names in select-list order
    fn column_names(&self) -> Vec<String>;
    /// Cell values in select-list order
    fn values(&self) -> Vec<JsonValue>;
}

impl RowValues for PgRow {
    fn column_names(&self) -> Vec<String> {
        self.columns().iter().map(|c| c.name().to_string()).collect()
    }

    fn values(&self) -> Vec<JsonValue> {
        self.columns()
            .iter()
            .enumerate()
            .map(|(idx, col)| postgres::decode_column(self, idx, col.type_info().name()))
            .collect()
    }
}

impl RowValues for SqliteRow {
    fn column_names(&self) -> Vec<String> {
        self.columns().iter().map(|c| c.name().to_string()).collect()
    }

    fn values(&self) -> Vec<JsonValue> {
        (0..self.columns().len())
            .map(|idx| sqlite::decode_column(self, idx))
            .collect()
    }
}

/// Float to JSON, keeping NaN/inf as strings
fn float_value(v: f64) -> JsonValue {
    serde_json::Number::from_f64(v)
        .map(JsonValue::Number)
        .unwrap_or_else(|| JsonValue::String(v.to_string()))
}

/// Bytes rendered the way psql shows bytea
fn hex_value(bytes: &[u8]) -> JsonValue {
    let hex: String = bytes.iter().map(|b| format!("{:02x}", b)).collect();
    JsonValue::String(format!("\\x{}", hex))
}

/// PostgreSQL NUMERIC decoded to its exact decimal text
#[derive(Debug)]
pub struct PgNumericText(pub String);

impl Type<Postgres> for PgNumericText {
    fn type_info() -> PgTypeInfo {
        PgTypeInfo::with_name("NUMERIC")
    }

    fn compatible(ty: &PgTypeInfo) -> bool {
        ty.name().eq_ignore_ascii_case("numeric")
    }
}

impl<'r> Decode<'r, Postgres> for PgNumericText {
    fn decode(value: PgValueRef<'r>) -> Result<Self, BoxDynError> {
        match value.format() {
            PgValueFormat::Text => Ok(PgNumericText(value.as_str()?.to_string())),
            PgValueFormat::Binary => Ok(PgNumericText(numeric_to_string(value.as_bytes()?)?)),
        }
    }
}

/// Any PostgreSQL value in text format, as the server printed it
#[derive(Debug)]
pub struct PgAnyText(pub String);

impl Type<Postgres> for PgAnyText {
    fn type_info() -> PgTypeInfo {
        PgTypeInfo::with_name("TEXT")
    }

    fn compatible(_ty: &PgTypeInfo) -> bool {
        true
    }
}

impl<'r> Decode<'r, Postgres> for PgAnyText {
    fn decode(value: PgValueRef<'r>) -> Result<Self, BoxDynError> {
        match value.format() {
            PgValueFormat::Text => Ok(PgAnyText(value.as_str()?.to_string())),
            PgValueFormat::Binary => Err("binary value has no text rendering".into()),
        }
    }
}

/// Render the binary NUMERIC wire format (base-10000 digit groups)
pub fn numeric_to_string(buf: &[u8]) -> Result<String, BoxDynError> {
    const SIGN_NEG: u16 = 0x4000;
    const SIGN_NAN: u16 = 0xC000;
    const SIGN_PINF: u16 = 0xD000;
    const SIGN_NINF: u16 = 0xF000;

    if buf.len() < 8 {
        return Err("numeric: truncated header".into());
    }
    let read_u16 = |at: usize| u16::from_be_bytes([buf[at], buf[at + 1]]);

    let ndigits = read_u16(0) as usize;
    let weight = read_u16(2) as i16 as i32;
    let sign = read_u16(4);
    let dscale = read_u16(6) as usize;

    match sign {
        SIGN_NAN => return Ok("NaN".to_string()),
        SIGN_PINF => return Ok("Infinity".to_string()),
        SIGN_NINF => return Ok("-Infinity".to_string()),
        _ => {}
    }

    if buf.len() < 8 + ndigits * 2 {
        return Err("numeric: truncated digits".into());
    }
    let digits: Vec<u16> = (0..ndigits).map(|i| read_u16(8 + i * 2)).collect();
    let digit_at = |pos: i32| -> u16 {
        if pos < 0 {
            0
        } else {
            digits.get(pos as usize).copied().unwrap_or(0)
        }
    };

    let mut result = String::new();
    if sign == SIGN_NEG {
        result.push('-');
    }

    if weight < 0 {
        result.push('0');
    } else {
        for pos in 0..=weight {
            if pos == 0 {
                result.push_str(&digit_at(pos).to_string());
            } else {
                result.push_str(&format!("{:04}", digit_at(pos)));
            }
        }
    }

    if dscale > 0 {
        let mut fraction = String::new();
        let mut pos = weight + 1;
        while fraction.len() < dscale {
            fraction.push_str(&format!("{:04}", digit_at(pos)));
            pos += 1;
        }
        fraction.truncate(dscale);
        result.push('.');
        result.push_str(&fraction);
    }

    Ok(result)
}

mod postgres {
    use super::*;

    pub fn decode_column(row: &PgRow, idx: usize, type_name: &str) -> JsonValue {
        match row.try_get_raw(idx) {
            Ok(value) if !value.is_null() => {}
            _ => return JsonValue::Null,
        }

        let decoded = match categorize_type(type_name) {
            TypeCategory::Integer => decode_integer(row, idx),
            TypeCategory::Float => decode_float(row, idx),
            TypeCategory::Decimal => row
                .try_get::<PgNumericText, _>(idx)
                .ok()
                .map(|v| JsonValue::String(v.0)),
            TypeCategory::Boolean => row.try_get::<bool, _>(idx).ok().map(JsonValue::Bool),
            TypeCategory::Json => row.try_get::<JsonValue, _>(idx).ok(),
            TypeCategory::Binary => row.try_get::<Vec<u8>, _>(idx).ok().map(|v| hex_value(&v)),
            TypeCategory::Date => row
                .try_get::<chrono::NaiveDate, _>(idx)
                .ok()
                .map(|v| JsonValue::String(v.to_string())),
            TypeCategory::Time => row
                .try_get::<chrono::NaiveTime, _>(idx)
                .ok()
                .map(|v| JsonValue::String(v.to_string())),
            TypeCategory::Timestamp => row
                .try_get::<chrono::NaiveDateTime, _>(idx)
                .ok()
                .map(|v| JsonValue::String(v.to_string())),
            TypeCategory::TimestampTz => row
                .try_get::<chrono::DateTime<chrono::Utc>, _>(idx)
                .ok()
                .map(|v| JsonValue::String(v.to_rfc3339())),
            TypeCategory::Text | TypeCategory::Unknown => {
                row.try_get::<String, _>(idx).ok().map(JsonValue::String)
            }
        };

        decoded
            .or_else(|| {
                row.try_get::<PgAnyText, _>(idx)
                    .ok()
                    .map(|v| JsonValue::String(v.0))
            })
            .unwrap_or_else(|| {
                tracing::debug!(column = idx, type_name, "no decoder for column type");
                JsonValue::String(format!("<{}>", type_name))
            })
    }

    fn decode_integer(row: &PgRow, idx: usize) -> Option<JsonValue> {
        if let Ok(v) = row.try_get::<i16, _>(idx) {
            return Some(JsonValue::Number(v.into()));
        }
        if let Ok(v) = row.try_get::<i32, _>(idx) {
            return Some(JsonValue::Number(v.into()));
        }
        if let Ok(v) = row.try_get::<i64, _>(idx) {
            return Some(JsonValue::Number(v.into()));
        }
        None
    }

    fn decode_float(row: &PgRow, idx: usize) -> Option<JsonValue> {
        if let Ok(v) = row.try_get::<f64, _>(idx) {
            return Some(float_value(v));
        }
        if let Ok(v) = row.try_get::<f32, _>(idx) {
            return Some(float_value(v as f64));
        }
        None
    }
}

mod sqlite {
    use super::*;

    /// SQLite values are dynamically typed, so decoding tries storage
    /// classes in order rather than trusting the declared type
    pub fn decode_column(row: &SqliteRow, idx: usize) -> JsonValue {
        if let Ok(v) = row.try_get::<Option<i64>, _>(idx) {
            return v.map(|v| JsonValue::Number(v.into())).unwrap_or(JsonValue::Null);
        }
        if let Ok(v) = row.try_get::<Option<f64>, _>(idx) {
            return v.map(float_value).unwrap_or(JsonValue::Null);
        }
        if let Ok(v) = row.try_get::<Option<String>, _>(idx) {
            return v.map(JsonValue::String).unwrap_or(JsonValue::Null);
        }
        if let Ok(v) = row.try_get::<Option<Vec<u8>>, _>(idx) {
            return v.map(|v| hex_value(&v)).unwrap_or(JsonValue::Null);
        }
        row.try_get_unchecked::<Option<String>, _>(idx)
            .ok()
            .flatten()
            .map(JsonValue::String)
            .unwrap_or(JsonValue::Null)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn numeric_bytes(weight: i16, sign: u16, dscale: u16, digits: &[u16]) -> Vec<u8> {
        let mut buf = Vec::new();
        buf.extend_from_slice(&(digits.len() as u16).to_be_bytes());
        buf.extend_from_slice(&weight.to_be_bytes());
        buf.extend_from_slice(&sign.to_be_bytes());
        buf.extend_from_slice(&dscale.to_be_bytes());
        for d in digits {
            buf.extend_from_slice(&d.to_be_bytes());
        }
        buf
    }

    #[test]
    fn test_categorize_type() {
        assert_eq!(categorize_type("INT4"), TypeCategory::Integer);
        assert_eq!(categorize_type("BIGSERIAL"), TypeCategory::Integer);
        assert_eq!(categorize_type("NUMERIC"), TypeCategory::Decimal);
        assert_eq!(categorize_type("FLOAT8"), TypeCategory::Float);
        assert_eq!(categorize_type("BOOL"), TypeCategory::Boolean);
        assert_eq!(categorize_type("JSONB"), TypeCategory::Json);
        assert_eq!(categorize_type("BYTEA"), TypeCategory::Binary);
        assert_eq!(categorize_type("TIMESTAMPTZ"), TypeCategory::TimestampTz);
        assert_eq!(categorize_type("VARCHAR"), TypeCategory::Text);
        assert_eq!(categorize_type("UUID"), TypeCategory::Unknown);
    }

    #[test]
    fn test_int_lookalikes_are_not_integers() {
        for name in ["INTERVAL", "POINT", "INT4RANGE", "_INT4", "INET", "MONEY", "TINTERVAL"] {
            assert_eq!(categorize_type(name), TypeCategory::Unknown, "{name}");
        }
        assert_eq!(categorize_type("INT8"), TypeCategory::Integer);
        assert_eq!(categorize_type("smallint"), TypeCategory::Integer);
    }

    #[test]
    fn test_any_text_accepts_every_type() {
        for name in ["UUID", "INET", "MONEY", "INTERVAL", "INT4RANGE", "_INT4"] {
            assert!(
                <PgAnyText as Type<Postgres>>::compatible(&PgTypeInfo::with_name(name)),
                "{name}"
            );
        }
    }

    #[test]
    fn test_numeric_to_string() {
        // 123.45
        let buf = numeric_bytes(0, 0, 2, &[123, 4500]);
        assert_eq!(numeric_to_string(&buf).unwrap(), "123.45");

        // 0.05
        let buf = numeric_bytes(-1, 0, 2, &[500]);
        assert_eq!(numeric_to_string(&buf).unwrap(), "0.05");

        // -10000
        let buf = numeric_bytes(1, 0x4000, 0, &[1]);
        assert_eq!(numeric_to_string(&buf).unwrap(), "-10000");

        // 0.00001
        let buf = numeric_bytes(-2, 0, 5, &[1000]);
        assert_eq!(numeric_to_string(&buf).unwrap(), "0.00001");

        // 0
        let buf = numeric_bytes(0, 0, 0, &[]);
        assert_eq!(numeric_to_string(&buf).unwrap(), "0");

        let buf = numeric_bytes(0, 0xC000, 0, &[]);
        assert_eq!(numeric_to_string(&buf).unwrap(), "NaN");
    }

    #[test]
    fn test_numeric_truncated() {
        assert!(numeric_to_string(&[0, 1]).is_err());
        let mut buf = numeric_bytes(0, 0, 0, &[1, 2]);
        buf.truncate(10);
        assert!(numeric_to_string(&buf).is_err());
    }

    #[test]
    fn test_hex_value() {
        assert_eq!(hex_value(&[0xde, 0xad]), JsonValue::String("\\xdead".to_string()));
    }
}
