//! Cast and export handlers keyed by field type.
//!
//! `Cast` handlers turn loosely typed input into the declared type, `Array`
//! handlers render values for plain-data export and `Datasource` handlers
//! render values handed to a storage provider on save.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use uuid::Uuid;

use crate::core::{MapperError, Result, Value};

pub const DEFAULT_HANDLER: &str = "_default_";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FormatMode {
    Cast,
    Array,
    Datasource,
}

/// Options handed to every formatter invocation.
#[derive(Debug, Clone, Default)]
pub struct FormatOptions {
    pub path: String,
    pub type_name: String,
}

pub type Formatter = Arc<dyn Fn(&Value, &FormatOptions) -> Result<Value> + Send + Sync>;

pub(crate) type FormatterTable = HashMap<FormatMode, HashMap<String, Formatter>>;

fn handler<F>(f: F) -> Formatter
where
    F: Fn(&Value, &FormatOptions) -> Result<Value> + Send + Sync + 'static,
{
    Arc::new(f)
}

pub(crate) fn default_formatters() -> FormatterTable {
    let mut cast: HashMap<String, Formatter> = HashMap::new();
    cast.insert("id".into(), handler(cast_integer));
    cast.insert("integer".into(), handler(cast_integer));
    cast.insert("float".into(), handler(cast_float));
    cast.insert("decimal".into(), handler(cast_float));
    cast.insert("boolean".into(), handler(cast_boolean));
    cast.insert("string".into(), handler(cast_string));
    cast.insert("date".into(), handler(cast_date));
    cast.insert("datetime".into(), handler(cast_datetime));
    cast.insert("uuid".into(), handler(cast_uuid));
    cast.insert("json".into(), handler(cast_json));

    let mut array: HashMap<String, Formatter> = HashMap::new();
    array.insert("date".into(), handler(format_date));
    array.insert("datetime".into(), handler(format_datetime));
    array.insert("uuid".into(), handler(format_text));

    let mut datasource: HashMap<String, Formatter> = HashMap::new();
    datasource.insert("date".into(), handler(format_date));
    datasource.insert("datetime".into(), handler(format_datetime));
    datasource.insert("uuid".into(), handler(format_text));
    datasource.insert("json".into(), handler(format_json_text));

    let mut table = FormatterTable::new();
    table.insert(FormatMode::Cast, cast);
    table.insert(FormatMode::Array, array);
    table.insert(FormatMode::Datasource, datasource);
    table
}

fn mismatch(value: &Value, options: &FormatOptions) -> MapperError {
    MapperError::TypeMismatch(format!(
        "Cannot convert {} '{}' to {} for field '{}'",
        value.type_name(),
        value,
        options.type_name,
        options.path
    ))
}

fn cast_integer(value: &Value, options: &FormatOptions) -> Result<Value> {
    match value {
        Value::Integer(_) => Ok(value.clone()),
        Value::Float(f) => value
            .as_i64()
            .map(Value::Integer)
            .ok_or_else(|| MapperError::TypeMismatch(format!("Cannot convert {} to integer", f))),
        Value::Boolean(b) => Ok(Value::Integer(*b as i64)),
        Value::Text(s) => {
            let trimmed = s.trim();
            if let Ok(i) = trimmed.parse::<i64>() {
                return Ok(Value::Integer(i));
            }
            trimmed
                .parse::<f64>()
                .ok()
                .and_then(|f| Value::Float(f).as_i64())
                .map(Value::Integer)
                .ok_or_else(|| mismatch(value, options))
        }
        _ => Err(mismatch(value, options)),
    }
}

fn cast_float(value: &Value, options: &FormatOptions) -> Result<Value> {
    match value {
        Value::Float(_) => Ok(value.clone()),
        Value::Integer(i) => Ok(Value::Float(*i as f64)),
        Value::Text(s) => s
            .trim()
            .parse::<f64>()
            .map(Value::Float)
            .map_err(|_| mismatch(value, options)),
        _ => Err(mismatch(value, options)),
    }
}

fn cast_boolean(value: &Value, options: &FormatOptions) -> Result<Value> {
    match value {
        Value::Boolean(_) => Ok(value.clone()),
        Value::Integer(i) => Ok(Value::Boolean(*i != 0)),
        Value::Float(f) => Ok(Value::Boolean(*f != 0.0 && !f.is_nan())),
        Value::Text(s) => match s.trim().to_ascii_lowercase().as_str() {
            "true" | "1" | "yes" | "on" => Ok(Value::Boolean(true)),
            "false" | "0" | "no" | "off" | "" => Ok(Value::Boolean(false)),
            _ => Err(mismatch(value, options)),
        },
        _ => Err(mismatch(value, options)),
    }
}

fn cast_string(value: &Value, _options: &FormatOptions) -> Result<Value> {
    match value {
        Value::Text(_) => Ok(value.clone()),
        Value::Json(json) => Ok(Value::Text(json.to_string())),
        other => Ok(Value::Text(other.to_string())),
    }
}

fn parse_datetime(s: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S") {
        return Some(Utc.from_utc_datetime(&naive));
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| Utc.from_utc_datetime(&naive))
}

fn cast_date(value: &Value, options: &FormatOptions) -> Result<Value> {
    match value {
        Value::Date(_) => Ok(value.clone()),
        Value::Timestamp(t) => Ok(Value::Date(t.date_naive())),
        Value::Integer(secs) => DateTime::<Utc>::from_timestamp(*secs, 0)
            .map(|t| Value::Date(t.date_naive()))
            .ok_or_else(|| mismatch(value, options)),
        Value::Text(s) => {
            let s = s.trim();
            if let Ok(d) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
                return Ok(Value::Date(d));
            }
            parse_datetime(s)
                .map(|t| Value::Date(t.date_naive()))
                .ok_or_else(|| mismatch(value, options))
        }
        _ => Err(mismatch(value, options)),
    }
}

fn cast_datetime(value: &Value, options: &FormatOptions) -> Result<Value> {
    match value {
        Value::Timestamp(_) => Ok(value.clone()),
        Value::Date(d) => d
            .and_hms_opt(0, 0, 0)
            .map(|naive| Value::Timestamp(Utc.from_utc_datetime(&naive)))
            .ok_or_else(|| mismatch(value, options)),
        Value::Integer(secs) => DateTime::<Utc>::from_timestamp(*secs, 0)
            .map(Value::Timestamp)
            .ok_or_else(|| mismatch(value, options)),
        Value::Text(s) => parse_datetime(s.trim())
            .map(Value::Timestamp)
            .ok_or_else(|| mismatch(value, options)),
        _ => Err(mismatch(value, options)),
    }
}

fn cast_uuid(value: &Value, options: &FormatOptions) -> Result<Value> {
    match value {
        Value::Uuid(_) => Ok(value.clone()),
        Value::Text(s) => Ok(Value::Uuid(Uuid::parse_str(s.trim())?)),
        _ => Err(mismatch(value, options)),
    }
}

fn cast_json(value: &Value, _options: &FormatOptions) -> Result<Value> {
    match value {
        Value::Json(_) => Ok(value.clone()),
        other => Ok(Value::Json(other.to_json())),
    }
}

fn format_date(value: &Value, _options: &FormatOptions) -> Result<Value> {
    match value {
        Value::Date(d) => Ok(Value::Text(d.format("%Y-%m-%d").to_string())),
        Value::Timestamp(t) => Ok(Value::Text(t.format("%Y-%m-%d").to_string())),
        other => Ok(other.clone()),
    }
}

fn format_datetime(value: &Value, _options: &FormatOptions) -> Result<Value> {
    match value {
        Value::Timestamp(t) => Ok(Value::Text(t.format("%Y-%m-%d %H:%M:%S").to_string())),
        Value::Date(d) => Ok(Value::Text(format!("{} 00:00:00", d.format("%Y-%m-%d")))),
        other => Ok(other.clone()),
    }
}

fn format_text(value: &Value, _options: &FormatOptions) -> Result<Value> {
    match value {
        Value::Text(_) => Ok(value.clone()),
        other => Ok(Value::Text(other.to_string())),
    }
}

fn format_json_text(value: &Value, _options: &FormatOptions) -> Result<Value> {
    match value {
        Value::Json(json) => Ok(Value::Text(json.to_string())),
        other => Ok(other.clone()),
    }
}
