use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use time::format_description::well_known::Rfc3339;
use time::macros::format_description;
use time::{Date, OffsetDateTime};
use uuid::Uuid;

/// Storage class of a column, derived once from its declared database type.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnKind {
    Uuid,
    Text,
    Integer,
    Float,
    Boolean,
    Json,
    Timestamp,
    Date,
    Other,
}

impl ColumnKind {
    /// Classifies a declared type as reported by `information_schema.columns.data_type`
    /// (or `udt_name`) on Postgres and by `pragma_table_info` on SQLite.
    pub fn from_declared(declared: &str) -> Self {
        let lowered = declared.trim().to_ascii_lowercase();
        if lowered.contains("uuid") {
            ColumnKind::Uuid
        } else if lowered.contains("json") {
            ColumnKind::Json
        } else if lowered.contains("timestamp") || lowered.starts_with("datetime") {
            ColumnKind::Timestamp
        } else if lowered.starts_with("date") {
            ColumnKind::Date
        } else if lowered.starts_with("bool") {
            ColumnKind::Boolean
        } else if lowered.starts_with("interval") {
            ColumnKind::Other
        } else if lowered.contains("int") || lowered.contains("serial") {
            ColumnKind::Integer
        } else if ["real", "float", "double", "numeric", "decimal"]
            .iter()
            .any(|needle| lowered.contains(needle))
        {
            ColumnKind::Float
        } else if ["char", "text", "clob", "string"]
            .iter()
            .any(|needle| lowered.contains(needle))
        {
            ColumnKind::Text
        } else {
            ColumnKind::Other
        }
    }

    /// Returns the coercion applied to every raw value written into a column of this kind.
    pub fn coercer(self) -> fn(JsonValue) -> FieldValue {
        match self {
            ColumnKind::Uuid => coerce_uuid,
            ColumnKind::Text => coerce_text,
            ColumnKind::Integer => coerce_integer,
            ColumnKind::Float => coerce_float,
            ColumnKind::Boolean => coerce_boolean,
            ColumnKind::Json => coerce_json,
            ColumnKind::Timestamp => coerce_timestamp,
            ColumnKind::Date => coerce_date,
            ColumnKind::Other => FieldValue::from_json,
        }
    }

    pub fn coerce(self, value: JsonValue) -> FieldValue {
        (self.coercer())(value)
    }
}

/// A value ready to be bound as a statement parameter.
#[derive(Clone, Debug, PartialEq)]
pub enum FieldValue {
    Null,
    Uuid(Uuid),
    Text(String),
    Integer(i64),
    Float(f64),
    Boolean(bool),
    Json(JsonValue),
    Timestamp(OffsetDateTime),
    Date(Date),
}

impl FieldValue {
    /// Untyped conversion used when the column's type gives no better hint.
    /// Composite values become their JSON text.
    pub fn from_json(value: JsonValue) -> Self {
        match value {
            JsonValue::Null => FieldValue::Null,
            JsonValue::Bool(value) => FieldValue::Boolean(value),
            JsonValue::Number(number) => match number.as_i64() {
                Some(value) => FieldValue::Integer(value),
                None => FieldValue::Float(number.as_f64().unwrap_or_default()),
            },
            JsonValue::String(value) => FieldValue::Text(value),
            composite @ (JsonValue::Array(_) | JsonValue::Object(_)) => {
                FieldValue::Text(composite.to_string())
            }
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, FieldValue::Null)
    }
}

fn coerce_uuid(value: JsonValue) -> FieldValue {
    match value {
        JsonValue::String(text) => match Uuid::parse_str(text.trim()) {
            Ok(uuid) => FieldValue::Uuid(uuid),
            Err(_) => FieldValue::Text(text),
        },
        other => FieldValue::from_json(other),
    }
}

fn coerce_text(value: JsonValue) -> FieldValue {
    match value {
        JsonValue::Null => FieldValue::Null,
        JsonValue::String(text) => FieldValue::Text(text),
        other => FieldValue::Text(other.to_string()),
    }
}

fn coerce_integer(value: JsonValue) -> FieldValue {
    match &value {
        JsonValue::Number(number) => {
            if let Some(int) = number.as_i64() {
                return FieldValue::Integer(int);
            }
            // Integral floats beyond the i64 range stay floats rather than saturating.
            if let Some(float) = number.as_f64()
                && float.fract() == 0.0
                && float >= i64::MIN as f64
                && float < i64::MAX as f64
            {
                return FieldValue::Integer(float as i64);
            }
        }
        JsonValue::String(text) => {
            if let Ok(int) = text.trim().parse::<i64>() {
                return FieldValue::Integer(int);
            }
        }
        _ => {}
    }
    FieldValue::from_json(value)
}

fn coerce_float(value: JsonValue) -> FieldValue {
    match &value {
        JsonValue::Number(number) => {
            if let Some(float) = number.as_f64() {
                return FieldValue::Float(float);
            }
        }
        JsonValue::String(text) => {
            if let Ok(float) = text.trim().parse::<f64>() {
                return FieldValue::Float(float);
            }
        }
        _ => {}
    }
    FieldValue::from_json(value)
}

fn coerce_boolean(value: JsonValue) -> FieldValue {
    match &value {
        JsonValue::Number(number) => match number.as_i64() {
            Some(0) => return FieldValue::Boolean(false),
            Some(1) => return FieldValue::Boolean(true),
            _ => {}
        },
        JsonValue::String(text) => match text.trim().to_ascii_lowercase().as_str() {
            "true" | "t" | "yes" | "y" | "1" => return FieldValue::Boolean(true),
            "false" | "f" | "no" | "n" | "0" => return FieldValue::Boolean(false),
            _ => {}
        },
        _ => {}
    }
    FieldValue::from_json(value)
}

fn coerce_json(value: JsonValue) -> FieldValue {
    match value {
        JsonValue::Null => FieldValue::Null,
        other => FieldValue::Json(other),
    }
}

fn coerce_timestamp(value: JsonValue) -> FieldValue {
    if let JsonValue::String(text) = &value
        && let Ok(parsed) = OffsetDateTime::parse(text.trim(), &Rfc3339)
    {
        return FieldValue::Timestamp(parsed);
    }
    FieldValue::from_json(value)
}

fn coerce_date(value: JsonValue) -> FieldValue {
    if let JsonValue::String(text) = &value {
        let text = text.trim();
        if let Ok(date) = Date::parse(text, format_description!("[year]-[month]-[day]")) {
            return FieldValue::Date(date);
        }
        if let Ok(parsed) = OffsetDateTime::parse(text, &Rfc3339) {
            return FieldValue::Date(parsed.date());
        }
    }
    FieldValue::from_json(value)
}
