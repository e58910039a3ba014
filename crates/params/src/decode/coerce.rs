use crate::error::{StyleError, ValueError};
use crate::schema::{Metadata, RecordType, ScalarKind, ValueType};
use crate::style::ParamValue;
use indexmap::IndexMap;
use serde_json::{Map, Number, Value};

/// Converts a styled parameter value into json, following the field's value type.
pub(crate) fn coerce(metadata: &Metadata, value: ParamValue, value_type: ValueType) -> Result<Value, ValueError> {
    let kind = value_type.scalar_kind().unwrap_or(ScalarKind::String);
    match (value, value_type) {
        (ParamValue::Object(entries), ValueType::Record(record)) => record_value(metadata, entries, record),
        (ParamValue::Scalar(raw), ValueType::Any) => Ok(Value::String(raw)),
        (ParamValue::Scalar(raw), _) => Ok(scalar(kind, &raw)?),
        (ParamValue::Array(items), _) => {
            items.iter().map(|raw| scalar(kind, raw)).collect::<Result<Vec<_>, _>>().map(Value::Array).map_err(Into::into)
        }
        (ParamValue::Object(entries), _) => {
            let mut object = Map::with_capacity(entries.len());
            for (key, raw) in entries {
                let value = scalar(kind, &raw)?;
                object.insert(key, value);
            }
            Ok(Value::Object(object))
        }
    }
}

pub(crate) fn scalar(kind: ScalarKind, raw: &str) -> Result<Value, StyleError> {
    let invalid = || StyleError::invalid_scalar(kind, raw);
    match kind {
        ScalarKind::String => Ok(Value::String(raw.to_owned())),
        ScalarKind::Integer => {
            let trimmed = raw.trim();
            if let Ok(int) = trimmed.parse::<i64>() {
                Ok(Value::from(int))
            } else {
                trimmed.parse::<u64>().map(Value::from).map_err(|_int| invalid())
            }
        }
        ScalarKind::Number => {
            let number = raw.trim().parse::<f64>().map_err(|_float| invalid())?;
            Number::from_f64(number).map(Value::Number).ok_or_else(invalid)
        }
        ScalarKind::Boolean => match raw.trim() {
            "true" => Ok(Value::Bool(true)),
            "false" => Ok(Value::Bool(false)),
            _ => Err(invalid()),
        },
    }
}

/// Object properties are matched against the nested record's fields by wire name and stored
/// under the field's destination key. Unknown properties are kept as strings.
fn record_value(metadata: &Metadata, entries: IndexMap<String, String>, record: RecordType) -> Result<Value, ValueError> {
    let descriptor = metadata.get_or_build_record(record)?;

    let mut object = Map::with_capacity(entries.len());
    for (key, raw) in entries {
        let Some(field) = descriptor.fields().iter().find(|field| field.wire_name() == key) else {
            object.insert(key, Value::String(raw));
            continue;
        };
        let value = match field.value_type() {
            ValueType::Scalar(kind) => scalar(kind, &raw)?,
            ValueType::Array(kind) => Value::Array(vec![scalar(kind, &raw)?]),
            _ => Value::String(raw),
        };
        object.insert(field.dest().to_owned(), value);
    }
    Ok(Value::Object(object))
}
