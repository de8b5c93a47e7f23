use serde_json::{Number, Value};

/// Convert one text-protocol cell into JSON using the column's type name.
///
/// Integers and floating point columns become JSON numbers; everything else,
/// including `DECIMAL`, stays a string so no precision is lost.
pub fn cell_to_json(type_name: &str, cell: Option<String>) -> Value {
    let Some(text) = cell else {
        return Value::Null;
    };

    let base = type_name
        .trim_end_matches(" UNSIGNED")
        .to_ascii_uppercase();
    match base.as_str() {
        "TINYINT" | "SMALLINT" | "MEDIUMINT" | "INT" | "INTEGER" | "BIGINT" | "YEAR"
        | "BOOLEAN" => integer(&text).unwrap_or(Value::String(text)),
        "FLOAT" | "DOUBLE" => text
            .parse::<f64>()
            .ok()
            .and_then(Number::from_f64)
            .map(Value::Number)
            .unwrap_or(Value::String(text)),
        _ => Value::String(text),
    }
}

fn integer(text: &str) -> Option<Value> {
    if let Ok(v) = text.parse::<i64>() {
        return Some(Value::from(v));
    }
    text.parse::<u64>().ok().map(Value::from)
}
