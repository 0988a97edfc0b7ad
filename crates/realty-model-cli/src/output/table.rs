use serde_json::{Map, Value};
use tabled::{builder::Builder, Table};

/// Result fields too long to show in a table; only their length is printed.
const SERIES_FIELDS: [&str; 2] = ["distribution", "cash_flows"];

/// Format output as tables: scalar result fields first, then one table per
/// nested row set (amortization schedule, tornado bars, scenarios).
pub fn print_table(value: &Value) {
    match value {
        Value::Object(map) => match map.get("result") {
            Some(Value::Object(result)) => print_result(result, map),
            // Bare records such as the amortization output
            _ => print_result(map, &Map::new()),
        },
        Value::Array(arr) => print_rows(arr),
        _ => println!("{}", value),
    }
}

fn print_result(result: &Map<String, Value>, envelope: &Map<String, Value>) {
    let mut scalars = Map::new();
    let mut row_sets: Vec<(&str, &Vec<Value>)> = Vec::new();

    for (key, val) in result {
        match val {
            Value::Array(arr) if SERIES_FIELDS.contains(&key.as_str()) => {
                scalars.insert(key.clone(), Value::String(format!("[{} values]", arr.len())));
            }
            Value::Array(arr) if arr.first().is_some_and(Value::is_object) => {
                row_sets.push((key.as_str(), arr));
            }
            _ => {
                scalars.insert(key.clone(), val.clone());
            }
        }
    }

    print_fields(&scalars);
    for (name, rows) in row_sets {
        println!("\n{}:", name);
        print_rows(rows);
    }

    if let Some(Value::Array(warnings)) = envelope.get("warnings") {
        if !warnings.is_empty() {
            println!("\nWarnings:");
            for w in warnings.iter().filter_map(Value::as_str) {
                println!("  - {}", w);
            }
        }
    }

    if let Some(Value::String(meth)) = envelope.get("methodology") {
        println!("\nMethodology: {}", meth);
    }
}

fn print_fields(map: &Map<String, Value>) {
    let mut builder = Builder::default();
    builder.push_record(["Field", "Value"]);
    for (key, val) in map {
        builder.push_record([key.as_str(), &format_value(val)]);
    }
    println!("{}", Table::from(builder));
}

fn print_rows(arr: &[Value]) {
    let Some(Value::Object(first)) = arr.first() else {
        for item in arr {
            println!("{}", format_value(item));
        }
        return;
    };

    let headers: Vec<String> = first.keys().cloned().collect();
    let mut builder = Builder::default();
    builder.push_record(&headers);
    for item in arr.iter().filter_map(Value::as_object) {
        let row: Vec<String> = headers
            .iter()
            .map(|h| item.get(h.as_str()).map(format_value).unwrap_or_default())
            .collect();
        builder.push_record(row);
    }
    println!("{}", Table::from(builder));
}

fn format_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Null => "-".to_string(),
        Value::Array(arr) => arr.iter().map(format_value).collect::<Vec<_>>().join(", "),
        // Nested records such as RateSolution or ExitValuation
        Value::Object(map) => match (map.get("value"), map.get("converged")) {
            (Some(v), Some(Value::Bool(false))) => format!("{} (not converged)", format_value(v)),
            (Some(v), Some(_)) => format_value(v),
            _ => serde_json::to_string(value).unwrap_or_default(),
        },
    }
}
