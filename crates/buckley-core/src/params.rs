//! Tolerant parameter coercion
//!
//! Tool parameters arrive as untyped JSON maps. JSON numbers show up as
//! floats, booleans show up as strings, and single values stand in for
//! lists. Every tool funnels its input through these helpers rather than
//! re-implementing coercion.

use serde_json::Value;
use std::time::Duration;

use crate::error::ToolError;

/// Required string parameter; missing or wrong-typed values name the key.
pub fn required_str<'a>(params: &'a Value, key: &str) -> Result<&'a str, ToolError> {
    params[key]
        .as_str()
        .ok_or_else(|| ToolError::InvalidParams(format!("{} is required", key)))
}

/// String value of `key`, or empty string if absent or not a string.
pub fn string_param(params: &Value, key: &str) -> String {
    params[key].as_str().unwrap_or_default().to_string()
}

/// Integer value of `key`: accepts integers, floats (truncated), and
/// trimmed numeric strings. Anything else yields `default`.
pub fn int_param(params: &Value, key: &str, default: i64) -> i64 {
    match &params[key] {
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                i
            } else if let Some(f) = n.as_f64() {
                f as i64
            } else {
                default
            }
        }
        Value::String(s) => {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                default
            } else {
                trimmed
                    .parse::<i64>()
                    .or_else(|_| trimmed.parse::<f64>().map(|f| f as i64))
                    .unwrap_or(default)
            }
        }
        _ => default,
    }
}

/// Boolean value of `key`: accepts booleans and the usual string spellings.
pub fn bool_param(params: &Value, key: &str, default: bool) -> bool {
    match &params[key] {
        Value::Bool(b) => *b,
        Value::String(s) => match s.trim().to_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => true,
            "0" | "false" | "no" | "off" => false,
            _ => default,
        },
        _ => default,
    }
}

/// Float value of `key`: accepts numbers and trimmed numeric strings.
pub fn float_param(params: &Value, key: &str, default: f64) -> f64 {
    match &params[key] {
        Value::Number(n) => n.as_f64().unwrap_or(default),
        Value::String(s) => {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                default
            } else {
                trimmed.parse::<f64>().unwrap_or(default)
            }
        }
        _ => default,
    }
}

/// Duration value of `key`: bare integers are milliseconds; strings accept
/// `ms`/`s`/`m`/`h` suffixes (`"250ms"`, `"2s"`) or bare millisecond digits.
pub fn duration_param(params: &Value, key: &str, default: Duration) -> Duration {
    match &params[key] {
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                if i >= 0 {
                    return Duration::from_millis(i as u64);
                }
            } else if let Some(f) = n.as_f64()
                && f >= 0.0
            {
                return Duration::from_millis(f as u64);
            }
            default
        }
        Value::String(s) => parse_duration(s.trim()).unwrap_or(default),
        _ => default,
    }
}

fn parse_duration(s: &str) -> Option<Duration> {
    if s.is_empty() {
        return None;
    }
    if let Ok(ms) = s.parse::<u64>() {
        return Some(Duration::from_millis(ms));
    }
    let split = s.find(|c: char| !c.is_ascii_digit() && c != '.')?;
    let (num, unit) = s.split_at(split);
    let value: f64 = num.parse().ok()?;
    let millis = match unit.trim() {
        "ms" => value,
        "s" => value * 1_000.0,
        "m" => value * 60_000.0,
        "h" => value * 3_600_000.0,
        _ => return None,
    };
    if millis < 0.0 {
        return None;
    }
    Some(Duration::from_millis(millis as u64))
}

/// String-list value of `key`: a single string becomes a one-element list;
/// arrays keep their string entries, trimmed, with empties dropped.
pub fn string_list_param(params: &Value, key: &str) -> Vec<String> {
    match &params[key] {
        Value::String(s) => {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                Vec::new()
            } else {
                vec![trimmed.to_string()]
            }
        }
        Value::Array(items) => items
            .iter()
            .filter_map(|v| v.as_str())
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect(),
        _ => Vec::new(),
    }
}

/// Glob parameters: at most a singleton for a string, or the provided list
/// with non-string entries ignored.
pub fn glob_params(params: &Value, key: &str) -> Vec<String> {
    match &params[key] {
        Value::String(s) if !s.is_empty() => vec![s.clone()],
        Value::Array(items) => items
            .iter()
            .filter_map(|v| v.as_str())
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect(),
        _ => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_required_str() {
        let params = json!({"path": "a.txt", "n": 3});
        assert_eq!(required_str(&params, "path").unwrap(), "a.txt");
        let err = required_str(&params, "missing").unwrap_err();
        assert!(err.to_string().contains("missing is required"));
        assert!(required_str(&params, "n").is_err());
    }

    #[test]
    fn test_string_param() {
        let params = json!({"s": "hi", "n": 42});
        assert_eq!(string_param(&params, "s"), "hi");
        assert_eq!(string_param(&params, "n"), "");
        assert_eq!(string_param(&params, "absent"), "");
    }

    #[test]
    fn test_int_param_accepts_floats_and_strings() {
        let params = json!({
            "i": 7,
            "f": 7.9,
            "s": " 42 ",
            "fs": "3.7",
            "bad": "nope",
            "empty": ""
        });
        assert_eq!(int_param(&params, "i", 0), 7);
        assert_eq!(int_param(&params, "f", 0), 7);
        assert_eq!(int_param(&params, "s", 0), 42);
        assert_eq!(int_param(&params, "fs", 0), 3);
        assert_eq!(int_param(&params, "bad", 9), 9);
        assert_eq!(int_param(&params, "empty", 9), 9);
        assert_eq!(int_param(&params, "absent", -1), -1);
    }

    #[test]
    fn test_bool_param_string_spellings() {
        let params = json!({
            "t": true,
            "yes": "YES",
            "on": "on",
            "one": "1",
            "off": "Off",
            "zero": "0",
            "junk": "maybe"
        });
        assert!(bool_param(&params, "t", false));
        assert!(bool_param(&params, "yes", false));
        assert!(bool_param(&params, "on", false));
        assert!(bool_param(&params, "one", false));
        assert!(!bool_param(&params, "off", true));
        assert!(!bool_param(&params, "zero", true));
        assert!(bool_param(&params, "junk", true));
        assert!(!bool_param(&params, "absent", false));
    }

    #[test]
    fn test_float_param() {
        let params = json!({"f": 1.5, "s": "2.25", "bad": "x"});
        assert_eq!(float_param(&params, "f", 0.0), 1.5);
        assert_eq!(float_param(&params, "s", 0.0), 2.25);
        assert_eq!(float_param(&params, "bad", 3.0), 3.0);
    }

    #[test]
    fn test_duration_param() {
        let params = json!({
            "ms": 250,
            "str_ms": "250ms",
            "secs": "2s",
            "mins": "1.5m",
            "bare": "750",
            "bad": "soon"
        });
        let def = Duration::from_secs(1);
        assert_eq!(duration_param(&params, "ms", def), Duration::from_millis(250));
        assert_eq!(duration_param(&params, "str_ms", def), Duration::from_millis(250));
        assert_eq!(duration_param(&params, "secs", def), Duration::from_secs(2));
        assert_eq!(duration_param(&params, "mins", def), Duration::from_millis(90_000));
        assert_eq!(duration_param(&params, "bare", def), Duration::from_millis(750));
        assert_eq!(duration_param(&params, "bad", def), def);
        assert_eq!(duration_param(&params, "absent", def), def);
    }

    #[test]
    fn test_string_list_param() {
        let params = json!({
            "one": " single ",
            "many": ["a", "", "  b ", 3, "c"],
            "empty": ""
        });
        assert_eq!(string_list_param(&params, "one"), vec!["single"]);
        assert_eq!(string_list_param(&params, "many"), vec!["a", "b", "c"]);
        assert!(string_list_param(&params, "empty").is_empty());
        assert!(string_list_param(&params, "absent").is_empty());
    }

    #[test]
    fn test_glob_params() {
        let params = json!({
            "single": "*.rs",
            "list": ["*.rs", 7, "*.go"],
            "blank": ""
        });
        assert_eq!(glob_params(&params, "single"), vec!["*.rs"]);
        assert_eq!(glob_params(&params, "list"), vec!["*.rs", "*.go"]);
        assert!(glob_params(&params, "blank").is_empty());
    }
}
