//! snake_case to camelCase key mapping at the API boundary.

use serde_json::{Map, Value};

/// Convert one snake_case identifier to camelCase.
///
/// Leading underscores are kept; keys already in camelCase pass through.
pub fn to_camel_case(key: &str) -> String {
    let mut out = String::with_capacity(key.len());
    let mut upper_next = false;
    let mut seen_word = false;
    for c in key.chars() {
        if c == '_' && seen_word {
            upper_next = true;
            continue;
        }
        if upper_next {
            out.extend(c.to_uppercase());
            upper_next = false;
        } else {
            out.push(c);
        }
        if c != '_' {
            seen_word = true;
        }
    }
    out
}

/// Recursively rename object keys to camelCase. Values, including `null`,
/// are left untouched.
pub fn camelize_keys(value: Value) -> Value {
    match value {
        Value::Object(map) => Value::Object(
            map.into_iter()
                .map(|(k, v)| (to_camel_case(&k), camelize_keys(v)))
                .collect::<Map<String, Value>>(),
        ),
        Value::Array(items) => Value::Array(items.into_iter().map(camelize_keys).collect()),
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_to_camel_case() {
        assert_eq!(to_camel_case("unrealized_pnl"), "unrealizedPnl");
        assert_eq!(to_camel_case("condition_id"), "conditionId");
        assert_eq!(to_camel_case("alreadyCamel"), "alreadyCamel");
        assert_eq!(to_camel_case("_private_field"), "_privateField");
        assert_eq!(to_camel_case("id"), "id");
    }

    #[test]
    fn test_camelize_nested() {
        let input = json!({
            "bot_status": {"kill_switch_active": null, "uptime_seconds": 12},
            "open_positions": [{"entry_price": 0.4, "market_question": "Will it rain?"}],
            "paused_reason": null
        });
        let output = camelize_keys(input);
        assert_eq!(
            output,
            json!({
                "botStatus": {"killSwitchActive": null, "uptimeSeconds": 12},
                "openPositions": [{"entryPrice": 0.4, "marketQuestion": "Will it rain?"}],
                "pausedReason": null
            })
        );
    }

    #[test]
    fn test_scalar_values_untouched() {
        assert_eq!(camelize_keys(json!("snake_case_value")), json!("snake_case_value"));
        assert_eq!(camelize_keys(Value::Null), Value::Null);
    }
}
