//! The `cremalink_ha.brew` service

use cremalink_device::BrewParameters;
use ha_service_registry::{ServiceDescription, ServiceError};
use serde_json::{json, Map, Value};

use crate::constants::{BREW_PARAMS, DOMAIN, SERVICE_BREW};

/// JSON schema of the brew service data
///
/// Optional parameters accept numbers and integer strings; both are
/// coerced to integers by [`parse_brew_request`]. Fractional numbers are
/// truncated, fractional strings are rejected.
pub fn brew_schema() -> Value {
    let integer = json!({
        "anyOf": [
            {"type": "number"},
            {"type": "string", "pattern": "^\\s*-?[0-9]+\\s*$"}
        ]
    });

    let mut properties = Map::new();
    properties.insert("beverage".to_string(), json!({"type": "string", "minLength": 1}));
    for param in BREW_PARAMS {
        properties.insert((*param).to_string(), integer.clone());
    }

    json!({
        "type": "object",
        "required": ["beverage"],
        "properties": properties
    })
}

pub fn brew_description() -> ServiceDescription {
    ServiceDescription::new(DOMAIN, SERVICE_BREW)
        .with_name("Brew")
        .with_description("Brew a beverage on the first configured machine")
        .with_schema(brew_schema())
}

fn coerce_int(name: &str, value: &Value) -> Result<i64, ServiceError> {
    let invalid = || ServiceError::InvalidData(format!("{name} must be an integer, got {value}"));
    match value {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().map(|f| f.trunc() as i64))
            .ok_or_else(invalid),
        Value::String(s) => s.trim().parse::<i64>().map_err(|_| invalid()),
        _ => Err(invalid()),
    }
}

/// Beverage name and optional parameters of a brew call
///
/// Parameters are `None` when the call names none of them, so the machine
/// uses its stored recipe.
pub fn parse_brew_request(data: &Value) -> Result<(String, Option<BrewParameters>), ServiceError> {
    let beverage = data
        .get("beverage")
        .and_then(Value::as_str)
        .ok_or_else(|| ServiceError::InvalidData("beverage is required".to_string()))?
        .to_string();

    let mut params = BrewParameters::new();
    for name in BREW_PARAMS {
        if let Some(value) = data.get(*name) {
            params.insert((*name).to_string(), coerce_int(name, value)?);
        }
    }

    Ok((beverage, (!params.is_empty()).then_some(params)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_beverage_only_has_no_params() {
        let (beverage, params) = parse_brew_request(&json!({"beverage": "espresso"})).unwrap();
        assert_eq!(beverage, "espresso");
        assert_eq!(params, None);
    }

    #[test]
    fn test_params_are_coerced() {
        let (_, params) = parse_brew_request(&json!({
            "beverage": "cappuccino",
            "milk_ml": "120",
            "coffee_ml": 40,
            "taste": 3.0,
            "unrelated": 9
        }))
        .unwrap();

        let params = params.unwrap();
        assert_eq!(params.len(), 3);
        assert_eq!(params["milk_ml"], 120);
        assert_eq!(params["coffee_ml"], 40);
        assert_eq!(params["taste"], 3);
    }

    #[test]
    fn test_bad_values_rejected() {
        assert!(parse_brew_request(&json!({"coffee_ml": 40})).is_err());
        assert!(parse_brew_request(&json!({"beverage": "espresso", "aroma": "strong"})).is_err());
    }

    #[test]
    fn test_fractional_string_rejected() {
        let result = parse_brew_request(&json!({"beverage": "espresso", "coffee_ml": "40.9"}));
        assert!(matches!(result, Err(ServiceError::InvalidData(_))));

        let (_, params) =
            parse_brew_request(&json!({"beverage": "espresso", "coffee_ml": 40.9})).unwrap();
        assert_eq!(params.unwrap()["coffee_ml"], 40);
    }

    #[test]
    fn test_schema_rejects_fractional_string() {
        let schema = jsonschema::JSONSchema::compile(&brew_schema()).unwrap();
        assert!(schema.is_valid(&json!({"beverage": "espresso", "coffee_ml": " 40 "})));
        assert!(!schema.is_valid(&json!({"beverage": "espresso", "coffee_ml": "40.9"})));
    }
}
