use super::*;
use serde_json::json;

#[test]
fn test_to_str_rules() {
    assert_eq!(to_str(None), "undefined");
    assert_eq!(to_str(Some(&Value::Null)), "null");
    assert_eq!(to_str(Some(&json!("x"))), "x");
    assert_eq!(to_str(Some(&json!({"a": 1}))), r#"{"a":1}"#);
    assert_eq!(to_str(Some(&json!([1, "two", null]))), r#"[1,"two",null]"#);
    assert_eq!(to_str(Some(&json!(42.5))), "42.5");
    assert_eq!(to_str(Some(&json!(true))), "true");
}

#[test]
fn test_normalize_full_record() {
    let raw = json!({
        "thingId": "org.example:bus-1",
        "policyId": "org.example:policy",
        "attributes": {
            "model": "Citaro",
            "location": "Depot, 44.06,12.56",
            "seats": 40
        },
        "features": {
            "status": {"properties": {"speed": 32.0}}
        }
    });

    let thing = normalize(&raw);
    assert_eq!(thing.id, "org.example:bus-1");
    assert_eq!(thing.attributes.len(), 3);
    assert_eq!(thing.attributes["model"], "Citaro");
    assert_eq!(thing.attributes["seats"], "40");
    assert_eq!(
        thing.features["status"],
        r#"{"properties":{"speed":32.0}}"#
    );
}

#[test]
fn test_normalize_missing_fields() {
    let thing = normalize(&json!({"thingId": "a"}));
    assert_eq!(thing.id, "a");
    assert!(thing.attributes.is_empty());
    assert!(thing.features.is_empty());
    assert!(thing.is_tombstone());
}

#[test]
fn test_normalize_missing_id_becomes_undefined() {
    let thing = normalize(&json!({"attributes": {"model": "x"}}));
    assert_eq!(thing.id, "undefined");
    assert_eq!(thing.model(), Some("x"));
}

#[test]
fn test_normalize_malformed_maps_are_empty() {
    let thing = normalize(&json!({
        "thingId": 7,
        "attributes": "not an object",
        "features": [1, 2, 3]
    }));
    assert_eq!(thing.id, "7");
    assert!(thing.attributes.is_empty());
    assert!(thing.features.is_empty());
}

#[test]
fn test_normalize_non_object_input() {
    let thing = normalize(&json!("garbage"));
    assert_eq!(thing.id, "undefined");
    assert!(thing.attributes.is_empty());
    assert!(thing.features.is_empty());
}

#[test]
fn test_normalize_is_deterministic() {
    let raw = json!({
        "thingId": "t",
        "attributes": {"b": 2, "a": {"nested": [1, 2]}},
        "features": {"f": null}
    });
    assert_eq!(normalize(&raw), normalize(&raw));
}

#[test]
fn test_null_attribute_value() {
    let thing = normalize(&json!({"thingId": "t", "attributes": {"k": null}}));
    assert_eq!(thing.attributes["k"], "null");
    assert!(!thing.is_tombstone());
}

#[test]
fn test_empty_id_is_not_tombstone() {
    let thing = normalize(&json!({"thingId": ""}));
    assert!(!thing.is_tombstone());
}

#[test]
fn test_thing_location() {
    let thing = normalize(&json!({
        "thingId": "t",
        "attributes": {"location": "Office, 44.14,12.23"}
    }));
    let loc = thing.location().unwrap();
    assert_eq!(loc.latitude, 44.14);
    assert_eq!(loc.longitude, 12.23);

    let nowhere = normalize(&json!({"thingId": "t", "attributes": {"location": "unknown"}}));
    assert!(nowhere.location().is_none());
}

#[test]
fn test_feature_value_parse() {
    assert_eq!(
        FeatureValue::parse(r#"{"a":1}"#),
        FeatureValue::Structured(json!({"a": 1}))
    );
    assert_eq!(
        FeatureValue::parse("running"),
        FeatureValue::Raw("running".to_string())
    );
    assert_eq!(FeatureValue::parse("null"), FeatureValue::Structured(Value::Null));
}

#[test]
fn test_parsed_features_preserve_keys() {
    let thing = normalize(&json!({
        "thingId": "t",
        "features": {"a": {"x": 1}, "b": "plain text"}
    }));
    let parsed: Vec<_> = thing.parsed_features().collect();
    assert_eq!(parsed.len(), 2);
    assert_eq!(parsed[0].0, "a");
    assert_eq!(parsed[0].1, FeatureValue::Structured(json!({"x": 1})));
    assert_eq!(parsed[1].1, FeatureValue::Raw("plain text".to_string()));
}
