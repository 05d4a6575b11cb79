use std::fs;
use std::path::{Path, PathBuf};

use serde_json::json;
use xsdforge_config::{
    GenerationMode, RelationshipStrategy, SelectionStrategy, config_json_schema_value,
    load_config_value, validate_config_against_schema, validate_config_json,
    validate_config_value,
};
use xsdforge_core::SchemaModel;

fn fixture(name: &str) -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("../../fixtures").join(name)
}

fn load_schema() -> SchemaModel {
    let contents = fs::read_to_string(fixture("flights.schema.json")).expect("schema fixture");
    serde_json::from_str(&contents).expect("parse schema fixture")
}

#[test]
fn flight_config_validates_against_schema() {
    let config_json = load_config_value(&fixture("flights.config.json")).expect("load config");
    let config_schema = config_json_schema_value().expect("config schema");

    let structural =
        validate_config_json(&config_json, &config_schema).expect("validate config json");
    assert!(structural.errors.is_empty(), "structural errors found");

    let validated = validate_config_value(&config_json).expect("config should validate");
    let compiled = &validated.compiled;
    assert!(compiled.warnings.is_empty(), "unexpected warnings");
    assert_eq!(compiled.settings.mode, GenerationMode::Complete);
    assert_eq!(compiled.settings.deterministic_seed, Some(42));

    let trip = compiled.relationship("trip").expect("trip relationship");
    assert_eq!(trip.strategy, RelationshipStrategy::DependentValues);
    assert_eq!(trip.depends_on, vec!["DepartureCity".to_string()]);

    let traveler = compiled.relationship("traveler").expect("traveler relationship");
    assert_eq!(traveler.selection, SelectionStrategy::Template);
    assert_eq!(traveler.record_key("Email"), "email");

    let departure = compiled
        .element_config("DepartureCity", "FlightBooking/Flight/DepartureCity")
        .expect("departure config");
    assert_eq!(departure.selection, Some(SelectionStrategy::Sequential));

    let report = validate_config_against_schema(compiled, &load_schema());
    assert!(report.errors.is_empty(), "schema errors: {:?}", report.errors);
    assert!(report.warnings.is_empty(), "schema warnings: {:?}", report.warnings);
}

#[test]
fn toml_config_loads_like_json() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("flights.toml");
    fs::write(
        &path,
        r#"
[metadata]
root_element = "FlightBooking"

[generation_settings]
mode = "minimalistic"
deterministic_seed = 7

[data_contexts.base.airports]
cities = ["Lisbon", "Madrid"]

[smart_relationships.trip]
fields = ["DepartureCity", "ArrivalCity"]
strategy = "dependent_values"
depends_on = ["DepartureCity"]
constraints = ["departure != arrival"]

[element_configs.DepartureCity]
data_context = "base.airports.cities"
"#,
    )
    .expect("write toml");

    let config_json = load_config_value(&path).expect("load toml");
    let validated = validate_config_value(&config_json).expect("toml config validates");
    assert_eq!(validated.compiled.settings.mode, GenerationMode::Minimalistic);
    assert_eq!(validated.compiled.settings.global_repeat_count, 2);
    assert!(validated.compiled.is_participant("ArrivalCity"));
}

#[test]
fn schema_cross_check_flags_unknown_fields_and_keys() {
    let config_json = json!({
        "metadata": { "root_element": "Invoice" },
        "smart_relationships": {
            "trip": {
                "fields": ["DepartureCity", "Passenger", "Gate"],
                "strategy": "constraint_based"
            }
        },
        "element_configs": {
            "Gate": { "custom_values": ["A1"] },
            "Flight/Seat": { "custom_values": ["12C"] },
            "BookingId": { "repeat_count": 0 }
        }
    });
    let validated = validate_config_value(&config_json).expect("semantically valid");
    let report = validate_config_against_schema(&validated.compiled, &load_schema());

    let error_codes: Vec<&str> = report.errors.iter().map(|e| e.code.as_str()).collect();
    assert!(error_codes.contains(&"unknown_root_element"));
    assert!(error_codes.contains(&"relationship_field_not_leaf"));
    assert!(error_codes.contains(&"unknown_relationship_field"));

    let warning_codes: Vec<&str> = report.warnings.iter().map(|w| w.code.as_str()).collect();
    assert_eq!(
        warning_codes,
        vec!["zero_repeat_count_required", "unmatched_element_config"]
    );
}

#[test]
fn emitted_schema_describes_sections() {
    let schema = config_json_schema_value().expect("config schema");
    let properties = schema["properties"].as_object().expect("properties");
    for section in [
        "metadata",
        "generation_settings",
        "data_contexts",
        "smart_relationships",
        "element_configs",
        "global_overrides",
    ] {
        assert!(properties.contains_key(section), "missing {section}");
    }
}
