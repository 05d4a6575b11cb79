use std::fs;
use std::path::{Path, PathBuf};

use serde_json::json;
use sha2::{Digest, Sha256};
use xsdforge_config::GeneratorConfig;
use xsdforge_core::{ContentModelGroup, MaxOccurs, Particle, SchemaModel, SchemaNode, TypeDefinition};
use xsdforge_generate::{
    GenerateOptions, GeneratedNode, GenerationEngine, GenerationError, XmlOptions, to_xml_string,
};

fn fixture(name: &str) -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("../../fixtures").join(name)
}

fn load_flights() -> (SchemaModel, GeneratorConfig) {
    let schema_json = fs::read_to_string(fixture("flights.schema.json")).expect("schema fixture");
    let config_json = fs::read_to_string(fixture("flights.config.json")).expect("config fixture");
    let schema: SchemaModel = serde_json::from_str(&schema_json).expect("parse schema");
    let config: GeneratorConfig = serde_json::from_str(&config_json).expect("parse config");
    (schema, config)
}

fn config(value: serde_json::Value) -> GeneratorConfig {
    serde_json::from_value(value).expect("parse config")
}

fn model(elements: Vec<SchemaNode>, types: Vec<TypeDefinition>) -> SchemaModel {
    SchemaModel {
        schema_version: "0.1".to_string(),
        target_namespace: None,
        elements,
        types,
    }
}

fn digest(xml: &str) -> String {
    hex::encode(Sha256::digest(xml.as_bytes()))
}

fn render(engine: &GenerationEngine, schema: &SchemaModel, config: &GeneratorConfig) -> String {
    let result = engine.run(schema, config).expect("run generation");
    to_xml_string(&result.document, &XmlOptions::from_overrides(&result.config.overrides))
}

fn tree_node(required_child: bool) -> SchemaModel {
    let child = SchemaNode::typed("Child", "NodeType");
    let child = if required_child { child } else { child.optional() };
    let node_type = TypeDefinition::complex(
        "NodeType",
        ContentModelGroup::sequence(vec![
            Particle::Element(SchemaNode::typed("Label", "xs:string")),
            Particle::Element(child),
        ]),
    );
    model(vec![SchemaNode::typed("Node", "NodeType")], vec![node_type])
}

#[test]
fn generate_is_deterministic() {
    let (schema, config) = load_flights();
    let engine = GenerationEngine::new(GenerateOptions::default());

    let first = render(&engine, &schema, &config);
    let second = render(&engine, &schema, &config);

    assert_eq!(digest(&first), digest(&second), "same seed must give the same document");
    assert!(first.starts_with("<?xml version=\"1.0\" encoding=\"UTF-8\"?>"));
    assert!(first.contains("<fl:FlightBooking xmlns:fl=\"urn:xsdforge:flights\""));
}

#[test]
fn different_seeds_differ() {
    let (schema, config) = load_flights();
    let a = GenerationEngine::new(GenerateOptions {
        seed: Some(1),
        ..GenerateOptions::default()
    });
    let b = GenerationEngine::new(GenerateOptions {
        seed: Some(2),
        ..GenerateOptions::default()
    });
    assert_ne!(render(&a, &schema, &config), render(&b, &schema, &config));
}

#[test]
fn flights_document_follows_config() {
    let (schema, config) = load_flights();
    let engine = GenerationEngine::new(GenerateOptions::default());
    let result = engine.run(&schema, &config).expect("run generation");
    let root = &result.document.root;

    assert_eq!(root.name, "FlightBooking");
    assert_eq!(root.attribute("version"), Some("1.0"));
    let channel = root.attribute("channel").expect("complete mode keeps optional attributes");
    assert!(["web", "agent", "mobile"].contains(&channel));

    let booking_id = root.child("BookingId").and_then(|node| node.text.as_deref()).unwrap();
    assert_eq!(booking_id.len(), 8);
    assert!(booking_id.starts_with("BK"));

    let flights: Vec<&GeneratedNode> = root.children_named("Flight").collect();
    assert_eq!(flights.len(), 3);
    let classes: Vec<&str> = flights
        .iter()
        .filter_map(|flight| flight.child("Class").and_then(|node| node.text.as_deref()))
        .collect();
    assert_eq!(classes, vec!["Economy", "Business", "Economy"]);

    for flight in &flights {
        let price: f64 = flight
            .child("Price")
            .and_then(|node| node.text.as_deref())
            .and_then(|text| text.parse().ok())
            .expect("numeric price");
        assert!((50.0..=5000.0).contains(&price));
        assert!(flight.attribute("number").is_some());
    }

    let comments: Vec<&str> = root.comments().collect();
    assert!(comments.contains(&"Flight: occurrence 1 of 3 (minOccurs=1, maxOccurs=unbounded)"));
    assert_eq!(result.report.seed, 42);
    assert_eq!(result.report.root_element.as_deref(), Some("FlightBooking"));
    assert!(!result.report.partial);
}

#[test]
fn choice_emits_exactly_one_branch() {
    let (schema, config) = load_flights();
    let engine = GenerationEngine::new(GenerateOptions::default());
    let result = engine.run(&schema, &config).expect("run generation");
    let payment = result.document.root.child("Payment").expect("payment");

    let branches: Vec<&str> = payment.elements().map(|node| node.name.as_str()).collect();
    assert_eq!(branches, vec!["CreditCard"]);
    assert_eq!(result.report.warning_count("choice_not_found"), 0);
}

#[test]
fn unconfigured_choice_still_picks_one_branch() {
    let (schema, mut config) = load_flights();
    config.element_configs.remove("Payment");
    for seed in 0..8 {
        let engine = GenerationEngine::new(GenerateOptions {
            seed: Some(seed),
            ..GenerateOptions::default()
        });
        let result = engine.run(&schema, &config).expect("run generation");
        let payment = result.document.root.child("Payment").expect("payment");
        assert_eq!(payment.elements().count(), 1);
    }
}

#[test]
fn required_choice_of_optional_branches_emits_one_branch() {
    let schema = model(
        vec![SchemaNode::complex(
            "Root",
            ContentModelGroup::choice(vec![
                Particle::Element(SchemaNode::typed("A", "xs:string").optional()),
                Particle::Element(SchemaNode::typed("B", "xs:string").optional()),
            ]),
        )],
        Vec::new(),
    );
    for mode in ["custom", "minimalistic", "complete"] {
        let config = config(json!({
            "generation_settings": { "mode": mode, "deterministic_seed": 2 }
        }));
        let result = GenerationEngine::new(GenerateOptions::default())
            .run(&schema, &config)
            .expect("run generation");
        assert_eq!(result.document.root.elements().count(), 1, "{mode}");
    }
}

#[test]
fn minimalistic_mode_omits_optional_elements() {
    let (schema, config) = load_flights();
    let engine = GenerationEngine::new(GenerateOptions {
        mode: Some("minimalistic".to_string()),
        ..GenerateOptions::default()
    });
    let result = engine.run(&schema, &config).expect("run generation");
    let root = &result.document.root;

    assert!(root.child("Notes").is_none());
    assert!(root.attribute("channel").is_none());
    assert!(root.find("Passenger/Phone").is_none());
    assert!(root.find("Passenger/FirstName").is_some());
    for flight in root.children_named("Flight") {
        assert!(flight.child("Seat").is_none());
    }
    assert!(result.report.omitted_optional > 0);
}

#[test]
fn complete_mode_includes_optional_elements() {
    let (schema, config) = load_flights();
    let engine = GenerationEngine::new(GenerateOptions::default());
    let result = engine.run(&schema, &config).expect("run generation");
    let root = &result.document.root;

    assert!(root.child("Notes").is_some());
    assert!(root.find("Passenger/Phone").is_some());
    assert_eq!(result.report.omitted_optional, 0);
}

#[test]
fn custom_mode_keeps_only_configured_optionals() {
    let schema = model(
        vec![SchemaNode::complex(
            "Root",
            ContentModelGroup::sequence(vec![
                Particle::Element(SchemaNode::typed("Id", "xs:int")),
                Particle::Element(SchemaNode::typed("Wanted", "xs:string").optional()),
                Particle::Element(SchemaNode::typed("Skipped", "xs:string").optional()),
            ]),
        )],
        Vec::new(),
    );
    let config = config(json!({
        "generation_settings": { "mode": "custom", "deterministic_seed": 3 },
        "element_configs": { "Wanted": { "custom_values": ["yes"] } }
    }));
    let result = GenerationEngine::new(GenerateOptions::default())
        .run(&schema, &config)
        .expect("run generation");
    let root = &result.document.root;

    assert!(root.child("Id").is_some());
    assert_eq!(root.child("Wanted").and_then(|node| node.text.as_deref()), Some("yes"));
    assert!(root.child("Skipped").is_none());
}

#[test]
fn occurrences_stay_within_schema_bounds() {
    let schema = model(
        vec![SchemaNode::complex(
            "Root",
            ContentModelGroup::sequence(vec![
                Particle::Element(SchemaNode::typed("Capped", "xs:int").with_occurs(2, MaxOccurs::Bounded(4))),
                Particle::Element(SchemaNode::typed("Floor", "xs:int").with_occurs(3, MaxOccurs::Bounded(6))),
                Particle::Element(SchemaNode::typed("Open", "xs:int").with_occurs(0, MaxOccurs::UNBOUNDED)),
                Particle::Element(SchemaNode::typed("Single", "xs:int")),
                Particle::Element(SchemaNode::typed("Wide", "xs:int").with_occurs(0, MaxOccurs::Bounded(100))),
            ]),
        )],
        Vec::new(),
    );
    let config = config(json!({
        "generation_settings": {
            "deterministic_seed": 9,
            "global_repeat_count": 2,
            "max_unbounded_count": 5
        },
        "element_configs": {
            "Capped": { "repeat_count": 50 },
            "Floor": { "repeat_count": 1 },
            "Open": { "repeat_count": 40 },
            "Wide": { "repeat_count": 50 }
        }
    }));
    let result = GenerationEngine::new(GenerateOptions::default())
        .run(&schema, &config)
        .expect("run generation");
    let root = &result.document.root;

    assert_eq!(root.children_named("Capped").count(), 4);
    assert_eq!(root.children_named("Floor").count(), 3);
    assert_eq!(root.children_named("Open").count(), 5);
    assert_eq!(root.children_named("Single").count(), 1);
    assert_eq!(root.children_named("Wide").count(), 5);
}

#[test]
fn recursion_stops_at_max_depth() {
    let schema = tree_node(false);
    let config = config(json!({
        "generation_settings": { "max_depth": 3, "deterministic_seed": 5 }
    }));
    let result = GenerationEngine::new(GenerateOptions::default())
        .run(&schema, &config)
        .expect("recursion must not fail");
    let root = &result.document.root;

    assert_eq!(root.descendants_named("Child").len(), 2);
    assert!(result.report.truncation_count >= 1);
    assert!(!result.report.partial);
}

#[test]
fn required_recursion_emits_truncated_stub() {
    let schema = tree_node(true);
    let config = config(json!({
        "generation_settings": {
            "max_depth": 3,
            "deterministic_seed": 5,
            "include_comments": true
        }
    }));
    let result = GenerationEngine::new(GenerateOptions::default())
        .run(&schema, &config)
        .expect("recursion must not fail");

    let children = result.document.root.descendants_named("Child");
    assert_eq!(children.len(), 3);
    let stub = children.last().expect("stub");
    assert!(stub.truncated);
    assert_eq!(stub.elements().count(), 0);
    assert!(
        children[1]
            .comments()
            .any(|comment| comment.contains("truncated at depth 3"))
    );
}

#[test]
fn circular_reference_limit_tightens_direct_recursion() {
    let schema = tree_node(false);
    let config = config(json!({
        "generation_settings": { "max_depth": 5, "deterministic_seed": 5 }
    }));
    let result = GenerationEngine::new(GenerateOptions {
        circular_reference_limit: Some(2),
        ..GenerateOptions::default()
    })
    .run(&schema, &config)
    .expect("run generation");

    assert_eq!(result.document.root.descendants_named("Child").len(), 1);
}

#[test]
fn step_budget_yields_partial_document() {
    let (schema, config) = load_flights();
    let engine = GenerationEngine::new(GenerateOptions {
        max_steps: 6,
        allow_partial: true,
        ..GenerateOptions::default()
    });
    let result = engine.run(&schema, &config).expect("partial result");

    assert!(result.report.partial);
    assert!(result.document.root.truncated);
    assert_eq!(result.report.truncations.iter().filter(|t| t.code == "timeout").count(), 1);
    assert!(result.report.elements_generated <= 6);
}

#[test]
fn step_budget_fails_without_partial() {
    let (schema, config) = load_flights();
    let engine = GenerationEngine::new(GenerateOptions {
        max_steps: 6,
        ..GenerateOptions::default()
    });
    let err = engine.run(&schema, &config).unwrap_err();
    assert!(matches!(err, GenerationError::Timeout { .. }));
}

#[test]
fn concurrent_runs_are_independent() {
    let (schema, config) = load_flights();
    let engine = GenerationEngine::new(GenerateOptions::default());

    let outputs: Vec<String> = std::thread::scope(|scope| {
        let handles: Vec<_> = (0..4)
            .map(|_| scope.spawn(|| render(&engine, &schema, &config)))
            .collect();
        handles
            .into_iter()
            .map(|handle| handle.join().expect("thread"))
            .collect()
    });

    assert!(outputs.windows(2).all(|pair| pair[0] == pair[1]));
}

#[test]
fn nil_configured_element_is_emitted_as_nil() {
    let mut notes = SchemaNode::typed("Notes", "xs:string");
    notes.nillable = true;
    let schema = model(
        vec![SchemaNode::complex(
            "Root",
            ContentModelGroup::sequence(vec![
                Particle::Element(notes),
                Particle::Element(SchemaNode::typed("Body", "xs:string")),
            ]),
        )],
        Vec::new(),
    );
    let config = config(json!({
        "generation_settings": { "deterministic_seed": 1 },
        "element_configs": {
            "Notes": { "nil": true },
            "Body": { "nil": true }
        }
    }));
    let result = GenerationEngine::new(GenerateOptions::default())
        .run(&schema, &config)
        .expect("run generation");
    let root = &result.document.root;

    assert!(root.child("Notes").is_some_and(|node| node.nil));
    assert!(root.child("Body").is_some_and(|node| !node.nil && node.text.is_some()));
    assert_eq!(result.report.warning_count("nil_not_nillable"), 1);

    let xml = to_xml_string(&result.document, &XmlOptions::default());
    assert!(xml.contains("<Notes xsi:nil=\"true\"/>"));
}

#[test]
fn unknown_data_context_path_fails_before_walk() {
    let schema = model(vec![SchemaNode::typed("Root", "xs:string")], Vec::new());
    let config = config(json!({
        "data_contexts": { "base": { "cities": ["Lisbon"] } },
        "element_configs": { "Root": { "data_context": "base.towns" } }
    }));
    let err = GenerationEngine::new(GenerateOptions::default())
        .run(&schema, &config)
        .unwrap_err();
    match err {
        GenerationError::Configuration { message, .. } => assert!(message.contains("base.towns")),
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn missing_type_reference_is_schema_error() {
    let mut broken = SchemaNode::typed("Broken", "");
    broken.type_ref = None;
    let schema = model(
        vec![SchemaNode::complex(
            "Root",
            ContentModelGroup::sequence(vec![Particle::Element(broken)]),
        )],
        Vec::new(),
    );
    let err = GenerationEngine::new(GenerateOptions::default())
        .run(&schema, &GeneratorConfig::default())
        .unwrap_err();
    assert!(matches!(err, GenerationError::Schema(_)));
}
