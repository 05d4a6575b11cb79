use chrono::NaiveDate;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde_json::json;
use xsdforge_config::GeneratorConfig;
use xsdforge_core::{ContentModelGroup, Particle, PrimitiveType, SchemaModel, SchemaNode, SimpleTypeFacets};
use xsdforge_generate::facets::{PatternCache, check_value};
use xsdforge_generate::generators::{GeneratorContext, GeneratorRegistry, primitive_id};
use xsdforge_generate::{GenerateOptions, GenerationEngine};

fn facets(base: PrimitiveType, build: impl FnOnce(&mut SimpleTypeFacets)) -> SimpleTypeFacets {
    let mut facets = SimpleTypeFacets::new(base);
    build(&mut facets);
    facets
}

fn restricted_types() -> Vec<(&'static str, SimpleTypeFacets)> {
    vec![
        ("bounded int", facets(PrimitiveType::Int, |f| {
            f.min_inclusive = Some("-20".to_string());
            f.max_exclusive = Some("20".to_string());
        })),
        ("positive", facets(PrimitiveType::PositiveInteger, |_| {})),
        ("digits", facets(PrimitiveType::Integer, |f| f.total_digits = Some(3))),
        ("price", facets(PrimitiveType::Decimal, |f| {
            f.min_inclusive = Some("0.5".to_string());
            f.max_inclusive = Some("9.99".to_string());
            f.fraction_digits = Some(2);
        })),
        ("code", facets(PrimitiveType::String, |f| {
            f.min_length = Some(3);
            f.max_length = Some(5);
        })),
        ("fixed length", facets(PrimitiveType::Token, |f| f.length = Some(7))),
        ("status", facets(PrimitiveType::String, |f| {
            f.enumeration = vec!["open".to_string(), "closed".to_string()];
        })),
        ("sku", facets(PrimitiveType::String, |f| {
            f.pattern = Some("[A-Z]{3}-[0-9]{4}".to_string());
        })),
        ("window", facets(PrimitiveType::Date, |f| {
            f.min_inclusive = Some("2024-02-01".to_string());
            f.max_inclusive = Some("2024-02-29".to_string());
        })),
        ("stamp", facets(PrimitiveType::DateTime, |_| {})),
        ("clock", facets(PrimitiveType::Time, |_| {})),
        ("year", facets(PrimitiveType::GYear, |_| {})),
        ("month", facets(PrimitiveType::GYearMonth, |_| {})),
        ("flag", facets(PrimitiveType::Boolean, |_| {})),
        ("link", facets(PrimitiveType::AnyUri, |_| {})),
        ("lang", facets(PrimitiveType::Language, |_| {})),
        ("hash", facets(PrimitiveType::HexBinary, |f| f.length = Some(4))),
        ("blob", facets(PrimitiveType::Base64Binary, |_| {})),
        ("ratio", facets(PrimitiveType::Double, |_| {})),
    ]
}

#[test]
fn primitive_generators_honor_facets() {
    let registry = GeneratorRegistry::default();
    let mut patterns = PatternCache::new();
    let base_date = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();

    for (label, facets) in restricted_types() {
        let generator = registry.primitive_for(&facets).expect("generator");
        assert_eq!(generator.id(), primitive_id(&facets));
        let ctx = GeneratorContext {
            name: label,
            path: label,
            facets: &facets,
            base_date,
        };
        for seed in 0..25 {
            let mut rng = ChaCha8Rng::seed_from_u64(seed);
            let value = generator.generate(&ctx, &mut rng).expect("value");
            assert!(
                check_value(&value, &facets, &mut patterns).is_ok(),
                "{label}: '{value}' violates its facets"
            );
        }
    }
}

#[test]
fn generators_are_deterministic_per_seed() {
    let registry = GeneratorRegistry::default();
    let base_date = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
    for (label, facets) in restricted_types() {
        let generator = registry.primitive_for(&facets).expect("generator");
        let ctx = GeneratorContext {
            name: label,
            path: label,
            facets: &facets,
            base_date,
        };
        let a = generator.generate(&ctx, &mut ChaCha8Rng::seed_from_u64(9)).unwrap();
        let b = generator.generate(&ctx, &mut ChaCha8Rng::seed_from_u64(9)).unwrap();
        assert_eq!(a, b, "{label}");
    }
}

#[test]
fn unsatisfiable_range_is_an_error() {
    let registry = GeneratorRegistry::default();
    let facets = facets(PrimitiveType::Int, |f| {
        f.min_inclusive = Some("10".to_string());
        f.max_inclusive = Some("5".to_string());
    });
    let generator = registry.primitive_for(&facets).expect("generator");
    let ctx = GeneratorContext {
        name: "Broken",
        path: "Broken",
        facets: &facets,
        base_date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
    };
    assert!(generator.generate(&ctx, &mut ChaCha8Rng::seed_from_u64(1)).is_err());
}

fn contact_schema() -> SchemaModel {
    SchemaModel {
        schema_version: "0.1".to_string(),
        target_namespace: None,
        elements: vec![SchemaNode::complex(
            "Contact",
            ContentModelGroup::sequence(vec![
                Particle::Element(SchemaNode::typed("FirstName", "xs:string")),
                Particle::Element(SchemaNode::typed("Email", "xs:string")),
                Particle::Element(SchemaNode::typed("Quantity", "xs:int")),
            ]),
        )],
        types: Vec::new(),
    }
}

#[test]
fn realistic_data_uses_name_heuristics() {
    let config: GeneratorConfig = serde_json::from_value(json!({
        "generation_settings": { "deterministic_seed": 4 }
    }))
    .unwrap();
    let result = GenerationEngine::new(GenerateOptions::default())
        .run(&contact_schema(), &config)
        .expect("run generation");

    let usage = &result.report.generator_usage;
    assert_eq!(usage.get("semantic.first_name"), Some(&1));
    assert_eq!(usage.get("semantic.email"), Some(&1));
    assert_eq!(usage.get("primitive.integer"), Some(&1));
    let email = result
        .document
        .root
        .child("Email")
        .and_then(|node| node.text.as_deref())
        .unwrap();
    assert!(email.contains('@'));
}

#[test]
fn realistic_data_can_be_disabled() {
    let config: GeneratorConfig = serde_json::from_value(json!({
        "generation_settings": { "deterministic_seed": 4 },
        "global_overrides": { "use_realistic_data": false }
    }))
    .unwrap();
    let result = GenerationEngine::new(GenerateOptions::default())
        .run(&contact_schema(), &config)
        .expect("run generation");

    let usage = &result.report.generator_usage;
    assert!(usage.keys().all(|id| id.starts_with("primitive.")));
    assert_eq!(usage.get("primitive.string"), Some(&2));
}

#[test]
fn registry_lists_every_generator() {
    let ids = GeneratorRegistry::default().ids();
    for expected in [
        "primitive.string",
        "primitive.integer",
        "primitive.pattern",
        "primitive.enumeration",
        "semantic.first_name",
        "semantic.email",
    ] {
        assert!(ids.contains(&expected), "missing {expected}");
    }
}
