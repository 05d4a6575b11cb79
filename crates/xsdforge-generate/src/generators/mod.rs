use std::collections::BTreeMap;

use chrono::NaiveDate;
use rand::RngCore;
use xsdforge_core::{PrimitiveType, SimpleTypeFacets};

use crate::errors::GenerationError;

pub mod primitives;
pub mod semantic;

/// Inputs available to a type generator for one leaf.
pub struct GeneratorContext<'a> {
    /// Local element name, or `@name` for attributes.
    pub name: &'a str,
    pub path: &'a str,
    pub facets: &'a SimpleTypeFacets,
    pub base_date: NaiveDate,
}

/// Produces a lexical value for a simple type.
pub trait TypeGenerator: Send + Sync {
    fn id(&self) -> &'static str;

    fn generate(
        &self,
        ctx: &GeneratorContext<'_>,
        rng: &mut dyn RngCore,
    ) -> Result<String, GenerationError>;
}

/// Generators keyed by id.
pub struct GeneratorRegistry {
    generators: BTreeMap<&'static str, Box<dyn TypeGenerator>>,
}

impl std::fmt::Debug for GeneratorRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeneratorRegistry")
            .field("ids", &self.ids())
            .finish()
    }
}

impl Default for GeneratorRegistry {
    fn default() -> Self {
        let mut registry = Self {
            generators: BTreeMap::new(),
        };
        primitives::register(&mut registry);
        semantic::register(&mut registry);
        registry
    }
}

impl GeneratorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_generator(&mut self, generator: Box<dyn TypeGenerator>) {
        self.generators.insert(generator.id(), generator);
    }

    pub fn get(&self, id: &str) -> Option<&dyn TypeGenerator> {
        self.generators.get(id).map(|generator| generator.as_ref())
    }

    pub fn ids(&self) -> Vec<&'static str> {
        self.generators.keys().copied().collect()
    }

    /// Generator honoring the facets alone, ignoring the element name.
    pub fn primitive_for(&self, facets: &SimpleTypeFacets) -> Result<&dyn TypeGenerator, GenerationError> {
        let id = primitive_id(facets);
        self.get(id).ok_or_else(|| {
            GenerationError::configuration(format!("no generator registered for '{id}'"))
        })
    }

    /// Name-heuristic generator, when the leaf is free text.
    pub fn semantic_for(&self, name: &str, facets: &SimpleTypeFacets) -> Option<&dyn TypeGenerator> {
        if !facets.base.is_textual() || !facets.enumeration.is_empty() || facets.pattern.is_some() {
            return None;
        }
        semantic::semantic_id(name).and_then(|id| self.get(id))
    }
}

/// Registry id of the primitive generator for a simple type.
pub fn primitive_id(facets: &SimpleTypeFacets) -> &'static str {
    if !facets.enumeration.is_empty() {
        return "primitive.enumeration";
    }
    if facets.pattern.is_some() {
        return "primitive.pattern";
    }
    match facets.base {
        PrimitiveType::Boolean => "primitive.boolean",
        PrimitiveType::Decimal => "primitive.decimal",
        PrimitiveType::Float | PrimitiveType::Double => "primitive.float",
        PrimitiveType::Date => "primitive.date",
        PrimitiveType::DateTime => "primitive.datetime",
        PrimitiveType::Time => "primitive.time",
        PrimitiveType::GYear => "primitive.gyear",
        PrimitiveType::GYearMonth => "primitive.gyearmonth",
        PrimitiveType::Duration => "primitive.duration",
        PrimitiveType::AnyUri => "primitive.uri",
        PrimitiveType::Language => "primitive.language",
        PrimitiveType::QName => "primitive.qname",
        PrimitiveType::Id
        | PrimitiveType::IdRef
        | PrimitiveType::NcName
        | PrimitiveType::Name
        | PrimitiveType::NmToken => "primitive.ncname",
        PrimitiveType::Base64Binary => "primitive.base64",
        PrimitiveType::HexBinary => "primitive.hex",
        PrimitiveType::String | PrimitiveType::NormalizedString | PrimitiveType::Token => {
            "primitive.string"
        }
        integer if integer.is_integer() => "primitive.integer",
        _ => "primitive.string",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn picks_enumeration_and_pattern_first() {
        let mut facets = SimpleTypeFacets::new(PrimitiveType::Int);
        assert_eq!(primitive_id(&facets), "primitive.integer");
        facets.pattern = Some("[0-9]{3}".to_string());
        assert_eq!(primitive_id(&facets), "primitive.pattern");
        facets.enumeration = vec!["100".to_string()];
        assert_eq!(primitive_id(&facets), "primitive.enumeration");
    }

    #[test]
    fn every_primitive_id_is_registered() {
        let registry = GeneratorRegistry::new();
        for name in [
            "xs:string", "xs:int", "xs:decimal", "xs:double", "xs:boolean", "xs:date",
            "xs:dateTime", "xs:time", "xs:gYear", "xs:gYearMonth", "xs:duration", "xs:anyURI",
            "xs:language", "xs:QName", "xs:ID", "xs:NMTOKEN", "xs:base64Binary", "xs:hexBinary",
            "xs:unsignedByte",
        ] {
            let primitive = PrimitiveType::from_type_name(name).unwrap();
            let facets = SimpleTypeFacets::new(primitive);
            assert!(registry.primitive_for(&facets).is_ok(), "{name}");
        }
    }

    #[test]
    fn semantic_only_for_free_text() {
        let registry = GeneratorRegistry::new();
        let text = SimpleTypeFacets::new(PrimitiveType::String);
        assert!(registry.semantic_for("FirstName", &text).is_some());
        assert!(registry.semantic_for("Widget", &text).is_none());

        let mut constrained = text.clone();
        constrained.pattern = Some("[A-Z]+".to_string());
        assert!(registry.semantic_for("FirstName", &constrained).is_none());
        let number = SimpleTypeFacets::new(PrimitiveType::Int);
        assert!(registry.semantic_for("FirstName", &number).is_none());
    }
}
