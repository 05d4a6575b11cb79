use std::collections::HashSet;

use xsdforge_config::{CompiledConfig, GenerationMode};
use xsdforge_core::{CatalogEntry, ElementCatalog, SchemaModel};

/// Catalog lookups the walk needs, computed once per run.
#[derive(Debug, Clone)]
pub struct SchemaIndex {
    pub catalog: ElementCatalog,
    /// Participant leaves and their ancestors.
    relationship_paths: HashSet<String>,
    /// Configured entries and their ancestors.
    configured_paths: HashSet<String>,
}

impl SchemaIndex {
    pub fn new(schema: &SchemaModel, config: &CompiledConfig) -> xsdforge_core::Result<Self> {
        let catalog = ElementCatalog::build(schema)?;
        let mut relationship_paths = HashSet::new();
        let mut configured_paths = HashSet::new();

        for entry in &catalog.entries {
            if entry.is_leaf() && config.field_owners.keys().any(|field| entry.matches(field)) {
                insert_with_ancestors(&mut relationship_paths, &entry.path);
            }
            if config
                .element_configs
                .iter()
                .any(|element| entry.matches(&element.key))
            {
                insert_with_ancestors(&mut configured_paths, &entry.path);
            }
        }

        Ok(Self {
            catalog,
            relationship_paths,
            configured_paths,
        })
    }

    /// First leaf declaration a relationship field refers to.
    pub fn field_entry(&self, field: &str) -> Option<&CatalogEntry> {
        self.catalog
            .entries
            .iter()
            .find(|entry| entry.matches(field) && entry.is_leaf())
    }

    /// Whether mode policy must keep an optional item at this path.
    pub fn is_forced(&self, path: &str, mode: GenerationMode) -> bool {
        match mode {
            GenerationMode::Complete => true,
            GenerationMode::Minimalistic => self.relationship_paths.contains(path),
            GenerationMode::Custom => self.configured_paths.contains(path),
        }
    }
}

/// Relationship field a leaf participates in, if any.
pub fn participant_field<'c>(config: &'c CompiledConfig, name: &str, path: &str) -> Option<&'c str> {
    config
        .field_owners
        .keys()
        .find(|field| key_matches(field, name, path))
        .map(String::as_str)
}

/// Configuration key rule shared with catalog entries.
pub fn key_matches(key: &str, name: &str, path: &str) -> bool {
    if key.contains('/') {
        let key = key.trim_start_matches('/');
        path == key || path.ends_with(&format!("/{key}"))
    } else {
        key == name
    }
}

fn insert_with_ancestors(paths: &mut HashSet<String>, path: &str) {
    let mut current = path;
    loop {
        paths.insert(current.to_string());
        match current.rsplit_once('/') {
            Some((parent, _)) => current = parent,
            None => break,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ancestors_are_included() {
        let mut paths = HashSet::new();
        insert_with_ancestors(&mut paths, "A/B/@c");
        assert!(paths.contains("A/B/@c"));
        assert!(paths.contains("A/B"));
        assert!(paths.contains("A"));
        assert_eq!(paths.len(), 3);
    }

    #[test]
    fn keys_match_names_and_path_suffixes() {
        assert!(key_matches("City", "City", "Flight/Departure/City"));
        assert!(key_matches("Departure/City", "City", "Flight/Departure/City"));
        assert!(!key_matches("parture/City", "City", "Flight/Departure/City"));
        assert!(key_matches("@number", "@number", "Flight/@number"));
    }

    #[test]
    fn field_entry_skips_complex_declarations() {
        use xsdforge_config::{GeneratorConfig, validate_config};
        use xsdforge_core::{ContentModelGroup, Particle, SchemaNode};

        let schema = SchemaModel {
            schema_version: "0.1".to_string(),
            target_namespace: None,
            elements: vec![SchemaNode::complex(
                "Trip",
                ContentModelGroup::sequence(vec![
                    Particle::Element(SchemaNode::complex(
                        "City",
                        ContentModelGroup::sequence(vec![Particle::Element(SchemaNode::typed(
                            "Name",
                            "xs:string",
                        ))]),
                    )),
                    Particle::Element(SchemaNode::typed("Stop", "xs:string")),
                ]),
            )],
            types: Vec::new(),
        };
        let config = validate_config(&GeneratorConfig::default()).unwrap();
        let index = SchemaIndex::new(&schema, &config).unwrap();

        let key = String::from("Trip/Stop");
        let entry = index.field_entry(&key).map(|entry| entry.path.clone());
        drop(key);
        assert_eq!(entry.as_deref(), Some("Trip/Stop"));
        assert!(index.field_entry("City").is_none());
    }
}
