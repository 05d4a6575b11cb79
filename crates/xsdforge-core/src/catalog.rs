use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::content::{ContentModelGroup, Particle};
use crate::error::Result;
use crate::facets::{PrimitiveType, SimpleTypeFacets};
use crate::schema::{AttributeDecl, SchemaModel, SchemaNode, TypeContent};

/// Declaration kind behind a catalog entry.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum EntryKind {
    Element,
    Attribute,
}

/// One reachable element or attribute declaration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogEntry {
    pub kind: EntryKind,
    /// Local name; attributes carry a leading `@`.
    pub name: String,
    /// Slash-separated path from the global element, e.g. `Flight/Departure/City`.
    pub path: String,
    /// Simple content facets when the entry holds a leaf value.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub facets: Option<SimpleTypeFacets>,
    /// Named type identity, when the declaration references one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub type_name: Option<String>,
    /// Declared lower bound; required attributes count as 1.
    pub min_occurs: u32,
}

impl CatalogEntry {
    pub fn is_leaf(&self) -> bool {
        self.facets.is_some()
    }

    /// Match a configuration key against this entry.
    ///
    /// Keys with a `/` match a path suffix on segment boundaries; plain keys
    /// match the local name.
    pub fn matches(&self, key: &str) -> bool {
        if key.contains('/') {
            let key = key.trim_start_matches('/');
            self.path == key || self.path.ends_with(&format!("/{key}"))
        } else {
            self.name == key
        }
    }
}

/// Flat listing of every declaration reachable from the global elements.
///
/// Recursive named types are expanded once per path; the re-entry point is
/// listed but not descended into.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ElementCatalog {
    pub entries: Vec<CatalogEntry>,
}

impl ElementCatalog {
    pub fn build(schema: &SchemaModel) -> Result<Self> {
        let mut catalog = Self::default();
        for node in &schema.elements {
            let mut active = Vec::new();
            catalog.walk_node(schema, node, "", &mut active)?;
        }
        Ok(catalog)
    }

    pub fn matching<'a>(&'a self, key: &'a str) -> impl Iterator<Item = &'a CatalogEntry> + 'a {
        self.entries.iter().filter(move |entry| entry.matches(key))
    }

    pub fn contains(&self, key: &str) -> bool {
        self.matching(key).next().is_some()
    }

    pub fn leaf_names(&self) -> BTreeSet<&str> {
        self.entries
            .iter()
            .filter(|entry| entry.is_leaf())
            .map(|entry| entry.name.as_str())
            .collect()
    }

    fn walk_node<'a>(
        &mut self,
        schema: &'a SchemaModel,
        node: &'a SchemaNode,
        parent: &str,
        active: &mut Vec<&'a str>,
    ) -> Result<()> {
        let path = if parent.is_empty() {
            node.name.clone()
        } else {
            format!("{parent}/{}", node.name)
        };
        let resolved = schema.resolve_type(node)?;
        let facets = match resolved.content {
            TypeContent::Builtin(primitive) => Some(SimpleTypeFacets::new(primitive)),
            TypeContent::Simple(facets) => Some(facets.clone()),
            TypeContent::Complex(_) | TypeContent::Empty => None,
        };
        self.entries.push(CatalogEntry {
            kind: EntryKind::Element,
            name: node.name.clone(),
            path: path.clone(),
            facets,
            type_name: resolved.identity.map(str::to_string),
            min_occurs: node.min_occurs,
        });

        for attribute in &resolved.attributes {
            self.push_attribute(schema, attribute, &path)?;
        }

        if let Some(identity) = resolved.identity
            && active.contains(&identity)
        {
            return Ok(());
        }

        if let TypeContent::Complex(group) = resolved.content {
            if let Some(identity) = resolved.identity {
                active.push(identity);
            }
            self.walk_group(schema, group, &path, active)?;
            if resolved.identity.is_some() {
                active.pop();
            }
        }
        Ok(())
    }

    fn walk_group<'a>(
        &mut self,
        schema: &'a SchemaModel,
        group: &'a ContentModelGroup,
        path: &str,
        active: &mut Vec<&'a str>,
    ) -> Result<()> {
        for member in &group.members {
            match member {
                Particle::Element(child) => self.walk_node(schema, child, path, active)?,
                Particle::Group(nested) => self.walk_group(schema, nested, path, active)?,
            }
        }
        Ok(())
    }

    fn push_attribute(
        &mut self,
        schema: &SchemaModel,
        attribute: &AttributeDecl,
        owner: &str,
    ) -> Result<()> {
        let facets = schema.resolve_attribute_facets(attribute)?;
        let type_name = attribute
            .type_ref
            .as_deref()
            .filter(|type_ref| PrimitiveType::from_type_name(type_ref).is_none())
            .map(str::to_string);
        self.entries.push(CatalogEntry {
            kind: EntryKind::Attribute,
            name: format!("@{}", attribute.name),
            path: format!("{owner}/@{}", attribute.name),
            facets: Some(facets),
            type_name,
            min_occurs: u32::from(attribute.required),
        });
        Ok(())
    }
}
