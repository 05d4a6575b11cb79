//! Core contracts and helpers for xsdforge.
//!
//! This crate defines the schema model handed over by the external XSD
//! parser, the validation pass that rejects malformed models, and the
//! named-type reference graph used to reason about recursion. The element
//! catalog flattens reachable declarations for name and path lookups.

pub mod catalog;
pub mod content;
pub mod error;
pub mod facets;
pub mod graph;
pub mod schema;
pub mod validation;

pub use catalog::{CatalogEntry, ElementCatalog, EntryKind};
pub use content::{ContentModelGroup, GroupKind, MaxOccurs, Particle, UnboundedKeyword};
pub use error::{Error, Result};
pub use facets::{PrimitiveType, SimpleTypeFacets};
pub use graph::{TypeGraphReport, TypeGraphSummary, build_type_graph_report};
pub use schema::{
    AttributeDecl, ResolvedType, SchemaModel, SchemaNode, TypeContent, TypeDefinition,
};
pub use validation::validate_schema;

/// Current contract version for serialized schema models.
pub const SCHEMA_VERSION: &str = "0.1";
