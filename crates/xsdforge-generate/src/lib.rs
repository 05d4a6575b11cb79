//! Schema-constrained XML instance generation for xsdforge.
//!
//! This crate consumes a schema model plus a generator configuration and
//! produces one deterministic XML document per run. The walk is a single
//! depth-first pass; cross-field relationships are satisfied with bounded
//! local retries, never by backtracking.

pub mod builder;
pub mod checks;
pub mod context;
pub mod contexts;
pub mod document;
pub mod engine;
pub mod errors;
pub mod facets;
pub mod generators;
pub mod index;
pub mod model;
pub mod output;
pub mod relationships;
pub mod resolver;
pub mod selection;

pub use builder::{BuildOutcome, TreeBuilder};
pub use context::GenerationContext;
pub use contexts::DataContextResolver;
pub use document::{GeneratedAttribute, GeneratedDocument, GeneratedNode, NodeChild};
pub use engine::{GenerationEngine, GenerationResult};
pub use errors::GenerationError;
pub use model::{GenerateOptions, GenerationIssue, GenerationReport};
pub use output::xml::{XmlOptions, to_xml_string, write_document};
pub use relationships::SmartRelationshipEngine;
pub use resolver::{LeafRequest, ValueResolver};
pub use selection::SelectionState;
