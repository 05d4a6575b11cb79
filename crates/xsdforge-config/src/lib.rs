//! Configuration contracts, loading, and validation for xsdforge.
//!
//! A configuration document steers generation: which optional structures
//! appear, which pools feed leaf values, and which cross-field relationships
//! must hold. Validation runs once, before any tree is built, and compiles
//! the free-form document into closed enums and parsed constraint
//! expressions.

pub mod compiled;
pub mod errors;
pub mod expr;
pub mod load;
pub mod model;
pub mod schema;
pub mod validate;

pub use compiled::{
    CompiledConfig, CompiledConstraint, CompiledElementConfig, CompiledRelationship,
    CompiledSettings, GenerationMode, RelationshipStrategy, SelectionStrategy, scalar_lexical,
};
pub use errors::{ConfigError, IssueSeverity, ValidationIssue, ValidationReport};
pub use expr::{BinaryOp, Expr, ExprError, Function, Literal, UnaryOp, parse_constraint};
pub use load::{ConfigFormat, load_config, load_config_value, parse_config_str};
pub use model::{
    DataContextDef, ElementConfig, GenerationSettings, GeneratorConfig, GlobalOverrides,
    Metadata, SmartRelationshipDef,
};
pub use schema::{config_json_schema, config_json_schema_value};
pub use validate::{
    ValidatedConfig, validate_config, validate_config_against_schema, validate_config_json,
    validate_config_value,
};

/// Current contract version for configuration documents.
pub const CONFIG_VERSION: &str = "0.1";
