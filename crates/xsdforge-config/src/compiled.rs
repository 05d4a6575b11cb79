use std::collections::BTreeMap;

use serde::Serialize;
use serde_json::Value;

use crate::errors::ValidationIssue;
use crate::expr::Expr;
use crate::model::{DataContextDef, GlobalOverrides, Metadata};

/// Structural presence policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum GenerationMode {
    /// Every optional structure is included.
    Complete,
    /// Optional structures appear only when forced by a relationship.
    Minimalistic,
    /// Optional structures appear only when configured.
    Custom,
}

impl GenerationMode {
    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "complete" => Some(GenerationMode::Complete),
            "minimalistic" | "minimal" => Some(GenerationMode::Minimalistic),
            "custom" => Some(GenerationMode::Custom),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            GenerationMode::Complete => "complete",
            GenerationMode::Minimalistic => "minimalistic",
            GenerationMode::Custom => "custom",
        }
    }
}

/// How a value is drawn from a candidate pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SelectionStrategy {
    Sequential,
    Random,
    Seeded,
    Template,
}

impl SelectionStrategy {
    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "sequential" => Some(SelectionStrategy::Sequential),
            "random" => Some(SelectionStrategy::Random),
            "seeded" => Some(SelectionStrategy::Seeded),
            "template" => Some(SelectionStrategy::Template),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SelectionStrategy::Sequential => "sequential",
            SelectionStrategy::Random => "random",
            SelectionStrategy::Seeded => "seeded",
            SelectionStrategy::Template => "template",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RelationshipStrategy {
    ConsistentPersona,
    DependentValues,
    ConstraintBased,
}

impl RelationshipStrategy {
    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "consistent_persona" => Some(RelationshipStrategy::ConsistentPersona),
            "dependent_values" => Some(RelationshipStrategy::DependentValues),
            "constraint_based" => Some(RelationshipStrategy::ConstraintBased),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RelationshipStrategy::ConsistentPersona => "consistent_persona",
            RelationshipStrategy::DependentValues => "dependent_values",
            RelationshipStrategy::ConstraintBased => "constraint_based",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CompiledSettings {
    pub mode: GenerationMode,
    pub global_repeat_count: u32,
    pub max_depth: u32,
    pub include_comments: bool,
    pub deterministic_seed: Option<u64>,
    pub ensure_unique_combinations: bool,
    pub max_unbounded_count: u32,
}

#[derive(Debug, Clone, Serialize)]
pub struct CompiledElementConfig {
    /// Key as written: element name, `@attribute`, or path suffix.
    pub key: String,
    /// Custom values rendered to their lexical form.
    pub custom_values: Vec<String>,
    pub data_context: Option<String>,
    pub selection: Option<SelectionStrategy>,
    pub relationship: Option<String>,
    pub repeat_count: Option<u32>,
    pub template_source: Option<String>,
    pub template_field: Option<String>,
    pub choice: Option<String>,
    pub nil: bool,
}

impl CompiledElementConfig {
    /// Same matching rule as catalog entries: path suffix or local name.
    pub fn matches(&self, name: &str, path: &str) -> bool {
        if self.key.contains('/') {
            let key = self.key.trim_start_matches('/');
            path == key || path.ends_with(&format!("/{key}"))
        } else {
            self.key == name
        }
    }

    /// Keys naming a path are more specific than bare names.
    pub fn specificity(&self) -> usize {
        self.key.matches('/').count()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CompiledConstraint {
    pub source: String,
    #[serde(skip)]
    pub expr: Expr,
    /// Participant fields the expression reads.
    pub fields: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CompiledRelationship {
    pub id: String,
    pub strategy: RelationshipStrategy,
    pub fields: Vec<String>,
    /// Participant fields resolved before the rest.
    pub depends_on: Vec<String>,
    /// Other relationships this one orders after.
    pub after_relationships: Vec<String>,
    pub constraints: Vec<CompiledConstraint>,
    pub ensure_unique: bool,
    pub source: Option<String>,
    pub selection: SelectionStrategy,
    pub priority: i32,
    pub field_map: BTreeMap<String, String>,
    pub max_attempts: Option<u32>,
}

impl CompiledRelationship {
    pub fn has_field(&self, name: &str) -> bool {
        self.fields.iter().any(|field| field == name)
    }

    /// Record key carrying a field's value inside a persona record.
    pub fn record_key<'a>(&'a self, field: &'a str) -> &'a str {
        self.field_map.get(field).map(String::as_str).unwrap_or(field)
    }

    /// Participants that depend on the `depends_on` set.
    pub fn dependents(&self) -> impl Iterator<Item = &str> {
        self.fields
            .iter()
            .filter(|field| !self.depends_on.contains(field))
            .map(String::as_str)
    }
}

/// Validated configuration with closed enums and parsed constraints.
#[derive(Debug, Clone, Serialize)]
pub struct CompiledConfig {
    pub metadata: Metadata,
    pub settings: CompiledSettings,
    pub data_contexts: BTreeMap<String, DataContextDef>,
    /// Relationships in precedence order (priority, then id).
    pub relationships: Vec<CompiledRelationship>,
    pub element_configs: Vec<CompiledElementConfig>,
    pub overrides: GlobalOverrides,
    /// Participant field to owning relationship id.
    pub field_owners: BTreeMap<String, String>,
    #[serde(skip)]
    pub warnings: Vec<ValidationIssue>,
}

impl CompiledConfig {
    pub fn relationship(&self, id: &str) -> Option<&CompiledRelationship> {
        self.relationships.iter().find(|relationship| relationship.id == id)
    }

    /// Most specific element config for an element, if any.
    pub fn element_config(&self, name: &str, path: &str) -> Option<&CompiledElementConfig> {
        self.element_configs
            .iter()
            .filter(|config| config.matches(name, path))
            .max_by_key(|config| config.specificity())
    }

    pub fn owner_of(&self, field: &str) -> Option<&CompiledRelationship> {
        self.field_owners
            .get(field)
            .and_then(|id| self.relationship(id))
    }

    pub fn is_participant(&self, field: &str) -> bool {
        self.field_owners.contains_key(field)
    }
}

/// Lexical form of a scalar JSON value; `None` for null, arrays and objects.
pub fn scalar_lexical(value: &Value) -> Option<String> {
    match value {
        Value::String(text) => Some(text.clone()),
        Value::Number(number) => Some(number.to_string()),
        Value::Bool(flag) => Some(flag.to_string()),
        Value::Null | Value::Array(_) | Value::Object(_) => None,
    }
}
