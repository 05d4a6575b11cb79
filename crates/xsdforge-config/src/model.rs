use std::collections::BTreeMap;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Generator configuration document as authored.
///
/// Strategy and mode names stay free-form strings here; validation compiles
/// them into closed enums and rejects unknown names.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct GeneratorConfig {
    #[serde(default)]
    pub metadata: Metadata,
    #[serde(default)]
    pub generation_settings: GenerationSettings,
    /// Named pools of values, optionally inheriting from other contexts.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub data_contexts: BTreeMap<String, DataContextDef>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub smart_relationships: BTreeMap<String, SmartRelationshipDef>,
    /// Per-element settings keyed by element name, `@attribute`, or path suffix.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub element_configs: BTreeMap<String, ElementConfig>,
    #[serde(default)]
    pub global_overrides: GlobalOverrides,
}

/// Descriptive metadata.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct Metadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema_name: Option<String>,
    /// Global element used as the document root.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub root_element: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Document-wide generation knobs.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct GenerationSettings {
    /// `complete`, `minimalistic`, or `custom`.
    #[serde(default = "default_mode")]
    pub mode: String,
    #[serde(default = "default_repeat_count")]
    pub global_repeat_count: u32,
    #[serde(default = "default_max_depth")]
    pub max_depth: u32,
    #[serde(default)]
    pub include_comments: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deterministic_seed: Option<u64>,
    #[serde(default)]
    pub ensure_unique_combinations: bool,
    /// Ceiling applied to `maxOccurs="unbounded"`.
    #[serde(default = "default_max_unbounded_count")]
    pub max_unbounded_count: u32,
}

impl Default for GenerationSettings {
    fn default() -> Self {
        Self {
            mode: default_mode(),
            global_repeat_count: default_repeat_count(),
            max_depth: default_max_depth(),
            include_comments: false,
            deterministic_seed: None,
            ensure_unique_combinations: false,
            max_unbounded_count: default_max_unbounded_count(),
        }
    }
}

/// Named data context. Values are arrays (pools), scalars, or nested objects
/// reachable through dotted paths.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct DataContextDef {
    /// Contexts merged underneath this one, in order; later entries win.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub inherits: Vec<String>,
    #[serde(flatten)]
    pub values: BTreeMap<String, Value>,
}

/// Cross-field relationship declaration.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct SmartRelationshipDef {
    /// Participating element names.
    pub fields: Vec<String>,
    /// `consistent_persona`, `dependent_values`, or `constraint_based`.
    pub strategy: String,
    /// Fields (or other relationship ids) resolved before the rest.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub depends_on: Vec<String>,
    /// Boolean expressions over participant fields.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub constraints: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ensure_unique: Option<bool>,
    /// Data context path holding persona records.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selection_strategy: Option<String>,
    /// Lower values own shared fields first.
    #[serde(default)]
    pub priority: i32,
    /// Participant field to record key, when they differ.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub field_map: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_attempts: Option<u32>,
}

/// Per-element overrides.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct ElementConfig {
    /// Literal scalar values to choose from.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub custom_values: Vec<Value>,
    /// Dotted data context path, e.g. `airports.cities`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_context: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selection_strategy: Option<String>,
    /// Relationship that owns this element's value.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub relationship: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repeat_count: Option<u32>,
    /// Data context path of records read column-wise by `template` selection.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub template_source: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub template_field: Option<String>,
    /// Forced branch for a choice group under this element.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub choice: Option<String>,
    /// Emit `xsi:nil="true"` for nillable elements.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nil: Option<bool>,
}

/// Switches applied across the whole document.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct GlobalOverrides {
    /// Use name-based realistic generators for unconstrained text.
    #[serde(default = "default_true")]
    pub use_realistic_data: bool,
    /// Prefix to namespace URI.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub namespace_prefixes: BTreeMap<String, String>,
    /// Retry relationship constraints instead of only reporting them.
    #[serde(default = "default_true")]
    pub enforce_constraints: bool,
}

impl Default for GlobalOverrides {
    fn default() -> Self {
        Self {
            use_realistic_data: true,
            namespace_prefixes: BTreeMap::new(),
            enforce_constraints: true,
        }
    }
}

fn default_mode() -> String {
    "complete".to_string()
}

fn default_repeat_count() -> u32 {
    2
}

fn default_max_depth() -> u32 {
    5
}

fn default_max_unbounded_count() -> u32 {
    10
}

fn default_true() -> bool {
    true
}
