use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Options for the generation engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerateOptions {
    /// Re-picks or re-generations per leaf before settling for best effort.
    pub max_value_attempts: u32,
    /// Constraint retries per relationship instance when the config sets none.
    pub max_relationship_attempts: u32,
    /// Tighter depth limit for a type nested directly inside itself.
    pub circular_reference_limit: Option<u32>,
    /// Recursive build calls allowed per run.
    pub max_steps: u64,
    pub timeout_ms: Option<u64>,
    /// Return the completed part of the tree on timeout instead of failing.
    pub allow_partial: bool,
    /// Anchor for generated temporal values.
    pub base_date: NaiveDate,
    /// Overrides `metadata.root_element`.
    pub root_element: Option<String>,
    /// Overrides `generation_settings.deterministic_seed`.
    pub seed: Option<u64>,
    /// Overrides `generation_settings.mode`.
    pub mode: Option<String>,
    /// Run id to report under; a fresh v4 uuid when unset.
    pub run_id: Option<String>,
}

impl Default for GenerateOptions {
    fn default() -> Self {
        Self {
            max_value_attempts: 5,
            max_relationship_attempts: 10,
            circular_reference_limit: None,
            max_steps: 1_000_000,
            timeout_ms: None,
            allow_partial: false,
            base_date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap_or_default(),
            root_element: None,
            seed: None,
            mode: None,
            run_id: None,
        }
    }
}

/// Structured generation issue.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationIssue {
    pub level: String,
    pub code: String,
    pub message: String,
    pub path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub relationship: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub generator_id: Option<String>,
}

impl GenerationIssue {
    pub fn warning(code: &str, message: impl Into<String>, path: Option<&str>) -> Self {
        Self {
            level: "warning".to_string(),
            code: code.to_string(),
            message: message.into(),
            path: path.map(str::to_string),
            relationship: None,
            generator_id: None,
        }
    }

    pub fn info(code: &str, message: impl Into<String>, path: Option<&str>) -> Self {
        Self {
            level: "info".to_string(),
            ..Self::warning(code, message, path)
        }
    }

    pub fn with_relationship(mut self, relationship: &str) -> Self {
        self.relationship = Some(relationship.to_string());
        self
    }

    pub fn with_generator(mut self, generator_id: &str) -> Self {
        self.generator_id = Some(generator_id.to_string());
        self
    }
}

/// Report for a generation run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationReport {
    pub run_id: String,
    pub root_element: Option<String>,
    pub seed: u64,
    pub mode: String,
    /// Set when a timeout cut the walk short and the partial tree was kept.
    pub partial: bool,
    pub elements_generated: u64,
    pub attributes_generated: u64,
    pub values_generated: u64,
    pub steps: u64,
    pub retries_total: u64,
    pub fallback_count: u64,
    pub truncation_count: u64,
    pub omitted_optional: u64,
    pub duration_ms: u64,
    pub value_source_usage: BTreeMap<String, u64>,
    pub generator_usage: BTreeMap<String, u64>,
    pub relationship_usage: BTreeMap<String, u64>,
    pub warnings_by_code: BTreeMap<String, u64>,
    pub warnings: Vec<GenerationIssue>,
    pub truncations: Vec<GenerationIssue>,
}

impl GenerationReport {
    pub fn new(run_id: String) -> Self {
        Self {
            run_id,
            root_element: None,
            seed: 0,
            mode: String::new(),
            partial: false,
            elements_generated: 0,
            attributes_generated: 0,
            values_generated: 0,
            steps: 0,
            retries_total: 0,
            fallback_count: 0,
            truncation_count: 0,
            omitted_optional: 0,
            duration_ms: 0,
            value_source_usage: BTreeMap::new(),
            generator_usage: BTreeMap::new(),
            relationship_usage: BTreeMap::new(),
            warnings_by_code: BTreeMap::new(),
            warnings: Vec::new(),
            truncations: Vec::new(),
        }
    }

    pub fn record_value_source(&mut self, source: &str) {
        self.values_generated += 1;
        *self.value_source_usage.entry(source.to_string()).or_insert(0) += 1;
    }

    pub fn record_generator_usage(&mut self, id: &str) {
        *self.generator_usage.entry(id.to_string()).or_insert(0) += 1;
    }

    pub fn record_relationship_usage(&mut self, id: &str) {
        *self.relationship_usage.entry(id.to_string()).or_insert(0) += 1;
    }

    pub fn record_retry(&mut self) {
        self.retries_total += 1;
    }

    pub fn record_fallback(&mut self) {
        self.fallback_count += 1;
    }

    pub fn record_warning(&mut self, issue: GenerationIssue) {
        *self.warnings_by_code.entry(issue.code.clone()).or_insert(0) += 1;
        self.warnings.push(issue);
    }

    pub fn record_truncation(&mut self, issue: GenerationIssue) {
        self.truncation_count += 1;
        self.truncations.push(issue);
    }

    /// Number of warnings recorded under a code.
    pub fn warning_count(&self, code: &str) -> u64 {
        self.warnings_by_code.get(code).copied().unwrap_or(0)
    }
}
