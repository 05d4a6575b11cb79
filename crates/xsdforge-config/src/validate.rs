use std::collections::{BTreeMap, BTreeSet};

use jsonschema::JSONSchema;
use serde_json::Value;
use xsdforge_core::{ElementCatalog, SchemaModel};

use crate::compiled::{
    CompiledConfig, CompiledConstraint, CompiledElementConfig, CompiledRelationship,
    CompiledSettings, GenerationMode, RelationshipStrategy, SelectionStrategy, scalar_lexical,
};
use crate::errors::{ConfigError, IssueSeverity, ValidationIssue, ValidationReport};
use crate::expr::parse_constraint;
use crate::model::{ElementConfig, GeneratorConfig, SmartRelationshipDef};
use crate::schema::config_json_schema_value;

/// Raw document plus its compiled form.
#[derive(Debug, Clone)]
pub struct ValidatedConfig {
    pub config: GeneratorConfig,
    pub compiled: CompiledConfig,
}

/// Validate a configuration JSON document against the configuration JSON Schema.
pub fn validate_config_json(
    config_json: &Value,
    config_schema: &Value,
) -> Result<ValidationReport, ConfigError> {
    let compiled =
        JSONSchema::compile(config_schema).map_err(|err| ConfigError::Schema(err.to_string()))?;

    let mut report = ValidationReport::default();

    if let Err(errors) = compiled.validate(config_json) {
        for error in errors {
            let path = normalized_json_pointer(&error.instance_path.to_string());
            report.push_error(ValidationIssue::new(
                IssueSeverity::Error,
                "schema_violation",
                path,
                error.to_string(),
                None,
            ));
        }
    }

    Ok(report)
}

/// Structural and semantic validation of a configuration document, end-to-end.
pub fn validate_config_value(config_json: &Value) -> Result<ValidatedConfig, ValidationReport> {
    let structural = config_json_schema_value()
        .and_then(|config_schema| validate_config_json(config_json, &config_schema));
    let structural = match structural {
        Ok(report) => report,
        Err(err) => {
            let mut report = ValidationReport::default();
            report.push_error(ValidationIssue::error(
                "schema_validation_error",
                "/",
                err.to_string(),
            ));
            return Err(report);
        }
    };
    if !structural.is_ok() {
        return Err(structural);
    }

    let config: GeneratorConfig = match serde_json::from_value(config_json.clone()) {
        Ok(config) => config,
        Err(err) => {
            let mut report = ValidationReport::default();
            report.push_error(ValidationIssue::error("invalid_config_json", "/", err.to_string()));
            return Err(report);
        }
    };

    let compiled = validate_config(&config)?;
    Ok(ValidatedConfig { config, compiled })
}

/// Semantic validation; compiles names into closed enums and parses constraints.
///
/// Every problem is collected before returning so a single pass reports all
/// of them.
pub fn validate_config(config: &GeneratorConfig) -> Result<CompiledConfig, ValidationReport> {
    let mut report = ValidationReport::default();

    let settings = compile_settings(config, &mut report);
    validate_data_contexts(config, &mut report);

    let mut relationships = config
        .smart_relationships
        .iter()
        .filter_map(|(id, definition)| {
            compile_relationship(id, definition, config, &settings, &mut report)
        })
        .collect::<Vec<_>>();
    relationships.sort_by(|a, b| a.priority.cmp(&b.priority).then_with(|| a.id.cmp(&b.id)));

    let element_configs = config
        .element_configs
        .iter()
        .filter_map(|(key, element)| {
            compile_element_config(key, element, &relationships, &mut report)
        })
        .collect::<Vec<_>>();

    detect_dependency_cycles(&relationships, &mut report);
    let field_owners = assign_field_owners(&relationships, &element_configs);

    if !report.is_ok() {
        return Err(report);
    }

    Ok(CompiledConfig {
        metadata: config.metadata.clone(),
        settings,
        data_contexts: config.data_contexts.clone(),
        relationships,
        element_configs,
        overrides: config.global_overrides.clone(),
        field_owners,
        warnings: report.warnings,
    })
}

/// Cross-check a compiled configuration against the schema it will drive.
pub fn validate_config_against_schema(
    compiled: &CompiledConfig,
    schema: &SchemaModel,
) -> ValidationReport {
    let mut report = ValidationReport::default();

    let catalog = match ElementCatalog::build(schema) {
        Ok(catalog) => catalog,
        Err(err) => {
            report.push_error(ValidationIssue::error("invalid_schema", "/", err.to_string()));
            return report;
        }
    };

    if let Some(root) = compiled.metadata.root_element.as_deref()
        && schema.root_element(root).is_none()
    {
        report.push_error(
            ValidationIssue::error(
                "unknown_root_element",
                "/metadata/root_element",
                format!("root element '{root}' is not a global element of the schema"),
            )
            .with_hint(format!(
                "use one of: {}",
                schema
                    .elements
                    .iter()
                    .map(|node| node.name.as_str())
                    .collect::<Vec<_>>()
                    .join(", ")
            )),
        );
    }

    for element in &compiled.element_configs {
        let path = format!("/element_configs/{}", pointer_segment(&element.key));
        let matches = catalog.matching(&element.key).collect::<Vec<_>>();
        if matches.is_empty() {
            report.push_warning(
                ValidationIssue::warning(
                    "unmatched_element_config",
                    path,
                    format!("element config '{}' matches no schema element", element.key),
                )
                .with_hint("use an element name, '@attribute', or a path suffix like 'Parent/Child'"),
            );
            continue;
        }
        if element.repeat_count == Some(0) && matches.iter().any(|entry| entry.min_occurs > 0) {
            report.push_warning(ValidationIssue::warning(
                "zero_repeat_count_required",
                format!("{path}/repeat_count"),
                format!(
                    "repeat_count 0 on required element '{}'; minOccurs wins",
                    element.key
                ),
            ));
        }
    }

    for relationship in &compiled.relationships {
        for (idx, field) in relationship.fields.iter().enumerate() {
            let path = format!(
                "/smart_relationships/{}/fields/{idx}",
                pointer_segment(&relationship.id)
            );
            let matches = catalog.matching(field).collect::<Vec<_>>();
            if matches.is_empty() {
                report.push_error(ValidationIssue::error(
                    "unknown_relationship_field",
                    path,
                    format!(
                        "relationship '{}' field '{field}' matches no schema element",
                        relationship.id
                    ),
                ));
            } else if !matches.iter().any(|entry| entry.is_leaf()) {
                report.push_error(ValidationIssue::error(
                    "relationship_field_not_leaf",
                    path,
                    format!(
                        "relationship '{}' field '{field}' has complex content",
                        relationship.id
                    ),
                ));
            }
        }
    }

    report
}

fn compile_settings(config: &GeneratorConfig, report: &mut ValidationReport) -> CompiledSettings {
    let raw = &config.generation_settings;
    let mode = GenerationMode::from_name(&raw.mode).unwrap_or_else(|| {
        report.push_error(
            ValidationIssue::error(
                "unknown_mode",
                "/generation_settings/mode",
                format!("unknown generation mode '{}'", raw.mode),
            )
            .with_hint("use complete, minimalistic, or custom"),
        );
        GenerationMode::Complete
    });

    if raw.max_depth == 0 {
        report.push_error(ValidationIssue::error(
            "max_depth_zero",
            "/generation_settings/max_depth",
            "max_depth must be at least 1",
        ));
    }
    if raw.max_unbounded_count == 0 {
        report.push_warning(ValidationIssue::warning(
            "max_unbounded_count_zero",
            "/generation_settings/max_unbounded_count",
            "unbounded elements will only reach their minOccurs",
        ));
    }

    CompiledSettings {
        mode,
        global_repeat_count: raw.global_repeat_count,
        max_depth: raw.max_depth,
        include_comments: raw.include_comments,
        deterministic_seed: raw.deterministic_seed,
        ensure_unique_combinations: raw.ensure_unique_combinations,
        max_unbounded_count: raw.max_unbounded_count,
    }
}

fn validate_data_contexts(config: &GeneratorConfig, report: &mut ValidationReport) {
    let mut graph: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
    for (name, context) in &config.data_contexts {
        let parents = graph.entry(name.clone()).or_default();
        for (idx, parent) in context.inherits.iter().enumerate() {
            if !config.data_contexts.contains_key(parent) {
                report.push_error(ValidationIssue::error(
                    "unknown_parent_context",
                    format!("/data_contexts/{}/inherits/{idx}", pointer_segment(name)),
                    format!("data context '{name}' inherits unknown context '{parent}'"),
                ));
                continue;
            }
            parents.insert(parent.clone());
        }
    }

    if let Err(remaining) = toposort(&graph) {
        report.push_error(ValidationIssue::error(
            "data_context_cycle",
            "/data_contexts",
            format!("inheritance cycle among: {}", remaining.join(", ")),
        ));
    }
}

fn compile_relationship(
    id: &str,
    definition: &SmartRelationshipDef,
    config: &GeneratorConfig,
    settings: &CompiledSettings,
    report: &mut ValidationReport,
) -> Option<CompiledRelationship> {
    let base = format!("/smart_relationships/{}", pointer_segment(id));
    let errors_before = report.errors.len();

    if definition.fields.is_empty() {
        report.push_error(ValidationIssue::error(
            "relationship_without_fields",
            format!("{base}/fields"),
            format!("relationship '{id}' declares no fields"),
        ));
    }
    let mut seen = BTreeSet::new();
    for field in &definition.fields {
        if !seen.insert(field.as_str()) {
            report.push_error(ValidationIssue::error(
                "duplicate_relationship_field",
                format!("{base}/fields"),
                format!("relationship '{id}' lists field '{field}' twice"),
            ));
        }
    }

    let strategy = RelationshipStrategy::from_name(&definition.strategy);
    if strategy.is_none() {
        report.push_error(
            ValidationIssue::error(
                "unknown_relationship_strategy",
                format!("{base}/strategy"),
                format!("unknown relationship strategy '{}'", definition.strategy),
            )
            .with_hint("use consistent_persona, dependent_values, or constraint_based"),
        );
    }

    let selection = match definition.selection_strategy.as_deref() {
        Some(name) => compile_selection(name, &format!("{base}/selection_strategy"), report),
        None if strategy == Some(RelationshipStrategy::ConsistentPersona) => {
            Some(SelectionStrategy::Template)
        }
        None => Some(SelectionStrategy::Random),
    };

    if strategy == Some(RelationshipStrategy::ConsistentPersona) && definition.source.is_none() {
        report.push_error(
            ValidationIssue::error(
                "persona_without_source",
                format!("{base}/source"),
                format!("consistent_persona relationship '{id}' needs a source"),
            )
            .with_hint("point source at a data context list of records, e.g. 'people.travelers'"),
        );
    }

    let mut depends_on = Vec::new();
    let mut after_relationships = Vec::new();
    for (idx, dependency) in definition.depends_on.iter().enumerate() {
        match resolve_identifier(dependency, &definition.fields) {
            Ok(field) => depends_on.push(field),
            Err(_) if dependency != id && config.smart_relationships.contains_key(dependency) => {
                after_relationships.push(dependency.clone());
            }
            Err(message) => report.push_error(
                ValidationIssue::error(
                    "unknown_dependency",
                    format!("{base}/depends_on/{idx}"),
                    format!("depends_on '{dependency}': {message}"),
                )
                .with_hint("name a participant field or another relationship id"),
            ),
        }
    }

    let mut constraints = Vec::new();
    for (idx, source) in definition.constraints.iter().enumerate() {
        let path = format!("{base}/constraints/{idx}");
        let parsed = match parse_constraint(source) {
            Ok(expr) => expr,
            Err(err) => {
                report.push_error(ValidationIssue::error(
                    "invalid_constraint",
                    path,
                    format!("cannot parse '{source}': {err}"),
                ));
                continue;
            }
        };
        let resolved = parsed.try_map_fields(&mut |name: &str| {
            resolve_identifier(name, &definition.fields)
                .map_err(|message| format!("identifier '{name}': {message}"))
        });
        match resolved {
            Ok(expr) => {
                let fields = expr
                    .field_refs()
                    .into_iter()
                    .map(str::to_string)
                    .collect::<BTreeSet<_>>()
                    .into_iter()
                    .collect();
                constraints.push(CompiledConstraint {
                    source: source.clone(),
                    expr,
                    fields,
                });
            }
            Err(message) => report.push_error(ValidationIssue::error(
                "unresolved_constraint_field",
                path,
                format!("constraint '{source}' {message}"),
            )),
        }
    }

    for field in definition.field_map.keys() {
        if !definition.fields.contains(field) {
            report.push_error(ValidationIssue::error(
                "unknown_field_map_entry",
                format!("{base}/field_map/{}", pointer_segment(field)),
                format!("field_map key '{field}' is not a participant of '{id}'"),
            ));
        }
    }

    if definition.max_attempts == Some(0) {
        report.push_warning(ValidationIssue::warning(
            "max_attempts_zero",
            format!("{base}/max_attempts"),
            "max_attempts 0 disables constraint retries",
        ));
    }

    if report.errors.len() > errors_before {
        return None;
    }

    Some(CompiledRelationship {
        id: id.to_string(),
        strategy: strategy?,
        fields: definition.fields.clone(),
        depends_on,
        after_relationships,
        constraints,
        ensure_unique: definition
            .ensure_unique
            .unwrap_or(settings.ensure_unique_combinations),
        source: definition.source.clone(),
        selection: selection?,
        priority: definition.priority,
        field_map: definition.field_map.clone(),
        max_attempts: definition.max_attempts,
    })
}

fn compile_element_config(
    key: &str,
    element: &ElementConfig,
    relationships: &[CompiledRelationship],
    report: &mut ValidationReport,
) -> Option<CompiledElementConfig> {
    let base = format!("/element_configs/{}", pointer_segment(key));
    let errors_before = report.errors.len();

    let selection = element
        .selection_strategy
        .as_deref()
        .and_then(|name| compile_selection(name, &format!("{base}/selection_strategy"), report));

    let mut custom_values = Vec::with_capacity(element.custom_values.len());
    for (idx, value) in element.custom_values.iter().enumerate() {
        match scalar_lexical(value) {
            Some(lexical) => custom_values.push(lexical),
            None => report.push_error(ValidationIssue::error(
                "invalid_custom_value",
                format!("{base}/custom_values/{idx}"),
                "custom values must be strings, numbers, or booleans",
            )),
        }
    }

    if let Some(relationship_id) = element.relationship.as_deref() {
        let local_name = key.rsplit('/').next().unwrap_or(key);
        match relationships.iter().find(|r| r.id == relationship_id) {
            None => report.push_error(ValidationIssue::error(
                "unknown_relationship",
                format!("{base}/relationship"),
                format!("element '{key}' references unknown relationship '{relationship_id}'"),
            )),
            Some(relationship) if !relationship.has_field(local_name) => {
                report.push_error(ValidationIssue::error(
                    "relationship_field_mismatch",
                    format!("{base}/relationship"),
                    format!(
                        "element '{key}' is not a field of relationship '{relationship_id}'"
                    ),
                ))
            }
            Some(_) => {}
        }
    }

    if element.template_field.is_some() && element.template_source.is_none() {
        report.push_warning(ValidationIssue::warning(
            "template_field_without_source",
            format!("{base}/template_field"),
            "template_field has no effect without template_source",
        ));
    }

    if element.custom_values.is_empty()
        && element.data_context.is_some()
        && element.template_source.is_some()
    {
        report.push_warning(ValidationIssue::warning(
            "shadowed_template_source",
            format!("{base}/template_source"),
            "data_context takes precedence over template_source",
        ));
    }

    if report.errors.len() > errors_before {
        return None;
    }

    Some(CompiledElementConfig {
        key: key.to_string(),
        custom_values,
        data_context: element.data_context.clone(),
        selection,
        relationship: element.relationship.clone(),
        repeat_count: element.repeat_count,
        template_source: element.template_source.clone(),
        template_field: element.template_field.clone(),
        choice: element.choice.clone(),
        nil: element.nil.unwrap_or(false),
    })
}

fn compile_selection(
    name: &str,
    path: &str,
    report: &mut ValidationReport,
) -> Option<SelectionStrategy> {
    let selection = SelectionStrategy::from_name(name);
    if selection.is_none() {
        report.push_error(
            ValidationIssue::error(
                "unknown_selection_strategy",
                path,
                format!("unknown selection strategy '{name}'"),
            )
            .with_hint("use sequential, random, seeded, or template"),
        );
    }
    selection
}

/// Resolve an identifier to a participant: exact, case-insensitive, then
/// unique case-insensitive prefix.
fn resolve_identifier(name: &str, fields: &[String]) -> Result<String, String> {
    if let Some(field) = fields.iter().find(|field| *field == name) {
        return Ok(field.clone());
    }

    let lowered = name.to_lowercase();
    let pick_unique = |candidates: Vec<&String>, kind: &str| match candidates.as_slice() {
        [single] => Some(Ok((*single).clone())),
        [] => None,
        many => Some(Err(format!(
            "ambiguous {kind} match among {}",
            many.iter()
                .map(|field| field.as_str())
                .collect::<Vec<_>>()
                .join(", ")
        ))),
    };

    let insensitive = fields
        .iter()
        .filter(|field| field.to_lowercase() == lowered)
        .collect::<Vec<_>>();
    if let Some(result) = pick_unique(insensitive, "case-insensitive") {
        return result;
    }

    let prefixed = fields
        .iter()
        .filter(|field| field.to_lowercase().starts_with(&lowered))
        .collect::<Vec<_>>();
    if let Some(result) = pick_unique(prefixed, "prefix") {
        return result;
    }

    Err(format!("no participant field among {}", fields.join(", ")))
}

/// Field-level dependency graph across every relationship; edges point from
/// a dependency to the fields waiting on it.
fn detect_dependency_cycles(relationships: &[CompiledRelationship], report: &mut ValidationReport) {
    let mut graph: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();

    for relationship in relationships {
        for field in &relationship.fields {
            graph.entry(field.clone()).or_default();
        }
        // Stored as "node -> prerequisites" to reuse the same toposort.
        for dependent in relationship.dependents() {
            let prerequisites = graph.entry(dependent.to_string()).or_default();
            prerequisites.extend(relationship.depends_on.iter().cloned());
        }
        for other_id in &relationship.after_relationships {
            let Some(other) = relationships.iter().find(|r| &r.id == other_id) else {
                continue;
            };
            for field in &relationship.fields {
                let prerequisites = graph.entry(field.clone()).or_default();
                prerequisites.extend(other.fields.iter().filter(|f| *f != field).cloned());
            }
        }
    }

    if let Err(remaining) = toposort(&graph) {
        report.push_error(
            ValidationIssue::error(
                "relationship_dependency_cycle",
                "/smart_relationships",
                format!("depends_on cycle among fields: {}", remaining.join(", ")),
            )
            .with_hint("remove one depends_on edge so every field can be resolved in order"),
        );
    }
}

fn assign_field_owners(
    relationships: &[CompiledRelationship],
    element_configs: &[CompiledElementConfig],
) -> BTreeMap<String, String> {
    let mut owners = BTreeMap::new();

    for element in element_configs {
        let Some(relationship_id) = element.relationship.as_deref() else {
            continue;
        };
        let local_name = element.key.rsplit('/').next().unwrap_or(&element.key);
        owners
            .entry(local_name.to_string())
            .or_insert_with(|| relationship_id.to_string());
    }

    for relationship in relationships {
        for field in &relationship.fields {
            owners
                .entry(field.clone())
                .or_insert_with(|| relationship.id.clone());
        }
    }

    owners
}

/// Kahn's algorithm over "node -> prerequisites"; returns nodes stuck in
/// cycles on failure.
fn toposort(graph: &BTreeMap<String, BTreeSet<String>>) -> Result<Vec<String>, Vec<String>> {
    let mut remaining: BTreeMap<&str, usize> = BTreeMap::new();
    for (node, prerequisites) in graph {
        let known = prerequisites
            .iter()
            .filter(|p| graph.contains_key(*p) && *p != node)
            .count();
        remaining.insert(node.as_str(), known);
    }

    let mut ready: BTreeSet<&str> = remaining
        .iter()
        .filter_map(|(node, count)| (*count == 0).then_some(*node))
        .collect();
    let mut order = Vec::with_capacity(graph.len());

    while let Some(node) = ready.iter().next().copied() {
        ready.remove(node);
        order.push(node.to_string());

        for (dependent, prerequisites) in graph {
            if dependent != node
                && prerequisites.contains(node)
                && let Some(count) = remaining.get_mut(dependent.as_str())
            {
                *count = count.saturating_sub(1);
                if *count == 0 {
                    ready.insert(dependent.as_str());
                }
            }
        }
    }

    if order.len() == graph.len() {
        Ok(order)
    } else {
        Err(remaining
            .into_iter()
            .filter_map(|(node, count)| (count > 0).then(|| node.to_string()))
            .collect())
    }
}

fn pointer_segment(key: &str) -> String {
    key.replace('~', "~0").replace('/', "~1")
}

fn normalized_json_pointer(pointer: &str) -> String {
    if pointer.is_empty() {
        "/".to_string()
    } else {
        pointer.to_string()
    }
}
