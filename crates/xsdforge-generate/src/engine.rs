use std::any::Any;
use std::time::Instant;

use tracing::{debug, info, warn};
use xsdforge_config::{
    CompiledConfig, GeneratorConfig, ValidationIssue, ValidationReport, validate_config,
    validate_config_against_schema,
};
use xsdforge_core::{SchemaModel, SchemaNode, build_type_graph_report, validate_schema};

use crate::builder::TreeBuilder;
use crate::context::GenerationContext;
use crate::contexts::DataContextResolver;
use crate::document::GeneratedDocument;
use crate::errors::GenerationError;
use crate::generators::GeneratorRegistry;
use crate::index::SchemaIndex;
use crate::model::{GenerateOptions, GenerationIssue, GenerationReport};
use crate::resolver::ValueResolver;

/// Result of a generation run.
#[derive(Debug, Clone)]
pub struct GenerationResult {
    pub document: GeneratedDocument,
    pub report: GenerationReport,
    /// Compiled configuration the run was driven by.
    pub config: CompiledConfig,
}

/// Entry point for generating XML instances from schema + config.
///
/// The engine holds only options; every run builds its own context, so one
/// engine can serve concurrent runs.
#[derive(Debug, Clone)]
pub struct GenerationEngine {
    options: GenerateOptions,
}

impl GenerationEngine {
    pub fn new(options: GenerateOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &GenerateOptions {
        &self.options
    }

    pub fn run(
        &self,
        schema: &SchemaModel,
        config: &GeneratorConfig,
    ) -> Result<GenerationResult, GenerationError> {
        let start = Instant::now();
        let run_id = self
            .options
            .run_id
            .clone()
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

        validate_schema(schema)?;
        let compiled = self.compile(schema, config)?;
        let contexts = DataContextResolver::new(&compiled.data_contexts)?;
        preflight(&compiled, &contexts)?;

        let index = SchemaIndex::new(schema, &compiled)?;
        let generators = GeneratorRegistry::default();
        let root = select_root(schema, &compiled, &self.options)?;
        let seed = compiled
            .settings
            .deterministic_seed
            .unwrap_or_else(rand::random);

        let mut report = GenerationReport::new(run_id.clone());
        report.root_element = Some(root.name.clone());
        report.seed = seed;
        report.mode = compiled.settings.mode.as_str().to_string();
        for issue in &compiled.warnings {
            report.record_warning(config_warning(issue));
        }

        let graph = build_type_graph_report(schema);
        info!(
            run_id = %run_id,
            root = %root.name,
            seed,
            mode = compiled.settings.mode.as_str(),
            max_depth = compiled.settings.max_depth,
            relationships = compiled.relationships.len(),
            "generation started"
        );
        debug!(
            types = graph.summary.nodes,
            references = graph.summary.edges,
            recursive = ?graph.recursive_types,
            "type graph"
        );

        let mut ctx = GenerationContext::new(seed, &self.options, report);
        let resolver = ValueResolver::new(&compiled, &index, &contexts, &generators, &self.options);
        let builder = TreeBuilder::new(schema, &compiled, &index, resolver, &self.options);

        let outcome = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            builder.build_document(&mut ctx, root)
        }));

        let mut report = ctx.report;
        report.duration_ms = start.elapsed().as_millis() as u64;

        match outcome {
            Ok(Ok(document)) => {
                info!(
                    run_id = %run_id,
                    elements = report.elements_generated,
                    values = report.values_generated,
                    warnings = report.warnings.len(),
                    truncations = report.truncation_count,
                    partial = report.partial,
                    duration_ms = report.duration_ms,
                    "generation completed"
                );
                Ok(GenerationResult {
                    document,
                    report,
                    config: compiled,
                })
            }
            Ok(Err(err)) => {
                warn!(run_id = %run_id, error = %err, "generation failed");
                Err(err)
            }
            Err(panic) => {
                record_generation_failure(&mut report, panic_message(panic));
                warn!(run_id = %run_id, "generation panicked");
                Err(GenerationError::Failed(report))
            }
        }
    }

    /// Apply option overrides, then compile and cross-check the config.
    fn compile(
        &self,
        schema: &SchemaModel,
        config: &GeneratorConfig,
    ) -> Result<CompiledConfig, GenerationError> {
        let mut config = config.clone();
        if let Some(seed) = self.options.seed {
            config.generation_settings.deterministic_seed = Some(seed);
        }
        if let Some(mode) = &self.options.mode {
            config.generation_settings.mode = mode.clone();
        }

        let compiled = validate_config(&config).map_err(configuration_error)?;
        let mut against = validate_config_against_schema(&compiled, schema);
        if !against.is_ok() {
            return Err(configuration_error(against));
        }

        let mut compiled = compiled;
        compiled.warnings.append(&mut against.warnings);
        Ok(compiled)
    }
}

/// Resolve every configured data context reference before the walk.
fn preflight(config: &CompiledConfig, contexts: &DataContextResolver) -> Result<(), GenerationError> {
    for element in &config.element_configs {
        if let Some(path) = element.data_context.as_deref() {
            contexts.resolve(path)?;
        }
        if let Some(path) = element.template_source.as_deref() {
            contexts.resolve_records(path)?;
        }
    }
    for relationship in &config.relationships {
        if let Some(path) = relationship.source.as_deref() {
            contexts.resolve_records(path)?;
        }
    }
    Ok(())
}

/// Root element: option override, then `metadata.root_element`, then the
/// first global element.
fn select_root<'s>(
    schema: &'s SchemaModel,
    config: &CompiledConfig,
    options: &GenerateOptions,
) -> Result<&'s SchemaNode, GenerationError> {
    let requested = options
        .root_element
        .as_deref()
        .or(config.metadata.root_element.as_deref());
    match requested {
        Some(name) => schema.root_element(name).ok_or_else(|| {
            GenerationError::schema(format!("root element '{name}' is not a global element"))
        }),
        None => schema
            .elements
            .first()
            .ok_or_else(|| GenerationError::schema("schema declares no global elements")),
    }
}

fn configuration_error(report: ValidationReport) -> GenerationError {
    GenerationError::Configuration {
        message: report.summary(),
        issues: report.errors,
    }
}

fn config_warning(issue: &ValidationIssue) -> GenerationIssue {
    GenerationIssue::warning(&issue.code, issue.message.clone(), Some(&issue.path))
}

fn record_generation_failure(report: &mut GenerationReport, message: String) {
    let issue = GenerationIssue {
        level: "error".to_string(),
        ..GenerationIssue::warning("generation_failed", message, None)
    };
    report.record_warning(issue);
}

fn panic_message(panic: Box<dyn Any + Send>) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "panic during generation".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use xsdforge_core::{ContentModelGroup, Particle};

    fn schema() -> SchemaModel {
        SchemaModel {
            schema_version: "0.1".to_string(),
            target_namespace: None,
            elements: vec![
                SchemaNode::complex(
                    "Order",
                    ContentModelGroup::sequence(vec![Particle::Element(SchemaNode::typed(
                        "Id",
                        "xs:int",
                    ))]),
                ),
                SchemaNode::typed("Note", "xs:string"),
            ],
            types: Vec::new(),
        }
    }

    #[test]
    fn engine_is_sync() {
        fn assert_sync<T: Sync + Send>() {}
        assert_sync::<GenerationEngine>();
    }

    #[test]
    fn root_defaults_to_first_global_element() {
        let schema = schema();
        let config = validate_config(&GeneratorConfig::default()).unwrap();
        let root = select_root(&schema, &config, &GenerateOptions::default()).unwrap();
        assert_eq!(root.name, "Order");
    }

    #[test]
    fn option_root_overrides_metadata() {
        let schema = schema();
        let mut raw = GeneratorConfig::default();
        raw.metadata.root_element = Some("Order".to_string());
        let config = validate_config(&raw).unwrap();
        let options = GenerateOptions {
            root_element: Some("Note".to_string()),
            ..GenerateOptions::default()
        };
        let root = select_root(&schema, &config, &options).unwrap();
        assert_eq!(root.name, "Note");
    }

    #[test]
    fn unknown_root_is_schema_error() {
        let schema = schema();
        let config = validate_config(&GeneratorConfig::default()).unwrap();
        let options = GenerateOptions {
            root_element: Some("Missing".to_string()),
            ..GenerateOptions::default()
        };
        assert!(matches!(
            select_root(&schema, &config, &options),
            Err(GenerationError::Schema(_))
        ));
    }

    #[test]
    fn mode_override_is_applied() {
        let engine = GenerationEngine::new(GenerateOptions {
            mode: Some("minimalistic".to_string()),
            seed: Some(7),
            ..GenerateOptions::default()
        });
        let result = engine.run(&schema(), &GeneratorConfig::default()).unwrap();
        assert_eq!(result.report.mode, "minimalistic");
        assert_eq!(result.report.seed, 7);
        assert_eq!(result.document.root.name, "Order");
    }

    #[test]
    fn invalid_mode_is_configuration_error() {
        let engine = GenerationEngine::new(GenerateOptions {
            mode: Some("everything".to_string()),
            ..GenerateOptions::default()
        });
        let err = engine.run(&schema(), &GeneratorConfig::default()).unwrap_err();
        assert!(matches!(err, GenerationError::Configuration { .. }));
    }
}
