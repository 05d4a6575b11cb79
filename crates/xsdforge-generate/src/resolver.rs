use std::collections::BTreeSet;

use xsdforge_config::{
    CompiledConfig, CompiledElementConfig, CompiledRelationship, SelectionStrategy, scalar_lexical,
};
use xsdforge_core::SimpleTypeFacets;

use crate::context::GenerationContext;
use crate::contexts::{DataContextResolver, record_field};
use crate::errors::GenerationError;
use crate::facets::check_value;
use crate::generators::{GeneratorContext, GeneratorRegistry, TypeGenerator};
use crate::index::{SchemaIndex, participant_field};
use crate::model::{GenerateOptions, GenerationIssue};
use crate::relationships::{FieldResolver, SmartRelationshipEngine};

const MIN_SAMPLE_POOL: usize = 8;

/// One leaf value to resolve: element text or attribute value.
#[derive(Debug, Clone, Copy)]
pub struct LeafRequest<'r> {
    /// Local name; attributes carry a leading `@`.
    pub name: &'r str,
    /// Slash-separated declaration path without occurrence indices.
    pub path: &'r str,
    pub facets: &'r SimpleTypeFacets,
    pub fixed: Option<&'r str>,
    /// Sibling scope for uniqueness checks.
    pub scope: Option<u64>,
}

enum Picked {
    Value(String),
    /// The source offered nothing usable; try the next step.
    Empty,
    /// Every attempt failed the facets; hand over to the generator.
    Fallback(String),
}

/// Resolves leaf values in a fixed order: fixed value, custom values,
/// relationship delegation, data context, template record, generator.
///
/// Dependent and constraint-based relationships draw from the field's own
/// custom values, so they still run for fields that configure some.
pub struct ValueResolver<'a> {
    config: &'a CompiledConfig,
    index: &'a SchemaIndex,
    contexts: &'a DataContextResolver,
    generators: &'a GeneratorRegistry,
    options: &'a GenerateOptions,
    relationships: SmartRelationshipEngine<'a>,
}

impl<'a> ValueResolver<'a> {
    pub fn new(
        config: &'a CompiledConfig,
        index: &'a SchemaIndex,
        contexts: &'a DataContextResolver,
        generators: &'a GeneratorRegistry,
        options: &'a GenerateOptions,
    ) -> Self {
        Self {
            config,
            index,
            contexts,
            generators,
            options,
            relationships: SmartRelationshipEngine::new(config, contexts, options),
        }
    }

    pub fn resolve(
        &self,
        ctx: &mut GenerationContext,
        request: &LeafRequest<'_>,
    ) -> Result<String, GenerationError> {
        if let Some(fixed) = request.fixed {
            ctx.report.record_value_source("fixed");
            return Ok(fixed.to_string());
        }

        let element = self.config.element_config(request.name, request.path);
        let custom_first = element.is_some_and(|element| !element.custom_values.is_empty());
        let delegate = participant_field(self.config, request.name, request.path)
            .filter(|field| !custom_first || self.relationships.draws_from_field_sources(field));

        if let Some(field) = delegate
            && let Some(value) = self.relationships.resolve_field(ctx, field, self)?
        {
            if let Err(reason) = check_value(&value, request.facets, &mut ctx.patterns) {
                ctx.warn(
                    GenerationIssue::warning(
                        "constraint_violation",
                        format!("relationship value kept despite facets: {reason}"),
                        Some(request.path),
                    )
                    .with_relationship(field),
                );
            }
            self.mark_used(ctx, request, &value);
            ctx.report.record_value_source("relationship");
            return Ok(value);
        }

        self.resolve_sources(ctx, request, element)
    }

    /// Configured sources in order, then the default generator.
    fn resolve_sources(
        &self,
        ctx: &mut GenerationContext,
        request: &LeafRequest<'_>,
        element: Option<&CompiledElementConfig>,
    ) -> Result<String, GenerationError> {
        let Some(element) = element else {
            return self.generate(ctx, request, "generator");
        };

        if !element.custom_values.is_empty() {
            let strategy = element.selection.unwrap_or(SelectionStrategy::Sequential);
            match self.pick_from_pool(ctx, request, &element.custom_values, strategy, "custom_values") {
                Picked::Value(value) => return Ok(value),
                Picked::Fallback(reason) => return self.fallback(ctx, request, "custom_values", &reason),
                Picked::Empty => {}
            }
        }

        if let Some(path) = element.data_context.as_deref() {
            let pool = self.contexts.resolve_pool(path)?;
            let strategy = element.selection.unwrap_or(SelectionStrategy::Random);
            match self.pick_from_pool(ctx, request, &pool, strategy, "data_context") {
                Picked::Value(value) => return Ok(value),
                Picked::Fallback(reason) => return self.fallback(ctx, request, "data_context", &reason),
                Picked::Empty => {}
            }
        }

        if let Some(source) = element.template_source.as_deref() {
            match self.pick_template(ctx, request, element, source)? {
                Picked::Value(value) => return Ok(value),
                Picked::Fallback(reason) => return self.fallback(ctx, request, "template", &reason),
                Picked::Empty => {}
            }
        }

        self.generate(ctx, request, "generator")
    }

    fn pick_from_pool(
        &self,
        ctx: &mut GenerationContext,
        request: &LeafRequest<'_>,
        pool: &[String],
        strategy: SelectionStrategy,
        source: &str,
    ) -> Picked {
        if pool.is_empty() {
            return Picked::Empty;
        }
        let mut last: Option<(String, String)> = None;
        for _ in 0..self.options.max_value_attempts.max(1) {
            let Some(candidate) = ctx
                .selection
                .select(request.path, strategy, pool, ctx.seed, &mut ctx.rng)
                .cloned()
            else {
                break;
            };
            match self.accept(ctx, request, &candidate) {
                Ok(()) => {
                    self.mark_used(ctx, request, &candidate);
                    ctx.report.record_value_source(source);
                    return Picked::Value(candidate);
                }
                Err(reason) => {
                    ctx.report.record_retry();
                    last = Some((candidate, reason));
                }
            }
        }
        self.settle(ctx, request, last, source)
    }

    fn pick_template(
        &self,
        ctx: &mut GenerationContext,
        request: &LeafRequest<'_>,
        element: &CompiledElementConfig,
        source: &str,
    ) -> Result<Picked, GenerationError> {
        let records = self.contexts.resolve_records(source)?;
        if records.is_empty() {
            return Ok(Picked::Empty);
        }
        let key = element
            .template_field
            .as_deref()
            .unwrap_or_else(|| request.name.trim_start_matches('@'));
        let strategy = element.selection.unwrap_or(SelectionStrategy::Template);

        let mut last: Option<(String, String)> = None;
        for _ in 0..self.options.max_value_attempts.max(1) {
            let Some(record) =
                ctx.selection
                    .select(request.path, strategy, records, ctx.seed, &mut ctx.rng)
            else {
                break;
            };
            let Some(candidate) = record_field(record, key).and_then(scalar_lexical) else {
                ctx.warn(GenerationIssue::warning(
                    "template_field_missing",
                    format!("template record from '{source}' has no field '{key}'"),
                    Some(request.path),
                ));
                return Ok(Picked::Empty);
            };
            match self.accept(ctx, request, &candidate) {
                Ok(()) => {
                    self.mark_used(ctx, request, &candidate);
                    ctx.report.record_value_source("template");
                    return Ok(Picked::Value(candidate));
                }
                Err(reason) => {
                    ctx.report.record_retry();
                    last = Some((candidate, reason));
                }
            }
        }
        Ok(self.settle(ctx, request, last, "template"))
    }

    /// Outcome once a configured source ran out of attempts.
    fn settle(
        &self,
        ctx: &mut GenerationContext,
        request: &LeafRequest<'_>,
        last: Option<(String, String)>,
        source: &str,
    ) -> Picked {
        let Some((value, reason)) = last else {
            return Picked::Empty;
        };
        if self.config.overrides.enforce_constraints {
            return Picked::Fallback(reason);
        }
        ctx.warn(GenerationIssue::warning(
            "constraint_violation",
            format!("{source} value '{value}' kept: {reason}"),
            Some(request.path),
        ));
        self.mark_used(ctx, request, &value);
        ctx.report.record_value_source(source);
        Picked::Value(value)
    }

    fn fallback(
        &self,
        ctx: &mut GenerationContext,
        request: &LeafRequest<'_>,
        source: &str,
        reason: &str,
    ) -> Result<String, GenerationError> {
        ctx.report.record_fallback();
        ctx.warn(GenerationIssue::warning(
            "source_fallback",
            format!("no {source} value satisfied the facets ({reason}); generating instead"),
            Some(request.path),
        ));
        self.generate(ctx, request, "fallback")
    }

    /// Facet-aware default generation with bounded retries.
    fn generate(
        &self,
        ctx: &mut GenerationContext,
        request: &LeafRequest<'_>,
        source: &str,
    ) -> Result<String, GenerationError> {
        let generator_ctx = GeneratorContext {
            name: request.name,
            path: request.path,
            facets: request.facets,
            base_date: self.options.base_date,
        };
        let semantic = self
            .config
            .overrides
            .use_realistic_data
            .then(|| self.generators.semantic_for(request.name, request.facets))
            .flatten();
        let primitive = self.generators.primitive_for(request.facets)?;

        let mut last: Option<(String, &'static str, String)> = None;
        for generator in semantic.into_iter().chain(std::iter::once(primitive)) {
            for _ in 0..self.options.max_value_attempts.max(1) {
                let value = match generator.generate(&generator_ctx, &mut ctx.rng) {
                    Ok(value) => value,
                    Err(err) => {
                        ctx.warn(
                            GenerationIssue::warning(
                                "generator_failed",
                                err.to_string(),
                                Some(request.path),
                            )
                            .with_generator(generator.id()),
                        );
                        break;
                    }
                };
                match self.accept(ctx, request, &value) {
                    Ok(()) => return Ok(self.finish(ctx, request, value, generator.id(), source)),
                    Err(reason) => {
                        ctx.report.record_retry();
                        last = Some((value, generator.id(), reason));
                    }
                }
            }
        }

        let (value, generator_id, reason) = match last {
            Some(last) => last,
            None => {
                let text = self.best_effort_text(ctx, &generator_ctx);
                (text, "primitive.string", "no generator produced a value".to_string())
            }
        };
        ctx.warn(
            GenerationIssue::warning(
                "constraint_violation",
                format!(
                    "no generated value satisfied the facets after {} attempts; kept '{value}': {reason}",
                    self.options.max_value_attempts.max(1)
                ),
                Some(request.path),
            )
            .with_generator(generator_id),
        );
        Ok(self.finish(ctx, request, value, generator_id, source))
    }

    fn finish(
        &self,
        ctx: &mut GenerationContext,
        request: &LeafRequest<'_>,
        value: String,
        generator_id: &str,
        source: &str,
    ) -> String {
        self.mark_used(ctx, request, &value);
        ctx.report.record_generator_usage(generator_id);
        ctx.report.record_value_source(source);
        value
    }

    fn best_effort_text(
        &self,
        ctx: &mut GenerationContext,
        generator_ctx: &GeneratorContext<'_>,
    ) -> String {
        self.generators
            .get("primitive.string")
            .and_then(|generator| generator.generate(generator_ctx, &mut ctx.rng).ok())
            .unwrap_or_default()
    }

    fn accept(
        &self,
        ctx: &mut GenerationContext,
        request: &LeafRequest<'_>,
        value: &str,
    ) -> Result<(), String> {
        check_value(value, request.facets, &mut ctx.patterns)?;
        if self.config.settings.ensure_unique_combinations
            && let Some(scope) = request.scope
            && ctx.is_used(scope, request.path, value)
        {
            return Err(format!("'{value}' already used by a sibling"));
        }
        Ok(())
    }

    fn mark_used(&self, ctx: &mut GenerationContext, request: &LeafRequest<'_>, value: &str) {
        if self.config.settings.ensure_unique_combinations
            && let Some(scope) = request.scope
        {
            ctx.mark_used(scope, request.path, value);
        }
    }

    fn field_request(
        &self,
        field: &str,
    ) -> Result<(&'a str, &'a str, &'a SimpleTypeFacets), GenerationError> {
        let entry = self.index.field_entry(field).ok_or_else(|| {
            GenerationError::configuration(format!(
                "relationship field '{field}' matches no leaf element"
            ))
        })?;
        let facets = entry.facets.as_ref().ok_or_else(|| {
            GenerationError::configuration(format!("relationship field '{field}' is not a leaf"))
        })?;
        Ok((entry.name.as_str(), entry.path.as_str(), facets))
    }
}

impl FieldResolver for ValueResolver<'_> {
    fn resolve_independent(
        &self,
        ctx: &mut GenerationContext,
        field: &str,
    ) -> Result<String, GenerationError> {
        let (name, path, facets) = self.field_request(field)?;
        let request = LeafRequest {
            name,
            path,
            facets,
            fixed: None,
            scope: None,
        };
        let element = self.config.element_config(name, path);
        self.resolve_sources(ctx, &request, element)
    }

    fn candidate_pool(
        &self,
        ctx: &mut GenerationContext,
        field: &str,
        relationship: &CompiledRelationship,
    ) -> Result<Vec<String>, GenerationError> {
        let (name, path, facets) = self.field_request(field)?;
        let element = self.config.element_config(name, path);

        let mut pool = match element {
            Some(element) if !element.custom_values.is_empty() => element.custom_values.clone(),
            Some(element) if element.data_context.is_some() => {
                let source = element.data_context.as_deref().unwrap_or_default();
                self.contexts.resolve_pool(source)?
            }
            _ => relationship
                .source
                .as_deref()
                .and_then(|source| self.contexts.resolve_pool(source).ok())
                .unwrap_or_default(),
        };

        if pool.is_empty() {
            pool = self.sample_pool(ctx, name, path, facets);
        }

        let conforming: Vec<String> = pool
            .iter()
            .filter(|candidate| check_value(candidate, facets, &mut ctx.patterns).is_ok())
            .cloned()
            .collect();
        Ok(if conforming.is_empty() { pool } else { conforming })
    }

    fn selection_for(&self, field: &str) -> (String, SelectionStrategy) {
        let Ok((name, path, _)) = self.field_request(field) else {
            return (field.to_string(), SelectionStrategy::Random);
        };
        let strategy = match self.config.element_config(name, path) {
            Some(element) => element.selection.unwrap_or(if element.custom_values.is_empty() {
                SelectionStrategy::Random
            } else {
                SelectionStrategy::Sequential
            }),
            None => SelectionStrategy::Random,
        };
        (path.to_string(), strategy)
    }
}

impl ValueResolver<'_> {
    /// Distinct generated values standing in for a missing pool.
    fn sample_pool(
        &self,
        ctx: &mut GenerationContext,
        name: &str,
        path: &str,
        facets: &SimpleTypeFacets,
    ) -> Vec<String> {
        let generator_ctx = GeneratorContext {
            name,
            path,
            facets,
            base_date: self.options.base_date,
        };
        let generator: Option<&dyn TypeGenerator> = self
            .config
            .overrides
            .use_realistic_data
            .then(|| self.generators.semantic_for(name, facets))
            .flatten()
            .or_else(|| self.generators.primitive_for(facets).ok());
        let Some(generator) = generator else {
            return Vec::new();
        };

        let size = MIN_SAMPLE_POOL.max(self.options.max_relationship_attempts as usize);
        let mut seen = BTreeSet::new();
        let mut pool = Vec::with_capacity(size);
        for _ in 0..size * 2 {
            if pool.len() == size {
                break;
            }
            if let Ok(value) = generator.generate(&generator_ctx, &mut ctx.rng)
                && seen.insert(value.clone())
            {
                pool.push(value);
            }
        }
        pool
    }
}
