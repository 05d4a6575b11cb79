use std::collections::{HashMap, HashSet};

use tracing::debug;
use xsdforge_config::{
    CompiledConfig, CompiledRelationship, RelationshipStrategy, SelectionStrategy, scalar_lexical,
};

use crate::checks::{Bindings, all_bound_hold, violated};
use crate::context::GenerationContext;
use crate::contexts::{DataContextResolver, record_field};
use crate::errors::GenerationError;
use crate::model::{GenerateOptions, GenerationIssue};

/// Resolution steps a relationship can call back into for one field.
pub trait FieldResolver {
    /// Value from the field's own sources, skipping relationship delegation.
    fn resolve_independent(
        &self,
        ctx: &mut GenerationContext,
        field: &str,
    ) -> Result<String, GenerationError>;

    /// Candidate values a dependent field may be drawn from.
    fn candidate_pool(
        &self,
        ctx: &mut GenerationContext,
        field: &str,
        relationship: &CompiledRelationship,
    ) -> Result<Vec<String>, GenerationError>;

    /// Selection state key and strategy used when picking for a field.
    fn selection_for(&self, field: &str) -> (String, SelectionStrategy);
}

/// Relationship caches for one run.
///
/// An entity instance is `(relationship, ordinal)`, where the ordinal counts
/// earlier resolutions of the same participant field.
#[derive(Debug, Default)]
pub struct RelationshipState {
    ordinals: HashMap<String, usize>,
    resolved: HashMap<(String, usize), String>,
    personas: HashMap<(String, usize), Option<usize>>,
    used_records: HashMap<String, HashSet<usize>>,
    used_combinations: HashMap<String, HashSet<Vec<String>>>,
}

impl RelationshipState {
    fn next_ordinal(&mut self, field: &str) -> usize {
        let counter = self.ordinals.entry(field.to_string()).or_insert(0);
        let ordinal = *counter;
        *counter += 1;
        ordinal
    }

    pub fn resolved(&self, field: &str, ordinal: usize) -> Option<&str> {
        self.resolved
            .get(&(field.to_string(), ordinal))
            .map(String::as_str)
    }

    fn store(&mut self, field: &str, ordinal: usize, value: &str) {
        self.resolved
            .entry((field.to_string(), ordinal))
            .or_insert_with(|| value.to_string());
    }

    fn bindings(&self, relationship: &CompiledRelationship, ordinal: usize) -> Bindings {
        relationship
            .fields
            .iter()
            .filter_map(|field| {
                self.resolved(field, ordinal)
                    .map(|value| (field.clone(), value.to_string()))
            })
            .collect()
    }
}

/// Keeps related leaf values consistent across one document.
pub struct SmartRelationshipEngine<'a> {
    config: &'a CompiledConfig,
    contexts: &'a DataContextResolver,
    options: &'a GenerateOptions,
}

impl<'a> SmartRelationshipEngine<'a> {
    pub fn new(
        config: &'a CompiledConfig,
        contexts: &'a DataContextResolver,
        options: &'a GenerateOptions,
    ) -> Self {
        Self {
            config,
            contexts,
            options,
        }
    }

    /// Whether the owning relationship picks from the field's own sources
    /// rather than supplying values of its own.
    pub fn draws_from_field_sources(&self, field: &str) -> bool {
        self.config.owner_of(field).is_some_and(|relationship| {
            !matches!(relationship.strategy, RelationshipStrategy::ConsistentPersona)
        })
    }

    /// Value for the next occurrence of a participant field.
    ///
    /// `None` means the owning relationship has nothing for this field and
    /// resolution continues with the remaining steps.
    pub fn resolve_field(
        &self,
        ctx: &mut GenerationContext,
        field: &str,
        resolver: &dyn FieldResolver,
    ) -> Result<Option<String>, GenerationError> {
        let ordinal = ctx.relationships.next_ordinal(field);
        self.resolve_at(ctx, field, ordinal, resolver)
    }

    fn resolve_at(
        &self,
        ctx: &mut GenerationContext,
        field: &str,
        ordinal: usize,
        resolver: &dyn FieldResolver,
    ) -> Result<Option<String>, GenerationError> {
        if let Some(value) = ctx.relationships.resolved(field, ordinal) {
            return Ok(Some(value.to_string()));
        }
        let Some(relationship) = self.config.owner_of(field) else {
            return Ok(None);
        };

        for id in &relationship.after_relationships {
            if let Some(earlier) = self.config.relationship(id) {
                for earlier_field in &earlier.fields {
                    if self.owns(earlier, earlier_field) {
                        self.resolve_at(ctx, earlier_field, ordinal, resolver)?;
                    }
                }
            }
        }

        ctx.report.record_relationship_usage(&relationship.id);
        let value = match relationship.strategy {
            RelationshipStrategy::ConsistentPersona => {
                self.persona_value(ctx, relationship, field, ordinal, resolver)?
            }
            RelationshipStrategy::DependentValues => Some(self.dependent_value(
                ctx,
                relationship,
                field,
                ordinal,
                resolver,
            )?),
            RelationshipStrategy::ConstraintBased => {
                self.constraint_value(ctx, relationship, field, ordinal, resolver)?
            }
        };
        if let Some(value) = &value {
            ctx.relationships.store(field, ordinal, value);
        }
        Ok(value)
    }

    fn owns(&self, relationship: &CompiledRelationship, field: &str) -> bool {
        self.config
            .field_owners
            .get(field)
            .is_some_and(|owner| owner == &relationship.id)
    }

    fn attempts(&self, relationship: &CompiledRelationship) -> u32 {
        relationship
            .max_attempts
            .unwrap_or(self.options.max_relationship_attempts)
            .max(1)
    }

    /// Bind fields this relationship reads but another one owns.
    fn bind_foreign_fields(
        &self,
        ctx: &mut GenerationContext,
        relationship: &CompiledRelationship,
        field: &str,
        ordinal: usize,
        resolver: &dyn FieldResolver,
    ) -> Result<(), GenerationError> {
        for other in &relationship.fields {
            if other != field && !self.owns(relationship, other) {
                self.resolve_at(ctx, other, ordinal, resolver)?;
            }
        }
        Ok(())
    }

    fn persona_value(
        &self,
        ctx: &mut GenerationContext,
        relationship: &CompiledRelationship,
        field: &str,
        ordinal: usize,
        resolver: &dyn FieldResolver,
    ) -> Result<Option<String>, GenerationError> {
        let Some(source) = relationship.source.as_deref() else {
            return Ok(None);
        };
        let records = self.contexts.resolve_records(source)?;

        let key = (relationship.id.clone(), ordinal);
        let index = match ctx.relationships.personas.get(&key).copied() {
            Some(index) => index,
            None => {
                self.bind_foreign_fields(ctx, relationship, field, ordinal, resolver)?;
                let index = self.pick_persona(ctx, relationship, records, ordinal);
                ctx.relationships.personas.insert(key, index);
                index
            }
        };
        let Some(record) = index.and_then(|index| records.get(index)) else {
            return Ok(None);
        };

        for participant in &relationship.fields {
            if self.owns(relationship, participant)
                && let Some(value) =
                    record_field(record, relationship.record_key(participant)).and_then(scalar_lexical)
            {
                ctx.relationships.store(participant, ordinal, &value);
            }
        }
        Ok(ctx
            .relationships
            .resolved(field, ordinal)
            .map(str::to_string))
    }

    fn pick_persona(
        &self,
        ctx: &mut GenerationContext,
        relationship: &CompiledRelationship,
        records: &[serde_json::Value],
        ordinal: usize,
    ) -> Option<usize> {
        if records.is_empty() {
            ctx.warn(
                GenerationIssue::warning(
                    "persona_pool_empty",
                    format!("source '{}' holds no records", relationship.source.as_deref().unwrap_or("")),
                    None,
                )
                .with_relationship(&relationship.id),
            );
            return None;
        }

        let mut candidates: Vec<usize> = (0..records.len()).collect();
        if relationship.ensure_unique {
            let used = ctx
                .relationships
                .used_records
                .entry(relationship.id.clone())
                .or_default();
            if used.len() >= records.len() {
                used.clear();
                ctx.warn(
                    GenerationIssue::warning(
                        "persona_pool_exhausted",
                        format!(
                            "all {} records used; reusing records from the start",
                            records.len()
                        ),
                        None,
                    )
                    .with_relationship(&relationship.id),
                );
            }
            let used = ctx
                .relationships
                .used_records
                .get(&relationship.id)
                .cloned()
                .unwrap_or_default();
            candidates.retain(|index| !used.contains(index));
        }

        let state_key = format!("relationships/{}", relationship.id);
        let foreign = ctx.relationships.bindings(relationship, ordinal);
        let attempts = self.attempts(relationship);
        let mut chosen = None;
        for attempt in 0..attempts {
            let Some(position) = ctx.selection.select_index(
                &state_key,
                relationship.selection,
                candidates.len(),
                ctx.seed,
                &mut ctx.rng,
            ) else {
                break;
            };
            let index = candidates[position];
            chosen = Some(index);

            let mut bindings = foreign.clone();
            for participant in &relationship.fields {
                if let Some(value) = record_field(&records[index], relationship.record_key(participant))
                    .and_then(scalar_lexical)
                {
                    bindings.insert(participant.clone(), value);
                }
            }
            if all_bound_hold(&relationship.constraints, &bindings) {
                break;
            }
            ctx.report.record_retry();
            if attempt + 1 == attempts {
                self.warn_violation(ctx, relationship, &bindings, None);
            }
        }

        if let Some(index) = chosen
            && relationship.ensure_unique
        {
            ctx.relationships
                .used_records
                .entry(relationship.id.clone())
                .or_default()
                .insert(index);
        }
        chosen
    }

    fn dependent_value(
        &self,
        ctx: &mut GenerationContext,
        relationship: &CompiledRelationship,
        field: &str,
        ordinal: usize,
        resolver: &dyn FieldResolver,
    ) -> Result<String, GenerationError> {
        if relationship.depends_on.iter().any(|dependency| dependency == field) {
            return resolver.resolve_independent(ctx, field);
        }

        // Dependencies come first even when they appear later in the document.
        for dependency in &relationship.depends_on {
            if ctx.relationships.resolved(dependency, ordinal).is_none() && self.owns(relationship, dependency) {
                let value = resolver.resolve_independent(ctx, dependency)?;
                ctx.relationships.store(dependency, ordinal, &value);
            }
        }
        self.bind_foreign_fields(ctx, relationship, field, ordinal, resolver)?;
        let bindings = ctx.relationships.bindings(relationship, ordinal);

        let pool = resolver.candidate_pool(ctx, field, relationship)?;
        if pool.is_empty() {
            return resolver.resolve_independent(ctx, field);
        }

        let with_candidate = |candidate: &str| {
            let mut bound = bindings.clone();
            bound.insert(field.to_string(), candidate.to_string());
            bound
        };
        let mut filtered: Vec<String> = pool
            .iter()
            .filter(|candidate| all_bound_hold(&relationship.constraints, &with_candidate(candidate)))
            .cloned()
            .collect();

        if relationship.ensure_unique && !filtered.is_empty() {
            let used = ctx
                .relationships
                .used_combinations
                .get(&relationship.id)
                .cloned()
                .unwrap_or_default();
            let fresh: Vec<String> = filtered
                .iter()
                .filter(|candidate| !used.contains(&combination(relationship, &with_candidate(candidate))))
                .cloned()
                .collect();
            if !fresh.is_empty() {
                filtered = fresh;
            }
        }

        let exhausted = filtered.is_empty();
        let candidates: &[String] = if exhausted { &pool } else { &filtered };
        let (state_key, strategy) = resolver.selection_for(field);
        let value = ctx
            .selection
            .select(&state_key, strategy, candidates, ctx.seed, &mut ctx.rng)
            .cloned()
            .unwrap_or_default();

        let bound = with_candidate(&value);
        if exhausted {
            self.warn_violation(ctx, relationship, &bound, Some(field));
        } else {
            debug!(
                relationship = %relationship.id,
                field,
                candidates = candidates.len(),
                "dependent value filtered"
            );
        }
        if relationship.ensure_unique {
            ctx.relationships
                .used_combinations
                .entry(relationship.id.clone())
                .or_default()
                .insert(combination(relationship, &bound));
        }
        Ok(value)
    }

    fn constraint_value(
        &self,
        ctx: &mut GenerationContext,
        relationship: &CompiledRelationship,
        field: &str,
        ordinal: usize,
        resolver: &dyn FieldResolver,
    ) -> Result<Option<String>, GenerationError> {
        self.bind_foreign_fields(ctx, relationship, field, ordinal, resolver)?;

        let pending: Vec<&str> = relationship
            .fields
            .iter()
            .map(String::as_str)
            .filter(|participant| {
                self.owns(relationship, participant)
                    && ctx.relationships.resolved(participant, ordinal).is_none()
            })
            .collect();
        let mut bindings = ctx.relationships.bindings(relationship, ordinal);
        for participant in &pending {
            let value = resolver.resolve_independent(ctx, participant)?;
            bindings.insert(participant.to_string(), value);
        }

        let retry: Vec<&str> = pending
            .iter()
            .copied()
            .filter(|participant| {
                relationship.depends_on.is_empty()
                    || !relationship.depends_on.iter().any(|dependency| dependency == participant)
            })
            .collect();
        let attempts = self.attempts(relationship);
        let mut attempt = 0;
        while !retry.is_empty()
            && attempt < attempts
            && !violated(&relationship.constraints, &bindings).is_empty()
        {
            attempt += 1;
            ctx.report.record_retry();
            for participant in &retry {
                let value = resolver.resolve_independent(ctx, participant)?;
                bindings.insert(participant.to_string(), value);
            }
        }
        if !violated(&relationship.constraints, &bindings).is_empty() {
            self.warn_violation(ctx, relationship, &bindings, None);
        }

        for participant in &pending {
            if let Some(value) = bindings.get(*participant) {
                ctx.relationships.store(participant, ordinal, value);
            }
        }
        Ok(ctx
            .relationships
            .resolved(field, ordinal)
            .map(str::to_string))
    }

    fn warn_violation(
        &self,
        ctx: &mut GenerationContext,
        relationship: &CompiledRelationship,
        bindings: &Bindings,
        field: Option<&str>,
    ) {
        let failed = violated(&relationship.constraints, bindings)
            .iter()
            .map(|constraint| constraint.source.as_str())
            .collect::<Vec<_>>();
        let values = bindings
            .iter()
            .map(|(name, value)| format!("{name}={value}"))
            .collect::<Vec<_>>()
            .join(", ");
        let message = if failed.is_empty() {
            format!("no candidate satisfies the constraints; kept {values}")
        } else {
            format!("constraint(s) {} violated with {values}", failed.join("; "))
        };
        ctx.warn(
            GenerationIssue::warning("constraint_violation", message, field)
                .with_relationship(&relationship.id),
        );
    }
}

fn combination(relationship: &CompiledRelationship, bindings: &Bindings) -> Vec<String> {
    relationship
        .fields
        .iter()
        .map(|field| bindings.get(field).cloned().unwrap_or_default())
        .collect()
}
