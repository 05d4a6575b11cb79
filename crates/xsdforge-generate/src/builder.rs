use rand::Rng;
use tracing::debug;
use xsdforge_config::{CompiledConfig, CompiledElementConfig, GenerationMode};
use xsdforge_core::{
    AttributeDecl, ContentModelGroup, GroupKind, MaxOccurs, Particle, ResolvedType, SchemaModel,
    SchemaNode, SimpleTypeFacets, TypeContent,
};

use crate::context::GenerationContext;
use crate::document::{GeneratedAttribute, GeneratedDocument, GeneratedNode};
use crate::errors::GenerationError;
use crate::index::SchemaIndex;
use crate::model::{GenerateOptions, GenerationIssue};
use crate::resolver::{LeafRequest, ValueResolver};

/// Result of building one element occurrence.
#[derive(Debug)]
pub enum BuildOutcome {
    Built(GeneratedNode),
    Omitted,
}

/// Depth-first walk from a global element to a generated tree.
pub struct TreeBuilder<'a> {
    schema: &'a SchemaModel,
    config: &'a CompiledConfig,
    index: &'a SchemaIndex,
    resolver: ValueResolver<'a>,
    options: &'a GenerateOptions,
}

impl<'a> TreeBuilder<'a> {
    pub fn new(
        schema: &'a SchemaModel,
        config: &'a CompiledConfig,
        index: &'a SchemaIndex,
        resolver: ValueResolver<'a>,
        options: &'a GenerateOptions,
    ) -> Self {
        Self {
            schema,
            config,
            index,
            resolver,
            options,
        }
    }

    pub fn build_document(
        &self,
        ctx: &mut GenerationContext,
        root: &'a SchemaNode,
    ) -> Result<GeneratedDocument, GenerationError> {
        let namespace = root
            .namespace
            .clone()
            .or_else(|| self.schema.target_namespace.clone());
        let scope = ctx.open_scope();
        let root = match self.build_with_namespace(ctx, root, "", namespace.clone(), scope)? {
            BuildOutcome::Built(node) => node,
            BuildOutcome::Omitted => {
                let mut node = GeneratedNode::new(root.name.clone(), namespace);
                node.mark_truncated();
                node
            }
        };
        Ok(GeneratedDocument { root })
    }

    /// Build one occurrence of `node` below `parent_path`.
    pub fn build(
        &self,
        ctx: &mut GenerationContext,
        node: &'a SchemaNode,
        parent_path: &str,
    ) -> Result<BuildOutcome, GenerationError> {
        let scope = ctx.open_scope();
        self.build_with_namespace(ctx, node, parent_path, node.namespace.clone(), scope)
    }

    fn build_with_namespace(
        &self,
        ctx: &mut GenerationContext,
        node: &'a SchemaNode,
        parent_path: &str,
        namespace: Option<String>,
        parent_scope: u64,
    ) -> Result<BuildOutcome, GenerationError> {
        let path = join_path(parent_path, &node.name);
        let resolved = self.schema.resolve_type(node)?;
        if let Some(identity) = resolved.identity
            && self.would_truncate(ctx, identity)
        {
            return Ok(BuildOutcome::Omitted);
        }
        let element = self.config.element_config(&node.name, &path);
        self.build_occurrence(ctx, node, &path, &resolved, element, namespace, parent_scope)
    }

    #[allow(clippy::too_many_arguments)]
    fn build_occurrence(
        &self,
        ctx: &mut GenerationContext,
        node: &'a SchemaNode,
        path: &str,
        resolved: &ResolvedType<'a>,
        element: Option<&CompiledElementConfig>,
        namespace: Option<String>,
        parent_scope: u64,
    ) -> Result<BuildOutcome, GenerationError> {
        if let Err(err) = ctx.tick() {
            if !self.options.allow_partial {
                return Err(err);
            }
            ctx.report.record_truncation(GenerationIssue::warning(
                "timeout",
                format!("walk stopped: {err}"),
                Some(path),
            ));
            ctx.halt();
            return Ok(BuildOutcome::Omitted);
        }

        let mut generated = GeneratedNode::new(node.name.clone(), namespace);
        let scope = ctx.open_scope();
        ctx.report.elements_generated += 1;

        for attribute in &resolved.attributes {
            self.build_attribute(ctx, attribute, path, &mut generated, scope)?;
        }

        if element.is_some_and(|element| element.nil) {
            if node.nillable {
                generated.nil = true;
                return Ok(BuildOutcome::Built(generated));
            }
            ctx.warn(GenerationIssue::warning(
                "nil_not_nillable",
                format!("'{}' is not nillable; generating content", node.name),
                Some(path),
            ));
        }

        match resolved.content {
            TypeContent::Builtin(primitive) => {
                let facets = SimpleTypeFacets::new(primitive);
                generated.text = Some(self.leaf_value(ctx, node, path, &facets, parent_scope)?);
            }
            TypeContent::Simple(facets) => {
                generated.text = Some(self.leaf_value(ctx, node, path, facets, parent_scope)?);
            }
            TypeContent::Complex(group) => {
                if let Some(identity) = resolved.identity {
                    ctx.push_type(identity);
                }
                let result = self.build_group(ctx, group, path, &mut generated, scope, element, false);
                if resolved.identity.is_some() {
                    ctx.pop_type();
                }
                result?;
            }
            TypeContent::Empty => {}
        }

        if ctx.is_halted() {
            generated.mark_truncated();
        }
        Ok(BuildOutcome::Built(generated))
    }

    fn leaf_value(
        &self,
        ctx: &mut GenerationContext,
        node: &SchemaNode,
        path: &str,
        facets: &SimpleTypeFacets,
        scope: u64,
    ) -> Result<String, GenerationError> {
        self.resolver.resolve(
            ctx,
            &LeafRequest {
                name: &node.name,
                path,
                facets,
                fixed: node.fixed.as_deref(),
                scope: Some(scope),
            },
        )
    }

    fn build_attribute(
        &self,
        ctx: &mut GenerationContext,
        attribute: &AttributeDecl,
        owner_path: &str,
        owner: &mut GeneratedNode,
        scope: u64,
    ) -> Result<(), GenerationError> {
        let name = format!("@{}", attribute.name);
        let path = format!("{owner_path}/{name}");
        if !attribute.required && !self.optional_present(&name, &path) {
            ctx.report.omitted_optional += 1;
            return Ok(());
        }

        let facets = self.schema.resolve_attribute_facets(attribute)?;
        let value = self.resolver.resolve(
            ctx,
            &LeafRequest {
                name: &name,
                path: &path,
                facets: &facets,
                fixed: attribute.fixed.as_deref(),
                scope: Some(scope),
            },
        )?;
        owner.attributes.push(GeneratedAttribute {
            name: attribute.name.clone(),
            namespace: attribute.namespace.clone(),
            value,
        });
        ctx.report.attributes_generated += 1;
        Ok(())
    }

    /// `force` keeps an optional group present at least once; a choice
    /// forces the branch it picked.
    #[allow(clippy::too_many_arguments)]
    fn build_group(
        &self,
        ctx: &mut GenerationContext,
        group: &'a ContentModelGroup,
        owner_path: &str,
        owner: &mut GeneratedNode,
        scope: u64,
        owner_config: Option<&CompiledElementConfig>,
        force: bool,
    ) -> Result<(), GenerationError> {
        let count = self.group_count(group, owner_path, force);
        for _ in 0..count {
            match group.kind {
                // `all` keeps declaration order.
                GroupKind::Sequence | GroupKind::All => {
                    for member in &group.members {
                        self.build_particle(ctx, member, owner_path, owner, scope, owner_config, false)?;
                        if ctx.is_halted() {
                            return Ok(());
                        }
                    }
                }
                GroupKind::Choice => {
                    if let Some(branch) = self.choose_branch(ctx, group, owner_path, owner_config) {
                        self.build_particle(ctx, branch, owner_path, owner, scope, owner_config, true)?;
                    }
                }
            }
            if ctx.is_halted() {
                return Ok(());
            }
        }
        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    fn build_particle(
        &self,
        ctx: &mut GenerationContext,
        particle: &'a Particle,
        owner_path: &str,
        owner: &mut GeneratedNode,
        scope: u64,
        owner_config: Option<&CompiledElementConfig>,
        force: bool,
    ) -> Result<(), GenerationError> {
        match particle {
            Particle::Element(node) => {
                self.build_occurrences(ctx, node, owner_path, owner, scope, force)
            }
            Particle::Group(nested) => {
                self.build_group(ctx, nested, owner_path, owner, scope, owner_config, force)
            }
        }
    }

    fn build_occurrences(
        &self,
        ctx: &mut GenerationContext,
        node: &'a SchemaNode,
        parent_path: &str,
        parent: &mut GeneratedNode,
        scope: u64,
        force: bool,
    ) -> Result<(), GenerationError> {
        let path = join_path(parent_path, &node.name);
        let resolved = self.schema.resolve_type(node)?;
        let element = self.config.element_config(&node.name, &path);

        if let Some(identity) = resolved.identity
            && self.would_truncate(ctx, identity)
        {
            self.truncate(ctx, node, &path, identity, parent);
            return Ok(());
        }

        let count = self.occurrence_count(node, &path, element, force);
        if count == 0 {
            if node.min_occurs == 0 {
                ctx.report.omitted_optional += 1;
            }
            return Ok(());
        }

        let include_comments = self.config.settings.include_comments;
        for occurrence in 0..count {
            if include_comments && node.max_occurs.is_repeatable() {
                parent.push_comment(format!(
                    "{}: occurrence {} of {count} (minOccurs={}, maxOccurs={})",
                    node.name,
                    occurrence + 1,
                    node.min_occurs,
                    node.max_occurs
                ));
            }
            let outcome = self.build_occurrence(
                ctx,
                node,
                &path,
                &resolved,
                element,
                node.namespace.clone(),
                scope,
            )?;
            if let BuildOutcome::Built(child) = outcome {
                parent.push_element(child);
            }
            if ctx.is_halted() {
                break;
            }
        }
        Ok(())
    }

    /// Recursion guard: optional branches are dropped, required ones kept
    /// as empty truncated elements.
    fn truncate(
        &self,
        ctx: &mut GenerationContext,
        node: &SchemaNode,
        path: &str,
        identity: &str,
        parent: &mut GeneratedNode,
    ) {
        let depth = ctx.type_occurrences(identity);
        let required = node.min_occurs > 0;
        let message = if required {
            format!("{}: truncated at depth {depth} of recursive type {identity}", node.name)
        } else {
            format!("{}: omitted at depth {depth} of recursive type {identity}", node.name)
        };
        debug!(path, identity, depth, required, "recursion truncated");

        if self.config.settings.include_comments {
            parent.push_comment(message.clone());
        }
        for _ in 0..node.min_occurs {
            let mut stub = GeneratedNode::new(node.name.clone(), node.namespace.clone());
            stub.mark_truncated();
            parent.push_element(stub);
        }
        ctx.report
            .record_truncation(GenerationIssue::info("depth_limit", message, Some(path)));
    }

    fn would_truncate(&self, ctx: &GenerationContext, identity: &str) -> bool {
        if ctx.type_occurrences(identity) >= self.config.settings.max_depth {
            return true;
        }
        self.options
            .circular_reference_limit
            .is_some_and(|limit| ctx.immediate_recursion(identity) >= limit.max(1))
    }

    /// Occurrences of an element: mode policy for presence, then the
    /// requested count clamped to the schema range and the count ceiling.
    fn occurrence_count(
        &self,
        node: &SchemaNode,
        path: &str,
        element: Option<&CompiledElementConfig>,
        force: bool,
    ) -> u32 {
        let settings = &self.config.settings;
        let min = node.min_occurs.max(u32::from(force));
        if min == 0 && !self.optional_present(&node.name, path) {
            return 0;
        }

        let requested = match element.and_then(|element| element.repeat_count) {
            Some(explicit) => explicit,
            None if settings.mode == GenerationMode::Minimalistic => min.max(1),
            None => settings.global_repeat_count,
        };
        clamp_occurs(requested, min, node.max_occurs, settings.max_unbounded_count)
    }

    fn group_count(&self, group: &ContentModelGroup, owner_path: &str, force: bool) -> u32 {
        let settings = &self.config.settings;
        let min = group.min_occurs.max(u32::from(force));
        if min == 0 && !self.group_present(group, owner_path) {
            return 0;
        }
        let requested = match settings.mode {
            GenerationMode::Minimalistic => min.max(1),
            _ if group.max_occurs.is_repeatable() => settings.global_repeat_count,
            _ => 1,
        };
        clamp_occurs(requested, min, group.max_occurs, settings.max_unbounded_count)
    }

    /// Mode policy for an optional element or attribute.
    fn optional_present(&self, name: &str, path: &str) -> bool {
        let mode = self.config.settings.mode;
        match mode {
            GenerationMode::Complete => true,
            GenerationMode::Minimalistic => self.index.is_forced(path, mode),
            GenerationMode::Custom => {
                self.index.is_forced(path, mode) || self.config.element_config(name, path).is_some()
            }
        }
    }

    fn group_present(&self, group: &ContentModelGroup, owner_path: &str) -> bool {
        group.members.iter().any(|member| match member {
            Particle::Element(node) => {
                self.optional_present(&node.name, &join_path(owner_path, &node.name))
            }
            Particle::Group(nested) => self.group_present(nested, owner_path),
        })
    }

    fn choose_branch(
        &self,
        ctx: &mut GenerationContext,
        group: &'a ContentModelGroup,
        owner_path: &str,
        owner_config: Option<&CompiledElementConfig>,
    ) -> Option<&'a Particle> {
        let eligible: Vec<&'a Particle> = group
            .members
            .iter()
            .filter(|member| !self.branch_truncates(ctx, member))
            .collect();
        if eligible.is_empty() {
            return None;
        }

        if let Some(choice) = owner_config.and_then(|config| config.choice.as_deref()) {
            if let Some(branch) = eligible
                .iter()
                .copied()
                .find(|member| particle_declares(member, choice))
            {
                debug!(owner = owner_path, choice, "configured choice branch");
                return Some(branch);
            }
            ctx.warn(GenerationIssue::warning(
                "choice_not_found",
                format!("configured choice '{choice}' is not an eligible branch"),
                Some(owner_path),
            ));
        }

        let mode = self.config.settings.mode;
        if mode != GenerationMode::Complete
            && let Some(branch) = eligible
                .iter()
                .copied()
                .find(|member| self.particle_forced(member, owner_path))
        {
            return Some(branch);
        }

        if let Some(branch) = eligible
            .iter()
            .copied()
            .find(|member| member.min_occurs() >= 1)
        {
            return Some(branch);
        }

        let index = ctx.rng.random_range(0..eligible.len());
        debug!(owner = owner_path, index, "random choice branch");
        eligible.get(index).copied()
    }

    fn branch_truncates(&self, ctx: &GenerationContext, particle: &Particle) -> bool {
        match particle {
            Particle::Element(node) => self
                .schema
                .resolve_type(node)
                .ok()
                .and_then(|resolved| resolved.identity)
                .is_some_and(|identity| self.would_truncate(ctx, identity)),
            Particle::Group(_) => false,
        }
    }

    fn particle_forced(&self, particle: &Particle, owner_path: &str) -> bool {
        let mode = self.config.settings.mode;
        match particle {
            Particle::Element(node) => self
                .index
                .is_forced(&join_path(owner_path, &node.name), mode),
            Particle::Group(nested) => nested
                .members
                .iter()
                .any(|member| self.particle_forced(member, owner_path)),
        }
    }
}

fn particle_declares(particle: &Particle, name: &str) -> bool {
    match particle {
        Particle::Element(node) => node.name == name,
        Particle::Group(group) => group
            .members
            .iter()
            .any(|member| particle_declares(member, name)),
    }
}

fn join_path(parent: &str, name: &str) -> String {
    if parent.is_empty() {
        name.to_string()
    } else {
        format!("{parent}/{name}")
    }
}

/// Requested count within `[min, max]` and never above `ceiling`.
/// The schema minimum always wins.
pub fn clamp_occurs(requested: u32, min: u32, max: MaxOccurs, ceiling: u32) -> u32 {
    let upper = max.limit().map_or(ceiling, |limit| limit.min(ceiling));
    requested.min(upper).max(min)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clamps_to_schema_range() {
        assert_eq!(clamp_occurs(2, 1, MaxOccurs::Bounded(1), 10), 1);
        assert_eq!(clamp_occurs(3, 1, MaxOccurs::UNBOUNDED, 10), 3);
        assert_eq!(clamp_occurs(50, 0, MaxOccurs::UNBOUNDED, 10), 10);
        assert_eq!(clamp_occurs(0, 2, MaxOccurs::Bounded(5), 10), 2);
        assert_eq!(clamp_occurs(5, 12, MaxOccurs::UNBOUNDED, 10), 12);
        assert_eq!(clamp_occurs(50, 0, MaxOccurs::Bounded(100), 5), 5);
        assert_eq!(clamp_occurs(50, 7, MaxOccurs::Bounded(100), 5), 7);
    }

    #[test]
    fn joins_paths() {
        assert_eq!(join_path("", "Root"), "Root");
        assert_eq!(join_path("Root", "Child"), "Root/Child");
    }
}
