use std::collections::{HashMap, HashSet};
use std::time::{Duration, Instant};

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use tracing::warn;

use crate::errors::GenerationError;
use crate::facets::PatternCache;
use crate::model::{GenerateOptions, GenerationIssue, GenerationReport};
use crate::relationships::RelationshipState;
use crate::selection::SelectionState;

/// Mutable state of one generation run. Never shared between runs.
#[derive(Debug)]
pub struct GenerationContext {
    pub seed: u64,
    /// Shared run RNG; every random draw outside `seeded` selection uses it.
    pub rng: ChaCha8Rng,
    pub selection: SelectionState,
    pub relationships: RelationshipState,
    pub patterns: PatternCache,
    pub report: GenerationReport,
    type_stack: Vec<String>,
    unique_values: HashMap<(u64, String), HashSet<String>>,
    next_scope: u64,
    steps: u64,
    max_steps: u64,
    started: Instant,
    timeout: Option<Duration>,
    halted: bool,
}

impl GenerationContext {
    pub fn new(seed: u64, options: &GenerateOptions, report: GenerationReport) -> Self {
        Self {
            seed,
            rng: ChaCha8Rng::seed_from_u64(seed),
            selection: SelectionState::new(),
            relationships: RelationshipState::default(),
            patterns: PatternCache::new(),
            report,
            type_stack: Vec::new(),
            unique_values: HashMap::new(),
            next_scope: 0,
            steps: 0,
            max_steps: options.max_steps,
            started: Instant::now(),
            timeout: options.timeout_ms.map(Duration::from_millis),
            halted: false,
        }
    }

    /// Count one recursive build call against the step and time budget.
    pub fn tick(&mut self) -> Result<(), GenerationError> {
        self.steps += 1;
        self.report.steps = self.steps;
        let over_steps = self.steps > self.max_steps;
        let over_time = self
            .timeout
            .is_some_and(|timeout| self.started.elapsed() > timeout);
        if over_steps || over_time {
            return Err(GenerationError::Timeout {
                steps: self.steps,
                elapsed_ms: self.elapsed_ms(),
            });
        }
        Ok(())
    }

    /// Stop the walk; open ancestors attach what they have, marked truncated.
    pub fn halt(&mut self) {
        self.halted = true;
        self.report.partial = true;
    }

    pub fn is_halted(&self) -> bool {
        self.halted
    }

    pub fn elapsed_ms(&self) -> u64 {
        self.started.elapsed().as_millis() as u64
    }

    pub fn push_type(&mut self, identity: &str) {
        self.type_stack.push(identity.to_string());
    }

    pub fn pop_type(&mut self) {
        self.type_stack.pop();
    }

    /// Occurrences of a named type on the current path.
    pub fn type_occurrences(&self, identity: &str) -> u32 {
        self.type_stack
            .iter()
            .filter(|entry| entry.as_str() == identity)
            .count() as u32
    }

    /// Length of the unbroken run of `identity` at the top of the stack.
    pub fn immediate_recursion(&self, identity: &str) -> u32 {
        self.type_stack
            .iter()
            .rev()
            .take_while(|entry| entry.as_str() == identity)
            .count() as u32
    }

    /// Fresh id for a complex element instance; scopes sibling uniqueness.
    pub fn open_scope(&mut self) -> u64 {
        self.next_scope += 1;
        self.next_scope
    }

    pub fn is_used(&self, scope: u64, path: &str, value: &str) -> bool {
        self.unique_values
            .get(&(scope, path.to_string()))
            .is_some_and(|values| values.contains(value))
    }

    pub fn mark_used(&mut self, scope: u64, path: &str, value: &str) {
        self.unique_values
            .entry((scope, path.to_string()))
            .or_default()
            .insert(value.to_string());
    }

    /// Record a non-fatal issue in the report and the log.
    pub fn warn(&mut self, issue: GenerationIssue) {
        warn!(
            code = %issue.code,
            path = issue.path.as_deref().unwrap_or(""),
            relationship = issue.relationship.as_deref().unwrap_or(""),
            message = %issue.message,
            "generation warning"
        );
        self.report.record_warning(issue);
    }
}
