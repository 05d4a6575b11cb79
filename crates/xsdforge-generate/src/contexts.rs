use std::collections::{BTreeMap, BTreeSet};

use serde_json::{Map, Value};
use xsdforge_config::{DataContextDef, scalar_lexical};

use crate::errors::GenerationError;

/// Merged data contexts with dotted-path lookups.
///
/// A child context sees its parents' merged values (later parents win) with
/// its own top-level keys layered on top.
#[derive(Debug, Clone, Default)]
pub struct DataContextResolver {
    merged: BTreeMap<String, Value>,
}

impl DataContextResolver {
    pub fn new(contexts: &BTreeMap<String, DataContextDef>) -> Result<Self, GenerationError> {
        let order = inheritance_order(contexts)?;
        let mut merged: BTreeMap<String, Value> = BTreeMap::new();

        for name in order {
            let Some(definition) = contexts.get(&name) else {
                continue;
            };
            let mut view = Map::new();
            for parent in &definition.inherits {
                if let Some(Value::Object(parent_view)) = merged.get(parent) {
                    for (key, value) in parent_view {
                        view.insert(key.clone(), value.clone());
                    }
                }
            }
            for (key, value) in &definition.values {
                view.insert(key.clone(), value.clone());
            }
            merged.insert(name, Value::Object(view));
        }

        Ok(Self { merged })
    }

    /// Resolve `context.key.nested[.index]`.
    pub fn resolve(&self, path: &str) -> Result<&Value, GenerationError> {
        let mut segments = path.split('.').filter(|segment| !segment.is_empty());
        let context_name = segments
            .next()
            .ok_or_else(|| GenerationError::configuration("empty data context path"))?;
        let mut current = self.merged.get(context_name).ok_or_else(|| {
            GenerationError::configuration(format!(
                "data context path '{path}': unknown context '{context_name}'"
            ))
        })?;

        for segment in segments {
            let next = match current {
                Value::Object(map) => map.get(segment),
                Value::Array(items) => segment.parse::<usize>().ok().and_then(|idx| items.get(idx)),
                _ => None,
            };
            current = next.ok_or_else(|| {
                GenerationError::configuration(format!(
                    "data context path '{path}': segment '{segment}' does not resolve"
                ))
            })?;
        }

        Ok(current)
    }

    /// Scalar candidates at a path. A lone scalar is a pool of one.
    pub fn resolve_pool(&self, path: &str) -> Result<Vec<String>, GenerationError> {
        match self.resolve(path)? {
            Value::Array(items) => items
                .iter()
                .map(|item| {
                    scalar_lexical(item).ok_or_else(|| {
                        GenerationError::configuration(format!(
                            "data context path '{path}' must hold scalar values"
                        ))
                    })
                })
                .collect(),
            value => scalar_lexical(value).map(|lexical| vec![lexical]).ok_or_else(|| {
                GenerationError::configuration(format!(
                    "data context path '{path}' is not a list of values"
                ))
            }),
        }
    }

    /// Object records at a path, for personas and templates.
    pub fn resolve_records(&self, path: &str) -> Result<&[Value], GenerationError> {
        match self.resolve(path)? {
            Value::Array(items) if items.iter().all(Value::is_object) => Ok(items.as_slice()),
            _ => Err(GenerationError::configuration(format!(
                "data context path '{path}' is not a list of records"
            ))),
        }
    }
}

/// Look up a record key, falling back to a case-insensitive match.
pub fn record_field<'v>(record: &'v Value, key: &str) -> Option<&'v Value> {
    let map = record.as_object()?;
    map.get(key).or_else(|| {
        map.iter()
            .find(|(candidate, _)| candidate.eq_ignore_ascii_case(key))
            .map(|(_, value)| value)
    })
}

fn inheritance_order(
    contexts: &BTreeMap<String, DataContextDef>,
) -> Result<Vec<String>, GenerationError> {
    for (name, definition) in contexts {
        if let Some(parent) = definition
            .inherits
            .iter()
            .find(|parent| !contexts.contains_key(*parent))
        {
            return Err(GenerationError::configuration(format!(
                "data context '{name}' inherits unknown context '{parent}'"
            )));
        }
    }

    let mut remaining: BTreeMap<&str, usize> = contexts
        .iter()
        .map(|(name, definition)| {
            let parents: BTreeSet<&str> = definition.inherits.iter().map(String::as_str).collect();
            (name.as_str(), parents.len())
        })
        .collect();
    let mut ready: BTreeSet<&str> = remaining
        .iter()
        .filter_map(|(name, count)| (*count == 0).then_some(*name))
        .collect();
    let mut order = Vec::with_capacity(contexts.len());

    while let Some(name) = ready.iter().next().copied() {
        ready.remove(name);
        order.push(name.to_string());
        for (child, definition) in contexts {
            let parents: BTreeSet<&str> = definition.inherits.iter().map(String::as_str).collect();
            if parents.contains(name)
                && let Some(count) = remaining.get_mut(child.as_str())
            {
                *count = count.saturating_sub(1);
                if *count == 0 {
                    ready.insert(child.as_str());
                }
            }
        }
    }

    if order.len() != contexts.len() {
        let stuck = remaining
            .into_iter()
            .filter_map(|(name, count)| (count > 0).then_some(name))
            .collect::<Vec<_>>();
        return Err(GenerationError::configuration(format!(
            "data context inheritance cycle among: {}",
            stuck.join(", ")
        )));
    }
    Ok(order)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn context(inherits: &[&str], values: Value) -> DataContextDef {
        let values = match values {
            Value::Object(map) => map.into_iter().collect(),
            _ => BTreeMap::new(),
        };
        DataContextDef {
            inherits: inherits.iter().map(|s| s.to_string()).collect(),
            values,
        }
    }

    #[test]
    fn child_overrides_parent_key() {
        let mut contexts = BTreeMap::new();
        contexts.insert(
            "base".to_string(),
            context(&[], json!({"cities": ["X", "Y"], "currency": "EUR"})),
        );
        contexts.insert("child".to_string(), context(&["base"], json!({"cities": ["Z"]})));

        let resolver = DataContextResolver::new(&contexts).unwrap();
        assert_eq!(resolver.resolve_pool("child.cities").unwrap(), vec!["Z"]);
        assert_eq!(resolver.resolve_pool("child.currency").unwrap(), vec!["EUR"]);
        assert_eq!(resolver.resolve_pool("base.cities").unwrap(), vec!["X", "Y"]);
    }

    #[test]
    fn later_parent_wins() {
        let mut contexts = BTreeMap::new();
        contexts.insert("a".to_string(), context(&[], json!({"k": "from-a"})));
        contexts.insert("b".to_string(), context(&[], json!({"k": "from-b"})));
        contexts.insert("c".to_string(), context(&["a", "b"], json!({})));
        let resolver = DataContextResolver::new(&contexts).unwrap();
        assert_eq!(resolver.resolve_pool("c.k").unwrap(), vec!["from-b"]);
    }

    #[test]
    fn resolves_nested_paths_and_indices() {
        let mut contexts = BTreeMap::new();
        contexts.insert(
            "geo".to_string(),
            context(&[], json!({"airports": {"codes": ["LIS", "MAD"]}})),
        );
        let resolver = DataContextResolver::new(&contexts).unwrap();
        assert_eq!(
            resolver.resolve("geo.airports.codes.1").unwrap(),
            &json!("MAD")
        );
    }

    #[test]
    fn unresolved_segment_names_the_path() {
        let mut contexts = BTreeMap::new();
        contexts.insert("geo".to_string(), context(&[], json!({"airports": {}})));
        let resolver = DataContextResolver::new(&contexts).unwrap();
        let err = resolver.resolve("geo.airports.codes").unwrap_err();
        assert!(err.to_string().contains("geo.airports.codes"));
    }

    #[test]
    fn rejects_cycles_and_unknown_parents() {
        let mut contexts = BTreeMap::new();
        contexts.insert("a".to_string(), context(&["b"], json!({})));
        contexts.insert("b".to_string(), context(&["a"], json!({})));
        assert!(DataContextResolver::new(&contexts).is_err());

        let mut contexts = BTreeMap::new();
        contexts.insert("a".to_string(), context(&["ghost"], json!({})));
        let err = DataContextResolver::new(&contexts).unwrap_err();
        assert!(err.to_string().contains("ghost"));
    }

    #[test]
    fn record_lookup_is_case_insensitive() {
        let record = json!({"First_Name": "Ana"});
        assert_eq!(record_field(&record, "first_name"), Some(&json!("Ana")));
    }
}
