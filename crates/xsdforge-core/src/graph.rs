use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::content::{ContentModelGroup, Particle};
use crate::facets::PrimitiveType;
use crate::schema::{SchemaModel, SchemaNode};

/// Summary of the named-type reference graph.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TypeGraphSummary {
    pub nodes: usize,
    pub edges: usize,
}

/// Report for named-type references and recursion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TypeGraphReport {
    pub summary: TypeGraphSummary,
    /// Dependency order (referenced types first) when the graph is acyclic.
    pub topo_order: Option<Vec<String>>,
    /// Types that can reach themselves through element references.
    pub recursive_types: Vec<String>,
}

/// Build a deterministic type reference report for a schema model.
pub fn build_type_graph_report(schema: &SchemaModel) -> TypeGraphReport {
    let graph = build_adjacency(schema);
    let nodes = graph.len();
    let edges = graph.values().map(|targets| targets.len()).sum();

    let recursive_types = graph
        .keys()
        .filter(|name| reaches(&graph, name, name))
        .cloned()
        .collect::<Vec<_>>();

    TypeGraphReport {
        summary: TypeGraphSummary { nodes, edges },
        topo_order: toposort(&graph).ok(),
        recursive_types,
    }
}

/// Edges point from a type to every named type its content references.
fn build_adjacency(schema: &SchemaModel) -> BTreeMap<String, BTreeSet<String>> {
    let mut graph: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();

    for definition in &schema.types {
        let targets = graph.entry(definition.name.clone()).or_default();
        if let Some(content) = &definition.content {
            collect_group_refs(content, targets);
        }
    }

    graph
}

fn collect_group_refs(group: &ContentModelGroup, targets: &mut BTreeSet<String>) {
    for member in &group.members {
        match member {
            Particle::Element(node) => collect_node_refs(node, targets),
            Particle::Group(nested) => collect_group_refs(nested, targets),
        }
    }
}

fn collect_node_refs(node: &SchemaNode, targets: &mut BTreeSet<String>) {
    if let Some(type_ref) = node.type_ref.as_deref()
        && !type_ref.is_empty()
        && PrimitiveType::from_type_name(type_ref).is_none()
    {
        targets.insert(type_ref.to_string());
    }
    if let Some(content) = &node.content {
        collect_group_refs(content, targets);
    }
}

fn reaches(graph: &BTreeMap<String, BTreeSet<String>>, from: &str, target: &str) -> bool {
    let mut stack: Vec<&str> = graph
        .get(from)
        .map(|targets| targets.iter().map(String::as_str).collect())
        .unwrap_or_default();
    let mut visited = BTreeSet::new();

    while let Some(node) = stack.pop() {
        if node == target {
            return true;
        }
        if !visited.insert(node) {
            continue;
        }
        if let Some(targets) = graph.get(node) {
            stack.extend(targets.iter().map(String::as_str));
        }
    }
    false
}

fn toposort(graph: &BTreeMap<String, BTreeSet<String>>) -> Result<Vec<String>, Vec<String>> {
    let mut remaining: BTreeMap<&str, usize> = BTreeMap::new();
    for (node, targets) in graph {
        let known = targets.iter().filter(|t| graph.contains_key(*t)).count();
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

        for (dependent, targets) in graph {
            if targets.contains(node)
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::{ContentModelGroup, Particle};
    use crate::schema::{SchemaNode, TypeDefinition};

    fn schema(types: Vec<TypeDefinition>) -> SchemaModel {
        SchemaModel {
            schema_version: "0.1".to_string(),
            target_namespace: None,
            elements: Vec::new(),
            types,
        }
    }

    #[test]
    fn detects_self_recursion() {
        let node_type = TypeDefinition::complex(
            "NodeType",
            ContentModelGroup::sequence(vec![Particle::Element(
                SchemaNode::typed("Node", "NodeType").optional(),
            )]),
        );
        let report = build_type_graph_report(&schema(vec![node_type]));
        assert_eq!(report.recursive_types, vec!["NodeType".to_string()]);
        assert!(report.topo_order.is_none());
    }

    #[test]
    fn orders_referenced_types_first() {
        let address = TypeDefinition::complex(
            "AddressType",
            ContentModelGroup::sequence(vec![Particle::Element(SchemaNode::typed(
                "City",
                "xs:string",
            ))]),
        );
        let customer = TypeDefinition::complex(
            "CustomerType",
            ContentModelGroup::sequence(vec![Particle::Element(SchemaNode::typed(
                "Address",
                "AddressType",
            ))]),
        );
        let report = build_type_graph_report(&schema(vec![customer, address]));
        let order = report.topo_order.expect("acyclic graph");
        let address_idx = order.iter().position(|t| t == "AddressType").unwrap();
        let customer_idx = order.iter().position(|t| t == "CustomerType").unwrap();
        assert!(address_idx < customer_idx);
        assert!(report.recursive_types.is_empty());
        assert_eq!(report.summary.edges, 1);
    }
}
