use std::collections::BTreeSet;

use crate::content::{ContentModelGroup, Particle};
use crate::error::{Error, Result};
use crate::facets::PrimitiveType;
use crate::schema::{AttributeDecl, SchemaModel, SchemaNode};

/// Validate internal consistency of a schema model.
///
/// This checks:
/// - duplicate global elements/types and empty names
/// - every element has a type reference or an inline type
/// - type references point at a built-in or a declared type
/// - occurrence ranges are well formed
/// - attribute names are unique per element and their types are simple
pub fn validate_schema(schema: &SchemaModel) -> Result<()> {
    let mut type_names = BTreeSet::new();
    for definition in &schema.types {
        if definition.name.trim().is_empty() {
            return Err(Error::InvalidSchema("type with empty name".to_string()));
        }
        if !type_names.insert(definition.name.as_str()) {
            return Err(Error::InvalidSchema(format!(
                "duplicate type name: {}",
                definition.name
            )));
        }
        if definition.simple_type.is_some() && definition.content.is_some() {
            return Err(Error::InvalidSchema(format!(
                "type '{}' declares both simple and complex content",
                definition.name
            )));
        }
    }

    let mut element_names = BTreeSet::new();
    for node in &schema.elements {
        if !element_names.insert(node.name.as_str()) {
            return Err(Error::InvalidSchema(format!(
                "duplicate global element: {}",
                node.name
            )));
        }
        validate_node(schema, node, &node.name)?;
    }

    for definition in &schema.types {
        validate_attributes(schema, &definition.attributes, &definition.name)?;
        if let Some(content) = &definition.content {
            validate_group(schema, content, &definition.name)?;
        }
    }

    Ok(())
}

fn validate_node(schema: &SchemaModel, node: &SchemaNode, path: &str) -> Result<()> {
    if node.name.trim().is_empty() {
        return Err(Error::InvalidSchema(format!(
            "element with empty name under '{path}'"
        )));
    }
    if let Some(max) = node.max_occurs.limit()
        && node.min_occurs > max
    {
        return Err(Error::InvalidSchema(format!(
            "element '{path}' has minOccurs {} greater than maxOccurs {max}",
            node.min_occurs
        )));
    }

    let inline_count = usize::from(node.simple_type.is_some()) + usize::from(node.content.is_some());
    if inline_count > 1 {
        return Err(Error::InvalidSchema(format!(
            "element '{path}' declares both simple and complex inline types"
        )));
    }
    if inline_count == 1 && node.type_ref.as_deref().is_some_and(|t| !t.trim().is_empty()) {
        return Err(Error::InvalidSchema(format!(
            "element '{path}' declares both a type reference and an inline type"
        )));
    }

    // Resolution reports missing and unknown type references.
    schema.resolve_type(node)?;
    validate_attributes(schema, &node.attributes, path)?;

    if let Some(content) = &node.content {
        validate_group(schema, content, path)?;
    }
    Ok(())
}

fn validate_group(schema: &SchemaModel, group: &ContentModelGroup, path: &str) -> Result<()> {
    if let Some(max) = group.max_occurs.limit()
        && group.min_occurs > max
    {
        return Err(Error::InvalidSchema(format!(
            "group under '{path}' has minOccurs {} greater than maxOccurs {max}",
            group.min_occurs
        )));
    }

    for member in &group.members {
        match member {
            Particle::Element(node) => {
                validate_node(schema, node, &format!("{path}/{}", node.name))?;
            }
            Particle::Group(nested) => validate_group(schema, nested, path)?,
        }
    }
    Ok(())
}

fn validate_attributes(schema: &SchemaModel, attributes: &[AttributeDecl], path: &str) -> Result<()> {
    let mut names = BTreeSet::new();
    for attribute in attributes {
        if !names.insert(attribute.name.as_str()) {
            return Err(Error::InvalidSchema(format!(
                "duplicate attribute '{}' on '{path}'",
                attribute.name
            )));
        }
        if let Some(type_ref) = attribute.type_ref.as_deref()
            && PrimitiveType::from_type_name(type_ref).is_none()
        {
            let definition = schema.type_definition(type_ref).ok_or_else(|| {
                Error::InvalidSchema(format!(
                    "attribute '{}' on '{path}' references unknown type '{type_ref}'",
                    attribute.name
                ))
            })?;
            if definition.simple_type.is_none() {
                return Err(Error::Unsupported(format!(
                    "attribute '{}' on '{path}' references complex type '{type_ref}'",
                    attribute.name
                )));
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::{ContentModelGroup, MaxOccurs, Particle};
    use crate::facets::{PrimitiveType, SimpleTypeFacets};
    use crate::schema::{SchemaNode, TypeDefinition};

    fn model(elements: Vec<SchemaNode>, types: Vec<TypeDefinition>) -> SchemaModel {
        SchemaModel {
            schema_version: "0.1".to_string(),
            target_namespace: None,
            elements,
            types,
        }
    }

    #[test]
    fn accepts_recursive_named_type() {
        let node_type = TypeDefinition::complex(
            "NodeType",
            ContentModelGroup::sequence(vec![
                Particle::Element(SchemaNode::typed("Label", "xs:string")),
                Particle::Element(SchemaNode::typed("Node", "NodeType").optional()),
            ]),
        );
        let schema = model(vec![SchemaNode::typed("Node", "NodeType")], vec![node_type]);
        assert!(validate_schema(&schema).is_ok());
    }

    #[test]
    fn rejects_missing_type_reference() {
        let mut node = SchemaNode::typed("Broken", "");
        node.type_ref = None;
        let root = SchemaNode::complex(
            "Root",
            ContentModelGroup::sequence(vec![Particle::Element(node)]),
        );
        let err = validate_schema(&model(vec![root], Vec::new())).unwrap_err();
        assert!(err.to_string().contains("Broken"));
    }

    #[test]
    fn rejects_unknown_type_reference() {
        let schema = model(vec![SchemaNode::typed("Root", "MissingType")], Vec::new());
        assert!(matches!(
            validate_schema(&schema),
            Err(Error::InvalidSchema(message)) if message.contains("MissingType")
        ));
    }

    #[test]
    fn rejects_inverted_occurs() {
        let child = SchemaNode::typed("Item", "xs:int").with_occurs(3, MaxOccurs::Bounded(2));
        let root = SchemaNode::complex(
            "Root",
            ContentModelGroup::sequence(vec![Particle::Element(child)]),
        );
        assert!(validate_schema(&model(vec![root], Vec::new())).is_err());
    }

    #[test]
    fn rejects_duplicate_types() {
        let facets = SimpleTypeFacets::new(PrimitiveType::String);
        let schema = model(
            vec![SchemaNode::typed("Root", "Code")],
            vec![
                TypeDefinition::simple("Code", facets.clone()),
                TypeDefinition::simple("Code", facets),
            ],
        );
        assert!(validate_schema(&schema).is_err());
    }
}
