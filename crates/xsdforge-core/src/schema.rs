use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::content::{ContentModelGroup, MaxOccurs, default_min_occurs};
use crate::error::{Error, Result};
use crate::facets::{PrimitiveType, SimpleTypeFacets};

/// Navigable schema model produced by the external XSD parser.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct SchemaModel {
    /// Contract version for this model format.
    pub schema_version: String,
    /// Target namespace of the schema, when declared.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_namespace: Option<String>,
    /// Global element declarations; candidates for the document root.
    pub elements: Vec<SchemaNode>,
    /// Named type definitions referenced by `type_ref`.
    #[serde(default)]
    pub types: Vec<TypeDefinition>,
}

/// Element declaration.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct SchemaNode {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
    /// Named type or built-in (`xs:string`, ...).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub type_ref: Option<String>,
    #[serde(default = "default_min_occurs")]
    pub min_occurs: u32,
    #[serde(default)]
    pub max_occurs: MaxOccurs,
    #[serde(default)]
    pub nillable: bool,
    /// Anonymous simple type.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub simple_type: Option<SimpleTypeFacets>,
    /// Anonymous complex type content.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<ContentModelGroup>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attributes: Vec<AttributeDecl>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fixed: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<String>,
}

impl SchemaNode {
    /// Required single element referencing a named or built-in type.
    pub fn typed(name: impl Into<String>, type_ref: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            namespace: None,
            type_ref: Some(type_ref.into()),
            min_occurs: 1,
            max_occurs: MaxOccurs::Bounded(1),
            nillable: false,
            simple_type: None,
            content: None,
            attributes: Vec::new(),
            fixed: None,
            default: None,
        }
    }

    /// Element with an anonymous simple type.
    pub fn simple(name: impl Into<String>, facets: SimpleTypeFacets) -> Self {
        let mut node = Self::typed(name, "");
        node.type_ref = None;
        node.simple_type = Some(facets);
        node
    }

    /// Element with an anonymous complex type.
    pub fn complex(name: impl Into<String>, content: ContentModelGroup) -> Self {
        let mut node = Self::typed(name, "");
        node.type_ref = None;
        node.content = Some(content);
        node
    }

    pub fn with_occurs(mut self, min_occurs: u32, max_occurs: MaxOccurs) -> Self {
        self.min_occurs = min_occurs;
        self.max_occurs = max_occurs;
        self
    }

    pub fn optional(self) -> Self {
        let max = self.max_occurs;
        self.with_occurs(0, max)
    }

    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = Some(namespace.into());
        self
    }

    pub fn with_attribute(mut self, attribute: AttributeDecl) -> Self {
        self.attributes.push(attribute);
        self
    }
}

/// Named type definition. Exactly one of `simple_type`/`content` may be set;
/// neither means an empty complex type.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct TypeDefinition {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub simple_type: Option<SimpleTypeFacets>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<ContentModelGroup>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attributes: Vec<AttributeDecl>,
}

impl TypeDefinition {
    pub fn simple(name: impl Into<String>, facets: SimpleTypeFacets) -> Self {
        Self {
            name: name.into(),
            simple_type: Some(facets),
            content: None,
            attributes: Vec::new(),
        }
    }

    pub fn complex(name: impl Into<String>, content: ContentModelGroup) -> Self {
        Self {
            name: name.into(),
            simple_type: None,
            content: Some(content),
            attributes: Vec::new(),
        }
    }
}

/// Attribute declaration.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct AttributeDecl {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
    /// Named simple type or built-in; absent means `xs:string`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub type_ref: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub simple_type: Option<SimpleTypeFacets>,
    #[serde(default)]
    pub required: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fixed: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<String>,
}

impl AttributeDecl {
    pub fn new(name: impl Into<String>, type_ref: impl Into<String>, required: bool) -> Self {
        Self {
            name: name.into(),
            namespace: None,
            type_ref: Some(type_ref.into()),
            simple_type: None,
            required,
            fixed: None,
            default: None,
        }
    }
}

/// Content of a resolved element type.
#[derive(Debug, Clone, Copy)]
pub enum TypeContent<'a> {
    Builtin(PrimitiveType),
    Simple(&'a SimpleTypeFacets),
    Complex(&'a ContentModelGroup),
    Empty,
}

/// Element type after following `type_ref`.
#[derive(Debug, Clone)]
pub struct ResolvedType<'a> {
    /// Named type identity; `None` for anonymous and built-in types.
    pub identity: Option<&'a str>,
    pub content: TypeContent<'a>,
    pub attributes: Vec<&'a AttributeDecl>,
}

impl SchemaModel {
    pub fn type_definition(&self, name: &str) -> Option<&TypeDefinition> {
        self.types.iter().find(|definition| definition.name == name)
    }

    pub fn root_element(&self, name: &str) -> Option<&SchemaNode> {
        self.elements.iter().find(|node| node.name == name)
    }

    /// Follow a node's type reference and return its effective content.
    pub fn resolve_type<'a>(&'a self, node: &'a SchemaNode) -> Result<ResolvedType<'a>> {
        let mut attributes: Vec<&AttributeDecl> = node.attributes.iter().collect();

        if let Some(facets) = &node.simple_type {
            return Ok(ResolvedType {
                identity: None,
                content: TypeContent::Simple(facets),
                attributes,
            });
        }
        if let Some(content) = &node.content {
            return Ok(ResolvedType {
                identity: None,
                content: TypeContent::Complex(content),
                attributes,
            });
        }

        let type_ref = node
            .type_ref
            .as_deref()
            .filter(|value| !value.trim().is_empty())
            .ok_or_else(|| {
                Error::InvalidSchema(format!(
                    "element '{}' has no type reference or inline type",
                    node.name
                ))
            })?;

        if let Some(primitive) = PrimitiveType::from_type_name(type_ref) {
            return Ok(ResolvedType {
                identity: None,
                content: TypeContent::Builtin(primitive),
                attributes,
            });
        }

        let definition = self.type_definition(type_ref).ok_or_else(|| {
            Error::InvalidSchema(format!(
                "element '{}' references unknown type '{}'",
                node.name, type_ref
            ))
        })?;
        attributes.extend(definition.attributes.iter());

        let content = match (&definition.simple_type, &definition.content) {
            (Some(facets), None) => TypeContent::Simple(facets),
            (None, Some(content)) => TypeContent::Complex(content),
            (None, None) => TypeContent::Empty,
            (Some(_), Some(_)) => {
                return Err(Error::InvalidSchema(format!(
                    "type '{}' declares both simple and complex content",
                    definition.name
                )));
            }
        };

        Ok(ResolvedType {
            identity: Some(definition.name.as_str()),
            content,
            attributes,
        })
    }

    /// Facets of an attribute, defaulting to `xs:string`.
    pub fn resolve_attribute_facets(&self, attribute: &AttributeDecl) -> Result<SimpleTypeFacets> {
        if let Some(facets) = &attribute.simple_type {
            return Ok(facets.clone());
        }
        let Some(type_ref) = attribute.type_ref.as_deref() else {
            return Ok(SimpleTypeFacets::new(PrimitiveType::String));
        };
        if let Some(primitive) = PrimitiveType::from_type_name(type_ref) {
            return Ok(SimpleTypeFacets::new(primitive));
        }
        self.type_definition(type_ref)
            .and_then(|definition| definition.simple_type.clone())
            .ok_or_else(|| {
                Error::InvalidSchema(format!(
                    "attribute '{}' references unknown simple type '{}'",
                    attribute.name, type_ref
                ))
            })
    }
}
