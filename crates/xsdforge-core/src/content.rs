use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::schema::SchemaNode;

/// Compositor of a content model group.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum GroupKind {
    Sequence,
    Choice,
    All,
}

/// Group structure governing child ordering/selection for a complex type.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ContentModelGroup {
    pub kind: GroupKind,
    /// Ordered members (element declarations or nested groups).
    #[serde(default)]
    pub members: Vec<Particle>,
    #[serde(default = "default_min_occurs")]
    pub min_occurs: u32,
    #[serde(default)]
    pub max_occurs: MaxOccurs,
}

impl ContentModelGroup {
    pub fn new(kind: GroupKind, members: Vec<Particle>) -> Self {
        Self {
            kind,
            members,
            min_occurs: 1,
            max_occurs: MaxOccurs::Bounded(1),
        }
    }

    pub fn sequence(members: Vec<Particle>) -> Self {
        Self::new(GroupKind::Sequence, members)
    }

    pub fn choice(members: Vec<Particle>) -> Self {
        Self::new(GroupKind::Choice, members)
    }

    pub fn with_occurs(mut self, min_occurs: u32, max_occurs: MaxOccurs) -> Self {
        self.min_occurs = min_occurs;
        self.max_occurs = max_occurs;
        self
    }
}

/// Member of a content model group.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "particle", rename_all = "snake_case")]
pub enum Particle {
    Element(SchemaNode),
    Group(ContentModelGroup),
}

impl Particle {
    pub fn min_occurs(&self) -> u32 {
        match self {
            Particle::Element(node) => node.min_occurs,
            Particle::Group(group) => group.min_occurs,
        }
    }

    pub fn max_occurs(&self) -> MaxOccurs {
        match self {
            Particle::Element(node) => node.max_occurs,
            Particle::Group(group) => group.max_occurs,
        }
    }
}

/// Upper occurrence bound; serialized as a number or the `"unbounded"` keyword.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, JsonSchema)]
#[serde(untagged)]
pub enum MaxOccurs {
    Bounded(u32),
    Unbounded(UnboundedKeyword),
}

/// The literal `"unbounded"`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, JsonSchema)]
pub enum UnboundedKeyword {
    #[serde(rename = "unbounded")]
    Unbounded,
}

impl MaxOccurs {
    pub const UNBOUNDED: MaxOccurs = MaxOccurs::Unbounded(UnboundedKeyword::Unbounded);

    /// Finite limit, or `None` when unbounded.
    pub fn limit(&self) -> Option<u32> {
        match self {
            MaxOccurs::Bounded(value) => Some(*value),
            MaxOccurs::Unbounded(_) => None,
        }
    }

    pub fn is_repeatable(&self) -> bool {
        self.limit().is_none_or(|limit| limit > 1)
    }
}

impl Default for MaxOccurs {
    fn default() -> Self {
        MaxOccurs::Bounded(1)
    }
}

impl std::fmt::Display for MaxOccurs {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MaxOccurs::Bounded(value) => write!(f, "{value}"),
            MaxOccurs::Unbounded(_) => f.write_str("unbounded"),
        }
    }
}

pub(crate) fn default_min_occurs() -> u32 {
    1
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn max_occurs_accepts_number_and_keyword() {
        let bounded: MaxOccurs = serde_json::from_str("3").unwrap();
        assert_eq!(bounded, MaxOccurs::Bounded(3));
        let unbounded: MaxOccurs = serde_json::from_str("\"unbounded\"").unwrap();
        assert_eq!(unbounded, MaxOccurs::UNBOUNDED);
        assert!(serde_json::from_str::<MaxOccurs>("\"many\"").is_err());
    }

    #[test]
    fn repeatable_only_above_one() {
        assert!(!MaxOccurs::Bounded(1).is_repeatable());
        assert!(MaxOccurs::Bounded(2).is_repeatable());
        assert!(MaxOccurs::UNBOUNDED.is_repeatable());
    }
}
