use serde::Serialize;

/// Generated XML document.
#[derive(Debug, Clone, Serialize)]
pub struct GeneratedDocument {
    pub root: GeneratedNode,
}

/// Generated element. Attached to its parent only once complete, or marked
/// truncated.
#[derive(Debug, Clone, Default, Serialize)]
pub struct GeneratedNode {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub attributes: Vec<GeneratedAttribute>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<NodeChild>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    /// Emitted as `xsi:nil="true"`.
    pub nil: bool,
    /// Cut short by the depth guard or a timeout.
    pub truncated: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct GeneratedAttribute {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
    pub value: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum NodeChild {
    Element(GeneratedNode),
    Comment { text: String },
}

impl GeneratedNode {
    pub fn new(name: impl Into<String>, namespace: Option<String>) -> Self {
        Self {
            name: name.into(),
            namespace,
            ..Self::default()
        }
    }

    pub fn push_element(&mut self, child: GeneratedNode) {
        self.children.push(NodeChild::Element(child));
    }

    pub fn push_comment(&mut self, text: impl Into<String>) {
        self.children.push(NodeChild::Comment { text: text.into() });
    }

    pub fn elements(&self) -> impl Iterator<Item = &GeneratedNode> {
        self.children.iter().filter_map(|child| match child {
            NodeChild::Element(node) => Some(node),
            NodeChild::Comment { .. } => None,
        })
    }

    pub fn comments(&self) -> impl Iterator<Item = &str> {
        self.children.iter().filter_map(|child| match child {
            NodeChild::Comment { text } => Some(text.as_str()),
            NodeChild::Element(_) => None,
        })
    }

    /// Direct children with a given local name.
    pub fn children_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a GeneratedNode> {
        self.elements().filter(move |node| node.name == name)
    }

    pub fn child(&self, name: &str) -> Option<&GeneratedNode> {
        self.elements().find(|node| node.name == name)
    }

    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|attribute| attribute.name == name)
            .map(|attribute| attribute.value.as_str())
    }

    /// Every descendant element with a given local name, in document order.
    pub fn descendants_named<'a>(&'a self, name: &str) -> Vec<&'a GeneratedNode> {
        let mut found = Vec::new();
        self.collect_named(name, &mut found);
        found
    }

    fn collect_named<'a>(&'a self, name: &str, found: &mut Vec<&'a GeneratedNode>) {
        for child in self.elements() {
            if child.name == name {
                found.push(child);
            }
            child.collect_named(name, found);
        }
    }

    /// Follow a slash-separated path of child names, taking the first match.
    pub fn find(&self, path: &str) -> Option<&GeneratedNode> {
        path.split('/')
            .filter(|segment| !segment.is_empty())
            .try_fold(self, |node, segment| node.child(segment))
    }

    /// Nesting depth of this subtree (a leaf counts as 1).
    pub fn depth(&self) -> usize {
        1 + self.elements().map(GeneratedNode::depth).max().unwrap_or(0)
    }

    pub fn mark_truncated(&mut self) {
        self.truncated = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn trip() -> GeneratedNode {
        let mut root = GeneratedNode::new("Trip", None);
        let mut leg = GeneratedNode::new("Leg", None);
        leg.push_element(GeneratedNode::new("City", None));
        root.push_comment("occurs 1..2");
        root.push_element(leg);
        root.push_element(GeneratedNode::new("Leg", None));
        root
    }

    #[test]
    fn child_lookup_outlives_the_name() {
        let root = trip();
        let found = {
            let name = String::from("Leg");
            root.child(&name)
        };
        assert_eq!(found.map(|node| node.children.len()), Some(1));
        assert!(root.child("Missing").is_none());
    }

    #[test]
    fn path_lookup_and_depth() {
        let root = trip();
        assert_eq!(root.find("Leg/City").map(|node| node.name.as_str()), Some("City"));
        assert_eq!(root.children_named("Leg").count(), 2);
        assert_eq!(root.comments().count(), 1);
        assert_eq!(root.depth(), 3);
    }
}
