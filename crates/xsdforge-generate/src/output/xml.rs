use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use xsdforge_config::GlobalOverrides;

use crate::document::{GeneratedDocument, GeneratedNode, NodeChild};
use crate::errors::GenerationError;

const XSI_NAMESPACE: &str = "http://www.w3.org/2001/XMLSchema-instance";

/// Serialization settings.
#[derive(Debug, Clone)]
pub struct XmlOptions {
    /// Spaces per nesting level.
    pub indent: usize,
    /// Namespace URI to prefix.
    pub namespace_prefixes: BTreeMap<String, String>,
    /// Emit the `<?xml ...?>` declaration.
    pub declaration: bool,
}

impl Default for XmlOptions {
    fn default() -> Self {
        Self {
            indent: 2,
            namespace_prefixes: BTreeMap::new(),
            declaration: true,
        }
    }
}

impl XmlOptions {
    /// Options from `global_overrides`; its prefix map is keyed by prefix.
    pub fn from_overrides(overrides: &GlobalOverrides) -> Self {
        let namespace_prefixes = overrides
            .namespace_prefixes
            .iter()
            .map(|(prefix, uri)| (uri.clone(), prefix.clone()))
            .collect();
        Self {
            namespace_prefixes,
            ..Self::default()
        }
    }
}

/// Serialize a document to a UTF-8 string.
pub fn to_xml_string(document: &GeneratedDocument, options: &XmlOptions) -> String {
    let mut buffer = Vec::new();
    // Writing into a Vec cannot fail.
    let _ = write_xml(&mut buffer, document, options);
    String::from_utf8_lossy(&buffer).into_owned()
}

/// Write a document to `path`, returning the bytes written.
pub fn write_document(
    path: &Path,
    document: &GeneratedDocument,
    options: &XmlOptions,
) -> Result<u64, GenerationError> {
    let mut writer = CountingWriter::new(BufWriter::new(File::create(path)?));
    write_xml(&mut writer, document, options)?;
    writer.flush()?;
    Ok(writer.bytes_written())
}

/// Serialize a document into any writer.
pub fn write_xml<W: Write>(
    writer: &mut W,
    document: &GeneratedDocument,
    options: &XmlOptions,
) -> std::io::Result<()> {
    let namespaces = Namespaces::collect(&document.root, options);
    if options.declaration {
        writeln!(writer, "<?xml version=\"1.0\" encoding=\"UTF-8\"?>")?;
    }
    let mut serializer = Serializer {
        writer,
        options,
        namespaces: &namespaces,
    };
    serializer.element(&document.root, 0, None, true)?;
    Ok(())
}

/// Namespace declarations, all placed on the root element.
#[derive(Debug)]
struct Namespaces {
    default: Option<String>,
    /// URI to prefix, for prefixed namespaces.
    prefixes: BTreeMap<String, String>,
    /// Declaration order of prefixed namespaces.
    declared: Vec<(String, String)>,
    uses_nil: bool,
}

impl Namespaces {
    fn collect(root: &GeneratedNode, options: &XmlOptions) -> Self {
        let mut element_namespaces = Vec::new();
        let mut attribute_namespaces = Vec::new();
        let mut uses_nil = false;
        walk(root, &mut |node| {
            if let Some(uri) = &node.namespace
                && !element_namespaces.contains(uri)
            {
                element_namespaces.push(uri.clone());
            }
            for attribute in &node.attributes {
                if let Some(uri) = &attribute.namespace
                    && !attribute_namespaces.contains(uri)
                {
                    attribute_namespaces.push(uri.clone());
                }
            }
            uses_nil |= node.nil;
        });

        let default = root
            .namespace
            .as_ref()
            .filter(|uri| !options.namespace_prefixes.contains_key(*uri))
            .cloned();

        let mut namespaces = Self {
            default,
            prefixes: BTreeMap::new(),
            declared: Vec::new(),
            uses_nil,
        };
        let mut counter = 0_usize;
        for uri in &element_namespaces {
            if namespaces.default.as_ref() != Some(uri) {
                namespaces.assign(uri, options, &mut counter);
            }
        }
        // Attributes never pick up the default namespace, so they always need a prefix.
        for uri in &attribute_namespaces {
            namespaces.assign(uri, options, &mut counter);
        }
        namespaces
    }

    fn assign(&mut self, uri: &str, options: &XmlOptions, counter: &mut usize) {
        if self.prefixes.contains_key(uri) {
            return;
        }
        let prefix = match options.namespace_prefixes.get(uri) {
            Some(prefix) => prefix.clone(),
            None => loop {
                *counter += 1;
                let candidate = format!("ns{counter}");
                let taken = options.namespace_prefixes.values().any(|p| *p == candidate)
                    || self.prefixes.values().any(|p| *p == candidate);
                if !taken {
                    break candidate;
                }
            },
        };
        self.prefixes.insert(uri.to_string(), prefix.clone());
        self.declared.push((prefix, uri.to_string()));
    }

    fn element_name(&self, node: &GeneratedNode) -> String {
        match &node.namespace {
            Some(uri) if self.default.as_ref() != Some(uri) => match self.prefixes.get(uri) {
                Some(prefix) => format!("{prefix}:{}", node.name),
                None => node.name.clone(),
            },
            _ => node.name.clone(),
        }
    }

    fn attribute_name(&self, name: &str, namespace: Option<&str>) -> String {
        match namespace.and_then(|uri| self.prefixes.get(uri)) {
            Some(prefix) => format!("{prefix}:{name}"),
            None => name.to_string(),
        }
    }
}

fn walk(node: &GeneratedNode, visit: &mut dyn FnMut(&GeneratedNode)) {
    visit(node);
    for child in node.elements() {
        walk(child, visit);
    }
}

struct Serializer<'w, W: Write> {
    writer: &'w mut W,
    options: &'w XmlOptions,
    namespaces: &'w Namespaces,
}

impl<W: Write> Serializer<'_, W> {
    /// `default_ns` is the default namespace in scope at the parent.
    fn element(
        &mut self,
        node: &GeneratedNode,
        depth: usize,
        default_ns: Option<&str>,
        is_root: bool,
    ) -> std::io::Result<()> {
        let namespaces = self.namespaces;
        let name = namespaces.element_name(node);
        self.pad(depth)?;
        write!(self.writer, "<{name}")?;

        let mut scope_default = default_ns;
        if is_root {
            if let Some(uri) = &namespaces.default {
                write!(self.writer, " xmlns=\"{}\"", escape_attribute(uri))?;
                scope_default = Some(uri.as_str());
            }
            for (prefix, uri) in &namespaces.declared {
                write!(self.writer, " xmlns:{prefix}=\"{}\"", escape_attribute(uri))?;
            }
            if namespaces.uses_nil {
                write!(self.writer, " xmlns:xsi=\"{XSI_NAMESPACE}\"")?;
            }
        } else if node.namespace.is_none() && default_ns.is_some() {
            write!(self.writer, " xmlns=\"\"")?;
            scope_default = None;
        }

        for attribute in &node.attributes {
            let attribute_name = namespaces.attribute_name(&attribute.name, attribute.namespace.as_deref());
            write!(
                self.writer,
                " {attribute_name}=\"{}\"",
                escape_attribute(&attribute.value)
            )?;
        }
        if node.nil {
            write!(self.writer, " xsi:nil=\"true\"")?;
        }

        let text = node.text.as_deref().filter(|text| !text.is_empty());
        if node.children.is_empty() {
            return match text {
                Some(text) => writeln!(self.writer, ">{}</{name}>", escape_text(text)),
                None => writeln!(self.writer, "/>"),
            };
        }

        writeln!(self.writer, ">")?;
        if let Some(text) = text {
            self.pad(depth + 1)?;
            writeln!(self.writer, "{}", escape_text(text))?;
        }
        for child in &node.children {
            match child {
                NodeChild::Element(element) => {
                    self.element(element, depth + 1, scope_default, false)?
                }
                NodeChild::Comment { text } => {
                    self.pad(depth + 1)?;
                    writeln!(self.writer, "<!-- {} -->", sanitize_comment(text))?;
                }
            }
        }
        self.pad(depth)?;
        writeln!(self.writer, "</{name}>")
    }

    fn pad(&mut self, depth: usize) -> std::io::Result<()> {
        write!(self.writer, "{:width$}", "", width = depth * self.options.indent)
    }
}

fn escape_text(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for ch in value.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            _ => escaped.push(ch),
        }
    }
    escaped
}

fn escape_attribute(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for ch in value.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\n' => escaped.push_str("&#10;"),
            '\r' => escaped.push_str("&#13;"),
            '\t' => escaped.push_str("&#9;"),
            _ => escaped.push(ch),
        }
    }
    escaped
}

/// Comments may not contain `--` or end with `-`.
fn sanitize_comment(text: &str) -> String {
    let mut sanitized = text.replace("--", "- -");
    while sanitized.contains("--") {
        sanitized = sanitized.replace("--", "- -");
    }
    if sanitized.ends_with('-') {
        sanitized.push(' ');
    }
    sanitized
}

struct CountingWriter<W: Write> {
    inner: W,
    bytes: u64,
}

impl<W: Write> CountingWriter<W> {
    fn new(inner: W) -> Self {
        Self { inner, bytes: 0 }
    }

    fn bytes_written(&self) -> u64 {
        self.bytes
    }
}

impl<W: Write> Write for CountingWriter<W> {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        let size = self.inner.write(buf)?;
        self.bytes = self.bytes.saturating_add(size as u64);
        Ok(size)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.inner.flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::GeneratedAttribute;

    fn leaf(name: &str, text: &str) -> GeneratedNode {
        let mut node = GeneratedNode::new(name, None);
        node.text = Some(text.to_string());
        node
    }

    fn document(root: GeneratedNode) -> GeneratedDocument {
        GeneratedDocument { root }
    }

    #[test]
    fn writes_indented_tree() {
        let mut root = GeneratedNode::new("Order", None);
        root.push_comment("Item: occurrence 1 of 1");
        root.push_element(leaf("Item", "a & b"));
        root.push_element(GeneratedNode::new("Empty", None));
        let xml = to_xml_string(&document(root), &XmlOptions::default());
        assert_eq!(
            xml,
            "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n\
             <Order>\n  <!-- Item: occurrence 1 of 1 -->\n  <Item>a &amp; b</Item>\n  <Empty/>\n</Order>\n"
        );
    }

    #[test]
    fn escapes_attributes() {
        let mut root = GeneratedNode::new("Root", None);
        root.attributes.push(GeneratedAttribute {
            name: "label".to_string(),
            namespace: None,
            value: "say \"hi\" <now>".to_string(),
        });
        let xml = to_xml_string(&document(root), &XmlOptions::default());
        assert!(xml.contains("label=\"say &quot;hi&quot; &lt;now&gt;\""));
    }

    #[test]
    fn root_namespace_becomes_default() {
        let mut root = GeneratedNode::new("Root", Some("urn:a".to_string()));
        root.push_element(GeneratedNode::new("Local", None));
        root.push_element(GeneratedNode::new("Qualified", Some("urn:a".to_string())));
        let xml = to_xml_string(&document(root), &XmlOptions::default());
        assert!(xml.contains("<Root xmlns=\"urn:a\">"));
        assert!(xml.contains("<Local xmlns=\"\"/>"));
        assert!(xml.contains("<Qualified/>"));
    }

    #[test]
    fn configured_and_auto_prefixes() {
        let mut root = GeneratedNode::new("Root", Some("urn:a".to_string()));
        root.push_element(GeneratedNode::new("Other", Some("urn:b".to_string())));
        let mut overrides = GlobalOverrides::default();
        overrides
            .namespace_prefixes
            .insert("a".to_string(), "urn:a".to_string());
        let xml = to_xml_string(&document(root), &XmlOptions::from_overrides(&overrides));
        assert!(xml.contains("<a:Root xmlns:a=\"urn:a\" xmlns:ns1=\"urn:b\">"));
        assert!(xml.contains("<ns1:Other/>"));
        assert!(xml.contains("</a:Root>"));
    }

    #[test]
    fn xsi_declared_only_when_nil_used() {
        let plain = to_xml_string(&document(leaf("Root", "x")), &XmlOptions::default());
        assert!(!plain.contains("xmlns:xsi"));

        let mut root = GeneratedNode::new("Root", None);
        let mut child = GeneratedNode::new("Maybe", None);
        child.nil = true;
        root.push_element(child);
        let xml = to_xml_string(&document(root), &XmlOptions::default());
        assert!(xml.contains(&format!("xmlns:xsi=\"{XSI_NAMESPACE}\"")));
        assert!(xml.contains("<Maybe xsi:nil=\"true\"/>"));
    }

    #[test]
    fn comments_never_contain_double_dash() {
        assert_eq!(sanitize_comment("a--b"), "a- -b");
        assert_eq!(sanitize_comment("a---"), "a- - - ");
        assert!(!sanitize_comment("----").contains("--"));
    }

    #[test]
    fn write_document_counts_bytes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("document.xml");
        let doc = document(leaf("Root", "x"));
        let bytes = write_document(&path, &doc, &XmlOptions::default()).unwrap();
        let written = std::fs::read_to_string(&path).unwrap();
        assert_eq!(bytes, written.len() as u64);
        assert_eq!(written, to_xml_string(&doc, &XmlOptions::default()));
    }
}
