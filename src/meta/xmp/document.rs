//! Generic XML document tree with qualified names
//!
//! The XMP codec works on a small namespace-aware document model: each
//! node records its qualified name (namespace URI + local name), its
//! attributes, its character data and its children. Namespace prefix
//! declarations are kept in the attribute list under the pseudo-space
//! `xmlns`, so serialization can rewrite qualified names back to the
//! prefixed form using the declarations in scope.

use quick_xml::escape::unescape;
use quick_xml::events::attributes::Attribute;
use quick_xml::events::{BytesEnd, BytesStart, BytesText, Event};
use quick_xml::name::{PrefixDeclaration, ResolveResult};
use quick_xml::{NsReader, Writer};
use std::io::Cursor;

use crate::core::error::{MetaError, MetaResult};

/// Pseudo namespace recording prefix declarations in attribute lists.
pub const XMLNS: &str = "xmlns";

/// A qualified XML name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct Name {
    /// Namespace URI, empty for unqualified names.
    pub space: String,
    /// Local part.
    pub local: String,
}

impl Name {
    pub fn new(space: impl Into<String>, local: impl Into<String>) -> Name {
        Name {
            space: space.into(),
            local: local.into(),
        }
    }
}

/// An attribute as a qualified name/value pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attr {
    pub name: Name,
    pub value: String,
}

impl Attr {
    pub fn new(name: Name, value: impl Into<String>) -> Attr {
        Attr {
            name,
            value: value.into(),
        }
    }

    /// The declared prefix when this is an `xmlns:prefix` declaration,
    /// empty for a default declaration, `None` otherwise.
    pub fn ns_declaration(&self) -> Option<&str> {
        if self.name.space == XMLNS {
            Some(&self.name.local)
        } else if self.name.space.is_empty() && self.name.local == XMLNS {
            Some("")
        } else {
            None
        }
    }
}

/// An XML element node.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Node {
    pub name: Name,
    pub attrs: Vec<Attr>,
    /// Character data directly inside the element, whitespace-trimmed.
    pub value: String,
    pub children: Vec<Node>,
}

impl Node {
    pub fn new(name: Name) -> Node {
        Node {
            name,
            ..Node::default()
        }
    }

    /// Returns the first attribute with the given name.
    pub fn attr(&self, name: &Name) -> Option<&Attr> {
        self.attrs.iter().find(|a| &a.name == name)
    }
}

/// Parses an XML document into its root element node.
pub fn parse(p: &[u8]) -> MetaResult<Node> {
    let text = std::str::from_utf8(p)
        .map_err(|e| MetaError::format(format!("xmp: invalid UTF-8: {}", e)))?;

    let mut reader = NsReader::from_str(text);
    reader.config_mut().trim_text(true);

    let mut stack: Vec<Node> = Vec::new();
    let mut root: Option<Node> = None;

    loop {
        let (resolve, event) = reader
            .read_resolved_event()
            .map_err(|e| MetaError::format(format!("xmp: invalid XML format: {}", e)))?;
        // the resolved namespace borrows the reader; detach it before
        // attribute resolution needs the reader again
        let space = match &resolve {
            ResolveResult::Bound(ns) => String::from_utf8_lossy(ns.as_ref()).into_owned(),
            _ => String::new(),
        };
        match event {
            Event::Start(e) => {
                let node = start_node(&reader, space, &e)?;
                stack.push(node);
            }
            Event::Empty(e) => {
                let node = start_node(&reader, space, &e)?;
                close_node(node, &mut stack, &mut root)?;
            }
            Event::Text(e) => {
                if let Some(top) = stack.last_mut() {
                    let raw = String::from_utf8_lossy(e.as_ref()).into_owned();
                    let text = unescape(&raw)
                        .map(|s| s.into_owned())
                        .unwrap_or(raw);
                    let trimmed = text.trim();
                    if !trimmed.is_empty() {
                        top.value = trimmed.to_string();
                    }
                }
            }
            Event::End(_) => {
                let node = stack
                    .pop()
                    .ok_or_else(|| MetaError::format("xmp: invalid XML format"))?;
                close_node(node, &mut stack, &mut root)?;
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if !stack.is_empty() {
        return Err(MetaError::format("xmp: invalid XML format"));
    }
    root.ok_or_else(|| MetaError::format("xmp: invalid XML format"))
}

fn start_node<R>(reader: &NsReader<R>, space: String, e: &BytesStart<'_>) -> MetaResult<Node> {
    let local = String::from_utf8_lossy(e.local_name().as_ref()).into_owned();

    let mut node = Node::new(Name::new(space, local));
    for a in e.attributes().flatten() {
        node.attrs.push(decode_attr(reader, &a)?);
    }
    Ok(node)
}

fn decode_attr<R>(reader: &NsReader<R>, a: &Attribute<'_>) -> MetaResult<Attr> {
    let value = a
        .unescape_value()
        .map(|v| v.into_owned())
        .unwrap_or_else(|_| String::from_utf8_lossy(&a.value).into_owned());

    // keep namespace declarations addressable under the xmlns space
    if let Some(decl) = a.key.as_namespace_binding() {
        let name = match decl {
            PrefixDeclaration::Default => Name::new("", XMLNS),
            PrefixDeclaration::Named(p) => {
                Name::new(XMLNS, String::from_utf8_lossy(p).into_owned())
            }
        };
        return Ok(Attr::new(name, value));
    }

    let (resolve, local) = reader.resolve_attribute(a.key);
    let space = match resolve {
        ResolveResult::Bound(ns) => String::from_utf8_lossy(ns.as_ref()).into_owned(),
        _ => String::new(),
    };
    Ok(Attr::new(
        Name::new(space, String::from_utf8_lossy(local.as_ref()).into_owned()),
        value,
    ))
}

fn close_node(node: Node, stack: &mut Vec<Node>, root: &mut Option<Node>) -> MetaResult<()> {
    match stack.last_mut() {
        Some(parent) => {
            parent.children.push(node);
            Ok(())
        }
        None => {
            if root.is_some() {
                return Err(MetaError::format("xmp: invalid XML format"));
            }
            *root = Some(node);
            Ok(())
        }
    }
}

/// Serializes the document, translating qualified names back to the
/// prefixed form declared by in-scope `xmlns` attributes.
pub fn serialize(root: &Node) -> MetaResult<String> {
    let mut writer = Writer::new_with_indent(Cursor::new(Vec::new()), b' ', 1);
    let mut scope = PrefixScope::default();
    write_node(&mut writer, root, &mut scope)?;

    let out = writer.into_inner().into_inner();
    String::from_utf8(out).map_err(|e| MetaError::format(format!("xmp: marshal failed: {}", e)))
}

#[derive(Default)]
struct PrefixScope {
    // innermost declarations last; lookup scans backwards
    ns: Vec<(String, String)>, // (uri, prefix)
}

impl PrefixScope {
    fn prefix_of(&self, uri: &str) -> Option<&str> {
        self.ns
            .iter()
            .rev()
            .find(|(u, _)| u == uri)
            .map(|(_, p)| p.as_str())
    }
}

fn write_node(
    writer: &mut Writer<Cursor<Vec<u8>>>,
    node: &Node,
    scope: &mut PrefixScope,
) -> MetaResult<()> {
    let top = scope.ns.len();
    for a in &node.attrs {
        if let Some(prefix) = a.ns_declaration() {
            scope.ns.push((a.value.clone(), prefix.to_string()));
        }
    }

    let elem_name = qualified(&node.name, scope);
    let mut start = BytesStart::new(elem_name.as_str());
    for a in &node.attrs {
        let attr_name = if a.ns_declaration().is_some() {
            if a.name.local.is_empty() || a.name.local == XMLNS {
                XMLNS.to_string()
            } else {
                format!("{}:{}", XMLNS, a.name.local)
            }
        } else {
            qualified(&a.name, scope)
        };
        start.push_attribute((attr_name.as_str(), a.value.as_str()));
    }

    if node.children.is_empty() && node.value.is_empty() {
        writer
            .write_event(Event::Empty(start))
            .map_err(ser_err)?;
    } else {
        writer.write_event(Event::Start(start)).map_err(ser_err)?;
        if !node.value.is_empty() {
            writer
                .write_event(Event::Text(BytesText::new(&node.value)))
                .map_err(ser_err)?;
        }
        for child in &node.children {
            write_node(writer, child, scope)?;
        }
        writer
            .write_event(Event::End(BytesEnd::new(elem_name.as_str())))
            .map_err(ser_err)?;
    }

    scope.ns.truncate(top);
    Ok(())
}

fn qualified(name: &Name, scope: &PrefixScope) -> String {
    if name.space.is_empty() {
        return name.local.clone();
    }
    match scope.prefix_of(&name.space) {
        Some("") | None => name.local.clone(),
        Some(prefix) => format!("{}:{}", prefix, name.local),
    }
}

fn ser_err(e: std::io::Error) -> MetaError {
    MetaError::format(format!("xmp: marshal failed: {}", e))
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"<rdf:RDF xmlns:rdf="http://www.w3.org/1999/02/22-rdf-syntax-ns#">
 <rdf:Description xmlns:xmp="http://ns.adobe.com/xap/1.0/">
  <xmp:Rating>5</xmp:Rating>
 </rdf:Description>
</rdf:RDF>"#;

    const RDF: &str = "http://www.w3.org/1999/02/22-rdf-syntax-ns#";
    const XMP: &str = "http://ns.adobe.com/xap/1.0/";

    #[test]
    fn test_parse_qualified_names() {
        let root = parse(SAMPLE.as_bytes()).unwrap();
        assert_eq!(root.name, Name::new(RDF, "RDF"));
        assert_eq!(root.children.len(), 1);

        let descr = &root.children[0];
        assert_eq!(descr.name, Name::new(RDF, "Description"));
        assert_eq!(
            descr.attr(&Name::new(XMLNS, "xmp")).map(|a| a.value.as_str()),
            Some(XMP)
        );

        let rating = &descr.children[0];
        assert_eq!(rating.name, Name::new(XMP, "Rating"));
        assert_eq!(rating.value, "5");
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(parse(b"not xml <<<").is_err());
        assert!(parse(b"").is_err());
    }

    #[test]
    fn test_serialize_round_trip() {
        let root = parse(SAMPLE.as_bytes()).unwrap();
        let text = serialize(&root).unwrap();
        let again = parse(text.as_bytes()).unwrap();
        assert_eq!(root, again);
    }

    #[test]
    fn test_serialize_escapes_values() {
        let mut root = Node::new(Name::new("", "root"));
        root.value = "a < b & c".to_string();
        let text = serialize(&root).unwrap();
        assert!(text.contains("a &lt; b &amp; c"));

        let again = parse(text.as_bytes()).unwrap();
        assert_eq!(again.value, "a < b & c");
    }

    #[test]
    fn test_prefix_translation_uses_scope() {
        // declaration on an inner node applies to that subtree only
        let root = parse(SAMPLE.as_bytes()).unwrap();
        let text = serialize(&root).unwrap();
        assert!(text.contains("<xmp:Rating>"));
        assert!(text.contains("<rdf:Description"));
    }
}
