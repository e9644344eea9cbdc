//! XMP (RDF/XML) metadata codec
//!
//! XMP Storage:
//! - The document is `rdf:RDF`, optionally wrapped in `x:xmpmeta`
//! - Attributes live as element children of `rdf:Description` nodes,
//!   identified by namespace URI + local name
//! - On disk the document sits between the `<?xpacket?>` sentinels
//!
//! The codec keeps two caches beside the document: the value of every
//! attribute node keyed by qualified name, and the `rdf:Description`
//! carrying each namespace (from its `xmlns` declarations). Set and
//! delete maintain the caches and the tree together.

pub mod document;
pub mod names;

use std::collections::HashMap;

use crate::core::error::{MetaError, MetaResult};
use crate::core::metadata::AttrValue;
use crate::meta::MetadataFormat;
use document::{Attr, Name, Node, XMLNS};
use names::{attr_conv, ns, prefix_for};

const XPACKET_BEGIN: &str = r#"<?xpacket begin="?" id="W5M0MpCehiHzreSzNTczkc9d"?>"#;
const XPACKET_END: &str = r#"<?xpacket end="w"?>"#;

/// Toolkit identifier written into the x:xmpmeta wrapper.
const TOOLKIT: &str = "metakit/0.1";

/// Decoded XMP metadata.
#[derive(Debug, Clone)]
pub struct Xmp {
    /// Document root: the `x:xmpmeta` wrapper or a bare `rdf:RDF`.
    root: Node,
    has_wrapper: bool,

    /// Attribute node values keyed by qualified name.
    attrs: HashMap<Name, String>,
    /// Namespace URI to the index of its Description under `rdf:RDF`.
    descr_ns: HashMap<String, usize>,
}

impl Default for Xmp {
    /// An empty document: a bare `rdf:RDF` with the rdf prefix declared.
    fn default() -> Self {
        let mut rdf = Node::new(Name::new(ns::RDF, "RDF"));
        rdf.attrs.push(Attr::new(
            Name::new(XMLNS, ns::RDF_PREFIX),
            ns::RDF,
        ));
        Xmp {
            root: rdf,
            has_wrapper: false,
            attrs: HashMap::new(),
            descr_ns: HashMap::new(),
        }
    }
}

impl Xmp {
    /// Decodes an XMP packet or bare RDF/XML document.
    pub fn decode(p: &[u8]) -> MetaResult<Xmp> {
        let root = document::parse(p)?;

        let mut x = Xmp {
            root,
            has_wrapper: false,
            attrs: HashMap::new(),
            descr_ns: HashMap::new(),
        };
        x.cache_rdfs()?;
        Ok(x)
    }

    /// Encodes the document wrapped in the XMP packet sentinels.
    ///
    /// A bare `rdf:RDF` root gets the `x:xmpmeta` wrapper restored,
    /// carrying a toolkit identifier.
    pub fn encode(&self) -> MetaResult<Vec<u8>> {
        let body = if self.has_wrapper {
            document::serialize(&self.root)?
        } else {
            let mut wrapper = Node::new(Name::new(ns::META, "xmpmeta"));
            wrapper
                .attrs
                .push(Attr::new(Name::new(XMLNS, ns::META_PREFIX), ns::META));
            wrapper
                .attrs
                .push(Attr::new(Name::new(ns::META, "xmptk"), TOOLKIT));
            wrapper.children.push(self.root.clone());
            document::serialize(&wrapper)?
        };

        Ok(format!("{}\n{}\n{}\n", XPACKET_BEGIN, body, XPACKET_END).into_bytes())
    }

    /// Validates the document shape and rebuilds both caches.
    fn cache_rdfs(&mut self) -> MetaResult<()> {
        self.has_wrapper = self.root.name == Name::new(ns::META, "xmpmeta");
        if self.has_wrapper && self.root.children.len() != 1 {
            return Err(MetaError::format("xmp: invalid XML format"));
        }

        let rdf = self.rdf();
        if rdf.name != Name::new(ns::RDF, "RDF") {
            return Err(MetaError::format("xmp: invalid XML format"));
        }

        let mut attrs = HashMap::new();
        let mut descr_ns = HashMap::new();
        for (i, n) in rdf.children.iter().enumerate() {
            if n.name != Name::new(ns::RDF, "Description") {
                continue;
            }
            for a in &n.attrs {
                if let Some(prefix) = a.ns_declaration() {
                    if !prefix.is_empty() {
                        descr_ns.entry(a.value.clone()).or_insert(i);
                    }
                }
            }
            for c in &n.children {
                attrs.insert(c.name.clone(), c.value.clone());
            }
        }

        self.attrs = attrs;
        self.descr_ns = descr_ns;
        Ok(())
    }

    fn rdf(&self) -> &Node {
        if self.has_wrapper {
            &self.root.children[0]
        } else {
            &self.root
        }
    }

    fn rdf_mut(&mut self) -> &mut Node {
        if self.has_wrapper {
            &mut self.root.children[0]
        } else {
            &mut self.root
        }
    }

    /// The cached text value of an attribute node.
    pub fn value(&self, name: &Name) -> Option<&str> {
        self.attrs.get(name).map(|s| s.as_str())
    }

    /// Replaces or appends the attribute node `name`, creating the
    /// namespace's Description when absent. Keeps both caches current.
    pub fn set_value(&mut self, name: Name, value: String) -> MetaResult<()> {
        let idx = match self.descr_ns.get(&name.space) {
            Some(i) => *i,
            None => self.add_description(&name.space)?,
        };

        let descr = &mut self.rdf_mut().children[idx];
        match descr.children.iter_mut().find(|c| c.name == name) {
            Some(child) => child.value = value.clone(),
            None => {
                let mut n = Node::new(name.clone());
                n.value = value.clone();
                descr.children.push(n);
            }
        }

        self.attrs.insert(name, value);
        Ok(())
    }

    /// Removes the attribute node `name` from every Description and
    /// from the cache.
    pub fn delete_value(&mut self, name: &Name) {
        let rdf = self.rdf_mut();
        for descr in &mut rdf.children {
            if descr.name == Name::new(ns::RDF, "Description") {
                descr.children.retain(|c| &c.name != name);
            }
        }
        self.attrs.remove(name);
    }

    /// Appends a new `rdf:Description` declaring `space` under a
    /// recognised prefix and registers it in the namespace cache.
    fn add_description(&mut self, space: &str) -> MetaResult<usize> {
        let prefix = prefix_for(space).ok_or_else(|| {
            MetaError::BadValue(format!("xmp: unknown namespace {:?}", space))
        })?;

        let mut d = Node::new(Name::new(ns::RDF, "Description"));
        d.attrs
            .push(Attr::new(Name::new(ns::RDF, "about"), ""));
        d.attrs.push(Attr::new(Name::new(XMLNS, prefix), space));
        if !self.declares(ns::RDF) {
            d.attrs
                .push(Attr::new(Name::new(XMLNS, ns::RDF_PREFIX), ns::RDF));
        }

        let rdf = self.rdf_mut();
        rdf.children.push(d);
        let idx = rdf.children.len() - 1;
        self.descr_ns.insert(space.to_string(), idx);
        Ok(idx)
    }

    /// Whether the document root (or RDF root) declares `uri`.
    fn declares(&self, uri: &str) -> bool {
        let decl = |n: &Node| {
            n.attrs
                .iter()
                .any(|a| a.ns_declaration().is_some() && a.value == uri)
        };
        decl(&self.root) || decl(self.rdf())
    }

    /// Number of cached attribute nodes.
    pub fn attr_count(&self) -> usize {
        self.attrs.len()
    }
}

impl MetadataFormat for Xmp {
    fn name(&self) -> &'static str {
        crate::meta::FORMAT_XMP
    }

    fn unmarshal(&mut self, p: &[u8]) -> MetaResult<()> {
        *self = Xmp::decode(p)?;
        Ok(())
    }

    fn marshal(&self) -> MetaResult<Vec<u8>> {
        self.encode()
    }

    fn get_attr(&self, attr: &str) -> Option<AttrValue> {
        let c = attr_conv(attr)?;
        let v = self.value(&c.name())?;
        c.conv.parse(v)
    }

    fn set_attr(&mut self, attr: &str, value: &AttrValue) -> MetaResult<()> {
        let c = attr_conv(attr)
            .ok_or_else(|| MetaError::BadValue(format!("xmp: unknown attr {:?}", attr)))?;
        let s = c.conv.format(value).ok_or_else(|| {
            MetaError::BadValue(format!("xmp: can't store {:?} in attr {:?}", value, attr))
        })?;
        self.set_value(c.name(), s)
    }

    fn delete_attr(&mut self, attr: &str) -> MetaResult<()> {
        let c = attr_conv(attr)
            .ok_or_else(|| MetaError::BadValue(format!("xmp: unknown attr {:?}", attr)))?;
        self.delete_value(&c.name());
        Ok(())
    }
}
