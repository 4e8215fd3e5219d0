//! Minimal XML element tree built from quick-xml events
//!
//! Extractors need selector-style lookups ("first `severity` below this
//! `result`", "every `ReportItem` under this `ReportHost`"), so documents are
//! materialized into a small owned tree. Text is kept verbatim (no trimming)
//! so concatenated text matches what the document actually says.

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use threatscope_core::{Error, Result};

#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Element(Element),
    Text(String),
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Element {
    name: String,
    attributes: Vec<(String, String)>,
    children: Vec<Node>,
}

/// A parsed, well-formed document with exactly one root element
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    root: Element,
}

fn malformed(err: impl std::fmt::Display) -> Error {
    Error::MalformedInput(err.to_string())
}

fn open_element(start: &BytesStart<'_>) -> Result<Element> {
    let name = String::from_utf8_lossy(start.name().as_ref()).to_string();
    let mut attributes = Vec::new();
    for attr in start.attributes() {
        let attr = attr.map_err(malformed)?;
        let key = String::from_utf8_lossy(attr.key.as_ref()).to_string();
        let value = attr.unescape_value().map_err(malformed)?.to_string();
        attributes.push((key, value));
    }
    Ok(Element {
        name,
        attributes,
        children: Vec::new(),
    })
}

impl Document {
    /// Parse document text. Anything short of one well-formed root element
    /// is `MalformedInput`.
    pub fn parse(text: &str) -> Result<Self> {
        let mut reader = Reader::from_str(text.trim_start_matches('\u{feff}'));
        reader.trim_text(false);

        let mut stack: Vec<Element> = Vec::new();
        let mut root: Option<Element> = None;
        let mut buf = Vec::new();

        loop {
            let event = reader.read_event_into(&mut buf).map_err(|e| {
                Error::MalformedInput(format!(
                    "XML error at position {}: {}",
                    reader.buffer_position(),
                    e
                ))
            })?;

            match event {
                Event::Start(e) => {
                    if stack.is_empty() && root.is_some() {
                        return Err(malformed("more than one root element"));
                    }
                    stack.push(open_element(&e)?);
                }
                Event::Empty(e) => {
                    let element = open_element(&e)?;
                    match stack.last_mut() {
                        Some(parent) => parent.children.push(Node::Element(element)),
                        None if root.is_none() => root = Some(element),
                        None => return Err(malformed("more than one root element")),
                    }
                }
                Event::End(_) => {
                    // quick-xml checks that end names match their start tags
                    let Some(element) = stack.pop() else {
                        return Err(malformed("unexpected closing tag"));
                    };
                    match stack.last_mut() {
                        Some(parent) => parent.children.push(Node::Element(element)),
                        None => root = Some(element),
                    }
                }
                Event::Text(e) => {
                    let text = e.unescape().map_err(malformed)?;
                    match stack.last_mut() {
                        Some(parent) => parent.children.push(Node::Text(text.to_string())),
                        None if text.trim().is_empty() => {}
                        None => return Err(malformed("text outside the root element")),
                    }
                }
                Event::CData(e) => {
                    let text = String::from_utf8_lossy(&e.into_inner()).to_string();
                    match stack.last_mut() {
                        Some(parent) => parent.children.push(Node::Text(text)),
                        None => return Err(malformed("CDATA outside the root element")),
                    }
                }
                Event::Eof => break,
                // Declarations, comments, processing instructions, doctype
                _ => {}
            }
            buf.clear();
        }

        if let Some(open) = stack.last() {
            return Err(malformed(format!("unclosed element <{}>", open.name)));
        }
        let root = root.ok_or_else(|| malformed("document has no root element"))?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Element {
        &self.root
    }
}

impl Element {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn attr(&self, key: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Attribute value, treating an empty value as absent
    pub fn attr_nonempty(&self, key: &str) -> Option<&str> {
        self.attr(key).filter(|v| !v.is_empty())
    }

    /// Direct child elements
    pub fn children(&self) -> impl Iterator<Item = &Element> {
        self.children.iter().filter_map(|node| match node {
            Node::Element(e) => Some(e),
            Node::Text(_) => None,
        })
    }

    pub fn child(&self, name: &str) -> Option<&Element> {
        self.children().find(|e| e.name == name)
    }

    /// Every descendant element in document order, excluding `self`
    pub fn descendants(&self) -> Vec<&Element> {
        let mut out = Vec::new();
        let mut stack: Vec<&Element> = self.children().collect();
        stack.reverse();
        while let Some(element) = stack.pop() {
            out.push(element);
            let mark = stack.len();
            stack.extend(element.children());
            stack[mark..].reverse();
        }
        out
    }

    /// First descendant named `name`
    pub fn find(&self, name: &str) -> Option<&Element> {
        self.descendants().into_iter().find(|e| e.name == name)
    }

    /// Every descendant named `name`, in document order
    pub fn find_all(&self, name: &str) -> Vec<&Element> {
        self.descendants()
            .into_iter()
            .filter(|e| e.name == name)
            .collect()
    }

    /// First descendant matching the earliest name in `names` that occurs.
    ///
    /// Names are tried in priority order, so `["name", "type"]` prefers a
    /// `name` element even when a `type` element comes first in the document.
    pub fn find_first_of(&self, names: &[&str]) -> Option<&Element> {
        let descendants = self.descendants();
        names
            .iter()
            .find_map(|name| descendants.iter().copied().find(|e| e.name == *name))
    }

    /// Direct `child` elements of every `parent` descendant, in document order
    pub fn find_all_under(&self, parent: &str, child: &str) -> Vec<&Element> {
        self.find_all(parent)
            .into_iter()
            .flat_map(|p| p.children().filter(move |c| c.name == child))
            .collect()
    }

    /// First `child` directly below any `parent` descendant
    pub fn find_under(&self, parent: &str, child: &str) -> Option<&Element> {
        self.find_all_under(parent, child).into_iter().next()
    }

    pub fn has_descendant(&self, name: &str) -> bool {
        self.find(name).is_some()
    }

    /// Concatenated text of all descendant text nodes
    pub fn text(&self) -> String {
        let mut out = String::new();
        let mut stack: Vec<&Node> = self.children.iter().rev().collect();
        while let Some(node) = stack.pop() {
            match node {
                Node::Text(t) => out.push_str(t),
                Node::Element(e) => stack.extend(e.children.iter().rev()),
            }
        }
        out
    }

    /// Text of the first descendant named `name`
    pub fn find_text(&self, name: &str) -> Option<String> {
        self.find(name).map(Element::text)
    }

    /// Text of the first match of [`Element::find_first_of`]
    pub fn find_text_of(&self, names: &[&str]) -> Option<String> {
        self.find_first_of(names).map(Element::text)
    }
}
