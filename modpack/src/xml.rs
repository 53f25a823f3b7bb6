//! Minimal lossless element tree.
//!
//! Only start, end and empty tags are interpreted. Everything between them
//! (text, comments, declarations, entity references) is kept as the exact
//! source text, so a document that is not modified serializes back to the
//! same string.

use quick_xml::escape::{escape, unescape};
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use std::fmt;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum XmlError {
    #[error("{0}")]
    Syntax(#[from] quick_xml::Error),
    #[error("element <{0}> is never closed")]
    Unclosed(String),
    #[error("invalid escape sequence: {0}")]
    Escape(String),
    #[error("document has no root element")]
    NoRoot,
}

impl From<quick_xml::events::attributes::AttrError> for XmlError {
    fn from(e: quick_xml::events::attributes::AttrError) -> Self {
        XmlError::Syntax(e.into())
    }
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Node {
    Element(Element),
    /// Source text kept verbatim (already escaped).
    Raw(String),
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Element {
    name: String,
    /// Attribute names with their unescaped values, in source order.
    attributes: Vec<(String, String)>,
    start: String,
    /// `None` for a self-closing element.
    end: Option<String>,
    pub children: Vec<Node>,
}

impl Element {
    /// Creates an empty, explicitly closed element without attributes.
    pub fn new(name: &str) -> Self {
        Element {
            name: name.to_owned(),
            attributes: vec![],
            start: format!("<{}>", name),
            end: Some(format!("</{}>", name)),
            children: vec![],
        }
    }

    fn from_start(e: &BytesStart, raw: &str, closed: bool) -> Result<Self, XmlError> {
        let name = String::from_utf8_lossy(e.name().as_ref()).into_owned();

        let mut attributes = vec![];
        for attr in e.attributes() {
            let attr = attr?;
            let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
            let value = unescape_str(&String::from_utf8_lossy(&attr.value))?;
            attributes.push((key, value));
        }

        Ok(Element {
            name,
            attributes,
            start: raw.to_owned(),
            end: if closed { None } else { Some(String::new()) },
            children: vec![],
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn attribute(&self, key: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Child elements with the specified name.
    pub fn elements<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a Element> + 'a {
        self.children.iter().filter_map(move |n| match n {
            Node::Element(e) if e.name == name => Some(e),
            _ => None,
        })
    }

    pub fn elements_mut<'a>(
        &'a mut self,
        name: &'a str,
    ) -> impl Iterator<Item = &'a mut Element> + 'a {
        self.children.iter_mut().filter_map(move |n| match n {
            Node::Element(e) if e.name == name => Some(e),
            _ => None,
        })
    }

    /// Unescaped text content of this element (direct text children only).
    pub fn text(&self) -> Result<String, XmlError> {
        let mut raw = String::new();
        for child in &self.children {
            if let Node::Raw(t) = child {
                raw.push_str(t);
            }
        }
        unescape_str(&raw)
    }

    /// Replaces all children with the escaped `text`.
    pub fn set_text(&mut self, text: &str) {
        self.open();
        self.children = vec![Node::Raw(escape(text).into_owned())];
    }

    /// Appends `child` after the last child element, reusing the whitespace
    /// that precedes existing elements as indentation.
    pub fn append_element(&mut self, child: Element) {
        self.open();

        let last = self
            .children
            .iter()
            .rposition(|n| matches!(n, Node::Element(_)));

        let indent = last
            .and_then(|i| i.checked_sub(1))
            .and_then(|i| match &self.children[i] {
                Node::Raw(t) if t.trim().is_empty() => Some(t.clone()),
                _ => None,
            })
            .unwrap_or_else(|| "\n".to_owned());

        let at = last.map(|i| i + 1).unwrap_or(self.children.len());
        self.children.insert(at, Node::Element(child));
        self.children.insert(at, Node::Raw(indent));
    }

    /// Turns a self-closing element into one with separate start and end
    /// tags so it can receive children.
    fn open(&mut self) {
        if self.end.is_some() {
            return;
        }

        let mut start = format!("<{}", self.name);
        for (k, v) in &self.attributes {
            start.push_str(&format!(" {}=\"{}\"", k, escape(v.as_str())));
        }
        start.push('>');

        self.start = start;
        self.end = Some(format!("</{}>", self.name));
    }
}

impl fmt::Display for Element {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.start)?;
        if let Some(ref end) = self.end {
            for child in &self.children {
                write!(f, "{}", child)?;
            }
            f.write_str(end)?;
        }
        Ok(())
    }
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Node::Element(e) => write!(f, "{}", e),
            Node::Raw(t) => f.write_str(t),
        }
    }
}

/// A parsed document: the root element plus whatever surrounds it.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Document {
    nodes: Vec<Node>,
}

impl Document {
    pub fn parse(src: &str) -> Result<Self, XmlError> {
        let mut reader = Reader::from_str(src);
        let mut stack: Vec<Element> = vec![];
        let mut nodes: Vec<Node> = vec![];
        let mut last = 0usize;

        fn push(stack: &mut Vec<Element>, nodes: &mut Vec<Node>, node: Node) {
            match stack.last_mut() {
                Some(parent) => parent.children.push(node),
                None => nodes.push(node),
            }
        }

        loop {
            let event = reader.read_event()?;
            let position = reader.buffer_position() as usize;
            let raw = &src[last..position];

            match event {
                Event::Start(ref e) => stack.push(Element::from_start(e, raw, false)?),
                Event::Empty(ref e) => {
                    let element = Element::from_start(e, raw, true)?;
                    push(&mut stack, &mut nodes, Node::Element(element));
                }
                Event::End(_) => {
                    // the reader verifies end names, so the stack is never empty here
                    if let Some(mut element) = stack.pop() {
                        element.end = Some(raw.to_owned());
                        push(&mut stack, &mut nodes, Node::Element(element));
                    }
                }
                Event::Eof => break,
                _ => push(&mut stack, &mut nodes, Node::Raw(raw.to_owned())),
            }

            last = position;
        }

        if let Some(unclosed) = stack.pop() {
            return Err(XmlError::Unclosed(unclosed.name));
        }

        let document = Document { nodes };
        document.root()?;
        Ok(document)
    }

    pub fn root(&self) -> Result<&Element, XmlError> {
        self.nodes
            .iter()
            .find_map(|n| match n {
                Node::Element(e) => Some(e),
                _ => None,
            })
            .ok_or(XmlError::NoRoot)
    }

    pub fn root_mut(&mut self) -> Result<&mut Element, XmlError> {
        self.nodes
            .iter_mut()
            .find_map(|n| match n {
                Node::Element(e) => Some(e),
                _ => None,
            })
            .ok_or(XmlError::NoRoot)
    }

    /// Consumes the document and returns its root element.
    pub fn into_root(self) -> Result<Element, XmlError> {
        self.nodes
            .into_iter()
            .find_map(|n| match n {
                Node::Element(e) => Some(e),
                _ => None,
            })
            .ok_or(XmlError::NoRoot)
    }
}

impl fmt::Display for Document {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for node in &self.nodes {
            write!(f, "{}", node)?;
        }
        Ok(())
    }
}

fn unescape_str(raw: &str) -> Result<String, XmlError> {
    unescape(raw)
        .map(|c| c.into_owned())
        .map_err(|e| XmlError::Escape(e.to_string()))
}
