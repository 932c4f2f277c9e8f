//! Minimal owned XML tree on top of `quick-xml`.
//!
//! Project files are edited in place, so the tree keeps everything it does not
//! understand (declaration, comments, whitespace, untouched start tags, BOM)
//! and writes it back byte for byte.

use anyhow::{Context, Result, anyhow};
use quick_xml::Reader;
use quick_xml::Writer;
use quick_xml::escape::{escape, unescape};
use quick_xml::events::{BytesEnd, BytesStart, BytesText, Event};

const BOM: char = '\u{feff}';

#[derive(Debug, Clone)]
pub enum Node {
    Element(Element),
    /// Character data, kept escaped exactly as it appeared.
    Text(String),
    /// Declarations, comments, processing instructions, CDATA, doctype.
    Other(Event<'static>),
}

#[derive(Debug, Clone)]
pub struct Element {
    pub name: String,
    attributes: Vec<(String, String)>,
    /// Raw start tag content; dropped once attributes change.
    raw_start: Option<String>,
    pub children: Vec<Node>,
    self_closing: bool,
}

impl Element {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            attributes: Vec::new(),
            raw_start: None,
            children: Vec::new(),
            self_closing: true,
        }
    }

    pub fn with_attribute(mut self, key: &str, value: &str) -> Self {
        self.set_attribute(key, value);
        self
    }

    fn from_start(start: &BytesStart<'_>) -> Result<Self> {
        let name = std::str::from_utf8(start.name().as_ref())
            .context("Element name is not valid UTF-8")?
            .to_string();
        let mut attributes = Vec::new();
        for attr in start.attributes() {
            let attr = attr.context("Malformed attribute")?;
            let key = std::str::from_utf8(attr.key.as_ref())
                .context("Attribute name is not valid UTF-8")?
                .to_string();
            let value = attr.unescape_value()?.into_owned();
            attributes.push((key, value));
        }
        let raw_start = std::str::from_utf8(start)
            .context("Start tag is not valid UTF-8")?
            .to_string();
        Ok(Self {
            name,
            attributes,
            raw_start: Some(raw_start),
            children: Vec::new(),
            self_closing: false,
        })
    }

    /// Element name without a namespace prefix.
    pub fn local_name(&self) -> &str {
        self.name.rsplit(':').next().unwrap_or(&self.name)
    }

    pub fn is_named(&self, name: &str) -> bool {
        self.local_name().eq_ignore_ascii_case(name)
    }

    pub fn attribute(&self, key: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(key))
            .map(|(_, v)| v.as_str())
    }

    pub fn set_attribute(&mut self, key: &str, value: &str) {
        match self
            .attributes
            .iter_mut()
            .find(|(k, _)| k.eq_ignore_ascii_case(key))
        {
            Some(slot) => slot.1 = value.to_string(),
            None => self.attributes.push((key.to_string(), value.to_string())),
        }
        self.raw_start = None;
    }

    pub fn elements(&self) -> impl Iterator<Item = &Element> {
        self.children.iter().filter_map(|node| match node {
            Node::Element(el) => Some(el),
            _ => None,
        })
    }

    pub fn elements_mut(&mut self) -> impl Iterator<Item = &mut Element> {
        self.children.iter_mut().filter_map(|node| match node {
            Node::Element(el) => Some(el),
            _ => None,
        })
    }

    pub fn elements_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a Element> {
        self.elements().filter(move |el| el.is_named(name))
    }

    pub fn child(&self, name: &str) -> Option<&Element> {
        self.elements().find(|el| el.is_named(name))
    }

    pub fn child_mut(&mut self, name: &str) -> Option<&mut Element> {
        self.elements_mut().find(|el| el.is_named(name))
    }

    /// Unescaped text content of the direct text children.
    pub fn text(&self) -> Result<String> {
        let mut text = String::new();
        for node in &self.children {
            if let Node::Text(raw) = node {
                text.push_str(&unescape(raw).with_context(|| format!("Bad text in <{}>", self.name))?);
            }
        }
        Ok(text)
    }

    /// Replace all children with a single text node.
    pub fn set_text(&mut self, value: &str) {
        self.children = vec![Node::Text(escape(value).into_owned())];
        self.self_closing = false;
    }

    /// Append a child element after the last existing child element,
    /// reusing the whitespace that precedes it as indentation.
    pub fn append_element(&mut self, child: Element) {
        self.self_closing = false;
        match self
            .children
            .iter()
            .rposition(|node| matches!(node, Node::Element(_)))
        {
            Some(last) => {
                let indent = match last.checked_sub(1).map(|i| &self.children[i]) {
                    Some(Node::Text(t)) if t.trim().is_empty() => t.clone(),
                    _ => String::new(),
                };
                self.children.insert(last + 1, Node::Element(child));
                if !indent.is_empty() {
                    self.children.insert(last + 1, Node::Text(indent));
                }
            }
            None => self.children.push(Node::Element(child)),
        }
    }

    /// Whitespace that precedes this element's first child element, if any.
    pub fn child_indent(&self) -> Option<&str> {
        let first = self
            .children
            .iter()
            .position(|node| matches!(node, Node::Element(_)))?;
        match first.checked_sub(1).map(|i| &self.children[i]) {
            Some(Node::Text(t)) if t.trim().is_empty() => Some(t.as_str()),
            _ => None,
        }
    }

    fn write(&self, writer: &mut Writer<Vec<u8>>) -> Result<()> {
        let start = match &self.raw_start {
            Some(raw) => BytesStart::from_content(raw.as_str(), self.name.len()),
            None => {
                let mut start = BytesStart::new(self.name.as_str());
                for (key, value) in &self.attributes {
                    start.push_attribute((key.as_str(), value.as_str()));
                }
                start
            }
        };

        if self.children.is_empty() && self.self_closing {
            writer.write_event(Event::Empty(start))?;
        } else {
            writer.write_event(Event::Start(start))?;
            for child in &self.children {
                write_node(writer, child)?;
            }
            writer.write_event(Event::End(BytesEnd::new(self.name.as_str())))?;
        }
        Ok(())
    }
}

/// A parsed XML document with exactly one root element.
#[derive(Debug, Clone)]
pub struct Document {
    bom: bool,
    nodes: Vec<Node>,
}

impl Document {
    pub fn parse(content: &str) -> Result<Self> {
        let (bom, body) = match content.strip_prefix(BOM) {
            Some(rest) => (true, rest),
            None => (false, content),
        };

        let mut reader = Reader::from_str(body);
        let mut stack: Vec<Element> = Vec::new();
        let mut nodes: Vec<Node> = Vec::new();

        loop {
            let event = reader
                .read_event()
                .with_context(|| format!("Invalid XML near byte {}", reader.buffer_position()))?;
            let node = match event {
                Event::Start(start) => {
                    stack.push(Element::from_start(&start)?);
                    continue;
                }
                Event::End(_) => {
                    let element = stack
                        .pop()
                        .ok_or_else(|| anyhow!("Unexpected closing tag"))?;
                    Node::Element(element)
                }
                Event::Empty(start) => {
                    let mut element = Element::from_start(&start)?;
                    element.self_closing = true;
                    Node::Element(element)
                }
                Event::Text(text) => Node::Text(
                    std::str::from_utf8(&text)
                        .context("Text is not valid UTF-8")?
                        .to_string(),
                ),
                Event::Eof => break,
                other => Node::Other(other.into_owned()),
            };
            match stack.last_mut() {
                Some(parent) => parent.children.push(node),
                None => nodes.push(node),
            }
        }

        if let Some(open) = stack.last() {
            anyhow::bail!("Unclosed element <{}>", open.name);
        }
        let roots = nodes
            .iter()
            .filter(|node| matches!(node, Node::Element(_)))
            .count();
        if roots != 1 {
            anyhow::bail!("Expected a single root element, found {}", roots);
        }

        Ok(Self { bom, nodes })
    }

    pub fn root(&self) -> &Element {
        self.nodes
            .iter()
            .find_map(|node| match node {
                Node::Element(el) => Some(el),
                _ => None,
            })
            .unwrap_or_else(|| unreachable!("parse guarantees a root element"))
    }

    pub fn root_mut(&mut self) -> &mut Element {
        self.nodes
            .iter_mut()
            .find_map(|node| match node {
                Node::Element(el) => Some(el),
                _ => None,
            })
            .unwrap_or_else(|| unreachable!("parse guarantees a root element"))
    }

    pub fn to_xml_string(&self) -> Result<String> {
        let mut writer = Writer::new(Vec::new());
        for node in &self.nodes {
            write_node(&mut writer, node)?;
        }
        let mut out = String::from_utf8(writer.into_inner()).context("Serialized XML is not UTF-8")?;
        if self.bom {
            out.insert(0, BOM);
        }
        Ok(out)
    }
}

fn write_node(writer: &mut Writer<Vec<u8>>, node: &Node) -> Result<()> {
    match node {
        Node::Element(el) => el.write(writer)?,
        Node::Text(raw) => writer.write_event(Event::Text(BytesText::from_escaped(raw.as_str())))?,
        Node::Other(event) => writer.write_event(event.clone())?,
    }
    Ok(())
}

/// Read one attribute of a streaming start tag, unescaped.
pub fn attribute_value(start: &BytesStart<'_>, key: &str) -> Result<Option<String>> {
    for attr in start.attributes() {
        let attr = attr.context("Malformed attribute")?;
        if attr.key.local_name().as_ref().eq_ignore_ascii_case(key.as_bytes()) {
            return Ok(Some(attr.unescape_value()?.into_owned()));
        }
    }
    Ok(None)
}

/// Strip a leading UTF-8 byte order mark.
pub fn strip_bom(content: &str) -> &str {
    content.strip_prefix(BOM).unwrap_or(content)
}
