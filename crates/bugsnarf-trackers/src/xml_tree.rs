//! Minimal owned element tree over `quick-xml`, enough for the
//! Bugzilla/Issuezilla payloads and SOAP responses the adapters read.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use thiserror::Error;

use crate::entity_decode::decode_entities;

const BASE64_FAILURE_TEXT: &str = "Cannot convert bug data from base64.";

#[derive(Debug, Error)]
pub enum XmlTreeError {
    #[error("malformed xml: {0}")]
    Malformed(#[from] quick_xml::Error),
    #[error("document has no root element")]
    Empty,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct XmlNode {
    pub name: String,
    pub attributes: Vec<(String, String)>,
    raw_text: String,
    pub children: Vec<XmlNode>,
}

impl XmlNode {
    fn from_start(start: &BytesStart<'_>) -> Self {
        let name = String::from_utf8_lossy(start.local_name().as_ref()).into_owned();
        let attributes = start
            .attributes()
            .filter_map(|attribute| attribute.ok())
            .map(|attribute| {
                let key = String::from_utf8_lossy(attribute.key.local_name().as_ref()).into_owned();
                let value = decode_entities(&String::from_utf8_lossy(&attribute.value));
                (key, value)
            })
            .collect();
        Self {
            name,
            attributes,
            raw_text: String::new(),
            children: Vec::new(),
        }
    }

    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    pub fn child(&self, name: &str) -> Option<&XmlNode> {
        self.children.iter().find(|child| child.name == name)
    }

    /// Depth-first search over this node and all descendants.
    pub fn find(&self, name: &str) -> Option<&XmlNode> {
        if self.name == name {
            return Some(self);
        }
        self.children.iter().find_map(|child| child.find(name))
    }

    /// Decoded text content: base64 payloads are unpacked first when the
    /// node declares `encoding="base64"`, then entities are resolved.
    pub fn text(&self) -> String {
        let raw = if self.attribute("encoding") == Some("base64") {
            let compact: String = self.raw_text.split_whitespace().collect();
            match STANDARD.decode(compact.as_bytes()) {
                Ok(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
                Err(_) => BASE64_FAILURE_TEXT.to_string(),
            }
        } else {
            self.raw_text.clone()
        };
        decode_entities(raw.trim())
    }

    pub fn child_text(&self, name: &str) -> Option<String> {
        self.child(name).map(XmlNode::text)
    }

    pub fn has_content(&self) -> bool {
        !self.children.is_empty() || !self.raw_text.trim().is_empty()
    }
}

pub fn parse_xml_document(xml: &str) -> Result<XmlNode, XmlTreeError> {
    let mut reader = Reader::from_str(xml);
    reader.trim_text(true);

    let mut stack: Vec<XmlNode> = Vec::new();
    let mut root: Option<XmlNode> = None;
    loop {
        match reader.read_event()? {
            Event::Start(start) => stack.push(XmlNode::from_start(&start)),
            Event::Empty(start) => {
                let node = XmlNode::from_start(&start);
                attach(&mut stack, &mut root, node);
            }
            Event::End(_) => {
                if let Some(node) = stack.pop() {
                    attach(&mut stack, &mut root, node);
                }
            }
            Event::Text(text) => {
                if let Some(current) = stack.last_mut() {
                    current.raw_text.push_str(&String::from_utf8_lossy(&text));
                }
            }
            Event::CData(data) => {
                if let Some(current) = stack.last_mut() {
                    current.raw_text.push_str(&String::from_utf8_lossy(&data));
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }
    while let Some(node) = stack.pop() {
        attach(&mut stack, &mut root, node);
    }
    root.ok_or(XmlTreeError::Empty)
}

fn attach(stack: &mut [XmlNode], root: &mut Option<XmlNode>, node: XmlNode) {
    match stack.last_mut() {
        Some(parent) => parent.children.push(node),
        None => {
            if root.is_none() {
                *root = Some(node);
            }
        }
    }
}
