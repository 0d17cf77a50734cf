//! XML-shaped element model for Puffin, plus the plain-text parser used for
//! the Welcome/Grant/ServiceDescription handshake before the dictionary kicks
//! in.

use std::collections::BTreeMap;
use std::fmt;

use tokio::io::{AsyncRead, AsyncReadExt};

use bidfx_core::error::{BidFxError, Result};

/// Attribute keys present on a nested `<Price .../>` element that are part of
/// the wire protocol rather than of the price image itself.
const OMITTED_KEYS: [&str; 2] = ["Status", "SystemTime"];

/// A single XML element: a tag, an ordered attribute list, and any nested
/// elements. Puffin never needs more than one level of nesting (a `Set` or
/// `Update` element wrapping a single `Price` child).
#[derive(Debug, Clone, PartialEq)]
pub struct Element {
    pub tag: String,
    attributes: Vec<(String, String)>,
    sub_elements: Vec<Element>,
}

impl Element {
    pub fn new(tag: impl Into<String>) -> Self {
        Element { tag: tag.into(), attributes: Vec::new(), sub_elements: Vec::new() }
    }

    pub fn nest(mut self, element: Element) -> Self {
        self.sub_elements.push(element);
        self
    }

    pub fn set(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.push((name.into(), value.into()));
        self
    }

    pub fn attributes(&self) -> impl Iterator<Item = (&str, &str)> {
        self.attributes.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn get<'a>(&'a self, key: &str, default: &'a str) -> &'a str {
        self.attributes.iter().find(|(k, _)| k == key).map(|(_, v)| v.as_str()).unwrap_or(default)
    }

    pub fn get_opt(&self, key: &str) -> Option<&str> {
        self.attributes.iter().find(|(k, _)| k == key).map(|(_, v)| v.as_str())
    }

    /// The field map carried by the first nested element, with the wire
    /// bookkeeping attributes (`Status`, `SystemTime`) stripped out.
    pub fn extract_price(&self) -> BTreeMap<String, String> {
        match self.sub_elements.first() {
            Some(price) => price
                .attributes
                .iter()
                .filter(|(k, _)| !OMITTED_KEYS.contains(&k.as_str()))
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
            None => BTreeMap::new(),
        }
    }
}

impl fmt::Display for Element {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let attrs: String = self.attributes.iter().map(|(k, v)| format!(" {k}=\"{v}\"")).collect();
        if self.sub_elements.is_empty() {
            write!(f, "<{}{attrs} />", self.tag)
        } else {
            let subs: String = self.sub_elements.iter().map(|e| e.to_string()).collect();
            write!(f, "<{}{attrs}>{subs}</{}>", self.tag, self.tag)
        }
    }
}

/// Tokenizes the plain-ASCII-XML handshake messages (`Welcome`, `Grant`,
/// `ServiceDescription`) that precede the compressed dictionary phase.
pub struct ElementParser<'a, S: AsyncRead + Unpin> {
    stream: &'a mut S,
}

impl<'a, S: AsyncRead + Unpin> ElementParser<'a, S> {
    pub fn new(stream: &'a mut S) -> Self {
        ElementParser { stream }
    }

    pub async fn parse_element(&mut self) -> Result<Element> {
        self.expect(b'<').await?;
        let (tag, terminator) = self.parse_text(&[b' ', b'/']).await?;
        let mut element = Element::new(tag);
        if terminator == b' ' {
            element = self.parse_attributes(element).await?;
        }
        self.expect(b'>').await?;
        Ok(element)
    }

    async fn parse_attributes(&mut self, mut element: Element) -> Result<Element> {
        let mut b = self.read_byte().await?;
        while b != b'/' {
            let (name, _) = self.parse_text_from(&[b'='], b).await?;
            self.expect(b'"').await?;
            let (value, _) = self.parse_text(&[b'"']).await?;
            element = element.set(name, value);
            b = self.expect_one_of(&[b' ', b'/']).await?;
            if b == b' ' {
                b = self.read_byte().await?;
            }
        }
        Ok(element)
    }

    async fn expect(&mut self, expected: u8) -> Result<u8> {
        self.expect_one_of(&[expected]).await
    }

    async fn expect_one_of(&mut self, expected: &[u8]) -> Result<u8> {
        let b = self.read_byte().await?;
        if !expected.contains(&b) {
            return Err(BidFxError::pricing("expected a specific character while parsing an XML element"));
        }
        Ok(b)
    }

    async fn parse_text(&mut self, terminal: &[u8]) -> Result<(String, u8)> {
        let first = self.read_byte().await?;
        self.parse_text_from(terminal, first).await
    }

    async fn parse_text_from(&mut self, terminal: &[u8], first: u8) -> Result<(String, u8)> {
        let mut text = Vec::new();
        let mut b = first;
        while !terminal.contains(&b) {
            text.push(b);
            b = self.read_byte().await?;
        }
        let text = String::from_utf8(text)
            .map_err(|_| BidFxError::pricing("non-ASCII byte while parsing an XML element"))?;
        Ok((text, b))
    }

    async fn read_byte(&mut self) -> Result<u8> {
        let mut byte = [0u8; 1];
        let n = self.stream.read(&mut byte).await.map_err(BidFxError::from)?;
        if n == 0 {
            return Err(BidFxError::transport("end of socket stream"));
        }
        Ok(byte[0])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn parses_welcome_element() {
        let mut input: &[u8] = b"<Welcome Version=\"8\" Interval=\"10000\" />";
        let mut parser = ElementParser::new(&mut input);
        let element = parser.parse_element().await.unwrap();
        assert_eq!(element.tag, "Welcome");
        assert_eq!(element.get("Version", ""), "8");
        assert_eq!(element.get("Interval", ""), "10000");
    }

    #[tokio::test]
    async fn parses_element_with_no_attributes() {
        let mut input: &[u8] = b"<Heartbeat />";
        let mut parser = ElementParser::new(&mut input);
        let element = parser.parse_element().await.unwrap();
        assert_eq!(element.tag, "Heartbeat");
        assert_eq!(element.get_opt("anything"), None);
    }

    #[test]
    fn display_matches_wire_form() {
        let element = Element::new("Subscribe").set("Subject", "AssetClass=Fx,Symbol=GBPUSD");
        assert_eq!(element.to_string(), "<Subscribe Subject=\"AssetClass=Fx,Symbol=GBPUSD\" />");
    }

    #[test]
    fn extract_price_elides_wire_bookkeeping_keys() {
        let price = Element::new("Price").set("Bid", "1.3").set("Status", "OK").set("SystemTime", "123");
        let set = Element::new("Set").nest(price);
        let extracted = set.extract_price();
        assert_eq!(extracted.get("Bid").map(String::as_str), Some("1.3"));
        assert!(!extracted.contains_key("Status"));
        assert!(!extracted.contains_key("SystemTime"));
    }
}
