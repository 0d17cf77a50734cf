//! Dictionary-compressed message framing: turns an [`Element`] into a stream
//! of dictionary tokens on the wire and back again, once the handshake has
//! moved past the plain-XML phase.

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use bidfx_core::error::{BidFxError, Result};

use crate::element::Element;
use crate::token::{Dictionary, Token, TokenType};

/// Writes [`Element`]s as dictionary-compressed token streams. Holds the
/// compressor-side dictionary, which also maintains the reverse (token ->
/// symbol) lookup.
pub struct MessageCompressor {
    dictionary: Dictionary,
}

impl MessageCompressor {
    pub fn new() -> Self {
        MessageCompressor { dictionary: Dictionary::with_reverse_lookup() }
    }

    /// The only messages the client ever sends are single flat elements with
    /// string attributes: `START(tag)`, `NAME(k) STRING(v)` per attribute,
    /// then `EMPTY`.
    pub async fn compress_message<S: AsyncWrite + Unpin>(
        &mut self,
        stream: &mut S,
        element: &Element,
    ) -> Result<()> {
        self.write_token(stream, &Token::new(TokenType::Start, Some(element.tag.clone()))).await?;
        for (name, value) in element.attributes() {
            self.write_token(stream, &Token::new(TokenType::Name, Some(name.to_string()))).await?;
            self.write_token(stream, &Token::new(TokenType::Str, Some(value.to_string()))).await?;
        }
        self.write_type(stream, TokenType::Empty).await
    }

    async fn write_token<S: AsyncWrite + Unpin>(&mut self, stream: &mut S, token: &Token) -> Result<()> {
        if token.is_empty() {
            return self.write_type(stream, token.token_type).await;
        }
        match self.dictionary.usage_index_for_token(token) {
            None => {
                self.dictionary.insert_token(token.clone());
                self.write_type(stream, token.token_type).await?;
                stream.write_all(token.text.as_ref().unwrap().as_bytes()).await.map_err(BidFxError::from)
            }
            Some(idx) => {
                let symbol = self.dictionary.optimise_token_usage(idx);
                stream.write_all(&Dictionary::symbol_bytes(symbol)).await.map_err(BidFxError::from)
            }
        }
    }

    async fn write_type<S: AsyncWrite + Unpin>(&mut self, stream: &mut S, token_type: TokenType) -> Result<()> {
        stream.write_all(&[token_type.as_byte()]).await.map_err(BidFxError::from)
    }
}

impl Default for MessageCompressor {
    fn default() -> Self {
        Self::new()
    }
}

/// Reads dictionary-compressed token streams back into [`Element`]s. Holds
/// the decoder-side (forward-only) dictionary and the currently open tag
/// stack, since `END` tokens carry no text of their own on the wire.
pub struct MessageDecompressor {
    dictionary: Dictionary,
    tag_stack: Vec<String>,
    lookahead: Option<u8>,
}

impl MessageDecompressor {
    pub fn new() -> Self {
        MessageDecompressor { dictionary: Dictionary::new(), tag_stack: Vec::new(), lookahead: None }
    }

    pub async fn decompress_message<S: AsyncRead + Unpin>(&mut self, stream: &mut S) -> Result<Element> {
        let token = self.next_token(stream).await?;
        if token.token_type != TokenType::Start {
            return Err(BidFxError::pricing("Puffin protocol syntax error: start tag expected"));
        }
        let mut element = Element::new(token.text.unwrap_or_default());
        let mut stack: Vec<Element> = Vec::new();
        loop {
            let token = self.next_token(stream).await?;
            match token.token_type {
                TokenType::Name => {
                    let value = self.next_token(stream).await?;
                    if let Some(value_text) = value.text {
                        element = element.set(token.text.unwrap_or_default(), value_text);
                    }
                }
                TokenType::End | TokenType::Empty => {
                    match stack.pop() {
                        None => return Ok(element),
                        Some(parent) => {
                            element = parent.nest(element);
                        }
                    }
                }
                TokenType::Start => {
                    let child = Element::new(token.text.unwrap_or_default());
                    stack.push(element);
                    element = child;
                }
                TokenType::Content => {
                    tracing::warn!(?token, "ignoring unexpected XML content");
                }
                TokenType::Integer | TokenType::Double | TokenType::Fraction | TokenType::Str => {
                    return Err(BidFxError::pricing("Puffin protocol syntax error: attribute value with no name"));
                }
            }
        }
    }

    async fn next_token<S: AsyncRead + Unpin>(&mut self, stream: &mut S) -> Result<Token> {
        let b = self.read_byte(stream).await?;
        if Dictionary::is_first_byte_of_symbol(b) {
            return self.parse_symbol_token(stream, b).await;
        }
        if Dictionary::is_token_type(b) {
            let token_type = TokenType::from_byte(b & 0x7f)?;
            return match token_type {
                TokenType::End => {
                    let tag = self
                        .tag_stack
                        .pop()
                        .ok_or_else(|| BidFxError::pricing("Puffin protocol syntax error: unbalanced end tag"))?;
                    Ok(Token::new(TokenType::End, Some(tag)))
                }
                TokenType::Empty => Ok(Token::empty()),
                other => self.parse_unseen_token(stream, other).await,
            };
        }
        Err(BidFxError::pricing("Puffin protocol syntax error: token tag expected"))
    }

    async fn parse_symbol_token<S: AsyncRead + Unpin>(&mut self, stream: &mut S, b1: u8) -> Result<Token> {
        let mut symbol = Dictionary::first_byte_symbol(b1);
        let b2 = self.peek_byte(stream).await?;
        if Dictionary::is_second_byte_of_symbol(b2) {
            self.read_byte(stream).await?;
            symbol |= Dictionary::second_byte_symbol(b2);
        }
        let token = self.dictionary.get_token(symbol)?;
        if token.token_type == TokenType::Start {
            self.tag_stack.push(token.text.clone().unwrap_or_default());
        }
        Ok(token)
    }

    async fn parse_unseen_token<S: AsyncRead + Unpin>(
        &mut self,
        stream: &mut S,
        token_type: TokenType,
    ) -> Result<Token> {
        let mut text = Vec::new();
        loop {
            let b = self.peek_byte(stream).await?;
            if Dictionary::is_plain_text(b) {
                text.push(self.read_byte(stream).await?);
                continue;
            }
            if !text.is_empty() {
                let text = String::from_utf8(text)
                    .map_err(|_| BidFxError::pricing("non-ASCII byte in previously unseen Puffin token"))?;
                let token = Token::new(token_type, Some(text));
                if token_type == TokenType::Start {
                    self.tag_stack.push(token.text.clone().unwrap_or_default());
                }
                self.dictionary.insert_token(token.clone());
                return Ok(token);
            }
            return match token_type {
                TokenType::Str => Ok(Token::new(TokenType::Str, None)),
                TokenType::Content => Ok(Token::new(TokenType::Content, None)),
                _ => Err(BidFxError::pricing("Puffin protocol syntax error: text of previously unseen token expected")),
            };
        }
    }

    async fn peek_byte<S: AsyncRead + Unpin>(&mut self, stream: &mut S) -> Result<u8> {
        if self.lookahead.is_none() {
            self.lookahead = Some(self.read_raw_byte(stream).await?);
        }
        Ok(self.lookahead.unwrap())
    }

    async fn read_byte<S: AsyncRead + Unpin>(&mut self, stream: &mut S) -> Result<u8> {
        if let Some(b) = self.lookahead.take() {
            return Ok(b);
        }
        self.read_raw_byte(stream).await
    }

    async fn read_raw_byte<S: AsyncRead + Unpin>(&mut self, stream: &mut S) -> Result<u8> {
        let mut byte = [0u8; 1];
        let n = stream.read(&mut byte).await.map_err(BidFxError::from)?;
        if n == 0 {
            return Err(BidFxError::transport("end of socket stream"));
        }
        Ok(byte[0])
    }
}

impl Default for MessageDecompressor {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn round_trips_a_subscribe_element_through_the_dictionary() {
        let (mut client, mut server) = tokio::io::duplex(4096);
        let mut compressor = MessageCompressor::new();
        let element = Element::new("Subscribe").set("Subject", "AssetClass=Fx,Symbol=GBPUSD");
        compressor.compress_message(&mut client, &element).await.unwrap();

        let mut decompressor = MessageDecompressor::new();
        let decoded = decompressor.decompress_message(&mut server).await.unwrap();
        assert_eq!(decoded.tag, "Subscribe");
        assert_eq!(decoded.get("Subject", ""), "AssetClass=Fx,Symbol=GBPUSD");
    }

    #[tokio::test]
    async fn second_emission_of_the_same_element_uses_symbols() {
        let (mut client, mut server) = tokio::io::duplex(8192);
        let mut compressor = MessageCompressor::new();
        let element = Element::new("Subscribe").set("Subject", "AssetClass=Fx,Exchange=OTC,Level=1,Source=DBFX,Symbol=GBPUSD");
        compressor.compress_message(&mut client, &element).await.unwrap();
        compressor.compress_message(&mut client, &element).await.unwrap();
        drop(client);

        let mut decompressor = MessageDecompressor::new();
        let first = decompressor.decompress_message(&mut server).await.unwrap();
        let second = decompressor.decompress_message(&mut server).await.unwrap();
        assert_eq!(first, second);
    }
}
