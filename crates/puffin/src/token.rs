//! The token/symbol dictionary shared by both ends of a Puffin connection.
//!
//! Puffin compresses its XML-shaped messages by letting each repeated tag
//! name, attribute name, or attribute value earn a one- or two-byte numeric
//! symbol the first time it is seen, so later occurrences cost a byte or
//! two instead of the full text. Symbols in the one-byte region are the
//! "winners" — LFU-promoted as their usage count overtakes the dictionary's
//! current winning post — and get swapped in ahead of less-used entries
//! already occupying that region.

use std::collections::HashMap;

use bidfx_core::error::{BidFxError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenType {
    End = 0,
    Empty = 1,
    Start = 2,
    Content = 3,
    Name = 4,
    Integer = 5,
    Double = 6,
    Fraction = 7,
    Str = 8,
}

impl TokenType {
    pub const COUNT: u32 = 9;

    pub fn from_byte(b: u8) -> Result<Self> {
        Ok(match b {
            0 => TokenType::End,
            1 => TokenType::Empty,
            2 => TokenType::Start,
            3 => TokenType::Content,
            4 => TokenType::Name,
            5 => TokenType::Integer,
            6 => TokenType::Double,
            7 => TokenType::Fraction,
            8 => TokenType::Str,
            other => return Err(BidFxError::pricing(format!("unknown Puffin token type byte {other}"))),
        })
    }

    pub fn as_byte(self) -> u8 {
        self as u8
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Token {
    pub token_type: TokenType,
    pub text: Option<String>,
}

impl Token {
    pub fn new(token_type: TokenType, text: Option<String>) -> Self {
        Token { token_type, text }
    }

    pub fn empty() -> Self {
        Token { token_type: TokenType::Empty, text: None }
    }

    pub fn len(&self) -> usize {
        self.text.as_ref().map_or(0, |s| s.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

pub struct TokenUsage {
    pub token: Token,
    pub symbol: u32,
    pub count: u64,
}

/// Number of bits set aside in the first symbol byte for a one-byte symbol
/// value; the eighth bit marks the byte as a symbol rather than plain text.
const SYMBOL_BITS: u32 = 7;
const SYMBOL_BIT: u32 = 1 << SYMBOL_BITS;
const SYMBOL_MASK: u32 = SYMBOL_BIT - 1;
const NUM_ONE_BYTE_SYMBOLS: u32 = SYMBOL_BIT;
const MAX_SYMBOL: u32 = (NUM_ONE_BYTE_SYMBOLS - TokenType::COUNT) << SYMBOL_BITS;

/// Shared dictionary mapping numeric symbols to tokens, plus (on the
/// compressor side) the reverse lookup by token so a repeated string reuses
/// its existing symbol instead of minting a new one.
pub struct Dictionary {
    next_symbol: u32,
    winning_post: u64,
    usage_by_symbol: Vec<Option<TokenUsage>>,
    usage_by_token: Option<HashMap<Token, usize>>,
}

impl Dictionary {
    /// A decompressor-side dictionary: only the forward (symbol -> token)
    /// direction is needed.
    pub fn new() -> Self {
        Dictionary { next_symbol: 0, winning_post: 0, usage_by_symbol: Vec::new(), usage_by_token: None }
    }

    /// A compressor-side dictionary: also tracks the reverse lookup so
    /// `write_token` can detect a token it has already assigned a symbol to.
    pub fn with_reverse_lookup() -> Self {
        Dictionary {
            next_symbol: 0,
            winning_post: 0,
            usage_by_symbol: Vec::new(),
            usage_by_token: Some(HashMap::new()),
        }
    }

    fn growing_set(&mut self, index: usize, value: Option<TokenUsage>) {
        if index >= self.usage_by_symbol.len() {
            self.usage_by_symbol.resize_with(index + 1, || None);
        }
        self.usage_by_symbol[index] = value;
    }

    pub fn usage_index_for_token(&self, token: &Token) -> Option<usize> {
        self.usage_by_token.as_ref().and_then(|m| m.get(token)).copied()
    }

    pub fn get_token(&mut self, symbol: u32) -> Result<Token> {
        let idx = symbol as usize;
        if idx >= self.usage_by_symbol.len() || self.usage_by_symbol[idx].is_none() {
            return Err(BidFxError::pricing(format!("Puffin protocol syntax error: no token for symbol {symbol}")));
        }
        let (token, _) = self.touch(idx);
        Ok(token)
    }

    /// Bump the usage count of the entry currently living at `idx` and, if it
    /// has just overtaken the winning post while living outside the one-byte
    /// region, swap it into the one-byte region in place of the weakest
    /// current occupant there. Returns the token and the symbol it was
    /// living at *before* this call — that is the symbol value the peer's
    /// mirror dictionary still expects the next time this token is emitted.
    fn touch(&mut self, idx: usize) -> (Token, u32) {
        let original_symbol = self.usage_by_symbol[idx].as_ref().unwrap().symbol;
        let token = self.usage_by_symbol[idx].as_ref().unwrap().token.clone();
        let count = {
            let usage = self.usage_by_symbol[idx].as_mut().unwrap();
            usage.count += 1;
            usage.count
        };

        if original_symbol >= NUM_ONE_BYTE_SYMBOLS && count > self.winning_post {
            for one_byte in 0..NUM_ONE_BYTE_SYMBOLS as usize {
                let colder = self.usage_by_symbol[one_byte].as_ref().map(|u| u.count);
                match colder {
                    Some(colder_count) if count > colder_count => {
                        self.usage_by_symbol.swap(idx, one_byte);
                        if let Some(u) = self.usage_by_symbol[idx].as_mut() {
                            u.symbol = idx as u32;
                        }
                        if let Some(u) = self.usage_by_symbol[one_byte].as_mut() {
                            u.symbol = one_byte as u32;
                        }
                        if let Some(map) = self.usage_by_token.as_mut() {
                            if let Some(displaced) = self.usage_by_symbol[idx].as_ref() {
                                map.insert(displaced.token.clone(), idx);
                            }
                            if let Some(promoted) = self.usage_by_symbol[one_byte].as_ref() {
                                map.insert(promoted.token.clone(), one_byte);
                            }
                        }
                        return (token, original_symbol);
                    }
                    _ => continue,
                }
            }
            self.winning_post = count;
        }
        (token, original_symbol)
    }

    /// Record an extra use of the token usage at `idx` without decoding a
    /// symbol for it — used by the compressor side when it finds a token it
    /// has already assigned a symbol to. Returns the symbol to emit.
    pub fn optimise_token_usage(&mut self, idx: usize) -> u32 {
        let (_, symbol) = self.touch(idx);
        symbol
    }

    /// Insert a brand-new token, purging the weakest quartile of the
    /// dictionary first if symbol space has run out.
    pub fn insert_token(&mut self, token: Token) -> Option<u32> {
        if !self.token_space_available() {
            self.purge_dictionary();
            if !self.token_space_available() {
                return None;
            }
        }
        let symbol = self.next_symbol;
        self.next_symbol += 1;
        if let Some(map) = self.usage_by_token.as_mut() {
            map.insert(token.clone(), symbol as usize);
        }
        self.growing_set(symbol as usize, Some(TokenUsage { token, symbol, count: 0 }));
        Some(symbol)
    }

    fn token_space_available(&self) -> bool {
        self.next_symbol < MAX_SYMBOL
    }

    fn purge_dictionary(&mut self) {
        let lower_quartile = self.estimate_lower_quartile();
        let mut new_symbol = 0u32;
        for old_symbol in 0..MAX_SYMBOL {
            let keep = self
                .usage_by_symbol
                .get(old_symbol as usize)
                .and_then(|s| s.as_ref())
                .map(|u| u.count > lower_quartile)
                .unwrap_or(false);
            if keep {
                if new_symbol < old_symbol {
                    if let Some(mut usage) = self.usage_by_symbol[old_symbol as usize].take() {
                        usage.symbol = new_symbol;
                        if let Some(map) = self.usage_by_token.as_mut() {
                            map.insert(usage.token.clone(), new_symbol as usize);
                        }
                        self.growing_set(new_symbol as usize, Some(usage));
                    }
                }
                new_symbol += 1;
            } else if let Some(usage) = self.usage_by_symbol.get(old_symbol as usize).and_then(|s| s.as_ref()) {
                if let Some(map) = self.usage_by_token.as_mut() {
                    map.remove(&usage.token);
                }
                if (old_symbol as usize) < self.usage_by_symbol.len() {
                    self.usage_by_symbol[old_symbol as usize] = None;
                }
            }
        }
        self.next_symbol = new_symbol;
    }

    fn estimate_lower_quartile(&self) -> u64 {
        const SAMPLE_COUNT: u32 = 7;
        let step = MAX_SYMBOL / (SAMPLE_COUNT + 1);
        if step == 0 {
            return self
                .usage_by_symbol
                .get((MAX_SYMBOL / 2) as usize)
                .and_then(|s| s.as_ref())
                .map(|u| u.count)
                .unwrap_or(0);
        }
        let mut samples = Vec::with_capacity(SAMPLE_COUNT as usize);
        let mut j = step - 1;
        for _ in 0..SAMPLE_COUNT {
            let count = self.usage_by_symbol.get(j as usize).and_then(|s| s.as_ref()).map(|u| u.count).unwrap_or(0);
            samples.push(count);
            j += step;
        }
        samples.sort_unstable();
        samples[(SAMPLE_COUNT / 4) as usize]
    }

    pub fn symbol_bytes(symbol: u32) -> Vec<u8> {
        if symbol < NUM_ONE_BYTE_SYMBOLS {
            vec![(SYMBOL_BIT | symbol) as u8]
        } else {
            vec![
                (SYMBOL_BIT | (symbol & SYMBOL_MASK)) as u8,
                ((symbol >> SYMBOL_BITS) + TokenType::COUNT) as u8,
            ]
        }
    }

    pub fn is_first_byte_of_symbol(b: u8) -> bool {
        (b as u32 & SYMBOL_BIT) != 0
    }

    pub fn is_second_byte_of_symbol(b: u8) -> bool {
        (TokenType::COUNT..NUM_ONE_BYTE_SYMBOLS).contains(&(b as u32))
    }

    pub fn is_plain_text(b: u8) -> bool {
        Self::is_second_byte_of_symbol(b)
    }

    pub fn is_token_type(b: u8) -> bool {
        (b as u32 & SYMBOL_MASK) < TokenType::COUNT
    }

    pub fn first_byte_symbol(b: u8) -> u32 {
        b as u32 & SYMBOL_MASK
    }

    pub fn second_byte_symbol(b: u8) -> u32 {
        (b as u32 - TokenType::COUNT) << SYMBOL_BITS
    }
}

impl Default for Dictionary {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn one_byte_symbol_round_trips_through_bytes() {
        let bytes = Dictionary::symbol_bytes(5);
        assert_eq!(bytes.len(), 1);
        assert!(Dictionary::is_first_byte_of_symbol(bytes[0]));
        assert_eq!(Dictionary::first_byte_symbol(bytes[0]), 5);
    }

    #[test]
    fn two_byte_symbol_round_trips_through_bytes() {
        let symbol = 500u32;
        let bytes = Dictionary::symbol_bytes(symbol);
        assert_eq!(bytes.len(), 2);
        assert!(Dictionary::is_first_byte_of_symbol(bytes[0]));
        assert!(Dictionary::is_second_byte_of_symbol(bytes[1]));
        let reconstructed = Dictionary::first_byte_symbol(bytes[0]) | Dictionary::second_byte_symbol(bytes[1]);
        assert_eq!(reconstructed, symbol);
    }

    #[test]
    fn insert_and_lookup_bijection() {
        let mut dict = Dictionary::with_reverse_lookup();
        let token = Token::new(TokenType::Start, Some("Price".to_string()));
        let symbol = dict.insert_token(token.clone()).unwrap();
        let looked_up = dict.get_token(symbol).unwrap();
        assert_eq!(looked_up, token);
    }
}
