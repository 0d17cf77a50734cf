//! Pixie wire messages: the single-byte type tag, fixed framing
//! (`varint(length) | type-byte | body`), and the encode/decode logic for
//! each message kind.

use std::collections::BTreeMap;

use bidfx_core::error::{BidFxError, Result};
use bidfx_core::events::{FieldValue, PriceEvent, SubscriptionEvent, SubscriptionStatus};
use bidfx_core::subject::Subject;

use crate::codec::{
    decode_string, decode_strings_list, decode_varint, decode_zigzag, encode_string,
    encode_strings_list, encode_varint, read_byte_array, read_double_fixed8, read_fixed1,
    read_fixed16, read_fixed2, read_fixed3, read_fixed4, read_fixed8, read_int_fixed4,
    read_long_fixed8, scale_to_double, scale_to_long, ByteReader,
};
use crate::zlib::{Compressor, Decompressor};

/// The protocol version this client negotiates. The server must echo this
/// exact value in its Welcome message or the connection is aborted.
pub const CURRENT_PROTOCOL_VERSION: u64 = 4;

/// Single-byte message type tag, as sent immediately after the varint
/// length prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageType {
    Ack,
    DataDictionary,
    Grant,
    Heartbeat,
    Login,
    PriceSync,
    SubscriptionSync,
    Welcome,
}

impl MessageType {
    pub fn tag(self) -> u8 {
        match self {
            MessageType::Ack => b'A',
            MessageType::DataDictionary => b'D',
            MessageType::Grant => b'G',
            MessageType::Heartbeat => b'H',
            MessageType::Login => b'L',
            MessageType::PriceSync => b'P',
            MessageType::SubscriptionSync => b'S',
            MessageType::Welcome => b'W',
        }
    }

    pub fn from_tag(tag: u8) -> Result<Self> {
        Ok(match tag {
            b'A' => MessageType::Ack,
            b'D' => MessageType::DataDictionary,
            b'G' => MessageType::Grant,
            b'H' => MessageType::Heartbeat,
            b'L' => MessageType::Login,
            b'P' => MessageType::PriceSync,
            b'S' => MessageType::SubscriptionSync,
            b'W' => MessageType::Welcome,
            other => {
                return Err(BidFxError::pricing(format!(
                    "unrecognized Pixie message type byte {other:#04x}"
                )))
            }
        })
    }
}

/// Wrap a message body with its type byte and varint length prefix. The
/// length covers the type byte plus the body.
fn frame(msg_type: MessageType, body: &[u8]) -> Vec<u8> {
    let mut payload = Vec::with_capacity(body.len() + 1);
    payload.push(msg_type.tag());
    payload.extend_from_slice(body);
    let mut out = encode_varint(payload.len() as u64);
    out.extend(payload);
    out
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WelcomeMessage {
    pub options: u64,
    pub version: u64,
    pub client_id: i64,
    pub server_id: i64,
}

impl WelcomeMessage {
    pub fn decode(body: &[u8]) -> Result<Self> {
        let mut reader = ByteReader::new(body);
        Ok(WelcomeMessage {
            options: decode_varint(&mut reader)?,
            version: decode_varint(&mut reader)?,
            client_id: read_int_fixed4(&mut reader)?,
            server_id: read_int_fixed4(&mut reader)?,
        })
    }
}

pub struct LoginMessage {
    pub username: String,
    pub password: String,
    pub alias: String,
    pub api: String,
    pub api_version: String,
    pub product_serial: String,
}

impl LoginMessage {
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut body = Vec::new();
        body.extend(encode_string(Some(&self.username)));
        body.extend(encode_string(Some(&self.password)));
        body.extend(encode_string(Some(&self.alias)));
        body.extend(encode_string(Some(&self.api)));
        body.extend(encode_string(Some(&self.api_version)));
        // Application-info fields are deliberately the API's own identity.
        body.extend(encode_string(Some(&self.api)));
        body.extend(encode_string(Some(&self.api_version)));
        body.extend(encode_string(Some("BidFXRust")));
        body.extend(encode_string(Some(&self.product_serial)));
        frame(MessageType::Login, &body)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GrantMessage {
    pub granted: bool,
    pub reason: Option<String>,
}

impl GrantMessage {
    pub fn decode(body: &[u8]) -> Result<Self> {
        let mut reader = ByteReader::new(body);
        let granted = reader.take_byte()? == b't';
        let reason = decode_string(&mut reader)?;
        Ok(GrantMessage { granted, reason })
    }
}

pub struct HeartbeatMessage;

impl HeartbeatMessage {
    pub fn to_bytes(&self) -> Vec<u8> {
        frame(MessageType::Heartbeat, &[])
    }
}

pub struct AckMessage {
    pub revision: u64,
    pub revision_time: u64,
    pub price_received_time: u64,
    pub ack_time: u64,
}

impl AckMessage {
    pub fn new(revision: u64, revision_time: u64, price_received_time: u64, ack_time: u64) -> Self {
        AckMessage { revision, revision_time, price_received_time, ack_time }
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let handling_time = self.ack_time.saturating_sub(self.price_received_time);
        let mut body = Vec::new();
        body.extend(encode_varint(self.revision));
        body.extend(encode_varint(self.revision_time));
        body.extend(encode_varint(self.price_received_time));
        body.extend(encode_varint(self.ack_time));
        body.extend(encode_varint(handling_time));
        frame(MessageType::Ack, &body)
    }
}

/// Type of a field's logical value, as advertised in a field definition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldType {
    Double,
    Long,
    Int,
    Str,
}

impl FieldType {
    fn from_code(code: u8) -> Result<Self> {
        Ok(match code {
            b'D' => FieldType::Double,
            b'L' => FieldType::Long,
            b'I' => FieldType::Int,
            b'S' => FieldType::Str,
            other => {
                return Err(BidFxError::pricing(format!(
                    "unexpected Pixie price field type: {}",
                    other as char
                )))
            }
        })
    }
}

/// On-wire encoding of a field's raw bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldEncoding {
    None,
    Fixed1,
    Fixed2,
    Fixed3,
    Fixed4,
    Fixed8,
    Fixed16,
    ByteArray,
    Varint,
    Zigzag,
    Str,
}

impl FieldEncoding {
    fn from_code(code: u8) -> Result<Self> {
        Ok(match code {
            b'0' => FieldEncoding::None,
            b'1' => FieldEncoding::Fixed1,
            b'2' => FieldEncoding::Fixed2,
            b'3' => FieldEncoding::Fixed3,
            b'4' => FieldEncoding::Fixed4,
            b'8' => FieldEncoding::Fixed8,
            b'@' => FieldEncoding::Fixed16,
            b'B' => FieldEncoding::ByteArray,
            b'V' => FieldEncoding::Varint,
            b'Z' => FieldEncoding::Zigzag,
            b'S' => FieldEncoding::Str,
            other => {
                return Err(BidFxError::pricing(format!(
                    "unexpected Pixie price field encoding: {}",
                    other as char
                )))
            }
        })
    }
}

/// Fields the server still advertises for backward compatibility but that
/// this client ignores.
const LEGACY_FIELDS: [&str; 5] =
    ["Status", "SystemTime", "SystemLatency", "HopLatency1", "HopLatency2"];

/// One entry of the data dictionary: how to read and interpret a field id.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldDef {
    pub fid: u64,
    pub field_type: FieldType,
    pub encoding: FieldEncoding,
    pub scale: u32,
    pub name: String,
    pub enabled: bool,
}

impl FieldDef {
    pub fn decode(reader: &mut ByteReader) -> Result<Self> {
        let fid = decode_varint(reader)?;
        let field_type = FieldType::from_code(reader.take_byte()?)?;
        let encoding = FieldEncoding::from_code(reader.take_byte()?)?;
        let scale = decode_varint(reader)? as u32;
        let name = decode_string(reader)?.unwrap_or_default();
        let enabled = !LEGACY_FIELDS.contains(&name.as_str());
        Ok(FieldDef { fid, field_type, encoding, scale, name, enabled })
    }

    /// Read and interpret this field's value from the following bytes,
    /// according to its declared type and encoding.
    pub fn parse_value(&self, reader: &mut ByteReader) -> Result<FieldValue> {
        match self.field_type {
            FieldType::Double => self.parse_double(reader),
            FieldType::Long | FieldType::Int => self.parse_int(reader),
            FieldType::Str => Ok(FieldValue::String(decode_string(reader)?.unwrap_or_default())),
        }
    }

    /// Doubles read under a `Zigzag`/`Varint` encoding carry a declared
    /// `scale`; `scale_to_double` already renders the canonical decimal
    /// string for that value (trailing zeros trimmed, decimal point kept),
    /// so it is kept as the field's string value rather than re-parsed into
    /// an `f64` and losing precision beyond ~15 significant digits.
    fn parse_double(&self, reader: &mut ByteReader) -> Result<FieldValue> {
        match self.encoding {
            FieldEncoding::Zigzag => {
                let scaled = decode_zigzag(decode_varint(reader)?);
                Ok(FieldValue::String(scale_to_double(scaled, self.scale)))
            }
            FieldEncoding::Varint => {
                let scaled = decode_varint(reader)? as i64;
                Ok(FieldValue::String(scale_to_double(scaled, self.scale)))
            }
            FieldEncoding::None | FieldEncoding::Fixed8 => {
                Ok(FieldValue::Double(read_double_fixed8(reader)?))
            }
            FieldEncoding::Fixed4 => {
                Ok(FieldValue::Double(f32::from_be_bytes(read_fixed4(reader)?) as f64))
            }
            other => Err(BidFxError::pricing(format!(
                "unsupported encoding {other:?} for Double field {}",
                self.name
            ))),
        }
    }

    /// Long/Int fields are always delivered stringified (per the spec's
    /// value-parsing table); the `Varint` branch keeps `scale_to_long`'s
    /// formatted string directly instead of parsing it back into an `i64`.
    fn parse_int(&self, reader: &mut ByteReader) -> Result<FieldValue> {
        let value = match self.encoding {
            FieldEncoding::Zigzag => decode_zigzag(decode_varint(reader)?).to_string(),
            FieldEncoding::Varint => scale_to_long(decode_varint(reader)? as i64, self.scale),
            FieldEncoding::None => match self.field_type {
                FieldType::Long => read_long_fixed8(reader)?.to_string(),
                _ => read_int_fixed4(reader)?.to_string(),
            },
            FieldEncoding::Fixed1 => (read_fixed1(reader)?[0] as i64).to_string(),
            FieldEncoding::Fixed2 => u16::from_be_bytes(read_fixed2(reader)?).to_string(),
            FieldEncoding::Fixed3 => {
                let b = read_fixed3(reader)?;
                (((b[0] as u32) << 16) | ((b[1] as u32) << 8) | b[2] as u32).to_string()
            }
            FieldEncoding::Fixed4 => u32::from_be_bytes(read_fixed4(reader)?).to_string(),
            FieldEncoding::Fixed8 => read_long_fixed8(reader)?.to_string(),
            FieldEncoding::Fixed16 => {
                let b = read_fixed16(reader)?;
                i64::from_be_bytes(b[8..16].try_into().unwrap()).to_string()
            }
            FieldEncoding::ByteArray => {
                let bytes = read_byte_array(reader)?;
                bytes.iter().fold(0i64, |acc, &b| (acc << 8) | b as i64).to_string()
            }
            FieldEncoding::Str => {
                return Err(BidFxError::pricing(format!(
                    "string encoding is not valid for int field {}",
                    self.name
                )))
            }
        };
        Ok(FieldValue::String(value))
    }
}

/// Data dictionary, keyed by field id, updated incrementally as the server
/// sends new or amended field definitions.
#[derive(Debug, Clone, Default)]
pub struct DataDictionary {
    fields: BTreeMap<u64, FieldDef>,
}

impl DataDictionary {
    pub fn get(&self, fid: u64) -> Option<&FieldDef> {
        self.fields.get(&fid)
    }

    pub fn update(&mut self, defs: Vec<FieldDef>) {
        for def in defs {
            self.fields.insert(def.fid, def);
        }
    }

    pub fn replace(&mut self, defs: Vec<FieldDef>) {
        self.fields = defs.into_iter().map(|d| (d.fid, d)).collect();
    }
}

pub struct DataDictionaryMessage {
    pub is_updated: bool,
    pub is_compressed: bool,
    pub definitions: Vec<FieldDef>,
}

impl DataDictionaryMessage {
    pub fn decode(body: &[u8], decompressor: &mut Decompressor) -> Result<Self> {
        let mut reader = ByteReader::new(body);
        let option = decode_varint(&mut reader)?;
        let is_updated = option & 2 != 0;
        let is_compressed = option & 1 != 0;
        let size = decode_varint(&mut reader)?;

        let remainder = reader.take(reader.remaining())?.to_vec();
        let decoded_bytes = if is_compressed {
            decompressor.decompress(&remainder)?
        } else {
            remainder
        };
        let mut body_reader = ByteReader::new(&decoded_bytes);
        let mut definitions = Vec::with_capacity(size as usize);
        for _ in 0..size {
            definitions.push(FieldDef::decode(&mut body_reader)?);
        }
        Ok(DataDictionaryMessage { is_updated, is_compressed, definitions })
    }
}

/// `ERROR_FID`, sent instead of a real field id to mark a price field that
/// could not be computed server-side.
const ERROR_FID: u64 = 0x7fff_ffff;

fn subscription_status(tag: u8) -> Result<SubscriptionStatus> {
    Ok(match tag {
        b'O' => SubscriptionStatus::Ok,
        b'P' => SubscriptionStatus::Pending,
        b'S' => SubscriptionStatus::Stale,
        b'C' => SubscriptionStatus::Cancelled,
        b'D' => SubscriptionStatus::Discontinued,
        b'H' => SubscriptionStatus::Prohibited,
        b'U' => SubscriptionStatus::Unavailable,
        b'R' => SubscriptionStatus::Rejected,
        b'T' => SubscriptionStatus::Timeout,
        b'I' => SubscriptionStatus::Inactive,
        b'E' => SubscriptionStatus::Exhausted,
        b'L' => SubscriptionStatus::Closed,
        other => {
            return Err(BidFxError::pricing(format!("unrecognized subscription status byte {other:#04x}")))
        }
    })
}

/// A decoded price-sync message body, ready to be walked update-by-update
/// against the subject list for its edition.
pub struct PriceSyncMessage {
    pub revision: u64,
    pub revision_time: u64,
    pub conflation_latency: u64,
    pub edition: u64,
    pub size: u64,
    buffer: Vec<u8>,
}

enum UpdateTag {
    Partial,
    Full,
    Status,
}

impl PriceSyncMessage {
    pub fn decode(body: &[u8], decompressor: &mut Decompressor) -> Result<Self> {
        let mut reader = ByteReader::new(body);
        let is_compressed = decode_varint(&mut reader)? == 1;
        let revision = decode_varint(&mut reader)?;
        let revision_time = decode_varint(&mut reader)?;
        let conflation_latency = decode_varint(&mut reader)?;
        let edition = decode_varint(&mut reader)?;
        let size = decode_varint(&mut reader)?;
        let remainder = reader.take(reader.remaining())?.to_vec();
        let buffer = if is_compressed { decompressor.decompress(&remainder)? } else { remainder };
        Ok(PriceSyncMessage { revision, revision_time, conflation_latency, edition, size, buffer })
    }

    /// Walk every update in this message, looking up each update's subject
    /// by subscription id and emitting a [`PriceEvent`] or
    /// [`SubscriptionEvent`] for it.
    pub fn visit_updates(
        &self,
        subjects: &[Subject],
        dictionary: &DataDictionary,
        mut on_price: impl FnMut(PriceEvent),
        mut on_subscription: impl FnMut(SubscriptionEvent),
    ) -> Result<()> {
        let mut reader = ByteReader::new(&self.buffer);
        for _ in 0..self.size {
            let tag = reader.take_byte()?;
            // Reproduces the original `if/if/elif` structure: a partial-map
            // tag is handled by the first branch and falls through to the
            // (always-false) full-map check before the status branch, which
            // is harmless here since the byte has already been consumed.
            let update_tag = match tag {
                b'p' => UpdateTag::Partial,
                b'f' => UpdateTag::Full,
                b's' => UpdateTag::Status,
                other => {
                    return Err(BidFxError::pricing(format!("unrecognized price update tag {other:#04x}")))
                }
            };
            match update_tag {
                UpdateTag::Partial => self.visit_price_update(&mut reader, subjects, dictionary, false, &mut on_price)?,
                UpdateTag::Full => self.visit_price_update(&mut reader, subjects, dictionary, true, &mut on_price)?,
                UpdateTag::Status => self.visit_status_update(&mut reader, subjects, &mut on_subscription)?,
            }
        }
        Ok(())
    }

    fn visit_price_update(
        &self,
        reader: &mut ByteReader,
        subjects: &[Subject],
        dictionary: &DataDictionary,
        full: bool,
        on_price: &mut impl FnMut(PriceEvent),
    ) -> Result<()> {
        let sid = decode_varint(reader)? as usize;
        let subject = subjects
            .get(sid)
            .ok_or_else(|| BidFxError::pricing(format!("no subject registered for sid {sid}")))?
            .clone();
        let field_count = decode_varint(reader)?;
        let mut fields = BTreeMap::new();
        for _ in 0..field_count {
            let fid = decode_varint(reader)?;
            if fid == ERROR_FID {
                continue;
            }
            let def = dictionary
                .get(fid)
                .ok_or_else(|| BidFxError::pricing(format!("no field definition for fid {fid}")))?;
            let value = def.parse_value(reader)?;
            if def.enabled {
                fields.insert(def.name.clone(), value);
            }
        }
        on_price(PriceEvent::new(subject, fields, full));
        Ok(())
    }

    fn visit_status_update(
        &self,
        reader: &mut ByteReader,
        subjects: &[Subject],
        on_subscription: &mut impl FnMut(SubscriptionEvent),
    ) -> Result<()> {
        let sid = decode_varint(reader)? as usize;
        let subject = subjects
            .get(sid)
            .ok_or_else(|| BidFxError::pricing(format!("no subject registered for sid {sid}")))?
            .clone();
        let status = subscription_status(reader.take_byte()?)?;
        let explanation = decode_string(reader)?.unwrap_or_default();
        on_subscription(SubscriptionEvent::new(subject, status, explanation));
        Ok(())
    }
}

/// Per-subscription control-channel operation, unused by this client today
/// but retained in the wire format for forward compatibility with servers
/// that expect the `is_controls` section to at least be well-formed.
pub struct SubscriptionSyncMessage {
    pub edition: u64,
    pub subjects: Vec<Subject>,
    pub is_compressed: bool,
}

impl SubscriptionSyncMessage {
    pub fn new(edition: u64, subjects: Vec<Subject>, is_compressed: bool) -> Self {
        SubscriptionSyncMessage { edition, subjects, is_compressed }
    }

    pub fn to_bytes(&self, compressor: &mut Compressor) -> Result<Vec<u8>> {
        let option: u64 = if self.is_compressed { 1 } else { 0 };
        let mut body = Vec::new();
        body.extend(encode_varint(option));
        body.extend(encode_varint(self.edition));
        body.extend(encode_varint(self.subjects.len() as u64));
        for subject in &self.subjects {
            let encoded = encode_strings_list(&subject.flatten());
            if self.is_compressed {
                body.extend(compressor.compress(&encoded)?);
            } else {
                body.extend(encoded);
            }
        }
        Ok(frame(MessageType::SubscriptionSync, &body))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn welcome_message_decodes_seed_bytes() {
        // options=0, version=4, client_id=1, server_id=2
        let mut body = Vec::new();
        body.extend(encode_varint(0));
        body.extend(encode_varint(4));
        body.extend(1i32.to_be_bytes());
        body.extend(2i32.to_be_bytes());
        let welcome = WelcomeMessage::decode(&body).unwrap();
        assert_eq!(welcome.version, CURRENT_PROTOCOL_VERSION);
        assert_eq!(welcome.client_id, 1);
        assert_eq!(welcome.server_id, 2);
    }

    #[test]
    fn grant_message_decodes_rejection_reason() {
        let mut body = vec![b'f'];
        body.extend(encode_string(Some("bad credentials")));
        let grant = GrantMessage::decode(&body).unwrap();
        assert!(!grant.granted);
        assert_eq!(grant.reason.as_deref(), Some("bad credentials"));
    }

    #[test]
    fn ack_message_framing_round_trips_through_length_prefix() {
        let ack = AckMessage::new(10, 1000, 2000, 2010);
        let bytes = ack.to_bytes();
        let mut reader = ByteReader::new(&bytes);
        let len = decode_varint(&mut reader).unwrap();
        assert_eq!(reader.remaining() as u64, len);
        assert_eq!(reader.take_byte().unwrap(), MessageType::Ack.tag());
    }

    #[test]
    fn subscription_sync_round_trips_subjects_uncompressed() {
        let subject = Subject::from_pairs(vec![
            ("AssetClass".to_string(), "Fx".to_string()),
            ("Symbol".to_string(), "EURUSD".to_string()),
        ]);
        let message = SubscriptionSyncMessage::new(2, vec![subject.clone()], false);
        let mut compressor = Compressor::new();
        let bytes = message.to_bytes(&mut compressor).unwrap();

        let mut reader = ByteReader::new(&bytes);
        let _len = decode_varint(&mut reader).unwrap();
        assert_eq!(reader.take_byte().unwrap(), MessageType::SubscriptionSync.tag());
        let option = decode_varint(&mut reader).unwrap();
        assert_eq!(option, 0);
        let edition = decode_varint(&mut reader).unwrap();
        assert_eq!(edition, 2);
        let count = decode_varint(&mut reader).unwrap();
        assert_eq!(count, 1);
        let flat = decode_strings_list(&mut reader).unwrap();
        assert_eq!(flat, subject.flatten());
    }

    #[test]
    fn data_dictionary_field_def_scaled_double_round_trips() {
        let mut body = Vec::new();
        body.extend(encode_varint(7)); // fid
        body.push(b'D');
        body.push(b'V');
        body.extend(encode_varint(4)); // scale
        body.extend(encode_string(Some("Bid")));
        let mut reader = ByteReader::new(&body);
        let def = FieldDef::decode(&mut reader).unwrap();
        assert_eq!(def.name, "Bid");
        assert!(def.enabled);

        let mut value_bytes = Vec::new();
        value_bytes.extend(encode_varint(12345));
        let mut value_reader = ByteReader::new(&value_bytes);
        let value = def.parse_value(&mut value_reader).unwrap();
        assert_eq!(value, FieldValue::String("1.2345".to_string()));
    }

    #[test]
    fn data_dictionary_field_def_scaled_double_zero_keeps_decimal_point() {
        let mut body = Vec::new();
        body.extend(encode_varint(8)); // fid
        body.push(b'D');
        body.push(b'V');
        body.extend(encode_varint(4)); // scale
        body.extend(encode_string(Some("Ask")));
        let mut reader = ByteReader::new(&body);
        let def = FieldDef::decode(&mut reader).unwrap();

        let mut value_bytes = Vec::new();
        value_bytes.extend(encode_varint(0));
        let mut value_reader = ByteReader::new(&value_bytes);
        let value = def.parse_value(&mut value_reader).unwrap();
        assert_eq!(value, FieldValue::String("0.0".to_string()));
    }

    #[test]
    fn legacy_fields_are_flagged_disabled() {
        let mut body = Vec::new();
        body.extend(encode_varint(1));
        body.push(b'S');
        body.push(b'S');
        body.extend(encode_varint(0));
        body.extend(encode_string(Some("SystemTime")));
        let mut reader = ByteReader::new(&body);
        let def = FieldDef::decode(&mut reader).unwrap();
        assert!(!def.enabled);
    }
}
