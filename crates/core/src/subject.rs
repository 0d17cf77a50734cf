//! `Subject` — the immutable, ordered multi-component instrument identifier
//! used as the key of a price subscription.
//!
//! A subject is a sequence of `(key, value)` string pairs, kept sorted and
//! de-duplicated by key so that two subjects built from the same components
//! are equal regardless of construction order. The string form
//! `K1=V1,K2=V2,...` is the canonical wire form used by Puffin and by the
//! Pixie subscription sync subject list.

use std::collections::BTreeMap;
use std::fmt;

/// Component key: the asset class of the instrument (`"Fx"`, `"Equity"`, `"Future"`).
pub const ASSET_CLASS: &str = "AssetClass";
pub const BUY_SIDE_ACCOUNT: &str = "BuySideAccount";
pub const CURRENCY: &str = "Currency";
pub const CURRENCY_PAIR: &str = "Symbol";
pub const DEAL_TYPE: &str = "DealType";
pub const EXCHANGE: &str = "Exchange";
pub const EXPIRY_DATE: &str = "ExpiryDate";
pub const FAR_CURRENCY: &str = "FarCurrency";
pub const FAR_FIXING_DATE: &str = "FarFixingDate";
pub const FAR_QUANTITY: &str = "FarQuantity";
pub const FAR_SETTLEMENT_DATE: &str = "FarSettlementDate";
pub const FAR_TENOR: &str = "FarTenor";
pub const FIXING_CCY: &str = "FixingCcy";
pub const FIXING_DATE: &str = "FixingDate";
pub const LEVEL: &str = "Level";
pub const LIQUIDITY_PROVIDER: &str = "LiquidityProvider";
pub const ON_BEHALF_OF: &str = "OnBehalfOf";
pub const PUT_CALL: &str = "PutCall";
pub const QUANTITY: &str = "Quantity";
pub const REQUEST_TYPE: &str = "RequestFor";
pub const ROUTE: &str = "Route";
pub const ROWS: &str = "Rows";
pub const SETTLEMENT_DATE: &str = "SettlementDate";
pub const SOURCE: &str = "Source";
pub const STRIKE: &str = "Strike";
pub const SYMBOL: &str = "Symbol";
pub const TENOR: &str = "Tenor";
pub const USER: &str = "User";

/// An immutable, ordered multi-component instrument identifier.
///
/// Components are kept sorted lexicographically by key with distinct keys;
/// equality and hashing are structural over the sorted sequence.
#[derive(Debug, Clone, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub struct Subject {
    components: Vec<(String, String)>,
}

impl Subject {
    /// Build a subject from a map of components, sorting by key.
    pub fn from_key_value_map(map: &BTreeMap<String, String>) -> Self {
        Subject {
            components: map.iter().map(|(k, v)| (k.clone(), v.clone())).collect(),
        }
    }

    /// Build a subject directly from an already key-sorted component list.
    /// Used internally by the subject builder, which maintains a `BTreeMap`.
    pub fn from_pairs(pairs: Vec<(String, String)>) -> Self {
        let mut map = BTreeMap::new();
        for (k, v) in pairs {
            map.insert(k, v);
        }
        Subject::from_key_value_map(&map)
    }

    /// Parse the canonical `K1=V1,K2=V2,...` string form.
    pub fn parse(s: &str) -> Self {
        let pairs = s
            .split(',')
            .map(|component| {
                let mut parts = component.splitn(2, '=');
                let key = parts.next().unwrap_or_default().to_string();
                let value = parts.next().unwrap_or_default().to_string();
                (key, value)
            })
            .collect();
        Subject::from_pairs(pairs)
    }

    /// Get the value of a component, or `default` if absent.
    pub fn get<'a>(&'a self, key: &str, default: &'a str) -> &'a str {
        self.find(key).unwrap_or(default)
    }

    /// Get the value of a component without a default.
    pub fn get_opt(&self, key: &str) -> Option<&str> {
        self.find(key)
    }

    fn find(&self, key: &str) -> Option<&str> {
        self.components
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Whether this subject has a component with the given key.
    pub fn contains(&self, key: &str) -> bool {
        self.find(key).is_some()
    }

    /// Number of components.
    pub fn len(&self) -> usize {
        self.components.len()
    }

    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }

    /// Flatten into `[k1, v1, k2, v2, ...]` in key order — the wire form used
    /// by the Pixie subscription sync subject list.
    pub fn flatten(&self) -> Vec<String> {
        let mut out = Vec::with_capacity(self.components.len() * 2);
        for (k, v) in &self.components {
            out.push(k.clone());
            out.push(v.clone());
        }
        out
    }
}

impl fmt::Display for Subject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for (k, v) in &self.components {
            if !first {
                write!(f, ",")?;
            }
            first = false;
            write!(f, "{k}={v}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn map(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    #[test]
    fn sort_stability() {
        let subject = Subject::from_key_value_map(&map(&[
            ("Symbol", "EURUSD"),
            ("AssetClass", "Fx"),
            ("Level", "1"),
        ]));
        let flat = subject.flatten();
        let keys: Vec<&String> = flat.iter().step_by(2).collect();
        let mut sorted = keys.clone();
        sorted.sort();
        assert_eq!(keys, sorted);
    }

    #[test]
    fn round_trip_through_string() {
        let subject = Subject::from_key_value_map(&map(&[
            ("AssetClass", "Fx"),
            ("Exchange", "OTC"),
            ("Level", "1"),
            ("Source", "Indi"),
            ("Symbol", "USDJPY"),
        ]));
        let s = subject.to_string();
        let parsed = Subject::parse(&s);
        assert_eq!(subject, parsed);
    }

    #[test]
    fn equality_is_structural() {
        let a = Subject::from_key_value_map(&map(&[("A", "1"), ("B", "2")]));
        let b = Subject::from_key_value_map(&map(&[("B", "2"), ("A", "1")]));
        assert_eq!(a, b);
    }

    #[test]
    fn get_and_contains() {
        let subject = Subject::from_key_value_map(&map(&[("Symbol", "EURUSD")]));
        assert_eq!(subject.get("Symbol", ""), "EURUSD");
        assert_eq!(subject.get("Missing", "fallback"), "fallback");
        assert!(subject.contains("Symbol"));
        assert!(!subject.contains("Missing"));
    }
}
