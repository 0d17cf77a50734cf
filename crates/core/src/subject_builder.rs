//! A compile-time guided builder for [`Subject`]s.
//!
//! Each method chain is modeled as a sequence of distinct Rust types: picking
//! `.fx().stream().swap()` hands you a `SwapSubjectBuilder` whose only
//! methods are the ones valid for an FX swap. There is no way to call a
//! spot-only or forward-only setter on the wrong builder — the method simply
//! does not exist on that type, so a nonsensical chain is a compile error
//! rather than a runtime one. Validation of cross-field rules (currency vs.
//! currency pair, positive quantities, mandatory keys) still happens at
//! `build()` time, since those rules depend on the values supplied, not just
//! their shape.

use std::collections::BTreeMap;

use crate::error::{BidFxError, Result};
use crate::subject::{self, Subject};
use crate::tenor;

/// ISO currency and precious-metal codes accepted by [`Subject`] validation.
/// Mirrors the allow-list used to sanity-check `currency` and
/// `currency_pair` components before a subject ever reaches the wire.
const CURRENCY_CODES: &[&str] = &[
    "XAU", "XPT", "XPD", "XAG", "XDR", "EUR", "GBP", "AUD", "NZD", "USD", "CAD", "CHF", "NOK",
    "DKK", "SEK", "CLF", "KWD", "BHD", "OMR", "JOD", "FKP", "GIP", "SHP", "KYD", "CHE", "CUC",
    "BSD", "PAB", "BMD", "CUP", "CHW", "SGD", "BND", "LYD", "AZN", "ANG", "AWG", "BAM", "BGN",
    "BYN", "BBD", "BZD", "FJD", "TOP", "TND", "GEL", "WST", "XCD", "BRL", "PGK", "MXV", "PEN",
    "TMT", "QAR", "ILS", "AED", "TRY", "SAR", "PLN", "GHS", "RON", "MYR", "SDG", "TTD", "CNH",
    "CNY", "BOB", "HRK", "GTQ", "SRD", "HKD", "SBD", "MOP", "TJS", "SVC", "MAD", "VEF", "BWP",
    "ZAR", "SCR", "NAD", "LSL", "SZL", "ARS", "ERN", "MVR", "EGP", "MXN", "MDL", "ETB", "HNL",
    "CZK", "UAH", "UYI", "UYU", "NIO", "TWD", "THB", "MUR", "GMD", "DOP", "PHP", "RUB", "MKD",
    "BOV", "BTN", "INR", "AFN", "KGS", "HTG", "MZN", "SSP", "BDT", "LRD", "NPR", "KES", "CVE",
    "PKR", "VUV", "DZD", "ISK", "JPY", "XPF", "RSD", "ALL", "JMD", "LKR", "AOA", "DJF", "GYD",
    "COU", "YER", "HUF", "KZT", "NGN", "ZWL", "MRO", "KMF", "AMD", "SYP", "SOS", "CRC", "XAF",
    "XOF", "CLP", "MWK", "RWF", "KPW", "KRW", "IQD", "MMK", "CDF", "LBP", "BIF", "TZS", "MNT",
    "COP", "MGA", "UGX", "UZS", "KHR", "ZMW", "PYG", "SLL", "LAK", "GNF", "IDR", "VND", "STD",
    "IRR", "XSU", "XUA",
];

fn format_quantity(qty: f64) -> Result<String> {
    if qty > 0.0 {
        Ok(format!("{qty:.2}"))
    } else {
        Err(BidFxError::invalid_subject(format!("invalid quantity, positive number expected instead of: {qty}")))
    }
}

fn validate_currency(ccy: &str) -> Result<()> {
    if CURRENCY_CODES.contains(&ccy) {
        Ok(())
    } else {
        Err(BidFxError::invalid_subject(format!("invalid ISO currency code: \"{ccy}\"")))
    }
}

fn validate_currency_pair(ccy_pair: &str) -> Result<()> {
    if ccy_pair.is_ascii() && ccy_pair.len() == 6 {
        let ccy1 = &ccy_pair[..3];
        let ccy2 = &ccy_pair[3..];
        if ccy1 != ccy2 && (CURRENCY_CODES.contains(&ccy1) || CURRENCY_CODES.contains(&ccy2)) {
            return Ok(());
        }
    }
    Err(BidFxError::invalid_subject(format!("invalid currency pair code: \"{ccy_pair}\"")))
}

fn validate_ccy_against_pair(ccy: Option<&str>, ccy_pair: Option<&str>) -> Result<()> {
    if let (Some(ccy), Some(ccy_pair)) = (ccy, ccy_pair) {
        if ccy_pair.is_ascii() && ccy_pair.len() == 6 && ccy != &ccy_pair[..3] && ccy != &ccy_pair[3..] {
            return Err(BidFxError::invalid_subject(format!(
                "currency \"{ccy}\" is not part of currency pair \"{ccy_pair}\""
            )));
        }
    }
    Ok(())
}

fn validate_date(date: i64) -> Result<String> {
    if date > 19_000_101 {
        Ok(date.to_string())
    } else {
        Err(BidFxError::invalid_subject(format!("incorrectly formatted date \"{date}\", expected YYYYMMDD")))
    }
}

fn require(components: &BTreeMap<String, String>, keys: &[&str]) -> Result<()> {
    let missing: Vec<&str> = keys.iter().copied().filter(|k| !components.contains_key(*k)).collect();
    if missing.is_empty() {
        Ok(())
    } else {
        let mut sorted = missing;
        sorted.sort_unstable();
        Err(BidFxError::invalid_subject(format!("incomplete subject is missing: {}", sorted.join(", "))))
    }
}

fn build_from(components: BTreeMap<String, String>) -> Subject {
    Subject::from_key_value_map(&components)
}

fn set_settlement_date(components: &mut BTreeMap<String, String>, tenor_key: &str, settlement_key: &str, date: i64) -> Result<()> {
    components.entry(tenor_key.to_string()).or_insert_with(|| tenor::BROKEN_DATE.to_string());
    components.insert(settlement_key.to_string(), validate_date(date)?);
    Ok(())
}

/// Entry point: begins a method chain for FX, future, or equity subjects.
/// Requires the username that will identify the subscriber to a dealable FX
/// provider.
pub struct SubjectBuilder {
    username: String,
    default_account: Option<String>,
}

impl SubjectBuilder {
    pub fn new(username: impl Into<String>, default_account: Option<String>) -> Result<Self> {
        let username = username.into();
        if username.is_empty() {
            return Err(BidFxError::pricing("a username must be provided to subject builder"));
        }
        Ok(SubjectBuilder { username, default_account })
    }

    pub fn fx(&self) -> FxSubject {
        FxSubject { username: self.username.clone(), default_account: self.default_account.clone() }
    }

    pub fn future(&self) -> ListedSubjectBuilder {
        ListedSubjectBuilder::new("Future")
    }

    pub fn equity(&self) -> ListedSubjectBuilder {
        ListedSubjectBuilder::new("Equity")
    }
}

/// A listed (exchange-traded) subject: a future or an equity.
pub struct ListedSubjectBuilder {
    components: BTreeMap<String, String>,
}

impl ListedSubjectBuilder {
    fn new(asset_class: &str) -> Self {
        let mut components = BTreeMap::new();
        components.insert(subject::LEVEL.to_string(), "1".to_string());
        components.insert(subject::ASSET_CLASS.to_string(), asset_class.to_string());
        ListedSubjectBuilder { components }
    }

    pub fn source(mut self, source: impl Into<String>) -> Self {
        self.components.insert(subject::SOURCE.to_string(), source.into());
        self
    }

    pub fn level(mut self, level: impl Into<String>) -> Self {
        self.components.insert(subject::LEVEL.to_string(), level.into());
        self
    }

    pub fn exchange(mut self, exchange: impl Into<String>) -> Self {
        self.components.insert(subject::EXCHANGE.to_string(), exchange.into());
        self
    }

    pub fn symbol(mut self, symbol: impl Into<String>) -> Self {
        self.components.insert(subject::SYMBOL.to_string(), symbol.into());
        self
    }

    /// Adds the level-2 ("book") components: a fixed liquidity provider and
    /// an optional row-count limit.
    pub fn book(mut self, rows: Option<u32>) -> Self {
        self.components.insert(subject::LIQUIDITY_PROVIDER.to_string(), "FXTS".to_string());
        self.components.insert(subject::LEVEL.to_string(), "2".to_string());
        if let Some(rows) = rows {
            self.components.insert(subject::ROWS.to_string(), rows.to_string());
        }
        self
    }

    pub fn build(self) -> Result<Subject> {
        require(&self.components, &[subject::SYMBOL, subject::EXCHANGE, subject::SOURCE])?;
        Ok(build_from(self.components))
    }
}

/// Begins an FX method chain: indicative, streamed (`stream`), or RFQ
/// (`quote`) pricing.
pub struct FxSubject {
    username: String,
    default_account: Option<String>,
}

impl FxSubject {
    pub fn indicative(&self) -> IndicativeSubject {
        IndicativeSubject
    }

    pub fn stream(&self) -> DealableSubject {
        DealableSubject::new(self.dealable_components("Stream"))
    }

    pub fn quote(&self) -> DealableSubject {
        DealableSubject::new(self.dealable_components("Quote"))
    }

    fn dealable_components(&self, request_type: &str) -> BTreeMap<String, String> {
        let mut components = BTreeMap::new();
        components.insert(subject::ASSET_CLASS.to_string(), "Fx".to_string());
        components.insert(subject::REQUEST_TYPE.to_string(), request_type.to_string());
        components.insert(subject::USER.to_string(), self.username.clone());
        if let Some(account) = &self.default_account {
            components.insert(subject::BUY_SIDE_ACCOUNT.to_string(), account.clone());
        }
        components
    }
}

/// Shared-pricing (indicative) FX subjects never carry a `User` key, so they
/// always route to Puffin.
pub struct IndicativeSubject;

impl IndicativeSubject {
    pub fn spot(&self) -> IndicativeSpotBuilder {
        let mut components = BTreeMap::new();
        components.insert(subject::LEVEL.to_string(), "1".to_string());
        components.insert(subject::ASSET_CLASS.to_string(), "Fx".to_string());
        components.insert(subject::EXCHANGE.to_string(), "OTC".to_string());
        components.insert(subject::SOURCE.to_string(), "Indi".to_string());
        IndicativeSpotBuilder { components }
    }
}

pub struct IndicativeSpotBuilder {
    components: BTreeMap<String, String>,
}

impl IndicativeSpotBuilder {
    pub fn source(mut self, source: impl Into<String>) -> Self {
        self.components.insert(subject::SOURCE.to_string(), source.into());
        self
    }

    pub fn currency_pair(mut self, ccy_pair: impl Into<String>) -> Result<Self> {
        let ccy_pair = ccy_pair.into();
        validate_currency_pair(&ccy_pair)?;
        self.components.insert(subject::CURRENCY_PAIR.to_string(), ccy_pair);
        Ok(self)
    }

    pub fn build(self) -> Result<Subject> {
        require(&self.components, &[subject::SYMBOL])?;
        Ok(build_from(self.components))
    }
}

/// A dealable (exclusive, Pixie-routed) FX subject awaiting a deal-type
/// choice: `spot`, `forward`, `ndf`, `swap`, or `nds`.
pub struct DealableSubject {
    components: BTreeMap<String, String>,
}

impl DealableSubject {
    fn new(components: BTreeMap<String, String>) -> Self {
        DealableSubject { components }
    }

    pub fn spot(&self) -> SpotSubjectBuilder {
        let mut components = self.components.clone();
        components.insert(subject::LEVEL.to_string(), "1".to_string());
        components.insert(subject::DEAL_TYPE.to_string(), "Spot".to_string());
        components.insert(subject::TENOR.to_string(), tenor::SPOT.to_string());
        SpotSubjectBuilder { components }
    }

    pub fn forward(&self) -> ForwardSubjectBuilder {
        ForwardSubjectBuilder::new(self.components.clone(), true)
    }

    pub fn ndf(&self) -> ForwardSubjectBuilder {
        ForwardSubjectBuilder::new(self.components.clone(), false)
    }

    pub fn swap(&self) -> SwapSubjectBuilder {
        SwapSubjectBuilder::new(self.components.clone(), true)
    }

    pub fn nds(&self) -> SwapSubjectBuilder {
        SwapSubjectBuilder::new(self.components.clone(), false)
    }
}

pub struct SpotSubjectBuilder {
    components: BTreeMap<String, String>,
}

impl SpotSubjectBuilder {
    pub fn liquidity_provider(mut self, lp: impl Into<String>) -> Self {
        self.components.insert(subject::LIQUIDITY_PROVIDER.to_string(), lp.into());
        self
    }

    pub fn currency_pair(mut self, ccy_pair: impl Into<String>) -> Result<Self> {
        let ccy_pair = ccy_pair.into();
        validate_currency_pair(&ccy_pair)?;
        validate_ccy_against_pair(self.components.get(subject::CURRENCY).map(String::as_str), Some(&ccy_pair))?;
        self.components.insert(subject::CURRENCY_PAIR.to_string(), ccy_pair);
        Ok(self)
    }

    pub fn currency(mut self, ccy: impl Into<String>) -> Result<Self> {
        let ccy = ccy.into();
        validate_currency(&ccy)?;
        validate_ccy_against_pair(Some(&ccy), self.components.get(subject::CURRENCY_PAIR).map(String::as_str))?;
        self.components.insert(subject::CURRENCY.to_string(), ccy);
        Ok(self)
    }

    pub fn quantity(mut self, qty: f64) -> Result<Self> {
        self.components.insert(subject::QUANTITY.to_string(), format_quantity(qty)?);
        Ok(self)
    }

    pub fn buy_side_account(mut self, account_code: impl Into<String>) -> Self {
        self.components.insert(subject::BUY_SIDE_ACCOUNT.to_string(), account_code.into());
        self
    }

    pub fn on_behalf_of(mut self, username: impl Into<String>) -> Self {
        self.components.insert(subject::ON_BEHALF_OF.to_string(), username.into());
        self
    }

    pub fn build(self) -> Result<Subject> {
        require(
            &self.components,
            &[
                subject::BUY_SIDE_ACCOUNT,
                subject::CURRENCY,
                subject::CURRENCY_PAIR,
                subject::QUANTITY,
                subject::LIQUIDITY_PROVIDER,
                subject::SYMBOL,
            ],
        )?;
        Ok(build_from(self.components))
    }
}

pub struct ForwardSubjectBuilder {
    components: BTreeMap<String, String>,
    settlement_date_required: bool,
}

impl ForwardSubjectBuilder {
    fn new(mut components: BTreeMap<String, String>, deliverable: bool) -> Self {
        components.insert(subject::DEAL_TYPE.to_string(), if deliverable { "Outright" } else { "NDF" }.to_string());
        ForwardSubjectBuilder { components, settlement_date_required: false }
    }

    pub fn liquidity_provider(mut self, lp: impl Into<String>) -> Self {
        self.components.insert(subject::LIQUIDITY_PROVIDER.to_string(), lp.into());
        self
    }

    pub fn currency_pair(mut self, ccy_pair: impl Into<String>) -> Result<Self> {
        let ccy_pair = ccy_pair.into();
        validate_currency_pair(&ccy_pair)?;
        validate_ccy_against_pair(self.components.get(subject::CURRENCY).map(String::as_str), Some(&ccy_pair))?;
        self.components.insert(subject::CURRENCY_PAIR.to_string(), ccy_pair);
        Ok(self)
    }

    pub fn currency(mut self, ccy: impl Into<String>) -> Result<Self> {
        let ccy = ccy.into();
        validate_currency(&ccy)?;
        validate_ccy_against_pair(Some(&ccy), self.components.get(subject::CURRENCY_PAIR).map(String::as_str))?;
        self.components.insert(subject::CURRENCY.to_string(), ccy);
        Ok(self)
    }

    pub fn quantity(mut self, qty: f64) -> Result<Self> {
        self.components.insert(subject::QUANTITY.to_string(), format_quantity(qty)?);
        Ok(self)
    }

    pub fn buy_side_account(mut self, account_code: impl Into<String>) -> Self {
        self.components.insert(subject::BUY_SIDE_ACCOUNT.to_string(), account_code.into());
        self
    }

    pub fn tenor(mut self, tenor: impl Into<String>) -> Self {
        let tenor = tenor.into();
        self.settlement_date_required = tenor == tenor::BROKEN_DATE;
        self.components.insert(subject::TENOR.to_string(), tenor);
        self
    }

    pub fn settlement_date(mut self, date: i64) -> Result<Self> {
        set_settlement_date(&mut self.components, subject::TENOR, subject::SETTLEMENT_DATE, date)?;
        Ok(self)
    }

    pub fn fixing_date(mut self, date: i64) -> Result<Self> {
        self.components.insert(subject::FIXING_DATE.to_string(), validate_date(date)?);
        Ok(self)
    }

    pub fn on_behalf_of(mut self, username: impl Into<String>) -> Self {
        self.components.insert(subject::ON_BEHALF_OF.to_string(), username.into());
        self
    }

    pub fn build(self) -> Result<Subject> {
        require(
            &self.components,
            &[
                subject::TENOR,
                subject::BUY_SIDE_ACCOUNT,
                subject::CURRENCY,
                subject::CURRENCY_PAIR,
                subject::DEAL_TYPE,
                subject::QUANTITY,
                subject::LIQUIDITY_PROVIDER,
                subject::SYMBOL,
            ],
        )?;
        if self.settlement_date_required && !self.components.contains_key(subject::SETTLEMENT_DATE) {
            return Err(BidFxError::invalid_subject("incomplete subject is missing: SettlementDate"));
        }
        Ok(build_from(self.components))
    }
}

pub struct SwapSubjectBuilder {
    components: BTreeMap<String, String>,
    near_settlement_date_required: bool,
    far_settlement_date_required: bool,
}

impl SwapSubjectBuilder {
    fn new(mut components: BTreeMap<String, String>, deliverable: bool) -> Self {
        components.insert(subject::DEAL_TYPE.to_string(), if deliverable { "Swap" } else { "NDS" }.to_string());
        SwapSubjectBuilder { components, near_settlement_date_required: false, far_settlement_date_required: false }
    }

    pub fn liquidity_provider(mut self, lp: impl Into<String>) -> Self {
        self.components.insert(subject::LIQUIDITY_PROVIDER.to_string(), lp.into());
        self
    }

    pub fn currency_pair(mut self, ccy_pair: impl Into<String>) -> Result<Self> {
        let ccy_pair = ccy_pair.into();
        validate_currency_pair(&ccy_pair)?;
        validate_ccy_against_pair(self.components.get(subject::CURRENCY).map(String::as_str), Some(&ccy_pair))?;
        self.components.insert(subject::CURRENCY_PAIR.to_string(), ccy_pair);
        Ok(self)
    }

    pub fn currency(mut self, ccy: impl Into<String>) -> Result<Self> {
        let ccy = ccy.into();
        validate_currency(&ccy)?;
        validate_ccy_against_pair(Some(&ccy), self.components.get(subject::CURRENCY_PAIR).map(String::as_str))?;
        self.components.insert(subject::CURRENCY.to_string(), ccy.clone());
        self.components.insert(subject::FAR_CURRENCY.to_string(), ccy);
        Ok(self)
    }

    pub fn near_quantity(mut self, qty: f64) -> Result<Self> {
        self.components.insert(subject::QUANTITY.to_string(), format_quantity(qty)?);
        Ok(self)
    }

    pub fn far_quantity(mut self, qty: f64) -> Result<Self> {
        self.components.insert(subject::FAR_QUANTITY.to_string(), format_quantity(qty)?);
        Ok(self)
    }

    pub fn buy_side_account(mut self, account_code: impl Into<String>) -> Self {
        self.components.insert(subject::BUY_SIDE_ACCOUNT.to_string(), account_code.into());
        self
    }

    pub fn near_tenor(mut self, tenor: impl Into<String>) -> Self {
        let tenor = tenor.into();
        self.near_settlement_date_required = tenor == tenor::BROKEN_DATE;
        self.components.insert(subject::TENOR.to_string(), tenor);
        self
    }

    pub fn far_tenor(mut self, tenor: impl Into<String>) -> Self {
        let tenor = tenor.into();
        self.far_settlement_date_required = tenor == tenor::BROKEN_DATE;
        self.components.insert(subject::FAR_TENOR.to_string(), tenor);
        self
    }

    pub fn near_settlement_date(mut self, date: i64) -> Result<Self> {
        set_settlement_date(&mut self.components, subject::TENOR, subject::SETTLEMENT_DATE, date)?;
        Ok(self)
    }

    pub fn far_settlement_date(mut self, date: i64) -> Result<Self> {
        set_settlement_date(&mut self.components, subject::FAR_TENOR, subject::FAR_SETTLEMENT_DATE, date)?;
        Ok(self)
    }

    pub fn near_fixing_date(mut self, date: i64) -> Result<Self> {
        self.components.insert(subject::FIXING_DATE.to_string(), validate_date(date)?);
        Ok(self)
    }

    pub fn far_fixing_date(mut self, date: i64) -> Result<Self> {
        self.components.insert(subject::FAR_FIXING_DATE.to_string(), validate_date(date)?);
        Ok(self)
    }

    pub fn on_behalf_of(mut self, username: impl Into<String>) -> Self {
        self.components.insert(subject::ON_BEHALF_OF.to_string(), username.into());
        self
    }

    pub fn build(self) -> Result<Subject> {
        require(
            &self.components,
            &[
                subject::TENOR,
                subject::FAR_TENOR,
                subject::FAR_QUANTITY,
                subject::BUY_SIDE_ACCOUNT,
                subject::CURRENCY,
                subject::CURRENCY_PAIR,
                subject::DEAL_TYPE,
                subject::QUANTITY,
                subject::LIQUIDITY_PROVIDER,
                subject::SYMBOL,
            ],
        )?;
        if self.near_settlement_date_required && !self.components.contains_key(subject::SETTLEMENT_DATE) {
            return Err(BidFxError::invalid_subject("incomplete subject is missing: SettlementDate"));
        }
        if self.far_settlement_date_required && !self.components.contains_key(subject::FAR_SETTLEMENT_DATE) {
            return Err(BidFxError::invalid_subject("incomplete subject is missing: FarSettlementDate"));
        }
        Ok(build_from(self.components))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_a_dealable_spot_subject() {
        let builder = SubjectBuilder::new("trader1", Some("DEMOACCT".to_string())).unwrap();
        let subject = builder
            .fx()
            .stream()
            .spot()
            .currency_pair("EURUSD")
            .unwrap()
            .currency("EUR")
            .unwrap()
            .quantity(1_000_000.0)
            .unwrap()
            .liquidity_provider("RBCFX")
            .build()
            .unwrap();
        assert_eq!(subject.get(subject::SYMBOL, ""), "EURUSD");
        assert_eq!(subject.get(subject::DEAL_TYPE, ""), "Spot");
        assert_eq!(subject.get(subject::USER, ""), "trader1");
        assert_eq!(subject.get(subject::BUY_SIDE_ACCOUNT, ""), "DEMOACCT");
    }

    #[test]
    fn rejects_unknown_currency() {
        let builder = SubjectBuilder::new("trader1", None).unwrap();
        let err = builder.fx().stream().spot().currency("ZZZ");
        assert!(err.is_err());
    }

    #[test]
    fn rejects_currency_not_in_pair() {
        let builder = SubjectBuilder::new("trader1", None).unwrap();
        let err = builder.fx().stream().spot().currency_pair("EURUSD").unwrap().currency("JPY");
        assert!(err.is_err());
    }

    #[test]
    fn rejects_equal_halves_currency_pair() {
        let builder = SubjectBuilder::new("trader1", None).unwrap();
        let err = builder.fx().stream().spot().currency_pair("EUREUR");
        assert!(err.is_err());
    }

    #[test]
    fn rejects_non_ascii_currency_pair_without_panicking() {
        let builder = SubjectBuilder::new("trader1", None).unwrap();
        let err = builder.fx().stream().spot().currency_pair("ab\u{e9}cd");
        assert!(err.is_err());
    }

    #[test]
    fn forward_with_broken_date_requires_settlement_date() {
        let builder = SubjectBuilder::new("trader1", None).unwrap();
        let result = builder
            .fx()
            .stream()
            .forward()
            .currency_pair("EURUSD")
            .unwrap()
            .currency("EUR")
            .unwrap()
            .quantity(1_000_000.0)
            .unwrap()
            .liquidity_provider("RBCFX")
            .buy_side_account("DEMOACCT")
            .tenor(tenor::BROKEN_DATE)
            .build();
        assert!(result.is_err());
    }

    #[test]
    fn builds_an_indicative_fx_subject_without_a_user_key() {
        let builder = SubjectBuilder::new("trader1", None).unwrap();
        let subject = builder.fx().indicative().spot().currency_pair("EURUSD").unwrap().build().unwrap();
        assert!(!subject.contains(subject::USER));
        assert_eq!(subject.get(subject::ASSET_CLASS, ""), "Fx");
    }

    #[test]
    fn builds_a_listed_future_subject() {
        let builder = SubjectBuilder::new("trader1", None).unwrap();
        let subject = builder.future().exchange("CME").source("CTS").symbol("ESZ9").build().unwrap();
        assert_eq!(subject.get(subject::ASSET_CLASS, ""), "Future");
        assert_eq!(subject.get(subject::EXCHANGE, ""), "CME");
    }

    #[test]
    fn listed_subject_missing_mandatory_keys_is_rejected() {
        let builder = SubjectBuilder::new("trader1", None).unwrap();
        assert!(builder.future().exchange("CME").build().is_err());
    }

    #[test]
    fn book_subject_sets_level_2_and_liquidity_provider() {
        let builder = SubjectBuilder::new("trader1", None).unwrap();
        let subject = builder.future().exchange("CME").source("CTS").symbol("ESZ9").book(Some(10)).build().unwrap();
        assert_eq!(subject.get(subject::LEVEL, ""), "2");
        assert_eq!(subject.get(subject::LIQUIDITY_PROVIDER, ""), "FXTS");
        assert_eq!(subject.get(subject::ROWS, ""), "10");
    }
}
