//! Event types delivered to subscriber callbacks.
//!
//! A price event carries a snapshot of changed fields for one subject. A
//! subscription event reports a change in the status of one subscription
//! (subscribing, trading, or some error condition). A provider event reports
//! the connection status of a whole provider (Pixie or Puffin).

use std::collections::BTreeMap;
use std::fmt;

use crate::subject::Subject;

/// A field value as carried in a price event. Pixie and Puffin both speak in
/// terms of a handful of primitive field types; this is their common
/// in-memory representation.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    String(String),
    Double(f64),
    Long(i64),
    Bool(bool),
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::String(s) => write!(f, "{s}"),
            FieldValue::Double(d) => write!(f, "{d}"),
            FieldValue::Long(l) => write!(f, "{l}"),
            FieldValue::Bool(b) => write!(f, "{b}"),
        }
    }
}

/// A batch of field updates for one subject, as delivered to a price
/// callback. `full` is true when this update is a complete replace of the
/// prior image (a "full" map); false when it is a partial update layered on
/// top of the last full image.
#[derive(Debug, Clone, PartialEq)]
pub struct PriceEvent {
    pub subject: Subject,
    pub fields: BTreeMap<String, FieldValue>,
    pub full: bool,
}

impl PriceEvent {
    pub fn new(subject: Subject, fields: BTreeMap<String, FieldValue>, full: bool) -> Self {
        PriceEvent { subject, fields, full }
    }
}

/// The status of a single subscription, as reported by a Pixie status update
/// or a Puffin `<Status>` message. Not normally published for `Ok` — that
/// state is implied by any price update arriving for the subject.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubscriptionStatus {
    Ok,
    Pending,
    Stale,
    Cancelled,
    Discontinued,
    Prohibited,
    Unavailable,
    Rejected,
    Timeout,
    Inactive,
    Exhausted,
    Closed,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SubscriptionEvent {
    pub subject: Subject,
    pub status: SubscriptionStatus,
    pub message: String,
}

impl SubscriptionEvent {
    pub fn new(subject: Subject, status: SubscriptionStatus, message: impl Into<String>) -> Self {
        SubscriptionEvent { subject, status, message: message.into() }
    }
}

/// The connection status of a whole provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderStatus {
    /// Connected, logged in, and able to carry subscriptions.
    Ready,
    /// Disabled by configuration; never attempts to connect.
    Disabled,
    /// Not currently connected; a reconnect attempt is pending or underway.
    Down,
    /// The service itself is unreachable or unavailable.
    Unavailable,
    /// Misconfigured beyond what a reconnect could fix.
    Invalid,
    /// Stopped by the application. Terminal.
    Closed,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProviderEvent {
    pub provider_name: String,
    pub status: ProviderStatus,
    pub message: String,
}

impl ProviderEvent {
    pub fn new(provider_name: impl Into<String>, status: ProviderStatus, message: impl Into<String>) -> Self {
        ProviderEvent { provider_name: provider_name.into(), status, message: message.into() }
    }
}
