//! # bidfx-core
//!
//! Shared data model and ambient services used by both price providers and
//! by the pricing façade that sits above them:
//!
//! - **Configuration** (`config`) — INI config file loading
//! - **Error types** (`error`) — domain-specific `BidFxError` via thiserror
//! - **Logging** (`logging`) — tracing-based structured logging
//! - **Time utilities** (`time_util`) — high-precision timestamps
//! - **API identity** (`api_info`) — client name/version/GUID sent on login
//! - **Subject** (`subject`) — the instrument identifier used as a subscription key
//! - **Events** (`events`) — price, subscription, and provider status events
//! - **Callbacks** (`callbacks`) — subscriber callback registration
//! - **Provider** (`provider`) — the common async interface implemented by
//!   each wire protocol
//! - **Connector** (`connector`) — TLS connection and HTTP CONNECT tunnelling
//! - **Tenor** (`tenor`) — standard FX forward/swap settlement periods
//! - **Subject builder** (`subject_builder`) — a type-state builder that
//!   guides construction of valid `Subject`s at compile time

pub mod api_info;
pub mod callbacks;
pub mod config;
pub mod connector;
pub mod error;
pub mod events;
pub mod logging;
pub mod provider;
pub mod subject;
pub mod subject_builder;
pub mod tenor;
pub mod time_util;
