//! # bidfx-pixie
//!
//! Client implementation of the exclusive/dealable Pixie pricing protocol:
//! a binary, varint-framed, zlib-compressed protocol used for FX streaming
//! prices with a server-negotiated data dictionary and monotonic
//! subscription editions.

pub mod codec;
pub mod message;
pub mod provider;
pub mod register;
pub mod zlib;

pub use provider::PixieProvider;
