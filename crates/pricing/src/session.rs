//! [`Session`] — the top-level handle an application creates to gain access
//! to the pricing API.

use std::path::Path;

use bidfx_core::api_info;
use bidfx_core::callbacks::Callbacks;
use bidfx_core::config::{self, AppConfig};
use bidfx_core::error::Result;

use crate::facade::PricingFacade;

/// A client's working session with the pricing API. Currently exposes only
/// pricing, but mirrors the shape of a session that would also expose a
/// trading facade.
pub struct Session {
    pricing: PricingFacade,
}

impl Session {
    pub fn new(config: AppConfig, callbacks: Callbacks) -> Result<Self> {
        Ok(Session { pricing: PricingFacade::new(&config, callbacks)? })
    }

    /// Loads configuration from an INI file and builds a `Session` from it.
    /// Defaults to the conventional `~/.bidfx/api/config.ini` location.
    pub fn create_from_ini_file(config_file: Option<&Path>, callbacks: Callbacks) -> Result<Self> {
        let config = config::load_default_config(config_file)?;
        Session::new(config, callbacks)
    }

    /// The pricing API: subscribe to real-time price streams here.
    pub fn pricing(&self) -> &PricingFacade {
        &self.pricing
    }

    /// The version of this API client.
    pub fn version() -> &'static str {
        api_info::BIDFX_API_INFO.version
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_reports_the_crate_version() {
        assert!(!Session::version().is_empty());
    }

    #[test]
    fn missing_config_file_is_a_config_error() {
        let err =
            Session::create_from_ini_file(Some(Path::new("/nonexistent/config.ini")), Callbacks::new())
                .unwrap_err();
        assert!(matches!(err, bidfx_core::error::BidFxError::Config(_)));
    }
}
