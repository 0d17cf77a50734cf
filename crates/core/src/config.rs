//! Configuration loading for the BidFX pricing client.
//!
//! Settings are read from a single INI file with two recognized sections,
//! `Exclusive Pricing` (Pixie) and `Shared Pricing` (Puffin). Every other
//! section in the file is ignored, so a single config file can be shared with
//! the (out-of-scope) trading façade without upsetting this loader.
//!
//! # Example
//!
//! ```ini
//! [Exclusive Pricing]
//! host = pricing.ams1.bidfx.biz
//! username = my_user
//! password = my_pass
//! default_account = DEMOACCT
//!
//! [Shared Pricing]
//! host = pricing.ams1.bidfx.biz
//! username = my_user
//! password = my_pass
//! ```

use std::path::Path;

use ini::Ini;

use crate::error::{BidFxError, Result};

/// Settings for one price provider (Pixie or Puffin), parsed from one INI
/// section.
#[derive(Debug, Clone)]
pub struct ProviderConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    pub valid_cn: Option<String>,
    pub valid_root_cert: Option<String>,
    pub service: String,
    pub heartbeat_interval_secs: u64,
    pub reconnect_interval_secs: u64,
    pub min_interval_ms: u64,
    pub tunnel: bool,
    pub product_serial: String,
    pub default_account: Option<String>,
    pub disable: bool,
}

impl ProviderConfig {
    fn from_section(section: &ini::Properties, default_service: &str) -> Result<Self> {
        let get = |key: &str| section.get(key).map(str::to_string);
        let host =
            get("host").ok_or_else(|| BidFxError::config("missing required key 'host'"))?;
        let username = get("username")
            .ok_or_else(|| BidFxError::config("missing required key 'username'"))?;
        let password = get("password")
            .ok_or_else(|| BidFxError::config("missing required key 'password'"))?;

        Ok(ProviderConfig {
            host: host.clone(),
            port: parse_or(section, "port", 443)?,
            username,
            password,
            valid_cn: get("valid_cn").or(Some(host)),
            valid_root_cert: get("valid_root_cert"),
            service: get("service").unwrap_or_else(|| default_service.to_string()),
            heartbeat_interval_secs: parse_or(section, "heartbeat_interval", 10)?,
            reconnect_interval_secs: parse_or(section, "reconnect_interval", 10)?,
            min_interval_ms: parse_or(section, "min_interval", 100)?,
            tunnel: parse_or(section, "tunnel", true)?,
            product_serial: get("product_serial").unwrap_or_default(),
            default_account: get("default_account"),
            disable: parse_or(section, "disable", false)?,
        })
    }
}

fn parse_or<T>(section: &ini::Properties, key: &str, default: T) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match section.get(key) {
        None => Ok(default),
        Some(v) => v
            .parse()
            .map_err(|e| BidFxError::config(format!("invalid value for '{key}': {e}"))),
    }
}

/// Top-level API configuration: one [`ProviderConfig`] per protocol.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub exclusive_pricing: ProviderConfig,
    pub shared_pricing: ProviderConfig,
}

impl AppConfig {
    /// Parse an already-loaded `Ini` document.
    pub fn from_ini(ini: &Ini) -> Result<Self> {
        let exclusive = ini
            .section(Some("Exclusive Pricing"))
            .ok_or_else(|| BidFxError::config("missing [Exclusive Pricing] section"))?;
        let shared = ini
            .section(Some("Shared Pricing"))
            .ok_or_else(|| BidFxError::config("missing [Shared Pricing] section"))?;

        Ok(AppConfig {
            exclusive_pricing: ProviderConfig::from_section(exclusive, "highway")?,
            shared_pricing: ProviderConfig::from_section(shared, "puffin")?,
        })
    }
}

/// Load and parse an INI config file.
pub fn load_config(path: &Path) -> Result<AppConfig> {
    let ini = Ini::load_from_file(path)
        .map_err(|e| BidFxError::config(format!("could not read {}: {e}", path.display())))?;
    AppConfig::from_ini(&ini)
}

/// Load the config from the conventional `~/.bidfx/api/config.ini` location,
/// or from an explicit override path.
pub fn load_default_config(override_path: Option<&Path>) -> Result<AppConfig> {
    let path = match override_path {
        Some(p) => p.to_path_buf(),
        None => {
            let home = std::env::var_os("HOME")
                .map(std::path::PathBuf::from)
                .ok_or_else(|| {
                    BidFxError::config(
                        "could not determine home directory for default config path",
                    )
                })?;
            home.join(".bidfx/api/config.ini")
        }
    };
    load_config(&path)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_ini() -> Ini {
        let text = "\
[Exclusive Pricing]
host = pricing.example.com
username = alice
password = secret
default_account = DEMO

[Shared Pricing]
host = pricing.example.com
username = alice
password = secret
disable = true
";
        Ini::load_from_str(text).unwrap()
    }

    #[test]
    fn parses_required_and_default_fields() {
        let cfg = AppConfig::from_ini(&sample_ini()).unwrap();
        assert_eq!(cfg.exclusive_pricing.host, "pricing.example.com");
        assert_eq!(cfg.exclusive_pricing.port, 443);
        assert_eq!(cfg.exclusive_pricing.service, "highway");
        assert_eq!(cfg.exclusive_pricing.heartbeat_interval_secs, 10);
        assert!(cfg.exclusive_pricing.tunnel);
        assert_eq!(cfg.exclusive_pricing.default_account.as_deref(), Some("DEMO"));
        assert_eq!(cfg.shared_pricing.service, "puffin");
        assert!(cfg.shared_pricing.disable);
    }

    #[test]
    fn missing_required_key_is_config_error() {
        let text =
            "[Exclusive Pricing]\nhost = h\n\n[Shared Pricing]\nhost = h\nusername = u\npassword = p\n";
        let ini = Ini::load_from_str(text).unwrap();
        let err = AppConfig::from_ini(&ini).unwrap_err();
        assert!(matches!(err, BidFxError::Config(_)));
    }
}
