//! [`PricingFacade`] — the top-level entry point for subscribing to
//! real-time prices: it owns one Pixie provider and one Puffin provider and
//! routes each subject to the right one.

use std::sync::Arc;

use async_trait::async_trait;

use bidfx_core::callbacks::Callbacks;
use bidfx_core::config::{AppConfig, ProviderConfig};
use bidfx_core::error::Result;
use bidfx_core::provider::{DisabledProvider, PriceProvider};
use bidfx_core::subject::{self, Subject};
use bidfx_core::subject_builder::SubjectBuilder;
use bidfx_pixie::PixieProvider;
use bidfx_puffin::PuffinProvider;

/// A subject routes to Pixie (exclusive, dealable pricing) only if it names
/// a user and is an FX subject; everything else is shared (indicative)
/// pricing and routes to Puffin.
fn is_exclusive_subject(subject: &Subject) -> bool {
    subject.contains(subject::USER) && subject.get(subject::ASSET_CLASS, "") == "Fx"
}

/// Owns both price providers and the subject builder handed to callers, and
/// implements [`PriceProvider`] itself so the two underlying protocols are
/// indistinguishable to a consumer of the facade.
pub struct PricingFacade {
    callbacks: Callbacks,
    subject_builder: Arc<SubjectBuilder>,
    pixie: Arc<dyn PriceProvider>,
    puffin: Arc<dyn PriceProvider>,
}

impl PricingFacade {
    /// Builds the facade around an already-configured set of callbacks.
    /// Callbacks are wired into each provider at construction time, so
    /// register every handler you need before calling this rather than
    /// after.
    pub fn new(config: &AppConfig, callbacks: Callbacks) -> Result<Self> {
        let subject_builder = Arc::new(SubjectBuilder::new(
            config.exclusive_pricing.username.clone(),
            config.exclusive_pricing.default_account.clone(),
        )?);
        let pixie = create_provider(&config.exclusive_pricing, callbacks.clone(), "Pixie");
        let puffin = create_provider(&config.shared_pricing, callbacks.clone(), "Puffin");
        Ok(PricingFacade { callbacks, subject_builder, pixie, puffin })
    }

    /// A handle to the subject builder, seeded with the exclusive-pricing
    /// username and default account.
    pub fn build(&self) -> &SubjectBuilder {
        &self.subject_builder
    }

    /// The set of callbacks this facade was built with.
    pub fn callbacks(&self) -> &Callbacks {
        &self.callbacks
    }
}

fn create_provider(config: &ProviderConfig, callbacks: Callbacks, protocol: &str) -> Arc<dyn PriceProvider> {
    if config.disable {
        tracing::info!(protocol, "provider has been disabled by config");
        return Arc::new(DisabledProvider::new(protocol));
    }
    match protocol {
        "Pixie" => Arc::new(PixieProvider::new(config.clone(), callbacks)),
        "Puffin" => Arc::new(PuffinProvider::new(config.clone(), callbacks)),
        other => unreachable!("unsupported pricing protocol: {other}"),
    }
}

#[async_trait]
impl PriceProvider for PricingFacade {
    fn name(&self) -> &str {
        "Pricing"
    }

    async fn start(&self) -> Result<()> {
        self.pixie.start().await?;
        self.puffin.start().await?;
        Ok(())
    }

    async fn stop(&self) -> Result<()> {
        self.pixie.stop().await?;
        self.puffin.stop().await?;
        Ok(())
    }

    fn subscribe(&self, subject: Subject) {
        if is_exclusive_subject(&subject) {
            self.pixie.subscribe(subject.clone());
        } else {
            self.puffin.subscribe(subject.clone());
        }
        tracing::debug!(%subject, "successfully subscribed");
    }

    fn unsubscribe(&self, subject: Subject) {
        if is_exclusive_subject(&subject) {
            self.pixie.unsubscribe(subject.clone());
        } else {
            self.puffin.unsubscribe(subject.clone());
        }
        tracing::info!(%subject, "unsubscribed");
    }

    fn is_ready(&self) -> bool {
        self.pixie.is_ready() && self.puffin.is_ready()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn map(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    #[test]
    fn exclusive_subjects_need_both_a_user_and_fx_asset_class() {
        let exclusive = Subject::from_key_value_map(&map(&[("AssetClass", "Fx"), ("User", "alice")]));
        assert!(is_exclusive_subject(&exclusive));

        let no_user = Subject::from_key_value_map(&map(&[("AssetClass", "Fx")]));
        assert!(!is_exclusive_subject(&no_user));

        let not_fx = Subject::from_key_value_map(&map(&[("AssetClass", "Future"), ("User", "alice")]));
        assert!(!is_exclusive_subject(&not_fx));
    }
}
