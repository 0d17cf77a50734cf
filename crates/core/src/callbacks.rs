//! Subscriber callback registration.
//!
//! Consumers hand a [`Callbacks`] to a session or a provider; any field left
//! unset defaults to a no-op so callers only need to implement the events
//! they care about.

use std::sync::Arc;

use crate::events::{PriceEvent, ProviderEvent, SubscriptionEvent};

pub type PriceFn = dyn Fn(&PriceEvent) + Send + Sync;
pub type SubscriptionFn = dyn Fn(&SubscriptionEvent) + Send + Sync;
pub type ProviderFn = dyn Fn(&ProviderEvent) + Send + Sync;

/// The set of callbacks invoked as provider and subscription state changes
/// and as prices arrive. Cloning is cheap — each field is an `Arc`.
#[derive(Clone)]
pub struct Callbacks {
    on_price: Arc<PriceFn>,
    on_subscription: Arc<SubscriptionFn>,
    on_provider: Arc<ProviderFn>,
}

impl Default for Callbacks {
    fn default() -> Self {
        Callbacks {
            on_price: Arc::new(|_| {}),
            on_subscription: Arc::new(|_| {}),
            on_provider: Arc::new(|_| {}),
        }
    }
}

impl Callbacks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_on_price(mut self, f: impl Fn(&PriceEvent) + Send + Sync + 'static) -> Self {
        self.on_price = Arc::new(f);
        self
    }

    pub fn with_on_subscription(
        mut self,
        f: impl Fn(&SubscriptionEvent) + Send + Sync + 'static,
    ) -> Self {
        self.on_subscription = Arc::new(f);
        self
    }

    pub fn with_on_provider(mut self, f: impl Fn(&ProviderEvent) + Send + Sync + 'static) -> Self {
        self.on_provider = Arc::new(f);
        self
    }

    pub fn fire_price(&self, event: &PriceEvent) {
        (self.on_price)(event);
    }

    pub fn fire_subscription(&self, event: &SubscriptionEvent) {
        (self.on_subscription)(event);
    }

    pub fn fire_provider(&self, event: &ProviderEvent) {
        (self.on_provider)(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::{ProviderStatus, SubscriptionStatus};
    use crate::subject::Subject;
    use std::collections::BTreeMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn default_callbacks_are_inert() {
        let callbacks = Callbacks::new();
        callbacks.fire_price(&PriceEvent::new(Subject::from_pairs(vec![]), BTreeMap::new(), true));
        callbacks.fire_subscription(&SubscriptionEvent::new(
            Subject::from_pairs(vec![]),
            SubscriptionStatus::Ok,
            "ok",
        ));
        callbacks.fire_provider(&ProviderEvent::new("pixie", ProviderStatus::Ready, "ok"));
    }

    #[test]
    fn registered_callback_is_invoked() {
        let count = Arc::new(AtomicUsize::new(0));
        let counted = count.clone();
        let callbacks = Callbacks::new().with_on_provider(move |_| {
            counted.fetch_add(1, Ordering::SeqCst);
        });
        callbacks.fire_provider(&ProviderEvent::new("puffin", ProviderStatus::Down, "connecting"));
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }
}
