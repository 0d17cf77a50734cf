//! The common async interface implemented by the Pixie and Puffin price
//! providers, and a no-op stand-in for a disabled provider.

use async_trait::async_trait;

use crate::error::Result;
use crate::subject::Subject;

/// A live or not-yet-connected price provider.
///
/// `start` spawns whatever background connection/reconnect task the
/// provider needs and returns once the task has been spawned — it does not
/// block until the first connection succeeds. `stop` asks that task to wind
/// down and waits for it to finish.
#[async_trait]
pub trait PriceProvider: Send + Sync {
    /// Human-readable provider name, used in logs and [`ProviderEvent`]s.
    fn name(&self) -> &str;

    /// Begin connecting and processing subscriptions in the background.
    async fn start(&self) -> Result<()>;

    /// Disconnect and stop the background task.
    async fn stop(&self) -> Result<()>;

    /// Register interest in a subject. Idempotent: subscribing twice to the
    /// same subject is a no-op.
    fn subscribe(&self, subject: Subject);

    /// Withdraw interest in a subject.
    fn unsubscribe(&self, subject: Subject);

    /// Whether the provider currently believes it is connected and logged in.
    fn is_ready(&self) -> bool;
}

/// A provider stand-in used when a protocol is disabled in configuration
/// (`disable = true`). Subscriptions are silently accepted and never
/// produce a price.
pub struct DisabledProvider {
    name: String,
}

impl DisabledProvider {
    pub fn new(name: impl Into<String>) -> Self {
        DisabledProvider { name: name.into() }
    }
}

#[async_trait]
impl PriceProvider for DisabledProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn start(&self) -> Result<()> {
        Ok(())
    }

    async fn stop(&self) -> Result<()> {
        Ok(())
    }

    fn subscribe(&self, _subject: Subject) {}

    fn unsubscribe(&self, _subject: Subject) {}

    fn is_ready(&self) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn disabled_provider_is_never_ready() {
        let provider = DisabledProvider::new("highway");
        provider.start().await.unwrap();
        assert!(!provider.is_ready());
        provider.subscribe(Subject::from_pairs(vec![]));
        provider.stop().await.unwrap();
    }
}
