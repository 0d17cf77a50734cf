//! Connection lifecycle for the shared (Puffin) price provider: handshake
//! over plain XML, then a steady state of dictionary-compressed `Update`,
//! `Set`, `Status`, and `Heartbeat` elements, with subscriptions tracked in a
//! mutex-guarded set that survives reconnects.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use base64::Engine;
use rsa::pkcs1::DecodeRsaPublicKey;
use rsa::pkcs8::DecodePublicKey;
use rsa::{Pkcs1v15Encrypt, RsaPublicKey};
use tokio::io::AsyncWriteExt;
use tokio::sync::watch;

use bidfx_core::api_info::BIDFX_API_INFO;
use bidfx_core::callbacks::Callbacks;
use bidfx_core::config::ProviderConfig;
use bidfx_core::connector::{AsyncStream, ServiceConnector};
use bidfx_core::error::{BidFxError, Result};
use bidfx_core::events::{FieldValue, PriceEvent, ProviderEvent, ProviderStatus, SubscriptionEvent, SubscriptionStatus};
use bidfx_core::provider::PriceProvider;
use bidfx_core::subject::Subject;

use crate::element::{Element, ElementParser};
use crate::message::{MessageCompressor, MessageDecompressor};

pub const CURRENT_PROTOCOL_VERSION: u32 = 8;

/// Maps a Puffin `Status` element's integer `Id` to a [`SubscriptionStatus`].
/// Indexed by id; an id at or beyond the end of the table (including a
/// negative one, which callers reject before indexing) maps to `Unavailable`.
const STATUS_ADAPTOR: [SubscriptionStatus; 19] = [
    SubscriptionStatus::Ok,
    SubscriptionStatus::Pending,
    SubscriptionStatus::Timeout,
    SubscriptionStatus::Stale,
    SubscriptionStatus::Closed,
    SubscriptionStatus::Closed,
    SubscriptionStatus::Closed,
    SubscriptionStatus::Closed,
    SubscriptionStatus::Closed,
    SubscriptionStatus::Unavailable,
    SubscriptionStatus::Closed,
    SubscriptionStatus::Unavailable,
    SubscriptionStatus::Prohibited,
    SubscriptionStatus::Stale,
    SubscriptionStatus::Unavailable,
    SubscriptionStatus::Closed,
    SubscriptionStatus::Closed,
    SubscriptionStatus::Rejected,
    SubscriptionStatus::Exhausted,
];

fn puffin_status(status_id: i64) -> SubscriptionStatus {
    if status_id < 0 || status_id as usize >= STATUS_ADAPTOR.len() {
        return SubscriptionStatus::Unavailable;
    }
    STATUS_ADAPTOR[status_id as usize]
}

static INSTANCE_COUNTER: AtomicU64 = AtomicU64::new(0);

/// The set of subjects currently subscribed through one Puffin connection,
/// keyed by their canonical string form so an inbound element's bare
/// `Subject="..."` attribute can be mapped back to the owning [`Subject`].
#[derive(Default)]
struct SubscriptionSet {
    subjects: Mutex<BTreeMap<String, Subject>>,
}

impl SubscriptionSet {
    fn subscribe(&self, subject: Subject) {
        self.subjects.lock().unwrap().insert(subject.to_string(), subject);
    }

    fn unsubscribe(&self, subject: Subject) {
        self.subjects.lock().unwrap().remove(&subject.to_string());
    }

    fn subject_from_string(&self, subject_str: &str) -> Option<Subject> {
        self.subjects.lock().unwrap().get(subject_str).cloned()
    }

    fn active_subjects(&self) -> Vec<Subject> {
        self.subjects.lock().unwrap().values().cloned().collect()
    }
}

pub struct PuffinProvider {
    name: String,
    config: ProviderConfig,
    callbacks: Callbacks,
    subscriptions: Arc<SubscriptionSet>,
    ready: Arc<AtomicBool>,
    running: AtomicBool,
    shutdown_tx: Mutex<Option<watch::Sender<bool>>>,
    task: Mutex<Option<tokio::task::JoinHandle<()>>>,
}

impl PuffinProvider {
    pub fn new(config: ProviderConfig, callbacks: Callbacks) -> Self {
        let instance = INSTANCE_COUNTER.fetch_add(1, Ordering::Relaxed) + 1;
        PuffinProvider {
            name: format!("Puffin-{instance}"),
            config,
            callbacks,
            subscriptions: Arc::new(SubscriptionSet::default()),
            ready: Arc::new(AtomicBool::new(false)),
            running: AtomicBool::new(false),
            shutdown_tx: Mutex::new(None),
            task: Mutex::new(None),
        }
    }

    fn publish_provider_status(&self, status: ProviderStatus, message: impl Into<String>) {
        let event = ProviderEvent::new(self.name.clone(), status, message);
        tracing::info!(provider = %self.name, ?status, "{}", event.message);
        self.callbacks.fire_provider(&event);
    }
}

#[async_trait]
impl PriceProvider for PuffinProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn start(&self) -> Result<()> {
        if self.running.swap(true, Ordering::SeqCst) {
            tracing::warn!(provider = %self.name, "attempt to start an already-running provider ignored");
            return Ok(());
        }
        self.publish_provider_status(ProviderStatus::Down, "starting up");

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        *self.shutdown_tx.lock().unwrap() = Some(shutdown_tx);

        let name = self.name.clone();
        let config = self.config.clone();
        let callbacks = self.callbacks.clone();
        let subscriptions = self.subscriptions.clone();
        let ready = self.ready.clone();

        let handle = tokio::spawn(async move {
            connection_loop(name, config, callbacks, subscriptions, ready, shutdown_rx).await;
        });
        *self.task.lock().unwrap() = Some(handle);
        Ok(())
    }

    async fn stop(&self) -> Result<()> {
        self.running.store(false, Ordering::SeqCst);
        if let Some(tx) = self.shutdown_tx.lock().unwrap().take() {
            let _ = tx.send(true);
        }
        let handle = self.task.lock().unwrap().take();
        if let Some(handle) = handle {
            let _ = handle.await;
        }
        Ok(())
    }

    fn subscribe(&self, subject: Subject) {
        tracing::info!(provider = %self.name, %subject, "subscribe");
        self.subscriptions.subscribe(subject);
    }

    fn unsubscribe(&self, subject: Subject) {
        tracing::info!(provider = %self.name, %subject, "unsubscribe");
        self.subscriptions.unsubscribe(subject);
    }

    fn is_ready(&self) -> bool {
        self.ready.load(Ordering::Relaxed)
    }
}

async fn connection_loop(
    name: String,
    config: ProviderConfig,
    callbacks: Callbacks,
    subscriptions: Arc<SubscriptionSet>,
    ready: Arc<AtomicBool>,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    loop {
        if *shutdown_rx.borrow() {
            return;
        }
        match session_attempt(&name, &config, &callbacks, &subscriptions, &ready, &mut shutdown_rx).await {
            Ok(()) => {}
            Err(e) => {
                tracing::warn!(provider = %name, error = %e, "connection attempt failed");
                callbacks.fire_provider(&ProviderEvent::new(
                    name.clone(),
                    ProviderStatus::Down,
                    format!("connection error due to: {e}"),
                ));
            }
        }
        ready.store(false, Ordering::Relaxed);
        for subject in subscriptions.active_subjects() {
            callbacks.fire_subscription(&SubscriptionEvent::new(
                subject,
                SubscriptionStatus::Stale,
                format!("price provider {name} is down"),
            ));
        }

        tokio::select! {
            _ = tokio::time::sleep(Duration::from_secs(config.reconnect_interval_secs)) => {}
            _ = shutdown_rx.changed() => {
                if *shutdown_rx.borrow() {
                    return;
                }
            }
        }
    }
}

async fn session_attempt(
    name: &str,
    config: &ProviderConfig,
    callbacks: &Callbacks,
    subscriptions: &Arc<SubscriptionSet>,
    ready: &Arc<AtomicBool>,
    shutdown_rx: &mut watch::Receiver<bool>,
) -> Result<()> {
    let connector = ServiceConnector::new(
        config.host.clone(),
        config.port,
        config.username.clone(),
        config.password.clone(),
        BIDFX_API_INFO.guid,
        config.valid_cn.clone(),
        config.valid_root_cert.as_deref(),
    )?;
    let mut stream: Box<dyn AsyncStream> = if config.tunnel {
        connector.tunnel_socket_to_service(&config.service).await?
    } else {
        connector.direct_socket_to_service().await?
    };

    stream.write_all(b"puffin://localhost?encrypt=false\n").await.map_err(BidFxError::from)?;

    let welcome = {
        let mut parser = ElementParser::new(&mut stream);
        parser.parse_element().await?
    };
    tracing::debug!(provider = %name, %welcome, "received welcome message");
    let server_version: u32 = welcome
        .get("Version", "")
        .parse()
        .map_err(|_| BidFxError::pricing("Welcome message carried no numeric Version attribute"))?;
    if server_version != CURRENT_PROTOCOL_VERSION {
        return Err(BidFxError::incompatible_version(format!(
            "a server negotiating Puffin protocol version {server_version} is incompatible with this client on version {CURRENT_PROTOCOL_VERSION}"
        )));
    }
    let heartbeat_interval_secs = welcome
        .get("Interval", "10000")
        .parse::<u64>()
        .map(|millis| millis.max(1000) / 1000)
        .unwrap_or(10);

    let password = match welcome.get_opt("PublicKey") {
        Some(public_key) => encrypt_password(public_key, &config.password)?,
        None => config.password.clone(),
    };
    let login = Element::new("Login")
        .set("Name", config.username.clone())
        .set("Password", password)
        .set("Version", CURRENT_PROTOCOL_VERSION.to_string())
        .set("Description", format!("{} {}", BIDFX_API_INFO.name, BIDFX_API_INFO.version))
        .set("Alias", whoami());
    stream.write_all(login.to_string().as_bytes()).await.map_err(BidFxError::from)?;

    let (grant, _service_description) = {
        let mut parser = ElementParser::new(&mut stream);
        let grant = parser.parse_element().await?;
        let service_description = parser.parse_element().await?;
        (grant, service_description)
    };
    if grant.get("Access", "false") != "true" {
        return Err(BidFxError::pricing(format!(
            "login to {name} rejected due to {}",
            grant.get("Text", "")
        )));
    }
    let service_description = Element::new("ServiceDescription")
        .set("username", config.username.clone())
        .set("alias", whoami())
        .set("server", "false")
        .set("discoverable", "false");
    stream.write_all(service_description.to_string().as_bytes()).await.map_err(BidFxError::from)?;

    let mut compressor = MessageCompressor::new();
    for subject in subscriptions.active_subjects() {
        let element = Element::new("Subscribe").set("Subject", subject.to_string());
        compressor.compress_message(&mut stream, &element).await?;
    }

    ready.store(true, Ordering::Relaxed);
    callbacks.fire_provider(&ProviderEvent::new(name, ProviderStatus::Ready, "connected"));

    read_loop(stream, name, callbacks, subscriptions, heartbeat_interval_secs, compressor, shutdown_rx).await
}

async fn read_loop(
    mut stream: Box<dyn AsyncStream>,
    name: &str,
    callbacks: &Callbacks,
    subscriptions: &Arc<SubscriptionSet>,
    heartbeat_interval_secs: u64,
    mut compressor: MessageCompressor,
    shutdown_rx: &mut watch::Receiver<bool>,
) -> Result<()> {
    let mut decompressor = MessageDecompressor::new();
    let heartbeat_timeout = Duration::from_secs(heartbeat_interval_secs.max(1) * 2);

    loop {
        tokio::select! {
            biased;
            _ = shutdown_rx.changed() => {
                if *shutdown_rx.borrow() {
                    return Ok(());
                }
            }
            message = tokio::time::timeout(heartbeat_timeout, decompressor.decompress_message(&mut stream)) => {
                let element = match message {
                    Ok(result) => result?,
                    Err(_) => return Err(BidFxError::transport("no heartbeat received within the expected interval")),
                };
                handle_message(&element, callbacks, subscriptions);
                if element.tag == "Heartbeat" {
                    let reply = Element::new("Heartbeat");
                    compressor.compress_message(&mut stream, &reply).await?;
                }
            }
        }
    }
}

fn handle_message(message: &Element, callbacks: &Callbacks, subscriptions: &Arc<SubscriptionSet>) {
    match message.tag.as_str() {
        "Update" => handle_price_update(message, callbacks, subscriptions, false),
        "Set" => handle_price_update(message, callbacks, subscriptions, true),
        "Status" => handle_price_status(message, callbacks, subscriptions),
        "Heartbeat" => {}
        other => tracing::debug!(tag = other, "ignoring unrecognized Puffin message"),
    }
}

fn handle_price_update(message: &Element, callbacks: &Callbacks, subscriptions: &Arc<SubscriptionSet>, full: bool) {
    let Some(subject) = subscriptions.subject_from_string(message.get("Subject", "")) else {
        return;
    };
    let fields: BTreeMap<String, FieldValue> =
        message.extract_price().into_iter().map(|(k, v)| (k, FieldValue::String(v))).collect();
    callbacks.fire_price(&PriceEvent::new(subject, fields, full));
}

fn handle_price_status(message: &Element, callbacks: &Callbacks, subscriptions: &Arc<SubscriptionSet>) {
    let Some(subject) = subscriptions.subject_from_string(message.get("Subject", "")) else {
        return;
    };
    let status_id: i64 = message.get("Id", "-1").parse().unwrap_or(-1);
    let status = puffin_status(status_id);
    let explanation = message.get("Text", "").to_string();
    callbacks.fire_subscription(&SubscriptionEvent::new(subject, status, explanation));
}

fn encrypt_password(public_key_base64: &str, password: &str) -> Result<String> {
    let der = base64::engine::general_purpose::STANDARD
        .decode(public_key_base64)
        .map_err(|e| BidFxError::pricing(format!("could not decode Puffin public key: {e}")))?;
    let key = RsaPublicKey::from_pkcs1_der(&der)
        .or_else(|_| RsaPublicKey::from_public_key_der(&der))
        .map_err(|e| BidFxError::pricing(format!("could not parse Puffin public key: {e}")))?;
    let mut rng = rand::thread_rng();
    let encrypted = key
        .encrypt(&mut rng, Pkcs1v15Encrypt, password.as_bytes())
        .map_err(|e| BidFxError::pricing(format!("could not encrypt password for Puffin login: {e}")))?;
    Ok(base64::engine::general_purpose::STANDARD.encode(encrypted))
}

fn whoami() -> String {
    std::env::var("USER").or_else(|_| std::env::var("USERNAME")).unwrap_or_else(|_| "unknown".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_adaptor_matches_the_documented_table() {
        assert_eq!(puffin_status(0), SubscriptionStatus::Ok);
        assert_eq!(puffin_status(3), SubscriptionStatus::Stale);
        assert_eq!(puffin_status(12), SubscriptionStatus::Prohibited);
        assert_eq!(puffin_status(17), SubscriptionStatus::Rejected);
        assert_eq!(puffin_status(18), SubscriptionStatus::Exhausted);
    }

    #[test]
    fn out_of_range_status_id_is_unavailable() {
        assert_eq!(puffin_status(19), SubscriptionStatus::Unavailable);
        assert_eq!(puffin_status(1000), SubscriptionStatus::Unavailable);
        assert_eq!(puffin_status(-1), SubscriptionStatus::Unavailable);
    }
}
