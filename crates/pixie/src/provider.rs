//! Connection lifecycle for the exclusive (Pixie) price provider: one
//! background task per provider instance that connects, logs in, then loops
//! reading price syncs and sending acks/heartbeats/subscription syncs until
//! told to stop, reconnecting with a fixed interval on any failure.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::sync::watch;
use tokio::time::interval;

use bidfx_core::api_info::BIDFX_API_INFO;
use bidfx_core::callbacks::Callbacks;
use bidfx_core::config::ProviderConfig;
use bidfx_core::connector::{AsyncStream, ServiceConnector};
use bidfx_core::error::{BidFxError, Result};
use bidfx_core::events::{ProviderEvent, ProviderStatus};
use bidfx_core::provider::PriceProvider;
use bidfx_core::subject::{self, Subject};
use bidfx_core::time_util;

use crate::message::{
    AckMessage, DataDictionary, DataDictionaryMessage, GrantMessage, HeartbeatMessage,
    LoginMessage, MessageType, PriceSyncMessage, WelcomeMessage, CURRENT_PROTOCOL_VERSION,
};
use crate::register::SubscriptionRegister;
use crate::zlib::Decompressor;

static INSTANCE_COUNTER: AtomicU64 = AtomicU64::new(0);

pub struct PixieProvider {
    name: String,
    config: ProviderConfig,
    callbacks: Callbacks,
    register: Arc<SubscriptionRegister>,
    ready: Arc<AtomicBool>,
    running: AtomicBool,
    shutdown_tx: Mutex<Option<watch::Sender<bool>>>,
    task: Mutex<Option<tokio::task::JoinHandle<()>>>,
}

impl PixieProvider {
    pub fn new(config: ProviderConfig, callbacks: Callbacks) -> Self {
        let instance = INSTANCE_COUNTER.fetch_add(1, Ordering::Relaxed) + 1;
        PixieProvider {
            name: format!("Pixie-{instance}"),
            config,
            callbacks,
            register: Arc::new(SubscriptionRegister::new()),
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
impl PriceProvider for PixieProvider {
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
        let register = self.register.clone();
        let ready = self.ready.clone();

        let handle = tokio::spawn(async move {
            connection_loop(name, config, callbacks, register, ready, shutdown_rx).await;
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
        let level = subject.get(subject::LEVEL, "1");
        if level == "1" {
            self.register.subscribe(subject);
        } else {
            tracing::warn!(
                provider = %self.name,
                %level,
                "the Pixie protocol does not yet support this subscription level"
            );
            let message = format!("the Pixie protocol does not yet support level={level} subscriptions");
            self.callbacks.fire_subscription(&bidfx_core::events::SubscriptionEvent::new(
                subject,
                bidfx_core::events::SubscriptionStatus::Rejected,
                message,
            ));
        }
    }

    fn unsubscribe(&self, subject: Subject) {
        self.register.unsubscribe(subject);
    }

    fn is_ready(&self) -> bool {
        self.ready.load(Ordering::Relaxed)
    }
}

async fn connection_loop(
    name: String,
    config: ProviderConfig,
    callbacks: Callbacks,
    register: Arc<SubscriptionRegister>,
    ready: Arc<AtomicBool>,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    loop {
        if *shutdown_rx.borrow() {
            return;
        }
        match session_attempt(&name, &config, &callbacks, &register, &ready, &mut shutdown_rx).await {
            Ok(()) => {}
            Err(e) => {
                tracing::warn!(provider = %name, error = %e, "connection attempt failed");
            }
        }
        ready.store(false, Ordering::Relaxed);
        let subjects = register.reset_and_get_subjects();
        for subject in subjects {
            callbacks.fire_subscription(&bidfx_core::events::SubscriptionEvent::new(
                subject,
                bidfx_core::events::SubscriptionStatus::Stale,
                format!("price provider {name} is down"),
            ));
        }
        callbacks.fire_provider(&ProviderEvent::new(
            name.clone(),
            ProviderStatus::Down,
            "connection lost, will retry",
        ));

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
    register: &Arc<SubscriptionRegister>,
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

    send_protocol_signature(&mut stream, config).await?;

    let welcome = read_typed_message(&mut stream, MessageType::Welcome).await?;
    let welcome = WelcomeMessage::decode(&welcome)?;
    if welcome.version != CURRENT_PROTOCOL_VERSION {
        return Err(BidFxError::incompatible_version(format!(
            "a server negotiating Pixie protocol version {} is incompatible with this client on version {CURRENT_PROTOCOL_VERSION}",
            welcome.version
        )));
    }

    let login = LoginMessage {
        username: config.username.clone(),
        password: config.password.clone(),
        alias: whoami(),
        api: BIDFX_API_INFO.name.to_string(),
        api_version: BIDFX_API_INFO.version.to_string(),
        product_serial: config.product_serial.clone(),
    };
    stream.write_all(&login.to_bytes()).await.map_err(BidFxError::from)?;

    let grant = read_typed_message(&mut stream, MessageType::Grant).await?;
    let grant = GrantMessage::decode(&grant)?;
    if !grant.granted {
        return Err(BidFxError::pricing(format!(
            "login to {name} rejected due to {}",
            grant.reason.unwrap_or_default()
        )));
    }

    let mut decompressor = Decompressor::new();
    let dict_body = read_typed_message(&mut stream, MessageType::DataDictionary).await?;
    let dict_msg = DataDictionaryMessage::decode(&dict_body, &mut decompressor)?;
    let mut dictionary = DataDictionary::default();
    dictionary.replace(dict_msg.definitions);

    let mut compressor = crate::zlib::Compressor::new();
    let initial_sync = crate::message::SubscriptionSyncMessage::new(1, Vec::new(), true);
    stream
        .write_all(&initial_sync.to_bytes(&mut compressor)?)
        .await
        .map_err(BidFxError::from)?;

    ready.store(true, Ordering::Relaxed);
    callbacks.fire_provider(&ProviderEvent::new(name, ProviderStatus::Ready, "connected"));

    read_loop(
        stream,
        name,
        config,
        callbacks,
        register,
        &mut dictionary,
        &mut decompressor,
        &mut compressor,
        shutdown_rx,
    )
    .await
}

#[allow(clippy::too_many_arguments)]
async fn read_loop(
    mut stream: Box<dyn AsyncStream>,
    name: &str,
    config: &ProviderConfig,
    callbacks: &Callbacks,
    register: &Arc<SubscriptionRegister>,
    dictionary: &mut DataDictionary,
    decompressor: &mut Decompressor,
    compressor: &mut crate::zlib::Compressor,
    shutdown_rx: &mut watch::Receiver<bool>,
) -> Result<()> {
    let mut last_write = time_util::now_ms();
    let mut heartbeat_tick = interval(Duration::from_secs(config.heartbeat_interval_secs));

    loop {
        tokio::select! {
            biased;
            _ = shutdown_rx.changed() => {
                if *shutdown_rx.borrow() {
                    return Ok(());
                }
            }
            message = read_one_message(&mut stream) => {
                let (msg_type, body) = message?;
                match msg_type {
                    MessageType::PriceSync => {
                        let price_received_time = time_util::now_ms();
                        let price_sync = PriceSyncMessage::decode(&body, decompressor)?;
                        let subjects = register.subjects_for_edition(price_sync.edition)?;
                        let cb = callbacks.clone();
                        price_sync.visit_updates(
                            &subjects,
                            dictionary,
                            |event| cb.fire_price(&event),
                            |event| cb.fire_subscription(&event),
                        )?;
                        let ack = AckMessage::new(
                            price_sync.revision,
                            price_sync.revision_time,
                            price_received_time,
                            time_util::now_ms(),
                        );
                        stream.write_all(&ack.to_bytes()).await.map_err(BidFxError::from)?;
                        last_write = time_util::now_ms();

                        register.purge_editions_before(price_sync.edition);
                        if let Some(sync) = register.subscription_sync() {
                            stream.write_all(&sync.to_bytes(compressor)?).await.map_err(BidFxError::from)?;
                            last_write = time_util::now_ms();
                        }
                    }
                    MessageType::DataDictionary => {
                        let dict_msg = DataDictionaryMessage::decode(&body, decompressor)?;
                        if dict_msg.is_updated {
                            dictionary.update(dict_msg.definitions);
                        } else {
                            dictionary.replace(dict_msg.definitions);
                        }
                    }
                    MessageType::Heartbeat => {
                        tracing::debug!(provider = %name, "received heartbeat");
                    }
                    other => {
                        tracing::debug!(provider = %name, ?other, "ignoring unexpected message type");
                    }
                }
            }
            _ = heartbeat_tick.tick() => {
                if time_util::now_ms().saturating_sub(last_write) > config.heartbeat_interval_secs * 1000 {
                    stream.write_all(&HeartbeatMessage.to_bytes()).await.map_err(BidFxError::from)?;
                    last_write = time_util::now_ms();
                }
            }
        }
    }
}

async fn send_protocol_signature(stream: &mut Box<dyn AsyncStream>, config: &ProviderConfig) -> Result<()> {
    let signature = format!(
        "pixie://localhost?version={CURRENT_PROTOCOL_VERSION}&heartbeat={}&idle=120&minti={}\n",
        config.heartbeat_interval_secs, config.min_interval_ms
    );
    stream.write_all(signature.as_bytes()).await.map_err(BidFxError::from)
}

async fn read_one_message(stream: &mut Box<dyn AsyncStream>) -> Result<(MessageType, Vec<u8>)> {
    let length = read_varint_async(stream).await?;
    let mut type_byte = [0u8; 1];
    stream.read_exact(&mut type_byte).await.map_err(BidFxError::from)?;
    let msg_type = MessageType::from_tag(type_byte[0])?;
    let mut body = vec![0u8; (length as usize).saturating_sub(1)];
    stream.read_exact(&mut body).await.map_err(BidFxError::from)?;
    Ok((msg_type, body))
}

async fn read_typed_message(stream: &mut Box<dyn AsyncStream>, expected: MessageType) -> Result<Vec<u8>> {
    let (msg_type, body) = read_one_message(stream).await?;
    if msg_type != expected {
        return Err(BidFxError::pricing(format!("expected a {expected:?} message but got {msg_type:?}")));
    }
    Ok(body)
}

async fn read_varint_async(stream: &mut Box<dyn AsyncStream>) -> Result<u64> {
    let mut result: u64 = 0;
    for offset in (0..64).step_by(7) {
        let mut byte = [0u8; 1];
        stream.read_exact(&mut byte).await.map_err(BidFxError::from)?;
        result |= ((byte[0] & 0x7f) as u64) << offset;
        if byte[0] < 0x80 {
            break;
        }
    }
    Ok(result)
}

fn whoami() -> String {
    std::env::var("USER")
        .or_else(|_| std::env::var("USERNAME"))
        .unwrap_or_else(|_| "unknown".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    use bidfx_core::events::SubscriptionStatus;

    fn test_config() -> ProviderConfig {
        ProviderConfig {
            host: "localhost".to_string(),
            port: 443,
            username: "user".to_string(),
            password: "pass".to_string(),
            valid_cn: None,
            valid_root_cert: None,
            service: "highway".to_string(),
            heartbeat_interval_secs: 10,
            reconnect_interval_secs: 10,
            min_interval_ms: 100,
            tunnel: true,
            product_serial: String::new(),
            default_account: None,
            disable: false,
        }
    }

    #[test]
    fn level_1_subscription_is_queued_not_rejected() {
        let rejections: Arc<Mutex<Vec<SubscriptionStatus>>> = Arc::new(Mutex::new(Vec::new()));
        let seen = rejections.clone();
        let callbacks = Callbacks::new().with_on_subscription(move |event| {
            seen.lock().unwrap().push(event.status);
        });
        let provider = PixieProvider::new(test_config(), callbacks);
        provider.subscribe(Subject::from_pairs(vec![
            ("AssetClass".to_string(), "Fx".to_string()),
            ("Symbol".to_string(), "EURUSD".to_string()),
        ]));
        assert!(rejections.lock().unwrap().is_empty());
    }

    #[test]
    fn level_2_subscription_is_rejected_with_a_subscription_event() {
        let count = Arc::new(AtomicUsize::new(0));
        let statuses: Arc<Mutex<Vec<SubscriptionStatus>>> = Arc::new(Mutex::new(Vec::new()));
        let counted = count.clone();
        let seen = statuses.clone();
        let callbacks = Callbacks::new().with_on_subscription(move |event| {
            counted.fetch_add(1, Ordering::SeqCst);
            seen.lock().unwrap().push(event.status);
        });
        let provider = PixieProvider::new(test_config(), callbacks);
        provider.subscribe(Subject::from_pairs(vec![
            ("AssetClass".to_string(), "Fx".to_string()),
            ("Level".to_string(), "2".to_string()),
            ("Symbol".to_string(), "EURUSD".to_string()),
        ]));
        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert_eq!(statuses.lock().unwrap()[0], SubscriptionStatus::Rejected);
    }
}
