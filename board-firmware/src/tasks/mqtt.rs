// MQTT-Session-Task und Channel-Transport für das Board
//
// Der rust-mqtt Client lebt mit seinem TCP-Socket im Session-Task. Das Board
// spricht ihn über [`ChannelMqttTransport`] an: Kommandos und Antworten laufen
// über Channels, empfangene Nachrichten landen in einer Inbox, die
// `Board::loop_once` leert.
use core::sync::atomic::{AtomicBool, Ordering};

use board_core::types::{Payload, Topic};
use board_core::{ConnectOptions, InboundMessage, MqttError, MqttTransport};
use defmt::{Debug2Format, debug, info, warn};
use embassy_futures::select::{Either3, select3};
use embassy_net::{Stack, tcp::TcpSocket};
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::Channel;
use embassy_time::{Duration, Ticker, with_timeout};

use rust_mqtt::client::client::MqttClient;
use rust_mqtt::client::client_config::{ClientConfig, MqttVersion};
use rust_mqtt::packet::v5::publish_packet::QualityOfService;
use rust_mqtt::packet::v5::reason_codes::ReasonCode;
use rust_mqtt::utils::rng_generator::CountingRng;
use rust_mqtt::utils::types::EncodedString;

use crate::config::*;
use crate::tasks::dns::resolve_host;

/// Wartezeit auf den Verbindungsaufbau (DNS + TCP + CONNACK)
const CONNECT_TIMEOUT_SECS: u64 = 25;

/// Kommandos vom Board an den Session-Task
pub enum MqttCommand {
    Connect(ConnectOptions),
    Subscribe(Topic),
    Unsubscribe(Topic),
    Publish(Topic, Payload),
    Disconnect,
}

/// Verbindung zwischen Board (Foreground) und Session-Task
pub struct MqttLink {
    commands: Channel<CriticalSectionRawMutex, MqttCommand, 1>,
    replies: Channel<CriticalSectionRawMutex, Result<(), MqttError>, 1>,
    inbox: Channel<CriticalSectionRawMutex, InboundMessage, MQTT_INBOX_DEPTH>,
    connected: AtomicBool,
}

impl MqttLink {
    pub const fn new() -> Self {
        Self {
            commands: Channel::new(),
            replies: Channel::new(),
            inbox: Channel::new(),
            connected: AtomicBool::new(false),
        }
    }

    fn set_connected(&self, connected: bool) {
        self.connected.store(connected, Ordering::Release);
    }
}

impl Default for MqttLink {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Board-Seite
// ============================================================================

/// [`MqttTransport`] des Boards
pub struct ChannelMqttTransport {
    link: &'static MqttLink,
}

impl ChannelMqttTransport {
    pub fn new(link: &'static MqttLink) -> Self {
        Self { link }
    }

    async fn request(&mut self, command: MqttCommand, timeout_secs: u64) -> Result<(), MqttError> {
        // Verspätete Antworten eines abgelaufenen Kommandos verwerfen
        while self.link.replies.try_receive().is_ok() {}

        self.link.commands.send(command).await;
        match with_timeout(Duration::from_secs(timeout_secs), self.link.replies.receive()).await {
            Ok(result) => result,
            Err(_) => {
                warn!("MQTT: Session task did not answer");
                Err(MqttError::Transport)
            }
        }
    }

    fn require_connection(&self) -> Result<(), MqttError> {
        if self.is_connected() { Ok(()) } else { Err(MqttError::NotConnected) }
    }
}

impl MqttTransport for ChannelMqttTransport {
    async fn connect(&mut self, options: &ConnectOptions) -> Result<(), MqttError> {
        self.request(MqttCommand::Connect(options.clone()), CONNECT_TIMEOUT_SECS)
            .await
    }

    fn is_connected(&self) -> bool {
        self.link.connected.load(Ordering::Acquire)
    }

    async fn subscribe(&mut self, topic: &str) -> Result<(), MqttError> {
        self.require_connection()?;
        let topic = Topic::try_from(topic).map_err(|_| MqttError::TopicTooLong)?;
        self.request(MqttCommand::Subscribe(topic), MQTT_COMMAND_TIMEOUT_SECS)
            .await
    }

    async fn unsubscribe(&mut self, topic: &str) -> Result<(), MqttError> {
        self.require_connection()?;
        let topic = Topic::try_from(topic).map_err(|_| MqttError::TopicTooLong)?;
        self.request(MqttCommand::Unsubscribe(topic), MQTT_COMMAND_TIMEOUT_SECS)
            .await
    }

    async fn publish(&mut self, topic: &str, payload: &str) -> Result<(), MqttError> {
        self.require_connection()?;
        let topic = Topic::try_from(topic).map_err(|_| MqttError::TopicTooLong)?;
        let payload = Payload::try_from(payload).map_err(|_| MqttError::Rejected)?;
        self.request(MqttCommand::Publish(topic, payload), MQTT_COMMAND_TIMEOUT_SECS)
            .await
    }

    async fn poll(&mut self) -> Option<InboundMessage> {
        self.link.inbox.try_receive().ok()
    }

    async fn disconnect(&mut self) {
        if self.is_connected() {
            let _ = self.request(MqttCommand::Disconnect, MQTT_COMMAND_TIMEOUT_SECS).await;
        }
    }
}

// ============================================================================
// Session-Task
// ============================================================================

enum SessionEvent {
    Command(MqttCommand),
    Message(Option<InboundMessage>),
    Failed(ReasonCode),
    Ping,
}

/// MQTT Session Task
///
/// Wartet auf ein `Connect`-Kommando, baut die Verbindung auf und bedient
/// danach Kommandos, eingehende Nachrichten und den Keep-Alive, bis die
/// Verbindung abreißt oder das Board trennt.
#[embassy_executor::task]
pub async fn mqtt_session_task(stack: Stack<'static>, link: &'static MqttLink) {
    info!("MQTT: Session task started");

    loop {
        let options = match link.commands.receive().await {
            MqttCommand::Connect(options) => options,
            MqttCommand::Disconnect => {
                link.replies.send(Ok(())).await;
                continue;
            }
            _ => {
                link.replies.send(Err(MqttError::NotConnected)).await;
                continue;
            }
        };

        match run_session(stack, link, &options).await {
            Ok(()) => info!("MQTT: Session closed"),
            Err(e) => warn!("MQTT: Session ended: {}", e),
        }
        link.set_connected(false);
    }
}

/// Beantwortet das laufende Connect-Kommando mit `error`
async fn reject(link: &MqttLink, error: MqttError) -> Result<(), MqttError> {
    link.replies.send(Err(error)).await;
    Err(error)
}

async fn run_session(stack: Stack<'static>, link: &MqttLink, options: &ConnectOptions) -> Result<(), MqttError> {
    info!("MQTT: Resolving '{}'...", options.host.as_str());
    let broker_ip = match resolve_host(stack, &options.host).await {
        Ok(ip) => ip,
        Err(e) => {
            warn!("MQTT: Resolving broker failed: {}", e);
            return reject(link, MqttError::ConnectFailed).await;
        }
    };

    let mut rx_buffer = [0u8; TCP_RX_BUFFER_SIZE];
    let mut tx_buffer = [0u8; TCP_TX_BUFFER_SIZE];
    let mut socket = TcpSocket::new(stack, &mut rx_buffer, &mut tx_buffer);
    socket.set_timeout(Some(Duration::from_secs(u64::from(MQTT_KEEP_ALIVE_SECS) * 2)));

    if let Err(e) = socket.connect((broker_ip, options.port)).await {
        warn!("MQTT: TCP connect failed: {}", Debug2Format(&e));
        return reject(link, MqttError::ConnectFailed).await;
    }
    info!("MQTT: TCP connected");

    let mut config = ClientConfig::<5, _>::new(MqttVersion::MQTTv5, CountingRng(20000));
    config.client_id = EncodedString {
        string: options.client_id.as_str(),
        len: options.client_id.len() as u16,
    };
    if !options.user.is_empty() {
        config.add_username(options.user.as_str());
    }
    if !options.password.is_empty() {
        config.add_password(options.password.as_str());
    }
    config.keep_alive = MQTT_KEEP_ALIVE_SECS;
    config.max_packet_size = MQTT_BUFFER_SIZE as u32;

    let mut send_buffer = [0u8; MQTT_BUFFER_SIZE];
    let mut recv_buffer = [0u8; MQTT_BUFFER_SIZE];
    let mut client = MqttClient::<_, 5, _>::new(
        socket,
        &mut send_buffer,
        MQTT_BUFFER_SIZE,
        &mut recv_buffer,
        MQTT_BUFFER_SIZE,
        config,
    );

    if let Err(code) = client.connect_to_broker().await {
        warn!("MQTT: Broker refused connection: {}", Debug2Format(&code));
        return reject(link, MqttError::Rejected).await;
    }

    link.set_connected(true);
    link.replies.send(Ok(())).await;

    let mut ping = Ticker::every(Duration::from_secs(u64::from(MQTT_KEEP_ALIVE_SECS / 2)));
    loop {
        let event = match select3(link.commands.receive(), client.receive_message(), ping.next()).await {
            Either3::First(command) => SessionEvent::Command(command),
            Either3::Second(Ok((topic, payload))) => SessionEvent::Message(InboundMessage::new(
                topic,
                core::str::from_utf8(payload).unwrap_or(""),
            )),
            Either3::Second(Err(code)) => SessionEvent::Failed(code),
            Either3::Third(()) => SessionEvent::Ping,
        };

        match event {
            SessionEvent::Command(MqttCommand::Connect(_)) => link.replies.send(Ok(())).await,
            SessionEvent::Command(MqttCommand::Subscribe(topic)) => {
                let result = client
                    .subscribe_to_topic(&topic)
                    .await
                    .map_err(|_| MqttError::Rejected);
                link.replies.send(result).await;
            }
            SessionEvent::Command(MqttCommand::Unsubscribe(topic)) => {
                let result = client
                    .unsubscribe_from_topic(&topic)
                    .await
                    .map_err(|_| MqttError::Rejected);
                link.replies.send(result).await;
            }
            SessionEvent::Command(MqttCommand::Publish(topic, payload)) => {
                if let Err(code) = client
                    .send_message(&topic, payload.as_bytes(), QualityOfService::QoS0, false)
                    .await
                {
                    warn!("MQTT: Publish failed: {}", Debug2Format(&code));
                    link.set_connected(false);
                    link.replies.send(Err(MqttError::Transport)).await;
                    return Err(MqttError::Transport);
                }
                link.replies.send(Ok(())).await;
            }
            SessionEvent::Command(MqttCommand::Disconnect) => {
                let _ = client.disconnect().await;
                link.set_connected(false);
                link.replies.send(Ok(())).await;
                return Ok(());
            }
            SessionEvent::Message(Some(message)) => {
                if link.inbox.try_send(message).is_err() {
                    warn!("MQTT: Inbox full, dropping message");
                }
            }
            SessionEvent::Message(None) => warn!("MQTT: Dropping oversized message"),
            SessionEvent::Failed(ReasonCode::NetworkError) => {
                warn!("MQTT: Connection lost");
                return Err(MqttError::Transport);
            }
            SessionEvent::Failed(code) => debug!("MQTT: Ignoring packet ({})", Debug2Format(&code)),
            SessionEvent::Ping => {
                if let Err(code) = client.send_ping().await {
                    warn!("MQTT: Ping failed: {}", Debug2Format(&code));
                    return Err(MqttError::Transport);
                }
            }
        }
    }
}
