use chrono::{DateTime, Local};
use rumqttc::{AsyncClient, Event, EventLoop, MqttOptions, Packet, QoS};
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::config::MqttConfig;
use crate::telemetry::{Topic, TopicDispatcher};

/// Keep the last few connection errors for the status bar
const MAX_ERROR_MESSAGES: usize = 5;
const REQUEST_CAPACITY: usize = 32;

#[derive(Clone, Default, Debug, PartialEq, Eq)]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connecting,
    Connected,
    Reconnecting,
}

#[derive(Clone, Debug, Default)]
pub struct MQTTStatus {
    pub connection_state: ConnectionState,
    pub error_messages: Vec<String>,
    pub messages_received: usize,
    pub last_activity: Option<DateTime<Local>>,
}

impl MQTTStatus {
    fn record_error(&mut self, message: String) {
        if self.error_messages.len() == MAX_ERROR_MESSAGES {
            self.error_messages.remove(0);
        }
        self.error_messages.push(message);
    }
}

/// Broker connection feeding the [`TopicDispatcher`]
///
/// Publishes are dispatched inline in the event loop, so each message is
/// fully applied to the mirror before the next one is polled.
pub struct MqttHandler {
    status: MQTTStatus,
    client: AsyncClient,
    eventloop: EventLoop,
    config: MqttConfig,
    dispatcher: TopicDispatcher,
    status_sender: watch::Sender<MQTTStatus>,
    /// Subscribe requests queued since start, across reconnects
    subscribe_requests: usize,
}

/// Every topic the dashboard subscribes to, under `prefix`
fn subscriptions(prefix: &str) -> Vec<String> {
    Topic::ALL
        .into_iter()
        .map(|topic| topic.subscription(prefix))
        .collect()
}

impl MqttHandler {
    pub fn new(
        config: MqttConfig,
        dispatcher: TopicDispatcher,
        status_sender: watch::Sender<MQTTStatus>,
    ) -> Self {
        let mut mqtt_options = MqttOptions::new(&config.client_id, &config.host, config.port);
        mqtt_options.set_keep_alive(config.keep_alive);
        if let Some((user, password)) = &config.credentials {
            mqtt_options.set_credentials(user, password);
        }

        let (client, eventloop) = AsyncClient::new(mqtt_options, REQUEST_CAPACITY);

        MqttHandler {
            status: MQTTStatus::default(),
            client,
            eventloop,
            config,
            dispatcher,
            status_sender,
            subscribe_requests: 0,
        }
    }

    /// Polls the broker until `cancel` fires
    pub async fn run(mut self, cancel: CancellationToken) {
        info!(
            "Connecting to broker at {}:{}",
            self.config.host, self.config.port
        );
        self.set_state(ConnectionState::Connecting);

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                event = self.eventloop.poll() => match event {
                    Ok(event) => self.handle_event(event),
                    Err(e) => {
                        warn!("MQTT connection error: {}", e);
                        self.status.record_error(e.to_string());
                        self.set_state(ConnectionState::Reconnecting);

                        tokio::select! {
                            _ = cancel.cancelled() => break,
                            _ = tokio::time::sleep(self.config.reconnect_delay) => {}
                        }
                    }
                },
            }
        }

        if let Err(e) = self.client.try_disconnect() {
            debug!("Disconnect request failed: {}", e);
        }
        self.set_state(ConnectionState::Disconnected);
        info!("MQTT handler stopped");
    }

    fn handle_event(&mut self, event: Event) {
        match event {
            Event::Incoming(Packet::ConnAck(_)) => {
                self.subscribe_all();
                info!(
                    "Connected to broker ({} subscribe requests so far)",
                    self.subscribe_requests
                );
                self.set_state(ConnectionState::Connected);
            }
            Event::Incoming(Packet::Publish(publish)) => {
                debug!("Message on {}", publish.topic);
                self.dispatcher.dispatch(&publish.topic, &publish.payload);
                self.status.messages_received += 1;
                self.status.last_activity = Some(Local::now());
                self.publish_status();
            }
            Event::Incoming(Packet::Disconnect) => {
                info!("Broker closed the connection");
                self.set_state(ConnectionState::Reconnecting);
            }
            _ => {}
        }
    }

    fn subscribe_all(&mut self) {
        for subscription in subscriptions(self.dispatcher.prefix()) {
            match self.client.try_subscribe(&subscription, QoS::AtMostOnce) {
                Ok(()) => {
                    self.subscribe_requests += 1;
                    debug!("Subscribed to {}", subscription);
                }
                Err(e) => {
                    error!("Failed to subscribe to {}: {}", subscription, e);
                    self.status.record_error(e.to_string());
                }
            }
        }
    }

    fn set_state(&mut self, state: ConnectionState) {
        if self.status.connection_state != state {
            debug!(
                "MQTT state {:?} -> {:?}",
                self.status.connection_state, state
            );
            self.status.connection_state = state;
        }
        self.publish_status();
    }

    fn publish_status(&self) {
        // No receivers just means the window is gone.
        let _ = self.status_sender.send(self.status.clone());
    }
}
