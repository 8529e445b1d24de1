//! # MQTT Bridge Module
//!
//! Connects the dashboard to the robot's broker and feeds every received
//! message into the [`TopicDispatcher`](crate::telemetry::TopicDispatcher).
//!
//! ```text
//! mqtt/
//! ├── config.rs        - connection settings derived from the config file
//! └── mqtt_handler.rs  - event loop, subscriptions, connection status
//! ```
//!
//! The handler owns the rumqttc event loop. rumqttc reconnects on the next
//! poll after a failure, the handler only waits `reconnect_delay` in between
//! and re-subscribes on every `ConnAck`. Connection status is published
//! through a `watch` channel for the status bar.

pub mod config;
pub mod mqtt_handler;

pub use mqtt_handler::{ConnectionState, MQTTStatus, MqttHandler};
