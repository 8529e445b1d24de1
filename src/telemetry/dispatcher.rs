//! Routes inbound broker messages into the [`StateMirror`]
//!
//! The topic set is closed: every topic maps to a fixed list of fields whose
//! payload keys equal the field keys. Anything that does not fit is logged
//! and dropped, the mirror is only ever touched by well-formed updates.

use std::sync::Arc;
use tracing::{debug, info, warn};

use super::mirror::{Field, StateMirror};

/// Broker topics the dashboard listens to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Topic {
    CmdVel,
    BatteryPercentage,
    BatteryIsCharging,
    EStop,
    Handbrake,
    DirectStatus,
    RobotMode,
    BrushSpeed,
    SafetyMode,
}

impl Topic {
    pub const ALL: [Topic; 9] = [
        Topic::CmdVel,
        Topic::BatteryPercentage,
        Topic::BatteryIsCharging,
        Topic::EStop,
        Topic::Handbrake,
        Topic::DirectStatus,
        Topic::RobotMode,
        Topic::BrushSpeed,
        Topic::SafetyMode,
    ];

    /// Topic path without the broker prefix
    pub fn path(self) -> &'static str {
        match self {
            Topic::CmdVel => "control/cmd_vel",
            Topic::BatteryPercentage => "state/battery_percentage",
            Topic::BatteryIsCharging => "state/battery_is_charging",
            Topic::EStop => "state/e_stop",
            Topic::Handbrake => "state/handbrake",
            Topic::DirectStatus => "state/direct_status",
            Topic::RobotMode => "state/robot_mode",
            Topic::BrushSpeed => "control/brush_speed",
            Topic::SafetyMode => "state/safety_mode",
        }
    }

    /// Fields carried by this topic's payload
    pub fn fields(self) -> &'static [Field] {
        match self {
            Topic::CmdVel => &[Field::LinearX, Field::AngularZ],
            Topic::BatteryPercentage => &[Field::BatteryPercentage],
            Topic::BatteryIsCharging => &[Field::BatteryIsCharging],
            Topic::EStop => &[Field::EStop],
            Topic::Handbrake => &[Field::Handbrake],
            Topic::DirectStatus => &[Field::DirectStatus],
            Topic::RobotMode => &[Field::RobotMode],
            Topic::BrushSpeed => &[Field::BrushSpeed],
            Topic::SafetyMode => &[Field::SafetyMode],
        }
    }

    /// Full broker topic to subscribe to
    pub fn subscription(self, prefix: &str) -> String {
        format!("{}{}", prefix, self.path())
    }

    /// Resolves a received topic, with or without `prefix`
    pub fn resolve(topic: &str, prefix: &str) -> Option<Topic> {
        let path = topic.strip_prefix(prefix).unwrap_or(topic);
        Topic::ALL.into_iter().find(|t| t.path() == path)
    }
}

/// Reasons a message was dropped without touching the mirror
#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error("Empty topic")]
    EmptyTopic,

    #[error("Empty payload on {0}")]
    EmptyPayload(String),

    #[error("Unknown topic: {0}")]
    UnknownTopic(String),

    #[error("Malformed payload: {0}")]
    MalformedPayload(#[from] serde_json::Error),

    #[error("Payload is not a JSON object")]
    NotAnObject,
}

/// Maps `(topic, payload)` pairs onto mirror updates
#[derive(Debug, Clone)]
pub struct TopicDispatcher {
    mirror: Arc<StateMirror>,
    prefix: String,
}

impl TopicDispatcher {
    pub fn new(mirror: Arc<StateMirror>, prefix: impl Into<String>) -> Self {
        Self {
            mirror,
            prefix: prefix.into(),
        }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Entry point for the transport callback, never fails
    pub fn dispatch(&self, topic: &str, payload: &[u8]) {
        match self.try_dispatch(topic, payload) {
            Ok(applied) => debug!("Applied {} field(s) from {}", applied, topic),
            Err(DispatchError::EmptyTopic) | Err(DispatchError::EmptyPayload(_)) => {
                debug!("Ignoring empty message on '{}'", topic)
            }
            Err(e @ DispatchError::UnknownTopic(_)) => info!("{}", e),
            Err(e) => warn!(
                "Dropping message on {}: {} (data: {})",
                topic,
                e,
                String::from_utf8_lossy(payload)
            ),
        }
    }

    /// Applies every recognized key in `payload`, returns how many were stored
    pub fn try_dispatch(&self, topic: &str, payload: &[u8]) -> Result<usize, DispatchError> {
        if topic.is_empty() {
            return Err(DispatchError::EmptyTopic);
        }
        if payload.is_empty() {
            return Err(DispatchError::EmptyPayload(topic.to_string()));
        }

        let resolved = Topic::resolve(topic, &self.prefix)
            .ok_or_else(|| DispatchError::UnknownTopic(topic.to_string()))?;

        let document: serde_json::Value = serde_json::from_slice(payload)?;
        let object = document.as_object().ok_or(DispatchError::NotAnObject)?;

        let mut applied = 0;
        for field in resolved.fields() {
            let Some(value) = object.get(field.key()) else {
                continue;
            };
            match numeric_value(value) {
                Some(raw) => {
                    self.mirror.apply(*field, raw);
                    applied += 1;
                }
                None => warn!("Ignoring non-numeric {}: {}", field, value),
            }
        }
        Ok(applied)
    }
}

fn numeric_value(value: &serde_json::Value) -> Option<f64> {
    match value {
        serde_json::Value::Number(n) => n.as_f64(),
        serde_json::Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        _ => None,
    }
}
