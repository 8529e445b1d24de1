use std::time::Duration;

#[derive(Debug, Clone, PartialEq)]
pub struct MqttConfig {
    pub host: String,
    pub port: u16,
    pub client_id: String,
    /// `(user, password)`
    pub credentials: Option<(String, String)>,
    pub keep_alive: Duration,
    pub reconnect_delay: Duration,
}
