//! MQTT transport configuration.

use std::time::Duration;

use rumqttc::MqttOptions;
use serde::Deserialize;

/// Configuration for the MQTT telemetry transport.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct MqttConfig {
    /// Whether the daemon connects to a broker at all.
    pub enabled: bool,
    /// MQTT broker hostname or IP address.
    pub broker_host: String,
    /// MQTT broker port.
    pub broker_port: u16,
    /// MQTT client identifier.
    pub client_id: String,
    /// Prefix of every brightnest topic.
    pub base_topic: String,
    /// Keep-alive interval in seconds.
    pub keep_alive_secs: u16,
    /// Publishes buffered between the connection and ingestion.
    pub inbox_capacity: usize,
}

impl Default for MqttConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            broker_host: "localhost".to_string(),
            broker_port: 1883,
            client_id: "brightnest".to_string(),
            base_topic: "brightnest".to_string(),
            keep_alive_secs: 30,
            inbox_capacity: 64,
        }
    }
}

impl MqttConfig {
    /// Subscription filter matching every sensor's measure topic.
    #[must_use]
    pub fn measures_filter(&self) -> String {
        format!("{}/sensors/+/measures", self.base_topic)
    }

    pub(crate) fn options(&self) -> MqttOptions {
        let mut options =
            MqttOptions::new(&self.client_id, &self.broker_host, self.broker_port);
        options.set_keep_alive(Duration::from_secs(u64::from(self.keep_alive_secs)));
        options
    }
}
