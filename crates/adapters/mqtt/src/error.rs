//! MQTT adapter error types.

use brightnest_domain::error::BrightnestError;

/// Errors specific to the MQTT adapter.
#[derive(Debug, thiserror::Error)]
pub enum MqttError {
    /// The rumqttc client returned an error.
    #[error("MQTT client error")]
    Client(#[source] rumqttc::ClientError),

    /// A publish arrived on a topic outside the measures namespace.
    #[error("unexpected topic {0:?}")]
    UnexpectedTopic(String),

    /// Failed to parse an incoming MQTT payload as JSON.
    #[error("failed to parse MQTT payload")]
    PayloadParse(#[source] serde_json::Error),

    /// The payload carried a time that is not RFC 3339.
    #[error("invalid measure time {value:?}")]
    InvalidTime {
        value: String,
        #[source]
        source: chrono::ParseError,
    },

    /// The ingestion worker is gone; no publish can be delivered anymore.
    #[error("MQTT ingestion worker stopped")]
    WorkerStopped,

    /// A domain-level error (unknown sensor, validation, storage, …).
    #[error("domain error")]
    Domain(#[source] BrightnestError),
}

impl MqttError {
    /// Convert into a domain error for propagation across port boundaries.
    pub fn into_domain(self) -> BrightnestError {
        match self {
            Self::Domain(err) => err,
            other => BrightnestError::Internal(Box::new(other)),
        }
    }
}

impl From<MqttError> for BrightnestError {
    fn from(err: MqttError) -> Self {
        err.into_domain()
    }
}

impl From<BrightnestError> for MqttError {
    fn from(err: BrightnestError) -> Self {
        Self::Domain(err)
    }
}
