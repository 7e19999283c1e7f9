//! Topic and payload decoding for sensor telemetry.
//!
//! Topic: `{base_topic}/sensors/{custom_id}/measures`
//!
//! Payload:
//! ```json
//! {"value": 45.0, "measure_type": "TEMPERATURE", "time": "2024-03-01T10:00:00Z", "sensor_type": "sunspot"}
//! ```
//! `time` and `sensor_type` are optional.

use serde::Deserialize;

use brightnest_app::ports::MeasureReport;
use brightnest_domain::time::parse_rfc3339;

use crate::error::MqttError;

#[derive(Debug, Deserialize)]
struct MeasurePayload {
    value: f64,
    measure_type: String,
    #[serde(default)]
    time: Option<String>,
    #[serde(default)]
    sensor_type: Option<String>,
}

/// Extract the sensor custom id from a measures topic.
///
/// # Errors
///
/// Returns [`MqttError::UnexpectedTopic`] when `topic` is not
/// `{base_topic}/sensors/{custom_id}/measures` with a non-empty id.
pub fn sensor_id_from_topic<'t>(base_topic: &str, topic: &'t str) -> Result<&'t str, MqttError> {
    topic
        .strip_prefix(base_topic)
        .and_then(|rest| rest.strip_prefix("/sensors/"))
        .and_then(|rest| rest.strip_suffix("/measures"))
        .filter(|id| !id.is_empty() && !id.contains('/'))
        .ok_or_else(|| MqttError::UnexpectedTopic(topic.to_string()))
}

/// Decode one publish into a [`MeasureReport`].
///
/// # Errors
///
/// Returns an [`MqttError`] when the topic, JSON or time is malformed.
pub fn decode_report(
    base_topic: &str,
    topic: &str,
    payload: &[u8],
) -> Result<MeasureReport, MqttError> {
    let custom_id = sensor_id_from_topic(base_topic, topic)?;
    let payload: MeasurePayload =
        serde_json::from_slice(payload).map_err(MqttError::PayloadParse)?;
    let time = payload
        .time
        .map(|value| {
            parse_rfc3339(&value).map_err(|source| MqttError::InvalidTime { value, source })
        })
        .transpose()?;

    Ok(MeasureReport {
        sensor_custom_id: custom_id.to_string(),
        sensor_type: payload.sensor_type,
        value: payload.value,
        measure_type: payload.measure_type,
        time,
    })
}
