//! Telemetry bridge — broker subscription feeding the ingestion pipeline.
//!
//! The connection loop only decodes packets and hands publishes to a worker
//! over a bounded inbox. Ingestion backpressure therefore never stalls
//! `poll()`; when the inbox is full the publish is dropped and logged.

use std::sync::Arc;
use std::time::Duration;

use rumqttc::{AsyncClient, Event, Packet, Publish, QoS};
use tokio::sync::mpsc;

use brightnest_app::ports::TelemetrySink;
use brightnest_domain::id::MeasureId;

use crate::config::MqttConfig;
use crate::error::MqttError;
use crate::payload::decode_report;

const INITIAL_BACKOFF: Duration = Duration::from_secs(1);
const MAX_BACKOFF: Duration = Duration::from_secs(30);

/// Subscribes to sensor measure topics and hands each reading to a
/// [`TelemetrySink`].
pub struct TelemetryBridge<S> {
    config: MqttConfig,
    sink: S,
}

impl<S: TelemetrySink + Send + Sync + 'static> TelemetryBridge<S> {
    #[must_use]
    pub fn new(config: MqttConfig, sink: S) -> Self {
        Self { config, sink }
    }

    /// Decode and ingest one publish.
    ///
    /// # Errors
    ///
    /// Returns an [`MqttError`] when decoding fails or the sink rejects the
    /// reading.
    pub async fn handle_publish(&self, topic: &str, payload: &[u8]) -> Result<MeasureId, MqttError> {
        let report = decode_report(&self.config.base_topic, topic, payload)?;
        let id = self.sink.ingest(report).await?;
        Ok(id)
    }

    /// Connect and process publishes until the client is dropped.
    ///
    /// Connection errors are logged and retried with exponential backoff;
    /// the subscription is renewed on every (re)connect.
    ///
    /// # Errors
    ///
    /// Returns [`MqttError::Client`] when the subscribe request cannot be
    /// queued, or [`MqttError::WorkerStopped`] if the ingestion worker died.
    pub async fn run(self) -> Result<(), MqttError> {
        let (client, mut eventloop) = AsyncClient::new(self.config.options(), 10);
        let filter = self.config.measures_filter();
        let (inbox, publishes) = mpsc::channel(self.config.inbox_capacity.max(1));
        let bridge = Arc::new(self);
        let worker = tokio::spawn(Arc::clone(&bridge).ingest_all(publishes));
        let mut backoff = INITIAL_BACKOFF;

        tracing::info!(
            broker = %bridge.config.broker_host,
            port = bridge.config.broker_port,
            %filter,
            "starting MQTT telemetry bridge"
        );

        let outcome = loop {
            match eventloop.poll().await {
                Ok(Event::Incoming(Packet::ConnAck(_))) => {
                    backoff = INITIAL_BACKOFF;
                    if let Err(err) = client.subscribe(filter.as_str(), QoS::AtLeastOnce).await {
                        break Err(MqttError::Client(err));
                    }
                    tracing::info!(%filter, "connected to MQTT broker");
                }
                Ok(Event::Incoming(Packet::Publish(publish))) => {
                    if let Err(err) = hand_off(&inbox, publish) {
                        break Err(err);
                    }
                }
                Ok(_) => {}
                Err(err) => {
                    tracing::warn!(error = %err, retry_in = ?backoff, "MQTT connection error");
                    tokio::time::sleep(backoff).await;
                    backoff = (backoff * 2).min(MAX_BACKOFF);
                }
            }
        };

        worker.abort();
        outcome
    }

    /// Ingest queued publishes until the inbox closes.
    async fn ingest_all(self: Arc<Self>, mut publishes: mpsc::Receiver<Publish>) {
        while let Some(publish) = publishes.recv().await {
            match self.handle_publish(&publish.topic, &publish.payload).await {
                Ok(measure_id) => {
                    tracing::debug!(topic = %publish.topic, %measure_id, "measure ingested");
                }
                Err(err) => {
                    tracing::warn!(topic = %publish.topic, error = %err, "dropping MQTT message");
                }
            }
        }
    }
}

/// Queue a publish for the worker without waiting for room.
fn hand_off(inbox: &mpsc::Sender<Publish>, publish: Publish) -> Result<(), MqttError> {
    match inbox.try_send(publish) {
        Ok(()) => Ok(()),
        Err(mpsc::error::TrySendError::Full(publish)) => {
            tracing::warn!(topic = %publish.topic, "ingestion lagging, dropping MQTT message");
            Ok(())
        }
        Err(mpsc::error::TrySendError::Closed(_)) => Err(MqttError::WorkerStopped),
    }
}
