//! In-process evaluation queue backed by a bounded tokio mpsc channel.

use std::future::Future;

use tokio::sync::mpsc;

use brightnest_domain::error::BrightnestError;
use brightnest_domain::measure::Measure;

use crate::ports::EvaluationQueue;

/// Error raised when the rule engine worker is gone.
#[derive(Debug, thiserror::Error)]
#[error("evaluation queue is closed")]
pub struct QueueClosed;

/// Bounded in-process queue between ingestion and the rule engine.
///
/// Producers wait while the queue is full, which slows ingestion down to the
/// evaluation rate instead of dropping measures.
#[derive(Clone)]
pub struct InProcessEvaluationQueue {
    sender: mpsc::Sender<Measure>,
}

impl InProcessEvaluationQueue {
    /// Create a queue holding at most `capacity` pending measures.
    ///
    /// The returned receiver is meant for [`RuleEngine::run`](crate::rule_engine::RuleEngine::run).
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is zero.
    #[must_use]
    pub fn new(capacity: usize) -> (Self, mpsc::Receiver<Measure>) {
        let (sender, receiver) = mpsc::channel(capacity);
        (Self { sender }, receiver)
    }
}

impl EvaluationQueue for InProcessEvaluationQueue {
    fn enqueue(&self, measure: Measure) -> impl Future<Output = Result<(), BrightnestError>> + Send {
        let sender = self.sender.clone();
        async move {
            sender
                .send(measure)
                .await
                .map_err(|_| BrightnestError::Internal(Box::new(QueueClosed)))
        }
    }
}
