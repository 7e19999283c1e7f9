//! Evaluation queue port — hand-off from ingestion to the rule engine.

use std::future::Future;

use brightnest_domain::error::BrightnestError;
use brightnest_domain::measure::Measure;

/// Accepts persisted measures for asynchronous rule evaluation.
pub trait EvaluationQueue {
    /// Queue a measure for evaluation.
    ///
    /// Waits while the queue is full. Fails only when no consumer is left.
    fn enqueue(&self, measure: Measure) -> impl Future<Output = Result<(), BrightnestError>> + Send;
}

impl<T: EvaluationQueue + Send + Sync> EvaluationQueue for std::sync::Arc<T> {
    fn enqueue(&self, measure: Measure) -> impl Future<Output = Result<(), BrightnestError>> + Send {
        (**self).enqueue(measure)
    }
}
