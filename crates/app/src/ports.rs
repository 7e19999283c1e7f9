//! Port definitions — traits that adapters implement.
//!
//! Ports are the boundaries between the application core and the outside world.
//! They are defined here (in `app`) so that both the use-case layer and the
//! adapter layer can depend on them without creating circular dependencies.

pub mod driver;
pub mod evaluation_queue;
pub mod rule_repo;
pub mod storage;
pub mod telemetry;

pub use driver::Driver;
pub use evaluation_queue::EvaluationQueue;
pub use rule_repo::RuleRepository;
pub use storage::{DeviceRepository, MeasureRepository, Page};
pub use telemetry::{MeasureReport, TelemetrySink};
