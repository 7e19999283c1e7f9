//! # brightnest-adapter-storage-sqlite-sqlx
//!
//! `SQLite` persistence adapter using [sqlx](https://docs.rs/sqlx).
//!
//! ## Responsibilities
//! - Implement the repository port traits defined in `brightnest-app::ports`
//! - Manage `SQLite` connection pool lifecycle
//! - Run database migrations (using sqlx embedded migrations)
//! - Map between domain types and database rows
//!
//! ## Dependency rule
//! Depends on `brightnest-app` (for port traits) and `brightnest-domain` (for domain types).
//! The `app` and `domain` crates must never reference this adapter.

mod device_repo;
mod error;
mod measure_repo;
mod pool;
mod rule_repo;

pub use device_repo::SqliteDeviceRepository;
pub use error::StorageError;
pub use measure_repo::SqliteMeasureRepository;
pub use pool::{Config, Database};
pub use rule_repo::SqliteRuleRepository;
