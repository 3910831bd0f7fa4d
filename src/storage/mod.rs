//! Durable state: the SQLite pool, schema and the Configuration Store.

mod config_store;
mod migrations;
mod models;
mod pool;

#[cfg(test)]
pub(crate) mod test_helpers;

pub use config_store::{config_key, ConfigStore, KeyLocks};
pub use migrations::run_migrations;
pub use models::{BackupConfig, BackupType, ScheduleStatus};
pub use pool::init_db_pool_with_path;
