//! Database layer
//!
//! SQLite is the default (single file next to the binary); MySQL is selected
//! through `database.driver`. Both sit behind the [`DatabasePool`] trait so
//! repositories pick the right SQL at runtime.
//!
//! ```ignore
//! use folio::config::DatabaseConfig;
//! use folio::db::{create_pool, migrations};
//!
//! let pool = create_pool(&DatabaseConfig::default()).await?;
//! migrations::run_migrations(&pool).await?;
//! ```

pub mod migrations;
pub mod pool;
pub mod repositories;

pub use pool::{
    create_pool, create_test_pool, DatabasePool, DynDatabasePool, MysqlDatabase, SqliteDatabase,
};
