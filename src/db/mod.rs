//! Database layer
//!
//! SQLite is the default backend (single-file deployment); MySQL is
//! available for larger installations. The driver is selected from
//! configuration and hidden behind [`DatabasePool`].
//!
//! ```ignore
//! let pool = create_pool(&config.database).await?;
//! migrations::run_migrations(&pool).await?;
//! ```

pub mod migrations;
pub mod pool;
pub mod repositories;

pub use pool::{
    create_pool, create_test_pool, DatabasePool, DynDatabasePool, MysqlDatabase, SqliteDatabase,
};
