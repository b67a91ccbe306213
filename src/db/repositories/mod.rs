//! Database repositories
//!
//! One repository per aggregate. Each trait has a `Sqlx*Repository`
//! implementation that dispatches on the configured driver.

/// Run `$body` with `$exec` bound to the concrete pool of the active driver.
///
/// Only for statements whose SQL and bindings are identical on both backends.
macro_rules! run_on_driver {
    ($pool:expr, |$exec:ident| $body:expr) => {
        match $pool.driver() {
            $crate::config::DatabaseDriver::Sqlite => {
                let $exec = $crate::db::pool::sqlite(&$pool)?;
                $body
            }
            $crate::config::DatabaseDriver::Mysql => {
                let $exec = $crate::db::pool::mysql(&$pool)?;
                $body
            }
        }
    };
}

/// Id of the row an INSERT just created, on either backend
pub(crate) trait InsertedId {
    fn inserted_id(&self) -> i64;
}

impl InsertedId for sqlx::sqlite::SqliteQueryResult {
    fn inserted_id(&self) -> i64 {
        self.last_insert_rowid()
    }
}

impl InsertedId for sqlx::mysql::MySqlQueryResult {
    fn inserted_id(&self) -> i64 {
        self.last_insert_id() as i64
    }
}

pub mod content;
pub mod document;
pub mod member;
pub mod session;
pub mod user;

pub use content::{ContentRepository, SqlxContentRepository};
pub use document::{DocumentRepository, SqlxDocumentRepository};
pub use member::{MemberRepository, SqlxMemberRepository};
pub use session::{SessionRepository, SqlxSessionRepository};
pub use user::{SqlxUserRepository, UserRepository};
