//! Database layer
//!
//! SQLite (default, single-file deployment) and MySQL behind one
//! `DatabasePool` trait. Schema lives in code-embedded migrations; each
//! entity has a repository trait with an sqlx implementation.
//!
//! ```ignore
//! let pool = inkpress::db::create_pool(&config.database).await?;
//! inkpress::db::migrations::run_migrations(&pool).await?;
//! ```

pub mod migrations;
pub mod pool;
pub mod repositories;

pub use pool::{
    create_pool, create_test_pool, Backend, DatabasePool, DynDatabasePool, MysqlDatabase,
    SqliteDatabase,
};

/// Evaluate `$body` once per backend with `$p` bound to the typed pool.
///
/// Only for statements whose SQL is identical on SQLite and MySQL; anything
/// dialect-specific matches on `Backend` directly.
macro_rules! on_backend {
    ($pool:expr, |$p:ident| $body:expr) => {
        match $pool.backend() {
            $crate::db::Backend::Sqlite($p) => $body,
            $crate::db::Backend::Mysql($p) => $body,
        }
    };
}

pub(crate) use on_backend;
