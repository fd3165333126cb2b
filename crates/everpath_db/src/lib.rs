//! Persistence for Everpath
//!
//! A database agnostic client over the `sqlx` `Any` driver plus one repository per
//! entity. SQLite is the default backend; enable the `postgres` feature for PostgreSQL.
//!
//! # Example
//!
//! ```rust,no_run
//! use everpath_config::AppConfig;
//! use everpath_db::{DbClient, Repositories};
//!
//! async fn setup_db(config: &AppConfig) -> Result<Repositories, Box<dyn std::error::Error>> {
//!     let db_client = DbClient::new(config).await?;
//!     db_client.init_schema().await?;
//!     Ok(Repositories::new(db_client))
//! }
//! ```

pub mod client;
pub mod error;
pub mod repositories;
mod schema;
pub mod timestamps;

pub use client::{DbClient, DbTransaction};
pub use error::DbError;
pub use repositories::*;
