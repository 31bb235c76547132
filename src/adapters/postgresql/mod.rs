//! PostgreSQL integration
//!
//! PostgreSQL serves two roles: the event warehouse and, through
//! [`PgQueue`], the notification channel.

pub mod adapter;
pub mod client;
pub mod models;
pub mod queue;

pub use adapter::PostgreSQLAdapter;
pub use client::PostgreSQLClient;
pub use queue::PgQueue;
