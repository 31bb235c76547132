//! External system integrations for Sluice.
//!
//! - [`storage`] - Object stores holding dropped files (folder, HTTP)
//! - [`channel`] - Inbound notifications and outbound trigger publishing
//! - [`warehouse`] - Batched record inserts
//! - [`postgresql`] - PostgreSQL warehouse and table-backed queue
//! - [`memory`] - In-process channel and warehouse
//!
//! # Design Pattern
//!
//! Adapters isolate external dependencies behind traits so the pipeline
//! can run against in-memory implementations in tests.
//!
//! ```rust,no_run
//! use sluice::adapters::factory::{create_object_store, create_postgres_adapters, prepare};
//! use sluice::config::load_config;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = load_config("sluice.toml")?;
//! let store = create_object_store(&config.storage)?;
//! let adapters = create_postgres_adapters(&config)?;
//! prepare(&adapters.client, &config).await?;
//! # Ok(())
//! # }
//! ```

pub mod channel;
pub mod factory;
pub mod memory;
pub mod postgresql;
pub mod storage;
pub mod warehouse;
