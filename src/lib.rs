//! cryptotrack library
//!
//! Exposes the cache, market client, price service, and HTTP service for use
//! by the binary and integration tests.

pub mod cache;
pub mod cli;
pub mod clock;
pub mod config;
pub mod data;
pub mod format;
pub mod prices;
pub mod refresh;
pub mod server;
pub mod sitemap;
