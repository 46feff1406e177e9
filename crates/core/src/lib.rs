//! Hotelier core types and utilities

pub mod config;
pub mod error;
pub mod token_store;

pub use config::{ApiConfig, HotelierConfig, SessionConfig, StorageConfig};
pub use error::{CoreError, CoreResult};
pub use token_store::{FileTokenStore, MemoryTokenStore, TokenStore, token_fingerprint};
