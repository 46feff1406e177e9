//! HTTP client core for the hotel management REST API
//!
//! Provides the stage pipeline every request passes through, the error taxonomy
//! shared by all callers, and typed methods for each resource area.

pub mod client;
pub mod types;

pub use client::error::{ClientError, ErrorKind};
pub use client::pipeline::{ApiRequest, ApiResponse, BearerStage, RequestBody, Stage};
pub use client::{HotelClient, HotelClientBuilder};
