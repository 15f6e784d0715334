//! # BMA Common Library
//!
//! Shared code for the BMA music server including:
//! - Error types
//! - Configuration loading and resolution
//! - Clock abstraction used for token and device expiry
//! - API request/response types
//! - Framework-free bearer authentication helpers

pub mod api;
pub mod config;
pub mod error;
pub mod time;

pub use error::{Error, Result};
