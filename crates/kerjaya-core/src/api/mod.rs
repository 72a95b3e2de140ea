//! REST API client module for the KerjayaFlow backend.
//!
//! This module provides the `ApiClient` for the identity endpoint (login and
//! registration) and the resume services (health check, ATS scan, internship
//! matching), whose payloads are passed through as opaque JSON.
//!
//! Service calls authenticate with the bearer credential issued at login.

pub mod client;
pub mod error;

pub use client::{ApiClient, DEFAULT_API_BASE_URL};
pub use error::ApiError;
