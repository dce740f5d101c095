//! Shared normalization layer for Worksuite adapters.
//!
//! Upstream SaaS APIs return sparse, deeply nested JSON; the modules here
//! hold the cross-adapter policy for turning that into flat, caller-safe
//! records: the field accessor and custom-field formatter ([`fields`]), the
//! offset pagination driver ([`pagination`]), the result envelope
//! ([`envelope`]), plus the error taxonomy, config structs, and the shared
//! HTTP client every adapter is built on.

pub mod config;
pub mod envelope;
pub mod error;
pub mod fields;
pub mod http;
pub mod pagination;

pub use error::{AdapterError, Result};
pub use http::{Credential, HttpClient};
