//! clover-http: signed HTTP request layer for the Clover.Space API.
//!
//! # Features
//! - Per-request signed headers via [`clover_core::HeaderSigner`]
//! - Web-facing host routing (`/api/f` prefix, unsigned)
//! - JSON response decoding with typed `apiCode` errors
//! - Closed request-body variant: bytes, text, JSON, multipart

pub mod body;
pub mod client;

pub use body::{Multipart, RequestBody};
pub use client::{decode_response, normalize_endpoint, ApiRequest, HttpClientConfig, RequestManager};
