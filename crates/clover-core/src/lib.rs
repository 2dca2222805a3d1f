//! clover-core: shared types for the Clover.Space client.
//!
//! # Overview
//!
//! The core crate defines everything the HTTP request layer and the websocket
//! session have in common:
//!
//! - [`CloverError`]: structured error type for every client operation
//! - [`HeadersProvider`]: the identity capability that signs requests
//! - [`HeaderSigner`]: device-id caching and per-request header assembly
//! - [`frame`] module: websocket wire frames (`t`-tagged JSON)
//! - [`ChatMessage`]: the broadcast event payload
//! - [`Subscriptions`]: ordered one-to-many fan-out
//! - [`logging`] module: `tracing` subscriber setup

pub mod config;
pub mod error;
pub mod frame;
pub mod headers;
pub mod logging;
pub mod message;
pub mod subscription;

pub use config::IdentityConfig;
pub use error::{ApiError, CloverError};
pub use frame::{InboundFrame, OutboundRequest, ServerAck};
pub use headers::{HeaderSigner, Headers, HeadersProvider, SIGNATURE_HEADER};
pub use message::ChatMessage;
pub use subscription::{ListenerId, Subscriptions};
