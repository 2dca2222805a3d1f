//! clover-ws: persistent websocket session for the Clover.Space client.
//!
//! # Features
//! - Signed websocket upgrade
//! - Request multiplexing over a single connection
//! - Acknowledgement correlation by caller-chosen sequence id
//! - Broadcast fan-out of pushed chat messages
//! - Fixed-interval keepalive pings
//! - Deterministic teardown: background tasks stopped, waiters failed

pub mod config;
pub mod correlator;
pub mod dispatcher;
mod keepalive;
pub mod session;
mod writer;

pub use config::SessionConfig;
pub use correlator::{Correlator, PendingAck};
pub use session::{SessionManager, SessionState};
