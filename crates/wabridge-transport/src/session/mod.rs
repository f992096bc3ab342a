//! Session provider backed by a WebSocket sidecar.
//!
//! The messaging client itself (browser automation, authentication, message
//! transport) runs out of process. This module speaks its small JSON frame
//! protocol and adapts it to [`SessionProvider`](wabridge_core::SessionProvider).

pub mod protocol;
mod provider;

pub use provider::{CLIENT_NAME_HEADER, WsSessionConfig, WsSessionFactory, WsSessionProvider};
