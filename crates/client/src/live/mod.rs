//! Live channel client
//!
//! One persistent WebSocket per page, delivering ticket events in backend order:
//! - new, edited and deleted messages
//! - ticket-closed notifications
//! - connection lifecycle (connected, authorized, disconnected)
//!
//! # Architecture
//!
//! - **Events**: wire frames and the typed [`LiveEvent`] feed
//! - **Connection**: the connection state machine and epochs
//! - **Channel**: the socket task, authorization handshake and reconnects

pub mod channel;
pub mod connection;
pub mod events;

pub use channel::{LiveChannelClient, LiveChannelConfig};
pub use connection::ConnectionState;
pub use events::LiveEvent;
