//! Chat Socket - owns the one WebSocket between the widget and the assistant.
//!
//! The socket lives inside a driver task. Callers get a [`ConnectionHandle`]
//! that can only send, wait for readiness, query state and close; inbound
//! traffic and lifecycle changes arrive in order on an event channel.
//!
//! When the socket closes or errors, the driver reconnects after
//! `min(1s × 2^retry, 30s)` and gives up after five consecutive failures.
//! A successful open resets the retry count.
//!
//! # Example
//!
//! ```no_run
//! use chat_socket::{BackoffPolicy, ConnectionEvent, ConnectionManager};
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() {
//!     let url = "wss://assistant.example.com/ws/chat";
//!     let (handle, mut events) = ConnectionManager::spawn(url, BackoffPolicy::default());
//!
//!     handle
//!         .wait_for_connection(Duration::from_secs(5), Duration::from_millis(500))
//!         .await
//!         .unwrap();
//!     handle
//!         .send(&serde_json::json!({ "user_input": "hello" }))
//!         .unwrap();
//!
//!     while let Some(event) = events.recv().await {
//!         if let ConnectionEvent::Message(text) = event {
//!             println!("{text}");
//!         }
//!     }
//! }
//! ```

mod backoff;
mod connector;
mod error;
mod manager;

pub use backoff::{BackoffPolicy, MAX_RETRIES};
pub use connector::{Connector, TungsteniteConnector};
pub use error::SocketError;
pub use manager::{ConnectionEvent, ConnectionHandle, ConnectionManager, ConnectionState};
