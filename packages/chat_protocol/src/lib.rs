//! # Chat Protocol
//!
//! Data model and frame handling shared by the chat widget and its transport.
//!
//! The remote assistant streams each reply as a sequence of JSON frames over a
//! single WebSocket:
//!
//! ```text
//! {"chunk": "Hel"}
//! {"chunk": "lo"}
//! {"end": true}
//! ```
//!
//! An `{"error": "..."}` frame may arrive at any point and is shown to the
//! user as an error message. This crate provides:
//! - [`OutboundFrame`] / [`InboundFrame`] / [`LeadSubmission`] wire types
//! - [`Transcript`] and [`Message`], the ordered conversation history
//! - [`StreamAssembler`], which folds inbound frames into the transcript
//!
//! ## Quick Start
//!
//! ```rust
//! use chat_protocol::{Role, StreamAssembler};
//!
//! let mut assembler = StreamAssembler::new("Welcome!");
//! assembler.begin_turn("What sizes are available?");
//!
//! assembler.apply_raw(r#"{"chunk":"Hel"}"#);
//! assembler.apply_raw(r#"{"chunk":"lo"}"#);
//! assembler.apply_raw(r#"{"end":true}"#);
//!
//! let last = assembler.transcript().last().unwrap();
//! assert_eq!(last.role, Role::Assistant);
//! assert_eq!(last.text, "Hello");
//! assert_eq!(last.completed, Some(true));
//! assert!(!assembler.status().streaming);
//! ```

pub mod assembler;
pub mod error;
pub mod frame;
pub mod transcript;

pub use assembler::{StreamAssembler, StreamStatus, TranscriptUpdate, TurnPhase};
pub use error::FrameError;
pub use frame::{InboundFrame, LeadSubmission, OutboundFrame};
pub use transcript::{Message, Role, Transcript};
