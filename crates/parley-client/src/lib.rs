//! Parley Client - streaming session client for a multi-agent chat backend
//!
//! The pieces, bottom-up:
//!
//! - [`decoder`] - turns the `/stream` byte stream into [`StreamEvent`]s
//! - [`ledger`] - the observable message list a front end renders
//! - [`typewriter`] - paces reply fragments into the ledger
//! - [`session`] - durable mirror of the session id
//! - [`client`] - [`ChatClient`], which ties the above to the HTTP API
//!
//! ```no_run
//! use parley_client::{ChatClient, ClientConfig, SessionStore};
//!
//! # async fn run() -> parley_client::Result<()> {
//! let client = ChatClient::new(ClientConfig::default(), SessionStore::open_default()?)?;
//! let outcome = client.send_streaming("Hello").await;
//! println!("{outcome:?}: {:?}", client.ledger().last());
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod config;
pub mod decoder;
pub mod error;
mod http_client;
pub mod ledger;
pub mod models;
pub mod session;
pub mod typewriter;

pub use client::{ChatClient, TurnOutcome, TurnState};
pub use config::{ClientConfig, DEFAULT_BASE_URL};
pub use decoder::{EventStreamDecoder, decode_stream};
pub use error::{ClientError, Result};
pub use ledger::{Ledger, LedgerSnapshot, Message, MessagePatch, Role};
pub use models::{
    ChatRequest, ChatResponse, HealthResponse, HistoryEntry, NewSessionResponse, ResetResponse,
    SessionHistory, StreamEvent,
};
pub use session::{SESSION_KEY, SessionStore};
pub use typewriter::{Typewriter, TypewriterConfig};
