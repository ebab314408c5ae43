//! # Take CTRL Participant Library
//!
//! This library implements a headless Take CTRL participant. A participant
//! joins a session with a short code, samples its local input every tick and
//! streams it to the host. It never simulates the shared character itself:
//! everything it knows about the session is replicated from the host.
//!
//! ## Architecture Overview
//!
//! ### Joining
//! Joining is a two-step handshake. The client sends `Connect` with its
//! protocol version and the session code, the host answers `Connected` or
//! `Rejected`, and the client confirms with `Ready`. Only after `Ready` does
//! the host count the client as a participant. A rejected client keeps its
//! socket and can try another code straight away.
//!
//! ### Input Streaming
//! Input is sent every tick whether it changed or not. The host keeps only
//! the latest sample per participant and forgets samples that stop arriving,
//! so a steady stream is both the input channel and the keep-alive.
//!
//! ### Replication
//! The host publishes the aggregated command with a revision number and the
//! shared body with a tick number. The client keeps the newest of each and
//! exposes the command as a watchable cell.
//!
//! ## Module Organization
//!
//! ### Input Module (`input`)
//! - `InputSource` implementations for bots and fixed inputs
//! - Sequence numbering of outgoing samples
//!
//! ### Replica Module (`replica`)
//! - Revision-ordered command mirror
//! - Scoped observers through `tokio::sync::watch`
//! - Lobby roster, scene and action effects
//!
//! ### Network Module (`network`)
//! - UDP socket and handshake
//! - Packet handling and the per-tick send loop
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use client::input::WanderInput;
//! use client::network::Client;
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut client = Client::new("127.0.0.1:8080", 0).await?;
//!     client.join("K7QX2M", Duration::from_secs(3)).await?;
//!
//!     let mut observer = client.replica().subscribe_command();
//!     tokio::spawn(async move {
//!         while observer.changed().await.is_ok() {
//!             println!("{:?}", *observer.borrow());
//!         }
//!     });
//!
//!     let mut bot = WanderInput::from_entropy();
//!     client.run(&mut bot, Duration::from_millis(16), false).await?;
//!     Ok(())
//! }
//! ```

pub mod input;
pub mod network;
pub mod replica;
