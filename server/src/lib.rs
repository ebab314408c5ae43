//! # Take CTRL Host Library
//!
//! This library provides the authoritative host for Take CTRL, a party game in
//! which every connected player steers the same character. The host collects
//! each participant's input, folds all of them into one command, drives the
//! shared body with it and replicates the result to everyone.
//!
//! ## Core Responsibilities
//!
//! ### Input Aggregation
//! Each participant streams input samples. The host keeps only the latest
//! sample per participant and, whenever anything changes, recomputes one
//! command from every sample younger than the freshness window:
//! - Movement is the equal-weight mean of the fresh samples, clamped to unit length
//! - Sprint is a strict majority vote
//! - Grounded comes from the host's own ground probe
//!
//! ### Session Lifecycle
//! A session moves from `Lobby` to `InProgress` exactly once. Joining is only
//! possible in the lobby and only while slots are free. The session owner can
//! start at any time; optionally the session starts by itself once full.
//!
//! ### Replication
//! The aggregated command is published whenever it changes and re-sent on a
//! slow cadence for lossy links. One-shot actions (jump, attack, dodge) are
//! applied immediately by the host and announced as cosmetic effects.
//!
//! ## Architecture Design
//!
//! ### Single-Threaded Event Loop
//! The host processes network events, physics steps and timeout checks
//! sequentially. Handling one input and recomputing the command therefore
//! never interleaves with another participant's input.
//!
//! ### Socket-Free Core
//! [`session::HostSession`] consumes decoded packets and returns the packets
//! to send. [`network::Server`] wraps it with a UDP socket and the tasks that
//! move bytes in and out.
//!
//! ## Module Organization
//!
//! - `registry`: latest input per participant and the freshness filter
//! - `aggregator`: mean movement, sprint vote, command assembly
//! - `admission`: capacity and "already started" gate
//! - `client_manager`: connection roster, handshake and timeouts
//! - `phase`: lobby to gameplay state machine
//! - `replicator`: change-only command publishing with revisions
//! - `game`: shared body physics and the ground probe
//! - `session`: everything above wired into one hosted session
//! - `network`: UDP transport and the host loop
//! - `config`: startup options
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use server::config::SessionConfig;
//! use server::network::Server;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = SessionConfig {
//!         auto_start_when_full: true,
//!         ..SessionConfig::default()
//!     };
//!
//!     let mut server = Server::new("127.0.0.1:8080", config).await?;
//!     println!("Share this code: {}", server.session_code());
//!
//!     server.run().await.map_err(|e| e.to_string())?;
//!     Ok(())
//! }
//! ```

pub mod admission;
pub mod aggregator;
pub mod client_manager;
pub mod config;
pub mod game;
pub mod network;
pub mod phase;
pub mod registry;
pub mod replicator;
pub mod session;
