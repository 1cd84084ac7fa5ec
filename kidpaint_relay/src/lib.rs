// kidpaint_relay — session relay, LAN discovery, and network client for the
// KidPaint shared canvas.
//
// The relay is the single ordering point of a session: it accepts TCP
// connections, applies every pixel edit to a canonical grid, forwards edits
// and chat to everyone except the sender, and sends each newcomer a snapshot
// of the grid before anything else. Clients find it with a UDP broadcast.
//
// Module overview:
// - `session.rs`:   Session state: participant roster, canonical grid,
//                   snapshot on join, fan-out, discovered names.
// - `server.rs`:    TCP listener, reader threads (one per participant), and
//                   the main event loop funnelling into the single-threaded
//                   `Session`. `start_relay` / `RelayHandle`.
// - `discovery.rs`: UDP discovery responder (relay side) and
//                   `discover_relay` (client side).
// - `client.rs`:    `SessionClient`, the TCP connection a canvas uses, with
//                   a reader thread delivering to a `SessionListener`.
// - `collab.rs`:    `CollaborativeCanvas`, a `CanvasModel` kept in sync
//                   through a `SessionClient`.
// - `config.rs`:    `RelayConfig`, `DiscoveryConfig`, `ClientConfig`.
// - `error.rs`:     `RelayError`, `ClientError`.
// - `logging.rs`:   tracing subscriber setup for the binaries.
//
// Binaries: `relay` (standalone relay, `main.rs`) and `kidpaint` (headless
// line-oriented canvas client, `bin/kidpaint.rs`). The relay can also be
// embedded through the library API, which is how the tests run it.

pub mod client;
pub mod collab;
pub mod config;
pub mod discovery;
pub mod error;
pub mod logging;
pub mod server;
pub mod session;

pub use client::{SessionClient, SessionEvent, SessionListener};
pub use collab::{CanvasUpdate, CollaborativeCanvas};
pub use config::{ClientConfig, DiscoveryConfig, RelayConfig};
pub use discovery::discover_relay;
pub use error::{ClientError, RelayError};
pub use server::{RelayHandle, start_relay};
