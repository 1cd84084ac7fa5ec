// kidpaint_protocol — wire protocol for the KidPaint collaborative canvas.
//
// This crate defines the message types, framing, and discovery payloads used
// by the relay (`kidpaint_relay::server`) and by canvas clients
// (`kidpaint_relay::client`). It is shared by both sides and knows nothing
// about grids, history, or sockets.
//
// Module overview:
// - `types.rs`:     `Color`, `ParticipantId`, `SessionAddress`.
// - `message.rs`:   `PixelEdit`, `ChatMessage`, the `Message` enum, and the
//                   text payload encodings.
// - `framing.rs`:   kind + length + payload framing over any `Read`/`Write`.
// - `discovery.rs`: UDP discovery request/response payloads and constants.
// - `error.rs`:     `ProtocolError`.
//
// Design decisions:
// - **Symmetric kind space.** Clients and the relay send the same two
//   message kinds; the relay forwards frames rather than translating them.
// - **Text payloads.** Pixel edits are decimal text, as written by the
//   original clients, so any client that speaks the frame layout interops.
// - **No async runtime.** Framing uses `std::io::Read`/`Write`, compatible
//   with blocking TCP streams and buffered wrappers.

pub mod discovery;
pub mod error;
pub mod framing;
pub mod message;
pub mod types;

pub use error::ProtocolError;
pub use framing::{MAX_PAYLOAD_SIZE, MessageKind, read_frame, write_frame};
pub use message::{ChatMessage, Message, PixelEdit, read_message, write_message};
pub use types::{Color, ParticipantId, SessionAddress};
