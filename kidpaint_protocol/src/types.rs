// Core value and ID types shared by the relay, the client, and the canvas.
//
// These are lightweight newtypes. `Color` is the signed 32-bit ARGB value
// stored in every grid cell and carried in pixel edits; it is signed because
// the wire format writes it as a signed decimal. `ParticipantId` is a compact
// relay-scoped connection ID, never sent on the wire.

use std::fmt;
use std::net::{IpAddr, SocketAddr};

use serde::{Deserialize, Serialize};

/// A cell color as a signed 32-bit ARGB value.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Color(pub i32);

impl Color {
    /// The erased/empty sentinel every fresh grid is filled with.
    pub const EMPTY: Color = Color(0);

    /// Build a color from an unsigned `0xAARRGGBB` value.
    pub fn from_argb(argb: u32) -> Self {
        Color(argb as i32)
    }

    /// The color as an unsigned `0xAARRGGBB` value.
    pub fn argb(self) -> u32 {
        self.0 as u32
    }

    pub fn is_empty(self) -> bool {
        self == Self::EMPTY
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Relay-assigned participant ID (compact u32, local to one relay process).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ParticipantId(pub u32);

impl fmt::Display for ParticipantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Where a session's relay accepts TCP connections. Resolved once per client
/// (usually by discovery) and immutable afterwards.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SessionAddress {
    pub host: IpAddr,
    pub port: u16,
}

impl SessionAddress {
    pub fn new(host: IpAddr, port: u16) -> Self {
        Self { host, port }
    }

    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }
}

impl From<SocketAddr> for SessionAddress {
    fn from(addr: SocketAddr) -> Self {
        Self::new(addr.ip(), addr.port())
    }
}

impl fmt::Display for SessionAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.socket_addr().fmt(f)
    }
}
