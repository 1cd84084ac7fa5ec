// Discovery datagram payloads.
//
// Discovery is a single UDP exchange: a client broadcasts its display name,
// and the relay answers the sender directly with its TCP listen port written
// as a decimal string. This module only encodes and decodes those payloads;
// the sockets live in `kidpaint_relay::discovery`.

use std::net::Ipv4Addr;

/// Well-known UDP port the relay's discovery responder listens on.
pub const DISCOVERY_PORT: u16 = 5555;

/// Default target of discovery requests (limited broadcast).
pub const BROADCAST_ADDRESS: Ipv4Addr = Ipv4Addr::BROADCAST;

/// Name used when a client does not supply one.
pub const DEFAULT_DISPLAY_NAME: &str = "anonymous";

/// Largest datagram either side reads.
pub const MAX_DATAGRAM_SIZE: usize = 1024;

/// Normalize a display name: trimmed, never empty.
pub fn display_name(name: &str) -> &str {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        DEFAULT_DISPLAY_NAME
    } else {
        trimmed
    }
}

pub fn encode_request(name: &str) -> Vec<u8> {
    display_name(name).as_bytes().to_vec()
}

/// Decode a request datagram into a display name. Invalid UTF-8 is replaced
/// rather than rejected; any datagram counts as a request.
pub fn decode_request(datagram: &[u8]) -> String {
    display_name(&String::from_utf8_lossy(datagram)).to_owned()
}

pub fn encode_response(tcp_port: u16) -> Vec<u8> {
    tcp_port.to_string().into_bytes()
}

/// Decode a response datagram into the relay's TCP port. Empty, non-numeric,
/// and zero ports are `None` so the caller keeps listening.
pub fn decode_response(datagram: &[u8]) -> Option<u16> {
    let text = std::str::from_utf8(datagram).ok()?.trim();
    match text.parse::<u16>() {
        Ok(0) | Err(_) => None,
        Ok(port) => Some(port),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_names_become_anonymous() {
        assert_eq!(encode_request(""), b"anonymous");
        assert_eq!(encode_request("  \t"), b"anonymous");
        assert_eq!(encode_request(" Eve "), b"Eve");
    }

    #[test]
    fn request_decoding_tolerates_bad_utf8() {
        assert_eq!(decode_request(b"Mallory"), "Mallory");
        assert_eq!(decode_request(&[0xFF]), "\u{FFFD}");
        assert_eq!(decode_request(b""), DEFAULT_DISPLAY_NAME);
    }

    #[test]
    fn response_roundtrip() {
        assert_eq!(decode_response(&encode_response(7878)), Some(7878));
        assert_eq!(decode_response(b"12345\n"), Some(12345));
    }

    #[test]
    fn invalid_responses_are_ignored() {
        assert_eq!(decode_response(b""), None);
        assert_eq!(decode_response(b"port"), None);
        assert_eq!(decode_response(b"0"), None);
        assert_eq!(decode_response(b"70000"), None);
        assert_eq!(decode_response(&[0xC3]), None);
    }
}
