// Session protocol messages and their payload encodings.
//
// The session protocol has exactly two message kinds, used symmetrically in
// both directions (client → relay and relay → client):
// - `PixelEdit`: payload is the UTF-8 text "<column> <row> <color>", three
//   space-separated decimal integers (color may be negative).
// - `ChatMessage`: payload is the UTF-8 text of an already formatted
//   "<senderName>: <text>" line. The relay forwards it untouched.
//
// `Message` ties the two together with the frame kind from `framing.rs`.
// `write_message`/`read_message` are the typed counterparts of
// `write_frame`/`read_frame`; `Message::encode`/`Message::decode` produce and
// consume whole frames in memory.
//
// Decoding is strict: a pixel payload that is not exactly three integer
// tokens, or a payload that is not UTF-8, is a `ProtocolError::Malformed`.

use std::fmt;
use std::io::{self, Cursor, Read, Write};

use serde::{Deserialize, Serialize};

use crate::error::ProtocolError;
use crate::framing::{MessageKind, read_frame, write_frame};
use crate::types::Color;

/// One cell write. Applying the same edit twice leaves the same grid.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PixelEdit {
    pub column: i32,
    pub row: i32,
    pub color: Color,
}

impl PixelEdit {
    pub fn new(column: i32, row: i32, color: Color) -> Self {
        Self { column, row, color }
    }

    fn encode_payload(&self) -> String {
        format!("{} {} {}", self.column, self.row, self.color.0)
    }

    fn decode_payload(payload: &[u8]) -> Result<Self, ProtocolError> {
        let malformed = |reason: String| ProtocolError::Malformed {
            kind: "pixel edit",
            reason,
        };

        let text = std::str::from_utf8(payload).map_err(|e| malformed(e.to_string()))?;
        let fields: Vec<&str> = text.split_whitespace().collect();
        let [column, row, color] = fields.as_slice() else {
            return Err(malformed(format!(
                "expected 3 fields, got {} in {text:?}",
                fields.len()
            )));
        };
        let parse = |field: &str| {
            field
                .parse::<i32>()
                .map_err(|e| malformed(format!("{field:?}: {e}")))
        };

        Ok(Self {
            column: parse(*column)?,
            row: parse(*row)?,
            color: Color(parse(*color)?),
        })
    }
}

/// A chat line, already formatted as "<senderName>: <text>".
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub text: String,
}

impl ChatMessage {
    /// Format a chat line from a sender name and the typed text.
    pub fn new(sender: &str, text: &str) -> Self {
        Self {
            text: format!("{sender}: {text}"),
        }
    }

    /// The sender prefix, if the line follows the "<name>: <text>" shape.
    pub fn sender(&self) -> Option<&str> {
        self.text.split_once(": ").map(|(sender, _)| sender)
    }

    /// The text after the sender prefix (the whole line if there is none).
    pub fn body(&self) -> &str {
        self.text
            .split_once(": ")
            .map_or(self.text.as_str(), |(_, body)| body)
    }
}

impl fmt::Display for ChatMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

/// Any session protocol message.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Message {
    PixelEdit(PixelEdit),
    Chat(ChatMessage),
}

impl Message {
    pub fn kind(&self) -> MessageKind {
        match self {
            Message::PixelEdit(_) => MessageKind::PixelEdit,
            Message::Chat(_) => MessageKind::Chat,
        }
    }

    /// The payload bytes for this message's frame.
    pub fn payload(&self) -> Vec<u8> {
        match self {
            Message::PixelEdit(edit) => edit.encode_payload().into_bytes(),
            Message::Chat(chat) => chat.text.as_bytes().to_vec(),
        }
    }

    /// Decode a payload that arrived under `kind`.
    pub fn from_payload(kind: MessageKind, payload: Vec<u8>) -> Result<Self, ProtocolError> {
        match kind {
            MessageKind::PixelEdit => PixelEdit::decode_payload(&payload).map(Message::PixelEdit),
            MessageKind::Chat => String::from_utf8(payload)
                .map(|text| Message::Chat(ChatMessage { text }))
                .map_err(|e| ProtocolError::Malformed {
                    kind: "chat",
                    reason: e.to_string(),
                }),
        }
    }

    /// Encode as a complete frame.
    pub fn encode(&self) -> Vec<u8> {
        let payload = self.payload();
        let mut buf = Vec::with_capacity(8 + payload.len());
        // Writing into a Vec only fails for payloads over MAX_PAYLOAD_SIZE,
        // which leaves `buf` empty; `write_message` reports that case.
        if write_frame(&mut buf, self.kind(), &payload).is_err() {
            buf.clear();
        }
        buf
    }

    /// Decode exactly one complete frame. Trailing bytes are an error.
    pub fn decode(bytes: &[u8]) -> Result<Self, ProtocolError> {
        let mut cursor = Cursor::new(bytes);
        let message = read_message(&mut cursor)?;
        let consumed = cursor.position() as usize;
        if consumed != bytes.len() {
            return Err(ProtocolError::Malformed {
                kind: "frame",
                reason: format!("{} trailing bytes", bytes.len() - consumed),
            });
        }
        Ok(message)
    }
}

impl From<PixelEdit> for Message {
    fn from(edit: PixelEdit) -> Self {
        Message::PixelEdit(edit)
    }
}

impl From<ChatMessage> for Message {
    fn from(chat: ChatMessage) -> Self {
        Message::Chat(chat)
    }
}

/// Write one message as a frame. Flushes the writer.
pub fn write_message<W: Write>(writer: &mut W, message: &Message) -> io::Result<()> {
    write_frame(writer, message.kind(), &message.payload())
}

/// Read and decode one message.
pub fn read_message<R: Read>(reader: &mut R) -> Result<Message, ProtocolError> {
    let (kind, payload) = read_frame(reader)?;
    Message::from_payload(kind, payload)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(kind: i32, payload: &[u8]) -> Vec<u8> {
        let mut bytes = kind.to_be_bytes().to_vec();
        bytes.extend_from_slice(&(payload.len() as i32).to_be_bytes());
        bytes.extend_from_slice(payload);
        bytes
    }

    #[test]
    fn pixel_edit_payload_is_space_separated_decimal() {
        let msg = Message::from(PixelEdit::new(12, 7, Color(-543_230)));
        assert_eq!(msg.payload(), b"12 7 -543230");
        assert_eq!(msg.encode(), frame(0, b"12 7 -543230"));
    }

    #[test]
    fn chat_payload_is_the_formatted_line() {
        let msg = Message::from(ChatMessage::new("Alice", "hello"));
        assert_eq!(msg.payload(), b"Alice: hello");
        assert_eq!(msg.encode(), frame(-1, b"Alice: hello"));
    }

    #[test]
    fn decode_then_encode_reproduces_canonical_bytes() {
        for bytes in [
            frame(0, b"0 0 0"),
            frame(0, b"49 49 -1"),
            frame(0, b"3 4 2147483647"),
            frame(-1, b"Bob: "),
            frame(-1, "Zoë: héllo".as_bytes()),
        ] {
            let msg = Message::decode(&bytes).unwrap();
            assert_eq!(msg.encode(), bytes);
        }
    }

    #[test]
    fn negative_color_and_empty_chat_text_survive() {
        let edit = Message::from(PixelEdit::new(1, 2, Color(i32::MIN)));
        assert_eq!(Message::decode(&edit.encode()).unwrap(), edit);

        let chat = Message::from(ChatMessage::new("Carol", ""));
        assert_eq!(Message::decode(&chat.encode()).unwrap(), chat);
    }

    #[test]
    fn length_counts_bytes_not_chars() {
        let msg = Message::from(ChatMessage::new("Zoë", "ü"));
        let bytes = msg.encode();
        let len = i32::from_be_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]);
        assert_eq!(len as usize, "Zoë: ü".len());
    }

    #[test]
    fn pixel_edit_with_wrong_field_count_is_malformed() {
        let payloads: [&[u8]; 4] = [b"1 2", b"1 2 3 4", b"", b"   "];
        for payload in payloads {
            let err = Message::decode(&frame(0, payload)).unwrap_err();
            assert!(
                matches!(err, ProtocolError::Malformed { kind: "pixel edit", .. }),
                "payload {payload:?} gave {err:?}"
            );
        }
    }

    #[test]
    fn pixel_edit_with_non_numeric_field_is_malformed() {
        let payloads: [&[u8]; 3] = [b"a 2 3", b"1 2 0x10", b"1 2 99999999999"];
        for payload in payloads {
            let err = Message::decode(&frame(0, payload)).unwrap_err();
            assert!(err.is_malformed(), "payload {payload:?} gave {err:?}");
        }
    }

    #[test]
    fn non_utf8_chat_is_malformed() {
        let err = Message::decode(&frame(-1, &[0xFF, 0xFE])).unwrap_err();
        assert!(matches!(err, ProtocolError::Malformed { kind: "chat", .. }));
    }

    #[test]
    fn trailing_bytes_are_rejected() {
        let mut bytes = frame(0, b"1 2 3");
        bytes.push(0);
        assert!(Message::decode(&bytes).is_err());
    }

    #[test]
    fn chat_sender_and_body() {
        let chat = ChatMessage::new("Dana", "look: a cat");
        assert_eq!(chat.sender(), Some("Dana"));
        assert_eq!(chat.body(), "look: a cat");

        let bare = ChatMessage {
            text: "no prefix".into(),
        };
        assert_eq!(bare.sender(), None);
        assert_eq!(bare.body(), "no prefix");
    }
}
