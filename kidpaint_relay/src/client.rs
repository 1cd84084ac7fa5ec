// TCP client for a relay session.
//
// Architecture:
// - `connect()` opens the TCP connection on the calling thread (with a
//   timeout), then spawns a background reader thread. There is no handshake:
//   the first frames the relay sends are the snapshot of the current canvas.
// - The reader thread calls `read_message()` in a loop and hands every
//   decoded message to a `SessionListener`. When the stream ends or a frame
//   fails to decode it reports `on_connection_lost` once and exits.
// - The caller's thread holds a `BufWriter<TcpStream>` for sending. Writes
//   flush synchronously; edits and chat lines are small.
//
// `connect_channel()` is the common case: the listener is an `mpsc::Sender`
// and the caller drains `SessionEvent`s at its own pace, the same way a UI
// loop would.
//
// Dropping the client (or calling `disconnect`) shuts the socket down and
// joins the reader thread. A deliberate close is not reported as a lost
// connection.

use std::io::{BufReader, BufWriter, Write};
use std::net::{Shutdown, TcpStream};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use kidpaint_protocol::{
    ChatMessage, MAX_PAYLOAD_SIZE, Message, PixelEdit, ProtocolError, SessionAddress,
    read_message, write_message,
};
use tracing::{debug, info, warn};

use crate::error::ClientError;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Something that wants to hear about incoming session traffic. Called on
/// the client's reader thread, in arrival order.
pub trait SessionListener: Send + 'static {
    fn on_pixel_edit(&mut self, edit: PixelEdit);
    fn on_chat_received(&mut self, chat: ChatMessage);
    fn on_connection_lost(&mut self, reason: String);
}

/// Incoming traffic as values, for listeners that forward to a channel.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SessionEvent {
    PixelEdit(PixelEdit),
    Chat(ChatMessage),
    ConnectionLost(String),
}

impl SessionListener for Sender<SessionEvent> {
    fn on_pixel_edit(&mut self, edit: PixelEdit) {
        let _ = self.send(SessionEvent::PixelEdit(edit));
    }

    fn on_chat_received(&mut self, chat: ChatMessage) {
        let _ = self.send(SessionEvent::Chat(chat));
    }

    fn on_connection_lost(&mut self, reason: String) {
        let _ = self.send(SessionEvent::ConnectionLost(reason));
    }
}

/// TCP client for relay communication.
pub struct SessionClient {
    address: SessionAddress,
    writer: BufWriter<TcpStream>,
    closing: Arc<AtomicBool>,
    reader_thread: Option<JoinHandle<()>>,
}

impl SessionClient {
    /// Connect to a relay and start delivering its traffic to `listener`.
    pub fn connect<L: SessionListener>(
        address: SessionAddress,
        listener: L,
    ) -> Result<Self, ClientError> {
        let stream = TcpStream::connect_timeout(&address.socket_addr(), CONNECT_TIMEOUT)
            .map_err(|source| ClientError::Connect { address, source })?;
        stream.set_nodelay(true).ok();
        let reader_stream = stream.try_clone()?;

        let closing = Arc::new(AtomicBool::new(false));
        let closing_reader = closing.clone();
        let reader_thread = thread::spawn(move || {
            reader_loop(BufReader::new(reader_stream), listener, closing_reader);
        });
        info!(%address, "connected to relay");

        Ok(Self {
            address,
            writer: BufWriter::new(stream),
            closing,
            reader_thread: Some(reader_thread),
        })
    }

    /// Connect with an `mpsc` channel as the listener.
    pub fn connect_channel(
        address: SessionAddress,
    ) -> Result<(Self, Receiver<SessionEvent>), ClientError> {
        let (tx, rx) = mpsc::channel();
        let client = Self::connect(address, tx)?;
        Ok((client, rx))
    }

    pub fn address(&self) -> SessionAddress {
        self.address
    }

    pub fn send_pixel_edit(&mut self, edit: PixelEdit) -> Result<(), ClientError> {
        self.send(&Message::PixelEdit(edit))
    }

    /// Send several edits in order with a single flush.
    pub fn send_pixel_edits(&mut self, edits: &[PixelEdit]) -> Result<(), ClientError> {
        let result = edits
            .iter()
            .try_for_each(|edit| self.writer.write_all(&Message::PixelEdit(*edit).encode()))
            .and_then(|()| self.writer.flush());
        result.map_err(|e| ClientError::ConnectionLost(e.to_string()))
    }

    /// Send a chat line as "<sender_name>: <text>". Returns the line sent; the
    /// relay does not echo it back. A line that does not fit in one frame is
    /// rejected with `MessageTooLarge` and nothing is written.
    pub fn send_chat(&mut self, sender_name: &str, text: &str) -> Result<ChatMessage, ClientError> {
        let chat = ChatMessage::new(sender_name, text);
        let size = chat.text.len();
        if size > MAX_PAYLOAD_SIZE as usize {
            return Err(ClientError::MessageTooLarge {
                size,
                max: MAX_PAYLOAD_SIZE,
            });
        }
        self.send(&Message::Chat(chat.clone()))?;
        Ok(chat)
    }

    /// Close the connection and wait for the reader thread to finish.
    pub fn disconnect(mut self) {
        self.close();
    }

    fn send(&mut self, message: &Message) -> Result<(), ClientError> {
        write_message(&mut self.writer, message)
            .map_err(|e| ClientError::ConnectionLost(e.to_string()))
    }

    fn close(&mut self) {
        let Some(reader_thread) = self.reader_thread.take() else {
            return;
        };
        self.closing.store(true, Ordering::SeqCst);
        let _ = self.writer.flush();
        let _ = self.writer.get_ref().shutdown(Shutdown::Both);
        let _ = reader_thread.join();
        debug!(address = %self.address, "disconnected from relay");
    }
}

impl Drop for SessionClient {
    fn drop(&mut self) {
        self.close();
    }
}

/// Reader thread: decode frames in a loop and hand them to the listener.
fn reader_loop<L: SessionListener>(
    mut reader: BufReader<TcpStream>,
    mut listener: L,
    closing: Arc<AtomicBool>,
) {
    let reason = loop {
        match read_message(&mut reader) {
            Ok(Message::PixelEdit(edit)) => listener.on_pixel_edit(edit),
            Ok(Message::Chat(chat)) => listener.on_chat_received(chat),
            Err(e) => break lost_reason(&e),
        }
    };
    if closing.load(Ordering::SeqCst) {
        return;
    }
    warn!(%reason, "connection to relay lost");
    listener.on_connection_lost(reason);
}

fn lost_reason(error: &ProtocolError) -> String {
    if error.is_eof() {
        "relay closed the connection".into()
    } else {
        error.to_string()
    }
}
