// CollaborativeCanvas: a `CanvasModel` wired to a relay session.
//
// Local operations mutate the model first, then send the edits the model
// returned, in order. Remote traffic arrives on the client's reader thread
// and waits in a channel until the owner calls `pump()`, so the model is
// only ever touched from the owner's thread. A UI calls `pump()` once per
// frame and repaints the cells it reports.
//
// Remote edits never touch undo history. Undo and redo restore the local
// snapshot and, when `broadcast_history` is on, send the cells the restore
// changed so every participant converges on the restored picture. Any
// remote edits made after the snapshot are overwritten by that rebroadcast.
//
// Once the connection is lost the canvas stays usable offline: local
// operations still apply to the model, but anything that needs the relay
// returns `ClientError::ConnectionLost`.

use std::path::Path;
use std::sync::mpsc::Receiver;

use kidpaint_canvas::{CanvasModel, Tool};
use kidpaint_protocol::{ChatMessage, Color, PixelEdit, SessionAddress};
use tracing::{debug, warn};

use crate::client::{SessionClient, SessionEvent};
use crate::config::ClientConfig;
use crate::discovery::discover_relay;
use crate::error::ClientError;

/// Something `pump()` applied or received since the last call.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CanvasUpdate {
    /// A remote edit, already applied to the model.
    Pixel(PixelEdit),
    Chat(ChatMessage),
}

pub struct CollaborativeCanvas {
    model: CanvasModel,
    client: SessionClient,
    events: Receiver<SessionEvent>,
    name: String,
    broadcast_history: bool,
    lost: Option<String>,
}

impl CollaborativeCanvas {
    /// Connect to a known relay address.
    pub fn join(address: SessionAddress, config: &ClientConfig) -> Result<Self, ClientError> {
        let (client, events) = SessionClient::connect_channel(address)?;
        Ok(Self {
            model: CanvasModel::new(&config.canvas),
            client,
            events,
            name: config.name.clone(),
            broadcast_history: config.broadcast_history,
            lost: None,
        })
    }

    /// Find a relay with UDP discovery, then connect to it.
    pub fn discover_and_join(config: &ClientConfig) -> Result<Self, ClientError> {
        let address = discover_relay(&config.discovery, &config.name)?;
        Self::join(address, config)
    }

    pub fn model(&self) -> &CanvasModel {
        &self.model
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn address(&self) -> SessionAddress {
        self.client.address()
    }

    pub fn is_connected(&self) -> bool {
        self.lost.is_none()
    }

    pub fn select_color(&mut self, color: Color) {
        self.model.select_color(color);
    }

    pub fn set_tool(&mut self, tool: Tool) {
        self.model.set_tool(tool);
    }

    /// Apply the current tool at a cell and send the result.
    pub fn paint(&mut self, column: i32, row: i32) -> Result<Vec<PixelEdit>, ClientError> {
        let edits = self.model.paint(column, row);
        self.send_edits(&edits)?;
        Ok(edits)
    }

    pub fn set_cell_color(
        &mut self,
        column: i32,
        row: i32,
        color: Color,
    ) -> Result<Option<PixelEdit>, ClientError> {
        let edit = self.model.set_cell_color(column, row, color);
        if let Some(edit) = edit {
            self.send_edits(&[edit])?;
        }
        Ok(edit)
    }

    /// Fill locally and send one edit per changed cell in fill order.
    pub fn flood_fill(
        &mut self,
        column: i32,
        row: i32,
        color: Color,
    ) -> Result<Vec<PixelEdit>, ClientError> {
        let edits = self.model.flood_fill(column, row, color);
        self.send_edits(&edits)?;
        Ok(edits)
    }

    /// Returns false if there was nothing to undo.
    pub fn undo(&mut self) -> Result<bool, ClientError> {
        match self.model.undo() {
            Some(edits) => {
                self.send_history(&edits)?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Returns false if there was nothing to redo.
    pub fn redo(&mut self) -> Result<bool, ClientError> {
        match self.model.redo() {
            Some(edits) => {
                self.send_history(&edits)?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Load a grid file as the current picture and send every changed cell.
    pub fn import_grid(&mut self, path: &Path) -> Result<Vec<PixelEdit>, ClientError> {
        let edits = self.model.import_grid(path)?;
        self.send_edits(&edits)?;
        Ok(edits)
    }

    /// Save the local view of the canvas.
    pub fn export_grid(&self, path: &Path) -> Result<(), ClientError> {
        self.model.export_grid(path).map_err(ClientError::from)
    }

    /// Send a chat line under this canvas's name. Returns the formatted line
    /// for local display; the relay does not echo it.
    pub fn send_chat(&mut self, text: &str) -> Result<ChatMessage, ClientError> {
        self.check_connected()?;
        let result = self.client.send_chat(&self.name, text);
        self.note_failure(result)
    }

    /// Apply every remote edit received since the last call and return what
    /// changed, in arrival order. Returns `ConnectionLost` once the queue is
    /// drained after the relay went away.
    pub fn pump(&mut self) -> Result<Vec<CanvasUpdate>, ClientError> {
        let mut updates = Vec::new();
        while let Ok(event) = self.events.try_recv() {
            match event {
                SessionEvent::PixelEdit(edit) => {
                    if !self.model.apply_remote_edit(&edit) {
                        debug!(column = edit.column, row = edit.row, "remote edit changed nothing");
                    }
                    updates.push(CanvasUpdate::Pixel(edit));
                }
                SessionEvent::Chat(chat) => updates.push(CanvasUpdate::Chat(chat)),
                SessionEvent::ConnectionLost(reason) => {
                    self.lost = Some(reason);
                }
            }
        }
        if updates.is_empty() {
            self.check_connected()?;
        }
        Ok(updates)
    }

    /// Close the session. The model is dropped with it; export first to keep
    /// the picture.
    pub fn leave(self) {
        self.client.disconnect();
    }

    fn send_history(&mut self, edits: &[PixelEdit]) -> Result<(), ClientError> {
        if self.broadcast_history {
            self.send_edits(edits)
        } else {
            Ok(())
        }
    }

    fn send_edits(&mut self, edits: &[PixelEdit]) -> Result<(), ClientError> {
        if edits.is_empty() {
            return Ok(());
        }
        self.check_connected()?;
        let result = self.client.send_pixel_edits(edits);
        self.note_failure(result)
    }

    fn check_connected(&self) -> Result<(), ClientError> {
        match &self.lost {
            Some(reason) => Err(ClientError::ConnectionLost(reason.clone())),
            None => Ok(()),
        }
    }

    /// Remember a send failure so later calls fail fast.
    fn note_failure<T>(&mut self, result: Result<T, ClientError>) -> Result<T, ClientError> {
        if let Err(ClientError::ConnectionLost(reason)) = &result {
            warn!(%reason, "send failed");
            self.lost = Some(reason.clone());
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use std::io::BufReader;
    use std::net::{TcpListener, TcpStream};
    use std::time::{Duration, Instant};

    use kidpaint_canvas::CanvasConfig;
    use kidpaint_protocol::{Message, read_message, write_message};

    use super::*;

    fn small_config() -> ClientConfig {
        ClientConfig {
            name: "Ada".into(),
            canvas: CanvasConfig {
                width: 3,
                height: 3,
                ..CanvasConfig::default()
            },
            ..ClientConfig::default()
        }
    }

    /// A canvas connected to a bare TCP server, plus the server's end.
    fn connected(config: &ClientConfig) -> (CollaborativeCanvas, BufReader<TcpStream>) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let address = SessionAddress::from(listener.local_addr().unwrap());
        let canvas = CollaborativeCanvas::join(address, config).unwrap();
        let (server, _) = listener.accept().unwrap();
        server
            .set_read_timeout(Some(Duration::from_secs(5)))
            .unwrap();
        (canvas, BufReader::new(server))
    }

    fn pump_until(canvas: &mut CollaborativeCanvas, count: usize) -> Vec<CanvasUpdate> {
        let deadline = Instant::now() + Duration::from_secs(5);
        let mut updates = Vec::new();
        while updates.len() < count && Instant::now() < deadline {
            updates.extend(canvas.pump().unwrap());
            std::thread::sleep(Duration::from_millis(5));
        }
        updates
    }

    fn recv_edit(server: &mut BufReader<TcpStream>) -> PixelEdit {
        match read_message(server).unwrap() {
            Message::PixelEdit(edit) => edit,
            other => panic!("expected PixelEdit, got {other:?}"),
        }
    }

    #[test]
    fn fill_sends_edits_in_fill_order() {
        let (mut canvas, mut server) = connected(&small_config());
        let edits = canvas.flood_fill(1, 1, Color(4)).unwrap();
        assert_eq!(edits.len(), 9);
        for expected in edits {
            assert_eq!(recv_edit(&mut server), expected);
        }
    }

    #[test]
    fn unchanged_pen_stroke_sends_nothing() {
        let (mut canvas, mut server) = connected(&small_config());
        canvas.select_color(Color(2));
        assert_eq!(canvas.paint(0, 0).unwrap().len(), 1);
        assert!(canvas.paint(0, 0).unwrap().is_empty());
        canvas.set_tool(Tool::Eraser);
        assert_eq!(canvas.paint(0, 0).unwrap().len(), 1);

        assert_eq!(recv_edit(&mut server), PixelEdit::new(0, 0, Color(2)));
        assert_eq!(recv_edit(&mut server), PixelEdit::new(0, 0, Color::EMPTY));
    }

    #[test]
    fn remote_edits_applied_on_pump() {
        let (mut canvas, server) = connected(&small_config());
        let mut server = server.into_inner();
        write_message(&mut server, &Message::PixelEdit(PixelEdit::new(2, 1, Color(8)))).unwrap();
        write_message(&mut server, &Message::Chat(ChatMessage::new("Bob", "hey"))).unwrap();

        let updates = pump_until(&mut canvas, 2);
        assert_eq!(
            updates,
            vec![
                CanvasUpdate::Pixel(PixelEdit::new(2, 1, Color(8))),
                CanvasUpdate::Chat(ChatMessage::new("Bob", "hey")),
            ]
        );
        assert_eq!(canvas.model().cell_color(2, 1), Some(Color(8)));
        assert!(!canvas.model().can_undo());
    }

    #[test]
    fn undo_rebroadcasts_restored_cells() {
        let (mut canvas, mut server) = connected(&small_config());
        canvas.set_cell_color(1, 1, Color(5)).unwrap();
        assert!(canvas.undo().unwrap());
        assert!(canvas.redo().unwrap());
        assert!(!canvas.redo().unwrap());

        assert_eq!(recv_edit(&mut server), PixelEdit::new(1, 1, Color(5)));
        assert_eq!(recv_edit(&mut server), PixelEdit::new(1, 1, Color::EMPTY));
        assert_eq!(recv_edit(&mut server), PixelEdit::new(1, 1, Color(5)));
    }

    #[test]
    fn local_only_history() {
        let config = ClientConfig {
            broadcast_history: false,
            ..small_config()
        };
        let (mut canvas, mut server) = connected(&config);
        canvas.set_cell_color(0, 2, Color(5)).unwrap();
        assert!(canvas.undo().unwrap());
        assert_eq!(canvas.model().cell_color(0, 2), Some(Color::EMPTY));
        canvas.send_chat("done").unwrap();

        assert_eq!(recv_edit(&mut server), PixelEdit::new(0, 2, Color(5)));
        // The undo sent nothing; the chat line comes next.
        assert_eq!(
            read_message(&mut server).unwrap(),
            Message::Chat(ChatMessage::new("Ada", "done"))
        );
    }

    #[test]
    fn lost_connection_reported_after_queue_drains() {
        let (mut canvas, server) = connected(&small_config());
        let mut server = server.into_inner();
        write_message(&mut server, &Message::PixelEdit(PixelEdit::new(0, 0, Color(1)))).unwrap();
        drop(server);

        let deadline = Instant::now() + Duration::from_secs(5);
        let mut seen = Vec::new();
        let err = loop {
            match canvas.pump() {
                Ok(updates) => seen.extend(updates),
                Err(e) => break e,
            }
            assert!(Instant::now() < deadline, "connection loss never reported");
            std::thread::sleep(Duration::from_millis(5));
        };
        assert_eq!(seen, vec![CanvasUpdate::Pixel(PixelEdit::new(0, 0, Color(1)))]);
        assert!(matches!(err, ClientError::ConnectionLost(_)));
        assert!(!canvas.is_connected());

        // Local edits still apply; sending them fails fast.
        assert!(matches!(
            canvas.set_cell_color(1, 1, Color(3)),
            Err(ClientError::ConnectionLost(_))
        ));
        assert_eq!(canvas.model().cell_color(1, 1), Some(Color(3)));
    }

    #[test]
    fn oversized_chat_keeps_session_usable() {
        let (mut canvas, mut server) = connected(&small_config());
        let text = "x".repeat(70_000);
        assert!(matches!(
            canvas.send_chat(&text),
            Err(ClientError::MessageTooLarge { .. })
        ));
        assert!(canvas.is_connected());

        canvas.set_cell_color(0, 0, Color(5)).unwrap();
        assert_eq!(recv_edit(&mut server), PixelEdit::new(0, 0, Color(5)));
        assert!(canvas.pump().unwrap().is_empty());
    }
}
