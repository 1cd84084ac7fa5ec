// Test-only painter for multiplayer integration tests.
//
// Wraps a real `CollaborativeCanvas` (from `kidpaint_relay::collab`) to give
// a synchronous, test-friendly API for exercising the full pipeline:
// local edit → client → relay → fan-out → peer's model.
//
// The only test-specific code here is the blocking polling wrappers around
// `CollaborativeCanvas::pump()`. All networking and canvas logic uses the
// same code paths as a real client.
//
// See also: `tests/full_pipeline.rs` for the integration test scenarios.

use std::net::SocketAddr;
use std::thread;
use std::time::{Duration, Instant};

use kidpaint_canvas::{CanvasConfig, Grid};
use kidpaint_protocol::{ChatMessage, PixelEdit};
use kidpaint_relay::{CanvasUpdate, ClientConfig, CollaborativeCanvas};

/// Default timeout for blocking poll operations.
const POLL_TIMEOUT: Duration = Duration::from_secs(5);

/// Sleep duration between poll attempts.
const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// A test participant wrapping a real `CollaborativeCanvas`.
pub struct TestPainter {
    pub canvas: CollaborativeCanvas,
    /// Every remote edit pumped so far, in arrival order.
    pub received: Vec<PixelEdit>,
    /// Every chat line pumped so far, in arrival order.
    pub chat_log: Vec<ChatMessage>,
}

impl TestPainter {
    /// Connect to a relay with a `width`×`height` canvas.
    pub fn connect(addr: SocketAddr, name: &str, width: u32, height: u32) -> Self {
        let config = ClientConfig {
            name: name.into(),
            canvas: CanvasConfig {
                width,
                height,
                ..CanvasConfig::default()
            },
            ..ClientConfig::default()
        };
        Self::connect_with(addr, &config)
    }

    pub fn connect_with(addr: SocketAddr, config: &ClientConfig) -> Self {
        let canvas = CollaborativeCanvas::join(addr.into(), config)
            .expect("TestPainter::connect failed");
        Self::wrap(canvas)
    }

    /// Find the relay with UDP discovery, then connect.
    pub fn discover(config: &ClientConfig) -> Self {
        let canvas =
            CollaborativeCanvas::discover_and_join(config).expect("TestPainter::discover failed");
        Self::wrap(canvas)
    }

    fn wrap(canvas: CollaborativeCanvas) -> Self {
        Self {
            canvas,
            received: Vec::new(),
            chat_log: Vec::new(),
        }
    }

    pub fn grid(&self) -> &Grid {
        self.canvas.model().grid()
    }

    /// Non-blocking: apply everything queued. Returns the number of updates.
    pub fn drain(&mut self) -> usize {
        let updates = self.canvas.pump().expect("connection lost");
        let count = updates.len();
        for update in updates {
            match update {
                CanvasUpdate::Pixel(edit) => self.received.push(edit),
                CanvasUpdate::Chat(chat) => self.chat_log.push(chat),
            }
        }
        count
    }

    /// Blocking poll until at least `count` remote edits have been received
    /// in total.
    pub fn poll_until_edits(&mut self, count: usize) {
        self.poll_until(|p| p.received.len() >= count, "remote edits");
    }

    /// Blocking poll until at least `count` chat lines have been received in
    /// total.
    pub fn poll_until_chats(&mut self, count: usize) {
        self.poll_until(|p| p.chat_log.len() >= count, "chat lines");
    }

    /// Blocking poll until this painter's grid equals `expected`.
    pub fn poll_until_grid(&mut self, expected: &Grid) {
        self.poll_until(|p| p.grid() == expected, "grid to converge");
    }

    /// Blocking poll until the relay is known to be gone.
    pub fn poll_until_disconnected(&mut self) {
        let start = Instant::now();
        loop {
            assert!(
                start.elapsed() < POLL_TIMEOUT,
                "timed out waiting for connection loss"
            );
            if self.canvas.pump().is_err() {
                return;
            }
            thread::sleep(POLL_INTERVAL);
        }
    }

    /// Blocking poll until `done` holds.
    pub fn poll_until(&mut self, done: impl Fn(&Self) -> bool, what: &str) {
        let start = Instant::now();
        loop {
            self.drain();
            if done(self) {
                return;
            }
            assert!(start.elapsed() < POLL_TIMEOUT, "timed out waiting for {what}");
            thread::sleep(POLL_INTERVAL);
        }
    }
}
