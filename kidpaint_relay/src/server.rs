// TCP server and main event loop for the relay.
//
// Architecture: thread-per-reader with a central `mpsc` channel.
//
// - **Listener thread** (`TcpListener::accept()` loop): accepts new TCP
//   connections and sends `InternalEvent::NewConnection` to the main thread.
// - **Reader threads** (one per participant): call `read_message()` in a
//   loop and send `InternalEvent::MessageFrom` to the main thread. On EOF or
//   a frame that fails to decode, send `InternalEvent::Disconnected` and
//   exit. A bad frame only ever ends its own connection.
// - **Discovery thread** (optional): `DiscoveryResponder::serve`, which
//   answers UDP requests itself and sends `InternalEvent::Discovered` so the
//   session can name the connection that follows.
// - **Main thread**: owns the `Session`, receives events from the channel,
//   and dispatches them one at a time. This is what totally orders edits:
//   the canonical grid and every participant's stream see them in the same
//   order.
//
// The main thread is the only writer to participant TCP streams (via
// `Session`). Reader threads only read from their streams. Participant
// streams carry a write timeout, so a peer that stops reading is dropped
// instead of stalling the loop.
//
// Shutdown: `RelayHandle::stop` clears `keep_running`; the main loop wakes
// within one poll interval, closes every participant socket (which ends the
// reader threads), and joins the listener and discovery threads.

use std::io::{self, BufReader};
use std::net::{IpAddr, Shutdown, SocketAddr, TcpListener, TcpStream};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use kidpaint_protocol::{Message, ParticipantId, read_message};
use tracing::{debug, info, warn};

use crate::config::RelayConfig;
use crate::discovery::DiscoveryResponder;
use crate::error::RelayError;
use crate::session::Session;

/// How long the main loop and listener wait before rechecking `keep_running`.
const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Events sent from listener/reader/discovery threads to the main thread.
enum InternalEvent {
    NewConnection {
        stream: TcpStream,
        peer: SocketAddr,
    },
    MessageFrom {
        participant: ParticipantId,
        message: Message,
    },
    Disconnected {
        participant: ParticipantId,
        reason: String,
    },
    Discovered {
        ip: IpAddr,
        name: String,
    },
}

/// Handle returned by `start_relay` to control the running server.
pub struct RelayHandle {
    keep_running: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
    discovery_addr: Option<SocketAddr>,
}

impl RelayHandle {
    /// Signal the relay to stop and wait for it to shut down. Every
    /// participant connection is closed.
    pub fn stop(mut self) {
        self.keep_running.store(false, Ordering::SeqCst);
        self.join();
    }

    /// Block until the relay stops (for the standalone binary).
    pub fn wait(mut self) {
        self.join();
    }

    /// Where the discovery responder is bound, if it is running.
    pub fn discovery_addr(&self) -> Option<SocketAddr> {
        self.discovery_addr
    }

    fn join(&mut self) {
        if let Some(handle) = self.thread.take() {
            let _ = handle.join();
        }
    }
}

/// Start the relay on background threads. Returns a handle for stopping it
/// and the actual bound TCP address (useful when port 0 lets the OS pick).
pub fn start_relay(config: RelayConfig) -> Result<(RelayHandle, SocketAddr), RelayError> {
    let listener = TcpListener::bind((config.bind_address, config.port))?;
    let addr = listener.local_addr()?;
    let responder = config
        .discovery_port
        .map(|port| DiscoveryResponder::bind(config.bind_address, port))
        .transpose()?;
    let discovery_addr = responder
        .as_ref()
        .map(DiscoveryResponder::local_addr)
        .transpose()?;

    let keep_running = Arc::new(AtomicBool::new(true));
    let keep_running_relay = keep_running.clone();
    let thread = thread::spawn(move || {
        run_relay(listener, responder, config, keep_running_relay);
    });

    info!(%addr, discovery = ?discovery_addr, "relay started");
    Ok((
        RelayHandle {
            keep_running,
            thread: Some(thread),
            discovery_addr,
        },
        addr,
    ))
}

/// Main relay loop. Runs until `keep_running` is set to false.
fn run_relay(
    listener: TcpListener,
    responder: Option<DiscoveryResponder>,
    config: RelayConfig,
    keep_running: Arc<AtomicBool>,
) {
    let mut session = Session::new(config.width, config.height, config.max_participants);
    let (tx, rx): (Sender<InternalEvent>, Receiver<InternalEvent>) = mpsc::channel();
    let tcp_port = listener.local_addr().map(|a| a.port()).unwrap_or(config.port);

    let listener_thread = spawn_listener(listener, tx.clone(), keep_running.clone());
    let discovery_thread = responder.map(|responder| {
        let tx_discovery = tx.clone();
        let keep_running_discovery = keep_running.clone();
        thread::spawn(move || {
            responder.serve(tcp_port, keep_running_discovery, |source, name| {
                let _ = tx_discovery.send(InternalEvent::Discovered {
                    ip: source.ip(),
                    name,
                });
            });
        })
    });

    while keep_running.load(Ordering::SeqCst) {
        match rx.recv_timeout(POLL_INTERVAL) {
            Ok(event) => handle_event(&mut session, event, &tx, config.write_timeout()),
            Err(mpsc::RecvTimeoutError::Timeout) => {}
            Err(mpsc::RecvTimeoutError::Disconnected) => break,
        }
    }

    session.shutdown();
    let _ = listener_thread.join();
    if let Some(handle) = discovery_thread {
        let _ = handle.join();
    }
    info!("relay stopped");
}

/// Listener thread: non-blocking accept so it can check `keep_running`.
fn spawn_listener(
    listener: TcpListener,
    tx: Sender<InternalEvent>,
    keep_running: Arc<AtomicBool>,
) -> JoinHandle<()> {
    thread::spawn(move || {
        if let Err(e) = listener.set_nonblocking(true) {
            warn!(error = %e, "listener cannot poll for shutdown");
        }
        while keep_running.load(Ordering::SeqCst) {
            match listener.accept() {
                Ok((stream, peer)) => {
                    stream.set_nonblocking(false).ok();
                    if tx.send(InternalEvent::NewConnection { stream, peer }).is_err() {
                        break;
                    }
                }
                Err(ref e) if e.kind() == io::ErrorKind::WouldBlock => {
                    thread::sleep(POLL_INTERVAL);
                }
                Err(e) => {
                    warn!(error = %e, "accept failed");
                    thread::sleep(POLL_INTERVAL);
                }
            }
        }
    })
}

/// Dispatch a single event to the session.
fn handle_event(
    session: &mut Session,
    event: InternalEvent,
    tx: &Sender<InternalEvent>,
    write_timeout: Duration,
) {
    match event {
        InternalEvent::NewConnection { stream, peer } => {
            handle_new_connection(session, stream, peer, tx, write_timeout);
        }
        InternalEvent::MessageFrom {
            participant,
            message,
        } => {
            session.handle_message(participant, message);
        }
        InternalEvent::Disconnected {
            participant,
            reason,
        } => {
            session.remove_participant(participant, &reason);
        }
        InternalEvent::Discovered { ip, name } => {
            session.note_discovery(ip, name);
        }
    }
}

/// Admit a new connection: deliver the snapshot, add it to the roster, and
/// spawn its reader thread.
///
/// All participant writes happen on the main thread, so a peer that stops
/// reading must not block it: the write timeout turns a full socket buffer
/// into a write error, and the session drops that participant.
fn handle_new_connection(
    session: &mut Session,
    stream: TcpStream,
    peer: SocketAddr,
    tx: &Sender<InternalEvent>,
    write_timeout: Duration,
) {
    stream.set_nodelay(true).ok();
    if let Err(e) = stream.set_write_timeout(Some(write_timeout)) {
        warn!(%peer, error = %e, "could not set write timeout");
        let _ = stream.shutdown(Shutdown::Both);
        return;
    }
    let reader_stream = match stream.try_clone() {
        Ok(s) => s,
        Err(e) => {
            warn!(%peer, error = %e, "could not clone connection");
            return;
        }
    };

    let name = session.claim_name(peer);
    match session.add_participant(name, peer, stream) {
        Ok(participant) => {
            let tx_reader = tx.clone();
            thread::spawn(move || {
                reader_loop(BufReader::new(reader_stream), participant, tx_reader);
            });
        }
        Err(reason) => {
            warn!(%peer, %reason, "connection refused");
            let _ = reader_stream.shutdown(Shutdown::Both);
        }
    }
}

/// Reader loop for a single participant. Runs in its own thread until the
/// stream ends or a frame fails to decode.
fn reader_loop(mut reader: BufReader<TcpStream>, participant: ParticipantId, tx: Sender<InternalEvent>) {
    loop {
        match read_message(&mut reader) {
            Ok(message) => {
                if tx
                    .send(InternalEvent::MessageFrom {
                        participant,
                        message,
                    })
                    .is_err()
                {
                    break;
                }
            }
            Err(e) => {
                let reason = if e.is_eof() {
                    "connection closed".to_string()
                } else {
                    e.to_string()
                };
                if e.is_malformed() {
                    warn!(%participant, error = %e, "malformed frame, dropping connection");
                } else {
                    debug!(%participant, %reason, "reader stopped");
                }
                let _ = tx.send(InternalEvent::Disconnected {
                    participant,
                    reason,
                });
                break;
            }
        }
    }
}
