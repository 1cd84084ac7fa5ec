// UDP discovery sockets.
//
// The relay side is `DiscoveryResponder`: a UDP socket on the discovery port
// that answers every datagram with the relay's TCP port and reports the
// requester's address and display name back to the main loop. It polls with
// a short read timeout so it can notice `keep_running` going false.
//
// The client side is `discover_relay`: send the display name to the
// broadcast address, wait for the first parseable response, retry a few
// times. The relay's host is taken from the response's source address.

use std::io;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr, UdpSocket};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use kidpaint_protocol::SessionAddress;
use kidpaint_protocol::discovery::{
    MAX_DATAGRAM_SIZE, decode_request, decode_response, encode_request, encode_response,
};
use tracing::{debug, info, warn};

use crate::config::DiscoveryConfig;
use crate::error::ClientError;

/// How often the responder wakes to check for shutdown.
const POLL_INTERVAL: Duration = Duration::from_millis(100);

pub struct DiscoveryResponder {
    socket: UdpSocket,
}

impl DiscoveryResponder {
    pub fn bind(ip: IpAddr, port: u16) -> io::Result<Self> {
        let socket = UdpSocket::bind((ip, port))?;
        socket.set_read_timeout(Some(POLL_INTERVAL))?;
        Ok(Self { socket })
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.socket.local_addr()
    }

    /// Answer requests with `tcp_port` until `keep_running` goes false.
    /// `on_request` sees each requester's address and display name before the
    /// response goes out, so the relay knows the name by the time the
    /// requester can connect.
    pub fn serve<F>(self, tcp_port: u16, keep_running: Arc<AtomicBool>, mut on_request: F)
    where
        F: FnMut(SocketAddr, String),
    {
        let response = encode_response(tcp_port);
        let mut buf = [0u8; MAX_DATAGRAM_SIZE];
        while keep_running.load(Ordering::SeqCst) {
            match self.socket.recv_from(&mut buf) {
                Ok((len, source)) => {
                    let name = decode_request(&buf[..len]);
                    debug!(%source, %name, "discovery request");
                    on_request(source, name);
                    if let Err(e) = self.socket.send_to(&response, source) {
                        warn!(%source, error = %e, "discovery response failed");
                    }
                }
                Err(e)
                    if matches!(
                        e.kind(),
                        io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut
                    ) => {}
                Err(e) => {
                    // ICMP errors from earlier sends surface here on some
                    // platforms; keep serving.
                    warn!(error = %e, "discovery receive failed");
                    thread::sleep(POLL_INTERVAL);
                }
            }
        }
        debug!("discovery responder stopped");
    }
}

/// Find a relay on the local network. Sends the display name to
/// `config.broadcast_address:config.port` up to `config.attempts` times,
/// waiting `config.timeout()` after each for a valid response.
pub fn discover_relay(config: &DiscoveryConfig, name: &str) -> Result<SessionAddress, ClientError> {
    let socket = match config.broadcast_address {
        IpAddr::V4(_) => {
            let socket = UdpSocket::bind((Ipv4Addr::UNSPECIFIED, 0))?;
            socket.set_broadcast(true)?;
            socket
        }
        IpAddr::V6(_) => UdpSocket::bind((Ipv6Addr::UNSPECIFIED, 0))?,
    };
    let target = SocketAddr::new(config.broadcast_address, config.port);
    let request = encode_request(name);
    let attempts = config.attempts.max(1);

    for attempt in 1..=attempts {
        debug!(%target, attempt, "sending discovery request");
        socket.send_to(&request, target)?;
        if let Some(address) = await_response(&socket, config.timeout())? {
            info!(%address, attempt, "relay discovered");
            return Ok(address);
        }
    }
    Err(ClientError::DiscoveryTimeout { attempts })
}

/// Wait up to `timeout` for a response that parses. Invalid datagrams are
/// skipped without restarting the clock.
fn await_response(socket: &UdpSocket, timeout: Duration) -> io::Result<Option<SessionAddress>> {
    let deadline = Instant::now() + timeout;
    let mut buf = [0u8; MAX_DATAGRAM_SIZE];
    loop {
        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            return Ok(None);
        }
        socket.set_read_timeout(Some(remaining))?;
        match socket.recv_from(&mut buf) {
            Ok((len, source)) => match decode_response(&buf[..len]) {
                Some(port) => return Ok(Some(SessionAddress::new(source.ip(), port))),
                None => debug!(%source, "ignoring invalid discovery response"),
            },
            Err(e) if matches!(e.kind(), io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut) => {
                return Ok(None);
            }
            Err(e)
                if matches!(
                    e.kind(),
                    io::ErrorKind::ConnectionReset | io::ErrorKind::ConnectionRefused
                ) =>
            {
                // ICMP port unreachable from an earlier request.
                debug!("discovery request bounced");
            }
            Err(e) => return Err(e),
        }
    }
}
