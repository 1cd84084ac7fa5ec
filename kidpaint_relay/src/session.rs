// Session state for the relay.
//
// `Session` is the central data structure that `server.rs` drives. It owns
// the canonical grid and the roster of connected participants. All mutation
// happens through methods called from the server's single-threaded main
// loop, so there is no internal locking.
//
// Key responsibilities:
// - Participant management: assign IDs, send the newcomer snapshot, remove
//   participants and close their sockets.
// - Canonical grid: apply every in-bounds edit (last write wins) before
//   forwarding it, so the next newcomer's snapshot includes it.
// - Fan-out: forward edits and chat to every participant except the sender,
//   in the order the main loop handles them.
// - Names: discovery requests queue a display name per source IP; the next
//   TCP connection from that IP claims it. Names expire after `NAME_TTL`, a
//   client's discovery retries queue its name once, and at most
//   `MAX_PENDING_ADDRESSES` addresses are remembered.
//
// Writing to participant streams: `Session` holds cloned `TcpStream` write
// halves wrapped in `BufWriter`. The server gives them a write timeout, so a
// participant that stops reading fails its writes rather than blocking. A
// write failure removes that participant right after the fan-out pass; the
// others still receive the message.

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::io::{self, BufWriter, Write};
use std::net::{IpAddr, Shutdown, SocketAddr, TcpStream};
use std::time::{Duration, Instant};

use kidpaint_canvas::Grid;
use kidpaint_protocol::{ChatMessage, Message, ParticipantId, PixelEdit};
use tracing::{debug, info, warn};

/// Names queued per IP beyond this are dropped oldest-first.
const MAX_PENDING_NAMES: usize = 8;

/// Addresses with queued names beyond this evict the least recently heard.
const MAX_PENDING_ADDRESSES: usize = 256;

/// A discovered name not claimed by a connection within this long is
/// forgotten.
const NAME_TTL: Duration = Duration::from_secs(30);

/// Relay session managing a single shared canvas.
pub struct Session {
    grid: Grid,
    participants: BTreeMap<ParticipantId, ParticipantState>,
    next_participant_id: u32,
    max_participants: u32,
    pending_names: HashMap<IpAddr, VecDeque<PendingName>>,
}

struct PendingName {
    name: String,
    heard: Instant,
}

struct ParticipantState {
    name: String,
    peer: SocketAddr,
    writer: BufWriter<TcpStream>,
}

impl Session {
    pub fn new(width: u32, height: u32, max_participants: u32) -> Self {
        Self {
            grid: Grid::new(width, height),
            participants: BTreeMap::new(),
            next_participant_id: 0,
            max_participants,
            pending_names: HashMap::new(),
        }
    }

    /// The canonical grid.
    pub fn grid(&self) -> &Grid {
        &self.grid
    }

    pub fn participant_count(&self) -> usize {
        self.participants.len()
    }

    /// `(id, name)` for every live participant, in join order.
    pub fn participant_list(&self) -> Vec<(ParticipantId, String)> {
        self.participants
            .iter()
            .map(|(id, ps)| (*id, ps.name.clone()))
            .collect()
    }

    /// Remember the display name a discovery request carried, for the next
    /// connection from the same address.
    pub fn note_discovery(&mut self, ip: IpAddr, name: String) {
        self.note_discovery_at(ip, name, Instant::now());
    }

    /// Name for a new connection: the oldest unexpired name discovered from
    /// its IP, or `anonymous@<peer>` when it skipped discovery.
    pub fn claim_name(&mut self, peer: SocketAddr) -> String {
        self.claim_name_at(peer, Instant::now())
    }

    fn note_discovery_at(&mut self, ip: IpAddr, name: String, now: Instant) {
        self.expire_names(now);
        if !self.pending_names.contains_key(&ip)
            && self.pending_names.len() >= MAX_PENDING_ADDRESSES
        {
            self.evict_least_recent();
        }

        let queue = self.pending_names.entry(ip).or_default();
        // A retried request repeats the newest name; refresh it instead.
        if let Some(last) = queue.back_mut().filter(|last| last.name == name) {
            last.heard = now;
            return;
        }
        if queue.len() == MAX_PENDING_NAMES {
            queue.pop_front();
        }
        queue.push_back(PendingName { name, heard: now });
    }

    fn claim_name_at(&mut self, peer: SocketAddr, now: Instant) -> String {
        self.expire_names(now);
        let ip = peer.ip();
        let name = self
            .pending_names
            .get_mut(&ip)
            .and_then(|queue| queue.pop_front());
        if self.pending_names.get(&ip).is_some_and(VecDeque::is_empty) {
            self.pending_names.remove(&ip);
        }
        name.map_or_else(|| format!("anonymous@{peer}"), |pending| pending.name)
    }

    fn expire_names(&mut self, now: Instant) {
        self.pending_names.retain(|_, queue| {
            queue.retain(|pending| now.duration_since(pending.heard) < NAME_TTL);
            !queue.is_empty()
        });
    }

    fn evict_least_recent(&mut self) {
        let oldest = self
            .pending_names
            .iter()
            .filter_map(|(ip, queue)| queue.back().map(|pending| (*ip, pending.heard)))
            .min_by_key(|&(_, heard)| heard)
            .map(|(ip, _)| ip);
        if let Some(ip) = oldest {
            self.pending_names.remove(&ip);
        }
    }

    /// Admit a participant. The snapshot (every non-empty cell, row-major) is
    /// written before the participant joins the roster, so no fan-out frame
    /// can arrive ahead of it. Returns an error reason if the session is full
    /// or the snapshot cannot be delivered.
    pub fn add_participant(
        &mut self,
        name: String,
        peer: SocketAddr,
        stream: TcpStream,
    ) -> Result<ParticipantId, String> {
        if self.participants.len() as u32 >= self.max_participants {
            return Err("session is full".into());
        }

        let mut writer = BufWriter::new(stream);
        let cells = send_snapshot(&mut writer, &self.grid)
            .map_err(|e| format!("snapshot delivery failed: {e}"))?;

        let id = ParticipantId(self.next_participant_id);
        self.next_participant_id += 1;
        info!(participant = %id, %name, %peer, snapshot_cells = cells, "participant joined");
        self.participants
            .insert(id, ParticipantState { name, peer, writer });
        Ok(id)
    }

    /// Remove a participant and close its socket. Returns false if it was
    /// already gone.
    pub fn remove_participant(&mut self, id: ParticipantId, reason: &str) -> bool {
        match self.participants.remove(&id) {
            Some(ps) => {
                let _ = ps.writer.get_ref().shutdown(Shutdown::Both);
                info!(participant = %id, name = %ps.name, peer = %ps.peer, %reason, "participant left");
                true
            }
            None => false,
        }
    }

    /// Dispatch a decoded message from a participant.
    pub fn handle_message(&mut self, from: ParticipantId, message: Message) {
        match message {
            Message::PixelEdit(edit) => self.apply_edit(from, edit),
            Message::Chat(chat) => self.chat(from, chat),
        }
    }

    /// Apply an edit to the canonical grid and forward it. Out-of-bounds
    /// edits are dropped without forwarding.
    pub fn apply_edit(&mut self, from: ParticipantId, edit: PixelEdit) {
        if !self.grid.in_bounds(edit.column, edit.row) {
            debug!(participant = %from, column = edit.column, row = edit.row, "dropping out-of-bounds edit");
            return;
        }
        self.grid.apply(&edit);
        self.broadcast_except(from, &Message::PixelEdit(edit));
    }

    /// Forward a chat line verbatim. Nothing is stored.
    pub fn chat(&mut self, from: ParticipantId, chat: ChatMessage) {
        debug!(participant = %from, text = %chat.text, "chat");
        self.broadcast_except(from, &Message::Chat(chat));
    }

    /// Close every participant socket and empty the roster.
    pub fn shutdown(&mut self) {
        let ids: Vec<ParticipantId> = self.participants.keys().copied().collect();
        for id in ids {
            self.remove_participant(id, "relay shutting down");
        }
    }

    /// Write a message to every participant except `from`. Participants whose
    /// writes fail are removed once the pass is complete.
    fn broadcast_except(&mut self, from: ParticipantId, message: &Message) {
        let frame = message.encode();
        let mut failed = Vec::new();
        for (id, ps) in self.participants.iter_mut() {
            if *id == from {
                continue;
            }
            if let Err(e) = send_frame(&mut ps.writer, &frame) {
                warn!(participant = %id, error = %e, "write failed");
                failed.push(*id);
            }
        }
        for id in failed {
            self.remove_participant(id, "write failed");
        }
    }
}

fn send_frame(writer: &mut BufWriter<TcpStream>, frame: &[u8]) -> io::Result<()> {
    writer.write_all(frame)?;
    writer.flush()
}

/// Write one PixelEdit frame per non-empty cell and flush once. Returns the
/// number of cells sent.
fn send_snapshot(writer: &mut BufWriter<TcpStream>, grid: &Grid) -> io::Result<usize> {
    let mut cells = 0;
    for edit in grid.painted_cells() {
        writer.write_all(&Message::PixelEdit(edit).encode())?;
        cells += 1;
    }
    writer.flush()?;
    Ok(cells)
}

#[cfg(test)]
mod tests {
    use std::io::BufReader;
    use std::net::TcpListener;
    use std::time::Duration;

    use kidpaint_protocol::{Color, read_message};

    use super::*;

    /// Create a TCP pair: (client_stream, server_stream, server's view of the
    /// client address) on localhost.
    fn tcp_pair() -> (TcpStream, TcpStream, SocketAddr) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let client = TcpStream::connect(addr).unwrap();
        let (server, peer) = listener.accept().unwrap();
        (client, server, peer)
    }

    fn reader(stream: TcpStream) -> BufReader<TcpStream> {
        stream
            .set_read_timeout(Some(Duration::from_secs(5)))
            .unwrap();
        BufReader::new(stream)
    }

    fn recv(reader: &mut BufReader<TcpStream>) -> Message {
        read_message(reader).unwrap()
    }

    fn join(session: &mut Session, name: &str) -> (ParticipantId, BufReader<TcpStream>) {
        let (client, server, peer) = tcp_pair();
        let id = session.add_participant(name.into(), peer, server).unwrap();
        (id, reader(client))
    }

    fn edit(column: i32, row: i32, color: i32) -> PixelEdit {
        PixelEdit::new(column, row, Color(color))
    }

    #[test]
    fn ids_are_sequential() {
        let mut session = Session::new(4, 4, 4);
        let (a, _ra) = join(&mut session, "Alice");
        let (b, _rb) = join(&mut session, "Bob");
        assert_eq!(a, ParticipantId(0));
        assert_eq!(b, ParticipantId(1));
        assert_eq!(
            session.participant_list(),
            vec![(a, "Alice".to_string()), (b, "Bob".to_string())]
        );
    }

    #[test]
    fn full_session_rejected() {
        let mut session = Session::new(4, 4, 1);
        let (_a, _ra) = join(&mut session, "Alice");
        let (_client, server, peer) = tcp_pair();
        let result = session.add_participant("Bob".into(), peer, server);
        assert_eq!(result.unwrap_err(), "session is full");
        assert_eq!(session.participant_count(), 1);
    }

    #[test]
    fn edit_forwarded_to_others_not_sender() {
        let mut session = Session::new(4, 4, 4);
        let (a, mut ra) = join(&mut session, "Alice");
        let (_b, mut rb) = join(&mut session, "Bob");

        session.apply_edit(a, edit(1, 2, 7));
        assert_eq!(session.grid().get(1, 2), Some(Color(7)));
        assert_eq!(recv(&mut rb), Message::PixelEdit(edit(1, 2, 7)));

        // Alice should see nothing; the next frame she gets is Bob's chat.
        session.chat(ParticipantId(1), ChatMessage::new("Bob", "hi"));
        assert_eq!(
            recv(&mut ra),
            Message::Chat(ChatMessage::new("Bob", "hi"))
        );
    }

    #[test]
    fn out_of_bounds_edit_dropped() {
        let mut session = Session::new(4, 4, 4);
        let (a, _ra) = join(&mut session, "Alice");
        let (_b, mut rb) = join(&mut session, "Bob");

        session.apply_edit(a, edit(4, 0, 1));
        session.apply_edit(a, edit(-1, 2, 1));
        session.apply_edit(a, edit(0, 0, 3));

        assert_eq!(session.grid().count(Color::EMPTY), 15);
        // Only the in-bounds edit reaches Bob.
        assert_eq!(recv(&mut rb), Message::PixelEdit(edit(0, 0, 3)));
    }

    #[test]
    fn newcomer_gets_snapshot_of_painted_cells() {
        let mut session = Session::new(3, 3, 4);
        let (a, _ra) = join(&mut session, "Alice");
        session.apply_edit(a, edit(2, 0, 5));
        session.apply_edit(a, edit(0, 1, 6));
        session.apply_edit(a, edit(0, 1, 0));
        session.apply_edit(a, edit(1, 2, 8));

        let (_b, mut rb) = join(&mut session, "Bob");
        // Row-major, empty cells skipped: (0,1) was painted then erased.
        assert_eq!(recv(&mut rb), Message::PixelEdit(edit(2, 0, 5)));
        assert_eq!(recv(&mut rb), Message::PixelEdit(edit(1, 2, 8)));

        // The snapshot is followed directly by live traffic.
        session.apply_edit(a, edit(1, 1, 9));
        assert_eq!(recv(&mut rb), Message::PixelEdit(edit(1, 1, 9)));
    }

    #[test]
    fn last_write_wins_and_order_preserved() {
        let mut session = Session::new(5, 5, 4);
        let (a, _ra) = join(&mut session, "A");
        let (b, _rb) = join(&mut session, "B");
        let (_c, mut rc) = join(&mut session, "C");

        session.apply_edit(a, edit(2, 2, 7));
        session.apply_edit(b, edit(2, 2, 9));

        assert_eq!(session.grid().get(2, 2), Some(Color(9)));
        assert_eq!(recv(&mut rc), Message::PixelEdit(edit(2, 2, 7)));
        assert_eq!(recv(&mut rc), Message::PixelEdit(edit(2, 2, 9)));
    }

    #[test]
    fn remove_participant_closes_socket() {
        let mut session = Session::new(4, 4, 4);
        let (a, mut ra) = join(&mut session, "Alice");
        assert!(session.remove_participant(a, "test"));
        assert!(!session.remove_participant(a, "test"));
        assert_eq!(session.participant_count(), 0);

        let err = read_message(&mut ra).unwrap_err();
        assert!(err.is_eof());
    }

    #[test]
    fn discovered_names_claimed_in_order() {
        let mut session = Session::new(4, 4, 4);
        let ip: IpAddr = "10.0.0.7".parse().unwrap();
        session.note_discovery(ip, "Ada".into());
        session.note_discovery(ip, "Grace".into());

        let peer = SocketAddr::new(ip, 40000);
        assert_eq!(session.claim_name(peer), "Ada");
        assert_eq!(session.claim_name(peer), "Grace");
        assert_eq!(session.claim_name(peer), "anonymous@10.0.0.7:40000");
        assert!(session.pending_names.is_empty());
    }

    #[test]
    fn pending_names_bounded() {
        let mut session = Session::new(4, 4, 4);
        let ip: IpAddr = "10.0.0.8".parse().unwrap();
        for i in 0..MAX_PENDING_NAMES + 2 {
            session.note_discovery(ip, format!("n{i}"));
        }
        assert_eq!(session.claim_name(SocketAddr::new(ip, 1)), "n2");
    }

    #[test]
    fn retried_discovery_queues_name_once() {
        let mut session = Session::new(4, 4, 4);
        let ip: IpAddr = "10.0.0.9".parse().unwrap();
        let start = Instant::now();
        for attempt in 0..3 {
            session.note_discovery_at(ip, "Ada".into(), start + Duration::from_secs(attempt));
        }

        let peer = SocketAddr::new(ip, 40001);
        assert_eq!(session.claim_name_at(peer, start), "Ada");
        assert_eq!(session.claim_name_at(peer, start), "anonymous@10.0.0.9:40001");
    }

    #[test]
    fn unclaimed_names_expire() {
        let mut session = Session::new(4, 4, 4);
        let stale: IpAddr = "10.0.0.10".parse().unwrap();
        let fresh: IpAddr = "10.0.0.11".parse().unwrap();
        let start = Instant::now();
        session.note_discovery_at(stale, "Old".into(), start);
        session.note_discovery_at(fresh, "New".into(), start + NAME_TTL);

        // Noting `fresh` already dropped the expired entry for `stale`.
        assert_eq!(session.pending_names.len(), 1);
        let later = start + NAME_TTL + Duration::from_secs(1);
        assert_eq!(
            session.claim_name_at(SocketAddr::new(stale, 1), later),
            "anonymous@10.0.0.10:1"
        );
        assert_eq!(session.claim_name_at(SocketAddr::new(fresh, 1), later), "New");
    }

    #[test]
    fn pending_addresses_bounded() {
        let mut session = Session::new(4, 4, 4);
        let start = Instant::now();
        for i in 0..=MAX_PENDING_ADDRESSES {
            let ip = IpAddr::from([10, 1, (i / 256) as u8, (i % 256) as u8]);
            let heard = start + Duration::from_millis(i as u64);
            session.note_discovery_at(ip, format!("p{i}"), heard);
        }
        assert_eq!(session.pending_names.len(), MAX_PENDING_ADDRESSES);

        // The least recently heard address made room for the newest one.
        let first = SocketAddr::new(IpAddr::from([10, 1, 0, 0]), 1);
        assert_eq!(session.claim_name_at(first, start), "anonymous@10.1.0.0:1");
        let last = SocketAddr::new(IpAddr::from([10, 1, 1, 0]), 1);
        assert_eq!(session.claim_name_at(last, start), "p256");
    }

    #[test]
    fn failed_write_removes_only_that_participant() {
        let mut session = Session::new(4, 4, 4);
        let (a, _ra) = join(&mut session, "Alice");

        // Bob's socket can no longer be written to.
        let (_bob_client, server, peer) = tcp_pair();
        let bob_socket = server.try_clone().unwrap();
        let b = session.add_participant("Bob".into(), peer, server).unwrap();
        bob_socket.shutdown(Shutdown::Write).unwrap();

        let (c, mut rc) = join(&mut session, "Carol");

        session.apply_edit(a, edit(1, 1, 4));
        assert_eq!(recv(&mut rc), Message::PixelEdit(edit(1, 1, 4)));
        assert_eq!(
            session.participant_list(),
            vec![(a, "Alice".to_string()), (c, "Carol".to_string())]
        );
        assert!(!session.remove_participant(b, "already gone"));

        // Later traffic still reaches the survivors.
        session.chat(a, ChatMessage::new("Alice", "still here?"));
        assert_eq!(
            recv(&mut rc),
            Message::Chat(ChatMessage::new("Alice", "still here?"))
        );
    }

    #[test]
    fn shutdown_empties_roster() {
        let mut session = Session::new(4, 4, 4);
        let (_a, mut ra) = join(&mut session, "Alice");
        let (_b, mut rb) = join(&mut session, "Bob");
        session.shutdown();
        assert_eq!(session.participant_count(), 0);
        assert!(read_message(&mut ra).unwrap_err().is_eof());
        assert!(read_message(&mut rb).unwrap_err().is_eof());
    }
}
