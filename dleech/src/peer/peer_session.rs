use std::{
    collections::HashSet,
    io::{self, Read, Write},
    net::TcpStream,
    sync::Arc,
    time::Duration,
};

use chrono::{DateTime, Local};
use tracing::{debug, info, warn};

use crate::{
    config::cfg::Cfg,
    metainfo::metainfo::Metainfo,
    pieces::piece_manager::{PieceManager, PieceManagerError, StoreOutcome},
    storage::file_writer::FileWriter,
    swarm::status::{AtomicSwarmStatus, AtomicSwarmStatusError},
};

use super::{
    bt_peer::BtPeer,
    handshake::{Handshake, HANDSHAKE_LENGTH},
    peer_message::{Bitfield, Message, MessageError, MessageId, PieceBlock, Request},
    session_status::SessionStatus,
};

/// Size of one transfer block on the wire; the last block of a piece may be
/// shorter.
pub const BLOCK_SIZE: u32 = 16384;

#[derive(Debug)]
pub enum PeerSessionError {
    CouldNotConnectToPeer,
    ErrorSettingStreamTimeout,
    ErrorExchangingHandshake(io::Error),
    HandshakeRejected,
    ErrorReadingMessage(MessageError),
    ErrorSendingMessage(MessageError),
    ErrorWritingPiece(io::Error),
    PieceManagerError(PieceManagerError),
    SwarmStatusError(AtomicSwarmStatusError),
}

/// A PeerSession drives one peer connection through the download exchange:
/// connect, handshake, declare interest, then alternate between receiving
/// messages and requesting blocks for the piece currently assigned to us.
///
/// Recovery is deliberately simple: the session never re-requests a block
/// itself; when it closes for any reason its assigned piece is released so
/// another peer picks it up from scratch.
pub struct PeerSession {
    peer: BtPeer,
    metainfo: Arc<Metainfo>,
    piece_manager: Arc<PieceManager>,
    file_writer: Arc<FileWriter>,
    swarm_status: Arc<AtomicSwarmStatus>,
    session: SessionStatus,
    bitfield: Option<Bitfield>,
    /// Once a bitfield or any `have` arrived, a (late) bitfield is ignored.
    bitfield_locked: bool,
    current_piece: Option<u32>,
    /// Begin offsets of blocks requested but not yet received.
    outstanding: HashSet<u32>,
    piece_started: Option<DateTime<Local>>,
    config: Cfg,
    client_peer_id: [u8; 20],
}

impl PeerSession {
    pub fn new(
        peer: BtPeer,
        metainfo: Arc<Metainfo>,
        piece_manager: Arc<PieceManager>,
        file_writer: Arc<FileWriter>,
        swarm_status: Arc<AtomicSwarmStatus>,
        config: Cfg,
        client_peer_id: [u8; 20],
    ) -> Self {
        Self {
            peer,
            metainfo,
            piece_manager,
            file_writer,
            swarm_status,
            session: SessionStatus::new(),
            bitfield: None,
            bitfield_locked: false,
            current_piece: None,
            outstanding: HashSet::new(),
            piece_started: None,
            config,
            client_peer_id,
        }
    }

    /// Runs the session until the download completes, the peer goes away,
    /// the connection stalls or shutdown is signaled.
    pub fn run(&mut self) -> Result<(), PeerSessionError> {
        let mut stream = match self.connect() {
            Ok(stream) => stream,
            Err(err) => {
                self.swarm_status
                    .peer_connect_failed(&self.peer)
                    .map_err(PeerSessionError::SwarmStatusError)?;
                return Err(err);
            }
        };

        info!(peer = %self.peer, "handshake successful");
        self.swarm_status
            .peer_connected(&self.peer)
            .map_err(PeerSessionError::SwarmStatusError)?;

        let result = self.drive(&mut stream);

        self.abandon_current_piece()?;
        self.swarm_status
            .peer_disconnected(&self.peer)
            .map_err(PeerSessionError::SwarmStatusError)?;
        result
    }

    /// Opens the TCP connection and exchanges handshakes.
    fn connect(&mut self) -> Result<TcpStream, PeerSessionError> {
        let stream = TcpStream::connect_timeout(
            &self.peer.socket_addr(),
            Duration::from_secs(self.config.connect_seconds_timeout),
        )
        .map_err(|_| PeerSessionError::CouldNotConnectToPeer)?;

        self.set_stream_timeouts(&stream)?;
        self.exchange_handshake(&stream)?;
        Ok(stream)
    }

    /// Sends our handshake and validates the peer's echo: protocol string
    /// and info hash must match, the remote peer id is accepted as-is.
    fn exchange_handshake(&self, mut stream: &TcpStream) -> Result<(), PeerSessionError> {
        let handshake = Handshake::new(self.metainfo.info_hash, self.client_peer_id);
        stream
            .write_all(&handshake.as_bytes())
            .map_err(PeerSessionError::ErrorExchangingHandshake)?;

        let mut buffer = [0u8; HANDSHAKE_LENGTH];
        stream
            .read_exact(&mut buffer)
            .map_err(PeerSessionError::ErrorExchangingHandshake)?;

        let remote =
            Handshake::from_bytes(&buffer).map_err(|_| PeerSessionError::HandshakeRejected)?;
        if remote.info_hash != self.metainfo.info_hash {
            return Err(PeerSessionError::HandshakeRejected);
        }
        Ok(())
    }

    /// The main exchange loop. Interest is declared immediately; block
    /// requests go out whenever the peer has us unchoked and no piece is
    /// currently assigned.
    fn drive(&mut self, stream: &mut TcpStream) -> Result<(), PeerSessionError> {
        Message::new(MessageId::Interested, vec![])
            .write_to(stream)
            .map_err(PeerSessionError::ErrorSendingMessage)?;
        self.session.am_interested = true;

        let mut consecutive_timeouts: u32 = 0;
        while !self.swarm_status.is_shutdown() && !self.piece_manager.is_complete() {
            if !self.session.peer_choking && self.current_piece.is_none() {
                self.request_next_piece(stream)?;
            }

            match Message::read_from(stream) {
                Ok(message) => {
                    consecutive_timeouts = 0;
                    self.handle_message(message)?;
                }
                Err(MessageError::Io(err)) if is_timeout(&err) => {
                    consecutive_timeouts += 1;
                    if consecutive_timeouts >= self.config.stall_receive_limit {
                        debug!(peer = %self.peer, "connection stalled, closing");
                        break;
                    }
                    // Probe liveness while we wait.
                    Message::keep_alive()
                        .write_to(stream)
                        .map_err(PeerSessionError::ErrorSendingMessage)?;
                }
                Err(err) => return Err(PeerSessionError::ErrorReadingMessage(err)),
            }
        }
        Ok(())
    }

    /// Handles a message received from the peer.
    fn handle_message(&mut self, message: Message) -> Result<(), PeerSessionError> {
        match message.id {
            MessageId::KeepAlive => {}
            MessageId::Choke => {
                self.session.peer_choking = true;
                // Whatever we were downloading goes back to the pool.
                self.abandon_current_piece()?;
            }
            MessageId::Unchoke => {
                self.session.peer_choking = false;
            }
            MessageId::Interested => {
                self.session.peer_interested = true;
            }
            MessageId::NotInterested => {
                self.session.peer_interested = false;
            }
            MessageId::Have => {
                let index = message
                    .have_index()
                    .map_err(PeerSessionError::ErrorReadingMessage)?;
                let total_pieces = self.metainfo.total_pieces();
                self.bitfield
                    .get_or_insert_with(|| Bitfield::with_capacity(total_pieces))
                    .set_bit(index, true);
                self.bitfield_locked = true;
            }
            MessageId::Bitfield => {
                if !self.bitfield_locked {
                    self.bitfield = Some(Bitfield::new(message.payload));
                }
                self.bitfield_locked = true;
            }
            MessageId::Piece => self.handle_piece(&message)?,
            // We do not upload; requests and cancels need no reaction.
            MessageId::Request | MessageId::Cancel => {}
            MessageId::Unknown(id) => {
                debug!(peer = %self.peer, id, "ignoring unknown message id");
            }
        }
        Ok(())
    }

    /// Feeds one received block to the piece manager and, once a piece
    /// assembles, verifies and persists it.
    fn handle_piece(&mut self, message: &Message) -> Result<(), PeerSessionError> {
        let block =
            PieceBlock::from_message(message).map_err(PeerSessionError::ErrorReadingMessage)?;

        if self.current_piece == Some(block.index) {
            self.outstanding.remove(&block.begin);
        }

        let assembled = self
            .piece_manager
            .add_block(block.index, block.begin, block.block)
            .map_err(PeerSessionError::PieceManagerError)?;

        let Some(bytes) = assembled else {
            return Ok(());
        };

        match self
            .piece_manager
            .store_piece(block.index, &bytes)
            .map_err(PeerSessionError::PieceManagerError)?
        {
            StoreOutcome::Stored => {
                if let Err(err) = self.file_writer.write_piece(block.index, &bytes) {
                    // Disk failure poisons the whole download, not just us.
                    self.swarm_status.request_shutdown();
                    return Err(PeerSessionError::ErrorWritingPiece(err));
                }
                self.record_download_speed(bytes.len())?;
                let (completed, total) = self.piece_manager.progress();
                info!(
                    peer = %self.peer,
                    piece = block.index,
                    "piece downloaded ({}/{})",
                    completed,
                    total
                );
            }
            StoreOutcome::BadHash => {
                warn!(peer = %self.peer, piece = block.index, "piece failed hash verification");
            }
        }

        // Stored or rejected, the assignment is over either way.
        if self.current_piece == Some(block.index) {
            self.current_piece = None;
            self.outstanding.clear();
        }
        Ok(())
    }

    /// Asks the piece manager for the next piece and requests every one of
    /// its blocks up front.
    fn request_next_piece(&mut self, stream: &mut TcpStream) -> Result<(), PeerSessionError> {
        let index = match self
            .piece_manager
            .assign(&self.peer.endpoint())
            .map_err(PeerSessionError::PieceManagerError)?
        {
            Some(index) => index,
            // Everything left is assigned elsewhere; keep listening in case
            // a piece gets released back.
            None => return Ok(()),
        };

        let piece_size = self.metainfo.piece_size(index);
        self.current_piece = Some(index);
        self.outstanding.clear();
        self.piece_started = Some(Local::now());

        let mut begin: u32 = 0;
        while (begin as u64) < piece_size {
            let block_length = (piece_size - begin as u64).min(BLOCK_SIZE as u64) as u32;
            Message::new(
                MessageId::Request,
                Request::new(index, begin, block_length).as_bytes(),
            )
            .write_to(stream)
            .map_err(PeerSessionError::ErrorSendingMessage)?;
            self.outstanding.insert(begin);
            begin += block_length;
        }

        debug!(peer = %self.peer, piece = index, blocks = self.outstanding.len(), "piece requested");
        Ok(())
    }

    /// Releases the currently assigned piece, if any, back to the manager.
    fn abandon_current_piece(&mut self) -> Result<(), PeerSessionError> {
        if let Some(index) = self.current_piece.take() {
            self.piece_manager
                .release(index)
                .map_err(PeerSessionError::PieceManagerError)?;
        }
        self.outstanding.clear();
        Ok(())
    }

    /// Publishes the speed of the piece that just finished downloading.
    fn record_download_speed(&mut self, piece_bytes: usize) -> Result<(), PeerSessionError> {
        let Some(started) = self.piece_started.take() else {
            return Ok(());
        };
        let speed = calculate_kilobits_per_second(started, piece_bytes as u64);
        self.swarm_status
            .update_download_speed(&self.peer, speed)
            .map_err(PeerSessionError::SwarmStatusError)
    }

    /// Sets read and write timeouts for the stream.
    fn set_stream_timeouts(&self, stream: &TcpStream) -> Result<(), PeerSessionError> {
        stream
            .set_read_timeout(Some(Duration::from_secs(self.config.read_seconds_timeout)))
            .map_err(|_| PeerSessionError::ErrorSettingStreamTimeout)?;
        stream
            .set_write_timeout(Some(Duration::from_secs(self.config.read_seconds_timeout)))
            .map_err(|_| PeerSessionError::ErrorSettingStreamTimeout)?;
        Ok(())
    }
}

fn is_timeout(err: &io::Error) -> bool {
    matches!(
        err.kind(),
        io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut
    )
}

fn calculate_kilobits_per_second(start_time: DateTime<Local>, size: u64) -> f64 {
    let elapsed_time = Local::now().signed_duration_since(start_time);
    let elapsed_seconds = match elapsed_time.num_microseconds() {
        Some(micros) if micros > 0 => micros as f64 / 1_000_000.0,
        _ => return 0.0,
    };
    (size as f64 / elapsed_seconds) * 8.0 / 1024.0
}
